//! Cycle detection over the chosen parent links.

use std::cmp::Ordering;
use tracing::warn;

use crate::models::{CycleBreak, Segment};

/// Chosen immediate ancestor of a segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) struct ParentLink {
    pub ancestor: usize,
    pub overlap: f64,
}

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    Unvisited,
    OnPath,
    Done,
}

/// Cycle found on the parent links, with the edge chosen to be cut.
#[derive(Debug, Clone, PartialEq)]
pub(super) struct Cut {
    pub descendant: usize,
    pub link: ParentLink,
    pub report: CycleBreak,
}

/// Walk every ancestor chain and pick each cycle's weakest link.
///
/// The link with the lowest overlap ratio is chosen (ties by descendant
/// id). Chains are walked starting from segments in id order so the result
/// does not depend on input order. Links are left untouched; the caller
/// drops the edge and re-selects a parent.
pub(super) fn find_cycles(segments: &[Segment], parent: &[Option<ParentLink>]) -> Vec<Cut> {
    let mut mark = vec![Mark::Unvisited; segments.len()];
    let mut cuts = Vec::new();

    let mut starts: Vec<usize> = (0..segments.len()).collect();
    starts.sort_by(|&a, &b| segments[a].id().cmp(segments[b].id()));

    for start in starts {
        let mut path = Vec::new();
        let mut current = start;

        loop {
            match mark[current] {
                Mark::Done => break,
                Mark::OnPath => {
                    let from = path.iter().position(|&p| p == current).unwrap_or(0);
                    cuts.extend(weakest_link(segments, parent, &path[from..]));
                    break;
                }
                Mark::Unvisited => {
                    mark[current] = Mark::OnPath;
                    path.push(current);
                    match parent[current] {
                        Some(link) => current = link.ancestor,
                        None => break,
                    }
                }
            }
        }

        for p in path {
            mark[p] = Mark::Done;
        }
    }

    cuts
}

fn weakest_link(
    segments: &[Segment],
    parent: &[Option<ParentLink>],
    cycle: &[usize],
) -> Option<Cut> {
    let link_of = |i: usize| parent[i].map(|l| l.overlap).unwrap_or(f64::INFINITY);

    let weakest = cycle
        .iter()
        .copied()
        .min_by(|&a, &b| match link_of(a).total_cmp(&link_of(b)) {
            Ordering::Equal => segments[a].id().cmp(segments[b].id()),
            other => other,
        })?;

    let mut members: Vec<String> = cycle.iter().map(|&i| segments[i].id().to_string()).collect();
    members.sort();

    let link = parent[weakest]?;
    let ancestor_id = segments[link.ancestor].id().to_string();

    warn!(
        "Containment cycle among [{}]; dropping {} -> {} (overlap {:.4})",
        members.join(", "),
        ancestor_id,
        segments[weakest].id(),
        link.overlap
    );

    Some(Cut {
        descendant: weakest,
        link,
        report: CycleBreak {
            ancestor_id,
            descendant_id: segments[weakest].id().to_string(),
            overlap_ratio: link.overlap,
            members,
        },
    })
}
