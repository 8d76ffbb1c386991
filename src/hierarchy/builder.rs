//! Reduce containment edges to a forest.

use hashbrown::HashMap;
use std::cmp::Ordering;
use tracing::{debug, info, warn};

use super::cycles::{find_cycles, ParentLink};
use crate::config::HierarchyConfig;
use crate::error::HierarchyError;
use crate::labels::LabelSource;
use crate::models::{ContainmentEdge, CycleBreak, Forest, HierarchyNode, Segment};

/// Result of one `build` call.
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    pub forest: Forest,
    /// Cycles that were cut, one entry per dropped edge
    pub cycles: Vec<CycleBreak>,
    /// Edges that referenced unknown or degenerate segments, or were self-loops
    pub ignored_edges: usize,
}

impl BuildOutcome {
    /// Sorted ids of every segment that sat on a cycle.
    pub fn cyclic_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self
            .cycles
            .iter()
            .flat_map(|c| c.members.iter().map(String::as_str))
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

/// Build the hierarchy forest.
///
/// Each segment attaches under its smallest enclosing ancestor; ancestors
/// whose areas tie within `equal_area_tolerance` are decided by ascending id.
/// Cycles are cut at their weakest edge. Children and roots are kept in
/// reading order (`bbox.min_x`, then `bbox.min_y`, then id). Labels come
/// from the segment itself or else from `labels`.
///
/// Pure in its inputs: identical arguments give identical forests.
pub fn build(
    segments: &[Segment],
    edges: &[ContainmentEdge],
    labels: &dyn LabelSource,
    config: &HierarchyConfig,
) -> Result<BuildOutcome, HierarchyError> {
    if segments.is_empty() {
        return Err(HierarchyError::EmptySegmentSet);
    }

    let mut by_id: HashMap<&str, usize> = HashMap::with_capacity(segments.len());
    for (i, segment) in segments.iter().enumerate() {
        if by_id.insert(segment.id(), i).is_some() {
            return Err(HierarchyError::DuplicateSegmentId(segment.id().to_string()));
        }
    }

    let mut candidates: Vec<Vec<ParentLink>> = vec![Vec::new(); segments.len()];
    let mut ignored_edges = 0;

    for edge in edges {
        let ancestor = by_id.get(edge.ancestor_id.as_str()).copied();
        let descendant = by_id.get(edge.descendant_id.as_str()).copied();

        let (ancestor, descendant) = match (ancestor, descendant) {
            (Some(a), Some(d)) if a != d => (a, d),
            _ => {
                warn!(
                    "Ignoring edge {} -> {}: unknown segment or self-loop",
                    edge.ancestor_id, edge.descendant_id
                );
                ignored_edges += 1;
                continue;
            }
        };

        if segments[ancestor].is_degenerate() || segments[descendant].is_degenerate() {
            warn!(
                "Ignoring edge {} -> {}: degenerate segment",
                edge.ancestor_id, edge.descendant_id
            );
            ignored_edges += 1;
            continue;
        }

        // repeated pairs keep their strongest overlap
        let links = &mut candidates[descendant];
        match links.iter_mut().find(|l| l.ancestor == ancestor) {
            Some(link) => link.overlap = link.overlap.max(edge.overlap_ratio),
            None => links.push(ParentLink {
                ancestor,
                overlap: edge.overlap_ratio,
            }),
        }
    }

    let mut parent: Vec<Option<ParentLink>> = candidates
        .iter()
        .map(|c| nearest_ancestor(segments, c, config))
        .collect();

    // Each round removes at least one edge, so this terminates.
    let mut cycles = Vec::new();
    loop {
        let cuts = find_cycles(segments, &parent);
        if cuts.is_empty() {
            break;
        }
        for cut in cuts {
            let links = &mut candidates[cut.descendant];
            links.retain(|l| l.ancestor != cut.link.ancestor);
            parent[cut.descendant] = nearest_ancestor(segments, links, config);
            cycles.push(cut.report);
        }
    }

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); segments.len()];
    let mut roots = Vec::new();
    for (i, link) in parent.iter().enumerate() {
        match link {
            Some(link) => children[link.ancestor].push(i),
            None => roots.push(i),
        }
    }

    let by_reading_order = |a: &usize, b: &usize| reading_order(&segments[*a], &segments[*b]);
    roots.sort_by(by_reading_order);
    for list in &mut children {
        list.sort_by(by_reading_order);
    }

    let nodes: Vec<HierarchyNode> = roots
        .iter()
        .map(|&r| assemble(r, segments, &children, labels))
        .collect();
    let forest = Forest::new(nodes);

    let labelled = forest.iter().filter(|n| n.label.is_some()).count();
    debug!("{} of {} nodes labelled", labelled, segments.len());
    info!(
        "Built forest: {} roots, {} segments, {} cycles broken",
        forest.roots().len(),
        segments.len(),
        cycles.len()
    );

    Ok(BuildOutcome {
        forest,
        cycles,
        ignored_edges,
    })
}

/// Smallest enclosing candidate; near-equal smallest areas go to the lowest id.
fn nearest_ancestor(
    segments: &[Segment],
    candidates: &[ParentLink],
    config: &HierarchyConfig,
) -> Option<ParentLink> {
    let smallest = candidates
        .iter()
        .map(|c| segments[c.ancestor].area())
        .min_by(f64::total_cmp)?;

    candidates
        .iter()
        .filter(|c| config.areas_equal(segments[c.ancestor].area(), smallest))
        .min_by(|a, b| segments[a.ancestor].id().cmp(segments[b.ancestor].id()))
        .copied()
}

fn reading_order(a: &Segment, b: &Segment) -> Ordering {
    let (ba, bb) = (a.bbox(), b.bbox());
    ba.min_x
        .total_cmp(&bb.min_x)
        .then_with(|| ba.min_y.total_cmp(&bb.min_y))
        .then_with(|| a.id().cmp(b.id()))
}

fn assemble(
    index: usize,
    segments: &[Segment],
    children: &[Vec<usize>],
    labels: &dyn LabelSource,
) -> HierarchyNode {
    let segment = &segments[index];
    HierarchyNode {
        segment_id: segment.id().to_string(),
        label: segment
            .label()
            .map(str::to_string)
            .or_else(|| labels.get(segment.id())),
        bbox: segment.bbox(),
        area: segment.area(),
        degenerate: segment.is_degenerate(),
        parent: None,
        children: children[index]
            .iter()
            .map(|&c| assemble(c, segments, children, labels))
            .collect(),
    }
}
