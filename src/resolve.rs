//! Containment resolution: pairwise "encloses" edges between segments.
//!
//! Pairs whose bounding boxes do not intersect are pruned through the
//! segment R-tree; only the remaining pairs pay for an exact overlay.

use tracing::{debug, info, warn};

use crate::config::HierarchyConfig;
use crate::error::GeometryError;
use crate::geometry::{intersection_area, SegmentIndex};
use crate::models::{ContainmentEdge, Segment};

/// Edges plus the pairs that could not be tested.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    /// Sorted by (ancestor id, descendant id)
    pub edges: Vec<ContainmentEdge>,
    pub warnings: Vec<GeometryError>,
    /// Pairs that survived bounding-box pruning
    pub exact_tests: usize,
}

pub fn resolve(index: &SegmentIndex, config: &HierarchyConfig) -> Resolution {
    let segments = index.segments();
    let mut resolution = Resolution::default();

    for i in index.indexed() {
        let a = &segments[i];

        let mut candidates: Vec<usize> = index.candidates(a.bbox()).filter(|&j| j > i).collect();
        candidates.sort_unstable();

        for j in candidates {
            let b = &segments[j];
            resolution.exact_tests += 1;

            let shared = match intersection_area(a, b) {
                Ok(area) => area,
                Err(e) => {
                    warn!("{}; pair excluded", e);
                    resolution.warnings.push(e);
                    continue;
                }
            };

            if let Some(edge) = decide(a, b, shared, config) {
                resolution.edges.push(edge);
            }
        }
    }

    resolution.edges.sort_by(|x, y| {
        x.ancestor_id
            .cmp(&y.ancestor_id)
            .then_with(|| x.descendant_id.cmp(&y.descendant_id))
    });

    let n = index.indexed_len();
    debug!(
        "{} of {} pairs needed an exact test",
        resolution.exact_tests,
        n * n.saturating_sub(1) / 2
    );
    info!(
        "Resolved {} containment edges ({} pair warnings)",
        resolution.edges.len(),
        resolution.warnings.len()
    );

    resolution
}

/// Direction of containment for one pair, if any.
///
/// The ancestor must hold at least `containment_threshold` of the
/// descendant's area and be strictly larger. Near-equal areas never nest.
fn decide(
    a: &Segment,
    b: &Segment,
    shared: f64,
    config: &HierarchyConfig,
) -> Option<ContainmentEdge> {
    let b_in_a = shared / b.area();
    let a_in_b = shared / a.area();
    let threshold = config.containment_threshold;

    if b_in_a < threshold && a_in_b < threshold {
        return None;
    }
    if config.areas_equal(a.area(), b.area()) {
        return None;
    }

    if b_in_a >= threshold && a.area() > b.area() {
        Some(ContainmentEdge::new(a.id(), b.id(), b_in_a))
    } else if a_in_b >= threshold && b.area() > a.area() {
        Some(ContainmentEdge::new(b.id(), a.id(), a_in_b))
    } else {
        None
    }
}
