//! Normalized segment set with an R-tree over bounding boxes.

use rstar::{RTree, RTreeObject, AABB};
use tracing::{info, warn};

use super::normalize::normalize;
use super::predicates::region_contains_point;
use crate::config::HierarchyConfig;
use crate::error::{GeometryError, HierarchyError};
use crate::models::{BBox, Segment, SegmentInput};

/// R-tree entry pointing back into the segment list
#[derive(Clone, Copy)]
struct IndexedSegment {
    index: usize,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for IndexedSegment {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

fn envelope_of(bbox: BBox) -> AABB<[f64; 2]> {
    AABB::from_corners([bbox.min_x, bbox.min_y], [bbox.max_x, bbox.max_y])
}

/// Geometry index for one image.
///
/// Holds every input segment (degenerate ones included, so that every id can
/// be audited downstream) but only indexes the non-degenerate ones.
pub struct SegmentIndex {
    segments: Vec<Segment>,
    tree: RTree<IndexedSegment>,
}

impl SegmentIndex {
    /// Normalize raw inputs and index them.
    ///
    /// A segment whose normalization fails is kept as degenerate and its
    /// error returned alongside the index.
    pub fn build(
        inputs: &[SegmentInput],
        config: &HierarchyConfig,
    ) -> Result<(Self, Vec<GeometryError>), HierarchyError> {
        if inputs.is_empty() {
            return Err(HierarchyError::EmptySegmentSet);
        }

        let mut errors = Vec::new();
        let segments: Vec<Segment> = inputs
            .iter()
            .map(|input| match normalize(input, config) {
                Ok(segment) => segment,
                Err(e) => {
                    warn!("{}; treating segment as degenerate", e);
                    errors.push(e);
                    Segment::degenerate(
                        input.id.clone(),
                        BBox::from_points(input.boundary.iter().flatten())
                            .filter(BBox::is_finite),
                    )
                }
            })
            .collect();

        let index = Self::from_segments(segments)?;
        Ok((index, errors))
    }

    /// Index already-normalized segments.
    pub fn from_segments(segments: Vec<Segment>) -> Result<Self, HierarchyError> {
        if segments.is_empty() {
            return Err(HierarchyError::EmptySegmentSet);
        }

        {
            let mut seen = hashbrown::HashSet::with_capacity(segments.len());
            for segment in &segments {
                if !seen.insert(segment.id()) {
                    return Err(HierarchyError::DuplicateSegmentId(segment.id().to_string()));
                }
            }
        }

        let indexed: Vec<IndexedSegment> = segments
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.is_degenerate())
            .map(|(index, s)| IndexedSegment {
                index,
                envelope: envelope_of(s.bbox()),
            })
            .collect();

        let tree = RTree::bulk_load(indexed);

        info!(
            "Indexed {} segments ({} degenerate)",
            segments.len(),
            segments.len() - tree.size()
        );

        Ok(Self { segments, tree })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn get(&self, index: usize) -> Option<&Segment> {
        self.segments.get(index)
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Number of non-degenerate segments
    pub fn indexed_len(&self) -> usize {
        self.tree.size()
    }

    /// Indices of non-degenerate segments whose bbox intersects `bbox`.
    pub fn candidates(&self, bbox: BBox) -> impl Iterator<Item = usize> + '_ {
        self.tree
            .locate_in_envelope_intersecting(&envelope_of(bbox))
            .map(|entry| entry.index)
    }

    /// Indices of non-degenerate segments, in input order.
    pub fn indexed(&self) -> impl Iterator<Item = usize> + '_ {
        self.segments
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.is_degenerate())
            .map(|(i, _)| i)
    }

    /// All segments whose region contains the point.
    pub fn lookup(&self, x: f64, y: f64) -> Vec<&Segment> {
        let query_envelope = AABB::from_point([x, y]);

        // R-tree gives envelope candidates, exact containment filters them
        self.tree
            .locate_in_envelope_intersecting(&query_envelope)
            .map(|entry| &self.segments[entry.index])
            .filter(|s| region_contains_point(s, x, y))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(id: &str, x0: f64, y0: f64, x1: f64, y1: f64) -> SegmentInput {
        SegmentInput::new(id, vec![vec![[x0, y0], [x1, y0], [x1, y1], [x0, y1]]])
    }

    #[test]
    fn test_irreparable_segment_kept_as_degenerate() {
        let config = HierarchyConfig {
            snap_epsilon: 0.0,
            ..Default::default()
        };
        let mut ring = vec![[0.0, 0.0], [10.0, 0.0], [10.0, 10.0], [0.0, 10.0]];
        ring.extend(ring.clone());
        let inputs = vec![
            rect("outer", -5.0, -5.0, 50.0, 50.0),
            SegmentInput::new("loop", vec![ring]),
        ];

        let (index, warnings) = SegmentIndex::build(&inputs, &config).unwrap();
        assert_eq!(warnings.len(), 1);
        assert!(matches!(&warnings[0], GeometryError::Irreparable { id, .. } if id == "loop"));
        assert_eq!(warnings[0].segment_ids(), vec!["loop"]);

        let broken = &index.segments()[1];
        assert!(broken.is_degenerate());
        assert_eq!(broken.bbox(), BBox::new(0.0, 0.0, 10.0, 10.0));
        assert_eq!(index.indexed_len(), 1);
    }

    #[test]
    fn test_empty_is_error() {
        let result = SegmentIndex::build(&[], &Default::default());
        assert!(matches!(result, Err(HierarchyError::EmptySegmentSet)));
    }

    #[test]
    fn test_duplicate_id_is_error() {
        let inputs = vec![rect("a", 0.0, 0.0, 1.0, 1.0), rect("a", 2.0, 2.0, 3.0, 3.0)];
        let result = SegmentIndex::build(&inputs, &Default::default());
        assert!(matches!(result, Err(HierarchyError::DuplicateSegmentId(id)) if id == "a"));
    }

    #[test]
    fn test_degenerate_kept_but_not_indexed() {
        let inputs = vec![
            rect("a", 0.0, 0.0, 10.0, 10.0),
            SegmentInput::new("dot", vec![vec![[5.0, 5.0]]]),
            SegmentInput::new("nan", vec![vec![[f64::NAN, 0.0], [1.0, 0.0], [1.0, 1.0]]]),
        ];
        let (index, errors) = SegmentIndex::build(&inputs, &Default::default()).unwrap();
        assert_eq!(index.len(), 3);
        assert_eq!(index.indexed_len(), 1);
        assert_eq!(errors.len(), 1);
        assert!(index.get(2).unwrap().is_degenerate());

        let hits: Vec<usize> = index.candidates(BBox::new(4.0, 4.0, 6.0, 6.0)).collect();
        assert_eq!(hits, vec![0]);
    }

    #[test]
    fn test_lookup_returns_containing_segments() {
        let inputs = vec![
            rect("big", 0.0, 0.0, 10.0, 10.0),
            rect("small", 1.0, 1.0, 3.0, 3.0),
            rect("far", 20.0, 20.0, 30.0, 30.0),
        ];
        let (index, _) = SegmentIndex::build(&inputs, &Default::default()).unwrap();

        let mut ids: Vec<&str> = index.lookup(2.0, 2.0).iter().map(|s| s.id()).collect();
        ids.sort();
        assert_eq!(ids, vec!["big", "small"]);
        assert!(index.lookup(15.0, 15.0).is_empty());
    }
}
