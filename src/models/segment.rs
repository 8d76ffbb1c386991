//! Segment input records and the normalized segment type.

use anyhow::{Context, Result};
use geo::{MultiPolygon, Rect};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

/// One shape as delivered by the segmentation stage.
///
/// `boundary[0]` is the outer contour, any further rings are holes.
/// Rings may or may not repeat their first point at the end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentInput {
    pub id: String,
    pub boundary: Vec<Vec<[f64; 2]>>,
}

impl SegmentInput {
    pub fn new(id: impl Into<String>, boundary: Vec<Vec<[f64; 2]>>) -> Self {
        Self {
            id: id.into(),
            boundary,
        }
    }
}

/// All segments of one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageSegments {
    /// Image name, used to key labels, metadata and output paths
    pub image: String,
    pub segments: Vec<SegmentInput>,
}

impl ImageSegments {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read segments file {}", path.display()))?;
        let image: ImageSegments = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse segments file {}", path.display()))?;
        Ok(image)
    }
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Bounding box of a set of points, `None` when empty.
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a [f64; 2]>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut bbox = BBox::new(first[0], first[1], first[0], first[1]);
        for p in iter {
            bbox.min_x = bbox.min_x.min(p[0]);
            bbox.min_y = bbox.min_y.min(p[1]);
            bbox.max_x = bbox.max_x.max(p[0]);
            bbox.max_y = bbox.max_y.max(p[1]);
        }
        Some(bbox)
    }

    /// Closed-interval overlap test; touching boxes intersect.
    pub fn intersects(&self, other: &BBox) -> bool {
        self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }

    pub fn is_finite(&self) -> bool {
        [self.min_x, self.min_y, self.max_x, self.max_y]
            .iter()
            .all(|v| v.is_finite())
    }

    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }
}

impl From<Rect<f64>> for BBox {
    fn from(rect: Rect<f64>) -> Self {
        BBox::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y)
    }
}

/// A normalized segment: canonical region plus cached bbox and area.
///
/// Constructed by [`crate::geometry::normalize`]. Apart from the label,
/// which can be attached once, a segment is immutable.
#[derive(Debug, Clone)]
pub struct Segment {
    id: String,
    region: MultiPolygon<f64>,
    bbox: BBox,
    area: f64,
    degenerate: bool,
    label: OnceLock<String>,
}

impl Segment {
    pub(crate) fn new(id: String, region: MultiPolygon<f64>, bbox: BBox, area: f64) -> Self {
        Self {
            id,
            region,
            bbox,
            area,
            degenerate: false,
            label: OnceLock::new(),
        }
    }

    /// A segment excluded from all containment relations.
    ///
    /// Keeps whatever bounding box the raw input had so it still sorts
    /// sensibly among the roots.
    pub fn degenerate(id: impl Into<String>, bbox: Option<BBox>) -> Self {
        Self {
            id: id.into(),
            region: MultiPolygon::new(vec![]),
            bbox: bbox.unwrap_or(BBox::new(0.0, 0.0, 0.0, 0.0)),
            area: 0.0,
            degenerate: true,
            label: OnceLock::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn region(&self) -> &MultiPolygon<f64> {
        &self.region
    }

    pub fn bbox(&self) -> BBox {
        self.bbox
    }

    pub fn area(&self) -> f64 {
        self.area
    }

    pub fn is_degenerate(&self) -> bool {
        self.degenerate
    }

    pub fn label(&self) -> Option<&str> {
        self.label.get().map(String::as_str)
    }

    /// Attach a label if none is set yet. Returns false if one already was.
    pub fn attach_label(&self, label: impl Into<String>) -> bool {
        self.label.set(label.into()).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_from_points() {
        let pts = [[3.0, 1.0], [-1.0, 4.0], [2.0, -2.0]];
        let bbox = BBox::from_points(pts.iter()).unwrap();
        assert_eq!(bbox, BBox::new(-1.0, -2.0, 3.0, 4.0));
        assert!(BBox::from_points(std::iter::empty()).is_none());
    }

    #[test]
    fn test_bbox_touching_edges_intersect() {
        let a = BBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BBox::new(10.0, 0.0, 20.0, 10.0);
        let c = BBox::new(10.5, 0.0, 20.0, 10.0);
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
    }

    #[test]
    fn test_label_is_set_once() {
        let seg = Segment::degenerate("s1", None);
        assert_eq!(seg.label(), None);
        assert!(seg.attach_label("first"));
        assert!(!seg.attach_label("second"));
        assert_eq!(seg.label(), Some("first"));
    }

    #[test]
    fn test_parse_image_segments() {
        let json = r#"{"image":"cat","segments":[{"id":"a","boundary":[[[0,0],[1,0],[1,1]]]}]}"#;
        let image: ImageSegments = serde_json::from_str(json).unwrap();
        assert_eq!(image.image, "cat");
        assert_eq!(image.segments[0].boundary[0].len(), 3);
    }
}
