//! Geometry index: normalized regions, cached areas and bounding boxes.

mod index;
mod normalize;
mod predicates;

pub use index::SegmentIndex;
pub use normalize::normalize;
pub use predicates::{intersection_area, region_contains_point};
