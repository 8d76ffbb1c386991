//! Core data models for hierarchy construction.

pub mod hierarchy;
pub mod scene;
pub mod segment;

pub use hierarchy::{
    ContainmentEdge, CycleBreak, FlatScene, Forest, HierarchyDocument, HierarchyNode,
    SceneEntry,
};
pub use scene::SceneMetadata;
pub use segment::{BBox, ImageSegments, Segment, SegmentInput};
