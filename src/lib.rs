//! Segnest - containment hierarchies over image segments
//!
//! This library turns flat sets of 2D segments into a deterministic forest
//! of containment relations, shared by the `nest` batch binary.

pub mod config;
pub mod error;
pub mod geometry;
pub mod hierarchy;
pub mod labels;
pub mod models;
pub mod pipeline;
pub mod resolve;

pub use config::HierarchyConfig;
pub use error::{ConfigError, GeometryError, HierarchyError};
pub use labels::{LabelMap, LabelSource, NoLabels};
pub use models::{ContainmentEdge, Forest, HierarchyDocument, HierarchyNode, ImageSegments};
pub use pipeline::{build_image_hierarchy, build_many, ImageHierarchy};
