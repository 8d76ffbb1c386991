//! Error types for hierarchy construction.

use thiserror::Error;

/// Malformed or irreparable geometry, localized to one segment or one pair.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    /// A boundary contains NaN or infinite coordinates.
    #[error("segment '{id}': boundary contains non-finite coordinates")]
    NonFinite { id: String },

    /// Repair by snapping and simplification did not yield a valid region.
    #[error("segment '{id}': boundary could not be repaired: {reason}")]
    Irreparable { id: String, reason: String },

    /// The pairwise intersection produced a result that cannot be trusted.
    #[error("intersection of '{ancestor}' and '{descendant}' failed: {reason}")]
    Intersection {
        ancestor: String,
        descendant: String,
        reason: String,
    },
}

impl GeometryError {
    /// Segment id(s) this error is about.
    pub fn segment_ids(&self) -> Vec<&str> {
        match self {
            GeometryError::NonFinite { id } | GeometryError::Irreparable { id, .. } => {
                vec![id.as_str()]
            }
            GeometryError::Intersection {
                ancestor,
                descendant,
                ..
            } => vec![ancestor.as_str(), descendant.as_str()],
        }
    }
}

/// Precondition violations that abort an image's hierarchy construction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HierarchyError {
    /// No segments were supplied for the image.
    #[error("segment set is empty")]
    EmptySegmentSet,

    /// Two input segments share the same id.
    #[error("duplicate segment id '{0}'")]
    DuplicateSegmentId(String),
}

/// Invalid tunable values.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{field} = {value} is out of range ({expected})")]
    OutOfRange {
        field: &'static str,
        value: f64,
        expected: &'static str,
    },
}
