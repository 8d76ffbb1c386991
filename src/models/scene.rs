//! Whole-image metadata from the description collaborator.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::warn;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneMetadata {
    #[serde(default)]
    pub global_style: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl SceneMetadata {
    /// Load `scene_metadata.json`. A missing or unreadable file means no metadata.
    pub fn load<P: AsRef<Path>>(path: P) -> Option<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return None;
        }

        let parsed = fs::read_to_string(path)
            .map_err(|e| e.to_string())
            .and_then(|content| serde_json::from_str(&content).map_err(|e| e.to_string()));

        match parsed {
            Ok(metadata) => Some(metadata),
            Err(e) => {
                warn!("Failed to load scene metadata from {}: {}", path.display(), e);
                None
            }
        }
    }
}
