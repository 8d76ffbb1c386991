//! Label lookup for hierarchy nodes.
//!
//! Labels come from an out-of-process description service and are consumed
//! read-only by segment id. A missing label is a normal answer.

use hashbrown::HashMap;
use regex::Regex;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, warn};

static ELEMENT_INDEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_element_(\d+)").expect("literal regex"));
static LAYER_INDEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Layer[_ ]?(\d+)").expect("literal regex"));

/// Read-only label lookup, safe to share between image pipelines.
pub trait LabelSource: Sync {
    fn get(&self, segment_id: &str) -> Option<String>;
}

/// Label source that never has a label.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLabels;

impl LabelSource for NoLabels {
    fn get(&self, _segment_id: &str) -> Option<String> {
        None
    }
}

/// Numeric element index embedded in an upstream file name, e.g.
/// `cat_element_12.svg` or `Layer_3.png`.
pub fn element_index(name: &str) -> Option<u64> {
    ELEMENT_INDEX
        .captures(name)
        .or_else(|| LAYER_INDEX.captures(name))
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Id-keyed labels with a fallback on the embedded element index.
#[derive(Debug, Clone, Default)]
pub struct LabelMap {
    exact: HashMap<String, String>,
    by_index: HashMap<u64, String>,
}

/// One entry of a description `response.json`
#[derive(Debug, Deserialize)]
struct ResponseEntry {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    mask_path: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

impl LabelMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a label. The first label for a key wins.
    pub fn insert(&mut self, key: impl Into<String>, label: impl Into<String>) {
        let key = key.into();
        let label = label.into();
        if let Some(index) = element_index(&key) {
            self.by_index.entry(index).or_insert_with(|| label.clone());
        }
        self.exact.entry(key).or_insert(label);
    }

    pub fn len(&self) -> usize {
        self.exact.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exact.is_empty()
    }

    /// Load a description service `response.json`.
    ///
    /// The file is an array of `{ "id" | "mask_path": <file name>,
    /// "description": <text> }`. A missing or malformed file yields an empty
    /// map.
    pub fn load_response_file<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        let mut labels = LabelMap::new();

        if !path.exists() {
            debug!("No response file at {}", path.display());
            return labels;
        }

        let entries: Vec<ResponseEntry> = match fs::read_to_string(path)
            .map_err(|e| e.to_string())
            .and_then(|content| serde_json::from_str(&content).map_err(|e| e.to_string()))
        {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Invalid response file {}: {}", path.display(), e);
                return labels;
            }
        };

        for entry in entries {
            let key = entry.mask_path.or(entry.id);
            if let (Some(key), Some(description)) = (key, entry.description) {
                labels.insert(key, description);
            }
        }

        debug!("Loaded {} labels from {}", labels.len(), path.display());
        labels
    }
}

impl LabelSource for LabelMap {
    fn get(&self, segment_id: &str) -> Option<String> {
        self.exact
            .get(segment_id)
            .or_else(|| element_index(segment_id).and_then(|i| self.by_index.get(&i)))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_index() {
        assert_eq!(element_index("cat_element_12.svg"), Some(12));
        assert_eq!(element_index("Layer_3.png"), Some(3));
        assert_eq!(element_index("Layer 7"), Some(7));
        assert_eq!(element_index("Layer9"), Some(9));
        assert_eq!(element_index("background.svg"), None);
    }

    #[test]
    fn test_lookup_exact_then_index() {
        let mut labels = LabelMap::new();
        labels.insert("cat_element_1.png", "an ear");
        labels.insert("eye", "an eye");

        assert_eq!(labels.get("eye").as_deref(), Some("an eye"));
        assert_eq!(labels.get("cat_element_1.png").as_deref(), Some("an ear"));
        // same element, different extension
        assert_eq!(labels.get("cat_element_1.svg").as_deref(), Some("an ear"));
        assert_eq!(labels.get("nose"), None);
    }

    #[test]
    fn test_first_label_wins() {
        let mut labels = LabelMap::new();
        labels.insert("a", "first");
        labels.insert("a", "second");
        assert_eq!(labels.get("a").as_deref(), Some("first"));
    }

    #[test]
    fn test_no_labels() {
        assert_eq!(NoLabels.get("anything"), None);
    }

    #[test]
    fn test_load_response_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("response.json");
        fs::write(
            &path,
            r#"[
                {"id": "cat_element_0.png", "description": "the cat's body"},
                {"mask_path": "cat_element_1.png", "description": "left ear"},
                {"id": "cat_element_2.png"}
            ]"#,
        )
        .unwrap();

        let labels = LabelMap::load_response_file(&path);
        assert_eq!(labels.len(), 2);
        assert_eq!(labels.get("cat_element_0.svg").as_deref(), Some("the cat's body"));
        assert_eq!(labels.get("cat_element_1.png").as_deref(), Some("left ear"));
        assert_eq!(labels.get("cat_element_2.png"), None);
    }

    #[test]
    fn test_load_missing_or_invalid_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(LabelMap::load_response_file(dir.path().join("response.json")).is_empty());

        let path = dir.path().join("broken.json");
        fs::write(&path, "[{").unwrap();
        assert!(LabelMap::load_response_file(&path).is_empty());
    }
}
