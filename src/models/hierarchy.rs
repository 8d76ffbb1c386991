//! Containment edges and the output forest.

use serde::{Deserialize, Serialize, Serializer};

use super::segment::BBox;
use super::scene::SceneMetadata;

/// Directed relation: `descendant` lies (almost) entirely inside `ancestor`.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainmentEdge {
    pub ancestor_id: String,
    pub descendant_id: String,
    /// area(ancestor ∩ descendant) / area(descendant)
    pub overlap_ratio: f64,
}

impl ContainmentEdge {
    pub fn new(
        ancestor_id: impl Into<String>,
        descendant_id: impl Into<String>,
        overlap_ratio: f64,
    ) -> Self {
        Self {
            ancestor_id: ancestor_id.into(),
            descendant_id: descendant_id.into(),
            overlap_ratio,
        }
    }
}

/// One node of the output forest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HierarchyNode {
    pub segment_id: String,

    /// Description from the label source; `null` when none was available
    pub label: Option<String>,

    pub bbox: BBox,

    pub area: f64,

    #[serde(default, skip_serializing_if = "is_false")]
    pub degenerate: bool,

    /// Id of the enclosing node. Not serialized, restored on load.
    #[serde(skip)]
    pub parent: Option<String>,

    /// Ordered left-to-right, top-to-bottom
    pub children: Vec<HierarchyNode>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl HierarchyNode {
    /// Pre-order iterator over this node and its descendants.
    pub fn iter(&self) -> PreOrder<'_> {
        PreOrder { stack: vec![self] }
    }

    fn relink(&mut self, parent: Option<&str>) {
        self.parent = parent.map(str::to_string);
        let id = self.segment_id.clone();
        for child in &mut self.children {
            child.relink(Some(&id));
        }
    }
}

pub struct PreOrder<'a> {
    stack: Vec<&'a HierarchyNode>,
}

impl<'a> Iterator for PreOrder<'a> {
    type Item = &'a HierarchyNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

/// Rooted forest of hierarchy nodes, serialized as a plain array of roots.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "Vec<HierarchyNode>")]
pub struct Forest {
    roots: Vec<HierarchyNode>,
}

impl From<Vec<HierarchyNode>> for Forest {
    fn from(roots: Vec<HierarchyNode>) -> Self {
        Forest::new(roots)
    }
}

impl Serialize for Forest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.roots.serialize(serializer)
    }
}

impl Forest {
    /// Wrap root nodes, (re)establishing parent back-references.
    pub fn new(mut roots: Vec<HierarchyNode>) -> Self {
        for root in &mut roots {
            root.relink(None);
        }
        Self { roots }
    }

    pub fn roots(&self) -> &[HierarchyNode] {
        &self.roots
    }

    /// Pre-order over all nodes, roots in order.
    pub fn iter(&self) -> PreOrder<'_> {
        PreOrder {
            stack: self.roots.iter().rev().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn node(&self, segment_id: &str) -> Option<&HierarchyNode> {
        self.iter().find(|n| n.segment_id == segment_id)
    }

    /// Ids from the root down to `segment_id`, inclusive.
    pub fn ancestry(&self, segment_id: &str) -> Vec<&str> {
        let mut chain = Vec::new();
        let mut current = self.node(segment_id);
        while let Some(node) = current {
            chain.push(node.segment_id.as_str());
            current = node.parent.as_deref().and_then(|p| self.node(p));
        }
        chain.reverse();
        chain
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

/// A containment cycle broken by dropping its weakest edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleBreak {
    pub ancestor_id: String,
    pub descendant_id: String,
    pub overlap_ratio: f64,
    /// Every segment id that was on the cycle
    pub members: Vec<String>,
}

/// Canonical per-image hierarchy artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HierarchyDocument {
    pub image: String,

    pub global_style: Option<String>,

    /// Description of the whole image
    pub description: Option<String>,

    pub roots: Forest,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cycles: Vec<CycleBreak>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Entry of the flat scene listing. Id 0 is the whole image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneEntry {
    pub id: usize,
    pub segment_id: Option<String>,
    /// Sequential id of the parent entry, -1 for the whole image
    pub parent: i64,
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatScene {
    pub global_style: Option<String>,
    pub scene: Vec<SceneEntry>,
}

impl HierarchyDocument {
    pub fn new(image: impl Into<String>, roots: Forest, scene: Option<&SceneMetadata>) -> Self {
        Self {
            image: image.into(),
            global_style: scene.and_then(|s| s.global_style.clone()),
            description: scene.and_then(|s| s.description.clone()),
            roots,
            cycles: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Flatten into sequentially numbered entries in reading order.
    pub fn flat_scene(&self) -> FlatScene {
        let mut scene = vec![SceneEntry {
            id: 0,
            segment_id: None,
            parent: -1,
            label: self.description.clone(),
        }];

        let mut stack: Vec<(&HierarchyNode, i64)> =
            self.roots.roots().iter().rev().map(|n| (n, 0)).collect();
        while let Some((node, parent)) = stack.pop() {
            let id = scene.len();
            scene.push(SceneEntry {
                id,
                segment_id: Some(node.segment_id.clone()),
                parent,
                label: node.label.clone(),
            });
            stack.extend(node.children.iter().rev().map(|c| (c, id as i64)));
        }

        FlatScene {
            global_style: self.global_style.clone(),
            scene,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(id: &str, label: Option<&str>) -> HierarchyNode {
        HierarchyNode {
            segment_id: id.to_string(),
            label: label.map(str::to_string),
            bbox: BBox::new(0.0, 0.0, 1.0, 1.0),
            area: 1.0,
            degenerate: false,
            parent: None,
            children: vec![],
        }
    }

    fn sample() -> Forest {
        let mut face = leaf("face", Some("a face"));
        let mut eye = leaf("eye", None);
        eye.children.push(leaf("pupil", Some("black")));
        face.children.push(eye);
        face.children.push(leaf("mouth", None));
        Forest::new(vec![face, leaf("sun", None)])
    }

    #[test]
    fn test_parents_linked() {
        let forest = sample();
        assert_eq!(forest.node("pupil").unwrap().parent.as_deref(), Some("eye"));
        assert_eq!(forest.node("face").unwrap().parent, None);
        assert_eq!(forest.ancestry("pupil"), vec!["face", "eye", "pupil"]);
    }

    #[test]
    fn test_preorder() {
        let forest = sample();
        let ids: Vec<&str> = forest.iter().map(|n| n.segment_id.as_str()).collect();
        assert_eq!(ids, vec!["face", "eye", "pupil", "mouth", "sun"]);
    }

    #[test]
    fn test_json_roundtrip_restores_parents() {
        let forest = sample();
        let json = forest.to_json().unwrap();
        assert!(!json.contains("\"parent\""));
        assert!(json.contains("\"label\": null"));

        let back = Forest::from_json(&json).unwrap();
        assert_eq!(back, forest);
        assert_eq!(back.to_json().unwrap(), json);
    }

    #[test]
    fn test_json_roundtrip_keeps_irregular_floats() {
        let mut state: u64 = 0x9e37_79b9_7f4a_7c15;
        let mut next = move || {
            state = state
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            (state >> 11) as f64 / (1u64 << 53) as f64 * 1000.0
        };

        let mut roots = Vec::new();
        for i in 0..2000 {
            let mut node = leaf(&format!("s{i}"), None);
            node.area = next();
            node.bbox = BBox::new(next(), next(), next() + 1000.0, next() + 1000.0);
            roots.push(node);
        }
        let mut known = leaf("known", None);
        known.area = 985.6906946328695;
        roots.push(known);

        let forest = Forest::new(roots);
        let json = forest.to_json().unwrap();
        let back = Forest::from_json(&json).unwrap();
        assert_eq!(back, forest);
        assert_eq!(back.to_json().unwrap(), json);
        assert_eq!(back.node("known").unwrap().area.to_bits(), 985.6906946328695f64.to_bits());
    }

    #[test]
    fn test_flat_scene_numbering() {
        let scene = SceneMetadata {
            global_style: Some("flat".to_string()),
            description: Some("a portrait".to_string()),
        };
        let doc = HierarchyDocument::new("img", sample(), Some(&scene));
        let flat = doc.flat_scene();

        assert_eq!(flat.global_style.as_deref(), Some("flat"));
        let rows: Vec<(usize, Option<&str>, i64)> = flat
            .scene
            .iter()
            .map(|e| (e.id, e.segment_id.as_deref(), e.parent))
            .collect();
        assert_eq!(
            rows,
            vec![
                (0, None, -1),
                (1, Some("face"), 0),
                (2, Some("eye"), 1),
                (3, Some("pupil"), 2),
                (4, Some("mouth"), 1),
                (5, Some("sun"), 0),
            ]
        );
        assert_eq!(flat.scene[0].label.as_deref(), Some("a portrait"));
    }
}
