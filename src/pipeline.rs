//! Per-image pipeline: geometry index, containment resolution, forest.
//!
//! Each image is independent, so batches fan out over a rayon pool with no
//! shared mutable state. The label source is the only shared input.

use rayon::prelude::*;
use tracing::info;

use crate::config::HierarchyConfig;
use crate::error::{GeometryError, HierarchyError};
use crate::geometry::SegmentIndex;
use crate::hierarchy::{build, BuildOutcome};
use crate::labels::LabelSource;
use crate::models::{CycleBreak, Forest, HierarchyDocument, ImageSegments, SceneMetadata, Segment};
use crate::resolve::resolve;

/// Built hierarchy of one image together with its segment index.
pub struct ImageHierarchy {
    image: String,
    index: SegmentIndex,
    outcome: BuildOutcome,
    warnings: Vec<GeometryError>,
}

impl ImageHierarchy {
    pub fn image(&self) -> &str {
        &self.image
    }

    pub fn forest(&self) -> &Forest {
        &self.outcome.forest
    }

    pub fn cycles(&self) -> &[CycleBreak] {
        &self.outcome.cycles
    }

    /// Segments degraded during normalization and pairs excluded from resolution
    pub fn warnings(&self) -> &[GeometryError] {
        &self.warnings
    }

    pub fn segments(&self) -> &[Segment] {
        self.index.segments()
    }

    /// Output artifact for this image.
    pub fn document(&self, scene: Option<&SceneMetadata>) -> HierarchyDocument {
        let mut doc = HierarchyDocument::new(&self.image, self.outcome.forest.clone(), scene);
        doc.cycles = self.outcome.cycles.clone();
        doc.warnings = self.warnings.iter().map(|w| w.to_string()).collect();
        doc
    }

    /// Root-to-leaf chain of the deepest segment whose region contains the point.
    pub fn locate(&self, x: f64, y: f64) -> Vec<&str> {
        let forest = &self.outcome.forest;
        let deepest = self
            .index
            .lookup(x, y)
            .into_iter()
            .map(|s| (forest.ancestry(s.id()), s))
            .max_by(|(chain_a, a), (chain_b, b)| {
                chain_a
                    .len()
                    .cmp(&chain_b.len())
                    .then_with(|| b.area().total_cmp(&a.area()))
                    .then_with(|| b.id().cmp(a.id()))
            });

        deepest.map(|(chain, _)| chain).unwrap_or_default()
    }
}

/// Run geometry index, resolver and builder for one image.
///
/// Only an empty segment set or duplicate ids abort; every other problem
/// degrades locally and is reported through [`ImageHierarchy::warnings`].
pub fn build_image_hierarchy(
    image: &ImageSegments,
    labels: &dyn LabelSource,
    config: &HierarchyConfig,
) -> Result<ImageHierarchy, HierarchyError> {
    info!(
        "Building hierarchy for {} ({} segments)",
        image.image,
        image.segments.len()
    );

    let (index, mut warnings) = SegmentIndex::build(&image.segments, config)?;
    let resolution = resolve(&index, config);
    warnings.extend(resolution.warnings);

    let outcome = build(index.segments(), &resolution.edges, labels, config)?;

    Ok(ImageHierarchy {
        image: image.image.clone(),
        index,
        outcome,
        warnings,
    })
}

/// Build many images in parallel, results in input order.
pub fn build_many(
    images: &[ImageSegments],
    labels: &dyn LabelSource,
    config: &HierarchyConfig,
) -> Vec<Result<ImageHierarchy, HierarchyError>> {
    images
        .par_iter()
        .map(|image| build_image_hierarchy(image, labels, config))
        .collect()
}
