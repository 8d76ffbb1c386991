//! Batch hierarchy builder.
//!
//! Walks a directory of `*.segments.json` files, builds one containment
//! hierarchy per image and writes it next to the image's other artifacts.

mod config;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use walkdir::WalkDir;

use segnest::models::SceneMetadata;
use segnest::{build_image_hierarchy, HierarchyConfig, ImageSegments, LabelMap};

use crate::config::Config;

const SEGMENTS_SUFFIX: &str = ".segments.json";

#[derive(Parser, Debug)]
#[command(name = "nest")]
#[command(about = "Build containment hierarchies from image segments")]
struct Args {
    /// Directory containing <image>.segments.json files
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Output root; results go to <output>/<image>/<image>_hierarchy.json
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Description responses root holding <image>/response.json and
    /// <image>/scene_metadata.json
    #[arg(long)]
    labels: Option<PathBuf>,

    /// TOML config with [hierarchy] and [paths] sections
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Rebuild images whose hierarchy already exists
    #[arg(long)]
    force: bool,

    /// Also write the flat numbered scene listing
    #[arg(long)]
    flat: bool,

    /// Worker threads (defaults to one per core)
    #[arg(long)]
    threads: Option<usize>,
}

/// One image to process
struct Job {
    image: String,
    input: PathBuf,
    out_dir: PathBuf,
}

impl Job {
    fn hierarchy_path(&self) -> PathBuf {
        self.out_dir.join(format!("{}_hierarchy.json", self.image))
    }

    fn scene_path(&self) -> PathBuf {
        self.out_dir.join(format!("{}_scene.json", self.image))
    }
}

struct Built {
    segments: usize,
    cycles: usize,
    warnings: usize,
}

fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load_from_file(path)?,
        None => Config::default(),
    };

    let input = args
        .input
        .clone()
        .or(config.paths.input.clone())
        .context("No input directory given (--input or [paths] input)")?;
    let output = args
        .output
        .clone()
        .or(config.paths.output.clone())
        .unwrap_or_else(|| input.clone());
    let labels_root = args.labels.clone().or(config.paths.labels.clone());

    if !input.is_dir() {
        anyhow::bail!("Input directory not found: {}", input.display());
    }

    if let Some(threads) = args.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("Failed to configure worker threads")?;
    }

    info!("Segnest hierarchy builder");
    info!("Input: {}", input.display());
    info!("Output: {}", output.display());

    let jobs = collect_jobs(&input, &output)?;
    let (jobs, skipped): (Vec<Job>, Vec<Job>) = jobs
        .into_iter()
        .partition(|job| args.force || !job.hierarchy_path().exists());

    info!(
        "Found {} images ({} already built, skipping)",
        jobs.len() + skipped.len(),
        skipped.len()
    );

    if jobs.is_empty() {
        return Ok(());
    }

    let pb = ProgressBar::new(jobs.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})",
            )?
            .progress_chars("#>-"),
    );

    let results: Vec<Result<Built>> = jobs
        .par_iter()
        .map(|job| {
            let result = process(job, labels_root.as_deref(), &config.hierarchy, args.flat);
            if let Err(e) = &result {
                pb.suspend(|| warn!("Failed to build {}: {:#}", job.image, e));
            }
            pb.inc(1);
            result
        })
        .collect();

    pb.finish_with_message("Processing complete");

    let built: Vec<&Built> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    let failed = results.len() - built.len();

    info!("Built: {}", built.len());
    info!("Failed: {}", failed);
    info!("Segments: {}", built.iter().map(|b| b.segments).sum::<usize>());
    info!("Cycles broken: {}", built.iter().map(|b| b.cycles).sum::<usize>());
    info!("Geometry warnings: {}", built.iter().map(|b| b.warnings).sum::<usize>());

    if built.is_empty() {
        anyhow::bail!("All {} images failed", failed);
    }

    Ok(())
}

/// Every `<image>.segments.json` under `input`, sorted by image name.
fn collect_jobs(input: &Path, output: &Path) -> Result<Vec<Job>> {
    let mut jobs = Vec::new();

    for entry in WalkDir::new(input).follow_links(true) {
        let entry = entry?;
        let path = entry.path();

        if !path.is_file() {
            continue;
        }

        let Some(image) = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.strip_suffix(SEGMENTS_SUFFIX))
        else {
            continue;
        };

        jobs.push(Job {
            image: image.to_string(),
            input: path.to_path_buf(),
            out_dir: output.join(image),
        });
    }

    jobs.sort_by(|a, b| a.image.cmp(&b.image));
    Ok(jobs)
}

fn process(
    job: &Job,
    labels_root: Option<&Path>,
    config: &HierarchyConfig,
    flat: bool,
) -> Result<Built> {
    let image = ImageSegments::load_from_file(&job.input)?;

    let labels = labels_root
        .map(|root| LabelMap::load_response_file(root.join(&job.image).join("response.json")))
        .unwrap_or_default();
    let scene = labels_root
        .and_then(|root| SceneMetadata::load(root.join(&job.image).join("scene_metadata.json")));

    let hierarchy = build_image_hierarchy(&image, &labels, config)
        .with_context(|| format!("Invalid segment set in {}", job.input.display()))?;
    let doc = hierarchy.document(scene.as_ref());

    fs::create_dir_all(&job.out_dir)
        .with_context(|| format!("Failed to create {}", job.out_dir.display()))?;
    fs::write(job.hierarchy_path(), doc.to_json()?)
        .with_context(|| format!("Failed to write {}", job.hierarchy_path().display()))?;

    if flat {
        let scene_json = serde_json::to_string_pretty(&doc.flat_scene())?;
        fs::write(job.scene_path(), scene_json)
            .with_context(|| format!("Failed to write {}", job.scene_path().display()))?;
    }

    Ok(Built {
        segments: hierarchy.segments().len(),
        cycles: hierarchy.cycles().len(),
        warnings: hierarchy.warnings().len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_square_image(dir: &Path, image: &str) {
        let json = format!(
            r#"{{"image": "{image}", "segments": [
                {{"id": "outer", "boundary": [[[0,0],[10,0],[10,10],[0,10]]]}},
                {{"id": "inner", "boundary": [[[2,2],[4,2],[4,4],[2,4]]]}}
            ]}}"#
        );
        fs::write(dir.join(format!("{image}{SEGMENTS_SUFFIX}")), json).unwrap();
    }

    #[test]
    fn test_collect_jobs_filters_and_sorts() {
        let input = tempfile::tempdir().unwrap();
        write_square_image(input.path(), "b");
        write_square_image(input.path(), "a");
        fs::write(input.path().join("notes.json"), "{}").unwrap();

        let jobs = collect_jobs(input.path(), Path::new("out")).unwrap();
        let names: Vec<&str> = jobs.iter().map(|j| j.image.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(jobs[0].hierarchy_path(), PathBuf::from("out/a/a_hierarchy.json"));
    }

    #[test]
    fn test_process_writes_hierarchy_with_labels() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let labels = tempfile::tempdir().unwrap();
        write_square_image(input.path(), "cat");

        let label_dir = labels.path().join("cat");
        fs::create_dir_all(&label_dir).unwrap();
        fs::write(
            label_dir.join("response.json"),
            r#"[{"id": "inner", "description": "a spot"}]"#,
        )
        .unwrap();
        fs::write(
            label_dir.join("scene_metadata.json"),
            r#"{"global_style": "flat vector"}"#,
        )
        .unwrap();

        let jobs = collect_jobs(input.path(), output.path()).unwrap();
        let built = process(&jobs[0], Some(labels.path()), &HierarchyConfig::default(), true).unwrap();
        assert_eq!(built.segments, 2);
        assert_eq!(built.cycles, 0);

        let json = fs::read_to_string(jobs[0].hierarchy_path()).unwrap();
        let doc = segnest::HierarchyDocument::from_json(&json).unwrap();
        assert_eq!(doc.global_style.as_deref(), Some("flat vector"));
        assert_eq!(doc.roots.ancestry("inner"), vec!["outer", "inner"]);
        assert_eq!(doc.roots.node("inner").unwrap().label.as_deref(), Some("a spot"));
        assert!(jobs[0].scene_path().exists());
    }

    #[test]
    fn test_process_reports_empty_segment_set() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        fs::write(
            input.path().join(format!("empty{SEGMENTS_SUFFIX}")),
            r#"{"image": "empty", "segments": []}"#,
        )
        .unwrap();

        let jobs = collect_jobs(input.path(), output.path()).unwrap();
        assert!(process(&jobs[0], None, &HierarchyConfig::default(), false).is_err());
        assert!(!jobs[0].hierarchy_path().exists());
    }
}
