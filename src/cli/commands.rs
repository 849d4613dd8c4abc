// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use std::path::{Path, PathBuf};

use crate::cli::args::{ConvertArgs, DatasetArgs, ExportArgs, SkeletonArgs, StoreArgs};
use crate::config::{ProjectConfig, StoreConfig};
use crate::error::{LabelError, Result};
use crate::presets::coco_pose;
use crate::skeleton::SkeletonGraph;
use crate::store::{ImportSummary, PoseLabelStore};
use crate::tracks::PromptResolver;
use crate::training::{DatasetConfig, TrainingConfig};
use crate::utils::{find_next_run_dir, pluralize};
use crate::{info, section, success, verbose, warn};

/// Base directory for outputs written without an explicit path.
const RUNS_DIR: &str = "runs/labels";

/// Print a skeleton summary and its training metadata.
///
/// # Errors
///
/// Returns an error if the skeleton cannot be loaded or saved, or the preset is unknown.
pub fn run_skeleton(args: &SkeletonArgs) -> Result<()> {
    let skeleton = match &args.path {
        Some(path) => SkeletonGraph::load(path)?,
        None => preset(&args.preset)?,
    };

    section!("Skeleton");
    info!("{}", pluralize(skeleton.len(), "node"));
    for node in skeleton.nodes() {
        let partner = skeleton
            .symmetry_partner(&node.name)
            .map(|p| format!("  <-> {p}"))
            .unwrap_or_default();
        info!("  {:<16} {:<6} {}{partner}", node.name, node.shape, node.color);
    }
    let edges: Vec<String> = skeleton
        .edges()
        .map(|e| {
            let (a, b) = e.names();
            format!("{a}-{b}")
        })
        .collect();
    info!("{}: {}", pluralize(edges.len(), "connection"), edges.join(", "));

    let training = TrainingConfig::from_skeleton(&skeleton);
    section!("Training metadata");
    info!("nkpt: {}", training.nkpt);
    info!("kpt_shape: {:?}", training.kpt_shape);
    info!("flip_idx: {:?}", training.flip_idx);
    info!("kpt_names: {:?}", training.kpt_names);

    if let Some(output) = &args.output {
        skeleton.save(output)?;
        success!("Skeleton saved to {output}");
    }
    Ok(())
}

/// Write a dataset YAML for the given skeleton and classes.
///
/// # Errors
///
/// Returns an error if the skeleton cannot be loaded or the YAML cannot be written.
pub fn run_dataset(args: &DatasetArgs) -> Result<()> {
    let skeleton = SkeletonGraph::load(&args.skeleton)?;
    let dataset = DatasetConfig::new(&args.root, &args.classes, &skeleton)?;
    dataset.save(&args.output)?;
    verbose!(
        "{}, {}, flip_idx {:?}",
        pluralize(dataset.nc, "class"),
        pluralize(dataset.nkpt, "keypoint"),
        dataset.flip_idx
    );
    success!("Dataset config saved to {}", args.output);
    Ok(())
}

/// Import per-frame text files and write them as one label table.
///
/// # Errors
///
/// Returns an error if the store cannot be set up, the import fails, or the
/// table cannot be written.
pub fn run_convert(args: &ConvertArgs) -> Result<()> {
    let mut store = build_store(&args.store)?;
    let mut resolver = PromptResolver::new(std::io::stdin().lock(), std::io::stderr());

    section!("Importing {}", args.source);
    let summary = store.import_per_frame_dir(&args.source, &mut resolver, None)?;
    report(&summary);

    let output = args.output.as_ref().map_or_else(
        || Path::new(&find_next_run_dir(RUNS_DIR, "convert")).join("labels.csv"),
        PathBuf::from,
    );
    if args.pixel {
        store.export_table_pixels(&output)?;
    } else {
        store.export_table(&output)?;
    }
    success!("Label table saved to {}", output.display());
    Ok(())
}

/// Import a label table and write it as per-frame text files.
///
/// # Errors
///
/// Returns an error if the store cannot be set up, the import fails, or a
/// frame file cannot be written.
pub fn run_export(args: &ExportArgs) -> Result<()> {
    let mut store = build_store(&args.store)?;
    let mut resolver = PromptResolver::new(std::io::stdin().lock(), std::io::stderr());

    section!("Importing {}", args.source);
    let summary = store.import_table_file(&args.source, &mut resolver)?;
    report(&summary);

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| find_next_run_dir(RUNS_DIR, "export"));
    let progress = |done: usize, total: usize| {
        if done == total || done % 100 == 0 {
            verbose!("{done}/{total} frames written");
        }
    };
    let written = store.export_frames(&output, Some(&progress))?;
    success!("{} saved to {output}", pluralize(written.len(), "frame file"));
    Ok(())
}

fn preset(name: &str) -> Result<SkeletonGraph> {
    match name.to_ascii_lowercase().as_str() {
        "coco" | "coco-pose" => Ok(coco_pose()),
        other => Err(LabelError::ConfigError(format!(
            "unknown skeleton preset '{other}' (available: coco)"
        ))),
    }
}

/// Build a label store from CLI options, falling back to the project file.
fn build_store(args: &StoreArgs) -> Result<PoseLabelStore> {
    let project = args.project.as_ref().map(ProjectConfig::load).transpose()?;

    let mut config = match &project {
        Some(project) => project.to_store_config()?,
        None => StoreConfig::new(),
    };
    if let Some(max) = args.max_individuals {
        config = config.with_max_individuals(max);
    }
    if !args.track_names.is_empty() {
        config = config.with_track_names(args.track_names.iter().cloned());
        if args.max_individuals.is_none() && project.is_none() {
            config = config.with_max_individuals(args.track_names.len());
        }
    }
    config = config
        .with_abort_on_mismatch(args.abort_on_mismatch)
        .with_export_threads(args.threads);

    let skeleton_path = match (&args.skeleton, &project) {
        (Some(path), _) => PathBuf::from(path),
        (None, Some(project)) => project.skeleton_path(),
        (None, None) => {
            return Err(LabelError::ConfigError(
                "a skeleton is required (--skeleton or --project)".to_string(),
            ));
        }
    };
    let skeleton = SkeletonGraph::load(&skeleton_path)?;
    verbose!(
        "Skeleton {} ({})",
        skeleton_path.display(),
        pluralize(skeleton.len(), "keypoint")
    );

    let mut store = PoseLabelStore::new(config);
    store.register_skeleton(skeleton);
    if let (Some(width), Some(height)) = (args.width, args.height) {
        store.set_image_resolution(width, height)?;
    }
    Ok(store)
}

fn report(summary: &ImportSummary) {
    verbose!(
        "{}, {}",
        pluralize(summary.rows, "row"),
        pluralize(summary.tracks, "track")
    );
    if summary.skipped > 0 {
        warn!("{} skipped as malformed", pluralize(summary.skipped, "entry"));
    }
    if summary.pixel_space {
        verbose!("Pixel coordinates detected");
    }
}
