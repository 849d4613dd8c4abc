// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use clap::{Args, Parser, Subcommand};

/// CLI arguments parser.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
#[command(after_help = r#"Examples:
    pose-labels skeleton skeleton/mouse.yaml
    pose-labels skeleton --preset coco --output skeleton/coco.yaml
    pose-labels dataset skeleton/mouse.yaml --root data/split --class mouse --output data.yaml
    pose-labels convert labels/txt/clip --skeleton skeleton/mouse.yaml --width 1280 --height 720
    pose-labels export labels/clip.csv --project config.yaml --output labels/txt/clip
    pose-labels export labels/clip.csv -s skeleton/mouse.yaml --track-name mouse1 --track-name mouse2"#)]
pub struct Cli {
    #[command(subcommand)]
    /// Subcommand to execute.
    pub command: Commands,

    /// Show verbose output
    #[arg(long, global = true, default_value_t = true, action = clap::ArgAction::Set)]
    pub verbose: bool,
}

/// Commands for the CLI.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show a skeleton and the training metadata derived from it
    Skeleton(SkeletonArgs),
    /// Write a pose-training dataset YAML for a skeleton
    Dataset(DatasetArgs),
    /// Convert a directory of per-frame text files into a label table
    Convert(ConvertArgs),
    /// Export a label table as per-frame text files
    Export(ExportArgs),
}

/// Arguments for the skeleton command.
#[derive(Args, Debug)]
pub struct SkeletonArgs {
    /// Skeleton YAML file
    pub path: Option<String>,

    /// Built-in preset used when no file is given
    #[arg(long, default_value = "coco")]
    pub preset: String,

    /// Save the skeleton to this YAML file
    #[arg(short, long)]
    pub output: Option<String>,
}

/// Arguments for the dataset command.
#[derive(Args, Debug)]
pub struct DatasetArgs {
    /// Skeleton YAML file
    pub skeleton: String,

    /// Dataset root holding train/, valid/ and test/
    #[arg(long)]
    pub root: String,

    /// Class name (repeat for several classes)
    #[arg(long = "class", required = true)]
    pub classes: Vec<String>,

    /// Output dataset YAML
    #[arg(short, long, default_value = "dataset.yaml")]
    pub output: String,
}

/// Label store options shared by the import commands.
#[derive(Args, Debug, Default)]
pub struct StoreArgs {
    /// Skeleton YAML file (defaults to the project's skeleton)
    #[arg(short, long)]
    pub skeleton: Option<String>,

    /// Project YAML supplying animal names and count
    #[arg(short, long)]
    pub project: Option<String>,

    /// Image width used to normalize pixel coordinates
    #[arg(long, requires = "height")]
    pub width: Option<u32>,

    /// Image height used to normalize pixel coordinates
    #[arg(long, requires = "width")]
    pub height: Option<u32>,

    /// Maximum number of animals per frame
    #[arg(long)]
    pub max_individuals: Option<usize>,

    /// Project track name (repeat for several animals)
    #[arg(long = "track-name")]
    pub track_names: Vec<String>,

    /// Reject label files whose keypoints differ from the skeleton
    #[arg(long, default_value_t = false)]
    pub abort_on_mismatch: bool,

    /// Worker threads for per-frame export (0 = automatic)
    #[arg(long, default_value_t = 0)]
    pub threads: usize,
}

/// Arguments for the convert command.
#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// Directory of per-frame text files
    pub source: String,

    #[command(flatten)]
    pub store: StoreArgs,

    /// Output label table (.csv or .tsv) [default: runs/labels/convert*/labels.csv]
    #[arg(short, long)]
    pub output: Option<String>,

    /// Write pixel coordinates of the --width/--height image instead of normalized ones
    #[arg(long, requires = "width")]
    pub pixel: bool,
}

/// Arguments for the export command.
#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Label table (.csv or .tsv)
    pub source: String,

    #[command(flatten)]
    pub store: StoreArgs,

    /// Output directory [default: runs/labels/export*]
    #[arg(short, long)]
    pub output: Option<String>,
}
