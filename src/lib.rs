// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
#![allow(clippy::multiple_crate_versions)]
//! # Pose Labels
//!
//! Multi-animal pose keypoint labels across video frames, bound to a
//! user-authored skeleton graph.
//!
//! ## Features
//!
//! - **Skeleton graph** - Named keypoint nodes, connections and left/right symmetry pairs with YAML persistence
//! - **Training metadata** - Keypoint count, shape, flip permutation and names for pose training
//! - **Label store** - One row per `(frame, track)` with `(x, y, visibility)` per keypoint
//! - **Imports** - Delimited label tables and per-frame text files, with track-name mapping and pixel-space detection
//! - **Exports** - Label tables and per-frame text files written in parallel
//!
//! ## Quick Start (Library)
//!
//! ```no_run
//! use pose_labels::{CannedResolver, PoseLabelStore, SkeletonGraph, StoreConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let skeleton = SkeletonGraph::load("skeleton/mouse.yaml")?;
//!
//!     let config = StoreConfig::new()
//!         .with_max_individuals(2)
//!         .with_track_names(["mouse1", "mouse2"]);
//!     let mut store = PoseLabelStore::new(config);
//!     store.register_skeleton(skeleton);
//!     store.set_image_resolution(1280, 720)?;
//!
//!     let mut resolver = CannedResolver::from_pairs([("track_0", "mouse1"), ("track_1", "mouse2")]);
//!     store.import_table_file("labels/clip.csv", &mut resolver)?;
//!
//!     for (track, keypoints) in store.keypoint_coordinates(0)? {
//!         println!("{track}: {} keypoints", keypoints.len());
//!     }
//!
//!     store.add_instance(10, "mouse1", Some((0.5, 0.5)))?;
//!     store.export_frames("labels/txt/clip", None)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Skeletons
//!
//! ```rust
//! use pose_labels::{SkeletonGraph, TrainingConfig, skeleton::Node};
//!
//! let mut skeleton = SkeletonGraph::new();
//! for name in ["nose", "L_ear", "R_ear"] {
//!     skeleton.insert_node(Node::new(name, 0.0, 0.0)).unwrap();
//! }
//! skeleton.add_edge("nose", "L_ear");
//! assert!(skeleton.add_symmetry("L_ear", "R_ear"));
//! assert!(!skeleton.add_symmetry("L_ear", "nose"));
//!
//! let training = TrainingConfig::from_skeleton(&skeleton);
//! assert_eq!(training.flip_idx, vec![0, 2, 1]);
//! ```
//!
//! ## CLI Usage
//!
//! ```bash
//! # Inspect a skeleton, or write the COCO preset
//! pose-labels skeleton skeleton/mouse.yaml
//! pose-labels skeleton --preset coco --output skeleton/coco.yaml
//!
//! # Dataset YAML for pose training
//! pose-labels dataset skeleton/mouse.yaml --root data/split --class mouse
//!
//! # Per-frame text files to a label table, and back
//! pose-labels convert labels/txt/clip --skeleton skeleton/mouse.yaml --width 1280 --height 720
//! pose-labels export labels/clip.csv --project config.yaml --output labels/txt/clip
//! ```
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`skeleton`] | [`SkeletonGraph`] nodes, connections, symmetry pairs and YAML |
//! | [`training`] | [`TrainingConfig`] and [`DatasetConfig`] for pose training |
//! | [`store`] | [`PoseLabelStore`] queries, edits, imports and exports |
//! | [`labels`] | [`LabelRow`] and [`LabelTable`] |
//! | [`normalize`] | Pixel-space detection and rescaling |
//! | [`tracks`] | [`TrackNameResolver`] and track-name mapping |
//! | [`table`] | Delimited label table reading and writing |
//! | [`frames`] | Per-frame text files |
//! | [`config`] | [`StoreConfig`] and [`ProjectConfig`] |
//! | [`error`] | Error types ([`LabelError`], [`Result`]) |

// Modules
pub mod cli;
pub mod color;
pub mod config;
pub mod error;
pub mod frames;
pub mod labels;
pub mod logging;
pub mod normalize;
pub mod presets;
pub mod skeleton;
pub mod store;
pub mod table;
pub mod tracks;
pub mod training;
pub mod utils;

// Re-export main types for convenience
pub use color::Color;
pub use config::{ProjectConfig, StoreConfig};
pub use error::{LabelError, Result};
pub use labels::{Keypoint, LabelRow, LabelTable};
pub use skeleton::{NodeShape, SkeletonGraph};
pub use store::{FrameCoordinates, ImportSummary, PoseLabelStore};
pub use tracks::{CannedResolver, PromptResolver, TrackMapping, TrackNameResolver};
pub use training::{DatasetConfig, TrainingConfig};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
