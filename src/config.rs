// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Store settings and the project file.
//!
//! [`StoreConfig`] carries the per-session limits of a [`crate::PoseLabelStore`].
//! [`ProjectConfig`] is the YAML project file that names the animals, the
//! skeleton and the videos with their label files.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{LabelError, Result};

/// Default frame window searched when seeding a new instance from a neighbour.
pub const DEFAULT_SEARCH_RADIUS: usize = 300;

/// Configuration for a label store session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Maximum number of simultaneous tracked individuals per frame and per import.
    pub max_individuals: usize,
    /// Project track names. Empty means imported names are accepted as they are.
    pub track_names: Vec<String>,
    /// Frames searched on either side when seeding a new instance.
    pub search_radius: usize,
    /// Whether an import whose keypoints differ from the skeleton is rejected
    /// instead of proceeding with the file's own keypoint order.
    pub abort_on_mismatch: bool,
    /// Worker threads for per-frame export.
    /// Setting this to `0` lets rayon choose.
    pub export_threads: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_individuals: 1,
            track_names: Vec::new(),
            search_radius: DEFAULT_SEARCH_RADIUS,
            abort_on_mismatch: false,
            export_threads: 0,
        }
    }
}

impl StoreConfig {
    /// Create a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of tracked individuals.
    ///
    /// # Arguments
    ///
    /// * `max` - Distinct tracks allowed per frame and per import.
    #[must_use]
    pub const fn with_max_individuals(mut self, max: usize) -> Self {
        self.max_individuals = max;
        self
    }

    /// Set the project track names.
    ///
    /// # Arguments
    ///
    /// * `names` - Allowed track names, one per animal.
    #[must_use]
    pub fn with_track_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.track_names = names.into_iter().map(Into::into).collect();
        self
    }

    /// Set the neighbour search radius in frames.
    #[must_use]
    pub const fn with_search_radius(mut self, radius: usize) -> Self {
        self.search_radius = radius;
        self
    }

    /// Reject imports whose keypoints do not match the skeleton.
    #[must_use]
    pub const fn with_abort_on_mismatch(mut self, abort: bool) -> Self {
        self.abort_on_mismatch = abort;
        self
    }

    /// Set the number of export worker threads (`0` = automatic).
    #[must_use]
    pub const fn with_export_threads(mut self, threads: usize) -> Self {
        self.export_threads = threads;
        self
    }
}

/// Kind of label file attached to a video.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelFileKind {
    /// Tabular label file.
    Csv,
    /// Directory of per-frame text files.
    Txt,
}

/// One video of a project and the label files produced for it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Video path.
    pub video: String,
    /// Tabular label files.
    #[serde(default)]
    pub csv: Vec<String>,
    /// Per-frame label directories.
    #[serde(default)]
    pub txt: Vec<String>,
}

/// Project file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project root directory.
    #[serde(default)]
    pub project_dir: String,
    /// Project title.
    #[serde(default)]
    pub title: String,
    /// Number of animals per frame.
    #[serde(default)]
    pub num_animals: usize,
    /// Animal (track) names.
    #[serde(default)]
    pub animals_name: Vec<String>,
    /// Path to the skeleton YAML.
    #[serde(default)]
    pub skeleton: String,
    /// Videos and their label files.
    #[serde(default)]
    pub files: Vec<FileEntry>,
}

impl ProjectConfig {
    /// Load a project file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            LabelError::IoError(format!("Failed to read project {}: {e}", path.display()))
        })?;
        Self::from_yaml_str(&text)
    }

    /// Parse a project YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`LabelError::YamlError`] if the text is not a project document.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Write the project file.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml).map_err(|e| {
            LabelError::IoError(format!("Failed to write project {}: {e}", path.display()))
        })
    }

    /// Skeleton path, resolved against the project directory when relative.
    #[must_use]
    pub fn skeleton_path(&self) -> PathBuf {
        let skeleton = PathBuf::from(&self.skeleton);
        if skeleton.is_absolute() || self.project_dir.is_empty() {
            skeleton
        } else {
            Path::new(&self.project_dir).join(skeleton)
        }
    }

    /// Store configuration for this project.
    ///
    /// # Errors
    ///
    /// Returns [`LabelError::ConfigError`] if `num_animals` is zero or fewer
    /// animal names than animals are given.
    pub fn to_store_config(&self) -> Result<StoreConfig> {
        if self.num_animals == 0 {
            return Err(LabelError::ConfigError(
                "num_animals must be at least 1".to_string(),
            ));
        }
        if self.animals_name.len() < self.num_animals {
            return Err(LabelError::ConfigError(format!(
                "{} animals but only {} names",
                self.num_animals,
                self.animals_name.len()
            )));
        }
        Ok(StoreConfig::new()
            .with_max_individuals(self.num_animals)
            .with_track_names(self.animals_name.iter().cloned()))
    }

    /// Record a label file for a video, adding the video entry if needed.
    ///
    /// Returns `false` if the file was already recorded.
    pub fn register_label_file(&mut self, video: &str, kind: LabelFileKind, path: &str) -> bool {
        let index = if let Some(i) = self.files.iter().position(|f| f.video == video) {
            i
        } else {
            self.files.push(FileEntry {
                video: video.to_string(),
                ..FileEntry::default()
            });
            self.files.len() - 1
        };
        let list = match kind {
            LabelFileKind::Csv => &mut self.files[index].csv,
            LabelFileKind::Txt => &mut self.files[index].txt,
        };
        if list.iter().any(|p| p == path) {
            return false;
        }
        list.push(path.to_string());
        true
    }

    /// Video paths in project order.
    #[must_use]
    pub fn videos(&self) -> Vec<&str> {
        self.files.iter().map(|f| f.video.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_config_defaults() {
        let config = StoreConfig::default();
        assert_eq!(config.max_individuals, 1);
        assert!(config.track_names.is_empty());
        assert_eq!(config.search_radius, 300);
        assert!(!config.abort_on_mismatch);
        assert_eq!(config.export_threads, 0);
    }

    #[test]
    fn test_store_config_builder() {
        let config = StoreConfig::new()
            .with_max_individuals(2)
            .with_track_names(["mouse1", "mouse2"])
            .with_search_radius(10)
            .with_abort_on_mismatch(true)
            .with_export_threads(4);
        assert_eq!(config.max_individuals, 2);
        assert_eq!(config.track_names, vec!["mouse1", "mouse2"]);
        assert_eq!(config.search_radius, 10);
        assert!(config.abort_on_mismatch);
        assert_eq!(config.export_threads, 4);
    }

    const PROJECT: &str = "\
project_dir: /projects/mice
title: mice
num_animals: 2
animals_name: [mouse1, mouse2]
skeleton: skeleton/mouse.yaml
files:
  - video: videos/a.mp4
    csv: [labels/csv/a.csv]
";

    #[test]
    fn test_project_parse() {
        let project = ProjectConfig::from_yaml_str(PROJECT).unwrap();
        assert_eq!(project.num_animals, 2);
        assert_eq!(project.files[0].csv, vec!["labels/csv/a.csv"]);
        assert!(project.files[0].txt.is_empty());
        assert_eq!(
            project.skeleton_path(),
            PathBuf::from("/projects/mice/skeleton/mouse.yaml")
        );
        assert_eq!(project.videos(), vec!["videos/a.mp4"]);

        let config = project.to_store_config().unwrap();
        assert_eq!(config.max_individuals, 2);
        assert_eq!(config.track_names, vec!["mouse1", "mouse2"]);
    }

    #[test]
    fn test_project_store_config_validation() {
        let mut project = ProjectConfig::from_yaml_str(PROJECT).unwrap();
        project.animals_name.pop();
        assert!(matches!(
            project.to_store_config(),
            Err(LabelError::ConfigError(_))
        ));
        project.num_animals = 0;
        assert!(project.to_store_config().is_err());
    }

    #[test]
    fn test_register_label_file() {
        let mut project = ProjectConfig::from_yaml_str(PROJECT).unwrap();
        assert!(project.register_label_file("videos/a.mp4", LabelFileKind::Txt, "labels/txt/a"));
        assert!(!project.register_label_file("videos/a.mp4", LabelFileKind::Csv, "labels/csv/a.csv"));
        assert!(project.register_label_file("videos/b.mp4", LabelFileKind::Csv, "labels/csv/b.csv"));
        assert_eq!(project.files.len(), 2);
        assert_eq!(project.files[0].txt, vec!["labels/txt/a"]);
    }

    #[test]
    fn test_project_save_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("project.yaml");
        let project = ProjectConfig::from_yaml_str(PROJECT).unwrap();
        project.save(&path).unwrap();
        assert_eq!(ProjectConfig::load(&path).unwrap(), project);
    }
}
