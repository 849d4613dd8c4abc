// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Training configuration derived from a skeleton.
//!
//! The pose-training tool needs the keypoint count, the keypoint shape
//! (`[nkpt, 3]` for x, y, visibility), the horizontal-flip permutation and the
//! keypoint names. [`DatasetConfig`] wraps these together with the dataset
//! split directories and class names into the dataset YAML the tool reads.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{LabelError, Result};
use crate::skeleton::SkeletonGraph;

/// Values per keypoint in a pose label line (x, y, visibility).
pub const KPT_DIMS: usize = 3;

/// Keypoint configuration for pose training.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Number of keypoints.
    pub nkpt: usize,
    /// Keypoint shape `[nkpt, 3]`.
    pub kpt_shape: [usize; 2],
    /// Keypoint permutation applied on horizontal flips.
    pub flip_idx: Vec<usize>,
    /// Keypoint names in skeleton order.
    pub kpt_names: Vec<String>,
}

impl TrainingConfig {
    /// Derive the training configuration from a skeleton graph.
    #[must_use]
    pub fn from_skeleton(skeleton: &SkeletonGraph) -> Self {
        let (nkpt, flip_idx, kpt_names) = skeleton.training_metadata();
        Self {
            nkpt,
            kpt_shape: [nkpt, KPT_DIMS],
            flip_idx,
            kpt_names,
        }
    }

    /// Reorder per-keypoint values the way a horizontal flip does.
    ///
    /// Entry `i` of the result is entry `flip_idx[i]` of the input. Returns
    /// `None` if the slice length differs from `nkpt`.
    #[must_use]
    pub fn flip_keypoints<T: Clone>(&self, keypoints: &[T]) -> Option<Vec<T>> {
        if keypoints.len() != self.nkpt {
            return None;
        }
        Some(
            self.flip_idx
                .iter()
                .map(|&src| keypoints[src].clone())
                .collect(),
        )
    }
}

/// Dataset YAML consumed by the pose-training tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Training images directory.
    pub train: String,
    /// Validation images directory.
    pub val: String,
    /// Test images directory.
    pub test: String,
    /// Number of classes.
    pub nc: usize,
    /// Class ID to class name mapping.
    pub names: BTreeMap<usize, String>,
    /// Number of keypoints.
    pub nkpt: usize,
    /// Keypoint shape `[nkpt, 3]`.
    pub kpt_shape: [usize; 2],
    /// Keypoint permutation applied on horizontal flips.
    pub flip_idx: Vec<usize>,
    /// Keypoint names in skeleton order.
    pub kpt_names: Vec<String>,
}

impl DatasetConfig {
    /// Build a dataset config for a split dataset rooted at `root`.
    ///
    /// Split directories follow the `train/images`, `valid/images`,
    /// `test/images` layout.
    ///
    /// # Errors
    ///
    /// Returns [`LabelError::ConfigError`] if no class names are given or the
    /// skeleton has no nodes.
    pub fn new<P: AsRef<Path>>(
        root: P,
        class_names: &[String],
        skeleton: &SkeletonGraph,
    ) -> Result<Self> {
        if class_names.is_empty() {
            return Err(LabelError::ConfigError(
                "at least one class name is required".to_string(),
            ));
        }
        if skeleton.is_empty() {
            return Err(LabelError::ConfigError(
                "skeleton has no keypoints".to_string(),
            ));
        }

        let root = root.as_ref().to_string_lossy().replace('\\', "/");
        let root = root.trim_end_matches('/');
        let keypoints = TrainingConfig::from_skeleton(skeleton);
        Ok(Self {
            train: format!("{root}/train/images"),
            val: format!("{root}/valid/images"),
            test: format!("{root}/test/images"),
            nc: class_names.len(),
            names: class_names.iter().cloned().enumerate().collect(),
            nkpt: keypoints.nkpt,
            kpt_shape: keypoints.kpt_shape,
            flip_idx: keypoints.flip_idx,
            kpt_names: keypoints.kpt_names,
        })
    }

    /// The keypoint part of this dataset config.
    #[must_use]
    pub fn keypoints(&self) -> TrainingConfig {
        TrainingConfig {
            nkpt: self.nkpt,
            kpt_shape: self.kpt_shape,
            flip_idx: self.flip_idx.clone(),
            kpt_names: self.kpt_names.clone(),
        }
    }

    /// Parse a dataset YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`LabelError::YamlError`] if the text is not a dataset document.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Serialize as YAML.
    ///
    /// # Errors
    ///
    /// Returns [`LabelError::YamlError`] if serialization fails.
    pub fn to_yaml_string(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Write the dataset YAML to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_yaml_string()?).map_err(|e| {
            LabelError::IoError(format!("Failed to write {}: {e}", path.display()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skeleton::Node;

    fn ears() -> SkeletonGraph {
        let mut graph = SkeletonGraph::new();
        for name in ["nose", "L_ear", "R_ear"] {
            graph.insert_node(Node::new(name, 0.0, 0.0)).unwrap();
        }
        graph.add_symmetry("L_ear", "R_ear");
        graph
    }

    #[test]
    fn test_from_skeleton() {
        let config = TrainingConfig::from_skeleton(&ears());
        assert_eq!(config.nkpt, 3);
        assert_eq!(config.kpt_shape, [3, 3]);
        assert_eq!(config.flip_idx, vec![0, 2, 1]);
        assert_eq!(config.kpt_names, vec!["nose", "L_ear", "R_ear"]);
    }

    #[test]
    fn test_flip_keypoints() {
        let config = TrainingConfig::from_skeleton(&ears());
        let flipped = config.flip_keypoints(&["n", "l", "r"]).unwrap();
        assert_eq!(flipped, vec!["n", "r", "l"]);
        assert!(config.flip_keypoints(&["n"]).is_none());
    }

    #[test]
    fn test_dataset_yaml() {
        let dataset =
            DatasetConfig::new("/data/split/", &["mouse1".into(), "mouse2".into()], &ears())
                .unwrap();
        assert_eq!(dataset.train, "/data/split/train/images");
        assert_eq!(dataset.val, "/data/split/valid/images");
        assert_eq!(dataset.nc, 2);

        let yaml = dataset.to_yaml_string().unwrap();
        assert!(yaml.contains("nkpt: 3"));
        assert!(yaml.contains("flip_idx:"));

        let parsed = DatasetConfig::from_yaml_str(&yaml).unwrap();
        assert_eq!(parsed, dataset);
        assert_eq!(parsed.keypoints(), TrainingConfig::from_skeleton(&ears()));
    }

    #[test]
    fn test_dataset_requires_classes() {
        assert!(matches!(
            DatasetConfig::new("/data", &[], &ears()),
            Err(LabelError::ConfigError(_))
        ));
    }
}
