// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! The pose label store.
//!
//! A [`PoseLabelStore`] owns the label table of one session. It is bound to a
//! skeleton once; every other operation fails with
//! [`LabelError::SkeletonNotLoaded`] until then. Imports build a new table and
//! only replace the current one when the whole import succeeds.

mod import;
mod instances;

use std::collections::BTreeMap;

pub use import::ImportSummary;

use crate::config::StoreConfig;
use crate::error::{LabelError, Result};
use crate::labels::LabelTable;
use crate::normalize::normalize_table;
use crate::skeleton::SkeletonGraph;
use crate::tracks::TrackMapping;
use crate::{verbose, warn};

/// Keypoint name to `(x, y, visibility)`.
pub type KeypointCoordinates = BTreeMap<String, (f64, f64, u8)>;

/// Track name to the keypoints of that track in one frame.
pub type FrameCoordinates = BTreeMap<String, KeypointCoordinates>;

/// Annotation table of one session plus the schema it is validated against.
#[derive(Debug, Clone, Default)]
pub struct PoseLabelStore {
    config: StoreConfig,
    skeleton: Option<SkeletonGraph>,
    keypoint_order: Vec<String>,
    resolution: Option<(u32, u32)>,
    table: Option<LabelTable>,
    track_mapping: TrackMapping,
}

impl PoseLabelStore {
    /// Create a store with the given configuration and no skeleton.
    #[must_use]
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Store configuration.
    #[must_use]
    pub const fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Bind the store to a skeleton.
    ///
    /// Only the first call has an effect; returns `false` for later calls.
    pub fn register_skeleton(&mut self, skeleton: SkeletonGraph) -> bool {
        if self.skeleton.is_some() {
            verbose!("Skeleton already registered, ignoring");
            return false;
        }
        self.keypoint_order = skeleton.node_names();
        self.skeleton = Some(skeleton);
        true
    }

    /// Whether a skeleton has been registered.
    #[must_use]
    pub const fn is_registered(&self) -> bool {
        self.skeleton.is_some()
    }

    /// The registered skeleton.
    #[must_use]
    pub const fn skeleton(&self) -> Option<&SkeletonGraph> {
        self.skeleton.as_ref()
    }

    pub(crate) fn ensure_skeleton(&self) -> Result<&SkeletonGraph> {
        self.skeleton.as_ref().ok_or(LabelError::SkeletonNotLoaded)
    }

    /// Keypoint names of the current data, in column order.
    #[must_use]
    pub fn keypoint_order(&self) -> &[String] {
        &self.keypoint_order
    }

    /// The current label table, if one is loaded.
    #[must_use]
    pub const fn table(&self) -> Option<&LabelTable> {
        self.table.as_ref()
    }

    /// Image resolution used for normalization, if known.
    #[must_use]
    pub const fn resolution(&self) -> Option<(u32, u32)> {
        self.resolution
    }

    /// Whether the loaded coordinates are in the unit square.
    ///
    /// `true` when no table is loaded.
    #[must_use]
    pub fn is_normalized(&self) -> bool {
        self.table.as_ref().is_none_or(|t| t.normalized)
    }

    /// The last accepted mapping from imported to project track names.
    #[must_use]
    pub const fn track_mapping(&self) -> &TrackMapping {
        &self.track_mapping
    }

    /// Project track name for a possibly imported track name.
    #[must_use]
    pub fn project_track_name<'a>(&'a self, track: &'a str) -> &'a str {
        self.track_mapping.get(track).map_or(track, String::as_str)
    }

    /// Project track names followed by any other track present in the table.
    #[must_use]
    pub fn known_tracks(&self) -> Vec<String> {
        let mut tracks = self.config.track_names.clone();
        if let Some(table) = &self.table {
            for track in table.tracks() {
                if !tracks.contains(&track) {
                    tracks.push(track);
                }
            }
        }
        tracks
    }

    /// Replace the table with an empty one using the current keypoint order.
    ///
    /// # Errors
    ///
    /// Returns [`LabelError::SkeletonNotLoaded`] before registration.
    pub fn create_empty(&mut self) -> Result<()> {
        self.ensure_skeleton()?;
        let mut table = LabelTable::new(self.keypoint_order.clone());
        table.has_instance_visibility = true;
        table.origin = None;
        self.table = Some(table);
        self.track_mapping.clear();
        Ok(())
    }

    /// Record the image resolution, normalizing the table if it is still in pixels.
    ///
    /// Returns `true` if coordinates were rescaled.
    ///
    /// # Errors
    ///
    /// Returns [`LabelError::SkeletonNotLoaded`] before registration or
    /// [`LabelError::ConfigError`] for a zero dimension.
    pub fn set_image_resolution(&mut self, width: u32, height: u32) -> Result<bool> {
        self.ensure_skeleton()?;
        if width == 0 || height == 0 {
            return Err(LabelError::ConfigError(format!(
                "invalid image resolution {width}x{height}"
            )));
        }
        self.resolution = Some((width, height));
        match self.table.as_mut() {
            Some(table) => {
                let rescaled = normalize_table(table, width, height)?;
                if rescaled {
                    verbose!("Normalized label coordinates to {width}x{height}");
                }
                Ok(rescaled)
            }
            None => Ok(false),
        }
    }

    /// Keypoints of every known track in one frame.
    ///
    /// Tracks without a row in the frame map to an empty entry; an unknown
    /// frame yields only empty entries.
    ///
    /// # Errors
    ///
    /// Returns [`LabelError::SkeletonNotLoaded`] before registration.
    pub fn keypoint_coordinates(&self, frame_index: usize) -> Result<FrameCoordinates> {
        self.ensure_skeleton()?;
        let mut coords: FrameCoordinates = self
            .known_tracks()
            .into_iter()
            .map(|t| (t, KeypointCoordinates::new()))
            .collect();

        if let Some(table) = &self.table {
            for row in table.rows_in_frame(frame_index) {
                let entry = coords.entry(row.track.clone()).or_default();
                for name in &self.keypoint_order {
                    if let Some(kp) = row.keypoints.get(name) {
                        entry.insert(name.clone(), kp.as_tuple());
                    }
                }
            }
        }
        Ok(coords)
    }

    /// Move one keypoint of one instance.
    ///
    /// Returns `false`, with a warning, if the row or keypoint does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`LabelError::SkeletonNotLoaded`] before registration.
    pub fn update_point(
        &mut self,
        track: &str,
        frame_index: usize,
        keypoint: &str,
        x: f64,
        y: f64,
    ) -> Result<bool> {
        self.ensure_skeleton()?;
        let known = self.keypoint_order.iter().any(|k| k == keypoint);
        let Some(row) = self.table.as_mut().and_then(|t| t.get_mut(frame_index, track)) else {
            warn!("update_point: no row for track={track}, frame={frame_index}");
            return Ok(false);
        };
        match row.keypoints.get_mut(keypoint) {
            Some(kp) => {
                kp.x = x;
                kp.y = y;
            }
            None if known => {
                row.keypoints
                    .insert(keypoint.to_string(), (x, y, crate::labels::VISIBLE).into());
            }
            None => {
                warn!("update_point: keypoint '{keypoint}' not found");
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Set the visibility of one keypoint of one instance.
    ///
    /// Returns `false`, with a warning, if the row or keypoint does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`LabelError::SkeletonNotLoaded`] before registration.
    pub fn update_visibility(
        &mut self,
        track: &str,
        frame_index: usize,
        keypoint: &str,
        visibility: u8,
    ) -> Result<bool> {
        self.ensure_skeleton()?;
        let Some(row) = self.table.as_mut().and_then(|t| t.get_mut(frame_index, track)) else {
            warn!("update_visibility: no row for track={track}, frame={frame_index}");
            return Ok(false);
        };
        let Some(kp) = row.keypoints.get_mut(keypoint) else {
            warn!("update_visibility: keypoint '{keypoint}' not found");
            return Ok(false);
        };
        kp.visibility = visibility;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::{LabelRow, OCCLUDED, VISIBLE};
    use crate::skeleton::Node;
    use crate::tracks::CannedResolver;

    pub(super) fn skeleton() -> SkeletonGraph {
        let mut graph = SkeletonGraph::new();
        for (name, x, y) in [("nose", 0.0, 0.0), ("L_ear", -10.0, -10.0), ("R_ear", 10.0, -10.0)] {
            graph.insert_node(Node::new(name, x, y)).unwrap();
        }
        graph.add_edge("nose", "L_ear");
        graph.add_edge("nose", "R_ear");
        graph.add_symmetry("L_ear", "R_ear");
        graph
    }

    pub(super) fn store(max: usize, names: &[&str]) -> PoseLabelStore {
        let mut store = PoseLabelStore::new(
            StoreConfig::new()
                .with_max_individuals(max)
                .with_track_names(names.iter().copied()),
        );
        store.register_skeleton(skeleton());
        store
    }

    #[test]
    fn test_operations_require_skeleton() {
        let mut store = PoseLabelStore::new(StoreConfig::default());
        assert!(matches!(store.create_empty(), Err(LabelError::SkeletonNotLoaded)));
        assert!(matches!(
            store.set_image_resolution(10, 10),
            Err(LabelError::SkeletonNotLoaded)
        ));
        assert!(matches!(
            store.keypoint_coordinates(0),
            Err(LabelError::SkeletonNotLoaded)
        ));
        assert!(matches!(
            store.update_point("a", 0, "nose", 0.1, 0.1),
            Err(LabelError::SkeletonNotLoaded)
        ));
        assert!(matches!(
            store.update_visibility("a", 0, "nose", 1),
            Err(LabelError::SkeletonNotLoaded)
        ));
        assert!(matches!(
            store.add_instance(0, "a", None),
            Err(LabelError::SkeletonNotLoaded)
        ));
        assert!(matches!(
            store.delete_instance(0, "a"),
            Err(LabelError::SkeletonNotLoaded)
        ));
        assert!(matches!(
            store.rename_or_swap_instance(0, "a", "b"),
            Err(LabelError::SkeletonNotLoaded)
        ));

        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            store.export_table(dir.path().join("labels.csv")),
            Err(LabelError::SkeletonNotLoaded)
        ));
        assert!(matches!(
            store.export_table_pixels(dir.path().join("pixels.csv")),
            Err(LabelError::SkeletonNotLoaded)
        ));
        assert!(matches!(
            store.export_frames(dir.path(), None),
            Err(LabelError::SkeletonNotLoaded)
        ));

        let mut resolver = CannedResolver::cancel();
        let files = [(dir.path().join("0.txt"), 0)];
        assert!(matches!(
            store.import_per_frame_files(&files, &mut resolver, None),
            Err(LabelError::SkeletonNotLoaded)
        ));
        assert!(matches!(
            store.import_per_frame_dir(dir.path(), &mut resolver, None),
            Err(LabelError::SkeletonNotLoaded)
        ));
        assert!(matches!(
            store.import_table_file(dir.path().join("labels.csv"), &mut resolver),
            Err(LabelError::SkeletonNotLoaded)
        ));
        assert!(store.table().is_none());
    }

    #[test]
    fn test_register_skeleton_is_idempotent() {
        let mut store = PoseLabelStore::new(StoreConfig::default());
        assert!(store.register_skeleton(skeleton()));
        assert!(!store.register_skeleton(SkeletonGraph::new()));
        assert_eq!(store.keypoint_order(), ["nose", "L_ear", "R_ear"]);
        assert_eq!(store.skeleton().unwrap().len(), 3);
    }

    #[test]
    fn test_create_empty() {
        let mut store = store(1, &["mouse1"]);
        store.create_empty().unwrap();
        let table = store.table().unwrap();
        assert!(table.is_empty());
        assert!(table.normalized);
        assert_eq!(table.keypoint_order, vec!["nose", "L_ear", "R_ear"]);
        assert!(store.is_normalized());
    }

    #[test]
    fn test_keypoint_coordinates_lists_every_track() {
        let mut store = store(2, &["mouse1", "mouse2"]);
        store.create_empty().unwrap();
        store
            .table
            .as_mut()
            .unwrap()
            .insert(LabelRow::new(4, "mouse1").with_keypoint("nose", (0.1, 0.2, VISIBLE)))
            .unwrap();

        let coords = store.keypoint_coordinates(4).unwrap();
        assert_eq!(coords.len(), 2);
        assert_eq!(coords["mouse1"]["nose"], (0.1, 0.2, VISIBLE));
        assert!(coords["mouse2"].is_empty());

        let missing = store.keypoint_coordinates(99).unwrap();
        assert!(missing.values().all(BTreeMap::is_empty));
    }

    #[test]
    fn test_update_point_and_visibility() {
        let mut store = store(1, &["mouse1"]);
        store.create_empty().unwrap();
        store
            .table
            .as_mut()
            .unwrap()
            .insert(LabelRow::new(0, "mouse1").with_keypoint("nose", (0.1, 0.2, VISIBLE)))
            .unwrap();

        assert!(store.update_point("mouse1", 0, "nose", 0.3, 0.4).unwrap());
        assert!(store.update_visibility("mouse1", 0, "nose", OCCLUDED).unwrap());
        let kp = store.table().unwrap().get(0, "mouse1").unwrap().keypoints["nose"];
        assert_eq!(kp.as_tuple(), (0.3, 0.4, OCCLUDED));

        assert!(!store.update_point("mouse1", 1, "nose", 0.3, 0.4).unwrap());
        assert!(!store.update_point("mouse1", 0, "paw", 0.3, 0.4).unwrap());
        assert!(!store.update_visibility("mouse1", 0, "L_ear", 1).unwrap());
        assert!(store.update_point("mouse1", 0, "L_ear", 0.5, 0.6).unwrap());
    }

    #[test]
    fn test_set_image_resolution_validates() {
        let mut store = store(1, &[]);
        assert!(matches!(
            store.set_image_resolution(0, 10),
            Err(LabelError::ConfigError(_))
        ));
        assert!(!store.set_image_resolution(640, 480).unwrap());
        assert_eq!(store.resolution(), Some((640, 480)));
    }
}
