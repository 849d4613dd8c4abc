// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Instance lifecycle and exports.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::PoseLabelStore;
use crate::error::{LabelError, Result};
use crate::frames::{ProgressFn, export_frames};
use crate::labels::{Keypoint, LabelRow, LabelTable, OCCLUDED, VISIBLE};
use crate::normalize::pixel_table;
use crate::skeleton::SkeletonGraph;
use crate::table::RawTable;
use crate::{verbose, warn};

/// Span, in normalized units, of the larger side of a synthesized instance.
pub const INSTANCE_SPAN: f64 = 0.125;

/// Anchor used when a new instance is placed without one.
pub const DEFAULT_ANCHOR: (f64, f64) = (0.5, 0.5);

/// Placeholder for keypoints with no seed position.
const FALLBACK_KEYPOINT: Keypoint = Keypoint::new(0.5, 0.5, OCCLUDED);

impl PoseLabelStore {
    /// Add an instance of `track` in `frame_index`, searching the configured
    /// radius for a neighbour to copy.
    ///
    /// # Errors
    ///
    /// Returns [`LabelError::SkeletonNotLoaded`] before registration.
    pub fn add_instance(
        &mut self,
        frame_index: usize,
        track: &str,
        anchor: Option<(f64, f64)>,
    ) -> Result<bool> {
        let radius = self.config.search_radius;
        self.add_instance_with_radius(frame_index, track, anchor, radius)
    }

    /// Add an instance of `track` in `frame_index`.
    ///
    /// Imported track names are translated through the last accepted mapping.
    /// Keypoints are copied from the same track's nearest row within
    /// `search_radius` frames (earlier frame on ties); without one, the
    /// skeleton layout is scaled to [`INSTANCE_SPAN`] around `anchor` and
    /// clamped to the unit square.
    ///
    /// Returns `false` if no table is loaded, the track already has a row in
    /// the frame, or the frame is full.
    ///
    /// # Errors
    ///
    /// Returns [`LabelError::SkeletonNotLoaded`] before registration.
    pub fn add_instance_with_radius(
        &mut self,
        frame_index: usize,
        track: &str,
        anchor: Option<(f64, f64)>,
        search_radius: usize,
    ) -> Result<bool> {
        let skeleton = self.ensure_skeleton()?;
        let track = self.project_track_name(track).to_string();
        let Some(table) = self.table.as_ref() else {
            warn!("add_instance: no label table loaded");
            return Ok(false);
        };

        if table.rows_in_frame(frame_index).count() >= self.config.max_individuals {
            warn!("Cannot add new skeleton: maximum instances reached for frame {frame_index}");
            return Ok(false);
        }
        if table.contains(frame_index, &track) {
            verbose!("'{track}' already has an instance in frame {frame_index}");
            return Ok(false);
        }

        let seed = nearest_row(table, frame_index, &track, search_radius).map_or_else(
            || synthesize_layout(skeleton, anchor.unwrap_or(DEFAULT_ANCHOR)),
            |row| row.keypoints.clone(),
        );

        let mut row = LabelRow::new(frame_index, track);
        if table.has_instance_visibility {
            row.instance_visibility = Some(f64::from(VISIBLE));
        }
        for name in &self.keypoint_order {
            let kp = seed.get(name).copied().unwrap_or(FALLBACK_KEYPOINT);
            row.keypoints.insert(name.clone(), kp);
        }

        let Some(table) = self.table.as_mut() else {
            return Ok(false);
        };
        Ok(table.insert(row).is_ok())
    }

    /// Remove the instance of `track` in `frame_index`.
    ///
    /// Returns `false` if there was nothing to remove.
    ///
    /// # Errors
    ///
    /// Returns [`LabelError::SkeletonNotLoaded`] before registration.
    pub fn delete_instance(&mut self, frame_index: usize, track: &str) -> Result<bool> {
        self.ensure_skeleton()?;
        let removed = self
            .table
            .as_mut()
            .and_then(|t| t.remove(frame_index, track))
            .is_some();
        if removed {
            verbose!("Deleted {track} @ frame {frame_index}");
        } else {
            verbose!("Nothing to delete ({track}@{frame_index})");
        }
        Ok(removed)
    }

    /// Relabel `old_track`'s instance in `frame_index` as `new_track`, swapping
    /// the two labels if `new_track` already has an instance there.
    ///
    /// Returns `true` without changes when the names are equal, and `false` if
    /// `old_track` has no instance in the frame.
    ///
    /// # Errors
    ///
    /// Returns [`LabelError::SkeletonNotLoaded`] before registration.
    pub fn rename_or_swap_instance(
        &mut self,
        frame_index: usize,
        old_track: &str,
        new_track: &str,
    ) -> Result<bool> {
        self.ensure_skeleton()?;
        if old_track == new_track {
            return Ok(true);
        }
        let Some(table) = self.table.as_mut() else {
            return Ok(false);
        };
        let Some(mut old_row) = table.remove(frame_index, old_track) else {
            return Ok(false);
        };

        if let Some(mut new_row) = table.remove(frame_index, new_track) {
            new_row.track = old_track.to_string();
            reinsert(table, new_row)?;
        }
        old_row.track = new_track.to_string();
        reinsert(table, old_row)?;
        Ok(true)
    }

    /// Write the table as a delimited label file (`.tsv` is tab-separated).
    ///
    /// # Errors
    ///
    /// Returns [`LabelError::SkeletonNotLoaded`] before registration,
    /// [`LabelError::NotFound`] with no table loaded, or an I/O error.
    pub fn export_table<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.ensure_skeleton()?;
        let table = self.loaded_table()?;
        RawTable::from(table).write(path.as_ref())?;
        verbose!("Saved {} rows to {}", table.len(), path.as_ref().display());
        Ok(())
    }

    /// Write the table as a delimited label file in pixel coordinates of the
    /// recorded image resolution.
    ///
    /// # Errors
    ///
    /// Returns [`LabelError::SkeletonNotLoaded`] before registration,
    /// [`LabelError::NotFound`] with no table loaded,
    /// [`LabelError::ConfigError`] when no resolution is set, or an I/O error.
    pub fn export_table_pixels<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.ensure_skeleton()?;
        let table = self.loaded_table()?;
        let (width, height) = self.resolution.ok_or_else(|| {
            LabelError::ConfigError("pixel export needs an image resolution".to_string())
        })?;
        let pixels = pixel_table(table, width, height)?;
        RawTable::from(&pixels).write(path.as_ref())?;
        verbose!(
            "Saved {} rows to {} ({width}x{height} pixels)",
            pixels.len(),
            path.as_ref().display()
        );
        Ok(())
    }

    /// Write one text file per labelled frame into `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`LabelError::SkeletonNotLoaded`] before registration,
    /// [`LabelError::NotFound`] with no table loaded, or an export error.
    pub fn export_frames<P: AsRef<Path>>(
        &self,
        dir: P,
        progress: Option<ProgressFn<'_>>,
    ) -> Result<Vec<PathBuf>> {
        self.ensure_skeleton()?;
        let table = self.loaded_table()?;
        if !table.normalized {
            warn!("Exporting pixel coordinates, set the image resolution to normalize");
        }
        export_frames(table, dir.as_ref(), self.config.export_threads, progress)
    }

    fn loaded_table(&self) -> Result<&LabelTable> {
        self.table
            .as_ref()
            .ok_or_else(|| LabelError::NotFound("label table".to_string()))
    }
}

fn reinsert(table: &mut LabelTable, row: LabelRow) -> Result<()> {
    table.insert(row).map_err(|row| {
        LabelError::MalformedInput(format!(
            "row for frame {} track '{}' already exists",
            row.frame_index, row.track
        ))
    })
}

/// The row of `track` closest to `frame_index` within `radius` frames.
fn nearest_row<'a>(
    table: &'a LabelTable,
    frame_index: usize,
    track: &'a str,
    radius: usize,
) -> Option<&'a LabelRow> {
    table
        .rows_of_track(track)
        .filter(|row| row.frame_index.abs_diff(frame_index) <= radius)
        .min_by_key(|row| (row.frame_index.abs_diff(frame_index), row.frame_index))
}

/// The skeleton's node layout scaled to [`INSTANCE_SPAN`] and centred on `anchor`.
fn synthesize_layout(skeleton: &SkeletonGraph, anchor: (f64, f64)) -> BTreeMap<String, Keypoint> {
    let nodes = skeleton.nodes();
    let points: Vec<(f64, f64)> = nodes.iter().map(|n| (n.x, n.y)).collect();
    let Some([x1, y1, x2, y2]) = crate::utils::points_xyxy(&points) else {
        return BTreeMap::new();
    };

    let (cx, cy) = ((x1 + x2) / 2.0, (y1 + y2) / 2.0);
    let extent = (x2 - x1).max(y2 - y1);
    let scale = if extent > 0.0 { INSTANCE_SPAN / extent } else { 1.0 };

    nodes
        .iter()
        .map(|node| {
            let x = (node.x - cx).mul_add(scale, anchor.0).clamp(0.0, 1.0);
            let y = (node.y - cy).mul_add(scale, anchor.1).clamp(0.0, 1.0);
            (node.name.clone(), Keypoint::new(x, y, VISIBLE))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::super::tests::store as new_store;
    use super::*;
    use crate::tracks::CannedResolver;

    fn loaded(max: usize, names: &[&str]) -> PoseLabelStore {
        let mut store = new_store(max, names);
        store.create_empty().unwrap();
        store
    }

    #[test]
    fn test_add_instance_synthesizes_layout() {
        let mut store = loaded(1, &["mouse1"]);
        assert!(store.add_instance(3, "mouse1", Some((0.2, 0.3))).unwrap());

        let row = store.table().unwrap().get(3, "mouse1").unwrap();
        assert_eq!(row.instance_visibility, Some(2.0));
        // Layout spans 20 units in x and 10 in y, centred at (0, -5).
        let nose = row.keypoints["nose"];
        assert!((nose.x - 0.2).abs() < 1e-9);
        assert!((nose.y - 0.33125).abs() < 1e-9);
        let l_ear = row.keypoints["L_ear"];
        assert!((l_ear.x - 0.1375).abs() < 1e-9);
        assert!((l_ear.y - 0.26875).abs() < 1e-9);
        assert!(row.keypoints.values().all(|kp| kp.visibility == VISIBLE));
    }

    #[test]
    fn test_add_instance_clamps_to_unit_square() {
        let mut store = loaded(1, &[]);
        assert!(store.add_instance(0, "m", Some((0.0, 1.0))).unwrap());
        let row = store.table().unwrap().get(0, "m").unwrap();
        assert!(row
            .keypoints
            .values()
            .all(|kp| (0.0..=1.0).contains(&kp.x) && (0.0..=1.0).contains(&kp.y)));
        assert!(row.keypoints["L_ear"].x.abs() < 1e-9);
    }

    #[test]
    fn test_add_instance_copies_nearest_neighbour() {
        let mut store = loaded(1, &["mouse1"]);
        let table = store.table.as_mut().unwrap();
        for (frame, x) in [(10, 0.1), (14, 0.4), (6, 0.9)] {
            table
                .insert(LabelRow::new(frame, "mouse1").with_keypoint("nose", (x, x, OCCLUDED)))
                .unwrap();
        }

        assert!(store.add_instance(12, "mouse1", None).unwrap());
        let row = store.table().unwrap().get(12, "mouse1").unwrap();
        assert_eq!(row.keypoints["nose"], Keypoint::new(0.1, 0.1, OCCLUDED));
        assert_eq!(row.keypoints["L_ear"], FALLBACK_KEYPOINT);

        assert!(store.add_instance_with_radius(100, "mouse1", None, 5).unwrap());
        let far = store.table().unwrap().get(100, "mouse1").unwrap();
        assert_eq!(far.keypoints["nose"].visibility, VISIBLE);
    }

    #[test]
    fn test_add_instance_limits() {
        let mut store = loaded(1, &["mouse1", "mouse2"]);
        assert!(store.add_instance(0, "mouse1", None).unwrap());
        assert!(!store.add_instance(0, "mouse1", None).unwrap());
        assert!(!store.add_instance(0, "mouse2", None).unwrap());

        let mut empty = new_store(1, &[]);
        assert!(!empty.add_instance(0, "m", None).unwrap());
    }

    #[test]
    fn test_add_then_delete_restores_count() {
        let mut store = loaded(2, &[]);
        store.add_instance(0, "a", None).unwrap();
        let before = store.table().unwrap().len();
        assert!(store.add_instance(0, "b", None).unwrap());
        assert!(store.delete_instance(0, "b").unwrap());
        assert_eq!(store.table().unwrap().len(), before);
        assert!(!store.delete_instance(0, "b").unwrap());
    }

    #[test]
    fn test_rename_and_swap() {
        let mut store = loaded(2, &[]);
        let table = store.table.as_mut().unwrap();
        table
            .insert(LabelRow::new(0, "a").with_keypoint("nose", (0.1, 0.1, VISIBLE)))
            .unwrap();
        table
            .insert(LabelRow::new(0, "b").with_keypoint("nose", (0.9, 0.9, VISIBLE)))
            .unwrap();
        let original = store.table().unwrap().clone();

        assert!(store.rename_or_swap_instance(0, "a", "b").unwrap());
        let swapped = store.table().unwrap();
        assert!((swapped.get(0, "b").unwrap().keypoints["nose"].x - 0.1).abs() < 1e-9);
        assert!((swapped.get(0, "a").unwrap().keypoints["nose"].x - 0.9).abs() < 1e-9);

        assert!(store.rename_or_swap_instance(0, "b", "a").unwrap());
        assert_eq!(store.table().unwrap(), &original);

        assert!(store.rename_or_swap_instance(0, "a", "c").unwrap());
        assert!(store.table().unwrap().contains(0, "c"));
        assert!(!store.table().unwrap().contains(0, "a"));

        assert!(!store.rename_or_swap_instance(0, "zzz", "a").unwrap());
        assert!(store.rename_or_swap_instance(5, "q", "q").unwrap());
    }

    #[test]
    fn test_add_instance_uses_track_mapping() {
        let mut store = new_store(1, &["mouse1"]);
        let text = "track,frame.idx,nose.x,nose.y\ntrack_7,0,0.1,0.1\n";
        let raw = RawTable::parse(text, ',').unwrap();
        store
            .import_table(&raw, "t.csv", &mut CannedResolver::from_pairs([("track_7", "mouse1")]))
            .unwrap();
        assert!(store.add_instance(1, "track_7", None).unwrap());
        assert!(store.table().unwrap().contains(1, "mouse1"));
    }

    #[test]
    fn test_export_table_reimports() {
        let mut store = loaded(2, &["mouse1", "mouse2"]);
        store.add_instance(0, "mouse2", Some((0.3, 0.3))).unwrap();
        store.add_instance(0, "mouse1", Some((0.6, 0.6))).unwrap();
        store.add_instance(4, "mouse1", None).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("labels.csv");
        store.export_table(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let first = text.lines().nth(1).unwrap();
        assert!(first.starts_with("mouse1,0,"));

        let mut other = new_store(2, &["mouse1", "mouse2"]);
        other
            .import_table_file(&path, &mut CannedResolver::cancel())
            .unwrap();
        assert_eq!(other.table().unwrap().len(), 3);
        assert_eq!(
            other.table().unwrap().get(4, "mouse1").unwrap().keypoints,
            store.table().unwrap().get(4, "mouse1").unwrap().keypoints
        );
    }

    #[test]
    fn test_export_table_pixels_reimports() {
        let mut store = loaded(2, &["mouse1", "mouse2"]);
        store.add_instance(0, "mouse1", Some((0.5, 0.5))).unwrap();
        store.add_instance(3, "mouse2", Some((0.25, 0.75))).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pixels.csv");
        assert!(matches!(
            store.export_table_pixels(&path),
            Err(LabelError::ConfigError(_))
        ));

        store.set_image_resolution(640, 480).unwrap();
        store.export_table_pixels(&path).unwrap();
        let mut other = new_store(2, &["mouse1", "mouse2"]);
        other.set_image_resolution(640, 480).unwrap();
        let summary = other
            .import_table_file(&path, &mut CannedResolver::cancel())
            .unwrap();
        assert!(summary.pixel_space);
        for frame in [0, 3] {
            let ours = store.keypoint_coordinates(frame).unwrap();
            let theirs = other.keypoint_coordinates(frame).unwrap();
            for (track, keypoints) in &ours {
                for (name, (x, y, v)) in keypoints {
                    let (x2, y2, v2) = theirs[track][name];
                    assert!((x - x2).abs() < 1e-9);
                    assert!((y - y2).abs() < 1e-9);
                    assert_eq!(*v, v2);
                }
            }
        }
    }

    #[test]
    fn test_export_frames() {
        let mut store = loaded(1, &[]);
        store.add_instance(7, "track_0", None).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let written = store.export_frames(dir.path(), None).unwrap();
        assert_eq!(written.len(), 1);
        assert!(written[0].ends_with("07.txt"));

        let empty = new_store(1, &[]);
        assert!(matches!(
            empty.export_frames(dir.path(), None),
            Err(LabelError::NotFound(_))
        ));
    }
}
