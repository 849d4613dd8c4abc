// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Typed label rows and the label table.
//!
//! A [`LabelRow`] is one instance: one track observed in one frame, with an
//! `(x, y, visibility)` triple per keypoint. A [`LabelTable`] keys rows by
//! `(frame_index, track)` and therefore cannot hold two rows with the same key.

use std::collections::{BTreeMap, BTreeSet};

use crate::utils::track_number;

/// Keypoint is visible.
pub const VISIBLE: u8 = 2;
/// Keypoint is occluded or low confidence.
pub const OCCLUDED: u8 = 1;

/// Composite key of a label row: `(frame_index, track)`.
pub type RowKey = (usize, String);

/// One keypoint observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    /// Horizontal coordinate (pixels before normalization, `[0, 1]` after).
    pub x: f64,
    /// Vertical coordinate.
    pub y: f64,
    /// Visibility flag: [`VISIBLE`], [`OCCLUDED`], or `0` (treated as occluded).
    pub visibility: u8,
}

impl Keypoint {
    /// Create a keypoint.
    #[must_use]
    pub const fn new(x: f64, y: f64, visibility: u8) -> Self {
        Self { x, y, visibility }
    }

    /// The `(x, y, visibility)` triple.
    #[must_use]
    pub const fn as_tuple(&self) -> (f64, f64, u8) {
        (self.x, self.y, self.visibility)
    }
}

impl From<(f64, f64, u8)> for Keypoint {
    fn from((x, y, visibility): (f64, f64, u8)) -> Self {
        Self { x, y, visibility }
    }
}

/// One tracked individual in one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelRow {
    /// Frame index (0-based).
    pub frame_index: usize,
    /// Track name.
    pub track: String,
    /// Optional whole-instance visibility.
    pub instance_visibility: Option<f64>,
    /// Keypoint observations by keypoint name.
    pub keypoints: BTreeMap<String, Keypoint>,
}

impl LabelRow {
    /// Create a row without keypoints.
    #[must_use]
    pub fn new(frame_index: usize, track: impl Into<String>) -> Self {
        Self {
            frame_index,
            track: track.into(),
            instance_visibility: None,
            keypoints: BTreeMap::new(),
        }
    }

    /// Add a keypoint, builder style.
    #[must_use]
    pub fn with_keypoint(mut self, name: impl Into<String>, keypoint: impl Into<Keypoint>) -> Self {
        self.keypoints.insert(name.into(), keypoint.into());
        self
    }

    /// The key of this row.
    #[must_use]
    pub fn key(&self) -> RowKey {
        (self.frame_index, self.track.clone())
    }

    /// Keypoint positions in `order`, skipping keypoints the row lacks.
    #[must_use]
    pub fn points(&self, order: &[String]) -> Vec<(f64, f64)> {
        order
            .iter()
            .filter_map(|name| self.keypoints.get(name))
            .map(|kp| (kp.x, kp.y))
            .collect()
    }
}

/// Table of label rows plus the schema they were loaded with.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelTable {
    rows: BTreeMap<RowKey, LabelRow>,
    /// Keypoint names in column order.
    pub keypoint_order: Vec<String>,
    /// Whether the table carries an `instance.visibility` column.
    pub has_instance_visibility: bool,
    /// Whether coordinates are in the unit square.
    pub normalized: bool,
    /// Where the table came from (file path or a description).
    pub origin: Option<String>,
}

impl LabelTable {
    /// Create an empty table with the given keypoint schema.
    #[must_use]
    pub fn new(keypoint_order: Vec<String>) -> Self {
        Self {
            rows: BTreeMap::new(),
            keypoint_order,
            has_instance_visibility: false,
            normalized: true,
            origin: None,
        }
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows ordered by `(frame_index, track)`.
    pub fn rows(&self) -> impl Iterator<Item = &LabelRow> {
        self.rows.values()
    }

    pub(crate) fn rows_mut(&mut self) -> impl Iterator<Item = &mut LabelRow> {
        self.rows.values_mut()
    }

    /// Look up a row.
    #[must_use]
    pub fn get(&self, frame_index: usize, track: &str) -> Option<&LabelRow> {
        self.rows.get(&(frame_index, track.to_string()))
    }

    pub(crate) fn get_mut(&mut self, frame_index: usize, track: &str) -> Option<&mut LabelRow> {
        self.rows.get_mut(&(frame_index, track.to_string()))
    }

    /// Whether a row exists for the key.
    #[must_use]
    pub fn contains(&self, frame_index: usize, track: &str) -> bool {
        self.get(frame_index, track).is_some()
    }

    /// Insert a row, returning it back if its key is already taken.
    ///
    /// # Errors
    ///
    /// Returns the rejected row when a row with the same key exists.
    pub fn insert(&mut self, row: LabelRow) -> std::result::Result<(), LabelRow> {
        let key = row.key();
        if self.rows.contains_key(&key) {
            return Err(row);
        }
        self.rows.insert(key, row);
        Ok(())
    }

    /// Remove and return a row.
    pub fn remove(&mut self, frame_index: usize, track: &str) -> Option<LabelRow> {
        self.rows.remove(&(frame_index, track.to_string()))
    }

    /// Rows of one frame.
    pub fn rows_in_frame(&self, frame_index: usize) -> impl Iterator<Item = &LabelRow> {
        self.rows
            .range((frame_index, String::new())..)
            .take_while(move |((f, _), _)| *f == frame_index)
            .map(|(_, row)| row)
    }

    /// Rows of one track.
    pub fn rows_of_track<'a>(&'a self, track: &'a str) -> impl Iterator<Item = &'a LabelRow> {
        self.rows.values().filter(move |row| row.track == track)
    }

    /// Distinct frame indices, ascending.
    #[must_use]
    pub fn frames(&self) -> BTreeSet<usize> {
        self.rows.keys().map(|(f, _)| *f).collect()
    }

    /// Distinct track names.
    #[must_use]
    pub fn tracks(&self) -> BTreeSet<String> {
        self.rows.values().map(|row| row.track.clone()).collect()
    }

    /// The row with the smallest frame index (ties broken by track name).
    #[must_use]
    pub fn first_row(&self) -> Option<&LabelRow> {
        self.rows.values().next()
    }

    /// Rows sorted by frame, then by the numeric suffix of the track name,
    /// then by track name.
    #[must_use]
    pub fn rows_in_export_order(&self) -> Vec<&LabelRow> {
        let mut rows: Vec<&LabelRow> = self.rows.values().collect();
        rows.sort_by(|a, b| {
            a.frame_index
                .cmp(&b.frame_index)
                .then_with(|| track_number(&a.track).cmp(&track_number(&b.track)))
                .then_with(|| a.track.cmp(&b.track))
        });
        rows
    }
}
