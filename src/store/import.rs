// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Bulk imports into the label store.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use super::PoseLabelStore;
use crate::error::{LabelError, Result};
use crate::frames::{collect_frame_files, generated_keypoint_names, parse_frame_file};
use crate::labels::{LabelRow, LabelTable};
use crate::normalize::{needs_normalization, normalize_table};
use crate::table::{ColumnLayout, RawTable};
use crate::tracks::{TrackMapping, TrackNameResolver, resolve_track_names};
use crate::utils::pluralize;
use crate::{skipped, verbose, warn};

/// Outcome of a successful import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSummary {
    /// Rows in the new table.
    pub rows: usize,
    /// Distinct tracks in the new table.
    pub tracks: usize,
    /// Rows or files skipped as malformed.
    pub skipped: usize,
    /// Whether the data was detected as pixel-space.
    pub pixel_space: bool,
    /// Whether the keypoints differ from the skeleton.
    pub skeleton_mismatch: bool,
}

/// Rows and schema gathered from one source, before validation.
struct Staged {
    rows: Vec<LabelRow>,
    keypoint_order: Vec<String>,
    has_instance_visibility: bool,
    origin: String,
    skipped: usize,
}

impl PoseLabelStore {
    /// Import a parsed label table.
    ///
    /// Malformed rows are skipped with a warning. Track names are resolved
    /// against the project names through `resolver`.
    ///
    /// # Errors
    ///
    /// Returns [`LabelError::SkeletonNotLoaded`] before registration,
    /// [`LabelError::MalformedInput`] for an unusable header or duplicate
    /// `(frame, track)` rows, and the structural errors of the import pipeline.
    /// On error the current table is left unchanged.
    pub fn import_table(
        &mut self,
        raw: &RawTable,
        origin: &str,
        resolver: &mut dyn TrackNameResolver,
    ) -> Result<ImportSummary> {
        self.ensure_skeleton()?;
        let layout = ColumnLayout::from_header(&raw.header)?;

        let mut rows = Vec::with_capacity(raw.records.len());
        let mut skipped = 0;
        for (i, record) in raw.records.iter().enumerate() {
            match layout.parse_record(record) {
                Ok(row) => rows.push(row),
                Err(e) => {
                    skipped!(format!("{origin} row {}", i + 1), "{e}");
                    skipped += 1;
                }
            }
        }

        self.commit(
            Staged {
                rows,
                keypoint_order: layout.keypoint_names(),
                has_instance_visibility: layout.instance_visibility.is_some(),
                origin: origin.to_string(),
                skipped,
            },
            resolver,
        )
    }

    /// Read and import a label table file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, plus everything
    /// [`Self::import_table`] returns.
    pub fn import_table_file<P: AsRef<Path>>(
        &mut self,
        path: P,
        resolver: &mut dyn TrackNameResolver,
    ) -> Result<ImportSummary> {
        self.ensure_skeleton()?;
        let path = path.as_ref();
        let raw = RawTable::read(path)?;
        self.import_table(&raw, &path.display().to_string(), resolver)
    }

    /// Import per-frame text files, each paired with its frame index.
    ///
    /// Unreadable or malformed files are skipped with a warning. When `cancel`
    /// is set between files the import stops.
    ///
    /// # Errors
    ///
    /// Returns [`LabelError::Cancelled`] if cancelled,
    /// [`LabelError::MalformedInput`] if no file could be read, and the
    /// structural errors of the import pipeline. On error the current table is
    /// left unchanged.
    pub fn import_per_frame_files(
        &mut self,
        files: &[(PathBuf, usize)],
        resolver: &mut dyn TrackNameResolver,
        cancel: Option<&AtomicBool>,
    ) -> Result<ImportSummary> {
        self.ensure_skeleton()?;
        let mut keypoint_order = self.keypoint_order.clone();

        let mut rows = Vec::new();
        let mut skipped = 0;
        for (path, frame) in files {
            if cancel.is_some_and(|c| c.load(Ordering::Relaxed)) {
                warn!("Import cancelled, keeping the current labels");
                return Err(LabelError::Cancelled);
            }
            match parse_frame_file(path, *frame, &keypoint_order) {
                Ok(frame_rows) => {
                    // Without a skeleton the first file fixes the keypoint count.
                    if keypoint_order.is_empty()
                        && let Some(first) = frame_rows.first()
                    {
                        keypoint_order = generated_keypoint_names(first.keypoints.len());
                    }
                    rows.extend(frame_rows);
                }
                Err(e) => {
                    skipped!(format!("'{}'", path.display()), "{e}");
                    skipped += 1;
                }
            }
        }

        if skipped == files.len() {
            return Err(LabelError::MalformedInput(
                "no readable frame file".to_string(),
            ));
        }

        let origin = files
            .first()
            .and_then(|(p, _)| p.parent())
            .map_or_else(|| "<frames>".to_string(), |p| p.display().to_string());
        self.commit(
            Staged {
                rows,
                keypoint_order,
                has_instance_visibility: false,
                origin,
                skipped,
            },
            resolver,
        )
    }

    /// Discover and import the per-frame text files of a directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory has no frame files, plus everything
    /// [`Self::import_per_frame_files`] returns.
    pub fn import_per_frame_dir<P: AsRef<Path>>(
        &mut self,
        dir: P,
        resolver: &mut dyn TrackNameResolver,
        cancel: Option<&AtomicBool>,
    ) -> Result<ImportSummary> {
        self.ensure_skeleton()?;
        let files = collect_frame_files(dir)?;
        self.import_per_frame_files(&files, resolver, cancel)
    }

    /// Validate staged rows and swap them in as the new table.
    fn commit(
        &mut self,
        staged: Staged,
        resolver: &mut dyn TrackNameResolver,
    ) -> Result<ImportSummary> {
        let skeleton_mismatch = self.check_compat(&staged.keypoint_order)?;

        let observed: Vec<String> = staged
            .rows
            .iter()
            .map(|r| r.track.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let max = self.config.max_individuals;
        if observed.len() > max {
            return Err(LabelError::TrackCountExceeded {
                found: observed.len(),
                max,
            });
        }

        let mapping = self.resolve(&observed, resolver)?;

        let mut table = LabelTable::new(staged.keypoint_order);
        table.has_instance_visibility = staged.has_instance_visibility;
        table.origin = Some(staged.origin.clone());
        for mut row in staged.rows {
            if let Some(name) = mapping.get(&row.track) {
                row.track.clone_from(name);
            }
            if let Err(dup) = table.insert(row) {
                return Err(LabelError::MalformedInput(format!(
                    "duplicate row for frame {} track '{}'",
                    dup.frame_index, dup.track
                )));
            }
        }

        let pixel_space = table.first_row().is_some_and(needs_normalization);
        if pixel_space {
            table.normalized = false;
            match self.resolution {
                Some((w, h)) => {
                    normalize_table(&mut table, w, h)?;
                    verbose!("Normalized pixel coordinates with {w}x{h}");
                }
                None => warn!("No image resolution yet, coordinates stay in pixels"),
            }
        }

        let summary = ImportSummary {
            rows: table.len(),
            tracks: observed.len(),
            skipped: staged.skipped,
            pixel_space,
            skeleton_mismatch,
        };
        self.keypoint_order.clone_from(&table.keypoint_order);
        self.track_mapping = mapping;
        self.table = Some(table);

        verbose!(
            "Loaded {} ({}, {})",
            staged.origin,
            pluralize(summary.rows, "row"),
            pluralize(summary.tracks, "track")
        );
        Ok(summary)
    }

    /// Compare imported keypoints with the skeleton. Returns whether they differ.
    fn check_compat(&self, found: &[String]) -> Result<bool> {
        let skeleton = self.ensure_skeleton()?;
        if skeleton.is_empty() {
            return Ok(false);
        }
        let expected = skeleton.node_names();
        if expected == found {
            return Ok(false);
        }
        let err = LabelError::SkeletonMismatch {
            expected,
            found: found.to_vec(),
        };
        if self.config.abort_on_mismatch {
            return Err(err);
        }
        warn!("{err}");
        Ok(true)
    }

    /// Map observed track names onto the project names.
    fn resolve(
        &self,
        observed: &[String],
        resolver: &mut dyn TrackNameResolver,
    ) -> Result<TrackMapping> {
        if self.config.track_names.is_empty() {
            return Ok(TrackMapping::new());
        }
        resolve_track_names(observed, &self.config.track_names, resolver)
            .ok_or(LabelError::TrackNameUnresolved)
    }
}
