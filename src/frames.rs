// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Per-frame label text files.
//!
//! Each file holds one frame, one whitespace-separated line per individual:
//!
//! ```text
//! track_id bbox_x bbox_y bbox_w bbox_h (kp_x kp_y kp_visibility)*
//! ```
//!
//! On import the bounding box is discarded and track ids become `track_{id}`.
//! On export the bounding box is recomputed from the keypoints.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;

use crate::error::{LabelError, Result};
use crate::labels::{Keypoint, LabelRow, LabelTable, OCCLUDED, VISIBLE};
use crate::utils::{frame_index_from_path, points_xyxy, track_number, xyxy_to_xywh};
use crate::{skipped, verbose};

/// Leading fields per line: track id and the four bounding-box values.
pub const LEADING_FIELDS: usize = 5;

/// Progress callback: `(finished, total)`.
pub type ProgressFn<'a> = &'a (dyn Fn(usize, usize) + Sync);

/// List the `*.txt` files of a directory with the frame index of each.
///
/// Files are sorted by name. The frame index is the trailing integer of the
/// file stem; files without one are skipped.
///
/// # Errors
///
/// Returns an error if the directory cannot be read, or
/// [`LabelError::MalformedInput`] if it contains no usable frame file.
pub fn collect_frame_files<P: AsRef<Path>>(dir: P) -> Result<Vec<(PathBuf, usize)>> {
    let dir = dir.as_ref();
    let entries = std::fs::read_dir(dir).map_err(|e| {
        LabelError::IoError(format!("Failed to read directory {}: {e}", dir.display()))
    })?;

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case("txt"))
        })
        .collect();
    paths.sort();

    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        match frame_index_from_path(&path) {
            Some(frame) => files.push((path, frame)),
            None => skipped!(
                format!("'{}'", path.file_name().unwrap_or_default().to_string_lossy()),
                "failed to parse frame number"
            ),
        }
    }

    if files.is_empty() {
        return Err(LabelError::MalformedInput(format!(
            "no frame files in {}",
            dir.display()
        )));
    }
    Ok(files)
}

/// Names given to the keypoints of files read without a skeleton, in file
/// order: `kp1`, `kp2`, ...
#[must_use]
pub fn generated_keypoint_names(count: usize) -> Vec<String> {
    (1..=count).map(|i| format!("kp{i}")).collect()
}

/// Parse the text of one frame file.
///
/// Keypoints are named after `keypoint_order`; when it is empty they get
/// [`generated_keypoint_names`] for the count of the first line. Lines that
/// are not numeric or do not have `5 + 3k` fields are skipped. Visibility
/// other than 1 or 2 becomes 2.
///
/// # Errors
///
/// Returns [`LabelError::MalformedInput`] if a line carries a different
/// number of keypoints than `keypoint_order`, or than the first line when
/// no order is given.
pub fn parse_frame_text(
    text: &str,
    frame_index: usize,
    keypoint_order: &[String],
) -> Result<Vec<LabelRow>> {
    let mut rows = Vec::new();
    let mut generated: Option<Vec<String>> = None;

    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Ok(values) = line
            .split_whitespace()
            .map(str::parse::<f64>)
            .collect::<std::result::Result<Vec<f64>, _>>()
        else {
            skipped!(format!("Frame {frame_index} line {}", line_no + 1), "non-numeric field");
            continue;
        };
        if values.len() < LEADING_FIELDS || (values.len() - LEADING_FIELDS) % 3 != 0 {
            skipped!(
                format!("Frame {frame_index} line {}", line_no + 1),
                "{} fields",
                values.len()
            );
            continue;
        }

        let count = (values.len() - LEADING_FIELDS) / 3;
        let names: &[String] = if keypoint_order.is_empty() {
            generated.get_or_insert_with(|| generated_keypoint_names(count))
        } else {
            keypoint_order
        };
        if count != names.len() {
            return Err(LabelError::MalformedInput(format!(
                "frame {frame_index} has {count} keypoints, expected {}",
                names.len()
            )));
        }

        let Some(id) = track_id(values[0]) else {
            skipped!(format!("Frame {frame_index} line {}", line_no + 1), "invalid track id");
            continue;
        };

        let mut row = LabelRow::new(frame_index, format!("track_{id}"));
        for (name, kp) in names.iter().zip(values[LEADING_FIELDS..].chunks_exact(3)) {
            let visibility = if kp[2] == f64::from(OCCLUDED) {
                OCCLUDED
            } else {
                VISIBLE
            };
            row.keypoints
                .insert(name.clone(), Keypoint::new(kp[0], kp[1], visibility));
        }
        rows.push(row);
    }
    Ok(rows)
}

/// Whole, non-negative track id. `-0` reads as `0`.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]
fn track_id(value: f64) -> Option<u64> {
    (value.is_finite() && value >= 0.0 && value.fract() == 0.0 && value < u64::MAX as f64)
        .then_some(value as u64)
}

/// Read and parse one frame file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is malformed as a whole.
pub fn parse_frame_file(
    path: &Path,
    frame_index: usize,
    keypoint_order: &[String],
) -> Result<Vec<LabelRow>> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        LabelError::IoError(format!("Failed to read {}: {e}", path.display()))
    })?;
    parse_frame_text(&text, frame_index, keypoint_order)
}

/// Format one individual as an export line.
///
/// Keypoints missing from the row are written as `0 0 0`.
#[must_use]
pub fn format_frame_line(row: &LabelRow, keypoint_order: &[String]) -> String {
    let points = row.points(keypoint_order);
    let [cx, cy, w, h] = points_xyxy(&points).map_or([0.0; 4], xyxy_to_xywh);

    let mut line = format!(
        "{} {cx:.6} {cy:.6} {w:.6} {h:.6}",
        track_number(&row.track)
    );
    for name in keypoint_order {
        let (x, y, v) = row
            .keypoints
            .get(name)
            .map_or((0.0, 0.0, 0), Keypoint::as_tuple);
        line.push_str(&format!(" {x:.6} {y:.6} {v}"));
    }
    line
}

/// Render the export text of one frame, individuals sorted by track number.
#[must_use]
pub fn format_frame(table: &LabelTable, frame_index: usize) -> String {
    let mut rows: Vec<&LabelRow> = table.rows_in_frame(frame_index).collect();
    rows.sort_by(|a, b| {
        track_number(&a.track)
            .cmp(&track_number(&b.track))
            .then_with(|| a.track.cmp(&b.track))
    });
    let mut text = String::new();
    for row in rows {
        text.push_str(&format_frame_line(row, &table.keypoint_order));
        text.push('\n');
    }
    text
}

/// File name of a frame: the index zero-padded to `pad` digits.
#[must_use]
pub fn frame_file_name(frame_index: usize, pad: usize) -> String {
    format!("{frame_index:0pad$}.txt")
}

/// Write one text file per frame of `table` into `dir`, in parallel.
///
/// File names are zero-padded to at least two digits, or to the width of the
/// largest frame index.
///
/// # Arguments
///
/// * `table` - Snapshot to export; it cannot change while the export runs.
/// * `dir` - Output directory, created if missing.
/// * `threads` - Worker threads, `0` lets rayon decide.
/// * `progress` - Called with `(finished, total)` after each file.
///
/// # Errors
///
/// Returns an error if the worker pool cannot be built or a file cannot be written.
pub fn export_frames(
    table: &LabelTable,
    dir: &Path,
    threads: usize,
    progress: Option<ProgressFn<'_>>,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir).map_err(|e| {
        LabelError::IoError(format!("Failed to create {}: {e}", dir.display()))
    })?;

    let frames: Vec<usize> = table.frames().into_iter().collect();
    let Some(&max_frame) = frames.last() else {
        return Ok(Vec::new());
    };
    let pad = max_frame.to_string().len().max(2);
    let total = frames.len();

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|e| LabelError::ConfigError(format!("Failed to build export pool: {e}")))?;

    let done = AtomicUsize::new(0);
    let written = pool.install(|| {
        frames
            .par_iter()
            .map(|&frame| {
                let path = dir.join(frame_file_name(frame, pad));
                std::fs::write(&path, format_frame(table, frame)).map_err(|e| {
                    LabelError::IoError(format!("Failed to write {}: {e}", path.display()))
                })?;
                let finished = done.fetch_add(1, Ordering::Relaxed) + 1;
                if let Some(report) = progress {
                    report(finished, total);
                }
                Ok(path)
            })
            .collect::<Result<Vec<PathBuf>>>()
    })?;

    verbose!("Exported {} frame files to {}", written.len(), dir.display());
    Ok(written)
}
