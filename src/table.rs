// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Delimited label tables.
//!
//! A label table has a header row with `track`, `frame.idx` (or `frame_idx`),
//! an optional `instance.visibility` column and, per keypoint in file order,
//! `<name>.x`, `<name>.y` and either `<name>.visibility` or `<name>.score`.
//! Score columns become visibility 2 on read and are never written back.

use std::borrow::Cow;
use std::path::Path;

use crate::error::{LabelError, Result};
use crate::labels::{Keypoint, LabelRow, LabelTable, VISIBLE};

/// Header cell for the track column.
pub const TRACK_COLUMN: &str = "track";
/// Header cell for the frame column.
pub const FRAME_COLUMN: &str = "frame.idx";
/// Alternative header cell for the frame column.
pub const FRAME_COLUMN_ALT: &str = "frame_idx";
/// Header cell for the instance visibility column.
pub const INSTANCE_VISIBILITY_COLUMN: &str = "instance.visibility";

/// Header row plus string records of a delimited file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTable {
    /// Column names.
    pub header: Vec<String>,
    /// Records, one `Vec` of cells per line.
    pub records: Vec<Vec<String>>,
}

impl RawTable {
    /// Parse delimited text. Blank lines are skipped; fields may be double-quoted.
    ///
    /// # Errors
    ///
    /// Returns [`LabelError::MalformedInput`] if the text has no header row.
    pub fn parse(text: &str, delimiter: char) -> Result<Self> {
        let mut lines = text.lines().filter(|line| !line.trim().is_empty());
        let header_line = lines
            .next()
            .ok_or_else(|| LabelError::MalformedInput("label table is empty".to_string()))?;
        let header = split_record(header_line.trim_start_matches('\u{feff}'), delimiter)
            .into_iter()
            .map(|cell| cell.trim().to_string())
            .collect();
        let records = lines.map(|line| split_record(line, delimiter)).collect();
        Ok(Self { header, records })
    }

    /// Read a label table file. `.tsv` files are tab-separated, anything else comma-separated.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or has no header.
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            LabelError::IoError(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::parse(&text, delimiter_for(path))
    }

    /// Render as delimited text with a trailing newline.
    #[must_use]
    pub fn to_delimited(&self, delimiter: char) -> String {
        let mut out = String::new();
        for record in std::iter::once(&self.header).chain(&self.records) {
            let cells: Vec<Cow<'_, str>> = record
                .iter()
                .map(|cell| quote_field(cell, delimiter))
                .collect();
            out.push_str(&cells.join(&delimiter.to_string()));
            out.push('\n');
        }
        out
    }

    /// Write the table to `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_delimited(delimiter_for(path))).map_err(|e| {
            LabelError::IoError(format!("Failed to write {}: {e}", path.display()))
        })
    }

    /// Index of a column by header name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<usize> {
        self.header.iter().position(|h| h == name)
    }
}

fn delimiter_for(path: &Path) -> char {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => '\t',
        _ => ',',
    }
}

fn split_record(line: &str, delimiter: char) -> Vec<String> {
    let mut cells = Vec::new();
    let mut cell = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                cell.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            c if c == delimiter && !in_quotes => cells.push(std::mem::take(&mut cell)),
            '\r' if !in_quotes => {}
            c => cell.push(c),
        }
    }
    cells.push(cell);
    cells
}

fn quote_field(field: &str, delimiter: char) -> Cow<'_, str> {
    if field.contains(delimiter) || field.contains('"') || field.contains('\n') {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

/// Column indices of one keypoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeypointColumns {
    /// Keypoint name.
    pub name: String,
    /// Index of `<name>.x`.
    pub x: usize,
    /// Index of `<name>.y`.
    pub y: usize,
    /// Index of `<name>.visibility`, if present.
    pub visibility: Option<usize>,
    /// Index of `<name>.score`, if present.
    pub score: Option<usize>,
}

/// Where the label fields live in a header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnLayout {
    /// Index of the track column.
    pub track: usize,
    /// Index of the frame column.
    pub frame: usize,
    /// Index of the instance visibility column.
    pub instance_visibility: Option<usize>,
    /// Keypoints in file order.
    pub keypoints: Vec<KeypointColumns>,
    /// Number of header cells.
    pub width: usize,
}

impl ColumnLayout {
    /// Analyse a header row.
    ///
    /// Keypoint order follows the order of the `<name>.x` columns. Columns that
    /// are not label fields are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`LabelError::MalformedInput`] if the track or frame column is
    /// missing, or a keypoint has an `.x` column without a matching `.y`.
    pub fn from_header(header: &[String]) -> Result<Self> {
        let find = |name: &str| header.iter().position(|h| h == name);

        let track = find(TRACK_COLUMN).ok_or_else(|| {
            LabelError::MalformedInput(format!("missing '{TRACK_COLUMN}' column"))
        })?;
        let frame = find(FRAME_COLUMN).or_else(|| find(FRAME_COLUMN_ALT)).ok_or_else(|| {
            LabelError::MalformedInput(format!("missing '{FRAME_COLUMN}' column"))
        })?;

        let mut keypoints = Vec::new();
        for (x, cell) in header.iter().enumerate() {
            let Some(name) = cell.strip_suffix(".x") else {
                continue;
            };
            if name.is_empty() {
                continue;
            }
            let y = find(&format!("{name}.y")).ok_or_else(|| {
                LabelError::MalformedInput(format!("keypoint '{name}' has no '.y' column"))
            })?;
            keypoints.push(KeypointColumns {
                name: name.to_string(),
                x,
                y,
                visibility: find(&format!("{name}.visibility")),
                score: find(&format!("{name}.score")),
            });
        }

        Ok(Self {
            track,
            frame,
            instance_visibility: find(INSTANCE_VISIBILITY_COLUMN),
            keypoints,
            width: header.len(),
        })
    }

    /// Keypoint names in file order.
    #[must_use]
    pub fn keypoint_names(&self) -> Vec<String> {
        self.keypoints.iter().map(|k| k.name.clone()).collect()
    }

    /// Parse one record into a label row.
    ///
    /// Empty or `NaN` coordinates leave the keypoint out of the row. Visibility
    /// outside `0..=2` and score-only keypoints get visibility 2.
    ///
    /// # Errors
    ///
    /// Returns [`LabelError::MalformedInput`] for a wrong cell count, an empty
    /// track, a bad frame index or a non-numeric coordinate.
    pub fn parse_record(&self, record: &[String]) -> Result<LabelRow> {
        if record.len() != self.width {
            return Err(LabelError::MalformedInput(format!(
                "expected {} columns, found {}",
                self.width,
                record.len()
            )));
        }

        let track = record[self.track].trim();
        if track.is_empty() {
            return Err(LabelError::MalformedInput("empty track".to_string()));
        }
        let mut row = LabelRow::new(parse_frame(&record[self.frame])?, track);

        if let Some(col) = self.instance_visibility {
            row.instance_visibility = parse_float(&record[col], INSTANCE_VISIBILITY_COLUMN)?;
        }

        for kp in &self.keypoints {
            let x = parse_float(&record[kp.x], &kp.name)?;
            let y = parse_float(&record[kp.y], &kp.name)?;
            let (Some(x), Some(y)) = (x, y) else {
                continue;
            };
            let visibility = kp
                .visibility
                .map_or(VISIBLE, |col| parse_visibility(&record[col]));
            row.keypoints.insert(kp.name.clone(), Keypoint::new(x, y, visibility));
        }
        Ok(row)
    }
}

fn parse_frame(cell: &str) -> Result<usize> {
    let cell = cell.trim();
    if let Ok(frame) = cell.parse::<usize>() {
        return Ok(frame);
    }
    match cell.parse::<f64>() {
        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_precision_loss,
            clippy::cast_sign_loss
        )]
        Ok(v) if v >= 0.0 && v.fract() == 0.0 && v < usize::MAX as f64 => Ok(v as usize),
        _ => Err(LabelError::MalformedInput(format!(
            "invalid frame index '{cell}'"
        ))),
    }
}

fn parse_float(cell: &str, field: &str) -> Result<Option<f64>> {
    let cell = cell.trim();
    if cell.is_empty() {
        return Ok(None);
    }
    let value: f64 = cell.parse().map_err(|_| {
        LabelError::MalformedInput(format!("non-numeric value '{cell}' for '{field}'"))
    })?;
    Ok((!value.is_nan()).then_some(value))
}

fn parse_visibility(cell: &str) -> u8 {
    match cell.trim().parse::<f64>() {
        Ok(v) if v == 0.0 => 0,
        Ok(v) if (v - 1.0).abs() < f64::EPSILON => 1,
        _ => VISIBLE,
    }
}

/// Header for writing a table with the given schema.
#[must_use]
pub fn header_for(keypoint_order: &[String], has_instance_visibility: bool) -> Vec<String> {
    let mut header = vec![TRACK_COLUMN.to_string(), FRAME_COLUMN.to_string()];
    if has_instance_visibility {
        header.push(INSTANCE_VISIBILITY_COLUMN.to_string());
    }
    for name in keypoint_order {
        header.push(format!("{name}.x"));
        header.push(format!("{name}.y"));
        header.push(format!("{name}.visibility"));
    }
    header
}

impl From<&LabelTable> for RawTable {
    /// Lay a label table out as delimited cells in export order.
    fn from(table: &LabelTable) -> Self {
        let header = header_for(&table.keypoint_order, table.has_instance_visibility);
        let records = table
            .rows_in_export_order()
            .into_iter()
            .map(|row| {
                let mut cells = vec![row.track.clone(), row.frame_index.to_string()];
                if table.has_instance_visibility {
                    cells.push(row.instance_visibility.map(|v| v.to_string()).unwrap_or_default());
                }
                for name in &table.keypoint_order {
                    match row.keypoints.get(name) {
                        Some(kp) => {
                            cells.push(kp.x.to_string());
                            cells.push(kp.y.to_string());
                            cells.push(kp.visibility.to_string());
                        }
                        None => cells.extend([String::new(), String::new(), String::new()]),
                    }
                }
                cells
            })
            .collect();
        Self { header, records }
    }
}
