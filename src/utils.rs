// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Utility functions shared by the label store, exporters and CLI

use std::path::Path;

/// Parse the run of ASCII digits at the end of a string.
///
/// `"track_12"` gives `Some(12)`, `"video_0007"` gives `Some(7)`, `"nose"` gives `None`.
#[must_use]
pub fn trailing_number(s: &str) -> Option<u64> {
    let digits = s.len() - s.trim_end_matches(|c: char| c.is_ascii_digit()).len();
    if digits == 0 {
        return None;
    }
    s[s.len() - digits..].parse().ok()
}

/// Numeric index of a track name, `0` when it has no trailing number.
#[must_use]
pub fn track_number(track: &str) -> u64 {
    trailing_number(track).unwrap_or(0)
}

/// Frame index encoded at the end of a file stem (`clip_42.txt` is frame 42).
#[must_use]
pub fn frame_index_from_path(path: &Path) -> Option<usize> {
    let stem = path.file_stem()?.to_str()?;
    trailing_number(stem).and_then(|n| usize::try_from(n).ok())
}

/// Axis-aligned extent of a set of points as `[x1, y1, x2, y2]`.
///
/// Returns `None` for an empty set.
#[must_use]
pub fn points_xyxy(points: &[(f64, f64)]) -> Option<[f64; 4]> {
    let (&(x0, y0), rest) = points.split_first()?;
    Some(rest.iter().fold([x0, y0, x0, y0], |b, &(x, y)| {
        [b[0].min(x), b[1].min(y), b[2].max(x), b[3].max(y)]
    }))
}

/// Convert `[x1, y1, x2, y2]` to `[center_x, center_y, width, height]`.
#[must_use]
pub fn xyxy_to_xywh(b: [f64; 4]) -> [f64; 4] {
    [
        (b[0] + b[2]) / 2.0,
        (b[1] + b[3]) / 2.0,
        b[2] - b[0],
        b[3] - b[1],
    ]
}

/// Find the next available run directory (export, export2, export3, etc.)
#[must_use]
pub fn find_next_run_dir(base: &str, prefix: &str) -> String {
    let base_path = Path::new(base);

    let first = base_path.join(prefix);
    if !first.exists() {
        return first.to_string_lossy().to_string();
    }

    for i in 2.. {
        let numbered = base_path.join(format!("{prefix}{i}"));
        if !numbered.exists() {
            return numbered.to_string_lossy().to_string();
        }
    }

    base_path.join(prefix).to_string_lossy().to_string()
}

/// Pluralize a count noun for summaries ("1 track", "3 tracks").
#[must_use]
pub fn pluralize(count: usize, word: &str) -> String {
    if count == 1 {
        return format!("{count} {word}");
    }
    let plural = match word {
        "mouse" => "mice".to_string(),
        "sheep" => "sheep".to_string(),
        _ => {
            if word.ends_with('s') || word.ends_with("ch") || word.ends_with("sh") {
                format!("{word}es")
            } else if word.ends_with('y') && !word.ends_with("ey") && !word.ends_with("ay") {
                format!("{}ies", &word[..word.len() - 1])
            } else {
                format!("{word}s")
            }
        }
    };
    format!("{count} {plural}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_number() {
        assert_eq!(trailing_number("track_12"), Some(12));
        assert_eq!(trailing_number("mouse3"), Some(3));
        assert_eq!(trailing_number("0007"), Some(7));
        assert_eq!(trailing_number("nose"), None);
        assert_eq!(trailing_number(""), None);
        assert_eq!(track_number("queen"), 0);
    }

    #[test]
    fn test_frame_index_from_path() {
        assert_eq!(frame_index_from_path(Path::new("labels/clip_42.txt")), Some(42));
        assert_eq!(frame_index_from_path(Path::new("07.txt")), Some(7));
        assert_eq!(frame_index_from_path(Path::new("readme.txt")), None);
    }

    #[test]
    fn test_points_bbox() {
        let b = points_xyxy(&[(0.2, 0.4), (0.6, 0.1), (0.4, 0.3)]).unwrap();
        assert!((b[0] - 0.2).abs() < 1e-9);
        assert!((b[1] - 0.1).abs() < 1e-9);
        assert!((b[2] - 0.6).abs() < 1e-9);
        assert!((b[3] - 0.4).abs() < 1e-9);

        let c = xyxy_to_xywh(b);
        assert!((c[0] - 0.4).abs() < 1e-9);
        assert!((c[1] - 0.25).abs() < 1e-9);
        assert!((c[2] - 0.4).abs() < 1e-9);
        assert!((c[3] - 0.3).abs() < 1e-9);

        assert!(points_xyxy(&[]).is_none());
    }

    #[test]
    fn test_find_next_run_dir() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().to_string_lossy().to_string();
        let first = find_next_run_dir(&base, "export");
        assert!(first.ends_with("export"));

        std::fs::create_dir_all(&first).unwrap();
        assert!(find_next_run_dir(&base, "export").ends_with("export2"));
    }

    #[test]
    fn test_pluralize() {
        assert_eq!(pluralize(1, "track"), "1 track");
        assert_eq!(pluralize(3, "track"), "3 tracks");
        assert_eq!(pluralize(2, "mouse"), "2 mice");
        assert_eq!(pluralize(0, "entry"), "0 entries");
    }
}
