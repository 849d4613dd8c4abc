// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Pixel-space detection and rescaling of keypoint coordinates.
//!
//! A table counts as pixel-space when some keypoint of its sample row has both
//! `x > 1` and `y > 1`. A row whose only out-of-range value is on one axis
//! (for example a point drawn on the right image edge) is classified as already
//! normalized; this heuristic is kept as is.

use crate::error::{LabelError, Result};
use crate::labels::{LabelRow, LabelTable};

/// Whether a sample row looks like pixel coordinates.
#[must_use]
pub fn needs_normalization(sample: &LabelRow) -> bool {
    sample.keypoints.values().any(|kp| kp.x > 1.0 && kp.y > 1.0)
}

/// Divide every keypoint's `x` by `width` and `y` by `height`, in place.
///
/// Only keypoints named in `keypoint_order` are touched.
pub fn normalize<'a, I>(rows: I, keypoint_order: &[String], width: u32, height: u32)
where
    I: IntoIterator<Item = &'a mut LabelRow>,
{
    let (w, h) = (f64::from(width), f64::from(height));
    for row in rows {
        for name in keypoint_order {
            if let Some(kp) = row.keypoints.get_mut(name) {
                kp.x /= w;
                kp.y /= h;
            }
        }
    }
}

/// Normalize a whole table unless it is already normalized.
///
/// Returns `true` if coordinates were rescaled.
///
/// # Errors
///
/// Returns [`LabelError::ConfigError`] for a zero width or height.
pub fn normalize_table(table: &mut LabelTable, width: u32, height: u32) -> Result<bool> {
    if width == 0 || height == 0 {
        return Err(LabelError::ConfigError(format!(
            "invalid image resolution {width}x{height}"
        )));
    }
    if table.normalized {
        return Ok(false);
    }
    let order = table.keypoint_order.clone();
    normalize(table.rows_mut(), &order, width, height);
    table.normalized = true;
    Ok(true)
}

/// Copy of `table` in pixel coordinates for a `width` x `height` image.
///
/// A table that is not normalized is already in pixels and is copied as is.
///
/// # Errors
///
/// Returns [`LabelError::ConfigError`] for a zero width or height.
pub fn pixel_table(table: &LabelTable, width: u32, height: u32) -> Result<LabelTable> {
    if width == 0 || height == 0 {
        return Err(LabelError::ConfigError(format!(
            "invalid image resolution {width}x{height}"
        )));
    }
    let mut pixels = table.clone();
    if !pixels.normalized {
        return Ok(pixels);
    }
    let (w, h) = (f64::from(width), f64::from(height));
    let order = pixels.keypoint_order.clone();
    for row in pixels.rows_mut() {
        for name in &order {
            if let Some(kp) = row.keypoints.get_mut(name) {
                kp.x *= w;
                kp.y *= h;
            }
        }
    }
    pixels.normalized = false;
    Ok(pixels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::VISIBLE;

    #[test]
    fn test_needs_normalization_requires_both_axes() {
        let pixel = LabelRow::new(0, "a").with_keypoint("nose", (50.0, 25.0, VISIBLE));
        assert!(needs_normalization(&pixel));

        let edge = LabelRow::new(0, "a").with_keypoint("nose", (1.02, 0.4, VISIBLE));
        assert!(!needs_normalization(&edge));

        let unit = LabelRow::new(0, "a").with_keypoint("nose", (0.3, 0.4, VISIBLE));
        assert!(!needs_normalization(&unit));
    }

    #[test]
    fn test_normalize_divides_by_resolution() {
        let mut row = LabelRow::new(0, "a")
            .with_keypoint("nose", (50.0, 25.0, VISIBLE))
            .with_keypoint("tail", (100.0, 50.0, VISIBLE));
        normalize(
            std::iter::once(&mut row),
            &["nose".to_string(), "tail".to_string()],
            100,
            50,
        );
        let nose = row.keypoints["nose"];
        assert!((nose.x - 0.5).abs() < 1e-9);
        assert!((nose.y - 0.5).abs() < 1e-9);
        let tail = row.keypoints["tail"];
        assert!((tail.x - 1.0).abs() < 1e-9);
        assert!((tail.y - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_normalize_table_is_guarded() {
        let mut table = LabelTable::new(vec!["nose".to_string()]);
        table.normalized = false;
        table
            .insert(LabelRow::new(0, "a").with_keypoint("nose", (50.0, 25.0, VISIBLE)))
            .unwrap();

        assert!(normalize_table(&mut table, 100, 50).unwrap());
        assert!(!normalize_table(&mut table, 100, 50).unwrap());
        let nose = table.get(0, "a").unwrap().keypoints["nose"];
        assert!((nose.x - 0.5).abs() < 1e-9);
        assert!((nose.y - 0.5).abs() < 1e-9);

        assert!(normalize_table(&mut table, 0, 50).is_err());
    }

    #[test]
    fn test_pixel_table_scales_back() {
        let mut table = LabelTable::new(vec!["nose".to_string()]);
        table
            .insert(LabelRow::new(0, "a").with_keypoint("nose", (0.5, 0.25, VISIBLE)))
            .unwrap();

        let pixels = pixel_table(&table, 200, 80).unwrap();
        assert!(!pixels.normalized);
        let nose = pixels.get(0, "a").unwrap().keypoints["nose"];
        assert!((nose.x - 100.0).abs() < 1e-9);
        assert!((nose.y - 20.0).abs() < 1e-9);
        assert!((table.get(0, "a").unwrap().keypoints["nose"].x - 0.5).abs() < 1e-9);

        let again = pixel_table(&pixels, 200, 80).unwrap();
        assert_eq!(again.get(0, "a"), pixels.get(0, "a"));
        assert!(pixel_table(&table, 200, 0).is_err());
    }
}
