//! Normalized cross-correlation between two frames.
//!
//! Used to decide whether two grain images are alike enough to merge.
//! This is the zero-displacement value of a normalized cross-correlation:
//! a Pearson-style correlation over all pixels of two equally shaped
//! frames, in `[-1, 1]`.

use crate::types::{Frame, SeparateError};

/// Normalized cross-correlation of two frames at zero displacement.
///
/// Bitwise-identical frames short-circuit to exactly `1.0`. A frame with
/// zero variance (constant intensity) correlates to `0.0` with anything.
///
/// # Errors
///
/// Returns [`SeparateError::ShapeMismatch`] when the frames differ in
/// shape and [`SeparateError::EmptyFrame`] when they have no pixels.
pub fn normalized_cross_correlation(a: &Frame, b: &Frame) -> Result<f64, SeparateError> {
    if a.dimensions() != b.dimensions() {
        return Err(SeparateError::ShapeMismatch {
            a_width: a.width(),
            a_height: a.height(),
            b_width: b.width(),
            b_height: b.height(),
        });
    }
    if a.width() == 0 || a.height() == 0 {
        return Err(SeparateError::EmptyFrame);
    }
    if a.as_raw() == b.as_raw() {
        return Ok(1.0);
    }

    #[allow(clippy::cast_precision_loss)]
    let count = (u64::from(a.width()) * u64::from(a.height())) as f64;
    let mean_a = a.iter().map(|&v| f64::from(v)).sum::<f64>() / count;
    let mean_b = b.iter().map(|&v| f64::from(v)).sum::<f64>() / count;

    let mut covariance = 0.0;
    let mut variance_a = 0.0;
    let mut variance_b = 0.0;
    for (&va, &vb) in a.iter().zip(b.iter()) {
        let da = f64::from(va) - mean_a;
        let db = f64::from(vb) - mean_b;
        covariance += da * db;
        variance_a += da * da;
        variance_b += db * db;
    }

    if variance_a <= 0.0 || variance_b <= 0.0 {
        return Ok(0.0);
    }
    Ok(covariance / (variance_a.sqrt() * variance_b.sqrt()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use image::Luma;

    fn ramp_frame() -> Frame {
        Frame::from_fn(4, 4, |x, y| Luma([(x + 4 * y) as f32]))
    }

    #[test]
    fn identical_frames_correlate_to_exactly_one() {
        let frame = ramp_frame();
        let corr = normalized_cross_correlation(&frame, &frame.clone()).unwrap();
        assert!((corr - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn scaled_frame_still_correlates_to_one() {
        let a = ramp_frame();
        let b = Frame::from_fn(4, 4, |x, y| Luma([a.get_pixel(x, y).0[0] * 3.0]));
        let corr = normalized_cross_correlation(&a, &b).unwrap();
        assert!((corr - 1.0).abs() < 1e-9, "affine scaling preserves correlation, got {corr}");
    }

    #[test]
    fn inverted_frame_anticorrelates() {
        let a = ramp_frame();
        let b = Frame::from_fn(4, 4, |x, y| Luma([15.0 - a.get_pixel(x, y).0[0]]));
        let corr = normalized_cross_correlation(&a, &b).unwrap();
        assert!((corr + 1.0).abs() < 1e-9, "expected -1, got {corr}");
    }

    #[test]
    fn constant_frame_correlates_to_zero() {
        let a = ramp_frame();
        let b = Frame::from_pixel(4, 4, Luma([2.0]));
        let corr = normalized_cross_correlation(&a, &b).unwrap();
        assert!(corr.abs() < f64::EPSILON);
    }

    #[test]
    fn shape_mismatch_is_rejected() {
        let a = Frame::new(3, 3);
        let b = Frame::new(3, 4);
        let result = normalized_cross_correlation(&a, &b);
        assert!(matches!(result, Err(SeparateError::ShapeMismatch { .. })));
    }

    #[test]
    fn empty_frames_are_rejected() {
        let a = Frame::new(0, 0);
        let result = normalized_cross_correlation(&a, &a.clone());
        assert!(matches!(result, Err(SeparateError::EmptyFrame)));
    }
}
