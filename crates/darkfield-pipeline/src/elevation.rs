//! Sobel edge-strength map: the elevation surface for the watershed.
//!
//! Gradient magnitude computed with the 3x3 Sobel kernels, normalized the
//! same way scikit-image normalizes its `sobel` filter (kernels divided by
//! four, magnitude divided by sqrt(2)). The absolute scale is irrelevant
//! to the watershed, which only compares elevations, but keeping the
//! conventional normalization makes the rendered surface recognizable.
//!
//! `imageproc::gradients` only operates on integer pixels, so this works
//! directly on `f32` frames with replicate (clamped) borders.
//!
//! This is step 4 in the pipeline.

use image::Luma;

use crate::types::Frame;

/// Sobel gradient magnitude of a frame.
#[must_use = "returns the edge-strength map"]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn edge_strength(frame: &Frame) -> Frame {
    let (width, height) = frame.dimensions();
    let max_x = i64::from(width) - 1;
    let max_y = i64::from(height) - 1;

    Frame::from_fn(width, height, |x, y| {
        let sample = |dx: i64, dy: i64| -> f32 {
            let sx = (i64::from(x) + dx).clamp(0, max_x) as u32;
            let sy = (i64::from(y) + dy).clamp(0, max_y) as u32;
            frame.get_pixel(sx, sy).0[0]
        };

        let gx = (sample(1, -1) + 2.0 * sample(1, 0) + sample(1, 1)
            - sample(-1, -1)
            - 2.0 * sample(-1, 0)
            - sample(-1, 1))
            / 4.0;
        let gy = (sample(-1, 1) + 2.0 * sample(0, 1) + sample(1, 1)
            - sample(-1, -1)
            - 2.0 * sample(0, -1)
            - sample(1, -1))
            / 4.0;

        Luma([gx.hypot(gy) / std::f32::consts::SQRT_2])
    })
}
