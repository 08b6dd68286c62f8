//! Frame thresholding: derive a foreground mask from intensity levels.
//!
//! A virtual dark-field frame is masked at a fraction of its maximum
//! intensity; everything at or below the cutoff is background. The mask
//! drives both the distance transform and the watershed flood.
//!
//! This is step 1 in the pipeline.

use image::{GrayImage, Luma};

use crate::types::Frame;

/// Maximum intensity in a frame.
///
/// Intensities are nonnegative, so an empty frame reports `0.0`.
#[must_use]
pub fn frame_max(frame: &Frame) -> f32 {
    frame.iter().copied().fold(0.0, f32::max)
}

/// Threshold a frame into a binary mask.
///
/// Returns a mask with 255 wherever `frame > cutoff` and 0 elsewhere.
/// Strict comparison means a cutoff of `0.0` keeps exactly the pixels
/// with positive intensity, and an all-zero frame masks to all-background.
#[must_use = "returns the binary foreground mask"]
pub fn threshold_mask(frame: &Frame, cutoff: f32) -> GrayImage {
    GrayImage::from_fn(frame.width(), frame.height(), |x, y| {
        if frame.get_pixel(x, y).0[0] > cutoff {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

/// Normalize a frame by its maximum intensity.
///
/// An all-zero frame is returned unchanged rather than dividing by zero.
#[must_use = "returns the normalized frame"]
pub fn normalize(frame: &Frame) -> Frame {
    let max = frame_max(frame);
    if max <= 0.0 {
        return frame.clone();
    }
    Frame::from_fn(frame.width(), frame.height(), |x, y| {
        Luma([frame.get_pixel(x, y).0[0] / max])
    })
}
