//! Euclidean distance transform of the foreground mask.
//!
//! Wraps [`imageproc::distance_transform::euclidean_squared_distance_transform`].
//! That primitive measures the distance to the nearest *foreground* pixel,
//! while the segmentation pipeline needs the distance from each masked
//! pixel to the nearest *background* pixel, so the mask is inverted at the
//! boundary and the square root taken afterwards.
//!
//! This is step 2 in the pipeline; its local maxima become watershed seeds.

use image::{GrayImage, Luma};
use imageproc::distance_transform::euclidean_squared_distance_transform;

use crate::types::Frame;

/// Exact Euclidean distance from each foreground pixel to the nearest
/// background pixel. Background pixels map to `0.0`.
///
/// A mask with no background at all has no finite distances; every pixel
/// is clamped to the frame diagonal so downstream stages stay finite.
#[must_use = "returns the distance field"]
#[allow(clippy::cast_possible_truncation)]
pub fn distance_transform(mask: &GrayImage) -> Frame {
    let (width, height) = mask.dimensions();
    let diagonal = f64::from(width).hypot(f64::from(height));

    if mask.pixels().all(|p| p.0[0] != 0) {
        return Frame::from_pixel(width, height, Luma([diagonal as f32]));
    }

    let background = GrayImage::from_fn(width, height, |x, y| {
        if mask.get_pixel(x, y).0[0] == 0 {
            Luma([255])
        } else {
            Luma([0])
        }
    });
    let squared = euclidean_squared_distance_transform(&background);

    Frame::from_fn(width, height, |x, y| {
        let distance = squared.get_pixel(x, y).0[0].sqrt().min(diagonal);
        Luma([distance as f32])
    })
}
