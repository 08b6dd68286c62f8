//! Overview panel rendering for staged segmentation results.
//!
//! Lays out six stage images in a 2x3 grid: frame, mask, distance field
//! on the top row; display labels, elevation, summed grain stack on the
//! bottom row. Each tile is min-max normalized to u8 independently, so
//! faint stages stay visible next to bright ones.
//!
//! Everything here is presentation only. In particular the display label
//! image is recomputed from the retained slots (slot index + 1 on each
//! grain's support) and never feeds back into the numeric result.

use image::{GrayImage, Luma};

use crate::types::{Frame, GrainStack, StagedSeparation};

/// Tiles per panel row.
const COLUMNS: u32 = 3;
/// Panel rows.
const ROWS: u32 = 2;

/// Render the 2x3 overview panel for a staged segmentation.
#[must_use = "returns the rendered panel image"]
#[allow(clippy::cast_possible_truncation)]
pub fn render_panel(staged: &StagedSeparation) -> GrayImage {
    let (width, height) = staged.frame.dimensions();
    let tiles: [Frame; (COLUMNS * ROWS) as usize] = [
        staged.frame.clone(),
        gray_to_frame(&staged.mask),
        staged.distance.clone(),
        display_labels(&staged.segmentation.grains),
        staged.elevation.clone(),
        staged.segmentation.grains.summed(),
    ];

    let mut panel = GrayImage::new(width * COLUMNS, height * ROWS);
    for (index, tile) in tiles.iter().enumerate() {
        let rendered = to_u8_normalized(tile);
        let offset_x = (index as u32 % COLUMNS) * width;
        let offset_y = (index as u32 / COLUMNS) * height;
        for (x, y, pixel) in rendered.enumerate_pixels() {
            panel.put_pixel(offset_x + x, offset_y + y, *pixel);
        }
    }
    panel
}

/// Display label image: slot index + 1 over each retained grain's support.
///
/// Unlike the raw watershed label field, this numbering has no gaps after
/// size filtering, which keeps the rendered gray levels evenly spaced.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn display_labels(grains: &GrainStack) -> Frame {
    let mut labels = Frame::new(grains.width(), grains.height());
    for (slot_index, slot) in grains.slots().iter().enumerate() {
        let value = (slot_index + 1) as f32;
        for (accumulated, &intensity) in labels.iter_mut().zip(slot.iter()) {
            if intensity != 0.0 {
                *accumulated = value;
            }
        }
    }
    labels
}

/// Min-max normalize a frame to u8. A constant frame renders as black.
#[must_use = "returns the rendered tile"]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn to_u8_normalized(frame: &Frame) -> GrayImage {
    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;
    for &value in frame.iter() {
        min = min.min(value);
        max = max.max(value);
    }
    let range = max - min;
    GrayImage::from_fn(frame.width(), frame.height(), |x, y| {
        if range > 0.0 {
            let scaled = (frame.get_pixel(x, y).0[0] - min) / range * 255.0;
            Luma([scaled.round().clamp(0.0, 255.0) as u8])
        } else {
            Luma([0])
        }
    })
}

/// Widen a binary mask into an f32 frame for uniform tile handling.
fn gray_to_frame(mask: &GrayImage) -> Frame {
    Frame::from_fn(mask.width(), mask.height(), |x, y| {
        Luma([f32::from(mask.get_pixel(x, y).0[0])])
    })
}
