//! Marker-based watershed flooding.
//!
//! Floods the elevation surface from labeled marker pixels: a priority
//! queue always expands the lowest-elevation frontier pixel first, with
//! insertion order (FIFO) breaking ties, so basins grow deterministically
//! until they meet. Flooding is 4-connected and never leaves the mask.
//!
//! No crate in this stack ships a watershed, so the flood is implemented
//! here with the semantics the rest of the pipeline expects from
//! marker-controlled segmentation.
//!
//! This is step 5 in the pipeline.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use image::{GrayImage, Luma};

use crate::types::{Frame, LabelField};

/// One frontier pixel awaiting expansion.
///
/// Ordered so that `BinaryHeap` (a max-heap) pops the lowest elevation
/// first, and the earliest-queued entry among equal elevations.
struct FloodEntry {
    elevation: f32,
    seq: u64,
    x: u32,
    y: u32,
    label: u32,
}

impl PartialEq for FloodEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for FloodEntry {}

impl PartialOrd for FloodEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FloodEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .elevation
            .total_cmp(&self.elevation)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Flood watershed basins from markers, constrained to the mask.
///
/// `markers` assigns positive labels to seed pixels; every other pixel is
/// 0. The returned label field assigns each in-mask pixel reachable from a
/// marker to exactly one basin. Pixels outside the mask, and in-mask
/// pixels in connected components without a marker, stay 0.
#[must_use = "returns the watershed label field"]
pub fn watershed(elevation: &Frame, markers: &LabelField, mask: &GrayImage) -> LabelField {
    let (width, height) = elevation.dimensions();
    let mut labels = LabelField::new(width, height);
    let mut heap: BinaryHeap<FloodEntry> = BinaryHeap::new();
    let mut seq: u64 = 0;

    for y in 0..height {
        for x in 0..width {
            let label = markers.get_pixel(x, y).0[0];
            if label == 0 || mask.get_pixel(x, y).0[0] == 0 {
                continue;
            }
            labels.put_pixel(x, y, Luma([label]));
            heap.push(FloodEntry {
                elevation: elevation.get_pixel(x, y).0[0],
                seq,
                x,
                y,
                label,
            });
            seq += 1;
        }
    }

    while let Some(entry) = heap.pop() {
        for (nx, ny) in neighbors4(entry.x, entry.y, width, height).into_iter().flatten() {
            if mask.get_pixel(nx, ny).0[0] == 0 || labels.get_pixel(nx, ny).0[0] != 0 {
                continue;
            }
            labels.put_pixel(nx, ny, Luma([entry.label]));
            heap.push(FloodEntry {
                elevation: elevation.get_pixel(nx, ny).0[0],
                seq,
                x: nx,
                y: ny,
                label: entry.label,
            });
            seq += 1;
        }
    }

    labels
}

/// The 4-connected neighbors of a pixel, clipped at the frame edge.
fn neighbors4(x: u32, y: u32, width: u32, height: u32) -> [Option<(u32, u32)>; 4] {
    [
        (x > 0).then(|| (x - 1, y)),
        (x + 1 < width).then(|| (x + 1, y)),
        (y > 0).then(|| (x, y - 1)),
        (y + 1 < height).then(|| (x, y + 1)),
    ]
}
