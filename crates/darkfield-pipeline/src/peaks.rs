//! Seed finding: local maxima of the distance field.
//!
//! A pixel is a seed candidate when it is inside the mask, strictly
//! positive, outside the border-exclusion margin, and at least as large as
//! every pixel in the `(2 * min_distance + 1)` square window around it.
//! The non-strict comparison keeps whole plateaus; adjacent plateau pixels
//! later merge into a single marker during connected-component labeling.
//!
//! When more candidates exist than the grain cap allows, the ones with the
//! highest distance value win; ties go to the first candidate found in
//! raster order, so raising the cap only ever adds seeds to the retained
//! set.
//!
//! This is step 3 in the pipeline.

use image::{GrayImage, Luma};

use crate::types::{ExcludeBorder, Frame};

/// Find watershed seed pixels in a distance field.
///
/// Returns a binary seed image (255 = seed). `max_count` caps the number
/// of seed pixels; `exclude_border` discards candidates near the frame
/// edge before the cap is applied.
#[must_use = "returns the binary seed image"]
pub fn local_maxima(
    field: &Frame,
    mask: &GrayImage,
    min_distance: u32,
    max_count: usize,
    exclude_border: ExcludeBorder,
) -> GrayImage {
    let (width, height) = field.dimensions();
    let margin = exclude_border.margin(min_distance);

    let mut candidates: Vec<(u32, u32, f32)> = Vec::new();
    for y in 0..height {
        for x in 0..width {
            if mask.get_pixel(x, y).0[0] == 0 || within_margin(x, y, width, height, margin) {
                continue;
            }
            let value = field.get_pixel(x, y).0[0];
            if value <= 0.0 {
                continue;
            }
            if is_window_max(field, x, y, min_distance, value) {
                candidates.push((x, y, value));
            }
        }
    }

    if candidates.len() > max_count {
        // Stable sort: equal values keep raster discovery order.
        candidates.sort_by(|a, b| b.2.total_cmp(&a.2));
        candidates.truncate(max_count);
    }

    let mut seeds = GrayImage::new(width, height);
    for &(x, y, _) in &candidates {
        seeds.put_pixel(x, y, Luma([255]));
    }
    seeds
}

/// `true` when no pixel in the square window of the given radius exceeds
/// `value`. The window is clipped at the frame edge.
fn is_window_max(field: &Frame, x: u32, y: u32, radius: u32, value: f32) -> bool {
    let x0 = x.saturating_sub(radius);
    let y0 = y.saturating_sub(radius);
    let x1 = x.saturating_add(radius).min(field.width() - 1);
    let y1 = y.saturating_add(radius).min(field.height() - 1);
    for ny in y0..=y1 {
        for nx in x0..=x1 {
            if field.get_pixel(nx, ny).0[0] > value {
                return false;
            }
        }
    }
    true
}

/// `true` when the pixel lies within `margin` pixels of any frame edge.
const fn within_margin(x: u32, y: u32, width: u32, height: u32, margin: u32) -> bool {
    margin > 0
        && (x < margin
            || y < margin
            || x.saturating_add(margin) >= width
            || y.saturating_add(margin) >= height)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_from(values: &[(u32, u32, f32)], width: u32, height: u32) -> Frame {
        let mut field = Frame::new(width, height);
        for &(x, y, v) in values {
            field.put_pixel(x, y, Luma([v]));
        }
        field
    }

    fn full_mask(width: u32, height: u32) -> GrayImage {
        GrayImage::from_pixel(width, height, Luma([255]))
    }

    fn seed_coords(seeds: &GrayImage) -> Vec<(u32, u32)> {
        seeds
            .enumerate_pixels()
            .filter(|(_, _, p)| p.0[0] != 0)
            .map(|(x, y, _)| (x, y))
            .collect()
    }

    #[test]
    fn single_peak_is_found() {
        let field = field_from(&[(3, 3, 2.0), (3, 4, 1.0)], 7, 7);
        let seeds = local_maxima(&field, &full_mask(7, 7), 2, 10, ExcludeBorder::Off);
        assert_eq!(seed_coords(&seeds), vec![(3, 3)]);
    }

    #[test]
    fn zero_valued_pixels_are_never_seeds() {
        let field = Frame::new(5, 5);
        let seeds = local_maxima(&field, &full_mask(5, 5), 1, 10, ExcludeBorder::Off);
        assert!(seed_coords(&seeds).is_empty());
    }

    #[test]
    fn smaller_peak_inside_window_is_suppressed() {
        // Peaks at x=2 and x=5 are 3 apart; with min_distance 3 the
        // smaller one sees the larger in its window and is dropped.
        let field = field_from(&[(2, 2, 5.0), (5, 2, 4.0)], 8, 5);
        let seeds = local_maxima(&field, &full_mask(8, 5), 3, 10, ExcludeBorder::Off);
        assert_eq!(seed_coords(&seeds), vec![(2, 2)]);
    }

    #[test]
    fn distant_peaks_both_survive() {
        let field = field_from(&[(1, 1, 5.0), (8, 8, 4.0)], 10, 10);
        let seeds = local_maxima(&field, &full_mask(10, 10), 2, 10, ExcludeBorder::Off);
        assert_eq!(seed_coords(&seeds), vec![(1, 1), (8, 8)]);
    }

    #[test]
    fn plateau_keeps_adjacent_seeds() {
        // Two equal neighbors form a plateau; both stay and merge later
        // during marker labeling.
        let field = field_from(&[(3, 3, 2.0), (4, 3, 2.0)], 8, 8);
        let seeds = local_maxima(&field, &full_mask(8, 8), 2, 10, ExcludeBorder::Off);
        assert_eq!(seed_coords(&seeds), vec![(3, 3), (4, 3)]);
    }

    #[test]
    fn cap_keeps_highest_values() {
        let field = field_from(&[(1, 1, 1.0), (5, 1, 3.0), (1, 5, 2.0)], 8, 8);
        let seeds = local_maxima(&field, &full_mask(8, 8), 1, 2, ExcludeBorder::Off);
        let coords = seed_coords(&seeds);
        assert_eq!(coords.len(), 2);
        assert!(coords.contains(&(5, 1)), "highest peak must survive the cap");
        assert!(coords.contains(&(1, 5)), "second-highest peak must survive the cap");
    }

    #[test]
    fn cap_ties_break_by_raster_order() {
        let field = field_from(&[(1, 1, 2.0), (5, 1, 2.0), (1, 5, 2.0)], 8, 8);
        let seeds = local_maxima(&field, &full_mask(8, 8), 1, 2, ExcludeBorder::Off);
        // Raster order of discovery: (1,1) then (5,1) then (1,5).
        assert_eq!(seed_coords(&seeds), vec![(1, 1), (5, 1)]);
    }

    #[test]
    fn masked_out_pixels_are_ignored() {
        let field = field_from(&[(2, 2, 5.0), (6, 6, 4.0)], 9, 9);
        let mut mask = full_mask(9, 9);
        mask.put_pixel(2, 2, Luma([0]));
        let seeds = local_maxima(&field, &mask, 1, 10, ExcludeBorder::Off);
        assert_eq!(seed_coords(&seeds), vec![(6, 6)]);
    }

    #[test]
    fn border_margin_excludes_edge_seeds() {
        let field = field_from(&[(0, 3, 5.0), (4, 4, 1.0)], 9, 9);
        let seeds = local_maxima(&field, &full_mask(9, 9), 1, 10, ExcludeBorder::Margin(2));
        assert_eq!(seed_coords(&seeds), vec![(4, 4)]);
    }

    #[test]
    fn extreme_radius_and_margin_do_not_overflow() {
        // A window radius near u32::MAX clips to the frame; a margin that
        // large excludes every pixel instead of wrapping around.
        let field = field_from(&[(3, 3, 2.0)], 7, 7);
        let seeds = local_maxima(&field, &full_mask(7, 7), u32::MAX, 10, ExcludeBorder::Off);
        assert_eq!(seed_coords(&seeds), vec![(3, 3)]);

        let excluded =
            local_maxima(&field, &full_mask(7, 7), 1, 10, ExcludeBorder::Margin(u32::MAX));
        assert!(seed_coords(&excluded).is_empty());
    }

    #[test]
    fn min_distance_border_policy_uses_window_radius() {
        // Seed at (2, 2) sits closer than min_distance to the edge and is
        // excluded under the MinDistance policy; the interior seed stays.
        let field = field_from(&[(2, 2, 5.0), (6, 6, 1.0)], 10, 10);
        let excluded = local_maxima(&field, &full_mask(10, 10), 3, 10, ExcludeBorder::MinDistance);
        assert_eq!(seed_coords(&excluded), vec![(6, 6)]);
        let kept = local_maxima(&field, &full_mask(10, 10), 3, 10, ExcludeBorder::Off);
        assert_eq!(seed_coords(&kept), vec![(2, 2), (6, 6)]);
    }
}
