//! Grain separation: the full segmentation pipeline for one frame.
//!
//! Composes the stage modules into the classic distance-transform
//! watershed recipe: threshold -> distance transform -> seed maxima ->
//! Sobel elevation -> marker watershed -> size filter. The output is a
//! stack of per-grain intensity frames.
//!
//! Finding no grains is a valid outcome, not an error: an all-background
//! frame yields an empty stack with a [`SeparateNotice`] attached.

use image::Luma;
use imageproc::region_labelling::{Connectivity, connected_components};

use crate::types::{
    Frame, GrainStack, LabelField, Segmentation, SeparateConfig, SeparateError, SeparateNotice,
    StagedSeparation,
};
use crate::{distance, elevation, mask, peaks, watershed};

/// Separate one virtual dark-field frame into per-grain intensity frames.
///
/// Convenience wrapper around [`separate_staged`] that discards the
/// intermediate stage outputs.
///
/// # Errors
///
/// Returns [`SeparateError::EmptyFrame`] for a zero-sized frame and
/// [`SeparateError::InvalidConfig`] when `threshold` is outside `[0, 1)`
/// or `min_distance` or `max_grains` is zero.
pub fn separate(frame: &Frame, config: &SeparateConfig) -> Result<Segmentation, SeparateError> {
    Ok(separate_staged(frame, config)?.segmentation)
}

/// Separate one frame, keeping every intermediate stage output.
///
/// # Pipeline steps
///
/// 1. Threshold the frame at `threshold * max(frame)` into a mask
/// 2. Euclidean distance transform of the mask
/// 3. Local maxima of the distance field become seed pixels
/// 4. Sobel edge strength of the raw frame becomes the elevation surface
/// 5. Watershed flood from the labeled seeds, confined to the mask
/// 6. Cull basins outside the `[min_size, max_size]` pixel-count bounds
/// 7. Fill one output slot per surviving grain with the frame's
///    intensities on that grain's support
///
/// # Errors
///
/// Same conditions as [`separate`].
pub fn separate_staged(
    frame: &Frame,
    config: &SeparateConfig,
) -> Result<StagedSeparation, SeparateError> {
    validate(frame, config)?;

    // 1. Threshold into a foreground mask.
    let cutoff = config.threshold * mask::frame_max(frame);
    let mask = mask::threshold_mask(frame, cutoff);

    // 2. Distance from each foreground pixel to the nearest background.
    let distance = distance::distance_transform(&mask);

    // 3. Seed pixels: capped local maxima of the distance field.
    let seeds = peaks::local_maxima(
        &distance,
        &mask,
        config.min_distance,
        config.max_grains,
        config.exclude_border,
    );

    // 4. Edge-strength elevation surface from the raw frame.
    let elevation = elevation::edge_strength(frame);

    // 5. Label the seeds into markers and flood the basins.
    let markers = connected_components(&seeds, Connectivity::Four, Luma([0u8]));
    let labels = watershed::watershed(&elevation, &markers, &mask);

    // 6-7. Size filter and per-grain intensity collection.
    let segmentation = collect_grains(frame, &labels, config);

    Ok(StagedSeparation {
        frame: frame.clone(),
        mask,
        distance,
        seeds,
        elevation,
        labels,
        segmentation,
    })
}

/// Check the frame and configuration before any computation.
pub(crate) fn validate(frame: &Frame, config: &SeparateConfig) -> Result<(), SeparateError> {
    if frame.width() == 0 || frame.height() == 0 {
        return Err(SeparateError::EmptyFrame);
    }
    if !(0.0..1.0).contains(&config.threshold) {
        return Err(SeparateError::InvalidConfig(format!(
            "threshold must be in [0, 1), got {}",
            config.threshold,
        )));
    }
    if config.min_distance == 0 {
        return Err(SeparateError::InvalidConfig(
            "min_distance must be positive".to_string(),
        ));
    }
    if config.max_grains == 0 {
        return Err(SeparateError::InvalidConfig(
            "max_grains must be positive".to_string(),
        ));
    }
    Ok(())
}

/// Cull labeled basins by pixel count and collect per-grain intensities.
///
/// Two passes: the first computes every basin's size and the retained
/// label set, the second allocates exactly one slot per surviving grain.
/// Slot order preserves ascending label order; labels come from
/// raster-ordered markers, so a different seed set can renumber labels and
/// reorder slots.
pub(crate) fn collect_grains(
    frame: &Frame,
    labels: &LabelField,
    config: &SeparateConfig,
) -> Segmentation {
    let label_count = labels.iter().copied().max().unwrap_or(0);
    if label_count == 0 {
        return Segmentation {
            grains: GrainStack::new(frame.width(), frame.height(), Vec::new()),
            notice: Some(SeparateNotice::NoRegionsFound),
        };
    }

    let mut sizes = vec![0_u32; label_count as usize + 1];
    for &label in labels.iter() {
        sizes[label as usize] += 1;
    }

    let retained: Vec<u32> = (1..=label_count)
        .filter(|&n| {
            let size = sizes[n as usize];
            size >= config.min_size && config.max_size.is_none_or(|max| size <= max)
        })
        .collect();

    let slots: Vec<Frame> = retained
        .iter()
        .map(|&n| {
            Frame::from_fn(frame.width(), frame.height(), |x, y| {
                if labels.get_pixel(x, y).0[0] == n {
                    *frame.get_pixel(x, y)
                } else {
                    Luma([0.0])
                }
            })
        })
        .collect();

    Segmentation {
        grains: GrainStack::new(frame.width(), frame.height(), slots),
        notice: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ExcludeBorder;

    /// 10x10 frame with two well-separated bumps: a broad one peaking at
    /// 10 around (2, 2) and a narrow one of 5 at (7, 7). With the default
    /// 0.3 threshold the cutoff is 3.0, so the broad bump masks to a 3x3
    /// block and the narrow bump to its center pixel.
    fn two_bump_frame() -> Frame {
        let mut frame = Frame::new(10, 10);
        frame.put_pixel(2, 2, Luma([10.0]));
        for &(x, y) in &[(1, 2), (3, 2), (2, 1), (2, 3)] {
            frame.put_pixel(x, y, Luma([6.0]));
        }
        for &(x, y) in &[(1, 1), (3, 1), (1, 3), (3, 3)] {
            frame.put_pixel(x, y, Luma([4.0]));
        }
        frame.put_pixel(7, 7, Luma([5.0]));
        for &(x, y) in &[(6, 7), (8, 7), (7, 6), (7, 8)] {
            frame.put_pixel(x, y, Luma([2.0]));
        }
        frame
    }

    fn two_bump_config() -> SeparateConfig {
        SeparateConfig {
            min_distance: 2,
            threshold: 0.3,
            min_size: 1,
            max_size: None,
            max_grains: 5,
            exclude_border: ExcludeBorder::Off,
        }
    }

    fn support(slot: &Frame) -> Vec<(u32, u32)> {
        slot.enumerate_pixels()
            .filter(|(_, _, p)| p.0[0] != 0.0)
            .map(|(x, y, _)| (x, y))
            .collect()
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn two_bumps_separate_into_two_grains() {
        let result = separate(&two_bump_frame(), &two_bump_config()).unwrap();
        assert_eq!(result.grains.depth(), 2);
        assert!(result.notice.is_none());

        let first = support(result.grains.slot(0).unwrap());
        let second = support(result.grains.slot(1).unwrap());
        assert_eq!(first.len(), 9, "broad bump covers its 3x3 masked block");
        assert_eq!(second, vec![(7, 7)], "narrow bump covers its center pixel");
        assert!(
            first.iter().all(|p| !second.contains(p)),
            "grain supports must not overlap",
        );
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn grain_intensities_match_the_frame() {
        let frame = two_bump_frame();
        let result = separate(&frame, &two_bump_config()).unwrap();
        let first = result.grains.slot(0).unwrap();
        assert!((first.get_pixel(2, 2).0[0] - 10.0).abs() < f32::EPSILON);
        assert!((first.get_pixel(1, 2).0[0] - 6.0).abs() < f32::EPSILON);
        let second = result.grains.slot(1).unwrap();
        assert!((second.get_pixel(7, 7).0[0] - 5.0).abs() < f32::EPSILON);
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn summed_stack_conserves_masked_intensity() {
        // The summed stack equals the frame on the union of retained grain
        // supports and is zero elsewhere (e.g. the sub-threshold shoulder
        // pixels of the narrow bump).
        let frame = two_bump_frame();
        let result = separate(&frame, &two_bump_config()).unwrap();
        let summed = result.grains.summed();
        for (x, y, pixel) in summed.enumerate_pixels() {
            let in_support = result
                .grains
                .slots()
                .iter()
                .any(|slot| slot.get_pixel(x, y).0[0] != 0.0);
            if in_support {
                assert!(
                    (pixel.0[0] - frame.get_pixel(x, y).0[0]).abs() < f32::EPSILON,
                    "summed stack must reproduce the frame at ({x}, {y})",
                );
            } else {
                assert!(pixel.0[0].abs() < f32::EPSILON, "outside supports at ({x}, {y})");
            }
        }
        assert!(summed.get_pixel(6, 7).0[0].abs() < f32::EPSILON, "shoulder below cutoff");
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn grain_cap_keeps_the_strongest_seed() {
        // Capping at one grain keeps the basin of the strongest seed, and
        // raising the cap never removes a grain that was already present.
        let frame = two_bump_frame();
        let capped = separate(&frame, &SeparateConfig { max_grains: 1, ..two_bump_config() })
            .unwrap();
        assert_eq!(capped.grains.depth(), 1);

        let full = separate(&frame, &two_bump_config()).unwrap();
        assert_eq!(full.grains.depth(), 2);
        assert!(
            full.grains.slots().contains(capped.grains.slot(0).unwrap()),
            "the capped grain must survive a larger cap",
        );
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn raising_the_grain_cap_can_reorder_slots() {
        // A weak seed earlier in raster order than a strong one: the cap
        // keeps the strong blob, but marker labels follow raster order, so
        // the uncapped run lists the weak grain first. Raising the cap
        // grows the grain set without fixing slot positions.
        let mut frame = Frame::new(10, 10);
        frame.put_pixel(1, 1, Luma([4.0]));
        for y in 7..=9 {
            for x in 7..=9 {
                frame.put_pixel(x, y, Luma([8.0]));
            }
        }

        let capped = separate(&frame, &SeparateConfig { max_grains: 1, ..two_bump_config() })
            .unwrap();
        assert_eq!(capped.grains.depth(), 1);
        assert_eq!(
            support(capped.grains.slot(0).unwrap()).len(),
            9,
            "the cap must keep the seed with the highest distance value",
        );

        let full = separate(&frame, &two_bump_config()).unwrap();
        assert_eq!(full.grains.depth(), 2);
        assert_eq!(support(full.grains.slot(0).unwrap()), vec![(1, 1)]);
        assert_eq!(
            capped.grains.slot(0),
            full.grains.slot(1),
            "the blob grain is raster-second in the uncapped run",
        );
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn size_filter_bounds_are_inclusive() {
        let frame = two_bump_frame();
        // Grains are 9 and 1 pixels. min_size 2 culls the single pixel.
        let config = SeparateConfig { min_size: 2, ..two_bump_config() };
        let result = separate(&frame, &config).unwrap();
        assert_eq!(result.grains.depth(), 1);
        assert_eq!(support(result.grains.slot(0).unwrap()).len(), 9);

        // max_size 8 culls the 9-pixel grain instead.
        let config = SeparateConfig { max_size: Some(8), ..two_bump_config() };
        let result = separate(&frame, &config).unwrap();
        assert_eq!(result.grains.depth(), 1);
        assert_eq!(support(result.grains.slot(0).unwrap()), vec![(7, 7)]);

        // Inclusive bounds: [9, 9] keeps the 9-pixel grain.
        let config = SeparateConfig { min_size: 9, max_size: Some(9), ..two_bump_config() };
        let result = separate(&frame, &config).unwrap();
        assert_eq!(result.grains.depth(), 1);
        assert_eq!(support(result.grains.slot(0).unwrap()).len(), 9);
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn degenerate_bounds_cull_everything_without_error() {
        let config = SeparateConfig { min_size: 5, max_size: Some(2), ..two_bump_config() };
        let result = separate(&two_bump_frame(), &config).unwrap();
        assert!(result.grains.is_empty());
        assert!(result.notice.is_none(), "culling is not the no-regions condition");
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn all_zero_frame_returns_empty_stack_with_notice() {
        let frame = Frame::new(5, 5);
        let result = separate(&frame, &two_bump_config()).unwrap();
        assert_eq!(result.grains.width(), 5);
        assert_eq!(result.grains.height(), 5);
        assert_eq!(result.grains.depth(), 0);
        assert_eq!(result.notice, Some(SeparateNotice::NoRegionsFound));
    }

    #[test]
    fn invalid_threshold_is_rejected_before_work() {
        let frame = two_bump_frame();
        for threshold in [-0.1_f32, 1.0, 1.5] {
            let config = SeparateConfig { threshold, ..two_bump_config() };
            let result = separate(&frame, &config);
            assert!(
                matches!(result, Err(SeparateError::InvalidConfig(_))),
                "threshold {threshold} must be rejected",
            );
        }
    }

    #[test]
    fn zero_min_distance_is_rejected() {
        let config = SeparateConfig { min_distance: 0, ..two_bump_config() };
        let result = separate(&two_bump_frame(), &config);
        assert!(matches!(result, Err(SeparateError::InvalidConfig(_))));
    }

    #[test]
    fn zero_max_grains_is_rejected() {
        let config = SeparateConfig { max_grains: 0, ..two_bump_config() };
        let result = separate(&two_bump_frame(), &config);
        assert!(matches!(result, Err(SeparateError::InvalidConfig(_))));
    }

    #[test]
    fn empty_frame_is_rejected() {
        let frame = Frame::new(0, 0);
        let result = separate(&frame, &two_bump_config());
        assert!(matches!(result, Err(SeparateError::EmptyFrame)));
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn staged_output_keeps_every_intermediate() {
        let frame = two_bump_frame();
        let staged = separate_staged(&frame, &two_bump_config()).unwrap();
        assert_eq!(staged.frame, frame);
        assert_eq!(staged.mask.dimensions(), (10, 10));
        assert_eq!(staged.distance.dimensions(), (10, 10));
        assert_eq!(staged.elevation.dimensions(), (10, 10));
        assert_eq!(staged.labels.dimensions(), (10, 10));
        let seed_count = staged.seeds.pixels().filter(|p| p.0[0] != 0).count();
        assert_eq!(seed_count, 2);
        assert_eq!(staged.segmentation.grains.depth(), 2);
    }
}
