//! Pipeline diagnostics: timing and counts for each segmentation stage.
//!
//! Permanent instrumentation for parameter tuning: every call to
//! [`separate_staged_with_diagnostics`] collects per-stage durations and
//! counts alongside the segmentation result.
//!
//! Timestamps are taken through the [`Clock`] trait so the pure pipeline
//! crate never depends on a particular time source; binaries supply an
//! implementation backed by [`std::time::Instant`].
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since [`std::time::Duration`] does not implement serde
//! traits.

use std::time::Duration;

use image::Luma;
use imageproc::region_labelling::{Connectivity, connected_components};
use serde::{Deserialize, Serialize};

use crate::types::{
    Frame, GrayImage, LabelField, SeparateConfig, SeparateError, SeparateNotice, StagedSeparation,
};
use crate::{distance, elevation, mask, peaks, segment, watershed};

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Time source for stage measurements.
pub trait Clock {
    /// Opaque timestamp type.
    type Instant;

    /// The current instant.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since the given instant.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// Diagnostics collected from a single segmentation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeparateDiagnostics {
    /// Stage 1: thresholding.
    pub mask: StageDiagnostics,
    /// Stage 2: Euclidean distance transform.
    pub distance: StageDiagnostics,
    /// Stage 3: seed finding.
    pub seeding: StageDiagnostics,
    /// Stage 4: Sobel elevation surface.
    pub elevation: StageDiagnostics,
    /// Stage 5: marker labeling + watershed flood.
    pub watershed: StageDiagnostics,
    /// Stages 6-7: size filter and grain collection.
    pub collect: StageDiagnostics,
    /// Total wall-clock duration of the entire pipeline (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary counts across all stages.
    pub summary: SeparateSummary,
}

/// Diagnostics for a single pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics.
    pub metrics: StageMetrics,
}

/// Stage-specific metrics that vary by pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Thresholding metrics.
    Mask {
        /// Absolute intensity cutoff (`threshold * max(frame)`).
        cutoff: f32,
        /// Number of foreground pixels in the mask.
        foreground_pixels: u64,
    },
    /// Distance transform metrics.
    Distance {
        /// Largest distance value, i.e. the deepest interior point.
        max_distance: f32,
    },
    /// Seed finding metrics.
    Seeding {
        /// Number of seed pixels (before plateau merging).
        seed_pixels: u64,
    },
    /// Elevation surface metrics.
    Elevation {
        /// Largest edge strength in the surface.
        max_strength: f32,
    },
    /// Watershed metrics.
    Watershed {
        /// Number of markers after plateau merging.
        markers: u32,
        /// Number of flooded basins.
        regions: u32,
        /// Number of pixels claimed by any basin.
        labeled_pixels: u64,
    },
    /// Grain collection metrics.
    Collect {
        /// Basins entering the size filter.
        regions: u32,
        /// Grains surviving the size filter.
        retained: usize,
    },
}

/// High-level summary counts for the entire run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeparateSummary {
    /// Frame width in pixels.
    pub frame_width: u32,
    /// Frame height in pixels.
    pub frame_height: u32,
    /// Total pixel count.
    pub pixel_count: u64,
    /// Number of seed pixels found.
    pub seed_count: u64,
    /// Number of watershed basins.
    pub region_count: u32,
    /// Number of grains in the final stack.
    pub grain_count: usize,
    /// Non-fatal diagnostic, if any.
    pub notice: Option<SeparateNotice>,
}

impl SeparateDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Segmentation Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Frame: {}x{} ({} pixels)",
            self.summary.frame_width, self.summary.frame_height, self.summary.pixel_count,
        ));
        lines.push(format!("Total duration: {:.3}ms", duration_ms(self.total_duration)));
        lines.push(String::new());

        lines.push(format!(
            "{:<14} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(70));

        let total_ms = duration_ms(self.total_duration);
        let stages: [(&str, &StageDiagnostics); 6] = [
            ("Mask", &self.mask),
            ("Distance", &self.distance),
            ("Seeding", &self.seeding),
            ("Elevation", &self.elevation),
            ("Watershed", &self.watershed),
            ("Collect", &self.collect),
        ];

        for (name, diag) in &stages {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 { ms / total_ms * 100.0 } else { 0.0 };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<14} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.push(String::new());
        lines.push(format!(
            "Seeds: {}  |  Regions: {}  |  Grains: {}",
            self.summary.seed_count, self.summary.region_count, self.summary.grain_count,
        ));
        if let Some(notice) = self.summary.notice {
            lines.push(format!("Notice: {notice}"));
        }

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Mask {
            cutoff,
            foreground_pixels,
        } => format!("cutoff={cutoff:.3} foreground={foreground_pixels}"),
        StageMetrics::Distance { max_distance } => format!("max={max_distance:.2}px"),
        StageMetrics::Seeding { seed_pixels } => format!("seeds={seed_pixels}"),
        StageMetrics::Elevation { max_strength } => format!("max={max_strength:.3}"),
        StageMetrics::Watershed {
            markers,
            regions,
            labeled_pixels,
        } => format!("markers={markers} regions={regions} labeled={labeled_pixels}"),
        StageMetrics::Collect { regions, retained } => {
            format!("regions={regions} retained={retained}")
        }
    }
}

/// Run [`separate_staged`](crate::separate_staged) while collecting
/// per-stage diagnostics.
///
/// # Errors
///
/// Same conditions as [`separate`](crate::separate).
pub fn separate_staged_with_diagnostics<C: Clock>(
    frame: &Frame,
    config: &SeparateConfig,
    clock: &C,
) -> Result<(StagedSeparation, SeparateDiagnostics), SeparateError> {
    segment::validate(frame, config)?;
    let run_start = clock.now();

    // 1. Threshold into a foreground mask.
    let stage_start = clock.now();
    let cutoff = config.threshold * mask::frame_max(frame);
    let mask_image = mask::threshold_mask(frame, cutoff);
    let mask_diag = StageDiagnostics {
        duration: clock.elapsed(&stage_start),
        metrics: StageMetrics::Mask {
            cutoff,
            foreground_pixels: count_nonzero(&mask_image),
        },
    };

    // 2. Distance transform.
    let stage_start = clock.now();
    let distance_field = distance::distance_transform(&mask_image);
    let distance_diag = StageDiagnostics {
        duration: clock.elapsed(&stage_start),
        metrics: StageMetrics::Distance {
            max_distance: mask::frame_max(&distance_field),
        },
    };

    // 3. Seed finding.
    let stage_start = clock.now();
    let seeds = peaks::local_maxima(
        &distance_field,
        &mask_image,
        config.min_distance,
        config.max_grains,
        config.exclude_border,
    );
    let seed_count = count_nonzero(&seeds);
    let seeding_diag = StageDiagnostics {
        duration: clock.elapsed(&stage_start),
        metrics: StageMetrics::Seeding {
            seed_pixels: seed_count,
        },
    };

    // 4. Elevation surface.
    let stage_start = clock.now();
    let elevation_map = elevation::edge_strength(frame);
    let elevation_diag = StageDiagnostics {
        duration: clock.elapsed(&stage_start),
        metrics: StageMetrics::Elevation {
            max_strength: mask::frame_max(&elevation_map),
        },
    };

    // 5. Marker labeling + watershed flood.
    let stage_start = clock.now();
    let markers = connected_components(&seeds, Connectivity::Four, Luma([0u8]));
    let labels = watershed::watershed(&elevation_map, &markers, &mask_image);
    let region_count = max_label(&labels);
    let watershed_diag = StageDiagnostics {
        duration: clock.elapsed(&stage_start),
        metrics: StageMetrics::Watershed {
            markers: max_label(&markers),
            regions: region_count,
            labeled_pixels: labels.iter().filter(|&&l| l != 0).count() as u64,
        },
    };

    // 6-7. Size filter and grain collection.
    let stage_start = clock.now();
    let segmentation = segment::collect_grains(frame, &labels, config);
    let collect_diag = StageDiagnostics {
        duration: clock.elapsed(&stage_start),
        metrics: StageMetrics::Collect {
            regions: region_count,
            retained: segmentation.grains.depth(),
        },
    };

    let summary = SeparateSummary {
        frame_width: frame.width(),
        frame_height: frame.height(),
        pixel_count: u64::from(frame.width()) * u64::from(frame.height()),
        seed_count,
        region_count,
        grain_count: segmentation.grains.depth(),
        notice: segmentation.notice,
    };

    let diagnostics = SeparateDiagnostics {
        mask: mask_diag,
        distance: distance_diag,
        seeding: seeding_diag,
        elevation: elevation_diag,
        watershed: watershed_diag,
        collect: collect_diag,
        total_duration: clock.elapsed(&run_start),
        summary,
    };

    let staged = StagedSeparation {
        frame: frame.clone(),
        mask: mask_image,
        distance: distance_field,
        seeds,
        elevation: elevation_map,
        labels,
        segmentation,
    };

    Ok((staged, diagnostics))
}

/// Count nonzero pixels in a grayscale image.
fn count_nonzero(image: &GrayImage) -> u64 {
    image.iter().filter(|&&v| v != 0).count() as u64
}

/// Largest label in a label field.
fn max_label(labels: &LabelField) -> u32 {
    labels.iter().copied().max().unwrap_or(0)
}
