//! Shared types for the darkfield segmentation pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Re-export `GrayImage` so downstream crates can reference masks and
/// rendered panels without depending on `image` directly.
pub use image::GrayImage;

/// A single virtual dark-field frame: nonnegative `f32` intensities.
///
/// Frames are immutable inputs to the pipeline; every stage allocates a
/// fresh output buffer rather than mutating in place.
pub type Frame = image::ImageBuffer<image::Luma<f32>, Vec<f32>>;

/// A watershed label field: `0` is background, `1..` are basin identifiers.
pub type LabelField = image::ImageBuffer<image::Luma<u32>, Vec<u32>>;

/// Border-exclusion policy for seed finding.
///
/// Seeds closer to the frame edge than the exclusion margin are discarded
/// before the grain cap is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExcludeBorder {
    /// Keep seeds regardless of their distance to the frame edge.
    #[default]
    Off,
    /// Use the seed window radius (`min_distance`) as the margin.
    MinDistance,
    /// Use an explicit margin in pixels.
    Margin(u32),
}

impl ExcludeBorder {
    /// Resolve the policy into a concrete pixel margin.
    #[must_use]
    pub const fn margin(self, min_distance: u32) -> u32 {
        match self {
            Self::Off => 0,
            Self::MinDistance => min_distance,
            Self::Margin(margin) => margin,
        }
    }
}

/// Configuration for [`separate`](crate::separate).
///
/// All parameters have defaults suitable for small, well-separated grains.
/// `threshold` must lie in `[0, 1)` and `min_distance` and `max_grains`
/// must be positive; violations are reported as
/// [`SeparateError::InvalidConfig`] before any computation starts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeparateConfig {
    /// Minimum pixel separation between seed points. Also the radius of
    /// the local-maximum window applied to the distance field.
    pub min_distance: u32,

    /// Masking cutoff as a fraction of the frame's maximum intensity.
    /// Pixels at or below `threshold * max(frame)` are background.
    pub threshold: f32,

    /// Grains covering fewer than this many pixels are discarded.
    pub min_size: u32,

    /// Grains covering more than this many pixels are discarded.
    /// `None` means unbounded.
    pub max_size: Option<u32>,

    /// Upper bound on the number of seeds. When more local maxima exist,
    /// the ones with the highest distance-field value are kept (ties go to
    /// the first seed found, in raster order).
    pub max_grains: usize,

    /// Border-exclusion policy for seeds.
    pub exclude_border: ExcludeBorder,
}

impl SeparateConfig {
    /// Default seed window radius in pixels.
    pub const DEFAULT_MIN_DISTANCE: u32 = 2;
    /// Default masking cutoff fraction.
    pub const DEFAULT_THRESHOLD: f32 = 0.3;
    /// Default minimum grain size in pixels.
    pub const DEFAULT_MIN_SIZE: u32 = 1;
    /// Default seed cap.
    pub const DEFAULT_MAX_GRAINS: usize = 100;
}

impl Default for SeparateConfig {
    fn default() -> Self {
        Self {
            min_distance: Self::DEFAULT_MIN_DISTANCE,
            threshold: Self::DEFAULT_THRESHOLD,
            min_size: Self::DEFAULT_MIN_SIZE,
            max_size: None,
            max_grains: Self::DEFAULT_MAX_GRAINS,
            exclude_border: ExcludeBorder::Off,
        }
    }
}

/// Errors that can occur during segmentation.
#[derive(Debug, thiserror::Error)]
pub enum SeparateError {
    /// The input frame has zero width or height.
    #[error("input frame is empty")]
    EmptyFrame,

    /// A configuration parameter is out of range.
    #[error("invalid segmentation configuration: {0}")]
    InvalidConfig(String),

    /// Two frames that must share a shape do not.
    #[error("frame shapes differ: {a_width}x{a_height} vs {b_width}x{b_height}")]
    ShapeMismatch {
        /// Width of the first frame.
        a_width: u32,
        /// Height of the first frame.
        a_height: u32,
        /// Width of the second frame.
        b_width: u32,
        /// Height of the second frame.
        b_height: u32,
    },
}

/// Non-fatal conditions surfaced alongside a segmentation result.
///
/// These replace stdout diagnostics: a frame with no labeled regions is a
/// valid (empty) result, but callers usually want to know about it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SeparateNotice {
    /// The watershed produced no labeled regions. Typically the threshold
    /// removed every pixel or no seed survived border exclusion.
    NoRegionsFound,
}

impl fmt::Display for SeparateNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoRegionsFound => {
                write!(f, "no labeled regions were found; check threshold and min_distance")
            }
        }
    }
}

/// A stack of per-grain intensity frames.
///
/// Slot `k` holds the input frame's intensities restricted to grain `k`'s
/// support and zero elsewhere. Slot order follows the ascending original
/// watershed label order. Marker labels are assigned in raster order, so
/// raising the grain cap grows the set of grains but can renumber labels
/// and reorder slots.
///
/// Serialized as `(width, height, [raw_slot_buffers])` since `f32` image
/// buffers do not implement serde traits.
#[derive(Debug, Clone, PartialEq)]
pub struct GrainStack {
    width: u32,
    height: u32,
    slots: Vec<Frame>,
}

impl GrainStack {
    /// Build a stack from per-grain frames. Every slot must already have
    /// the given dimensions.
    pub(crate) const fn new(width: u32, height: u32, slots: Vec<Frame>) -> Self {
        Self {
            width,
            height,
            slots,
        }
    }

    /// Frame width in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Frame height in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Number of retained grains.
    #[must_use]
    pub const fn depth(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` if no grain survived.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// The per-grain frame at slot `k`, if present.
    #[must_use]
    pub fn slot(&self, k: usize) -> Option<&Frame> {
        self.slots.get(k)
    }

    /// All per-grain frames, in slot order.
    #[must_use]
    pub fn slots(&self) -> &[Frame] {
        &self.slots
    }

    /// Pixelwise sum over all slots.
    ///
    /// Grain supports are disjoint, so this equals the input frame on the
    /// union of retained supports and zero elsewhere.
    #[must_use]
    pub fn summed(&self) -> Frame {
        let mut sum = Frame::new(self.width, self.height);
        for slot in &self.slots {
            for (acc, value) in sum.iter_mut().zip(slot.iter()) {
                *acc += value;
            }
        }
        sum
    }
}

/// Serde-compatible proxy for [`GrainStack`].
#[derive(Serialize, Deserialize)]
struct GrainStackProxy {
    width: u32,
    height: u32,
    slots: Vec<Vec<f32>>,
}

impl Serialize for GrainStack {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let proxy = GrainStackProxy {
            width: self.width,
            height: self.height,
            slots: self.slots.iter().map(|s| s.as_raw().clone()).collect(),
        };
        proxy.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for GrainStack {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let proxy = GrainStackProxy::deserialize(deserializer)?;
        let expected = proxy.width as usize * proxy.height as usize;
        let mut slots = Vec::with_capacity(proxy.slots.len());
        for raw in proxy.slots {
            if raw.len() != expected {
                return Err(serde::de::Error::custom("grain slot length mismatch"));
            }
            let frame = Frame::from_raw(proxy.width, proxy.height, raw)
                .ok_or_else(|| serde::de::Error::custom("invalid grain slot dimensions"))?;
            slots.push(frame);
        }
        Ok(Self {
            width: proxy.width,
            height: proxy.height,
            slots,
        })
    }
}

/// Result of segmenting one frame.
#[derive(Debug, Clone)]
pub struct Segmentation {
    /// Per-grain intensity frames that survived the size filter.
    pub grains: GrainStack,
    /// Non-fatal diagnostic, if any.
    pub notice: Option<SeparateNotice>,
}

/// Result of segmenting one frame with all intermediate stage outputs
/// preserved.
///
/// Each field captures the output of one pipeline stage, enabling
/// rendering and diagnostics without recomputation. Does not implement
/// serde traits; persist the [`Segmentation`] instead.
#[derive(Debug, Clone)]
pub struct StagedSeparation {
    /// Stage 0: the input frame.
    pub frame: Frame,
    /// Stage 1: thresholded foreground mask (255 = foreground).
    pub mask: GrayImage,
    /// Stage 2: Euclidean distance to the nearest background pixel.
    pub distance: Frame,
    /// Stage 3: seed pixels (local maxima of the distance field).
    pub seeds: GrayImage,
    /// Stage 4: Sobel edge-strength elevation surface.
    pub elevation: Frame,
    /// Stage 5: watershed label field.
    pub labels: LabelField,
    /// Stages 6-8: size-filtered per-grain stack plus notice.
    pub segmentation: Segmentation,
}
