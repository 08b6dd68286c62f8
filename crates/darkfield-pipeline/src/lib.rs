//! darkfield-pipeline: Pure grain-segmentation pipeline (sans-IO).
//!
//! Splits a virtual dark-field intensity frame into per-grain images
//! through:
//! threshold mask -> distance transform -> seed finding ->
//! Sobel elevation -> marker watershed -> size filter -> grain stack.
//!
//! This crate has **no I/O dependencies** -- it operates on in-memory
//! intensity frames and returns structured data. Image decoding, file
//! output, and timing live in the binaries that wrap it.

pub mod correlate;
pub mod diagnostics;
pub mod distance;
pub mod elevation;
pub mod mask;
pub mod peaks;
pub mod render;
pub mod segment;
pub mod types;
pub mod vectors;
pub mod watershed;

pub use correlate::normalized_cross_correlation;
pub use segment::{separate, separate_staged};
pub use types::{
    ExcludeBorder, Frame, GrainStack, LabelField, Segmentation, SeparateConfig, SeparateError,
    SeparateNotice, StagedSeparation,
};
pub use vectors::{Vector2, VectorSet, VectorShapeError, merge_and_dedupe};
