//! Diffraction-vector sets: merging and exact deduplication.
//!
//! When grains are merged, the diffraction vectors associated with each
//! contributing grain are concatenated and exact duplicates removed. The
//! survivor of a duplicate group is the LAST occurrence; earlier copies
//! are dropped, and the relative order of survivors is preserved.
//!
//! Equality is exact on both `f64` coordinates, with no tolerance. This
//! matches the upstream behavior but is fragile for physically derived
//! coordinates: near-duplicates produced by rounding will NOT be merged.

use serde::{Deserialize, Serialize};

/// A single 2D diffraction vector.
pub type Vector2 = [f64; 2];

/// The flat coordinate data does not split into 2D vectors.
#[derive(Debug, thiserror::Error)]
#[error("flat coordinate data of length {len} is not a sequence of 2D vectors")]
pub struct VectorShapeError {
    /// Length of the offending flat buffer.
    pub len: usize,
}

/// An ordered set of 2D diffraction vectors.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VectorSet(Vec<Vector2>);

impl VectorSet {
    /// Create a vector set from coordinate pairs.
    #[must_use]
    pub const fn new(vectors: Vec<Vector2>) -> Self {
        Self(vectors)
    }

    /// Create a vector set holding a single vector.
    #[must_use]
    pub fn single(vector: Vector2) -> Self {
        Self(vec![vector])
    }

    /// Create a vector set from flat `[x0, y0, x1, y1, ...]` data.
    ///
    /// # Errors
    ///
    /// Returns [`VectorShapeError`] when the length is odd.
    pub fn from_flat(data: &[f64]) -> Result<Self, VectorShapeError> {
        if data.len() % 2 != 0 {
            return Err(VectorShapeError { len: data.len() });
        }
        Ok(Self(data.chunks_exact(2).map(|pair| [pair[0], pair[1]]).collect()))
    }

    /// Number of vectors in the set.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the set has no vectors.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// All vectors, in order.
    #[must_use]
    pub fn vectors(&self) -> &[Vector2] {
        &self.0
    }

    /// Consumes the set and returns the underlying vectors.
    #[must_use]
    pub fn into_vectors(self) -> Vec<Vector2> {
        self.0
    }
}

/// Merge candidate vector groups into a base set and drop exact duplicates.
///
/// Every group is appended to the base accumulator in order (a group may
/// hold one vector or many). A vector is then dropped if an exactly equal
/// vector occurs LATER in the accumulated sequence, so the last occurrence
/// of each duplicate wins and survivor order is preserved.
///
/// Exact `f64` equality is deliberate and matches the merging convention
/// for grain diffraction vectors; see the module docs for the caveat.
#[must_use = "returns the merged, deduplicated vector set"]
pub fn merge_and_dedupe(base: &VectorSet, groups: &[VectorSet]) -> VectorSet {
    let mut merged: Vec<Vector2> = base.vectors().to_vec();
    for group in groups {
        merged.extend_from_slice(group.vectors());
    }

    let deduped: Vec<Vector2> = merged
        .iter()
        .enumerate()
        .filter(|&(i, vector)| !merged[i + 1..].contains(vector))
        .map(|(_, vector)| *vector)
        .collect();

    VectorSet::new(deduped)
}
