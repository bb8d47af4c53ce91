//! Pixel permutation over the flattened (row-major) triplet sequence.
//!
//! Encode gathers `out[i] = in[indices[i]]`; decode scatters
//! `out[indices[i]] = in[i]`, the exact inverse for any permutation.
//!
//! # Cross-platform portability
//!
//! Indices are stored and drawn as `u64` rather than `usize` so that a seeded
//! generator yields the same shuffle on 32-bit and 64-bit targets, and so a
//! persisted table never narrows when read back on another platform.

use log::debug;
use rand::Rng;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::buffer::{CHANNELS, PixelBuffer};
use crate::error::TransformError;
use crate::versioning::{PERMUTATION_INDICES_VERSION, expect_version};

/// A permutation of `[0, N)` where `N` is the pixel count of the buffer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PermutationIndices {
    indices: Vec<u64>,
}

impl PermutationIndices {
    /// Validates that `indices` holds every value of `[0, len)` exactly once.
    pub fn new(indices: Vec<u64>) -> Result<Self, TransformError> {
        let n = indices.len();
        let mut seen = vec![false; n];
        for (position, &index) in indices.iter().enumerate() {
            if index >= n as u64 {
                return Err(TransformError::InvalidArtifact(format!(
                    "index {index} at position {position} is out of range for {n} pixels"
                )));
            }
            let slot = &mut seen[index as usize];
            if *slot {
                return Err(TransformError::InvalidArtifact(format!(
                    "index {index} appears more than once"
                )));
            }
            *slot = true;
        }
        Ok(Self { indices })
    }

    pub fn identity(n: usize) -> Self {
        Self {
            indices: (0..n as u64).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn as_slice(&self) -> &[u64] {
        &self.indices
    }

    fn check_len(&self, buffer: &PixelBuffer) -> Result<(), TransformError> {
        if self.indices.len() != buffer.pixel_count() {
            return Err(TransformError::ShapeMismatch {
                context: "PermutationIndices",
                expected: buffer.pixel_count(),
                found: self.indices.len(),
            });
        }
        Ok(())
    }
}

impl Serialize for PermutationIndices {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("PermutationIndices", 2)?;
        state.serialize_field("version", &PERMUTATION_INDICES_VERSION)?;
        state.serialize_field("indices", &self.indices)?;
        state.end()
    }
}

impl<'de> Deserialize<'de> for PermutationIndices {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Helper {
            version: u16,
            indices: Vec<u64>,
        }
        let helper = Helper::deserialize(deserializer)?;
        expect_version::<D::Error>(
            helper.version,
            PERMUTATION_INDICES_VERSION,
            "PermutationIndices",
        )?;
        PermutationIndices::new(helper.indices).map_err(serde::de::Error::custom)
    }
}

/// Draws a uniform permutation of `[0, n)` with a Fisher-Yates shuffle.
pub fn generate<R: Rng + ?Sized>(n: usize, rng: &mut R) -> PermutationIndices {
    let mut indices: Vec<u64> = (0..n as u64).collect();
    for i in (1..n).rev() {
        let j = rng.gen_range(0..=(i as u64)) as usize;
        indices.swap(i, j);
    }
    debug!("sampled permutation over {} pixels", n);
    PermutationIndices { indices }
}

/// Reorders pixels by gathering `out[i] = in[indices[i]]`.
pub fn apply_indices(
    buffer: PixelBuffer,
    indices: &PermutationIndices,
) -> Result<PixelBuffer, TransformError> {
    indices.check_len(&buffer)?;
    let source = buffer.as_bytes();
    let mut data = Vec::with_capacity(source.len());
    for &index in &indices.indices {
        let start = index as usize * CHANNELS;
        data.extend_from_slice(&source[start..start + CHANNELS]);
    }
    Ok(buffer.with_data(data))
}

pub fn apply<R: Rng + ?Sized>(
    buffer: PixelBuffer,
    rng: &mut R,
) -> Result<(PixelBuffer, PermutationIndices), TransformError> {
    let indices = generate(buffer.pixel_count(), rng);
    let shuffled = apply_indices(buffer, &indices)?;
    Ok((shuffled, indices))
}

/// Restores pixel order by scattering `out[indices[i]] = in[i]`.
pub fn invert(
    buffer: PixelBuffer,
    indices: &PermutationIndices,
) -> Result<PixelBuffer, TransformError> {
    indices.check_len(&buffer)?;
    let source = buffer.as_bytes();
    let mut data = vec![0u8; source.len()];
    for (pixel, &index) in source.chunks_exact(CHANNELS).zip(&indices.indices) {
        let start = index as usize * CHANNELS;
        data[start..start + CHANNELS].copy_from_slice(pixel);
    }
    Ok(buffer.with_data(data))
}
