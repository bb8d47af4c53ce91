//! Additive per-sample noise.
//!
//! The noise matrix is drawn from the caller's RNG at encode time and must be
//! persisted verbatim: decode replays the realized values, it never resamples.

use log::debug;
use rand::Rng;
use rand::distributions::{Distribution, Uniform};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::buffer::{CHANNELS, PixelBuffer};
use crate::error::TransformError;
use crate::versioning::{NOISE_MATRIX_VERSION, expect_version};

/// Largest accepted noise level; samples are bytes so the range tops out at 256.
pub const MAX_NOISE_LEVEL: i64 = 256;

/// Realized noise values, one per buffer sample, in buffer order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NoiseMatrix {
    height: usize,
    width: usize,
    values: Vec<u8>,
}

impl NoiseMatrix {
    pub fn new(height: usize, width: usize, values: Vec<u8>) -> Result<Self, TransformError> {
        let expected = height * width * CHANNELS;
        if values.len() != expected {
            return Err(TransformError::ShapeMismatch {
                context: "NoiseMatrix",
                expected,
                found: values.len(),
            });
        }
        Ok(Self {
            height,
            width,
            values,
        })
    }

    pub fn zeros(height: usize, width: usize) -> Self {
        Self {
            height,
            width,
            values: vec![0; height * width * CHANNELS],
        }
    }

    pub fn shape(&self) -> (usize, usize, usize) {
        (self.height, self.width, CHANNELS)
    }

    pub fn values(&self) -> &[u8] {
        &self.values
    }

    fn check_shape(&self, buffer: &PixelBuffer) -> Result<(), TransformError> {
        if self.shape() != buffer.shape() {
            return Err(TransformError::ShapeMismatch {
                context: "NoiseMatrix",
                expected: buffer.as_bytes().len(),
                found: self.values.len(),
            });
        }
        Ok(())
    }
}

impl Serialize for NoiseMatrix {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("NoiseMatrix", 4)?;
        state.serialize_field("version", &NOISE_MATRIX_VERSION)?;
        state.serialize_field("height", &self.height)?;
        state.serialize_field("width", &self.width)?;
        state.serialize_field("values", &self.values)?;
        state.end()
    }
}

impl<'de> Deserialize<'de> for NoiseMatrix {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Helper {
            version: u16,
            height: usize,
            width: usize,
            values: Vec<u8>,
        }
        let helper = Helper::deserialize(deserializer)?;
        expect_version::<D::Error>(helper.version, NOISE_MATRIX_VERSION, "NoiseMatrix")?;
        NoiseMatrix::new(helper.height, helper.width, helper.values)
            .map_err(serde::de::Error::custom)
    }
}

pub fn validate_level(noise_level: i64) -> Result<(), TransformError> {
    if noise_level <= 0 || noise_level > MAX_NOISE_LEVEL {
        return Err(TransformError::InvalidParameter(format!(
            "noise level must lie in 1..={MAX_NOISE_LEVEL}, got {noise_level}"
        )));
    }
    Ok(())
}

/// Samples a matrix with every value uniform in `[0, noise_level)`.
pub fn generate<R: Rng + ?Sized>(
    height: usize,
    width: usize,
    noise_level: i64,
    rng: &mut R,
) -> Result<NoiseMatrix, TransformError> {
    validate_level(noise_level)?;
    let dist = Uniform::from(0..noise_level as u16);
    let values = (0..height * width * CHANNELS)
        .map(|_| dist.sample(rng) as u8)
        .collect::<Vec<_>>();
    debug!(
        "sampled noise matrix {}x{}x{} level={}",
        height, width, CHANNELS, noise_level
    );
    Ok(NoiseMatrix {
        height,
        width,
        values,
    })
}

/// Adds a previously sampled matrix to the buffer, modulo 256.
pub fn apply_matrix(
    buffer: PixelBuffer,
    noise: &NoiseMatrix,
) -> Result<PixelBuffer, TransformError> {
    noise.check_shape(&buffer)?;
    let data = buffer
        .as_bytes()
        .iter()
        .zip(&noise.values)
        .map(|(p, n)| p.wrapping_add(*n))
        .collect();
    Ok(buffer.with_data(data))
}

pub fn apply<R: Rng + ?Sized>(
    buffer: PixelBuffer,
    noise_level: i64,
    rng: &mut R,
) -> Result<(PixelBuffer, NoiseMatrix), TransformError> {
    let noise = generate(buffer.height(), buffer.width(), noise_level, rng)?;
    let noisy = apply_matrix(buffer, &noise)?;
    Ok((noisy, noise))
}

pub fn invert(buffer: PixelBuffer, noise: &NoiseMatrix) -> Result<PixelBuffer, TransformError> {
    noise.check_shape(&buffer)?;
    let data = buffer
        .as_bytes()
        .iter()
        .zip(&noise.values)
        .map(|(p, n)| p.wrapping_sub(*n))
        .collect();
    Ok(buffer.with_data(data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::derive_session_rng;
    use proptest::prelude::*;

    #[test]
    fn generated_values_stay_below_level() {
        let mut rng = derive_session_rng(b"noise-range", b"noise");
        let noise = generate(8, 8, 5, &mut rng).unwrap();
        assert_eq!(noise.values().len(), 8 * 8 * 3);
        assert!(noise.values().iter().all(|&v| v < 5));
    }

    #[test]
    fn full_byte_range_level_allowed() {
        let mut rng = derive_session_rng(b"noise-full", b"noise");
        let noise = generate(4, 4, MAX_NOISE_LEVEL, &mut rng).unwrap();
        assert_eq!(noise.shape(), (4, 4, 3));
    }

    #[test]
    fn level_one_produces_zero_noise() {
        let mut rng = derive_session_rng(b"noise-one", b"noise");
        let buffer = PixelBuffer::filled(2, 3, [7, 8, 9]);
        let (noisy, noise) = apply(buffer.clone(), 1, &mut rng).unwrap();
        assert_eq!(noise, NoiseMatrix::zeros(2, 3));
        assert_eq!(noisy, buffer);
    }

    #[test]
    fn non_positive_or_oversized_level_rejected() {
        let mut rng = derive_session_rng(b"noise-bad", b"noise");
        for level in [0, -5, MAX_NOISE_LEVEL + 1] {
            let err = generate(1, 1, level, &mut rng).unwrap_err();
            assert!(matches!(err, TransformError::InvalidParameter(_)), "level {level}");
        }
    }

    #[test]
    fn wraps_on_overflow() {
        let buffer = PixelBuffer::filled(1, 1, [250, 0, 128]);
        let noise = NoiseMatrix::new(1, 1, vec![10, 0, 200]).unwrap();
        let noisy = apply_matrix(buffer.clone(), &noise).unwrap();
        assert_eq!(noisy.pixel(0, 0), Some([4, 0, 72]));
        assert_eq!(invert(noisy, &noise).unwrap(), buffer);
    }

    #[test]
    fn mismatched_matrix_rejected() {
        let buffer = PixelBuffer::zeros(2, 2);
        let noise = NoiseMatrix::zeros(2, 3);
        let err = invert(buffer, &noise).unwrap_err();
        assert!(matches!(err, TransformError::ShapeMismatch { .. }));
    }

    #[test]
    fn same_seed_replays_same_matrix() {
        let a = generate(3, 3, 50, &mut derive_session_rng(b"seed", b"noise")).unwrap();
        let b = generate(3, 3, 50, &mut derive_session_rng(b"seed", b"noise")).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn serde_roundtrip_preserves_values() {
        let noise = NoiseMatrix::new(1, 2, vec![0, 1, 2, 253, 254, 255]).unwrap();
        let encoded = serde_json::to_string(&noise).unwrap();
        let decoded: NoiseMatrix = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, noise);
    }

    #[test]
    fn deserialize_rejects_bad_version_and_length() {
        let stale = r#"{"version":9,"height":1,"width":1,"values":[0,0,0]}"#;
        assert!(serde_json::from_str::<NoiseMatrix>(stale).is_err());
        let short = r#"{"version":1,"height":1,"width":1,"values":[0,0]}"#;
        assert!(serde_json::from_str::<NoiseMatrix>(short).is_err());
    }

    proptest! {
        #[test]
        fn noise_is_reversible(
            data in prop::collection::vec(any::<u8>(), 18),
            values in prop::collection::vec(any::<u8>(), 18),
        ) {
            let buffer = PixelBuffer::new(2, 3, data).unwrap();
            let noise = NoiseMatrix::new(2, 3, values).unwrap();
            let restored = invert(apply_matrix(buffer.clone(), &noise).unwrap(), &noise).unwrap();
            prop_assert_eq!(restored, buffer);
        }
    }
}
