use thiserror::Error;

use crate::buffer::PixelBuffer;
use crate::config::PipelineConfig;
use crate::error::TransformError;
use crate::noise;
use crate::permutation;
use crate::pipeline::{DecodeState, Decoded, EncodeState, Encoded, PassReport, Pipeline};
use crate::rng::{NOISE_LABEL, PERMUTATION_LABEL, derive_session_rng, secure_rng};
use crate::store::{ArtifactStore, StoreError};

#[derive(Debug, Error)]
pub enum VeilSessionError {
    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// High-level encode/decode pair bound to one configuration.
///
/// Artifacts are sampled from the OS RNG unless a seed is supplied, in which
/// case the noise matrix and the permutation each come from their own
/// seed-derived stream and are reproducible.
#[derive(Clone, Debug)]
pub struct VeilSession {
    config: PipelineConfig,
    pipeline: Pipeline,
    seed: Option<Vec<u8>>,
}

impl VeilSession {
    pub fn new(config: PipelineConfig) -> Result<Self, TransformError> {
        let pipeline = Pipeline::new(&config)?;
        Ok(Self {
            config,
            pipeline,
            seed: None,
        })
    }

    pub fn with_seed(mut self, seed: impl Into<Vec<u8>>) -> Self {
        self.seed = Some(seed.into());
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn encode(&self, buffer: PixelBuffer) -> Result<Encoded, TransformError> {
        let Some(seed) = &self.seed else {
            return self.pipeline.encode(buffer, &mut secure_rng());
        };
        let noise = noise::generate(
            buffer.height(),
            buffer.width(),
            self.pipeline.noise_level(),
            &mut derive_session_rng(seed, NOISE_LABEL),
        )?;
        let permutation = permutation::generate(
            buffer.pixel_count(),
            &mut derive_session_rng(seed, PERMUTATION_LABEL),
        );
        self.pipeline.encode_with_artifacts(buffer, noise, permutation)
    }

    /// Encodes and hands both artifacts to `store` before returning. If the
    /// store fails, whatever it held before is kept.
    pub fn encode_into<S: ArtifactStore + ?Sized>(
        &self,
        buffer: PixelBuffer,
        store: &mut S,
    ) -> Result<(PixelBuffer, PassReport<EncodeState>), VeilSessionError> {
        let encoded = self.encode(buffer)?;
        store.save_artifacts(&encoded.noise, &encoded.permutation)?;
        Ok((encoded.buffer, encoded.report))
    }

    /// Loads both artifacts from `store` in full, then decodes.
    pub fn decode_from<S: ArtifactStore + ?Sized>(
        &self,
        buffer: PixelBuffer,
        store: &S,
    ) -> Result<(PixelBuffer, PassReport<DecodeState>), VeilSessionError> {
        let noise = store.load_noise()?;
        let permutation = store.load_permutation()?;
        let Decoded { buffer, report } = self.pipeline.decode(buffer, &noise, &permutation)?;
        Ok((buffer, report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mask::{MaskKey, MaskMode};
    use crate::store::{JsonFileStore, MemoryStore};
    use tempfile::tempdir;

    fn photo() -> PixelBuffer {
        let data = (0..6 * 5 * 3).map(|i| (i * 13 % 256) as u8).collect();
        PixelBuffer::new(6, 5, data).unwrap()
    }

    #[test]
    fn session_roundtrip_through_files() {
        let dir = tempdir().unwrap();
        let mut store =
            JsonFileStore::new(dir.path().join("noise.json"), dir.path().join("shuffle.json"));
        let session = VeilSession::new(PipelineConfig::default().with_shift_amount(2)).unwrap();
        let (obfuscated, report) = session.encode_into(photo(), &mut store).unwrap();
        assert_eq!(report.state(), EncodeState::Done);
        let (restored, report) = session.decode_from(obfuscated, &store).unwrap();
        assert_eq!(report.state(), DecodeState::Done);
        assert_eq!(restored, photo());
    }

    #[test]
    fn seeded_sessions_reproduce_artifacts() {
        let session = VeilSession::new(PipelineConfig::default())
            .unwrap()
            .with_seed(b"fixed".to_vec());
        let a = session.encode(photo()).unwrap();
        let b = session.encode(photo()).unwrap();
        assert_eq!(a.buffer, b.buffer);
        assert_eq!(a.noise, b.noise);
        assert_eq!(a.permutation, b.permutation);
    }

    #[test]
    fn swap_session_roundtrip_in_memory() {
        let config = PipelineConfig::default()
            .with_operation(MaskMode::Swap, "0,0,5,4".parse::<MaskKey>().unwrap());
        let session = VeilSession::new(config).unwrap();
        let mut store = MemoryStore::new();
        let (obfuscated, _) = session.encode_into(photo(), &mut store).unwrap();
        let (restored, _) = session.decode_from(obfuscated, &store).unwrap();
        assert_eq!(restored, photo());
    }

    #[test]
    fn failed_encode_keeps_previous_artifacts() {
        let dir = tempdir().unwrap();
        let noise_path = dir.path().join("noise.json");
        let shuffle_path = dir.path().join("shuffle.json");
        let session = VeilSession::new(PipelineConfig::default())
            .unwrap()
            .with_seed(b"earlier".to_vec());
        let mut store = JsonFileStore::new(&noise_path, &shuffle_path);
        let (earlier, _) = session.encode_into(photo(), &mut store).unwrap();
        let noise_before = std::fs::read(&noise_path).unwrap();

        let mut broken = JsonFileStore::new(&noise_path, dir.path().join("gone").join("s.json"));
        let err = session
            .clone()
            .with_seed(b"later".to_vec())
            .encode_into(photo(), &mut broken)
            .unwrap_err();
        assert!(matches!(err, VeilSessionError::Store(StoreError::Io { .. })));
        assert_eq!(std::fs::read(&noise_path).unwrap(), noise_before);

        let (restored, _) = session.decode_from(earlier, &store).unwrap();
        assert_eq!(restored, photo());
    }

    #[test]
    fn decode_without_artifacts_fails() {
        let session = VeilSession::new(PipelineConfig::default()).unwrap();
        let err = session.decode_from(photo(), &MemoryStore::new()).unwrap_err();
        assert!(matches!(err, VeilSessionError::Store(StoreError::Missing(_))));
    }
}
