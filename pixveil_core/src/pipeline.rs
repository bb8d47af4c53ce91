//! Pipeline controller: fixed-order composition of the four transforms.
//!
//! Encode runs Mask → Noise → Permutation → Channel Rotation and emits the
//! noise matrix and permutation it used. Decode runs the mirror image,
//! inverse Rotation → inverse Permutation → inverse Noise → inverse Mask,
//! consuming those artifacts. The operations do not commute, so the order is
//! part of the format: a decode that replays the stages in any other order
//! does not reconstruct the input.
//!
//! A failing stage aborts the whole pass; no partial buffer is returned.

use log::{debug, warn};
use rand::Rng;

use crate::buffer::PixelBuffer;
use crate::config::PipelineConfig;
use crate::error::TransformError;
use crate::mask::MaskSpec;
use crate::noise::{self, NoiseMatrix};
use crate::permutation::{self, PermutationIndices};
use crate::rotation;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EncodeState {
    Idle,
    MaskApplied,
    NoiseApplied,
    Permuted,
    Rotated,
    Done,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecodeState {
    Idle,
    Unrotated,
    Unpermuted,
    Denoised,
    Unmasked,
    Done,
}

/// States a pass walks through, in order.
pub trait PassState: Copy + std::fmt::Debug + PartialEq {
    const PASS: &'static str;
    fn next(self) -> Option<Self>;
}

impl PassState for EncodeState {
    const PASS: &'static str = "encode";

    fn next(self) -> Option<Self> {
        match self {
            EncodeState::Idle => Some(EncodeState::MaskApplied),
            EncodeState::MaskApplied => Some(EncodeState::NoiseApplied),
            EncodeState::NoiseApplied => Some(EncodeState::Permuted),
            EncodeState::Permuted => Some(EncodeState::Rotated),
            EncodeState::Rotated => Some(EncodeState::Done),
            EncodeState::Done => None,
        }
    }
}

impl PassState for DecodeState {
    const PASS: &'static str = "decode";

    fn next(self) -> Option<Self> {
        match self {
            DecodeState::Idle => Some(DecodeState::Unrotated),
            DecodeState::Unrotated => Some(DecodeState::Unpermuted),
            DecodeState::Unpermuted => Some(DecodeState::Denoised),
            DecodeState::Denoised => Some(DecodeState::Unmasked),
            DecodeState::Unmasked => Some(DecodeState::Done),
            DecodeState::Done => None,
        }
    }
}

/// Visited states and non-fatal advisories for one pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PassReport<S> {
    pub trace: Vec<S>,
    pub advisories: Vec<TransformError>,
}

impl<S: PassState> PassReport<S> {
    fn start(initial: S, advisories: Vec<TransformError>) -> Self {
        debug!("{} pass: {:?}", S::PASS, initial);
        Self {
            trace: vec![initial],
            advisories,
        }
    }

    fn enter(&mut self, next: S) {
        let current = self.state();
        debug_assert_eq!(current.next(), Some(next), "illegal {} transition", S::PASS);
        debug!("{} pass: {:?} -> {:?}", S::PASS, current, next);
        self.trace.push(next);
    }

    /// The last state reached.
    pub fn state(&self) -> S {
        self.trace[self.trace.len() - 1]
    }

    pub fn has_fidelity_loss(&self) -> bool {
        self.advisories
            .iter()
            .any(|a| matches!(a, TransformError::FidelityLoss { .. }))
    }
}

/// Result of an encode pass: the obfuscated buffer and the side-channel
/// artifacts decode will need.
#[derive(Clone, Debug)]
pub struct Encoded {
    pub buffer: PixelBuffer,
    pub noise: NoiseMatrix,
    pub permutation: PermutationIndices,
    pub report: PassReport<EncodeState>,
}

#[derive(Clone, Debug)]
pub struct Decoded {
    pub buffer: PixelBuffer,
    pub report: PassReport<DecodeState>,
}

/// Validated pipeline parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pipeline {
    mask: MaskSpec,
    noise_level: i64,
    shift_amount: i64,
}

impl Pipeline {
    pub fn new(config: &PipelineConfig) -> Result<Self, TransformError> {
        let mask = config.validate()?;
        Ok(Self {
            mask,
            noise_level: config.noise_level,
            shift_amount: config.shift_amount,
        })
    }

    pub fn mask(&self) -> MaskSpec {
        self.mask
    }

    pub fn noise_level(&self) -> i64 {
        self.noise_level
    }

    pub fn shift_amount(&self) -> i64 {
        self.shift_amount
    }

    /// Samples fresh artifacts from `rng` (noise first, then permutation) and encodes.
    pub fn encode<R: Rng + ?Sized>(
        &self,
        buffer: PixelBuffer,
        rng: &mut R,
    ) -> Result<Encoded, TransformError> {
        let noise = noise::generate(buffer.height(), buffer.width(), self.noise_level, rng)?;
        let permutation = permutation::generate(buffer.pixel_count(), rng);
        self.encode_with_artifacts(buffer, noise, permutation)
    }

    /// Encodes with caller-supplied artifacts instead of sampling them.
    pub fn encode_with_artifacts(
        &self,
        buffer: PixelBuffer,
        noise: NoiseMatrix,
        permutation: PermutationIndices,
    ) -> Result<Encoded, TransformError> {
        let mut report = PassReport::start(EncodeState::Idle, self.advisories());

        let buffer = self.mask.apply(buffer)?;
        report.enter(EncodeState::MaskApplied);
        let buffer = noise::apply_matrix(buffer, &noise)?;
        report.enter(EncodeState::NoiseApplied);
        let buffer = permutation::apply_indices(buffer, &permutation)?;
        report.enter(EncodeState::Permuted);
        let buffer = rotation::apply(buffer, self.shift_amount);
        report.enter(EncodeState::Rotated);
        report.enter(EncodeState::Done);

        Ok(Encoded {
            buffer,
            noise,
            permutation,
            report,
        })
    }

    pub fn decode(
        &self,
        buffer: PixelBuffer,
        noise: &NoiseMatrix,
        permutation: &PermutationIndices,
    ) -> Result<Decoded, TransformError> {
        let mut report = PassReport::start(DecodeState::Idle, self.advisories());

        let buffer = rotation::invert(buffer, self.shift_amount);
        report.enter(DecodeState::Unrotated);
        let buffer = permutation::invert(buffer, permutation)?;
        report.enter(DecodeState::Unpermuted);
        let buffer = noise::invert(buffer, noise)?;
        report.enter(DecodeState::Denoised);
        let buffer = self.mask.invert(buffer)?;
        report.enter(DecodeState::Unmasked);
        report.enter(DecodeState::Done);

        Ok(Decoded { buffer, report })
    }

    fn advisories(&self) -> Vec<TransformError> {
        let advisory = self.mask.fidelity_advisory();
        if let Some(advisory) = &advisory {
            warn!("{advisory}");
        }
        advisory.into_iter().collect()
    }
}
