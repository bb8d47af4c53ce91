//! Reversible pixel obfuscation for RGB images.
//!
//! An encode pass masks pixel values with a key, adds sampled noise, shuffles
//! pixel positions and rotates colour channels. Decode undoes the same stages
//! in mirrored order, replaying the noise matrix and permutation that encode
//! produced. Those two artifacts are the side-channel secrets of a session and
//! must be persisted verbatim between the passes.
//!
//! This is masking, not encryption: it offers no confidentiality against
//! anyone who can observe or guess the artifacts.

pub mod buffer;
pub mod config;
pub mod error;
pub mod mask;
pub mod noise;
pub mod permutation;
pub mod pipeline;
pub mod rng;
pub mod rotation;
pub mod session;
pub mod store;
pub mod versioning;

pub use crate::buffer::{CHANNELS, PixelBuffer};
pub use crate::config::PipelineConfig;
pub use crate::error::TransformError;
pub use crate::mask::{Coordinates, MaskKey, MaskMode, MaskSpec};
pub use crate::noise::{MAX_NOISE_LEVEL, NoiseMatrix};
pub use crate::permutation::PermutationIndices;
pub use crate::pipeline::{
    DecodeState, Decoded, EncodeState, Encoded, PassReport, PassState, Pipeline,
};
pub use crate::rng::{SecureRng, derive_session_rng, secure_rng};
pub use crate::session::{VeilSession, VeilSessionError};
pub use crate::store::{ArtifactStore, JsonFileStore, MemoryStore, StoreError};
pub use crate::versioning::*;
