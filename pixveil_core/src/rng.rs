//! RNG helpers separating reproducible seeded generators from the OS RNG.
//!
//! Every transform that needs randomness takes its generator as an argument.
//! Callers that want reproducible side-channel artifacts derive a
//! `ChaCha20Rng` from a seed and a per-artifact label via BLAKE3; everyone
//! else uses the OS-backed `OsRng`.

use blake3::Hasher;
use rand::rngs::OsRng;
use rand_chacha::ChaCha20Rng;
use rand_core::SeedableRng;

/// Convenience alias for the OS-backed RNG used when no seed is supplied.
pub type SecureRng = OsRng;

pub const NOISE_LABEL: &[u8] = b"noise";
pub const PERMUTATION_LABEL: &[u8] = b"permutation";

/// Deterministic RNG derived from a seed and a domain label.
pub fn derive_session_rng(seed: &[u8], label: &[u8]) -> ChaCha20Rng {
    let mut hasher = Hasher::new();
    hasher.update(b"pixveil::session-rng");
    hasher.update(&(seed.len() as u64).to_le_bytes());
    hasher.update(seed);
    hasher.update(label);
    ChaCha20Rng::from_seed(*hasher.finalize().as_bytes())
}

pub fn secure_rng() -> SecureRng {
    OsRng
}
