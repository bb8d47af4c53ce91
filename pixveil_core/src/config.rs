use serde::{Deserialize, Serialize};

use crate::error::TransformError;
use crate::mask::{MaskKey, MaskMode, MaskSpec};
use crate::noise::validate_level;

pub const DEFAULT_KEY: i64 = 50;
pub const DEFAULT_NOISE_LEVEL: i64 = 50;
pub const DEFAULT_SHIFT_AMOUNT: i64 = 1;

/// The externally tunable parameters of one encode/decode pair.
///
/// Decode must be given the same values that encode used; `noise_level` only
/// affects encode, decode replays the persisted matrix.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub operation: MaskMode,
    pub key: MaskKey,
    pub noise_level: i64,
    pub shift_amount: i64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            operation: MaskMode::Add,
            key: MaskKey::Scalar(DEFAULT_KEY),
            noise_level: DEFAULT_NOISE_LEVEL,
            shift_amount: DEFAULT_SHIFT_AMOUNT,
        }
    }
}

impl PipelineConfig {
    pub fn new(operation: MaskMode, key: MaskKey, noise_level: i64, shift_amount: i64) -> Self {
        Self {
            operation,
            key,
            noise_level,
            shift_amount,
        }
    }

    pub fn with_operation(mut self, operation: MaskMode, key: MaskKey) -> Self {
        self.operation = operation;
        self.key = key;
        self
    }

    pub fn with_noise_level(mut self, noise_level: i64) -> Self {
        self.noise_level = noise_level;
        self
    }

    pub fn with_shift_amount(mut self, shift_amount: i64) -> Self {
        self.shift_amount = shift_amount;
        self
    }

    pub fn mask_spec(&self) -> Result<MaskSpec, TransformError> {
        MaskSpec::new(self.operation, self.key)
    }

    /// Checks every parameter before any pixel is touched.
    pub fn validate(&self) -> Result<MaskSpec, TransformError> {
        validate_level(self.noise_level)?;
        self.mask_spec()
    }
}
