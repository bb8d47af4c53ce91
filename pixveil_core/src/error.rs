use thiserror::Error;

/// Failures raised by the transform stage and the pipeline controller.
///
/// `FidelityLoss` is advisory: the pipeline never returns it as an `Err`,
/// it is logged and collected into the pass report instead.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransformError {
    #[error("invalid mask key: {0}")]
    InvalidKey(String),

    #[error("unsupported mask operation '{0}' (expected add, multiply or swap)")]
    UnsupportedMode(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("shape mismatch for {context}: expected {expected}, found {found}")]
    ShapeMismatch {
        context: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("multiply key {key} cannot be inverted exactly; restored pixels may differ")]
    FidelityLoss { key: i64 },

    #[error("invalid side-channel artifact: {0}")]
    InvalidArtifact(String),
}
