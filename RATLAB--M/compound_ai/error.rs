use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by the compound evolution pipeline.
///
/// Validation happens up front: an analysis either produces a full outcome or
/// returns one of these without touching orchestrator state.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EvolutionError {
    /// The entity snapshot is missing data or carries values the formulas cannot use.
    #[error("invalid entity field `{field}`: {reason}")]
    InvalidEntity {
        /// Offending snapshot field.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
    /// Predictor input width does not match the first layer's fan-in.
    #[error("predictor expected {expected} input features, received {actual}")]
    DimensionMismatch {
        /// Configured fan-in of the first layer.
        expected: usize,
        /// Width of the batch that was supplied.
        actual: usize,
    },
    /// Predictor layer list cannot form a network.
    #[error("invalid predictor topology: {0}")]
    InvalidTopology(String),
    /// Activation name outside relu/sigmoid/tanh.
    #[error("unknown activation `{0}` (expected relu, sigmoid, or tanh)")]
    UnknownActivation(String),
    /// Configuration could not be read, parsed, or validated.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl EvolutionError {
    pub(crate) fn invalid_entity(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidEntity {
            field,
            reason: reason.into(),
        }
    }
}

/// Result alias used across the crate.
pub type Result<T, E = EvolutionError> = std::result::Result<T, E>;

/// Non-fatal conditions attached to an outcome.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EvolutionWarning {
    /// The ability-unlock matrix was all zeros, so normalization was skipped.
    DegenerateNormalization,
}
