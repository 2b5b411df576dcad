//! Heuristic stability assessment: signature, quantum state, and the 16-factor vector.

/// Stability scoring from signature and quantum state.
pub mod evaluator;
/// Quantum-state heuristics.
pub mod quantum;
/// Compound signature and the persistent stability matrix.
pub mod signature;

use serde::{Deserialize, Serialize};

pub use evaluator::StabilityEvaluator;
pub use quantum::QuantumState;
pub use signature::{CompoundSignature, StabilityMatrix};

/// Length of every stability vector and side of every stability matrix.
pub const STABILITY_DIM: usize = 16;

/// Two-valued entropy classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntropyLevel {
    /// Entropy below the threshold.
    Stable,
    /// Entropy at or above the threshold.
    Unstable,
}

impl EntropyLevel {
    /// `Stable` iff `entropy < threshold`.
    #[must_use]
    pub fn classify(entropy: f64, threshold: f64) -> Self {
        if entropy < threshold {
            Self::Stable
        } else {
            Self::Unstable
        }
    }
}

/// Output of the stability evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StabilityScore {
    /// Per-index stability factors, each in `[0, 1]`.
    pub factors: [f64; STABILITY_DIM],
    /// Mean of `factors`.
    pub overall_stability: f64,
    /// Entropy classification of the signature.
    pub entropy_level: EntropyLevel,
    /// Quantum state the factors were derived from.
    pub quantum_state: QuantumState,
}
