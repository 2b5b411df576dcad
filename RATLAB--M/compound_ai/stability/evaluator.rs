use ndarray::Array2;

use super::{
    quantum::{self, QuantumState},
    signature::{self, CompoundSignature},
    EntropyLevel, StabilityScore, STABILITY_DIM,
};
use crate::{config::CompoundTable, entity::EntitySnapshot};

/// Ability whose unlock doubles the mutation factor.
pub const MUTATION_ABILITY: &str = "mutation";

/// Pure stability computations over an entity snapshot and a wall-clock instant.
#[derive(Debug, Clone, Default)]
pub struct StabilityEvaluator {
    table: CompoundTable,
}

impl StabilityEvaluator {
    /// Creates an evaluator over an immutable compound table.
    #[must_use]
    pub const fn new(table: CompoundTable) -> Self {
        Self { table }
    }

    /// Compound table in use.
    #[must_use]
    pub const fn table(&self) -> &CompoundTable {
        &self.table
    }

    /// Entropy of the entity's compound: table base scaled by mutation count.
    #[must_use]
    pub fn entropy(&self, entity: &EntitySnapshot) -> f64 {
        signature::scaled_entropy(
            self.table.base_entropy(&entity.compound),
            entity.mutation_count(),
        )
    }

    /// Builds the compound signature. `stability_matrix` is copied in as-is.
    #[must_use]
    pub fn signature(
        &self,
        entity: &EntitySnapshot,
        stability_matrix: Array2<f64>,
        now_ms: f64,
    ) -> CompoundSignature {
        CompoundSignature {
            encoded: signature::encode_compound(&entity.compound),
            mutation_factor: signature::mutation_factor(
                entity.is_unlocked(MUTATION_ABILITY),
                now_ms,
            ),
            entropy: self.entropy(entity),
            stability_matrix,
        }
    }

    /// Derives the heuristic quantum state.
    #[must_use]
    pub fn quantum_state(&self, entity: &EntitySnapshot, now_ms: f64) -> QuantumState {
        let transforming =
            self.table.is_transformation(&entity.compound) && entity.transform_target.is_some();
        QuantumState {
            superposition: quantum::superposition(
                entity.is_transformed,
                quantum::fluctuation(now_ms),
                entity.unlocked_fraction(),
            ),
            entanglement: quantum::entanglement(transforming, entity.mutation_count()),
            coherence: quantum::coherence_time(entity.size, entity.initial_size, entity.speed),
        }
    }

    /// `factor[i] = |sin(i * entropy) * cos(coherence * i)|`, their mean, and the
    /// entropy classification.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn evaluate(&self, signature: &CompoundSignature, quantum_state: QuantumState) -> StabilityScore {
        let mut factors = [0.0; STABILITY_DIM];
        for (i, factor) in factors.iter_mut().enumerate() {
            let i = i as f64;
            *factor = ((i * signature.entropy).sin() * (quantum_state.coherence * i).cos()).abs();
        }
        let overall_stability = factors.iter().sum::<f64>() / STABILITY_DIM as f64;
        StabilityScore {
            factors,
            overall_stability,
            entropy_level: EntropyLevel::classify(signature.entropy, self.table.entropy_threshold),
            quantum_state,
        }
    }
}
