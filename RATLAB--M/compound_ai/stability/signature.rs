use base64::{engine::general_purpose::STANDARD, Engine as _};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use super::STABILITY_DIM;
use crate::entity::Compound;

/// Base rate of the mutation factor.
pub const BASE_MUTATION_RATE: f64 = 0.01;

/// Fingerprint of a compound at analysis time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompoundSignature {
    /// Base64 encoding of the compound identifier.
    pub encoded: String,
    /// Time-oscillating mutation factor.
    pub mutation_factor: f64,
    /// Base entropy scaled by mutation count.
    pub entropy: f64,
    /// Copy of the stability matrix at signature time.
    pub stability_matrix: Array2<f64>,
}

/// Standard base64 of the compound identifier.
#[must_use]
pub fn encode_compound(compound: &Compound) -> String {
    STANDARD.encode(compound.as_str())
}

/// `0.01 * (2 if mutation unlocked else 1) * (1 + |sin(now_ms / 10000)|)`.
#[must_use]
pub fn mutation_factor(mutation_unlocked: bool, now_ms: f64) -> f64 {
    let multiplier = if mutation_unlocked { 2.0 } else { 1.0 };
    BASE_MUTATION_RATE * multiplier * (1.0 + (now_ms / 10_000.0).sin().abs())
}

/// `base_entropy * (1 + 0.1 * mutation_count)`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn scaled_entropy(base_entropy: f64, mutation_count: usize) -> f64 {
    base_entropy * 0.1_f64.mul_add(mutation_count as f64, 1.0)
}

/// 16x16 matrix marked on the diagonal by successive analyses.
///
/// Marks accumulate for the lifetime of the owner; a mark is never cleared,
/// only overwritten by a later mark on the same cell.
#[derive(Debug, Clone, PartialEq)]
pub struct StabilityMatrix {
    cells: Array2<f64>,
}

impl Default for StabilityMatrix {
    fn default() -> Self {
        Self {
            cells: Array2::zeros((STABILITY_DIM, STABILITY_DIM)),
        }
    }
}

impl StabilityMatrix {
    /// Zeroed matrix.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Diagonal index for a health value: `floor(health / 10)`, capped at 15.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn index_for_health(health: f64) -> usize {
        let bucket = (health.max(0.0) / 10.0).floor() as usize;
        bucket.min(STABILITY_DIM - 1)
    }

    /// Marks the health bucket with 1.0 (active) or 0.5 and returns the index.
    pub fn mark(&mut self, health: f64, active: bool) -> usize {
        let index = Self::index_for_health(health);
        self.cells[[index, index]] = if active { 1.0 } else { 0.5 };
        index
    }

    /// Owned copy of the cells.
    #[must_use]
    pub fn snapshot(&self) -> Array2<f64> {
        self.cells.clone()
    }

    /// Borrowed view of the cells.
    #[must_use]
    pub const fn cells(&self) -> &Array2<f64> {
        &self.cells
    }
}
