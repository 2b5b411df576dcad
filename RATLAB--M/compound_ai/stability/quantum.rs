use serde::{Deserialize, Serialize};

/// Heuristic triple flavouring the stability computation. No physical meaning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuantumState {
    /// Superposition score.
    pub superposition: f64,
    /// Entanglement score.
    pub entanglement: f64,
    /// Coherence time in milliseconds.
    pub coherence: f64,
}

/// `sin(t) * cos(t)` for `t` in seconds.
#[must_use]
pub fn fluctuation(now_ms: f64) -> f64 {
    let t = now_ms / 1000.0;
    t.sin() * t.cos()
}

/// Base state scaled by the fluctuation and the unlocked-ability fraction.
#[must_use]
pub fn superposition(is_transformed: bool, fluctuation: f64, unlocked_fraction: f64) -> f64 {
    let base = if is_transformed { 0.7 } else { 0.3 };
    base * (1.0 + fluctuation) * unlocked_fraction
}

/// 0.9 while the transformation compound has a target, else grows with mutations.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn entanglement(transforming: bool, mutation_count: usize) -> f64 {
    if transforming {
        0.9
    } else {
        0.1_f64.mul_add(mutation_count as f64, 0.2)
    }
}

/// `100ms * (size / initial_size) * speed`.
#[must_use]
pub fn coherence_time(size: f64, initial_size: f64, speed: f64) -> f64 {
    100.0 * (size / initial_size) * speed
}
