use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::{
    abilities::AbilityPrediction,
    config::{OptimizerConfig, ProfileBaseline},
    entity::Compound,
    history::MutationHistory,
    stability::{EntropyLevel, StabilityScore, STABILITY_DIM},
};

/// Side of the block that ability predictions modulate.
const PREDICTION_BLOCK: usize = 4;

/// Mutable compound attributes the optimizer evolves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompoundProfile {
    /// Compound the profile belongs to.
    pub compound: Compound,
    /// Stability multiplier.
    pub stability: f64,
    /// Potency multiplier.
    pub potency: f64,
    /// Mutation multiplier.
    pub mutation: f64,
}

impl CompoundProfile {
    /// Profile at the configured baseline multipliers.
    #[must_use]
    pub fn from_baseline(compound: Compound, baseline: &ProfileBaseline) -> Self {
        Self {
            compound,
            stability: baseline.stability,
            potency: baseline.potency,
            mutation: baseline.mutation,
        }
    }
}

/// Ability prediction rescaled by the optimized compound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvolvedAbility {
    /// Catalog label.
    pub ability: String,
    /// `prediction * (1 + potency)`.
    pub probability: f64,
    /// Carried over from the source prediction.
    pub currently_unlocked: bool,
    /// Optimized compound stability.
    pub stability_factor: f64,
    /// Optimized compound mutation multiplier.
    pub mutation_rate: f64,
}

/// Stability summary derived from the update matrix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DerivedStability {
    /// Prior overall stability scaled by the first row's absolute update sum.
    pub primary: f64,
    /// Prior entropy level, unchanged.
    pub secondary: EntropyLevel,
    /// `1 - e^(-total absolute update)`.
    pub confidence: f64,
}

/// Output of one optimization step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    /// Updated compound profile.
    pub compound: CompoundProfile,
    /// Rescaled ability predictions.
    pub abilities: Vec<EvolvedAbility>,
    /// Derived stability triple.
    pub stability: DerivedStability,
    /// Overall confidence in `[0, 1]`.
    pub confidence: f64,
}

/// Inputs for [`CompoundOptimizer::optimize`].
#[derive(Debug, Clone, Copy)]
pub struct OptimizeRequest<'a> {
    /// Current compound profile.
    pub compound: &'a CompoundProfile,
    /// Stability score of the analysis.
    pub stability: &'a StabilityScore,
    /// Labelled ability predictions.
    pub predictions: &'a [AbilityPrediction],
    /// Mutation history before this analysis.
    pub history: &'a MutationHistory,
}

/// Momentum-smoothed update engine.
///
/// The velocity grid is created on the first call and kept for the lifetime
/// of the instance.
#[derive(Debug, Clone)]
pub struct CompoundOptimizer {
    config: OptimizerConfig,
    iterations: u64,
    adjusted_learning_rate: f64,
    velocity: Option<Array2<f64>>,
}

impl CompoundOptimizer {
    /// Creates an optimizer with zero iterations and no velocity state.
    #[must_use]
    pub fn new(config: OptimizerConfig) -> Self {
        Self {
            adjusted_learning_rate: config.learning_rate,
            config,
            iterations: 0,
            velocity: None,
        }
    }

    /// Number of completed `optimize` calls.
    #[must_use]
    pub const fn iterations(&self) -> u64 {
        self.iterations
    }

    /// `learning_rate / (1 + decay * iterations)` as of the last call.
    ///
    /// Reported only; the update matrix is built from the base learning rate.
    #[must_use]
    pub const fn adjusted_learning_rate(&self) -> f64 {
        self.adjusted_learning_rate
    }

    /// Current velocity grid, if any call has happened.
    #[must_use]
    pub const fn velocity(&self) -> Option<&Array2<f64>> {
        self.velocity.as_ref()
    }

    /// Hyperparameters.
    #[must_use]
    pub const fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Folds stability and predictions into an updated compound.
    #[allow(clippy::cast_precision_loss)]
    pub fn optimize(&mut self, request: OptimizeRequest<'_>) -> OptimizationResult {
        self.iterations += 1;
        let iterations = self.iterations as f64;
        self.adjusted_learning_rate =
            self.config.learning_rate / self.config.decay.mul_add(iterations, 1.0);

        let entropy_score = self.entropy_score(request.compound, request.history);
        let matrix = self.optimization_matrix(request.stability, request.predictions, entropy_score);
        let updates = self.apply_momentum(&matrix);

        let compound = synthesize(request.compound, &updates);
        let abilities = evolve_abilities(&compound, request.predictions);
        let stability = derive_stability(request.stability, &updates);
        let confidence = confidence(&updates, request.history.len());

        OptimizationResult {
            compound,
            abilities,
            stability,
            confidence,
        }
    }

    /// `1 - frequency_of_compound_in_window * e^(-decay * iterations)`.
    #[allow(clippy::cast_precision_loss)]
    fn entropy_score(&self, compound: &CompoundProfile, history: &MutationHistory) -> f64 {
        let window = history.window();
        let repeats = window
            .iter()
            .filter(|entry| entry.compound == compound.compound)
            .count();
        let frequency = repeats as f64 / window.len().max(1) as f64;
        frequency.mul_add(
            -(-self.config.decay * self.iterations as f64).exp(),
            1.0,
        )
    }

    fn optimization_matrix(
        &self,
        stability: &StabilityScore,
        predictions: &[AbilityPrediction],
        entropy_score: f64,
    ) -> Array2<f64> {
        let mut matrix = Array2::zeros((STABILITY_DIM, STABILITY_DIM));
        for (i, factor) in stability.factors.iter().enumerate() {
            matrix[[i, i]] = factor * self.config.learning_rate;
        }
        for (i, prediction) in predictions
            .iter()
            .take(PREDICTION_BLOCK * PREDICTION_BLOCK)
            .enumerate()
        {
            let (row, col) = (i / PREDICTION_BLOCK, i % PREDICTION_BLOCK);
            matrix[[row, col]] *= prediction.probability.mul_add(entropy_score, 1.0);
        }
        matrix
    }

    fn apply_momentum(&mut self, matrix: &Array2<f64>) -> Array2<f64> {
        let momentum = self.config.momentum;
        let velocity = self
            .velocity
            .get_or_insert_with(|| Array2::zeros(matrix.raw_dim()));
        velocity.zip_mut_with(matrix, |v, value| {
            *v = momentum.mul_add(*v, (1.0 - momentum) * value);
        });
        velocity.clone()
    }
}

fn synthesize(compound: &CompoundProfile, updates: &Array2<f64>) -> CompoundProfile {
    CompoundProfile {
        compound: compound.compound.clone(),
        stability: compound.stability * (1.0 + updates[[0, 0]]),
        potency: compound.potency * (1.0 + updates[[1, 1]]),
        mutation: compound.mutation * (1.0 + updates[[2, 2]]),
    }
}

fn evolve_abilities(
    compound: &CompoundProfile,
    predictions: &[AbilityPrediction],
) -> Vec<EvolvedAbility> {
    predictions
        .iter()
        .map(|prediction| EvolvedAbility {
            ability: prediction.ability.clone(),
            probability: prediction.probability * (1.0 + compound.potency),
            currently_unlocked: prediction.currently_unlocked,
            stability_factor: compound.stability,
            mutation_rate: compound.mutation,
        })
        .collect()
}

fn derive_stability(previous: &StabilityScore, updates: &Array2<f64>) -> DerivedStability {
    let first_row: f64 = updates.row(0).iter().map(|v| v.abs()).sum();
    let total = total_magnitude(updates);
    DerivedStability {
        primary: previous.overall_stability * (1.0 + first_row),
        secondary: previous.entropy_level,
        confidence: 1.0 - (-total).exp(),
    }
}

/// `e^(-total) * (1 - 1 / (history_len + 1))`.
#[allow(clippy::cast_precision_loss)]
fn confidence(updates: &Array2<f64>, history_len: usize) -> f64 {
    (-total_magnitude(updates)).exp() * (1.0 - 1.0 / (history_len as f64 + 1.0))
}

fn total_magnitude(updates: &Array2<f64>) -> f64 {
    updates.iter().map(|v| v.abs()).sum()
}
