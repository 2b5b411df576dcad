use serde::{Deserialize, Serialize};

use crate::{
    config::AbilityCatalog,
    entity::EntitySnapshot,
    error::{EvolutionError, EvolutionWarning, Result},
};

/// Width of one ability-matrix row.
pub const ABILITY_ROW_WIDTH: usize = 4;

/// Predicted development of one ability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbilityPrediction {
    /// Catalog label, or `"unknown"` past the catalog.
    pub ability: String,
    /// Raw predictor output.
    pub probability: f64,
    /// Whether the entity already has the ability unlocked.
    pub currently_unlocked: bool,
    /// Health/mutation driven stability in `[0, 1]`.
    pub stability_factor: f64,
}

/// Unlock flags chunked into rows of four, the last row zero-padded.
#[must_use]
pub fn ability_matrix(entity: &EntitySnapshot) -> Vec<[f64; ABILITY_ROW_WIDTH]> {
    let flags: Vec<f64> = entity
        .unlocked_abilities
        .values()
        .map(|unlocked| if *unlocked { 1.0 } else { 0.0 })
        .collect();
    flags
        .chunks(ABILITY_ROW_WIDTH)
        .map(|chunk| {
            let mut row = [0.0; ABILITY_ROW_WIDTH];
            row[..chunk.len()].copy_from_slice(chunk);
            row
        })
        .collect()
}

/// Flattens the matrix, divides by its maximum cell, and zero-pads to `width`.
///
/// An all-zero matrix passes through undivided with a warning. A matrix with
/// more than `width` cells is a dimension mismatch.
pub fn prepare_input(
    matrix: &[[f64; ABILITY_ROW_WIDTH]],
    width: usize,
) -> Result<(Vec<f64>, Option<EvolutionWarning>)> {
    let cells = matrix.len() * ABILITY_ROW_WIDTH;
    if cells > width {
        return Err(EvolutionError::DimensionMismatch {
            expected: width,
            actual: cells,
        });
    }
    let mut features: Vec<f64> = matrix.iter().flatten().copied().collect();
    let max = features.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let warning = if max > 0.0 {
        features.iter_mut().for_each(|cell| *cell /= max);
        None
    } else {
        Some(EvolutionWarning::DegenerateNormalization)
    };
    features.resize(width, 0.0);
    Ok((features, warning))
}

/// `clamp(0.5 * health / 100 - 0.05 * mutations, 0, 1)`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn ability_stability(entity: &EntitySnapshot) -> f64 {
    let health_factor = entity.health / 100.0;
    let penalty = entity.mutation_count() as f64 * 0.05;
    0.5f64.mul_add(health_factor, -penalty).clamp(0.0, 1.0)
}

/// Labels raw predictor outputs against the catalog.
#[must_use]
pub fn label_predictions(
    raw: &[f64],
    catalog: &AbilityCatalog,
    entity: &EntitySnapshot,
) -> Vec<AbilityPrediction> {
    let stability_factor = ability_stability(entity);
    raw.iter()
        .enumerate()
        .map(|(index, probability)| {
            AbilityPrediction {
                ability: catalog.label(index).to_string(),
                currently_unlocked: catalog
                    .get(index)
                    .is_some_and(|name| entity.is_unlocked(name)),
                probability: *probability,
                stability_factor,
            }
        })
        .collect()
}
