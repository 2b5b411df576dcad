use std::{fs, path::Path};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{
    entity::Compound,
    error::{EvolutionError, Result},
    predictor::{Activation, LayerSpec},
};

/// Number of entries in the ability catalog.
pub const ABILITY_CATALOG_SIZE: usize = 8;

/// Top-level configuration for the compound pipeline.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EvolutionConfig {
    /// Optimizer hyperparameters and instantiation policy.
    #[serde(default)]
    pub optimizer: OptimizerConfig,
    /// Mutation history retention.
    #[serde(default)]
    pub history: HistoryConfig,
    /// Predictor topology.
    #[serde(default)]
    pub predictor: PredictorConfig,
    /// Compound lookup tables.
    #[serde(default)]
    pub compounds: CompoundTable,
    /// Ability catalog used to label predictions.
    #[serde(default)]
    pub abilities: AbilityCatalog,
    /// Starting multipliers of the optimized compound profile.
    #[serde(default)]
    pub baseline_profile: ProfileBaseline,
}

impl EvolutionConfig {
    /// Loads and validates a TOML document.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|err| {
            EvolutionError::Config(format!("reading {}: {err}", path.display()))
        })?;
        Self::from_toml_str(&raw)
            .map_err(|err| EvolutionError::Config(format!("{}: {err}", path.display())))
    }

    /// Parses and validates a TOML string.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(raw).map_err(|err| EvolutionError::Config(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks ranges the pipeline relies on.
    pub fn validate(&self) -> Result<()> {
        let opt = &self.optimizer;
        if !(0.0..1.0).contains(&opt.momentum) {
            return Err(EvolutionError::Config(format!(
                "momentum must be in [0, 1), got {}",
                opt.momentum
            )));
        }
        if !opt.learning_rate.is_finite() || opt.learning_rate < 0.0 {
            return Err(EvolutionError::Config(format!(
                "learning_rate must be non-negative, got {}",
                opt.learning_rate
            )));
        }
        if !opt.decay.is_finite() || opt.decay < 0.0 {
            return Err(EvolutionError::Config(format!(
                "decay must be non-negative, got {}",
                opt.decay
            )));
        }
        if self.history.capacity == 0 || self.history.window == 0 {
            return Err(EvolutionError::Config(
                "history capacity and window must be positive".into(),
            ));
        }
        if self.predictor.layers.is_empty() || self.predictor.input_width == 0 {
            return Err(EvolutionError::Config(
                "predictor needs a positive input width and at least one layer".into(),
            ));
        }
        if self.abilities.len() != ABILITY_CATALOG_SIZE {
            return Err(EvolutionError::Config(format!(
                "ability catalog must have {ABILITY_CATALOG_SIZE} entries, got {}",
                self.abilities.len()
            )));
        }
        Ok(())
    }
}

/// Whether the orchestrator reuses one optimizer or builds one per analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizerMode {
    /// Fresh optimizer for every analysis; momentum never carries over.
    #[default]
    PerCall,
    /// One optimizer owned by the orchestrator; momentum accumulates.
    Shared,
}

/// Optimizer hyperparameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptimizerConfig {
    /// Scale applied to stability factors on the matrix diagonal.
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
    /// Momentum coefficient in `[0, 1)`.
    #[serde(default = "default_momentum")]
    pub momentum: f64,
    /// Iteration decay.
    #[serde(default = "default_decay")]
    pub decay: f64,
    /// Instantiation policy.
    #[serde(default)]
    pub mode: OptimizerMode,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            learning_rate: default_learning_rate(),
            momentum: default_momentum(),
            decay: default_decay(),
            mode: OptimizerMode::default(),
        }
    }
}

/// Retention of the mutation history ring buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Maximum retained entries; the oldest is evicted first.
    #[serde(default = "default_history_capacity")]
    pub capacity: usize,
    /// Trailing entries the optimizer inspects.
    #[serde(default = "default_history_window")]
    pub window: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            capacity: default_history_capacity(),
            window: default_history_window(),
        }
    }
}

/// Predictor topology.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictorConfig {
    /// Fan-in of the first layer.
    #[serde(default = "default_input_width")]
    pub input_width: usize,
    /// Optional weight seed for reproducible runs.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Layers in evaluation order.
    #[serde(default = "default_layers")]
    pub layers: Vec<LayerSpec>,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            input_width: default_input_width(),
            seed: None,
            layers: default_layers(),
        }
    }
}

/// Immutable compound lookup table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompoundTable {
    /// Base entropy per compound identifier.
    #[serde(default = "default_base_entropy")]
    pub base_entropy: IndexMap<String, f64>,
    /// Entropy for compounds missing from the table.
    #[serde(default = "default_entropy")]
    pub default_entropy: f64,
    /// Compound whose transformation raises entanglement.
    #[serde(default = "default_transformation_compound")]
    pub transformation_compound: String,
    /// Entropy at or above which a compound is `UNSTABLE`.
    #[serde(default = "default_entropy_threshold")]
    pub entropy_threshold: f64,
}

impl Default for CompoundTable {
    fn default() -> Self {
        Self {
            base_entropy: default_base_entropy(),
            default_entropy: default_entropy(),
            transformation_compound: default_transformation_compound(),
            entropy_threshold: default_entropy_threshold(),
        }
    }
}

impl CompoundTable {
    /// Base entropy of `compound`, falling back to the default.
    #[must_use]
    pub fn base_entropy(&self, compound: &Compound) -> f64 {
        self.base_entropy
            .get(compound.as_str())
            .copied()
            .unwrap_or(self.default_entropy)
    }

    /// Whether `compound` is the designated transformation compound.
    #[must_use]
    pub fn is_transformation(&self, compound: &Compound) -> bool {
        compound.as_str() == self.transformation_compound
    }
}

/// Ordered ability names used to label predictor outputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AbilityCatalog(Vec<String>);

impl Default for AbilityCatalog {
    fn default() -> Self {
        Self(
            [
                "mutation",
                "strength",
                "agility",
                "regeneration",
                "shape",
                "speed",
                "size",
                "mimic",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        )
    }
}

impl AbilityCatalog {
    /// Catalog entry at `index`, if any.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }

    /// Label for a prediction index; `"unknown"` past the end of the catalog.
    #[must_use]
    pub fn label(&self, index: usize) -> &str {
        self.get(index).unwrap_or(UNKNOWN_ABILITY)
    }

    /// Number of catalog entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Label given to predictions past the catalog.
pub const UNKNOWN_ABILITY: &str = "unknown";

/// Starting stability/potency/mutation multipliers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProfileBaseline {
    /// Stability multiplier.
    #[serde(default = "default_multiplier")]
    pub stability: f64,
    /// Potency multiplier.
    #[serde(default = "default_multiplier")]
    pub potency: f64,
    /// Mutation multiplier.
    #[serde(default = "default_multiplier")]
    pub mutation: f64,
}

impl Default for ProfileBaseline {
    fn default() -> Self {
        Self {
            stability: default_multiplier(),
            potency: default_multiplier(),
            mutation: default_multiplier(),
        }
    }
}

const fn default_learning_rate() -> f64 {
    0.001
}

const fn default_momentum() -> f64 {
    0.9
}

const fn default_decay() -> f64 {
    0.0001
}

const fn default_history_capacity() -> usize {
    1024
}

const fn default_history_window() -> usize {
    5
}

const fn default_input_width() -> usize {
    64
}

fn default_layers() -> Vec<LayerSpec> {
    vec![
        LayerSpec::new(128, Activation::Relu),
        LayerSpec::new(256, Activation::Tanh),
        LayerSpec::new(128, Activation::Sigmoid),
    ]
}

fn default_base_entropy() -> IndexMap<String, f64> {
    [
        ("VENOM_SYMBIOTE", 0.8),
        ("COMPOUND_V", 0.7),
        ("TITAN_SERUM", 0.9),
        ("SUPER_SOLDIER_SERUM", 0.5),
        ("POLYJUICE_POTION", 0.95),
        ("LIZARD_SERUM", 0.85),
        ("THE_GRASSES", 0.75),
    ]
    .into_iter()
    .map(|(name, entropy)| (name.to_string(), entropy))
    .collect()
}

const fn default_entropy() -> f64 {
    0.5
}

fn default_transformation_compound() -> String {
    "POLYJUICE_POTION".into()
}

const fn default_entropy_threshold() -> f64 {
    0.85
}

const fn default_multiplier() -> f64 {
    1.0
}
