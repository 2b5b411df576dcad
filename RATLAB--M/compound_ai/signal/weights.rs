use indexmap::IndexMap;
use rand::{rngs::SmallRng, Rng, SeedableRng};

/// How a weight is created the first time its key is seen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WeightInit {
    /// Uniform draw from `[0, 1]`.
    Random,
    /// Fixed starting value, clamped to `[0, 1]`.
    Constant(f64),
}

/// Feature key to weight map. Every weight stays in `[0, 1]`.
#[derive(Debug, Clone)]
pub struct SynapticWeights {
    weights: IndexMap<String, f64>,
    init: WeightInit,
    rng: SmallRng,
}

impl Default for SynapticWeights {
    fn default() -> Self {
        Self::new(WeightInit::Random)
    }
}

impl SynapticWeights {
    /// Empty table with an entropy-seeded generator.
    #[must_use]
    pub fn new(init: WeightInit) -> Self {
        Self {
            weights: IndexMap::new(),
            init,
            rng: SmallRng::from_entropy(),
        }
    }

    /// Empty table whose random draws are reproducible.
    #[must_use]
    pub fn seeded(init: WeightInit, seed: u64) -> Self {
        Self {
            weights: IndexMap::new(),
            init,
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// Weight for `key`, created per the init policy on first sight.
    pub fn get_or_init(&mut self, key: &str) -> f64 {
        if let Some(weight) = self.weights.get(key) {
            return *weight;
        }
        let weight = match self.init {
            WeightInit::Random => self.rng.gen_range(0.0..=1.0),
            WeightInit::Constant(value) => value.clamp(0.0, 1.0),
        };
        self.weights.insert(key.to_string(), weight);
        weight
    }

    /// Existing weight, if the key has been seen.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<f64> {
        self.weights.get(key).copied()
    }

    /// Adds `delta` to every known weight and clamps to `[0, 1]`.
    pub fn nudge_all(&mut self, delta: f64) {
        for weight in self.weights.values_mut() {
            *weight = (*weight + delta).clamp(0.0, 1.0);
        }
    }

    /// Number of known keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    /// Whether no key has been seen.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sight_initializes_once() {
        let mut weights = SynapticWeights::seeded(WeightInit::Random, 9);
        let first = weights.get_or_init("heat");
        assert!((0.0..=1.0).contains(&first));
        assert_eq!(weights.get_or_init("heat"), first);
        assert_eq!(weights.len(), 1);
        assert!(weights.get("cold").is_none());
    }

    #[test]
    fn nudges_are_clamped() {
        let mut weights = SynapticWeights::new(WeightInit::Constant(0.95));
        weights.get_or_init("a");
        weights.nudge_all(0.2);
        assert_eq!(weights.get("a"), Some(1.0));
        weights.nudge_all(-3.0);
        assert_eq!(weights.get("a"), Some(0.0));
    }
}
