use std::{collections::VecDeque, f64::consts::TAU};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::weights::{SynapticWeights, WeightInit};
use crate::predictor::activation::logistic;

/// Activation records retained by a processor.
pub const ACTIVATION_CAPACITY: usize = 100;
const CONTEXT_WINDOW: usize = 5;
const CONFIDENCE_WINDOW: usize = 10;
const MODULATION_CAP: f64 = 2.0;
const BASE_LEARNING_RATE: f64 = 0.01;

/// Optional context scaling the response.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalContext {
    /// Multiplier applied to recent coherence.
    pub intensity: f64,
}

/// One recorded response.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActivationRecord {
    /// Modulated `tanh` response.
    pub amplitude: f64,
    /// `logistic(strength) * 2π`.
    pub frequency: f64,
    /// Response magnitude damped by history length.
    pub coherence: f64,
    /// When the response was recorded.
    pub timestamp: DateTime<Utc>,
}

/// Output of [`SignalProcessor::process_signal`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedSignal {
    /// Amplitude.
    pub signal: f64,
    /// Frequency.
    pub phase: f64,
    /// Coherence.
    pub stability: f64,
    /// `min(1, mean recent coherence * coherence)`.
    pub confidence: f64,
}

/// Single-stage adaptive unit with keyed weights and a capped activation log.
#[derive(Debug, Clone, Default)]
pub struct SignalProcessor {
    weights: SynapticWeights,
    history: VecDeque<ActivationRecord>,
}

impl SignalProcessor {
    /// Processor whose unseen weights start per `init`.
    #[must_use]
    pub fn new(init: WeightInit) -> Self {
        Self::with_weights(SynapticWeights::new(init))
    }

    /// Processor over a prepared weight table.
    #[must_use]
    pub fn with_weights(weights: SynapticWeights) -> Self {
        Self {
            weights,
            history: VecDeque::with_capacity(ACTIVATION_CAPACITY),
        }
    }

    /// Shapes one input and adapts the weights.
    #[allow(clippy::cast_precision_loss)]
    pub fn process_signal(
        &mut self,
        input: &IndexMap<String, f64>,
        context: Option<&SignalContext>,
    ) -> NormalizedSignal {
        let strength: f64 = input
            .iter()
            .map(|(key, value)| value * self.weights.get_or_init(key))
            .sum();
        let response = strength.tanh();
        let modulation = self.context_modulation(context);
        let history_len = self.history.len() as f64;

        let record = ActivationRecord {
            amplitude: response * modulation,
            frequency: logistic(strength) * TAU,
            coherence: response.abs() * modulation / (1.0 + history_len),
            timestamp: Utc::now(),
        };

        let learning_rate = BASE_LEARNING_RATE * (-history_len / 100.0).exp();
        self.weights.nudge_all(record.amplitude * learning_rate);
        self.record(record);

        NormalizedSignal {
            signal: record.amplitude,
            phase: record.frequency,
            stability: record.coherence,
            confidence: (self.mean_coherence(CONFIDENCE_WINDOW) * record.coherence).min(1.0),
        }
    }

    /// 1 without context; otherwise `(1 + Σ coherence·intensity) / n` over the
    /// last five records, capped at 2. An empty history yields the cap.
    #[allow(clippy::cast_precision_loss)]
    fn context_modulation(&self, context: Option<&SignalContext>) -> f64 {
        let Some(context) = context else {
            return 1.0;
        };
        let recent = self.recent_activations(CONTEXT_WINDOW);
        if recent.is_empty() {
            return MODULATION_CAP;
        }
        let weighted = recent.iter().fold(1.0, |acc, activation| {
            let term = activation.coherence * context.intensity;
            acc + if term.is_nan() { 0.0 } else { term }
        });
        (weighted / recent.len() as f64).min(MODULATION_CAP)
    }

    fn record(&mut self, record: ActivationRecord) {
        if self.history.len() == ACTIVATION_CAPACITY {
            self.history.pop_front();
        }
        self.history.push_back(record);
    }

    #[allow(clippy::cast_precision_loss)]
    fn mean_coherence(&self, n: usize) -> f64 {
        let recent = self.recent_activations(n);
        let total: f64 = recent.iter().map(|activation| activation.coherence).sum();
        total / recent.len().max(1) as f64
    }

    /// The last `n` records, oldest first.
    #[must_use]
    pub fn recent_activations(&self, n: usize) -> Vec<ActivationRecord> {
        let skip = self.history.len().saturating_sub(n);
        self.history.iter().skip(skip).copied().collect()
    }

    /// Number of retained records (never above 100).
    #[must_use]
    pub fn activation_count(&self) -> usize {
        self.history.len()
    }

    /// Current weight for `key`, if seen.
    #[must_use]
    pub fn weight(&self, key: &str) -> Option<f64> {
        self.weights.get(key)
    }
}
