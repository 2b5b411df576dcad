//! Compound analysis orchestration: sequences the stability evaluator, the
//! ability predictor, and the optimizer, and keeps the mutation history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use shared_logging::LogLevel;

use crate::{
    abilities::{self, AbilityPrediction},
    config::{EvolutionConfig, OptimizerMode},
    entity::EntitySnapshot,
    error::{EvolutionWarning, Result},
    history::{MutationHistory, MutationHistoryEntry},
    optimizer::{
        CompoundOptimizer, CompoundProfile, DerivedStability, EvolvedAbility, OptimizeRequest,
    },
    predictor::FeedForwardPredictor,
    stability::{
        evaluator::MUTATION_ABILITY, EntropyLevel, StabilityEvaluator, StabilityMatrix,
        StabilityScore,
    },
    telemetry::EvolutionTelemetry,
};

/// Overall stability below which an unstable compound is critical.
const CRITICAL_STABILITY: f64 = 0.25;

/// Coarse lifecycle phase reported with every outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CompoundPhase {
    /// Nothing notable.
    Stable,
    /// The entity can mutate.
    Mutating,
    /// Prior analyses exist, so the optimizer has history to work with.
    Optimizing,
    /// Unstable entropy and low overall stability.
    Critical,
}

impl CompoundPhase {
    fn classify(score: &StabilityScore, mutation_unlocked: bool, has_history: bool) -> Self {
        if score.entropy_level == EntropyLevel::Unstable
            && score.overall_stability < CRITICAL_STABILITY
        {
            Self::Critical
        } else if mutation_unlocked {
            Self::Mutating
        } else if has_history {
            Self::Optimizing
        } else {
            Self::Stable
        }
    }
}

/// Public result of [`CompoundOrchestrator::analyze_compound`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompoundOutcome {
    /// Compound profile after optimization.
    pub optimized_compound: CompoundProfile,
    /// Rescaled ability predictions.
    pub predicted_abilities: Vec<EvolvedAbility>,
    /// Derived stability triple.
    pub stability_metrics: DerivedStability,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    /// Lifecycle phase.
    pub phase: CompoundPhase,
    /// Non-fatal conditions hit along the way.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<EvolutionWarning>,
}

/// Owns the predictor, the stability matrix, and the mutation history.
#[derive(Debug)]
pub struct CompoundOrchestrator {
    config: EvolutionConfig,
    evaluator: StabilityEvaluator,
    predictor: FeedForwardPredictor,
    stability_matrix: StabilityMatrix,
    history: MutationHistory,
    shared_optimizer: Option<CompoundOptimizer>,
    telemetry: Option<EvolutionTelemetry>,
}

impl CompoundOrchestrator {
    /// Builds an orchestrator from a validated configuration.
    pub fn new(config: EvolutionConfig) -> Result<Self> {
        config.validate()?;
        let predictor = match config.predictor.seed {
            Some(seed) => FeedForwardPredictor::with_seed(
                config.predictor.input_width,
                &config.predictor.layers,
                seed,
            )?,
            None => FeedForwardPredictor::new(
                config.predictor.input_width,
                &config.predictor.layers,
            )?,
        };
        let shared_optimizer = match config.optimizer.mode {
            OptimizerMode::Shared => Some(CompoundOptimizer::new(config.optimizer)),
            OptimizerMode::PerCall => None,
        };
        Ok(Self {
            evaluator: StabilityEvaluator::new(config.compounds.clone()),
            history: MutationHistory::new(config.history),
            stability_matrix: StabilityMatrix::new(),
            predictor,
            shared_optimizer,
            telemetry: None,
            config,
        })
    }

    /// Attaches telemetry sinks for structured logging/events.
    #[must_use]
    pub fn with_telemetry(mut self, telemetry: EvolutionTelemetry) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Sets telemetry after construction.
    pub fn set_telemetry(&mut self, telemetry: EvolutionTelemetry) {
        self.telemetry = Some(telemetry);
    }

    /// Analyses the entity at the current wall-clock time.
    pub fn analyze_compound(&mut self, entity: &EntitySnapshot) -> Result<CompoundOutcome> {
        self.analyze_compound_at(entity, Utc::now())
    }

    /// Analyses the entity as of `now`.
    ///
    /// On error nothing is recorded: history, matrix marks, and optimizer
    /// state are left untouched.
    #[allow(clippy::cast_precision_loss)]
    pub fn analyze_compound_at(
        &mut self,
        entity: &EntitySnapshot,
        now: DateTime<Utc>,
    ) -> Result<CompoundOutcome> {
        entity.validate()?;
        let now_ms = now.timestamp_millis() as f64;
        self.log(
            LogLevel::Debug,
            "compound_analysis_start",
            json!({
                "compound": entity.compound.as_str(),
                "mutations": entity.mutation_count(),
                "abilities": entity.unlocked_abilities.len(),
            }),
        );

        let mut warnings = Vec::new();
        let predictions = self.predict_abilities(entity, &mut warnings)?;

        let mut stability_matrix = self.stability_matrix.clone();
        stability_matrix.mark(entity.health, entity.active);
        let signature = self
            .evaluator
            .signature(entity, stability_matrix.snapshot(), now_ms);
        let quantum_state = self.evaluator.quantum_state(entity, now_ms);
        let stability = self.evaluator.evaluate(&signature, quantum_state);

        let profile =
            CompoundProfile::from_baseline(entity.compound.clone(), &self.config.baseline_profile);
        let request = OptimizeRequest {
            compound: &profile,
            stability: &stability,
            predictions: &predictions,
            history: &self.history,
        };
        let optimization = match self.shared_optimizer.as_mut() {
            Some(optimizer) => optimizer.optimize(request),
            None => CompoundOptimizer::new(self.config.optimizer).optimize(request),
        };
        self.log(
            LogLevel::Debug,
            "compound_optimized",
            json!({
                "entropy": signature.entropy,
                "mutation_factor": signature.mutation_factor,
                "overall_stability": stability.overall_stability,
                "potency": optimization.compound.potency,
            }),
        );

        let phase = CompoundPhase::classify(
            &stability,
            entity.is_unlocked(MUTATION_ABILITY),
            !self.history.is_empty(),
        );
        let outcome = CompoundOutcome {
            optimized_compound: optimization.compound.clone(),
            predicted_abilities: optimization.abilities.clone(),
            stability_metrics: optimization.stability,
            confidence: optimization.confidence,
            phase,
            warnings,
        };

        self.stability_matrix = stability_matrix;
        let evicted = self.history.push(MutationHistoryEntry::new(
            now,
            entity.compound.clone(),
            optimization,
            stability.clone(),
        ));
        if let Some(evicted) = evicted {
            self.log(
                LogLevel::Debug,
                "mutation_history_evicted",
                json!({ "id": evicted.id.to_string(), "capacity": self.history.capacity() }),
            );
        }

        let summary = json!({
            "compound": entity.compound.as_str(),
            "confidence": outcome.confidence,
            "overall_stability": stability.overall_stability,
            "entropy_level": stability.entropy_level,
            "phase": outcome.phase,
            "history_len": self.history.len(),
        });
        self.log(LogLevel::Info, "compound_analysis_complete", summary.clone());
        self.event("compound.analysis.completed", summary);
        Ok(outcome)
    }

    fn predict_abilities(
        &self,
        entity: &EntitySnapshot,
        warnings: &mut Vec<EvolutionWarning>,
    ) -> Result<Vec<AbilityPrediction>> {
        let matrix = abilities::ability_matrix(entity);
        let (features, warning) =
            abilities::prepare_input(&matrix, self.predictor.input_width())?;
        if let Some(warning) = warning {
            self.log(
                LogLevel::Warn,
                "ability_normalization_degenerate",
                json!({ "compound": entity.compound.as_str(), "rows": matrix.len() }),
            );
            warnings.push(warning);
        }
        let raw = self.predictor.predict_row(&features)?;
        Ok(abilities::label_predictions(
            &raw,
            &self.config.abilities,
            entity,
        ))
    }

    /// Mutation history, oldest first.
    #[must_use]
    pub const fn history(&self) -> &MutationHistory {
        &self.history
    }

    /// The last `n` history entries, oldest first.
    #[must_use]
    pub fn trailing(&self, n: usize) -> Vec<&MutationHistoryEntry> {
        self.history.trailing(n)
    }

    /// Drops the retained history.
    pub fn clear_history(&mut self) {
        self.history.clear();
        self.log(LogLevel::Info, "mutation_history_cleared", json!({}));
    }

    /// Persistent stability matrix.
    #[must_use]
    pub const fn stability_matrix(&self) -> &StabilityMatrix {
        &self.stability_matrix
    }

    /// Ability predictor.
    #[must_use]
    pub const fn predictor(&self) -> &FeedForwardPredictor {
        &self.predictor
    }

    /// Optimizer kept across analyses in shared mode.
    #[must_use]
    pub const fn shared_optimizer(&self) -> Option<&CompoundOptimizer> {
        self.shared_optimizer.as_ref()
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &EvolutionConfig {
        &self.config
    }

    fn log(&self, level: LogLevel, message: &str, metadata: Value) {
        if let Some(telemetry) = self.telemetry.as_ref() {
            let _ = telemetry.log(level, message, metadata);
        }
    }

    fn event(&self, event_type: &str, payload: Value) {
        if let Some(telemetry) = self.telemetry.as_ref() {
            let _ = telemetry.event(event_type, payload);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::UNKNOWN_ABILITY, error::EvolutionError};
    use chrono::TimeZone;
    use proptest::prelude::*;
    use shared_event_bus::MemoryEventBus;
    use shared_logging::MemoryLogSink;
    use std::sync::Arc;

    fn seeded_config(mode: OptimizerMode) -> EvolutionConfig {
        let mut config = EvolutionConfig::default();
        config.predictor.seed = Some(1234);
        config.optimizer.mode = mode;
        config
    }

    fn titan() -> EntitySnapshot {
        let mut entity = EntitySnapshot::new("TITAN_SERUM")
            .with_ability("mutation", false)
            .with_ability("strength", true);
        entity.health = 80.0;
        entity.size = 12.0;
        entity.initial_size = 10.0;
        entity.speed = 1.2;
        entity.active = true;
        entity.is_transformed = false;
        entity
    }

    fn at(seconds: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + seconds, 0).unwrap()
    }

    #[test]
    fn titan_serum_runs_twice_and_grows_history() {
        let mut orchestrator =
            CompoundOrchestrator::new(seeded_config(OptimizerMode::PerCall)).unwrap();
        let entity = titan();

        let first = orchestrator.analyze_compound(&entity).unwrap();
        assert_eq!(orchestrator.history().len(), 1);
        let second = orchestrator.analyze_compound(&entity).unwrap();
        assert_eq!(orchestrator.history().len(), 2);

        for outcome in [&first, &second] {
            assert!((0.0..=1.0).contains(&outcome.confidence));
            assert_eq!(outcome.predicted_abilities.len(), 128);
            assert_eq!(outcome.stability_metrics.secondary, EntropyLevel::Unstable);
        }
        // Not non-increasing: the (1 - 1/(history + 1)) term pins the first call to zero
        // and makes the second positive.
        assert_eq!(first.confidence, 0.0);
        assert!(second.confidence >= first.confidence);
        assert_eq!(first.phase, CompoundPhase::Stable);
        assert_eq!(second.phase, CompoundPhase::Optimizing);
        assert!(first.warnings.is_empty());
    }

    #[test]
    fn shared_optimizer_accumulates_momentum() {
        let entity = titan();
        let mut per_call =
            CompoundOrchestrator::new(seeded_config(OptimizerMode::PerCall)).unwrap();
        let mut shared = CompoundOrchestrator::new(seeded_config(OptimizerMode::Shared)).unwrap();

        let fresh_first = per_call.analyze_compound_at(&entity, at(0)).unwrap();
        let shared_first = shared.analyze_compound_at(&entity, at(0)).unwrap();
        assert_eq!(fresh_first.optimized_compound, shared_first.optimized_compound);

        let fresh_second = per_call.analyze_compound_at(&entity, at(0)).unwrap();
        let shared_second = shared.analyze_compound_at(&entity, at(0)).unwrap();
        assert!(per_call.shared_optimizer().is_none());
        assert_eq!(shared.shared_optimizer().unwrap().iterations(), 2);
        // Shared velocity still carries 0.9 of the first update.
        assert!(
            shared_second.optimized_compound.mutation > fresh_second.optimized_compound.mutation
        );
        assert!(shared_second.optimized_compound.mutation > shared_first.optimized_compound.mutation);
    }

    #[test]
    fn ten_abilities_label_unknown_past_catalog() {
        let mut orchestrator =
            CompoundOrchestrator::new(seeded_config(OptimizerMode::PerCall)).unwrap();
        let entity = (0..10).fold(titan(), |entity, i| {
            entity.with_ability(format!("extra-{i}"), i % 2 == 0)
        });
        let outcome = orchestrator.analyze_compound_at(&entity, at(5)).unwrap();
        assert_eq!(outcome.predicted_abilities[0].ability, "mutation");
        assert_eq!(outcome.predicted_abilities[8].ability, UNKNOWN_ABILITY);
        assert!(outcome.predicted_abilities[1].currently_unlocked);
    }

    #[test]
    fn all_locked_abilities_warn_instead_of_nan() {
        let sink = Arc::new(MemoryLogSink::new(32));
        let telemetry = EvolutionTelemetry::builder("compound-ai")
            .sink(sink.clone())
            .build()
            .unwrap();
        let mut orchestrator = CompoundOrchestrator::new(seeded_config(OptimizerMode::PerCall))
            .unwrap()
            .with_telemetry(telemetry);
        let mut entity = titan();
        entity.unlocked_abilities.insert("strength".into(), false);
        let outcome = orchestrator.analyze_compound_at(&entity, at(1)).unwrap();
        assert_eq!(outcome.warnings, vec![EvolutionWarning::DegenerateNormalization]);
        assert!(outcome
            .predicted_abilities
            .iter()
            .all(|ability| ability.probability.is_finite()));
        let warned = sink.find("ability_normalization_degenerate");
        assert_eq!(warned.len(), 1);
        assert_eq!(warned[0].level, LogLevel::Warn);
    }

    #[test]
    fn invalid_entity_leaves_state_untouched() {
        let mut orchestrator =
            CompoundOrchestrator::new(seeded_config(OptimizerMode::PerCall)).unwrap();
        let mut entity = titan();
        entity.initial_size = 0.0;
        let err = orchestrator.analyze_compound(&entity).unwrap_err();
        assert!(matches!(
            err,
            EvolutionError::InvalidEntity {
                field: "initial_size",
                ..
            }
        ));
        assert!(orchestrator.history().is_empty());
        assert_eq!(orchestrator.stability_matrix().cells().sum(), 0.0);
    }

    #[test]
    fn oversized_ability_map_is_a_dimension_mismatch() {
        let mut orchestrator =
            CompoundOrchestrator::new(seeded_config(OptimizerMode::PerCall)).unwrap();
        let entity = (0..70).fold(titan(), |entity, i| entity.with_ability(format!("a{i}"), true));
        let err = orchestrator.analyze_compound(&entity).unwrap_err();
        assert!(matches!(err, EvolutionError::DimensionMismatch { expected: 64, .. }));
        assert!(orchestrator.history().is_empty());
    }

    #[test]
    fn marks_stability_matrix_and_emits_event() {
        let bus = Arc::new(MemoryEventBus::new(4));
        let telemetry = EvolutionTelemetry::builder("compound-ai")
            .event_publisher(bus.clone())
            .build()
            .unwrap();
        let mut orchestrator = CompoundOrchestrator::new(seeded_config(OptimizerMode::PerCall))
            .unwrap()
            .with_telemetry(telemetry);
        let mut entity = titan();
        entity.active = false;
        orchestrator.analyze_compound_at(&entity, at(2)).unwrap();
        assert_eq!(orchestrator.stability_matrix().cells()[[8, 8]], 0.5);
        let events = bus.events_of("compound.analysis.completed");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].payload["compound"], "TITAN_SERUM");
        assert_eq!(events[0].payload["history_len"], 1);
    }

    #[tokio::test]
    async fn drops_cleanly_inside_a_runtime() {
        let bus = Arc::new(MemoryEventBus::new(4));
        let telemetry = EvolutionTelemetry::builder("compound-ai")
            .event_publisher(bus.clone())
            .build()
            .unwrap();
        let mut orchestrator = CompoundOrchestrator::new(seeded_config(OptimizerMode::PerCall))
            .unwrap()
            .with_telemetry(telemetry);
        let outcome = orchestrator.analyze_compound(&titan()).unwrap();
        assert_eq!(outcome.confidence, 0.0);
        drop(orchestrator);
        tokio::task::yield_now().await;
    }

    #[test]
    fn history_capacity_bounds_growth() {
        let mut config = seeded_config(OptimizerMode::PerCall);
        config.history.capacity = 3;
        let mut orchestrator = CompoundOrchestrator::new(config).unwrap();
        for i in 0..5 {
            orchestrator.analyze_compound_at(&titan(), at(i)).unwrap();
        }
        assert_eq!(orchestrator.history().len(), 3);
        assert_eq!(orchestrator.history().total_recorded(), 5);
        let trailing = orchestrator.trailing(2);
        assert_eq!(trailing.len(), 2);
        assert_eq!(trailing[1].timestamp, at(4));
        orchestrator.clear_history();
        assert!(orchestrator.history().is_empty());
    }

    #[test]
    fn unstable_low_stability_is_critical() {
        let score = StabilityScore {
            factors: [0.0; crate::stability::STABILITY_DIM],
            overall_stability: 0.1,
            entropy_level: EntropyLevel::Unstable,
            quantum_state: crate::stability::QuantumState {
                superposition: 0.0,
                entanglement: 0.2,
                coherence: 0.0,
            },
        };
        assert_eq!(CompoundPhase::classify(&score, true, true), CompoundPhase::Critical);
        let calm = StabilityScore {
            entropy_level: EntropyLevel::Stable,
            ..score
        };
        assert_eq!(CompoundPhase::classify(&calm, true, false), CompoundPhase::Mutating);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]
        #[test]
        fn outcomes_stay_in_unit_interval(
            health in 0.0f64..300.0,
            size in 0.1f64..50.0,
            initial_size in 0.1f64..50.0,
            speed in 0.0f64..5.0,
            mutations in 0usize..8,
            runs in 1usize..4,
            flags in prop::collection::vec(any::<bool>(), 1..16),
            seconds in 0i64..1_000_000,
        ) {
            let mut orchestrator =
                CompoundOrchestrator::new(seeded_config(OptimizerMode::Shared)).unwrap();
            let mut entity = flags.iter().enumerate().fold(
                EntitySnapshot::new("VENOM_SYMBIOTE"),
                |entity, (i, flag)| entity.with_ability(format!("ability-{i}"), *flag),
            );
            entity.health = health;
            entity.size = size;
            entity.initial_size = initial_size;
            entity.speed = speed;
            entity.mutations = vec!["spliced".into(); mutations];
            for run in 0..runs {
                let outcome = orchestrator.analyze_compound_at(&entity, at(seconds + run as i64)).unwrap();
                prop_assert!((0.0..=1.0).contains(&outcome.confidence));
                let latest = orchestrator.history().latest().unwrap();
                prop_assert!((0.0..=1.0).contains(&latest.stability.overall_stability));
            }
        }
    }
}
