#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]
#![allow(clippy::module_name_repetitions)]

//! RatLab compound evolution library.

/// Error and warning types shared by every stage.
#[path = "../error.rs"]
pub mod error;

/// Entity snapshots and compound identifiers.
#[path = "../entity.rs"]
pub mod entity;

/// TOML-backed pipeline configuration.
#[path = "../config.rs"]
pub mod config;

/// Ability-unlock matrix preparation and prediction labelling.
#[path = "../abilities.rs"]
pub mod abilities;

/// Bounded mutation history.
#[path = "../history.rs"]
pub mod history;

/// Momentum optimizer over the 16x16 update matrix.
#[path = "../optimizer.rs"]
pub mod optimizer;

/// Structured logging and event emission.
#[path = "../telemetry.rs"]
pub mod telemetry;

/// Feed-forward ability predictor.
#[path = "../predictor/main.rs"]
pub mod predictor;

/// Stability signature, quantum state, and scoring.
#[path = "../stability/main.rs"]
pub mod stability;

/// Standalone adaptive signal processor.
#[path = "../signal/main.rs"]
pub mod signal;

/// Analysis orchestration entrypoint.
#[path = "../main.rs"]
pub mod orchestration_entry;

pub use config::EvolutionConfig;
pub use entity::{Compound, EntitySnapshot};
pub use error::{EvolutionError, EvolutionWarning, Result};
pub use orchestration_entry::{CompoundOrchestrator, CompoundOutcome, CompoundPhase};
pub use predictor::FeedForwardPredictor;
pub use signal::SignalProcessor;
pub use stability::StabilityEvaluator;
pub use telemetry::{EvolutionTelemetry, EvolutionTelemetryBuilder};
