//! Adaptive signal shaping, independent of the compound pipeline.

/// Signal processor and activation records.
pub mod processor;
/// Keyed synaptic weights with an explicit initialization policy.
pub mod weights;

pub use processor::{ActivationRecord, NormalizedSignal, SignalContext, SignalProcessor};
pub use weights::{SynapticWeights, WeightInit};
