//! Fixed-topology feed-forward predictor used to score ability development.

/// Element-wise activation functions.
pub mod activation;
/// Dense network construction and inference.
pub mod network;

pub use activation::Activation;
pub use network::{DenseLayer, FeedForwardPredictor, LayerSpec};
