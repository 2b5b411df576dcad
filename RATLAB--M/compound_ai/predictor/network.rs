use ndarray::{Array1, Array2};
use rand::{rngs::SmallRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::activation::Activation;
use crate::error::{EvolutionError, Result};

/// One entry of the predictor topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerSpec {
    /// Output width of the layer.
    pub neurons: usize,
    /// Activation applied to the layer output.
    pub activation: Activation,
}

impl LayerSpec {
    /// Creates a layer spec.
    #[must_use]
    pub const fn new(neurons: usize, activation: Activation) -> Self {
        Self {
            neurons,
            activation,
        }
    }
}

/// Dense layer with a `[fan_in x fan_out]` weight matrix.
#[derive(Debug, Clone)]
pub struct DenseLayer {
    weights: Array2<f64>,
    biases: Array1<f64>,
    activation: Activation,
}

impl DenseLayer {
    /// Xavier-uniform weights, zero biases.
    #[allow(clippy::cast_precision_loss)]
    fn xavier<R: Rng>(fan_in: usize, spec: LayerSpec, rng: &mut R) -> Self {
        let scale = (6.0 / (fan_in + spec.neurons) as f64).sqrt();
        let weights =
            Array2::from_shape_fn((fan_in, spec.neurons), |_| rng.gen_range(-1.0..=1.0) * scale);
        Self {
            weights,
            biases: Array1::zeros(spec.neurons),
            activation: spec.activation,
        }
    }

    /// `(fan_in, fan_out)`.
    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        self.weights.dim()
    }

    /// Weight matrix.
    #[must_use]
    pub const fn weights(&self) -> &Array2<f64> {
        &self.weights
    }

    /// Bias vector.
    #[must_use]
    pub const fn biases(&self) -> &Array1<f64> {
        &self.biases
    }

    /// Layer activation.
    #[must_use]
    pub const fn activation(&self) -> Activation {
        self.activation
    }

    fn forward(&self, input: &Array2<f64>) -> Array2<f64> {
        let mut output = input.dot(&self.weights) + &self.biases;
        let activation = self.activation;
        output.mapv_inplace(|value| activation.apply(value));
        output
    }
}

/// Fixed multi-layer dense network. Weights are drawn once and never trained.
#[derive(Debug, Clone)]
pub struct FeedForwardPredictor {
    input_width: usize,
    layers: Vec<DenseLayer>,
}

impl FeedForwardPredictor {
    /// Builds a predictor with entropy-seeded weights.
    pub fn new(input_width: usize, specs: &[LayerSpec]) -> Result<Self> {
        let mut rng = SmallRng::from_entropy();
        Self::build(input_width, specs, &mut rng)
    }

    /// Builds a predictor whose weights are reproducible for `seed`.
    pub fn with_seed(input_width: usize, specs: &[LayerSpec], seed: u64) -> Result<Self> {
        let mut rng = SmallRng::seed_from_u64(seed);
        Self::build(input_width, specs, &mut rng)
    }

    fn build<R: Rng>(input_width: usize, specs: &[LayerSpec], rng: &mut R) -> Result<Self> {
        if input_width == 0 {
            return Err(EvolutionError::InvalidTopology(
                "input width must be positive".into(),
            ));
        }
        if specs.is_empty() {
            return Err(EvolutionError::InvalidTopology(
                "at least one layer is required".into(),
            ));
        }
        let mut layers = Vec::with_capacity(specs.len());
        let mut fan_in = input_width;
        for (index, spec) in specs.iter().enumerate() {
            if spec.neurons == 0 {
                return Err(EvolutionError::InvalidTopology(format!(
                    "layer {index} has zero neurons"
                )));
            }
            layers.push(DenseLayer::xavier(fan_in, *spec, rng));
            fan_in = spec.neurons;
        }
        Ok(Self {
            input_width,
            layers,
        })
    }

    /// Fan-in of the first layer.
    #[must_use]
    pub const fn input_width(&self) -> usize {
        self.input_width
    }

    /// Neuron count of the final layer.
    #[must_use]
    pub fn output_width(&self) -> usize {
        self.layers.last().map_or(0, |layer| layer.shape().1)
    }

    /// Layers in evaluation order.
    #[must_use]
    pub fn layers(&self) -> &[DenseLayer] {
        &self.layers
    }

    /// Runs the batch (rows are items, columns are features) through every layer.
    pub fn predict(&self, batch: &Array2<f64>) -> Result<Array2<f64>> {
        if batch.ncols() != self.input_width {
            return Err(EvolutionError::DimensionMismatch {
                expected: self.input_width,
                actual: batch.ncols(),
            });
        }
        let mut current = batch.to_owned();
        for layer in &self.layers {
            current = layer.forward(&current);
        }
        Ok(current)
    }

    /// Async entry point for callers already on a runtime; computes eagerly.
    pub async fn predict_async(&self, batch: Array2<f64>) -> Result<Array2<f64>> {
        self.predict(&batch)
    }

    /// Predicts a single feature row.
    pub fn predict_row(&self, features: &[f64]) -> Result<Vec<f64>> {
        if features.len() != self.input_width {
            return Err(EvolutionError::DimensionMismatch {
                expected: self.input_width,
                actual: features.len(),
            });
        }
        let batch = Array2::from_shape_vec((1, features.len()), features.to_vec()).map_err(
            |_| EvolutionError::DimensionMismatch {
                expected: self.input_width,
                actual: features.len(),
            },
        )?;
        let output = self.predict(&batch)?;
        Ok(output.row(0).to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::runtime::Runtime;

    fn reference_layers() -> Vec<LayerSpec> {
        vec![
            LayerSpec::new(128, Activation::Relu),
            LayerSpec::new(256, Activation::Tanh),
            LayerSpec::new(128, Activation::Sigmoid),
        ]
    }

    #[test]
    fn allocates_xavier_shapes() {
        let predictor = FeedForwardPredictor::with_seed(64, &reference_layers(), 7).unwrap();
        let shapes: Vec<_> = predictor.layers().iter().map(DenseLayer::shape).collect();
        assert_eq!(shapes, vec![(64, 128), (128, 256), (256, 128)]);
        let first = &predictor.layers()[0];
        let bound = (6.0_f64 / 192.0).sqrt();
        assert!(first.weights().iter().all(|w| w.abs() <= bound));
        assert!(first.biases().iter().all(|b| *b == 0.0));
    }

    #[test]
    fn zero_batch_yields_finite_output_of_final_width() {
        let predictor = FeedForwardPredictor::with_seed(64, &reference_layers(), 11).unwrap();
        let output = predictor.predict(&Array2::zeros((3, 64))).unwrap();
        assert_eq!(output.dim(), (3, 128));
        assert!(output.iter().all(|v| v.is_finite()));
        // Zero input and zero biases: relu -> 0, tanh -> 0, sigmoid -> 0.5.
        assert!(output.iter().all(|v| (v - 0.5).abs() < 1e-12));
    }

    #[test]
    fn rejects_wrong_width() {
        let predictor = FeedForwardPredictor::with_seed(64, &reference_layers(), 3).unwrap();
        let err = predictor.predict(&Array2::zeros((1, 8))).unwrap_err();
        assert_eq!(
            err,
            EvolutionError::DimensionMismatch {
                expected: 64,
                actual: 8
            }
        );
        assert!(predictor.predict_row(&[0.0; 65]).is_err());
    }

    #[test]
    fn seeded_predictors_are_reproducible() {
        let a = FeedForwardPredictor::with_seed(4, &[LayerSpec::new(3, Activation::Tanh)], 42).unwrap();
        let b = FeedForwardPredictor::with_seed(4, &[LayerSpec::new(3, Activation::Tanh)], 42).unwrap();
        let row = [1.0, 0.0, 1.0, 0.5];
        assert_eq!(a.predict_row(&row).unwrap(), b.predict_row(&row).unwrap());
    }

    #[test]
    fn rejects_empty_topology() {
        assert!(matches!(
            FeedForwardPredictor::new(64, &[]),
            Err(EvolutionError::InvalidTopology(_))
        ));
        assert!(FeedForwardPredictor::new(64, &[LayerSpec::new(0, Activation::Relu)]).is_err());
    }

    #[test]
    fn async_prediction_matches_sync() {
        let predictor = FeedForwardPredictor::with_seed(64, &reference_layers(), 5).unwrap();
        let batch = Array2::from_elem((2, 64), 0.25);
        let expected = predictor.predict(&batch).unwrap();
        let rt = Runtime::new().unwrap();
        let actual = rt.block_on(predictor.predict_async(batch)).unwrap();
        assert_eq!(expected, actual);
    }
}
