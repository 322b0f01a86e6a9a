use super::{softmax_cross_entropy, Forward, Model};
use crate::autodiff::{Tape, Var};
use crate::error::NewtonError;
use ndarray::{Array2, ArrayView2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_derive::{Deserialize, Serialize};

/// Hidden-layer nonlinearity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    Tanh,
    Identity,
}

/// Fully-connected classifier trained with softmax cross-entropy
///
/// Parameters are stored as `[W1, b1, W2, b2, ...]` with `Wk` of shape
/// `(fan_in, fan_out)` and `bk` of shape `(1, fan_out)`. The activation is applied
/// after every layer except the last, which produces the logits.
#[derive(Debug, Clone)]
pub struct Mlp {
    params: Vec<Array2<f64>>,
    activation: Activation,
}

impl Mlp {
    /// Glorot-uniform weights and zero biases for the given layer widths
    pub fn new(layers: &[usize], activation: Activation, seed: u64) -> Result<Self, NewtonError> {
        if layers.len() < 2 || layers.iter().any(|&width| width == 0) {
            return Err(NewtonError::precondition(format!(
                "an MLP needs at least two non-empty layers, got {:?}",
                layers
            )));
        }
        let mut rng = StdRng::seed_from_u64(seed);
        let mut params = Vec::with_capacity(2 * (layers.len() - 1));
        for pair in layers.windows(2) {
            let (fan_in, fan_out) = (pair[0], pair[1]);
            let limit = (6.0 / (fan_in + fan_out) as f64).sqrt();
            params.push(Array2::from_shape_fn((fan_in, fan_out), |_| {
                rng.random_range(-limit..limit)
            }));
            params.push(Array2::zeros((1, fan_out)));
        }
        Ok(Self { params, activation })
    }

    /// Build from explicit `[W1, b1, W2, b2, ...]` tensors
    pub fn from_parameters(
        params: Vec<Array2<f64>>,
        activation: Activation,
    ) -> Result<Self, NewtonError> {
        if params.is_empty() || params.len() % 2 != 0 {
            return Err(NewtonError::precondition(format!(
                "expected weight/bias pairs, got {} tensors",
                params.len()
            )));
        }
        let mut fan_in = params[0].nrows();
        for (layer, pair) in params.chunks(2).enumerate() {
            let (weight, bias) = (&pair[0], &pair[1]);
            if weight.nrows() != fan_in {
                return Err(NewtonError::dimension(format!(
                    "layer {} weight has {} rows, previous layer has width {}",
                    layer,
                    weight.nrows(),
                    fan_in
                )));
            }
            if bias.dim() != (1, weight.ncols()) {
                return Err(NewtonError::dimension(format!(
                    "layer {} bias has shape {:?}, expected (1, {})",
                    layer,
                    bias.dim(),
                    weight.ncols()
                )));
            }
            fan_in = weight.ncols();
        }
        Ok(Self { params, activation })
    }

    /// Widths of the input, hidden and output layers
    pub fn layer_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![self.params[0].nrows()];
        sizes.extend(self.params.chunks(2).map(|pair| pair[0].ncols()));
        sizes
    }
}

impl Model for Mlp {
    fn parameters(&self) -> &[Array2<f64>] {
        &self.params
    }

    fn parameters_mut(&mut self) -> &mut [Array2<f64>] {
        &mut self.params
    }

    fn input_dim(&self) -> usize {
        self.params[0].nrows()
    }

    fn output_dim(&self) -> usize {
        self.params[self.params.len() - 1].ncols()
    }

    fn forward(
        &self,
        tape: &mut Tape,
        params: &[Var],
        inputs: ArrayView2<f64>,
        labels: ArrayView2<f64>,
    ) -> Forward {
        let depth = params.len() / 2;
        let mut hidden = tape.leaf(inputs.to_owned());
        for (layer, pair) in params.chunks(2).enumerate() {
            let z = tape.matmul(hidden, pair[0]);
            let rows = tape.shape(z).0;
            let bias = tape.broadcast_rows(pair[1], rows);
            let z = tape.add(z, bias);
            hidden = match self.activation {
                Activation::Tanh if layer + 1 < depth => tape.tanh(z),
                _ => z,
            };
        }
        let labels = tape.leaf(labels.to_owned());
        let loss = softmax_cross_entropy(tape, hidden, labels);
        Forward {
            outputs: hidden,
            loss,
        }
    }
}
