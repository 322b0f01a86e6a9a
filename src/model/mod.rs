use crate::autodiff::{Tape, Var};
use crate::error::NewtonError;
use crate::routines::data::Dataset;
use ndarray::{Array2, ArrayView2, Axis, Ix2};

mod mlp;

pub use mlp::{Activation, Mlp};

/// Nodes produced by one recorded forward pass
#[derive(Debug, Clone, Copy)]
pub struct Forward {
    /// Pre-softmax outputs, one row per sample
    pub outputs: Var,
    /// Loss summed (not averaged) over the samples of the chunk, as a 1x1 node
    pub loss: Var,
}

/// A trainable model the optimizer can drive
///
/// The model owns its parameter tensors. The optimizer reads them to build each
/// forward pass and updates them in place during the line search. Parameter order
/// and shapes must never change after construction.
pub trait Model {
    fn parameters(&self) -> &[Array2<f64>];

    fn parameters_mut(&mut self) -> &mut [Array2<f64>];

    /// Number of input features
    fn input_dim(&self) -> usize;

    /// Number of outputs, one per class
    fn output_dim(&self) -> usize;

    /// Record the forward computation of one chunk on `tape`
    ///
    /// `params` are the tape nodes holding the current parameters, in the order of
    /// [Model::parameters].
    fn forward(
        &self,
        tape: &mut Tape,
        params: &[Var],
        inputs: ArrayView2<f64>,
        labels: ArrayView2<f64>,
    ) -> Forward;

    fn shapes(&self) -> Vec<Ix2> {
        self.parameters().iter().map(|p| p.raw_dim()).collect()
    }

    fn num_parameters(&self) -> usize {
        self.parameters().iter().map(|p| p.len()).sum()
    }

    /// Copy the current parameters onto `tape` as leaves
    fn record_parameters(&self, tape: &mut Tape) -> Vec<Var> {
        self.parameters()
            .iter()
            .map(|p| tape.leaf(p.clone()))
            .collect()
    }

    /// Reject a dataset whose feature or class count does not fit the model
    fn check_data(&self, data: &Dataset) -> Result<(), NewtonError> {
        if data.num_features() != self.input_dim() {
            return Err(NewtonError::dimension(format!(
                "the data has {} features but the model expects {} inputs",
                data.num_features(),
                self.input_dim()
            )));
        }
        if data.num_classes() != self.output_dim() {
            return Err(NewtonError::dimension(format!(
                "the data has {} classes but the model has {} outputs",
                data.num_classes(),
                self.output_dim()
            )));
        }
        Ok(())
    }
}

/// Summed softmax cross-entropy between `logits` and one-hot `labels`
///
/// The row maximum is subtracted as a constant before exponentiating; it cancels
/// out of both the loss and its derivatives.
pub fn softmax_cross_entropy(tape: &mut Tape, logits: Var, labels: Var) -> Var {
    let classes = tape.shape(logits).1;
    let row_max = tape
        .value(logits)
        .map_axis(Axis(1), |row| row.fold(f64::NEG_INFINITY, |m, &x| m.max(x)))
        .insert_axis(Axis(1));
    let row_max = tape.leaf(row_max);
    let row_max = tape.broadcast_cols(row_max, classes);
    let shifted = tape.sub(logits, row_max);

    let exp = tape.exp(shifted);
    let normalizer = tape.sum_cols(exp);
    let log_normalizer = tape.log(normalizer);
    let total = tape.sum(log_normalizer);

    let picked = tape.mul(shifted, labels);
    let picked = tape.sum(picked);
    tape.sub(total, picked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn cross_entropy_matches_closed_form() {
        let logits: Array2<f64> = array![[2.0, 1.0, 0.1], [0.5, 2.5, -1.0]];
        let labels: Array2<f64> = array![[1.0, 0.0, 0.0], [0.0, 0.0, 1.0]];
        let expected: f64 = logits
            .rows()
            .into_iter()
            .zip(labels.rows())
            .map(|(z, y)| {
                let lse = z.iter().map(|v| v.exp()).sum::<f64>().ln();
                lse - z.dot(&y)
            })
            .sum();

        let mut tape = Tape::new();
        let z = tape.leaf(logits);
        let y = tape.leaf(labels.clone());
        let loss = softmax_cross_entropy(&mut tape, z, y);
        assert!((tape.item(loss) - expected).abs() < 1e-12);

        // d loss / d logits = softmax - labels
        let grad = tape.gradients(&[loss], &[z], None).unwrap();
        let g = tape.value(grad[0]);
        for (row, (g_row, y_row)) in g.rows().into_iter().zip(labels.rows()).enumerate() {
            let z_row = tape.value(z).row(row);
            let norm: f64 = z_row.iter().map(|v| v.exp()).sum();
            for k in 0..3 {
                let softmax = z_row[k].exp() / norm;
                assert!((g_row[k] - (softmax - y_row[k])).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn cross_entropy_is_stable_for_large_logits() {
        let mut tape = Tape::new();
        let z = tape.leaf(array![[1000.0, 0.0]]);
        let y = tape.leaf(array![[1.0, 0.0]]);
        let loss = softmax_cross_entropy(&mut tape, z, y);
        assert!(tape.item(loss).is_finite());
        assert!(tape.item(loss).abs() < 1e-12);
    }
}
