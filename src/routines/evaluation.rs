use crate::autodiff::Tape;
use crate::error::NewtonError;
use crate::model::Model;
use crate::routines::data::Dataset;
use ndarray::{Array1, ArrayView1, Axis};

/// Loss and accuracy of a model on a dataset
#[derive(Debug, Clone)]
pub struct Prediction {
    /// Mean cross-entropy per sample, without the regularization term
    pub loss: f64,
    /// Fraction of samples whose arg-max output matches the label
    pub accuracy: f64,
    /// Predicted class of every sample
    pub predictions: Array1<usize>,
}

fn argmax(row: ArrayView1<f64>) -> usize {
    let mut best = 0;
    for (k, &value) in row.iter().enumerate() {
        if value > row[best] {
            best = k;
        }
    }
    best
}

/// Evaluate `model` on `data` in chunks of `bsize` samples
pub fn predict<M: Model>(model: &M, data: &Dataset, bsize: usize) -> Result<Prediction, NewtonError> {
    if bsize == 0 {
        return Err(NewtonError::precondition("bsize must be positive"));
    }
    if data.is_empty() {
        return Err(NewtonError::precondition("cannot evaluate an empty dataset"));
    }
    model.check_data(data)?;

    let mut total_loss = 0.0;
    let mut correct = 0usize;
    let mut predictions = Vec::with_capacity(data.len());
    for (inputs, labels) in data.chunks(bsize) {
        let mut tape = Tape::new();
        let params = model.record_parameters(&mut tape);
        let forward = model.forward(&mut tape, &params, inputs, labels);
        total_loss += tape.item(forward.loss);

        for (output, label) in tape
            .value(forward.outputs)
            .axis_iter(Axis(0))
            .zip(labels.axis_iter(Axis(0)))
        {
            let predicted = argmax(output);
            if predicted == argmax(label) {
                correct += 1;
            }
            predictions.push(predicted);
        }
    }

    let n = data.len() as f64;
    Ok(Prediction {
        loss: total_loss / n,
        accuracy: correct as f64 / n,
        predictions: Array1::from(predictions),
    })
}
