use crate::error::NewtonError;
use eyre::{Result, WrapErr};
use ndarray::{s, Array2, ArrayView2, Axis};
use ndarray_csv::Array2Reader;
use rand::Rng;
use std::path::Path;

/// Inputs and one-hot labels, one sample per row
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    inputs: Array2<f64>,
    labels: Array2<f64>,
}

impl Dataset {
    pub fn new(inputs: Array2<f64>, labels: Array2<f64>) -> Result<Self, NewtonError> {
        if inputs.nrows() != labels.nrows() {
            return Err(NewtonError::precondition(format!(
                "{} input rows but {} label rows",
                inputs.nrows(),
                labels.nrows()
            )));
        }
        Ok(Self { inputs, labels })
    }

    /// Build from integer class labels
    pub fn from_classes(
        inputs: Array2<f64>,
        classes: &[usize],
        num_classes: usize,
    ) -> Result<Self, NewtonError> {
        let labels = one_hot(classes, num_classes)?;
        Self::new(inputs, labels)
    }

    pub fn len(&self) -> usize {
        self.inputs.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn inputs(&self) -> &Array2<f64> {
        &self.inputs
    }

    pub fn labels(&self) -> &Array2<f64> {
        &self.labels
    }

    pub fn num_features(&self) -> usize {
        self.inputs.ncols()
    }

    pub fn num_classes(&self) -> usize {
        self.labels.ncols()
    }

    /// Contiguous chunks of at most `bsize` samples, the last one possibly shorter
    pub fn chunks(
        &self,
        bsize: usize,
    ) -> impl Iterator<Item = (ArrayView2<'_, f64>, ArrayView2<'_, f64>)> + '_ {
        self.inputs
            .axis_chunks_iter(Axis(0), bsize)
            .zip(self.labels.axis_chunks_iter(Axis(0), bsize))
    }

    pub fn select(&self, indices: &[usize]) -> Dataset {
        Dataset {
            inputs: self.inputs.select(Axis(0), indices),
            labels: self.labels.select(Axis(0), indices),
        }
    }

    /// Draw `size` distinct samples uniformly at random
    pub fn subsample<R: Rng + ?Sized>(&self, rng: &mut R, size: usize) -> Result<Dataset, NewtonError> {
        if size > self.len() {
            return Err(NewtonError::precondition(format!(
                "cannot draw {} samples without replacement from {}",
                size,
                self.len()
            )));
        }
        let indices = rand::seq::index::sample(rng, self.len(), size).into_vec();
        Ok(self.select(&indices))
    }
}

/// One row per class index with a single 1.0 in that column
pub fn one_hot(classes: &[usize], num_classes: usize) -> Result<Array2<f64>, NewtonError> {
    let mut labels = Array2::zeros((classes.len(), num_classes));
    for (row, &class) in classes.iter().enumerate() {
        if class >= num_classes {
            return Err(NewtonError::precondition(format!(
                "label {} in row {} is outside 0..{}",
                class, row, num_classes
            )));
        }
        labels[[row, class]] = 1.0;
    }
    Ok(labels)
}

/// Read a dataset from a CSV file with a header row
///
/// The last column holds the integer class label, every other column is a feature.
pub fn read_csv(path: impl AsRef<Path>, num_classes: usize) -> Result<Dataset> {
    let path = path.as_ref();
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .wrap_err_with(|| format!("Failed to open data file {:?}", path))?;
    let table: Array2<f64> = reader
        .deserialize_array2_dynamic()
        .wrap_err_with(|| format!("Failed to parse data file {:?}", path))?;

    if table.ncols() < 2 {
        eyre::bail!(
            "{:?} needs at least one feature column and a label column",
            path
        );
    }
    let label_col = table.ncols() - 1;
    let mut classes = Vec::with_capacity(table.nrows());
    for (row, &value) in table.column(label_col).iter().enumerate() {
        if value < 0.0 || value.fract() != 0.0 {
            eyre::bail!("Row {} of {:?} has a non-integer label {}", row, path, value);
        }
        classes.push(value as usize);
    }
    let inputs = table.slice(s![.., ..label_col]).to_owned();
    let dataset = Dataset::from_classes(inputs, &classes, num_classes)?;
    tracing::debug!(
        "Read {} samples with {} features from {:?}",
        dataset.len(),
        dataset.num_features(),
        path
    );
    Ok(dataset)
}
