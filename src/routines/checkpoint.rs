use crate::model::Model;
use eyre::{Result, WrapErr};
use ndarray::Array2;
use serde_derive::{Deserialize, Serialize};
use std::fs::{create_dir_all, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

/// Persists model parameters at the end of every optimizer iteration
pub trait Checkpoint {
    /// Save the parameters of `model` to `path` and return the file written
    fn save<M: Model>(&mut self, model: &M, path: &Path) -> Result<PathBuf>;
}

/// Discards every checkpoint
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCheckpoint;

impl Checkpoint for NoCheckpoint {
    fn save<M: Model>(&mut self, _model: &M, path: &Path) -> Result<PathBuf> {
        Ok(path.to_path_buf())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredParameters {
    parameters: Vec<Array2<f64>>,
}

/// Stores the parameter tensors as JSON, overwriting the previous checkpoint
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCheckpoint {
    saves: usize,
}

impl JsonCheckpoint {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of checkpoints written so far
    pub fn saves(&self) -> usize {
        self.saves
    }

    /// Load parameters written by [JsonCheckpoint::save] into `model`
    ///
    /// The stored tensors must match the model's parameter count and shapes.
    pub fn restore<M: Model>(path: &Path, model: &mut M) -> Result<()> {
        let file = File::open(path).wrap_err_with(|| format!("Failed to open checkpoint {:?}", path))?;
        let stored: StoredParameters = serde_json::from_reader(BufReader::new(file))
            .wrap_err_with(|| format!("Failed to parse checkpoint {:?}", path))?;

        let current = model.parameters_mut();
        if stored.parameters.len() != current.len() {
            eyre::bail!(
                "Checkpoint {:?} holds {} tensors, the model has {}",
                path,
                stored.parameters.len(),
                current.len()
            );
        }
        for (k, (target, loaded)) in current.iter().zip(&stored.parameters).enumerate() {
            if target.dim() != loaded.dim() {
                eyre::bail!(
                    "Tensor {} in {:?} has shape {:?}, the model expects {:?}",
                    k,
                    path,
                    loaded.dim(),
                    target.dim()
                );
            }
        }
        for (target, loaded) in current.iter_mut().zip(stored.parameters) {
            *target = loaded;
        }
        tracing::debug!("Restored parameters from {:?}", path);
        Ok(())
    }
}

impl Checkpoint for JsonCheckpoint {
    fn save<M: Model>(&mut self, model: &M, path: &Path) -> Result<PathBuf> {
        if let Some(parent) = path.parent() {
            create_dir_all(parent)
                .wrap_err_with(|| format!("Failed to create directories for {:?}", parent))?;
        }
        let file = File::create(path).wrap_err_with(|| format!("Failed to create {:?}", path))?;
        let stored = StoredParameters {
            parameters: model.parameters().to_vec(),
        };
        serde_json::to_writer(BufWriter::new(file), &stored)
            .wrap_err_with(|| format!("Failed to write checkpoint {:?}", path))?;
        self.saves += 1;
        tracing::debug!("Checkpoint written to {:?}", path);
        Ok(path.to_path_buf())
    }
}
