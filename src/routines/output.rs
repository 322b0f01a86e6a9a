use csv::WriterBuilder;
use eyre::{Result, WrapErr};
use serde_derive::Serialize;
use std::fs::{create_dir_all, File, OpenOptions};
use std::path::{Path, PathBuf};

/// Summary of one outer Newton iteration
///
/// `ratio` is `actred / prered` of the accepted step. The validation fields are
/// only filled when a validation set is supplied.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewtonIteration {
    pub iter: usize,
    pub f: f64,
    pub gnorm: f64,
    pub alpha: f64,
    pub ratio: f64,
    pub lambda: f64,
    pub cg_iters: usize,
    pub actred: f64,
    pub prered: f64,
    /// Wall-clock seconds spent in the iteration, validation excluded
    pub time: f64,
    pub val_loss: Option<f64>,
    pub val_acc: Option<f64>,
}

/// Per-iteration trace of a run
#[derive(Debug, Clone, Default)]
pub struct IterationLog {
    iterations: Vec<NewtonIteration>,
}

impl IterationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, iteration: NewtonIteration) {
        self.iterations.push(iteration);
    }

    pub fn iterations(&self) -> &[NewtonIteration] {
        &self.iterations
    }

    pub fn last(&self) -> Option<&NewtonIteration> {
        self.iterations.last()
    }

    pub(crate) fn last_mut(&mut self) -> Option<&mut NewtonIteration> {
        self.iterations.last_mut()
    }

    pub fn len(&self) -> usize {
        self.iterations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.iterations.is_empty()
    }

    /// Regularized training loss after each iteration
    pub fn losses(&self) -> Vec<f64> {
        self.iterations.iter().map(|it| it.f).collect()
    }

    pub fn total_cg_iters(&self) -> usize {
        self.iterations.iter().map(|it| it.cg_iters).sum()
    }

    /// Writes `iterations.csv` in `folder`
    pub fn write(&self, folder: &str) -> Result<PathBuf> {
        tracing::debug!("Writing iteration log...");
        let outputfile = OutputFile::new(folder, "iterations.csv")?;
        let mut writer = WriterBuilder::new()
            .has_headers(true)
            .from_writer(outputfile.file());
        for iteration in &self.iterations {
            writer.serialize(iteration)?;
        }
        writer.flush()?;
        tracing::debug!(
            "Iteration log written to {:?}",
            outputfile.relative_path()
        );
        Ok(outputfile.relative_path().to_path_buf())
    }
}

/// Why a run stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Status {
    /// All `iter_max` iterations were performed
    MaxIterations,
    /// The full gradient vanished exactly, no further step is possible
    ZeroGradient,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::MaxIterations => write!(f, "Maximum iterations reached"),
            Status::ZeroGradient => write!(f, "Zero gradient"),
        }
    }
}

/// Result of [crate::algorithms::NewtonCG::fit]
#[derive(Debug, Clone)]
pub struct FitResult {
    pub status: Status,
    /// Regularized training loss before the first iteration
    pub initial_loss: f64,
    pub final_loss: f64,
    pub best_accuracy: Option<f64>,
    pub final_accuracy: Option<f64>,
    /// Where the last checkpoint was written
    pub checkpoint: Option<PathBuf>,
    pub total_cg_iters: usize,
    /// Seconds spent in the optimizer, validation excluded
    pub running_time: f64,
    pub log: IterationLog,
}

/// An output file opened for writing, truncating any previous content
#[derive(Debug)]
pub struct OutputFile {
    file: File,
    relative_path: PathBuf,
}

impl OutputFile {
    pub fn new(folder: &str, file_name: &str) -> Result<Self> {
        let relative_path = Path::new(&folder).join(file_name);

        if let Some(parent) = relative_path.parent() {
            create_dir_all(parent)
                .wrap_err_with(|| format!("Failed to create directories for {:?}", parent))?;
        }

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&relative_path)
            .wrap_err_with(|| format!("Failed to open file: {:?}", relative_path))?;

        Ok(OutputFile {
            file,
            relative_path,
        })
    }

    pub fn file(&self) -> &File {
        &self.file
    }

    pub fn file_owned(self) -> File {
        self.file
    }

    pub fn relative_path(&self) -> &Path {
        &self.relative_path
    }
}
