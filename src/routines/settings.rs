use crate::error::NewtonError;
use config::Config as eConfig;
use eyre::{Result, WrapErr};
use serde_derive::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Settings for a training run, usually read from a TOML file with [read_settings]
#[derive(Debug, Deserialize, Clone, Serialize)]
pub struct Settings {
    pub data: Data,
    #[serde(default)]
    pub output: Output,
    pub newton: NewtonConfig,
    #[serde(default)]
    pub log: Log,
}

#[derive(Debug, Deserialize, Clone, Serialize)]
pub struct Data {
    pub train: String,
    pub validation: Option<String>,
    pub num_classes: usize,
}

#[derive(Debug, Deserialize, Clone, Serialize)]
pub struct Output {
    /// Folder receiving `settings.json`, `iterations.csv` and the checkpoint
    #[serde(default = "default_output_path")]
    pub path: String,
    /// Checkpoint file name, relative to `path`
    #[serde(default = "default_model_file")]
    pub model: String,
}

impl Default for Output {
    fn default() -> Self {
        Self {
            path: default_output_path(),
            model: default_model_file(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Serialize)]
pub struct Log {
    #[serde(default = "default_log_level")]
    pub level: String,
    pub file: Option<String>,
    #[serde(default = "default_false")]
    pub screen_only: bool,
}

impl Default for Log {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
            screen_only: false,
        }
    }
}

/// Immutable optimizer settings for one run
#[derive(Debug, Deserialize, Clone, Serialize, PartialEq)]
pub struct NewtonConfig {
    /// Number of training samples; the full batch must match it exactly
    pub num_data: usize,
    /// Chunk size for every accumulation pass
    #[serde(default = "default_bsize")]
    pub bsize: usize,
    /// Gauss-Newton subsample size, `ceil(0.05 * num_data)` when unset
    #[serde(default)]
    pub gn_size: Option<usize>,
    /// Inverse L2 regularization strength
    #[serde(default = "default_c")]
    pub c: f64,
    /// CG stops once the residual norm falls below `xi * |g|`
    #[serde(default = "default_xi")]
    pub xi: f64,
    #[serde(default = "default_cg_max")]
    pub cg_max: usize,
    #[serde(default = "default_iter_max")]
    pub iter_max: usize,
    /// Armijo sufficient-decrease constant
    #[serde(default = "default_eta")]
    pub eta: f64,
    #[serde(default = "default_boost")]
    pub boost: f64,
    #[serde(default = "default_drop")]
    pub drop: f64,
    /// Initial damping
    #[serde(default = "default_lambda")]
    pub lambda: f64,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default = "default_line_search_max")]
    pub line_search_max: usize,
}

impl NewtonConfig {
    /// Default settings for a training set of `num_data` samples
    pub fn new(num_data: usize) -> Self {
        Self {
            num_data,
            bsize: default_bsize(),
            gn_size: None,
            c: default_c(),
            xi: default_xi(),
            cg_max: default_cg_max(),
            iter_max: default_iter_max(),
            eta: default_eta(),
            boost: default_boost(),
            drop: default_drop(),
            lambda: default_lambda(),
            seed: default_seed(),
            line_search_max: default_line_search_max(),
        }
    }

    pub fn gn_size(&self) -> usize {
        self.gn_size
            .unwrap_or_else(|| (0.05 * self.num_data as f64).ceil() as usize)
    }

    /// Number of chunks in a full-batch pass
    pub fn num_grad_segment(&self) -> usize {
        self.num_data.div_ceil(self.bsize)
    }

    /// Number of chunks in a Gauss-Newton pass
    pub fn num_gv_segment(&self) -> usize {
        self.gn_size().div_ceil(self.bsize)
    }

    pub fn validate(&self) -> Result<(), NewtonError> {
        let fail = |msg: String| Err(NewtonError::PreconditionViolation(msg));
        if self.num_data == 0 {
            return fail("num_data must be positive".to_string());
        }
        if self.bsize == 0 {
            return fail("bsize must be positive".to_string());
        }
        let gn_size = self.gn_size();
        if gn_size == 0 || gn_size > self.num_data {
            return fail(format!(
                "gn_size must lie in 1..={}, got {}",
                self.num_data, gn_size
            ));
        }
        if !(self.c > 0.0) {
            return fail(format!("C must be positive, got {}", self.c));
        }
        if !(self.xi > 0.0) {
            return fail(format!("xi must be positive, got {}", self.xi));
        }
        if self.cg_max == 0 {
            return fail("cg_max must be positive".to_string());
        }
        if !(self.eta > 0.0 && self.eta < 1.0) {
            return fail(format!("eta must lie in (0, 1), got {}", self.eta));
        }
        if !(self.boost > 1.0) {
            return fail(format!("boost must exceed 1, got {}", self.boost));
        }
        if !(self.drop > 0.0 && self.drop < 1.0) {
            return fail(format!("drop must lie in (0, 1), got {}", self.drop));
        }
        if !(self.lambda > 0.0) {
            return fail(format!("lambda must be positive, got {}", self.lambda));
        }
        if self.line_search_max == 0 {
            return fail("line_search_max must be positive".to_string());
        }
        Ok(())
    }
}

/// Read settings from a TOML file, with `NEWTON`-prefixed environment overrides
pub fn read_settings(path: impl AsRef<Path>) -> Result<Settings> {
    let path = path.as_ref();
    let parsed = eConfig::builder()
        .add_source(config::File::from(path).format(config::FileFormat::Toml))
        .add_source(
            config::Environment::with_prefix("NEWTON")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .wrap_err_with(|| format!("Failed to read settings from {:?}", path))?;

    let settings: Settings = parsed
        .try_deserialize()
        .wrap_err_with(|| format!("Invalid settings in {:?}", path))?;
    Ok(settings)
}

/// Write the effective settings as `settings.json` in `folder`
pub fn write_settings_to_file(settings: &Settings, folder: impl AsRef<Path>) -> Result<PathBuf> {
    let folder = folder.as_ref();
    std::fs::create_dir_all(folder)
        .wrap_err_with(|| format!("Failed to create output folder {:?}", folder))?;
    let file_path = folder.join("settings.json");
    let serialized = serde_json::to_string_pretty(settings)?;
    std::fs::write(&file_path, serialized)
        .wrap_err_with(|| format!("Failed to write {:?}", file_path))?;
    Ok(file_path)
}

// *********************************
// Default values for deserializing
// *********************************
fn default_false() -> bool {
    false
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_output_path() -> String {
    "outputs".to_string()
}

fn default_model_file() -> String {
    "model.json".to_string()
}

fn default_bsize() -> usize {
    1024
}

fn default_c() -> f64 {
    0.01
}

fn default_xi() -> f64 {
    0.1
}

fn default_cg_max() -> usize {
    250
}

fn default_iter_max() -> usize {
    100
}

fn default_eta() -> f64 {
    1e-4
}

fn default_boost() -> f64 {
    1.5
}

fn default_drop() -> f64 {
    2.0 / 3.0
}

fn default_lambda() -> f64 {
    1.0
}

fn default_seed() -> u64 {
    347
}

fn default_line_search_max() -> usize {
    30
}
