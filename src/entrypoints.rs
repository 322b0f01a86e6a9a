use crate::algorithms::NewtonCG;
use crate::logger;
use crate::model::Model;
use crate::routines::checkpoint::JsonCheckpoint;
use crate::routines::data::read_csv;
use crate::routines::output::FitResult;
use crate::routines::settings::{read_settings, write_settings_to_file, Settings};

use eyre::{Result, WrapErr};
use std::path::Path;
use std::time::Instant;

/// Primary entrypoint for training
///
/// Reads the settings file at `settings_path`, sets up logging and trains `model`, see [fit].
pub fn start<M: Model>(model: M, settings_path: impl AsRef<Path>) -> Result<(M, FitResult)> {
    let settings = read_settings(settings_path)?;
    logger::setup_log(&settings)?;
    fit(model, &settings)
}

/// Train `model` with the given settings
///
/// The datasets are read from the CSV files named in `settings.data`. The effective
/// settings are written to `settings.json`, the iteration trace to `iterations.csv`
/// and the checkpoint to `settings.output.model`, all inside `settings.output.path`.
pub fn fit<M: Model>(model: M, settings: &Settings) -> Result<(M, FitResult)> {
    let now = Instant::now();
    tracing::info!("Starting Newton-CG");
    settings.newton.validate()?;

    let output = Path::new(&settings.output.path);
    write_settings_to_file(settings, output)?;
    tracing::info!("Output files will be written to {}", settings.output.path);

    // Read input data
    let train = read_csv(&settings.data.train, settings.data.num_classes)
        .wrap_err("Failed to read the training set")?;
    tracing::info!(
        "Training set contains {} samples with {} features",
        train.len(),
        train.num_features()
    );
    let val = match &settings.data.validation {
        Some(path) => {
            let val = read_csv(path, settings.data.num_classes)
                .wrap_err("Failed to read the validation set")?;
            tracing::info!("Validation set contains {} samples", val.len());
            Some(val)
        }
        None => None,
    };

    let model_path = output.join(&settings.output.model);
    let mut checkpoint = JsonCheckpoint::new();
    let mut optimizer = NewtonCG::new(model, settings.newton.clone())?;
    let result = optimizer.fit(&train, val.as_ref(), &mut checkpoint, &model_path)?;

    result.log.write(&settings.output.path)?;
    tracing::info!(
        "Newton-CG finished in {:.2?} with status: {}",
        now.elapsed(),
        result.status
    );
    Ok((optimizer.into_model(), result))
}
