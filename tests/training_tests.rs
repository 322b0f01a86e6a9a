use eyre::Result;
use ndarray::Array2;
use newtoncg::prelude::*;
use std::path::Path;

/// Two well separated clusters in the plane, alternating classes
fn clusters(n: usize, phase: f64) -> Result<Dataset> {
    let mut inputs = Array2::zeros((n, 2));
    let mut classes = Vec::with_capacity(n);
    for i in 0..n {
        let class = i % 2;
        let sign = if class == 0 { 1.0 } else { -1.0 };
        let t = i as f64 + phase;
        inputs[[i, 0]] = sign * 1.5 + 0.5 * (1.3 * t).sin();
        inputs[[i, 1]] = sign * 1.0 + 0.5 * (0.7 * t).cos();
        classes.push(class);
    }
    Ok(Dataset::from_classes(inputs, &classes, 2)?)
}

fn config() -> NewtonConfig {
    NewtonConfig {
        bsize: 20,
        gn_size: Some(50),
        c: 10.0,
        cg_max: 10,
        iter_max: 5,
        ..NewtonConfig::new(100)
    }
}

/// Training a two-layer linear model on separable data never increases the loss
#[test]
fn test_loss_decreases_on_separable_data() -> Result<()> {
    let train = clusters(100, 0.0)?;
    let model = Mlp::new(&[2, 4, 2], Activation::Identity, 347)?;
    let mut optimizer = NewtonCG::new(model, config())?;

    let result = optimizer.fit(&train, None, &mut NoCheckpoint, Path::new("unused.json"))?;

    assert_eq!(result.status, Status::MaxIterations);
    assert_eq!(result.log.len(), 5);
    let mut previous = result.initial_loss;
    for iteration in result.log.iterations() {
        assert!(
            iteration.f <= previous + 1e-12,
            "loss went up at iteration {}: {} -> {}",
            iteration.iter,
            previous,
            iteration.f
        );
        assert!(iteration.cg_iters >= 1 && iteration.cg_iters <= 10);
        assert!(iteration.lambda > 0.0);
        previous = iteration.f;
    }
    assert!(result.final_loss < result.initial_loss);
    assert_eq!(result.total_cg_iters, result.log.total_cg_iters());

    let prediction = predict(optimizer.model(), &train, 32)?;
    assert!(prediction.accuracy > 0.75, "accuracy {}", prediction.accuracy);
    Ok(())
}

/// The same seed reproduces the same run
#[test]
fn test_runs_are_reproducible() -> Result<()> {
    let train = clusters(100, 0.0)?;
    let mut losses = Vec::new();
    for _ in 0..2 {
        let model = Mlp::new(&[2, 3, 2], Activation::Tanh, 7)?;
        let mut optimizer = NewtonCG::new(model, NewtonConfig { iter_max: 3, ..config() })?;
        let result = optimizer.fit(&train, None, &mut NoCheckpoint, Path::new("unused.json"))?;
        losses.push(result.log.losses());
    }
    assert_eq!(losses[0], losses[1]);
    Ok(())
}

/// Validation results are recorded and the best model is checkpointed
#[test]
fn test_validation_checkpoints_best_model() -> Result<()> {
    let train = clusters(100, 0.0)?;
    let val = clusters(40, 0.5)?;
    let folder = std::env::temp_dir().join(format!("newtoncg_train_{}", std::process::id()));
    let model_path = folder.join("best.json");

    let model = Mlp::new(&[2, 4, 2], Activation::Tanh, 347)?;
    let mut optimizer = NewtonCG::new(model, config())?;
    let mut checkpoint = JsonCheckpoint::new();
    let result = optimizer.fit(&train, Some(&val), &mut checkpoint, &model_path)?;

    for iteration in result.log.iterations() {
        assert!(iteration.val_acc.is_some());
        assert!(iteration.val_loss.is_some());
    }
    let best = result.best_accuracy.expect("validation was supplied");
    let best_seen = result
        .log
        .iterations()
        .iter()
        .filter_map(|it| it.val_acc)
        .fold(0.0, f64::max);
    assert_eq!(best, best_seen);
    assert_eq!(result.final_accuracy, result.log.last().and_then(|it| it.val_acc));

    if best > 0.0 {
        assert!(checkpoint.saves() >= 1);
        assert_eq!(result.checkpoint.as_deref(), Some(model_path.as_path()));
        let mut restored = Mlp::new(&[2, 4, 2], Activation::Tanh, 1)?;
        JsonCheckpoint::restore(&model_path, &mut restored)?;
        let prediction = predict(&restored, &val, 20)?;
        assert_eq!(prediction.accuracy, best);
    }
    std::fs::remove_dir_all(&folder).ok();
    Ok(())
}

/// Stepwise use through `iterate` produces the same trace as `fit`
#[test]
fn test_iterate_matches_fit() -> Result<()> {
    let train = clusters(100, 0.0)?;

    let model = Mlp::new(&[2, 4, 2], Activation::Identity, 3)?;
    let mut fitted = NewtonCG::new(model.clone(), NewtonConfig { iter_max: 2, ..config() })?;
    let result = fitted.fit(&train, None, &mut NoCheckpoint, Path::new("unused.json"))?;

    let mut stepped = NewtonCG::new(model, NewtonConfig { iter_max: 2, ..config() })?;
    stepped.initialize(&train)?;
    let first = stepped.iterate(&train)?;
    let second = stepped.iterate(&train)?;

    assert_eq!(first.f, result.log.iterations()[0].f);
    assert_eq!(second.f, result.log.iterations()[1].f);
    assert_eq!(stepped.lambda(), fitted.lambda());
    Ok(())
}
