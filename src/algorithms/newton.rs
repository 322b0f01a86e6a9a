use crate::algorithms::cg::{self, CgState, CgStop};
use crate::algorithms::minibatch::Accumulator;
use crate::error::NewtonError;
use crate::model::Model;
use crate::routines::checkpoint::Checkpoint;
use crate::routines::data::Dataset;
use crate::routines::evaluation::predict;
use crate::routines::output::{FitResult, IterationLog, NewtonIteration, Status};
use crate::routines::settings::NewtonConfig;
use crate::routines::vectorize::{inverse_vectorize, norm};
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// `alpha·gs + alpha²·sGs`
pub fn predicted_reduction(alpha: f64, gs: f64, sgs: f64) -> f64 {
    alpha * gs + alpha * alpha * sgs
}

/// Armijo sufficient decrease, `actred <= eta·alpha·gs`
pub fn armijo_accepts(actred: f64, alpha: f64, gs: f64, eta: f64) -> bool {
    actred <= eta * alpha * gs
}

/// Levenberg-Marquardt style damping update from the reduction ratio
pub fn update_damping(lambda: f64, ratio: f64, boost: f64, drop: f64) -> f64 {
    if ratio < 0.25 {
        lambda * boost
    } else if ratio >= 0.75 {
        lambda * drop
    } else {
        lambda
    }
}

/// Parameters moved along a fixed step `s` during the line search
pub trait LineSearchTarget {
    /// Place the parameters at `θ₀ + alpha·s`
    fn move_to(&mut self, alpha: f64) -> Result<(), NewtonError>;

    /// Full-batch regularized loss at the current position
    fn loss(&mut self) -> Result<f64, NewtonError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineSearchStatus {
    Accepted,
    /// No trial passed; the parameters are back at `θ₀`
    Exhausted,
}

#[derive(Debug, Clone)]
pub struct LineSearchResult {
    pub alpha: f64,
    pub f: f64,
    pub actred: f64,
    pub prered: f64,
    pub trials: usize,
    pub status: LineSearchStatus,
}

/// Backtracking line search halving `alpha` from 1 until the Armijo condition holds
///
/// At most `max_trials` losses are evaluated. When every trial is rejected the
/// step is undone and the result reports `actred = 0` at `alpha = 0`.
pub fn backtracking<T: LineSearchTarget>(
    target: &mut T,
    f_old: f64,
    gs: f64,
    sgs: f64,
    eta: f64,
    max_trials: usize,
) -> Result<LineSearchResult, NewtonError> {
    let mut alpha = 1.0;
    let mut prered = predicted_reduction(alpha, gs, sgs);
    for trial in 1..=max_trials {
        target.move_to(alpha)?;
        let f = target.loss()?;
        let actred = f - f_old;
        prered = predicted_reduction(alpha, gs, sgs);
        if armijo_accepts(actred, alpha, gs, eta) {
            return Ok(LineSearchResult {
                alpha,
                f,
                actred,
                prered,
                trials: trial,
                status: LineSearchStatus::Accepted,
            });
        }
        alpha *= 0.5;
    }

    target.move_to(0.0)?;
    Ok(LineSearchResult {
        alpha: 0.0,
        f: f_old,
        actred: 0.0,
        prered,
        trials: max_trials,
        status: LineSearchStatus::Exhausted,
    })
}

/// Moves the model parameters incrementally, tracking the alpha already applied
struct StepTarget<'a, M: Model> {
    model: &'a mut M,
    step: Vec<Array2<f64>>,
    applied: f64,
    accumulator: &'a mut Accumulator,
    train: &'a Dataset,
}

impl<M: Model> LineSearchTarget for StepTarget<'_, M> {
    fn move_to(&mut self, alpha: f64) -> Result<(), NewtonError> {
        let delta = alpha - self.applied;
        for (param, step) in self.model.parameters_mut().iter_mut().zip(&self.step) {
            param.scaled_add(delta, step);
        }
        self.applied = alpha;
        Ok(())
    }

    fn loss(&mut self) -> Result<f64, NewtonError> {
        self.accumulator.loss_only(&*self.model, self.train)
    }
}

/// Step direction of one outer iteration with its model terms
#[derive(Debug, Clone)]
struct Direction {
    s: Array1<f64>,
    /// `g·s`
    gs: f64,
    /// `0.5·s·G·s` without the damping
    sgs: f64,
    cg_iters: usize,
    stop: CgStop,
    /// `s = -g` replaced a CG step that was not a descent direction
    fallback: bool,
}

/// Subsampled Gauss-Newton optimizer with a truncated CG inner solver
///
/// Each outer iteration draws a fresh subsample for the Gauss-Newton products,
/// solves the damped system with CG, runs a backtracking line search on the full
/// batch and adapts the damping from the ratio of actual to predicted reduction.
pub struct NewtonCG<M: Model> {
    model: M,
    config: NewtonConfig,
    accumulator: Accumulator,
    lambda: f64,
    f: f64,
    g: Array1<f64>,
    gnorm: f64,
    rng: StdRng,
    iteration: usize,
    initialized: bool,
    log: IterationLog,
}

impl<M: Model> NewtonCG<M> {
    pub fn new(model: M, config: NewtonConfig) -> Result<Self, NewtonError> {
        config.validate()?;
        let num_parameters = model.num_parameters();
        if num_parameters == 0 {
            return Err(NewtonError::precondition("the model has no parameters"));
        }
        Ok(Self {
            accumulator: Accumulator::new(&config, num_parameters),
            lambda: config.lambda,
            f: f64::NAN,
            g: Array1::zeros(num_parameters),
            gnorm: f64::NAN,
            rng: StdRng::seed_from_u64(config.seed),
            iteration: 0,
            initialized: false,
            log: IterationLog::new(),
            model,
            config,
        })
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn into_model(self) -> M {
        self.model
    }

    pub fn config(&self) -> &NewtonConfig {
        &self.config
    }

    pub fn lambda(&self) -> f64 {
        self.lambda
    }

    /// Regularized full-batch loss at the current parameters
    pub fn loss(&self) -> f64 {
        self.f
    }

    pub fn gradient(&self) -> &Array1<f64> {
        &self.g
    }

    pub fn gnorm(&self) -> f64 {
        self.gnorm
    }

    pub fn log(&self) -> &IterationLog {
        &self.log
    }

    fn check_train(&self, train: &Dataset) -> Result<(), NewtonError> {
        if train.len() != self.config.num_data {
            return Err(NewtonError::precondition(format!(
                "the full batch has {} samples but num_data is {}; the loss is averaged over num_data",
                train.len(),
                self.config.num_data
            )));
        }
        self.model.check_data(train)
    }

    /// Solve the damped system on `sample` with CG
    ///
    /// Falls back to steepest descent when the CG step does not decrease the model.
    fn direction(&mut self, sample: &Dataset, lambda: f64) -> Result<Direction, NewtonError> {
        let model = &self.model;
        let accumulator = &mut self.accumulator;
        let mut gv_time = Duration::ZERO;
        let outcome = cg::solve(&self.g, self.config.xi, self.config.cg_max, |v| {
            let tick = Instant::now();
            let gv = accumulator.gauss_newton(model, sample, v, lambda)?.clone();
            gv_time += tick.elapsed();
            Ok(gv)
        })?;
        tracing::debug!(
            "Avg time per Gv iteration: {:.5} s",
            gv_time.as_secs_f64() / outcome.iterations.max(1) as f64
        );
        if outcome.stop == CgStop::Degenerate {
            tracing::debug!("CG stopped on non-positive curvature");
        }

        let CgState { s, r, .. } = outcome.state;
        let gs = s.dot(&self.g);
        let sgs = 0.5 * s.dot(&(-&self.g - &r - &s * lambda));
        let mut direction = Direction {
            s,
            gs,
            sgs,
            cg_iters: outcome.iterations,
            stop: outcome.stop,
            fallback: false,
        };
        if !gs.is_finite() || gs >= 0.0 {
            tracing::warn!("CG step is not a descent direction, falling back to -g");
            let s = -&self.g;
            let gv = self.accumulator.gauss_newton(&self.model, sample, &s, lambda)?;
            let damping = &s * lambda;
            direction.sgs = 0.5 * s.dot(&(gv - &damping));
            direction.gs = s.dot(&self.g);
            direction.s = s;
            direction.fallback = true;
        }
        Ok(direction)
    }

    /// Evaluate the initial loss and gradient on the full batch
    ///
    /// Restarts the iteration count and the iteration log.
    pub fn initialize(&mut self, train: &Dataset) -> Result<f64, NewtonError> {
        self.check_train(train)?;
        let (f, g) = self.accumulator.loss_and_gradient(&self.model, train)?;
        self.f = f;
        self.g = g.clone();
        self.gnorm = norm(&self.g);
        self.initialized = true;
        self.iteration = 0;
        self.log = IterationLog::new();
        tracing::info!("initial f: {:.3}", self.f);
        Ok(self.f)
    }

    /// Perform one outer Newton iteration
    pub fn iterate(&mut self, train: &Dataset) -> Result<NewtonIteration, NewtonError> {
        if !self.initialized {
            self.initialize(train)?;
        } else {
            self.check_train(train)?;
        }
        let k = self.iteration;
        let start = Instant::now();
        let lambda = self.lambda;
        let zero_gradient = self.gnorm == 0.0;

        let (cg_iters, search) = if zero_gradient {
            tracing::warn!("Zero gradient, no step is taken");
            let search = LineSearchResult {
                alpha: 0.0,
                f: self.f,
                actred: 0.0,
                prered: 0.0,
                trials: 0,
                status: LineSearchStatus::Accepted,
            };
            (0, search)
        } else {
            let sample = train.subsample(&mut self.rng, self.config.gn_size())?;
            let Direction {
                s,
                gs,
                sgs,
                cg_iters,
                stop,
                fallback,
            } = self.direction(&sample, lambda)?;
            tracing::debug!("CG stop: {:?}, steepest descent: {}", stop, fallback);

            let step = inverse_vectorize(&s, &self.model.shapes())?;
            let mut target = StepTarget {
                model: &mut self.model,
                step,
                applied: 0.0,
                accumulator: &mut self.accumulator,
                train,
            };
            let search = backtracking(
                &mut target,
                self.f,
                gs,
                sgs,
                self.config.eta,
                self.config.line_search_max,
            )?;
            if search.status == LineSearchStatus::Exhausted {
                tracing::warn!(
                    "Line search found no acceptable step in {} trials",
                    search.trials
                );
            }
            (cg_iters, search)
        };

        let ratio = match search.status {
            _ if zero_gradient => 0.0,
            LineSearchStatus::Exhausted => 0.0,
            LineSearchStatus::Accepted => search.actred / search.prered,
        };
        if !zero_gradient {
            self.lambda = update_damping(self.lambda, ratio, self.config.boost, self.config.drop);
        }

        let (f, g) = self.accumulator.loss_and_gradient(&self.model, train)?;
        self.f = f;
        self.g = g.clone();
        self.gnorm = norm(&self.g);
        let time = start.elapsed().as_secs_f64();

        tracing::info!(
            "{}-iter f: {:.3} |g|: {:.5} alpha: {:.3e} ratio: {:.3} lambda: {:.5} #CG: {} actred: {:.5} prered: {:.5} time: {:.3}",
            k,
            self.f,
            self.gnorm,
            search.alpha,
            ratio,
            self.lambda,
            cg_iters,
            search.actred,
            search.prered,
            time
        );

        let iteration = NewtonIteration {
            iter: k,
            f: self.f,
            gnorm: self.gnorm,
            alpha: search.alpha,
            ratio,
            lambda: self.lambda,
            cg_iters,
            actred: search.actred,
            prered: search.prered,
            time,
            val_loss: None,
            val_acc: None,
        };
        self.log.push(iteration.clone());
        self.iteration += 1;
        Ok(iteration)
    }

    /// Train for `iter_max` iterations
    ///
    /// With a validation set the model is checkpointed to `model_path` whenever the
    /// validation accuracy improves, otherwise once after the last iteration.
    pub fn fit<C: Checkpoint>(
        &mut self,
        train: &Dataset,
        val: Option<&Dataset>,
        checkpoint: &mut C,
        model_path: &Path,
    ) -> eyre::Result<FitResult> {
        if let Some(val) = val {
            self.model.check_data(val)?;
        }
        let initial_loss = self.initialize(train)?;
        let mut status = Status::MaxIterations;
        let mut best_acc = 0.0;
        let mut final_acc = None;
        let mut saved: Option<PathBuf> = None;
        let mut running_time = 0.0;

        for _ in 0..self.config.iter_max {
            if self.gnorm == 0.0 {
                tracing::info!("Gradient vanished after {} iterations", self.iteration);
                status = Status::ZeroGradient;
                break;
            }
            let span = tracing::info_span!("", "{}", format!("Iteration {}", self.iteration));
            let _enter = span.enter();

            let iteration = self.iterate(train)?;
            running_time += iteration.time;

            if let Some(val) = val {
                let prediction = predict(&self.model, val, self.config.bsize)?;
                tracing::info!(
                    "{}-iter val_acc: {:.3}% val_loss {:.3}",
                    iteration.iter,
                    prediction.accuracy * 100.0,
                    prediction.loss
                );
                if let Some(last) = self.log.last_mut() {
                    last.val_loss = Some(prediction.loss);
                    last.val_acc = Some(prediction.accuracy);
                }
                final_acc = Some(prediction.accuracy);
                if prediction.accuracy > best_acc {
                    best_acc = prediction.accuracy;
                    let path = checkpoint.save(&self.model, model_path)?;
                    tracing::info!("Best model saved in {:?}", path);
                    saved = Some(path);
                }
            }
        }

        let total_cg_iters = self.log.total_cg_iters();
        match final_acc {
            Some(acc) => tracing::info!(
                "Final acc: {:.3}% | best acc {:.3}% | total_#CG {} | total running time {:.3}s",
                acc * 100.0,
                best_acc * 100.0,
                total_cg_iters,
                running_time
            ),
            None => {
                let path = checkpoint.save(&self.model, model_path)?;
                tracing::info!("Model at the last iteration saved in {:?}", path);
                saved = Some(path);
                tracing::info!(
                    "total_#CG {} | total running time {:.3}s",
                    total_cg_iters,
                    running_time
                );
            }
        }

        Ok(FitResult {
            status,
            initial_loss,
            final_loss: self.f,
            best_accuracy: val.map(|_| best_acc),
            final_accuracy: final_acc,
            checkpoint: saved,
            total_cg_iters,
            running_time,
            log: self.log.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autodiff::{Tape, Var};
    use crate::model::{Activation, Forward, Mlp};
    use crate::routines::checkpoint::NoCheckpoint;
    use ndarray::{array, ArrayView2};

    /// Linear model with the concave loss `-Σ outputs²`
    ///
    /// With `wall` set, any move away from the starting weights adds a large
    /// constant the gradient never sees, so no trial step is accepted.
    struct Concave {
        params: Vec<Array2<f64>>,
        wall: Option<Array2<f64>>,
    }

    impl Concave {
        fn new(walled: bool) -> Self {
            let weights = array![[1.0, 0.0], [0.0, 1.0]];
            Self {
                wall: walled.then(|| weights.clone()),
                params: vec![weights],
            }
        }
    }

    impl Model for Concave {
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
            self.params[0].ncols()
        }

        fn forward(
            &self,
            tape: &mut Tape,
            params: &[Var],
            inputs: ArrayView2<f64>,
            _labels: ArrayView2<f64>,
        ) -> Forward {
            let x = tape.leaf(inputs.to_owned());
            let outputs = tape.matmul(x, params[0]);
            let square = tape.mul(outputs, outputs);
            let total = tape.sum(square);
            let mut loss = tape.neg(total);
            if let Some(start) = &self.wall {
                let moved = (&self.params[0] - start).mapv(|d| d * d).sum();
                let wall = tape.leaf(Array2::from_elem((1, 1), 1e6 * moved));
                loss = tape.add(loss, wall);
            }
            Forward { outputs, loss }
        }
    }

    fn concave_data() -> Dataset {
        let inputs = array![[10.0, 0.0], [0.0, 10.0], [10.0, 0.0], [0.0, 10.0]];
        Dataset::from_classes(inputs, &[0, 1, 0, 1], 2).unwrap()
    }

    fn concave_config() -> NewtonConfig {
        NewtonConfig {
            bsize: 4,
            gn_size: Some(4),
            c: 10.0,
            line_search_max: 3,
            ..NewtonConfig::new(4)
        }
    }

    /// `f(alpha) = f0 + slope·alpha + curvature·alpha²`
    struct Parabola {
        f0: f64,
        slope: f64,
        curvature: f64,
        applied: f64,
        moves: Vec<f64>,
    }

    impl Parabola {
        fn new(slope: f64, curvature: f64) -> Self {
            Self {
                f0: 2.0,
                slope,
                curvature,
                applied: 0.0,
                moves: Vec::new(),
            }
        }
    }

    impl LineSearchTarget for Parabola {
        fn move_to(&mut self, alpha: f64) -> Result<(), NewtonError> {
            self.moves.push(alpha - self.applied);
            self.applied = alpha;
            Ok(())
        }

        fn loss(&mut self) -> Result<f64, NewtonError> {
            let a = self.applied;
            Ok(self.f0 + self.slope * a + self.curvature * a * a)
        }
    }

    #[test]
    fn damping_follows_the_reduction_ratio() {
        assert_eq!(update_damping(1.0, 0.1, 2.0, 0.5), 2.0);
        assert_eq!(update_damping(1.0, 0.9, 2.0, 0.5), 0.5);
        assert_eq!(update_damping(1.0, 0.5, 2.0, 0.5), 1.0);
        assert_eq!(update_damping(1.0, 0.25, 2.0, 0.5), 1.0);
        assert_eq!(update_damping(1.0, 0.75, 2.0, 0.5), 0.5);
        assert_eq!(update_damping(1.0, f64::NAN, 2.0, 0.5), 1.0);
    }

    #[test]
    fn linear_decrease_is_accepted_at_full_step() {
        let mut target = Parabola::new(-3.0, 0.0);
        let result = backtracking(&mut target, 2.0, -3.0, 0.0, 0.1, 30).unwrap();
        assert_eq!(result.status, LineSearchStatus::Accepted);
        assert_eq!(result.alpha, 1.0);
        assert_eq!(result.trials, 1);
        assert!((result.actred + 3.0).abs() < 1e-12);
        assert!((result.prered + 3.0).abs() < 1e-12);
    }

    #[test]
    fn backtracking_moves_incrementally() {
        let mut target = Parabola::new(-1.0, 2.0);
        let result = backtracking(&mut target, 2.0, -1.0, 2.0, 0.1, 30).unwrap();
        assert_eq!(result.status, LineSearchStatus::Accepted);
        assert_eq!(result.alpha, 0.25);
        assert_eq!(result.trials, 3);
        assert_eq!(target.moves, vec![1.0, -0.5, -0.25]);
        assert!((result.actred + 0.125).abs() < 1e-12);
        assert!((result.prered - predicted_reduction(0.25, -1.0, 2.0)).abs() < 1e-12);
    }

    #[test]
    fn exhausted_search_undoes_the_step() {
        let mut target = Parabola::new(1.0, 0.0);
        let result = backtracking(&mut target, 2.0, -1.0, 0.0, 0.1, 4).unwrap();
        assert_eq!(result.status, LineSearchStatus::Exhausted);
        assert_eq!(result.trials, 4);
        assert_eq!(result.actred, 0.0);
        assert_eq!(result.alpha, 0.0);
        assert_eq!(target.applied, 0.0);
        assert_eq!(target.moves.len(), 5);
    }

    #[test]
    fn full_batch_size_must_match_num_data() {
        let model = Mlp::new(&[2, 2], Activation::Identity, 1).unwrap();
        let mut optimizer = NewtonCG::new(model, NewtonConfig::new(10)).unwrap();
        let data = Dataset::from_classes(ndarray::Array2::zeros((4, 2)), &[0, 1, 0, 1], 2).unwrap();
        let err = optimizer.initialize(&data).unwrap_err();
        assert!(matches!(err, NewtonError::PreconditionViolation(_)));
    }

    #[test]
    fn data_wider_than_the_model_is_rejected() {
        let model = Mlp::new(&[3, 2], Activation::Identity, 1).unwrap();
        let mut optimizer = NewtonCG::new(model, NewtonConfig::new(4)).unwrap();
        let data = Dataset::from_classes(ndarray::Array2::zeros((4, 2)), &[0, 1, 0, 1], 2).unwrap();
        let err = optimizer.initialize(&data).unwrap_err();
        assert!(matches!(err, NewtonError::DimensionMismatch(_)));

        let model = Mlp::new(&[2, 2], Activation::Identity, 1).unwrap();
        let mut optimizer = NewtonCG::new(model, NewtonConfig::new(4)).unwrap();
        let three_classes =
            Dataset::from_classes(ndarray::Array2::zeros((4, 2)), &[0, 1, 2, 1], 3).unwrap();
        let err = optimizer
            .fit(&three_classes, None, &mut NoCheckpoint, Path::new("unused.json"))
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<NewtonError>(),
            Some(NewtonError::DimensionMismatch(_))
        ));
    }

    #[test]
    fn negative_curvature_falls_back_to_steepest_descent() {
        let data = concave_data();
        let mut optimizer = NewtonCG::new(Concave::new(false), concave_config()).unwrap();
        optimizer.initialize(&data).unwrap();
        let g = optimizer.gradient().clone();
        assert!(optimizer.gnorm() > 0.0);

        let direction = optimizer.direction(&data, 1.0).unwrap();
        assert_eq!(direction.stop, CgStop::Degenerate);
        assert_eq!(direction.cg_iters, 1);
        assert!(direction.fallback);
        assert_eq!(direction.s, -&g);
        assert!((direction.gs + g.dot(&g)).abs() < 1e-9 * g.dot(&g));
        assert!(direction.sgs.is_finite());
        assert!(direction.sgs < 0.0);

        // the loss is an exact concave quadratic, so the full step is accepted
        let f0 = optimizer.loss();
        let iteration = optimizer.iterate(&data).unwrap();
        assert_eq!(iteration.alpha, 1.0);
        assert!(iteration.f < f0);
        assert!(iteration.ratio >= 0.75);
        assert_eq!(optimizer.lambda(), concave_config().drop);
    }

    #[test]
    fn exhausted_search_restores_parameters_and_boosts_damping() {
        let data = concave_data();
        let config = concave_config();
        let mut optimizer = NewtonCG::new(Concave::new(true), config.clone()).unwrap();
        let f0 = optimizer.initialize(&data).unwrap();
        let start = optimizer.model().parameters()[0].clone();

        let iteration = optimizer.iterate(&data).unwrap();
        assert_eq!(iteration.alpha, 0.0);
        assert_eq!(iteration.actred, 0.0);
        assert_eq!(iteration.ratio, 0.0);
        assert_eq!(iteration.cg_iters, 1);
        assert_eq!(optimizer.lambda(), config.lambda * config.boost);
        for (a, b) in optimizer.model().parameters()[0].iter().zip(start.iter()) {
            assert!((a - b).abs() < 1e-9);
        }
        assert!((optimizer.loss() - f0).abs() < 1e-6);
    }

    #[test]
    fn fit_restarts_the_iteration_count() {
        let data = concave_data();
        let config = NewtonConfig {
            iter_max: 2,
            ..concave_config()
        };
        let mut optimizer = NewtonCG::new(Concave::new(true), config).unwrap();
        optimizer.iterate(&data).unwrap();
        optimizer.iterate(&data).unwrap();
        assert_eq!(optimizer.log().len(), 2);

        let result = optimizer
            .fit(&data, None, &mut NoCheckpoint, Path::new("unused.json"))
            .unwrap();
        let iters: Vec<usize> = result.log.iterations().iter().map(|it| it.iter).collect();
        assert_eq!(iters, vec![0, 1]);
    }

    #[test]
    fn zero_gradient_stops_without_steps() {
        // zero weights, zero inputs and balanced labels give an exactly zero gradient
        let model = Mlp::from_parameters(
            vec![ndarray::Array2::zeros((2, 2)), ndarray::Array2::zeros((1, 2))],
            Activation::Identity,
        )
        .unwrap();
        let data = Dataset::from_classes(ndarray::Array2::zeros((4, 2)), &[0, 1, 0, 1], 2).unwrap();
        let config = NewtonConfig {
            bsize: 2,
            gn_size: Some(2),
            ..NewtonConfig::new(4)
        };
        let mut optimizer = NewtonCG::new(model, config).unwrap();
        let result = optimizer
            .fit(&data, None, &mut NoCheckpoint, Path::new("unused.json"))
            .unwrap();
        assert_eq!(result.status, Status::ZeroGradient);
        assert!(result.log.is_empty());
        assert_eq!(optimizer.lambda(), 1.0);
        assert!((result.final_loss - 2.0_f64.ln()).abs() < 1e-12);

        let iteration = optimizer.iterate(&data).unwrap();
        assert_eq!(iteration.alpha, 0.0);
        assert_eq!(iteration.cg_iters, 0);
        assert_eq!(optimizer.lambda(), 1.0);
    }
}
