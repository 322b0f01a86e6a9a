use crate::autodiff::{Tape, Var};
use crate::error::NewtonError;
use crate::model::Model;
use crate::routines::data::Dataset;
use crate::routines::operators::gauss_newton_vec;
use crate::routines::settings::NewtonConfig;
use crate::routines::vectorize::{inverse_vectorize, vectorize};
use ndarray::Array1;
use std::fmt;
use std::str::FromStr;

/// What an accumulation pass computes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Regularized loss over the full batch
    LossOnly,
    /// Regularized loss and gradient over the full batch
    LossAndGradient,
    /// Damped Gauss-Newton product over the subsample
    GaussNewton,
}

impl FromStr for Mode {
    type Err = NewtonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "funonly" => Ok(Mode::LossOnly),
            "fungrad" => Ok(Mode::LossAndGradient),
            "Gv" => Ok(Mode::GaussNewton),
            other => Err(NewtonError::UnknownMode(other.to_string())),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::LossOnly => write!(f, "funonly"),
            Mode::LossAndGradient => write!(f, "fungrad"),
            Mode::GaussNewton => write!(f, "Gv"),
        }
    }
}

/// `|θ|²/(2C) + f/num_data`
pub fn finalize_loss(sum: f64, theta: &Array1<f64>, c: f64, num_data: usize) -> f64 {
    theta.dot(theta) / (2.0 * c) + sum / num_data as f64
}

/// `θ/C + g/num_data`
pub fn finalize_gradient(
    sum: &Array1<f64>,
    theta: &Array1<f64>,
    c: f64,
    num_data: usize,
) -> Array1<f64> {
    theta / c + sum / num_data as f64
}

/// `(λ + 1/C)·v + Gv/gn_size`
pub fn finalize_gauss_newton(
    sum: &Array1<f64>,
    v: &Array1<f64>,
    lambda: f64,
    c: f64,
    gn_size: usize,
) -> Array1<f64> {
    v * (lambda + 1.0 / c) + sum / gn_size as f64
}

/// Exact full-batch loss, gradient and Gauss-Newton products, summed chunk by chunk
///
/// Every pass zeroes its buffers, adds one contribution per chunk of at most `bsize`
/// samples and finalizes once at the end. Since contributions are summed and only
/// divided afterwards, results do not depend on the chunk size.
#[derive(Debug, Clone)]
pub struct Accumulator {
    f: f64,
    g: Array1<f64>,
    gv: Array1<f64>,
    bsize: usize,
    c: f64,
    num_data: usize,
    gn_size: usize,
    num_grad_segment: usize,
    num_gv_segment: usize,
}

impl Accumulator {
    pub fn new(config: &NewtonConfig, num_parameters: usize) -> Self {
        Self {
            f: 0.0,
            g: Array1::zeros(num_parameters),
            gv: Array1::zeros(num_parameters),
            bsize: config.bsize,
            c: config.c,
            num_data: config.num_data,
            gn_size: config.gn_size(),
            num_grad_segment: config.num_grad_segment(),
            num_gv_segment: config.num_gv_segment(),
        }
    }

    pub fn loss_only<M: Model>(&mut self, model: &M, data: &Dataset) -> Result<f64, NewtonError> {
        self.accumulate(Mode::LossOnly, model, data, None)?;
        Ok(self.f)
    }

    pub fn loss_and_gradient<M: Model>(
        &mut self,
        model: &M,
        data: &Dataset,
    ) -> Result<(f64, &Array1<f64>), NewtonError> {
        self.accumulate(Mode::LossAndGradient, model, data, None)?;
        Ok((self.f, &self.g))
    }

    /// `(G + (λ + 1/C)·I)·v` with `G` averaged over `data`
    pub fn gauss_newton<M: Model>(
        &mut self,
        model: &M,
        data: &Dataset,
        v: &Array1<f64>,
        lambda: f64,
    ) -> Result<&Array1<f64>, NewtonError> {
        self.accumulate(Mode::GaussNewton, model, data, Some((v, lambda)))?;
        Ok(&self.gv)
    }

    /// Run one pass in `mode`
    ///
    /// `direction` holds `(v, λ)` and is required in [Mode::GaussNewton].
    pub fn accumulate<M: Model>(
        &mut self,
        mode: Mode,
        model: &M,
        data: &Dataset,
        direction: Option<(&Array1<f64>, f64)>,
    ) -> Result<(), NewtonError> {
        if self.bsize == 0 {
            return Err(NewtonError::precondition("bsize must be positive"));
        }
        let num_parameters = model.num_parameters();
        if num_parameters != self.g.len() {
            return Err(NewtonError::ShapeMismatch {
                expected: self.g.len(),
                found: num_parameters,
            });
        }

        model.check_data(data)?;

        let (expected, size, direction) = match mode {
            Mode::LossOnly | Mode::LossAndGradient => (self.num_grad_segment, self.num_data, None),
            Mode::GaussNewton => {
                let (v, lambda) = direction.ok_or_else(|| {
                    NewtonError::precondition("a Gauss-Newton pass needs a direction")
                })?;
                if v.len() != num_parameters {
                    return Err(NewtonError::ShapeMismatch {
                        expected: num_parameters,
                        found: v.len(),
                    });
                }
                (self.num_gv_segment, self.gn_size, Some((v, lambda)))
            }
        };
        let found = data.len().div_ceil(self.bsize);
        if found != expected {
            return Err(NewtonError::SegmentMismatch {
                mode: mode.to_string(),
                expected,
                found,
            });
        }
        // the finalize step divides by the configured size
        if data.len() != size {
            return Err(NewtonError::precondition(format!(
                "a {} pass expects {} samples, got {}",
                mode,
                size,
                data.len()
            )));
        }

        let shapes = model.shapes();
        let v_tensors = match direction {
            Some((v, _)) => Some(inverse_vectorize(v, &shapes)?),
            None => None,
        };

        let mut f_sum = 0.0;
        let mut g_sum: Array1<f64> = Array1::zeros(num_parameters);
        let mut gv_sum: Array1<f64> = Array1::zeros(num_parameters);
        for (inputs, labels) in data.chunks(self.bsize) {
            let mut tape = Tape::new();
            let params = model.record_parameters(&mut tape);
            let forward = model.forward(&mut tape, &params, inputs, labels);
            match mode {
                Mode::LossOnly => f_sum += tape.item(forward.loss),
                Mode::LossAndGradient => {
                    f_sum += tape.item(forward.loss);
                    let grads = tape.gradients(&[forward.loss], &params, None)?;
                    g_sum += &vectorize(grads.iter().map(|g| tape.value(*g)));
                }
                Mode::GaussNewton => {
                    let v: Vec<Var> = v_tensors
                        .iter()
                        .flatten()
                        .map(|t| tape.leaf(t.clone()))
                        .collect();
                    let gv = gauss_newton_vec(&mut tape, forward.outputs, forward.loss, &params, &v)?;
                    gv_sum += &vectorize(gv.iter().map(|g| tape.value(*g)));
                }
            }
        }

        let theta = vectorize(model.parameters());
        match direction {
            Some((v, lambda)) => {
                self.gv = finalize_gauss_newton(&gv_sum, v, lambda, self.c, self.gn_size);
            }
            None => {
                self.f = finalize_loss(f_sum, &theta, self.c, self.num_data);
                if mode == Mode::LossAndGradient {
                    self.g = finalize_gradient(&g_sum, &theta, self.c, self.num_data);
                }
            }
        }
        Ok(())
    }
}
