use crate::error::NewtonError;
use crate::routines::vectorize::norm;
use ndarray::Array1;

/// Why the CG loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CgStop {
    /// `sqrt(rTr)` fell to `cgtol`
    Converged,
    /// The iteration cap was reached
    MaxIterations,
    /// `v·Gv` was not positive and finite, `s` keeps the previous iterate
    Degenerate,
    /// The gradient was exactly zero, so `s = 0`
    ZeroGradient,
}

/// Conjugate-gradient buffers for `(G + λI) s = -g`
#[derive(Debug, Clone)]
pub struct CgState {
    pub r: Array1<f64>,
    pub v: Array1<f64>,
    pub s: Array1<f64>,
    pub rtr: f64,
    pub beta: f64,
    pub cgtol: f64,
}

impl CgState {
    /// `r = v = -g`, `s = 0`, `rTr = |g|²`, `cgtol = xi·|g|`
    pub fn new(g: &Array1<f64>, xi: f64) -> Self {
        let r = -g;
        let rtr = r.dot(&r);
        Self {
            v: r.clone(),
            s: Array1::zeros(g.len()),
            r,
            rtr,
            beta: 0.0,
            cgtol: xi * rtr.sqrt(),
        }
    }

    pub fn converged(&self) -> bool {
        self.rtr.sqrt() <= self.cgtol
    }

    /// One CG update given `gv = (G + λI)·v`
    ///
    /// Returns `false` without touching the state when the curvature along `v` is
    /// not positive.
    pub fn step(&mut self, gv: &Array1<f64>) -> bool {
        let vgv = self.v.dot(gv);
        if !vgv.is_finite() || vgv <= 0.0 {
            return false;
        }
        let alpha = self.rtr / vgv;
        self.s.scaled_add(alpha, &self.v);
        self.r.scaled_add(-alpha, gv);
        let rnew = self.r.dot(&self.r);
        self.beta = rnew / self.rtr;
        self.rtr = rnew;
        true
    }

    /// `v = r + β·v`
    pub fn update_direction(&mut self) {
        self.v *= self.beta;
        self.v += &self.r;
    }
}

/// Result of [solve]
#[derive(Debug, Clone)]
pub struct CgOutcome {
    pub state: CgState,
    /// Number of products `(G + λI)·v` evaluated
    pub iterations: usize,
    pub stop: CgStop,
}

/// Approximately solve `(G + λI) s = -g`
///
/// `apply` returns `(G + λI)·v`. At most `max_iter` products are evaluated and the
/// loop ends once `sqrt(rTr) <= xi·|g|`.
pub fn solve<F>(g: &Array1<f64>, xi: f64, max_iter: usize, mut apply: F) -> Result<CgOutcome, NewtonError>
where
    F: FnMut(&Array1<f64>) -> Result<Array1<f64>, NewtonError>,
{
    let mut state = CgState::new(g, xi);
    if norm(g) == 0.0 {
        return Ok(CgOutcome {
            state,
            iterations: 0,
            stop: CgStop::ZeroGradient,
        });
    }

    let mut iterations = 0;
    let stop = loop {
        iterations += 1;
        let gv = apply(&state.v)?;
        if gv.len() != state.v.len() {
            return Err(NewtonError::ShapeMismatch {
                expected: state.v.len(),
                found: gv.len(),
            });
        }
        if !state.step(&gv) {
            tracing::warn!(
                "Non-positive curvature along the CG direction at CG iteration {}",
                iterations
            );
            break CgStop::Degenerate;
        }
        if state.converged() {
            break CgStop::Converged;
        }
        if iterations >= max_iter {
            break CgStop::MaxIterations;
        }
        state.update_direction();
    };

    Ok(CgOutcome {
        state,
        iterations,
        stop,
    })
}
