//! Newton-CG training for neural network classifiers
//!
//! A subsampled Gauss-Newton optimizer: each outer iteration solves the damped
//! Gauss-Newton system `(G + λI) s = -g` with conjugate gradients, where every
//! product `G·v` is evaluated matrix-free on a random subsample through two
//! reverse-mode passes of the in-crate [autodiff] tape. A backtracking line search
//! on the full batch picks the step length, and the damping `λ` follows the
//! ratio of actual to predicted reduction.
//!
//! Loss, gradient and Gauss-Newton products are accumulated chunk by chunk so
//! results are exact regardless of the chunk size.

/// Optimizer components: minibatch accumulation, the CG sub-solver and the outer loop
pub mod algorithms;
/// Reverse-mode differentiation on 2-D tensors, with differentiable gradients
pub mod autodiff;
/// Entry points for training from a settings file
pub mod entrypoints;
/// Error type of the numerical core
pub mod error;
/// Logging setup
pub mod logger;
/// Model interface and the reference multilayer perceptron
pub mod model;
/// Data, settings, output and the numerical building blocks
pub mod routines;

pub use crate::entrypoints::{fit, start};

/// A collection of commonly used items
pub mod prelude {
    pub use crate::algorithms::{Accumulator, CgStop, Mode, NewtonCG};
    pub use crate::autodiff::{Tape, Var};
    pub use crate::entrypoints::{fit, start};
    pub use crate::error::NewtonError;
    pub use crate::model::{Activation, Forward, Mlp, Model};
    pub use crate::routines::checkpoint::{Checkpoint, JsonCheckpoint, NoCheckpoint};
    pub use crate::routines::data::{read_csv, Dataset};
    pub use crate::routines::evaluation::{predict, Prediction};
    pub use crate::routines::operators::{gauss_newton_vec, r_operator};
    pub use crate::routines::output::{FitResult, IterationLog, NewtonIteration, Status};
    pub use crate::routines::settings::{read_settings, NewtonConfig, Settings};
    pub use crate::routines::vectorize::{inverse_vectorize, vectorize};
}
