pub mod cg;
pub mod minibatch;
pub mod newton;

pub use cg::{CgOutcome, CgState, CgStop};
pub use minibatch::{Accumulator, Mode};
pub use newton::{
    armijo_accepts, backtracking, predicted_reduction, update_damping, LineSearchResult,
    LineSearchStatus, LineSearchTarget, NewtonCG,
};
