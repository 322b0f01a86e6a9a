//! Directional derivatives built from two reverse-mode passes
//!
//! Only [Tape::gradients] is needed. The forward-mode product `J·v` of `f` is
//! obtained by differentiating the vector-Jacobian product `uᵀJ` with respect to
//! a dummy cotangent `u`: the expression is linear in `u`, and its gradient
//! weighted by `v` is exactly `J·v`.

use crate::autodiff::{Tape, Var};
use crate::error::NewtonError;

fn check_direction(tape: &Tape, params: &[Var], v: &[Var]) -> Result<(), NewtonError> {
    if v.len() != params.len() {
        return Err(NewtonError::dimension(format!(
            "direction has {} tensors but there are {} parameters",
            v.len(),
            params.len()
        )));
    }
    for (k, (p, d)) in params.iter().zip(v).enumerate() {
        if tape.shape(*p) != tape.shape(*d) {
            return Err(NewtonError::dimension(format!(
                "direction tensor {} has shape {:?}, parameter has shape {:?}",
                k,
                tape.shape(*d),
                tape.shape(*p)
            )));
        }
    }
    Ok(())
}

/// R-operator: Jacobian of `f` with respect to `params` applied to `v`
///
/// Returns one tensor per entry of `f`.
pub fn r_operator(
    tape: &mut Tape,
    f: &[Var],
    params: &[Var],
    v: &[Var],
) -> Result<Vec<Var>, NewtonError> {
    check_direction(tape, params, v)?;
    let dummies: Vec<Var> = f.iter().map(|y| tape.zeros_like(*y)).collect();
    let vjp = tape.gradients(f, params, Some(dummies.as_slice()))?;
    tape.gradients(&vjp, &dummies, Some(v))
}

/// Gauss-Newton vector product `JᵀBJv`
///
/// `J` is the Jacobian of `outputs` with respect to `params` and `B` the Hessian of
/// `loss` with respect to `outputs`. The R-operator applied to the output gradient
/// gives `BJv`, which is then pulled back through `Jᵀ`.
pub fn gauss_newton_vec(
    tape: &mut Tape,
    outputs: Var,
    loss: Var,
    params: &[Var],
    v: &[Var],
) -> Result<Vec<Var>, NewtonError> {
    check_direction(tape, params, v)?;
    let output_grad = tape.gradients(&[loss], &[outputs], None)?;
    let bjv = r_operator(tape, &output_grad, params, v)?;
    tape.gradients(&[outputs], params, Some(bjv.as_slice()))
}
