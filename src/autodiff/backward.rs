use super::{Op, Tape, Var};
use crate::error::NewtonError;

impl Tape {
    /// Reverse-mode vector-Jacobian product
    ///
    /// Returns, for every `x` in `xs`, the sum over `i` of `grad_ys[i]ᵀ · ∂ys[i]/∂x`.
    /// When `grad_ys` is `None` every output is seeded with ones. Inputs that do not
    /// influence any output receive zeros.
    ///
    /// The backward pass is recorded on the tape, so the returned nodes depend on the
    /// seeds and on the forward values and can be differentiated in turn.
    pub fn gradients(
        &mut self,
        ys: &[Var],
        xs: &[Var],
        grad_ys: Option<&[Var]>,
    ) -> Result<Vec<Var>, NewtonError> {
        if let Some(seeds) = grad_ys {
            if seeds.len() != ys.len() {
                return Err(NewtonError::dimension(format!(
                    "{} cotangents supplied for {} outputs",
                    seeds.len(),
                    ys.len()
                )));
            }
            for (y, seed) in ys.iter().zip(seeds) {
                if self.shape(*y) != self.shape(*seed) {
                    return Err(NewtonError::dimension(format!(
                        "cotangent of shape {:?} for output of shape {:?}",
                        self.shape(*seed),
                        self.shape(*y)
                    )));
                }
            }
        }

        let end = ys.iter().map(|y| y.0 + 1).max().unwrap_or(0);
        let needed = self.depends_on(xs, end);
        let mut cotangents: Vec<Option<Var>> = vec![None; end];

        for (i, y) in ys.iter().enumerate() {
            if !needed[y.0] {
                continue;
            }
            let seed = match grad_ys {
                Some(seeds) => seeds[i],
                None => self.ones_like(*y),
            };
            self.accumulate(&mut cotangents, *y, seed);
        }

        for index in (0..end).rev() {
            let Some(cotangent) = cotangents[index] else {
                continue;
            };
            let op = self.nodes[index].op;
            for (input, contribution) in self.backward_op(op, Var(index), cotangent, &needed) {
                self.accumulate(&mut cotangents, input, contribution);
            }
        }

        Ok(xs
            .iter()
            .map(|x| match cotangents.get(x.0).copied().flatten() {
                Some(grad) => grad,
                None => self.zeros_like(*x),
            })
            .collect())
    }

    /// Marks the nodes below `end` that depend on at least one of `xs`
    fn depends_on(&self, xs: &[Var], end: usize) -> Vec<bool> {
        let mut needed = vec![false; end];
        for x in xs {
            if x.0 < end {
                needed[x.0] = true;
            }
        }
        // Inputs always precede the node they feed, so one forward sweep suffices
        for index in 0..end {
            if needed[index] {
                continue;
            }
            needed[index] = self.nodes[index]
                .op
                .inputs()
                .iter()
                .flatten()
                .any(|input| needed[input.0]);
        }
        needed
    }

    fn accumulate(&mut self, cotangents: &mut [Option<Var>], target: Var, contribution: Var) {
        let total = match cotangents[target.0] {
            Some(existing) => self.add(existing, contribution),
            None => contribution,
        };
        cotangents[target.0] = Some(total);
    }

    /// Cotangent contributions of one node to its inputs
    fn backward_op(&mut self, op: Op, output: Var, g: Var, needed: &[bool]) -> Vec<(Var, Var)> {
        let need = |v: Var| needed[v.0];
        let mut out = Vec::with_capacity(2);
        match op {
            Op::Leaf => {}
            Op::Add(a, b) => {
                if need(a) {
                    out.push((a, g));
                }
                if need(b) {
                    out.push((b, g));
                }
            }
            Op::Sub(a, b) => {
                if need(a) {
                    out.push((a, g));
                }
                if need(b) {
                    out.push((b, self.neg(g)));
                }
            }
            Op::Mul(a, b) => {
                if need(a) {
                    out.push((a, self.mul(g, b)));
                }
                if need(b) {
                    out.push((b, self.mul(g, a)));
                }
            }
            Op::Div(a, b) => {
                if need(a) {
                    out.push((a, self.div(g, b)));
                }
                if need(b) {
                    // d(a/b)/db = -(a/b)/b
                    let gy = self.mul(g, output);
                    let q = self.div(gy, b);
                    out.push((b, self.neg(q)));
                }
            }
            Op::Neg(a) => {
                if need(a) {
                    out.push((a, self.neg(g)));
                }
            }
            Op::Scale(a, factor) => {
                if need(a) {
                    out.push((a, self.scale(g, factor)));
                }
            }
            Op::MatMul(a, b) => {
                if need(a) {
                    let bt = self.transpose(b);
                    out.push((a, self.matmul(g, bt)));
                }
                if need(b) {
                    let at = self.transpose(a);
                    out.push((b, self.matmul(at, g)));
                }
            }
            Op::Transpose(a) => {
                if need(a) {
                    out.push((a, self.transpose(g)));
                }
            }
            Op::Exp(a) => {
                if need(a) {
                    out.push((a, self.mul(g, output)));
                }
            }
            Op::Log(a) => {
                if need(a) {
                    out.push((a, self.div(g, a)));
                }
            }
            Op::Tanh(a) => {
                if need(a) {
                    let square = self.mul(output, output);
                    let one = self.ones_like(output);
                    let slope = self.sub(one, square);
                    out.push((a, self.mul(g, slope)));
                }
            }
            Op::BroadcastRows(a) => {
                if need(a) {
                    out.push((a, self.sum_rows(g)));
                }
            }
            Op::SumRows(a) => {
                if need(a) {
                    let rows = self.shape(a).0;
                    out.push((a, self.broadcast_rows(g, rows)));
                }
            }
            Op::BroadcastCols(a) => {
                if need(a) {
                    out.push((a, self.sum_cols(g)));
                }
            }
            Op::SumCols(a) => {
                if need(a) {
                    let cols = self.shape(a).1;
                    out.push((a, self.broadcast_cols(g, cols)));
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use crate::autodiff::{Tape, Tensor, Var};
    use crate::error::NewtonError;
    use ndarray::{array, Array2};

    fn quartic(tape: &mut Tape, x: Var) -> Var {
        // x^4 - 2x^2
        let x2 = tape.mul(x, x);
        let x4 = tape.mul(x2, x2);
        let twice = tape.scale(x2, 2.0);
        tape.sub(x4, twice)
    }

    #[test]
    fn gradient_of_sum_of_squares() {
        let mut tape = Tape::new();
        let x = tape.leaf(array![[1.0, -2.0], [0.5, 3.0]]);
        let sq = tape.mul(x, x);
        let y = tape.sum(sq);
        let g = tape.gradients(&[y], &[x], None).unwrap();
        assert_eq!(tape.value(g[0]), &array![[2.0, -4.0], [1.0, 6.0]]);
    }

    #[test]
    fn unreachable_inputs_get_zeros() {
        let mut tape = Tape::new();
        let x = tape.leaf(array![[1.0, 2.0]]);
        let unused = tape.leaf(array![[5.0], [6.0], [7.0]]);
        let y = tape.sum(x);
        let g = tape.gradients(&[y], &[x, unused], None).unwrap();
        assert_eq!(tape.value(g[0]), &array![[1.0, 1.0]]);
        assert_eq!(tape.value(g[1]), &Array2::<f64>::zeros((3, 1)));
    }

    #[test]
    fn mismatched_cotangents_are_rejected() {
        let mut tape = Tape::new();
        let x = tape.leaf(array![[1.0, 2.0]]);
        let y = tape.mul(x, x);
        let wrong = tape.leaf(array![[1.0]]);
        let seeds = vec![wrong];
        let err = tape.gradients(&[y], &[x], Some(seeds.as_slice())).unwrap_err();
        assert!(matches!(err, NewtonError::DimensionMismatch(_)));

        let none: Vec<Var> = Vec::new();
        let err = tape.gradients(&[y], &[x], Some(none.as_slice())).unwrap_err();
        assert!(matches!(err, NewtonError::DimensionMismatch(_)));
    }

    #[test]
    fn second_derivative_by_double_backprop() {
        let mut tape = Tape::new();
        let x = tape.leaf(array![[2.0]]);
        let y = quartic(&mut tape, x);
        let gx = tape.gradients(&[y], &[x], None).unwrap();
        // 4x^3 - 4x at x = 2
        assert!((tape.item(gx[0]) - 24.0).abs() < 1e-12);
        let gxx = tape.gradients(&gx, &[x], None).unwrap();
        // 12x^2 - 4 at x = 2
        assert!((tape.item(gxx[0]) - 44.0).abs() < 1e-12);
    }

    #[test]
    fn newton_iterations_with_automatic_second_derivative() {
        let mut x = 2.0;
        for _ in 0..10 {
            let mut tape = Tape::new();
            let xv = tape.scalar(x);
            let y = quartic(&mut tape, xv);
            let gx = tape.gradients(&[y], &[xv], None).unwrap();
            let gxx = tape.gradients(&gx, &[xv], None).unwrap();
            x -= tape.item(gx[0]) / tape.item(gxx[0]);
        }
        assert!((x - 1.0).abs() < 1e-10, "x should converge to 1, got {}", x);
    }

    fn composite(tape: &mut Tape, x: Var, w: Var) -> Var {
        let a = tape.matmul(x, w);
        let b = tape.tanh(a);
        let half = tape.scale(b, 0.5);
        let c = tape.exp(half);
        let one = tape.ones_like(c);
        let shifted = tape.add(c, one);
        let d = tape.log(shifted);
        let a2 = tape.mul(a, a);
        let one = tape.ones_like(a2);
        let denom = tape.add(a2, one);
        let e = tape.div(d, denom);
        let rows = tape.shape(e).0;
        let s = tape.sum_rows(e);
        let spread = tape.broadcast_rows(s, rows);
        let et = tape.transpose(e);
        let ett = tape.transpose(et);
        let diff = tape.sub(spread, ett);
        let neg = tape.neg(diff);
        let col = tape.sum_cols(neg);
        let cols = tape.shape(neg).1;
        let back = tape.broadcast_cols(col, cols);
        let prod = tape.mul(back, e);
        tape.sum(prod)
    }

    fn central_difference(
        f: &dyn Fn(&Tensor, &Tensor) -> f64,
        x: &Tensor,
        w: &Tensor,
        wrt_x: bool,
    ) -> Tensor {
        let eps = 1e-6;
        let target = if wrt_x { x } else { w };
        let mut out = Array2::zeros(target.dim());
        for idx in 0..target.len() {
            let (i, j) = (idx / target.ncols(), idx % target.ncols());
            let mut plus = target.clone();
            plus[[i, j]] += eps;
            let mut minus = target.clone();
            minus[[i, j]] -= eps;
            let (fp, fm) = if wrt_x {
                (f(&plus, w), f(&minus, w))
            } else {
                (f(x, &plus), f(x, &minus))
            };
            out[[i, j]] = (fp - fm) / (2.0 * eps);
        }
        out
    }

    #[test]
    fn gradients_match_finite_differences() {
        let x0 = array![[0.3, -0.7, 1.1], [0.9, 0.2, -0.4]];
        let w0 = array![[0.5, -0.2], [0.1, 0.8], [-0.6, 0.3]];
        let eval = |x: &Tensor, w: &Tensor| {
            let mut tape = Tape::new();
            let xv = tape.leaf(x.clone());
            let wv = tape.leaf(w.clone());
            let y = composite(&mut tape, xv, wv);
            tape.item(y)
        };

        let mut tape = Tape::new();
        let xv = tape.leaf(x0.clone());
        let wv = tape.leaf(w0.clone());
        let y = composite(&mut tape, xv, wv);
        let grads = tape.gradients(&[y], &[xv, wv], None).unwrap();

        let fd_x = central_difference(&eval, &x0, &w0, true);
        let fd_w = central_difference(&eval, &x0, &w0, false);
        for (a, b) in tape.value(grads[0]).iter().zip(fd_x.iter()) {
            assert!((a - b).abs() < 1e-6, "d/dx: {} vs {}", a, b);
        }
        for (a, b) in tape.value(grads[1]).iter().zip(fd_w.iter()) {
            assert!((a - b).abs() < 1e-6, "d/dw: {} vs {}", a, b);
        }
    }
}
