//! Reverse-mode automatic differentiation over 2-D tensors
//!
//! A [Tape] is a Wengert list. Every operation is evaluated eagerly when it is
//! recorded, and the node remembers which inputs produced it. [Tape::gradients]
//! walks the list backwards and records the backward pass as ordinary tape
//! operations, so the gradients it returns can be differentiated again. That is
//! all the R-operator needs: two nested vector-Jacobian products.

mod backward;

use ndarray::{Array2, Axis};

/// Dense values held by the tape
pub type Tensor = Array2<f64>;

/// Handle to a node on a [Tape]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Var(usize);

#[derive(Clone, Copy, Debug)]
pub(crate) enum Op {
    Leaf,
    Add(Var, Var),
    Sub(Var, Var),
    Mul(Var, Var),
    Div(Var, Var),
    Neg(Var),
    Scale(Var, f64),
    MatMul(Var, Var),
    Transpose(Var),
    Exp(Var),
    Log(Var),
    Tanh(Var),
    /// (1, n) -> (rows, n)
    BroadcastRows(Var),
    /// (m, n) -> (1, n)
    SumRows(Var),
    /// (m, 1) -> (m, cols)
    BroadcastCols(Var),
    /// (m, n) -> (m, 1)
    SumCols(Var),
}

impl Op {
    fn inputs(&self) -> [Option<Var>; 2] {
        match *self {
            Op::Leaf => [None, None],
            Op::Add(a, b) | Op::Sub(a, b) | Op::Mul(a, b) | Op::Div(a, b) | Op::MatMul(a, b) => {
                [Some(a), Some(b)]
            }
            Op::Neg(a)
            | Op::Scale(a, _)
            | Op::Transpose(a)
            | Op::Exp(a)
            | Op::Log(a)
            | Op::Tanh(a)
            | Op::BroadcastRows(a)
            | Op::SumRows(a)
            | Op::BroadcastCols(a)
            | Op::SumCols(a) => [Some(a), None],
        }
    }
}

#[derive(Debug)]
struct Node {
    op: Op,
    value: Tensor,
}

/// Append-only record of a computation
#[derive(Debug, Default)]
pub struct Tape {
    nodes: Vec<Node>,
}

impl Tape {
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn push(&mut self, op: Op, value: Tensor) -> Var {
        let id = self.nodes.len();
        self.nodes.push(Node { op, value });
        Var(id)
    }

    /// Record an independent value. Every leaf can be differentiated against.
    pub fn leaf(&mut self, value: Tensor) -> Var {
        self.push(Op::Leaf, value)
    }

    pub fn scalar(&mut self, value: f64) -> Var {
        self.leaf(Array2::from_elem((1, 1), value))
    }

    pub fn zeros_like(&mut self, x: Var) -> Var {
        let value = Array2::zeros(self.shape(x));
        self.leaf(value)
    }

    pub fn ones_like(&mut self, x: Var) -> Var {
        let value = Array2::ones(self.shape(x));
        self.leaf(value)
    }

    pub fn value(&self, x: Var) -> &Tensor {
        &self.nodes[x.0].value
    }

    pub fn shape(&self, x: Var) -> (usize, usize) {
        self.nodes[x.0].value.dim()
    }

    /// Value of a 1x1 node
    pub fn item(&self, x: Var) -> f64 {
        self.nodes[x.0].value[[0, 0]]
    }

    pub fn add(&mut self, a: Var, b: Var) -> Var {
        let value = self.value(a) + self.value(b);
        self.push(Op::Add(a, b), value)
    }

    pub fn sub(&mut self, a: Var, b: Var) -> Var {
        let value = self.value(a) - self.value(b);
        self.push(Op::Sub(a, b), value)
    }

    /// Elementwise product
    pub fn mul(&mut self, a: Var, b: Var) -> Var {
        let value = self.value(a) * self.value(b);
        self.push(Op::Mul(a, b), value)
    }

    /// Elementwise quotient
    pub fn div(&mut self, a: Var, b: Var) -> Var {
        let value = self.value(a) / self.value(b);
        self.push(Op::Div(a, b), value)
    }

    pub fn neg(&mut self, a: Var) -> Var {
        let value = self.value(a).mapv(|x| -x);
        self.push(Op::Neg(a), value)
    }

    pub fn scale(&mut self, a: Var, factor: f64) -> Var {
        let value = self.value(a) * factor;
        self.push(Op::Scale(a, factor), value)
    }

    pub fn matmul(&mut self, a: Var, b: Var) -> Var {
        let value = self.value(a).dot(self.value(b));
        self.push(Op::MatMul(a, b), value)
    }

    pub fn transpose(&mut self, a: Var) -> Var {
        let value = self.value(a).t().to_owned();
        self.push(Op::Transpose(a), value)
    }

    pub fn exp(&mut self, a: Var) -> Var {
        let value = self.value(a).mapv(f64::exp);
        self.push(Op::Exp(a), value)
    }

    pub fn log(&mut self, a: Var) -> Var {
        let value = self.value(a).mapv(f64::ln);
        self.push(Op::Log(a), value)
    }

    pub fn tanh(&mut self, a: Var) -> Var {
        let value = self.value(a).mapv(f64::tanh);
        self.push(Op::Tanh(a), value)
    }

    /// Repeat a row vector `rows` times
    pub fn broadcast_rows(&mut self, a: Var, rows: usize) -> Var {
        let source = self.value(a);
        assert_eq!(source.nrows(), 1, "broadcast_rows expects a row vector");
        let value = Array2::from_shape_fn((rows, source.ncols()), |(_, j)| source[[0, j]]);
        self.push(Op::BroadcastRows(a), value)
    }

    /// Sum over rows, giving a row vector
    pub fn sum_rows(&mut self, a: Var) -> Var {
        let value = self.value(a).sum_axis(Axis(0)).insert_axis(Axis(0));
        self.push(Op::SumRows(a), value)
    }

    /// Repeat a column vector `cols` times
    pub fn broadcast_cols(&mut self, a: Var, cols: usize) -> Var {
        let source = self.value(a);
        assert_eq!(source.ncols(), 1, "broadcast_cols expects a column vector");
        let value = Array2::from_shape_fn((source.nrows(), cols), |(i, _)| source[[i, 0]]);
        self.push(Op::BroadcastCols(a), value)
    }

    /// Sum over columns, giving a column vector
    pub fn sum_cols(&mut self, a: Var) -> Var {
        let value = self.value(a).sum_axis(Axis(1)).insert_axis(Axis(1));
        self.push(Op::SumCols(a), value)
    }

    /// Sum of all elements as a 1x1 node
    pub fn sum(&mut self, a: Var) -> Var {
        let cols = self.sum_cols(a);
        self.sum_rows(cols)
    }
}
