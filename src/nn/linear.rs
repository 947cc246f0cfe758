//! Fully connected (affine) layer
//!
//! Performs `y = x @ W^T + b` over a batch.
//!
//! Gradients, via the chain rule:
//!
//! ```text
//! grad_input  = grad_output @ W
//! grad_weight = grad_output^T @ x
//! grad_bias   = column-sum of grad_output
//! ```

use ndarray::{Array1, Array2, ArrayViewD, Axis};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;

use crate::error::{Error, Result};
use crate::nn::module::{Module, ParamGrad};

/// Affine transform with learnable weight and bias.
///
/// Weight shape is `(n_out, n_in)`, bias `(n_out,)`. Both are initialized
/// uniformly in `[-1/sqrt(n_in), 1/sqrt(n_in)]`.
pub struct Linear {
    weight: Array2<f64>,
    bias: Array1<f64>,
    grad_weight: Array2<f64>,
    grad_bias: Array1<f64>,
    n_in: usize,
    n_out: usize,
}

impl Linear {
    /// Create a layer mapping `n_in` features to `n_out`.
    pub fn new(n_in: usize, n_out: usize) -> Self {
        let stdv = 1.0 / (n_in as f64).sqrt();
        Self {
            weight: Array2::random((n_out, n_in), Uniform::new(-stdv, stdv)),
            bias: Array1::random(n_out, Uniform::new(-stdv, stdv)),
            grad_weight: Array2::zeros((n_out, n_in)),
            grad_bias: Array1::zeros(n_out),
            n_in,
            n_out,
        }
    }

    /// Create a layer from explicit weight `(n_out, n_in)` and bias `(n_out,)`.
    pub fn from_parts(weight: Array2<f64>, bias: Array1<f64>) -> Result<Self> {
        let (n_out, n_in) = weight.dim();
        if bias.len() != n_out {
            return Err(Error::shape(
                "Linear",
                format!("bias of length {n_out}"),
                format!("length {}", bias.len()),
            ));
        }
        Ok(Self {
            grad_weight: Array2::zeros((n_out, n_in)),
            grad_bias: Array1::zeros(n_out),
            weight,
            bias,
            n_in,
            n_out,
        })
    }

    pub fn weight(&self) -> &Array2<f64> {
        &self.weight
    }

    pub fn bias(&self) -> &Array1<f64> {
        &self.bias
    }

    pub fn grad_weight(&self) -> &Array2<f64> {
        &self.grad_weight
    }

    pub fn grad_bias(&self) -> &Array1<f64> {
        &self.grad_bias
    }

    fn check_input(&self, input: &Array2<f64>) -> Result<()> {
        if input.ncols() != self.n_in {
            return Err(Error::shape(
                "Linear",
                format!("(batch, {})", self.n_in),
                format!("({}, {})", input.nrows(), input.ncols()),
            ));
        }
        Ok(())
    }

    fn update_grad_input(&self, grad_output: &Array2<f64>) -> Array2<f64> {
        grad_output.dot(&self.weight)
    }

    fn acc_grad_parameters(&mut self, input: &Array2<f64>, grad_output: &Array2<f64>) {
        self.grad_weight = &self.grad_weight + &grad_output.t().dot(input);
        self.grad_bias = &self.grad_bias + &grad_output.sum_axis(Axis(0));
    }
}

impl Module for Linear {
    fn forward(&mut self, input: &Array2<f64>) -> Result<Array2<f64>> {
        self.check_input(input)?;
        Ok(input.dot(&self.weight.t()) + &self.bias)
    }

    fn backward(&mut self, input: &Array2<f64>, grad_output: &Array2<f64>) -> Result<Array2<f64>> {
        self.check_input(input)?;
        if grad_output.ncols() != self.n_out || grad_output.nrows() != input.nrows() {
            return Err(Error::shape(
                "Linear",
                format!("({}, {})", input.nrows(), self.n_out),
                format!("({}, {})", grad_output.nrows(), grad_output.ncols()),
            ));
        }
        let grad_input = self.update_grad_input(grad_output);
        self.acc_grad_parameters(input, grad_output);
        Ok(grad_input)
    }

    fn zero_grad_parameters(&mut self) {
        self.grad_weight.fill(0.0);
        self.grad_bias.fill(0.0);
    }

    fn parameters(&self) -> Vec<ArrayViewD<'_, f64>> {
        vec![self.weight.view().into_dyn(), self.bias.view().into_dyn()]
    }

    fn grad_parameters(&self) -> Vec<ArrayViewD<'_, f64>> {
        vec![
            self.grad_weight.view().into_dyn(),
            self.grad_bias.view().into_dyn(),
        ]
    }

    fn params_and_grads(&mut self) -> Vec<ParamGrad<'_>> {
        vec![
            (
                self.weight.view_mut().into_dyn(),
                self.grad_weight.view().into_dyn(),
            ),
            (
                self.bias.view_mut().into_dyn(),
                self.grad_bias.view().into_dyn(),
            ),
        ]
    }

    fn name(&self) -> &'static str {
        "Linear"
    }
}
