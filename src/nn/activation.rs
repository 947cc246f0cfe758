//! Elementwise activation layers
//!
//! All activations here are stateless: the backward pass recomputes the
//! local derivative from the forward-time input, so nothing needs caching.

use ndarray::Array2;

use crate::error::{Error, Result};
use crate::nn::module::Module;

fn check_same_shape(
    layer: &'static str,
    input: &Array2<f64>,
    grad_output: &Array2<f64>,
) -> Result<()> {
    if input.dim() != grad_output.dim() {
        return Err(Error::shape(
            layer,
            format!("{:?}", input.dim()),
            format!("{:?}", grad_output.dim()),
        ));
    }
    Ok(())
}

/// Rectified linear unit: `max(x, 0)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReLU;

impl ReLU {
    pub fn new() -> Self {
        Self
    }
}

impl Module for ReLU {
    fn forward(&mut self, input: &Array2<f64>) -> Result<Array2<f64>> {
        Ok(input.mapv(|x| x.max(0.0)))
    }

    fn backward(&mut self, input: &Array2<f64>, grad_output: &Array2<f64>) -> Result<Array2<f64>> {
        check_same_shape(self.name(), input, grad_output)?;
        let mut grad = grad_output.clone();
        grad.zip_mut_with(input, |g, &x| {
            if x <= 0.0 {
                *g = 0.0;
            }
        });
        Ok(grad)
    }

    fn name(&self) -> &'static str {
        "ReLU"
    }
}

/// Leaky rectifier: `max(x, slope * x)` with `0 < slope < 1`.
#[derive(Debug, Clone, Copy)]
pub struct LeakyReLU {
    slope: f64,
}

impl Default for LeakyReLU {
    fn default() -> Self {
        Self { slope: 0.01 }
    }
}

impl LeakyReLU {
    pub fn new(slope: f64) -> Self {
        Self { slope }
    }
}

impl Module for LeakyReLU {
    fn forward(&mut self, input: &Array2<f64>) -> Result<Array2<f64>> {
        let slope = self.slope;
        Ok(input.mapv(|x| x.max(slope * x)))
    }

    fn backward(&mut self, input: &Array2<f64>, grad_output: &Array2<f64>) -> Result<Array2<f64>> {
        check_same_shape(self.name(), input, grad_output)?;
        let slope = self.slope;
        let mut grad = grad_output.clone();
        grad.zip_mut_with(input, |g, &x| {
            if x < 0.0 {
                *g *= slope;
            }
        });
        Ok(grad)
    }

    fn name(&self) -> &'static str {
        "LeakyReLU"
    }
}

/// Exponential linear unit: `x` for `x >= 0`, `alpha * (e^x - 1)` otherwise.
#[derive(Debug, Clone, Copy)]
pub struct Elu {
    alpha: f64,
}

impl Default for Elu {
    fn default() -> Self {
        Self { alpha: 1.0 }
    }
}

impl Elu {
    pub fn new(alpha: f64) -> Self {
        Self { alpha }
    }
}

impl Module for Elu {
    fn forward(&mut self, input: &Array2<f64>) -> Result<Array2<f64>> {
        let alpha = self.alpha;
        Ok(input.mapv(|x| if x >= 0.0 { x } else { alpha * (x.exp() - 1.0) }))
    }

    fn backward(&mut self, input: &Array2<f64>, grad_output: &Array2<f64>) -> Result<Array2<f64>> {
        check_same_shape(self.name(), input, grad_output)?;
        let alpha = self.alpha;
        let mut grad = grad_output.clone();
        // derivative below zero is alpha * e^x, i.e. forward output + alpha
        grad.zip_mut_with(input, |g, &x| {
            if x < 0.0 {
                *g *= alpha * x.exp();
            }
        });
        Ok(grad)
    }

    fn name(&self) -> &'static str {
        "Elu"
    }
}

/// Smooth rectifier: `ln(1 + e^x)`, derivative `sigmoid(x)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SoftPlus;

impl SoftPlus {
    pub fn new() -> Self {
        Self
    }
}

impl Module for SoftPlus {
    fn forward(&mut self, input: &Array2<f64>) -> Result<Array2<f64>> {
        Ok(input.mapv(|x| x.exp().ln_1p()))
    }

    fn backward(&mut self, input: &Array2<f64>, grad_output: &Array2<f64>) -> Result<Array2<f64>> {
        check_same_shape(self.name(), input, grad_output)?;
        let mut grad = grad_output.clone();
        grad.zip_mut_with(input, |g, &x| *g *= sigmoid(x));
        Ok(grad)
    }

    fn name(&self) -> &'static str {
        "SoftPlus"
    }
}

/// Logistic sigmoid: `1 / (1 + e^-x)`, derivative `s - s^2`.
#[derive(Debug, Default, Clone, Copy)]
pub struct Sigmoid;

impl Sigmoid {
    pub fn new() -> Self {
        Self
    }
}

impl Module for Sigmoid {
    fn forward(&mut self, input: &Array2<f64>) -> Result<Array2<f64>> {
        Ok(input.mapv(sigmoid))
    }

    fn backward(&mut self, input: &Array2<f64>, grad_output: &Array2<f64>) -> Result<Array2<f64>> {
        check_same_shape(self.name(), input, grad_output)?;
        let mut grad = grad_output.clone();
        grad.zip_mut_with(input, |g, &x| {
            let s = sigmoid(x);
            *g *= s - s * s;
        });
        Ok(grad)
    }

    fn name(&self) -> &'static str {
        "Sigmoid"
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}
