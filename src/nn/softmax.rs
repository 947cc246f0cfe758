//! Row-wise softmax and log-softmax layers
//!
//! Both subtract the per-row maximum before exponentiating; softmax is
//! translation invariant, so this changes nothing but keeps the
//! exponentials bounded. Rows are independent samples, the backward pass
//! never mixes them.

use ndarray::{Array2, Axis};

use crate::error::{Error, Result};
use crate::nn::module::Module;

/// Shared by forward and backward: stabilized `exp(x - rowmax) / rowsum`.
fn softmax_rows(input: &Array2<f64>) -> Array2<f64> {
    let mut out = input.clone();
    for mut row in out.rows_mut() {
        let max = row.fold(f64::NEG_INFINITY, |m, &v| m.max(v));
        row.mapv_inplace(|v| (v - max).exp());
        let sum = row.sum();
        row.mapv_inplace(|v| v / sum);
    }
    out
}

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

/// Normalizes each row to a probability distribution.
#[derive(Debug, Default, Clone, Copy)]
pub struct SoftMax;

impl SoftMax {
    pub fn new() -> Self {
        Self
    }
}

impl Module for SoftMax {
    fn forward(&mut self, input: &Array2<f64>) -> Result<Array2<f64>> {
        Ok(softmax_rows(input))
    }

    /// Per row with probabilities `p`, the Jacobian is `diag(p) - p p^T`,
    /// which contracts with `g` to `p * (g - <g, p>)`.
    fn backward(&mut self, input: &Array2<f64>, grad_output: &Array2<f64>) -> Result<Array2<f64>> {
        check_same_shape(self.name(), input, grad_output)?;
        let p = softmax_rows(input);
        let weighted = (grad_output * &p).sum_axis(Axis(1));
        let mut grad = grad_output.clone();
        for ((mut g_row, p_row), &w) in grad
            .rows_mut()
            .into_iter()
            .zip(p.rows())
            .zip(weighted.iter())
        {
            g_row.zip_mut_with(&p_row, |g, &pv| *g = pv * (*g - w));
        }
        Ok(grad)
    }

    fn name(&self) -> &'static str {
        "SoftMax"
    }
}

/// Row-wise `log(softmax(x))`, computed directly as
/// `(x - max) - ln(rowsum(exp(x - max)))` to avoid taking a log of tiny
/// probabilities.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSoftMax;

impl LogSoftMax {
    pub fn new() -> Self {
        Self
    }
}

impl Module for LogSoftMax {
    fn forward(&mut self, input: &Array2<f64>) -> Result<Array2<f64>> {
        let mut out = input.clone();
        for mut row in out.rows_mut() {
            let max = row.fold(f64::NEG_INFINITY, |m, &v| m.max(v));
            let log_sum = row.fold(0.0, |acc, &v| acc + (v - max).exp()).ln();
            row.mapv_inplace(|v| v - max - log_sum);
        }
        Ok(out)
    }

    /// Per row: `grad_input = g - p * sum(g)`.
    fn backward(&mut self, input: &Array2<f64>, grad_output: &Array2<f64>) -> Result<Array2<f64>> {
        check_same_shape(self.name(), input, grad_output)?;
        let p = softmax_rows(input);
        let row_sums = grad_output.sum_axis(Axis(1));
        let mut grad = grad_output.clone();
        for ((mut g_row, p_row), &s) in grad
            .rows_mut()
            .into_iter()
            .zip(p.rows())
            .zip(row_sums.iter())
        {
            g_row.zip_mut_with(&p_row, |g, &pv| *g -= pv * s);
        }
        Ok(grad)
    }

    fn name(&self) -> &'static str {
        "LogSoftMax"
    }
}
