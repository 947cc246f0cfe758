//! Loss criteria
//!
//! A criterion maps a batch of predictions and targets to a scalar loss
//! and knows the gradient of that loss with respect to the predictions.
//! Criteria have no training/inference distinction.

use ndarray::Array2;

use crate::error::{Error, Result};

/// Scalar loss with a gradient w.r.t. its input.
pub trait Criterion {
    /// Compute the scalar loss for a batch.
    fn forward(&mut self, input: &Array2<f64>, target: &Array2<f64>) -> Result<f64>;

    /// Gradient of the loss w.r.t. `input`, same shape as `input`.
    fn backward(&mut self, input: &Array2<f64>, target: &Array2<f64>) -> Result<Array2<f64>>;

    /// Criterion name used in error messages.
    fn name(&self) -> &'static str;
}

fn check_shapes(
    name: &'static str,
    input: &Array2<f64>,
    target: &Array2<f64>,
) -> Result<()> {
    if input.dim() != target.dim() {
        return Err(Error::shape(
            name,
            format!("{:?}", input.dim()),
            format!("{:?}", target.dim()),
        ));
    }
    Ok(())
}

/// Mean squared error, summed over features and averaged over the batch.
#[derive(Debug, Default, Clone, Copy)]
pub struct MseCriterion;

impl MseCriterion {
    pub fn new() -> Self {
        Self
    }
}

impl Criterion for MseCriterion {
    fn forward(&mut self, input: &Array2<f64>, target: &Array2<f64>) -> Result<f64> {
        check_shapes(self.name(), input, target)?;
        let diff = input - target;
        Ok((&diff * &diff).sum() / input.nrows() as f64)
    }

    fn backward(&mut self, input: &Array2<f64>, target: &Array2<f64>) -> Result<Array2<f64>> {
        check_shapes(self.name(), input, target)?;
        Ok((input - target) * (2.0 / input.nrows() as f64))
    }

    fn name(&self) -> &'static str {
        "MseCriterion"
    }
}

/// Negative log likelihood over raw probabilities with one-hot targets.
///
/// Inputs are clamped to `[eps, 1 - eps]` before the log so that a
/// confidently wrong prediction does not produce `ln(0)`. Prefer feeding
/// log-probabilities to [`ClassNllCriterion`]; this variant exists for
/// pipelines ending in a plain [`SoftMax`](crate::nn::SoftMax). The
/// backward pass uses the fused softmax shortcut `(p - target) / batch`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ClassNllCriterionUnstable;

impl ClassNllCriterionUnstable {
    pub const EPS: f64 = 1e-15;

    pub fn new() -> Self {
        Self
    }
}

impl Criterion for ClassNllCriterionUnstable {
    fn forward(&mut self, input: &Array2<f64>, target: &Array2<f64>) -> Result<f64> {
        check_shapes(self.name(), input, target)?;
        let clamped = input.mapv(|p| p.clamp(Self::EPS, 1.0 - Self::EPS));
        Ok(-(target * &clamped.mapv(f64::ln)).sum() / input.nrows() as f64)
    }

    fn backward(&mut self, input: &Array2<f64>, target: &Array2<f64>) -> Result<Array2<f64>> {
        check_shapes(self.name(), input, target)?;
        let clamped = input.mapv(|p| p.clamp(Self::EPS, 1.0 - Self::EPS));
        Ok((&clamped - target) / input.nrows() as f64)
    }

    fn name(&self) -> &'static str {
        "ClassNllCriterionUnstable"
    }
}

/// Negative log likelihood over log-probabilities with one-hot targets.
///
/// The numerically stable pairing with
/// [`LogSoftMax`](crate::nn::LogSoftMax): no log and no clamping needed,
/// the criterion only indexes the true class via the one-hot target.
#[derive(Debug, Default, Clone, Copy)]
pub struct ClassNllCriterion;

impl ClassNllCriterion {
    pub fn new() -> Self {
        Self
    }
}

impl Criterion for ClassNllCriterion {
    fn forward(&mut self, input: &Array2<f64>, target: &Array2<f64>) -> Result<f64> {
        check_shapes(self.name(), input, target)?;
        Ok(-(target * input).sum() / input.nrows() as f64)
    }

    fn backward(&mut self, input: &Array2<f64>, target: &Array2<f64>) -> Result<Array2<f64>> {
        check_shapes(self.name(), input, target)?;
        Ok(target * (-1.0 / input.nrows() as f64))
    }

    fn name(&self) -> &'static str {
        "ClassNllCriterion"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn mse_zero_at_target() {
        let mut mse = MseCriterion::new();
        let x = array![[0.5, -0.5], [1.5, 2.5]];
        assert_relative_eq!(mse.forward(&x, &x).unwrap(), 0.0, epsilon = 1e-15);
        let grad = mse.backward(&x, &x).unwrap();
        assert!(grad.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn mse_known_value() {
        let mut mse = MseCriterion::new();
        let x = array![[1.0, 2.0], [3.0, 4.0]];
        let t = array![[0.0, 2.0], [3.0, 2.0]];
        // (1 + 0 + 0 + 4) / 2
        assert_relative_eq!(mse.forward(&x, &t).unwrap(), 2.5, epsilon = 1e-12);
        let grad = mse.backward(&x, &t).unwrap();
        assert_relative_eq!(grad[[0, 0]], 1.0, epsilon = 1e-12);
        assert_relative_eq!(grad[[1, 1]], 2.0, epsilon = 1e-12);
    }

    #[test]
    fn stable_and_unstable_nll_agree() {
        let mut stable = ClassNllCriterion::new();
        let mut unstable = ClassNllCriterionUnstable::new();

        let probs = array![[0.7, 0.2, 0.1], [0.1, 0.1, 0.8]];
        let log_probs = probs.mapv(f64::ln);
        let target = array![[1.0, 0.0, 0.0], [0.0, 0.0, 1.0]];

        let a = stable.forward(&log_probs, &target).unwrap();
        let b = unstable.forward(&probs, &target).unwrap();
        assert_relative_eq!(a, b, epsilon = 1e-10);
    }

    #[test]
    fn stable_nll_gradient_is_scaled_target() {
        let mut nll = ClassNllCriterion::new();
        let log_probs = array![[-0.1, -2.0], [-1.5, -0.3]];
        let target = array![[1.0, 0.0], [0.0, 1.0]];
        let grad = nll.backward(&log_probs, &target).unwrap();
        assert_eq!(grad, array![[-0.5, 0.0], [0.0, -0.5]]);
    }

    #[test]
    fn unstable_nll_survives_zero_probability() {
        let mut nll = ClassNllCriterionUnstable::new();
        let probs = array![[0.0, 1.0]];
        let target = array![[1.0, 0.0]];
        let loss = nll.forward(&probs, &target).unwrap();
        assert!(loss.is_finite());
        assert!(loss > 0.0);
    }

    #[test]
    fn criteria_reject_shape_mismatch() {
        let mut mse = MseCriterion::new();
        let x = array![[1.0, 2.0]];
        let t = array![[1.0, 2.0, 3.0]];
        assert!(mse.forward(&x, &t).is_err());
    }
}
