//! Batch normalization, split into whitening and learnable rescaling
//!
//! [`BatchNormalization`] only whitens: it subtracts the per-feature mean
//! and divides by the standard deviation. The learnable affine part lives
//! in the separate [`ChannelwiseScaling`] layer, so it can be frozen or
//! absorbed into an adjacent linear layer independently of the whitening.
//!
//! In training mode the statistics come from the current batch and the
//! exponential moving estimates are updated; in inference mode the moving
//! estimates are used and left untouched.

use ndarray::{Array1, Array2, ArrayViewD, Axis};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;

use crate::error::{Error, Result};
use crate::nn::module::{Module, ParamGrad};

/// Per-feature whitening over the batch dimension.
pub struct BatchNormalization {
    num_features: usize,
    eps: f64,
    /// Decay of the moving estimates: `moving = moving * alpha + batch * (1 - alpha)`.
    /// With `alpha = 0` the moving statistics track the latest batch exactly.
    alpha: f64,
    moving_mean: Array1<f64>,
    moving_variance: Array1<f64>,
    training: bool,
}

impl BatchNormalization {
    pub const DEFAULT_EPS: f64 = 1e-3;
    pub const DEFAULT_ALPHA: f64 = 0.1;

    pub fn new(num_features: usize) -> Self {
        Self::with_alpha(num_features, Self::DEFAULT_ALPHA)
    }

    pub fn with_alpha(num_features: usize, alpha: f64) -> Self {
        Self {
            num_features,
            eps: Self::DEFAULT_EPS,
            alpha,
            moving_mean: Array1::zeros(num_features),
            moving_variance: Array1::ones(num_features),
            training: true,
        }
    }

    pub fn moving_mean(&self) -> &Array1<f64> {
        &self.moving_mean
    }

    pub fn moving_variance(&self) -> &Array1<f64> {
        &self.moving_variance
    }

    fn check_input(&self, input: &Array2<f64>) -> Result<()> {
        if input.ncols() != self.num_features {
            return Err(Error::shape(
                "BatchNormalization",
                format!("(batch, {})", self.num_features),
                format!("({}, {})", input.nrows(), input.ncols()),
            ));
        }
        if input.nrows() == 0 {
            return Err(Error::InvalidArgument(
                "BatchNormalization requires a non-empty batch".into(),
            ));
        }
        Ok(())
    }

    /// Per-feature mean and biased variance of the batch.
    fn batch_stats(input: &Array2<f64>) -> (Array1<f64>, Array1<f64>) {
        let n = input.nrows() as f64;
        let mean = input.sum_axis(Axis(0)) / n;
        let centered = input - &mean;
        let variance = centered.mapv(|v| v * v).sum_axis(Axis(0)) / n;
        (mean, variance)
    }
}

impl Module for BatchNormalization {
    fn forward(&mut self, input: &Array2<f64>) -> Result<Array2<f64>> {
        self.check_input(input)?;
        if self.training {
            let (mean, variance) = Self::batch_stats(input);
            self.moving_mean = &self.moving_mean * self.alpha + &mean * (1.0 - self.alpha);
            self.moving_variance =
                &self.moving_variance * self.alpha + &variance * (1.0 - self.alpha);
            let std = variance.mapv(|v| (v + self.eps).sqrt());
            Ok((input - &mean) / &std)
        } else {
            let std = self.moving_variance.mapv(|v| (v + self.eps).sqrt());
            Ok((input - &self.moving_mean) / &std)
        }
    }

    fn backward(&mut self, input: &Array2<f64>, grad_output: &Array2<f64>) -> Result<Array2<f64>> {
        self.check_input(input)?;
        if input.dim() != grad_output.dim() {
            return Err(Error::shape(
                "BatchNormalization",
                format!("{:?}", input.dim()),
                format!("{:?}", grad_output.dim()),
            ));
        }
        if self.training {
            // whitening gradient with batch statistics recomputed from the
            // forward-time input:
            //   grad = (g - mean(g) - xhat * mean(g * xhat)) / std
            let n = input.nrows() as f64;
            let (mean, variance) = Self::batch_stats(input);
            let std = variance.mapv(|v| (v + self.eps).sqrt());
            let xhat = (input - &mean) / &std;
            let grad_mean = grad_output.sum_axis(Axis(0)) / n;
            let grad_xhat_mean = (grad_output * &xhat).sum_axis(Axis(0)) / n;
            Ok(((grad_output - &grad_mean) - xhat * &grad_xhat_mean) / &std)
        } else {
            let std = self.moving_variance.mapv(|v| (v + self.eps).sqrt());
            Ok(grad_output / &std)
        }
    }

    fn train(&mut self) {
        self.training = true;
    }

    fn evaluate(&mut self) {
        self.training = false;
    }

    fn is_training(&self) -> bool {
        self.training
    }

    fn name(&self) -> &'static str {
        "BatchNormalization"
    }
}

/// Learnable per-feature affine rescaling: `gamma * x + beta`.
///
/// The usual companion of [`BatchNormalization`].
pub struct ChannelwiseScaling {
    gamma: Array1<f64>,
    beta: Array1<f64>,
    grad_gamma: Array1<f64>,
    grad_beta: Array1<f64>,
    num_features: usize,
}

impl ChannelwiseScaling {
    /// Create a layer with both parameters uniform in
    /// `[-1/sqrt(num_features), 1/sqrt(num_features)]`.
    pub fn new(num_features: usize) -> Self {
        let stdv = 1.0 / (num_features as f64).sqrt();
        Self {
            gamma: Array1::random(num_features, Uniform::new(-stdv, stdv)),
            beta: Array1::random(num_features, Uniform::new(-stdv, stdv)),
            grad_gamma: Array1::zeros(num_features),
            grad_beta: Array1::zeros(num_features),
            num_features,
        }
    }

    /// Create a layer from explicit `gamma` and `beta` of equal length.
    pub fn from_parts(gamma: Array1<f64>, beta: Array1<f64>) -> Result<Self> {
        if gamma.len() != beta.len() {
            return Err(Error::shape(
                "ChannelwiseScaling",
                format!("beta of length {}", gamma.len()),
                format!("length {}", beta.len()),
            ));
        }
        let num_features = gamma.len();
        Ok(Self {
            grad_gamma: Array1::zeros(num_features),
            grad_beta: Array1::zeros(num_features),
            gamma,
            beta,
            num_features,
        })
    }

    pub fn gamma(&self) -> &Array1<f64> {
        &self.gamma
    }

    pub fn beta(&self) -> &Array1<f64> {
        &self.beta
    }

    pub fn grad_gamma(&self) -> &Array1<f64> {
        &self.grad_gamma
    }

    pub fn grad_beta(&self) -> &Array1<f64> {
        &self.grad_beta
    }

    fn check_input(&self, input: &Array2<f64>) -> Result<()> {
        if input.ncols() != self.num_features {
            return Err(Error::shape(
                "ChannelwiseScaling",
                format!("(batch, {})", self.num_features),
                format!("({}, {})", input.nrows(), input.ncols()),
            ));
        }
        Ok(())
    }
}

impl Module for ChannelwiseScaling {
    fn forward(&mut self, input: &Array2<f64>) -> Result<Array2<f64>> {
        self.check_input(input)?;
        Ok(input * &self.gamma + &self.beta)
    }

    fn backward(&mut self, input: &Array2<f64>, grad_output: &Array2<f64>) -> Result<Array2<f64>> {
        self.check_input(input)?;
        if input.dim() != grad_output.dim() {
            return Err(Error::shape(
                "ChannelwiseScaling",
                format!("{:?}", input.dim()),
                format!("{:?}", grad_output.dim()),
            ));
        }
        self.grad_gamma = &self.grad_gamma + &(grad_output * input).sum_axis(Axis(0));
        self.grad_beta = &self.grad_beta + &grad_output.sum_axis(Axis(0));
        Ok(grad_output * &self.gamma)
    }

    fn zero_grad_parameters(&mut self) {
        self.grad_gamma.fill(0.0);
        self.grad_beta.fill(0.0);
    }

    fn parameters(&self) -> Vec<ArrayViewD<'_, f64>> {
        vec![self.gamma.view().into_dyn(), self.beta.view().into_dyn()]
    }

    fn grad_parameters(&self) -> Vec<ArrayViewD<'_, f64>> {
        vec![
            self.grad_gamma.view().into_dyn(),
            self.grad_beta.view().into_dyn(),
        ]
    }

    fn params_and_grads(&mut self) -> Vec<ParamGrad<'_>> {
        vec![
            (
                self.gamma.view_mut().into_dyn(),
                self.grad_gamma.view().into_dyn(),
            ),
            (
                self.beta.view_mut().into_dyn(),
                self.grad_beta.view().into_dyn(),
            ),
        ]
    }

    fn name(&self) -> &'static str {
        "ChannelwiseScaling"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn standardized_batch_passes_almost_unchanged() {
        let mut bn = BatchNormalization::new(2);
        // each column has mean 0 and variance 1
        let x = array![[1.0, -1.0], [-1.0, 1.0]];
        let y = bn.forward(&x).unwrap();
        for (yv, xv) in y.iter().zip(x.iter()) {
            assert_relative_eq!(*yv, *xv, epsilon = 1e-3);
        }
    }

    #[test]
    fn train_output_has_zero_mean_unit_variance() {
        let mut bn = BatchNormalization::new(2);
        let x = array![[1.0, 10.0], [3.0, 20.0], [5.0, 60.0], [7.0, 30.0]];
        let y = bn.forward(&x).unwrap();
        let n = y.nrows() as f64;
        for col in y.columns() {
            let mean = col.sum() / n;
            let var = col.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
            assert_relative_eq!(mean, 0.0, epsilon = 1e-10);
            assert_relative_eq!(var, 1.0, epsilon = 1e-2);
        }
    }

    #[test]
    fn alpha_zero_tracks_latest_batch() {
        let mut bn = BatchNormalization::with_alpha(1, 0.0);
        let x = array![[2.0], [4.0]];
        bn.forward(&x).unwrap();
        assert_relative_eq!(bn.moving_mean()[0], 3.0, epsilon = 1e-12);
        assert_relative_eq!(bn.moving_variance()[0], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn eval_mode_does_not_touch_moving_stats() {
        let mut bn = BatchNormalization::with_alpha(1, 0.0);
        bn.forward(&array![[2.0], [4.0]]).unwrap();
        let mean_before = bn.moving_mean().clone();

        bn.evaluate();
        bn.forward(&array![[100.0], [200.0]]).unwrap();
        assert_eq!(bn.moving_mean(), &mean_before);
    }

    #[test]
    fn eval_mode_uses_moving_stats() {
        let mut bn = BatchNormalization::with_alpha(1, 0.0);
        bn.forward(&array![[2.0], [4.0]]).unwrap();

        bn.evaluate();
        // moving mean 3, moving variance 1 -> (3 - 3) / sqrt(1 + eps) = 0
        let y = bn.forward(&array![[3.0]]).unwrap();
        assert_relative_eq!(y[[0, 0]], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn scaling_forward_and_backward() {
        let mut scale =
            ChannelwiseScaling::from_parts(array![2.0, -1.0], array![0.5, 0.0]).unwrap();
        let x = array![[1.0, 3.0], [2.0, -2.0]];
        let y = scale.forward(&x).unwrap();
        assert_eq!(y, array![[2.5, -3.0], [4.5, 2.0]]);

        let g = array![[1.0, 1.0], [1.0, 1.0]];
        let gi = scale.backward(&x, &g).unwrap();
        assert_eq!(gi, array![[2.0, -1.0], [2.0, -1.0]]);
        assert_eq!(scale.grad_gamma(), &array![3.0, 1.0]);
        assert_eq!(scale.grad_beta(), &array![2.0, 2.0]);
    }

    #[test]
    fn scaling_rejects_wrong_width() {
        let mut scale = ChannelwiseScaling::new(3);
        assert!(scale.forward(&array![[1.0, 2.0]]).is_err());
    }
}
