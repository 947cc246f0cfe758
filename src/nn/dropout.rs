//! Inverted dropout layer
//!
//! In training mode each element survives with probability `p` and the
//! survivors are scaled by `1/p`, so the expected activation magnitude is
//! unchanged and inference needs no rescaling. In inference mode the layer
//! is the identity.

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{Error, Result};
use crate::nn::module::Module;

/// Stochastic regularization with per-call Bernoulli masks.
///
/// `p` is the keep probability. The mask drawn during a training-mode
/// forward pass is stored and reused by the matching backward call;
/// backward without a prior forward is a state error.
pub struct Dropout {
    p: f64,
    mask: Option<Array2<f64>>,
    training: bool,
    rng: StdRng,
}

impl Dropout {
    /// Create a dropout layer keeping each element with probability `p`.
    pub fn new(p: f64) -> Result<Self> {
        Self::from_rng(p, StdRng::from_entropy())
    }

    /// Deterministic variant for reproducible masks.
    pub fn with_seed(p: f64, seed: u64) -> Result<Self> {
        Self::from_rng(p, StdRng::seed_from_u64(seed))
    }

    fn from_rng(p: f64, rng: StdRng) -> Result<Self> {
        if !(0.0..=1.0).contains(&p) || p == 0.0 {
            return Err(Error::InvalidArgument(format!(
                "dropout keep probability must be in (0, 1], got {p}"
            )));
        }
        Ok(Self {
            p,
            mask: None,
            training: true,
            rng,
        })
    }

    pub fn keep_probability(&self) -> f64 {
        self.p
    }
}

impl Module for Dropout {
    fn forward(&mut self, input: &Array2<f64>) -> Result<Array2<f64>> {
        if !self.training {
            return Ok(input.clone());
        }
        let p = self.p;
        let rng = &mut self.rng;
        let mask = Array2::from_shape_fn(input.dim(), |_| {
            if rng.gen_bool(p) {
                1.0
            } else {
                0.0
            }
        });
        let output = input * &mask / p;
        self.mask = Some(mask);
        Ok(output)
    }

    fn backward(&mut self, input: &Array2<f64>, grad_output: &Array2<f64>) -> Result<Array2<f64>> {
        if input.dim() != grad_output.dim() {
            return Err(Error::shape(
                "Dropout",
                format!("{:?}", input.dim()),
                format!("{:?}", grad_output.dim()),
            ));
        }
        if !self.training {
            return Ok(grad_output.clone());
        }
        let mask = self
            .mask
            .as_ref()
            .ok_or(Error::MissingForwardState("Dropout"))?;
        if mask.dim() != grad_output.dim() {
            return Err(Error::shape(
                "Dropout",
                format!("{:?}", mask.dim()),
                format!("{:?}", grad_output.dim()),
            ));
        }
        Ok(grad_output * mask / self.p)
    }

    fn train(&mut self) {
        self.training = true;
    }

    fn evaluate(&mut self) {
        self.training = false;
        // stale masks must not leak into a later training phase
        self.mask = None;
    }

    fn is_training(&self) -> bool {
        self.training
    }

    fn name(&self) -> &'static str {
        "Dropout"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn rejects_bad_keep_probability() {
        assert!(Dropout::new(0.0).is_err());
        assert!(Dropout::new(-0.5).is_err());
        assert!(Dropout::new(1.5).is_err());
        assert!(Dropout::new(1.0).is_ok());
    }

    #[test]
    fn eval_mode_is_identity() {
        let mut dropout = Dropout::with_seed(0.5, 7).unwrap();
        dropout.evaluate();
        let x = array![[1.0, -2.0], [3.0, 4.0]];
        assert_eq!(dropout.forward(&x).unwrap(), x);

        let g = array![[0.1, 0.2], [0.3, 0.4]];
        assert_eq!(dropout.backward(&x, &g).unwrap(), g);
    }

    #[test]
    fn keep_everything_is_identity() {
        let mut dropout = Dropout::with_seed(1.0, 7).unwrap();
        let x = array![[1.0, -2.0], [3.0, 4.0]];
        assert_eq!(dropout.forward(&x).unwrap(), x);
    }

    #[test]
    fn backward_without_forward_fails() {
        let mut dropout = Dropout::with_seed(0.5, 7).unwrap();
        let x = array![[1.0, 2.0]];
        let g = array![[1.0, 1.0]];
        assert!(matches!(
            dropout.backward(&x, &g),
            Err(Error::MissingForwardState("Dropout"))
        ));
    }

    #[test]
    fn backward_reuses_forward_mask() {
        let mut dropout = Dropout::with_seed(0.5, 42).unwrap();
        let x = Array2::ones((4, 4));
        let y = dropout.forward(&x).unwrap();
        let g = Array2::ones((4, 4));
        let gi = dropout.backward(&x, &g).unwrap();
        // surviving positions match between output and gradient
        for (yv, gv) in y.iter().zip(gi.iter()) {
            assert_relative_eq!(*yv, *gv, epsilon = 1e-12);
        }
    }

    #[test]
    fn empirical_drop_fraction_approaches_one_minus_p() {
        let p = 0.7;
        let mut dropout = Dropout::with_seed(p, 1234).unwrap();
        let x = Array2::ones((200, 200));
        let y = dropout.forward(&x).unwrap();
        let zeroed = y.iter().filter(|&&v| v == 0.0).count() as f64;
        let fraction = zeroed / y.len() as f64;
        assert_relative_eq!(fraction, 1.0 - p, epsilon = 0.02);
    }

    #[test]
    fn survivors_are_rescaled() {
        let p = 0.5;
        let mut dropout = Dropout::with_seed(p, 99).unwrap();
        let x = Array2::ones((10, 10));
        let y = dropout.forward(&x).unwrap();
        assert!(y.iter().all(|&v| v == 0.0 || (v - 1.0 / p).abs() < 1e-12));
    }
}
