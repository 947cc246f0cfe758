//! Gradient-descent parameter updates
//!
//! The optimizer is decoupled from the layers: it walks the
//! parameter/gradient pairs a [`Module`] exposes and updates each
//! parameter in place. Pairs are positionally stable across calls, which
//! is what the momentum buffers rely on.

use ndarray::ArrayD;
use tracing::debug;

use crate::nn::module::Module;

/// Stochastic gradient descent with optional momentum.
pub struct Sgd {
    learning_rate: f64,
    momentum: f64,
    /// One velocity buffer per parameter, lazily shaped on the first step.
    velocity: Vec<ArrayD<f64>>,
}

impl Sgd {
    pub fn new(learning_rate: f64) -> Self {
        Self {
            learning_rate,
            momentum: 0.0,
            velocity: Vec::new(),
        }
    }

    pub fn with_momentum(mut self, momentum: f64) -> Self {
        self.momentum = momentum;
        self
    }

    /// Apply one update from the gradients currently accumulated in `model`.
    ///
    /// The caller owns the cycle: zero gradients, forward, backward, step.
    pub fn step(&mut self, model: &mut dyn Module) {
        let pairs = model.params_and_grads();

        if self.momentum > 0.0 {
            if self.velocity.len() != pairs.len() {
                debug!(parameters = pairs.len(), "allocating momentum buffers");
                self.velocity = pairs
                    .iter()
                    .map(|(param, _)| ArrayD::zeros(param.raw_dim()))
                    .collect();
            }
            for ((mut param, grad), velocity) in pairs.into_iter().zip(&mut self.velocity) {
                *velocity = &*velocity * self.momentum - &(&grad * self.learning_rate);
                param += &*velocity;
            }
        } else {
            for (mut param, grad) in pairs {
                param.scaled_add(-self.learning_rate, &grad);
            }
        }
    }

    /// Drop momentum state, e.g. before reusing the optimizer on a new model.
    pub fn reset(&mut self) {
        self.velocity.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nn::linear::Linear;
    use crate::nn::Module;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn plain_sgd_moves_against_gradient() {
        let mut layer = Linear::from_parts(array![[1.0, 1.0]], array![0.0]).unwrap();
        let x = array![[1.0, 2.0]];
        let g = array![[1.0]];
        layer.forward(&x).unwrap();
        layer.backward(&x, &g).unwrap();

        let mut sgd = Sgd::new(0.1);
        sgd.step(&mut layer);

        // grad_weight = [[1, 2]], grad_bias = [1]
        assert_relative_eq!(layer.weight()[[0, 0]], 0.9, epsilon = 1e-12);
        assert_relative_eq!(layer.weight()[[0, 1]], 0.8, epsilon = 1e-12);
        assert_relative_eq!(layer.bias()[0], -0.1, epsilon = 1e-12);
    }

    #[test]
    fn momentum_accumulates_velocity() {
        let mut layer = Linear::from_parts(array![[1.0]], array![0.0]).unwrap();
        let x = array![[1.0]];
        let g = array![[1.0]];
        let mut sgd = Sgd::new(0.1).with_momentum(0.9);

        // constant gradient of 1 for the weight
        layer.forward(&x).unwrap();
        layer.backward(&x, &g).unwrap();
        sgd.step(&mut layer);
        let after_first = layer.weight()[[0, 0]];
        assert_relative_eq!(after_first, 0.9, epsilon = 1e-12);

        layer.zero_grad_parameters();
        layer.forward(&x).unwrap();
        layer.backward(&x, &g).unwrap();
        sgd.step(&mut layer);
        // v = 0.9 * (-0.1) - 0.1 = -0.19
        assert_relative_eq!(layer.weight()[[0, 0]], after_first - 0.19, epsilon = 1e-12);
    }

    #[test]
    fn training_reduces_mse_on_line_fit() {
        use crate::nn::loss::{Criterion, MseCriterion};
        use crate::nn::Sequential;

        let mut model = Sequential::new().add(Linear::new(1, 1));
        let mut criterion = MseCriterion::new();
        let mut sgd = Sgd::new(0.05).with_momentum(0.5);

        let x = array![[0.0], [1.0], [2.0], [3.0]];
        let t = array![[1.0], [3.0], [5.0], [7.0]];

        let first = {
            let pred = model.forward(&x).unwrap();
            criterion.forward(&pred, &t).unwrap()
        };
        for _ in 0..200 {
            model.zero_grad_parameters();
            let pred = model.forward(&x).unwrap();
            let grad = criterion.backward(&pred, &t).unwrap();
            model.backward(&x, &grad).unwrap();
            sgd.step(&mut model);
        }
        let pred = model.forward(&x).unwrap();
        let last = criterion.forward(&pred, &t).unwrap();
        assert!(last < first);
        assert!(last < 1e-2);
    }
}
