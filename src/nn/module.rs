//! Layer abstraction with forward and backward passes
//!
//! Every layer implements [`Module`]: a forward computation over a
//! `(batch, features)` matrix and the matching backward computation that
//! propagates the loss gradient to the layer's input and accumulates
//! gradients for any learnable parameters.

use ndarray::{Array2, ArrayViewD, ArrayViewMutD};

use crate::error::Result;

/// A mutable parameter view paired with the view of its accumulated gradient.
///
/// The two views always have equal shapes. Optimizers walk this list and
/// update each parameter in place from its gradient.
pub type ParamGrad<'a> = (ArrayViewMutD<'a, f64>, ArrayViewD<'a, f64>);

/// A composable forward/backward computation unit.
///
/// All data flowing between modules is `Array2<f64>` shaped
/// `(batch, features)`. Shape compatibility between consecutive modules is
/// the caller's responsibility; layers validate their own input dimension
/// where they have a fixed contract.
pub trait Module {
    /// Compute the layer output for a batch.
    fn forward(&mut self, input: &Array2<f64>) -> Result<Array2<f64>>;

    /// Propagate the gradient of the loss back through the layer.
    ///
    /// `input` must be the exact value passed to the most recent
    /// [`forward`](Module::forward) call on this module: the gradient
    /// formulas are local derivatives evaluated at that point. Parametric
    /// layers also accumulate into their parameter gradients here, so call
    /// [`zero_grad_parameters`](Module::zero_grad_parameters) between
    /// optimization steps.
    fn backward(&mut self, input: &Array2<f64>, grad_output: &Array2<f64>) -> Result<Array2<f64>>;

    /// Reset accumulated parameter gradients to zero. No-op for stateless layers.
    fn zero_grad_parameters(&mut self) {}

    /// Views of the learnable parameters, empty for stateless layers.
    fn parameters(&self) -> Vec<ArrayViewD<'_, f64>> {
        Vec::new()
    }

    /// Views of the accumulated parameter gradients, positionally aligned
    /// with [`parameters`](Module::parameters) and shape-equal entry by entry.
    fn grad_parameters(&self) -> Vec<ArrayViewD<'_, f64>> {
        Vec::new()
    }

    /// Parameter/gradient pairs for an optimizer to consume.
    fn params_and_grads(&mut self) -> Vec<ParamGrad<'_>> {
        Vec::new()
    }

    /// Switch to training mode. Only layers whose behavior depends on the
    /// mode (batch normalization, dropout, containers) override this.
    fn train(&mut self) {}

    /// Switch to inference mode.
    fn evaluate(&mut self) {}

    /// Current mode; layers without a mode report `true`.
    fn is_training(&self) -> bool {
        true
    }

    /// Layer name used in error messages.
    fn name(&self) -> &'static str;
}
