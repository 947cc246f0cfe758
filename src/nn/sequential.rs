//! Sequential container
//!
//! Chains layers into a pipeline: the output of stage `i` feeds stage
//! `i + 1`. The container caches every stage output during the forward
//! pass so that the backward pass can hand each layer the exact input it
//! saw going forward; the first layer is the exception and receives the
//! chain's external input.

use ndarray::Array2;
use tracing::trace;

use crate::error::{Error, Result};
use crate::nn::module::{Module, ParamGrad};

/// An ordered chain of boxed layers, itself a [`Module`] so chains nest.
pub struct Sequential {
    layers: Vec<Box<dyn Module>>,
    /// Output of each stage from the most recent forward pass.
    stage_outputs: Vec<Array2<f64>>,
    training: bool,
}

impl Default for Sequential {
    fn default() -> Self {
        Self::new()
    }
}

impl Sequential {
    pub fn new() -> Self {
        Self {
            layers: Vec::new(),
            stage_outputs: Vec::new(),
            training: true,
        }
    }

    /// Append a layer; builder style, so chains read top to bottom.
    pub fn add(mut self, layer: impl Module + 'static) -> Self {
        self.push(layer);
        self
    }

    /// Append a layer to an existing container.
    pub fn push(&mut self, layer: impl Module + 'static) {
        self.layers.push(Box::new(layer));
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Output of stage `index` from the most recent forward pass.
    pub fn stage_output(&self, index: usize) -> Option<&Array2<f64>> {
        self.stage_outputs.get(index)
    }
}

impl Module for Sequential {
    fn forward(&mut self, input: &Array2<f64>) -> Result<Array2<f64>> {
        if self.layers.is_empty() {
            return Err(Error::EmptyContainer("Sequential"));
        }
        trace!(layers = self.layers.len(), batch = input.nrows(), "sequential forward");
        self.stage_outputs.clear();
        let mut current = input.clone();
        for layer in &mut self.layers {
            current = layer.forward(&current)?;
            self.stage_outputs.push(current.clone());
        }
        Ok(current)
    }

    /// Walks the chain last to first. Stage `i > 0` is differentiated at the
    /// cached output of stage `i - 1`; stage 0 is differentiated at the
    /// chain's original `input`. A forward pass must directly precede this
    /// call so the cached outputs are current.
    fn backward(&mut self, input: &Array2<f64>, grad_output: &Array2<f64>) -> Result<Array2<f64>> {
        if self.layers.is_empty() {
            return Err(Error::EmptyContainer("Sequential"));
        }
        if self.stage_outputs.len() != self.layers.len() {
            return Err(Error::MissingForwardState("Sequential"));
        }
        trace!(layers = self.layers.len(), "sequential backward");
        let mut grad = grad_output.clone();
        for i in (0..self.layers.len()).rev() {
            let layer_input = if i == 0 {
                input
            } else {
                &self.stage_outputs[i - 1]
            };
            grad = self.layers[i].backward(layer_input, &grad)?;
        }
        Ok(grad)
    }

    fn zero_grad_parameters(&mut self) {
        for layer in &mut self.layers {
            layer.zero_grad_parameters();
        }
    }

    fn parameters(&self) -> Vec<ndarray::ArrayViewD<'_, f64>> {
        self.layers
            .iter()
            .flat_map(|layer| layer.parameters())
            .collect()
    }

    fn grad_parameters(&self) -> Vec<ndarray::ArrayViewD<'_, f64>> {
        self.layers
            .iter()
            .flat_map(|layer| layer.grad_parameters())
            .collect()
    }

    fn params_and_grads(&mut self) -> Vec<ParamGrad<'_>> {
        self.layers
            .iter_mut()
            .flat_map(|layer| layer.params_and_grads())
            .collect()
    }

    fn train(&mut self) {
        self.training = true;
        for layer in &mut self.layers {
            layer.train();
        }
    }

    fn evaluate(&mut self) {
        self.training = false;
        for layer in &mut self.layers {
            layer.evaluate();
        }
    }

    fn is_training(&self) -> bool {
        self.training
    }

    fn name(&self) -> &'static str {
        "Sequential"
    }
}
