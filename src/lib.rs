//! # Modular feedforward neural networks
//!
//! This library provides composable neural network layers with
//! hand-derived backpropagation over [`ndarray`] matrices. A model is a
//! [`Sequential`] chain of layers; training is a plain loop of
//! zero-gradients, forward, loss, backward, optimizer step, all driven by
//! the caller.
//!
//! ## Modules
//!
//! - `nn` - Layers, the `Module` trait, the `Sequential` container and
//!   loss criteria
//! - `optim` - Gradient-descent parameter updates
//! - `error` - Error types
//!
//! ## Example
//!
//! ```
//! use ndarray::array;
//! use rust_nn_modules::nn::{Criterion, Linear, Module, MseCriterion, ReLU, Sequential};
//! use rust_nn_modules::optim::Sgd;
//!
//! let mut model = Sequential::new()
//!     .add(Linear::new(2, 8))
//!     .add(ReLU::new())
//!     .add(Linear::new(8, 1));
//! let mut criterion = MseCriterion::new();
//! let mut sgd = Sgd::new(0.01);
//!
//! let x = array![[0.0, 1.0], [1.0, 0.0]];
//! let t = array![[1.0], [0.0]];
//!
//! model.zero_grad_parameters();
//! let prediction = model.forward(&x)?;
//! let loss = criterion.forward(&prediction, &t)?;
//! let grad = criterion.backward(&prediction, &t)?;
//! model.backward(&x, &grad)?;
//! sgd.step(&mut model);
//! # assert!(loss.is_finite());
//! # Ok::<(), rust_nn_modules::Error>(())
//! ```

pub mod error;
pub mod nn;
pub mod optim;

pub use error::{Error, Result};
pub use nn::{Criterion, Module, Sequential};
pub use optim::Sgd;
