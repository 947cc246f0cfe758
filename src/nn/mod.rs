//! Neural network building blocks
//!
//! Composable layers with hand-derived forward and backward passes:
//! - The [`Module`] trait: the forward/backward contract every layer obeys
//! - Parametric layers ([`Linear`], [`ChannelwiseScaling`])
//! - Activations ([`ReLU`], [`LeakyReLU`], [`Elu`], [`SoftPlus`], [`Sigmoid`])
//! - Normalization and regularization ([`BatchNormalization`], [`Dropout`],
//!   [`SoftMax`], [`LogSoftMax`])
//! - The [`Sequential`] container that chains layers
//! - Loss criteria ([`MseCriterion`], [`ClassNllCriterion`],
//!   [`ClassNllCriterionUnstable`])

pub mod activation;
pub mod batchnorm;
pub mod dropout;
pub mod linear;
pub mod loss;
pub mod module;
pub mod sequential;
pub mod softmax;

pub use activation::{Elu, LeakyReLU, ReLU, Sigmoid, SoftPlus};
pub use batchnorm::{BatchNormalization, ChannelwiseScaling};
pub use dropout::Dropout;
pub use linear::Linear;
pub use loss::{ClassNllCriterion, ClassNllCriterionUnstable, Criterion, MseCriterion};
pub use module::{Module, ParamGrad};
pub use sequential::Sequential;
pub use softmax::{LogSoftMax, SoftMax};
