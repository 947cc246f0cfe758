//! Error types for the neural network library

use thiserror::Error;

/// Result type alias for this crate
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum Error {
    /// Input dimensions incompatible with a layer's contract
    #[error("shape mismatch in {layer}: expected {expected}, got {actual}")]
    ShapeMismatch {
        layer: &'static str,
        expected: String,
        actual: String,
    },

    /// Backward called without a matching forward pass
    #[error("backward called on {0} without a matching forward pass")]
    MissingForwardState(&'static str),

    /// Forward/backward called on a container with no layers
    #[error("{0} has no layers")]
    EmptyContainer(&'static str),

    /// Invalid constructor argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl Error {
    /// Shorthand for a shape mismatch against a `(batch, features)` input.
    pub(crate) fn shape(layer: &'static str, expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Error::ShapeMismatch {
            layer,
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}
