//! Error types for the RL core library

use thiserror::Error;

/// Core error type for RL operations
#[derive(Error, Debug)]
pub enum RLError {
    /// Malformed argument (out-of-range action, bad configuration, ...)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// State vector has the wrong number of dimensions
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected dimension
        expected: usize,
        /// Actual dimension
        actual: usize,
    },

    /// Capability that the receiver does not provide
    #[error("Not implemented: {0}")]
    NotImplemented(&'static str),

    /// Environment-related errors
    #[error("Environment error: {0}")]
    Environment(String),

    /// Computation error
    #[error("Computation error: {0}")]
    Computation(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RLError {
    /// True for every flavour of malformed caller input.
    #[must_use]
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument(_) | Self::DimensionMismatch { .. })
    }
}

/// Result type alias for RL operations
pub type Result<T> = std::result::Result<T, RLError>;
