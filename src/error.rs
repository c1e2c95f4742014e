//! Error types for the ReplicaPool Operator

use thiserror::Error;

/// Result type alias using the operator's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Operator error types
#[derive(Error, Debug)]
pub enum Error {
    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Pod selected for deletion could not be found
    #[error("Pod not found: {0}")]
    UnitNotFound(String),

    /// Owner reference could not be established
    #[error("Ownership error: {0}")]
    Ownership(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The reconcile pass was cancelled before completion
    #[error("Reconciliation cancelled")]
    Cancelled,
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    /// Create an ownership error
    pub fn ownership(msg: impl Into<String>) -> Self {
        Error::Ownership(msg.into())
    }
}
