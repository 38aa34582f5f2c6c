//! Error types for the Trellis provisioner core

use thiserror::Error;

/// Main error type for Trellis operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// Bootstrap token generation failed (bad or exhausted randomness)
    #[error("unable to create bootstrap token: {0}")]
    TokenGeneration(String),

    /// Control plane lookup error (none resolvable for the cluster)
    #[error("control plane error: {0}")]
    ControlPlane(String),

    /// Creating the bootstrap token secret failed with a non-conflict error
    #[error("unable to create bootstrap token secret: {0}")]
    CredentialCreate(#[source] kube::Error),

    /// Updating the bootstrap token secret failed after a creation conflict
    #[error("unable to update bootstrap token secret: {0}")]
    CredentialUpdate(#[source] kube::Error),

    /// Kubeconfig parsing or client construction error
    #[error("kubeconfig error: {0}")]
    Kubeconfig(String),

    /// Validation error for CRD specs or malformed secrets
    #[error("validation error: {0}")]
    Validation(String),
}

impl Error {
    /// Create a token generation error with the given message
    pub fn token_generation(msg: impl Into<String>) -> Self {
        Self::TokenGeneration(msg.into())
    }

    /// Create a control plane error with the given message
    pub fn control_plane(msg: impl Into<String>) -> Self {
        Self::ControlPlane(msg.into())
    }

    /// Create a kubeconfig error with the given message
    pub fn kubeconfig(msg: impl Into<String>) -> Self {
        Self::Kubeconfig(msg.into())
    }

    /// Create a validation error with the given message
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}
