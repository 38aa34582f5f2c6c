//! Trellis - provisioner core for VM-backed Kubernetes cluster lifecycle management
//!
//! Trellis manages the bootstrap-credential lifecycle for clusters whose nodes
//! are provisioned as virtual machines: it mints short-lived kubeadm join
//! tokens, persists them durably on the target control plane, and caches them
//! on the owning cluster record so reconciliation passes don't re-issue a
//! token on every pass.
//!
//! # Modules
//!
//! - [`crd`] - Custom Resource Definitions (TrellisCluster, TrellisMachine)
//! - [`token`] - Bootstrap token generation, persistence, and caching
//! - [`report`] - Standardized error reporting onto CRD statuses and events
//! - [`secrets`] - Namespaced secret lookups (SSH keys, kubeconfigs, provider credentials)
//! - [`error`] - Error types for the provisioner core

#![deny(missing_docs)]

pub mod crd;
pub mod error;
pub mod report;
pub mod secrets;
pub mod token;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

// =============================================================================
// Default Configuration Constants
// =============================================================================
// These constants define the default values used throughout Trellis.
// Centralizing them here ensures consistency across the token cache, the
// secret store adapter, and test fixtures.

/// Annotation key caching the current bootstrap token on a TrellisCluster
pub const TOKEN_ANNOTATION: &str = "trellis.dev/bootstrap-token";

/// Annotation key caching the bootstrap token expiry (RFC3339) on a TrellisCluster
pub const TOKEN_EXPIRY_ANNOTATION: &str = "trellis.dev/bootstrap-token-expiry";

/// Namespace where bootstrap token secrets live on the target cluster
pub const TOKEN_NAMESPACE: &str = "kube-system";

/// Default time-to-live for a freshly minted bootstrap token
pub const DEFAULT_TOKEN_TTL: std::time::Duration = std::time::Duration::from_secs(3600);

/// Minimum remaining lifetime below which a cached token is regenerated
///
/// A token handed to a slow-starting node must still be valid by the time the
/// node joins, so the cache refuses to return tokens closer to expiry than this.
pub const DEFAULT_TOKEN_MIN_LIFETIME: std::time::Duration = std::time::Duration::from_secs(600);

/// Field manager name used for Kubernetes API writes
pub const FIELD_MANAGER: &str = "trellis-controller";
