//! Bootstrap token lifecycle: generation, durable persistence, and caching
//!
//! A bootstrap token is the short-lived shared secret a freshly provisioned
//! node presents to join its cluster's control plane. Trellis never re-issues
//! a token on every reconciliation pass; instead the current token and its
//! expiry are cached as annotations on the owning [`TrellisCluster`] and only
//! regenerated once the remaining lifetime drops below a floor.
//!
//! # Token Flow
//!
//! 1. Reconciler asks [`cache::TokenCache::get_or_create`] for a token
//! 2. Cache hit with enough remaining lifetime → cached value, no network
//! 3. Otherwise: locate the control plane, fetch the admin kubeconfig,
//!    [`generate`] a new token, [`secret`] persists it on the target cluster
//! 4. The new token + expiry are written back onto the cluster record
//!    (best-effort; a failed cache write only costs a regeneration later)
//!
//! [`TrellisCluster`]: crate::crd::TrellisCluster

pub mod cache;
pub mod generate;
pub mod secret;

pub use cache::{TokenCache, TokenCacheConfig};
pub use generate::BootstrapToken;
pub use secret::CredentialRecord;
