//! Expiry-stamped bootstrap token cache on the cluster record
//!
//! The current token and its expiry live as annotations on the owning
//! [`TrellisCluster`], so repeated reconciliation passes within the TTL
//! window reuse the token instead of minting a new one. The cache write is a
//! performance optimization, not a correctness requirement: if it fails, the
//! freshly minted token is still valid (it is already durably stored on the
//! target cluster) and is returned anyway.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use kube::api::{Api, ListParams, PostParams};
use kube::{Client, ResourceExt};
use tracing::{debug, info, warn};

#[cfg(test)]
use mockall::automock;

use super::generate::BootstrapToken;
use super::secret::{BootstrapSecretStore, CredentialRecord, CredentialStore};
use crate::crd::{TrellisCluster, TrellisMachine};
use crate::{
    Error, Result, DEFAULT_TOKEN_MIN_LIFETIME, DEFAULT_TOKEN_TTL, TOKEN_ANNOTATION,
    TOKEN_EXPIRY_ANNOTATION,
};

/// Resolves which machines currently serve a cluster's control plane
///
/// Token minting requires administrative access to the control plane, so the
/// cache refuses to mint for clusters without one.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ControlPlaneLocator: Send + Sync {
    /// Names of the cluster's control-plane machines (may be empty)
    async fn control_plane_machines(&self, cluster: &TrellisCluster) -> Result<Vec<String>>;
}

/// Resolves the administrative connection descriptor for a cluster
#[cfg_attr(test, automock)]
#[async_trait]
pub trait KubeconfigSource: Send + Sync {
    /// Admin kubeconfig for the cluster's control plane
    async fn admin_kubeconfig(&self, cluster: &TrellisCluster) -> Result<String>;
}

/// Pushes an updated cluster record back to the API server
///
/// The update carries the snapshot's resource version, so a concurrent
/// writer makes it fail with a stale-version conflict. The cache does not
/// retry: the next reconciliation pass sees fresh state.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterWriter: Send + Sync {
    /// Replace the cluster record with the given copy
    async fn update(&self, cluster: &TrellisCluster) -> Result<()>;
}

/// Tunables for the token cache
#[derive(Debug, Clone)]
pub struct TokenCacheConfig {
    /// Time-to-live stamped onto freshly minted tokens
    pub ttl: Duration,
    /// Minimum remaining lifetime below which a cached token is regenerated
    pub min_token_lifetime: Duration,
}

impl Default for TokenCacheConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TOKEN_TTL,
            min_token_lifetime: DEFAULT_TOKEN_MIN_LIFETIME,
        }
    }
}

/// Bootstrap token cache over a cluster's annotations
///
/// All collaborators are explicit injected dependencies; there are no
/// process-wide clients behind this type.
pub struct TokenCache {
    locator: Arc<dyn ControlPlaneLocator>,
    kubeconfigs: Arc<dyn KubeconfigSource>,
    store: Arc<dyn CredentialStore>,
    clusters: Arc<dyn ClusterWriter>,
    config: TokenCacheConfig,
}

impl TokenCache {
    /// Create a cache wired to a Kubernetes client
    pub fn new(client: Client, config: TokenCacheConfig) -> Self {
        Self::with_collaborators(
            Arc::new(MachineLocatorImpl::new(client.clone())),
            Arc::new(KubeconfigSecretSource::new(client.clone())),
            Arc::new(BootstrapSecretStore),
            Arc::new(ClusterWriterImpl::new(client)),
            config,
        )
    }

    /// Create a cache with explicit collaborators
    pub fn with_collaborators(
        locator: Arc<dyn ControlPlaneLocator>,
        kubeconfigs: Arc<dyn KubeconfigSource>,
        store: Arc<dyn CredentialStore>,
        clusters: Arc<dyn ClusterWriter>,
        config: TokenCacheConfig,
    ) -> Self {
        Self {
            locator,
            kubeconfigs,
            store,
            clusters,
            config,
        }
    }

    /// Return the cluster's bootstrap token, minting a new one if needed
    ///
    /// A cached token is returned unchanged (no network calls) while its
    /// remaining lifetime exceeds the configured floor. Otherwise a new token
    /// is generated, persisted on the target control plane, and cached back
    /// onto the cluster record. Fails only when no control plane is
    /// resolvable, credential retrieval fails, or minting/persistence fails;
    /// a failed cache write is logged and swallowed.
    pub async fn get_or_create(&self, cluster: &TrellisCluster) -> Result<String> {
        let now = Utc::now();

        if let Some(token) = cached_token(cluster, self.config.min_token_lifetime, now) {
            debug!(cluster = %cluster.name_any(), "Returning cached bootstrap token");
            return Ok(token);
        }

        let machines = self.locator.control_plane_machines(cluster).await?;
        if machines.is_empty() {
            return Err(Error::control_plane("no control plane machines available"));
        }

        let kubeconfig = self.kubeconfigs.admin_kubeconfig(cluster).await?;

        let token = BootstrapToken::generate()?;
        let expiry = now + chrono::Duration::seconds(self.config.ttl.as_secs() as i64);
        let record = CredentialRecord::new(&token, expiry);
        self.store.upsert(&kubeconfig, &record).await?;

        info!(
            cluster = %cluster.name_any(),
            token_id = %token.id(),
            "Minted new bootstrap token"
        );

        // The cached expiry may trail the stored record by a moment; the
        // minimum-lifetime check absorbs the skew.
        let mut updated = cluster.clone();
        let annotations = updated.metadata.annotations.get_or_insert_with(Default::default);
        annotations.insert(TOKEN_ANNOTATION.to_string(), token.to_string());
        annotations.insert(
            TOKEN_EXPIRY_ANNOTATION.to_string(),
            expiry.to_rfc3339_opts(SecondsFormat::Secs, true),
        );

        if let Err(e) = self.clusters.update(&updated).await {
            // Losing the cache only costs an extra generation next pass; the
            // token itself is already durably stored.
            warn!(
                cluster = %cluster.name_any(),
                error = %e,
                "Could not cache bootstrap token on cluster object"
            );
        }

        Ok(token.to_string())
    }
}

/// Read the cached token if its remaining lifetime clears the floor
///
/// An unparsable expiry is treated as absent, forcing regeneration rather
/// than failing the call.
fn cached_token(
    cluster: &TrellisCluster,
    min_lifetime: Duration,
    now: DateTime<Utc>,
) -> Option<String> {
    let annotations = cluster.metadata.annotations.as_ref()?;
    let token = annotations.get(TOKEN_ANNOTATION)?;
    let expiry = annotations.get(TOKEN_EXPIRY_ANNOTATION)?;

    let expiry = DateTime::parse_from_rfc3339(expiry).ok()?.with_timezone(&Utc);

    // A negative remainder collapses to zero and fails the floor check
    let remaining = (expiry - now).to_std().unwrap_or_default();
    if remaining > min_lifetime {
        Some(token.clone())
    } else {
        None
    }
}

/// [`ControlPlaneLocator`] listing TrellisMachines in the cluster's namespace
pub struct MachineLocatorImpl {
    client: Client,
}

impl MachineLocatorImpl {
    /// Create a locator wrapping the given kube Client
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ControlPlaneLocator for MachineLocatorImpl {
    async fn control_plane_machines(&self, cluster: &TrellisCluster) -> Result<Vec<String>> {
        let namespace = cluster.namespace().unwrap_or_else(|| "default".to_string());
        let api: Api<TrellisMachine> = Api::namespaced(self.client.clone(), &namespace);
        let machines = api.list(&ListParams::default()).await?;

        let cluster_name = cluster.name_any();
        let names = machines
            .items
            .iter()
            .filter(|m| m.spec.cluster == cluster_name && m.spec.is_control_plane())
            .map(|m| m.name_any())
            .collect();

        Ok(names)
    }
}

/// [`KubeconfigSource`] reading the cluster's admin kubeconfig secret
pub struct KubeconfigSecretSource {
    client: Client,
}

impl KubeconfigSecretSource {
    /// Create a source wrapping the given kube Client
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl KubeconfigSource for KubeconfigSecretSource {
    async fn admin_kubeconfig(&self, cluster: &TrellisCluster) -> Result<String> {
        crate::secrets::admin_kubeconfig(&self.client, cluster).await
    }
}

/// [`ClusterWriter`] replacing the record through the API server
pub struct ClusterWriterImpl {
    client: Client,
}

impl ClusterWriterImpl {
    /// Create a writer wrapping the given kube Client
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ClusterWriter for ClusterWriterImpl {
    async fn update(&self, cluster: &TrellisCluster) -> Result<()> {
        let namespace = cluster.namespace().unwrap_or_else(|| "default".to_string());
        let api: Api<TrellisCluster> = Api::namespaced(self.client.clone(), &namespace);

        // replace() carries the snapshot's resourceVersion: a concurrent
        // writer turns this into a 409 the caller treats as "try next pass"
        api.replace(&cluster.name_any(), &PostParams::default(), cluster)
            .await?;
        Ok(())
    }
}
