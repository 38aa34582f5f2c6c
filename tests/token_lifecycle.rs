//! In-process integration tests for the bootstrap token lifecycle
//!
//! These wire the token cache to in-memory collaborators and drive the full
//! issuance pipeline through the public API: locate the control plane, mint
//! a token, persist it as a bootstrap-token secret, and cache it back onto
//! the cluster record. No Kubernetes cluster is required.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::Secret;

use trellis::crd::{ProviderSpec, TrellisCluster, TrellisClusterSpec};
use trellis::token::cache::{
    ClusterWriter, ControlPlaneLocator, KubeconfigSource, TokenCache, TokenCacheConfig,
};
use trellis::token::secret::{
    upsert_credential, CredentialRecord, CredentialStore, SecretWriter, TOKEN_ID_KEY,
};
use trellis::{Result, TOKEN_ANNOTATION, TOKEN_EXPIRY_ANNOTATION};

/// In-memory stand-in for the target cluster's secret store
#[derive(Default)]
struct InMemorySecrets {
    records: Mutex<HashMap<String, Secret>>,
}

#[async_trait]
impl SecretWriter for InMemorySecrets {
    async fn create(&self, secret: &Secret) -> std::result::Result<(), kube::Error> {
        let name = secret.metadata.name.clone().expect("secret has a name");
        let mut records = self.records.lock().expect("lock");
        if records.contains_key(&name) {
            return Err(kube::Error::Api(kube::core::ErrorResponse {
                status: "Failure".to_string(),
                message: format!("secrets \"{name}\" already exists"),
                reason: "AlreadyExists".to_string(),
                code: 409,
            }));
        }
        records.insert(name, secret.clone());
        Ok(())
    }

    async fn replace(&self, name: &str, secret: &Secret) -> std::result::Result<(), kube::Error> {
        self.records
            .lock()
            .expect("lock")
            .insert(name.to_string(), secret.clone());
        Ok(())
    }
}

/// [`CredentialStore`] routing upserts into the in-memory secret store,
/// recording each connection descriptor it was handed
struct InMemoryStore {
    secrets: Arc<InMemorySecrets>,
    kubeconfigs_seen: Mutex<Vec<String>>,
}

#[async_trait]
impl CredentialStore for InMemoryStore {
    async fn upsert(&self, kubeconfig: &str, record: &CredentialRecord) -> Result<()> {
        self.kubeconfigs_seen
            .lock()
            .expect("lock")
            .push(kubeconfig.to_string());
        upsert_credential(self.secrets.as_ref(), record).await
    }
}

struct StaticControlPlane(Vec<String>);

#[async_trait]
impl ControlPlaneLocator for StaticControlPlane {
    async fn control_plane_machines(&self, _cluster: &TrellisCluster) -> Result<Vec<String>> {
        Ok(self.0.clone())
    }
}

struct StaticKubeconfig(&'static str);

#[async_trait]
impl KubeconfigSource for StaticKubeconfig {
    async fn admin_kubeconfig(&self, _cluster: &TrellisCluster) -> Result<String> {
        Ok(self.0.to_string())
    }
}

/// [`ClusterWriter`] capturing the last record written back
#[derive(Default)]
struct RecordingClusterWriter {
    written: Mutex<Option<TrellisCluster>>,
}

#[async_trait]
impl ClusterWriter for RecordingClusterWriter {
    async fn update(&self, cluster: &TrellisCluster) -> Result<()> {
        *self.written.lock().expect("lock") = Some(cluster.clone());
        Ok(())
    }
}

fn test_cluster() -> TrellisCluster {
    let spec = TrellisClusterSpec {
        provider: ProviderSpec {
            server: "vcenter.example.com".to_string(),
            datacenter: Some("dc-east".to_string()),
            credentials_secret: Some("vsphere-creds".to_string()),
            username: None,
            password: None,
        },
        ssh_key_secret: None,
    };
    let mut cluster = TrellisCluster::new("prod-east", spec);
    cluster.metadata.namespace = Some("default".to_string());
    cluster
}

/// Story: A full issuance pass mints, persists, and caches one token
///
/// The returned token, the durable secret, and the cached annotation must
/// all agree, and a second pass over the updated record must reuse the
/// token without touching the store again.
#[tokio::test]
async fn story_full_lifecycle_mints_persists_and_caches() {
    let secrets = Arc::new(InMemorySecrets::default());
    let store = Arc::new(InMemoryStore {
        secrets: secrets.clone(),
        kubeconfigs_seen: Mutex::new(Vec::new()),
    });
    let writer = Arc::new(RecordingClusterWriter::default());

    let cache = TokenCache::with_collaborators(
        Arc::new(StaticControlPlane(vec!["prod-east-cp-0".to_string()])),
        Arc::new(StaticKubeconfig("apiVersion: v1\nkind: Config")),
        store.clone(),
        writer.clone(),
        TokenCacheConfig::default(),
    );

    let token = cache
        .get_or_create(&test_cluster())
        .await
        .expect("issuance should succeed");

    // The durable record is keyed by the token's public identifier
    let (id, _) = token.split_once('.').expect("token has id.secret shape");
    let records = secrets.records.lock().expect("lock");
    assert_eq!(records.len(), 1);
    let secret = records
        .get(&format!("bootstrap-token-{id}"))
        .expect("secret named by the token id");
    let stored_id = secret.data.as_ref().expect("data").get(TOKEN_ID_KEY).expect("token-id");
    assert_eq!(stored_id.0, id.as_bytes());
    drop(records);

    // The store was reached through the admin kubeconfig
    let seen = store.kubeconfigs_seen.lock().expect("lock");
    assert_eq!(seen.as_slice(), ["apiVersion: v1\nkind: Config"]);
    drop(seen);

    // The cached annotations agree with the returned token
    let updated = writer
        .written
        .lock()
        .expect("lock")
        .clone()
        .expect("cluster record written back");
    let annotations = updated.metadata.annotations.clone().expect("annotations");
    assert_eq!(annotations.get(TOKEN_ANNOTATION), Some(&token));
    let expiry = DateTime::parse_from_rfc3339(
        annotations.get(TOKEN_EXPIRY_ANNOTATION).expect("expiry"),
    )
    .expect("RFC3339 expiry")
    .with_timezone(&Utc);
    assert!(expiry > Utc::now(), "expiry must be in the future");

    // A second pass over the updated record is a pure cache hit
    let again = cache
        .get_or_create(&updated)
        .await
        .expect("cache hit should succeed");
    assert_eq!(again, token);
    assert_eq!(
        secrets.records.lock().expect("lock").len(),
        1,
        "cache hit must not touch the store"
    );
}

/// Story: Re-issuing over a leftover record converges instead of failing
///
/// If a prior pass persisted a record but lost the cache write, the next
/// mint may collide on the secret name; the upsert path absorbs this and
/// the store ends up holding the fresh payload.
#[tokio::test]
async fn story_reissue_over_existing_record_converges() {
    let secrets = InMemorySecrets::default();

    let expiration = Utc::now() + chrono::Duration::seconds(3600);
    let stale = CredentialRecord {
        token_id: "abc123".to_string(),
        token_secret: "staletoken0000000".to_string(),
        expiration: expiration - chrono::Duration::seconds(1800),
    };
    let fresh = CredentialRecord {
        token_id: "abc123".to_string(),
        token_secret: "freshtoken0000000".to_string(),
        expiration,
    };

    upsert_credential(&secrets, &stale)
        .await
        .expect("first upsert");
    upsert_credential(&secrets, &fresh)
        .await
        .expect("colliding upsert should converge");

    let records = secrets.records.lock().expect("lock");
    assert_eq!(records.len(), 1);
    let secret = records.get("bootstrap-token-abc123").expect("record");
    let stored = secret
        .data
        .as_ref()
        .expect("data")
        .get("token-secret")
        .expect("token-secret");
    assert_eq!(stored.0, b"freshtoken0000000");
}
