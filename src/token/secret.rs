//! Durable persistence of bootstrap tokens as credential secrets
//!
//! The public token identifier names a Secret (`bootstrap-token-<id>`) in the
//! target cluster's `kube-system` namespace. The field keys and the RFC3339
//! expiration format are a fixed external contract: the control plane and
//! other consumers of the store read these exact names.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use kube::api::{Api, PostParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};

#[cfg(test)]
use mockall::automock;

use super::generate::BootstrapToken;
use crate::{Error, TOKEN_NAMESPACE};

/// Secret type marking a credential record as a bootstrap token
pub const BOOTSTRAP_TOKEN_SECRET_TYPE: &str = "bootstrap.kubernetes.io/token";

/// Field key for the public token identifier
pub const TOKEN_ID_KEY: &str = "token-id";
/// Field key for the private token secret
pub const TOKEN_SECRET_KEY: &str = "token-secret";
/// Field key for the RFC3339 expiration timestamp
pub const EXPIRATION_KEY: &str = "expiration";
/// Field key enabling the token for node authentication
pub const USAGE_AUTHENTICATION_KEY: &str = "usage-bootstrap-authentication";
/// Field key enabling the token for signing cluster-info
pub const USAGE_SIGNING_KEY: &str = "usage-bootstrap-signing";
/// Field key listing the groups joined nodes authenticate as
pub const EXTRA_GROUPS_KEY: &str = "auth-extra-groups";
/// Field key for the human-readable record description
pub const DESCRIPTION_KEY: &str = "description";

/// Default group list for nodes joining with a trellis-issued token
const DEFAULT_EXTRA_GROUPS: &str = "system:bootstrappers:kubeadm:default-node-token";
/// Default description stamped onto every credential record
const DEFAULT_DESCRIPTION: &str = "bootstrap token generated by trellis";

/// The durable, store-persisted representation of a bootstrap token
///
/// Maps the public identifier to the secret, expiration, and fixed usage
/// metadata. Created on first issuance and updated in place on re-issuance
/// with the same identifier; never deleted by this core (the store's own
/// TTL handling garbage-collects expired records).
#[derive(Clone, Debug, PartialEq)]
pub struct CredentialRecord {
    /// Public identifier naming the record
    pub token_id: String,
    /// Private secret authenticating against the record
    pub token_secret: String,
    /// When the token stops being accepted
    pub expiration: DateTime<Utc>,
}

impl CredentialRecord {
    /// Build a record for a freshly generated token
    pub fn new(token: &BootstrapToken, expiration: DateTime<Utc>) -> Self {
        Self {
            token_id: token.id().to_string(),
            token_secret: token.secret().to_string(),
            expiration,
        }
    }

    /// Name of the Secret holding this record
    pub fn secret_name(&self) -> String {
        format!("bootstrap-token-{}", self.token_id)
    }

    /// Render the record as a bootstrap-token Secret
    ///
    /// Authentication and signing usage are always enabled; group list and
    /// description are fixed. Field keys must not change: external consumers
    /// of the store read these exact names.
    pub fn to_secret(&self) -> Secret {
        let field = |v: &str| ByteString(v.as_bytes().to_vec());

        let data = BTreeMap::from([
            (TOKEN_ID_KEY.to_string(), field(&self.token_id)),
            (TOKEN_SECRET_KEY.to_string(), field(&self.token_secret)),
            (
                EXPIRATION_KEY.to_string(),
                field(&self.expiration.to_rfc3339_opts(SecondsFormat::Secs, true)),
            ),
            (USAGE_AUTHENTICATION_KEY.to_string(), field("true")),
            (USAGE_SIGNING_KEY.to_string(), field("true")),
            (EXTRA_GROUPS_KEY.to_string(), field(DEFAULT_EXTRA_GROUPS)),
            (DESCRIPTION_KEY.to_string(), field(DEFAULT_DESCRIPTION)),
        ]);

        Secret {
            metadata: ObjectMeta {
                name: Some(self.secret_name()),
                namespace: Some(TOKEN_NAMESPACE.to_string()),
                ..Default::default()
            },
            type_: Some(BOOTSTRAP_TOKEN_SECRET_TYPE.to_string()),
            data: Some(data),
            ..Default::default()
        }
    }
}

/// Low-level secret write operations against the remote store
///
/// This trait is the seam between the upsert logic and the Kubernetes
/// transport, allowing the conflict-fallback path to be tested without a
/// cluster.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SecretWriter: Send + Sync {
    /// Create the secret; the store reports a distinguishable conflict when
    /// a record with the same name already exists
    async fn create(&self, secret: &Secret) -> Result<(), kube::Error>;

    /// Replace the named secret in place
    async fn replace(&self, name: &str, secret: &Secret) -> Result<(), kube::Error>;
}

/// Returns true for the store's "already exists" conflict on creation
///
/// Only this specific condition triggers the update fallback; generic I/O
/// errors propagate to the caller.
fn is_already_exists(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(e) if e.code == 409 && e.reason == "AlreadyExists")
}

/// Create-or-update the credential record in the remote store
///
/// Attempts a create; on an AlreadyExists conflict falls back to replacing
/// the record with the same payload, which makes the operation idempotent.
/// Any other creation error, or any replace error after a conflict,
/// propagates with context while keeping the cause inspectable.
pub async fn upsert_credential<W: SecretWriter + ?Sized>(
    writer: &W,
    record: &CredentialRecord,
) -> Result<(), Error> {
    let secret = record.to_secret();

    match writer.create(&secret).await {
        Ok(()) => Ok(()),
        Err(e) if is_already_exists(&e) => writer
            .replace(&record.secret_name(), &secret)
            .await
            .map_err(Error::CredentialUpdate),
        Err(e) => Err(Error::CredentialCreate(e)),
    }
}

/// Durable credential persistence, keyed by the token identifier
///
/// The store is reached through a connection descriptor (an admin kubeconfig
/// for the target cluster); trellis holds create/update rights only.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Create-or-update the record on the cluster reachable via `kubeconfig`
    async fn upsert(&self, kubeconfig: &str, record: &CredentialRecord) -> Result<(), Error>;
}

/// [`SecretWriter`] backed by a kube client on the target cluster
pub struct RemoteSecretWriter {
    api: Api<Secret>,
}

impl RemoteSecretWriter {
    /// Build a writer from an admin kubeconfig for the target cluster
    pub async fn connect(kubeconfig: &str) -> Result<Self, Error> {
        let client = client_from_kubeconfig(kubeconfig).await?;
        Ok(Self {
            api: Api::namespaced(client, TOKEN_NAMESPACE),
        })
    }
}

#[async_trait]
impl SecretWriter for RemoteSecretWriter {
    async fn create(&self, secret: &Secret) -> Result<(), kube::Error> {
        self.api.create(&PostParams::default(), secret).await?;
        Ok(())
    }

    async fn replace(&self, name: &str, secret: &Secret) -> Result<(), kube::Error> {
        self.api
            .replace(name, &PostParams::default(), secret)
            .await?;
        Ok(())
    }
}

/// [`CredentialStore`] persisting records as bootstrap-token Secrets
#[derive(Default)]
pub struct BootstrapSecretStore;

#[async_trait]
impl CredentialStore for BootstrapSecretStore {
    async fn upsert(&self, kubeconfig: &str, record: &CredentialRecord) -> Result<(), Error> {
        let writer = RemoteSecretWriter::connect(kubeconfig).await?;
        upsert_credential(&writer, record).await
    }
}

/// Build a kube client from a kubeconfig connection descriptor string
async fn client_from_kubeconfig(kubeconfig: &str) -> Result<Client, Error> {
    let kubeconfig = Kubeconfig::from_yaml(kubeconfig)
        .map_err(|e| Error::kubeconfig(format!("failed to parse kubeconfig: {e}")))?;

    let config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
        .await
        .map_err(|e| Error::kubeconfig(format!("failed to load kubeconfig: {e}")))?;

    Ok(Client::try_from(config)?)
}
