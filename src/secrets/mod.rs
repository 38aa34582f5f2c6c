//! Secret lookups on the management cluster
//!
//! The provisioner's inputs all arrive as Kubernetes Secrets next to the
//! [`TrellisCluster`] record: the admin kubeconfig for the workload cluster,
//! the SSH public key baked into provisioned nodes, and the virtualization
//! backend credentials. This module centralizes fetching and decoding them.
//!
//! [`TrellisCluster`]: crate::crd::TrellisCluster

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::ByteString;
use kube::api::Api;
use kube::{Client, ResourceExt};
use tracing::{debug, warn};

use crate::crd::TrellisCluster;
use crate::{Error, Result};

/// Data key under which kubeconfig secrets store the serialized kubeconfig
pub const KUBECONFIG_SECRET_KEY: &str = "value";

/// Name suffix of the per-cluster admin kubeconfig secret
pub const KUBECONFIG_SECRET_SUFFIX: &str = "-kubeconfig";

/// Mounted file consulted before falling back to the SSH key secret
pub const SSH_PUBLIC_KEY_FILE: &str = "/etc/trellis/sshkeys/id_rsa.pub";

/// Default name of the SSH key secret when the spec names none
pub const SSH_KEY_SECRET_NAME: &str = "sshkeys";

/// Data key under which the SSH key secret stores the public key
pub const SSH_KEY_SECRET_KEY: &str = "id_rsa.pub";

/// Data key for the provider username inside a credentials secret
pub const CREDENTIALS_USERNAME_KEY: &str = "username";

/// Data key for the provider password inside a credentials secret
pub const CREDENTIALS_PASSWORD_KEY: &str = "password";

/// Fetch one field out of a namespaced secret
///
/// Fails with a validation error naming the secret and key when the field
/// is absent, so misconfigured secrets surface with an actionable message.
pub async fn secret_field(
    client: &Client,
    namespace: &str,
    name: &str,
    key: &str,
) -> Result<Vec<u8>> {
    let api: Api<Secret> = Api::namespaced(client.clone(), namespace);
    let secret = api.get(name).await?;

    let data = secret.data.unwrap_or_default();
    match data.get(key) {
        Some(ByteString(bytes)) => Ok(bytes.clone()),
        None => Err(Error::validation(format!(
            "secret '{namespace}/{name}' has no '{key}' key"
        ))),
    }
}

/// Fetch the workload cluster's admin kubeconfig
///
/// The kubeconfig lives in `<cluster>-kubeconfig` next to the cluster record
/// and is the connection descriptor every remote operation starts from.
pub async fn admin_kubeconfig(client: &Client, cluster: &TrellisCluster) -> Result<String> {
    let namespace = cluster_namespace(cluster);
    let name = format!("{}{}", cluster.name_any(), KUBECONFIG_SECRET_SUFFIX);

    debug!(cluster = %cluster.name_any(), secret = %name, "Fetching admin kubeconfig");
    let bytes = secret_field(client, &namespace, &name, KUBECONFIG_SECRET_KEY).await?;
    decode_utf8(bytes, "kubeconfig")
}

/// Fetch the SSH public key to install on provisioned nodes
///
/// The mounted secrets volume wins when present; otherwise the key is read
/// from the secret named by the spec (or [`SSH_KEY_SECRET_NAME`]) in the
/// cluster's namespace.
pub async fn ssh_public_key(client: &Client, cluster: &TrellisCluster) -> Result<String> {
    match tokio::fs::read(SSH_PUBLIC_KEY_FILE).await {
        Ok(bytes) => return decode_utf8(bytes, "SSH public key"),
        Err(e) => {
            debug!(path = SSH_PUBLIC_KEY_FILE, error = %e, "No mounted SSH key, trying the API server");
        }
    }

    let namespace = cluster_namespace(cluster);
    let name = cluster
        .spec
        .ssh_key_secret
        .as_deref()
        .unwrap_or(SSH_KEY_SECRET_NAME);

    let bytes = secret_field(client, &namespace, name, SSH_KEY_SECRET_KEY).await?;
    decode_utf8(bytes, "SSH public key")
}

/// Resolve the virtualization backend credentials for a cluster
///
/// A referenced credentials secret takes precedence; inline spec fields are
/// the fallback for development setups. Returns `(username, password)`.
pub async fn provider_credentials(
    client: &Client,
    cluster: &TrellisCluster,
) -> Result<(String, String)> {
    let provider = &cluster.spec.provider;

    if let Some(secret_name) = &provider.credentials_secret {
        debug!(secret = %secret_name, "Fetching provider credentials from secret");
        let api: Api<Secret> = Api::namespaced(client.clone(), &cluster_namespace(cluster));
        let secret = match api.get(secret_name).await {
            Ok(secret) => secret,
            Err(e) => {
                warn!(secret = %secret_name, "Error reading credentials secret");
                return Err(e.into());
            }
        };
        return credentials_from_data(&secret.data.unwrap_or_default(), secret_name);
    }

    match (&provider.username, &provider.password) {
        (Some(username), Some(password)) => Ok((username.clone(), password.clone())),
        _ => Err(Error::validation(
            "provider has neither a credentials secret nor inline credentials",
        )),
    }
}

/// Extract the username/password pair out of credentials secret data
fn credentials_from_data(
    data: &BTreeMap<String, ByteString>,
    secret_name: &str,
) -> Result<(String, String)> {
    if let (Some(ByteString(username)), Some(ByteString(password))) = (
        data.get(CREDENTIALS_USERNAME_KEY),
        data.get(CREDENTIALS_PASSWORD_KEY),
    ) {
        return Ok((
            decode_utf8(username.clone(), "provider username")?,
            decode_utf8(password.clone(), "provider password")?,
        ));
    }

    Err(Error::validation(format!(
        "improper secret: '{secret_name}' must define the '{CREDENTIALS_USERNAME_KEY}' and '{CREDENTIALS_PASSWORD_KEY}' keys"
    )))
}

fn decode_utf8(bytes: Vec<u8>, what: &str) -> Result<String> {
    String::from_utf8(bytes).map_err(|_| Error::validation(format!("{what} is not valid UTF-8")))
}

fn cluster_namespace(cluster: &TrellisCluster) -> String {
    cluster.namespace().unwrap_or_else(|| "default".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(entries: &[(&str, &str)]) -> BTreeMap<String, ByteString> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), ByteString(v.as_bytes().to_vec())))
            .collect()
    }

    // =========================================================================
    // Credentials Secret Stories
    // =========================================================================

    /// Story: A well-formed credentials secret yields the username/password pair
    #[test]
    fn story_credentials_secret_yields_pair() {
        let data = data(&[("username", "administrator"), ("password", "hunter2")]);

        let (username, password) =
            credentials_from_data(&data, "vsphere-creds").expect("well-formed secret");
        assert_eq!(username, "administrator");
        assert_eq!(password, "hunter2");
    }

    /// Story: A credentials secret missing a key is called out by name
    ///
    /// Operators debug this from the error message alone, so it must name
    /// the offending secret and the keys it is expected to carry.
    #[test]
    fn story_malformed_credentials_secret_names_the_keys() {
        let data = data(&[("username", "administrator")]);

        let err = credentials_from_data(&data, "vsphere-creds").expect_err("missing password");
        let message = err.to_string();
        assert!(message.contains("vsphere-creds"));
        assert!(message.contains("username"));
        assert!(message.contains("password"));
    }

    /// Story: Extra keys in the credentials secret are ignored
    #[test]
    fn story_extra_credential_keys_are_ignored() {
        let data = data(&[
            ("username", "administrator"),
            ("password", "hunter2"),
            ("note", "rotated 2026-08"),
        ]);

        assert!(credentials_from_data(&data, "vsphere-creds").is_ok());
    }

    // =========================================================================
    // Decoding Stories
    // =========================================================================

    /// Story: Binary garbage in a text field produces a labeled error
    #[test]
    fn story_non_utf8_payload_is_labeled() {
        let err = decode_utf8(vec![0xff, 0xfe], "kubeconfig").expect_err("invalid UTF-8");
        assert!(err.to_string().contains("kubeconfig"));
    }

    /// Story: Valid bytes decode transparently
    #[test]
    fn story_utf8_payload_decodes() {
        let decoded = decode_utf8(b"apiVersion: v1".to_vec(), "kubeconfig").expect("valid UTF-8");
        assert_eq!(decoded, "apiVersion: v1");
    }
}
