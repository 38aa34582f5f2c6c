//! TrellisCluster Custom Resource Definition
//!
//! The TrellisCluster CRD is the parent record for a provisioned cluster.
//! Its metadata annotations carry the cached bootstrap token and expiry
//! (see [`crate::token::cache`]); its status carries error reporting fields.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::{ClusterPhase, ErrorReason, ProviderSpec};

/// Specification for a TrellisCluster
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "trellis.dev",
    version = "v1alpha1",
    kind = "TrellisCluster",
    plural = "trellisclusters",
    shortname = "tc",
    status = "TrellisClusterStatus",
    namespaced,
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Server","type":"string","jsonPath":".spec.provider.server"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct TrellisClusterSpec {
    /// Infrastructure provider connection configuration
    pub provider: ProviderSpec,

    /// Name of the namespaced secret holding the SSH public key for node access
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh_key_secret: Option<String>,
}

impl TrellisClusterSpec {
    /// Validate the cluster specification
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.provider.server.is_empty() {
            return Err(crate::Error::validation(
                "provider server endpoint must not be empty",
            ));
        }

        // Credentials must come from somewhere: a referenced secret or inline
        let has_inline =
            self.provider.username.is_some() && self.provider.password.is_some();
        if self.provider.credentials_secret.is_none() && !has_inline {
            return Err(crate::Error::validation(
                "provider requires either 'credentialsSecret' or inline 'username' and 'password'",
            ));
        }

        Ok(())
    }
}

/// Status for a TrellisCluster
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrellisClusterStatus {
    /// Current phase of the cluster lifecycle
    #[serde(default)]
    pub phase: ClusterPhase,

    /// Short reason code for the most recent failure, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<ErrorReason>,

    /// Human-readable message for the most recent failure, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    /// Kubernetes API server endpoint, once known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

impl TrellisClusterStatus {
    /// Set the phase and return self for chaining
    pub fn phase(mut self, phase: ClusterPhase) -> Self {
        self.phase = phase;
        self
    }

    /// Set the error reason/message and return self for chaining
    pub fn error(mut self, reason: ErrorReason, message: impl Into<String>) -> Self {
        self.error_reason = Some(reason);
        self.error_message = Some(message.into());
        self
    }
}
