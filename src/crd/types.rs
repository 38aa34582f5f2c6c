//! Supporting types for the Trellis CRDs

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Infrastructure provider connection specification
///
/// Describes how to reach the virtualization backend hosting the cluster's
/// node VMs. Credentials come either from a referenced secret or inline.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSpec {
    /// Virtualization backend endpoint (hostname or URL)
    pub server: String,

    /// Datacenter or availability zone to place VMs in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datacenter: Option<String>,

    /// Name of a namespaced secret holding `username`/`password` keys
    ///
    /// When set, credentials are read from the secret and the inline fields
    /// are ignored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials_secret: Option<String>,

    /// Inline username (discouraged outside development)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Inline password (discouraged outside development)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// Role a machine plays within its cluster
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub enum MachineRole {
    /// Control plane node (API server, etcd, scheduler)
    ControlPlane,
    /// Worker node running user workloads
    #[default]
    Worker,
}

impl std::fmt::Display for MachineRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ControlPlane => write!(f, "control-plane"),
            Self::Worker => write!(f, "worker"),
        }
    }
}

/// Lifecycle phase of a TrellisCluster
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[non_exhaustive]
pub enum ClusterPhase {
    /// Cluster accepted but not yet provisioning
    #[default]
    Pending,
    /// Infrastructure is being created
    Provisioning,
    /// Control plane reachable and machines joining
    Ready,
    /// Provisioning failed; see status error fields
    Failed,
}

impl std::fmt::Display for ClusterPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::Provisioning => write!(f, "Provisioning"),
            Self::Ready => write!(f, "Ready"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

/// Lifecycle phase of a TrellisMachine
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[non_exhaustive]
pub enum MachinePhase {
    /// Machine accepted but VM not yet created
    #[default]
    Pending,
    /// VM is being cloned and powered on
    Provisioning,
    /// Node has joined the cluster
    Running,
    /// Provisioning failed; see status error fields
    Failed,
}

impl std::fmt::Display for MachinePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::Provisioning => write!(f, "Provisioning"),
            Self::Running => write!(f, "Running"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

/// Short enum-like reason code recorded on a failed object's status
///
/// Serialized verbatim into status fields and event reasons, so variant
/// names are part of the external contract.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorReason {
    /// Creating infrastructure or credentials failed
    CreateError,
    /// Updating an existing object failed
    UpdateError,
    /// Tearing down infrastructure failed
    DeleteError,
    /// The spec or a referenced secret is malformed
    InvalidConfiguration,
}

impl std::fmt::Display for ErrorReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CreateError => write!(f, "CreateError"),
            Self::UpdateError => write!(f, "UpdateError"),
            Self::DeleteError => write!(f, "DeleteError"),
            Self::InvalidConfiguration => write!(f, "InvalidConfiguration"),
        }
    }
}
