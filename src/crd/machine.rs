//! TrellisMachine Custom Resource Definition
//!
//! A TrellisMachine represents a single VM-backed node belonging to a
//! TrellisCluster. The token cache consults machines to locate the cluster's
//! control plane before minting a join token.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::{ErrorReason, MachinePhase, MachineRole};

/// Specification for a TrellisMachine
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "trellis.dev",
    version = "v1alpha1",
    kind = "TrellisMachine",
    plural = "trellismachines",
    shortname = "tm",
    status = "TrellisMachineStatus",
    namespaced,
    printcolumn = r#"{"name":"Cluster","type":"string","jsonPath":".spec.cluster"}"#,
    printcolumn = r#"{"name":"Role","type":"string","jsonPath":".spec.role"}"#,
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct TrellisMachineSpec {
    /// Name of the owning TrellisCluster (same namespace)
    pub cluster: String,

    /// Role this machine plays in the cluster
    #[serde(default)]
    pub role: MachineRole,

    /// VM template to clone the node from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,

    /// Number of virtual CPUs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpus: Option<u32>,

    /// Memory in MiB
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_mib: Option<u64>,
}

impl TrellisMachineSpec {
    /// Returns true if this machine serves the cluster control plane
    pub fn is_control_plane(&self) -> bool {
        self.role == MachineRole::ControlPlane
    }
}

/// Status for a TrellisMachine
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrellisMachineStatus {
    /// Current phase of the machine lifecycle
    #[serde(default)]
    pub phase: MachinePhase,

    /// Short reason code for the most recent failure, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<ErrorReason>,

    /// Human-readable message for the most recent failure, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    /// IP address assigned to the VM, once known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Story: Control plane machines are identified by role
    ///
    /// The token cache only mints tokens for clusters with a resolvable
    /// control plane, so role identification must be reliable.
    #[test]
    fn story_control_plane_machines_are_identified_by_role() {
        let cp = TrellisMachineSpec {
            cluster: "prod-east".to_string(),
            role: MachineRole::ControlPlane,
            template: None,
            cpus: None,
            memory_mib: None,
        };
        let worker = TrellisMachineSpec {
            role: MachineRole::Worker,
            ..cp.clone()
        };

        assert!(cp.is_control_plane());
        assert!(!worker.is_control_plane());
    }

    /// Story: Machines default to the worker role
    ///
    /// A manifest that omits the role gets a worker, never an accidental
    /// control plane member.
    #[test]
    fn story_machines_default_to_worker_role() {
        let yaml = r#"
cluster: prod-east
template: ubuntu-2204-k8s
cpus: 4
memoryMib: 8192
"#;
        let spec: TrellisMachineSpec = serde_yaml::from_str(yaml).expect("parse");

        assert_eq!(spec.role, MachineRole::Worker);
        assert_eq!(spec.cluster, "prod-east");
        assert_eq!(spec.cpus, Some(4));
        assert_eq!(spec.memory_mib, Some(8192));
    }
}
