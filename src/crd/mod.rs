//! Custom Resource Definitions for Trellis
//!
//! Two resources drive the provisioner core:
//! - [`TrellisCluster`] - the parent record owning the cached bootstrap token
//! - [`TrellisMachine`] - a VM-backed node belonging to a cluster

mod cluster;
mod machine;
mod types;

pub use cluster::{TrellisCluster, TrellisClusterSpec, TrellisClusterStatus};
pub use machine::{TrellisMachine, TrellisMachineSpec, TrellisMachineStatus};
pub use types::{ClusterPhase, ErrorReason, MachinePhase, MachineRole, ProviderSpec};
