//! Standardized error reporting onto CRD statuses and the event stream
//!
//! [`ErrorReporter`] records a failure's reason and message onto the target
//! object's status, mirrors it as a warning event, and hands the original
//! error back unchanged so callers can report at a return statement:
//!
//! ```ignore
//! return Err(reporter
//!     .machine_error(&machine, status_err, "Create")
//!     .await
//!     .into());
//! ```
//!
//! The status update is best-effort and the whole status step is skipped
//! when no status client is configured (e.g., during bootstrap before full
//! wiring exists).

use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::api::{Api, Patch, PatchParams};
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use kube::{Client, Resource, ResourceExt};
use thiserror::Error as ThisError;
use tracing::{debug, error};

#[cfg(test)]
use mockall::automock;

use crate::crd::{ErrorReason, TrellisCluster, TrellisMachine};
use crate::{Error, Result, FIELD_MANAGER};

/// A failure to be recorded on a target object's status
///
/// Carries an enum-like short reason code and a human-readable message.
/// Written onto the status and mirrored to the event stream; not persisted
/// anywhere else.
#[derive(Clone, Debug, PartialEq, ThisError)]
#[error("{reason}: {message}")]
pub struct StatusError {
    /// Short reason code (also the event detail)
    pub reason: ErrorReason,
    /// Human-readable description
    pub message: String,
}

impl StatusError {
    /// Create a status error with the given reason and message
    pub fn new(reason: ErrorReason, message: impl Into<String>) -> Self {
        Self {
            reason,
            message: message.into(),
        }
    }
}

impl From<StatusError> for Error {
    fn from(err: StatusError) -> Self {
        Error::validation(err.to_string())
    }
}

/// Status-subresource writes for the reportable object kinds
#[cfg_attr(test, automock)]
#[async_trait]
pub trait StatusClient: Send + Sync {
    /// Push the machine's status subresource
    async fn update_machine_status(&self, machine: &TrellisMachine) -> Result<()>;

    /// Push the cluster's status subresource
    async fn update_cluster_status(&self, cluster: &TrellisCluster) -> Result<()>;
}

/// Observability event stream accepting warning events
#[cfg_attr(test, automock)]
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Emit a warning event against the referenced object
    async fn publish_warning(
        &self,
        target: &ObjectReference,
        action: &str,
        reason: &str,
        note: &str,
    );
}

/// Records failures onto statuses and the event stream
pub struct ErrorReporter {
    status_client: Option<Arc<dyn StatusClient>>,
    events: Arc<dyn EventSink>,
}

impl ErrorReporter {
    /// Create a reporter; pass `None` before status wiring exists
    pub fn new(status_client: Option<Arc<dyn StatusClient>>, events: Arc<dyn EventSink>) -> Self {
        Self {
            status_client,
            events,
        }
    }

    /// Create a fully wired reporter over a Kubernetes client
    pub fn with_client(client: Client) -> Self {
        Self::new(
            Some(Arc::new(StatusClientImpl::new(client.clone()))),
            Arc::new(EventRecorderSink::new(client)),
        )
    }

    /// Record a machine failure and return the original error unchanged
    ///
    /// Sets the status reason/message on a copy of the machine (skipped when
    /// no status client is configured), emits a `Failed<action>` warning
    /// event for a non-empty `event_action`, and always logs locally.
    pub async fn machine_error(
        &self,
        machine: &TrellisMachine,
        err: StatusError,
        event_action: &str,
    ) -> StatusError {
        if let Some(client) = &self.status_client {
            let mut updated = machine.clone();
            let status = updated.status.get_or_insert_with(Default::default);
            status.error_reason = Some(err.reason.clone());
            status.error_message = Some(err.message.clone());

            if let Err(e) = client.update_machine_status(&updated).await {
                debug!(machine = %machine.name_any(), error = %e, "Could not update machine status");
            }
        }

        if !event_action.is_empty() {
            let reference = machine.object_ref(&());
            self.events
                .publish_warning(
                    &reference,
                    event_action,
                    &format!("Failed{event_action}"),
                    &err.reason.to_string(),
                )
                .await;
        }

        error!(machine = %machine.name_any(), "Machine error: {}", err.message);
        err
    }

    /// Record a cluster failure and return the original error unchanged
    ///
    /// Structurally identical to [`Self::machine_error`], differing only in
    /// the target type and its status fields.
    pub async fn cluster_error(
        &self,
        cluster: &TrellisCluster,
        err: StatusError,
        event_action: &str,
    ) -> StatusError {
        if let Some(client) = &self.status_client {
            let mut updated = cluster.clone();
            let status = updated.status.get_or_insert_with(Default::default);
            status.error_reason = Some(err.reason.clone());
            status.error_message = Some(err.message.clone());

            if let Err(e) = client.update_cluster_status(&updated).await {
                debug!(cluster = %cluster.name_any(), error = %e, "Could not update cluster status");
            }
        }

        if !event_action.is_empty() {
            let reference = cluster.object_ref(&());
            self.events
                .publish_warning(
                    &reference,
                    event_action,
                    &format!("Failed{event_action}"),
                    &err.reason.to_string(),
                )
                .await;
        }

        error!(cluster = %cluster.name_any(), "Cluster error: {}", err.message);
        err
    }
}

/// Real status client pushing status subresources through the API server
pub struct StatusClientImpl {
    client: Client,
}

impl StatusClientImpl {
    /// Create a status client wrapping the given kube Client
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl StatusClient for StatusClientImpl {
    async fn update_machine_status(&self, machine: &TrellisMachine) -> Result<()> {
        let namespace = machine.namespace().unwrap_or_else(|| "default".to_string());
        let api: Api<TrellisMachine> = Api::namespaced(self.client.clone(), &namespace);

        let status_patch = serde_json::json!({ "status": machine.status });
        api.patch_status(
            &machine.name_any(),
            &PatchParams::apply(FIELD_MANAGER),
            &Patch::Merge(&status_patch),
        )
        .await?;
        Ok(())
    }

    async fn update_cluster_status(&self, cluster: &TrellisCluster) -> Result<()> {
        let namespace = cluster.namespace().unwrap_or_else(|| "default".to_string());
        let api: Api<TrellisCluster> = Api::namespaced(self.client.clone(), &namespace);

        let status_patch = serde_json::json!({ "status": cluster.status });
        api.patch_status(
            &cluster.name_any(),
            &PatchParams::apply(FIELD_MANAGER),
            &Patch::Merge(&status_patch),
        )
        .await?;
        Ok(())
    }
}

/// [`EventSink`] backed by the Kubernetes event recorder
pub struct EventRecorderSink {
    recorder: Recorder,
}

impl EventRecorderSink {
    /// Create an event sink publishing as the trellis controller
    pub fn new(client: Client) -> Self {
        let reporter = Reporter {
            controller: FIELD_MANAGER.to_string(),
            instance: None,
        };
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }
}

#[async_trait]
impl EventSink for EventRecorderSink {
    async fn publish_warning(
        &self,
        target: &ObjectReference,
        action: &str,
        reason: &str,
        note: &str,
    ) {
        let event = Event {
            type_: EventType::Warning,
            reason: reason.to_string(),
            note: Some(note.to_string()),
            action: action.to_string(),
            secondary: None,
        };

        // Event emission is fire-and-forget; a dropped event never blocks
        // error propagation
        if let Err(e) = self.recorder.publish(&event, target).await {
            debug!(error = %e, reason = %reason, "Could not publish event");
        }
    }
}
