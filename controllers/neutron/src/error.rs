//! Controller-specific error types.
//!
//! This module defines error types specific to the neutron-controller that
//! are not covered by upstream library errors.

use neutron_client::NeutronError;
use thiserror::Error;

/// Errors that can occur in the neutron-controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// Neutron API error
    #[error("Neutron error: {0}")]
    Neutron(#[from] NeutronError),

    /// A delegated blocking call could not deliver its result
    #[error("Delegation failed: {0}")]
    Delegation(String),

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),

    /// A watcher was registered with an invalid descriptor
    #[error("Invalid watcher: {0}")]
    InvalidWatcher(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// An event payload could not be interpreted
    #[error("Malformed event: {0}")]
    MalformedEvent(String),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The namespace's network has not been provisioned yet (transient)
    #[error("Namespace networking not ready: {0}")]
    NamespaceNotReady(String),
}

impl ControllerError {
    /// True for failures that are expected to clear on a later delivery of
    /// the same object, as opposed to provisioning errors.
    pub fn is_transient(&self) -> bool {
        matches!(self, ControllerError::NamespaceNotReady(_))
    }
}
