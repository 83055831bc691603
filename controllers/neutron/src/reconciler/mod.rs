//! Reconciliation logic for watched Kubernetes resources.
//!
//! One translator per resource kind:
//! - `namespace`: namespace → network + subnet behind the shared router
//! - `pod`: pod → port on its namespace's network
//! - `service`: service → load-balancer pool + virtual IP
//!
//! All three share one `Reconciler` carrying the clients, the delegation
//! pool, and the provisioning context. Every Neutron call goes through the
//! delegator; every successful provisioning step is recorded in the object's
//! annotation ledger.

pub mod namespace;
pub mod pod;
pub mod service;

#[cfg(test)]
mod service_test;

use crate::context::ProvisioningContext;
use crate::delegate::Delegator;
use crate::error::ControllerError;
use kube::Client;
use neutron_client::{NeutronApi, NeutronError};
use std::sync::Arc;

/// Deterministic subnet name for a namespace.
///
/// Pure function of the namespace name, so lookups stay stable across
/// restarts and redeliveries.
pub fn namespace_subnet_name(namespace: &str) -> String {
    format!("{}-subnet", namespace)
}

/// Translates watch events into idempotent Neutron operations.
pub struct Reconciler {
    pub(crate) client: Client,
    pub(crate) neutron: Arc<dyn NeutronApi>,
    pub(crate) delegator: Arc<Delegator>,
    pub(crate) ctx: Arc<ProvisioningContext>,
    pub(crate) lb_method: String,
}

impl Reconciler {
    /// Creates a new reconciler instance.
    pub fn new(
        client: Client,
        neutron: Arc<dyn NeutronApi>,
        delegator: Arc<Delegator>,
        ctx: Arc<ProvisioningContext>,
        lb_method: String,
    ) -> Self {
        Self { client, neutron, delegator, ctx, lb_method }
    }

    /// Runs one blocking Neutron call on the delegation pool.
    pub(crate) async fn neutron_call<T, F>(&self, call: F) -> Result<T, ControllerError>
    where
        F: FnOnce(Arc<dyn NeutronApi>) -> Result<T, NeutronError> + Send + 'static,
        T: Send + 'static,
    {
        let neutron = Arc::clone(&self.neutron);
        self.delegator.delegate_api(move || call(neutron)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespace_subnet_name_is_deterministic() {
        assert_eq!(namespace_subnet_name("team-a"), "team-a-subnet");
        assert_eq!(namespace_subnet_name("team-a"), namespace_subnet_name("team-a"));
    }
}
