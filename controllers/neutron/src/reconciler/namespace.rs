//! Namespace reconciler
//!
//! A namespace maps to one network and one subnet, carved from the shared
//! subnet pool and attached to the cluster router.

use super::{Reconciler, namespace_subnet_name};
use crate::annotations::{
    self, NETWORK_ANNOTATION, SUBNET_ANNOTATION, ledger_snapshot, patch_annotations,
};
use crate::context::ensure_router_interface;
use crate::error::ControllerError;
use crate::registry::{EventTranslator, EventType, ResourceEvent};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Namespace;
use kube::api::{ApiResource, DynamicObject};
use neutron_client::{Network, NetworkCreate, Subnet, SubnetCreate};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Watches namespaces and provisions their networks.
pub struct NamespaceTranslator {
    reconciler: Arc<Reconciler>,
}

impl NamespaceTranslator {
    /// Watch endpoint consumed by this translator.
    pub const ENDPOINT: &'static str = "/api/v1/namespaces";

    pub fn new(reconciler: Arc<Reconciler>) -> Self {
        Self { reconciler }
    }
}

#[async_trait]
impl EventTranslator for NamespaceTranslator {
    fn endpoint(&self) -> &str {
        Self::ENDPOINT
    }

    fn api_resource(&self) -> ApiResource {
        ApiResource::erase::<Namespace>(&())
    }

    async fn translate(&self, event: ResourceEvent) -> Result<(), ControllerError> {
        self.reconciler.reconcile_namespace(event).await
    }
}

impl Reconciler {
    /// Reconciles a namespace event.
    pub async fn reconcile_namespace(&self, event: ResourceEvent) -> Result<(), ControllerError> {
        let name = event.object.metadata.name.clone().ok_or_else(|| {
            ControllerError::MalformedEvent("namespace event without a name".to_string())
        })?;
        match event.event_type {
            EventType::Added => self.namespace_added(&name, &event.object).await,
            EventType::Modified => {
                debug!("No structural changes for modified namespace {}", name);
                Ok(())
            }
            EventType::Deleted => self.namespace_deleted(&name, &event.object).await,
        }
    }

    async fn namespace_added(
        &self,
        name: &str,
        object: &DynamicObject,
    ) -> Result<(), ControllerError> {
        // The ledger is consulted first; the name-based lookup below only
        // covers objects provisioned before their annotations were written
        // (or before this controller existed).
        let recorded_network: Option<Network> =
            annotations::ledger_entry(&object.metadata, NETWORK_ANNOTATION)?;
        let recorded_subnet: Option<Subnet> =
            annotations::ledger_entry(&object.metadata, SUBNET_ANNOTATION)?;
        if let (Some(network), Some(subnet)) = (recorded_network, recorded_subnet) {
            debug!("Namespace {} already provisioned per its ledger", name);
            ensure_router_interface(
                &self.neutron,
                &self.delegator,
                &self.ctx.router.id,
                &network.id,
                &subnet.id,
            )
            .await?;
            return Ok(());
        }

        let network = {
            let network_name = name.to_string();
            let found = self
                .neutron_call(move |neutron| {
                    neutron.list_networks(&[("name", network_name.as_str())])
                })
                .await?;
            match found.into_iter().next() {
                Some(network) => {
                    debug!("Reusing existing network {} for namespace {}", network.id, name);
                    network
                }
                None => {
                    let request =
                        NetworkCreate { name: name.to_string(), admin_state_up: true };
                    let network =
                        self.neutron_call(move |neutron| neutron.create_network(&request)).await?;
                    info!("Created network {} for namespace {}", network.id, name);
                    network
                }
            }
        };

        let subnet_name = namespace_subnet_name(name);
        let subnet = {
            let lookup_name = subnet_name.clone();
            let found = self
                .neutron_call(move |neutron| neutron.list_subnets(&[("name", lookup_name.as_str())]))
                .await?;
            match found.into_iter().next() {
                Some(subnet) => {
                    debug!("Reusing existing subnet {} for namespace {}", subnet.id, name);
                    subnet
                }
                None => {
                    let request = SubnetCreate {
                        name: subnet_name,
                        network_id: network.id.clone(),
                        ip_version: 4,
                        cidr: None,
                        subnetpool_id: Some(self.ctx.subnet_pool.id.clone()),
                        enable_dhcp: false,
                    };
                    let subnet =
                        self.neutron_call(move |neutron| neutron.create_subnet(&request)).await?;
                    info!("Created subnet {} for namespace {}", subnet.id, name);
                    subnet
                }
            }
        };

        ensure_router_interface(
            &self.neutron,
            &self.delegator,
            &self.ctx.router.id,
            &network.id,
            &subnet.id,
        )
        .await?;

        let mut ledger = BTreeMap::new();
        ledger.insert(NETWORK_ANNOTATION.to_string(), ledger_snapshot(&network)?);
        ledger.insert(SUBNET_ANNOTATION.to_string(), ledger_snapshot(&subnet)?);
        patch_annotations(
            &self.client,
            &ApiResource::erase::<Namespace>(&()),
            None,
            name,
            &ledger,
        )
        .await?;
        debug!("Recorded network and subnet on namespace {}", name);
        Ok(())
    }

    async fn namespace_deleted(
        &self,
        name: &str,
        object: &DynamicObject,
    ) -> Result<(), ControllerError> {
        // Ids come strictly from the ledger: by delete time the namespace
        // may be gone from the apiserver and names resolve to nothing.
        let network: Option<Network> =
            annotations::ledger_entry(&object.metadata, NETWORK_ANNOTATION)?;
        let subnet: Option<Subnet> =
            annotations::ledger_entry(&object.metadata, SUBNET_ANNOTATION)?;

        let Some(network) = network else {
            debug!("Deleted namespace {} has no network ledger entry, nothing to clean up", name);
            return Ok(());
        };

        if let Some(subnet) = subnet {
            let router_id = self.ctx.router.id.clone();
            let subnet_id = subnet.id;
            self.neutron_call(move |neutron| {
                neutron.remove_router_interface(&router_id, &subnet_id)
            })
            .await?;
        }

        let network_id = network.id;
        self.neutron_call(move |neutron| neutron.delete_network(&network_id)).await?;
        info!("Deleted network of namespace {}", name);
        Ok(())
    }
}
