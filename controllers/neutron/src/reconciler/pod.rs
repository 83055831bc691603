//! Pod reconciler
//!
//! A pod maps to one port on its namespace's network, tagged with the
//! controller's device owner and bound to the namespace subnet.

use super::{Reconciler, namespace_subnet_name};
use crate::annotations::{
    self, DEVICE_OWNER, PORT_ANNOTATION, SECURITY_GROUP_LABEL, SUBNET_ANNOTATION, ledger_snapshot,
    patch_annotations,
};
use crate::error::ControllerError;
use crate::registry::{EventTranslator, EventType, ResourceEvent};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{ApiResource, DynamicObject};
use neutron_client::{FixedIp, Port, PortCreate, PortUpdate};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Watches pods and provisions their ports.
pub struct PodTranslator {
    reconciler: Arc<Reconciler>,
}

impl PodTranslator {
    /// Watch endpoint consumed by this translator.
    pub const ENDPOINT: &'static str = "/api/v1/pods";

    pub fn new(reconciler: Arc<Reconciler>) -> Self {
        Self { reconciler }
    }
}

#[async_trait]
impl EventTranslator for PodTranslator {
    fn endpoint(&self) -> &str {
        Self::ENDPOINT
    }

    fn api_resource(&self) -> ApiResource {
        ApiResource::erase::<Pod>(&())
    }

    async fn translate(&self, event: ResourceEvent) -> Result<(), ControllerError> {
        self.reconciler.reconcile_pod(event).await
    }
}

impl Reconciler {
    /// Reconciles a pod event.
    pub async fn reconcile_pod(&self, event: ResourceEvent) -> Result<(), ControllerError> {
        let name = event
            .object
            .metadata
            .name
            .clone()
            .ok_or_else(|| ControllerError::MalformedEvent("pod event without a name".to_string()))?;
        match event.event_type {
            EventType::Added => self.pod_added(&name, &event.object).await,
            EventType::Modified => self.pod_modified(&name, &event.object).await,
            EventType::Deleted => self.pod_deleted(&name, &event.object).await,
        }
    }

    fn pod_security_group(&self, object: &DynamicObject) -> String {
        object
            .metadata
            .labels
            .as_ref()
            .and_then(|labels| labels.get(SECURITY_GROUP_LABEL))
            .cloned()
            .unwrap_or_else(|| self.ctx.default_security_group.clone())
    }

    async fn pod_added(&self, name: &str, object: &DynamicObject) -> Result<(), ControllerError> {
        if annotations::ledger_entry::<Port>(&object.metadata, PORT_ANNOTATION)?.is_some() {
            debug!("Ignoring ADDED for pod {}: a port is already recorded", name);
            return Ok(());
        }
        let namespace = object.metadata.namespace.clone().ok_or_else(|| {
            ControllerError::MalformedEvent(format!("pod {} has no namespace", name))
        })?;

        let networks = {
            let network_name = namespace.clone();
            self.neutron_call(move |neutron| neutron.list_networks(&[("name", network_name.as_str())]))
                .await?
        };
        let Some(network) = networks.into_iter().next() else {
            // The namespace event may simply not have been translated yet;
            // a later delivery of this pod will find the network.
            return Err(ControllerError::NamespaceNotReady(format!(
                "network for namespace {} of pod {} does not exist yet",
                namespace, name
            )));
        };

        let subnets = {
            let subnet_name = namespace_subnet_name(&namespace);
            self.neutron_call(move |neutron| neutron.list_subnets(&[("name", subnet_name.as_str())]))
                .await?
        };
        let Some(subnet) = subnets.into_iter().next() else {
            return Err(ControllerError::NamespaceNotReady(format!(
                "subnet for namespace {} of pod {} does not exist yet",
                namespace, name
            )));
        };

        let request = PortCreate {
            name: name.to_string(),
            network_id: network.id.clone(),
            admin_state_up: true,
            device_owner: DEVICE_OWNER.to_string(),
            fixed_ips: vec![FixedIp { subnet_id: subnet.id.clone(), ip_address: None }],
            security_groups: vec![self.pod_security_group(object)],
        };
        let port = self.neutron_call(move |neutron| neutron.create_port(&request)).await?;
        info!("Created port {} for pod {}/{}", port.id, namespace, name);

        let mut ledger = BTreeMap::new();
        ledger.insert(PORT_ANNOTATION.to_string(), ledger_snapshot(&port)?);
        ledger.insert(SUBNET_ANNOTATION.to_string(), ledger_snapshot(&subnet)?);
        patch_annotations(
            &self.client,
            &ApiResource::erase::<Pod>(&()),
            Some(&namespace),
            name,
            &ledger,
        )
        .await?;
        Ok(())
    }

    async fn pod_modified(&self, name: &str, object: &DynamicObject) -> Result<(), ControllerError> {
        // Only the security-group label is acted upon; anything else about a
        // pod changing has no networking consequence.
        let Some(port) = annotations::ledger_entry::<Port>(&object.metadata, PORT_ANNOTATION)?
        else {
            debug!("Modified pod {} has no recorded port, ignoring", name);
            return Ok(());
        };
        let security_group = self.pod_security_group(object);
        if port.security_groups == [security_group.clone()] {
            return Ok(());
        }

        let port_id = port.id.clone();
        let update = PortUpdate { security_groups: Some(vec![security_group]) };
        self.neutron_call(move |neutron| neutron.update_port(&port_id, &update)).await?;
        info!("Updated security groups of port {} for pod {}", port.id, name);
        Ok(())
    }

    async fn pod_deleted(&self, name: &str, object: &DynamicObject) -> Result<(), ControllerError> {
        // Deletion trusts the ledger alone; the pod object is on its way out
        // and a name search could hit an unrelated port.
        let Some(port) = annotations::ledger_entry::<Port>(&object.metadata, PORT_ANNOTATION)?
        else {
            debug!("Deleted pod {} has no recorded port, nothing to clean up", name);
            return Ok(());
        };

        let port_id = port.id.clone();
        self.neutron_call(move |neutron| neutron.delete_port(&port_id)).await?;
        info!("Deleted port {} of pod {}", port.id, name);
        Ok(())
    }
}
