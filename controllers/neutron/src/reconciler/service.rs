//! Service reconciler
//!
//! A ClusterIP service maps to a load-balancer pool on its namespace subnet
//! and a virtual IP carrying the cluster IP on the service subnet. Pool
//! members are managed elsewhere; this translator owns only the pool and the
//! VIP.

use super::{Reconciler, namespace_subnet_name};
use crate::annotations::{
    self, POOL_ANNOTATION, VIP_ANNOTATION, ledger_snapshot, patch_annotations,
};
use crate::error::ControllerError;
use crate::registry::{EventTranslator, EventType, ResourceEvent};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Service, ServiceSpec};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::api::{ApiResource, DynamicObject};
use neutron_client::{LoadBalancerPool, PoolCreate, VipCreate, VirtualIp};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Watches services and provisions their pools and virtual IPs.
pub struct ServiceTranslator {
    reconciler: Arc<Reconciler>,
}

impl ServiceTranslator {
    /// Watch endpoint consumed by this translator.
    pub const ENDPOINT: &'static str = "/api/v1/services";

    pub fn new(reconciler: Arc<Reconciler>) -> Self {
        Self { reconciler }
    }
}

#[async_trait]
impl EventTranslator for ServiceTranslator {
    fn endpoint(&self) -> &str {
        Self::ENDPOINT
    }

    fn api_resource(&self) -> ApiResource {
        ApiResource::erase::<Service>(&())
    }

    async fn translate(&self, event: ResourceEvent) -> Result<(), ControllerError> {
        self.reconciler.reconcile_service(event).await
    }
}

fn service_spec(object: &DynamicObject) -> Result<Option<ServiceSpec>, ControllerError> {
    let Some(spec) = object.data.get("spec") else {
        return Ok(None);
    };
    serde_json::from_value(spec.clone()).map(Some).map_err(|e| {
        ControllerError::MalformedEvent(format!("service spec does not deserialize: {}", e))
    })
}

impl Reconciler {
    /// Reconciles a service event.
    pub async fn reconcile_service(&self, event: ResourceEvent) -> Result<(), ControllerError> {
        let name = event.object.metadata.name.clone().ok_or_else(|| {
            ControllerError::MalformedEvent("service event without a name".to_string())
        })?;
        match event.event_type {
            EventType::Added => self.service_added(&name, &event.object).await,
            EventType::Modified => {
                debug!("No structural changes for modified service {}", name);
                Ok(())
            }
            EventType::Deleted => self.service_deleted(&name, &event.object).await,
        }
    }

    async fn service_added(&self, name: &str, object: &DynamicObject) -> Result<(), ControllerError> {
        if annotations::ledger_entry::<LoadBalancerPool>(&object.metadata, POOL_ANNOTATION)?
            .is_some()
        {
            debug!("Ignoring ADDED for service {}: a pool is already recorded", name);
            return Ok(());
        }
        let namespace =
            object.metadata.namespace.clone().unwrap_or_else(|| "default".to_string());

        let Some(spec) = service_spec(object)? else {
            warn!("Service {} has no spec, ignoring the event", name);
            return Ok(());
        };
        let service_type = spec.type_.as_deref().unwrap_or("ClusterIP");
        if service_type != "ClusterIP" {
            warn!("Service {} has unsupported type {}, ignoring the event", name, service_type);
            return Ok(());
        }
        let Some(cluster_ip) = spec.cluster_ip.as_deref().filter(|ip| !ip.is_empty() && *ip != "None")
        else {
            warn!("Service {} has no cluster IP, ignoring the event", name);
            return Ok(());
        };
        let Some(port) = spec.ports.as_ref().and_then(|ports| ports.first()) else {
            warn!("Service {} exposes no ports, ignoring the event", name);
            return Ok(());
        };
        let protocol = port.protocol.clone().unwrap_or_else(|| "TCP".to_string());
        // A named targetPort cannot be resolved without the backing pods;
        // the service port is the best stand-in.
        let protocol_port = match &port.target_port {
            Some(IntOrString::Int(value)) => u16::try_from(*value).map_err(|_| {
                ControllerError::MalformedEvent(format!(
                    "service {} target port {} out of range",
                    name, value
                ))
            })?,
            _ => u16::try_from(port.port).map_err(|_| {
                ControllerError::MalformedEvent(format!(
                    "service {} port {} out of range",
                    name, port.port
                ))
            })?,
        };

        let subnets = {
            let subnet_name = namespace_subnet_name(&namespace);
            self.neutron_call(move |neutron| neutron.list_subnets(&[("name", subnet_name.as_str())]))
                .await?
        };
        let Some(subnet) = subnets.into_iter().next() else {
            return Err(ControllerError::NamespaceNotReady(format!(
                "subnet for namespace {} of service {} does not exist yet",
                namespace, name
            )));
        };

        let pool_request = PoolCreate {
            name: name.to_string(),
            protocol: protocol.clone(),
            subnet_id: subnet.id.clone(),
            lb_method: self.lb_method.clone(),
        };
        let pool = self.neutron_call(move |neutron| neutron.create_pool(&pool_request)).await?;
        info!("Created pool {} for service {}/{}", pool.id, namespace, name);

        let vip_request = VipCreate {
            name: name.to_string(),
            pool_id: pool.id.clone(),
            subnet_id: self.ctx.service_subnet.id.clone(),
            address: cluster_ip.to_string(),
            protocol,
            protocol_port,
        };
        let vip = match self.neutron_call(move |neutron| neutron.create_vip(&vip_request)).await {
            Ok(vip) => vip,
            Err(e) => {
                // The pool without its VIP is useless; take it back out so a
                // redelivery starts clean.
                let pool_id = pool.id.clone();
                if let Err(cleanup) =
                    self.neutron_call(move |neutron| neutron.delete_pool(&pool_id)).await
                {
                    error!(
                        "Failed to clean up pool {} after VIP creation failed: {}",
                        pool.id, cleanup
                    );
                }
                return Err(e);
            }
        };
        info!("Created VIP {} for service {}/{}", vip.id, namespace, name);

        let mut ledger = BTreeMap::new();
        ledger.insert(POOL_ANNOTATION.to_string(), ledger_snapshot(&pool)?);
        ledger.insert(VIP_ANNOTATION.to_string(), ledger_snapshot(&vip)?);
        patch_annotations(
            &self.client,
            &ApiResource::erase::<Service>(&()),
            Some(&namespace),
            name,
            &ledger,
        )
        .await?;
        Ok(())
    }

    async fn service_deleted(
        &self,
        name: &str,
        object: &DynamicObject,
    ) -> Result<(), ControllerError> {
        let vip: Option<VirtualIp> = annotations::ledger_entry(&object.metadata, VIP_ANNOTATION)?;
        let pool: Option<LoadBalancerPool> =
            annotations::ledger_entry(&object.metadata, POOL_ANNOTATION)?;
        if vip.is_none() && pool.is_none() {
            debug!("Deleted service {} has no ledger entries, nothing to clean up", name);
            return Ok(());
        }

        // The VIP depends on the pool, so it goes first.
        if let Some(vip) = vip {
            let vip_id = vip.id.clone();
            self.neutron_call(move |neutron| neutron.delete_vip(&vip_id)).await?;
            info!("Deleted VIP {} of service {}", vip.id, name);
        }
        if let Some(pool) = pool {
            let pool_id = pool.id.clone();
            self.neutron_call(move |neutron| neutron.delete_pool(&pool_id)).await?;
            info!("Deleted pool {} of service {}", pool.id, name);
        }
        Ok(())
    }
}
