//! The shared provisioning context and its startup bootstrap.
//!
//! `ensure_networking_base` runs once before any watcher starts. It
//! discovers-or-creates the cluster-wide Neutron resources every translator
//! depends on, always looking up by well-known name before creating, so a
//! crash at any point mid-bootstrap is recovered by simply running it again.
//!
//! The result is immutable: translators read it concurrently but nothing
//! writes to it after startup.

use crate::config::ControllerConfig;
use crate::delegate::Delegator;
use crate::error::ControllerError;
use neutron_client::{
    Network, NetworkCreate, NeutronApi, Port, Router, RouterCreate, SecurityGroupCreate,
    SecurityGroupRuleCreate, Subnet, SubnetCreate, SubnetPool, SubnetPoolCreate,
};
use std::sync::Arc;
use tracing::{debug, info};

/// Cluster-wide provisioning state, established once at startup.
#[derive(Debug, Clone)]
pub struct ProvisioningContext {
    /// Cluster-wide base network.
    pub cluster_network: Network,
    /// Subnet of the base network.
    pub cluster_subnet: Subnet,
    /// Network hosting service virtual IPs.
    pub service_network: Network,
    /// Subnet hosting service virtual IPs.
    pub service_subnet: Subnet,
    /// Router shared by every namespace subnet.
    pub router: Router,
    /// Id of the default security group for managed ports.
    pub default_security_group: String,
    /// Pool that namespace subnets are carved out of.
    pub subnet_pool: SubnetPool,
}

/// True when one of `ports` is the router interface for `subnet_id`.
pub(crate) fn has_router_port_for_subnet(ports: &[Port], subnet_id: &str) -> bool {
    ports.iter().any(|port| port.fixed_ips.iter().any(|fip| fip.subnet_id == subnet_id))
}

fn ip_version_of(cidr: &str) -> u8 {
    if cidr.contains(':') { 6 } else { 4 }
}

async fn ensure_default_security_group(
    neutron: &Arc<dyn NeutronApi>,
    delegator: &Delegator,
    config: &ControllerConfig,
) -> Result<String, ControllerError> {
    let name = config.security_group_name();
    let existing = {
        let neutron = Arc::clone(neutron);
        let name = name.clone();
        delegator
            .delegate_api(move || neutron.list_security_groups(&[("name", name.as_str())]))
            .await?
    };
    if let Some(group) = existing.into_iter().next() {
        debug!("Reusing existing security group {}", group.id);
        return Ok(group.id);
    }

    let group = {
        let neutron = Arc::clone(neutron);
        delegator
            .delegate_api(move || neutron.create_security_group(&SecurityGroupCreate { name }))
            .await?
    };
    // Self-referencing ingress rules, matching Neutron's own default group
    for ethertype in ["IPv4", "IPv6"] {
        let neutron = Arc::clone(neutron);
        let rule = SecurityGroupRuleCreate {
            security_group_id: group.id.clone(),
            direction: "ingress".to_string(),
            ethertype: ethertype.to_string(),
            remote_group_id: Some(group.id.clone()),
        };
        delegator.delegate_api(move || neutron.create_security_group_rule(&rule)).await?;
    }
    info!("Created default security group {}", group.id);
    Ok(group.id)
}

async fn ensure_router(
    neutron: &Arc<dyn NeutronApi>,
    delegator: &Delegator,
    config: &ControllerConfig,
) -> Result<Router, ControllerError> {
    let name = config.router_name();
    let existing = {
        let neutron = Arc::clone(neutron);
        let name = name.clone();
        delegator.delegate_api(move || neutron.list_routers(&[("name", name.as_str())])).await?
    };
    if let Some(router) = existing.into_iter().next() {
        debug!("Reusing existing router {}", router.id);
        return Ok(router);
    }

    let router = {
        let neutron = Arc::clone(neutron);
        delegator.delegate_api(move || neutron.create_router(&RouterCreate { name })).await?
    };
    info!("Created cluster router {}", router.id);
    Ok(router)
}

async fn ensure_subnet_pool(
    neutron: &Arc<dyn NeutronApi>,
    delegator: &Delegator,
    config: &ControllerConfig,
) -> Result<SubnetPool, ControllerError> {
    let name = config.subnet_pool_name();
    let existing = {
        let neutron = Arc::clone(neutron);
        let name = name.clone();
        delegator.delegate_api(move || neutron.list_subnet_pools(&[("name", name.as_str())])).await?
    };
    if let Some(pool) = existing.into_iter().next() {
        debug!("Reusing existing subnet pool {}", pool.id);
        return Ok(pool);
    }

    let request = SubnetPoolCreate {
        name,
        prefixes: vec![config.subnet_pool_cidr.clone()],
        default_prefixlen: config.default_prefix_len,
    };
    let pool = {
        let neutron = Arc::clone(neutron);
        delegator.delegate_api(move || neutron.create_subnet_pool(&request)).await?
    };
    info!("Created subnet pool {}", pool.id);
    Ok(pool)
}

async fn ensure_network_with_subnet(
    neutron: &Arc<dyn NeutronApi>,
    delegator: &Delegator,
    network_name: String,
    subnet_name: String,
    cidr: String,
) -> Result<(Network, Subnet), ControllerError> {
    let existing_networks = {
        let neutron = Arc::clone(neutron);
        let name = network_name.clone();
        delegator.delegate_api(move || neutron.list_networks(&[("name", name.as_str())])).await?
    };
    let network = match existing_networks.into_iter().next() {
        Some(network) => network,
        None => {
            let request = NetworkCreate { name: network_name, admin_state_up: true };
            let neutron = Arc::clone(neutron);
            let network = delegator.delegate_api(move || neutron.create_network(&request)).await?;
            info!("Created network {} ({})", network.name, network.id);
            network
        }
    };

    let existing_subnets = {
        let neutron = Arc::clone(neutron);
        let name = subnet_name.clone();
        let network_id = network.id.clone();
        delegator
            .delegate_api(move || {
                neutron.list_subnets(&[("name", name.as_str()), ("network_id", network_id.as_str())])
            })
            .await?
    };
    let subnet = match existing_subnets.into_iter().next() {
        Some(subnet) => subnet,
        None => {
            let request = SubnetCreate {
                name: subnet_name,
                network_id: network.id.clone(),
                ip_version: ip_version_of(&cidr),
                cidr: Some(cidr),
                subnetpool_id: None,
                enable_dhcp: false,
            };
            let neutron = Arc::clone(neutron);
            let subnet = delegator.delegate_api(move || neutron.create_subnet(&request)).await?;
            info!("Created subnet {} ({})", subnet.name, subnet.id);
            subnet
        }
    };

    Ok((network, subnet))
}

/// Attaches `subnet_id` to the router unless an interface already exists.
pub(crate) async fn ensure_router_interface(
    neutron: &Arc<dyn NeutronApi>,
    delegator: &Delegator,
    router_id: &str,
    network_id: &str,
    subnet_id: &str,
) -> Result<(), ControllerError> {
    let interface_ports = {
        let neutron = Arc::clone(neutron);
        let router_id = router_id.to_string();
        let network_id = network_id.to_string();
        delegator
            .delegate_api(move || {
                neutron.list_ports(&[
                    ("device_owner", "network:router_interface"),
                    ("device_id", router_id.as_str()),
                    ("network_id", network_id.as_str()),
                ])
            })
            .await?
    };

    if has_router_port_for_subnet(&interface_ports, subnet_id) {
        debug!("Subnet {} is already bound to the router", subnet_id);
        return Ok(());
    }

    let neutron = Arc::clone(neutron);
    let router_id = router_id.to_string();
    let subnet_id = subnet_id.to_string();
    delegator
        .delegate_api(move || neutron.add_router_interface(&router_id, &subnet_id))
        .await?;
    Ok(())
}

/// Establishes the provisioning context, creating whatever is missing.
pub async fn ensure_networking_base(
    neutron: &Arc<dyn NeutronApi>,
    delegator: &Delegator,
    config: &ControllerConfig,
) -> Result<ProvisioningContext, ControllerError> {
    let default_security_group = ensure_default_security_group(neutron, delegator, config).await?;
    let router = ensure_router(neutron, delegator, config).await?;
    let subnet_pool = ensure_subnet_pool(neutron, delegator, config).await?;

    let (cluster_network, cluster_subnet) = ensure_network_with_subnet(
        neutron,
        delegator,
        config.cluster_network_name(),
        config.cluster_subnet_name(),
        config.cluster_subnet_cidr.clone(),
    )
    .await?;
    ensure_router_interface(neutron, delegator, &router.id, &cluster_network.id, &cluster_subnet.id)
        .await?;

    let (service_network, service_subnet) = ensure_network_with_subnet(
        neutron,
        delegator,
        config.service_network_name(),
        config.service_subnet_name(),
        config.service_subnet_cidr.clone(),
    )
    .await?;
    ensure_router_interface(neutron, delegator, &router.id, &service_network.id, &service_subnet.id)
        .await?;

    info!(
        "Networking base ready: cluster network {}, service network {}, router {}",
        cluster_network.id, service_network.id, router.id
    );

    Ok(ProvisioningContext {
        cluster_network,
        cluster_subnet,
        service_network,
        service_subnet,
        router,
        default_security_group,
        subnet_pool,
    })
}
