//! Mock NeutronClient for unit testing
//!
//! This module provides a mock implementation of NeutronApi that can be used
//! in unit tests without requiring a running Neutron instance.
//!
//! The mock stores resources in memory, applies name/attribute filters on
//! list operations, records every call it receives (so tests can assert on
//! call sequences), and can be told to fail specific operations.

use crate::error::NeutronError;
use crate::models::*;
use crate::neutron_api::NeutronApi;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

fn matches_filters(fields: &[(&str, &str)], filters: &[(&str, &str)]) -> bool {
    filters
        .iter()
        .all(|(key, want)| fields.iter().any(|(k, v)| k == key && v == want))
}

/// Mock NeutronClient for testing
#[derive(Clone)]
pub struct MockNeutronClient {
    base_url: String,
    // In-memory storage for resources
    networks: Arc<Mutex<HashMap<String, Network>>>,
    subnets: Arc<Mutex<HashMap<String, Subnet>>>,
    ports: Arc<Mutex<HashMap<String, Port>>>,
    routers: Arc<Mutex<HashMap<String, Router>>>,
    security_groups: Arc<Mutex<HashMap<String, SecurityGroup>>>,
    subnet_pools: Arc<Mutex<HashMap<String, SubnetPool>>>,
    pools: Arc<Mutex<HashMap<String, LoadBalancerPool>>>,
    vips: Arc<Mutex<HashMap<String, VirtualIp>>>,
    // Log of every operation, e.g. "create_network" or "delete_port:<id>"
    calls: Arc<Mutex<Vec<String>>>,
    // Operations forced to fail with Conflict
    fail_ops: Arc<Mutex<Vec<String>>>,
}

impl MockNeutronClient {
    /// Create a new mock client
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            networks: Arc::new(Mutex::new(HashMap::new())),
            subnets: Arc::new(Mutex::new(HashMap::new())),
            ports: Arc::new(Mutex::new(HashMap::new())),
            routers: Arc::new(Mutex::new(HashMap::new())),
            security_groups: Arc::new(Mutex::new(HashMap::new())),
            subnet_pools: Arc::new(Mutex::new(HashMap::new())),
            pools: Arc::new(Mutex::new(HashMap::new())),
            vips: Arc::new(Mutex::new(HashMap::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
            fail_ops: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn next_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }

    fn fail_if_requested(&self, op: &str) -> Result<(), NeutronError> {
        let mut fail_ops = self.fail_ops.lock().unwrap();
        if let Some(index) = fail_ops.iter().position(|o| o == op) {
            fail_ops.remove(index);
            return Err(NeutronError::Conflict(format!("{} forced to fail", op)));
        }
        Ok(())
    }

    /// Every call received so far, in order (for test assertions)
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Clear the call log (for test setup)
    pub fn reset_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    /// Make the next invocation of `op` fail with a Conflict error
    pub fn fail_next(&self, op: &str) {
        self.fail_ops.lock().unwrap().push(op.to_string());
    }

    /// Add a network to the mock store (for test setup)
    pub fn add_network(&self, network: Network) {
        self.networks.lock().unwrap().insert(network.id.clone(), network);
    }

    /// Add a subnet to the mock store (for test setup)
    pub fn add_subnet(&self, subnet: Subnet) {
        self.subnets.lock().unwrap().insert(subnet.id.clone(), subnet);
    }

    /// Add a port to the mock store (for test setup)
    pub fn add_port(&self, port: Port) {
        self.ports.lock().unwrap().insert(port.id.clone(), port);
    }

    /// Add a router to the mock store (for test setup)
    pub fn add_router(&self, router: Router) {
        self.routers.lock().unwrap().insert(router.id.clone(), router);
    }

    /// Number of networks currently in the store
    pub fn network_count(&self) -> usize {
        self.networks.lock().unwrap().len()
    }

    /// Number of subnets currently in the store
    pub fn subnet_count(&self) -> usize {
        self.subnets.lock().unwrap().len()
    }

    /// Number of ports currently in the store
    pub fn port_count(&self) -> usize {
        self.ports.lock().unwrap().len()
    }

    /// Number of load-balancer pools currently in the store
    pub fn pool_count(&self) -> usize {
        self.pools.lock().unwrap().len()
    }

    /// Number of VIPs currently in the store
    pub fn vip_count(&self) -> usize {
        self.vips.lock().unwrap().len()
    }
}

impl NeutronApi for MockNeutronClient {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn list_networks(&self, filters: &[(&str, &str)]) -> Result<Vec<Network>, NeutronError> {
        self.record("list_networks");
        let networks = self.networks.lock().unwrap();
        Ok(networks
            .values()
            .filter(|n| matches_filters(&[("name", n.name.as_str()), ("id", n.id.as_str())], filters))
            .cloned()
            .collect())
    }

    fn create_network(&self, request: &NetworkCreate) -> Result<Network, NeutronError> {
        self.record("create_network");
        self.fail_if_requested("create_network")?;
        let network = Network {
            id: Self::next_id(),
            name: request.name.clone(),
            status: Some("ACTIVE".to_string()),
            admin_state_up: request.admin_state_up,
            subnets: Vec::new(),
        };
        self.add_network(network.clone());
        Ok(network)
    }

    fn delete_network(&self, id: &str) -> Result<(), NeutronError> {
        self.record(format!("delete_network:{}", id));
        let removed = self.networks.lock().unwrap().remove(id);
        if removed.is_none() {
            return Err(NeutronError::NotFound(format!("network {}", id)));
        }
        // Neutron cascades subnet deletion with the network
        self.subnets.lock().unwrap().retain(|_, s| s.network_id != id);
        Ok(())
    }

    fn list_subnets(&self, filters: &[(&str, &str)]) -> Result<Vec<Subnet>, NeutronError> {
        self.record("list_subnets");
        let subnets = self.subnets.lock().unwrap();
        Ok(subnets
            .values()
            .filter(|s| {
                let cidr = s.cidr.as_deref().unwrap_or("");
                matches_filters(
                    &[
                        ("name", s.name.as_str()),
                        ("network_id", s.network_id.as_str()),
                        ("cidr", cidr),
                    ],
                    filters,
                )
            })
            .cloned()
            .collect())
    }

    fn create_subnet(&self, request: &SubnetCreate) -> Result<Subnet, NeutronError> {
        self.record("create_subnet");
        self.fail_if_requested("create_subnet")?;
        let subnet = Subnet {
            id: Self::next_id(),
            name: request.name.clone(),
            network_id: request.network_id.clone(),
            ip_version: request.ip_version,
            cidr: request.cidr.clone().or_else(|| Some("10.10.0.0/24".to_string())),
            enable_dhcp: request.enable_dhcp,
            subnetpool_id: request.subnetpool_id.clone(),
            gateway_ip: None,
        };
        if let Some(network) = self.networks.lock().unwrap().get_mut(&request.network_id) {
            network.subnets.push(subnet.id.clone());
        }
        self.add_subnet(subnet.clone());
        Ok(subnet)
    }

    fn list_ports(&self, filters: &[(&str, &str)]) -> Result<Vec<Port>, NeutronError> {
        self.record("list_ports");
        let ports = self.ports.lock().unwrap();
        Ok(ports
            .values()
            .filter(|p| {
                matches_filters(
                    &[
                        ("name", p.name.as_str()),
                        ("network_id", p.network_id.as_str()),
                        ("device_owner", p.device_owner.as_str()),
                        ("device_id", p.device_id.as_str()),
                    ],
                    filters,
                )
            })
            .cloned()
            .collect())
    }

    fn create_port(&self, request: &PortCreate) -> Result<Port, NeutronError> {
        self.record("create_port");
        self.fail_if_requested("create_port")?;
        let port = Port {
            id: Self::next_id(),
            name: request.name.clone(),
            network_id: request.network_id.clone(),
            device_owner: request.device_owner.clone(),
            device_id: String::new(),
            fixed_ips: request.fixed_ips.clone(),
            security_groups: request.security_groups.clone(),
            admin_state_up: request.admin_state_up,
            status: Some("ACTIVE".to_string()),
        };
        self.add_port(port.clone());
        Ok(port)
    }

    fn update_port(&self, id: &str, request: &PortUpdate) -> Result<Port, NeutronError> {
        self.record(format!("update_port:{}", id));
        self.fail_if_requested("update_port")?;
        let mut ports = self.ports.lock().unwrap();
        let port = ports
            .get_mut(id)
            .ok_or_else(|| NeutronError::NotFound(format!("port {}", id)))?;
        if let Some(security_groups) = &request.security_groups {
            port.security_groups = security_groups.clone();
        }
        Ok(port.clone())
    }

    fn delete_port(&self, id: &str) -> Result<(), NeutronError> {
        self.record(format!("delete_port:{}", id));
        if self.ports.lock().unwrap().remove(id).is_none() {
            return Err(NeutronError::NotFound(format!("port {}", id)));
        }
        Ok(())
    }

    fn list_routers(&self, filters: &[(&str, &str)]) -> Result<Vec<Router>, NeutronError> {
        self.record("list_routers");
        let routers = self.routers.lock().unwrap();
        Ok(routers
            .values()
            .filter(|r| matches_filters(&[("name", r.name.as_str())], filters))
            .cloned()
            .collect())
    }

    fn create_router(&self, request: &RouterCreate) -> Result<Router, NeutronError> {
        self.record("create_router");
        self.fail_if_requested("create_router")?;
        let router = Router {
            id: Self::next_id(),
            name: request.name.clone(),
            status: Some("ACTIVE".to_string()),
        };
        self.add_router(router.clone());
        Ok(router)
    }

    fn add_router_interface(
        &self,
        router_id: &str,
        subnet_id: &str,
    ) -> Result<RouterInterface, NeutronError> {
        self.record(format!("add_router_interface:{}:{}", router_id, subnet_id));
        self.fail_if_requested("add_router_interface")?;
        let network_id = self
            .subnets
            .lock()
            .unwrap()
            .get(subnet_id)
            .map(|s| s.network_id.clone())
            .ok_or_else(|| NeutronError::NotFound(format!("subnet {}", subnet_id)))?;
        // Attaching a subnet materializes a router-interface port on its network
        let port = Port {
            id: Self::next_id(),
            name: String::new(),
            network_id,
            device_owner: "network:router_interface".to_string(),
            device_id: router_id.to_string(),
            fixed_ips: vec![FixedIp { subnet_id: subnet_id.to_string(), ip_address: None }],
            security_groups: Vec::new(),
            admin_state_up: true,
            status: Some("ACTIVE".to_string()),
        };
        let port_id = port.id.clone();
        self.add_port(port);
        Ok(RouterInterface { subnet_id: subnet_id.to_string(), port_id: Some(port_id) })
    }

    fn remove_router_interface(
        &self,
        router_id: &str,
        subnet_id: &str,
    ) -> Result<(), NeutronError> {
        self.record(format!("remove_router_interface:{}:{}", router_id, subnet_id));
        let mut ports = self.ports.lock().unwrap();
        let matching: Vec<String> = ports
            .values()
            .filter(|p| {
                p.device_owner == "network:router_interface"
                    && p.device_id == router_id
                    && p.fixed_ips.iter().any(|fip| fip.subnet_id == subnet_id)
            })
            .map(|p| p.id.clone())
            .collect();
        if matching.is_empty() {
            return Err(NeutronError::NotFound(format!(
                "router {} has no interface on subnet {}",
                router_id, subnet_id
            )));
        }
        for id in matching {
            ports.remove(&id);
        }
        Ok(())
    }

    fn list_security_groups(
        &self,
        filters: &[(&str, &str)],
    ) -> Result<Vec<SecurityGroup>, NeutronError> {
        self.record("list_security_groups");
        let groups = self.security_groups.lock().unwrap();
        Ok(groups
            .values()
            .filter(|g| matches_filters(&[("name", g.name.as_str())], filters))
            .cloned()
            .collect())
    }

    fn create_security_group(
        &self,
        request: &SecurityGroupCreate,
    ) -> Result<SecurityGroup, NeutronError> {
        self.record("create_security_group");
        self.fail_if_requested("create_security_group")?;
        let group = SecurityGroup {
            id: Self::next_id(),
            name: request.name.clone(),
            description: String::new(),
            security_group_rules: Vec::new(),
        };
        self.security_groups.lock().unwrap().insert(group.id.clone(), group.clone());
        Ok(group)
    }

    fn create_security_group_rule(
        &self,
        request: &SecurityGroupRuleCreate,
    ) -> Result<SecurityGroupRule, NeutronError> {
        self.record("create_security_group_rule");
        self.fail_if_requested("create_security_group_rule")?;
        let rule = SecurityGroupRule {
            id: Self::next_id(),
            security_group_id: request.security_group_id.clone(),
            direction: request.direction.clone(),
            ethertype: request.ethertype.clone(),
            remote_group_id: request.remote_group_id.clone(),
        };
        let mut groups = self.security_groups.lock().unwrap();
        let group = groups.get_mut(&request.security_group_id).ok_or_else(|| {
            NeutronError::NotFound(format!("security group {}", request.security_group_id))
        })?;
        group.security_group_rules.push(rule.clone());
        Ok(rule)
    }

    fn list_subnet_pools(&self, filters: &[(&str, &str)]) -> Result<Vec<SubnetPool>, NeutronError> {
        self.record("list_subnet_pools");
        let pools = self.subnet_pools.lock().unwrap();
        Ok(pools
            .values()
            .filter(|p| matches_filters(&[("name", p.name.as_str())], filters))
            .cloned()
            .collect())
    }

    fn create_subnet_pool(&self, request: &SubnetPoolCreate) -> Result<SubnetPool, NeutronError> {
        self.record("create_subnet_pool");
        self.fail_if_requested("create_subnet_pool")?;
        let pool = SubnetPool {
            id: Self::next_id(),
            name: request.name.clone(),
            prefixes: request.prefixes.clone(),
            default_prefixlen: Some(request.default_prefixlen),
        };
        self.subnet_pools.lock().unwrap().insert(pool.id.clone(), pool.clone());
        Ok(pool)
    }

    fn list_pools(&self, filters: &[(&str, &str)]) -> Result<Vec<LoadBalancerPool>, NeutronError> {
        self.record("list_pools");
        let pools = self.pools.lock().unwrap();
        Ok(pools
            .values()
            .filter(|p| {
                matches_filters(
                    &[("name", p.name.as_str()), ("subnet_id", p.subnet_id.as_str())],
                    filters,
                )
            })
            .cloned()
            .collect())
    }

    fn create_pool(&self, request: &PoolCreate) -> Result<LoadBalancerPool, NeutronError> {
        self.record("create_pool");
        self.fail_if_requested("create_pool")?;
        let pool = LoadBalancerPool {
            id: Self::next_id(),
            name: request.name.clone(),
            protocol: request.protocol.clone(),
            subnet_id: request.subnet_id.clone(),
            lb_method: request.lb_method.clone(),
            status: Some("ACTIVE".to_string()),
        };
        self.pools.lock().unwrap().insert(pool.id.clone(), pool.clone());
        Ok(pool)
    }

    fn delete_pool(&self, id: &str) -> Result<(), NeutronError> {
        self.record(format!("delete_pool:{}", id));
        if self.pools.lock().unwrap().remove(id).is_none() {
            return Err(NeutronError::NotFound(format!("pool {}", id)));
        }
        Ok(())
    }

    fn list_vips(&self, filters: &[(&str, &str)]) -> Result<Vec<VirtualIp>, NeutronError> {
        self.record("list_vips");
        let vips = self.vips.lock().unwrap();
        Ok(vips
            .values()
            .filter(|v| {
                matches_filters(
                    &[("name", v.name.as_str()), ("pool_id", v.pool_id.as_str())],
                    filters,
                )
            })
            .cloned()
            .collect())
    }

    fn create_vip(&self, request: &VipCreate) -> Result<VirtualIp, NeutronError> {
        self.record("create_vip");
        self.fail_if_requested("create_vip")?;
        let vip = VirtualIp {
            id: Self::next_id(),
            name: request.name.clone(),
            pool_id: request.pool_id.clone(),
            subnet_id: request.subnet_id.clone(),
            address: request.address.clone(),
            protocol: request.protocol.clone(),
            protocol_port: request.protocol_port,
            status: Some("ACTIVE".to_string()),
        };
        self.vips.lock().unwrap().insert(vip.id.clone(), vip.clone());
        Ok(vip)
    }

    fn delete_vip(&self, id: &str) -> Result<(), NeutronError> {
        self.record(format!("delete_vip:{}", id));
        if self.vips.lock().unwrap().remove(id).is_none() {
            return Err(NeutronError::NotFound(format!("vip {}", id)));
        }
        Ok(())
    }
}
