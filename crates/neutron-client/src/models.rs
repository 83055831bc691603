//! Neutron API models
//!
//! These models match the Neutron v2.0 REST serializers for the resources the
//! controller manages. Response bodies are wrapped in singular/plural envelope
//! keys (`{"network": {...}}`, `{"networks": [...]}`); the client unwraps them
//! before deserializing into these types.

use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

/// Network resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Network {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default = "default_true")]
    pub admin_state_up: bool,
    #[serde(default)]
    pub subnets: Vec<String>,
}

/// Request body for creating a network
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkCreate {
    pub name: String,
    pub admin_state_up: bool,
}

/// Subnet resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subnet {
    pub id: String,
    pub name: String,
    pub network_id: String,
    pub ip_version: u8,
    /// Allocated CIDR; present even for subnets carved out of a subnet pool.
    #[serde(default)]
    pub cidr: Option<String>,
    #[serde(default)]
    pub enable_dhcp: bool,
    #[serde(default)]
    pub subnetpool_id: Option<String>,
    #[serde(default)]
    pub gateway_ip: Option<String>,
}

/// Request body for creating a subnet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubnetCreate {
    pub name: String,
    pub network_id: String,
    pub ip_version: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cidr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subnetpool_id: Option<String>,
    pub enable_dhcp: bool,
}

/// A fixed IP binding on a port
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixedIp {
    pub subnet_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
}

/// Port resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Port {
    pub id: String,
    pub name: String,
    pub network_id: String,
    #[serde(default)]
    pub device_owner: String,
    #[serde(default)]
    pub device_id: String,
    #[serde(default)]
    pub fixed_ips: Vec<FixedIp>,
    #[serde(default)]
    pub security_groups: Vec<String>,
    #[serde(default = "default_true")]
    pub admin_state_up: bool,
    #[serde(default)]
    pub status: Option<String>,
}

/// Request body for creating a port
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortCreate {
    pub name: String,
    pub network_id: String,
    pub admin_state_up: bool,
    pub device_owner: String,
    pub fixed_ips: Vec<FixedIp>,
    pub security_groups: Vec<String>,
}

/// Request body for updating a port
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PortUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security_groups: Option<Vec<String>>,
}

/// Router resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Router {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub status: Option<String>,
}

/// Request body for creating a router
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterCreate {
    pub name: String,
}

/// Result of attaching a subnet to a router
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterInterface {
    pub subnet_id: String,
    #[serde(default)]
    pub port_id: Option<String>,
}

/// Security group resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityGroup {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub security_group_rules: Vec<SecurityGroupRule>,
}

/// Request body for creating a security group
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityGroupCreate {
    pub name: String,
}

/// Security group rule resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityGroupRule {
    pub id: String,
    pub security_group_id: String,
    pub direction: String,
    pub ethertype: String,
    #[serde(default)]
    pub remote_group_id: Option<String>,
}

/// Request body for creating a security group rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityGroupRuleCreate {
    pub security_group_id: String,
    pub direction: String,
    pub ethertype: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_group_id: Option<String>,
}

/// Subnet pool resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubnetPool {
    pub id: String,
    pub name: String,
    pub prefixes: Vec<String>,
    #[serde(default)]
    pub default_prefixlen: Option<u8>,
}

/// Request body for creating a subnet pool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubnetPoolCreate {
    pub name: String,
    pub prefixes: Vec<String>,
    pub default_prefixlen: u8,
}

/// Load-balancer pool resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadBalancerPool {
    pub id: String,
    pub name: String,
    pub protocol: String,
    pub subnet_id: String,
    pub lb_method: String,
    #[serde(default)]
    pub status: Option<String>,
}

/// Request body for creating a load-balancer pool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolCreate {
    pub name: String,
    pub protocol: String,
    pub subnet_id: String,
    pub lb_method: String,
}

/// Virtual IP resource fronting a load-balancer pool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VirtualIp {
    pub id: String,
    pub name: String,
    pub pool_id: String,
    pub subnet_id: String,
    pub address: String,
    pub protocol: String,
    pub protocol_port: u16,
    #[serde(default)]
    pub status: Option<String>,
}

/// Request body for creating a virtual IP
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VipCreate {
    pub name: String,
    pub pool_id: String,
    pub subnet_id: String,
    pub address: String,
    pub protocol: String,
    pub protocol_port: u16,
}
