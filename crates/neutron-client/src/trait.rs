//! NeutronApi trait for mocking
//!
//! This trait abstracts the NeutronClient to enable mocking in unit tests.
//! The concrete NeutronClient implements this trait, and tests can use mock
//! implementations.
//!
//! All methods are synchronous: the Neutron API is a blocking collaborator,
//! and callers are expected to run these through a worker pool rather than on
//! an async scheduler thread.

use crate::error::NeutronError;
use crate::models::*;

/// Trait for Neutron API client operations
pub trait NeutronApi: Send + Sync {
    /// Get the base URL
    fn base_url(&self) -> &str;

    // Networks
    fn list_networks(&self, filters: &[(&str, &str)]) -> Result<Vec<Network>, NeutronError>;
    fn create_network(&self, request: &NetworkCreate) -> Result<Network, NeutronError>;
    fn delete_network(&self, id: &str) -> Result<(), NeutronError>;

    // Subnets
    fn list_subnets(&self, filters: &[(&str, &str)]) -> Result<Vec<Subnet>, NeutronError>;
    fn create_subnet(&self, request: &SubnetCreate) -> Result<Subnet, NeutronError>;

    // Ports
    fn list_ports(&self, filters: &[(&str, &str)]) -> Result<Vec<Port>, NeutronError>;
    fn create_port(&self, request: &PortCreate) -> Result<Port, NeutronError>;
    fn update_port(&self, id: &str, request: &PortUpdate) -> Result<Port, NeutronError>;
    fn delete_port(&self, id: &str) -> Result<(), NeutronError>;

    // Routers
    fn list_routers(&self, filters: &[(&str, &str)]) -> Result<Vec<Router>, NeutronError>;
    fn create_router(&self, request: &RouterCreate) -> Result<Router, NeutronError>;
    fn add_router_interface(
        &self,
        router_id: &str,
        subnet_id: &str,
    ) -> Result<RouterInterface, NeutronError>;
    fn remove_router_interface(&self, router_id: &str, subnet_id: &str)
    -> Result<(), NeutronError>;

    // Security groups
    fn list_security_groups(
        &self,
        filters: &[(&str, &str)],
    ) -> Result<Vec<SecurityGroup>, NeutronError>;
    fn create_security_group(
        &self,
        request: &SecurityGroupCreate,
    ) -> Result<SecurityGroup, NeutronError>;
    fn create_security_group_rule(
        &self,
        request: &SecurityGroupRuleCreate,
    ) -> Result<SecurityGroupRule, NeutronError>;

    // Subnet pools
    fn list_subnet_pools(&self, filters: &[(&str, &str)]) -> Result<Vec<SubnetPool>, NeutronError>;
    fn create_subnet_pool(&self, request: &SubnetPoolCreate) -> Result<SubnetPool, NeutronError>;

    // Load-balancer pools and VIPs
    fn list_pools(&self, filters: &[(&str, &str)]) -> Result<Vec<LoadBalancerPool>, NeutronError>;
    fn create_pool(&self, request: &PoolCreate) -> Result<LoadBalancerPool, NeutronError>;
    fn delete_pool(&self, id: &str) -> Result<(), NeutronError>;
    fn list_vips(&self, filters: &[(&str, &str)]) -> Result<Vec<VirtualIp>, NeutronError>;
    fn create_vip(&self, request: &VipCreate) -> Result<VirtualIp, NeutronError>;
    fn delete_vip(&self, id: &str) -> Result<(), NeutronError>;
}
