//! Controller configuration.
//!
//! All values arrive already parsed; `main.rs` owns the environment-variable
//! handling.

/// Configuration consumed by the controller core.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Base name for the cluster-wide networking resources. The router,
    /// subnet pool, default security group, cluster network/subnet, and
    /// service network/subnet all derive their well-known names from it.
    pub base_network_name: String,
    /// CIDR of the cluster-wide subnet attached to the base network.
    pub cluster_subnet_cidr: String,
    /// CIDR of the service subnet hosting service virtual IPs.
    pub service_subnet_cidr: String,
    /// Prefix handed to the subnet pool that namespace subnets draw from.
    pub subnet_pool_cidr: String,
    /// Prefix length for subnets allocated from the pool.
    pub default_prefix_len: u8,
    /// Maximum number of concurrently executing blocking Neutron calls.
    pub max_workers: usize,
    /// Load-balancing method for service pools.
    pub lb_method: String,
}

impl ControllerConfig {
    /// Name of the shared cluster router.
    pub fn router_name(&self) -> String {
        format!("{}-router", self.base_network_name)
    }

    /// Name of the default security group for managed ports.
    pub fn security_group_name(&self) -> String {
        format!("{}-sg", self.base_network_name)
    }

    /// Name of the subnet pool namespace subnets allocate from.
    pub fn subnet_pool_name(&self) -> String {
        format!("{}-pool", self.base_network_name)
    }

    /// Name of the cluster-wide network.
    pub fn cluster_network_name(&self) -> String {
        format!("{}-cluster", self.base_network_name)
    }

    /// Name of the cluster-wide subnet.
    pub fn cluster_subnet_name(&self) -> String {
        format!("{}-cluster-subnet", self.base_network_name)
    }

    /// Name of the service network.
    pub fn service_network_name(&self) -> String {
        format!("{}-service", self.base_network_name)
    }

    /// Name of the service subnet.
    pub fn service_subnet_name(&self) -> String {
        format!("{}-service-subnet", self.base_network_name)
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            base_network_name: "cluster-default".to_string(),
            cluster_subnet_cidr: "10.96.0.0/16".to_string(),
            service_subnet_cidr: "10.112.0.0/16".to_string(),
            subnet_pool_cidr: "10.0.0.0/8".to_string(),
            default_prefix_len: 24,
            max_workers: 8,
            lb_method: "ROUND_ROBIN".to_string(),
        }
    }
}
