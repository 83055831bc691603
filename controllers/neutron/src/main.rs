//! neutron-controller
//!
//! Watches Kubernetes namespaces, pods, and services and translates their
//! lifecycle events into Neutron resources:
//! - Namespace: a network and subnet behind the shared cluster router
//! - Pod: a port on its namespace's network
//! - Service: a load-balancer pool and virtual IP
//!
//! Provisioning state is persisted as annotations on the watched objects;
//! there is no private database.

mod annotations;
mod backoff;
mod config;
mod context;
mod controller;
mod delegate;
mod error;
mod reconciler;
mod registry;
mod watcher;

#[cfg(test)]
mod test_utils;

use crate::config::ControllerConfig;
use crate::controller::Controller;
use crate::error::ControllerError;
use std::env;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    tracing_subscriber::fmt::init();

    info!("Starting neutron-controller");

    // Load configuration from environment variables
    let neutron_url =
        env::var("NEUTRON_URL").unwrap_or_else(|_| "http://neutron:9696".to_string());
    let neutron_token = env::var("NEUTRON_TOKEN").map_err(|_| {
        ControllerError::InvalidConfig("NEUTRON_TOKEN environment variable is required".to_string())
    })?;

    let mut config = ControllerConfig::default();
    if let Ok(name) = env::var("BASE_NETWORK_NAME") {
        config.base_network_name = name;
    }
    if let Ok(cidr) = env::var("CLUSTER_SUBNET_CIDR") {
        config.cluster_subnet_cidr = cidr;
    }
    if let Ok(cidr) = env::var("SERVICE_SUBNET_CIDR") {
        config.service_subnet_cidr = cidr;
    }
    if let Ok(cidr) = env::var("SUBNET_POOL_CIDR") {
        config.subnet_pool_cidr = cidr;
    }
    if let Ok(method) = env::var("LB_METHOD") {
        config.lb_method = method;
    }
    if let Ok(value) = env::var("MAX_WORKERS") {
        config.max_workers = value.parse().map_err(|_| {
            ControllerError::InvalidConfig(format!("MAX_WORKERS must be a number, got {}", value))
        })?;
    }

    info!("Configuration:");
    info!("  Neutron URL: {}", neutron_url);
    info!("  Base network name: {}", config.base_network_name);
    info!("  Subnet pool: {}", config.subnet_pool_cidr);
    info!("  Worker pool size: {}", config.max_workers);

    // Initialize and run controller
    let controller = Controller::new(neutron_url, neutron_token, config).await?;
    controller.run().await?;

    Ok(())
}
