//! Neutron REST API Client
//!
//! A Rust client library for the Neutron v2.0 networking API, covering the
//! resources the neutron-controller provisions: networks, subnets, ports,
//! routers and router interfaces, security groups, subnet pools, and
//! load-balancer pools/VIPs.
//!
//! The client is intentionally *blocking* (`reqwest::blocking`): the
//! controller treats the networking API as a blocking collaborator and only
//! invokes it through its bounded delegation pool, never on a scheduler
//! thread.
//!
//! # Example
//!
//! ```no_run
//! use neutron_client::{NetworkCreate, NeutronApi, NeutronClient};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = NeutronClient::new(
//!     "http://neutron:9696".to_string(),
//!     "your-keystone-token".to_string(),
//! )?;
//!
//! // Look up a network by name
//! let networks = client.list_networks(&[("name", "team-a")])?;
//!
//! // Create it when absent
//! if networks.is_empty() {
//!     let network = client.create_network(&NetworkCreate {
//!         name: "team-a".to_string(),
//!         admin_state_up: true,
//!     })?;
//!     println!("created network {}", network.id);
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod models;
#[path = "trait.rs"]
pub mod neutron_api;
#[cfg(feature = "test-util")]
pub mod mock;

pub use client::NeutronClient;
pub use error::NeutronError;
pub use models::*;
pub use neutron_api::NeutronApi;
#[cfg(feature = "test-util")]
pub use mock::MockNeutronClient;
