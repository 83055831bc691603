//! Main controller implementation.
//!
//! This module contains the `Controller` struct that wires everything
//! together: the Kubernetes and Neutron clients, the delegation pool, the
//! provisioning context bootstrap, the watcher registry, and one watch loop
//! per registered endpoint.

use crate::config::ControllerConfig;
use crate::context::ensure_networking_base;
use crate::delegate::Delegator;
use crate::error::ControllerError;
use crate::reconciler::Reconciler;
use crate::reconciler::namespace::NamespaceTranslator;
use crate::reconciler::pod::PodTranslator;
use crate::reconciler::service::ServiceTranslator;
use crate::registry::WatcherRegistry;
use crate::watcher::run_watch;
use kube::Client;
use neutron_client::{NeutronApi, NeutronClient};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

/// How long run() waits for watch loops to wind down after a signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Main controller for Kubernetes-driven Neutron provisioning.
pub struct Controller {
    endpoints: Vec<String>,
    watchers: Vec<JoinHandle<()>>,
    shutdown: watch::Sender<bool>,
}

impl Controller {
    /// Creates a new controller instance.
    ///
    /// Establishes the networking base before any watcher starts, so every
    /// translator sees a fully populated provisioning context.
    pub async fn new(
        neutron_url: String,
        neutron_token: String,
        config: ControllerConfig,
    ) -> Result<Self, ControllerError> {
        info!("Initializing neutron-controller");

        let kube_client = Client::try_default().await?;
        let neutron: Arc<dyn NeutronApi> =
            Arc::new(NeutronClient::new(neutron_url, neutron_token)?);
        let delegator = Arc::new(Delegator::new(config.max_workers));

        info!("Ensuring the cluster networking base exists...");
        let ctx = ensure_networking_base(&neutron, &delegator, &config).await?;

        let reconciler = Arc::new(Reconciler::new(
            kube_client.clone(),
            neutron,
            delegator,
            Arc::new(ctx),
            config.lb_method.clone(),
        ));

        let mut registry = WatcherRegistry::new();
        registry.register(Arc::new(NamespaceTranslator::new(Arc::clone(&reconciler))))?;
        registry.register(Arc::new(PodTranslator::new(Arc::clone(&reconciler))))?;
        registry.register(Arc::new(ServiceTranslator::new(Arc::clone(&reconciler))))?;
        info!("Watched endpoints: {:?}", registry);

        let (shutdown, _) = watch::channel(false);
        let mut endpoints = Vec::new();
        let mut watchers = Vec::new();
        for (endpoint, translator) in registry.entries() {
            let handle = tokio::spawn(run_watch(
                kube_client.clone(),
                endpoint.clone(),
                Arc::clone(translator),
                shutdown.subscribe(),
            ));
            endpoints.push(endpoint.clone());
            watchers.push(handle);
        }

        Ok(Self { endpoints, watchers, shutdown })
    }

    /// Runs the controller until a shutdown signal arrives.
    ///
    /// The watch loops run for the controller's lifetime; one of them
    /// exiting on its own is treated as a failure.
    pub async fn run(self) -> Result<(), ControllerError> {
        info!("neutron-controller running");
        let Self { endpoints, watchers, shutdown } = self;
        if watchers.is_empty() {
            return Err(ControllerError::InvalidConfig("no watchers registered".to_string()));
        }

        let mut all = futures::future::select_all(watchers);
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received, stopping watchers");
                let _ = shutdown.send(true);
                // In-flight delegated calls finish in the background; the
                // provisioning context is immutable, so nothing is left
                // half-built.
                let _ = tokio::time::timeout(SHUTDOWN_GRACE, &mut all).await;
                Ok(())
            }
            (result, index, _remaining) = &mut all => {
                let endpoint = endpoints.get(index).map(String::as_str).unwrap_or("<unknown>");
                let _ = shutdown.send(true);
                match result {
                    Ok(()) => Err(ControllerError::Watch(format!(
                        "{} watcher exited unexpectedly", endpoint
                    ))),
                    Err(e) => Err(ControllerError::Watch(format!(
                        "{} watcher panicked: {}", endpoint, e
                    ))),
                }
            }
        }
    }
}
