//! Watcher registration and dispatch.
//!
//! A translator is the capability of turning one kind of watch event into
//! provisioning actions: it names the endpoint it consumes, the API resource
//! behind it, and the translation itself. The registry composes translators
//! onto a controller as an explicit endpoint → callback mapping; the
//! controller core runs one consumption loop per entry.

use crate::error::ControllerError;
use async_trait::async_trait;
use kube::api::{ApiResource, DynamicObject};
use std::fmt;
use std::sync::Arc;

/// Lifecycle event types delivered by a watch stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    Added,
    Modified,
    Deleted,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventType::Added => write!(f, "ADDED"),
            EventType::Modified => write!(f, "MODIFIED"),
            EventType::Deleted => write!(f, "DELETED"),
        }
    }
}

/// One decoded notification from a watch stream.
#[derive(Debug, Clone)]
pub struct ResourceEvent {
    pub event_type: EventType,
    pub object: DynamicObject,
}

/// The capability of translating one kind of watch event into idempotent
/// provisioning operations.
///
/// Both members are required by construction: a type without an endpoint or
/// without a translation simply does not implement the trait, so a malformed
/// watcher cannot exist at runtime.
#[async_trait]
pub trait EventTranslator: Send + Sync {
    /// The watch endpoint this translator consumes, e.g. `/api/v1/pods`.
    fn endpoint(&self) -> &str;

    /// Group/version/kind of the watched resource.
    fn api_resource(&self) -> ApiResource;

    /// Translates a single event. Runs to completion before the next event
    /// on the same endpoint is handed over.
    async fn translate(&self, event: ResourceEvent) -> Result<(), ControllerError>;
}

/// Ordered endpoint → translator mapping for one controller instance.
#[derive(Default)]
pub struct WatcherRegistry {
    entries: Vec<(String, Arc<dyn EventTranslator>)>,
}

impl WatcherRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a translator under its endpoint.
    ///
    /// Registering a second translator for the same endpoint replaces the
    /// first (last registration wins). An empty endpoint is rejected here,
    /// before any event is ever processed.
    pub fn register(&mut self, translator: Arc<dyn EventTranslator>) -> Result<(), ControllerError> {
        let endpoint = translator.endpoint().to_string();
        if endpoint.is_empty() {
            return Err(ControllerError::InvalidWatcher(
                "watch endpoint must not be empty".to_string(),
            ));
        }
        if let Some(entry) = self.entries.iter_mut().find(|(e, _)| *e == endpoint) {
            entry.1 = translator;
        } else {
            self.entries.push((endpoint, translator));
        }
        Ok(())
    }

    /// The registered endpoint → translator pairs, in registration order.
    pub fn entries(&self) -> &[(String, Arc<dyn EventTranslator>)] {
        &self.entries
    }

    /// Number of registered endpoints.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing has been registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for WatcherRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.entries.iter().map(|(endpoint, _)| endpoint)).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::Pod;

    struct StubTranslator {
        endpoint: &'static str,
    }

    #[async_trait]
    impl EventTranslator for StubTranslator {
        fn endpoint(&self) -> &str {
            self.endpoint
        }

        fn api_resource(&self) -> ApiResource {
            ApiResource::erase::<Pod>(&())
        }

        async fn translate(&self, _event: ResourceEvent) -> Result<(), ControllerError> {
            Ok(())
        }
    }

    #[test]
    fn test_register_rejects_empty_endpoint() {
        let mut registry = WatcherRegistry::new();
        let result = registry.register(Arc::new(StubTranslator { endpoint: "" }));
        assert!(matches!(result, Err(ControllerError::InvalidWatcher(_))));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_register_accumulates_one_entry_per_endpoint() {
        let mut registry = WatcherRegistry::new();
        let pods: Arc<dyn EventTranslator> = Arc::new(StubTranslator { endpoint: "/api/v1/pods" });
        let namespaces: Arc<dyn EventTranslator> =
            Arc::new(StubTranslator { endpoint: "/api/v1/namespaces" });

        registry.register(Arc::clone(&pods)).unwrap();
        registry.register(Arc::clone(&namespaces)).unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.entries()[0].0, "/api/v1/pods");
        assert_eq!(registry.entries()[1].0, "/api/v1/namespaces");
        // Each entry's callback is the registered translator itself
        assert!(Arc::ptr_eq(&registry.entries()[0].1, &pods));
        assert!(Arc::ptr_eq(&registry.entries()[1].1, &namespaces));
    }

    #[test]
    fn test_register_same_endpoint_last_wins() {
        let mut registry = WatcherRegistry::new();
        let first: Arc<dyn EventTranslator> = Arc::new(StubTranslator { endpoint: "/api/v1/pods" });
        let second: Arc<dyn EventTranslator> = Arc::new(StubTranslator { endpoint: "/api/v1/pods" });

        registry.register(Arc::clone(&first)).unwrap();
        registry.register(Arc::clone(&second)).unwrap();

        assert_eq!(registry.len(), 1);
        assert!(Arc::ptr_eq(&registry.entries()[0].1, &second));
    }
}
