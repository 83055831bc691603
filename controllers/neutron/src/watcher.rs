//! Per-endpoint watch loops.
//!
//! Each registered endpoint gets one independent loop:
//! connect → stream → handle events → (on termination) back off → reconnect.
//! Events on a single endpoint are strictly serialized — the translator runs
//! to completion before the next event is read — while loops for different
//! endpoints run as independent tasks.
//!
//! A translation failure is confined to its event: the loop logs it and
//! reads on. Only stream-level conditions (EOF, transport errors, expired
//! resource versions) restart the connection.

use crate::backoff::FibonacciBackoff;
use crate::registry::{EventTranslator, EventType, ResourceEvent};
use futures::{Stream, StreamExt};
use kube::Client;
use kube::api::{Api, DynamicObject, WatchEvent, WatchParams};
use std::collections::{HashSet, VecDeque};
use std::hash::{DefaultHasher, Hash, Hasher};
use std::pin::pin;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// How many event identities to remember for redelivery suppression.
const EVENT_CACHE_CAPACITY: usize = 4096;

/// Server-side watch timeout; the loop reconnects on expiry.
const WATCH_TIMEOUT_SECS: u32 = 290;

/// Remembers recently seen events so redeliveries are dropped before they
/// reach the translator.
#[derive(Debug)]
pub(crate) struct EventCache {
    seen: HashSet<u64>,
    order: VecDeque<u64>,
    capacity: usize,
}

impl EventCache {
    pub(crate) fn new(capacity: usize) -> Self {
        Self { seen: HashSet::new(), order: VecDeque::new(), capacity }
    }

    fn key(event: &ResourceEvent) -> Option<u64> {
        // Without a uid and resourceVersion there is no stable identity to
        // dedup on; such events always pass through.
        let uid = event.object.metadata.uid.as_deref()?;
        let resource_version = event.object.metadata.resource_version.as_deref()?;
        let mut hasher = DefaultHasher::new();
        (event.event_type, uid, resource_version).hash(&mut hasher);
        Some(hasher.finish())
    }

    /// Records the event's identity; returns false when it was already seen.
    pub(crate) fn observe(&mut self, event: &ResourceEvent) -> bool {
        let Some(key) = Self::key(event) else {
            return true;
        };
        if !self.seen.insert(key) {
            return false;
        }
        self.order.push_back(key);
        if self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        true
    }
}

/// Why a streaming phase ended.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum StreamOutcome {
    /// The stream reached EOF; reconnect from the last seen version.
    Ended,
    /// Transport-level failure; reconnect after backoff.
    Failed,
    /// The stored resource version expired; reconnect from scratch.
    Expired,
    /// Shutdown was requested.
    Shutdown,
}

async fn handle_resource_event(
    endpoint: &str,
    translator: &Arc<dyn EventTranslator>,
    cache: &mut EventCache,
    event: ResourceEvent,
) {
    if !cache.observe(&event) {
        info!(
            "Skipping already-seen {} event for {:?} on {}",
            event.event_type, event.object.metadata.name, endpoint
        );
        return;
    }

    let event_type = event.event_type;
    let name = event.object.metadata.name.clone().unwrap_or_default();
    debug!("Handling {} event for {} on {}", event_type, name, endpoint);

    if let Err(e) = translator.translate(event).await {
        if e.is_transient() {
            warn!("Transient failure translating {} {} on {}: {}", event_type, name, endpoint, e);
        } else {
            error!("Failed to translate {} {} on {}: {}", event_type, name, endpoint, e);
        }
    }
}

/// Consumes one watch stream until it ends, fails, expires, or shutdown.
///
/// Events are handled strictly in arrival order, one at a time.
pub(crate) async fn consume_stream<S>(
    endpoint: &str,
    translator: &Arc<dyn EventTranslator>,
    cache: &mut EventCache,
    resource_version: &mut String,
    stream: S,
    shutdown: &mut watch::Receiver<bool>,
) -> StreamOutcome
where
    S: Stream<Item = kube::Result<WatchEvent<DynamicObject>>>,
{
    let mut stream = pin!(stream);
    loop {
        let item = tokio::select! {
            _ = shutdown.changed() => return StreamOutcome::Shutdown,
            item = stream.next() => item,
        };
        match item {
            None => {
                debug!("Watch stream for {} reached EOF", endpoint);
                return StreamOutcome::Ended;
            }
            Some(Err(e)) => {
                warn!("Watch stream error on {}: {}", endpoint, e);
                return StreamOutcome::Failed;
            }
            Some(Ok(WatchEvent::Bookmark(bookmark))) => {
                *resource_version = bookmark.metadata.resource_version.clone();
            }
            Some(Ok(WatchEvent::Error(err))) => {
                if err.code == 410 {
                    warn!("Resource version for {} expired, rewinding watch", endpoint);
                    *resource_version = "0".to_string();
                    return StreamOutcome::Expired;
                }
                warn!("Watch error event on {} ({}): {}", endpoint, err.code, err.message);
            }
            Some(Ok(WatchEvent::Added(object))) => {
                if let Some(rv) = &object.metadata.resource_version {
                    *resource_version = rv.clone();
                }
                let event = ResourceEvent { event_type: EventType::Added, object };
                handle_resource_event(endpoint, translator, cache, event).await;
            }
            Some(Ok(WatchEvent::Modified(object))) => {
                if let Some(rv) = &object.metadata.resource_version {
                    *resource_version = rv.clone();
                }
                let event = ResourceEvent { event_type: EventType::Modified, object };
                handle_resource_event(endpoint, translator, cache, event).await;
            }
            Some(Ok(WatchEvent::Deleted(object))) => {
                if let Some(rv) = &object.metadata.resource_version {
                    *resource_version = rv.clone();
                }
                let event = ResourceEvent { event_type: EventType::Deleted, object };
                handle_resource_event(endpoint, translator, cache, event).await;
            }
        }
    }
}

/// Runs the watch loop for one endpoint until shutdown.
pub(crate) async fn run_watch(
    client: Client,
    endpoint: String,
    translator: Arc<dyn EventTranslator>,
    mut shutdown: watch::Receiver<bool>,
) {
    let api: Api<DynamicObject> = Api::all_with(client, &translator.api_resource());
    let wp = WatchParams::default().timeout(WATCH_TIMEOUT_SECS);
    let mut backoff = FibonacciBackoff::default();
    let mut cache = EventCache::new(EVENT_CACHE_CAPACITY);
    let mut resource_version = "0".to_string();

    info!("Starting watcher for {}", endpoint);
    loop {
        if *shutdown.borrow() {
            break;
        }
        match api.watch(&wp, &resource_version).await {
            Ok(stream) => {
                backoff.reset();
                let outcome = consume_stream(
                    &endpoint,
                    &translator,
                    &mut cache,
                    &mut resource_version,
                    stream,
                    &mut shutdown,
                )
                .await;
                match outcome {
                    StreamOutcome::Shutdown => break,
                    StreamOutcome::Ended | StreamOutcome::Expired => continue,
                    StreamOutcome::Failed => {}
                }
            }
            Err(e) => {
                warn!("Failed to open watch for {}: {}", endpoint, e);
            }
        }
        let delay = backoff.next_delay();
        debug!("Reconnecting {} in {:?}", endpoint, delay);
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }
    info!("Watcher for {} stopped", endpoint);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ControllerError;
    use async_trait::async_trait;
    use k8s_openapi::api::core::v1::Pod;
    use kube::api::ApiResource;
    use std::sync::Mutex;
    use std::time::Duration;

    struct RecordingTranslator {
        log: Mutex<Vec<String>>,
        fail_names: Vec<String>,
        delay: Duration,
    }

    impl RecordingTranslator {
        fn new(delay: Duration) -> Arc<Self> {
            Arc::new(Self { log: Mutex::new(Vec::new()), fail_names: Vec::new(), delay })
        }

        fn failing_on(name: &str) -> Arc<Self> {
            Arc::new(Self {
                log: Mutex::new(Vec::new()),
                fail_names: vec![name.to_string()],
                delay: Duration::ZERO,
            })
        }

        fn log(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl EventTranslator for RecordingTranslator {
        fn endpoint(&self) -> &str {
            "/api/v1/pods"
        }

        fn api_resource(&self) -> ApiResource {
            ApiResource::erase::<Pod>(&())
        }

        async fn translate(&self, event: ResourceEvent) -> Result<(), ControllerError> {
            let name = event.object.metadata.name.clone().unwrap_or_default();
            self.log.lock().unwrap().push(format!("begin:{}", name));
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.log.lock().unwrap().push(format!("end:{}", name));
            if self.fail_names.contains(&name) {
                return Err(ControllerError::Watch(format!("injected failure for {}", name)));
            }
            Ok(())
        }
    }

    fn test_object(name: &str, uid: &str, resource_version: &str) -> DynamicObject {
        let ar = ApiResource::erase::<Pod>(&());
        let mut object = DynamicObject::new(name, &ar);
        object.metadata.uid = Some(uid.to_string());
        object.metadata.resource_version = Some(resource_version.to_string());
        object
    }

    fn shutdown_receiver() -> (watch::Sender<bool>, watch::Receiver<bool>) {
        watch::channel(false)
    }

    #[tokio::test]
    async fn test_events_on_one_endpoint_are_serialized() {
        let translator = RecordingTranslator::new(Duration::from_millis(30));
        let dyn_translator: Arc<dyn EventTranslator> = translator.clone();
        let mut cache = EventCache::new(16);
        let mut rv = "0".to_string();
        let (_tx, mut shutdown) = shutdown_receiver();

        let stream = futures::stream::iter(vec![
            Ok(WatchEvent::Added(test_object("pod-a", "uid-a", "1"))),
            Ok(WatchEvent::Added(test_object("pod-b", "uid-b", "2"))),
        ]);
        let outcome =
            consume_stream("/api/v1/pods", &dyn_translator, &mut cache, &mut rv, stream, &mut shutdown)
                .await;

        assert_eq!(outcome, StreamOutcome::Ended);
        // The second event's side effects never start before the first's end
        assert_eq!(translator.log(), vec!["begin:pod-a", "end:pod-a", "begin:pod-b", "end:pod-b"]);
        assert_eq!(rv, "2");
    }

    #[tokio::test]
    async fn test_redelivered_event_is_skipped() {
        let translator = RecordingTranslator::new(Duration::ZERO);
        let dyn_translator: Arc<dyn EventTranslator> = translator.clone();
        let mut cache = EventCache::new(16);
        let mut rv = "0".to_string();
        let (_tx, mut shutdown) = shutdown_receiver();

        let stream = futures::stream::iter(vec![
            Ok(WatchEvent::Added(test_object("pod-a", "uid-a", "1"))),
            Ok(WatchEvent::Added(test_object("pod-a", "uid-a", "1"))),
        ]);
        consume_stream("/api/v1/pods", &dyn_translator, &mut cache, &mut rv, stream, &mut shutdown)
            .await;

        assert_eq!(translator.log(), vec!["begin:pod-a", "end:pod-a"]);
    }

    #[tokio::test]
    async fn test_translation_failure_does_not_stop_the_stream() {
        let translator = RecordingTranslator::failing_on("pod-a");
        let dyn_translator: Arc<dyn EventTranslator> = translator.clone();
        let mut cache = EventCache::new(16);
        let mut rv = "0".to_string();
        let (_tx, mut shutdown) = shutdown_receiver();

        let stream = futures::stream::iter(vec![
            Ok(WatchEvent::Added(test_object("pod-a", "uid-a", "1"))),
            Ok(WatchEvent::Added(test_object("pod-b", "uid-b", "2"))),
        ]);
        let outcome =
            consume_stream("/api/v1/pods", &dyn_translator, &mut cache, &mut rv, stream, &mut shutdown)
                .await;

        assert_eq!(outcome, StreamOutcome::Ended);
        assert_eq!(
            translator.log(),
            vec!["begin:pod-a", "end:pod-a", "begin:pod-b", "end:pod-b"]
        );
    }

    #[tokio::test]
    async fn test_expired_resource_version_rewinds_watch() {
        let translator = RecordingTranslator::new(Duration::ZERO);
        let dyn_translator: Arc<dyn EventTranslator> = translator.clone();
        let mut cache = EventCache::new(16);
        let mut rv = "500".to_string();
        let (_tx, mut shutdown) = shutdown_receiver();

        let expired = kube::core::ErrorResponse {
            status: "Failure".to_string(),
            message: "too old resource version".to_string(),
            reason: "Expired".to_string(),
            code: 410,
        };
        let stream = futures::stream::iter(vec![Ok(WatchEvent::Error(expired))]);
        let outcome =
            consume_stream("/api/v1/pods", &dyn_translator, &mut cache, &mut rv, stream, &mut shutdown)
                .await;

        assert_eq!(outcome, StreamOutcome::Expired);
        assert_eq!(rv, "0");
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_streaming() {
        let translator = RecordingTranslator::new(Duration::ZERO);
        let dyn_translator: Arc<dyn EventTranslator> = translator.clone();
        let mut cache = EventCache::new(16);
        let mut rv = "0".to_string();
        let (tx, mut shutdown) = shutdown_receiver();

        tx.send(true).unwrap();
        let outcome = consume_stream(
            "/api/v1/pods",
            &dyn_translator,
            &mut cache,
            &mut rv,
            futures::stream::pending(),
            &mut shutdown,
        )
        .await;

        assert_eq!(outcome, StreamOutcome::Shutdown);
    }

    #[test]
    fn test_event_cache_evicts_oldest_beyond_capacity() {
        let mut cache = EventCache::new(2);
        let first = ResourceEvent {
            event_type: EventType::Added,
            object: test_object("a", "uid-a", "1"),
        };
        let second = ResourceEvent {
            event_type: EventType::Added,
            object: test_object("b", "uid-b", "2"),
        };
        let third = ResourceEvent {
            event_type: EventType::Added,
            object: test_object("c", "uid-c", "3"),
        };

        assert!(cache.observe(&first));
        assert!(cache.observe(&second));
        assert!(cache.observe(&third));
        // "a" was evicted, so it registers as fresh again
        assert!(cache.observe(&first));
        // "c" is still remembered
        assert!(!cache.observe(&third));
    }
}
