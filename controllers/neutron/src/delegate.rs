//! Delegation of blocking calls to a bounded worker pool.
//!
//! The Neutron client is synchronous; running it on a scheduler thread would
//! stall every watcher in the process. `Delegator` hands such calls to
//! tokio's blocking pool while a semaphore bounds how many may be in flight
//! at once. When the pool is saturated, new delegations suspend the calling
//! task until a permit frees up — there is no unbounded queue.

use crate::error::ControllerError;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Runs blocking calls on a bounded worker pool.
#[derive(Debug, Clone)]
pub struct Delegator {
    permits: Arc<Semaphore>,
}

impl Delegator {
    /// Creates a delegator allowing at most `max_workers` concurrent calls.
    pub fn new(max_workers: usize) -> Self {
        Self { permits: Arc::new(Semaphore::new(max_workers)) }
    }

    /// Executes `call` on the blocking pool and resolves with its result.
    ///
    /// The call runs exactly once. A panic inside the call is caught by the
    /// runtime and surfaced as `ControllerError::Delegation`; it never takes
    /// the scheduler down.
    pub async fn delegate<F, T>(&self, call: F) -> Result<T, ControllerError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|e| ControllerError::Delegation(format!("worker pool closed: {}", e)))?;

        let handle = tokio::task::spawn_blocking(move || {
            let result = call();
            drop(permit);
            result
        });

        handle.await.map_err(|e| {
            if e.is_panic() {
                ControllerError::Delegation("blocking call panicked".to_string())
            } else {
                ControllerError::Delegation(format!("blocking call cancelled: {}", e))
            }
        })
    }

    /// Delegates a fallible call, flattening its error into `ControllerError`.
    pub async fn delegate_api<F, T, E>(&self, call: F) -> Result<T, ControllerError>
    where
        F: FnOnce() -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: Into<ControllerError> + Send + 'static,
    {
        self.delegate(call).await?.map_err(Into::into)
    }
}
