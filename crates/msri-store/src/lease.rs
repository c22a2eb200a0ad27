//! Per-series write lease within one process.
//!
//! Serializes merges on the same series key so they do not burn optimistic
//! retries against each other. Writers in other processes are still handled
//! by the pointer compare-and-put.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Default, Clone)]
pub struct SeriesLocks {
    inner: Arc<StdMutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl SeriesLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for and hold the lease on `key` until the guard drops.
    pub async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = {
            // A poisoned map only means another task panicked mid-insert;
            // the map itself is still usable.
            let mut map = self
                .inner
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            Arc::clone(map.entry(key.to_string()).or_default())
        };
        lock.lock_owned().await
    }
}
