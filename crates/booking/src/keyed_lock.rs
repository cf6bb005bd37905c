//! Per-key async mutual exclusion with a bounded wait.
//!
//! Each key maps to its own `tokio::sync::Mutex`; unrelated keys never
//! contend. Entries are dropped once no guard or waiter references them.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Returned when a key could not be acquired within the allowed wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("timed out waiting for keyed lock")]
pub struct LockTimeout;

pub struct KeyedLock<K> {
    entries: Mutex<HashMap<K, Arc<AsyncMutex<()>>>>,
}

/// Holds a key until dropped.
pub struct KeyGuard {
    _guard: OwnedMutexGuard<()>,
}

impl<K> KeyedLock<K>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn entry(&self, key: &K) -> Arc<AsyncMutex<()>> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        // Only the map holds a reference: nobody is holding or waiting.
        entries.retain(|_, m| Arc::strong_count(m) > 1);
        entries
            .entry(key.clone())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Acquire `key`, waiting at most `wait`.
    pub async fn acquire(&self, key: K, wait: Duration) -> Result<KeyGuard, LockTimeout> {
        let mutex = self.entry(&key);
        match tokio::time::timeout(wait, mutex.lock_owned()).await {
            Ok(guard) => Ok(KeyGuard { _guard: guard }),
            Err(_) => Err(LockTimeout),
        }
    }

    /// Number of keys currently tracked.
    pub fn tracked(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .filter(|m| Arc::strong_count(m) > 1)
            .count()
    }
}

impl<K> Default for KeyedLock<K>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
