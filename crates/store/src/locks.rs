use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type LockMap = Mutex<HashMap<String, Arc<AsyncMutex<()>>>>;

/// One async mutex per entity id.
///
/// Writers to the same transfer (or credential record) take the guard for
/// their whole read-modify-write; different ids never contend. An id's entry
/// lives only while some task holds or waits on it.
#[derive(Debug, Default)]
pub struct KeyedLocks {
    locks: Arc<LockMap>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`
    pub async fn lock(&self, key: &str) -> KeyedGuard {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.entry(key.to_string()).or_default().clone()
        };
        KeyedGuard {
            guard: Some(lock.lock_owned().await),
            key: key.to_string(),
            locks: self.locks.clone(),
        }
    }

    /// Number of ids currently tracked
    pub fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Exclusive access to one id. Dropping it unlocks the id and forgets the
/// entry when no other task is waiting.
#[derive(Debug)]
pub struct KeyedGuard {
    guard: Option<OwnedMutexGuard<()>>,
    key: String,
    locks: Arc<LockMap>,
}

impl Drop for KeyedGuard {
    fn drop(&mut self) {
        // the owned guard holds a strong ref to the mutex
        drop(self.guard.take());

        // waiters clone the entry under this same map lock, so a count of one
        // means the map is the only owner left
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if locks
            .get(&self.key)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.key);
        }
    }
}
