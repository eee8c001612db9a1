//! Per-container deploy locks

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

/// Exclusive right to deploy one container.
///
/// Dropping the lease releases it, so unwinding out of a deploy can never
/// leave a container locked.
#[derive(Debug)]
pub struct Lease {
    key: String,
    _guard: OwnedMutexGuard<()>,
}

impl Lease {
    pub fn key(&self) -> &str {
        &self.key
    }
}

/// Outcome of a lock attempt
#[derive(Debug)]
pub enum Acquire {
    Acquired(Lease),
    Busy,
}

/// Hands out at most one lease per container key.
///
/// Lock handles are created lazily. The table mutex is only held while
/// looking up a handle, never across a deploy.
#[derive(Debug, Default)]
pub struct DeployLockManager {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl DeployLockManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the lease for `key`, or report `Busy` without waiting
    pub fn try_acquire(&self, key: &str) -> Acquire {
        let handle = {
            let mut locks = self.table();
            locks
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };

        match handle.try_lock_owned() {
            Ok(guard) => {
                debug!("Deploy lock acquired: {}", key);
                Acquire::Acquired(Lease {
                    key: key.to_string(),
                    _guard: guard,
                })
            }
            Err(_) => {
                debug!("Deploy lock busy: {}", key);
                Acquire::Busy
            }
        }
    }

    /// Give a lease back
    pub fn release(&self, lease: Lease) {
        debug!("Deploy lock released: {}", lease.key);
        drop(lease);
    }

    /// Whether a deploy currently holds `key`
    pub fn is_held(&self, key: &str) -> bool {
        self.table()
            .get(key)
            .map(|handle| handle.try_lock().is_err())
            .unwrap_or(false)
    }

    fn table(&self) -> MutexGuard<'_, HashMap<String, Arc<AsyncMutex<()>>>> {
        // a panic while holding the table lock cannot leave the map inconsistent
        self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
