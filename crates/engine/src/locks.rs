//! Per-identity-key async locks.
//!
//! Reconciliations that share an email or phone number are serialized here
//! before they ever reach the store; reconciliations on disjoint identities
//! never wait on each other.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::OwnedMutexGuard;

type Slot = Arc<tokio::sync::Mutex<()>>;

/// A table of named async mutexes, created on demand and dropped once no
/// task holds or waits for them.
#[derive(Default)]
pub struct KeyLocks {
    slots: Mutex<HashMap<String, Slot>>,
}

impl KeyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Lock every key, in sorted order, and hold them until the guard drops.
    pub async fn acquire(&self, keys: &[String]) -> KeyGuard<'_> {
        let mut keys = keys.to_vec();
        keys.sort();
        keys.dedup();

        // Built up front so a cancelled acquire still prunes what it touched.
        let mut guard = KeyGuard {
            locks: self,
            held: Vec::with_capacity(keys.len()),
        };
        for key in keys {
            let slot = self.table().entry(key.clone()).or_default().clone();
            guard.held.push((key, None));
            let locked = slot.lock_owned().await;
            if let Some(last) = guard.held.last_mut() {
                last.1 = Some(locked);
            }
        }
        guard
    }

    /// Number of keys currently held or awaited.
    pub fn len(&self) -> usize {
        self.table().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Releases its keys on drop.
pub struct KeyGuard<'a> {
    locks: &'a KeyLocks,
    held: Vec<(String, Option<OwnedMutexGuard<()>>)>,
}

impl KeyGuard<'_> {
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.held.iter().map(|(key, _)| key.as_str())
    }
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        let mut table = self.locks.table();
        for (key, locked) in self.held.drain(..) {
            drop(locked);
            let unused = table
                .get(&key)
                .is_some_and(|slot| Arc::strong_count(slot) == 1);
            if unused {
                table.remove(&key);
            }
        }
    }
}
