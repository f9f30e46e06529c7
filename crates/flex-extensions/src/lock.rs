//! Per-id lock set.
//!
//! A mutating manager call acquires every id it may touch in one step;
//! calls with disjoint id sets proceed in parallel, overlapping calls wait
//! for each other. Acquiring all ids at once (never one by one) rules out
//! lock-order deadlocks between callers.

use std::collections::{BTreeSet, HashSet};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
pub(crate) struct IdLocks {
    busy: Mutex<HashSet<String>>,
    released: Condvar,
}

impl IdLocks {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Block until none of `ids` is held by another guard, then hold all of
    /// them.
    pub(crate) fn acquire<I, S>(&self, ids: I) -> IdLockGuard<'_>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ids: BTreeSet<String> = ids.into_iter().map(Into::into).collect();
        let mut busy = self.lock_busy();
        while ids.iter().any(|id| busy.contains(id)) {
            busy = self
                .released
                .wait(busy)
                .unwrap_or_else(PoisonError::into_inner);
        }
        busy.extend(ids.iter().cloned());
        drop(busy);

        tracing::trace!("Acquired id locks {:?}", ids);
        IdLockGuard { locks: self, ids }
    }

    fn lock_busy(&self) -> MutexGuard<'_, HashSet<String>> {
        self.busy.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Holds a set of id locks until dropped.
#[derive(Debug)]
pub(crate) struct IdLockGuard<'a> {
    locks: &'a IdLocks,
    ids: BTreeSet<String>,
}

impl IdLockGuard<'_> {
    /// Whether every id in `ids` is held by this guard.
    pub(crate) fn covers<'i>(&self, ids: impl IntoIterator<Item = &'i String>) -> bool {
        ids.into_iter().all(|id| self.ids.contains(id))
    }
}

impl Drop for IdLockGuard<'_> {
    fn drop(&mut self) {
        let mut busy = self.locks.lock_busy();
        for id in &self.ids {
            busy.remove(id);
        }
        drop(busy);
        self.locks.released.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_disjoint_sets_do_not_block() {
        let locks = IdLocks::new();
        let _a = locks.acquire(["a", "b"]);
        let _c = locks.acquire(["c"]);
    }

    #[test]
    fn test_covers() {
        let locks = IdLocks::new();
        let guard = locks.acquire(["a", "b"]);
        assert!(guard.covers(&["a".to_string()]));
        assert!(guard.covers(&["a".to_string(), "b".to_string()]));
        assert!(!guard.covers(&["a".to_string(), "c".to_string()]));
    }

    #[test]
    fn test_overlapping_set_waits_for_release() {
        let locks = Arc::new(IdLocks::new());
        let acquired = Arc::new(AtomicBool::new(false));

        let guard = locks.acquire(["a", "b"]);
        let handle = {
            let locks = Arc::clone(&locks);
            let acquired = Arc::clone(&acquired);
            thread::spawn(move || {
                let _guard = locks.acquire(["b", "c"]);
                acquired.store(true, Ordering::SeqCst);
            })
        };

        thread::sleep(Duration::from_millis(50));
        assert!(!acquired.load(Ordering::SeqCst));

        drop(guard);
        handle.join().unwrap();
        assert!(acquired.load(Ordering::SeqCst));
    }

    #[test]
    fn test_ids_are_released_on_drop() {
        let locks = IdLocks::new();
        drop(locks.acquire(["a"]));
        let _again = locks.acquire(["a"]);
    }
}
