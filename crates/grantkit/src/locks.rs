//! Keyed mutual exclusion.
//!
//! [`KeyedLocks`] hands out one mutex per key (a grantee id). Create and
//! Delete run their "show grants, decide, write" sequence under the key so
//! two workers touching the same grantee cannot both pass a conflict check.

use dashmap::DashMap;
use std::sync::{Arc, Mutex};

/// Registry of per-key locks, created lazily and never removed.
#[derive(Debug, Default)]
pub struct KeyedLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` while holding the lock for `key`.
    pub fn with_lock<T>(&self, key: &str, f: impl FnOnce() -> T) -> T {
        // Clone the Arc out so the map shard is not held while we wait.
        let lock = self
            .locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let _guard = match lock.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        log::trace!("Acquired lock for {key}");
        f()
    }

    /// Number of keys seen so far.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_with_lock_returns_closure_value() {
        let locks = KeyedLocks::new();
        assert!(locks.is_empty());
        let value = locks.with_lock("jdoe@%", || 42);
        assert_eq!(value, 42);
        assert_eq!(locks.len(), 1);

        locks.with_lock("jdoe@%", || ());
        locks.with_lock("analyst", || ());
        assert_eq!(locks.len(), 2);
    }

    #[test]
    fn test_same_key_is_serialized() {
        let locks = Arc::new(KeyedLocks::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let locks = Arc::clone(&locks);
                let inside = Arc::clone(&inside);
                let max_inside = Arc::clone(&max_inside);
                thread::spawn(move || {
                    locks.with_lock("shared", || {
                        let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                        max_inside.fetch_max(now, Ordering::SeqCst);
                        thread::sleep(Duration::from_millis(5));
                        inside.fetch_sub(1, Ordering::SeqCst);
                    });
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_poisoned_lock_is_recovered() {
        let locks = Arc::new(KeyedLocks::new());
        let poisoner = Arc::clone(&locks);
        let result = thread::spawn(move || {
            poisoner.with_lock("k", || panic!("boom"));
        })
        .join();
        assert!(result.is_err());

        assert_eq!(locks.with_lock("k", || "still usable"), "still usable");
    }
}
