/*!
 * Named mutex registry: a process-wide map from string key to a single-permit
 * semaphore, used to serialize access to a caller-defined critical section
 * (e.g. "don't run two scans of the same root concurrently").
 *
 * Grounded on `orbit::core::concurrency::ConcurrencyLimiter` (`Mutex` +
 * `Condvar`-backed permit, release on `Drop`), generalized from a
 * fixed-capacity counting semaphore to a single-permit registry keyed by an
 * arbitrary string, with a bounded wait instead of an unbounded `acquire`.
 */

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, OnceLock};
use std::time::{Duration, Instant};

struct Slot {
    held: Mutex<bool>,
    condvar: Condvar,
}

impl Slot {
    fn new() -> Self {
        Self {
            held: Mutex::new(false),
            condvar: Condvar::new(),
        }
    }

    /// Block until the slot is free or `timeout` elapses. Returns `true` if
    /// the permit was acquired.
    fn try_acquire(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut held = self.held.lock().unwrap();
        while *held {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, result) = self.condvar.wait_timeout(held, deadline - now).unwrap();
            held = guard;
            if result.timed_out() && *held {
                return false;
            }
        }
        *held = true;
        true
    }

    fn release(&self) {
        let mut held = self.held.lock().unwrap();
        *held = false;
        self.condvar.notify_one();
    }
}

/// A keyed registry of single-permit semaphores.
///
/// No fairness guarantee across waiters competing for the same key. Not
/// reentrant: a thread already holding a key that calls `try_with` again on
/// the same key will wait behind itself and, in practice, time out.
#[derive(Clone, Default)]
pub struct NamedMutexRegistry {
    slots: Arc<Mutex<HashMap<String, Arc<Slot>>>>,
}

impl NamedMutexRegistry {
    pub fn new() -> Self {
        Self {
            slots: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn slot_for(&self, key: &str) -> Arc<Slot> {
        let mut slots = self.slots.lock().unwrap();
        slots
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Slot::new()))
            .clone()
    }

    /// Run `action` while holding the permit for `key`, waiting up to
    /// `timeout` to acquire it. Returns `false` without running `action` if
    /// the timeout elapses first. The permit is released on every exit path,
    /// including a panic inside `action`.
    pub fn try_with<F, R>(&self, key: &str, timeout: Duration, action: F) -> Option<R>
    where
        F: FnOnce() -> R,
    {
        let slot = self.slot_for(key);
        if !slot.try_acquire(timeout) {
            return None;
        }

        struct ReleaseGuard<'a>(&'a Slot);
        impl Drop for ReleaseGuard<'_> {
            fn drop(&mut self) {
                self.0.release();
            }
        }
        let _guard = ReleaseGuard(&slot);

        Some(action())
    }
}

/// The process-wide registry shared by default across all callers that don't
/// construct their own [`NamedMutexRegistry`].
pub fn global() -> &'static NamedMutexRegistry {
    static GLOBAL: OnceLock<NamedMutexRegistry> = OnceLock::new();
    GLOBAL.get_or_init(NamedMutexRegistry::new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn runs_action_when_key_is_free() {
        let registry = NamedMutexRegistry::new();
        let ran = registry.try_with("job-1", Duration::from_millis(50), || 42);
        assert_eq!(ran, Some(42));
    }

    #[test]
    fn distinct_keys_do_not_contend() {
        let registry = NamedMutexRegistry::new();
        let a = registry.try_with("a", Duration::from_millis(50), || 1);
        let b = registry.try_with("b", Duration::from_millis(50), || 2);
        assert_eq!(a, Some(1));
        assert_eq!(b, Some(2));
    }

    #[test]
    fn second_caller_waits_then_times_out_while_first_holds() {
        let registry = NamedMutexRegistry::new();
        let registry2 = registry.clone();
        let counter = Arc::new(AtomicUsize::new(0));
        let counter2 = counter.clone();

        let holder = thread::spawn(move || {
            registry2.try_with("shared", Duration::from_millis(500), || {
                counter2.fetch_add(1, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(200));
            })
        });

        thread::sleep(Duration::from_millis(30));
        let result = registry.try_with("shared", Duration::from_millis(50), || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert!(result.is_none());
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        holder.join().unwrap().unwrap();
    }

    #[test]
    fn permit_is_released_after_a_panicking_action() {
        let registry = NamedMutexRegistry::new();
        let key = "panicky";

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            registry.try_with(key, Duration::from_millis(50), || {
                panic!("boom");
            })
        }));
        assert!(result.is_err());

        // The permit must have been released by the guard's Drop even though
        // the closure panicked.
        let ran = registry.try_with(key, Duration::from_millis(50), || 7);
        assert_eq!(ran, Some(7));
    }

    #[test]
    fn global_registry_is_a_singleton() {
        let a = global() as *const NamedMutexRegistry;
        let b = global() as *const NamedMutexRegistry;
        assert_eq!(a, b);
    }
}
