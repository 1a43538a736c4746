//! Explicit mutual-exclusion wrapper.
//!
//! All mutation of shared state goes through [`Locked::with_lock`], so the
//! critical section is always visible at the call site and can never leak a
//! guard across an `.await` or a callback.

use std::sync::{Mutex, PoisonError};

/// A value guarded by a mutex, accessed only through closures.
#[derive(Debug, Default)]
pub struct Locked<T> {
    inner: Mutex<T>,
}

impl<T> Locked<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(value),
        }
    }

    /// Run `body` with exclusive access to the value and return its result.
    ///
    /// A poisoned lock is recovered: every critical section in this crate
    /// leaves the value consistent before it can panic.
    pub fn with_lock<R>(&self, body: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        body(&mut guard)
    }

    /// Consume the wrapper and return the guarded value.
    pub fn into_inner(self) -> T {
        self.inner.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Clone> Locked<T> {
    /// Clone the current value out of the lock.
    pub fn snapshot(&self) -> T {
        self.with_lock(|value| value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn with_lock_mutates_and_returns_value() {
        let counter = Locked::new(1_u32);
        let previous = counter.with_lock(|value| {
            let previous = *value;
            *value += 41;
            previous
        });
        assert_eq!(previous, 1);
        assert_eq!(counter.snapshot(), 42);
    }

    #[test]
    fn poisoned_lock_is_recovered() {
        let shared = Arc::new(Locked::new(vec![1, 2]));
        let cloned = Arc::clone(&shared);
        let _ = std::thread::spawn(move || {
            cloned.with_lock(|values| {
                values.push(3);
                panic!("poison the mutex");
            })
        })
        .join();

        assert_eq!(shared.snapshot(), vec![1, 2, 3]);
    }

    #[test]
    fn concurrent_increments_are_serialized() {
        let shared = Arc::new(Locked::new(0_u64));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let shared = Arc::clone(&shared);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        shared.with_lock(|value| *value += 1);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("worker thread");
        }
        assert_eq!(Arc::try_unwrap(shared).expect("sole owner").into_inner(), 8000);
    }
}
