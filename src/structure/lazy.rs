// Copyright 2025 Cowboy AI, LLC.

use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

/// Lazily initialized shared value
///
/// Double-checked: readers take the read lock; the first initializer
/// re-checks under the write lock so exactly one thread runs the
/// initializer and every other thread observes its result. Failed
/// initializations are not cached.
pub struct LazyHandle<T: ?Sized> {
    value: RwLock<Option<Arc<T>>>,
}

impl<T: ?Sized> LazyHandle<T> {
    /// An uninitialized handle
    pub fn new() -> Self {
        Self {
            value: RwLock::new(None),
        }
    }

    /// The value, initializing it with `init` on first use
    pub fn get_or_try_init<E>(&self, init: impl FnOnce() -> Result<Arc<T>, E>) -> Result<Arc<T>, E> {
        if let Some(value) = self.value.read().as_ref() {
            return Ok(value.clone());
        }

        let mut write = self.value.write();
        if let Some(value) = write.as_ref() {
            return Ok(value.clone());
        }

        let value = init()?;
        *write = Some(value.clone());
        Ok(value)
    }

    /// The value if initialized
    pub fn get(&self) -> Option<Arc<T>> {
        self.value.read().clone()
    }

    /// Whether the value has been initialized
    pub fn is_initialized(&self) -> bool {
        self.value.read().is_some()
    }

    /// Remove and return the value
    pub fn take(&self) -> Option<Arc<T>> {
        self.value.write().take()
    }
}

impl<T: ?Sized> Default for LazyHandle<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> fmt::Debug for LazyHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyHandle")
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn test_initializer_runs_once_across_threads() {
        let handle = Arc::new(LazyHandle::<String>::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let workers: Vec<_> = (0..8)
            .map(|_| {
                let handle = handle.clone();
                let calls = calls.clone();
                thread::spawn(move || {
                    handle
                        .get_or_try_init(|| {
                            calls.fetch_add(1, Ordering::SeqCst);
                            Ok::<_, ()>(Arc::new("store".to_string()))
                        })
                        .unwrap()
                })
            })
            .collect();

        for worker in workers {
            assert_eq!(worker.join().unwrap().as_str(), "store");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failures_are_not_cached() {
        let handle = LazyHandle::<u32>::new();
        assert!(handle.get_or_try_init(|| Err("not yet")).is_err());
        assert!(!handle.is_initialized());
        assert_eq!(*handle.get_or_try_init(|| Ok::<_, &str>(Arc::new(7))).unwrap(), 7);
        assert_eq!(handle.take().as_deref(), Some(&7));
        assert!(handle.get().is_none());
    }
}
