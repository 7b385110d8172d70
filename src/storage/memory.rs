//! In-memory timer store.
//!
//! Provides [`InMemoryStore`], a thread-safe in-memory implementation of
//! [`super::TimerStore`]. Ideal for tests and for running the API without
//! touching the filesystem.

use core::future::{self, Future};
use std::sync::Mutex;

use chrono::Utc;

use crate::error::{Result, TimerError};
use crate::models::{NewTimer, StoreDomain, Timer, TimerId};

/// Thread-safe in-memory timer store.
///
/// # Example
///
/// ```rust
/// use storefront_countdown::storage::InMemoryStore;
///
/// let store = InMemoryStore::new();
/// assert_eq!(store.len().ok(), Some(0));
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStore {
    /// All state behind a single mutex for thread-safe interior mutability.
    inner: Mutex<Inner>,
}

/// Inner mutable state.
#[derive(Debug, Default)]
struct Inner {
    /// Stored timers in insertion order.
    timers: Vec<Timer>,
}

impl InMemoryStore {
    /// Creates a new empty store.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with `timers`, kept in the given
    /// order.
    #[inline]
    #[must_use]
    pub const fn with_timers(timers: Vec<Timer>) -> Self {
        Self {
            inner: Mutex::new(Inner { timers }),
        }
    }

    /// Number of stored timers across all storefronts.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::Storage`] if the lock is poisoned.
    #[inline]
    pub fn len(&self) -> Result<usize> {
        self.with_lock(|inner| inner.timers.len())
    }

    /// Returns `true` if no timers are stored.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::Storage`] if the lock is poisoned.
    #[inline]
    pub fn is_empty(&self) -> Result<bool> {
        self.with_lock(|inner| inner.timers.is_empty())
    }

    /// Acquires the inner lock and applies a closure.
    fn with_lock<R>(&self, f: impl FnOnce(&mut Inner) -> R) -> Result<R> {
        let mut inner = self.inner.lock().map_err(|err| lock_error(&err))?;
        Ok(f(&mut inner))
    }

    /// Validates and appends a new record.
    fn insert(&self, new_timer: NewTimer) -> Result<Timer> {
        let timer = new_timer.into_timer(TimerId::generate(), Utc::now())?;
        self.with_lock(|inner| inner.timers.push(timer.clone()))?;
        tracing::debug!(id = %timer.id, store = %timer.store_domain, "timer stored in memory");
        Ok(timer)
    }

    /// Returns the timers owned by `store`.
    fn filter_by_store(&self, store: &StoreDomain) -> Result<Vec<Timer>> {
        self.with_lock(|inner| {
            inner
                .timers
                .iter()
                .filter(|timer| timer.store_domain == *store)
                .cloned()
                .collect()
        })
    }
}

/// Wraps a mutex poison error.
fn lock_error<T>(err: &std::sync::PoisonError<T>) -> TimerError {
    TimerError::Storage(err.to_string().into())
}

impl super::TimerStore for InMemoryStore {
    #[inline]
    fn create(&self, new_timer: NewTimer) -> impl Future<Output = Result<Timer>> + Send {
        future::ready(self.insert(new_timer))
    }

    #[inline]
    fn timers_for_store(
        &self,
        store: &StoreDomain,
    ) -> impl Future<Output = Result<Vec<Timer>>> + Send {
        future::ready(self.filter_by_store(store))
    }

    #[inline]
    fn delete(&self, id: &TimerId) -> impl Future<Output = Result<Option<Timer>>> + Send {
        future::ready(self.with_lock(|inner| super::take_by_id(&mut inner.timers, id)))
    }
}
