//! Pluggable timer stores.
//!
//! The REST façade talks to timers only through [`TimerStore`]. Two
//! backends ship with the crate: [`InMemoryStore`] for tests and
//! throwaway runs, and [`FileStore`] which persists the collection as a
//! JSON document on disk.

#[cfg(feature = "storage-file")]
mod file;
mod memory;

#[cfg(feature = "storage-file")]
pub use file::FileStore;
pub use memory::InMemoryStore;

use core::future::Future;

use crate::error::Result;
use crate::models::{NewTimer, StoreDomain, Timer, TimerId};

/// Async persistence backend for timer records.
///
/// All methods take `&self`; implementations use interior mutability
/// (e.g. `Mutex`) for thread-safe mutation. Records are returned in
/// insertion order, which the storefront selection relies on.
pub trait TimerStore: core::fmt::Debug + Send + Sync {
    /// Validates `new_timer`, assigns an identifier and creation
    /// timestamps, and persists the record.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::TimerError::Validation`] if the request
    /// violates the record invariants, or a storage error if the backend
    /// fails to write.
    fn create(&self, new_timer: NewTimer) -> impl Future<Output = Result<Timer>> + Send;

    /// Returns every timer owned by `store`, oldest first. Unknown stores
    /// yield an empty list.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend fails to read.
    fn timers_for_store(
        &self,
        store: &StoreDomain,
    ) -> impl Future<Output = Result<Vec<Timer>>> + Send;

    /// Removes the timer with the given identifier and returns it, or
    /// `Ok(None)` if no such timer exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend fails to read or write.
    fn delete(&self, id: &TimerId) -> impl Future<Output = Result<Option<Timer>>> + Send;
}

/// Removes the record with `id` from `timers`, preserving the order of the
/// rest.
fn take_by_id(timers: &mut Vec<Timer>, id: &TimerId) -> Option<Timer> {
    let index = timers.iter().position(|timer| timer.id == *id)?;
    Some(timers.remove(index))
}
