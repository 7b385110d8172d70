//! JSON-file-based timer store.
//!
//! Stores the whole timer collection in a single JSON document under a
//! configurable directory (default: `$XDG_DATA_HOME/storefront-countdown/`).

use alloc::sync::Arc;
use core::future::Future;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;

use crate::error::{Result, TimerError};
use crate::models::{NewTimer, StoreDomain, Timer, TimerId};

/// Application name used for the XDG data directory.
const APP_NAME: &str = "storefront-countdown";

/// File holding the timer collection.
const TIMERS_FILE: &str = "timers.json";
/// Sentinel file used for cross-process file locking.
const LOCK_FILE: &str = "storage.lock";

/// File-backed timer store.
///
/// All timers of all storefronts live in one `timers.json` array, in
/// insertion order. Writes go to a temporary file that is then renamed
/// over the original, so readers never observe a half-written document.
///
/// Cloning is cheap; clones share the same directory and locks.
///
/// # Concurrency
///
/// Thread safety within a single process is provided by an in-process
/// [`Mutex`]. Cross-process safety is achieved via an advisory file lock
/// on `storage.lock` (using [`std::fs::File::lock`] /
/// [`std::fs::File::lock_shared`]).
///
/// Read operations acquire a shared lock, while write operations acquire an
/// exclusive lock. The [`super::TimerStore`] methods run that blocking work
/// on tokio's blocking pool, so they must be awaited inside a tokio
/// runtime; a slow disk or a lock held by another process never stalls the
/// async workers.
///
/// # File layout
///
/// ```text
/// <dir>/
///   storage.lock          (cross-process lock sentinel)
///   timers.json
/// ```
#[derive(Debug, Clone)]
pub struct FileStore {
    /// State shared with in-flight blocking operations.
    shared: Arc<Shared>,
}

/// Directory and locks behind a [`FileStore`].
#[derive(Debug)]
struct Shared {
    /// Root directory containing the JSON document.
    dir: PathBuf,
    /// Mutex serializing concurrent in-process access.
    lock: Mutex<()>,
    /// Sentinel file for cross-process advisory locking.
    lock_file: fs::File,
}

impl FileStore {
    /// Creates a new file store rooted at the given directory.
    ///
    /// Creates the directory (and parents) if it does not exist, and opens
    /// (or creates) the `storage.lock` sentinel.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the lock
    /// file cannot be opened.
    #[inline]
    pub fn new(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir).map_err(storage_io_error)?;
        let lock_file = fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(dir.join(LOCK_FILE))
            .map_err(storage_io_error)?;
        tracing::debug!(dir = %dir.display(), "opened file timer store");
        Ok(Self {
            shared: Arc::new(Shared {
                dir,
                lock: Mutex::new(()),
                lock_file,
            }),
        })
    }

    /// Returns the default XDG-compliant data directory for this application.
    ///
    /// On Linux: `$XDG_DATA_HOME/storefront-countdown/` (typically
    /// `~/.local/share/storefront-countdown/`).
    ///
    /// # Errors
    ///
    /// Returns an error if the platform data directory cannot be determined.
    #[inline]
    pub fn default_dir() -> Result<PathBuf> {
        dirs::data_dir()
            .map(|data_path| data_path.join(APP_NAME))
            .ok_or_else(|| TimerError::Storage("could not determine platform data directory".into()))
    }

    /// Directory this store writes to.
    #[inline]
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.shared.dir
    }
}

impl Shared {
    /// Returns the full path for a given file name.
    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Acquires an in-process mutex guard and a shared (read) file lock,
    /// executes `op`, then releases the file lock.
    fn with_shared_lock<R, F: FnOnce() -> Result<R>>(&self, op: F) -> Result<R> {
        let _guard: MutexGuard<'_, ()> = self.lock.lock().map_err(|err| lock_poison_error(&err))?;
        self.lock_file.lock_shared().map_err(storage_io_error)?;
        let result = op();
        // Only surface the unlock error when the operation succeeded;
        // otherwise the original error is more useful.
        if let Err(err) = self.lock_file.unlock()
            && result.is_ok()
        {
            return Err(storage_io_error(err));
        }
        result
    }

    /// Acquires an in-process mutex guard and an exclusive (write) file
    /// lock, executes `op`, then releases the file lock.
    fn with_exclusive_lock<R, F: FnOnce() -> Result<R>>(&self, op: F) -> Result<R> {
        let _guard: MutexGuard<'_, ()> = self.lock.lock().map_err(|err| lock_poison_error(&err))?;
        self.lock_file.lock().map_err(storage_io_error)?;
        let result = op();
        if let Err(err) = self.lock_file.unlock()
            && result.is_ok()
        {
            return Err(storage_io_error(err));
        }
        result
    }

    /// Reads the timer collection. Returns an empty `Vec` if the file does
    /// not exist yet.
    fn read_timers(&self) -> Result<Vec<Timer>> {
        let path = self.path(TIMERS_FILE);
        match fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents).map_err(TimerError::from),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(err) => Err(storage_io_error(err)),
        }
    }

    /// Atomically writes the timer collection (write-to-tmp then rename).
    fn write_timers(&self, timers: &[Timer]) -> Result<()> {
        let path = self.path(TIMERS_FILE);
        let tmp_path = self.path(&format!("{TIMERS_FILE}.tmp"));
        let json = serde_json::to_string_pretty(timers).map_err(TimerError::from)?;
        fs::write(&tmp_path, json).map_err(storage_io_error)?;
        fs::rename(&tmp_path, &path).map_err(storage_io_error)?;
        Ok(())
    }

    /// Validates and appends a new record (with lock).
    #[tracing::instrument(skip_all, fields(store = %new_timer.store_domain))]
    fn insert(&self, new_timer: NewTimer) -> Result<Timer> {
        let timer = new_timer.into_timer(TimerId::generate(), Utc::now())?;
        self.with_exclusive_lock(|| {
            let mut timers = self.read_timers()?;
            timers.push(timer.clone());
            self.write_timers(&timers)
        })?;
        tracing::debug!(id = %timer.id, store = %timer.store_domain, "timer written to disk");
        Ok(timer)
    }

    /// Returns the timers owned by `store` (with lock).
    #[tracing::instrument(skip_all, fields(store = %store))]
    fn filter_by_store(&self, store: &StoreDomain) -> Result<Vec<Timer>> {
        self.with_shared_lock(|| {
            let mut timers = self.read_timers()?;
            timers.retain(|timer| timer.store_domain == *store);
            Ok(timers)
        })
    }

    /// Removes a record by identifier (with lock). The file is left
    /// untouched when nothing matches.
    #[tracing::instrument(skip_all, fields(id = %id))]
    fn remove(&self, id: &TimerId) -> Result<Option<Timer>> {
        self.with_exclusive_lock(|| {
            let mut timers = self.read_timers()?;
            let Some(removed) = super::take_by_id(&mut timers, id) else {
                return Ok(None);
            };
            self.write_timers(&timers)?;
            Ok(Some(removed))
        })
    }
}

// ── Free-standing helpers ───────────────────────────────────────────────

/// Runs `op` on tokio's blocking pool.
async fn off_runtime<R, F>(op: F) -> Result<R>
where
    F: FnOnce() -> Result<R> + Send + 'static,
    R: Send + 'static,
{
    tokio::task::spawn_blocking(op)
        .await
        .map_err(|err| TimerError::Storage(Box::new(err)))?
}

/// Wraps an I/O error into a [`TimerError::Storage`].
fn storage_io_error(err: std::io::Error) -> TimerError {
    TimerError::Storage(Box::new(err))
}

/// Wraps a mutex poison error into a [`TimerError::Storage`].
fn lock_poison_error<T>(err: &std::sync::PoisonError<T>) -> TimerError {
    TimerError::Storage(err.to_string().into())
}

impl super::TimerStore for FileStore {
    #[inline]
    fn create(&self, new_timer: NewTimer) -> impl Future<Output = Result<Timer>> + Send {
        let shared = Arc::clone(&self.shared);
        off_runtime(move || shared.insert(new_timer))
    }

    #[inline]
    fn timers_for_store(
        &self,
        store: &StoreDomain,
    ) -> impl Future<Output = Result<Vec<Timer>>> + Send {
        let shared = Arc::clone(&self.shared);
        let owner = store.clone();
        off_runtime(move || shared.filter_by_store(&owner))
    }

    #[inline]
    fn delete(&self, id: &TimerId) -> impl Future<Output = Result<Option<Timer>>> + Send {
        let shared = Arc::clone(&self.shared);
        let target = id.clone();
        off_runtime(move || shared.remove(&target))
    }
}
