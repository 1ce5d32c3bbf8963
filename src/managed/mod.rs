// SPDX-License-Identifier: MIT OR Apache-2.0

//! A self-managing set of rotated log files.
//!
//! [`ManagedFileDestination`] appends to one active file in a directory it owns and keeps the
//! files it has rotated out as an archive. Two groups of quotas drive it:
//!
//! * active-file quotas (age, size) decide when to rotate, checked before and after every write;
//! * archived quotas (age per file, count, total size, total files including the active one)
//!   decide what to delete, applied oldest first whenever something rotates.
//!
//! Quotas can be changed from any thread while the destination is running; a change is applied
//! on the destination's queue right away instead of waiting for the next write.
//!
//! # Example
//!
//! ```no_run
//! use logfan::{Level, Logger, ManagedFileConfig, ManagedFileDestination, TextFormatter};
//! use std::sync::Arc;
//!
//! let config = ManagedFileConfig::new("/var/log/myapp", "myapp")
//!     .with_active_file_max_size(10 * 1024 * 1024)
//!     .with_archived_files_max_count(9);
//! let files = Arc::new(ManagedFileDestination::new(config));
//!
//! let logger = Logger::new(Level::Info, TextFormatter::default());
//! logger.add_destination(files.clone());
//! logger.info("service started");
//! logger.synchronize();
//! ```

mod engine;
mod naming;

pub use engine::ArchivedFile;

use crate::destination::Destination;
use crate::error::{Error, Result};
use crate::format::{Formatter, LogEntry};
use crate::quota::{ActiveFileQuotas, ArchivedFileQuotas, QuotaCell};
use crate::queue::Queue;
use engine::{Engine, Phase};
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

const DEFAULT_ACTIVE_FILE_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);
const DEFAULT_ARCHIVED_FILE_MAX_AGE: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Settings for a [`ManagedFileDestination`].
///
/// A zero quota (`0`, [`Duration::ZERO`]) is unbounded.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ManagedFileConfig {
    pub directory: PathBuf,
    /// Identifies this application's files within the directory.
    pub file_name_prefix: String,
    pub active_file_max_age: Duration,
    /// Bytes.
    pub active_file_max_size: u64,
    pub archived_file_max_age: Duration,
    pub archived_files_max_count: usize,
    /// Bytes.
    pub archived_files_max_total_size: u64,
    /// Archived files plus the active file.
    pub maximum_log_files: usize,
}

impl ManagedFileConfig {
    /// Rotates daily and keeps a week of archives.
    pub fn new(directory: impl Into<PathBuf>, file_name_prefix: impl Into<String>) -> Self {
        ManagedFileConfig {
            directory: directory.into(),
            file_name_prefix: file_name_prefix.into(),
            active_file_max_age: DEFAULT_ACTIVE_FILE_MAX_AGE,
            active_file_max_size: 0,
            archived_file_max_age: DEFAULT_ARCHIVED_FILE_MAX_AGE,
            archived_files_max_count: 0,
            archived_files_max_total_size: 0,
            maximum_log_files: 0,
        }
    }

    pub fn with_active_file_max_age(mut self, max_age: Duration) -> Self {
        self.active_file_max_age = max_age;
        self
    }

    pub fn with_active_file_max_size(mut self, max_size: u64) -> Self {
        self.active_file_max_size = max_size;
        self
    }

    pub fn with_archived_file_max_age(mut self, max_age: Duration) -> Self {
        self.archived_file_max_age = max_age;
        self
    }

    pub fn with_archived_files_max_count(mut self, max_count: usize) -> Self {
        self.archived_files_max_count = max_count;
        self
    }

    pub fn with_archived_files_max_total_size(mut self, max_total_size: u64) -> Self {
        self.archived_files_max_total_size = max_total_size;
        self
    }

    pub fn with_maximum_log_files(mut self, maximum: usize) -> Self {
        self.maximum_log_files = maximum;
        self
    }

    fn active_quotas(&self) -> ActiveFileQuotas {
        ActiveFileQuotas {
            max_age: self.active_file_max_age,
            max_size: self.active_file_max_size,
        }
    }

    fn archived_quotas(&self) -> ArchivedFileQuotas {
        ArchivedFileQuotas {
            max_age: self.archived_file_max_age,
            max_count: self.archived_files_max_count,
            max_total_size: self.archived_files_max_total_size,
            max_log_files: self.maximum_log_files,
        }
    }
}

/**
Hooks into a managed directory's housekeeping.

Without an observer, errors go to the [diagnostic channel](crate::diagnostics).

Both methods are called on the destination's queue while its state is locked; they must not call
back into the destination.
*/
pub trait ManagedFileObserver: Debug + Send + Sync {
    /// An indexing, write, flush or deletion error.
    fn on_error(&self, error: &Error);

    /// Asked before a file is deleted; returning `false` keeps it for now.
    fn should_remove(&self, path: &Path) -> bool {
        let _ = path;
        true
    }
}

#[derive(Debug)]
struct Inner {
    directory: PathBuf,
    prefix: String,
    engine: Mutex<Engine>,
    quotas: QuotaCell,
    queue: Queue,
}

impl Inner {
    fn engine(&self) -> MutexGuard<'_, Engine> {
        self.engine.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Leaves the dirty flags set unless the engine is ready to act on them.
    fn enforce(&self) {
        let mut engine = self.engine();
        if engine.phase() == Phase::Ready {
            let quotas = self.quotas.take();
            engine.enforce(&quotas);
        }
    }
}

/// A destination that rotates and prunes its own files. See the [module docs](self).
#[derive(Debug)]
pub struct ManagedFileDestination {
    inner: Arc<Inner>,
    formatter: Option<Arc<dyn Formatter>>,
}

impl ManagedFileDestination {
    /// Nothing touches the file system until the destination is initialized.
    pub fn new(config: ManagedFileConfig) -> Self {
        let quotas = QuotaCell::new(config.active_quotas(), config.archived_quotas());
        let engine = Engine::new(config.directory.clone(), config.file_name_prefix.clone());
        let queue = Queue::new(format!("logfan-managed-{}", config.file_name_prefix));
        ManagedFileDestination {
            inner: Arc::new(Inner {
                directory: config.directory,
                prefix: config.file_name_prefix,
                engine: Mutex::new(engine),
                quotas,
                queue,
            }),
            formatter: None,
        }
    }

    pub fn with_observer(self, observer: Arc<dyn ManagedFileObserver>) -> Self {
        self.inner.engine().set_observer(observer);
        self
    }

    pub fn with_formatter(mut self, formatter: Arc<dyn Formatter>) -> Self {
        self.formatter = Some(formatter);
        self
    }

    pub fn directory(&self) -> &Path {
        &self.inner.directory
    }

    pub fn file_name_prefix(&self) -> &str {
        &self.inner.prefix
    }

    /// Runs `f` on the queue after everything already scheduled there.
    fn on_queue<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Inner) -> R + Send + 'static,
        R: Send + 'static,
    {
        let inner = self.inner.clone();
        self.inner
            .queue
            .sync(move || f(&inner))
            .ok_or_else(|| Error::QueueUnavailable(self.inner.queue.label().to_string()))
    }

    /// Reads engine state once pending work has run, or right away if the queue is gone.
    fn read<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&Engine) -> R,
    {
        let _ = self.inner.queue.sync(|| ());
        f(&self.inner.engine())
    }

    /// Archives the active file and starts a new one, then prunes.
    pub fn rotate(&self) -> Result<()> {
        self.on_queue(|inner| {
            let quotas = inner.quotas.take();
            let mut engine = inner.engine();
            engine.rotate()?;
            engine.prune(&quotas)
        })?
    }

    /// Reindexes the directory and deletes archived files that exceed the archived quotas.
    pub fn prune(&self) -> Result<()> {
        self.on_queue(|inner| {
            let quotas = inner.quotas.take();
            inner.engine().prune(&quotas)
        })?
    }

    /**
    Rebuilds the index from the directory.

    This is also how a destination that failed to initialize is brought back.
    */
    pub fn reindex(&self) -> Result<()> {
        self.on_queue(|inner| {
            let quotas = inner.quotas.peek();
            inner.engine().reindex(&quotas)
        })?
    }

    pub fn is_ready(&self) -> bool {
        self.read(|engine| engine.phase() == Phase::Ready)
    }

    pub fn active_file_path(&self) -> Option<PathBuf> {
        self.read(|engine| engine.active_file_path().map(Path::to_path_buf))
    }

    /// Archived files, oldest first.
    pub fn archived_files(&self) -> Vec<ArchivedFile> {
        self.read(Engine::archived_files)
    }

    pub fn archived_files_count(&self) -> usize {
        self.read(Engine::archived_files_count)
    }

    pub fn archived_files_total_size(&self) -> u64 {
        self.read(Engine::archived_files_total_size)
    }

    /// Entries discarded because there was no file to write them to.
    pub fn dropped_entries(&self) -> u64 {
        self.read(Engine::dropped_entries)
    }

    pub fn active_file_quotas(&self) -> ActiveFileQuotas {
        self.inner.quotas.peek().active
    }

    pub fn archived_file_quotas(&self) -> ArchivedFileQuotas {
        self.inner.quotas.peek().archived
    }

    fn schedule_enforcement(&self) {
        let inner: Weak<Inner> = Arc::downgrade(&self.inner);
        self.inner.queue.dispatch(move || {
            if let Some(inner) = inner.upgrade() {
                inner.enforce();
            }
        });
    }

    pub fn set_active_file_max_age(&self, max_age: Duration) {
        self.inner.quotas.update_active(|q| q.max_age = max_age);
        self.schedule_enforcement();
    }

    pub fn set_active_file_max_size(&self, max_size: u64) {
        self.inner.quotas.update_active(|q| q.max_size = max_size);
        self.schedule_enforcement();
    }

    pub fn set_archived_file_max_age(&self, max_age: Duration) {
        self.inner.quotas.update_archived(|q| q.max_age = max_age);
        self.schedule_enforcement();
    }

    pub fn set_archived_files_max_count(&self, max_count: usize) {
        self.inner.quotas.update_archived(|q| q.max_count = max_count);
        self.schedule_enforcement();
    }

    pub fn set_archived_files_max_total_size(&self, max_total_size: u64) {
        self.inner
            .quotas
            .update_archived(|q| q.max_total_size = max_total_size);
        self.schedule_enforcement();
    }

    pub fn set_maximum_log_files(&self, maximum: usize) {
        self.inner
            .quotas
            .update_archived(|q| q.max_log_files = maximum);
        self.schedule_enforcement();
    }
}

impl Destination for ManagedFileDestination {
    fn formatter(&self) -> Option<Arc<dyn Formatter>> {
        self.formatter.clone()
    }

    fn queue(&self) -> Option<&Queue> {
        Some(&self.inner.queue)
    }

    fn initialize(&self) {
        let quotas = self.inner.quotas.take();
        let mut engine = self.inner.engine();
        if let Err(e) = engine.initialize(&quotas) {
            engine.report(&e);
        }
    }

    fn deinitialize(&self) {
        self.inner.engine().close();
    }

    fn write(&self, entry: &LogEntry) {
        let quotas = self.inner.quotas.take();
        self.inner
            .engine()
            .append(entry.content().as_bytes(), &quotas);
    }

    fn synchronize(&self) {
        let mut engine = self.inner.engine();
        if let Err(e) = engine.synchronize() {
            engine.report(&e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = ManagedFileConfig::new("/tmp/logs", "app");
        assert_eq!(config.active_file_max_age, Duration::from_secs(86_400));
        assert_eq!(config.active_file_max_size, 0);
        assert_eq!(config.archived_file_max_age, Duration::from_secs(604_800));
        assert_eq!(config.archived_files_max_count, 0);
        assert_eq!(config.archived_files_max_total_size, 0);
        assert_eq!(config.maximum_log_files, 0);
    }

    #[test]
    fn builders_feed_quota_groups() {
        let config = ManagedFileConfig::new("/tmp/logs", "app")
            .with_active_file_max_size(1024)
            .with_archived_files_max_count(3)
            .with_maximum_log_files(5);
        let destination = ManagedFileDestination::new(config);
        assert_eq!(destination.active_file_quotas().max_size, 1024);
        assert_eq!(destination.archived_file_quotas().max_count, 3);
        assert_eq!(destination.archived_file_quotas().max_log_files, 5);
        assert_eq!(destination.file_name_prefix(), "app");
    }

    #[test]
    fn setters_are_visible_immediately() {
        let destination = ManagedFileDestination::new(ManagedFileConfig::new("/tmp/logs", "app"));
        destination.set_archived_files_max_total_size(99);
        destination.set_active_file_max_age(Duration::ZERO);
        assert_eq!(destination.archived_file_quotas().max_total_size, 99);
        assert_eq!(destination.active_file_quotas().max_age, Duration::ZERO);
    }

    #[test]
    fn nothing_happens_before_initialize() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("logs");
        let destination = ManagedFileDestination::new(ManagedFileConfig::new(&root, "app"));
        assert!(!destination.is_ready());
        assert!(destination.active_file_path().is_none());
        assert!(!root.exists());
    }

    #[test]
    fn changes_before_initialize_stay_pending() {
        let dir = tempfile::tempdir().unwrap();
        let destination = ManagedFileDestination::new(ManagedFileConfig::new(dir.path(), "app"));
        destination.set_archived_files_max_count(1);
        destination.set_active_file_max_size(5);
        // queue barrier: the enforcement jobs have run
        assert!(!destination.is_ready());
        let pending = destination.inner.quotas.peek();
        assert!(pending.archived_dirty);
        assert!(pending.active_dirty);
    }
}
