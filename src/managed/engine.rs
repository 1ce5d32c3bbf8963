// SPDX-License-Identifier: MIT OR Apache-2.0

//! The rotation engine behind [`ManagedFileDestination`](super::ManagedFileDestination).
//!
//! The engine owns one directory: at most one active file being appended to, and an index of
//! archived files kept oldest first together with their running total size. Every method takes a
//! [`QuotaSnapshot`]; the engine never reads quota values any other way.
//!
//! All methods run on the destination's queue.

use super::naming::{file_name, parse_file_name};
use super::ManagedFileObserver;
use crate::diagnostics;
use crate::error::{Error, Result};
use crate::quota::{meets, ArchivedFileQuotas, QuotaSnapshot};
use crate::Level;
use chrono::{DateTime, TimeDelta, Utc};
use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// How many timestamps to try when a new file name is already taken.
const CREATE_ATTEMPTS: u32 = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    /// No active file; the next append indexes the directory.
    Uninitialized,
    Ready,
    /// Indexing failed; appends are dropped until an explicit reindex.
    Failed,
    Closed,
}

/// A file that is no longer written to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivedFile {
    path: PathBuf,
    size: u64,
    created: DateTime<Utc>,
}

impl ArchivedFile {
    pub fn path(&self) -> &Path {
        &self.path
    }
    /// Size in bytes when the file was archived or last indexed.
    pub fn size(&self) -> u64 {
        self.size
    }
    pub fn created(&self) -> DateTime<Utc> {
        self.created
    }
}

#[derive(Debug)]
struct ActiveFile {
    path: PathBuf,
    writer: BufWriter<File>,
    created: DateTime<Utc>,
    /// Bytes written so far, counted rather than re-read from the file system.
    size: u64,
}

impl ActiveFile {
    fn flush(&mut self) -> Result<()> {
        self.writer
            .flush()
            .and_then(|()| self.writer.get_ref().sync_data())
            .map_err(|source| Error::Flush {
                path: self.path.clone(),
                source,
            })
    }

    fn into_archived(self) -> ArchivedFile {
        ArchivedFile {
            path: self.path,
            size: self.size,
            created: self.created,
        }
    }
}

#[derive(Debug)]
pub(crate) struct Engine {
    directory: PathBuf,
    prefix: String,
    observer: Option<Arc<dyn ManagedFileObserver>>,
    phase: Phase,
    active: Option<ActiveFile>,
    archived: VecDeque<ArchivedFile>,
    archived_total_size: u64,
    dropped_entries: u64,
    /// Set once a drop has been reported, so a broken directory does not flood diagnostics.
    drop_reported: bool,
}

fn age(now: DateTime<Utc>, created: DateTime<Utc>) -> Duration {
    // files from the future are brand new
    (now - created).to_std().unwrap_or(Duration::ZERO)
}

impl Engine {
    pub(crate) fn new(directory: PathBuf, prefix: String) -> Self {
        Engine {
            directory,
            prefix,
            observer: None,
            phase: Phase::Uninitialized,
            active: None,
            archived: VecDeque::new(),
            archived_total_size: 0,
            dropped_entries: 0,
            drop_reported: false,
        }
    }

    pub(crate) fn set_observer(&mut self, observer: Arc<dyn ManagedFileObserver>) {
        self.observer = Some(observer);
    }

    pub(crate) fn phase(&self) -> Phase {
        self.phase
    }

    pub(crate) fn active_file_path(&self) -> Option<&Path> {
        self.active.as_ref().map(|active| active.path.as_path())
    }

    pub(crate) fn archived_files(&self) -> Vec<ArchivedFile> {
        self.archived.iter().cloned().collect()
    }

    pub(crate) fn archived_files_count(&self) -> usize {
        self.archived.len()
    }

    pub(crate) fn archived_files_total_size(&self) -> u64 {
        self.archived_total_size
    }

    pub(crate) fn dropped_entries(&self) -> u64 {
        self.dropped_entries
    }

    pub(crate) fn report(&self, error: &Error) {
        match &self.observer {
            Some(observer) => observer.on_error(error),
            None => diagnostics::report(Level::Error, &error.to_string()),
        }
    }

    fn drop_entry(&mut self, reason: &Error) {
        self.dropped_entries += 1;
        if !self.drop_reported {
            self.drop_reported = true;
            self.report(reason);
        }
    }

    fn set_phase(&mut self, phase: Phase) {
        if phase == Phase::Ready {
            self.drop_reported = false;
        }
        self.phase = phase;
    }

    /**
    Indexes the directory and applies archived quotas. Failure leaves the engine `Failed`.

    A closed engine is reopened: the index is rebuilt from whatever is on disk.
    */
    pub(crate) fn initialize(&mut self, quotas: &QuotaSnapshot) -> Result<()> {
        if self.phase == Phase::Closed {
            self.set_phase(Phase::Uninitialized);
        }
        match self.reindex(quotas) {
            Ok(()) => {
                self.apply_archived_quotas(&quotas.archived);
                Ok(())
            }
            Err(e) => {
                self.set_phase(Phase::Failed);
                Err(e)
            }
        }
    }

    /**
    Rebuilds the archived index from the directory and makes sure there is an active file.

    Files older than the archived age quota are deleted instead of indexed. Without an active file
    the newest file is adopted if it meets the active age, active size and archived age quotas;
    otherwise a new one is created.
    */
    pub(crate) fn reindex(&mut self, quotas: &QuotaSnapshot) -> Result<()> {
        if self.phase == Phase::Closed {
            return Err(Error::Closed);
        }
        std::fs::create_dir_all(&self.directory).map_err(|source| Error::CreateDirectory {
            path: self.directory.clone(),
            source,
        })?;
        let entries = std::fs::read_dir(&self.directory).map_err(|source| Error::ReadDirectory {
            path: self.directory.clone(),
            source,
        })?;

        let now = Utc::now();
        let mut found = Vec::new();
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(source) => {
                    self.report(&Error::ReadDirectory {
                        path: self.directory.clone(),
                        source,
                    });
                    continue;
                }
            };
            let Ok(metadata) = entry.metadata() else {
                continue;
            };
            if !metadata.is_file() {
                continue;
            }
            let Some(created) = entry
                .file_name()
                .to_str()
                .and_then(|name| parse_file_name(&self.prefix, name))
            else {
                continue;
            };
            let path = entry.path();
            if self.active_file_path() == Some(path.as_path()) {
                continue;
            }
            if !meets(age(now, created), quotas.archived.max_age) && self.remove_file(&path) {
                continue;
            }
            found.push(ArchivedFile {
                path,
                size: metadata.len(),
                created,
            });
        }
        found.sort_by(|a, b| a.created.cmp(&b.created).then_with(|| a.path.cmp(&b.path)));

        if self.active.is_none() {
            if let Some(newest) = found.last() {
                let newest_age = age(now, newest.created);
                let adoptable = quotas.active.allow(newest_age, newest.size)
                    && meets(newest_age, quotas.archived.max_age);
                if adoptable {
                    match Self::reopen(newest) {
                        Ok(active) => {
                            found.pop();
                            self.active = Some(active);
                        }
                        Err(e) => self.report(&e),
                    }
                }
            }
        }

        self.archived_total_size = found.iter().map(|file| file.size).sum();
        self.archived = found.into();

        if self.active.is_none() {
            let active = self.create_active_file()?;
            self.active = Some(active);
        }
        self.set_phase(Phase::Ready);
        Ok(())
    }

    fn reopen(file: &ArchivedFile) -> Result<ActiveFile> {
        let handle = OpenOptions::new()
            .append(true)
            .open(&file.path)
            .map_err(|source| Error::OpenFile {
                path: file.path.clone(),
                source,
            })?;
        Ok(ActiveFile {
            path: file.path.clone(),
            writer: BufWriter::new(handle),
            created: file.created,
            size: file.size,
        })
    }

    /// A creation time strictly after every file the engine knows about.
    fn next_creation_time(&self) -> DateTime<Utc> {
        let now = Utc::now();
        let newest = self
            .active
            .as_ref()
            .map(|active| active.created)
            .into_iter()
            .chain(self.archived.back().map(|file| file.created))
            .max();
        match newest {
            Some(newest) if newest >= now => newest + TimeDelta::microseconds(1),
            _ => now,
        }
    }

    fn create_active_file(&self) -> Result<ActiveFile> {
        let mut created = self.next_creation_time();
        let mut attempt = 0;
        loop {
            let path = self.directory.join(file_name(&self.prefix, created));
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(handle) => {
                    return Ok(ActiveFile {
                        path,
                        writer: BufWriter::new(handle),
                        created,
                        size: 0,
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists && attempt < CREATE_ATTEMPTS => {
                    attempt += 1;
                    created += TimeDelta::microseconds(1);
                }
                Err(source) => return Err(Error::OpenFile { path, source }),
            }
        }
    }

    /**
    Archives the active file and starts a new one.

    The new file is opened before the old one is closed. If that fails the old file is still
    flushed and archived, and the engine is left without an active file.
    */
    pub(crate) fn rotate(&mut self) -> Result<()> {
        match self.phase {
            Phase::Closed => return Err(Error::Closed),
            Phase::Failed => return Err(Error::NotReady),
            Phase::Uninitialized | Phase::Ready => {}
        }
        let next = self.create_active_file();
        if let Some(mut previous) = self.active.take() {
            if let Err(e) = previous.flush() {
                self.report(&e);
            }
            self.archive(previous.into_archived());
        }
        match next {
            Ok(next) => {
                self.active = Some(next);
                self.set_phase(Phase::Ready);
                Ok(())
            }
            Err(e) => {
                self.set_phase(Phase::Uninitialized);
                Err(e)
            }
        }
    }

    fn archive(&mut self, file: ArchivedFile) {
        self.archived_total_size += file.size;
        self.archived.push_back(file);
    }

    /// Reindexes, then applies archived quotas.
    pub(crate) fn prune(&mut self, quotas: &QuotaSnapshot) -> Result<()> {
        self.reindex(quotas)?;
        self.apply_archived_quotas(&quotas.archived);
        Ok(())
    }

    /**
    Removes archived files from the oldest end until the oldest remaining one meets every
    archived quota.

    A file that cannot be removed, or that the observer wants kept, stays in the index and is
    retried on the next pass; this pass carries on with the next oldest file as if it were gone.
    */
    fn apply_archived_quotas(&mut self, quotas: &ArchivedFileQuotas) {
        let now = Utc::now();
        let mut kept = Vec::new();
        while let Some(oldest) = self.archived.front() {
            let count = self.archived.len();
            let within = meets(age(now, oldest.created), quotas.max_age)
                && meets(count, quotas.max_count)
                && meets(count + 1, quotas.max_log_files)
                // size alone never removes the last archived file
                && (count <= 1 || meets(self.archived_total_size, quotas.max_total_size));
            if within {
                break;
            }
            let Some(oldest) = self.archived.pop_front() else {
                break;
            };
            self.archived_total_size -= oldest.size;
            if !self.remove_file(&oldest.path) {
                kept.push(oldest);
            }
        }
        for file in kept.into_iter().rev() {
            self.archived_total_size += file.size;
            self.archived.push_front(file);
        }
    }

    /// Whether `path` is gone afterwards.
    fn remove_file(&self, path: &Path) -> bool {
        if let Some(observer) = &self.observer {
            if !observer.should_remove(path) {
                return false;
            }
        }
        match std::fs::remove_file(path) {
            Ok(()) => true,
            Err(e) if e.kind() == io::ErrorKind::NotFound => true,
            Err(source) => {
                self.report(&Error::RemoveFile {
                    path: path.to_path_buf(),
                    source,
                });
                false
            }
        }
    }

    fn active_within_quotas(&self, quotas: &QuotaSnapshot) -> bool {
        match &self.active {
            Some(active) => quotas
                .active
                .allow(age(Utc::now(), active.created), active.size),
            None => true,
        }
    }

    /**
    Appends `bytes` to the active file, rotating before and after the write as the active
    quotas require, and pruning if anything rotated or the archived quotas changed.

    `quotas` is read once for the whole call.
    */
    pub(crate) fn append(&mut self, bytes: &[u8], quotas: &QuotaSnapshot) {
        match self.phase {
            Phase::Closed => return self.drop_entry(&Error::Closed),
            Phase::Failed => return self.drop_entry(&Error::NotReady),
            Phase::Uninitialized | Phase::Ready => {}
        }
        if self.active.is_none() {
            if let Err(e) = self.initialize(quotas) {
                self.report(&e);
                return self.drop_entry(&Error::NotReady);
            }
        }

        let mut rotated = false;
        if !self.active_within_quotas(quotas) {
            rotated = true;
            if let Err(e) = self.rotate() {
                self.report(&e);
                return self.drop_entry(&Error::NotReady);
            }
        }

        let Some(active) = self.active.as_mut() else {
            return self.drop_entry(&Error::NotReady);
        };
        if let Err(source) = active.writer.write_all(bytes) {
            let error = Error::Write {
                path: active.path.clone(),
                source,
            };
            self.report(&error);
            self.dropped_entries += 1;
            return;
        }
        active.size += bytes.len() as u64;

        if !self.active_within_quotas(quotas) {
            rotated = true;
            if let Err(e) = self.rotate() {
                self.report(&e);
            }
        }

        if rotated || quotas.archived_dirty {
            if let Err(e) = self.prune(quotas) {
                self.report(&e);
            }
        }
    }

    /// Applies changed quotas without waiting for the next append.
    pub(crate) fn enforce(&mut self, quotas: &QuotaSnapshot) {
        if self.phase != Phase::Ready {
            return;
        }
        let mut rotate = false;
        if quotas.active_dirty && !self.active_within_quotas(quotas) {
            rotate = true;
            if let Err(e) = self.rotate() {
                self.report(&e);
            }
        }
        if rotate || quotas.archived_dirty {
            if let Err(e) = self.prune(quotas) {
                self.report(&e);
            }
        }
    }

    /// Flushes the active file to storage without closing it.
    pub(crate) fn synchronize(&mut self) -> Result<()> {
        match self.active.as_mut() {
            Some(active) => active.flush(),
            None => Ok(()),
        }
    }

    /// Flushes and closes the active file; nothing is appended afterwards.
    pub(crate) fn close(&mut self) {
        if let Some(mut active) = self.active.take() {
            if let Err(e) = active.flush() {
                self.report(&e);
            }
        }
        self.set_phase(Phase::Closed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quota::{ActiveFileQuotas, ArchivedFileQuotas};
    use std::fs;
    use tempfile::TempDir;

    fn quotas() -> QuotaSnapshot {
        QuotaSnapshot::default()
    }

    fn engine(dir: &TempDir) -> Engine {
        Engine::new(dir.path().to_path_buf(), "test".to_string())
    }

    /// Writes a managed file created `seconds_ago` with `contents`.
    fn seed(dir: &TempDir, seconds_ago: i64, contents: &str) -> PathBuf {
        let created = Utc::now() - TimeDelta::seconds(seconds_ago);
        let path = dir.path().join(file_name("test", created));
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn initialize_creates_active_file_and_directory() {
        let dir = TempDir::new().unwrap();
        let mut engine = Engine::new(dir.path().join("nested").join("logs"), "test".into());
        engine.initialize(&quotas()).unwrap();
        assert_eq!(engine.phase(), Phase::Ready);
        let active = engine.active_file_path().unwrap().to_path_buf();
        assert!(active.exists());
        assert_eq!(engine.archived_files_count(), 0);
    }

    #[test]
    fn size_accounting_is_incremental() {
        let dir = TempDir::new().unwrap();
        let mut engine = engine(&dir);
        engine.append(b"hello ", &quotas());
        engine.append(b"world\n", &quotas());
        assert_eq!(engine.active.as_ref().unwrap().size, 12);
        engine.synchronize().unwrap();
        let path = engine.active_file_path().unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), "hello world\n");
    }

    #[test]
    fn crossing_size_rotates_once_after_the_write() {
        let dir = TempDir::new().unwrap();
        let mut engine = engine(&dir);
        let mut q = quotas();
        q.active = ActiveFileQuotas {
            max_age: Duration::ZERO,
            max_size: 10,
        };
        engine.append(b"12345", &q);
        engine.append(b"12345", &q);
        assert_eq!(engine.archived_files_count(), 0, "exactly at the bound");
        engine.append(b"x", &q);
        assert_eq!(engine.archived_files_count(), 1);
        assert_eq!(engine.archived_files()[0].size(), 11);
        assert_eq!(engine.active.as_ref().unwrap().size, 0);
    }

    #[test]
    fn reindex_adopts_recent_small_file() {
        let dir = TempDir::new().unwrap();
        let older = seed(&dir, 30, "a");
        let newest = seed(&dir, 10, "bb");
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        fs::create_dir(dir.path().join("test.2024-01-01.00-00-00-000000.log")).unwrap();

        let mut engine = engine(&dir);
        engine.initialize(&quotas()).unwrap();
        assert_eq!(engine.active_file_path(), Some(newest.as_path()));
        assert_eq!(engine.active.as_ref().unwrap().size, 2);
        assert_eq!(engine.archived_files().len(), 1);
        assert_eq!(engine.archived_files()[0].path(), older.as_path());
        assert_eq!(engine.archived_files_total_size(), 1);
    }

    #[test]
    fn reindex_refuses_to_adopt_oversized_file() {
        let dir = TempDir::new().unwrap();
        let newest = seed(&dir, 1, "0123456789");
        let mut q = quotas();
        q.active.max_size = 5;
        let mut engine = engine(&dir);
        engine.initialize(&q).unwrap();
        assert_ne!(engine.active_file_path(), Some(newest.as_path()));
        assert_eq!(engine.archived_files_count(), 1);
    }

    #[test]
    fn reindex_deletes_files_past_archived_age() {
        let dir = TempDir::new().unwrap();
        let stale = seed(&dir, 3_600, "old");
        let fresh = seed(&dir, 5, "new");
        let mut q = quotas();
        q.archived.max_age = Duration::from_secs(60);
        q.active.max_size = 1;
        let mut engine = engine(&dir);
        engine.initialize(&q).unwrap();
        assert!(!stale.exists());
        assert!(fresh.exists());
        assert_eq!(engine.archived_files_count(), 1);
    }

    #[test]
    fn total_size_keeps_last_file() {
        let dir = TempDir::new().unwrap();
        seed(&dir, 40, "aaaa");
        seed(&dir, 30, "bbbb");
        let last = seed(&dir, 20, "cccccccc");
        let mut engine = engine(&dir);
        let mut q = quotas();
        q.active.max_size = 1;
        q.archived = ArchivedFileQuotas {
            max_total_size: 3,
            ..ArchivedFileQuotas::default()
        };
        engine.initialize(&q).unwrap();
        let archived = engine.archived_files();
        assert_eq!(archived.len(), 1);
        assert_eq!(archived[0].path(), last.as_path());
        assert_eq!(engine.archived_files_total_size(), 8);
    }

    #[test]
    fn rotation_failure_keeps_old_file_archived() {
        let dir = TempDir::new().unwrap();
        let mut engine = engine(&dir);
        engine.append(b"kept", &quotas());
        let first = engine.active_file_path().unwrap().to_path_buf();
        // the directory disappears, so the new file cannot be created
        engine.directory = dir.path().join("gone");
        assert!(engine.rotate().is_err());
        assert!(engine.active_file_path().is_none());
        assert_eq!(engine.phase(), Phase::Uninitialized);
        assert_eq!(engine.archived_files()[0].path(), first.as_path());
        assert_eq!(fs::read_to_string(&first).unwrap(), "kept");
    }

    #[test]
    fn closed_engine_drops_entries() {
        let dir = TempDir::new().unwrap();
        let mut engine = engine(&dir);
        engine.append(b"one", &quotas());
        engine.close();
        engine.append(b"two", &quotas());
        assert_eq!(engine.dropped_entries(), 1);
        assert!(matches!(engine.rotate(), Err(Error::Closed)));
    }

    #[test]
    fn closed_engine_reopens_on_initialize() {
        let dir = TempDir::new().unwrap();
        let mut engine = engine(&dir);
        engine.append(b"one\n", &quotas());
        let first = engine.active_file_path().unwrap().to_path_buf();
        engine.close();
        assert!(matches!(engine.reindex(&quotas()), Err(Error::Closed)));

        engine.initialize(&quotas()).unwrap();
        assert_eq!(engine.phase(), Phase::Ready);
        assert_eq!(engine.active_file_path(), Some(first.as_path()));
        engine.append(b"two\n", &quotas());
        engine.synchronize().unwrap();
        assert_eq!(fs::read_to_string(&first).unwrap(), "one\ntwo\n");
        assert_eq!(engine.dropped_entries(), 0);
    }
}
