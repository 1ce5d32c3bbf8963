// SPDX-License-Identifier: MIT OR Apache-2.0
use crate::destination::Destination;
use crate::diagnostics;
use crate::error::{Error, Result};
use crate::format::{Formatter, LogEntry};
use crate::queue::Queue;
use crate::Level;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

/**
Appends entries to a single file.

The file is opened (and created if missing) when the destination is constructed. Writes happen on
the destination's own queue; [`synchronize`](Destination::synchronize) flushes them to storage.
For rotation and retention use [`ManagedFileDestination`](crate::ManagedFileDestination).
*/
#[derive(Debug)]
pub struct FileDestination {
    path: PathBuf,
    file: Mutex<File>,
    queue: Queue,
    formatter: Option<Arc<dyn Formatter>>,
}

impl FileDestination {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| Error::OpenFile {
                path: path.clone(),
                source,
            })?;
        Ok(Self {
            queue: Queue::new(format!("logfan-file-{}", path.display())),
            path,
            file: Mutex::new(file),
            formatter: None,
        })
    }

    pub fn with_formatter(mut self, formatter: Arc<dyn Formatter>) -> Self {
        self.formatter = Some(formatter);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Destination for FileDestination {
    fn formatter(&self) -> Option<Arc<dyn Formatter>> {
        self.formatter.clone()
    }

    fn queue(&self) -> Option<&Queue> {
        Some(&self.queue)
    }

    fn write(&self, entry: &LogEntry) {
        let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = file.write_all(entry.content().as_bytes()) {
            let error = Error::Write {
                path: self.path.clone(),
                source: e,
            };
            diagnostics::report(Level::Error, &error.to_string());
        }
    }

    fn synchronize(&self) {
        let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = file.flush().and_then(|()| file.sync_data()) {
            let error = Error::Flush {
                path: self.path.clone(),
                source: e,
            };
            diagnostics::report(Level::Error, &error.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn appends_to_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        std::fs::write(&path, "before\n").unwrap();

        let destination = FileDestination::open(&path).unwrap();
        destination.write(&LogEntry::new(Level::Info, "after\n".into(), Utc::now(), 1));
        destination.synchronize();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "before\nafter\n");
        assert!(destination.queue().is_some());
    }

    #[test]
    fn open_failure_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("app.log");
        let error = FileDestination::open(&path).unwrap_err();
        assert!(matches!(error, Error::OpenFile { .. }));
        assert!(error.to_string().contains("app.log"));
    }
}
