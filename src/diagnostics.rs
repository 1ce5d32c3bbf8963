// SPDX-License-Identifier: MIT OR Apache-2.0

//! The facility's own diagnostic channel.
//!
//! Destinations must never fail loudly, yet some failures (a log directory that cannot be created,
//! a queue whose worker has died) are worth telling someone about. Those reports go to a single
//! process-wide diagnostic destination, which by default writes to standard error.
//!
//! Reports are written synchronously on the reporting thread and bypass any
//! [`Logger`](crate::Logger): the diagnostic channel has to work when the logging pipeline itself
//! is what is broken.
//!
//! # Examples
//!
//! Capturing diagnostics in memory, for instance in a test:
//!
//! ```
//! use logfan::diagnostics::{diagnostic_destination, set_diagnostic_destination};
//! use logfan::MemoryDestination;
//! use std::sync::Arc;
//!
//! let memory = Arc::new(MemoryDestination::new());
//! let previous = set_diagnostic_destination(memory.clone());
//! // ... exercise something that may report ...
//! set_diagnostic_destination(previous);
//! # let _ = diagnostic_destination();
//! ```

use crate::destination::Destination;
use crate::event::current_thread_id;
use crate::format::LogEntry;
use crate::spinlock::Spinlock;
use crate::stream::StandardStreamDestination;
use crate::Level;
use chrono::Utc;
use std::sync::{Arc, OnceLock};

static DIAGNOSTIC_DESTINATION: OnceLock<Spinlock<Arc<dyn Destination>>> = OnceLock::new();

fn cell() -> &'static Spinlock<Arc<dyn Destination>> {
    DIAGNOSTIC_DESTINATION.get_or_init(|| {
        Spinlock::new(Arc::new(StandardStreamDestination::new(Level::Trace)))
    })
}

/// The destination currently receiving diagnostics.
pub fn diagnostic_destination() -> Arc<dyn Destination> {
    cell().snapshot()
}

/// Replaces the diagnostic destination, returning the previous one.
///
/// The destination's queue is ignored; diagnostics are always written inline.
pub fn set_diagnostic_destination(destination: Arc<dyn Destination>) -> Arc<dyn Destination> {
    cell().replace(destination)
}

pub(crate) fn report(level: Level, message: &str) {
    // clone out of the lock so a slow write does not hold it
    let destination = diagnostic_destination();
    let entry = LogEntry::new(
        level,
        format!("<logfan> {message}\n"),
        Utc::now(),
        current_thread_id(),
    );
    destination.write(&entry);
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::memory::MemoryDestination;
    use std::sync::{Mutex, MutexGuard, PoisonError};

    static TEST_GUARD: Mutex<()> = Mutex::new(());

    /// Routes diagnostics into memory for the lifetime of the returned guard.
    pub(crate) struct CapturedDiagnostics {
        pub(crate) memory: Arc<MemoryDestination>,
        previous: Option<Arc<dyn Destination>>,
        _guard: MutexGuard<'static, ()>,
    }

    impl CapturedDiagnostics {
        pub(crate) fn install() -> Self {
            let guard = TEST_GUARD.lock().unwrap_or_else(PoisonError::into_inner);
            let memory = Arc::new(MemoryDestination::new());
            let previous = set_diagnostic_destination(memory.clone());
            CapturedDiagnostics {
                memory,
                previous: Some(previous),
                _guard: guard,
            }
        }

        pub(crate) fn contains(&self, needle: &str) -> bool {
            self.memory
                .entries()
                .iter()
                .any(|entry| entry.content().contains(needle))
        }
    }

    impl Drop for CapturedDiagnostics {
        fn drop(&mut self) {
            if let Some(previous) = self.previous.take() {
                set_diagnostic_destination(previous);
            }
        }
    }

    #[test]
    fn report_reaches_installed_destination() {
        let captured = CapturedDiagnostics::install();
        report(Level::Warn, "directory is read-only");
        let entries = captured.memory.entries();
        let entry = entries
            .iter()
            .find(|entry| entry.content().contains("directory is read-only"))
            .unwrap();
        assert_eq!(entry.content(), "<logfan> directory is read-only\n");
        assert_eq!(entry.level(), Level::Warn);
    }

    #[test]
    fn replacing_returns_previous() {
        let captured = CapturedDiagnostics::install();
        let other: Arc<dyn Destination> = Arc::new(MemoryDestination::new());
        let previous = set_diagnostic_destination(other.clone());
        let expected: Arc<dyn Destination> = captured.memory.clone();
        assert!(crate::destination::same_destination(&previous, &expected));
        set_diagnostic_destination(previous);
    }
}
