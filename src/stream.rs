// SPDX-License-Identifier: MIT OR Apache-2.0
use crate::destination::Destination;
use crate::format::LogEntry;
use crate::Level;
use std::io::Write;

/**
A destination that writes to the process's standard streams.

Entries at or above `stderr_threshold` go to stderr, everything else to stdout. Writes are
unbuffered and inline; there is no queue.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StandardStreamDestination {
    stderr_threshold: Level,
}

/*
Boilerplate notes.

Copy/Eq/Hash: the destination is just its threshold, so data equality is fine here.
Default: routes warnings and up to stderr, which is what most command line tools expect.
*/

impl Default for StandardStreamDestination {
    fn default() -> Self {
        Self::new(Level::Warn)
    }
}

impl StandardStreamDestination {
    pub const fn new(stderr_threshold: Level) -> Self {
        Self { stderr_threshold }
    }

    pub const fn stderr_threshold(&self) -> Level {
        self.stderr_threshold
    }

    fn uses_stderr(&self, level: Level) -> bool {
        level >= self.stderr_threshold
    }
}

impl Destination for StandardStreamDestination {
    fn write(&self, entry: &LogEntry) {
        // a closed pipe is not worth panicking over
        let _ = if self.uses_stderr(entry.level()) {
            std::io::stderr().lock().write_all(entry.content().as_bytes())
        } else {
            std::io::stdout().lock().write_all(entry.content().as_bytes())
        };
    }

    fn synchronize(&self) {
        let _ = std::io::stdout().flush();
        let _ = std::io::stderr().flush();
    }
}
