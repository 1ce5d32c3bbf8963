// SPDX-License-Identifier: MIT OR Apache-2.0

//! Log events as captured at the call site.
//!
//! A [`LogEvent`] is created once per accepted logging call and never mutated afterwards. The
//! dispatcher shares a single event between every destination, each of which renders it with its
//! own [`Formatter`](crate::Formatter).

use crate::Level;
use chrono::{DateTime, Utc};
use std::cell::Cell;
use std::panic::Location;
use std::sync::atomic::{AtomicU64, Ordering};

static THREAD_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static CURRENT_THREAD_ID: Cell<u64> = const { Cell::new(0) };
}

/// A small, process-unique identifier for the calling thread.
///
/// Identifiers are handed out lazily the first time a thread asks for one and are never reused.
pub fn current_thread_id() -> u64 {
    CURRENT_THREAD_ID.with(|id| {
        if id.get() == 0 {
            id.set(THREAD_ID.fetch_add(1, Ordering::Relaxed));
        }
        id.get()
    })
}

/// Where a logging call was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceLocation {
    pub file: &'static str,
    pub line: u32,
    /// Enclosing function or module path, when the call site knows it.
    pub function: Option<&'static str>,
}

impl SourceLocation {
    pub const fn new(file: &'static str, line: u32, function: Option<&'static str>) -> Self {
        Self {
            file,
            line,
            function,
        }
    }

    /// The location of the caller, via `#[track_caller]`.
    ///
    /// Rust has no way to name the enclosing function here, so `function` is `None`. The
    /// [`location!`](crate::location) macro fills it with the module path instead.
    #[track_caller]
    pub fn caller() -> Self {
        let location = Location::caller();
        Self {
            file: location.file(),
            line: location.line(),
            function: None,
        }
    }
}

/// An immutable record of one accepted logging call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEvent {
    level: Level,
    message: String,
    timestamp: DateTime<Utc>,
    location: SourceLocation,
    thread_id: u64,
}

impl LogEvent {
    /// Captures an event on the calling thread, stamping it with the current time and thread id.
    pub fn capture(level: Level, message: String, location: SourceLocation) -> Self {
        Self {
            level,
            message,
            timestamp: Utc::now(),
            location,
            thread_id: current_thread_id(),
        }
    }

    /// Builds an event from explicit parts; mostly useful for formatter tests.
    pub fn from_parts(
        level: Level,
        message: String,
        timestamp: DateTime<Utc>,
        location: SourceLocation,
        thread_id: u64,
    ) -> Self {
        Self {
            level,
            message,
            timestamp,
            location,
            thread_id,
        }
    }

    pub fn level(&self) -> Level {
        self.level
    }
    pub fn message(&self) -> &str {
        &self.message
    }
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
    pub fn location(&self) -> SourceLocation {
        self.location
    }
    pub fn file(&self) -> &'static str {
        self.location.file
    }
    pub fn line(&self) -> u32 {
        self.location.line
    }
    pub fn function(&self) -> Option<&'static str> {
        self.location.function
    }
    pub fn thread_id(&self) -> u64 {
        self.thread_id
    }
}

/*
Boilerplate notes for LogEvent:

- Clone: derived, destinations that need an owned copy can have one.
- PartialEq/Eq: derived, handy for tests.
- Default: NOT implemented, an event without a call site is meaningless.
- Ord/Hash: NOT implemented, there is no natural ordering beyond the timestamp.
*/
