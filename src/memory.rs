// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory destination for tests and debugging.
//!
//! [`MemoryDestination`] keeps every entry it receives and counts its lifecycle calls, which makes
//! it the natural probe for checking what a [`Logger`](crate::Logger) actually delivered.
//!
//! # Example
//!
//! ```
//! use logfan::{Level, Logger, MemoryDestination, TextFormatter};
//! use std::sync::Arc;
//!
//! let logger = Logger::new(Level::Info, TextFormatter::new(vec![logfan::Field::Message]));
//! let memory = Arc::new(MemoryDestination::new());
//! logger.add_destination(memory.clone());
//!
//! logger.info("hello");
//! logger.synchronize();
//! assert_eq!(memory.drain_logs(), "hello\n");
//! ```

use crate::destination::Destination;
use crate::format::{Formatter, LogEntry};
use crate::queue::Queue;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Captures rendered entries in memory.
#[derive(Debug, Default)]
pub struct MemoryDestination {
    entries: Mutex<Vec<LogEntry>>,
    queue: Option<Queue>,
    formatter: Option<Arc<dyn Formatter>>,
    write_delay: Duration,
    initialized: AtomicUsize,
    deinitialized: AtomicUsize,
    synchronized: AtomicUsize,
}

// - Clone: NOT implemented, two destinations sharing a buffer would confuse identity
// - PartialEq/Eq/Hash: NOT implemented, destinations are compared by address
// - Default: an empty, unqueued buffer

impl MemoryDestination {
    /// An empty destination that runs inline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs this destination on its own queue named `label`.
    pub fn with_queue(mut self, label: impl Into<String>) -> Self {
        self.queue = Some(Queue::new(label));
        self
    }

    pub fn with_formatter(mut self, formatter: Arc<dyn Formatter>) -> Self {
        self.formatter = Some(formatter);
        self
    }

    /// Sleeps this long in every write, to simulate a slow sink.
    pub fn with_write_delay(mut self, delay: Duration) -> Self {
        self.write_delay = delay;
        self
    }

    fn lock(&self) -> MutexGuard<'_, Vec<LogEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// A copy of every entry received so far, oldest first.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.lock().clone()
    }

    /// The rendered content of every entry received so far.
    pub fn contents(&self) -> Vec<String> {
        self.lock()
            .iter()
            .map(|entry| entry.content().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Concatenates all captured content and clears the buffer.
    pub fn drain_logs(&self) -> String {
        let mut entries = self.lock();
        let result = entries.iter().map(LogEntry::content).collect();
        entries.clear();
        result
    }

    pub fn initialize_count(&self) -> usize {
        self.initialized.load(Ordering::SeqCst)
    }

    pub fn deinitialize_count(&self) -> usize {
        self.deinitialized.load(Ordering::SeqCst)
    }

    pub fn synchronize_count(&self) -> usize {
        self.synchronized.load(Ordering::SeqCst)
    }
}

impl Destination for MemoryDestination {
    fn formatter(&self) -> Option<Arc<dyn Formatter>> {
        self.formatter.clone()
    }

    fn queue(&self) -> Option<&Queue> {
        self.queue.as_ref()
    }

    fn initialize(&self) {
        self.initialized.fetch_add(1, Ordering::SeqCst);
    }

    fn deinitialize(&self) {
        self.deinitialized.fetch_add(1, Ordering::SeqCst);
    }

    fn write(&self, entry: &LogEntry) {
        if !self.write_delay.is_zero() {
            std::thread::sleep(self.write_delay);
        }
        self.lock().push(entry.clone());
    }

    fn synchronize(&self) {
        self.synchronized.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Level;
    use chrono::Utc;

    fn entry(content: &str) -> LogEntry {
        LogEntry::new(Level::Info, content.to_string(), Utc::now(), 1)
    }

    #[test]
    fn captures_and_drains() {
        let memory = MemoryDestination::new();
        assert!(memory.is_empty());
        memory.write(&entry("a\n"));
        memory.write(&entry("b\n"));
        assert_eq!(memory.contents(), vec!["a\n", "b\n"]);
        assert_eq!(memory.drain_logs(), "a\nb\n");
        assert_eq!(memory.len(), 0);
    }

    #[test]
    fn counts_lifecycle_calls() {
        let memory = MemoryDestination::new();
        memory.initialize();
        memory.synchronize();
        memory.synchronize();
        memory.deinitialize();
        assert_eq!(memory.initialize_count(), 1);
        assert_eq!(memory.synchronize_count(), 2);
        assert_eq!(memory.deinitialize_count(), 1);
    }

    #[test]
    fn queue_is_optional() {
        assert!(MemoryDestination::new().queue().is_none());
        let queued = MemoryDestination::new().with_queue("memory-test");
        assert_eq!(queued.queue().map(Queue::label), Some("memory-test"));
    }
}
