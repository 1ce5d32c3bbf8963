// SPDX-License-Identifier: MIT OR Apache-2.0

//! The dispatcher.
//!
//! A [`Logger`] owns a registration set of [`Destination`]s, a minimum-level gate and one serial
//! [`Queue`]. Accepted calls are captured as a [`LogEvent`] on the calling thread and handed to the
//! queue, which fans the event out: every destination formats and writes it, on the destination's
//! own queue when it has one and inline on the logger's queue otherwise.
//!
//! The calling thread only pays for the gate check, capturing the event and one channel send.
//!
//! # Ordering
//!
//! Events logged from one thread reach each destination in call order. Destinations with their own
//! queues complete independently of each other, so no ordering holds *across* destinations.
//!
//! Lifecycle hooks travel the same path as writes: `initialize` is ordered before any event logged
//! after [`add_destination`](Logger::add_destination) returns, and `deinitialize` after every event
//! logged before [`remove_destination`](Logger::remove_destination) was called.

use crate::destination::{run_on_destination, same_destination, Destination};
use crate::event::{LogEvent, SourceLocation};
use crate::format::{Formatter, TextFormatter};
use crate::queue::{Group, Queue};
use crate::spinlock::Spinlock;
use crate::Level;
use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

/// Process exit status used by [`Logger::fatal`].
pub const FATAL_EXIT_CODE: i32 = 1;

pub struct Logger {
    enabled: AtomicBool,
    minimum_level: AtomicU8,
    formatter: Arc<dyn Formatter>,
    destinations: Spinlock<Vec<Arc<dyn Destination>>>,
    queue: Queue,
}

impl Logger {
    /// A logger that accepts `minimum_level` and above, rendering with `formatter` unless a
    /// destination brings its own.
    pub fn new(minimum_level: Level, formatter: impl Formatter + 'static) -> Self {
        Self::with_shared_formatter(minimum_level, Arc::new(formatter))
    }

    pub fn with_shared_formatter(minimum_level: Level, formatter: Arc<dyn Formatter>) -> Self {
        Logger {
            enabled: AtomicBool::new(true),
            minimum_level: AtomicU8::new(minimum_level as u8),
            formatter,
            destinations: Spinlock::new(Vec::new()),
            queue: Queue::new("logfan-logger"),
        }
    }

    pub fn formatter(&self) -> &Arc<dyn Formatter> {
        &self.formatter
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Turns the whole logger on or off. A disabled logger drops every call at the gate.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn minimum_level(&self) -> Level {
        Level::from_u8(self.minimum_level.load(Ordering::Relaxed))
    }

    pub fn set_minimum_level(&self, level: Level) {
        self.minimum_level.store(level as u8, Ordering::Relaxed);
    }

    /// Whether a call at `level` would currently be accepted.
    #[inline]
    pub fn is_enabled_for(&self, level: Level) -> bool {
        self.is_enabled() && level >= self.minimum_level()
    }

    /// The registered destinations, in registration order.
    pub fn destinations(&self) -> Vec<Arc<dyn Destination>> {
        self.destinations.snapshot()
    }

    pub fn contains_destination(&self, destination: &Arc<dyn Destination>) -> bool {
        self.destinations
            .with(|all| all.iter().any(|d| same_destination(d, destination)))
    }

    /**
    Registers `destination` and schedules its `initialize`.

    Adding the same instance twice is a no-op; returns whether it was newly added.
    */
    pub fn add_destination(&self, destination: Arc<dyn Destination>) -> bool {
        self.destinations.with_mut(|all| {
            if all.iter().any(|d| same_destination(d, &destination)) {
                return false;
            }
            all.push(destination.clone());
            self.queue
                .dispatch(move || run_on_destination(&destination, |d| d.initialize()));
            true
        })
    }

    /**
    Unregisters `destination` and schedules its `deinitialize`.

    Returns whether it was registered. Events logged after this call never reach it.
    */
    pub fn remove_destination(&self, destination: &Arc<dyn Destination>) -> bool {
        self.destinations.with_mut(|all| {
            let Some(index) = all.iter().position(|d| same_destination(d, destination)) else {
                return false;
            };
            let removed = all.remove(index);
            self.schedule_deinitialize(vec![removed]);
            true
        })
    }

    pub fn remove_all_destinations(&self) {
        self.destinations
            .with_mut(|all| self.schedule_deinitialize(std::mem::take(all)));
    }

    /// Called with the registration set locked, so the hook is queued behind every fan-out that
    /// still included these destinations and ahead of any that will not.
    fn schedule_deinitialize(&self, destinations: Vec<Arc<dyn Destination>>) {
        if destinations.is_empty() {
            return;
        }
        self.queue.dispatch(move || {
            for destination in &destinations {
                run_on_destination(destination, |d| d.deinitialize());
            }
        });
    }

    /// Logs `message` at `level` if the gate allows it.
    pub fn log(&self, level: Level, message: impl Into<String>, location: SourceLocation) {
        if self.is_enabled_for(level) {
            self.submit(level, message.into(), location);
        }
    }

    /// Like [`log`](Self::log), but builds the message only if the gate allows it.
    ///
    /// `message` runs at most once, on the calling thread, before this returns.
    pub fn log_with<F>(&self, level: Level, message: F, location: SourceLocation)
    where
        F: FnOnce() -> String,
    {
        if self.is_enabled_for(level) {
            self.submit(level, message(), location);
        }
    }

    /// Like [`log_with`](Self::log_with); a `None` message logs nothing.
    pub fn maybe_log<F>(&self, level: Level, message: F, location: SourceLocation)
    where
        F: FnOnce() -> Option<String>,
    {
        if self.is_enabled_for(level) {
            if let Some(message) = message() {
                self.submit(level, message, location);
            }
        }
    }

    #[track_caller]
    pub fn trace(&self, message: impl Into<String>) {
        self.log(Level::Trace, message, SourceLocation::caller());
    }
    #[track_caller]
    pub fn debug(&self, message: impl Into<String>) {
        self.log(Level::Debug, message, SourceLocation::caller());
    }
    #[track_caller]
    pub fn info(&self, message: impl Into<String>) {
        self.log(Level::Info, message, SourceLocation::caller());
    }
    #[track_caller]
    pub fn warn(&self, message: impl Into<String>) {
        self.log(Level::Warn, message, SourceLocation::caller());
    }
    #[track_caller]
    pub fn error(&self, message: impl Into<String>) {
        self.log(Level::Error, message, SourceLocation::caller());
    }

    /**
    Logs at [`Level::Fatal`], waits for every destination to flush and exits the process.

    Exit happens even if flushing could not complete.
    */
    #[track_caller]
    pub fn fatal(&self, message: impl Into<String>) -> ! {
        self.fatal_at(message, SourceLocation::caller())
    }

    /// [`fatal`](Self::fatal) with an explicit location.
    pub fn fatal_at(&self, message: impl Into<String>, location: SourceLocation) -> ! {
        self.log_fatal_and_synchronize(message.into(), location);
        std::process::exit(FATAL_EXIT_CODE)
    }

    /// Everything [`fatal`](Self::fatal) does short of exiting.
    pub(crate) fn log_fatal_and_synchronize(&self, message: String, location: SourceLocation) {
        self.log(Level::Fatal, message, location);
        self.synchronize();
    }

    fn submit(&self, level: Level, message: String, location: SourceLocation) {
        let event = Arc::new(LogEvent::capture(level, message, location));
        let formatter = self.formatter.clone();
        // snapshot and enqueue under one lock: lifecycle hooks are enqueued under it too
        self.destinations.with(|all| {
            if all.is_empty() {
                return;
            }
            let destinations = all.clone();
            self.queue
                .dispatch(move || fan_out(&event, &destinations, &formatter));
        });
    }

    /**
    Blocks until every registered destination has written and flushed everything logged before
    this call.

    Must not be called from a destination's own queue.
    */
    pub fn synchronize(&self) {
        self.synchronize_matching(None);
    }

    /// Like [`synchronize`](Self::synchronize), but waits for `destination` only.
    ///
    /// Does nothing if `destination` is not registered.
    pub fn synchronize_destination(&self, destination: &Arc<dyn Destination>) {
        self.synchronize_matching(Some(destination));
    }

    fn synchronize_matching(&self, only: Option<&Arc<dyn Destination>>) {
        let select = |all: &Vec<Arc<dyn Destination>>| -> Option<Vec<Arc<dyn Destination>>> {
            match only {
                None => Some(all.clone()),
                Some(wanted) => all
                    .iter()
                    .find(|d| same_destination(d, wanted))
                    .map(|d| vec![d.clone()]),
            }
        };
        if self.queue.is_current() {
            if let Some(destinations) = self.destinations.with(select) {
                synchronize_each(&destinations);
            }
            return;
        }
        let done = Group::new();
        let token = done.token();
        self.destinations.with(|all| {
            if let Some(destinations) = select(all) {
                self.queue.dispatch(move || {
                    synchronize_each(&destinations);
                    drop(token);
                });
            }
        });
        // a job dropped by a dead queue releases its token too
        done.wait();
    }
}

fn synchronize_each(destinations: &[Arc<dyn Destination>]) {
    let group = Group::new();
    for destination in destinations {
        let token = group.token();
        run_on_destination(destination, move |d| {
            d.synchronize();
            drop(token);
        });
    }
    group.wait();
}

fn fan_out(
    event: &Arc<LogEvent>,
    destinations: &[Arc<dyn Destination>],
    default_formatter: &Arc<dyn Formatter>,
) {
    for destination in destinations {
        let formatter = destination
            .formatter()
            .unwrap_or_else(|| default_formatter.clone());
        let event = event.clone();
        run_on_destination(destination, move |d| d.write(&formatter.format(&event)));
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new(Level::Info, TextFormatter::default())
    }
}

impl Drop for Logger {
    fn drop(&mut self) {
        self.destinations
            .with_mut(|all| self.schedule_deinitialize(std::mem::take(all)));
    }
}

impl Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("enabled", &self.is_enabled())
            .field("minimum_level", &self.minimum_level())
            .field("destinations", &self.destinations.with(Vec::len))
            .field("queue", &self.queue)
            .finish()
    }
}

/*
Boilerplate notes.

# Logger

Clone would have to decide whether the copy shares the registration set; wrap it in an `Arc`
instead. PartialEq/Hash have no obvious meaning. Default is the common case: Info and above,
standard formatting, no destinations.
*/
