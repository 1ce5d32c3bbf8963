// SPDX-License-Identifier: MIT OR Apache-2.0

//! Serial execution contexts.
//!
//! A [`Queue`] owns one worker thread fed by a channel. Jobs run one at a time in the order they
//! were dispatched. The [`Logger`](crate::Logger) has one, and any [`Destination`](crate::Destination)
//! may bring its own.
//!
//! Dropping a `Queue` closes its channel; the worker finishes whatever is already queued and then
//! exits.

use crate::diagnostics;
use crate::Level;
use std::cell::Cell;
use std::fmt::Debug;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use wasm_safe_mutex::mpsc;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// How long a blocked waiter sleeps in the channel before checking again.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

static QUEUE_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static CURRENT_QUEUE: Cell<u64> = const { Cell::new(0) };
}

/// A serial execution context backed by a dedicated thread.
pub struct Queue {
    id: u64,
    label: String,
    sender: mpsc::Sender<Job>,
}

impl Queue {
    /// Starts a new worker thread named `label`.
    pub fn new(label: impl Into<String>) -> Self {
        let label = label.into();
        let id = QUEUE_ID.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::channel();
        let spawned = std::thread::Builder::new()
            .name(label.clone())
            .spawn(move || worker_loop(id, receiver));
        if let Err(e) = spawned {
            // the receiver went down with the closure, so every dispatch will report
            diagnostics::report(
                Level::Error,
                &format!("could not start queue {label}: {e}"),
            );
        }
        Queue { id, label, sender }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Whether the calling thread is this queue's worker.
    pub fn is_current(&self) -> bool {
        CURRENT_QUEUE.with(|current| current.get() == self.id)
    }

    /// Schedules `f` to run after everything dispatched before it. Never blocks.
    pub fn dispatch<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.sender.send_sync(Box::new(f)).is_err() {
            diagnostics::report(
                Level::Error,
                &format!("queue {} is no longer running; job dropped", self.label),
            );
        }
    }

    /**
    Runs `f` on the queue and blocks until it returns.

    Called from the queue's own worker, `f` runs inline instead of deadlocking. Returns `None` if
    the worker is gone or `f` panicked.
    */
    pub fn sync<F, R>(&self, f: F) -> Option<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        if self.is_current() {
            return Some(f());
        }
        let (reply, result) = mpsc::channel();
        self.dispatch(move || {
            let _ = reply.send_sync(f());
        });
        wait_for(&result)
    }
}

impl Debug for Queue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Queue")
            .field("id", &self.id)
            .field("label", &self.label)
            .finish()
    }
}

fn worker_loop(id: u64, receiver: mpsc::Receiver<Job>) {
    CURRENT_QUEUE.with(|current| current.set(id));
    loop {
        match receiver.recv_sync_timeout(Instant::now() + POLL_INTERVAL) {
            Ok(job) => {
                if std::panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                    diagnostics::report(Level::Error, "a queued job panicked");
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }
}

fn wait_for<T: Send>(receiver: &mpsc::Receiver<T>) -> Option<T> {
    loop {
        match receiver.recv_sync_timeout(Instant::now() + POLL_INTERVAL) {
            Ok(value) => return Some(value),
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => return None,
        }
    }
}

/// Join point for work fanned out across several queues.
///
/// Each unit of work holds a [`Token`] and drops it when done; [`wait`](Self::wait) returns once
/// every token handed out has been dropped, whether the work ran or was discarded.
pub(crate) struct Group {
    token: mpsc::Sender<()>,
    done: mpsc::Receiver<()>,
}

pub(crate) type Token = mpsc::Sender<()>;

impl Group {
    pub(crate) fn new() -> Self {
        let (token, done) = mpsc::channel();
        Group { token, done }
    }

    pub(crate) fn token(&self) -> Token {
        self.token.clone()
    }

    pub(crate) fn wait(self) {
        let Group { token, done } = self;
        drop(token);
        while wait_for(&done).is_some() {}
    }
}
