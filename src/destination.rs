// SPDX-License-Identifier: MIT OR Apache-2.0
use crate::format::{Formatter, LogEntry};
use crate::queue::Queue;
use std::fmt::Debug;
use std::sync::Arc;

/// A sink for rendered log entries.
///
/// Everything except [`write`](Self::write) has a default. A destination that does slow work
/// (disk, network) should return its own [`Queue`] from [`queue`](Self::queue); the
/// [`Logger`](crate::Logger) then runs every lifecycle hook and every write for it on that queue, so
/// a slow destination never holds up the others. Destinations without a queue run inline on
/// whichever context calls them.
pub trait Destination: Debug + Send + Sync {
    /**
    Overrides the logger's default formatter for this destination.
    */
    fn formatter(&self) -> Option<Arc<dyn Formatter>> {
        None
    }

    /**
    The serial context this destination wants to run on, if any.
    */
    fn queue(&self) -> Option<&Queue> {
        None
    }

    /// Called once after the destination is added to a logger.
    fn initialize(&self) {}

    /// Called once after the destination is removed from a logger, or when the logger drops.
    fn deinitialize(&self) {}

    /**
    Consumes one rendered entry.

    Failures are the destination's own business; they must not panic.
    */
    fn write(&self, entry: &LogEntry);

    /**
    Flushes buffered entries to their final resting place.

    The application may imminently exit.
    */
    fn synchronize(&self) {}
}

/// Identity comparison for trait objects, ignoring vtable pointers.
pub(crate) fn same_destination(a: &Arc<dyn Destination>, b: &Arc<dyn Destination>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// Runs `f` on the destination's queue, or inline if it has none.
pub(crate) fn run_on_destination<F>(destination: &Arc<dyn Destination>, f: F)
where
    F: FnOnce(&dyn Destination) + Send + 'static,
{
    match destination.queue() {
        Some(queue) => {
            let target = destination.clone();
            queue.dispatch(move || f(target.as_ref()));
        }
        None => f(destination.as_ref()),
    }
}

/*
Boilerplate notes.

# Destination

Clone is left to implementors; the logger holds destinations behind `Arc` and compares them by
address, so data equality would be the wrong notion of identity anyway.
Default is not sensible (a file destination needs a path).
Send/Sync are required because writes may hop between the logger's queue and the destination's.
*/
