// SPDX-License-Identifier: MIT OR Apache-2.0
/*!
# logfan

logfan is an asynchronous, multi-destination logging facility with a self-managing rotated-file
destination.

# The pipeline

Application code logs through a [`Logger`]. The logger checks its gate (enabled, and the level at
or above its minimum), captures a [`LogEvent`] on the calling thread and hands it to its own serial
[`Queue`]. From there the event fans out to every registered [`Destination`]:

* each destination renders the event with its own [`Formatter`] if it has one, else with the
  logger's;
* a destination with its own queue formats and writes there, so a slow disk never holds up the
  console;
* a destination without one runs inline on the logger's queue.

The caller pays for the gate check, capturing the event and one channel send. Nothing else.

```
use logfan::{Field, Level, Logger, MemoryDestination, TextFormatter};
use std::sync::Arc;

let logger = Logger::new(Level::Info, TextFormatter::new(vec![Field::Message]));
let memory = Arc::new(MemoryDestination::new());
logger.add_destination(memory.clone());

logger.debug("below the gate");
logfan::info!(logger, "{} + {} = {}", 1, 1, 2);

// wait for every destination to write and flush
logger.synchronize();
assert_eq!(memory.drain_logs(), "1 + 1 = 2\n");
```

# Destinations

| Destination                   | Queue | Notes                                                     |
|-------------------------------|-------|-----------------------------------------------------------|
| [`StandardStreamDestination`] | none  | stderr at or above a threshold, stdout below it           |
| [`FileDestination`]           | own   | appends to one file                                       |
| [`ManagedFileDestination`]    | own   | rotates by age and size, prunes by age, count and size    |
| [`MemoryDestination`]         | opt.  | keeps entries in memory; meant for tests                  |

Anything implementing [`Destination`] can be registered.

# Managed files

[`ManagedFileDestination`] owns a directory of `{prefix}.{date}.{time}-{micros}.log` files. One is
active; the rest are archived. Active-file quotas (age, size) trigger rotation around each write,
and archived quotas trigger deletion from the oldest end. Quotas can be changed while the
destination runs and take effect immediately. See the [`managed`] module.

# Failure

Destinations never make the logger fail. Problems they cannot handle themselves go to an optional
[`ManagedFileObserver`] or to the process-wide [`diagnostics`] channel. The only way a logging
call ends the process is [`Logger::fatal`], which flushes every destination first.
*/

mod destination;
pub mod diagnostics;
mod error;
mod event;
mod file;
mod format;
mod level;
mod logger;
mod macros;
pub mod managed;
mod memory;
pub mod quota;
mod queue;
mod spinlock;
mod stream;

pub use destination::Destination;
pub use error::{Error, Result};
pub use event::{current_thread_id, LogEvent, SourceLocation};
pub use file::FileDestination;
pub use format::{
    DateStyle, Field, Formatter, LevelStyle, LogEntry, TextFormatter, ThreadIdStyle,
};
pub use level::Level;
pub use logger::{Logger, FATAL_EXIT_CODE};
pub use managed::{ArchivedFile, ManagedFileConfig, ManagedFileDestination, ManagedFileObserver};
pub use memory::MemoryDestination;
pub use queue::Queue;
pub use stream::StandardStreamDestination;
