// SPDX-License-Identifier: MIT OR Apache-2.0

//! Call-site macros.
//!
//! The leveled macros check the logger's gate *before* formatting, so arguments to a rejected call
//! are never evaluated:
//!
//! ```
//! use logfan::{Level, Logger, MemoryDestination, TextFormatter, Field};
//! use std::sync::Arc;
//!
//! let logger = Logger::new(Level::Info, TextFormatter::new(vec![Field::Message]));
//! let memory = Arc::new(MemoryDestination::new());
//! logger.add_destination(memory.clone());
//!
//! fn expensive() -> u32 { unreachable!("not evaluated below the gate") }
//! logfan::debug!(logger, "value is {}", expensive());
//! logfan::info!(logger, "{} files indexed", 3);
//!
//! logger.synchronize();
//! assert_eq!(memory.drain_logs(), "3 files indexed\n");
//! ```

/// The [`SourceLocation`](crate::SourceLocation) of the macro invocation, with the module path as
/// the function name.
#[macro_export]
macro_rules! location {
    () => {
        $crate::SourceLocation::new(file!(), line!(), Some(module_path!()))
    };
}

/// Logs a `format!`-style message at an explicit level.
#[macro_export]
macro_rules! log {
    ($logger:expr, $level:expr, $($arg:tt)+) => {{
        let logger: &$crate::Logger = &$logger;
        let level: $crate::Level = $level;
        if logger.is_enabled_for(level) {
            logger.log(level, ::std::format!($($arg)+), $crate::location!());
        }
    }};
}

#[macro_export]
macro_rules! trace {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::Level::Trace, $($arg)+)
    };
}

#[macro_export]
macro_rules! debug {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::Level::Debug, $($arg)+)
    };
}

#[macro_export]
macro_rules! info {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::Level::Info, $($arg)+)
    };
}

#[macro_export]
macro_rules! warn {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::Level::Warn, $($arg)+)
    };
}

#[macro_export]
macro_rules! error {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::Level::Error, $($arg)+)
    };
}

/// Logs at [`Level::Fatal`](crate::Level::Fatal), flushes every destination and exits.
#[macro_export]
macro_rules! fatal {
    ($logger:expr, $($arg:tt)+) => {{
        let logger: &$crate::Logger = &$logger;
        logger.fatal_at(::std::format!($($arg)+), $crate::location!())
    }};
}

#[cfg(test)]
mod tests {
    use crate::{Field, Level, Logger, MemoryDestination, TextFormatter};
    use std::sync::Arc;

    #[test]
    fn location_names_module() {
        let location = location!();
        assert!(location.file.ends_with("macros.rs"));
        assert_eq!(location.function, Some(module_path!()));
    }

    #[test]
    fn leveled_macros_respect_gate() {
        let logger = Logger::new(
            Level::Warn,
            TextFormatter::new(vec![
                Field::Level(crate::LevelStyle::Text),
                Field::Text(" ".into()),
                Field::Message,
            ]),
        );
        let memory = Arc::new(MemoryDestination::new());
        logger.add_destination(memory.clone());
        let mut evaluated = false;
        debug!(logger, "{}", {
            evaluated = true;
            "hidden"
        });
        warn!(logger, "disk at {}%", 91);
        error!(logger, "disk full");
        logger.synchronize();
        assert!(!evaluated);
        assert_eq!(memory.drain_logs(), "WARN disk at 91%\nERROR disk full\n");
    }
}
