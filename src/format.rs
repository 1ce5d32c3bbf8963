// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rendering events into entries.
//!
//! A [`Formatter`] is a pure function from [`LogEvent`] to [`LogEntry`]. The [`Logger`](crate::Logger)
//! owns a default formatter and each [`Destination`](crate::Destination) may override it.
//!
//! [`TextFormatter`] is the stock implementation: an ordered list of [`Field`]s that are rendered
//! and concatenated, always terminated by a newline.
//!
//! ```
//! use logfan::{Field, LevelStyle, TextFormatter};
//!
//! let formatter = TextFormatter::new(vec![
//!     Field::Level(LevelStyle::Padded),
//!     Field::Text(" ".into()),
//!     Field::Message,
//! ]);
//! # let _ = formatter;
//! ```

use crate::event::LogEvent;
use crate::Level;
use chrono::{DateTime, Local, Utc};
use std::fmt::{Debug, Write};
use std::path::Path;

/// A rendered log event, ready to be written by a destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    level: Level,
    content: String,
    timestamp: DateTime<Utc>,
    thread_id: u64,
}

impl LogEntry {
    pub fn new(level: Level, content: String, timestamp: DateTime<Utc>, thread_id: u64) -> Self {
        Self {
            level,
            content,
            timestamp,
            thread_id,
        }
    }

    /// An entry carrying `event`'s metadata with the given rendered content.
    pub fn for_event(event: &LogEvent, content: String) -> Self {
        Self::new(event.level(), content, event.timestamp(), event.thread_id())
    }

    pub fn level(&self) -> Level {
        self.level
    }
    /// The rendered text, including its trailing newline.
    pub fn content(&self) -> &str {
        &self.content
    }
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
    pub fn thread_id(&self) -> u64 {
        self.thread_id
    }
}

/// Converts events into entries.
pub trait Formatter: Debug + Send + Sync {
    fn format(&self, event: &LogEvent) -> LogEntry;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LevelStyle {
    /// `0` through `5`
    Decimal,
    /// `INFO`, `WARN`, ...
    Text,
    /// Text padded to five columns
    Padded,
    /// Text cut to at most this many characters
    Truncated(usize),
    /// One symbol per level, indexed by severity
    Custom([String; 6]),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateStyle {
    /// Seconds since the epoch with microsecond fraction
    UnixTime,
    /// A `chrono` format string, rendered in local time
    Format(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadIdStyle {
    Decimal,
    Hexadecimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field {
    Level(LevelStyle),
    Message,
    Function,
    File { full_path: bool, extension: bool },
    Line,
    Location { full_path: bool },
    Date(DateStyle),
    ThreadId(ThreadIdStyle),
    /// Literal text
    Text(String),
}

/// Renders a fixed sequence of [`Field`]s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextFormatter {
    fields: Vec<Field>,
}

impl TextFormatter {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// `12:30:45 | WARN  > message`
    pub fn minimal() -> Self {
        Self::new(vec![
            Field::Date(DateStyle::Format("%H:%M:%S".into())),
            Field::Text(" | ".into()),
            Field::Level(LevelStyle::Padded),
            Field::Text(" > ".into()),
            Field::Message,
        ])
    }

    /// `[12:30:45] WARN  | main.rs:12 > message`
    pub fn concise() -> Self {
        Self::new(vec![
            Field::Text("[".into()),
            Field::Date(DateStyle::Format("%H:%M:%S".into())),
            Field::Text("] ".into()),
            Field::Level(LevelStyle::Padded),
            Field::Text(" | ".into()),
            Field::Location { full_path: false },
            Field::Text(" > ".into()),
            Field::Message,
        ])
    }

    /// `[2026-10-17 12:30:45.123] WARN  | main.rs:12 > message`
    pub fn standard() -> Self {
        Self::new(vec![
            Field::Text("[".into()),
            Field::Date(DateStyle::Format("%Y-%m-%d %H:%M:%S%.3f".into())),
            Field::Text("] ".into()),
            Field::Level(LevelStyle::Padded),
            Field::Text(" | ".into()),
            Field::Location { full_path: false },
            Field::Text(" > ".into()),
            Field::Message,
        ])
    }

    /// Like [`standard`](Self::standard), plus function and thread, with the message on its own line.
    pub fn verbose() -> Self {
        Self::new(vec![
            Field::Text("[".into()),
            Field::Date(DateStyle::Format("%Y-%m-%d %H:%M:%S%.3f".into())),
            Field::Text("] ".into()),
            Field::Level(LevelStyle::Padded),
            Field::Text(" | ".into()),
            Field::Location { full_path: false },
            Field::Text(" - ".into()),
            Field::Function,
            Field::Text(" (thread ".into()),
            Field::ThreadId(ThreadIdStyle::Hexadecimal),
            Field::Text(")\n> ".into()),
            Field::Message,
        ])
    }

    fn render_field(field: &Field, event: &LogEvent, out: &mut String) {
        match field {
            Field::Level(style) => render_level(event.level(), style, out),
            Field::Message => out.push_str(event.message()),
            Field::Function => out.push_str(event.function().unwrap_or("?")),
            Field::File {
                full_path,
                extension,
            } => out.push_str(&file_name(event.file(), *full_path, *extension)),
            Field::Line => {
                let _ = write!(out, "{}", event.line());
            }
            Field::Location { full_path } => {
                let _ = write!(
                    out,
                    "{}:{}",
                    file_name(event.file(), *full_path, true),
                    event.line()
                );
            }
            Field::Date(DateStyle::UnixTime) => {
                let ts = event.timestamp();
                let _ = write!(out, "{}.{:06}", ts.timestamp(), ts.timestamp_subsec_micros());
            }
            Field::Date(DateStyle::Format(format)) => {
                let local = event.timestamp().with_timezone(&Local);
                // an invalid format string renders as nothing rather than panicking
                let mut rendered = String::new();
                if write!(rendered, "{}", local.format(format)).is_ok() {
                    out.push_str(&rendered);
                }
            }
            Field::ThreadId(ThreadIdStyle::Decimal) => {
                let _ = write!(out, "{}", event.thread_id());
            }
            Field::ThreadId(ThreadIdStyle::Hexadecimal) => {
                let _ = write!(out, "{:08X}", event.thread_id());
            }
            Field::Text(text) => out.push_str(text),
        }
    }
}

impl Default for TextFormatter {
    fn default() -> Self {
        Self::standard()
    }
}

impl Formatter for TextFormatter {
    fn format(&self, event: &LogEvent) -> LogEntry {
        let mut content = String::with_capacity(event.message().len() + 64);
        for field in &self.fields {
            Self::render_field(field, event, &mut content);
        }
        if !content.ends_with('\n') {
            content.push('\n');
        }
        LogEntry::for_event(event, content)
    }
}

fn render_level(level: Level, style: &LevelStyle, out: &mut String) {
    match style {
        LevelStyle::Decimal => {
            let _ = write!(out, "{}", level as u8);
        }
        LevelStyle::Text => out.push_str(level.symbol()),
        LevelStyle::Padded => {
            let _ = write!(out, "{:<5}", level.symbol());
        }
        LevelStyle::Truncated(width) => out.extend(level.symbol().chars().take(*width)),
        LevelStyle::Custom(symbols) => out.push_str(&symbols[level as usize]),
    }
}

fn file_name(file: &str, full_path: bool, extension: bool) -> String {
    let path = Path::new(file);
    match (full_path, extension) {
        (true, true) => file.to_string(),
        (true, false) => path.with_extension("").to_string_lossy().into_owned(),
        (false, true) => path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| file.to_string()),
        (false, false) => path
            .file_stem()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| file.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::SourceLocation;
    use chrono::TimeZone;

    fn event(level: Level, message: &str) -> LogEvent {
        LogEvent::from_parts(
            level,
            message.to_string(),
            Utc.with_ymd_and_hms(2024, 3, 1, 10, 20, 30).unwrap(),
            SourceLocation::new("src/server/handler.rs", 42, Some("server::handler")),
            0x1f,
        )
    }

    #[test]
    fn appends_newline() {
        let formatter = TextFormatter::new(vec![Field::Message]);
        assert_eq!(formatter.format(&event(Level::Info, "hello")).content(), "hello\n");
        assert_eq!(formatter.format(&event(Level::Info, "done\n")).content(), "done\n");
    }

    #[test]
    fn level_styles() {
        let mut out = String::new();
        render_level(Level::Warn, &LevelStyle::Padded, &mut out);
        render_level(Level::Error, &LevelStyle::Truncated(3), &mut out);
        render_level(Level::Fatal, &LevelStyle::Decimal, &mut out);
        assert_eq!(out, "WARN ERR5");
    }

    #[test]
    fn location_and_file_fields() {
        let formatter = TextFormatter::new(vec![
            Field::Location { full_path: false },
            Field::Text(" ".into()),
            Field::File {
                full_path: false,
                extension: false,
            },
            Field::Text(" ".into()),
            Field::Function,
            Field::Text(" ".into()),
            Field::ThreadId(ThreadIdStyle::Hexadecimal),
        ]);
        let entry = formatter.format(&event(Level::Debug, ""));
        assert_eq!(entry.content(), "handler.rs:42 handler server::handler 0000001F\n");
        assert_eq!(entry.level(), Level::Debug);
        assert_eq!(entry.thread_id(), 0x1f);
    }

    #[test]
    fn unix_time() {
        let formatter = TextFormatter::new(vec![Field::Date(DateStyle::UnixTime)]);
        let entry = formatter.format(&event(Level::Info, ""));
        assert_eq!(entry.content(), "1709288430.000000\n");
    }

    #[test]
    fn presets_contain_message() {
        for formatter in [
            TextFormatter::minimal(),
            TextFormatter::concise(),
            TextFormatter::standard(),
            TextFormatter::verbose(),
        ] {
            let entry = formatter.format(&event(Level::Error, "disk full"));
            assert!(entry.content().contains("disk full"));
            assert!(entry.content().contains("ERROR"));
        }
    }
}
