/*
 * Copyright Stalwart Labs Ltd. See the COPYING
 * file at the top-level directory of this distribution.
 *
 * Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
 * https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
 * <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
 * option. This file may not be copied, modified, or distributed
 * except according to those terms.
 */

//! Structured log sink.
//!
//! Every record is rendered as
//! `yyyy-mm-dd HH:MM:SS,mmm [LEVEL caller line] message` and written
//! synchronously to the sink selected when the [`Logger`] is opened.
//! Records are emitted through the [`debug!`], [`info!`], [`warning!`],
//! [`error!`] and [`critical!`] macros, which capture the calling function
//! and line at compile time.

use std::{
    convert::Infallible,
    fmt::Display,
    fs::{File, OpenOptions},
    io::{self, Write},
    path::PathBuf,
    str::FromStr,
    sync::{Mutex, PoisonError},
};

use chrono::{DateTime, Local};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S,%3f";

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
            Level::Critical => "CRITICAL",
        })
    }
}

/// Function name and source line a record was emitted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    function: &'static str,
    line: u32,
}

impl Caller {
    pub const fn new(function: &'static str, line: u32) -> Self {
        Caller { function, line }
    }

    /// Derives the caller from the type path of an item nested inside the
    /// calling function, as produced by [`caller!`](crate::caller).
    pub fn from_type_name(type_name: &'static str, line: u32) -> Self {
        let function = type_name
            .strip_suffix("::f")
            .unwrap_or(type_name)
            .rsplit("::")
            .find(|segment| !segment.is_empty() && *segment != "{{closure}}")
            .unwrap_or("main");

        Caller { function, line }
    }

    pub fn function(&self) -> &'static str {
        self.function
    }

    pub fn line(&self) -> u32 {
        self.line
    }
}

#[derive(Debug, Clone)]
pub struct LogRecord {
    pub timestamp: DateTime<Local>,
    pub level: Level,
    pub caller: Caller,
    pub message: String,
}

impl LogRecord {
    pub fn new(level: Level, caller: Caller, message: impl Display) -> Self {
        LogRecord {
            timestamp: Local::now(),
            level,
            caller,
            message: message.to_string(),
        }
    }
}

impl Display for LogRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [{} {} {}] {}",
            self.timestamp.format(TIMESTAMP_FORMAT),
            self.level,
            self.caller.function,
            self.caller.line,
            self.message
        )
    }
}

/// Where log records go.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LogTarget {
    #[default]
    Stdout,
    File(PathBuf),
}

impl FromStr for LogTarget {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(if s.eq_ignore_ascii_case("stdout") {
            LogTarget::Stdout
        } else {
            LogTarget::File(s.into())
        })
    }
}

enum Sink {
    Stdout(io::Stdout),
    File(File),
}

impl Write for Sink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Sink::Stdout(stdout) => stdout.lock().write(buf),
            Sink::File(file) => file.write(buf),
        }
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        match self {
            Sink::Stdout(stdout) => stdout.lock().write_all(buf),
            Sink::File(file) => file.write_all(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Sink::Stdout(stdout) => stdout.flush(),
            Sink::File(file) => file.flush(),
        }
    }
}

/// Structured logger.
///
/// Built once at startup and shared by reference. The sink cannot be
/// changed afterwards.
pub struct Logger {
    sink: Mutex<Sink>,
}

impl Logger {
    /// Opens the sink for `target`. Files are created if missing and
    /// appended to otherwise.
    pub fn open(target: &LogTarget) -> io::Result<Self> {
        let sink = match target {
            LogTarget::Stdout => Sink::Stdout(io::stdout()),
            LogTarget::File(path) => {
                Sink::File(OpenOptions::new().create(true).append(true).open(path)?)
            }
        };

        Ok(Logger {
            sink: Mutex::new(sink),
        })
    }

    pub fn stdout() -> Self {
        Logger {
            sink: Mutex::new(Sink::Stdout(io::stdout())),
        }
    }

    pub fn log(&self, level: Level, caller: Caller, message: impl Display) {
        self.write(&LogRecord::new(level, caller, message));
    }

    /// Writes a single record. A sink that can no longer be written to
    /// leaves no way to report anything else, so the failure is fatal.
    pub fn write(&self, record: &LogRecord) {
        let mut sink = self.sink.lock().unwrap_or_else(PoisonError::into_inner);
        let line = format!("{}\n", record);

        if let Err(err) = sink
            .write_all(line.as_bytes())
            .and_then(|_| sink.flush())
        {
            panic!("Failed to write log record: {}", err);
        }
    }
}

/// Captures the enclosing function name and the current line.
#[macro_export]
macro_rules! caller {
    () => {{
        fn f() {}
        fn type_name_of<T>(_: T) -> &'static str {
            ::std::any::type_name::<T>()
        }
        $crate::logger::Caller::from_type_name(type_name_of(f), ::std::line!())
    }};
}

#[macro_export]
macro_rules! log_at {
    ($logger:expr, $level:expr, $($arg:tt)+) => {
        $logger.log($level, $crate::caller!(), ::std::format_args!($($arg)+))
    };
}

#[macro_export]
macro_rules! debug {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log_at!($logger, $crate::logger::Level::Debug, $($arg)+)
    };
}

#[macro_export]
macro_rules! info {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log_at!($logger, $crate::logger::Level::Info, $($arg)+)
    };
}

#[macro_export]
macro_rules! warning {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log_at!($logger, $crate::logger::Level::Warning, $($arg)+)
    };
}

#[macro_export]
macro_rules! error {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log_at!($logger, $crate::logger::Level::Error, $($arg)+)
    };
}

#[macro_export]
macro_rules! critical {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log_at!($logger, $crate::logger::Level::Critical, $($arg)+)
    };
}
