//! Fan-out logger over independently-optional destinations.
//!
//! Three destinations exist: the structured OS event log (forwarded into
//! the `tracing` pipeline, which journald captures when running under the
//! service manager), an append-only file, and the console for debug runs.
//! Logging is best-effort observability: a sink failure is discarded and
//! never prevents delivery to the remaining sinks.

use chrono::Local;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::Mutex;

use crate::constants::LOG_FILE_NAME;

/// Severity of a log record; maps one-to-one onto every sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

impl LogLevel {
    fn as_str(self) -> &'static str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
        }
    }
}

/// One delivery destination. Failures are the logger's to discard.
pub trait LogSink: Send + Sync {
    fn write(&self, level: LogLevel, message: &str) -> io::Result<()>;
}

/// Forwards records into the `tracing` pipeline.
pub struct EventLogSink;

impl LogSink for EventLogSink {
    fn write(&self, level: LogLevel, message: &str) -> io::Result<()> {
        match level {
            LogLevel::Info => tracing::info!(target: "eventlog", "{}", message),
            LogLevel::Warning => tracing::warn!(target: "eventlog", "{}", message),
            LogLevel::Error => tracing::error!(target: "eventlog", "{}", message),
        }
        Ok(())
    }
}

/// Appends `timestamp [LEVEL] message` lines to the service log file.
pub struct FileSink {
    file: Mutex<File>,
}

impl FileSink {
    /// Opens the log file in append mode, creating its directory if absent.
    pub fn open(log_dir: &Path) -> io::Result<Self> {
        std::fs::create_dir_all(log_dir)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_dir.join(LOG_FILE_NAME))?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl LogSink for FileSink {
    fn write(&self, level: LogLevel, message: &str) -> io::Result<()> {
        let mut file = self
            .file
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log file lock poisoned"))?;
        writeln!(
            file,
            "{} [{}] {}",
            Local::now().format("%Y/%m/%d %H:%M:%S"),
            level.as_str(),
            message
        )
    }
}

/// Writes `[LEVEL] message` lines to standard error.
pub struct ConsoleSink;

impl LogSink for ConsoleSink {
    fn write(&self, level: LogLevel, message: &str) -> io::Result<()> {
        let mut err = io::stderr().lock();
        writeln!(err, "[{}] {}", level.as_str(), message)
    }
}

/// Fan-out entry point over the configured sinks.
pub struct ServiceLogger {
    event: Option<EventLogSink>,
    file: Mutex<Option<FileSink>>,
    console: Option<ConsoleSink>,
}

impl Default for ServiceLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceLogger {
    /// Event-log destination only; the file destination is attached during
    /// service setup and the console one in debug mode.
    pub fn new() -> Self {
        Self {
            event: Some(EventLogSink),
            file: Mutex::new(None),
            console: None,
        }
    }

    /// Enables the console destination (debug mode).
    pub fn with_console(mut self) -> Self {
        self.console = Some(ConsoleSink);
        self
    }

    /// Disables the event-log destination.
    pub fn without_event_log(mut self) -> Self {
        self.event = None;
        self
    }

    /// Points the file destination at `log_dir`, closing any previously
    /// open handle first.
    pub fn init_file(&self, log_dir: &Path) -> io::Result<()> {
        let sink = FileSink::open(log_dir)?;
        let mut slot = self
            .file
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log sink lock poisoned"))?;
        // The old handle, if any, is dropped (closed) here.
        *slot = Some(sink);
        Ok(())
    }

    /// Delivers one record to every configured sink. Individual sink
    /// failures are discarded.
    pub fn log(&self, level: LogLevel, message: &str) {
        if let Some(sink) = &self.event {
            let _ = sink.write(level, message);
        }
        if let Ok(slot) = self.file.lock() {
            if let Some(sink) = slot.as_ref() {
                let _ = sink.write(level, message);
            }
        }
        if let Some(sink) = &self.console {
            let _ = sink.write(level, message);
        }
    }

    pub fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    pub fn warning(&self, message: &str) {
        self.log(LogLevel::Warning, message);
    }

    pub fn error(&self, message: &str) {
        self.log(LogLevel::Error, message);
    }
}
