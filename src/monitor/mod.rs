//! File-system monitoring collaborator.
//!
//! The service loop only consumes the [`FileMonitor`] interface: configure
//! roots and filters, start, stop, and drain the event stream. What the
//! engine does with the change journal behind that interface is its own
//! business.

pub mod watcher;

pub use watcher::FsWatchMonitor;

use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

/// A file-system change observed by the monitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEvent {
    /// File classification as reported by the monitor (the extension).
    pub file_type: String,
    pub path: PathBuf,
}

/// The monitoring engine as consumed by the service loop.
pub trait FileMonitor: Send {
    /// Where the engine keeps its change journal.
    fn set_database_path(&mut self, path: &Path);

    /// Adds one root to watch; called once per configured path.
    fn add_device(&mut self, path: &Path);

    /// Restricts reported events to these extensions.
    fn set_file_filters(&mut self, extensions: &[&str]);

    /// Hands out the event stream; yields `None` once taken.
    fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<FileEvent>>;

    fn start(&mut self) -> anyhow::Result<()>;

    fn stop(&mut self);
}
