//! `notify`-backed polling watcher behind the monitor interface.

use anyhow::{Context, Result};
use notify::{Config, Event, PollWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::{FileEvent, FileMonitor};

/// Polling file-system watcher producing filtered [`FileEvent`]s.
pub struct FsWatchMonitor {
    poll_interval: Duration,
    database_path: Option<PathBuf>,
    roots: Vec<PathBuf>,
    filters: Vec<String>,
    events_tx: mpsc::UnboundedSender<FileEvent>,
    events_rx: Option<mpsc::UnboundedReceiver<FileEvent>>,
    watcher: Option<PollWatcher>,
}

impl FsWatchMonitor {
    pub fn new(poll_interval: Duration) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            poll_interval,
            database_path: None,
            roots: Vec::new(),
            filters: Vec::new(),
            events_tx,
            events_rx: Some(events_rx),
            watcher: None,
        }
    }
}

/// Filters expect normalized (lowercase, no leading dot) extensions.
fn matches_filters(path: &Path, filters: &[String]) -> bool {
    if filters.is_empty() {
        return true;
    }
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => {
            let ext = ext.to_ascii_lowercase();
            filters.iter().any(|f| *f == ext)
        }
        None => false,
    }
}

impl FileMonitor for FsWatchMonitor {
    fn set_database_path(&mut self, path: &Path) {
        debug!("monitor change journal at {}", path.display());
        self.database_path = Some(path.to_path_buf());
    }

    fn add_device(&mut self, path: &Path) {
        self.roots.push(path.to_path_buf());
    }

    fn set_file_filters(&mut self, extensions: &[&str]) {
        self.filters = extensions
            .iter()
            .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
            .collect();
    }

    fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<FileEvent>> {
        self.events_rx.take()
    }

    fn start(&mut self) -> Result<()> {
        if let Some(parent) = self.database_path.as_deref().and_then(Path::parent) {
            std::fs::create_dir_all(parent)
                .context("cannot create monitor database directory")?;
        }

        let tx = self.events_tx.clone();
        let filters = self.filters.clone();
        let config = Config::default().with_poll_interval(self.poll_interval);
        let mut watcher = PollWatcher::new(
            move |result: notify::Result<Event>| match result {
                Ok(event) => {
                    if event.kind.is_access() {
                        return;
                    }
                    for path in event.paths {
                        if !matches_filters(&path, &filters) {
                            continue;
                        }
                        let file_type = path
                            .extension()
                            .and_then(|e| e.to_str())
                            .unwrap_or_default()
                            .to_string();
                        // Unbounded send: the watcher thread must never
                        // wait on the consumer.
                        let _ = tx.send(FileEvent { file_type, path });
                    }
                }
                Err(e) => warn!("file watch error: {}", e),
            },
            config,
        )
        .context("cannot create file watcher")?;

        for root in &self.roots {
            watcher
                .watch(root, RecursiveMode::Recursive)
                .with_context(|| format!("cannot watch {}", root.display()))?;
        }
        self.watcher = Some(watcher);
        Ok(())
    }

    fn stop(&mut self) {
        // Dropping the watcher ends its polling thread.
        self.watcher = None;
    }
}
