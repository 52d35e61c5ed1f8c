//! Event Logger - persists loader events to a JSONL file

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use eyre::Context;
use tokio::sync::broadcast;
use tracing::{debug, error, warn};

use super::bus::EventBus;
use super::types::{EventLogEntry, LoadEvent};

/// Writes every bus event as one timestamped JSON line
pub struct EventLogger {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl EventLogger {
    /// Open (or create) the log file in append mode
    pub fn open(path: impl AsRef<Path>) -> eyre::Result<Self> {
        let path = path.as_ref().to_path_buf();
        debug!(?path, "EventLogger::open: called");
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create event log directory")?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .context(format!("Failed to open event log {}", path.display()))?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one event
    pub fn write_event(&mut self, event: &LoadEvent) -> eyre::Result<()> {
        debug!(event_type = event.event_type(), "EventLogger::write_event");
        let entry = EventLogEntry::new(event.clone());
        let json = serde_json::to_string(&entry)?;
        writeln!(self.writer, "{}", json)?;
        self.writer.flush()?;
        Ok(())
    }

    /// Consume events until every sender is gone
    async fn drain(&mut self, mut rx: broadcast::Receiver<LoadEvent>) {
        debug!("EventLogger::drain: starting event logger");
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if let Err(e) = self.write_event(&event) {
                        error!(source = event.source(), error = %e, "EventLogger: failed to write event");
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(missed = n, "EventLogger: lagged behind, missed events");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("EventLogger: channel closed, shutting down");
                    break;
                }
            }
        }
        let _ = self.writer.flush();
    }
}

/// Read back all entries from a JSONL event log
pub fn read_events(path: impl AsRef<Path>) -> eyre::Result<Vec<EventLogEntry>> {
    let path = path.as_ref();
    debug!(?path, "read_events: reading log file");

    if !path.exists() {
        return Ok(Vec::new());
    }

    let content = fs::read_to_string(path)?;
    let mut entries = Vec::new();
    for line in content.lines() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<EventLogEntry>(line) {
            Ok(entry) => entries.push(entry),
            Err(e) => {
                warn!(line, error = %e, "read_events: failed to parse line");
            }
        }
    }

    debug!(count = entries.len(), "read_events: loaded entries");
    Ok(entries)
}

/// Spawn a logger for `path` as a background task
pub fn spawn_event_logger(
    event_bus: &EventBus,
    path: impl AsRef<Path>,
) -> eyre::Result<tokio::task::JoinHandle<()>> {
    let mut logger = EventLogger::open(path)?;
    let rx = event_bus.subscribe();
    Ok(tokio::spawn(async move {
        logger.drain(rx).await;
    }))
}
