//! Append-only JSONL event log shared by every wallet listener.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use tokio::sync::Mutex;

use crate::models::ChainEvent;

/// One JSON object per line, appended and never rewritten. The mutex
/// guarantees lines from concurrent listeners never interleave.
pub struct EventLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl EventLog {
    /// Open the log for appending, creating parent directories as needed.
    pub fn open(path: impl Into<PathBuf>) -> crate::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stamp the write time and append one line, returning the stamped event.
    pub async fn append(&self, mut event: ChainEvent) -> crate::Result<ChainEvent> {
        event.write_ts = unix_now();
        let line = serde_json::to_string(&event)?;

        let mut file = self.file.lock().await;
        writeln!(file, "{line}")?;
        file.flush()?;

        Ok(event)
    }
}

/// Current wall-clock time as fractional unix seconds.
pub fn unix_now() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1e6
}

/// Read back a previously written event log, skipping blank lines.
pub fn read_events(path: impl AsRef<Path>) -> crate::Result<Vec<ChainEvent>> {
    let file = File::open(path.as_ref())?;
    let mut events = Vec::new();

    for line in BufReader::new(file).lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        events.push(serde_json::from_str(&line)?);
    }

    Ok(events)
}
