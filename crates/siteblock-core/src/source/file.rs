//! Command file transport
//!
//! The producer overwrites one JSON file; the agent polls it. Only the newest
//! command survives in the file, and the agent's timestamp check makes the
//! repeated reads harmless.

use super::CommandRequest;
use crate::command::Command;
use crate::error::Result;
use crate::registry::write_atomic;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// Default polling interval
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);

/// Polls a command file
#[derive(Debug, Clone)]
pub struct FilePoller {
    path: PathBuf,
    interval: Duration,
}

impl FilePoller {
    /// Poller for `path` at the default interval
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Override the polling interval
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Path being polled
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the current command, if the file holds a valid one
    ///
    /// A missing, unreadable or malformed file means "no new command".
    pub async fn read(&self) -> Option<Command> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) => {
                debug!(path = %self.path.display(), "No command file: {}", e);
                return None;
            }
        };

        match Command::from_json(&content) {
            Ok(command) => Some(command),
            Err(e) => {
                debug!(path = %self.path.display(), "Ignoring malformed command file: {}", e);
                None
            }
        }
    }

    /// Poll until the receiving side goes away
    pub async fn run(self, commands: mpsc::Sender<CommandRequest>) {
        info!(
            path = %self.path.display(),
            interval_ms = self.interval.as_millis() as u64,
            "Polling command file"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            if let Some(command) = self.read().await {
                if commands.send(CommandRequest::new(command)).await.is_err() {
                    debug!("Agent gone, stopping file poller");
                    break;
                }
            }
        }
    }
}

/// Replace the command file with `command`
///
/// The file is swapped in atomically so the poller never reads a partial
/// document.
pub fn write_command_file<P: AsRef<Path>>(path: P, command: &Command) -> Result<()> {
    let path = path.as_ref();
    let mut temp_name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    temp_name.push(".tmp");
    let temp = path.with_file_name(temp_name);

    write_atomic(path, &temp, command.to_json_pretty()?.as_bytes())?;
    info!(path = %path.display(), block_id = command.block_id, "Wrote command file");
    Ok(())
}
