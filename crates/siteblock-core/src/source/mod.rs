//! Command delivery
//!
//! Sources turn some transport into [`CommandRequest`]s on a channel the
//! agent consumes. Two transports share the same JSON schema:
//!
//! - [`FilePoller`]: re-reads a command file at a fixed interval
//! - [`SocketListener`]: newline-delimited JSON over a local TCP socket,
//!   with a one-line reply per command

mod file;
mod socket;

pub use file::{write_command_file, FilePoller};
pub use socket::{send_command, SocketListener};

use crate::agent::CommandOutcome;
use crate::command::Command;
use tokio::sync::{mpsc, oneshot};

/// Default capacity of the command channel
pub const COMMAND_CHANNEL_CAPACITY: usize = 64;

/// Reply to a command: outcome, or the error text
pub type CommandReply = std::result::Result<CommandOutcome, String>;

/// A command plus an optional way to report back
#[derive(Debug)]
pub struct CommandRequest {
    /// The command as received
    pub command: Command,
    /// Where to send the outcome, if the transport can carry one
    pub reply: Option<oneshot::Sender<CommandReply>>,
}

impl CommandRequest {
    /// Fire-and-forget request
    pub fn new(command: Command) -> Self {
        Self {
            command,
            reply: None,
        }
    }

    /// Request with a reply channel
    pub fn with_reply(command: Command) -> (Self, oneshot::Receiver<CommandReply>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                command,
                reply: Some(tx),
            },
            rx,
        )
    }
}

/// Create the channel sources feed and the agent drains
pub fn command_channel() -> (mpsc::Sender<CommandRequest>, mpsc::Receiver<CommandRequest>) {
    mpsc::channel(COMMAND_CHANNEL_CAPACITY)
}
