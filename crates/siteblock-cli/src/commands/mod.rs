//! CLI commands

pub mod block;
pub mod completions;
pub mod config;
pub mod run;
pub mod status;
pub mod unblock;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use siteblock_core::source::{send_command, write_command_file};
use siteblock_core::{Command as BlockCommand, CommandOutcome};
use std::net::SocketAddr;
use tracing::debug;

use crate::settings::Settings;

/// CLI commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the blocking agent (main command)
    Run(run::RunArgs),

    /// Block sites for a while
    Block(block::BlockArgs),

    /// Lift a block early
    Unblock(unblock::UnblockArgs),

    /// Show active blocks
    Status(status::StatusArgs),

    /// Configuration management
    Config(config::ConfigArgs),

    /// Generate shell completions
    Completions(completions::CompletionsArgs),
}

impl Command {
    /// Whether the command works on the agent's configuration and files
    pub fn needs_settings(&self) -> bool {
        !matches!(self, Self::Config(_) | Self::Completions(_))
    }
}

/// How a command reaches the agent
#[derive(Args, Debug, Clone, Default)]
pub struct DeliveryArgs {
    /// Send to a running agent's socket instead of the command file
    #[arg(long, value_name = "ADDR")]
    pub socket: Option<SocketAddr>,

    /// Always write the command file, even if a socket is configured
    #[arg(long, conflicts_with = "socket")]
    pub file: bool,
}

/// Result of handing a command over
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivered {
    /// Written to the command file; applied on the agent's next poll
    Queued,
    /// Answered by the agent over the socket
    Answered(CommandOutcome),
}

/// Hand `command` to the agent
pub fn deliver(command: &BlockCommand, delivery: &DeliveryArgs, settings: &Settings) -> Result<Delivered> {
    let socket = if delivery.file {
        None
    } else {
        delivery.socket.or(settings.config.source.listen)
    };

    match socket {
        Some(addr) => {
            debug!(%addr, "Sending command to agent socket");
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .context("Failed to start async runtime")?;
            let reply = runtime
                .block_on(send_command(addr, command))
                .with_context(|| format!("Failed to reach agent at {addr}"))?;
            let outcome = reply.map_err(|message| anyhow::anyhow!("Agent rejected command: {message}"))?;
            Ok(Delivered::Answered(outcome))
        }
        None => {
            write_command_file(&settings.command_file, command).with_context(|| {
                format!(
                    "Failed to write command file {}",
                    settings.command_file.display()
                )
            })?;
            Ok(Delivered::Queued)
        }
    }
}

/// Format a duration in seconds as e.g. `1h 05m`
pub fn human_duration(secs: u64) -> String {
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;

    if hours > 0 {
        format!("{hours}h {minutes:02}m")
    } else if minutes > 0 {
        format!("{minutes}m {seconds:02}s")
    } else {
        format!("{seconds}s")
    }
}
