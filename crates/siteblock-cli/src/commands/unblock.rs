//! Unblock command - lift a block early

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use siteblock_core::clock::unix_now_precise;
use siteblock_core::{BlockId, Command as BlockCommand};
use tracing::info;

use super::{deliver, Delivered, DeliveryArgs};
use crate::settings::Settings;

/// Unblock command arguments
#[derive(Args, Debug)]
pub struct UnblockArgs {
    /// Block identifier, as shown by `siteblock status`
    pub id: BlockId,

    #[command(flatten)]
    pub delivery: DeliveryArgs,
}

/// Execute unblock command
pub fn execute(args: UnblockArgs, settings: Settings) -> Result<()> {
    let command = BlockCommand::unblock(args.id, unix_now_precise());
    info!(block_id = args.id, "Submitting unblock");

    match deliver(&command, &args.delivery, &settings)? {
        Delivered::Queued => println!("{} Unblock of {} queued", "✓".green(), args.id),
        Delivered::Answered(outcome) => {
            println!("{} Unblock of {} {}", "✓".green(), args.id, outcome.as_str())
        }
    }

    Ok(())
}
