//! Status command - show active blocks

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use siteblock_core::clock::unix_now;
use siteblock_core::registry::{JsonFileStore, StateStore};
use siteblock_core::Badge;

use super::human_duration;
use crate::settings::Settings;

/// Status command arguments
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Print the raw state document as JSON
    #[arg(long)]
    pub json: bool,
}

/// Execute status command
pub fn execute(args: StatusArgs, settings: Settings) -> Result<()> {
    let store = JsonFileStore::new(&settings.state_file);
    let state = store
        .load()
        .with_context(|| format!("Failed to read state file {}", settings.state_file.display()))?
        .unwrap_or_default();

    if args.json {
        let json = serde_json::to_string_pretty(&state).context("Failed to serialize state")?;
        println!("{}", json);
        return Ok(());
    }

    let badge = Badge::new(state.blocks.len());
    if state.blocks.is_empty() {
        println!("No active blocks");
        return Ok(());
    }

    println!("{} {}", "Active blocks:".bold(), badge.text().red().bold());
    println!();

    let now = unix_now();
    for record in state.blocks.values() {
        let remaining = if record.is_expired(now) {
            "expired".yellow().to_string()
        } else {
            format!("{} left", human_duration(record.remaining_secs(now)))
        };

        println!(
            "  {}  {}  ({})",
            format!("#{}", record.block_id).cyan(),
            record.domain_list(),
            remaining
        );
        if record.rule_ids.is_empty() {
            println!("      {}", "no rules installed".dimmed());
        }
    }

    println!();
    println!("  State file: {}", settings.state_file.display());

    Ok(())
}
