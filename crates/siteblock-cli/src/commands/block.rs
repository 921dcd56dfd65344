//! Block command - start a timed block

use anyhow::{bail, Context, Result};
use clap::{ArgGroup, Args};
use colored::Colorize;
use siteblock_core::clock::{unix_now, unix_now_precise};
use siteblock_core::domain::normalize_domains;
use siteblock_core::Command as BlockCommand;
use tracing::info;

use super::{deliver, human_duration, Delivered, DeliveryArgs};
use crate::settings::Settings;

/// Block command arguments
#[derive(Args, Debug)]
#[command(group(ArgGroup::new("duration").required(true).args(["minutes", "hours"])))]
pub struct BlockArgs {
    /// Sites to block (domains or URLs)
    #[arg(required = true, value_name = "SITE")]
    pub sites: Vec<String>,

    /// Block for this many minutes
    #[arg(short, long)]
    pub minutes: Option<u64>,

    /// Block for this many hours
    #[arg(short = 'H', long)]
    pub hours: Option<u64>,

    /// Block identifier (default: derived from the current time)
    #[arg(long)]
    pub id: Option<u64>,

    #[command(flatten)]
    pub delivery: DeliveryArgs,
}

impl BlockArgs {
    /// Requested duration in seconds, `None` if it does not fit
    pub fn duration_secs(&self) -> Option<u64> {
        let minutes = self.minutes.unwrap_or(0).checked_mul(60)?;
        let hours = self.hours.unwrap_or(0).checked_mul(3600)?;
        minutes.checked_add(hours)
    }
}

/// Execute block command
pub fn execute(args: BlockArgs, settings: Settings) -> Result<()> {
    let secs = args.duration_secs().context("Block duration too long")?;
    if secs == 0 {
        bail!("Block duration must be at least one minute");
    }

    let domains = normalize_domains(&args.sites).context("No blockable site given")?;

    let now = unix_now_precise();
    let block_id = args.id.unwrap_or((now * 1000.0) as u64);
    let unblock_timestamp = i64::try_from(secs)
        .ok()
        .and_then(|secs| unix_now().checked_add(secs))
        .context("Block duration too long")?;

    let command = BlockCommand::block(domains.iter().cloned(), block_id, unblock_timestamp, now);
    info!(block_id, unblock_timestamp, "Submitting block");

    let delivered = deliver(&command, &args.delivery, &settings)?;

    let list = domains.iter().cloned().collect::<Vec<_>>().join(", ");
    match delivered {
        Delivered::Queued => println!(
            "{} Block {} queued: {} for {}",
            "✓".green(),
            block_id.to_string().bold(),
            list,
            human_duration(secs)
        ),
        Delivered::Answered(outcome) => println!(
            "{} Block {} {}: {} for {}",
            "✓".green(),
            block_id.to_string().bold(),
            outcome.as_str(),
            list,
            human_duration(secs)
        ),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(minutes: Option<u64>, hours: Option<u64>) -> BlockArgs {
        BlockArgs {
            sites: vec!["example.com".to_string()],
            minutes,
            hours,
            id: None,
            delivery: DeliveryArgs::default(),
        }
    }

    #[test]
    fn test_duration_secs() {
        assert_eq!(args(Some(30), None).duration_secs(), Some(1800));
        assert_eq!(args(None, Some(2)).duration_secs(), Some(7200));
        assert_eq!(args(None, Some(u64::MAX / 1000)).duration_secs(), None);
        assert_eq!(args(Some(u64::MAX), None).duration_secs(), None);
    }
}
