//! Startup reconciliation
//!
//! Timers live only as long as the process; the registry survives. On start
//! every persisted record is either expired on the spot or gets its timer
//! back. The rule counter is also pushed past whatever the installer still
//! holds, and rules with no owning record can be swept.

use super::Agent;
use crate::error::Result;
use crate::registry::BlockId;
use tracing::{info, warn};

/// What reconciliation did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Blocks found expired and removed
    pub expired: Vec<BlockId>,
    /// Blocks whose timers were re-armed
    pub rearmed: Vec<BlockId>,
    /// Installed rules removed because no record owned them
    pub orphans_removed: usize,
}

impl Agent {
    /// Bring timers and rules back in line with the persisted registry
    ///
    /// Must be called from within a tokio runtime.
    pub fn reconcile(&mut self) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::default();

        if let Some(max_installed) = self.rules.max_installed_id()? {
            self.registry.ensure_rule_ids_above(max_installed)?;
        }

        if self.options.sweep_orphan_rules {
            report.orphans_removed = self.rules.sweep_orphans(&self.registry.owned_rule_ids())?;
        }

        let now = self.clock.now();
        for block_id in self.registry.block_ids() {
            let Some(record) = self.registry.get(block_id) else {
                continue;
            };

            if record.is_expired(now) {
                info!(block_id, "Persisted block expired while stopped");
                if let Err(e) = self.unblock(block_id) {
                    warn!(block_id, "Could not remove expired block: {}", e);
                    continue;
                }
                report.expired.push(block_id);
            } else {
                let unblock_timestamp = record.unblock_timestamp;
                info!(
                    block_id,
                    remaining_secs = record.remaining_secs(now),
                    "Restored block for {}",
                    record.domain_list()
                );
                self.scheduler.schedule(block_id, unblock_timestamp);
                report.rearmed.push(block_id);
            }
        }

        self.notify_badge();
        Ok(report)
    }
}
