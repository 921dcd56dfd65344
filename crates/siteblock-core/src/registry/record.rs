//! Persisted block records

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// External identifier grouping a set of domains blocked together
pub type BlockId = u64;

/// Identifier of a single installed network rule
pub type RuleId = u32;

/// First identifier handed out to dynamic rules
pub const DEFAULT_FIRST_RULE_ID: RuleId = 1000;

/// Current persisted document layout
pub const STATE_VERSION: u32 = 1;

/// State of one active block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRecord {
    /// Block identifier
    pub block_id: BlockId,
    /// Normalized domains covered by this block
    pub domains: BTreeSet<String>,
    /// Installed rules, in installation order
    pub rule_ids: Vec<RuleId>,
    /// Expiry in unix seconds
    pub unblock_timestamp: i64,
}

impl BlockRecord {
    /// Whether the block has run out at `now`
    pub fn is_expired(&self, now: i64) -> bool {
        self.unblock_timestamp <= now
    }

    /// Seconds left before expiry, zero once expired
    pub fn remaining_secs(&self, now: i64) -> u64 {
        u64::try_from(self.unblock_timestamp - now).unwrap_or(0)
    }

    /// Domains as a comma separated list, for messages
    pub fn domain_list(&self) -> String {
        self.domains
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// The whole persisted document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistedState {
    /// Layout version
    pub version: u32,
    /// Active blocks by identifier
    pub blocks: BTreeMap<BlockId, BlockRecord>,
    /// Next rule identifier to hand out
    pub next_rule_id: RuleId,
    /// Timestamp of the last successfully executed command
    pub last_command_timestamp: f64,
}

impl Default for PersistedState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            blocks: BTreeMap::new(),
            next_rule_id: DEFAULT_FIRST_RULE_ID,
            last_command_timestamp: 0.0,
        }
    }
}
