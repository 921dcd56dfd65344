//! Block registry
//!
//! The persisted mapping `block_id -> BlockRecord` is the single source of
//! truth for what is blocked. Alongside the records the same document keeps
//! the rule identifier counter and the timestamp of the last executed
//! command, so neither resets when the agent restarts.
//!
//! Every mutation updates the in-memory document and persists it before
//! returning. Mutations take `&mut self`; the agent owns the registry, so a
//! read-modify-write can never interleave with another one.

mod record;
mod store;

pub use record::{
    BlockId, BlockRecord, PersistedState, RuleId, DEFAULT_FIRST_RULE_ID, STATE_VERSION,
};
pub use store::{write_atomic, JsonFileStore, MemoryStore, StateStore};

use crate::error::{Error, Result};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// Persisted registry of active blocks
pub struct Registry {
    store: Box<dyn StateStore>,
    state: PersistedState,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("store", &self.store.describe())
            .field("blocks", &self.state.blocks.len())
            .field("next_rule_id", &self.state.next_rule_id)
            .finish()
    }
}

impl Registry {
    /// Open the registry, starting empty if the store holds nothing
    ///
    /// `first_rule_id` is a floor for the rule counter; a stored counter
    /// that is already higher wins.
    pub fn open(store: Box<dyn StateStore>, first_rule_id: RuleId) -> Result<Self> {
        let mut state = store.load()?.unwrap_or_default();

        if state.version > STATE_VERSION {
            warn!(
                version = state.version,
                supported = STATE_VERSION,
                "State document is newer than this build"
            );
        }
        state.version = STATE_VERSION;
        state.next_rule_id = state.next_rule_id.max(first_rule_id);

        info!(
            store = %store.describe(),
            blocks = state.blocks.len(),
            next_rule_id = state.next_rule_id,
            "Opened block registry"
        );

        Ok(Self { store, state })
    }

    /// Record for `block_id`, if active
    pub fn get(&self, block_id: BlockId) -> Option<&BlockRecord> {
        self.state.blocks.get(&block_id)
    }

    /// Whether `block_id` is active
    pub fn contains(&self, block_id: BlockId) -> bool {
        self.state.blocks.contains_key(&block_id)
    }

    /// Insert or replace a record, returning the previous one
    pub fn put(&mut self, record: BlockRecord) -> Result<Option<BlockRecord>> {
        let previous = self.state.blocks.insert(record.block_id, record);
        self.persist()?;
        Ok(previous)
    }

    /// Delete a record, returning it if it existed
    pub fn remove(&mut self, block_id: BlockId) -> Result<Option<BlockRecord>> {
        let removed = self.state.blocks.remove(&block_id);
        if removed.is_some() {
            self.persist()?;
        }
        Ok(removed)
    }

    /// All active records, ordered by block identifier
    pub fn records(&self) -> impl Iterator<Item = &BlockRecord> {
        self.state.blocks.values()
    }

    /// Identifiers of all active blocks
    pub fn block_ids(&self) -> Vec<BlockId> {
        self.state.blocks.keys().copied().collect()
    }

    /// Number of active blocks
    pub fn len(&self) -> usize {
        self.state.blocks.len()
    }

    /// Whether nothing is blocked
    pub fn is_empty(&self) -> bool {
        self.state.blocks.is_empty()
    }

    /// Every rule identifier referenced by some record
    pub fn owned_rule_ids(&self) -> BTreeSet<RuleId> {
        self.records()
            .flat_map(|r| r.rule_ids.iter().copied())
            .collect()
    }

    /// Next identifier the counter will hand out
    pub fn next_rule_id(&self) -> RuleId {
        self.state.next_rule_id
    }

    /// Take `count` fresh rule identifiers
    ///
    /// The advanced counter is persisted before the identifiers are returned,
    /// so an identifier is never issued twice even if installation fails or
    /// the process dies right after.
    pub fn reserve_rule_ids(&mut self, count: usize) -> Result<Vec<RuleId>> {
        if count == 0 {
            return Ok(Vec::new());
        }

        let first = self.state.next_rule_id;
        let count = RuleId::try_from(count).map_err(|_| Error::RuleIdsExhausted)?;
        let end = first.checked_add(count).ok_or(Error::RuleIdsExhausted)?;

        self.state.next_rule_id = end;
        self.persist()?;

        Ok((first..end).collect())
    }

    /// Raise the counter so it never hands out `id` or anything below it
    pub fn ensure_rule_ids_above(&mut self, id: RuleId) -> Result<()> {
        let floor = id.checked_add(1).ok_or(Error::RuleIdsExhausted)?;
        if self.state.next_rule_id < floor {
            debug!(
                from = self.state.next_rule_id,
                to = floor,
                "Raising rule id counter past installed rules"
            );
            self.state.next_rule_id = floor;
            self.persist()?;
        }
        Ok(())
    }

    /// Timestamp of the last successfully executed command
    pub fn last_command_timestamp(&self) -> f64 {
        self.state.last_command_timestamp
    }

    /// Record that the command stamped `timestamp` has been executed
    pub fn set_last_command_timestamp(&mut self, timestamp: f64) -> Result<()> {
        self.state.last_command_timestamp = timestamp;
        self.persist()
    }

    /// Copy of the whole document
    pub fn snapshot(&self) -> PersistedState {
        self.state.clone()
    }

    fn persist(&mut self) -> Result<()> {
        self.store.save(&self.state)
    }
}
