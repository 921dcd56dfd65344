//! In-memory rule installer
//!
//! Used by tests and `--dry-run`. Enforces the same identifier contract as
//! the browser: adding an identifier that is already installed is an error.

use super::{Rule, RuleInstaller};
use crate::error::{Error, Result};
use crate::registry::RuleId;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug)]
struct Inner {
    rules: RwLock<BTreeMap<RuleId, Rule>>,
    available: AtomicBool,
}

/// Rule installer holding rules in memory
///
/// Clones share state, so a test can hand one clone to the agent and inspect
/// the other.
#[derive(Debug, Clone)]
pub struct MemoryInstaller {
    inner: Arc<Inner>,
}

impl Default for MemoryInstaller {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryInstaller {
    /// Empty, available installer
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                rules: RwLock::new(BTreeMap::new()),
                available: AtomicBool::new(true),
            }),
        }
    }

    /// Toggle availability
    pub fn set_available(&self, available: bool) {
        self.inner.available.store(available, Ordering::SeqCst);
    }

    /// Installed rules ordered by identifier
    pub fn rules(&self) -> Vec<Rule> {
        self.inner.rules.read().values().cloned().collect()
    }

    /// Installed identifiers, ascending
    pub fn ids(&self) -> Vec<RuleId> {
        self.inner.rules.read().keys().copied().collect()
    }

    /// Number of installed rules
    pub fn len(&self) -> usize {
        self.inner.rules.read().len()
    }

    /// Whether no rule is installed
    pub fn is_empty(&self) -> bool {
        self.inner.rules.read().is_empty()
    }

    /// Whether any installed rule catches `host`
    pub fn blocks_host(&self, host: &str) -> bool {
        self.inner
            .rules
            .read()
            .values()
            .any(|rule| rule.matches_host(host))
    }
}

impl RuleInstaller for MemoryInstaller {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn is_available(&self) -> bool {
        self.inner.available.load(Ordering::SeqCst)
    }

    fn update(&self, add: &[Rule], remove: &[RuleId]) -> Result<()> {
        let mut rules = self.inner.rules.write();

        // Checked against the post-removal set so a rejected update changes nothing
        if let Some(dup) = add
            .iter()
            .find(|r| rules.contains_key(&r.id) && !remove.contains(&r.id))
        {
            return Err(Error::installer(
                "memory",
                format!("rule id {} is already installed", dup.id),
            ));
        }

        for id in remove {
            rules.remove(id);
        }

        for rule in add {
            rules.insert(rule.id, rule.clone());
        }

        Ok(())
    }

    fn installed_ids(&self) -> Result<Vec<RuleId>> {
        Ok(self.ids())
    }
}
