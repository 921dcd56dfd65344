//! Rule synchronization
//!
//! Converts the domains of a block into redirect rules and pushes them to a
//! [`RuleInstaller`]. Each domain yields two rules: one for its subdomains and
//! one for the bare domain, so `www.` and every other host under it are
//! caught as well.

mod memory;
mod rule;

pub use memory::MemoryInstaller;
pub use rule::{
    ActionType, DeclarativeRule, MatchScope, Redirect, ResourceType, Rule, RuleAction,
    RuleCondition, DEFAULT_PRIORITY, DEFAULT_REDIRECT_PATH,
};

use crate::error::Result;
use crate::registry::{BlockId, Registry, RuleId};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// Backend that enforces rules
///
/// Implemented by the in-memory installer here and by the platform crate
/// (rules file, hosts file).
pub trait RuleInstaller: Send + Sync {
    /// Short backend name for logs and errors
    fn name(&self) -> &'static str;

    /// Whether the backend can currently accept updates
    fn is_available(&self) -> bool {
        true
    }

    /// Remove `remove` then add `add`, as one update
    ///
    /// Unknown identifiers in `remove` are ignored.
    fn update(&self, add: &[Rule], remove: &[RuleId]) -> Result<()>;

    /// Identifiers of every rule currently installed
    fn installed_ids(&self) -> Result<Vec<RuleId>>;
}

/// Rule parameters shared by every generated rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleTemplate {
    /// Local page to redirect to
    pub redirect_path: String,
    /// Rule priority
    pub priority: u32,
}

impl Default for RuleTemplate {
    fn default() -> Self {
        Self {
            redirect_path: DEFAULT_REDIRECT_PATH.to_string(),
            priority: DEFAULT_PRIORITY,
        }
    }
}

/// Keeps installed rules in step with the registry
pub struct RuleSynchronizer {
    installer: Box<dyn RuleInstaller>,
    template: RuleTemplate,
}

impl std::fmt::Debug for RuleSynchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleSynchronizer")
            .field("installer", &self.installer.name())
            .field("template", &self.template)
            .finish()
    }
}

impl RuleSynchronizer {
    /// Synchronizer pushing to `installer`
    pub fn new(installer: Box<dyn RuleInstaller>, template: RuleTemplate) -> Self {
        Self {
            installer,
            template,
        }
    }

    /// The underlying installer
    pub fn installer(&self) -> &dyn RuleInstaller {
        self.installer.as_ref()
    }

    /// Build the rule pair for every domain, using `ids` in order
    pub fn build_rules(&self, domains: &BTreeSet<String>, ids: &[RuleId]) -> Vec<Rule> {
        let scopes = [MatchScope::Subdomains, MatchScope::Exact];
        domains
            .iter()
            .flat_map(|domain| scopes.iter().map(move |scope| (domain, *scope)))
            .zip(ids)
            .map(|((domain, scope), id)| Rule {
                id: *id,
                domain: domain.clone(),
                scope,
                redirect_path: self.template.redirect_path.clone(),
                priority: self.template.priority,
            })
            .collect()
    }

    /// Install rules for `domains` and return their identifiers
    ///
    /// Identifiers come from the registry's persisted counter. Returns an
    /// empty list without touching anything if the installer is unavailable.
    pub fn apply_block(
        &self,
        registry: &mut Registry,
        domains: &BTreeSet<String>,
        block_id: BlockId,
    ) -> Result<Vec<RuleId>> {
        if !self.installer.is_available() {
            warn!(
                block_id,
                installer = self.installer.name(),
                "Rule installer unavailable, block has no effect"
            );
            return Ok(Vec::new());
        }

        let ids = registry.reserve_rule_ids(domains.len() * 2)?;
        let rules = self.build_rules(domains, &ids);

        self.installer.update(&rules, &[])?;

        debug!(block_id, rule_ids = ?ids, "Installed rules");
        Ok(ids)
    }

    /// Delete exactly `rule_ids`
    pub fn remove_block(&self, rule_ids: &[RuleId]) -> Result<()> {
        if rule_ids.is_empty() {
            return Ok(());
        }
        if !self.installer.is_available() {
            warn!(
                installer = self.installer.name(),
                rule_ids = ?rule_ids,
                "Rule installer unavailable, rules left in place"
            );
            return Ok(());
        }

        self.installer.update(&[], rule_ids)?;
        debug!(rule_ids = ?rule_ids, "Removed rules");
        Ok(())
    }

    /// Highest identifier currently installed
    pub fn max_installed_id(&self) -> Result<Option<RuleId>> {
        if !self.installer.is_available() {
            return Ok(None);
        }
        Ok(self.installer.installed_ids()?.into_iter().max())
    }

    /// Remove installed rules no record owns
    ///
    /// Returns how many rules were removed.
    pub fn sweep_orphans(&self, owned: &BTreeSet<RuleId>) -> Result<usize> {
        if !self.installer.is_available() {
            return Ok(0);
        }

        let orphans: Vec<RuleId> = self
            .installer
            .installed_ids()?
            .into_iter()
            .filter(|id| !owned.contains(id))
            .collect();

        if !orphans.is_empty() {
            self.installer.update(&[], &orphans)?;
            info!(count = orphans.len(), rule_ids = ?orphans, "Removed orphaned rules");
        }

        Ok(orphans.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::MemoryStore;

    fn setup() -> (RuleSynchronizer, MemoryInstaller, Registry) {
        let installer = MemoryInstaller::new();
        let sync = RuleSynchronizer::new(Box::new(installer.clone()), RuleTemplate::default());
        let registry = Registry::open(Box::new(MemoryStore::new()), 1000).unwrap();
        (sync, installer, registry)
    }

    fn domains(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|d| d.to_string()).collect()
    }

    #[test]
    fn test_two_rules_per_domain() {
        let (sync, installer, mut registry) = setup();

        let ids = sync
            .apply_block(&mut registry, &domains(&["example.com", "reddit.com"]), 1)
            .unwrap();

        assert_eq!(ids, vec![1000, 1001, 1002, 1003]);
        let rules = installer.rules();
        assert_eq!(rules.len(), 4);
        assert_eq!(rules[0].url_filter(), "*://*.example.com/*");
        assert_eq!(rules[1].url_filter(), "*://example.com/*");
        assert_eq!(rules[2].url_filter(), "*://*.reddit.com/*");
        assert_eq!(rules[3].url_filter(), "*://reddit.com/*");
    }

    #[test]
    fn test_apply_then_remove_leaves_nothing() {
        let (sync, installer, mut registry) = setup();

        let ids = sync
            .apply_block(&mut registry, &domains(&["example.com"]), 1)
            .unwrap();
        assert_eq!(installer.len(), 2);

        sync.remove_block(&ids).unwrap();
        assert!(installer.is_empty());
    }

    #[test]
    fn test_ids_never_reused() {
        let (sync, _installer, mut registry) = setup();

        let first = sync
            .apply_block(&mut registry, &domains(&["a.com"]), 1)
            .unwrap();
        sync.remove_block(&first).unwrap();
        let second = sync
            .apply_block(&mut registry, &domains(&["a.com"]), 1)
            .unwrap();

        assert!(first.iter().all(|id| !second.contains(id)));
    }

    #[test]
    fn test_remove_unknown_is_noop() {
        let (sync, installer, mut registry) = setup();
        sync.apply_block(&mut registry, &domains(&["a.com"]), 1)
            .unwrap();

        sync.remove_block(&[4242]).unwrap();
        sync.remove_block(&[]).unwrap();
        assert_eq!(installer.len(), 2);
    }

    #[test]
    fn test_unavailable_installer() {
        let (sync, installer, mut registry) = setup();
        installer.set_available(false);

        let ids = sync
            .apply_block(&mut registry, &domains(&["a.com"]), 1)
            .unwrap();
        assert!(ids.is_empty());
        assert_eq!(registry.next_rule_id(), 1000);

        installer.set_available(true);
        assert!(installer.is_empty());
    }

    #[test]
    fn test_sweep_orphans() {
        let (sync, installer, mut registry) = setup();
        let ids = sync
            .apply_block(&mut registry, &domains(&["a.com", "b.com"]), 1)
            .unwrap();

        let owned: BTreeSet<RuleId> = ids[..2].iter().copied().collect();
        assert_eq!(sync.sweep_orphans(&owned).unwrap(), 2);
        assert_eq!(installer.ids(), vec![1000, 1001]);
        assert_eq!(sync.max_installed_id().unwrap(), Some(1001));
    }
}
