//! Browser dynamic-rule file
//!
//! The installed rules are kept as a JSON array of dynamic rules. A companion
//! browser extension loads the file and mirrors it into its
//! `declarativeNetRequest` dynamic rule set; the file is always replaced
//! atomically so the extension never reads a partial list.

use crate::error::{PlatformError, Result};
use crate::temp_path_for;
use parking_lot::Mutex;
use siteblock_core::rules::{DeclarativeRule, Rule, RuleInstaller};
use siteblock_core::RuleId;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

const BACKEND: &str = "rules_file";

/// Installs rules into a dynamic-rule JSON file
#[derive(Debug)]
pub struct RulesFileInstaller {
    path: PathBuf,
    // Serializes read-modify-write of the file
    lock: Mutex<()>,
}

impl RulesFileInstaller {
    /// Installer writing to `path`
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    /// File being maintained
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rules currently in the file, ordered by identifier
    pub fn read_rules(&self) -> Result<Vec<DeclarativeRule>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(PlatformError::from_io(e, &self.path)),
        };

        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        let mut rules: Vec<DeclarativeRule> =
            serde_json::from_str(&content).map_err(|e| PlatformError::MalformedRules {
                path: self.path.display().to_string(),
                message: e.to_string(),
            })?;
        rules.sort_by_key(|r| r.id);
        Ok(rules)
    }

    fn write_rules(&self, rules: &[DeclarativeRule]) -> Result<()> {
        let content = serde_json::to_vec_pretty(rules).map_err(|e| PlatformError::MalformedRules {
            path: self.path.display().to_string(),
            message: e.to_string(),
        })?;

        siteblock_core::registry::write_atomic(&self.path, &temp_path_for(&self.path), &content)
            .map_err(|e| match e {
                siteblock_core::Error::Io(io) => PlatformError::from_io(io, &self.path),
                other => PlatformError::Io(std::io::Error::other(other.to_string())),
            })
    }

    fn apply(&self, add: &[Rule], remove: &[RuleId]) -> Result<()> {
        let _guard = self.lock.lock();

        let mut rules = self.read_rules()?;
        rules.retain(|r| !remove.contains(&r.id));

        if let Some(dup) = add.iter().find(|a| rules.iter().any(|r| r.id == a.id)) {
            return Err(PlatformError::DuplicateRule(dup.id));
        }

        rules.extend(add.iter().map(Rule::to_declarative));
        rules.sort_by_key(|r| r.id);

        trace!(path = %self.path.display(), count = rules.len(), "Writing rules file");
        self.write_rules(&rules)?;

        debug!(added = add.len(), removed = remove.len(), "Rules file updated");
        Ok(())
    }
}

impl RuleInstaller for RulesFileInstaller {
    fn name(&self) -> &'static str {
        BACKEND
    }

    fn is_available(&self) -> bool {
        // Missing directories are created on first write
        let Some(parent) = self.path.parent() else {
            return true;
        };
        parent
            .ancestors()
            .find(|dir| dir.as_os_str().is_empty() || dir.exists())
            .map_or(true, |dir| dir.as_os_str().is_empty() || dir.is_dir())
    }

    fn update(&self, add: &[Rule], remove: &[RuleId]) -> siteblock_core::Result<()> {
        self.apply(add, remove)
            .map_err(|e| e.into_installer_error(BACKEND))
    }

    fn installed_ids(&self) -> siteblock_core::Result<Vec<RuleId>> {
        let _guard = self.lock.lock();
        self.read_rules()
            .map(|rules| rules.into_iter().map(|r| r.id).collect())
            .map_err(|e| e.into_installer_error(BACKEND))
    }
}
