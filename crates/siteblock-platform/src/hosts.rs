//! System hosts file
//!
//! Browser-independent fallback: every rule becomes hosts entries pointing
//! its host at an unroutable address. Entries live in one managed section
//! and carry their rule identifier, so lines outside the section are never
//! touched.
//!
//! ```text
//! # BEGIN siteblock
//! 0.0.0.0 www.example.com # siteblock:1000
//! :: www.example.com # siteblock:1000
//! 0.0.0.0 example.com # siteblock:1001
//! :: example.com # siteblock:1001
//! # END siteblock
//! ```
//!
//! A hosts file has no wildcards, so the subdomain rule of a pair only covers
//! `www.`; the redirect page is not available either.

use crate::error::{PlatformError, Result};
use crate::temp_path_for;
use parking_lot::Mutex;
use siteblock_core::rules::{MatchScope, Rule, RuleInstaller};
use siteblock_core::RuleId;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const BACKEND: &str = "hosts";

/// First line of the managed section
pub const SECTION_BEGIN: &str = "# BEGIN siteblock";
/// Last line of the managed section
pub const SECTION_END: &str = "# END siteblock";

const TAG: &str = "# siteblock:";
const SINK_ADDRESSES: [&str; 2] = ["0.0.0.0", "::"];

/// Location of the system hosts file
pub fn default_hosts_path() -> PathBuf {
    #[cfg(windows)]
    {
        let root = std::env::var_os("SystemRoot").unwrap_or_else(|| "C:\\Windows".into());
        PathBuf::from(root).join("System32\\drivers\\etc\\hosts")
    }

    #[cfg(not(windows))]
    {
        PathBuf::from("/etc/hosts")
    }
}

/// One managed line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostsEntry {
    /// Owning rule
    pub rule_id: RuleId,
    /// Sink address
    pub address: String,
    /// Blocked host
    pub host: String,
}

impl HostsEntry {
    fn parse(line: &str) -> Option<Self> {
        let (mapping, tag) = line.split_once(TAG)?;
        let rule_id = tag.trim().parse().ok()?;
        let mut fields = mapping.split_whitespace();
        let address = fields.next()?.to_string();
        let host = fields.next()?.to_string();
        Some(Self {
            rule_id,
            address,
            host,
        })
    }

    fn render(&self) -> String {
        format!("{} {} {}{}", self.address, self.host, TAG, self.rule_id)
    }
}

/// Hosts file split around the managed section
#[derive(Debug, Default)]
struct HostsDocument {
    before: Vec<String>,
    entries: Vec<HostsEntry>,
    after: Vec<String>,
}

impl HostsDocument {
    fn parse(content: &str) -> Self {
        let mut doc = Self::default();
        // 0 = before, 1 = inside, 2 = after
        let mut part = 0;

        for line in content.lines() {
            match part {
                0 if line.trim() == SECTION_BEGIN => part = 1,
                0 => doc.before.push(line.to_string()),
                1 if line.trim() == SECTION_END => part = 2,
                1 => match HostsEntry::parse(line) {
                    Some(entry) => doc.entries.push(entry),
                    None if line.trim().is_empty() => {}
                    None => warn!(line, "Dropping unrecognized line in managed hosts section"),
                },
                _ => doc.after.push(line.to_string()),
            }
        }

        doc
    }

    fn render(&self) -> String {
        let mut lines: Vec<String> = self.before.clone();

        if !self.entries.is_empty() {
            lines.push(SECTION_BEGIN.to_string());
            lines.extend(self.entries.iter().map(HostsEntry::render));
            lines.push(SECTION_END.to_string());
        }

        lines.extend(self.after.iter().cloned());

        let mut out = lines.join("\n");
        out.push('\n');
        out
    }

    fn rule_ids(&self) -> BTreeSet<RuleId> {
        self.entries.iter().map(|e| e.rule_id).collect()
    }
}

/// Installs rules as hosts file entries
#[derive(Debug)]
pub struct HostsFileInstaller {
    path: PathBuf,
    lock: Mutex<()>,
}

impl HostsFileInstaller {
    /// Installer managing the hosts file at `path`
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    /// Installer managing the system hosts file
    pub fn system() -> Self {
        Self::new(default_hosts_path())
    }

    /// File being maintained
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Managed entries currently in the file
    pub fn entries(&self) -> Result<Vec<HostsEntry>> {
        Ok(self.read()?.entries)
    }

    fn read(&self) -> Result<HostsDocument> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => Ok(HostsDocument::parse(&content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HostsDocument::default()),
            Err(e) => Err(PlatformError::from_io(e, &self.path)),
        }
    }

    fn write(&self, doc: &HostsDocument) -> Result<()> {
        let content = doc.render();
        let temp = temp_path_for(&self.path);

        match siteblock_core::registry::write_atomic(&self.path, &temp, content.as_bytes()) {
            Ok(()) => Ok(()),
            Err(siteblock_core::Error::Io(e)) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                Err(PlatformError::PermissionDenied(self.path.display().to_string()))
            }
            Err(e) => {
                // Bind-mounted hosts files cannot be replaced by rename
                debug!("Atomic replace of hosts file failed ({}), writing in place", e);
                let _ = std::fs::remove_file(&temp);
                std::fs::write(&self.path, content).map_err(|e| PlatformError::from_io(e, &self.path))
            }
        }
    }

    fn apply(&self, add: &[Rule], remove: &[RuleId]) -> Result<()> {
        let _guard = self.lock.lock();

        let mut doc = self.read()?;
        doc.entries.retain(|e| !remove.contains(&e.rule_id));

        let installed = doc.rule_ids();
        if let Some(dup) = add.iter().find(|r| installed.contains(&r.id)) {
            return Err(PlatformError::DuplicateRule(dup.id));
        }

        for rule in add {
            let host = match rule.scope {
                MatchScope::Subdomains => format!("www.{}", rule.domain),
                MatchScope::Exact => rule.domain.clone(),
            };
            doc.entries.extend(SINK_ADDRESSES.iter().map(|address| HostsEntry {
                rule_id: rule.id,
                address: address.to_string(),
                host: host.clone(),
            }));
        }

        self.write(&doc)?;
        debug!(
            path = %self.path.display(),
            added = add.len(),
            removed = remove.len(),
            "Hosts file updated"
        );
        Ok(())
    }
}

impl RuleInstaller for HostsFileInstaller {
    fn name(&self) -> &'static str {
        BACKEND
    }

    fn is_available(&self) -> bool {
        self.path.is_file()
    }

    fn update(&self, add: &[Rule], remove: &[RuleId]) -> siteblock_core::Result<()> {
        self.apply(add, remove)
            .map_err(|e| e.into_installer_error(BACKEND))
    }

    fn installed_ids(&self) -> siteblock_core::Result<Vec<RuleId>> {
        let _guard = self.lock.lock();
        self.read()
            .map(|doc| doc.rule_ids().into_iter().collect())
            .map_err(|e| e.into_installer_error(BACKEND))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SYSTEM: &str = "127.0.0.1 localhost\n::1 localhost\n";

    #[test]
    fn test_entry_parse() {
        let entry = HostsEntry::parse("0.0.0.0 example.com # siteblock:1001").unwrap();
        assert_eq!(entry.rule_id, 1001);
        assert_eq!(entry.address, "0.0.0.0");
        assert_eq!(entry.host, "example.com");
        assert_eq!(entry.render(), "0.0.0.0 example.com # siteblock:1001");

        assert!(HostsEntry::parse("127.0.0.1 localhost").is_none());
        assert!(HostsEntry::parse("0.0.0.0 x.com # siteblock:abc").is_none());
    }

    #[test]
    fn test_document_preserves_foreign_lines() {
        let content = format!(
            "{SYSTEM}{SECTION_BEGIN}\n0.0.0.0 a.com # siteblock:7\n{SECTION_END}\n10.0.0.1 nas\n"
        );
        let doc = HostsDocument::parse(&content);
        assert_eq!(doc.before, vec!["127.0.0.1 localhost", "::1 localhost"]);
        assert_eq!(doc.entries.len(), 1);
        assert_eq!(doc.after, vec!["10.0.0.1 nas"]);
        assert_eq!(doc.render(), content);
    }

    #[test]
    fn test_empty_section_is_dropped() {
        let content = format!("{SYSTEM}{SECTION_BEGIN}\n{SECTION_END}\n");
        let doc = HostsDocument::parse(&content);
        assert_eq!(doc.render(), SYSTEM);
    }
}
