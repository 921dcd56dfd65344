//! Configuration management for siteblock
//!
//! Strongly-typed configuration with TOML support. Paths left unset are
//! filled in by the front end (the CLI resolves them against the user's data
//! directory), so the core never guesses platform locations.

use crate::agent::AgentOptions;
use crate::error::{Error, Result};
use crate::registry::{RuleId, DEFAULT_FIRST_RULE_ID};
use crate::rules::{RuleTemplate, DEFAULT_PRIORITY, DEFAULT_REDIRECT_PATH};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/// Minimum accepted polling interval
pub const MIN_POLL_INTERVAL_MS: u64 = 100;

/// Configuration layout understood by this build
pub const CONFIG_VERSION: &str = "1";

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General application settings
    pub general: GeneralConfig,

    /// Where commands come from
    pub source: SourceConfig,

    /// Where the registry is persisted
    pub storage: StorageConfig,

    /// How rules are generated and enforced
    pub rules: RulesConfig,

    /// Startup reconciliation
    pub reconcile: ReconcileConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|_| Error::ConfigNotFound {
            path: path.display().to_string(),
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(Error::from)
    }

    /// Serialize to TOML string
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.general.version != CONFIG_VERSION {
            return Err(Error::config_value(
                "general.version",
                format!("Unsupported version '{}', expected {CONFIG_VERSION}", self.general.version),
            ));
        }

        if self.source.poll_interval_ms < MIN_POLL_INTERVAL_MS {
            return Err(Error::config_value(
                "source.poll_interval_ms",
                format!("Must be at least {MIN_POLL_INTERVAL_MS}"),
            ));
        }

        if !self.rules.redirect_path.starts_with('/') {
            return Err(Error::config_value(
                "rules.redirect_path",
                "Must be an absolute path inside the extension, e.g. /blocked.html",
            ));
        }

        if self.rules.priority == 0 {
            return Err(Error::config_value("rules.priority", "Must be at least 1"));
        }

        if self.rules.first_rule_id == 0 {
            return Err(Error::config_value("rules.first_rule_id", "Must be at least 1"));
        }

        if let Some(ref file) = self.source.command_file {
            if file.trim().is_empty() {
                return Err(Error::config_value("source.command_file", "Must not be empty"));
            }
        }

        Ok(())
    }

    /// Rule parameters for the synchronizer
    pub fn rule_template(&self) -> RuleTemplate {
        RuleTemplate {
            redirect_path: self.rules.redirect_path.clone(),
            priority: self.rules.priority,
        }
    }

    /// Agent behaviour switches
    pub fn agent_options(&self) -> AgentOptions {
        AgentOptions {
            sweep_orphan_rules: self.reconcile.sweep_orphan_rules,
        }
    }
}

/// General application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Instance name, shown in logs
    pub name: String,
    /// Configuration layout version, must be [`CONFIG_VERSION`]
    pub version: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            version: CONFIG_VERSION.to_string(),
        }
    }
}

/// Command source configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Command file to poll (None = default location)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command_file: Option<String>,
    /// Disable the command file entirely
    pub poll_file: bool,
    /// Polling interval in milliseconds
    pub poll_interval_ms: u64,
    /// Local socket to accept commands on (None = no socket)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listen: Option<SocketAddr>,
}

impl SourceConfig {
    /// Polling interval as a duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            command_file: None,
            poll_file: true,
            poll_interval_ms: 2000,
            listen: None,
        }
    }
}

/// Registry persistence
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// State document path (None = default location)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_file: Option<String>,
}

/// Which installer enforces rules
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleBackend {
    /// Browser dynamic-rule JSON file, picked up by the companion extension
    #[default]
    RulesFile,
    /// System hosts file
    Hosts,
    /// Nothing enforced; for dry runs
    Memory,
}

impl RuleBackend {
    /// Parse a backend name
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "rules_file" | "rules-file" | "rules" | "extension" => Some(Self::RulesFile),
            "hosts" | "hosts_file" => Some(Self::Hosts),
            "memory" | "none" => Some(Self::Memory),
            _ => None,
        }
    }
}

/// Rule generation and enforcement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// Enforcement backend
    pub backend: RuleBackend,
    /// Rules file for the `rules_file` backend (None = default location)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rules_file: Option<String>,
    /// Hosts file for the `hosts` backend (None = system hosts file)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hosts_file: Option<String>,
    /// Local page blocked navigations land on
    pub redirect_path: String,
    /// Rule priority
    pub priority: u32,
    /// Lowest rule identifier handed out
    pub first_rule_id: RuleId,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            backend: RuleBackend::default(),
            rules_file: None,
            hosts_file: None,
            redirect_path: DEFAULT_REDIRECT_PATH.to_string(),
            priority: DEFAULT_PRIORITY,
            first_rule_id: DEFAULT_FIRST_RULE_ID,
        }
    }
}

/// Startup reconciliation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Remove installed rules that no block owns
    pub sweep_orphan_rules: bool,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            sweep_orphan_rules: true,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
    /// Log file path (None = stdout only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    /// Enable JSON format logging
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            json_format: false,
        }
    }
}
