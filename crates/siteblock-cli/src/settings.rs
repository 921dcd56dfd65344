//! Effective settings: configuration file plus resolved locations

use anyhow::{Context, Result};
use directories::ProjectDirs;
use siteblock_core::Config;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::commands::config::find_config_file;

/// Application name used for platform directories
pub const APP_NAME: &str = "siteblock";

/// File names inside the data directory
pub const STATE_FILE: &str = "state.json";
/// Command file polled by the agent
pub const COMMAND_FILE: &str = "block-commands.json";
/// Rules file for the browser extension
pub const RULES_FILE: &str = "dynamic-rules.json";

/// Platform directories for siteblock
pub fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", APP_NAME)
}

/// Configuration with every path resolved
#[derive(Debug, Clone)]
pub struct Settings {
    /// Loaded (or default) configuration
    pub config: Config,
    /// File the configuration came from
    pub config_path: Option<PathBuf>,
    /// Registry document
    pub state_file: PathBuf,
    /// Command file
    pub command_file: PathBuf,
    /// Default rules file for the rules file backend
    pub rules_file: PathBuf,
}

impl Settings {
    /// Load the configuration and resolve locations
    ///
    /// An explicit `config` path must exist; otherwise the usual search
    /// path is tried and defaults apply when nothing is found.
    pub fn load(config: Option<&Path>, data_dir: Option<&Path>) -> Result<Self> {
        let config_path = match config {
            Some(path) => Some(path.to_path_buf()),
            None => find_config_file(),
        };

        let config = match config_path {
            Some(ref path) => Config::load(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?,
            None => Config::default(),
        };

        config
            .validate()
            .context("Configuration validation failed")?;

        Ok(Self::resolve(config, config_path, data_dir))
    }

    /// Resolve unset paths against the data directory
    pub fn resolve(config: Config, config_path: Option<PathBuf>, data_dir: Option<&Path>) -> Self {
        let data_dir = data_dir.map(Path::to_path_buf).unwrap_or_else(default_data_dir);
        debug!(data_dir = %data_dir.display(), "Resolved data directory");

        let pick = |configured: &Option<String>, name: &str| {
            configured
                .as_deref()
                .map(PathBuf::from)
                .unwrap_or_else(|| data_dir.join(name))
        };

        Self {
            state_file: pick(&config.storage.state_file, STATE_FILE),
            command_file: pick(&config.source.command_file, COMMAND_FILE),
            rules_file: pick(&config.rules.rules_file, RULES_FILE),
            config,
            config_path,
        }
    }
}

/// Per-user data directory, or the working directory if there is none
pub fn default_data_dir() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}
