//! Config command - configuration management

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use siteblock_core::config::{Config, RuleBackend};
use std::path::PathBuf;
use tracing::info;

use crate::settings::{default_data_dir, project_dirs, COMMAND_FILE, RULES_FILE, STATE_FILE};

/// Config command arguments
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show {
        /// Config file to show (default: detect)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Generate a configuration file
    Generate {
        /// Output file path
        #[arg(short, long, default_value = "siteblock.toml")]
        output: PathBuf,

        /// Rule backend to preset (rules_file, hosts, memory)
        #[arg(short, long, default_value = "rules_file")]
        backend: String,
    },

    /// Validate a configuration file
    Validate {
        /// Config file to validate
        file: PathBuf,
    },

    /// Show config and data file locations
    Paths,
}

/// Execute config command
pub fn execute(args: ConfigArgs) -> Result<()> {
    match args.action {
        ConfigAction::Show { file } => show_config(file),
        ConfigAction::Generate { output, backend } => generate_config(output, backend),
        ConfigAction::Validate { file } => validate_config(file),
        ConfigAction::Paths => show_paths(),
    }
}

fn show_config(file: Option<PathBuf>) -> Result<()> {
    let config = match file.or_else(find_config_file) {
        Some(path) => Config::load(&path)
            .with_context(|| format!("Failed to load config from {:?}", path))?,
        None => Config::default(),
    };

    let toml_str = config.to_toml().context("Failed to serialize config")?;

    println!("{}", toml_str);
    Ok(())
}

fn generate_config(output: PathBuf, backend_name: String) -> Result<()> {
    let backend = RuleBackend::from_name(&backend_name)
        .with_context(|| format!("Unknown rule backend: {}", backend_name))?;

    let mut config = Config::default();
    config.rules.backend = backend;

    let toml_str = config.to_toml().context("Failed to serialize config")?;

    // Add header comment
    let content = format!(
        "# siteblock configuration\n\
         # Unset paths default to the per-user data directory\n\
         # (see `siteblock config paths`)\n\n\
         {}",
        toml_str
    );

    std::fs::write(&output, content)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    info!("Generated config file: {:?}", output);
    println!("Configuration file generated: {}", output.display());

    Ok(())
}

fn validate_config(file: PathBuf) -> Result<()> {
    let config = Config::load(&file)
        .with_context(|| format!("Failed to load config from {:?}", file))?;

    config
        .validate()
        .context("Configuration validation failed")?;

    println!("{} Configuration is valid", "✓".green());
    println!("  Rule backend: {:?}", config.rules.backend);
    println!("  Poll interval: {} ms", config.source.poll_interval_ms);
    match config.source.listen {
        Some(addr) => println!("  Socket: {}", addr),
        None => println!("  Socket: disabled"),
    }
    println!("  Sweep orphan rules: {}", config.reconcile.sweep_orphan_rules);

    Ok(())
}

fn show_paths() -> Result<()> {
    println!("Configuration file search paths:");
    println!();

    // Current directory
    println!("  1. ./siteblock.toml");
    println!("  2. ./config.toml");

    // User config directory
    if let Some(dirs) = project_dirs() {
        println!("  3. {}", dirs.config_dir().join("config.toml").display());
    }

    let data_dir = default_data_dir();
    println!();
    println!("Data files (unless configured):");
    println!();
    println!("  State:    {}", data_dir.join(STATE_FILE).display());
    println!("  Commands: {}", data_dir.join(COMMAND_FILE).display());
    println!("  Rules:    {}", data_dir.join(RULES_FILE).display());
    println!("  Hosts:    {}", siteblock_platform::default_hosts_path().display());

    Ok(())
}

/// First configuration file found on the search path
pub fn find_config_file() -> Option<PathBuf> {
    let candidates = [PathBuf::from("siteblock.toml"), PathBuf::from("config.toml")];

    for path in candidates {
        if path.exists() {
            return Some(path);
        }
    }

    // Check user config directory
    if let Some(dirs) = project_dirs() {
        let path = dirs.config_dir().join("config.toml");
        if path.exists() {
            return Some(path);
        }
    }

    None
}
