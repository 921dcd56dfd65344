//! Run command - the blocking agent

use anyhow::{Context, Result};
use clap::Args;
use siteblock_core::registry::JsonFileStore;
use siteblock_core::rules::{MemoryInstaller, RuleInstaller};
use siteblock_core::source::{command_channel, FilePoller, SocketListener};
use siteblock_core::{Agent, Registry, RuleSynchronizer};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::settings::Settings;

/// Run command arguments
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Command file to poll (overrides config)
    #[arg(long, value_name = "FILE")]
    pub command_file: Option<PathBuf>,

    /// Do not poll the command file
    #[arg(long)]
    pub no_poll: bool,

    /// Accept commands on this socket address (overrides config)
    #[arg(long, value_name = "ADDR")]
    pub listen: Option<SocketAddr>,

    /// Dry run (track blocks but enforce nothing)
    #[arg(long)]
    pub dry_run: bool,
}

/// Execute the run command
pub fn execute(args: RunArgs, mut settings: Settings) -> Result<()> {
    info!(name = %settings.config.general.name, "Starting siteblock agent...");

    apply_overrides(&args, &mut settings);
    info!(
        config = ?settings.config_path,
        state = %settings.state_file.display(),
        "Loaded configuration"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    runtime.block_on(serve(args, settings))?;

    info!("siteblock stopped");
    Ok(())
}

fn apply_overrides(args: &RunArgs, settings: &mut Settings) {
    if let Some(ref path) = args.command_file {
        settings.command_file = path.clone();
    }
    if args.no_poll {
        settings.config.source.poll_file = false;
    }
    if args.listen.is_some() {
        settings.config.source.listen = args.listen;
    }
}

async fn serve(args: RunArgs, settings: Settings) -> Result<()> {
    let config = &settings.config;

    let store = JsonFileStore::new(&settings.state_file);
    let registry = Registry::open(Box::new(store), config.rules.first_rule_id)
        .with_context(|| format!("Failed to open state file {}", settings.state_file.display()))?;

    let installer: Box<dyn RuleInstaller> = if args.dry_run {
        warn!("Dry run mode - rules are tracked but not enforced");
        Box::new(MemoryInstaller::new())
    } else {
        siteblock_platform::installer_from_config(&config.rules, &settings.rules_file)
    };
    if !installer.is_available() {
        warn!(
            installer = installer.name(),
            "Rule installer is not available; blocks will be tracked without effect"
        );
    }

    let rules = RuleSynchronizer::new(installer, config.rule_template());
    let agent = Agent::builder(registry, rules)
        .options(config.agent_options())
        .build();

    let (commands, rx) = command_channel();
    let mut sources = 0;

    if config.source.poll_file {
        let poller = FilePoller::new(&settings.command_file).with_interval(config.source.poll_interval());
        tokio::spawn(poller.run(commands.clone()));
        sources += 1;
    }

    if let Some(addr) = config.source.listen {
        let listener = SocketListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind command socket {addr}"))?;
        tokio::spawn(listener.run(commands.clone()));
        sources += 1;
    }

    drop(commands);

    if sources == 0 {
        warn!("No command source enabled; only existing blocks will be served");
    }

    agent.run(rx, shutdown_signal()).await?;
    Ok(())
}

/// Resolves on Ctrl+C, or SIGTERM on Unix
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received interrupt signal, shutting down..."),
        _ = terminate => info!("Received terminate signal, shutting down..."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use siteblock_core::Config;
    use std::path::Path;

    #[test]
    fn test_overrides() {
        let mut settings = Settings::resolve(Config::default(), None, Some(Path::new("/data")));
        let args = RunArgs {
            command_file: Some(PathBuf::from("/tmp/cmd.json")),
            no_poll: true,
            listen: Some("127.0.0.1:47631".parse().unwrap()),
            dry_run: false,
        };

        apply_overrides(&args, &mut settings);
        assert_eq!(settings.command_file, PathBuf::from("/tmp/cmd.json"));
        assert!(!settings.config.source.poll_file);
        assert_eq!(
            settings.config.source.listen,
            Some("127.0.0.1:47631".parse().unwrap())
        );
    }
}
