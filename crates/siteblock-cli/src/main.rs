//! siteblock CLI
//!
//! Runs the blocking agent and submits commands to it.

mod args;
mod commands;
mod logging;
mod settings;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::error;

use args::Args;
use commands::Command;
use settings::Settings;

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Commands that touch the agent's files need the configuration first
    let settings = if args.command.needs_settings() {
        Some(Settings::load(args.config.as_deref(), args.data_dir.as_deref())?)
    } else {
        None
    };

    // Initialize logging
    let _log_guard = logging::init(&args, settings.as_ref().map(|s| &s.config.logging))?;

    if matches!(args.command, Command::Run(_)) && !args.quiet {
        print_banner();
    }

    // Run the main logic
    let result = run(args.command, settings);

    if let Err(ref e) = result {
        error!("Fatal error: {:#}", e);
    }

    result
}

fn run(command: Command, settings: Option<Settings>) -> Result<()> {
    const NOT_LOADED: &str = "Configuration was not loaded";

    match command {
        Command::Run(run_args) => {
            commands::run::execute(run_args, settings.context(NOT_LOADED)?)
        }
        Command::Block(block_args) => {
            commands::block::execute(block_args, settings.context(NOT_LOADED)?)
        }
        Command::Unblock(unblock_args) => {
            commands::unblock::execute(unblock_args, settings.context(NOT_LOADED)?)
        }
        Command::Status(status_args) => {
            commands::status::execute(status_args, settings.context(NOT_LOADED)?)
        }
        Command::Config(config_args) => commands::config::execute(config_args),
        Command::Completions(comp_args) => commands::completions::execute(comp_args),
    }
}

fn print_banner() {
    use colored::Colorize;

    let [top, title, subtitle, bottom] = banner_lines(env!("CARGO_PKG_VERSION"));

    println!();
    println!("{}", top.red());
    println!("{}", title.white().bold());
    println!("{}", subtitle.white());
    println!("{}", bottom.red());
    println!();
}

/// Box around the name and tagline, sized to fit `version`
fn banner_lines(version: &str) -> [String; 4] {
    let title = format!("siteblock v{version}");
    let subtitle = "timed website blocking";
    let inner = title.len().max(subtitle.len()) + 4;
    let border = "═".repeat(inner);

    [
        format!("╔{border}╗"),
        format!("║  {title:<w$}║", w = inner - 2),
        format!("║  {subtitle:<w$}║", w = inner - 2),
        format!("╚{border}╝"),
    ]
}
