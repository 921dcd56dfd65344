//! Logging initialization

use anyhow::{Context, Result};
use siteblock_core::config::LoggingConfig;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::args::{Args, LogFormat};

/// Initialize logging based on CLI arguments and the `[logging]` section
///
/// Command-line flags win over the configuration file. Logs go to stderr so
/// command output on stdout stays clean. The returned guard flushes the log
/// file and must be kept alive until exit.
pub fn init(args: &Args, config: Option<&LoggingConfig>) -> Result<Option<WorkerGuard>> {
    // Determine log level
    let level = if args.quiet {
        Level::ERROR
    } else {
        match args.verbose {
            0 => config
                .and_then(|c| Level::from_str(&c.level).ok())
                .unwrap_or(Level::INFO),
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    // Build env filter
    let env_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let format = match args.log_format {
        LogFormat::Text if config.is_some_and(|c| c.json_format) => LogFormat::Json,
        other => other,
    };

    let log_file = args
        .log_file
        .clone()
        .or_else(|| config.and_then(|c| c.file.as_deref().map(PathBuf::from)));

    let (file_writer, guard) = match log_file {
        Some(path) => {
            let (writer, guard) = tracing_appender::non_blocking(open_appender(&path)?);
            (Some(writer), Some(guard))
        }
        None => (None, None),
    };

    // Set up subscriber based on format
    match format {
        LogFormat::Text => {
            let subscriber = tracing_subscriber::registry().with(env_filter).with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(args.verbose >= 2)
                    .with_thread_ids(args.verbose >= 3)
                    .with_file(args.verbose >= 3)
                    .with_line_number(args.verbose >= 3),
            );

            if let Some(writer) = file_writer {
                let file_layer = fmt::layer().with_ansi(false).with_writer(writer);
                subscriber.with(file_layer).init();
            } else {
                subscriber.init();
            }
        }
        LogFormat::Json => {
            let subscriber = tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr));

            if let Some(writer) = file_writer {
                let file_layer = fmt::layer().json().with_writer(writer);
                subscriber.with(file_layer).init();
            } else {
                subscriber.init();
            }
        }
        LogFormat::Compact => {
            let subscriber = tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().compact().with_writer(std::io::stderr));

            if let Some(writer) = file_writer {
                let file_layer = fmt::layer().compact().with_ansi(false).with_writer(writer);
                subscriber.with(file_layer).init();
            } else {
                subscriber.init();
            }
        }
    }

    Ok(guard)
}

fn open_appender(path: &Path) -> Result<tracing_appender::rolling::RollingFileAppender> {
    let file_name = path
        .file_name()
        .with_context(|| format!("Log file path has no file name: {}", path.display()))?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;

    Ok(tracing_appender::rolling::never(dir, file_name))
}
