//! # siteblock core
//!
//! Platform-independent core of the siteblock agent.
//!
//! ## Architecture
//!
//! This crate provides:
//! - **Commands** - the JSON wire schema and its validation
//! - **Block registry** - persisted `block_id -> BlockRecord` map, the source of truth
//! - **Rule synchronization** - domain lists to redirect rules, behind [`rules::RuleInstaller`]
//! - **Expiry scheduling** - one tokio timer per active block
//! - **Agent** - the block lifecycle state machine and startup reconciliation
//! - **Sources** - command file polling and a local socket
//! - **Configuration** - TOML based settings
//!
//! ## Example
//!
//! ```rust,no_run
//! use siteblock_core::{Agent, Registry, RuleSynchronizer};
//! use siteblock_core::registry::JsonFileStore;
//! use siteblock_core::rules::{MemoryInstaller, RuleTemplate};
//! use siteblock_core::source::{command_channel, FilePoller};
//!
//! # async fn demo() -> siteblock_core::Result<()> {
//! let registry = Registry::open(Box::new(JsonFileStore::new("state.json")), 1000)?;
//! let rules = RuleSynchronizer::new(Box::new(MemoryInstaller::new()), RuleTemplate::default());
//! let agent = Agent::builder(registry, rules).build();
//!
//! let (tx, rx) = command_channel();
//! tokio::spawn(FilePoller::new("block-commands.json").run(tx));
//! agent.run(rx, async { let _ = tokio::signal::ctrl_c().await; }).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod agent;
pub mod clock;
pub mod command;
pub mod config;
pub mod domain;
pub mod error;
pub mod notify;
pub mod registry;
pub mod rules;
pub mod scheduler;
pub mod source;

// Re-exports for convenience
pub use agent::{Agent, AgentOptions, CommandOutcome, ReconcileReport};
pub use command::{Command, CommandKind, Directive};
pub use config::Config;
pub use error::{Error, Result};
pub use notify::{Badge, Notification, Notifier};
pub use registry::{BlockId, BlockRecord, Registry, RuleId};
pub use rules::{Rule, RuleInstaller, RuleSynchronizer};
pub use scheduler::ExpiryScheduler;
