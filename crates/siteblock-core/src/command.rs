//! Command wire format
//!
//! The producer (assistant, CLI, script) and the agent share a single JSON
//! schema regardless of transport:
//!
//! ```json
//! {
//!   "command": "block",
//!   "domains": ["youtube.com", "reddit.com"],
//!   "block_id": 7,
//!   "unblock_timestamp": 1760000000,
//!   "timestamp": 1759996400.52
//! }
//! ```
//!
//! `timestamp` orders commands and is what makes replays harmless; it may be
//! fractional. `domains` and `unblock_timestamp` are optional on `unblock`.

use crate::domain::normalize_domains;
use crate::error::{Error, Result};
use crate::registry::BlockId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Command verb
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandKind {
    /// Start (or replace) a block
    Block,
    /// Lift a block early
    Unblock,
}

/// A command record exactly as it travels on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    /// Verb
    pub command: CommandKind,
    /// Sites to block; ignored for unblock
    #[serde(default)]
    pub domains: Vec<String>,
    /// External identifier grouping the domains
    pub block_id: BlockId,
    /// Expiry in unix seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unblock_timestamp: Option<i64>,
    /// Issue time, strictly increasing per producer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
}

/// A validated command, ready for the executor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// Install a block
    Block {
        /// Block identifier
        block_id: BlockId,
        /// Normalized domains
        domains: BTreeSet<String>,
        /// Expiry in unix seconds
        unblock_timestamp: i64,
    },
    /// Remove a block
    Unblock {
        /// Block identifier
        block_id: BlockId,
    },
}

impl Directive {
    /// Block identifier this directive targets
    pub fn block_id(&self) -> BlockId {
        match self {
            Self::Block { block_id, .. } | Self::Unblock { block_id } => *block_id,
        }
    }
}

impl Command {
    /// Build a block command stamped with `timestamp`
    pub fn block<I, S>(domains: I, block_id: BlockId, unblock_timestamp: i64, timestamp: f64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            command: CommandKind::Block,
            domains: domains.into_iter().map(Into::into).collect(),
            block_id,
            unblock_timestamp: Some(unblock_timestamp),
            timestamp: Some(timestamp),
        }
    }

    /// Build an unblock command stamped with `timestamp`
    pub fn unblock(block_id: BlockId, timestamp: f64) -> Self {
        Self {
            command: CommandKind::Unblock,
            domains: Vec::new(),
            block_id,
            unblock_timestamp: None,
            timestamp: Some(timestamp),
        }
    }

    /// Parse a command from JSON text
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(Error::from)
    }

    /// Serialize to pretty JSON, the format of the command file
    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(Error::from)
    }

    /// Serialize to a single line, the format of the socket transport
    pub fn to_json_line(&self) -> Result<String> {
        serde_json::to_string(self).map_err(Error::from)
    }

    /// Validate and normalize into a [`Directive`]
    pub fn directive(&self) -> Result<Directive> {
        match self.command {
            CommandKind::Block => {
                let unblock_timestamp = self.unblock_timestamp.ok_or_else(|| {
                    Error::invalid_command(format!(
                        "block {} is missing unblock_timestamp",
                        self.block_id
                    ))
                })?;
                let domains = normalize_domains(&self.domains)?;
                Ok(Directive::Block {
                    block_id: self.block_id,
                    domains,
                    unblock_timestamp,
                })
            }
            CommandKind::Unblock => Ok(Directive::Unblock {
                block_id: self.block_id,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_block() {
        let cmd = Command::from_json(
            r#"{"command":"block","domains":["example.com"],"block_id":1,
                "unblock_timestamp":1700003600,"timestamp":100}"#,
        )
        .unwrap();
        assert_eq!(cmd.command, CommandKind::Block);
        assert_eq!(cmd.block_id, 1);
        assert_eq!(cmd.timestamp, Some(100.0));

        let directive = cmd.directive().unwrap();
        assert_eq!(directive.block_id(), 1);
        match directive {
            Directive::Block {
                domains,
                unblock_timestamp,
                ..
            } => {
                assert_eq!(unblock_timestamp, 1_700_003_600);
                assert!(domains.contains("example.com"));
            }
            Directive::Unblock { .. } => panic!("expected block"),
        }
    }

    #[test]
    fn test_parse_unblock_minimal() {
        let cmd = Command::from_json(r#"{"command":"unblock","block_id":1,"timestamp":101.5}"#)
            .unwrap();
        assert_eq!(cmd.command, CommandKind::Unblock);
        assert!(cmd.domains.is_empty());
        assert_eq!(cmd.directive().unwrap(), Directive::Unblock { block_id: 1 });
    }

    #[test]
    fn test_missing_timestamp_is_parsed_as_none() {
        let cmd = Command::from_json(r#"{"command":"unblock","block_id":3}"#).unwrap();
        assert_eq!(cmd.timestamp, None);
    }

    #[test]
    fn test_block_requires_expiry() {
        let cmd =
            Command::from_json(r#"{"command":"block","domains":["a.com"],"block_id":1}"#).unwrap();
        assert!(matches!(cmd.directive(), Err(Error::InvalidCommand(_))));
    }

    #[test]
    fn test_block_requires_domains() {
        let cmd = Command::block(Vec::<String>::new(), 1, 10, 1.0);
        assert!(cmd.directive().is_err());
    }

    #[test]
    fn test_unknown_verb_rejected() {
        assert!(Command::from_json(r#"{"command":"pause","block_id":1}"#).is_err());
        assert!(Command::from_json("not json").is_err());
    }

    #[test]
    fn test_unblock_serialization_omits_optionals() {
        let line = Command::unblock(4, 12.0).to_json_line().unwrap();
        assert!(!line.contains("unblock_timestamp"));
        assert!(line.contains(r#""command":"unblock""#));
        assert!(!line.contains('\n'));
    }
}
