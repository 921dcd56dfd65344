//! Error types for siteblock-core
//!
//! Centralized error handling using `thiserror` for ergonomic error definitions.

use thiserror::Error;

/// Main error type for siteblock-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound {
        /// Path to the missing config file
        path: String,
    },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    ConfigValue {
        /// Configuration key
        key: String,
        /// Error message
        message: String,
    },

    /// A command was well-formed JSON but cannot be executed
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    /// A domain could not be normalized
    #[error("Invalid domain '{input}': {reason}")]
    InvalidDomain {
        /// The raw input
        input: String,
        /// Why it was rejected
        reason: &'static str,
    },

    /// The rule installer rejected an update
    #[error("Rule installer '{backend}' failed: {message}")]
    Installer {
        /// Name of the installer backend
        backend: &'static str,
        /// Error message
        message: String,
    },

    /// Persisted state could not be read or written
    #[error("State store error for '{path}': {message}")]
    StateStore {
        /// Location of the state document
        path: String,
        /// Error message
        message: String,
    },

    /// Rule identifier space exhausted
    #[error("Rule identifier space exhausted")]
    RuleIdsExhausted,

    /// I/O error wrapper
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a config value error
    pub fn config_value(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValue {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Create an installer error
    pub fn installer(backend: &'static str, message: impl Into<String>) -> Self {
        Self::Installer {
            backend,
            message: message.into(),
        }
    }

    /// Create a state store error
    pub fn state_store(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StateStore {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an invalid command error
    pub fn invalid_command(message: impl Into<String>) -> Self {
        Self::InvalidCommand(message.into())
    }
}
