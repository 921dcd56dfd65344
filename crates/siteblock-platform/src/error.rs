//! Platform-specific errors

use siteblock_core::RuleId;
use thiserror::Error;

/// Platform-specific errors
#[derive(Error, Debug)]
pub enum PlatformError {
    /// Permission denied, typically writing the system hosts file
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// A rules file exists but cannot be understood
    #[error("Malformed rules in {path}: {message}")]
    MalformedRules {
        /// File that failed to parse
        path: String,
        /// Error message
        message: String,
    },

    /// A rule with this identifier is already installed
    #[error("Rule {0} is already installed")]
    DuplicateRule(RuleId),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PlatformError {
    /// Wrap an IO error, singling out permission problems
    pub fn from_io(err: std::io::Error, path: &std::path::Path) -> Self {
        if err.kind() == std::io::ErrorKind::PermissionDenied {
            Self::PermissionDenied(path.display().to_string())
        } else {
            Self::Io(err)
        }
    }

    /// Convert into the core error reported by an installer
    pub fn into_installer_error(self, backend: &'static str) -> siteblock_core::Error {
        siteblock_core::Error::installer(backend, self.to_string())
    }
}

/// Platform result type
pub type Result<T> = std::result::Result<T, PlatformError>;
