//! siteblock platform layer
//!
//! Rule installers that touch the outside world.
//!
//! ## Backends
//!
//! - **Rules file**: dynamic redirect rules as JSON, loaded by the companion
//!   browser extension
//! - **Hosts file**: managed section of the system hosts file
//!
//! The in-memory installer used for dry runs lives in `siteblock-core`.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
pub use error::{PlatformError, Result};

pub mod hosts;
pub mod rules_file;

pub use hosts::{default_hosts_path, HostsFileInstaller};
pub use rules_file::RulesFileInstaller;

use siteblock_core::config::{RuleBackend, RulesConfig};
use siteblock_core::rules::{MemoryInstaller, RuleInstaller};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::info;

/// Build the installer selected by `config`
///
/// `default_rules_file` is used when the rules file backend is selected
/// without an explicit path.
pub fn installer_from_config(config: &RulesConfig, default_rules_file: &Path) -> Box<dyn RuleInstaller> {
    match config.backend {
        RuleBackend::RulesFile => {
            let path = config
                .rules_file
                .as_deref()
                .map(PathBuf::from)
                .unwrap_or_else(|| default_rules_file.to_path_buf());
            info!(path = %path.display(), "Using rules file installer");
            Box::new(RulesFileInstaller::new(path))
        }
        RuleBackend::Hosts => {
            let path = config
                .hosts_file
                .as_deref()
                .map(PathBuf::from)
                .unwrap_or_else(default_hosts_path);
            info!(path = %path.display(), "Using hosts file installer");
            Box::new(HostsFileInstaller::new(path))
        }
        RuleBackend::Memory => {
            info!("Using in-memory installer, nothing will be enforced");
            Box::new(MemoryInstaller::new())
        }
    }
}

/// Sibling path used to stage an atomic replace
pub(crate) fn temp_path_for(path: &Path) -> PathBuf {
    let mut name: OsString = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".siteblock.tmp");
    path.with_file_name(name)
}
