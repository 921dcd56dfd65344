//! Integration tests for configuration module

use siteblock_core::config::{Config, RuleBackend};
use siteblock_core::rules::RuleTemplate;
use std::net::SocketAddr;

const FULL: &str = r#"
[general]
name = "laptop"

[source]
command_file = "/var/lib/siteblock/block-commands.json"
poll_interval_ms = 1000
listen = "127.0.0.1:47631"

[storage]
state_file = "/var/lib/siteblock/state.json"

[rules]
backend = "hosts"
hosts_file = "/tmp/hosts"
redirect_path = "/pages/blocked.html"
priority = 5
first_rule_id = 5000

[reconcile]
sweep_orphan_rules = false

[logging]
level = "debug"
json_format = true
"#;

#[test]
fn test_full_config_parses() {
    let config = Config::from_toml(FULL).unwrap();
    config.validate().unwrap();

    assert_eq!(config.general.name, "laptop");
    assert_eq!(config.source.poll_interval_ms, 1000);
    assert_eq!(
        config.source.listen,
        Some("127.0.0.1:47631".parse::<SocketAddr>().unwrap())
    );
    assert_eq!(
        config.storage.state_file.as_deref(),
        Some("/var/lib/siteblock/state.json")
    );
    assert_eq!(config.rules.backend, RuleBackend::Hosts);
    assert_eq!(config.rules.first_rule_id, 5000);
    assert!(config.logging.json_format);
}

#[test]
fn test_config_feeds_agent_parts() {
    let config = Config::from_toml(FULL).unwrap();

    assert_eq!(
        config.rule_template(),
        RuleTemplate {
            redirect_path: "/pages/blocked.html".to_string(),
            priority: 5,
        }
    );
    assert!(!config.agent_options().sweep_orphan_rules);
}

#[test]
fn test_config_file_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("siteblock.toml");

    let config = Config::from_toml(FULL).unwrap();
    std::fs::write(&path, config.to_toml().unwrap()).unwrap();

    assert_eq!(Config::load(&path).unwrap(), config);
}

#[test]
fn test_empty_file_is_default() {
    let config = Config::from_toml("").unwrap();
    assert_eq!(config, Config::default());
}
