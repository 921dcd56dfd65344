//! Redirect rule model
//!
//! A [`Rule`] is the backend-neutral description of one blocking rule. The
//! [`DeclarativeRule`] types mirror the browser `declarativeNetRequest`
//! dynamic-rule JSON so rules can be handed to an extension verbatim.

use crate::registry::RuleId;
use serde::{Deserialize, Serialize};

/// Default local page blocked navigations are redirected to
pub const DEFAULT_REDIRECT_PATH: &str = "/blocked.html";

/// Default rule priority
pub const DEFAULT_PRIORITY: u32 = 1;

/// Which hosts of a domain a rule matches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchScope {
    /// `*.domain`: every subdomain, `www.` included
    Subdomains,
    /// The bare domain only
    Exact,
}

/// One redirect rule for one domain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// Unique identifier
    pub id: RuleId,
    /// Normalized domain
    pub domain: String,
    /// Hosts matched
    pub scope: MatchScope,
    /// Local page to redirect to
    pub redirect_path: String,
    /// Rule priority
    pub priority: u32,
}

impl Rule {
    /// URL filter pattern for this rule
    pub fn url_filter(&self) -> String {
        match self.scope {
            MatchScope::Subdomains => format!("*://*.{}/*", self.domain),
            MatchScope::Exact => format!("*://{}/*", self.domain),
        }
    }

    /// Whether a navigation to `host` is caught by this rule
    pub fn matches_host(&self, host: &str) -> bool {
        let host = host.trim_end_matches('.').to_lowercase();
        match self.scope {
            MatchScope::Exact => host == self.domain,
            MatchScope::Subdomains => host
                .strip_suffix(self.domain.as_str())
                .is_some_and(|prefix| prefix.ends_with('.')),
        }
    }

    /// Browser dynamic-rule representation
    pub fn to_declarative(&self) -> DeclarativeRule {
        DeclarativeRule {
            id: self.id,
            priority: self.priority,
            action: RuleAction {
                kind: ActionType::Redirect,
                redirect: Some(Redirect {
                    extension_path: self.redirect_path.clone(),
                }),
            },
            condition: RuleCondition {
                url_filter: self.url_filter(),
                resource_types: vec![ResourceType::MainFrame],
            },
        }
    }
}

/// Dynamic rule as understood by the browser
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeclarativeRule {
    /// Rule identifier
    pub id: RuleId,
    /// Rule priority
    pub priority: u32,
    /// What happens on match
    pub action: RuleAction,
    /// When the rule matches
    pub condition: RuleCondition,
}

/// Rule action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleAction {
    /// Action type
    #[serde(rename = "type")]
    pub kind: ActionType,
    /// Redirect target for redirect actions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect: Option<Redirect>,
}

/// Action types used by this agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionType {
    /// Redirect the request
    Redirect,
}

/// Redirect target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Redirect {
    /// Page inside the extension package
    pub extension_path: String,
}

/// Rule condition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleCondition {
    /// URL pattern
    pub url_filter: String,
    /// Request types the rule applies to
    pub resource_types: Vec<ResourceType>,
}

/// Request resource type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    /// Top-level navigation
    MainFrame,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(scope: MatchScope) -> Rule {
        Rule {
            id: 1000,
            domain: "example.com".to_string(),
            scope,
            redirect_path: DEFAULT_REDIRECT_PATH.to_string(),
            priority: DEFAULT_PRIORITY,
        }
    }

    #[test]
    fn test_url_filters() {
        assert_eq!(rule(MatchScope::Subdomains).url_filter(), "*://*.example.com/*");
        assert_eq!(rule(MatchScope::Exact).url_filter(), "*://example.com/*");
    }

    #[test]
    fn test_matches_host() {
        let sub = rule(MatchScope::Subdomains);
        assert!(sub.matches_host("www.example.com"));
        assert!(sub.matches_host("a.b.example.com"));
        assert!(!sub.matches_host("example.com"));
        assert!(!sub.matches_host("notexample.com"));

        let exact = rule(MatchScope::Exact);
        assert!(exact.matches_host("example.com"));
        assert!(exact.matches_host("Example.COM."));
        assert!(!exact.matches_host("www.example.com"));
    }

    #[test]
    fn test_declarative_json_shape() {
        let json = serde_json::to_value(rule(MatchScope::Exact).to_declarative()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id": 1000,
                "priority": 1,
                "action": {
                    "type": "redirect",
                    "redirect": { "extensionPath": "/blocked.html" }
                },
                "condition": {
                    "urlFilter": "*://example.com/*",
                    "resourceTypes": ["main_frame"]
                }
            })
        );
    }
}
