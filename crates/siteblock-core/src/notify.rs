//! Badge and notification events
//!
//! Rendering is left to whoever implements [`Notifier`]; the agent only
//! reports what happened and how many blocks are active.

use crate::registry::BlockId;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::info;

/// Badge colour shown while something is blocked
pub const BADGE_COLOR: &str = "#F44336";

/// Badge model: the number of active blocks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Badge {
    /// Active block count
    pub count: usize,
}

impl Badge {
    /// Badge for `count` active blocks
    pub fn new(count: usize) -> Self {
        Self { count }
    }

    /// Badge text, empty when nothing is blocked
    pub fn text(&self) -> String {
        if self.count > 0 {
            self.count.to_string()
        } else {
            String::new()
        }
    }

    /// Badge background colour, if the badge is shown
    pub fn color(&self) -> Option<&'static str> {
        (self.count > 0).then_some(BADGE_COLOR)
    }
}

/// Something the user may want to hear about
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// A block became active
    Blocked {
        /// Block identifier
        block_id: BlockId,
        /// Blocked domains
        domains: BTreeSet<String>,
        /// Expiry in unix seconds
        unblock_timestamp: i64,
    },
    /// A block was lifted
    Unblocked {
        /// Block identifier
        block_id: BlockId,
        /// Domains access was restored to
        domains: BTreeSet<String>,
    },
    /// The number of active blocks changed
    BadgeChanged(Badge),
}

impl Notification {
    /// Title line for a desktop notification
    pub fn title(&self) -> &'static str {
        match self {
            Self::Blocked { .. } => "Websites Blocked",
            Self::Unblocked { .. } => "Websites Unblocked",
            Self::BadgeChanged(_) => "Active Blocks",
        }
    }

    /// Body text for a desktop notification
    pub fn message(&self) -> String {
        match self {
            Self::Blocked { domains, .. } => format!("Blocked: {}", join(domains)),
            Self::Unblocked { domains, .. } => format!("Access restored to: {}", join(domains)),
            Self::BadgeChanged(badge) => format!("{} active", badge.count),
        }
    }
}

fn join(domains: &BTreeSet<String>) -> String {
    domains
        .iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Receiver of agent events
pub trait Notifier: Send + Sync {
    /// Deliver one event
    fn notify(&self, notification: &Notification);
}

/// Writes events to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: &Notification) {
        match notification {
            Notification::BadgeChanged(badge) => {
                info!(count = badge.count, text = %badge.text(), "Badge updated");
            }
            other => info!("{}: {}", other.title(), other.message()),
        }
    }
}

/// Keeps every event, for tests
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    events: Arc<Mutex<Vec<Notification>>>,
}

impl RecordingNotifier {
    /// Empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything received so far
    pub fn events(&self) -> Vec<Notification> {
        self.events.lock().clone()
    }

    /// Most recent badge, if any was reported
    pub fn last_badge(&self) -> Option<Badge> {
        self.events.lock().iter().rev().find_map(|n| match n {
            Notification::BadgeChanged(badge) => Some(badge.clone()),
            _ => None,
        })
    }

    /// Unblock events only
    pub fn unblocked(&self) -> Vec<Notification> {
        self.events
            .lock()
            .iter()
            .filter(|n| matches!(n, Notification::Unblocked { .. }))
            .cloned()
            .collect()
    }

    /// Forget recorded events
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: &Notification) {
        self.events.lock().push(notification.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_badge_text() {
        assert_eq!(Badge::new(0).text(), "");
        assert_eq!(Badge::new(0).color(), None);
        assert_eq!(Badge::new(3).text(), "3");
        assert_eq!(Badge::new(3).color(), Some(BADGE_COLOR));
    }

    #[test]
    fn test_unblocked_message() {
        let n = Notification::Unblocked {
            block_id: 1,
            domains: ["reddit.com".to_string(), "example.com".to_string()]
                .into_iter()
                .collect(),
        };
        assert_eq!(n.title(), "Websites Unblocked");
        assert_eq!(n.message(), "Access restored to: example.com, reddit.com");
    }

    #[test]
    fn test_recorder() {
        let recorder = RecordingNotifier::new();
        recorder.notify(&Notification::BadgeChanged(Badge::new(1)));
        recorder.notify(&Notification::BadgeChanged(Badge::new(2)));
        assert_eq!(recorder.last_badge(), Some(Badge::new(2)));
        assert!(recorder.unblocked().is_empty());
        recorder.clear();
        assert!(recorder.events().is_empty());
    }
}
