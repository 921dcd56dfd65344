//! The blocking agent
//!
//! [`Agent`] owns the registry, the rule synchronizer and the expiry
//! scheduler and is the only thing that mutates them. Per block it runs a
//! two-state machine:
//!
//! ```text
//!            block                    unblock / expiry
//!   ABSENT ─────────▶ ACTIVE ─────────────────────────▶ ABSENT
//!                      │  ▲
//!                      └──┘ block again: old rules removed first
//! ```
//!
//! Commands, timer firings and startup reconciliation all end up as method
//! calls on `&mut Agent`. [`Agent::run`] drives them from a single task, so
//! transitions never interleave.

mod reconcile;

pub use reconcile::ReconcileReport;

use crate::clock::{Clock, SystemClock};
use crate::command::{Command, Directive};
use crate::error::{Error, Result};
use crate::notify::{Badge, LogNotifier, Notification, Notifier};
use crate::registry::{BlockId, BlockRecord, Registry, RuleId};
use crate::rules::RuleSynchronizer;
use crate::scheduler::ExpiryScheduler;
use crate::source::CommandRequest;
use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, trace, warn};

/// What happened to a submitted command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// The command ran
    Executed,
    /// Its timestamp was not newer than the last executed one
    Stale,
    /// It carried no timestamp and was ignored
    Unstamped,
    /// It was consumed but could not be executed (invalid content)
    Rejected,
}

impl CommandOutcome {
    /// Short label for replies and logs
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Executed => "executed",
            Self::Stale => "stale",
            Self::Unstamped => "unstamped",
            Self::Rejected => "rejected",
        }
    }

    /// Inverse of [`CommandOutcome::as_str`]
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim() {
            "executed" => Some(Self::Executed),
            "stale" => Some(Self::Stale),
            "unstamped" => Some(Self::Unstamped),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

/// Agent behaviour switches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentOptions {
    /// Remove installed rules no record owns during reconciliation
    pub sweep_orphan_rules: bool,
}

impl Default for AgentOptions {
    fn default() -> Self {
        Self {
            sweep_orphan_rules: true,
        }
    }
}

/// Builder for [`Agent`]
pub struct AgentBuilder {
    registry: Registry,
    rules: RuleSynchronizer,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    options: AgentOptions,
}

impl AgentBuilder {
    /// Deliver events to `notifier` instead of the log
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Use `clock` instead of the system clock
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Override the behaviour switches
    pub fn options(mut self, options: AgentOptions) -> Self {
        self.options = options;
        self
    }

    /// Build the agent; timers start only once it runs on a tokio runtime
    pub fn build(self) -> Agent {
        let (scheduler, expiries) = ExpiryScheduler::new(self.clock.clone());
        Agent {
            registry: self.registry,
            rules: self.rules,
            scheduler,
            expiries,
            notifier: self.notifier,
            clock: self.clock,
            options: self.options,
        }
    }
}

/// Block lifecycle owner
pub struct Agent {
    registry: Registry,
    rules: RuleSynchronizer,
    scheduler: ExpiryScheduler,
    expiries: mpsc::UnboundedReceiver<BlockId>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    options: AgentOptions,
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("registry", &self.registry)
            .field("rules", &self.rules)
            .field("scheduler", &self.scheduler)
            .field("options", &self.options)
            .finish()
    }
}

impl Agent {
    /// Start building an agent over `registry` and `rules`
    pub fn builder(registry: Registry, rules: RuleSynchronizer) -> AgentBuilder {
        AgentBuilder {
            registry,
            rules,
            notifier: Arc::new(LogNotifier),
            clock: Arc::new(SystemClock),
            options: AgentOptions::default(),
        }
    }

    /// The block registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// The expiry scheduler
    pub fn scheduler(&self) -> &ExpiryScheduler {
        &self.scheduler
    }

    /// The rule synchronizer
    pub fn rules(&self) -> &RuleSynchronizer {
        &self.rules
    }

    /// Current badge
    pub fn badge(&self) -> Badge {
        Badge::new(self.registry.len())
    }

    /// Execute a command if it is newer than the last executed one
    ///
    /// The last executed timestamp only advances once the command has run
    /// (or was rejected as invalid), so a command that failed on a transient
    /// installer or storage error runs again when it is delivered again.
    #[instrument(skip(self, command), fields(
        command = ?command.command,
        block_id = command.block_id,
        timestamp = ?command.timestamp
    ))]
    pub fn handle_command(&mut self, command: &Command) -> Result<CommandOutcome> {
        let Some(timestamp) = command.timestamp else {
            debug!("Ignoring command without timestamp");
            return Ok(CommandOutcome::Unstamped);
        };

        let last = self.registry.last_command_timestamp();
        if timestamp <= last {
            trace!(last, "Ignoring stale command");
            return Ok(CommandOutcome::Stale);
        }

        info!("Executing command");

        let directive = match command.directive() {
            Ok(directive) => directive,
            Err(e @ (Error::InvalidCommand(_) | Error::InvalidDomain { .. })) => {
                warn!("Rejecting command: {}", e);
                self.registry.set_last_command_timestamp(timestamp)?;
                return Ok(CommandOutcome::Rejected);
            }
            Err(e) => return Err(e),
        };

        self.execute(directive)?;
        self.registry.set_last_command_timestamp(timestamp)?;

        Ok(CommandOutcome::Executed)
    }

    /// Run a validated directive, bypassing timestamp ordering
    pub fn execute(&mut self, directive: Directive) -> Result<()> {
        debug!(block_id = directive.block_id(), "Executing directive");
        match directive {
            Directive::Block {
                block_id,
                domains,
                unblock_timestamp,
            } => self.block(block_id, domains, unblock_timestamp),
            Directive::Unblock { block_id } => self.unblock(block_id).map(|_| ()),
        }
    }

    /// ABSENT → ACTIVE
    ///
    /// An already active `block_id` is replaced: the new rules are installed
    /// first under fresh identifiers, then the old rules are removed, so a
    /// failure at either step leaves the existing block in force. The domain
    /// list is replaced rather than merged. The record is written only after
    /// the installer accepted the change.
    pub fn block(
        &mut self,
        block_id: BlockId,
        domains: BTreeSet<String>,
        unblock_timestamp: i64,
    ) -> Result<()> {
        let rule_ids = self
            .rules
            .apply_block(&mut self.registry, &domains, block_id)?;

        if let Some(existing) = self.registry.get(block_id).cloned() {
            info!(block_id, "Replacing active block");
            if let Err(e) = self.rules.remove_block(&existing.rule_ids) {
                self.discard_rules(block_id, &rule_ids);
                return Err(e);
            }
        }

        let record = BlockRecord {
            block_id,
            domains,
            rule_ids,
            unblock_timestamp,
        };
        let domain_list = record.domain_list();
        self.registry.put(record.clone())?;
        // Re-arming replaces any timer of the previous record
        self.scheduler.schedule(block_id, unblock_timestamp);

        info!(
            block_id,
            rules = record.rule_ids.len(),
            unblock_timestamp,
            "Blocked {}",
            domain_list
        );

        self.notifier.notify(&Notification::Blocked {
            block_id,
            domains: record.domains,
            unblock_timestamp,
        });
        self.notify_badge();

        Ok(())
    }

    /// ACTIVE → ABSENT
    ///
    /// Returns `false` (and changes nothing) if `block_id` is not active.
    pub fn unblock(&mut self, block_id: BlockId) -> Result<bool> {
        let Some(record) = self.registry.get(block_id).cloned() else {
            info!(block_id, "Block not found");
            return Ok(false);
        };

        self.rules.remove_block(&record.rule_ids)?;
        self.registry.remove(block_id)?;
        self.scheduler.cancel(block_id);

        info!(block_id, "Unblocked {}", record.domain_list());

        self.notify_badge();
        self.notifier.notify(&Notification::Unblocked {
            block_id,
            domains: record.domains,
        });

        Ok(true)
    }

    /// React to the expiry timer of `block_id` firing
    ///
    /// The record is re-checked: it may be gone already, or its expiry may
    /// have moved (timer woke early, block was replaced after the timer
    /// fired). In the latter case the timer is re-armed.
    pub fn handle_expiry(&mut self, block_id: BlockId) -> Result<()> {
        self.scheduler.acknowledge(block_id);

        let Some(record) = self.registry.get(block_id) else {
            debug!(block_id, "Expiry for block that is no longer active");
            return Ok(());
        };

        let now = self.clock.now();
        if record.is_expired(now) {
            info!(block_id, "Block expired");
            self.unblock(block_id)?;
        } else if !self.scheduler.is_scheduled(block_id) {
            let unblock_timestamp = record.unblock_timestamp;
            debug!(block_id, unblock_timestamp, now, "Expiry fired early, re-arming");
            self.scheduler.schedule(block_id, unblock_timestamp);
        }

        Ok(())
    }

    /// Drive the agent until `shutdown` resolves
    ///
    /// Reconciles persisted state first, then serves commands and expiry
    /// timers one at a time. Failures of a single command are logged (and
    /// reported to the requester) without stopping the loop.
    pub async fn run<F>(
        mut self,
        mut commands: mpsc::Receiver<CommandRequest>,
        shutdown: F,
    ) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let report = self.reconcile()?;
        info!(
            expired = report.expired.len(),
            rearmed = report.rearmed.len(),
            orphans_removed = report.orphans_removed,
            "Reconciled persisted blocks"
        );

        tokio::pin!(shutdown);
        let mut commands_open = true;

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
                request = commands.recv(), if commands_open => {
                    match request {
                        Some(request) => self.serve(request),
                        None => {
                            warn!("All command sources closed, serving timers only");
                            commands_open = false;
                        }
                    }
                }
                Some(block_id) = self.expiries.recv() => {
                    if let Err(e) = self.handle_expiry(block_id) {
                        error!(block_id, "Failed to expire block: {}", e);
                    }
                }
            }
        }

        self.scheduler.cancel_all();
        info!(active = self.registry.len(), "Agent stopped");
        Ok(())
    }

    fn serve(&mut self, request: CommandRequest) {
        let CommandRequest { command, reply } = request;
        let result = self.handle_command(&command);

        if let Err(ref e) = result {
            error!(block_id = command.block_id, "Command failed: {}", e);
        }

        if let Some(reply) = reply {
            // Requester may have gone away
            let _ = reply.send(result.map_err(|e| e.to_string()));
        }
    }

    /// Best-effort removal of rules installed by a block that did not go through
    fn discard_rules(&self, block_id: BlockId, rule_ids: &[RuleId]) {
        if let Err(e) = self.rules.remove_block(rule_ids) {
            warn!(
                block_id,
                rule_ids = ?rule_ids,
                "Could not roll back rules, they are swept on next start: {}",
                e
            );
        }
    }

    fn notify_badge(&self) {
        self.notifier
            .notify(&Notification::BadgeChanged(self.badge()));
    }
}
