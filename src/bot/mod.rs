//! Quarantine Bot
//!
//! Single event loop that:
//! - Quarantines members as they join
//! - Runs authority-gated `/verify` operator commands
//! - Resolves self-unlock signals from the HTTP endpoint or other components
//!
//! Events arrive over an `mpsc` channel and are handled one at a time.
//! Confirmed sweeps run in their own task and never block the loop.

pub mod commands;

use crate::config::QuarantineConfig;
use crate::gatekeeper::{
    AdmissionController, CleanupSweeper, OverrideCommands, SelfUnlockService, UnlockSource,
    VerifyContext, VerifyError,
};
use crate::gateway::{GroupId, MemberId, NotificationSink};
use commands::{parse_command, Command};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub use commands::COMMAND_PREFIX;

/// Pending events the bot will buffer before senders wait.
const EVENT_QUEUE_DEPTH: usize = 256;

/// Inbound bot events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotEvent {
    /// A member joined a group
    MemberJoined { member: MemberId, group: GroupId },

    /// Chat line from a group member
    Command {
        sender: MemberId,
        group: GroupId,
        text: String,
    },

    /// Self-unlock request carrying the raw claimed id
    SelfUnlock { source: UnlockSource, claimed: i64 },
}

/// The event loop has shut down.
#[derive(Debug, thiserror::Error)]
#[error("bot event loop has stopped")]
pub struct BotStopped;

/// Cloneable sender side of the bot's event channel
#[derive(Debug, Clone)]
pub struct BotHandle {
    events: mpsc::Sender<BotEvent>,
}

impl BotHandle {
    /// New event channel; the receiver belongs to the event loop.
    pub fn channel() -> (Self, mpsc::Receiver<BotEvent>) {
        let (tx, rx) = mpsc::channel(EVENT_QUEUE_DEPTH);
        (Self { events: tx }, rx)
    }

    pub async fn send(&self, event: BotEvent) -> Result<(), BotStopped> {
        self.events.send(event).await.map_err(|_| BotStopped)
    }

    /// Internal unlock signal.
    pub async fn self_unlock(&self, source: UnlockSource, claimed: i64) -> Result<(), BotStopped> {
        self.send(BotEvent::SelfUnlock { source, claimed }).await
    }
}

/// Quarantine bot
pub struct VerifyBot {
    admission: AdmissionController,
    overrides: OverrideCommands,
    unlock: SelfUnlockService,
    sweeper: CleanupSweeper,
    notifier: Arc<dyn NotificationSink>,
    events: mpsc::Receiver<BotEvent>,
}

impl VerifyBot {
    pub fn new(ctx: VerifyContext, config: Arc<QuarantineConfig>) -> (Self, BotHandle) {
        let (handle, rx) = BotHandle::channel();

        let sweeper = CleanupSweeper::new(
            ctx.store.clone(),
            ctx.gateway.clone(),
            config.verify.wait_duration,
            config.verify.sweep_pacing,
        );
        let bot = Self {
            admission: AdmissionController::new(ctx.clone(), config.clone()),
            overrides: OverrideCommands::new(ctx.clone(), config.clone()),
            unlock: SelfUnlockService::new(ctx.clone(), config),
            sweeper,
            notifier: ctx.notifier,
            events: rx,
        };

        (bot, handle)
    }

    /// Run bot event loop until every handle is dropped
    pub async fn run(mut self) {
        info!("verification bot started");
        while let Some(event) = self.events.recv().await {
            self.handle_event(event).await;
        }
        info!("verification bot stopped");
    }

    /// Handle one event. Failures are logged, never propagated.
    pub async fn handle_event(&self, event: BotEvent) {
        match event {
            BotEvent::MemberJoined { member, group } => {
                info!(member = %member, group = %group, "member joined");
                if let Err(e) = self.admission.on_member_joined(member, group).await {
                    warn!(member = %member, group = %group, "failed to quarantine: {}", e);
                }
            }
            BotEvent::Command {
                sender,
                group,
                text,
            } => {
                if let Some(reply) = self.handle_command(sender, group, &text).await {
                    if let Err(e) = self.notifier.send(group, None, &reply).await {
                        warn!(group = %group, "failed to send command reply: {}", e);
                    }
                }
            }
            BotEvent::SelfUnlock { source, claimed } => {
                match self.unlock.request_unlock(source, claimed).await {
                    Ok(report) if report.is_empty() => {
                        info!(claimed, "self-unlock: not quarantined anywhere")
                    }
                    Ok(report) => info!(
                        claimed,
                        unlocked = report.unlocked.len(),
                        failed = report.failed.len(),
                        "self-unlock processed"
                    ),
                    // rejections were logged by the service
                    Err(VerifyError::InvalidInput(_)) | Err(VerifyError::PathDisabled(_)) => {}
                    Err(e) => warn!(claimed, "self-unlock failed: {}", e),
                }
            }
        }
    }

    /// Run a chat line as an operator command and return the reply, if any.
    pub async fn handle_command(
        &self,
        sender: MemberId,
        group: GroupId,
        text: &str,
    ) -> Option<String> {
        let command = parse_command(text)?;

        if let Err(e) = self.overrides.authorize(sender) {
            debug!(sender = %sender, "rejected command: {}", e);
            return Some("You are not allowed to run verification commands.".to_string());
        }

        let result = match command {
            Command::Ban { member } => self.overrides.ban(sender, member, group).await,
            Command::Unban { member } => self.overrides.unban(sender, member, group).await,
            Command::Clean { confirm } => {
                info!(sender = %sender, confirm, "sweep requested");
                self.sweeper
                    .sweep(confirm)
                    .await
                    .map(|outcome| outcome.message())
            }
            Command::Help => Ok(Command::help_text()),
            Command::Unknown(raw) => Ok(format!(
                "Unknown command '{}'.\n\n{}",
                raw,
                Command::help_text()
            )),
        };

        Some(result.unwrap_or_else(|e| format!("Command failed: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::MockGateway;
    use crate::store::{MemoryRecordStore, RecordStore};
    use std::time::Duration;

    const OPERATOR: MemberId = MemberId(10_001);
    const GROUP: GroupId = GroupId(10);

    fn bot() -> (VerifyBot, BotHandle, MemoryRecordStore, MockGateway) {
        let store = MemoryRecordStore::new();
        let gateway = MockGateway::new();
        let ctx = VerifyContext::new(
            Arc::new(store.clone()),
            Arc::new(gateway.clone()),
            Arc::new(gateway.clone()),
        );
        let mut config = QuarantineConfig::default();
        config.verify.operators = vec![OPERATOR];
        config.verify.sweep_pacing = Duration::from_millis(1);
        let (bot, handle) = VerifyBot::new(ctx, Arc::new(config));
        (bot, handle, store, gateway)
    }

    #[tokio::test]
    async fn test_join_event_quarantines() {
        let (bot, _handle, store, _gateway) = bot();

        bot.handle_event(BotEvent::MemberJoined {
            member: MemberId(20001),
            group: GROUP,
        })
        .await;

        assert!(store.get(MemberId(20001), GROUP).unwrap().is_quarantined());
    }

    #[tokio::test]
    async fn test_operator_ban_replies_to_group() {
        let (bot, _handle, store, gateway) = bot();

        bot.handle_event(BotEvent::Command {
            sender: OPERATOR,
            group: GROUP,
            text: "/verify ban 20001".to_string(),
        })
        .await;

        assert!(store.get(MemberId(20001), GROUP).unwrap().is_quarantined());
        let notices = gateway.notices_in(GROUP);
        // rule reminder, then the operator acknowledgment
        assert_eq!(notices.len(), 2);
        assert!(notices[1].text.starts_with("Muted 20001"));
    }

    #[tokio::test]
    async fn test_non_operator_is_refused() {
        let (bot, _handle, store, _gateway) = bot();

        let reply = bot
            .handle_command(MemberId(20002), GROUP, "/verify ban 20001")
            .await
            .unwrap();

        assert!(reply.contains("not allowed"));
        assert!(store.all().is_empty());
    }

    #[tokio::test]
    async fn test_ordinary_chat_gets_no_reply() {
        let (bot, _handle, _store, _gateway) = bot();

        assert!(bot.handle_command(OPERATOR, GROUP, "good morning").await.is_none());
    }

    #[tokio::test]
    async fn test_clean_dry_run_reply() {
        let (bot, _handle, store, gateway) = bot();
        store.upsert(MemberId(20001), GROUP, 1).await.unwrap();

        let reply = bot
            .handle_command(OPERATOR, GROUP, "/verify clean")
            .await
            .unwrap();

        assert!(reply.contains("member 20001"));
        assert!(gateway.removals().is_empty());
    }

    #[tokio::test]
    async fn test_store_failure_reported_to_operator() {
        let (bot, _handle, store, _gateway) = bot();
        store.fail_writes(true);

        let reply = bot
            .handle_command(OPERATOR, GROUP, "/verify unban 20001")
            .await
            .unwrap();

        assert!(reply.starts_with("Command failed"));
    }

    #[tokio::test]
    async fn test_run_loop_processes_unlock_signal() {
        let (bot, handle, store, _gateway) = bot();
        store.upsert(MemberId(20001), GROUP, 1).await.unwrap();
        let task = tokio::spawn(bot.run());

        handle
            .self_unlock(UnlockSource::Event, 20001)
            .await
            .unwrap();
        drop(handle);
        task.await.unwrap();

        assert!(!store.get(MemberId(20001), GROUP).unwrap().is_quarantined());
    }
}
