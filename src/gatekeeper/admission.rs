//! Admission Controller
//!
//! Quarantines members as they join a gated group and welcomes them with the
//! unlock instructions. Failures are returned for the caller to log; the join
//! itself is never blocked.

use super::{transitions, VerifyContext, VerifyError, VerifyResult};
use crate::config::QuarantineConfig;
use crate::gateway::{GroupId, MemberId};
use std::sync::Arc;
use tracing::{debug, warn};

/// What happened to a joining member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Group is not gated
    Skipped,
    /// Member muted since `banned_at`
    Quarantined { banned_at: u64 },
}

pub struct AdmissionController {
    ctx: VerifyContext,
    config: Arc<QuarantineConfig>,
}

impl AdmissionController {
    pub fn new(ctx: VerifyContext, config: Arc<QuarantineConfig>) -> Self {
        Self { ctx, config }
    }

    /// Handle a member joining `group`.
    ///
    /// The welcome notice goes out whenever the member was muted, even if the
    /// record could not be written; only a failed mute skips it. A failed
    /// notice is logged and does not fail the admission.
    pub async fn on_member_joined(
        &self,
        member: MemberId,
        group: GroupId,
    ) -> VerifyResult<Admission> {
        if !self.config.groups.quarantines(group) {
            debug!(member = %member, group = %group, "group not gated, skipping");
            return Ok(Admission::Skipped);
        }

        let banned = transitions::ban(
            self.ctx.store.as_ref(),
            self.ctx.gateway.as_ref(),
            member,
            group,
            self.config.verify.ban_duration,
        )
        .await;

        if matches!(banned, Err(VerifyError::Gateway(_))) {
            return banned.map(|banned_at| Admission::Quarantined { banned_at });
        }

        // muted but unrecorded still needs the unlock instructions
        self.welcome(member, group).await;
        banned.map(|banned_at| Admission::Quarantined { banned_at })
    }

    async fn welcome(&self, member: MemberId, group: GroupId) {
        if let Err(e) = self
            .ctx
            .notifier
            .send(group, Some(member), &self.config.messages.welcome)
            .await
        {
            warn!(member = %member, group = %group, "failed to send welcome: {}", e);
        }
    }
}
