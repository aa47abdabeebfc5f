//! Operator ban/unban commands
//!
//! Authority check plus acknowledgment text around the shared transitions.

use super::{transitions, VerifyContext, VerifyError, VerifyResult};
use crate::config::QuarantineConfig;
use crate::gateway::{GroupId, MemberId};
use std::sync::Arc;
use tracing::{info, warn};

pub struct OverrideCommands {
    ctx: VerifyContext,
    config: Arc<QuarantineConfig>,
}

impl OverrideCommands {
    pub fn new(ctx: VerifyContext, config: Arc<QuarantineConfig>) -> Self {
        Self { ctx, config }
    }

    /// Reject anyone outside the configured operator list.
    pub fn authorize(&self, operator: MemberId) -> VerifyResult<()> {
        if self.config.is_operator(operator) {
            Ok(())
        } else {
            Err(VerifyError::Unauthorized(operator))
        }
    }

    /// Quarantine `member` in `group` and remind them of the rules.
    pub async fn ban(
        &self,
        operator: MemberId,
        member: MemberId,
        group: GroupId,
    ) -> VerifyResult<String> {
        self.authorize(operator)?;
        info!(operator = %operator, member = %member, group = %group, "manual ban");

        let duration = self.config.verify.ban_duration;
        transitions::ban(
            self.ctx.store.as_ref(),
            self.ctx.gateway.as_ref(),
            member,
            group,
            duration,
        )
        .await?;

        if let Err(e) = self
            .ctx
            .notifier
            .send(group, Some(member), &self.config.messages.ban)
            .await
        {
            warn!(member = %member, group = %group, "failed to send rule reminder: {}", e);
        }

        Ok(format!(
            "Muted {} for {}.",
            member,
            humantime::format_duration(duration)
        ))
    }

    /// Lift quarantine on `member` in `group`.
    pub async fn unban(
        &self,
        operator: MemberId,
        member: MemberId,
        group: GroupId,
    ) -> VerifyResult<String> {
        self.authorize(operator)?;
        info!(operator = %operator, member = %member, group = %group, "manual unban");

        transitions::unban(self.ctx.store.as_ref(), self.ctx.gateway.as_ref(), member, group)
            .await?;

        Ok(format!("Unmuted {}.", member))
    }
}
