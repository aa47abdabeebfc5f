//! Ban / Unban transitions
//!
//! The only two ways a record changes state. Both touch the platform first
//! and the store second:
//! - Ban: a failed mute writes nothing; a failed write after a successful
//!   mute is logged as a mismatch and returned, never auto-corrected.
//! - Unban: the clear state is written even if the unmute call fails, so a
//!   member who unlocked is never swept.

use super::VerifyResult;
use crate::gateway::{GroupId, MemberId, MuteGateway};
use crate::store::{now_millis, RecordStore, NOT_BANNED};
use std::time::Duration;
use tracing::{error, info, warn};

/// Mute `member` in `group` for `duration` and record the quarantine start.
///
/// Returns the recorded `banned_at`. Calling it again resets the clock.
pub async fn ban(
    store: &dyn RecordStore,
    gateway: &dyn MuteGateway,
    member: MemberId,
    group: GroupId,
    duration: Duration,
) -> VerifyResult<u64> {
    gateway.mute(group, member, duration).await?;

    // 0 is reserved for "not quarantined"
    let banned_at = now_millis().max(1);
    if let Err(e) = store.upsert(member, group, banned_at).await {
        error!(
            member = %member,
            group = %group,
            "member muted but quarantine record not written: {}",
            e
        );
        return Err(e.into());
    }

    info!(member = %member, group = %group, "member quarantined");
    Ok(banned_at)
}

/// Lift any mute on `member` in `group` and clear the record.
pub async fn unban(
    store: &dyn RecordStore,
    gateway: &dyn MuteGateway,
    member: MemberId,
    group: GroupId,
) -> VerifyResult<()> {
    let unmuted = gateway.unmute(group, member).await;

    store.upsert(member, group, NOT_BANNED).await?;

    if let Err(e) = unmuted {
        warn!(
            member = %member,
            group = %group,
            "record cleared but unmute failed: {}",
            e
        );
        return Err(e.into());
    }

    info!(member = %member, group = %group, "member unlocked");
    Ok(())
}
