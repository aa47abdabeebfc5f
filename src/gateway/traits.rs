//! Platform Gateway Trait Abstractions
//!
//! The verification core never talks to the chat platform directly. It mutes,
//! kicks and notifies through these two traits so tests can swap in
//! `MockGateway` and production can use `OneBotGateway`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Platform-scoped numeric identity of a member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberId(pub u64);

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Numeric identity of a group (community/channel).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(pub u64);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result type for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Gateway errors
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Platform API error (retcode {retcode}): {message}")]
    Api { retcode: i64, message: String },

    #[error("Request rejected: {0}")]
    Rejected(String),
}

/// Mute/kick operations against the chat platform.
///
/// Every call reports its outcome so the caller can log failures, but the
/// core never retries on its own.
#[async_trait]
pub trait MuteGateway: Send + Sync {
    /// Mute `member` in `group` for `duration`. A zero duration lifts any mute.
    async fn mute(&self, group: GroupId, member: MemberId, duration: Duration)
        -> GatewayResult<()>;

    /// Lift any mute on `member` in `group`.
    async fn unmute(&self, group: GroupId, member: MemberId) -> GatewayResult<()> {
        self.mute(group, member, Duration::ZERO).await
    }

    /// Remove `member` from `group`.
    async fn remove_member(&self, group: GroupId, member: MemberId) -> GatewayResult<()>;
}

/// Outbound group messages.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Send `text` to `group`, optionally mentioning one member.
    ///
    /// Delivery is best-effort; text is an opaque configured template.
    async fn send(&self, group: GroupId, mention: Option<MemberId>, text: &str)
        -> GatewayResult<()>;
}
