//! Gatekeeper module: quarantine state machine
//!
//! - Transitions: shared Ban/Unban primitives (mute + record)
//! - Admission: quarantine on join
//! - Overrides: operator ban/unban
//! - Unlock: member self-service unlock across every group
//! - Sweeper: paced removal of members past the grace period

pub mod admission;
pub mod overrides;
pub mod sweeper;
pub mod transitions;
pub mod unlock;

pub use admission::{Admission, AdmissionController};
pub use overrides::OverrideCommands;
pub use sweeper::{CleanupSweeper, SweepOutcome, SweepReport, SweepSummary};
pub use transitions::{ban, unban};
pub use unlock::{SelfUnlockService, UnlockReport, UnlockSource};

use crate::gateway::{GatewayError, MemberId, MuteGateway, NotificationSink};
use crate::store::{RecordStore, StoreError};
use std::sync::Arc;

/// Verification errors.
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Member {0} is not an operator")]
    Unauthorized(MemberId),

    #[error("Self-unlock via {0} is disabled")]
    PathDisabled(UnlockSource),

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Verification result type.
pub type VerifyResult<T> = Result<T, VerifyError>;

/// Collaborators injected into every gatekeeper component.
#[derive(Clone)]
pub struct VerifyContext {
    pub store: Arc<dyn RecordStore>,
    pub gateway: Arc<dyn MuteGateway>,
    pub notifier: Arc<dyn NotificationSink>,
}

impl VerifyContext {
    pub fn new(
        store: Arc<dyn RecordStore>,
        gateway: Arc<dyn MuteGateway>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            store,
            gateway,
            notifier,
        }
    }
}
