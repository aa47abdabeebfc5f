//! Mock Gateway for Testing
//!
//! Records every mute, removal and notice so tests can assert on platform
//! side effects without a real chat connection.

use super::traits::*;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Mock gateway implementing both `MuteGateway` and `NotificationSink`
#[derive(Clone, Default)]
pub struct MockGateway {
    state: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    mutes: Vec<MuteCall>,
    removals: Vec<(GroupId, MemberId)>,
    notices: Vec<SentNotice>,
    fail_mute: HashSet<(GroupId, MemberId)>,
    fail_remove: HashSet<(GroupId, MemberId)>,
    fail_notices: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MuteCall {
    pub group: GroupId,
    pub member: MemberId,
    pub duration: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentNotice {
    pub group: GroupId,
    pub mention: Option<MemberId>,
    pub text: String,
}

impl MockGateway {
    /// Create new mock gateway
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every mute/unmute of `member` in `group` fail
    pub fn fail_mute_for(&self, group: GroupId, member: MemberId) {
        self.state.lock().unwrap().fail_mute.insert((group, member));
    }

    /// Make removal of `member` from `group` fail
    pub fn fail_remove_for(&self, group: GroupId, member: MemberId) {
        self.state.lock().unwrap().fail_remove.insert((group, member));
    }

    /// Make every notice fail
    pub fn fail_notices(&self) {
        self.state.lock().unwrap().fail_notices = true;
    }

    /// Get mute calls for assertions
    pub fn mutes(&self) -> Vec<MuteCall> {
        self.state.lock().unwrap().mutes.clone()
    }

    /// Get successful removals for assertions
    pub fn removals(&self) -> Vec<(GroupId, MemberId)> {
        self.state.lock().unwrap().removals.clone()
    }

    /// Get delivered notices for assertions
    pub fn notices(&self) -> Vec<SentNotice> {
        self.state.lock().unwrap().notices.clone()
    }

    /// Get delivered notices for one group
    pub fn notices_in(&self, group: GroupId) -> Vec<SentNotice> {
        self.notices()
            .into_iter()
            .filter(|notice| notice.group == group)
            .collect()
    }
}

#[async_trait]
impl MuteGateway for MockGateway {
    async fn mute(
        &self,
        group: GroupId,
        member: MemberId,
        duration: Duration,
    ) -> GatewayResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_mute.contains(&(group, member)) {
            return Err(GatewayError::Network(format!(
                "mute {} in {} unreachable",
                member, group
            )));
        }
        state.mutes.push(MuteCall {
            group,
            member,
            duration,
        });
        Ok(())
    }

    async fn remove_member(&self, group: GroupId, member: MemberId) -> GatewayResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_remove.contains(&(group, member)) {
            return Err(GatewayError::Api {
                retcode: 102,
                message: format!("cannot kick {} from {}", member, group),
            });
        }
        state.removals.push((group, member));
        Ok(())
    }
}

#[async_trait]
impl NotificationSink for MockGateway {
    async fn send(
        &self,
        group: GroupId,
        mention: Option<MemberId>,
        text: &str,
    ) -> GatewayResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_notices {
            return Err(GatewayError::Network("send_group_msg timed out".to_string()));
        }
        state.notices.push(SentNotice {
            group,
            mention,
            text: text.to_string(),
        });
        Ok(())
    }
}
