//! Self-Unlock Service
//!
//! A member who has read the rules opens the unlock link (HTTP) or another
//! component raises the unlock signal (event). Both paths call
//! `request_unlock`, which validates the claimed id and lifts quarantine in
//! every group where the member is still quarantined.
//!
//! Rejections are logged only; the requester never learns whether an id was
//! valid or quarantined anywhere.

use super::{transitions, VerifyContext, VerifyError, VerifyResult};
use crate::config::QuarantineConfig;
use crate::gateway::{GroupId, MemberId};
use crate::store::{RecordFilter, StoreResult};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

/// Where an unlock request came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlockSource {
    Http,
    Event,
}

impl fmt::Display for UnlockSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnlockSource::Http => write!(f, "http"),
            UnlockSource::Event => write!(f, "event"),
        }
    }
}

/// Per-group outcome of one unlock request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnlockReport {
    pub unlocked: Vec<GroupId>,
    pub failed: Vec<(GroupId, String)>,
}

impl UnlockReport {
    pub fn is_empty(&self) -> bool {
        self.unlocked.is_empty() && self.failed.is_empty()
    }
}

/// Parse the raw identifier carried by an HTTP request.
pub fn parse_claimed_id(raw: &str) -> VerifyResult<i64> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| VerifyError::InvalidInput(format!("'{}' is not a member id", raw)))
}

/// Accept only ids strictly above `min_member_id`.
pub fn validate_claimed_id(claimed: i64, min_member_id: u64) -> VerifyResult<MemberId> {
    match u64::try_from(claimed) {
        Ok(id) if id > min_member_id => Ok(MemberId(id)),
        _ => Err(VerifyError::InvalidInput(format!(
            "{} is not a plausible member id",
            claimed
        ))),
    }
}

pub struct SelfUnlockService {
    ctx: VerifyContext,
    config: Arc<QuarantineConfig>,
}

impl SelfUnlockService {
    pub fn new(ctx: VerifyContext, config: Arc<QuarantineConfig>) -> Self {
        Self { ctx, config }
    }

    fn path_enabled(&self, source: UnlockSource) -> bool {
        match source {
            UnlockSource::Http => self.config.verify.allow_http,
            UnlockSource::Event => self.config.verify.allow_event,
        }
    }

    /// Validate `claimed` and unlock it everywhere.
    ///
    /// Invalid ids and disabled paths are rejected before the store is read.
    pub async fn request_unlock(
        &self,
        source: UnlockSource,
        claimed: i64,
    ) -> VerifyResult<UnlockReport> {
        info!(source = %source, claimed, "self-unlock requested");

        if !self.path_enabled(source) {
            info!(source = %source, "self-unlock path disabled, ignoring");
            return Err(VerifyError::PathDisabled(source));
        }

        let member = match validate_claimed_id(claimed, self.config.verify.min_member_id) {
            Ok(member) => member,
            Err(e) => {
                info!(source = %source, "self-unlock rejected: {}", e);
                return Err(e);
            }
        };

        Ok(self.unlock(member).await?)
    }

    /// Unban `member` in every group where it is quarantined.
    ///
    /// Groups are independent: a failure in one is recorded and the rest are
    /// still attempted. Only the initial read can fail the whole call.
    pub async fn unlock(&self, member: MemberId) -> StoreResult<UnlockReport> {
        let records = self
            .ctx
            .store
            .query(&RecordFilter::quarantined().member(member))
            .await?;

        let mut report = UnlockReport::default();
        for record in records {
            let group = record.group;
            match transitions::unban(
                self.ctx.store.as_ref(),
                self.ctx.gateway.as_ref(),
                member,
                group,
            )
            .await
            {
                Ok(()) => {
                    if let Err(e) = self
                        .ctx
                        .notifier
                        .send(group, Some(member), &self.config.messages.unban)
                        .await
                    {
                        warn!(member = %member, group = %group, "failed to confirm unlock: {}", e);
                    }
                    report.unlocked.push(group);
                }
                Err(e) => {
                    warn!(member = %member, group = %group, "self-unlock failed: {}", e);
                    report.failed.push((group, e.to_string()));
                }
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::MockGateway;
    use crate::store::{MemoryRecordStore, RecordStore, NOT_BANNED};

    const MEMBER: MemberId = MemberId(123_456);

    fn service(config: QuarantineConfig) -> (SelfUnlockService, MemoryRecordStore, MockGateway) {
        let store = MemoryRecordStore::new();
        let gateway = MockGateway::new();
        let ctx = VerifyContext::new(
            Arc::new(store.clone()),
            Arc::new(gateway.clone()),
            Arc::new(gateway.clone()),
        );
        (
            SelfUnlockService::new(ctx, Arc::new(config)),
            store,
            gateway,
        )
    }

    #[test]
    fn test_validate_claimed_id() {
        assert_eq!(validate_claimed_id(10_001, 10_000).unwrap(), MemberId(10_001));
        assert!(validate_claimed_id(10_000, 10_000).is_err());
        assert!(validate_claimed_id(42, 10_000).is_err());
        assert!(validate_claimed_id(0, 10_000).is_err());
        assert!(validate_claimed_id(-123_456, 10_000).is_err());
    }

    #[test]
    fn test_parse_claimed_id() {
        assert_eq!(parse_claimed_id(" 123456 ").unwrap(), 123_456);
        assert_eq!(parse_claimed_id("-5").unwrap(), -5);
        assert!(parse_claimed_id("abc").is_err());
        assert!(parse_claimed_id("").is_err());
    }

    #[tokio::test]
    async fn test_unlocks_every_quarantined_group() {
        let (service, store, gateway) = service(QuarantineConfig::default());
        store.upsert(MEMBER, GroupId(10), 1_000).await.unwrap();
        store.upsert(MEMBER, GroupId(20), 2_000).await.unwrap();
        store.upsert(MEMBER, GroupId(40), NOT_BANNED).await.unwrap();

        let report = service
            .request_unlock(UnlockSource::Event, MEMBER.0 as i64)
            .await
            .unwrap();

        assert_eq!(report.unlocked, vec![GroupId(10), GroupId(20)]);
        assert!(report.failed.is_empty());
        assert!(store.all().iter().all(|r| !r.is_quarantined()));
        assert_eq!(gateway.notices_in(GroupId(10)).len(), 1);
        assert_eq!(gateway.notices_in(GroupId(20)).len(), 1);
        assert!(gateway.notices_in(GroupId(40)).is_empty());
    }

    #[tokio::test]
    async fn test_failure_in_one_group_does_not_stop_others() {
        let (service, store, gateway) = service(QuarantineConfig::default());
        store.upsert(MEMBER, GroupId(10), 1_000).await.unwrap();
        store.upsert(MEMBER, GroupId(20), 2_000).await.unwrap();
        store.upsert(MEMBER, GroupId(30), 3_000).await.unwrap();
        gateway.fail_mute_for(GroupId(20), MEMBER);

        let report = service.unlock(MEMBER).await.unwrap();

        assert_eq!(report.unlocked, vec![GroupId(10), GroupId(30)]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, GroupId(20));
        // no confirmation where the unmute failed
        assert!(gateway.notices_in(GroupId(20)).is_empty());
        assert_eq!(gateway.notices_in(GroupId(30)).len(), 1);
    }

    #[tokio::test]
    async fn test_nothing_quarantined_is_noop() {
        let (service, store, gateway) = service(QuarantineConfig::default());
        store.upsert(MEMBER, GroupId(40), NOT_BANNED).await.unwrap();

        let report = service
            .request_unlock(UnlockSource::Http, MEMBER.0 as i64)
            .await
            .unwrap();

        assert!(report.is_empty());
        assert!(gateway.mutes().is_empty());
        assert!(gateway.notices().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_id_touches_nothing() {
        let (service, store, gateway) = service(QuarantineConfig::default());

        for claimed in [-1, 0, 9_999, 10_000] {
            let result = service.request_unlock(UnlockSource::Http, claimed).await;
            assert!(matches!(result, Err(VerifyError::InvalidInput(_))));
        }

        assert_eq!(store.query_count(), 0);
        assert!(gateway.notices().is_empty());
    }

    #[tokio::test]
    async fn test_disabled_path_is_rejected() {
        let mut config = QuarantineConfig::default();
        config.verify.allow_event = false;
        let (service, store, _gateway) = service(config);
        store.upsert(MEMBER, GroupId(10), 1_000).await.unwrap();

        let result = service
            .request_unlock(UnlockSource::Event, MEMBER.0 as i64)
            .await;

        assert!(matches!(
            result,
            Err(VerifyError::PathDisabled(UnlockSource::Event))
        ));
        assert_eq!(store.query_count(), 0);
        assert!(store.get(MEMBER, GroupId(10)).unwrap().is_quarantined());
    }
}
