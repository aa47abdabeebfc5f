//! Verification Record Store
//!
//! One record per (member, group) pair holding the instant quarantine began.
//! `banned_at == 0` is the sentinel for "not quarantined"; any positive value
//! is the quarantine start in milliseconds since the Unix epoch.
//!
//! All mutation goes through `RecordStore::upsert`, which is atomic per key.
//! Callers never cache records across operations.

use crate::gateway::{GroupId, MemberId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

pub mod memory;
pub mod sqlite;

pub use memory::MemoryRecordStore;
pub use sqlite::SqliteRecordStore;

/// `banned_at` value of a record that is not quarantined.
pub const NOT_BANNED: u64 = 0;

/// Persisted verification record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationRecord {
    /// Surrogate key, assigned on first insert and never changed.
    pub id: i64,
    pub member: MemberId,
    pub group: GroupId,
    /// Quarantine start (ms since epoch) or `NOT_BANNED`.
    pub banned_at: u64,
}

/// Tagged view of `banned_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BanState {
    Clear,
    Quarantined { since_ms: u64 },
}

impl BanState {
    pub fn from_banned_at(banned_at: u64) -> Self {
        if banned_at == NOT_BANNED {
            BanState::Clear
        } else {
            BanState::Quarantined {
                since_ms: banned_at,
            }
        }
    }

    pub fn banned_at(&self) -> u64 {
        match self {
            BanState::Clear => NOT_BANNED,
            BanState::Quarantined { since_ms } => *since_ms,
        }
    }
}

impl VerificationRecord {
    pub fn state(&self) -> BanState {
        BanState::from_banned_at(self.banned_at)
    }

    pub fn is_quarantined(&self) -> bool {
        self.banned_at != NOT_BANNED
    }
}

/// Comparison applied to `banned_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BannedAtCmp {
    Eq(u64),
    Ne(u64),
    Lt(u64),
    Gt(u64),
}

impl BannedAtCmp {
    pub fn matches(&self, banned_at: u64) -> bool {
        match *self {
            BannedAtCmp::Eq(v) => banned_at == v,
            BannedAtCmp::Ne(v) => banned_at != v,
            BannedAtCmp::Lt(v) => banned_at < v,
            BannedAtCmp::Gt(v) => banned_at > v,
        }
    }
}

/// Conjunctive predicate over member, group and `banned_at`.
///
/// An empty filter matches every record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    pub member: Option<MemberId>,
    pub group: Option<GroupId>,
    pub banned_at: Vec<BannedAtCmp>,
}

impl RecordFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn member(mut self, member: MemberId) -> Self {
        self.member = Some(member);
        self
    }

    pub fn group(mut self, group: GroupId) -> Self {
        self.group = Some(group);
        self
    }

    pub fn banned_at(mut self, cmp: BannedAtCmp) -> Self {
        self.banned_at.push(cmp);
        self
    }

    /// Records currently quarantined.
    pub fn quarantined() -> Self {
        Self::new().banned_at(BannedAtCmp::Ne(NOT_BANNED))
    }

    /// Records quarantined strictly before `cutoff_ms`.
    pub fn quarantined_before(cutoff_ms: u64) -> Self {
        Self::quarantined().banned_at(BannedAtCmp::Lt(cutoff_ms))
    }

    pub fn matches(&self, record: &VerificationRecord) -> bool {
        self.member.map_or(true, |m| m == record.member)
            && self.group.map_or(true, |g| g == record.group)
            && self.banned_at.iter().all(|cmp| cmp.matches(record.banned_at))
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Value out of storable range: {0}")]
    OutOfRange(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

/// Record store contract.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert or update the record for (member, group).
    ///
    /// An existing pair is the expected path and keeps its `id`.
    async fn upsert(&self, member: MemberId, group: GroupId, banned_at: u64) -> StoreResult<()>;

    /// Snapshot of every record matching `filter`, ordered by `id`.
    async fn query(&self, filter: &RecordFilter) -> StoreResult<Vec<VerificationRecord>>;
}

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn record(member: u64, group: u64, banned_at: u64) -> VerificationRecord {
        VerificationRecord {
            id: 1,
            member: MemberId(member),
            group: GroupId(group),
            banned_at,
        }
    }

    #[test]
    fn test_sentinel_is_clear() {
        let r = record(20001, 10, NOT_BANNED);
        assert_eq!(r.state(), BanState::Clear);
        assert!(!r.is_quarantined());
    }

    #[test]
    fn test_quarantined_before_excludes_clear_records() {
        let filter = RecordFilter::quarantined_before(1_000);

        assert!(filter.matches(&record(20001, 10, 500)));
        assert!(!filter.matches(&record(20001, 10, 1_000)));
        assert!(!filter.matches(&record(20001, 10, NOT_BANNED)));
    }

    #[test]
    fn test_member_and_group_filters() {
        let filter = RecordFilter::quarantined().member(MemberId(20001));

        assert!(filter.matches(&record(20001, 10, 42)));
        assert!(!filter.matches(&record(20002, 10, 42)));

        let filter = RecordFilter::new().group(GroupId(10));
        assert!(filter.matches(&record(20002, 10, NOT_BANNED)));
        assert!(!filter.matches(&record(20002, 11, NOT_BANNED)));
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        assert!(RecordFilter::new().matches(&record(1, 2, 3)));
        assert!(RecordFilter::new().matches(&record(1, 2, NOT_BANNED)));
    }

    proptest! {
        #[test]
        fn prop_ban_state_round_trips(banned_at in any::<u64>()) {
            let state = BanState::from_banned_at(banned_at);
            prop_assert_eq!(state.banned_at(), banned_at);
            prop_assert_eq!(state == BanState::Clear, banned_at == NOT_BANNED);
        }

        #[test]
        fn prop_quarantined_filter_agrees_with_record(banned_at in any::<u64>()) {
            let r = record(20001, 10, banned_at);
            prop_assert_eq!(RecordFilter::quarantined().matches(&r), r.is_quarantined());
        }

        #[test]
        fn prop_sweep_cutoff_selects_only_older(banned_at in 1u64..10_000, cutoff in 0u64..10_000) {
            let r = record(20001, 10, banned_at);
            prop_assert_eq!(RecordFilter::quarantined_before(cutoff).matches(&r), banned_at < cutoff);
        }
    }
}
