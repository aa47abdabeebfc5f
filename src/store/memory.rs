//! In-memory record store
//!
//! Same upsert/query semantics as the SQLite store, without persistence.
//! Used by tests and ephemeral deployments.

use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Default)]
pub struct MemoryRecordStore {
    state: Arc<Mutex<MemoryState>>,
    queries: Arc<AtomicUsize>,
}

#[derive(Debug, Default)]
struct MemoryState {
    records: Vec<VerificationRecord>,
    next_id: i64,
    fail_writes: bool,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `query` calls served so far.
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    /// Make every subsequent upsert fail.
    pub fn fail_writes(&self, fail: bool) {
        self.state.lock().unwrap().fail_writes = fail;
    }

    /// Current record for a pair, read without counting as a query.
    pub fn get(&self, member: MemberId, group: GroupId) -> Option<VerificationRecord> {
        self.state
            .lock()
            .unwrap()
            .records
            .iter()
            .find(|r| r.member == member && r.group == group)
            .cloned()
    }

    /// All records, read without counting as a query.
    pub fn all(&self) -> Vec<VerificationRecord> {
        self.state.lock().unwrap().records.clone()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn upsert(&self, member: MemberId, group: GroupId, banned_at: u64) -> StoreResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_writes {
            return Err(StoreError::Database("database is locked".to_string()));
        }

        if let Some(existing) = state
            .records
            .iter_mut()
            .find(|r| r.member == member && r.group == group)
        {
            existing.banned_at = banned_at;
            return Ok(());
        }

        state.next_id += 1;
        let id = state.next_id;
        state.records.push(VerificationRecord {
            id,
            member,
            group,
            banned_at,
        });
        Ok(())
    }

    async fn query(&self, filter: &RecordFilter) -> StoreResult<Vec<VerificationRecord>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().unwrap();
        Ok(state
            .records
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect())
    }
}
