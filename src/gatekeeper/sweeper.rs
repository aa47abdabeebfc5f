//! Cleanup Sweeper
//!
//! Finds members still quarantined after the grace period and removes them.
//!
//! - Dry run: report the overdue (group, member) pairs, touch nothing
//! - Confirmed: acknowledge immediately, then remove in a detached task
//!
//! Removals are strictly sequential with a pacing delay before each one
//! (platform action rate limits). A failure on one member is logged and the
//! sweep moves on; each selected record is attempted exactly once.

use super::{VerifyError, VerifyResult};
use crate::gateway::{GroupId, MemberId, MuteGateway};
use crate::store::{
    now_millis, RecordFilter, RecordStore, StoreResult, VerificationRecord, NOT_BANNED,
};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Overdue members selected by a sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub wait: Duration,
    pub entries: Vec<(GroupId, MemberId)>,
}

impl SweepReport {
    pub fn count(&self) -> usize {
        self.entries.len()
    }
}

impl fmt::Display for SweepReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} member(s) have not unlocked within {}:",
            self.count(),
            humantime::format_duration(self.wait)
        )?;
        for (group, member) in &self.entries {
            writeln!(f, "  group {}  member {}", group, member)?;
        }
        write!(f, "Use '/verify clean -y' to remove these members.")
    }
}

/// Result of a completed background sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepSummary {
    pub removed: Vec<(GroupId, MemberId)>,
    pub failed: Vec<(GroupId, MemberId, String)>,
}

/// What a sweep request did.
#[derive(Debug)]
pub enum SweepOutcome {
    NothingToClean { wait: Duration },
    DryRun(SweepReport),
    Started {
        count: usize,
        handle: JoinHandle<SweepSummary>,
    },
}

impl SweepOutcome {
    /// Status line for the operator.
    pub fn message(&self) -> String {
        match self {
            SweepOutcome::NothingToClean { wait } => format!(
                "No members have stayed quarantined longer than {}.",
                humantime::format_duration(*wait)
            ),
            SweepOutcome::DryRun(report) => report.to_string(),
            SweepOutcome::Started { count, .. } => {
                format!("Started removing {} member(s).", count)
            }
        }
    }
}

pub struct CleanupSweeper {
    store: Arc<dyn RecordStore>,
    gateway: Arc<dyn MuteGateway>,
    wait: Duration,
    pacing: Duration,
}

impl CleanupSweeper {
    pub fn new(
        store: Arc<dyn RecordStore>,
        gateway: Arc<dyn MuteGateway>,
        wait: Duration,
        pacing: Duration,
    ) -> Self {
        Self {
            store,
            gateway,
            wait,
            pacing,
        }
    }

    /// Records quarantined before `now_ms - wait`.
    pub async fn select_overdue(&self, now_ms: u64) -> StoreResult<Vec<VerificationRecord>> {
        let wait_ms = u64::try_from(self.wait.as_millis()).unwrap_or(u64::MAX);
        let cutoff = now_ms.saturating_sub(wait_ms);
        self.store
            .query(&RecordFilter::quarantined_before(cutoff))
            .await
    }

    pub async fn sweep(&self, confirm: bool) -> VerifyResult<SweepOutcome> {
        self.sweep_at(confirm, now_millis()).await
    }

    /// Sweep as of `now_ms`.
    ///
    /// A failed selection is returned; everything after a confirmed start is
    /// only logged.
    pub async fn sweep_at(&self, confirm: bool, now_ms: u64) -> VerifyResult<SweepOutcome> {
        let selected = self
            .select_overdue(now_ms)
            .await
            .map_err(VerifyError::from)?;

        if selected.is_empty() {
            return Ok(SweepOutcome::NothingToClean { wait: self.wait });
        }

        if !confirm {
            return Ok(SweepOutcome::DryRun(SweepReport {
                wait: self.wait,
                entries: selected.iter().map(|r| (r.group, r.member)).collect(),
            }));
        }

        let count = selected.len();
        info!(count, "starting sweep");
        let handle = tokio::spawn(run_removals(
            self.store.clone(),
            self.gateway.clone(),
            self.pacing,
            selected,
        ));

        Ok(SweepOutcome::Started { count, handle })
    }
}

async fn run_removals(
    store: Arc<dyn RecordStore>,
    gateway: Arc<dyn MuteGateway>,
    pacing: Duration,
    selected: Vec<VerificationRecord>,
) -> SweepSummary {
    let mut summary = SweepSummary::default();

    for record in selected {
        tokio::time::sleep(pacing).await;

        info!(member = %record.member, group = %record.group, "kick");
        match remove_one(store.as_ref(), gateway.as_ref(), &record).await {
            Ok(()) => summary.removed.push((record.group, record.member)),
            Err(e) => {
                warn!(member = %record.member, group = %record.group, "kick failed: {}", e);
                summary
                    .failed
                    .push((record.group, record.member, e.to_string()));
            }
        }
    }

    info!(
        removed = summary.removed.len(),
        failed = summary.failed.len(),
        "sweep finished"
    );
    summary
}

/// Clear the record, then remove the member from the group.
async fn remove_one(
    store: &dyn RecordStore,
    gateway: &dyn MuteGateway,
    record: &VerificationRecord,
) -> VerifyResult<()> {
    store
        .upsert(record.member, record.group, NOT_BANNED)
        .await?;
    gateway.remove_member(record.group, record.member).await?;
    Ok(())
}
