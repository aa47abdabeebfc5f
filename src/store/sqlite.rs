//! SQLite record store (sqlx)
//!
//! Table layout:
//!
//! ```sql
//! verify(id INTEGER PRIMARY KEY AUTOINCREMENT,
//!        member INTEGER NOT NULL,
//!        group_id INTEGER NOT NULL,
//!        banned_at INTEGER NOT NULL DEFAULT 0,
//!        UNIQUE(member, group_id))
//! ```
//!
//! Upsert relies on `ON CONFLICT(member, group_id) DO UPDATE`, so per-key
//! atomicity comes from SQLite itself.

use super::*;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::path::Path;
use std::str::FromStr;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS verify (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    member INTEGER NOT NULL,
    group_id INTEGER NOT NULL,
    banned_at INTEGER NOT NULL DEFAULT 0,
    UNIQUE (member, group_id)
)
"#;

const BANNED_AT_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS verify_banned_at ON verify (banned_at)";

#[derive(Debug, Clone)]
pub struct SqliteRecordStore {
    pool: SqlitePool,
}

#[derive(Debug, sqlx::FromRow)]
struct RecordRow {
    id: i64,
    member: i64,
    group_id: i64,
    banned_at: i64,
}

impl TryFrom<RecordRow> for VerificationRecord {
    type Error = StoreError;

    fn try_from(row: RecordRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            member: MemberId(from_sql(row.member)?),
            group: GroupId(from_sql(row.group_id)?),
            banned_at: from_sql(row.banned_at)?,
        })
    }
}

fn to_sql(value: u64) -> StoreResult<i64> {
    i64::try_from(value).map_err(|_| StoreError::OutOfRange(value.to_string()))
}

fn from_sql(value: i64) -> StoreResult<u64> {
    u64::try_from(value).map_err(|_| StoreError::OutOfRange(value.to_string()))
}

impl SqliteRecordStore {
    /// Open (or create) the database file at `path` and ensure the schema.
    pub async fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Database(format!(
                        "Failed to create database directory '{}': {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        Self::from_pool(pool).await
    }

    /// Private in-memory database.
    ///
    /// Every SQLite memory connection is its own database, so the pool is
    /// pinned to a single connection that never expires.
    pub async fn in_memory() -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Self::from_pool(pool).await
    }

    /// Wrap an existing pool and ensure the schema.
    pub async fn from_pool(pool: SqlitePool) -> StoreResult<Self> {
        sqlx::query(SCHEMA).execute(&pool).await?;
        sqlx::query(BANNED_AT_INDEX).execute(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn upsert(&self, member: MemberId, group: GroupId, banned_at: u64) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO verify (member, group_id, banned_at)
            VALUES (?, ?, ?)
            ON CONFLICT (member, group_id) DO UPDATE SET banned_at = excluded.banned_at
            "#,
        )
        .bind(to_sql(member.0)?)
        .bind(to_sql(group.0)?)
        .bind(to_sql(banned_at)?)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn query(&self, filter: &RecordFilter) -> StoreResult<Vec<VerificationRecord>> {
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT id, member, group_id, banned_at FROM verify WHERE 1 = 1");

        if let Some(member) = filter.member {
            builder.push(" AND member = ").push_bind(to_sql(member.0)?);
        }
        if let Some(group) = filter.group {
            builder.push(" AND group_id = ").push_bind(to_sql(group.0)?);
        }
        for cmp in &filter.banned_at {
            let (op, value) = match *cmp {
                BannedAtCmp::Eq(v) => ("=", v),
                BannedAtCmp::Ne(v) => ("<>", v),
                BannedAtCmp::Lt(v) => ("<", v),
                BannedAtCmp::Gt(v) => (">", v),
            };
            builder
                .push(format!(" AND banned_at {} ", op))
                .push_bind(to_sql(value)?);
        }
        builder.push(" ORDER BY id");

        let rows: Vec<RecordRow> = builder.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter().map(VerificationRecord::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_upsert_keeps_single_row_and_id() {
        let store = SqliteRecordStore::in_memory().await.unwrap();

        store.upsert(MemberId(20001), GroupId(10), 1_000).await.unwrap();
        store.upsert(MemberId(20002), GroupId(10), 2_000).await.unwrap();
        store.upsert(MemberId(20001), GroupId(10), NOT_BANNED).await.unwrap();

        let all = store.query(&RecordFilter::new()).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, 1);
        assert_eq!(all[0].member, MemberId(20001));
        assert_eq!(all[0].banned_at, NOT_BANNED);
        assert_eq!(all[1].banned_at, 2_000);
    }

    #[tokio::test]
    async fn test_query_combines_predicates() {
        let store = SqliteRecordStore::in_memory().await.unwrap();
        store.upsert(MemberId(20001), GroupId(10), 500).await.unwrap();
        store.upsert(MemberId(20001), GroupId(20), 5_000).await.unwrap();
        store.upsert(MemberId(20001), GroupId(30), NOT_BANNED).await.unwrap();
        store.upsert(MemberId(20002), GroupId(10), 500).await.unwrap();

        let mine = store
            .query(&RecordFilter::quarantined().member(MemberId(20001)))
            .await
            .unwrap();
        let groups: Vec<GroupId> = mine.iter().map(|r| r.group).collect();
        assert_eq!(groups, vec![GroupId(10), GroupId(20)]);

        let overdue = store
            .query(&RecordFilter::quarantined_before(1_000))
            .await
            .unwrap();
        assert_eq!(overdue.len(), 2);
        assert!(overdue.iter().all(|r| r.banned_at == 500));

        let in_group = store
            .query(&RecordFilter::new().group(GroupId(30)))
            .await
            .unwrap();
        assert_eq!(in_group.len(), 1);
        assert!(!in_group[0].is_quarantined());
    }

    #[tokio::test]
    async fn test_records_survive_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("data").join("quarantine.db");

        let store = SqliteRecordStore::open(&path).await.unwrap();
        store.upsert(MemberId(20001), GroupId(10), 1_234).await.unwrap();
        store.close().await;

        let reopened = SqliteRecordStore::open(&path).await.unwrap();
        let all = reopened.query(&RecordFilter::new()).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].banned_at, 1_234);
    }

    #[tokio::test]
    async fn test_out_of_range_identity_rejected() {
        let store = SqliteRecordStore::in_memory().await.unwrap();

        let result = store.upsert(MemberId(u64::MAX), GroupId(10), 1).await;
        assert!(matches!(result, Err(StoreError::OutOfRange(_))));
    }
}
