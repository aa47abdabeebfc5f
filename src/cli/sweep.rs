use super::{logging, resolve_config_path};
use quarantine::config::QuarantineConfig;
use quarantine::gatekeeper::{CleanupSweeper, SweepOutcome};
use quarantine::gateway::OneBotGateway;
use quarantine::store::SqliteRecordStore;
use std::sync::Arc;

/// One-shot cleanup sweep from the command line.
///
/// Same selection as `/verify clean`. With `yes`, waits for the background
/// removals to finish and prints a summary.
pub async fn execute(
    config_path: Option<String>,
    yes: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = QuarantineConfig::load(&resolve_config_path(config_path))?;
    logging::init(&config.logging)?;

    let store = Arc::new(SqliteRecordStore::open(&config.storage.database).await?);
    let gateway = Arc::new(OneBotGateway::new(
        config.onebot.api_url.clone(),
        config.onebot.access_token.clone(),
    )?);
    let sweeper = CleanupSweeper::new(
        store.clone(),
        gateway,
        config.verify.wait_duration,
        config.verify.sweep_pacing,
    );

    let outcome = sweeper.sweep(yes).await?;
    println!("{}", outcome.message());

    if let SweepOutcome::Started { handle, .. } = outcome {
        let summary = handle.await?;
        println!(
            "Removed {} member(s), {} failed.",
            summary.removed.len(),
            summary.failed.len()
        );
        for (group, member, error) in &summary.failed {
            println!("  group {}  member {}: {}", group, member, error);
        }
    }

    store.close().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarantine::gateway::{GroupId, MemberId};
    use quarantine::store::{RecordFilter, RecordStore};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_dry_run_leaves_records_alone() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        let database = temp_dir.path().join("quarantine.db");
        QuarantineConfig::create_default(&config_path, &database).unwrap();

        let store = SqliteRecordStore::open(&database).await.unwrap();
        store.upsert(MemberId(20001), GroupId(10), 1).await.unwrap();
        store.close().await;

        execute(Some(config_path.to_string_lossy().to_string()), false)
            .await
            .unwrap();

        let store = SqliteRecordStore::open(&database).await.unwrap();
        let quarantined = store.query(&RecordFilter::quarantined()).await.unwrap();
        assert_eq!(quarantined.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_config_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("absent.toml");

        let result = execute(Some(config_path.to_string_lossy().to_string()), false).await;

        assert!(result.is_err());
        assert!(!config_path.exists());
    }
}
