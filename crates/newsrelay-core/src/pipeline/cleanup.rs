use chrono::Duration;

use crate::storage::{Database, NewsRepository, StatusRepository};

use super::report::{CleanupReport, RunOutcome};

/// Purge items stored longer ago than `retention` and record a cleanup status
pub async fn run_cleanup(db: &Database, retention: Duration) -> CleanupReport {
    tracing::info!("Cleaning up items older than {} days", retention.num_days());

    let report = match NewsRepository::new(db).purge_older_than(retention).await {
        Ok(removed) => {
            tracing::info!("Cleaned up {} old items", removed);
            CleanupReport::new(RunOutcome::Success, removed, format!("removed {} items", removed))
        }
        Err(e) => {
            tracing::error!("Cleanup failed: {}", e);
            CleanupReport::new(RunOutcome::Error, 0, e.to_string())
        }
    };

    if let Err(e) = StatusRepository::new(db).append(&report.to_status()).await {
        tracing::error!("Failed to save cleanup status: {}", e);
    }

    report
}
