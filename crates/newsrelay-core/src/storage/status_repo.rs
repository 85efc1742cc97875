use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use super::Database;
use crate::pipeline::{RunKind, RunOutcome, RunStatus};
use crate::Result;

/// Repository for append-only run status records
pub struct StatusRepository<'a> {
    db: &'a Database,
}

#[derive(FromRow)]
struct RunStatusRow {
    id: String,
    kind: String,
    completed_at: DateTime<Utc>,
    articles_posted: i64,
    outcome: String,
    message: Option<String>,
}

impl From<RunStatusRow> for RunStatus {
    fn from(row: RunStatusRow) -> Self {
        RunStatus {
            id: Uuid::parse_str(&row.id).unwrap_or_default(),
            kind: row.kind.parse().unwrap_or(RunKind::Ingestion),
            completed_at: row.completed_at,
            articles_posted: row.articles_posted.max(0) as u32,
            outcome: row.outcome.parse().unwrap_or(RunOutcome::Error),
            message: row.message,
        }
    }
}

impl<'a> StatusRepository<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Append a status record
    pub async fn append(&self, status: &RunStatus) -> Result<Uuid> {
        sqlx::query(
            r#"
            INSERT INTO run_status (id, kind, completed_at, articles_posted, outcome, message)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(status.id.to_string())
        .bind(status.kind.as_str())
        .bind(status.completed_at)
        .bind(status.articles_posted as i64)
        .bind(status.outcome.as_str())
        .bind(&status.message)
        .execute(self.db.pool())
        .await?;

        Ok(status.id)
    }

    /// Most recent record of the given kind
    pub async fn latest(&self, kind: RunKind) -> Result<Option<RunStatus>> {
        let row: Option<RunStatusRow> = sqlx::query_as(
            r#"
            SELECT id, kind, completed_at, articles_posted, outcome, message
            FROM run_status
            WHERE kind = ?
            ORDER BY completed_at DESC
            LIMIT 1
            "#,
        )
        .bind(kind.as_str())
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.map(RunStatus::from))
    }

    /// Most recent records of any kind, newest first
    pub async fn list_recent(&self, limit: u32) -> Result<Vec<RunStatus>> {
        let rows: Vec<RunStatusRow> = sqlx::query_as(
            r#"
            SELECT id, kind, completed_at, articles_posted, outcome, message
            FROM run_status
            ORDER BY completed_at DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.into_iter().map(RunStatus::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn test_latest_is_per_kind() {
        let db = Database::new_in_memory().await.unwrap();
        let repo = StatusRepository::new(&db);
        let base = Utc::now();

        let mut older = RunStatus::new(RunKind::Ingestion, RunOutcome::Success, 3, None);
        older.completed_at = base - Duration::minutes(60);
        let mut newer = RunStatus::new(
            RunKind::Ingestion,
            RunOutcome::Error,
            0,
            Some("failed to post any articles".to_string()),
        );
        newer.completed_at = base - Duration::minutes(5);
        let mut cleanup = RunStatus::new(RunKind::Cleanup, RunOutcome::Success, 0, None);
        cleanup.completed_at = base;

        repo.append(&older).await.unwrap();
        repo.append(&newer).await.unwrap();
        repo.append(&cleanup).await.unwrap();

        let latest = repo.latest(RunKind::Ingestion).await.unwrap().unwrap();
        assert_eq!(latest.id, newer.id);
        assert_eq!(latest.outcome, RunOutcome::Error);
        assert_eq!(latest.message.as_deref(), Some("failed to post any articles"));

        let latest_cleanup = repo.latest(RunKind::Cleanup).await.unwrap().unwrap();
        assert_eq!(latest_cleanup.id, cleanup.id);

        let all = repo.list_recent(10).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].kind, RunKind::Cleanup);
    }

    #[tokio::test]
    async fn test_latest_on_empty_store() {
        let db = Database::new_in_memory().await.unwrap();
        let repo = StatusRepository::new(&db);
        assert!(repo.latest(RunKind::Ingestion).await.unwrap().is_none());
    }
}
