use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::time::Duration;

use crate::config::AppConfig;
use crate::Result;

/// Database connection pool wrapper
#[derive(Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Open the configured database and run migrations
    pub async fn new(config: &AppConfig) -> Result<Self> {
        Self::open(&config.database_path()).await
    }

    /// Open (or create) a database file and run migrations
    pub async fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        tracing::info!("Connecting to database: {}", db_path.display());

        // PRAGMAs are set per connection so every pooled connection shares them
        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(10));

        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.run_migrations().await?;

        Ok(db)
    }

    /// Create an in-memory database for testing
    #[cfg(test)]
    pub async fn new_in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let db = Self { pool };
        db.run_migrations().await?;

        Ok(db)
    }

    /// Run database migrations
    async fn run_migrations(&self) -> Result<()> {
        tracing::debug!("Running database migrations...");

        sqlx::query(MIGRATION_001_NEWS_ITEMS)
            .execute(&self.pool)
            .await?;

        sqlx::query(MIGRATION_002_RUN_STATUS)
            .execute(&self.pool)
            .await?;

        sqlx::query(MIGRATION_003_SCHEDULED_TASKS)
            .execute(&self.pool)
            .await?;

        sqlx::query(MIGRATION_INDEXES)
            .execute(&self.pool)
            .await?;

        tracing::debug!("Database migrations completed");
        Ok(())
    }

    /// Get the connection pool
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

const MIGRATION_001_NEWS_ITEMS: &str = r#"
CREATE TABLE IF NOT EXISTS news_items (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    link TEXT NOT NULL,
    source TEXT NOT NULL,
    image_url TEXT,
    description TEXT,
    posted_at DATETIME NOT NULL,
    is_posted INTEGER NOT NULL DEFAULT 0,
    UNIQUE(title, source)
)
"#;

const MIGRATION_002_RUN_STATUS: &str = r#"
CREATE TABLE IF NOT EXISTS run_status (
    id TEXT PRIMARY KEY,
    kind TEXT NOT NULL,
    completed_at DATETIME NOT NULL,
    articles_posted INTEGER NOT NULL DEFAULT 0,
    outcome TEXT NOT NULL,
    message TEXT
)
"#;

const MIGRATION_003_SCHEDULED_TASKS: &str = r#"
CREATE TABLE IF NOT EXISTS scheduled_tasks (
    name TEXT PRIMARY KEY,
    target TEXT NOT NULL,
    hour INTEGER NOT NULL,
    minute INTEGER NOT NULL,
    enabled INTEGER NOT NULL DEFAULT 1,
    last_run DATETIME
)
"#;

const MIGRATION_INDEXES: &str = r#"
CREATE INDEX IF NOT EXISTS idx_news_items_posted_at ON news_items(posted_at);
CREATE INDEX IF NOT EXISTS idx_news_items_is_posted ON news_items(is_posted);
CREATE INDEX IF NOT EXISTS idx_run_status_completed_at ON run_status(completed_at DESC);
CREATE INDEX IF NOT EXISTS idx_scheduled_tasks_enabled ON scheduled_tasks(enabled)
"#;
