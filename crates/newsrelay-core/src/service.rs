use std::sync::Arc;

use chrono::Utc;

use crate::config::AppConfig;
use crate::delivery::{DeliveryClient, MessageSink, TelegramClient};
use crate::feed::{FeedClient, FeedSource, NewsItem};
use crate::pipeline::{run_cleanup, CleanupReport, IngestionPipeline, RunKind, RunReport, RunStatus};
use crate::scheduler::{DueTime, Scheduler};
use crate::storage::{Database, NewsRepository, PostingStats, StatusRepository};
use crate::Result;

/// Process-boundary entry point owning the store, pipeline and scheduler
pub struct NewsRelay {
    config: AppConfig,
    db: Database,
    pipeline: Arc<IngestionPipeline>,
    scheduler: Scheduler,
}

impl NewsRelay {
    /// Wire the production collaborators: SQLite store, RSS feed and Telegram sink
    pub async fn from_config(config: AppConfig) -> Result<Self> {
        let sink = TelegramClient::new(&config)?;
        let feed = FeedClient::new(&config)?;
        let db = Database::new(&config).await?;

        Ok(Self::new(config, db, Arc::new(feed), Arc::new(sink)))
    }

    /// Build with injected collaborators
    pub fn new(
        config: AppConfig,
        db: Database,
        feed: Arc<dyn FeedSource>,
        sink: Arc<dyn MessageSink>,
    ) -> Self {
        let delivery = DeliveryClient::from_config(sink, &config);
        let pipeline = Arc::new(IngestionPipeline::new(db.clone(), feed, delivery));
        let scheduler = Scheduler::new(db.clone(), Arc::clone(&pipeline), &config);

        Self {
            config,
            db,
            pipeline,
            scheduler,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Run the ingestion pipeline once, outside the schedule
    pub async fn run_ingestion_once(&self) -> Result<RunReport> {
        Ok(self.pipeline.run().await)
    }

    /// Run the cleanup routine once, outside the schedule
    pub async fn run_cleanup_once(&self) -> Result<CleanupReport> {
        Ok(run_cleanup(&self.db, self.retention()).await)
    }

    pub async fn start_scheduler(&self) -> Result<()> {
        self.scheduler.start().await
    }

    pub async fn stop_scheduler(&self) {
        self.scheduler.stop().await
    }

    pub fn is_running(&self) -> bool {
        self.scheduler.is_running()
    }

    pub async fn list_due_times(&self) -> Result<Vec<DueTime>> {
        self.scheduler.list_due_times().await
    }

    /// Most recent status record of the given kind
    pub async fn latest_status(&self, kind: RunKind) -> Result<Option<RunStatus>> {
        StatusRepository::new(&self.db).latest(kind).await
    }

    pub async fn recent_statuses(&self, limit: u32) -> Result<Vec<RunStatus>> {
        StatusRepository::new(&self.db).list_recent(limit).await
    }

    pub async fn statistics(&self) -> Result<PostingStats> {
        NewsRepository::new(&self.db).statistics(Utc::now()).await
    }

    pub async fn recent_articles(&self, limit: u32) -> Result<Vec<NewsItem>> {
        NewsRepository::new(&self.db).list_recent(limit).await
    }

    /// Items stored during the current UTC day
    pub async fn todays_articles(&self) -> Result<Vec<NewsItem>> {
        NewsRepository::new(&self.db)
            .list_for_day(Utc::now().date_naive())
            .await
    }

    fn retention(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.config.general.retention_days))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::{DeliveryError, SinkIdentity};
    use crate::feed::FeedItem;
    use crate::pipeline::RunOutcome;
    use crate::Error;

    struct TwoStories;

    #[async_trait::async_trait]
    impl FeedSource for TwoStories {
        async fn fetch(&self) -> Vec<FeedItem> {
            ["Stokes century", "Rain delays Lord's"]
                .iter()
                .map(|title| FeedItem {
                    title: title.to_string(),
                    link: format!("https://example.com/{}", title.len()),
                    source: "ESPN".to_string(),
                    image_url: None,
                    description: Some("Match report".to_string()),
                })
                .collect()
        }
    }

    struct AcceptingSink;

    #[async_trait::async_trait]
    impl MessageSink for AcceptingSink {
        async fn identity(&self) -> std::result::Result<SinkIdentity, DeliveryError> {
            Ok(SinkIdentity { id: 9, username: Some("relay".to_string()) })
        }

        async fn send_text(&self, _text: &str, _link_preview: bool) -> std::result::Result<(), DeliveryError> {
            Ok(())
        }

        async fn send_image(&self, _image_url: &str, _caption: &str) -> std::result::Result<(), DeliveryError> {
            Ok(())
        }
    }

    async fn relay() -> NewsRelay {
        let mut config = AppConfig::default();
        config.telegram.delivery_delay_ms = 0;
        let db = Database::new_in_memory().await.unwrap();
        NewsRelay::new(config, db, Arc::new(TwoStories), Arc::new(AcceptingSink))
    }

    #[tokio::test]
    async fn test_run_once_and_report() {
        let relay = relay().await;

        let report = relay.run_ingestion_once().await.unwrap();
        assert!(report.is_success());
        assert_eq!(report.articles_posted, 2);

        let again = relay.run_ingestion_once().await.unwrap();
        assert_eq!(again.new_articles, 0);

        let status = relay.latest_status(RunKind::Ingestion).await.unwrap().unwrap();
        assert_eq!(status.outcome, RunOutcome::Success);
        assert_eq!(relay.recent_statuses(10).await.unwrap().len(), 2);

        let stats = relay.statistics().await.unwrap();
        assert_eq!(stats.total_posted, 2);
        assert_eq!(stats.posted_today, 2);

        assert_eq!(relay.recent_articles(1).await.unwrap().len(), 1);
        assert_eq!(relay.todays_articles().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_cleanup_once_keeps_fresh_items() {
        let relay = relay().await;
        relay.run_ingestion_once().await.unwrap();

        let report = relay.run_cleanup_once().await.unwrap();
        assert!(report.is_success());
        assert_eq!(report.removed, 0);
        assert!(relay.latest_status(RunKind::Cleanup).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_scheduler_controls() {
        let relay = relay().await;
        assert!(!relay.is_running());

        relay.start_scheduler().await.unwrap();
        assert!(relay.is_running());
        assert_eq!(relay.list_due_times().await.unwrap().len(), 25);

        relay.stop_scheduler().await;
        assert!(!relay.is_running());
    }

    #[tokio::test]
    async fn test_from_config_requires_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.general.data_dir = dir.path().to_path_buf();

        let result = NewsRelay::from_config(config).await;
        assert!(matches!(result, Err(Error::Config(_))));
        assert!(!dir.path().join("newsrelay.db").exists());
    }
}
