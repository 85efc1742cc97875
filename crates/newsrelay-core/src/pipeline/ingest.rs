use std::sync::Arc;

use crate::delivery::DeliveryClient;
use crate::feed::{FeedItem, FeedSource};
use crate::storage::{Database, NewsRepository, StatusRepository};
use crate::Result;

use super::report::RunReport;

pub const MSG_NO_ARTICLES: &str = "no articles found";
pub const MSG_NO_NEW_ARTICLES: &str = "no new articles";
pub const MSG_NOTHING_POSTED: &str = "failed to post any articles";

/// Fetch, dedupe, deliver and record one batch of news.
///
/// A run never retries and never raises: every outcome, including faults,
/// ends up as a [`RunReport`] and a best-effort status record.
pub struct IngestionPipeline {
    db: Database,
    feed: Arc<dyn FeedSource>,
    delivery: DeliveryClient,
}

impl IngestionPipeline {
    pub fn new(db: Database, feed: Arc<dyn FeedSource>, delivery: DeliveryClient) -> Self {
        Self { db, feed, delivery }
    }

    /// Execute one run and persist its status
    pub async fn run(&self) -> RunReport {
        tracing::info!("Starting news fetch and delivery run");

        let report = match self.execute().await {
            Ok(report) => report,
            Err(e) => {
                tracing::error!("Ingestion run failed: {}", e);
                RunReport::error(0, 0, e.to_string())
            }
        };

        self.record(&report).await;
        report
    }

    async fn execute(&self) -> Result<RunReport> {
        match self.delivery.probe().await {
            Ok(identity) => {
                tracing::info!(
                    "Messaging sink reachable: @{}",
                    identity.username.as_deref().unwrap_or("unknown")
                );
            }
            Err(e) => {
                tracing::error!("Messaging sink unreachable: {}", e);
                return Ok(RunReport::error(
                    0,
                    0,
                    format!("failed to connect to messaging sink: {}", e),
                ));
            }
        }

        let items = self.feed.fetch().await;
        if items.is_empty() {
            tracing::warn!("No articles found");
            return Ok(RunReport::success(0, 0, 0, Some(MSG_NO_ARTICLES)));
        }

        let found = items.len() as u32;
        tracing::info!("Found {} articles", found);

        let new_items = self.claim_new_items(items).await?;
        let new_count = new_items.len() as u32;

        if new_items.is_empty() {
            tracing::info!("No new articles to post");
            return Ok(RunReport::success(found, 0, 0, Some(MSG_NO_NEW_ARTICLES)));
        }

        tracing::info!("Posting {} new articles", new_count);
        let outcomes = self.delivery.deliver_each(&new_items).await;
        let posted = outcomes.iter().filter(|ok| **ok).count() as u32;

        if posted == 0 {
            return Ok(RunReport::error(found, new_count, MSG_NOTHING_POSTED));
        }

        let news = NewsRepository::new(&self.db);
        for (item, delivered) in new_items.iter().zip(&outcomes) {
            if *delivered {
                news.mark_posted(&item.title, &item.source).await;
            }
        }

        tracing::info!("Successfully posted {}/{} articles", posted, new_count);
        Ok(RunReport::success(found, new_count, posted, None))
    }

    /// Keep the items this run is first to store, in feed order
    async fn claim_new_items(&self, items: Vec<FeedItem>) -> Result<Vec<FeedItem>> {
        let news = NewsRepository::new(&self.db);
        let mut new_items = Vec::new();

        for item in items {
            if news.exists(&item.title, &item.source).await {
                tracing::info!("Skipping duplicate: {}", item.short_title());
                continue;
            }

            let (_, was_new) = news.insert_if_absent(&item).await?;
            if was_new {
                new_items.push(item);
            } else {
                tracing::info!("Skipping item stored by a concurrent run: {}", item.short_title());
            }
        }

        Ok(new_items)
    }

    async fn record(&self, report: &RunReport) {
        let status = report.to_status();
        if let Err(e) = StatusRepository::new(&self.db).append(&status).await {
            tracing::error!("Failed to save run status: {}", e);
        }
    }
}
