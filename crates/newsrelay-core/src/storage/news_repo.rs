use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use super::Database;
use crate::feed::{FeedItem, NewsItem};
use crate::Result;

/// Repository for news items, keyed by (title, source)
pub struct NewsRepository<'a> {
    db: &'a Database,
}

#[derive(FromRow)]
struct NewsItemRow {
    id: String,
    title: String,
    link: String,
    source: String,
    image_url: Option<String>,
    description: Option<String>,
    posted_at: DateTime<Utc>,
    is_posted: i32,
}

impl From<NewsItemRow> for NewsItem {
    fn from(row: NewsItemRow) -> Self {
        NewsItem {
            id: Uuid::parse_str(&row.id).unwrap_or_default(),
            title: row.title,
            link: row.link,
            source: row.source,
            image_url: row.image_url,
            description: row.description,
            posted_at: row.posted_at,
            is_posted: row.is_posted != 0,
        }
    }
}

/// Delivery counters for reporting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PostingStats {
    pub total_posted: u64,
    pub posted_today: u64,
}

impl<'a> NewsRepository<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Whether an item with this key has been seen. Store failures read as "not seen".
    pub async fn exists(&self, title: &str, source: &str) -> bool {
        let result: std::result::Result<Option<(i64,)>, sqlx::Error> =
            sqlx::query_as("SELECT 1 FROM news_items WHERE title = ? AND source = ? LIMIT 1")
                .bind(title)
                .bind(source)
                .fetch_optional(self.db.pool())
                .await;

        match result {
            Ok(row) => row.is_some(),
            Err(e) => {
                tracing::error!(title, source, "Error checking item existence: {}", e);
                false
            }
        }
    }

    /// Insert the item unless its key already exists.
    ///
    /// Returns the stored id and whether this call created the record. An
    /// existing record is never overwritten.
    pub async fn insert_if_absent(&self, item: &FeedItem) -> Result<(Uuid, bool)> {
        self.insert_if_absent_at(item, Utc::now()).await
    }

    pub async fn insert_if_absent_at(
        &self,
        item: &FeedItem,
        posted_at: DateTime<Utc>,
    ) -> Result<(Uuid, bool)> {
        let id = Uuid::new_v4();

        // The unique (title, source) constraint arbitrates concurrent inserts
        let result = sqlx::query(
            r#"
            INSERT INTO news_items
            (id, title, link, source, image_url, description, posted_at, is_posted)
            VALUES (?, ?, ?, ?, ?, ?, ?, 0)
            ON CONFLICT(title, source) DO NOTHING
            "#,
        )
        .bind(id.to_string())
        .bind(&item.title)
        .bind(&item.link)
        .bind(&item.source)
        .bind(&item.image_url)
        .bind(&item.description)
        .bind(posted_at)
        .execute(self.db.pool())
        .await?;

        if result.rows_affected() > 0 {
            tracing::info!("Saved new item: {}", item.short_title());
            return Ok((id, true));
        }

        let (existing,): (String,) =
            sqlx::query_as("SELECT id FROM news_items WHERE title = ? AND source = ?")
                .bind(&item.title)
                .bind(&item.source)
                .fetch_one(self.db.pool())
                .await?;

        tracing::debug!("Item already exists: {}", item.short_title());
        Ok((Uuid::parse_str(&existing).unwrap_or_default(), false))
    }

    /// Flag an item as delivered. Failures are logged only.
    pub async fn mark_posted(&self, title: &str, source: &str) {
        let result = sqlx::query("UPDATE news_items SET is_posted = 1 WHERE title = ? AND source = ?")
            .bind(title)
            .bind(source)
            .execute(self.db.pool())
            .await;

        if let Err(e) = result {
            tracing::error!(title, source, "Error marking item as posted: {}", e);
        }
    }

    /// Find an item by its key
    pub async fn find(&self, title: &str, source: &str) -> Result<Option<NewsItem>> {
        let row: Option<NewsItemRow> = sqlx::query_as(
            r#"
            SELECT id, title, link, source, image_url, description, posted_at, is_posted
            FROM news_items
            WHERE title = ? AND source = ?
            "#,
        )
        .bind(title)
        .bind(source)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.map(NewsItem::from))
    }

    /// Delete items older than `horizon`, returning the number removed
    pub async fn purge_older_than(&self, horizon: Duration) -> Result<u64> {
        self.purge_before(Utc::now() - horizon).await
    }

    pub async fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM news_items WHERE posted_at < ?")
            .bind(cutoff)
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected())
    }

    /// Most recent items first
    pub async fn list_recent(&self, limit: u32) -> Result<Vec<NewsItem>> {
        let rows: Vec<NewsItemRow> = sqlx::query_as(
            r#"
            SELECT id, title, link, source, image_url, description, posted_at, is_posted
            FROM news_items
            ORDER BY posted_at DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.into_iter().map(NewsItem::from).collect())
    }

    /// Items stored during the given UTC day, most recent first
    pub async fn list_for_day(&self, day: NaiveDate) -> Result<Vec<NewsItem>> {
        let (start, end) = day_bounds(day);

        let rows: Vec<NewsItemRow> = sqlx::query_as(
            r#"
            SELECT id, title, link, source, image_url, description, posted_at, is_posted
            FROM news_items
            WHERE posted_at >= ? AND posted_at < ?
            ORDER BY posted_at DESC
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.into_iter().map(NewsItem::from).collect())
    }

    /// Count delivered items overall and on the UTC day of `now`
    pub async fn statistics(&self, now: DateTime<Utc>) -> Result<PostingStats> {
        let (start, end) = day_bounds(now.date_naive());

        let (total,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM news_items WHERE is_posted = 1")
                .fetch_one(self.db.pool())
                .await?;

        let (today,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM news_items WHERE is_posted = 1 AND posted_at >= ? AND posted_at < ?",
        )
        .bind(start)
        .bind(end)
        .fetch_one(self.db.pool())
        .await?;

        Ok(PostingStats {
            total_posted: total as u64,
            posted_today: today as u64,
        })
    }
}

fn day_bounds(day: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = day.and_time(chrono::NaiveTime::MIN).and_utc();
    (start, start + Duration::days(1))
}
