use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A feed entry before dedup and enrichment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateItem {
    pub title: String,
    pub link: String,
    pub summary: Option<String>,
}

/// An item ready to be deduplicated and delivered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedItem {
    pub title: String,
    pub link: String,
    pub source: String,
    pub image_url: Option<String>,
    pub description: Option<String>,
}

/// A stored news item, unique by (title, source)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsItem {
    pub id: Uuid,
    pub title: String,
    pub link: String,
    pub source: String,
    pub image_url: Option<String>,
    pub description: Option<String>,
    pub posted_at: DateTime<Utc>,
    pub is_posted: bool,
}

impl FeedItem {
    /// Short title used in log lines
    pub fn short_title(&self) -> String {
        title_preview(&self.title, 50)
    }
}

fn title_preview(title: &str, max_chars: usize) -> String {
    match title.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &title[..idx]),
        None => title.to_string(),
    }
}
