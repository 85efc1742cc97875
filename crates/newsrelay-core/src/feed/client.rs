use std::time::Duration;

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::{Client, Proxy};

use super::enrich::PageEnricher;
use super::models::{CandidateItem, FeedItem};
use super::parser::parse_candidates;
use crate::config::AppConfig;
use crate::{Error, Result};

const MAX_FEED_BYTES: usize = 5 * 1024 * 1024;
const FEED_USER_AGENT: &str = concat!("newsrelay/", env!("CARGO_PKG_VERSION"));

/// Source of items for the ingestion pipeline.
///
/// Every call is a fresh fetch. Implementations never fail the caller: an
/// unreachable or malformed feed yields an empty list.
#[async_trait::async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch(&self) -> Vec<FeedItem>;
}

/// Fetches a single RSS/Atom feed and enriches its newest entries
pub struct FeedClient {
    client: Client,
    url: String,
    source_name: String,
    max_candidates: usize,
    max_items: usize,
    enricher: Option<PageEnricher>,
}

impl FeedClient {
    /// Create a new feed client from configuration
    pub fn new(config: &AppConfig) -> Result<Self> {
        let feed = &config.feed;
        let client = Self::build_client(feed.request_timeout_secs, &feed.proxy_url)?;

        let enricher = if feed.enrich_articles {
            let page_client =
                Self::build_client(feed.enrichment_timeout_secs, &feed.proxy_url)?;
            Some(PageEnricher::with_client(page_client))
        } else {
            None
        };

        Ok(Self {
            client,
            url: feed.url.clone(),
            source_name: feed.source_name.clone(),
            max_candidates: feed.max_candidates,
            max_items: feed.max_items,
            enricher,
        })
    }

    /// Build HTTP client with optional proxy
    fn build_client(timeout_secs: u64, proxy_url: &Option<String>) -> Result<Client> {
        let mut builder = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(10));

        if let Some(ref proxy) = proxy_url {
            let proxy = Proxy::all(proxy)
                .map_err(|e| Error::Config(format!("Invalid proxy URL: {}", e)))?;
            builder = builder.proxy(proxy);
            tracing::info!("Using HTTP proxy for feed fetching");
        }

        builder.build().map_err(Error::Http)
    }

    fn build_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "application/rss+xml,application/atom+xml,application/xml;q=0.9,text/xml;q=0.8,*/*;q=0.5",
            ),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static(FEED_USER_AGENT));
        headers
    }

    async fn fetch_body(&self) -> Result<Bytes> {
        let response = self
            .client
            .get(&self.url)
            .headers(Self::build_headers())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::FeedParse(format!("HTTP {} for URL: {}", status, self.url)));
        }

        let body = response.bytes().await?;
        if body.len() > MAX_FEED_BYTES {
            return Err(Error::FeedParse(format!(
                "Feed too large ({} bytes) for URL: {}",
                body.len(),
                self.url
            )));
        }

        Ok(body)
    }

    /// Fetch and parse the feed, returning at most `max_candidates` entries
    pub async fn fetch_candidates(&self) -> Result<Vec<CandidateItem>> {
        tracing::info!("Fetching feed from: {}", self.url);

        let body = self.fetch_body().await?;
        let mut candidates = parse_candidates(&body)?;
        candidates.truncate(self.max_candidates);

        Ok(candidates)
    }

    /// Turn a candidate into a deliverable item, scraping its page when enabled
    async fn build_item(&self, candidate: CandidateItem) -> FeedItem {
        let mut image_url = None;
        let mut description = None;

        if let Some(ref enricher) = self.enricher {
            match enricher.enrich(&candidate.link).await {
                Ok(enrichment) => {
                    image_url = enrichment.image_url;
                    description = enrichment.description;
                }
                Err(e) => {
                    tracing::warn!(link = %candidate.link, "Article enrichment failed: {}", e);
                }
            }
        }

        FeedItem {
            title: candidate.title,
            link: candidate.link,
            source: self.source_name.clone(),
            image_url,
            description: description.or(candidate.summary),
        }
    }
}

#[async_trait::async_trait]
impl FeedSource for FeedClient {
    async fn fetch(&self) -> Vec<FeedItem> {
        let candidates = match self.fetch_candidates().await {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::error!("Feed fetch failed: {}", e);
                return Vec::new();
            }
        };

        if candidates.is_empty() {
            tracing::warn!("No entries found in feed: {}", self.url);
            return Vec::new();
        }

        tracing::info!("Found {} candidate entries", candidates.len());

        let mut items = Vec::with_capacity(self.max_items);
        for candidate in candidates {
            if items.len() >= self.max_items {
                break;
            }
            items.push(self.build_item(candidate).await);
        }

        tracing::info!("Fetched {} items from {}", items.len(), self.source_name);
        items
    }
}
