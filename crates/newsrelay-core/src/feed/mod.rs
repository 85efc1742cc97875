mod client;
mod enrich;
mod models;
mod parser;

pub use client::{FeedClient, FeedSource};
pub use enrich::{extract_enrichment, Enrichment, PageEnricher};
pub use models::{CandidateItem, FeedItem, NewsItem};
pub use parser::parse_candidates;
