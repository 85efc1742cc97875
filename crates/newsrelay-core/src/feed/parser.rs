use feed_rs::parser;

use super::models::CandidateItem;
use crate::{Error, Result};

/// Parse RSS/Atom content into candidate items, in feed order.
///
/// Entries without a title or a link cannot be deduplicated or delivered and
/// are dropped here.
pub fn parse_candidates(content: &[u8]) -> Result<Vec<CandidateItem>> {
    let feed = parser::parse(content)
        .map_err(|e| Error::FeedParse(e.to_string()))?;

    let candidates = feed
        .entries
        .into_iter()
        .filter_map(|entry| {
            let title = entry
                .title
                .map(|t| t.content.trim().to_string())
                .filter(|t| !t.is_empty())?;

            let link = entry
                .links
                .first()
                .map(|l| l.href.trim().to_string())
                .filter(|l| !l.is_empty())?;

            let summary = entry
                .summary
                .map(|s| html_to_text(&s.content))
                .filter(|s| !s.is_empty());

            Some(CandidateItem { title, link, summary })
        })
        .collect();

    Ok(candidates)
}

/// Convert HTML content to plain text on a single paragraph
pub(crate) fn html_to_text(html: &str) -> String {
    let text = html2text::from_read(html.as_bytes(), 10_000)
        .unwrap_or_else(|_| html.to_string());
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
