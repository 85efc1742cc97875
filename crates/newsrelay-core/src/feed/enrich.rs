//! Best-effort article page scraping.
//!
//! Looks at an item's linked page for a lead image and a description. Nothing
//! here can fail a feed fetch: callers treat any error as "no enrichment".

use std::sync::atomic::{AtomicUsize, Ordering};

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use reqwest::Client;
use scraper::{Html, Selector};
use url::Url;

use crate::{Error, Result};

const MIN_DESCRIPTION_CHARS: usize = 50;

const IMAGE_SELECTORS: &[&str] = &[
    r#"meta[property="og:image"]"#,
    r#"meta[name="twitter:image"]"#,
    ".story-image img",
    ".article-image img",
    "article img",
];

const DESCRIPTION_SELECTORS: &[&str] = &[
    r#"meta[property="og:description"]"#,
    r#"meta[name="description"]"#,
    ".story-intro",
    "article p",
];

const IMAGE_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".webp", ".gif"];
const GENERIC_IMAGE_KEYWORDS: &[&str] = &["logo", "icon", "placeholder", "spacer", "default"];

static USER_AGENT_INDEX: AtomicUsize = AtomicUsize::new(0);
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Safari/605.1.15",
];

fn next_user_agent() -> &'static str {
    let index = USER_AGENT_INDEX.fetch_add(1, Ordering::Relaxed) % USER_AGENTS.len();
    USER_AGENTS[index]
}

/// Image and description scraped from an article page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Enrichment {
    pub image_url: Option<String>,
    pub description: Option<String>,
}

/// Fetches article pages and extracts enrichment data
pub struct PageEnricher {
    client: Client,
}

impl PageEnricher {
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    fn build_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
            ),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        if let Ok(ua) = HeaderValue::from_str(next_user_agent()) {
            headers.insert(USER_AGENT, ua);
        }
        headers
    }

    /// Fetch the page behind `link` and extract an image and a description
    pub async fn enrich(&self, link: &str) -> Result<Enrichment> {
        let page_url = Url::parse(link)?;

        let response = self
            .client
            .get(page_url.clone())
            .headers(Self::build_headers())
            .send()
            .await?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(Error::Other(format!(
                "article page returned HTTP {} for {}",
                status, link
            )));
        }

        let body = response.text().await?;
        Ok(extract_enrichment(&body, &page_url))
    }
}

/// Extract enrichment data from an article page
pub fn extract_enrichment(html: &str, page_url: &Url) -> Enrichment {
    let document = Html::parse_document(html);

    Enrichment {
        image_url: extract_image(&document, page_url),
        description: extract_description(&document),
    }
}

fn extract_image(document: &Html, page_url: &Url) -> Option<String> {
    for selector_str in IMAGE_SELECTORS {
        let Ok(selector) = Selector::parse(selector_str) else {
            continue;
        };
        let Some(element) = document.select(&selector).next() else {
            continue;
        };

        let value = element
            .value()
            .attr("content")
            .or_else(|| element.value().attr("src"));
        let Some(raw) = value.map(str::trim).filter(|v| !v.is_empty()) else {
            continue;
        };

        // Handles absolute, protocol-relative and root-relative forms
        let Ok(resolved) = page_url.join(raw) else {
            continue;
        };
        let candidate = resolved.to_string();

        if is_valid_image_url(&candidate) && !is_generic_image(&candidate) {
            return Some(candidate);
        }
    }

    None
}

fn extract_description(document: &Html) -> Option<String> {
    for selector_str in DESCRIPTION_SELECTORS {
        let Ok(selector) = Selector::parse(selector_str) else {
            continue;
        };
        let Some(element) = document.select(&selector).next() else {
            continue;
        };

        let text = match element.value().attr("content") {
            Some(content) => content.to_string(),
            None => element.text().collect::<Vec<_>>().join(" "),
        };
        let text = text.split_whitespace().collect::<Vec<_>>().join(" ");

        if text.chars().count() > MIN_DESCRIPTION_CHARS {
            return Some(text);
        }
    }

    None
}

fn is_valid_image_url(url: &str) -> bool {
    let path = Url::parse(url)
        .map(|u| u.path().to_lowercase())
        .unwrap_or_else(|_| url.to_lowercase());
    IMAGE_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

fn is_generic_image(url: &str) -> bool {
    let lower = url.to_lowercase();
    GENERIC_IMAGE_KEYWORDS.iter().any(|k| lower.contains(k))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn page_url() -> Url {
        Url::parse("https://www.example.com/story/123").unwrap()
    }

    #[test]
    fn test_extract_og_tags() {
        let html = r#"<html><head>
            <meta property="og:image" content="https://img.example.com/pics/match.jpg">
            <meta property="og:description" content="India beat Australia by six wickets in a tense chase at the MCG on Sunday.">
        </head><body></body></html>"#;

        let enrichment = extract_enrichment(html, &page_url());
        assert_eq!(
            enrichment.image_url.as_deref(),
            Some("https://img.example.com/pics/match.jpg")
        );
        assert!(enrichment.description.unwrap().starts_with("India beat Australia"));
    }

    #[test]
    fn test_generic_and_non_image_urls_are_skipped() {
        let html = r#"<html><head>
            <meta property="og:image" content="/static/site-logo.png">
            <meta name="twitter:image" content="https://img.example.com/render?id=4">
        </head><body>
            <article><img src="//cdn.example.com/photos/innings.webp"><p>Too short</p></article>
        </body></html>"#;

        let enrichment = extract_enrichment(html, &page_url());
        assert_eq!(
            enrichment.image_url.as_deref(),
            Some("https://cdn.example.com/photos/innings.webp")
        );
        assert_eq!(enrichment.description, None);
    }

    #[test]
    fn test_relative_image_and_paragraph_description() {
        let html = r#"<html><body><article>
            <div class="article-image"><img src="/media/lead.JPG"></div>
            <p>The second day belonged to the spinners, who shared nine wickets between them on a dry surface.</p>
        </article></body></html>"#;

        let enrichment = extract_enrichment(html, &page_url());
        assert_eq!(
            enrichment.image_url.as_deref(),
            Some("https://www.example.com/media/lead.JPG")
        );
        assert!(enrichment.description.unwrap().contains("spinners"));
    }

    #[tokio::test]
    async fn test_enrich_non_200_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/story/1"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(2))
            .build()
            .unwrap();
        let enricher = PageEnricher::with_client(client);
        let result = enricher.enrich(&format!("{}/story/1", server.uri())).await;
        assert!(result.is_err());
    }
}
