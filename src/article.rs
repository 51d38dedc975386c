//! Best-effort article retrieval
//!
//! Downloads a news-type record's URL and pulls title, authors, body
//! text, summary, and publish date out of the page metadata. Failures
//! are expected (paywalls, bot walls, dead links) and never fatal.

use std::time::Duration;

use rand::seq::SliceRandom;
use scraper::{Html, Selector};

use crate::error::{HarvestError, Result};
use crate::schemas::NewsArticleAttributes;

const ARTICLE_TIMEOUT: Duration = Duration::from_secs(10);

/// Some publishers serve bots an empty shell; rotating a few browser
/// user agents keeps the success rate reasonable.
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15",
];

/// Extracted article content, prior to attachment on the record.
#[derive(Debug, Clone, Default)]
pub struct Article {
    pub url: String,
    pub title: Option<String>,
    pub authors: Vec<String>,
    pub text: Option<String>,
    pub summary: Option<String>,
    pub publish_date: Option<String>,
}

impl Article {
    /// Converts to the output schema attachment, tagging the media
    /// source name resolved during normalization.
    pub fn into_attributes(self, media: &str) -> NewsArticleAttributes {
        NewsArticleAttributes {
            url: Some(self.url),
            source: Some(media.to_string()),
            snippet: true,
            datetime: self.publish_date,
            media: Some(media.to_string()),
            title: self.title,
            authors: self.authors,
            text: self.text,
            summary: self.summary,
        }
    }
}

/// Downloads and parses article pages.
pub struct ArticleFetcher {
    http: reqwest::Client,
}

impl ArticleFetcher {
    pub fn new() -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(ARTICLE_TIMEOUT)
            .gzip(true)
            .brotli(true)
            .build()?;
        Ok(Self { http })
    }

    /// Fetches and parses one article. Any failure maps to an error
    /// the caller annotates and moves past.
    pub async fn fetch(&self, url: &str) -> Result<Article> {
        let user_agent = USER_AGENTS
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(USER_AGENTS[0]);

        let response = self
            .http
            .get(url)
            .header(reqwest::header::USER_AGENT, user_agent)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(HarvestError::ApiError {
                code: status.to_string(),
                message: format!("article fetch failed for {}", url),
            });
        }

        let html = response.text().await?;
        Ok(parse_article(url, &html))
    }
}

/// Pulls the article fields out of the page. Metadata first, paragraph
/// text as the body.
pub fn parse_article(url: &str, html: &str) -> Article {
    let document = Html::parse_document(html);

    let title = meta_content(&document, "meta[property=\"og:title\"]")
        .or_else(|| select_text(&document, "title"));

    let mut authors: Vec<String> = document
        .select(&selector("meta[name=\"author\"], meta[property=\"article:author\"]"))
        .filter_map(|el| el.value().attr("content"))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    authors.dedup();

    let summary = meta_content(&document, "meta[name=\"description\"]")
        .or_else(|| meta_content(&document, "meta[property=\"og:description\"]"));

    let publish_date = meta_content(&document, "meta[property=\"article:published_time\"]")
        .or_else(|| meta_content(&document, "meta[name=\"date\"]"));

    // Prefer paragraphs inside an <article> element, fall back to the
    // whole body.
    let mut paragraphs: Vec<String> = document
        .select(&selector("article p"))
        .map(|p| p.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();
    if paragraphs.is_empty() {
        paragraphs = document
            .select(&selector("body p"))
            .map(|p| p.text().collect::<String>().trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
    }
    let text = if paragraphs.is_empty() {
        None
    } else {
        Some(paragraphs.join("\n\n"))
    };

    Article {
        url: url.to_string(),
        title: title.map(|t| t.trim().to_string()).filter(|t| !t.is_empty()),
        authors,
        text,
        summary,
        publish_date,
    }
}

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector")
}

fn meta_content(document: &Html, css: &str) -> Option<String> {
    document
        .select(&selector(css))
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn select_text(document: &Html, css: &str) -> Option<String> {
    document
        .select(&selector(css))
        .next()
        .map(|el| el.text().collect::<String>())
}
