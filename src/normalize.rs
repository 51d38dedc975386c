//! Record normalization
//!
//! Turns one raw search item into the stable record shape: resolves
//! the publish time from whatever the upstream sent, classifies the
//! originating platform, and (when configured) attaches full-article
//! content for news-type records. Every attribution attempt lands in
//! its own audit log, independent of the main output.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::article::ArticleFetcher;
use crate::counters::JobCounters;
use crate::error::Result;
use crate::schemas::{TalkwalkerRecord, PUBLISHED_INVALID, PUBLISHED_UNAVAILABLE};
use crate::sink::JsonlSink;

/// Source-type tags that mark a record as news-like and eligible for
/// full-article retrieval.
const NEWS_SOURCE_TYPES: &[&str] = &[
    "BLOG_OTHER",
    "ONLINENEWS",
    "ONLINENEWS_AGENCY",
    "ONLINENEWS_MAGAZINE",
    "ONLINENEWS_NEWSPAPER",
    "ONLINENEWS_OTHER",
    "ONLINENEWS_PRESSRELEASES",
    "ONLINENEWS_TVRADIO",
    "PODCAST_OTHER",
];

/// Audit line written for every article retrieval attempt.
#[derive(Debug, Serialize)]
struct AttributionEntry<'a> {
    url: &'a str,
    source: &'a str,
    snippet: bool,
    /// `true` on success, the error text otherwise
    successful_traversal: Value,
}

/// Resolves a raw `published` value to unix seconds by digit length.
///
/// Absent or empty values resolve to 0 (unavailable); values shorter
/// than 10 digits resolve to -1 (invalid); anything else is scaled
/// down to seconds by `10^(len-10)`.
pub fn resolve_publish_epoch(raw: Option<&Value>) -> i64 {
    let digits = match raw {
        None | Some(Value::Null) => return PUBLISHED_UNAVAILABLE,
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(_) => return PUBLISHED_INVALID,
    };

    if digits.is_empty() {
        return PUBLISHED_UNAVAILABLE;
    }
    if digits.len() < 10 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return PUBLISHED_INVALID;
    }

    let value: i128 = match digits.parse() {
        Ok(v) => v,
        Err(_) => return PUBLISHED_INVALID,
    };
    let scale = 10i128.pow((digits.len() - 10) as u32);
    (value / scale) as i64
}

/// Second-level domain label of a URL, used as the human-readable
/// source name for non-Twitter records. Empty when the URL has no
/// usable host.
pub fn get_domain_name(url: &str) -> String {
    let Ok(parsed) = url::Url::parse(url) else {
        return String::new();
    };
    let Some(host) = parsed.host_str() else {
        return String::new();
    };
    let components: Vec<&str> = host.split('.').collect();
    if components.len() > 1 {
        components[components.len() - 2].to_string()
    } else {
        String::new()
    }
}

/// Normalizes raw items and owns the attribution log.
pub struct Normalizer {
    get_news_links: bool,
    fetcher: Option<ArticleFetcher>,
    attribution_log: JsonlSink,
}

impl Normalizer {
    pub fn new(get_news_links: bool, attribution_log: JsonlSink) -> Result<Self> {
        let fetcher = if get_news_links {
            Some(ArticleFetcher::new()?)
        } else {
            None
        };
        Ok(Self {
            get_news_links,
            fetcher,
            attribution_log,
        })
    }

    /// Converts one raw item into a normalized record.
    pub async fn normalize(&mut self, mut raw: Value, counters: &mut JobCounters) -> TalkwalkerRecord {
        let published = resolve_publish_epoch(raw.get("published"));
        if let Some(map) = raw.as_object_mut() {
            map.insert("published".to_string(), Value::from(published));
        }

        let mut record = self.parse_record(raw, counters);

        let source = if record.is_twitter() {
            counters.total_twitter += 1;
            "twitter".to_string()
        } else {
            get_domain_name(record.url.as_deref().unwrap_or(""))
        };

        record.published = Some(published);
        record.source = Some(source.clone());
        if !record.published_is_sentinel() {
            record.publish_source = Some("talkwalker".to_string());
        }

        if self.wants_article(&record) {
            self.attach_article(&mut record, &source, counters).await;
        }

        record
    }

    /// Strict parse into the catalog; on a shape mismatch the raw
    /// payload is preserved wholesale under `unparsed_payload` rather
    /// than dropped. The reserved key avoids colliding with catalog
    /// fields when the record is dumped.
    fn parse_record(&self, raw: Value, counters: &mut JobCounters) -> TalkwalkerRecord {
        match TalkwalkerRecord::deserialize(&raw) {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, "Record did not match catalog shape, keeping raw payload");
                counters.log_error(format!("record parse: {}", e));
                let mut extra = serde_json::Map::new();
                extra.insert("unparsed_payload".to_string(), raw);
                TalkwalkerRecord {
                    extra,
                    ..TalkwalkerRecord::default()
                }
            }
        }
    }

    fn wants_article(&self, record: &TalkwalkerRecord) -> bool {
        self.get_news_links
            && self.fetcher.is_some()
            && record
                .source_type
                .iter()
                .any(|tag| NEWS_SOURCE_TYPES.contains(&tag.as_str()))
    }

    /// Best-effort article retrieval. Success attaches the payload;
    /// failure annotates the error ring. Both outcomes are audited.
    async fn attach_article(
        &mut self,
        record: &mut TalkwalkerRecord,
        source: &str,
        counters: &mut JobCounters,
    ) {
        let url = record.url.clone().unwrap_or_default();
        let fetcher = self.fetcher.as_ref().expect("checked by wants_article");

        info!(url = %url, "Fetching article");

        let traversal = match fetcher.fetch(&url).await {
            Ok(article) => {
                record.news_article_attributes = Some(article.into_attributes(source));
                Value::Bool(true)
            }
            Err(e) => {
                info!(url = %url, error = %e, "Ignoring this article");
                counters.log_error(format!("error: {} article: {}", e, url));
                Value::String(e.to_string())
            }
        };

        let entry = AttributionEntry {
            url: &url,
            source,
            snippet: true,
            successful_traversal: traversal,
        };
        if let Err(e) = self.attribution_log.append(&entry).await {
            warn!(error = %e, "Could not write attribution log entry");
            counters.log_error(format!("error in article: {}", e));
        }
    }
}
