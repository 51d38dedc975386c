//! Harvested record schema
//!
//! All catalog fields are optional on input; dumping a record emits
//! every field with its default populated so downstream consumers see
//! a consistent shape. Fields the catalog does not know about are kept
//! in `extra` instead of being dropped.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use super::twitter::TwitterData;

/// Upstream id fields arrive as either numbers or strings; both map to
/// a string here so they can be matched against lookup results.
pub(crate) fn id_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(_) => None,
    })
}

/// Publish-time sentinel: upstream supplied no value.
pub const PUBLISHED_UNAVAILABLE: i64 = 0;
/// Publish-time sentinel: upstream value was malformed.
pub const PUBLISHED_INVALID: i64 = -1;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Image {
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorldData {
    #[serde(default)]
    pub continent: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub country_code: Option<String>,
    #[serde(default)]
    pub resolution: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtraAuthorAttributes {
    #[serde(default)]
    pub world_data: WorldData,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_gender")]
    pub gender: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub short_name: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

fn default_gender() -> String {
    "UNKNOWN".to_string()
}

impl Default for ExtraAuthorAttributes {
    fn default() -> Self {
        Self {
            world_data: WorldData::default(),
            id: None,
            name: None,
            gender: default_gender(),
            image_url: None,
            short_name: None,
            url: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtraSourceAttributes {
    #[serde(default)]
    pub world_data: WorldData,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArticleExtendedAttributes {
    #[serde(default)]
    pub youtube_views: Option<i64>,
    #[serde(default)]
    pub youtube_likes: Option<i64>,
    #[serde(default)]
    pub num_comments: Option<i64>,
    #[serde(default)]
    pub tiktok_views: Option<i64>,
    #[serde(default)]
    pub tiktok_likes: Option<i64>,
    #[serde(default)]
    pub tiktok_shares: Option<i64>,
    #[serde(default)]
    pub twitter_shares: Option<i64>,
}

/// Full-article payload attached when news-link retrieval is on.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewsArticleAttributes {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub snippet: bool,
    /// Publish date reported by the article page, RFC 3339
    #[serde(default)]
    pub datetime: Option<String>,
    #[serde(default)]
    pub media: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
}

/// One harvested record in its stable output shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TalkwalkerRecord {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub matched_profile: Vec<String>,
    #[serde(default)]
    pub indexed: Option<i64>,
    #[serde(default)]
    pub search_indexed: Option<i64>,
    /// Unix seconds; 0 = unavailable upstream, -1 = invalid upstream
    #[serde(default)]
    pub published: Option<i64>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub title_snippet: Option<String>,
    #[serde(default)]
    pub content_snippet: Option<String>,
    #[serde(default)]
    pub root_url: Option<String>,
    #[serde(default)]
    pub domain_url: Option<String>,
    #[serde(default)]
    pub host_url: Option<String>,
    #[serde(default)]
    pub parent_url: Option<String>,
    #[serde(default)]
    pub lang: Option<String>,
    #[serde(default)]
    pub porn_level: Option<i64>,
    #[serde(default)]
    pub fluency_level: Option<i64>,
    #[serde(default, rename = "DEPRECATED_spam_level")]
    pub deprecated_spam_level: Option<i64>,
    #[serde(default)]
    pub sentiment: Option<i64>,
    #[serde(default)]
    pub source_type: Vec<String>,
    #[serde(default)]
    pub post_type: Vec<String>,
    #[serde(default)]
    pub noise_level: Option<i64>,
    #[serde(default)]
    pub noise_category: Option<String>,
    #[serde(default)]
    pub tokens_title: Vec<String>,
    #[serde(default)]
    pub tokens_content: Vec<String>,
    #[serde(default)]
    pub tokens_mention: Vec<String>,
    #[serde(default)]
    pub images: Vec<Image>,
    #[serde(default)]
    pub tags_internal: Vec<String>,
    #[serde(default)]
    pub tags_customer: Vec<String>,
    #[serde(default)]
    pub article_extended_attributes: Option<ArticleExtendedAttributes>,
    #[serde(default)]
    pub source_extended_attributes: Option<ExtraSourceAttributes>,
    #[serde(default)]
    pub extra_author_attributes: Option<ExtraAuthorAttributes>,
    #[serde(default)]
    pub user_response_time: Option<i64>,
    #[serde(default)]
    pub engagement: Option<i64>,
    #[serde(default)]
    pub reach: Option<i64>,
    #[serde(default)]
    pub entity_url: Vec<Image>,
    #[serde(default)]
    pub word_count: i64,
    /// Platform tag from the search API (`"twitter"` for tracked records)
    #[serde(default)]
    pub external_provider: Option<String>,
    /// Identifier into the secondary platform, when flagged
    #[serde(default, deserialize_with = "id_string")]
    pub external_id: Option<String>,
    #[serde(default, deserialize_with = "id_string")]
    pub external_author_id: Option<String>,
    /// Resolved human-readable source name
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub news_article_attributes: Option<NewsArticleAttributes>,
    /// Raw tweet payload retained after reconciliation
    #[serde(default)]
    pub external_provider_attributes: Option<TwitterData>,
    /// Which system supplied the final publish time
    #[serde(default, rename = "x-p6m-publish-source")]
    pub publish_source: Option<String>,
    /// Raw failure payload for ids the lookup never resolved
    #[serde(default)]
    pub twitter_error: Option<Value>,
    /// Upstream fields the catalog does not model
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TalkwalkerRecord {
    /// Whether this record came from the tracked social platform.
    pub fn is_twitter(&self) -> bool {
        self.external_provider.as_deref() == Some("twitter")
    }

    /// Whether the resolved publish time is one of the sentinels.
    pub fn published_is_sentinel(&self) -> bool {
        matches!(
            self.published,
            None | Some(PUBLISHED_UNAVAILABLE) | Some(PUBLISHED_INVALID)
        )
    }
}
