//! Tweet payload schema
//!
//! Shape of one resolved tweet from the batch lookup endpoint, kept on
//! the merged record as provenance.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TwitterData {
    #[serde(default, deserialize_with = "super::record::id_string")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "super::record::id_string")]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub referenced_tweets: Vec<ReferencedTweet>,
    #[serde(default)]
    pub lang: Option<String>,
    #[serde(default)]
    pub author_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub attachments: Option<Attachments>,
    #[serde(default)]
    pub edit_history_tweet_ids: Vec<String>,
    #[serde(default)]
    pub public_metrics: Option<PublicMetrics>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub context_annotations: Vec<ContextAnnotation>,
    #[serde(default)]
    pub in_reply_to_user_id: Option<String>,
    #[serde(default)]
    pub author: Option<TweetAuthor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferencedTweet {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Attachments {
    #[serde(default)]
    pub media_keys: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PublicMetrics {
    #[serde(default)]
    pub retweet_count: Option<i64>,
    #[serde(default)]
    pub reply_count: Option<i64>,
    #[serde(default)]
    pub like_count: Option<i64>,
    #[serde(default)]
    pub quote_count: Option<i64>,
    #[serde(default)]
    pub bookmark_count: Option<i64>,
    #[serde(default)]
    pub impression_count: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextAnnotation {
    #[serde(default)]
    pub domain: Option<Value>,
    #[serde(default)]
    pub entity: Option<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TweetAuthor {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sparse_tweet() {
        let json = r#"{
            "id": "1719",
            "text": "gm",
            "edit_history_tweet_ids": ["1719"],
            "public_metrics": {"like_count": 3}
        }"#;
        let tweet: TwitterData = serde_json::from_str(json).unwrap();
        assert_eq!(tweet.id.as_deref(), Some("1719"));
        assert_eq!(tweet.public_metrics.unwrap().like_count, Some(3));
        assert!(tweet.author.is_none());
    }

    #[test]
    fn referenced_tweet_round_trips_type_key() {
        let json = r#"{"type": "quoted", "id": "42"}"#;
        let referenced: ReferencedTweet = serde_json::from_str(json).unwrap();
        assert_eq!(referenced.kind, "quoted");
        let out = serde_json::to_value(&referenced).unwrap();
        assert_eq!(out["type"], "quoted");
    }
}
