//! Twitter batch lookup
//!
//! Re-hydrates flagged records by id. The lookup endpoint resolves
//! what it can and reports the rest under `errors`; callers own the
//! retry loop over the unresolved subset. Trait-based so tests can
//! substitute a scripted lookup.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::{HarvestError, Result};
use crate::retry::RetryPolicy;
use crate::schemas::{TweetAuthor, TwitterData};

const TWITTER_BASE_URL: &str = "https://api.twitter.com/2";
const LOOKUP_TIMEOUT: Duration = Duration::from_secs(15);

/// One unresolved id as reported by the lookup endpoint. `value`
/// carries the id that failed; everything else is kept verbatim for
/// the error annotation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TweetLookupError {
    pub value: String,
    #[serde(flatten)]
    pub detail: serde_json::Map<String, Value>,
}

/// Outcome of one batch lookup round.
#[derive(Debug, Default)]
pub struct TweetLookupResult {
    pub data: Vec<TwitterData>,
    pub errors: Vec<TweetLookupError>,
}

/// Batch lookup seam. The reconciler only depends on this.
#[async_trait]
pub trait TweetLookup: Send + Sync {
    /// Resolves a batch of tweet ids. Failed lookups are appended to
    /// the error file at `error_path` and returned under `errors`.
    async fn get_tweets_by_ids(
        &self,
        ids: &[String],
        error_path: &Path,
    ) -> Result<TweetLookupResult>;
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    data: Vec<TwitterData>,
    #[serde(default)]
    errors: Vec<TweetLookupError>,
    #[serde(default)]
    includes: Option<LookupIncludes>,
}

#[derive(Debug, Deserialize)]
struct LookupIncludes {
    #[serde(default)]
    users: Vec<TweetAuthor>,
}

/// HTTP implementation against the v2 lookup endpoint.
pub struct HttpTwitterSource {
    http: reqwest::Client,
    base_url: String,
    bearer_token: String,
    retry: RetryPolicy,
}

impl HttpTwitterSource {
    pub fn new(bearer_token: impl Into<String>, max_retries: u32) -> Result<Self> {
        Self::with_base_url(TWITTER_BASE_URL, bearer_token, max_retries)
    }

    pub fn with_base_url(
        base_url: impl Into<String>,
        bearer_token: impl Into<String>,
        max_retries: u32,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(LOOKUP_TIMEOUT)
            .gzip(true)
            .user_agent(concat!("talkwalker-harvester/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into(),
            bearer_token: bearer_token.into(),
            retry: RetryPolicy::page_timeout(max_retries),
        })
    }

    async fn lookup_once(&self, ids: &[String]) -> Result<LookupResponse> {
        let url = format!("{}/tweets", self.base_url);
        let id_list = ids.join(",");
        let params = [
            ("ids", id_list.as_str()),
            (
                "tweet.fields",
                "created_at,author_id,public_metrics,lang,conversation_id,\
                 referenced_tweets,attachments,context_annotations,in_reply_to_user_id",
            ),
            ("expansions", "author_id"),
            ("user.fields", "username,location,description,verified,name"),
        ];

        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.bearer_token)
            .query(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HarvestError::ApiError {
                code: status.to_string(),
                message: body,
            });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl TweetLookup for HttpTwitterSource {
    async fn get_tweets_by_ids(
        &self,
        ids: &[String],
        error_path: &Path,
    ) -> Result<TweetLookupResult> {
        debug!(count = ids.len(), "Looking up tweets by id");

        let mut attempt = 0u32;
        let response = loop {
            attempt += 1;
            match self.lookup_once(ids).await {
                Ok(response) => break response,
                Err(HarvestError::HttpError(e)) if e.is_timeout() => {
                    warn!(attempt, error = %e, "Tweet lookup timed out");
                    match self.retry.delay_after(attempt) {
                        Some(delay) => tokio::time::sleep(delay).await,
                        None => return Err(HarvestError::HttpError(e)),
                    }
                }
                Err(e) => return Err(e),
            }
        };

        // Attach expanded author objects to their tweets.
        let users: HashMap<String, TweetAuthor> = response
            .includes
            .map(|i| i.users)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|u| u.id.clone().map(|id| (id, u)))
            .collect();

        let mut data = response.data;
        for tweet in &mut data {
            if let Some(ref author_id) = tweet.author_id {
                tweet.author = users.get(author_id).cloned();
            }
        }

        if !response.errors.is_empty() {
            append_lookup_errors(error_path, &response.errors).await;
        }

        Ok(TweetLookupResult {
            data,
            errors: response.errors,
        })
    }
}

/// Appends raw failure payloads to the per-run error file. Failing to
/// write the audit line must not fail the lookup.
async fn append_lookup_errors(error_path: &Path, errors: &[TweetLookupError]) {
    let mut lines = String::new();
    for error in errors {
        match serde_json::to_string(error) {
            Ok(line) => {
                lines.push_str(&line);
                lines.push('\n');
            }
            Err(e) => warn!(error = %e, "Could not serialize lookup error"),
        }
    }

    let result = async {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(error_path)
            .await?;
        file.write_all(lines.as_bytes()).await?;
        file.flush().await
    }
    .await;

    if let Err(e) = result {
        warn!(path = %error_path.display(), error = %e, "Could not append to error file");
    }
}
