//! Tweet reconciliation
//!
//! Flagged records carry an id into the Twitter batch lookup. One
//! round resolves what it can; unresolved ids wait out a cooldown and
//! retry, twice more at most. Every record that enters a batch leaves
//! it exactly once — merged when its tweet resolved, annotated and
//! emitted as-is when it did not.

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::DateTime;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::counters::JobCounters;
use crate::error::{HarvestError, Result};
use crate::retry::RetryPolicy;
use crate::schemas::{TalkwalkerRecord, TwitterData};
use crate::sources::twitter::{TweetLookup, TweetLookupError};

/// Flagged records are reconciled once this many have accumulated.
pub const TWEET_BATCH_SIZE: usize = 100;

/// Batch reconciler over a tweet lookup implementation.
pub struct TweetReconciler<'a> {
    lookup: &'a dyn TweetLookup,
    retry: RetryPolicy,
    error_path: PathBuf,
}

impl<'a> TweetReconciler<'a> {
    pub fn new(lookup: &'a dyn TweetLookup, error_path: impl Into<PathBuf>) -> Self {
        Self::with_policy(lookup, error_path, RetryPolicy::tweet_lookup())
    }

    pub fn with_policy(
        lookup: &'a dyn TweetLookup,
        error_path: impl Into<PathBuf>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            lookup,
            retry,
            error_path: error_path.into(),
        }
    }

    /// Resolves and merges one batch of flagged records. The output
    /// holds exactly one record per input record.
    pub async fn reconcile(
        &self,
        records: Vec<TalkwalkerRecord>,
        counters: &mut JobCounters,
    ) -> Result<Vec<TalkwalkerRecord>> {
        let batch_size = records.len();
        let ids: Vec<String> = records
            .iter()
            .filter_map(|r| r.external_id.clone())
            .collect();

        let (resolved, unresolved) = self.lookup_with_retries(ids).await?;

        let resolved_by_id: HashMap<&str, &TwitterData> = resolved
            .iter()
            .filter_map(|t| t.id.as_deref().map(|id| (id, t)))
            .collect();
        let errors_by_id: HashMap<&str, &TweetLookupError> = unresolved
            .iter()
            .map(|e| (e.value.as_str(), e))
            .collect();

        let mut output = Vec::with_capacity(batch_size);
        let mut failure_count: u64 = 0;

        for mut record in records {
            let tweet = record
                .external_id
                .as_deref()
                .and_then(|id| resolved_by_id.get(id).copied());

            match tweet {
                Some(tweet) => {
                    if let Err(e) = merge_tweet_data(&mut record, tweet) {
                        error!(
                            tweet_id = tweet.id.as_deref().unwrap_or("?"),
                            error = %e,
                            "Exception in tweet merge"
                        );
                        counters.log_error(format!("tweet merge: {}", e));
                    }
                    output.push(record);
                }
                None => {
                    let annotation = record
                        .external_id
                        .as_deref()
                        .and_then(|id| errors_by_id.get(id).copied())
                        .map(|e| serde_json::to_value(e).unwrap_or(Value::Null))
                        .unwrap_or_else(|| {
                            Value::String("tweet id missing from lookup response".to_string())
                        });
                    record.twitter_error = Some(annotation);
                    // A fallback record was never hydrated; it cannot
                    // claim a Twitter-supplied publish time.
                    if record.publish_source.as_deref() == Some("twitter") {
                        record.publish_source = None;
                    }
                    failure_count += 1;
                    output.push(record);
                }
            }
        }

        counters.twitter_errors += failure_count;

        info!(
            batch = batch_size,
            valid = resolved.len(),
            invalid = unresolved.len(),
            merged = output.len(),
            "Tweets merged"
        );

        Ok(output)
    }

    /// Runs the bounded lookup rounds: full id list first, then only
    /// the unresolved subset after each cooldown.
    async fn lookup_with_retries(
        &self,
        ids: Vec<String>,
    ) -> Result<(Vec<TwitterData>, Vec<TweetLookupError>)> {
        if ids.is_empty() {
            return Ok((Vec::new(), Vec::new()));
        }

        let mut resolved: Vec<TwitterData> = Vec::new();
        let mut pending = ids;
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            let result = self
                .lookup
                .get_tweets_by_ids(&pending, &self.error_path)
                .await?;
            resolved.extend(result.data);

            if result.errors.is_empty() {
                return Ok((resolved, Vec::new()));
            }

            let unresolved_ids: Vec<String> =
                result.errors.iter().map(|e| e.value.clone()).collect();
            match self.retry.delay_after(attempt) {
                Some(cooldown) => {
                    info!(
                        attempt,
                        unresolved = unresolved_ids.len(),
                        ids = ?unresolved_ids,
                        "Unresolved tweet ids, retrying after cooldown"
                    );
                    tokio::time::sleep(cooldown).await;
                    pending = unresolved_ids;
                }
                None => {
                    warn!(
                        unresolved = unresolved_ids.len(),
                        ids = ?unresolved_ids,
                        "Tweet ids still unresolved after final round"
                    );
                    return Ok((resolved, result.errors));
                }
            }
        }
    }
}

/// Overlays a resolved tweet onto its originating record.
///
/// The tweet's text becomes the record content with a computed word
/// count, the raw payload is kept as provenance, and the publish time
/// is replaced only when the record arrived with a sentinel value.
pub fn merge_tweet_data(record: &mut TalkwalkerRecord, tweet: &TwitterData) -> Result<()> {
    let created_at_raw = tweet
        .created_at
        .as_deref()
        .ok_or_else(|| HarvestError::ParseError("tweet has no created_at".to_string()))?;
    let created_at: String = created_at_raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    let created_epoch = DateTime::parse_from_rfc3339(&created_at)
        .map_err(|e| HarvestError::ParseError(format!("tweet created_at: {}", e)))?
        .timestamp();

    let text = tweet
        .text
        .as_deref()
        .ok_or_else(|| HarvestError::ParseError("tweet has no text".to_string()))?;

    if record.published_is_sentinel() {
        record.published = Some(created_epoch);
        record.publish_source = Some("twitter".to_string());
    }

    record.word_count = text.split_whitespace().count() as i64;
    record.content = Some(text.to_string());
    if tweet.lang.is_some() {
        record.lang = tweet.lang.clone();
    }
    record.external_provider_attributes = Some(tweet.clone());
    record.url = tweet.id.clone();

    if tweet.author_id.is_none() {
        warn!(
            tweet_id = tweet.id.as_deref().unwrap_or("?"),
            "Author id is null for tweet"
        );
    }

    Ok(())
}
