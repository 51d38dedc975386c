//! Harvest orchestration
//!
//! Sequences one run end to end: storage auth → name resolution →
//! credit check → windowed retrieval → tweet reconciliation → file
//! sink → upload → sidecar metadata. Owns the counters and the
//! terminal outcome; any error that reaches the top of `run` is fatal
//! for the process.

use std::path::PathBuf;

use chrono::Utc;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::config::Config;
use crate::counters::JobCounters;
use crate::credits;
use crate::error::{HarvestError, Result};
use crate::hash::{partition_key, PartitionKeyInput};
use crate::normalize::Normalizer;
use crate::paginate::WindowedPaginator;
use crate::reconcile::{TweetReconciler, TWEET_BATCH_SIZE};
use crate::request::HarvestRequest;
use crate::schemas::TalkwalkerRecord;
use crate::sink::JsonlSink;
use crate::sources::twitter::TweetLookup;
use crate::sources::TalkwalkerClient;
use crate::storage::ObjectStorage;
use crate::windows::hourly_windows;

/// Vendor name; also the application segment of the storage keys.
pub const APPLICATION_NAME: &str = "talkwalker";
/// Single-file output for now; kept in the key for future splitting.
const PARTITION_NUM: u32 = 1;

/// Sidecar metadata describing where the run's output landed and what
/// query produced it. Returned as the run result and uploaded next to
/// the artifact.
#[derive(Debug, Clone, Serialize)]
pub struct XcomMetadata {
    /// Key template with the application segment left as `{}` for
    /// downstream drivers
    pub output_template: String,
    pub xcom_template: String,
    /// Full s3 URI of the harvested artifact
    pub talkwalker_output: String,
    pub query_hash: String,
    pub project_id: String,
    pub topic_id: String,
    pub from_date: String,
    pub to_date: String,
    pub project_name: String,
    pub topic_name: String,
    pub vendor_name: String,
    pub source_format: String,
    pub venture_name: String,
}

/// One-shot harvest driver. Dependencies are injected so the whole
/// run can be exercised against mocks.
pub struct Driver<'a> {
    config: &'a Config,
    storage: &'a dyn ObjectStorage,
    tweet_lookup: &'a dyn TweetLookup,
}

impl<'a> Driver<'a> {
    pub fn new(
        config: &'a Config,
        storage: &'a dyn ObjectStorage,
        tweet_lookup: &'a dyn TweetLookup,
    ) -> Self {
        Self {
            config,
            storage,
            tweet_lookup,
        }
    }

    /// Runs the full harvest. Any `Err` from here is fatal.
    pub async fn run(&self, request: &HarvestRequest) -> Result<XcomMetadata> {
        let started = Instant::now();
        let bucket = self.config.bucket().to_string();
        if bucket.is_empty() {
            return Err(HarvestError::MissingConfig("BUCKET_LOCATION".to_string()));
        }

        info!(
            version = env!("CARGO_PKG_VERSION"),
            task = %request.task_id,
            topic = %request.topic_id,
            from = %request.from_date_str(),
            to = %request.to_date_str(),
            news_links = request.get_news_links,
            "Harvest run starting"
        );

        if !self.storage.authenticate().await {
            return Err(HarvestError::StorageError(
                "object storage credentials are missing".to_string(),
            ));
        }

        let client = TalkwalkerClient::new(
            &self.config.api_base_url,
            self.config.api_key(),
            &request.project_id,
            &request.topic_id,
            request.page_size,
        )?;

        let (project_name, (topic_name, venture_name)) = client
            .get_project_topic_names(&request.project_id, &request.topic_id)
            .await?;
        info!(project = %project_name, topic = %topic_name, venture = %venture_name, "Resolved names");

        // Quota gate: retrieval does not start unless the topic is
        // valid and affordable.
        let http = reqwest::Client::builder().build()?;
        let estimate = credits::estimate(
            &http,
            &self.config.api_base_url,
            self.config.api_key(),
            &request.topic_id,
            &request.project_id,
        )
        .await?;
        estimate.ensure_executable(&request.topic_id)?;

        let mut counters = JobCounters::new();
        counters.required_credits = estimate.required_credits;
        info!(
            topic = %request.topic_id,
            total_expected = estimate.required_credits,
            "Topic validated, starting retrieval"
        );

        let paths = self.prepare_run_files(&request.topic_id).await?;
        info!(output = %paths.output.display(), errors = %paths.errors.display(), "Local run files");

        let mut output = JsonlSink::new(&paths.output);
        let mut normalizer = Normalizer::new(
            request.get_news_links,
            JsonlSink::new(&paths.attribution),
        )?;
        let reconciler = TweetReconciler::with_policy(
            self.tweet_lookup,
            &paths.errors,
            self.config.tweet_retry_policy(),
        );

        let windows = hourly_windows(request.from_date, request.to_date);
        let mut paginator = WindowedPaginator::with_pacing(
            &client,
            windows,
            request.max_retries,
            self.config.pacing(),
        );

        let mut pending: Vec<TalkwalkerRecord> = Vec::new();

        while let Some(batch) = paginator.next_batch(&mut normalizer, &mut counters).await? {
            for record in batch.records {
                if record.is_twitter() {
                    pending.push(record);
                    if pending.len() >= TWEET_BATCH_SIZE {
                        let flagged = std::mem::take(&mut pending);
                        info!(batched = flagged.len(), "Reconciling tweet batch");
                        let merged = reconciler.reconcile(flagged, &mut counters).await?;
                        counters.total_saved += merged.len() as u64;
                        output.append_all(&merged).await?;
                    }
                } else {
                    counters.total_saved += 1;
                    output.append(&record).await?;
                }
            }

            let status = counters.status();
            info!(
                retrieved = status.total_retrieved,
                twitter = status.total_twitter,
                twitter_errors = status.twitter_errors,
                saved = status.total_saved,
                remaining = counters.required_credits - status.total_retrieved as i64,
                "Progress"
            );
            if counters.has_errors() {
                warn!(errors = ?status.latest_errors, "Recent errors");
            }
        }

        // Remainder below the batch threshold still reconciles.
        if !pending.is_empty() {
            let flagged = std::mem::take(&mut pending);
            info!(batched = flagged.len(), "Reconciling final tweet batch");
            let merged = reconciler.reconcile(flagged, &mut counters).await?;
            counters.total_saved += merged.len() as u64;
            output.append_all(&merged).await?;
        }

        let status = counters.status();
        info!(
            retrieved = status.total_retrieved,
            twitter = status.total_twitter,
            twitter_errors = status.twitter_errors,
            saved = status.total_saved,
            expected = counters.required_credits,
            elapsed_secs = started.elapsed().as_secs(),
            "Harvest complete, saving results"
        );

        let hash_id = partition_key(&PartitionKeyInput {
            project_id: &request.project_id,
            topic_id: &request.topic_id,
            get_news_links: request.get_news_links,
        });
        info!(hash = %hash_id, "Partition key");

        let from = request.from_date_str();
        let to = request.to_date_str();
        let output_template = format!(
            "raw/{{}}/{}/{}_{}/file_{}.jsonl",
            hash_id, from, to, PARTITION_NUM
        );
        let xcom_template = format!("raw/{{}}/{}/{}_{}/xcom_{}.json", hash_id, from, to, hash_id);

        let jsonl_key = output_template.replacen("{}", APPLICATION_NAME, 1);
        let xcom_key = xcom_template.replacen("{}", APPLICATION_NAME, 1);

        if !self
            .storage
            .upload_file(&paths.output, &bucket, &jsonl_key)
            .await
        {
            warn!(bucket = %bucket, key = %jsonl_key, "Output upload failed");
        } else {
            info!(key = %jsonl_key, "Output written");
        }

        let metadata = XcomMetadata {
            output_template,
            xcom_template,
            talkwalker_output: format!("s3://{}/{}", bucket, jsonl_key),
            query_hash: hash_id.clone(),
            project_id: request.project_id.clone(),
            topic_id: request.topic_id.clone(),
            from_date: from,
            to_date: to,
            project_name,
            topic_name,
            vendor_name: APPLICATION_NAME.to_string(),
            source_format: "json".to_string(),
            venture_name,
        };

        let xcom_path = paths.data_dir.join(format!("xcom_{}.json", hash_id));
        tokio::fs::write(&xcom_path, serde_json::to_vec(&metadata)?).await?;
        if !self
            .storage
            .upload_file(&xcom_path, &bucket, &xcom_key)
            .await
        {
            warn!(bucket = %bucket, key = %xcom_key, "Sidecar upload failed");
        }

        info!(
            task = %request.task_id,
            output = %metadata.talkwalker_output,
            "Job complete"
        );

        Ok(metadata)
    }

    /// Creates the local data directory and derives per-run file
    /// paths, timestamped so reruns never collide.
    async fn prepare_run_files(&self, topic_id: &str) -> Result<RunFiles> {
        let data_dir = self.config.data_dir.clone();
        tokio::fs::create_dir_all(&data_dir).await?;

        let timestamp = Utc::now().timestamp();
        let stem = format!("{}_{}_{}", APPLICATION_NAME, topic_id, timestamp);

        Ok(RunFiles {
            output: data_dir.join(format!("{}.jsonl", stem)),
            errors: data_dir.join(format!("{}.errors.txt", stem)),
            attribution: data_dir.join(format!(
                "{}_{}_attribution_logs_{}.jsonl",
                APPLICATION_NAME, topic_id, timestamp
            )),
            data_dir,
        })
    }
}

struct RunFiles {
    data_dir: PathBuf,
    output: PathBuf,
    errors: PathBuf,
    attribution: PathBuf,
}
