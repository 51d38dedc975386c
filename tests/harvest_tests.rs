//! End-to-end harvest tests
//!
//! Drives the full orchestration against a mocked search API, a
//! scripted tweet lookup, and an in-memory object store.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use talkwalker_harvester::config::Config;
use talkwalker_harvester::driver::Driver;
use talkwalker_harvester::error::{HarvestError, Result};
use talkwalker_harvester::hash::{partition_key, PartitionKeyInput};
use talkwalker_harvester::request::HarvestRequest;
use talkwalker_harvester::schemas::TwitterData;
use talkwalker_harvester::sources::twitter::{TweetLookup, TweetLookupError, TweetLookupResult};
use talkwalker_harvester::storage::ObjectStorage;

/// In-memory object store capturing uploads.
struct MemoryStore {
    authenticated: bool,
    uploads: Mutex<Vec<(String, String, Vec<u8>)>>,
}

impl MemoryStore {
    fn new() -> Self {
        Self {
            authenticated: true,
            uploads: Mutex::new(Vec::new()),
        }
    }

    fn unauthenticated() -> Self {
        Self {
            authenticated: false,
            uploads: Mutex::new(Vec::new()),
        }
    }

    fn uploads(&self) -> Vec<(String, String, Vec<u8>)> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectStorage for MemoryStore {
    async fn authenticate(&self) -> bool {
        self.authenticated
    }

    async fn upload_file(&self, local_path: &Path, bucket: &str, key: &str) -> bool {
        let content = std::fs::read(local_path).unwrap_or_default();
        self.uploads
            .lock()
            .unwrap()
            .push((bucket.to_string(), key.to_string(), content));
        true
    }
}

/// Lookup that resolves every requested id and records call shapes.
struct ResolvingLookup {
    calls: Mutex<Vec<usize>>,
    unresolved: Vec<String>,
}

impl ResolvingLookup {
    fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            unresolved: Vec::new(),
        }
    }

    fn with_unresolved(ids: &[&str]) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            unresolved: ids.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn call_sizes(&self) -> Vec<usize> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TweetLookup for ResolvingLookup {
    async fn get_tweets_by_ids(
        &self,
        ids: &[String],
        _error_path: &Path,
    ) -> Result<TweetLookupResult> {
        self.calls.lock().unwrap().push(ids.len());

        let mut data = Vec::new();
        let mut errors = Vec::new();
        for id in ids {
            if self.unresolved.contains(id) {
                errors.push(TweetLookupError {
                    value: id.clone(),
                    detail: serde_json::Map::new(),
                });
            } else {
                data.push(TwitterData {
                    id: Some(id.clone()),
                    text: Some(format!("tweet body for {}", id)),
                    created_at: Some("2024-01-01T10:15:00.000Z".to_string()),
                    author_id: Some("7".to_string()),
                    ..TwitterData::default()
                });
            }
        }
        Ok(TweetLookupResult { data, errors })
    }
}

fn test_config(api_base_url: String, data_dir: PathBuf) -> Config {
    Config {
        api_key: Some("tw-key".to_string()),
        twitter_token: Some("bearer".to_string()),
        api_base_url,
        page_size: 500,
        max_retries: 1,
        page_gap_ms: 1,
        page_floor_ms: 1,
        tweet_retry_cooldown_ms: 1,
        bucket_location: Some("harvest-bucket".to_string()),
        data_dir,
        s3_endpoint_url: None,
        tw_backfill_start_date: None,
        tw_project_id: None,
        tw_topic_id: None,
        tw_download_news: None,
        project_id: None,
    }
}

fn harvest_request(from: &str, to: &str) -> HarvestRequest {
    HarvestRequest::new("proj", "topic", "task-1", Some(from), Some(to), false, 500, 1).unwrap()
}

async fn mount_names(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/v1/search/info"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result_accinfo": {
                "projects": [{"id": "proj", "name": "Project One"}]
            }
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v2/talkwalker/p/proj/resources"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result_resources": {
                "projects": [{
                    "topics": [{
                        "title": "Venture A",
                        "nodes": [{"id": "topic", "title": "Topic A"}]
                    }]
                }]
            }
        })))
        .mount(server)
        .await;
}

async fn mount_estimate(server: &MockServer, required: i64, available: i64, enough: bool) {
    Mock::given(method("GET"))
        .and(path("/api/v2/talkwalker/p/proj/credits/estimate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "required_credits": required,
            "available_credits": available,
            "enough_credits_available": enough,
        })))
        .mount(server)
        .await;
}

/// Catch-all for windows with no results.
async fn mount_empty_search(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/v1/search/p/proj/results"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"result_content": {"data": []}})),
        )
        .with_priority(50)
        .mount(server)
        .await;
}

fn window_filter(epoch_start: i64) -> String {
    format!(
        "(published:>={} AND published:<{})",
        epoch_start,
        epoch_start + 3600
    )
}

fn search_body(items: Vec<Value>) -> Value {
    let wrapped: Vec<Value> = items.into_iter().map(|i| json!({ "data": i })).collect();
    json!({"result_content": {"data": wrapped}})
}

// 2024-01-01T00:00:00Z
const DAY_ONE: i64 = 1_704_067_200;

#[tokio::test]
async fn full_run_merges_uploads_and_reports() {
    let server = MockServer::start().await;
    mount_names(&server).await;
    mount_estimate(&server, 4, 100, true).await;
    mount_empty_search(&server).await;

    // Hour 0 carries two plain records and two twitter records.
    Mock::given(method("GET"))
        .and(path("/api/v1/search/p/proj/results"))
        .and(query_param("q", window_filter(DAY_ONE)))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_body(vec![
            json!({"url": "https://www.chronicle.example.com/a", "published": 1_704_067_300_000_i64, "title": "A"}),
            json!({"url": "https://www.gazette.example.org/b", "published": "", "title": "B"}),
            json!({"external_provider": "twitter", "external_id": "901", "published": 0,
                   "url": "https://twitter.com/u/status/901"}),
            json!({"external_provider": "twitter", "external_id": "902", "published": 1_704_067_400_000_i64,
                   "url": "https://twitter.com/u/status/902"}),
        ])))
        .with_priority(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = test_config(server.uri(), dir.path().to_path_buf());
    let store = MemoryStore::new();
    let lookup = ResolvingLookup::new();
    let driver = Driver::new(&config, &store, &lookup);

    let request = harvest_request("2024-01-01", "2024-01-01");
    let metadata = driver.run(&request).await.unwrap();

    // Sidecar metadata
    let expected_hash = partition_key(&PartitionKeyInput {
        project_id: "proj",
        topic_id: "topic",
        get_news_links: false,
    });
    assert_eq!(metadata.query_hash, expected_hash);
    assert_eq!(metadata.project_name, "Project One");
    assert_eq!(metadata.topic_name, "Topic A");
    assert_eq!(metadata.venture_name, "Venture A");
    assert_eq!(metadata.vendor_name, "talkwalker");
    assert_eq!(
        metadata.talkwalker_output,
        format!(
            "s3://harvest-bucket/raw/talkwalker/{}/2024-01-01_2024-01-01/file_1.jsonl",
            expected_hash
        )
    );
    assert!(metadata.output_template.starts_with("raw/{}/"));

    // Uploads: the artifact and its sidecar
    let uploads = store.uploads();
    assert_eq!(uploads.len(), 2);
    let (bucket, jsonl_key, jsonl_bytes) = &uploads[0];
    assert_eq!(bucket, "harvest-bucket");
    assert_eq!(
        jsonl_key,
        &format!(
            "raw/talkwalker/{}/2024-01-01_2024-01-01/file_1.jsonl",
            expected_hash
        )
    );
    assert!(uploads[1].1.ends_with(&format!("xcom_{}.json", expected_hash)));

    // Artifact content: four records, unflagged first (flagged wait
    // for the end-of-stream reconcile flush)
    let content = String::from_utf8(jsonl_bytes.clone()).unwrap();
    let lines: Vec<Value> = content
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[0]["source"], "example");
    assert_eq!(lines[0]["published"], 1_704_067_300);
    assert_eq!(lines[0]["x-p6m-publish-source"], "talkwalker");
    assert_eq!(lines[1]["published"], 0);
    assert_eq!(lines[1]["x-p6m-publish-source"], Value::Null);

    // Merged tweets: content, word count, url swapped to the tweet id
    let tweet_901 = lines.iter().find(|l| l["url"] == "901").unwrap();
    assert_eq!(tweet_901["content"], "tweet body for 901");
    assert_eq!(tweet_901["word_count"], 4);
    // Sentinel publish time was replaced by the tweet timestamp
    assert_eq!(tweet_901["x-p6m-publish-source"], "twitter");
    let tweet_902 = lines.iter().find(|l| l["url"] == "902").unwrap();
    // Valid publish time is kept
    assert_eq!(tweet_902["published"], 1_704_067_400);
    assert_eq!(tweet_902["x-p6m-publish-source"], "talkwalker");

    // Partition idempotence: a later run over other dates shares the key
    let store2 = MemoryStore::new();
    let lookup2 = ResolvingLookup::new();
    let driver2 = Driver::new(&config, &store2, &lookup2);
    let request2 = harvest_request("2024-02-01", "2024-02-01");
    let metadata2 = driver2.run(&request2).await.unwrap();
    assert_eq!(metadata2.query_hash, expected_hash);
}

#[tokio::test]
async fn invalid_topic_aborts_before_any_retrieval() {
    let server = MockServer::start().await;
    mount_names(&server).await;
    mount_estimate(&server, -1, 100, true).await;
    mount_empty_search(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let config = test_config(server.uri(), dir.path().to_path_buf());
    let store = MemoryStore::new();
    let lookup = ResolvingLookup::new();
    let driver = Driver::new(&config, &store, &lookup);

    let err = driver
        .run(&harvest_request("2024-01-01", "2024-01-01"))
        .await
        .unwrap_err();
    assert!(matches!(err, HarvestError::InvalidTopic(_)));

    // No search page was ever requested, nothing was uploaded
    let search_hits = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == "/api/v1/search/p/proj/results")
        .count();
    assert_eq!(search_hits, 0);
    assert!(store.uploads().is_empty());
}

#[tokio::test]
async fn insufficient_credits_abort_the_run() {
    let server = MockServer::start().await;
    mount_names(&server).await;
    mount_estimate(&server, 5000, 10, false).await;
    mount_empty_search(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let config = test_config(server.uri(), dir.path().to_path_buf());
    let store = MemoryStore::new();
    let lookup = ResolvingLookup::new();
    let driver = Driver::new(&config, &store, &lookup);

    let err = driver
        .run(&harvest_request("2024-01-01", "2024-01-01"))
        .await
        .unwrap_err();
    assert!(matches!(err, HarvestError::InsufficientCredits { .. }));
}

#[tokio::test]
async fn failed_storage_auth_stops_before_api_work() {
    let server = MockServer::start().await;

    let dir = tempfile::tempdir().unwrap();
    let config = test_config(server.uri(), dir.path().to_path_buf());
    let store = MemoryStore::unauthenticated();
    let lookup = ResolvingLookup::new();
    let driver = Driver::new(&config, &store, &lookup);

    let err = driver
        .run(&harvest_request("2024-01-01", "2024-01-01"))
        .await
        .unwrap_err();
    assert!(matches!(err, HarvestError::StorageError(_)));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn one_hundred_fifty_flagged_records_reconcile_in_two_calls() {
    let server = MockServer::start().await;
    mount_names(&server).await;
    mount_estimate(&server, 150, 1000, true).await;
    mount_empty_search(&server).await;

    let items: Vec<Value> = (0..150)
        .map(|i| {
            json!({
                "external_provider": "twitter",
                "external_id": format!("{}", 1000 + i),
                "published": 0,
                "url": format!("https://twitter.com/u/status/{}", 1000 + i),
            })
        })
        .collect();
    Mock::given(method("GET"))
        .and(path("/api/v1/search/p/proj/results"))
        .and(query_param("q", window_filter(DAY_ONE)))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_body(items)))
        .with_priority(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = test_config(server.uri(), dir.path().to_path_buf());
    let store = MemoryStore::new();
    let lookup = ResolvingLookup::new();
    let driver = Driver::new(&config, &store, &lookup);

    driver
        .run(&harvest_request("2024-01-01", "2024-01-01"))
        .await
        .unwrap();

    // The batch threshold fires once mid-stream, the remainder
    // flushes at end-of-stream.
    assert_eq!(lookup.call_sizes(), vec![100, 50]);

    let uploads = store.uploads();
    let content = String::from_utf8(uploads[0].2.clone()).unwrap();
    assert_eq!(content.lines().count(), 150);
}

#[tokio::test]
async fn unresolved_tweets_fall_back_annotated_in_output() {
    let server = MockServer::start().await;
    mount_names(&server).await;
    mount_estimate(&server, 2, 1000, true).await;
    mount_empty_search(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/v1/search/p/proj/results"))
        .and(query_param("q", window_filter(DAY_ONE)))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_body(vec![
            json!({"external_provider": "twitter", "external_id": "600", "published": 0,
                   "url": "https://twitter.com/u/status/600"}),
            json!({"external_provider": "twitter", "external_id": "601", "published": 0,
                   "url": "https://twitter.com/u/status/601"}),
        ])))
        .with_priority(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = test_config(server.uri(), dir.path().to_path_buf());
    let store = MemoryStore::new();
    // Id 601 never resolves: three rounds, then an annotated fallback.
    let lookup = ResolvingLookup::with_unresolved(&["601"]);
    let driver = Driver::new(&config, &store, &lookup);

    driver
        .run(&harvest_request("2024-01-01", "2024-01-01"))
        .await
        .unwrap();

    // One full batch call plus two retry rounds over the single id
    assert_eq!(lookup.call_sizes(), vec![2, 1, 1]);

    let uploads = store.uploads();
    let content = String::from_utf8(uploads[0].2.clone()).unwrap();
    let lines: Vec<Value> = content
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 2);

    let merged = lines.iter().find(|l| l["url"] == "600").unwrap();
    assert!(merged["twitter_error"].is_null());
    let fallback = lines
        .iter()
        .find(|l| l["external_id"] == "601")
        .unwrap();
    assert_eq!(fallback["twitter_error"]["value"], "601");
    // Never hydrated: the original record shape is preserved
    assert_eq!(fallback["url"], "https://twitter.com/u/status/601");
    assert!(fallback["content"].is_null());
}
