//! Talkwalker search API client
//!
//! One page fetch per call; the windowed paginator owns the traversal.
//! Also resolves project/topic display names for the run metadata.

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{HarvestError, Result};

/// Request timeout for search pages. Matches the upstream client.
const PAGE_TIMEOUT: Duration = Duration::from_secs(10);

/// One fetched search page: the raw items plus the cursor for the
/// page after it, if any.
#[derive(Debug)]
pub struct SearchPage {
    pub items: Vec<Value>,
    pub next_offset: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    result_content: Option<ResultContent>,
    #[serde(default)]
    pagination: Option<Pagination>,
}

#[derive(Debug, Deserialize)]
struct ResultContent {
    data: Option<Vec<ResultItem>>,
}

/// Items arrive wrapped in a `data` envelope.
#[derive(Debug, Deserialize)]
struct ResultItem {
    data: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct Pagination {
    #[serde(default)]
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AccountInfoResponse {
    result_accinfo: AccountInfo,
}

#[derive(Debug, Deserialize)]
struct AccountInfo {
    projects: Vec<ProjectInfo>,
}

#[derive(Debug, Deserialize)]
struct ProjectInfo {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct ResourcesResponse {
    result_resources: Resources,
}

#[derive(Debug, Deserialize)]
struct Resources {
    projects: Vec<ResourceProject>,
}

#[derive(Debug, Deserialize)]
struct ResourceProject {
    #[serde(default)]
    topics: Vec<ResourceTopic>,
}

#[derive(Debug, Deserialize)]
struct ResourceTopic {
    title: String,
    #[serde(default)]
    nodes: Vec<ResourceNode>,
}

#[derive(Debug, Deserialize)]
struct ResourceNode {
    id: String,
    title: String,
}

/// Thin client over the search endpoints.
pub struct TalkwalkerClient {
    http: reqwest::Client,
    base_url: String,
    access_token: String,
    project_id: String,
    topic_id: String,
    page_size: u32,
}

impl TalkwalkerClient {
    pub fn new(
        base_url: impl Into<String>,
        access_token: impl Into<String>,
        project_id: impl Into<String>,
        topic_id: impl Into<String>,
        page_size: u32,
    ) -> Result<Self> {
        Self::with_timeout(
            base_url,
            access_token,
            project_id,
            topic_id,
            page_size,
            PAGE_TIMEOUT,
        )
    }

    pub fn with_timeout(
        base_url: impl Into<String>,
        access_token: impl Into<String>,
        project_id: impl Into<String>,
        topic_id: impl Into<String>,
        page_size: u32,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .gzip(true)
            .brotli(true)
            .user_agent(concat!("talkwalker-harvester/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into(),
            access_token: access_token.into(),
            project_id: project_id.into(),
            topic_id: topic_id.into(),
            page_size,
        })
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Fetches one search page for a window filter at the given offset.
    pub async fn fetch_results_page(&self, query_filter: &str, offset: u64) -> Result<SearchPage> {
        let url = format!(
            "{}/api/v1/search/p/{}/results",
            self.base_url, self.project_id
        );

        let hpp = self.page_size.to_string();
        let offset_param = offset.to_string();
        let params = [
            ("access_token", self.access_token.as_str()),
            ("topic", self.topic_id.as_str()),
            ("hpp", hpp.as_str()),
            ("offset", offset_param.as_str()),
            ("project_id", self.project_id.as_str()),
            ("q", query_filter),
        ];

        debug!(offset, filter = %query_filter, "Fetching search page");

        let response = self.http.get(&url).query(&params).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HarvestError::ApiError {
                code: status.to_string(),
                message: body,
            });
        }

        let parsed: SearchResponse = response.json().await?;

        let items: Vec<Value> = parsed
            .result_content
            .and_then(|c| c.data)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|item| item.data)
            .collect();

        let next_offset = parsed
            .pagination
            .unwrap_or_default()
            .next
            .as_deref()
            .and_then(extract_offset_from_next);

        Ok(SearchPage { items, next_offset })
    }

    /// Project id → display name, from the account info endpoint.
    pub async fn get_projects(&self) -> Result<HashMap<String, String>> {
        let url = format!(
            "{}/api/v1/search/info?access_token={}",
            self.base_url, self.access_token
        );
        let response = self.http.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(HarvestError::ApiError {
                code: status.to_string(),
                message: "invalid access token or service unavailable".to_string(),
            });
        }

        let parsed: AccountInfoResponse = response.json().await?;
        Ok(parsed
            .result_accinfo
            .projects
            .into_iter()
            .map(|p| (p.id, p.name))
            .collect())
    }

    /// Topic node id → `(topic_name, venture_name)` for a project.
    pub async fn get_all_topic_ids(
        &self,
        project_id: &str,
    ) -> Result<HashMap<String, (String, String)>> {
        let url = format!(
            "{}/api/v2/talkwalker/p/{}/resources?type=search&access_token={}",
            self.base_url, project_id, self.access_token
        );
        let response = self.http.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(HarvestError::ApiError {
                code: status.to_string(),
                message: "invalid access token, invalid project id or service unavailable"
                    .to_string(),
            });
        }

        let parsed: ResourcesResponse = response.json().await?;
        let mut topics = HashMap::new();
        for project in parsed.result_resources.projects {
            for topic in project.topics {
                for node in topic.nodes {
                    topics.insert(node.id, (node.title, topic.title.clone()));
                }
            }
        }
        Ok(topics)
    }

    /// Resolves `(project_name, (topic_name, venture_name))`, failing
    /// on ids the account does not know.
    pub async fn get_project_topic_names(
        &self,
        project_id: &str,
        topic_id: &str,
    ) -> Result<(String, (String, String))> {
        let projects = self.get_projects().await?;
        let topics = self.get_all_topic_ids(project_id).await?;

        let project_name = projects
            .get(project_id)
            .cloned()
            .ok_or_else(|| HarvestError::UnknownProject(project_id.to_string()))?;
        let topic_names = topics
            .get(topic_id)
            .cloned()
            .ok_or_else(|| HarvestError::UnknownTopic {
                project_id: project_id.to_string(),
                topic_id: topic_id.to_string(),
            })?;

        Ok((project_name, topic_names))
    }
}

/// Pulls the `offset` query parameter out of a pagination `next` URL
/// by string search. Accepts an offset terminated by `&` or by the end
/// of the string.
pub fn extract_offset_from_next(next_url: &str) -> Option<u64> {
    const OFFSET_KEY: &str = "offset=";
    let start = next_url.find(OFFSET_KEY)? + OFFSET_KEY.len();
    let rest = &next_url[start..];
    let end = rest.find('&').unwrap_or(rest.len());
    rest[..end].parse().ok()
}
