//! Configuration for the harvester
//!
//! Everything comes from the environment (plus an optional `.env` file).
//! Secrets (`API_KEY`, `TWITTER_TOKEN`) and the bucket are validated at
//! startup; tunables carry defaults.

use serde::Deserialize;
use std::path::PathBuf;

use crate::error::{HarvestError, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // Secrets (from deployment environment)
    pub api_key: Option<String>,
    pub twitter_token: Option<String>,

    // Talkwalker API
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    // Tunables
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_page_gap_ms")]
    pub page_gap_ms: u64,
    #[serde(default = "default_page_floor_ms")]
    pub page_floor_ms: u64,
    #[serde(default = "default_tweet_cooldown_ms")]
    pub tweet_retry_cooldown_ms: u64,

    // Output
    pub bucket_location: Option<String>,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    pub s3_endpoint_url: Option<String>,

    // Scheduled-run fallbacks (from the deployment config map)
    pub tw_backfill_start_date: Option<String>,
    pub tw_project_id: Option<String>,
    pub tw_topic_id: Option<String>,
    pub tw_download_news: Option<bool>,

    // Default project when the task omits one
    pub project_id: Option<String>,
}

fn default_api_base_url() -> String {
    "https://api.talkwalker.com".to_string()
}

fn default_page_size() -> u32 {
    500
}

fn default_max_retries() -> u32 {
    3
}

fn default_page_gap_ms() -> u64 {
    100 // upstream rate limits bite below this
}

fn default_page_floor_ms() -> u64 {
    1000
}

fn default_tweet_cooldown_ms() -> u64 {
    15_000
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

impl Config {
    pub fn load() -> Result<Self> {
        // Load .env file
        dotenvy::dotenv().ok();

        // Build config from environment
        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let cfg: Config = config.try_deserialize()?;
        Ok(cfg)
    }

    /// Validates required values before any API work. Fatal if missing.
    pub fn validate(&self) -> Result<()> {
        if self.api_key.as_deref().unwrap_or("").is_empty() {
            return Err(HarvestError::MissingConfig("API_KEY".to_string()));
        }
        if self.twitter_token.as_deref().unwrap_or("").is_empty() {
            return Err(HarvestError::MissingConfig("TWITTER_TOKEN".to_string()));
        }
        if self.bucket_location.as_deref().unwrap_or("").is_empty() {
            return Err(HarvestError::MissingConfig("BUCKET_LOCATION".to_string()));
        }
        Ok(())
    }

    pub fn api_key(&self) -> &str {
        self.api_key.as_deref().unwrap_or("")
    }

    pub fn twitter_token(&self) -> &str {
        self.twitter_token.as_deref().unwrap_or("")
    }

    pub fn bucket(&self) -> &str {
        self.bucket_location.as_deref().unwrap_or("")
    }

    pub fn pacing(&self) -> crate::paginate::Pacing {
        crate::paginate::Pacing {
            page_gap: std::time::Duration::from_millis(self.page_gap_ms),
            cycle_floor: std::time::Duration::from_millis(self.page_floor_ms),
        }
    }

    pub fn tweet_retry_policy(&self) -> crate::retry::RetryPolicy {
        crate::retry::RetryPolicy::fixed(
            3,
            std::time::Duration::from_millis(self.tweet_retry_cooldown_ms),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> Config {
        Config {
            api_key: Some("tw-key".to_string()),
            twitter_token: Some("tw-token".to_string()),
            api_base_url: default_api_base_url(),
            page_size: default_page_size(),
            max_retries: default_max_retries(),
            page_gap_ms: default_page_gap_ms(),
            page_floor_ms: default_page_floor_ms(),
            tweet_retry_cooldown_ms: default_tweet_cooldown_ms(),
            bucket_location: Some("harvest-bucket".to_string()),
            data_dir: default_data_dir(),
            s3_endpoint_url: None,
            tw_backfill_start_date: None,
            tw_project_id: None,
            tw_topic_id: None,
            tw_download_news: None,
            project_id: None,
        }
    }

    #[test]
    fn validate_accepts_complete_config() {
        assert!(minimal().validate().is_ok());
    }

    #[test]
    fn validate_rejects_missing_bucket() {
        let mut cfg = minimal();
        cfg.bucket_location = None;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("BUCKET_LOCATION"));
    }

    #[test]
    fn validate_rejects_empty_api_key() {
        let mut cfg = minimal();
        cfg.api_key = Some(String::new());
        assert!(cfg.validate().is_err());
    }
}
