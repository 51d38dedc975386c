//! Error types for the harvester

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HarvestError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("JSON parsing failed: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(#[from] config::ConfigError),

    #[error("Missing required configuration: {0}")]
    MissingConfig(String),

    #[error("API error: {code} - {message}")]
    ApiError { code: String, message: String },

    #[error("Invalid topic id: {0}")]
    InvalidTopic(String),

    #[error("Insufficient credits for topic {topic_id}: available {available}, required {required}")]
    InsufficientCredits {
        topic_id: String,
        available: i64,
        required: i64,
    },

    #[error("Unknown project id: {0}")]
    UnknownProject(String),

    #[error("Unknown topic id {topic_id} in project {project_id}")]
    UnknownTopic {
        project_id: String,
        topic_id: String,
    },

    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

pub type Result<T> = std::result::Result<T, HarvestError>;
