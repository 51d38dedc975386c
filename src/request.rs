//! Harvest request
//!
//! The immutable per-run input. Dates arrive as strings from the task
//! payload (possibly with a time portion, possibly reversed, possibly
//! absent) and are normalized here once, before any API work.

use chrono::{Duration, NaiveDate, Utc};

use crate::error::{HarvestError, Result};

/// Normalized input for one harvest run.
#[derive(Debug, Clone)]
pub struct HarvestRequest {
    pub project_id: String,
    pub topic_id: String,
    pub task_id: String,
    /// Inclusive start of the harvested range
    pub from_date: NaiveDate,
    /// Inclusive end of the harvested range
    pub to_date: NaiveDate,
    /// Whether news-type records get full-article retrieval
    pub get_news_links: bool,
    pub page_size: u32,
    pub max_retries: u32,
}

impl HarvestRequest {
    /// Builds a request from raw task inputs. The start date defaults
    /// to today, the end date to 30 days after the start; a reversed
    /// range is swapped rather than rejected.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        project_id: impl Into<String>,
        topic_id: impl Into<String>,
        task_id: impl Into<String>,
        from_date: Option<&str>,
        to_date: Option<&str>,
        get_news_links: bool,
        page_size: u32,
        max_retries: u32,
    ) -> Result<Self> {
        let from = match from_date {
            Some(raw) => parse_date(raw)?,
            None => Utc::now().date_naive(),
        };
        let to = match to_date {
            Some(raw) => parse_date(raw)?,
            None => from + Duration::days(30),
        };

        // Reversed ranges are swapped, matching upstream behavior.
        let (from, to) = if from > to { (to, from) } else { (from, to) };

        Ok(Self {
            project_id: project_id.into(),
            topic_id: topic_id.into(),
            task_id: task_id.into(),
            from_date: from,
            to_date: to,
            get_news_links,
            page_size,
            max_retries,
        })
    }

    pub fn from_date_str(&self) -> String {
        self.from_date.format("%Y-%m-%d").to_string()
    }

    pub fn to_date_str(&self) -> String {
        self.to_date.format("%Y-%m-%d").to_string()
    }
}

/// Parses a `YYYY-MM-DD` date, tolerating a trailing time portion
/// (`"2023-11-16 00:00:00"` is accepted as `2023-11-16`).
pub fn parse_date(value: &str) -> Result<NaiveDate> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(HarvestError::InvalidDate("date was not supplied".to_string()));
    }
    let date_portion = trimmed.split_whitespace().next().unwrap_or("");
    NaiveDate::parse_from_str(date_portion, "%Y-%m-%d")
        .map_err(|_| HarvestError::InvalidDate(format!("incorrect format: [{}]", value)))
}
