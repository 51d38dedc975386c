//! Credit estimation
//!
//! One pre-flight call that decides whether the crawl starts at all.
//! No retry: without this number the run cannot proceed, so a failed
//! call is fatal.

use serde::Deserialize;
use tracing::info;

use crate::error::{HarvestError, Result};

/// Answer from the estimation endpoint.
#[derive(Debug, Clone, Copy)]
pub struct CreditEstimate {
    /// Credits the topic would consume; -1 marks an invalid topic id
    pub required_credits: i64,
    /// Credits left on the account
    pub available_credits: i64,
    /// Whether the account can afford the run
    pub sufficient: bool,
}

#[derive(Debug, Deserialize)]
struct CreditsResponse {
    required_credits: i64,
    available_credits: i64,
    enough_credits_available: bool,
}

/// Asks the API how many credits a full pull of `topic_id` would cost.
pub async fn estimate(
    http: &reqwest::Client,
    base_url: &str,
    access_token: &str,
    topic_id: &str,
    project_id: &str,
) -> Result<CreditEstimate> {
    let url = format!(
        "{}/api/v2/talkwalker/p/{}/credits/estimate",
        base_url, project_id
    );
    let params = [("access_token", access_token), ("topic", topic_id)];

    let response = http.get(&url).query(&params).send().await?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(HarvestError::ApiError {
            code: status.to_string(),
            message: body,
        });
    }

    let parsed: CreditsResponse = response.json().await?;

    info!(
        topic = %topic_id,
        required = parsed.required_credits,
        available = parsed.available_credits,
        sufficient = parsed.enough_credits_available,
        "Credit estimation"
    );

    Ok(CreditEstimate {
        required_credits: parsed.required_credits,
        available_credits: parsed.available_credits,
        sufficient: parsed.enough_credits_available,
    })
}

impl CreditEstimate {
    /// Fails the run for an invalid topic or an unaffordable one.
    pub fn ensure_executable(&self, topic_id: &str) -> Result<()> {
        if self.required_credits == -1 {
            return Err(HarvestError::InvalidTopic(topic_id.to_string()));
        }
        if !self.sufficient {
            return Err(HarvestError::InsufficientCredits {
                topic_id: topic_id.to_string(),
                available: self.available_credits,
                required: self.required_credits,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_topic_is_fatal() {
        let estimate = CreditEstimate {
            required_credits: -1,
            available_credits: 1000,
            sufficient: true,
        };
        let err = estimate.ensure_executable("bad-topic").unwrap_err();
        assert!(matches!(err, HarvestError::InvalidTopic(_)));
    }

    #[test]
    fn insufficient_credits_is_fatal() {
        let estimate = CreditEstimate {
            required_credits: 5000,
            available_credits: 100,
            sufficient: false,
        };
        let err = estimate.ensure_executable("topic").unwrap_err();
        assert!(matches!(err, HarvestError::InsufficientCredits { .. }));
    }

    #[test]
    fn affordable_topic_passes() {
        let estimate = CreditEstimate {
            required_credits: 100,
            available_credits: 1000,
            sufficient: true,
        };
        assert!(estimate.ensure_executable("topic").is_ok());
    }
}
