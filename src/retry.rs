//! Bounded retry policies
//!
//! The two call sites retry differently: page timeouts back off
//! linearly (5s, 10s, 15s, ...), tweet re-lookups wait a fixed
//! cooldown. Both are bounded; neither loops forever.

use std::time::Duration;

/// A bounded retry schedule: how many attempts, and how long to wait
/// before each retry (attempt numbers start at 1).
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    backoff: Backoff,
}

#[derive(Debug, Clone, Copy)]
enum Backoff {
    /// `base * attempt` before the next try
    Linear(Duration),
    /// Same wait before every retry
    Fixed(Duration),
}

impl RetryPolicy {
    /// Linear backoff: wait `base`, `2*base`, `3*base`, ...
    pub fn linear(max_attempts: u32, base: Duration) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Linear(base),
        }
    }

    /// Fixed cooldown between attempts.
    pub fn fixed(max_attempts: u32, cooldown: Duration) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Fixed(cooldown),
        }
    }

    /// Delay to sleep after a failed `attempt` (1-based), or `None`
    /// when the budget is spent.
    pub fn delay_after(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }
        Some(match self.backoff {
            Backoff::Linear(base) => base * attempt,
            Backoff::Fixed(cooldown) => cooldown,
        })
    }

    /// Policy for search-page timeouts: `max_retries` attempts,
    /// 5 seconds times the attempt number between tries.
    pub fn page_timeout(max_retries: u32) -> Self {
        Self::linear(max_retries.max(1), Duration::from_secs(5))
    }

    /// Policy for unresolved tweet ids: 3 lookups total with a fixed
    /// 15 second cooldown between rounds.
    pub fn tweet_lookup() -> Self {
        Self::fixed(3, Duration::from_secs(15))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_backoff_scales_with_attempt() {
        let policy = RetryPolicy::page_timeout(3);
        assert_eq!(policy.delay_after(1), Some(Duration::from_secs(5)));
        assert_eq!(policy.delay_after(2), Some(Duration::from_secs(10)));
        assert_eq!(policy.delay_after(3), None);
    }

    #[test]
    fn fixed_cooldown_is_constant() {
        let policy = RetryPolicy::tweet_lookup();
        assert_eq!(policy.delay_after(1), Some(Duration::from_secs(15)));
        assert_eq!(policy.delay_after(2), Some(Duration::from_secs(15)));
        assert_eq!(policy.delay_after(3), None);
    }

    #[test]
    fn zero_retry_config_still_attempts_once() {
        let policy = RetryPolicy::page_timeout(0);
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.delay_after(1), None);
    }
}
