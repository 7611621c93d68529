//! Application Configuration
//!
//! Tunables for the learning handlers and the registration consumer.

use std::time::Duration;

/// Retry schedule for outgoing email: `base_delay * 2^attempt`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (0-based)
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

/// Learning application configuration
#[derive(Debug, Clone)]
pub struct LearningConfig {
    /// How long a freshly registered user stays cached
    pub register_cache_ttl: Duration,
    /// How long a user found at login stays cached
    pub login_cache_ttl: Duration,
    /// Prefix for links sent by email
    pub app_base_url: String,
    pub email_retry: RetryPolicy,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            register_cache_ttl: Duration::from_secs(10),
            login_cache_ttl: Duration::from_secs(30 * 60),
            app_base_url: "http://localhost:8080".to_string(),
            email_retry: RetryPolicy::default(),
        }
    }
}

impl LearningConfig {
    /// Millisecond email backoff so tests and local runs do not stall
    pub fn development() -> Self {
        Self {
            email_retry: RetryPolicy {
                max_retries: 3,
                base_delay: Duration::from_millis(10),
            },
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(100),
        };
        assert_eq!(policy.delay(0), Duration::from_millis(100));
        assert_eq!(policy.delay(1), Duration::from_millis(200));
        assert_eq!(policy.delay(2), Duration::from_millis(400));
    }
}
