use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Configuration for the polling engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollerConfig {
    /// Interval between polling rounds (default: 60s).
    pub poll_interval: Duration,
    /// HTTP request timeout for platform and token calls.
    pub request_timeout: Duration,
    /// Total attempts for a token exchange before the round is given up.
    pub token_retries: u32,
    /// Base backoff between token exchange attempts, scaled linearly.
    pub token_retry_backoff: Duration,
    /// Tokens are treated as expired this long before their real expiry.
    pub token_safety_margin: Duration,
    /// Maximum concurrent per-channel fetches for platforms without a batch query.
    pub max_concurrent_fetches: usize,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(60_000),
            request_timeout: Duration::from_secs(10),
            token_retries: 3,
            token_retry_backoff: Duration::from_secs(2),
            token_safety_margin: Duration::from_secs(5 * 60),
            max_concurrent_fetches: 4,
        }
    }
}

impl PollerConfig {
    pub fn with_poll_interval(mut self, ms: u64) -> Self {
        self.poll_interval = Duration::from_millis(ms);
        self
    }

    pub fn with_request_timeout(mut self, ms: u64) -> Self {
        self.request_timeout = Duration::from_millis(ms);
        self
    }

    pub fn with_token_retries(mut self, retries: u32) -> Self {
        self.token_retries = retries.max(1);
        self
    }

    pub fn with_token_retry_backoff(mut self, ms: u64) -> Self {
        self.token_retry_backoff = Duration::from_millis(ms);
        self
    }

    pub fn with_max_concurrent_fetches(mut self, max: usize) -> Self {
        self.max_concurrent_fetches = max.max(1);
        self
    }
}

/// Shared HTTP client for token exchanges, platform queries, and deliveries.
pub fn build_http_client(timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(5))
        .pool_max_idle_per_host(20)
        .gzip(true)
        .build()
        .expect("Failed to build HTTP client")
}
