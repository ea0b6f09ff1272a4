//! Rate-limited HTTP fetching with bounded exponential backoff.
//!
//! Every vendor client goes through [`RateLimitedClient`]:
//! - a minimum interval between requests (vendor quota pacing)
//! - bounded retries with exponential, capped, optionally jittered delays
//! - 429 handling that honors `Retry-After`
//! - a typed error taxonomy so callers can distinguish quota exhaustion
//!   from hard HTTP failures

use rand::Rng;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Errors surfaced by [`RateLimitedClient::fetch`].
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("rate limited after {attempts} attempts (last retry-after {retry_after:?})")]
    RateLimited {
        attempts: u32,
        retry_after: Option<Duration>,
    },
    #[error("http {status}: {body}")]
    Http { status: u16, body: String },
    #[error("network error: {0}")]
    Network(String),
    #[error("decode error: {0}")]
    Decode(String),
}

impl FetchError {
    /// Transient errors are worth another attempt; client errors are not.
    fn is_retriable(&self) -> bool {
        match self {
            FetchError::RateLimited { .. } => true,
            FetchError::Network(_) => true,
            FetchError::Decode(_) => true,
            FetchError::Http { status, .. } => *status >= 500,
        }
    }
}

/// Exponential backoff schedule: `base * 2^attempt`, capped at `max_delay`.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: bool,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
            jitter: true,
        }
    }
}

impl BackoffPolicy {
    /// Delay before retry number `attempt` (0-based). Jitter subtracts up to
    /// 25% so synchronized workers spread out; the cap always holds.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self
            .base_delay
            .saturating_mul(2_u32.saturating_pow(attempt))
            .min(self.max_delay);
        if !self.jitter {
            return exp;
        }
        let millis = exp.as_millis() as u64;
        if millis == 0 {
            return exp;
        }
        let cut = rand::thread_rng().gen_range(0..=millis / 4);
        Duration::from_millis(millis - cut)
    }
}

/// A reqwest wrapper that paces requests and retries transient failures.
///
/// Vendor-specific headers (API keys) are set on the inner `reqwest::Client`
/// as default headers by each client constructor.
pub struct RateLimitedClient {
    client: reqwest::Client,
    base_url: String,
    min_interval: Duration,
    backoff: BackoffPolicy,
    last_request: Mutex<Option<Instant>>,
}

impl RateLimitedClient {
    pub fn new(
        base_url: impl Into<String>,
        min_interval: Duration,
        backoff: BackoffPolicy,
        default_headers: HeaderMap,
    ) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent("AstroBetAdvisor/1.0")
            .default_headers(default_headers)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            min_interval,
            backoff,
            last_request: Mutex::new(None),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Sleep long enough to honor the minimum inter-request interval.
    async fn pace(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    /// GET `{base_url}/{endpoint}` with query params, decode JSON.
    ///
    /// Retries rate limits, 5xx, network and decode errors up to the policy's
    /// retry budget; 4xx other than 429 fails immediately.
    pub async fn fetch(&self, endpoint: &str, params: &[(&str, String)]) -> Result<Value, FetchError> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), endpoint.trim_start_matches('/'));

        let mut last_err: Option<FetchError> = None;
        for attempt in 0..=self.backoff.max_retries {
            if attempt > 0 {
                let delay = match &last_err {
                    // A server-provided Retry-After wins over our schedule
                    // when it is longer.
                    Some(FetchError::RateLimited {
                        retry_after: Some(ra),
                        ..
                    }) => (*ra).max(self.backoff.delay_for(attempt - 1)),
                    _ => self.backoff.delay_for(attempt - 1),
                };
                warn!(
                    "retrying {} in {:.1}s (attempt {}/{}): {}",
                    endpoint,
                    delay.as_secs_f64(),
                    attempt + 1,
                    self.backoff.max_retries + 1,
                    last_err.as_ref().map(|e| e.to_string()).unwrap_or_default()
                );
                tokio::time::sleep(delay).await;
            }

            self.pace().await;
            debug!("GET {} (attempt {})", url, attempt + 1);

            match self.attempt(&url, params, attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retriable() => last_err = Some(e),
                Err(e) => return Err(e),
            }
        }

        Err(last_err.unwrap_or(FetchError::Network("no attempts made".to_string())))
    }

    async fn attempt(
        &self,
        url: &str,
        params: &[(&str, String)],
        attempt: u32,
    ) -> Result<Value, FetchError> {
        let response = self
            .client
            .get(url)
            .query(params)
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .map(Duration::from_secs)
                // Vendors that send 429 without a header still need breathing room.
                .or(Some(Duration::from_secs(5)));
            return Err(FetchError::RateLimited {
                attempts: attempt + 1,
                retry_after,
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body: String = body.chars().take(300).collect();
            return Err(FetchError::Http {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_monotone_before_cap() {
        let policy = BackoffPolicy {
            max_retries: 5,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
            jitter: false,
        };
        let delays: Vec<Duration> = (0..5).map(|a| policy.delay_for(a)).collect();
        for pair in delays.windows(2) {
            assert!(pair[0] <= pair[1]);
        }
        assert_eq!(delays[0], Duration::from_secs(2));
        assert_eq!(delays[1], Duration::from_secs(4));
        assert_eq!(delays[2], Duration::from_secs(8));
        assert_eq!(delays[3], Duration::from_secs(16));
        // Capped, 2 * 2^4 = 32 > 30
        assert_eq!(delays[4], Duration::from_secs(30));
    }

    #[test]
    fn test_backoff_jitter_stays_under_cap() {
        let policy = BackoffPolicy {
            jitter: true,
            ..Default::default()
        };
        for attempt in 0..10 {
            let d = policy.delay_for(attempt);
            assert!(d <= policy.max_delay);
        }
    }

    #[test]
    fn test_retriable_classification() {
        assert!(FetchError::Network("timeout".to_string()).is_retriable());
        assert!(FetchError::Http { status: 503, body: String::new() }.is_retriable());
        assert!(FetchError::RateLimited { attempts: 1, retry_after: None }.is_retriable());
        assert!(!FetchError::Http { status: 404, body: String::new() }.is_retriable());
        assert!(!FetchError::Http { status: 401, body: String::new() }.is_retriable());
    }

    #[tokio::test]
    async fn test_pacing_enforces_min_interval() {
        tokio::time::pause();
        let client = RateLimitedClient::new(
            "https://example.test",
            Duration::from_secs(3),
            BackoffPolicy::default(),
            HeaderMap::new(),
        )
        .unwrap();

        let start = Instant::now();
        client.pace().await;
        client.pace().await;
        assert!(start.elapsed() >= Duration::from_secs(3));
    }
}
