//! Rate-limited request executor.
//!
//! Every call to the Spotify Web API goes through [`RequestExecutor::execute`].
//! The executor re-issues a request when Spotify answers with `429 Too Many
//! Requests` or a `5xx` status, and when the request fails before any response
//! arrived (connection reset, DNS, timeout).
//!
//! The two failure kinds end differently once the attempts are used up:
//!
//! - an HTTP failure hands the last response back to the caller, which then
//!   inspects the status and builds a structured upstream error
//! - a transport failure returns the last error, as there is no response to
//!   hand back
//!
//! Delays honour the `Retry-After` header when Spotify sends one and fall back
//! to exponential backoff otherwise. Both are capped by
//! [`RetryPolicy::max_delay`].

use std::{fmt::Display, future::Future, sync::Arc, time::Duration};

use rand::Rng;
use reqwest::header::RETRY_AFTER;
use tokio::time::sleep;
use tracing::warn;

use crate::error::PipelineError;

/// Response surface the executor needs to decide on a retry.
pub trait RetryableResponse {
    fn status_code(&self) -> u16;

    /// Delay requested by the server through `Retry-After`, in seconds.
    fn retry_after(&self) -> Option<Duration>;
}

impl RetryableResponse for reqwest::Response {
    fn status_code(&self) -> u16 {
        self.status().as_u16()
    }

    fn retry_after(&self) -> Option<Duration> {
        self.headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
    }
}

/// Classifies errors raised by a request thunk.
///
/// Only transient errors are retried. Anything else, most importantly an
/// expired session, returns immediately.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for PipelineError {
    fn is_retryable(&self) -> bool {
        matches!(self, PipelineError::Network(_))
    }
}

/// Status codes that are worth another attempt.
pub fn is_retryable_status(status: u16) -> bool {
    status == 429 || status >= 500
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total number of attempts, the first one included.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Backoff before retrying after the zero-based `attempt` failed:
    /// `base_delay * 2^attempt`, plus up to half a base delay of jitter,
    /// capped at `max_delay`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        let mut delay = self.base_delay.saturating_mul(factor);
        if self.jitter {
            let spread = (self.base_delay.as_millis() / 2) as u64;
            let extra = rand::rng().random_range(0..=spread);
            delay = delay.saturating_add(Duration::from_millis(extra));
        }
        delay.min(self.max_delay)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryReason {
    Status(u16),
    Transport(String),
}

impl Display for RetryReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RetryReason::Status(429) => write!(f, "rate limited"),
            RetryReason::Status(status) => write!(f, "status {}", status),
            RetryReason::Transport(err) => write!(f, "{}", err),
        }
    }
}

/// Emitted before every backoff sleep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryEvent {
    /// One-based number of the attempt that just failed.
    pub attempt: u32,
    pub max_attempts: u32,
    pub delay: Duration,
    pub reason: RetryReason,
}

pub type RetryObserver = Arc<dyn Fn(&RetryEvent) + Send + Sync>;

#[derive(Clone, Default)]
pub struct RequestExecutor {
    policy: RetryPolicy,
    observer: Option<RetryObserver>,
}

impl RequestExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            observer: None,
        }
    }

    /// Registers a callback that is told about every retry, e.g. to update a spinner.
    pub fn with_observer(mut self, observer: RetryObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Runs `request` until it yields a final outcome.
    ///
    /// Returns the first response that is not a 429/5xx, or the last response
    /// once all attempts are used. Returns an error when the thunk fails with a
    /// non-retryable error, or with a retryable one on the last attempt.
    pub async fn execute<R, E, F, Fut>(&self, mut request: F) -> Result<R, E>
    where
        R: RetryableResponse,
        E: Retryable + Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<R, E>>,
    {
        let max_attempts = self.policy.max_retries.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let has_next = attempt < max_attempts;

            let (delay, reason) = match request().await {
                Ok(response) => {
                    let status = response.status_code();
                    if !is_retryable_status(status) || !has_next {
                        return Ok(response);
                    }
                    let delay = match response.retry_after() {
                        Some(after) => after.min(self.policy.max_delay),
                        None => self.policy.backoff(attempt - 1),
                    };
                    (delay, RetryReason::Status(status))
                }
                Err(err) => {
                    if !err.is_retryable() || !has_next {
                        return Err(err);
                    }
                    (
                        self.policy.backoff(attempt - 1),
                        RetryReason::Transport(err.to_string()),
                    )
                }
            };

            let event = RetryEvent {
                attempt,
                max_attempts,
                delay,
                reason,
            };
            warn!(
                attempt = event.attempt,
                max_attempts = event.max_attempts,
                delay_ms = event.delay.as_millis() as u64,
                reason = %event.reason,
                "retrying Spotify request"
            );
            if let Some(observer) = &self.observer {
                observer(&event);
            }

            sleep(delay).await;
        }
    }
}
