//! Retry and backoff around the upstream timeline API.
//!
//! Every call passes through a process-wide gate that bounds simultaneous
//! upstream requests independently of how many timeline workers are busy.
//! The gate is held only for the duration of a request, never while backing
//! off.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lake_core::TimelineRecord;
use telemetry::metrics;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::client::TimelineApi;
use crate::config::RiotConfig;
use crate::error::{ApiError, ErrorClass};

/// Exponential backoff parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Total attempts, including the first.
    pub max_attempts: u32,
}

impl RetryPolicy {
    pub fn new(base_delay: Duration, max_delay: Duration, max_attempts: u32) -> Self {
        Self {
            base_delay,
            max_delay,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn from_config(config: &RiotConfig) -> Self {
        Self::new(
            Duration::from_millis(config.base_delay_ms),
            Duration::from_millis(config.max_delay_ms),
            config.max_attempts,
        )
    }

    /// Delay to wait after failed attempt `attempt` (1-based):
    /// `min(max_delay, base_delay * 2^(attempt-1))`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        self.base_delay
            .checked_mul(1u32 << exp)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RiotConfig::default())
    }
}

/// Attempt counter for a single fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryState {
    policy: RetryPolicy,
    attempt: u32,
}

impl RetryState {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy, attempt: 1 }
    }

    /// The attempt currently in progress, starting at 1.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Delay before the next attempt.
    pub fn next_delay(&self) -> Duration {
        self.policy.delay_for(self.attempt)
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempt >= self.policy.max_attempts
    }

    /// Moves to the next attempt and returns the delay to wait first, or
    /// `None` once the attempt ceiling is reached.
    pub fn advance(&mut self) -> Option<Duration> {
        if self.is_exhausted() {
            return None;
        }
        let delay = self.next_delay();
        self.attempt += 1;
        Some(delay)
    }
}

/// Waits between attempts.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Real-time sleeper.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Upstream client with error classification, backoff and a concurrency gate.
#[derive(Clone)]
pub struct RetryingClient {
    api: Arc<dyn TimelineApi>,
    policy: RetryPolicy,
    gate: Arc<Semaphore>,
    sleeper: Arc<dyn Sleeper>,
}

impl RetryingClient {
    pub fn new(api: Arc<dyn TimelineApi>, policy: RetryPolicy, gate_size: usize) -> Self {
        Self {
            api,
            policy,
            gate: Arc::new(Semaphore::new(gate_size.max(1))),
            sleeper: Arc::new(TokioSleeper),
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Number of upstream calls that may start right now.
    pub fn available_permits(&self) -> usize {
        self.gate.available_permits()
    }

    /// Fetches a timeline.
    ///
    /// Returns `Ok(None)` when the upstream reports the match as not found or
    /// answers with no frames. Retryable errors are retried with backoff until
    /// the attempt ceiling, after which the last error is returned. Any other
    /// error is returned immediately.
    pub async fn fetch(&self, match_id: &str) -> Result<Option<TimelineRecord>, ApiError> {
        let mut state = RetryState::new(self.policy);

        loop {
            let error = match self.call(match_id).await {
                Ok(timeline) if timeline.has_frames() => return Ok(Some(timeline)),
                Ok(_) => {
                    debug!(match_id = %match_id, "Upstream timeline has no frames");
                    return Ok(None);
                }
                Err(e) => e,
            };

            match error.classify() {
                ErrorClass::NotFound => {
                    metrics().upstream_not_found.inc();
                    return Ok(None);
                }
                ErrorClass::Fatal => {
                    metrics().upstream_errors.inc();
                    return Err(error);
                }
                ErrorClass::Retryable => {
                    let attempt = state.attempt();
                    let Some(delay) = state.advance() else {
                        metrics().upstream_errors.inc();
                        warn!(
                            match_id = %match_id,
                            attempts = attempt,
                            error = %error,
                            "Upstream retries exhausted"
                        );
                        return Err(error);
                    };

                    metrics().upstream_retries.inc();
                    warn!(
                        match_id = %match_id,
                        attempt = attempt,
                        backoff_ms = %delay.as_millis(),
                        error = %error,
                        "Retrying upstream timeline fetch"
                    );
                    self.sleeper.sleep(delay).await;
                }
            }
        }
    }

    /// One gated upstream request.
    async fn call(&self, match_id: &str) -> Result<TimelineRecord, ApiError> {
        metrics().upstream_gate_waiting.inc();
        let permit = self.gate.acquire().await;
        metrics().upstream_gate_waiting.dec();
        let _permit = permit.map_err(|_| ApiError::Other("upstream gate closed".into()))?;

        metrics().upstream_requests.inc();
        let start = Instant::now();
        let result = self.api.get_timeline(match_id).await;
        metrics()
            .upstream_latency_ms
            .observe(start.elapsed().as_millis() as u64);
        result
    }
}
