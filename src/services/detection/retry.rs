// Bounded Retry Policy
// Shared by every judge call site: max attempts, randomized backoff range,
// and which failures are worth retrying.

use rand::Rng;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

use crate::services::config_store::RetryConfig;
use crate::services::providers::ProviderError;

/// Failures that know whether they are temporary.
pub trait Retryable {
    fn is_transient(&self) -> bool;
}

impl Retryable for ProviderError {
    fn is_transient(&self) -> bool {
        ProviderError::is_transient(self)
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    /// Backoff range, in multiples of `unit`.
    pub backoff_min: f64,
    pub backoff_max: f64,
    pub unit: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_min: 2.0,
            backoff_max: 5.0,
            unit: Duration::from_secs(1),
        }
    }
}

#[derive(Debug)]
pub enum RetryFailure<E> {
    /// Non-transient failure; no further attempts were made.
    Permanent(E),
    /// Every attempt failed transiently; carries the last error.
    Exhausted(E),
}

impl<E> RetryFailure<E> {
    pub fn into_inner(self) -> E {
        match self {
            RetryFailure::Permanent(e) | RetryFailure::Exhausted(e) => e,
        }
    }
}

#[derive(Debug)]
pub struct RetryOutcome<T, E> {
    pub result: Result<T, RetryFailure<E>>,
    pub attempts: usize,
    /// Sleeps taken between attempts, in order.
    pub backoffs: Vec<Duration>,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            backoff_min: config.backoff_min_secs,
            backoff_max: config.backoff_max_secs,
            unit: Duration::from_secs(1),
        }
    }

    pub fn with_unit(mut self, unit: Duration) -> Self {
        self.unit = unit;
        self
    }

    /// Uniformly random delay in `[backoff_min, backoff_max] * unit`.
    pub fn backoff_delay(&self) -> Duration {
        let lo = self.backoff_min.min(self.backoff_max).max(0.0);
        let hi = self.backoff_max.max(self.backoff_min).max(0.0);
        let factor = rand::thread_rng().gen_range(lo..=hi);
        self.unit.mul_f64(factor)
    }

    /// Run `op` (given the 1-based attempt number) until it succeeds, fails
    /// permanently, or the attempt budget runs out.
    pub async fn run<T, E, F, Fut>(&self, label: &str, mut op: F) -> RetryOutcome<T, E>
    where
        E: Retryable + Display,
        F: FnMut(usize) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut backoffs = Vec::new();
        let mut attempt = 0;

        loop {
            attempt += 1;
            match op(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        info!("[RETRY] {} succeeded on attempt {}", label, attempt);
                    }
                    return RetryOutcome {
                        result: Ok(value),
                        attempts: attempt,
                        backoffs,
                    };
                }
                Err(e) if !e.is_transient() => {
                    warn!("[RETRY] {} attempt {} failed: {}", label, attempt, e);
                    return RetryOutcome {
                        result: Err(RetryFailure::Permanent(e)),
                        attempts: attempt,
                        backoffs,
                    };
                }
                Err(e) if attempt >= max_attempts => {
                    warn!(
                        "[RETRY] {} still unavailable after {} attempts: {}",
                        label, attempt, e
                    );
                    return RetryOutcome {
                        result: Err(RetryFailure::Exhausted(e)),
                        attempts: attempt,
                        backoffs,
                    };
                }
                Err(e) => {
                    let delay = self.backoff_delay();
                    warn!(
                        "[RETRY] {} attempt {} failed: {}; waiting {:.1}s before retry",
                        label,
                        attempt,
                        e,
                        delay.as_secs_f64()
                    );
                    tokio::time::sleep(delay).await;
                    backoffs.push(delay);
                }
            }
        }
    }
}
