//! Bounded retry with exponential backoff.
//!
//! Every call that touches an external actor (the driven browser, the HTTP
//! transports) goes through a [`RetryPolicy`]. A policy is a plain value, so
//! each call site carries its own bounds: navigation tolerates longer
//! backoff than a DOM measurement, the fallback download gets fewer attempts
//! than the primary one, and so on. Presets live in
//! [`crate::config::RetryPresets`].
//!
//! # Backoff
//!
//! The delay before attempt `n + 1` is:
//!
//! ```text
//! delay = min(max_delay, min_delay * multiplier^(n-1)) + random_jitter(0..=jitter)
//! ```
//!
//! Jitter defaults to zero.

use rand::{Rng, rng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, warn};

/// Attempt budget and backoff bounds for one class of operation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the second attempt, in milliseconds.
    pub min_delay_ms: u64,
    /// Upper bound on any single delay, in milliseconds.
    pub max_delay_ms: u64,
    /// Growth factor applied per attempt.
    pub multiplier: f64,
    /// Upper bound of random jitter added to every delay, in milliseconds.
    pub jitter_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, 2_000, 10_000)
    }
}

impl RetryPolicy {
    /// Policy with multiplier 1 and no jitter.
    pub const fn new(max_attempts: u32, min_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_attempts,
            min_delay_ms,
            max_delay_ms,
            multiplier: 1.0,
            jitter_ms: 0,
        }
    }

    /// Deterministic part of the delay that follows failed attempt `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let scaled = self.min_delay_ms as f64 * self.multiplier.powi(exponent);
        let capped = if scaled.is_finite() {
            scaled.min(self.max_delay_ms as f64)
        } else {
            self.max_delay_ms as f64
        };
        Duration::from_millis(capped.max(0.0) as u64)
    }

    fn jittered(&self, attempt: u32) -> Duration {
        let base = self.delay_for(attempt);
        if self.jitter_ms == 0 {
            return base;
        }
        let jitter: u64 = rng().random_range(0..=self.jitter_ms);
        base + Duration::from_millis(jitter)
    }

    /// Run `op`, retrying every failure until the attempt budget is spent.
    pub async fn run<T, E, F, Fut>(&self, op_name: &str, op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        self.run_if(op_name, |_: &E| true, op).await
    }

    /// Run `op`, retrying only failures accepted by `retryable`.
    ///
    /// A rejected failure or an exhausted budget returns the last error as-is.
    pub async fn run_if<T, E, F, Fut, P>(&self, op_name: &str, retryable: P, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
        E: fmt::Display,
    {
        let total_t0 = Instant::now();
        let max = self.max_attempts.max(1);
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            match op().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(op = op_name, attempt, "succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) => {
                    let elapsed_ms_total = total_t0.elapsed().as_millis();
                    if !retryable(&e) {
                        warn!(op = op_name, attempt, error = %e, "failure is not retryable");
                        return Err(e);
                    }
                    if attempt >= max {
                        error!(
                            op = op_name,
                            attempt,
                            max,
                            elapsed_ms_total,
                            error = %e,
                            "retries exhausted"
                        );
                        return Err(e);
                    }

                    let delay = self.jittered(attempt);
                    warn!(
                        op = op_name,
                        attempt,
                        max,
                        elapsed_ms_total,
                        ?delay,
                        error = %e,
                        "attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}
