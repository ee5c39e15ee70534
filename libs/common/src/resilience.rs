use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Exponential backoff schedule for transient upstream failures.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 300,
            max_delay_ms: 5000,
            factor: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Backoff before retry number `attempt` (zero-based), jittered to half
    /// the nominal delay so synchronized callers spread out.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let nominal = self.initial_delay_ms as f64 * self.factor.powi(attempt as i32);
        let capped = nominal.min(self.max_delay_ms as f64);
        let jittered = capped / 2.0 + rand::random::<f64>() * capped / 2.0;
        Duration::from_millis(jittered as u64)
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct BreakerConfig {
    pub failure_threshold: u32,
    pub reset_timeout_ms: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            reset_timeout_ms: 30_000,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half-open"),
        }
    }
}

struct BreakerInner {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
}

/// Per-upstream circuit breaker. Consecutive transient failures open the
/// circuit; after the reset timeout a single probe call is let through and
/// its outcome decides whether the circuit closes again.
pub struct CircuitBreaker {
    config: BreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
            }),
        }
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Checks whether a call may proceed. Returns the remaining cooldown in
    /// milliseconds when the circuit is open.
    pub fn preflight(&self) -> Result<(), u64> {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => Ok(()),
            CircuitState::Open => {
                let elapsed = inner
                    .opened_at
                    .map(|at| at.elapsed())
                    .unwrap_or(Duration::ZERO);
                let reset_after = Duration::from_millis(self.config.reset_timeout_ms);
                if elapsed >= reset_after {
                    inner.state = CircuitState::HalfOpen;
                    debug!("circuit half-open, letting a probe call through");
                    Ok(())
                } else {
                    Err((reset_after - elapsed).as_millis() as u64)
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        if inner.state != CircuitState::Closed {
            info!(from = %inner.state, "✅ circuit closed");
        }
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
        inner.opened_at = None;
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        inner.consecutive_failures += 1;
        let reopen = inner.state == CircuitState::HalfOpen;
        if reopen || inner.consecutive_failures >= self.config.failure_threshold {
            if inner.state != CircuitState::Open {
                warn!(
                    failures = inner.consecutive_failures,
                    reset_timeout_ms = self.config.reset_timeout_ms,
                    "❌ circuit opened"
                );
            }
            inner.state = CircuitState::Open;
            inner.opened_at = Some(Instant::now());
        }
    }
}

/// Errors that flow through a [`CallGuard`] classify themselves as transient
/// or terminal, and can represent the guard's own open-circuit rejection.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
    fn circuit_open(retry_in_ms: u64) -> Self;
}

/// Message-based transient classification for upstreams that only surface
/// stringly-typed failures.
pub fn is_transient_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    const MARKERS: &[&str] = &[
        "timeout",
        "timed out",
        "connection refused",
        "connection reset",
        "connection closed",
        "econnrefused",
        "econnreset",
        "etimedout",
        "rate limit",
        "too many requests",
        "429",
        "502",
        "503",
        "504",
        "server error",
        "temporarily unavailable",
    ];
    MARKERS.iter().any(|marker| lower.contains(marker))
}

/// Retry loop and circuit breaker around one upstream. Terminal errors pass
/// straight through without tripping the breaker; only transient failures
/// count against it.
pub struct CallGuard {
    retry: RetryPolicy,
    breaker: CircuitBreaker,
}

impl CallGuard {
    pub fn new(retry: RetryPolicy, breaker: BreakerConfig) -> Self {
        Self {
            retry,
            breaker: CircuitBreaker::new(breaker),
        }
    }

    pub fn breaker_state(&self) -> CircuitState {
        self.breaker.state()
    }

    pub async fn run<T, E, F, Fut>(&self, op: &str, f: F) -> Result<T, E>
    where
        E: Retryable + fmt::Display,
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 0u32;
        loop {
            if let Err(retry_in_ms) = self.breaker.preflight() {
                return Err(E::circuit_open(retry_in_ms));
            }

            match f().await {
                Ok(value) => {
                    self.breaker.record_success();
                    return Ok(value);
                }
                Err(err) if !err.is_retryable() => return Err(err),
                Err(err) => {
                    self.breaker.record_failure();
                    if attempt >= self.retry.max_retries {
                        return Err(err);
                    }
                    let delay = self.retry.delay_for(attempt);
                    warn!(
                        op,
                        attempt = attempt + 1,
                        max_retries = self.retry.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "⚠️ transient failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
