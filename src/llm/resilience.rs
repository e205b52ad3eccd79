//! LLM resilience wrapper with circuit breaking and request metrics.

use super::LlmProvider;
use crate::config::LlmConfig;
use crate::{Error, Result};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Resilience configuration for LLM calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmResilienceConfig {
    /// Retries for timed-out calls.
    pub max_retries: u32,
    /// Backoff between retries in milliseconds.
    pub retry_backoff_ms: u64,
    /// Consecutive failures before opening the circuit.
    pub breaker_failure_threshold: u32,
    /// How long the circuit stays open before a trial call.
    pub breaker_reset_timeout_ms: u64,
    /// Trial calls allowed while half-open.
    pub breaker_half_open_max_calls: u32,
}

impl Default for LlmResilienceConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            retry_backoff_ms: 100,
            breaker_failure_threshold: 3,
            breaker_reset_timeout_ms: 30_000,
            breaker_half_open_max_calls: 1,
        }
    }
}

impl LlmResilienceConfig {
    /// Reads resilience settings from the `[llm]` config section.
    #[must_use]
    pub fn from_config(config: &LlmConfig) -> Self {
        let defaults = Self::default();
        Self {
            max_retries: config.max_retries.unwrap_or(defaults.max_retries),
            retry_backoff_ms: config.retry_backoff_ms.unwrap_or(defaults.retry_backoff_ms),
            breaker_failure_threshold: config
                .breaker_failure_threshold
                .map_or(defaults.breaker_failure_threshold, |t| t.max(1)),
            breaker_reset_timeout_ms: config
                .breaker_reset_ms
                .unwrap_or(defaults.breaker_reset_timeout_ms),
            breaker_half_open_max_calls: defaults.breaker_half_open_max_calls,
        }
    }
}

/// Observable circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    /// Calls pass through.
    Closed,
    /// Calls are rejected until the reset timeout elapses.
    Open,
    /// A limited number of trial calls are allowed.
    HalfOpen,
}

impl BreakerState {
    const fn gauge_value(self) -> f64 {
        match self {
            Self::Closed => 0.0,
            Self::Open => 1.0,
            Self::HalfOpen => 2.0,
        }
    }
}

#[derive(Debug)]
enum Phase {
    Closed { failures: u32 },
    Open { since: Instant },
    HalfOpen { trials: u32 },
}

#[derive(Debug)]
struct CircuitBreaker {
    phase: Phase,
    failure_threshold: u32,
    reset_timeout: Duration,
    half_open_max_calls: u32,
}

impl CircuitBreaker {
    fn new(config: &LlmResilienceConfig) -> Self {
        Self {
            phase: Phase::Closed { failures: 0 },
            failure_threshold: config.breaker_failure_threshold.max(1),
            reset_timeout: Duration::from_millis(config.breaker_reset_timeout_ms),
            half_open_max_calls: config.breaker_half_open_max_calls.max(1),
        }
    }

    fn admit(&mut self) -> bool {
        match &mut self.phase {
            Phase::Closed { .. } => true,
            Phase::Open { since } => {
                if since.elapsed() < self.reset_timeout {
                    return false;
                }
                self.phase = Phase::HalfOpen { trials: 1 };
                true
            },
            Phase::HalfOpen { trials } => {
                if *trials >= self.half_open_max_calls {
                    return false;
                }
                *trials += 1;
                true
            },
        }
    }

    const fn succeed(&mut self) {
        self.phase = Phase::Closed { failures: 0 };
    }

    /// Records a failure; returns true when this failure opened the circuit.
    fn fail(&mut self) -> bool {
        let trips = match &mut self.phase {
            Phase::Closed { failures } => {
                *failures += 1;
                *failures >= self.failure_threshold
            },
            Phase::HalfOpen { .. } => true,
            Phase::Open { .. } => false,
        };
        if trips {
            self.phase = Phase::Open {
                since: Instant::now(),
            };
        }
        trips
    }

    const fn state(&self) -> BreakerState {
        match self.phase {
            Phase::Closed { .. } => BreakerState::Closed,
            Phase::Open { .. } => BreakerState::Open,
            Phase::HalfOpen { .. } => BreakerState::HalfOpen,
        }
    }
}

/// LLM provider wrapper with a circuit breaker, timeout retries and metrics.
pub struct ResilientLlmProvider<P: LlmProvider> {
    inner: P,
    config: LlmResilienceConfig,
    breaker: Mutex<CircuitBreaker>,
}

impl<P: LlmProvider> ResilientLlmProvider<P> {
    /// Wraps a provider.
    #[must_use]
    pub fn new(inner: P, config: LlmResilienceConfig) -> Self {
        let breaker = CircuitBreaker::new(&config);
        Self {
            inner,
            config,
            breaker: Mutex::new(breaker),
        }
    }

    /// Current breaker state.
    pub fn breaker_state(&self) -> BreakerState {
        self.breaker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .state()
    }

    fn execute<F>(&self, operation: &'static str, mut call: F) -> Result<String>
    where
        F: FnMut() -> Result<String>,
    {
        let provider = self.inner.name();
        let span = tracing::info_span!(
            "llm.request",
            provider,
            operation,
            status = tracing::field::Empty
        );
        let _enter = span.enter();

        let admitted = {
            let mut breaker = self.breaker.lock().unwrap_or_else(PoisonError::into_inner);
            let admitted = breaker.admit();
            record_breaker_state(provider, breaker.state());
            admitted
        };
        if !admitted {
            span.record("status", "circuit_open");
            metrics::counter!(
                "llm_requests_total",
                "provider" => provider,
                "status" => "circuit_open"
            )
            .increment(1);
            metrics::counter!("llm_circuit_breaker_rejections_total", "provider" => provider)
                .increment(1);
            return Err(Error::operation(
                format!("llm_{operation}"),
                "circuit breaker open",
            ));
        }

        let max_attempts = self.config.max_retries.saturating_add(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let started = Instant::now();
            let outcome = call();
            let elapsed = started.elapsed();

            let err = match outcome {
                Ok(text) => {
                    record_request(provider, "success", elapsed);
                    let mut breaker = self.breaker.lock().unwrap_or_else(PoisonError::into_inner);
                    breaker.succeed();
                    record_breaker_state(provider, breaker.state());
                    span.record("status", "success");
                    return Ok(text);
                },
                Err(err) => err,
            };

            let timed_out = is_timeout_error(&err);
            record_request(provider, if timed_out { "timeout" } else { "error" }, elapsed);
            self.note_failure(provider);

            if !timed_out || attempt >= max_attempts {
                span.record("status", if timed_out { "timeout" } else { "error" });
                return Err(err);
            }

            tracing::warn!(
                provider,
                attempt,
                elapsed_ms = elapsed.as_millis(),
                "Retrying timed-out LLM call"
            );
            metrics::counter!("llm_retries_total", "provider" => provider).increment(1);
            if self.config.retry_backoff_ms > 0 {
                std::thread::sleep(Duration::from_millis(self.config.retry_backoff_ms));
            }
        }
    }

    fn note_failure(&self, provider: &'static str) {
        let mut breaker = self.breaker.lock().unwrap_or_else(PoisonError::into_inner);
        if breaker.fail() {
            metrics::counter!("llm_circuit_breaker_trips_total", "provider" => provider)
                .increment(1);
            tracing::warn!(provider, "LLM circuit breaker opened");
        }
        record_breaker_state(provider, breaker.state());
    }
}

impl<P: LlmProvider> LlmProvider for ResilientLlmProvider<P> {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn complete(&self, prompt: &str) -> Result<String> {
        self.execute("complete", || self.inner.complete(prompt))
    }

    fn complete_with_system(&self, system: &str, user: &str) -> Result<String> {
        self.execute("complete_with_system", || {
            self.inner.complete_with_system(system, user)
        })
    }
}

fn record_request(provider: &'static str, status: &'static str, elapsed: Duration) {
    metrics::counter!("llm_requests_total", "provider" => provider, "status" => status)
        .increment(1);
    metrics::histogram!("llm_request_duration_ms", "provider" => provider, "status" => status)
        .record(elapsed.as_secs_f64() * 1000.0);
    if status == "timeout" {
        metrics::counter!("llm_timeouts_total", "provider" => provider).increment(1);
    }
}

fn record_breaker_state(provider: &'static str, state: BreakerState) {
    metrics::gauge!("llm_circuit_breaker_state", "provider" => provider).set(state.gauge_value());
}

fn is_timeout_error(err: &Error) -> bool {
    match err {
        Error::Timeout { .. } => true,
        Error::OperationFailed { cause, .. } => {
            let lower = cause.to_lowercase();
            lower.contains("timeout")
                || lower.contains("timed out")
                || lower.contains("deadline")
                || lower.contains("elapsed")
        },
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Flaky {
        cause: &'static str,
        failures_left: AtomicUsize,
        calls: AtomicUsize,
    }

    impl Flaky {
        fn new(cause: &'static str, failures: usize) -> Self {
            Self {
                cause,
                failures_left: AtomicUsize::new(failures),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl LlmProvider for Flaky {
        fn name(&self) -> &'static str {
            "flaky"
        }

        fn complete(&self, _prompt: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let left = self.failures_left.load(Ordering::SeqCst);
            if left > 0 {
                self.failures_left.store(left - 1, Ordering::SeqCst);
                return Err(Error::operation("flaky_request", self.cause));
            }
            Ok("ok".to_string())
        }
    }

    fn config(max_retries: u32, threshold: u32, reset_ms: u64) -> LlmResilienceConfig {
        LlmResilienceConfig {
            max_retries,
            retry_backoff_ms: 0,
            breaker_failure_threshold: threshold,
            breaker_reset_timeout_ms: reset_ms,
            breaker_half_open_max_calls: 1,
        }
    }

    #[test]
    fn test_retries_timeouts_only() {
        let provider = ResilientLlmProvider::new(Flaky::new("request timed out", 1), config(1, 5, 0));
        assert_eq!(provider.complete("q").unwrap(), "ok");
        assert_eq!(provider.inner.calls.load(Ordering::SeqCst), 2);

        let provider = ResilientLlmProvider::new(Flaky::new("HTTP 401", 1), config(3, 5, 0));
        assert!(provider.complete("q").is_err());
        assert_eq!(provider.inner.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_breaker_opens_and_rejects() {
        let provider =
            ResilientLlmProvider::new(Flaky::new("HTTP 500", 10), config(0, 2, 60_000));
        assert!(provider.complete("q").is_err());
        assert_eq!(provider.breaker_state(), BreakerState::Closed);
        assert!(provider.complete("q").is_err());
        assert_eq!(provider.breaker_state(), BreakerState::Open);

        let err = provider.complete("q").unwrap_err();
        assert!(err.to_string().contains("circuit breaker open"));
        assert_eq!(provider.inner.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_half_open_trial_closes_on_success() {
        let provider = ResilientLlmProvider::new(Flaky::new("HTTP 500", 1), config(0, 1, 0));
        assert!(provider.complete("q").is_err());
        assert_eq!(provider.breaker_state(), BreakerState::Open);

        assert_eq!(provider.complete("q").unwrap(), "ok");
        assert_eq!(provider.breaker_state(), BreakerState::Closed);
    }

    #[test]
    fn test_timeout_detection() {
        assert!(is_timeout_error(&Error::operation("x", "operation timed out")));
        assert!(is_timeout_error(&Error::Timeout {
            operation: "narrative".to_string(),
            elapsed_ms: 10,
        }));
        assert!(!is_timeout_error(&Error::operation("x", "connection refused")));
    }
}
