//! Retry-with-backoff and circuit breaking, wrapping the priority executor
//! at the granularity of a request's collector set. Generalizes the host's
//! generic retry-around-an-operation idiom
//! (`clients/canister/client.rs::instrumented_canister_call`) to the
//! exponential-backoff-with-jitter formula this domain requires.

use crate::config::Config;
use answer_types::circuit_breaker::{CircuitBreakerState, CircuitState};
use answer_types::error::{CollectorError, ErrorKind};
use rand::Rng;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{info_span, warn, Instrument};

pub struct CircuitBreakerRegistry {
    breakers: Mutex<HashMap<String, CircuitBreakerState>>,
}

impl CircuitBreakerRegistry {
    pub fn new() -> Self {
        CircuitBreakerRegistry {
            breakers: Mutex::new(HashMap::new()),
        }
    }

    pub fn key_for(collectors: &[String]) -> String {
        let mut sorted: Vec<&str> = collectors.iter().map(String::as_str).collect();
        sorted.sort_unstable();
        sorted.join(",")
    }

    pub fn with_entry<T>(&self, key: &str, f: impl FnOnce(&mut CircuitBreakerState) -> T) -> T {
        let mut guard = self.breakers.lock().expect("circuit breaker mutex poisoned");
        let entry = guard.entry(key.to_string()).or_default();
        f(entry)
    }
}

impl Default for CircuitBreakerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Exponential backoff with jitter: `base * 2^(attempt-1) + uniform(0, 0.3*base)`.
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let exp = base.as_millis() as u64 * 2u64.saturating_pow(attempt.saturating_sub(1));
    let jitter_max = (base.as_millis() as f64 * 0.3) as u64;
    let jitter = if jitter_max == 0 {
        0
    } else {
        rand::thread_rng().gen_range(0..=jitter_max)
    };
    Duration::from_millis(exp + jitter)
}

/// Runs `operation` under the circuit breaker keyed by `breaker_key`, retrying
/// up to `config.max_retries` times with exponential backoff, stopping
/// immediately on non-retryable error kinds.
pub async fn with_retry_and_circuit_breaker<F, Fut, T>(
    config: &Config,
    breakers: &CircuitBreakerRegistry,
    breaker_key: &str,
    mut operation: F,
) -> Result<T, CollectorError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, CollectorError>>,
{
    let admitted = breakers.with_entry(breaker_key, |cb| {
        cb.allow_request(chrono::Duration::from_std(config.circuit_breaker_reset_timeout).unwrap_or_default())
    });
    if !admitted {
        return Err(CollectorError::new(ErrorKind::CircuitOpen, format!("circuit open for {breaker_key}")));
    }

    let span = info_span!("retry_operation", breaker_key, max_retries = config.max_retries);
    async move {
        let mut last_err: Option<CollectorError> = None;
        for attempt in 1..=config.max_retries.max(1) {
            match operation(attempt).await {
                Ok(value) => {
                    breakers.with_entry(breaker_key, |cb| cb.record_success());
                    return Ok(value);
                }
                Err(e) => {
                    let retryable = e.retryable();
                    warn!(attempt, kind = ?e.kind, retryable, "operation attempt failed");
                    if !retryable {
                        breakers.with_entry(breaker_key, |cb| cb.record_failure(config.circuit_breaker_threshold));
                        return Err(e);
                    }
                    breakers.with_entry(breaker_key, |cb| cb.record_failure(config.circuit_breaker_threshold));
                    last_err = Some(e);
                    if attempt < config.max_retries {
                        tokio::time::sleep(backoff_delay(config.retry_base_delay, attempt)).await;
                    }
                }
            }
        }
        Err(last_err.unwrap_or_else(|| CollectorError::new(ErrorKind::Unknown, "retry loop exhausted with no error recorded")))
    }
    .instrument(span)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration as StdDuration;

    fn test_config() -> Config {
        Config {
            max_retries: 3,
            retry_base_delay: StdDuration::from_millis(1),
            circuit_breaker_threshold: 2,
            circuit_breaker_reset_timeout: StdDuration::from_millis(50),
            batch_size: 3,
            concurrency: None,
            inter_batch_delay: StdDuration::from_millis(0),
            verbose_logs: false,
            log_format: crate::config::LogFormat::Compact,
            health_check_interval: StdDuration::from_secs(60),
            snapshot_poll_interval: StdDuration::from_secs(10),
            snapshot_poll_max_attempts: 60,
            mock_mode: true,
            provider_credentials: HashMap::new(),
        }
    }

    #[test]
    fn backoff_delay_is_within_the_documented_bounds() {
        let base = StdDuration::from_millis(1000);
        for attempt in 1..=5u32 {
            let delay = backoff_delay(base, attempt);
            let lower = base.as_millis() as u64 * 2u64.pow(attempt - 1);
            let upper = (base.as_millis() as f64 * 1.3) as u64 * 2u64.pow(attempt - 1);
            assert!(delay.as_millis() as u64 >= lower, "attempt {attempt}: {delay:?} below lower bound");
            assert!(delay.as_millis() as u64 <= upper, "attempt {attempt}: {delay:?} above upper bound");
        }
    }

    #[tokio::test]
    async fn non_retryable_error_stops_immediately() {
        let config = test_config();
        let breakers = CircuitBreakerRegistry::new();
        let calls = AtomicU32::new(0);
        let result: Result<(), CollectorError> = with_retry_and_circuit_breaker(&config, &breakers, "k", |_attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(CollectorError::new(ErrorKind::Auth, "nope")) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retryable_error_retries_up_to_max_retries() {
        let config = test_config();
        let breakers = CircuitBreakerRegistry::new();
        let calls = AtomicU32::new(0);
        let result: Result<(), CollectorError> = with_retry_and_circuit_breaker(&config, &breakers, "k2", |_attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(CollectorError::new(ErrorKind::Transport, "down")) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), config.max_retries);
    }

    #[tokio::test]
    async fn circuit_opens_after_threshold_and_blocks_subsequent_calls() {
        let config = test_config();
        let breakers = CircuitBreakerRegistry::new();
        let key = "k3";
        for _ in 0..2 {
            let _: Result<(), CollectorError> =
                with_retry_and_circuit_breaker(&config, &breakers, key, |_attempt| async {
                    Err(CollectorError::new(ErrorKind::Auth, "nope"))
                })
                .await;
        }
        let result: Result<(), CollectorError> =
            with_retry_and_circuit_breaker(&config, &breakers, key, |_attempt| async { Ok(()) }).await;
        assert!(matches!(result, Err(e) if e.kind == ErrorKind::CircuitOpen));
    }
}
