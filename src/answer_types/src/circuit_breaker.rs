use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// In-memory breaker state, keyed by the request's canonical collector-set
/// string (`join(sorted(collectors), ",")`), not by individual provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerState {
    pub failure_count: u32,
    #[serde(default)]
    pub last_failure_at: Option<DateTime<Utc>>,
    pub state: CircuitState,
}

impl Default for CircuitBreakerState {
    fn default() -> Self {
        CircuitBreakerState {
            failure_count: 0,
            last_failure_at: None,
            state: CircuitState::Closed,
        }
    }
}

impl CircuitBreakerState {
    pub fn record_success(&mut self) {
        self.failure_count = 0;
        self.last_failure_at = None;
        self.state = CircuitState::Closed;
    }

    pub fn record_failure(&mut self, threshold: u32) {
        self.failure_count += 1;
        self.last_failure_at = Some(Utc::now());
        if self.failure_count >= threshold {
            self.state = CircuitState::Open;
        }
    }

    /// Whether a new request should be admitted, given the reset timeout.
    /// Transitions `Open` -> `HalfOpen` as a side effect once the timeout
    /// has elapsed, admitting exactly the request that observes the change.
    pub fn allow_request(&mut self, reset_timeout: chrono::Duration) -> bool {
        match self.state {
            CircuitState::Closed => true,
            CircuitState::HalfOpen => false,
            CircuitState::Open => {
                let elapsed_ok = self
                    .last_failure_at
                    .map(|t| Utc::now() - t >= reset_timeout)
                    .unwrap_or(true);
                if elapsed_ok {
                    self.state = CircuitState::HalfOpen;
                    true
                } else {
                    false
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_after_threshold() {
        let mut cb = CircuitBreakerState::default();
        for _ in 0..4 {
            cb.record_failure(5);
        }
        assert_eq!(cb.state, CircuitState::Closed);
        cb.record_failure(5);
        assert_eq!(cb.state, CircuitState::Open);
    }

    #[test]
    fn success_resets() {
        let mut cb = CircuitBreakerState::default();
        cb.record_failure(5);
        cb.record_success();
        assert_eq!(cb.failure_count, 0);
        assert_eq!(cb.state, CircuitState::Closed);
    }

    #[test]
    fn half_open_admits_single_probe() {
        let mut cb = CircuitBreakerState {
            failure_count: 5,
            last_failure_at: Some(Utc::now() - chrono::Duration::seconds(120)),
            state: CircuitState::Open,
        };
        assert!(cb.allow_request(chrono::Duration::seconds(60)));
        assert_eq!(cb.state, CircuitState::HalfOpen);
        assert!(!cb.allow_request(chrono::Duration::seconds(60)));
    }

    #[test]
    fn open_rejects_before_timeout() {
        let mut cb = CircuitBreakerState {
            failure_count: 5,
            last_failure_at: Some(Utc::now()),
            state: CircuitState::Open,
        };
        assert!(!cb.allow_request(chrono::Duration::seconds(60)));
    }
}
