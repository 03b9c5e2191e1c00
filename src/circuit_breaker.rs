//! Evaluation circuit breaker, generalized from an execution-guarding
//! circuit breaker. Execution is out of scope for this crate; evaluation
//! availability is not, so the same open/half-open/closed state machine is
//! kept and retargeted at "is the evaluator itself healthy" rather than
//! "is it safe to submit this trade."

use crate::config::CircuitBreakerConfig;
use crate::types::{Action, Priority};
use parking_lot::RwLock;
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

struct Inner {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
}

/// Trips when evaluation itself is unhealthy: a run of hard adapter/analyzer
/// failures, or a suspicious run of `priority = ignore` fallbacks that look
/// like degraded inputs rather than genuinely unprofitable opportunities.
pub struct EvaluationCircuitBreaker {
    inner: RwLock<Inner>,
    config: CircuitBreakerConfig,
}

impl EvaluationCircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            inner: RwLock::new(Inner { state: CircuitState::Closed, consecutive_failures: 0, opened_at: None }),
            config,
        }
    }

    pub fn state(&self) -> CircuitState {
        let mut inner = self.inner.write();
        if inner.state == CircuitState::Open {
            if let Some(opened_at) = inner.opened_at {
                if opened_at.elapsed() >= Duration::from_millis(self.config.cooldown_ms) {
                    inner.state = CircuitState::HalfOpen;
                    info!("evaluation circuit breaker entering half-open after cooldown");
                }
            }
        }
        inner.state
    }

    /// True when a tick is allowed to run the evaluator at all.
    pub fn allows_evaluation(&self) -> bool {
        self.state() != CircuitState::Open
    }

    /// Record an evaluator panic/hard-failure (adapter error, not a
    /// genuine-unprofitability `reject`).
    pub fn record_failure(&self) {
        let mut inner = self.inner.write();
        inner.consecutive_failures += 1;
        if inner.consecutive_failures >= self.config.max_consecutive_failures && inner.state != CircuitState::Open {
            warn!(
                "evaluation circuit breaker tripped after {} consecutive failures",
                inner.consecutive_failures
            );
            inner.state = CircuitState::Open;
            inner.opened_at = Some(Instant::now());
        }
    }

    /// Record a completed evaluation. A genuine, confident `ignore` is not a
    /// failure; an `ignore` that is itself a degraded fallback is handled by
    /// `record_failure` at the call site instead.
    pub fn record_success(&self, priority: Priority) {
        let mut inner = self.inner.write();
        if priority != Priority::Ignore {
            inner.consecutive_failures = 0;
        }
        if inner.state == CircuitState::HalfOpen {
            inner.state = CircuitState::Closed;
            inner.opened_at = None;
            info!("evaluation circuit breaker closed after successful half-open probe");
        }
    }

    /// The default fallback evaluation emitted when the breaker blocks a tick.
    pub fn fallback_action(&self) -> Action {
        Action::Reject
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trips_after_max_consecutive_failures() {
        let breaker = EvaluationCircuitBreaker::new(CircuitBreakerConfig { max_consecutive_failures: 3, cooldown_ms: 60_000 });
        assert!(breaker.allows_evaluation());
        for _ in 0..3 {
            breaker.record_failure();
        }
        assert!(!breaker.allows_evaluation());
    }

    #[test]
    fn genuine_success_resets_failure_count() {
        let breaker = EvaluationCircuitBreaker::new(CircuitBreakerConfig { max_consecutive_failures: 3, cooldown_ms: 60_000 });
        breaker.record_failure();
        breaker.record_failure();
        breaker.record_success(Priority::Medium);
        breaker.record_failure();
        breaker.record_failure();
        assert!(breaker.allows_evaluation());
    }

    #[test]
    fn half_open_after_cooldown() {
        let breaker = EvaluationCircuitBreaker::new(CircuitBreakerConfig { max_consecutive_failures: 1, cooldown_ms: 0 });
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
    }
}
