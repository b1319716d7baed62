//! Circuit breaker wrapper around out-of-process dependencies (the memory
//! store, an embedding provider). Opens after `N` consecutive failures for
//! a cooldown `T`, rejects calls with `CIRCUIT_BREAKER_OPEN` while open,
//! half-opens after the cooldown elapses, and closes on the first success.

use crate::error::OrchestratorError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

struct Inner {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<DateTime<Utc>>,
}

/// One breaker instance guards one named out-of-process dependency.
pub struct CircuitBreaker {
    name: String,
    failure_threshold: u32,
    cooldown: chrono::Duration,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, failure_threshold: u32, cooldown_secs: i64) -> Self {
        CircuitBreaker {
            name: name.into(),
            failure_threshold: failure_threshold.max(1),
            cooldown: chrono::Duration::seconds(cooldown_secs),
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
            }),
        }
    }

    pub fn state(&self) -> CircuitState {
        self.settle();
        self.inner.lock().unwrap().state
    }

    /// Moves `Open` to `HalfOpen` once the cooldown has elapsed. Called
    /// before every read so external callers observe a fresh state without
    /// needing their own timer.
    fn settle(&self) {
        let mut inner = self.inner.lock().unwrap();
        if inner.state == CircuitState::Open {
            if let Some(opened_at) = inner.opened_at {
                if Utc::now() - opened_at >= self.cooldown {
                    inner.state = CircuitState::HalfOpen;
                }
            }
        }
    }

    /// Returns `Ok(())` if the call may proceed, `Err(CircuitBreakerOpen)`
    /// otherwise.
    pub fn guard(&self) -> Result<(), OrchestratorError> {
        self.settle();
        let inner = self.inner.lock().unwrap();
        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => Ok(()),
            CircuitState::Open => Err(OrchestratorError::CircuitBreakerOpen(self.name.clone())),
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
        inner.opened_at = None;
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.consecutive_failures += 1;
        if inner.consecutive_failures >= self.failure_threshold {
            inner.state = CircuitState::Open;
            inner.opened_at = Some(Utc::now());
        }
    }

    /// Convenience wrapper: runs `f`, recording success/failure, and
    /// surfacing `CIRCUIT_BREAKER_OPEN` without invoking `f` while open.
    pub async fn call<F, Fut, T>(&self, f: F) -> Result<T, OrchestratorError>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, OrchestratorError>>,
    {
        self.guard()?;
        match f().await {
            Ok(v) => {
                self.record_success();
                Ok(v)
            }
            Err(e) => {
                self.record_failure();
                Err(e)
            }
        }
    }
}
