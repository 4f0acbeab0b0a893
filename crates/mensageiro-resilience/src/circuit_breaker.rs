// SPDX-FileCopyrightText: 2026 Mensageiro Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Three-state circuit breaker without a background timer.
//!
//! The open → half-open transition is evaluated lazily by [`CircuitBreaker::can_execute`].
//! Half-open probing is not reserved: concurrent callers that check during the
//! probe window may all be let through.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use strum::Display;
use tokio::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum CircuitState {
    /// Calls flow normally.
    Closed,
    /// Calls are short-circuited.
    Open,
    /// The next call is a probe.
    HalfOpen,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub reset_window: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_window: Duration::from_secs(60),
        }
    }
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    failure_count: u32,
    last_failure_at: Option<Instant>,
}

/// Failure counter guarding one call path.
///
/// Never errors. Callers ask [`can_execute`](Self::can_execute) before each
/// attempt and report the outcome with [`record_success`](Self::record_success)
/// or [`record_failure`](Self::record_failure).
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        let name = name.into();
        debug!(
            breaker = %name,
            failure_threshold = config.failure_threshold,
            reset_window_secs = config.reset_window.as_secs(),
            "circuit breaker created"
        );
        Self {
            name,
            config,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                failure_count: 0,
                last_failure_at: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BreakerInner> {
        // The critical sections never panic; recover the data if one did.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Whether a call may proceed.
    ///
    /// An open breaker whose reset window has elapsed since the last failure
    /// moves to half-open and lets the call through as a probe.
    pub fn can_execute(&self) -> bool {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let elapsed = inner
                    .last_failure_at
                    .map(|at| at.elapsed())
                    .unwrap_or(Duration::MAX);
                if elapsed > self.config.reset_window {
                    inner.state = CircuitState::HalfOpen;
                    info!(breaker = %self.name, "circuit breaker half-open, probing");
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Closes the breaker and clears the failure count, from any state.
    pub fn record_success(&self) {
        let mut inner = self.lock();
        let previous = inner.state;
        inner.failure_count = 0;
        inner.state = CircuitState::Closed;
        if previous != CircuitState::Closed {
            info!(breaker = %self.name, from = %previous, "circuit breaker closed");
        }
    }

    pub fn record_failure(&self) {
        let mut inner = self.lock();
        inner.failure_count = inner.failure_count.saturating_add(1);
        inner.last_failure_at = Some(Instant::now());
        if inner.failure_count >= self.config.failure_threshold
            && inner.state != CircuitState::Open
        {
            inner.state = CircuitState::Open;
            warn!(
                breaker = %self.name,
                failures = inner.failure_count,
                "circuit breaker opened"
            );
        } else {
            debug!(
                breaker = %self.name,
                failures = inner.failure_count,
                state = %inner.state,
                "failure recorded"
            );
        }
    }

    /// Current state. Does not evaluate the reset window.
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn failure_count(&self) -> u32 {
        self.lock().failure_count
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }
}
