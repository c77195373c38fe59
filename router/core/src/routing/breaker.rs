//! Per-Model Circuit Breaker
//!
//! Counts invocation failures per model inside a fixed window that starts at
//! the first failure. Once the count reaches the threshold the circuit is
//! open and the orchestration loop skips the model as a fallback.
//!
//! ```text
//! +--------+   threshold failures    +------+
//! | Closed | ----------------------> | Open |
//! +--------+    within the window    +------+
//!     ^                                  |
//!     |  any success, or queried after   |
//!     +---- window_start + timeout ------+
//! ```
//!
//! There is no timer. An expired window is discarded the next time the model
//! is queried or fails again.
//!
//! # Thread Safety
//!
//! State lives in a `DashMap` keyed by model id; each read-modify-write holds
//! that key's shard lock, so concurrent requests never lose an update.
//! Time comes from `tokio::time::Instant`, which tests can pause and advance.

use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;
use tokio::time::Instant;

// ============================================================================
// Configuration
// ============================================================================

/// Breaker thresholds
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Failures within one window that open the circuit
    pub failure_threshold: u32,

    /// Window length, measured from the first failure
    pub timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            timeout: Duration::from_secs(300),
        }
    }
}

// ============================================================================
// State
// ============================================================================

/// Circuit state of one model
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CircuitState {
    /// Model may be attempted
    #[default]
    Closed,

    /// Model is skipped as a fallback
    Open,
}

#[derive(Clone, Copy, Debug)]
struct FailureWindow {
    failures: u32,
    started: Instant,
}

/// Point-in-time view of one tracked model
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CircuitSnapshot {
    /// Model id
    pub model: String,
    /// Failures in the current window
    pub failures: u32,
    /// Derived state
    pub state: CircuitState,
    /// Time since the window started
    pub window_age: Duration,
}

// ============================================================================
// Circuit Breaker
// ============================================================================

/// Failure-window tracker shared by all orchestration flows
#[derive(Debug, Default)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    windows: DashMap<String, FailureWindow>,
}

impl CircuitBreaker {
    /// Create a breaker with default thresholds (3 failures / 300 s)
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a breaker with custom thresholds
    #[must_use]
    pub fn with_config(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            windows: DashMap::new(),
        }
    }

    /// Active thresholds
    #[must_use]
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    fn expired(&self, window: &FailureWindow, now: Instant) -> bool {
        now.saturating_duration_since(window.started) >= self.config.timeout
    }

    /// Current state of a model, discarding an expired window
    pub fn state(&self, model: &str) -> CircuitState {
        let now = Instant::now();

        if let Some((_, window)) = self.windows.remove_if(model, |_, w| self.expired(w, now)) {
            tracing::debug!(
                model = %model,
                failures = window.failures,
                "Failure window expired, circuit closed"
            );
            return CircuitState::Closed;
        }

        match self.windows.get(model) {
            Some(window) if window.failures >= self.config.failure_threshold => CircuitState::Open,
            _ => CircuitState::Closed,
        }
    }

    /// Whether the model should be skipped
    pub fn is_open(&self, model: &str) -> bool {
        self.state(model) == CircuitState::Open
    }

    /// Record an invocation failure; returns the failure count in the window
    pub fn record_failure(&self, model: &str) -> u32 {
        let now = Instant::now();

        let failures = {
            let mut window = self
                .windows
                .entry(model.to_string())
                .or_insert(FailureWindow {
                    failures: 0,
                    started: now,
                });
            if self.expired(&window, now) {
                *window = FailureWindow {
                    failures: 0,
                    started: now,
                };
            }
            window.failures = window.failures.saturating_add(1);
            window.failures
        };

        if failures == self.config.failure_threshold {
            tracing::warn!(
                model = %model,
                failures,
                timeout_secs = self.config.timeout.as_secs(),
                "Circuit opened"
            );
        }
        failures
    }

    /// Record a success, closing the circuit
    pub fn record_success(&self, model: &str) {
        if let Some((_, window)) = self.windows.remove(model) {
            if window.failures >= self.config.failure_threshold {
                tracing::info!(model = %model, "Circuit closed after success");
            }
        }
    }

    /// Failures counted in the model's live window (0 if none or expired)
    #[must_use]
    pub fn failure_count(&self, model: &str) -> u32 {
        let now = Instant::now();
        self.windows
            .get(model)
            .filter(|w| !self.expired(w, now))
            .map_or(0, |w| w.failures)
    }

    /// Forget all state
    pub fn reset_all(&self) {
        self.windows.clear();
    }

    /// Models whose circuit is currently open
    #[must_use]
    pub fn open_circuits(&self) -> Vec<String> {
        let mut open: Vec<_> = self
            .snapshot()
            .into_iter()
            .filter(|s| s.state == CircuitState::Open)
            .map(|s| s.model)
            .collect();
        open.sort();
        open
    }

    /// All tracked models with a live window, sorted by model id
    #[must_use]
    pub fn snapshot(&self) -> Vec<CircuitSnapshot> {
        let now = Instant::now();
        let mut snapshots: Vec<_> = self
            .windows
            .iter()
            .filter(|entry| !self.expired(entry.value(), now))
            .map(|entry| {
                let window = entry.value();
                CircuitSnapshot {
                    model: entry.key().clone(),
                    failures: window.failures,
                    state: if window.failures >= self.config.failure_threshold {
                        CircuitState::Open
                    } else {
                        CircuitState::Closed
                    },
                    window_age: now.saturating_duration_since(window.started),
                }
            })
            .collect();
        snapshots.sort_by(|a, b| a.model.cmp(&b.model));
        snapshots
    }
}
