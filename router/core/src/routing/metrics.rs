//! Execution Metrics
//!
//! Process-wide aggregates of orchestration calls. Per-call attempt logs are
//! discarded once the result is built; only these counters persist:
//! - Calls (total, successes, failures, served by a fallback)
//! - Attempts, per model and overall
//! - Circuit skips and service connection failures
//! - Tokens used and saved, cost in micro-USD
//! - Call duration distribution

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;

use super::outcome::ExecutionResult;

// ============================================================================
// Histogram for Latency Tracking
// ============================================================================

/// A histogram for tracking latency distributions
#[derive(Debug)]
pub struct Histogram {
    /// Bucket upper bounds (milliseconds)
    buckets: Vec<f64>,
    /// Count per bucket
    counts: Vec<AtomicU64>,
    total_count: AtomicU64,
    sum: AtomicU64,
    min: AtomicU64,
    max: AtomicU64,
}

impl Histogram {
    /// Create a histogram with the given bucket upper bounds
    #[must_use]
    pub fn new(buckets: Vec<f64>) -> Self {
        let counts = buckets.iter().map(|_| AtomicU64::new(0)).collect();
        Self {
            buckets,
            counts,
            total_count: AtomicU64::new(0),
            sum: AtomicU64::new(0),
            min: AtomicU64::new(u64::MAX),
            max: AtomicU64::new(0),
        }
    }

    /// Buckets suited to model calls, 50 ms to the 120 s invoke timeout
    #[must_use]
    pub fn latency_default() -> Self {
        Self::new(vec![
            50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0, 30000.0, 60000.0,
            120_000.0,
        ])
    }

    /// Record one duration
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn record(&self, duration: Duration) {
        let value_ms = duration.as_secs_f64() * 1000.0;
        let Some(last) = self.buckets.len().checked_sub(1) else {
            return;
        };
        let bucket_idx = self
            .buckets
            .iter()
            .position(|&b| value_ms <= b)
            .unwrap_or(last);

        let value = value_ms as u64;
        self.counts[bucket_idx].fetch_add(1, Ordering::Relaxed);
        self.total_count.fetch_add(1, Ordering::Relaxed);
        self.sum.fetch_add(value, Ordering::Relaxed);
        self.min.fetch_min(value, Ordering::Relaxed);
        self.max.fetch_max(value, Ordering::Relaxed);
    }

    /// Point-in-time copy
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn snapshot(&self) -> HistogramSnapshot {
        let counts: Vec<u64> = self
            .counts
            .iter()
            .map(|c| c.load(Ordering::Relaxed))
            .collect();
        let total = self.total_count.load(Ordering::Relaxed);
        let sum = self.sum.load(Ordering::Relaxed);
        let min = self.min.load(Ordering::Relaxed);

        HistogramSnapshot {
            buckets: self.buckets.clone(),
            counts,
            total,
            sum_ms: sum,
            min_ms: if min == u64::MAX { 0 } else { min },
            max_ms: self.max.load(Ordering::Relaxed),
            mean_ms: if total > 0 {
                sum as f64 / total as f64
            } else {
                0.0
            },
        }
    }
}

/// Snapshot of histogram data
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HistogramSnapshot {
    /// Bucket upper bounds (ms)
    pub buckets: Vec<f64>,
    /// Count per bucket
    pub counts: Vec<u64>,
    /// Number of samples
    pub total: u64,
    /// Sum of samples (ms)
    pub sum_ms: u64,
    /// Smallest sample (ms)
    pub min_ms: u64,
    /// Largest sample (ms)
    pub max_ms: u64,
    /// Mean sample (ms)
    pub mean_ms: f64,
}

impl HistogramSnapshot {
    /// Upper bound of the bucket holding the `p` quantile
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn percentile(&self, p: f64) -> f64 {
        if self.total == 0 {
            return 0.0;
        }

        let target = (self.total as f64 * p).ceil() as u64;
        let mut cumulative = 0u64;
        for (i, &count) in self.counts.iter().enumerate() {
            cumulative += count;
            if cumulative >= target {
                return self.buckets[i];
            }
        }

        self.buckets.last().copied().unwrap_or(0.0)
    }

    /// Get p50
    #[must_use]
    pub fn p50(&self) -> f64 {
        self.percentile(0.5)
    }

    /// Get p99
    #[must_use]
    pub fn p99(&self) -> f64 {
        self.percentile(0.99)
    }
}

// ============================================================================
// Counter
// ============================================================================

/// A simple atomic counter
#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    /// Zeroed counter
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one
    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    /// Add `n`
    pub fn add(&self, n: u64) {
        self.value.fetch_add(n, Ordering::Relaxed);
    }

    /// Current value
    #[must_use]
    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

// ============================================================================
// Per-Model Metrics
// ============================================================================

#[derive(Debug)]
struct ModelCounters {
    attempts: Counter,
    successes: Counter,
    failures: Counter,
    circuit_skips: Counter,
    latency: Histogram,
}

impl Default for ModelCounters {
    fn default() -> Self {
        Self {
            attempts: Counter::new(),
            successes: Counter::new(),
            failures: Counter::new(),
            circuit_skips: Counter::new(),
            latency: Histogram::latency_default(),
        }
    }
}

/// Attempt counters of one model
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ModelMetricsSnapshot {
    /// Model id
    pub model: String,
    /// Attempts made
    pub attempts: u64,
    /// Successful attempts
    pub successes: u64,
    /// Failed attempts
    pub failures: u64,
    /// Times skipped with an open circuit
    pub circuit_skips: u64,
    /// Median attempt duration (bucket bound, ms)
    pub latency_p50_ms: f64,
}

impl ModelMetricsSnapshot {
    /// Fraction of attempts that failed
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn error_rate(&self) -> f64 {
        if self.attempts == 0 {
            return 0.0;
        }
        self.failures as f64 / self.attempts as f64
    }
}

// ============================================================================
// Executor Metrics
// ============================================================================

/// Aggregates shared by every orchestration call
#[derive(Debug)]
pub struct ExecutorMetrics {
    executions: Counter,
    successes: Counter,
    failures: Counter,
    fallback_executions: Counter,
    attempts: Counter,
    circuit_skips: Counter,
    service_connection_failures: Counter,
    tokens_used: Counter,
    tokens_saved: Counter,
    cost_micros: Counter,
    execution_time: Histogram,
    models: DashMap<String, ModelCounters>,
}

impl Default for ExecutorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutorMetrics {
    /// Zeroed collector
    #[must_use]
    pub fn new() -> Self {
        Self {
            executions: Counter::new(),
            successes: Counter::new(),
            failures: Counter::new(),
            fallback_executions: Counter::new(),
            attempts: Counter::new(),
            circuit_skips: Counter::new(),
            service_connection_failures: Counter::new(),
            tokens_used: Counter::new(),
            tokens_saved: Counter::new(),
            cost_micros: Counter::new(),
            execution_time: Histogram::latency_default(),
            models: DashMap::new(),
        }
    }

    /// Record one attempt against a model
    pub fn record_attempt(&self, model: &str, success: bool, duration: Duration) {
        self.attempts.inc();
        let counters = self.models.entry(model.to_string()).or_default();
        counters.attempts.inc();
        counters.latency.record(duration);
        if success {
            counters.successes.inc();
        } else {
            counters.failures.inc();
        }
    }

    /// Record a fallback model skipped because its circuit is open
    pub fn record_circuit_skip(&self, model: &str) {
        self.circuit_skips.inc();
        self.models
            .entry(model.to_string())
            .or_default()
            .circuit_skips
            .inc();
    }

    /// Record a service that could not be connected
    pub fn record_service_failure(&self) {
        self.service_connection_failures.inc();
    }

    /// Record a finished call
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn record_execution(&self, result: &ExecutionResult) {
        self.executions.inc();
        self.execution_time.record(result.duration());

        match result {
            ExecutionResult::Success(success) => {
                self.successes.inc();
                if success.fallback_attempts > 0 {
                    self.fallback_executions.inc();
                }
                self.tokens_used.add(success.tokens_used);
                self.tokens_saved.add(success.tokens_saved);
                self.cost_micros
                    .add((success.cost * 1_000_000.0).round() as u64);
            }
            ExecutionResult::Failure(_) => self.failures.inc(),
        }
    }

    /// Serialisable point-in-time copy
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let mut models: Vec<ModelMetricsSnapshot> = self
            .models
            .iter()
            .map(|entry| ModelMetricsSnapshot {
                model: entry.key().clone(),
                attempts: entry.attempts.get(),
                successes: entry.successes.get(),
                failures: entry.failures.get(),
                circuit_skips: entry.circuit_skips.get(),
                latency_p50_ms: entry.latency.snapshot().p50(),
            })
            .collect();
        models.sort_by(|a, b| a.model.cmp(&b.model));

        let cost_micros = self.cost_micros.get();
        MetricsSnapshot {
            executions: self.executions.get(),
            successes: self.successes.get(),
            failures: self.failures.get(),
            fallback_executions: self.fallback_executions.get(),
            attempts: self.attempts.get(),
            circuit_skips: self.circuit_skips.get(),
            service_connection_failures: self.service_connection_failures.get(),
            tokens_used: self.tokens_used.get(),
            tokens_saved: self.tokens_saved.get(),
            cost_micros,
            cost_usd: cost_micros as f64 / 1_000_000.0,
            execution_time: self.execution_time.snapshot(),
            models,
        }
    }
}

/// Serialisable copy of [`ExecutorMetrics`]
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    /// Finished calls
    pub executions: u64,
    /// Calls that produced a response
    pub successes: u64,
    /// Calls where every attempt failed
    pub failures: u64,
    /// Successful calls that needed more than one attempt
    pub fallback_executions: u64,
    /// Attempts across all calls
    pub attempts: u64,
    /// Fallback models skipped with an open circuit
    pub circuit_skips: u64,
    /// Services that could not be connected
    pub service_connection_failures: u64,
    /// Tokens consumed by successful calls
    pub tokens_used: u64,
    /// Estimated tokens saved by successful calls
    pub tokens_saved: u64,
    /// Spend in micro-USD
    pub cost_micros: u64,
    /// Spend in USD
    pub cost_usd: f64,
    /// Call duration distribution
    pub execution_time: HistogramSnapshot,
    /// Per-model counters, sorted by model id
    pub models: Vec<ModelMetricsSnapshot>,
}

impl MetricsSnapshot {
    /// Counters of one model
    #[must_use]
    pub fn model(&self, model: &str) -> Option<&ModelMetricsSnapshot> {
        self.models.iter().find(|m| m.model == model)
    }
}
