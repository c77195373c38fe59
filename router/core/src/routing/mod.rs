//! Fallback-Driven Execution
//!
//! Runs a model call with automatic fallback across models and service sets.
//!
//! # Architecture
//!
//! ```text
//! +----------------------+
//! |   FallbackExecutor   |  <-- execute_with_fallback(request, prompt, model, services, ctx)
//! +----------+-----------+
//!            |
//!            v
//! +----------------------+      +------------------+
//! | FallbackChainBuilder |      |  CircuitBreaker  |  <-- consulted before each
//! +----------+-----------+      +--------+---------+      fallback model
//!            |                           |
//!            v                           v
//! +----------------------------------------------+
//! |                AttemptRunner                 |  <-- connect services, invoke,
//! +----------------------+-----------------------+      record attempt
//!                        |
//!                        v
//!              ExecutionResult  -->  ExecutorMetrics
//! ```
//!
//! # Design Principles
//!
//! 1. **Never fail the caller**: exhaustion is a structured result, not an error
//! 2. **Bounded work**: every suspension point carries a timeout
//! 3. **Shared health**: one breaker and one metrics collector across calls

pub mod attempt;
pub mod breaker;
pub mod executor;
pub mod fallback;
pub mod metrics;
pub mod outcome;

#[cfg(test)]
pub mod test_utils;

pub use attempt::{AttemptLog, ExecutionAttempt, ExecutionSettings, RequestContext};
pub use breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitSnapshot, CircuitState};
pub use executor::{FallbackExecutor, FallbackExecutorBuilder};
pub use fallback::{FallbackChain, FallbackChainBuilder, FallbackChainError};
pub use metrics::{ExecutorMetrics, MetricsSnapshot};
pub use outcome::{AttemptSummary, ExecutionFailure, ExecutionResult, ExecutionSuccess};
