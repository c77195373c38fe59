//! Execution Result
//!
//! Unified outcome of one orchestration call. Exactly one variant is produced
//! per call; both serialise with a top-level `success` flag:
//!
//! ```text
//! {"success": true,  "response": ..., "model_used": ..., "attempts": [...]}
//! {"success": false, "error": "All execution attempts failed", "attempts": [...]}
//! ```
//!
//! Attempt summaries are redacted: model, services, outcome and timing only.

use std::fmt::Write as _;
use std::time::Duration;

use serde::{Serialize, Serializer};

use super::attempt::{AttemptLog, AttemptSuccess, ExecutionAttempt};

/// Error text of an exhausted call
pub const EXHAUSTED_ERROR: &str = "All execution attempts failed";

#[allow(clippy::trivially_copy_pass_by_ref)]
fn as_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64() * 1000.0)
}

// ============================================================================
// Attempt Summary
// ============================================================================

/// Redacted view of one attempt
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AttemptSummary {
    /// Model invoked
    pub model: String,
    /// Services requested for the attempt
    pub services: Vec<String>,
    /// Whether it succeeded
    pub success: bool,
    /// Failure description
    pub error: Option<String>,
    /// Attempt duration
    #[serde(rename = "duration_ms", serialize_with = "as_millis")]
    pub duration: Duration,
}

impl From<&ExecutionAttempt> for AttemptSummary {
    fn from(attempt: &ExecutionAttempt) -> Self {
        Self {
            model: attempt.model.clone(),
            services: attempt.requested_services.clone(),
            success: attempt.success,
            error: attempt.error.clone(),
            duration: attempt.duration,
        }
    }
}

fn summarize(log: &AttemptLog) -> Vec<AttemptSummary> {
    log.iter().map(AttemptSummary::from).collect()
}

// ============================================================================
// Result Variants
// ============================================================================

/// A call that produced a response
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ExecutionSuccess {
    /// Model output
    pub response: String,
    /// Model of the successful attempt
    pub model_used: String,
    /// Services connected for the successful attempt
    pub services_used: Vec<String>,
    /// Tokens summed over all attempts
    pub tokens_used: u64,
    /// Estimated savings against a multi-call baseline
    pub tokens_saved: u64,
    /// Cost summed over all attempts (USD)
    pub cost: f64,
    /// Wall clock of the whole call
    #[serde(rename = "duration_ms", serialize_with = "as_millis")]
    pub duration: Duration,
    /// Attempts after the first
    pub fallback_attempts: usize,
    /// Every attempt, in order
    pub attempts: Vec<AttemptSummary>,
}

/// A call where every attempt failed
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ExecutionFailure {
    /// Always [`EXHAUSTED_ERROR`]
    pub error: String,
    /// Wall clock of the whole call
    #[serde(rename = "duration_ms", serialize_with = "as_millis")]
    pub duration: Duration,
    /// Every attempt, in order
    pub attempts: Vec<AttemptSummary>,
}

impl ExecutionFailure {
    /// Human-readable account of every attempt made
    #[must_use]
    pub fn explanation(&self) -> String {
        let mut text = format!("{} ({} attempts):", self.error, self.attempts.len());
        for (index, attempt) in self.attempts.iter().enumerate() {
            let services = if attempt.services.is_empty() {
                "no services".to_string()
            } else {
                attempt.services.join(", ")
            };
            let _ = write!(
                text,
                "\n  {}. {} [{}]: {}",
                index + 1,
                attempt.model,
                services,
                attempt.error.as_deref().unwrap_or("unknown error")
            );
        }
        text
    }
}

/// Outcome of [`FallbackExecutor::execute_with_fallback`](super::FallbackExecutor::execute_with_fallback)
#[derive(Clone, Debug, PartialEq)]
pub enum ExecutionResult {
    /// Some attempt succeeded
    Success(ExecutionSuccess),
    /// All attempts failed
    Failure(ExecutionFailure),
}

#[derive(Serialize)]
struct Flagged<'a, T> {
    success: bool,
    #[serde(flatten)]
    body: &'a T,
}

impl Serialize for ExecutionResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Success(body) => Flagged {
                success: true,
                body,
            }
            .serialize(serializer),
            Self::Failure(body) => Flagged {
                success: false,
                body,
            }
            .serialize(serializer),
        }
    }
}

impl ExecutionResult {
    /// Build a success from the winning attempt and the call's log
    #[must_use]
    pub fn success(
        outcome: AttemptSuccess,
        model_used: &str,
        log: &AttemptLog,
        duration: Duration,
        baseline_multiplier: u64,
    ) -> Self {
        let tokens_used = log.total_tokens();
        Self::Success(ExecutionSuccess {
            response: outcome.response,
            model_used: model_used.to_string(),
            services_used: outcome.services_used,
            tokens_used,
            tokens_saved: tokens_used.saturating_mul(baseline_multiplier.saturating_sub(1)),
            cost: log.total_cost(),
            duration,
            fallback_attempts: log.len().saturating_sub(1),
            attempts: summarize(log),
        })
    }

    /// Build the exhausted-call failure
    #[must_use]
    pub fn failure(log: &AttemptLog, duration: Duration) -> Self {
        Self::Failure(ExecutionFailure {
            error: EXHAUSTED_ERROR.to_string(),
            duration,
            attempts: summarize(log),
        })
    }

    /// Whether the call succeeded
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Attempt summaries, in order
    #[must_use]
    pub fn attempts(&self) -> &[AttemptSummary] {
        match self {
            Self::Success(s) => &s.attempts,
            Self::Failure(f) => &f.attempts,
        }
    }

    /// Wall clock of the call
    #[must_use]
    pub fn duration(&self) -> Duration {
        match self {
            Self::Success(s) => s.duration,
            Self::Failure(f) => f.duration,
        }
    }

    /// Model output, on success
    #[must_use]
    pub fn response(&self) -> Option<&str> {
        match self {
            Self::Success(s) => Some(&s.response),
            Self::Failure(_) => None,
        }
    }

    /// Winning model, on success
    #[must_use]
    pub fn model_used(&self) -> Option<&str> {
        match self {
            Self::Success(s) => Some(&s.model_used),
            Self::Failure(_) => None,
        }
    }
}
