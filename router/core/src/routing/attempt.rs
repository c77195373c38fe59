//! Execution Attempt Runner
//!
//! One bounded attempt: a single (model, service subset) pair.
//!
//! ```text
//! services --connect (timeout each)--> connected subset   (failures dropped)
//!     |
//! system prompt + "\n\nAvailable services: a, b"
//!     |
//! provider.complete (timeout) --ok--> breaker.record_success, attempt logged
//!                             --err-> breaker.record_failure, attempt logged
//!     |
//! connected services released   (abandoned if the call is dropped first)
//! ```
//!
//! The outcome comes back as a `Result`; the attempt record is always
//! appended to the caller's [`AttemptLog`].

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::time::Instant;
use uuid::Uuid;

use super::breaker::CircuitBreaker;
use super::metrics::ExecutorMetrics;
use crate::catalog::{tokens_for, ModelCatalog};
use crate::config::ComplexityTier;
use crate::provider::{Completion, CompletionRequest, ProviderError, ProviderRegistry};
use crate::services::{ConnectError, ConnectionHandle, Intent, ServiceConnector, ServiceRegistry};

// ============================================================================
// Settings
// ============================================================================

/// Invocation parameters shared by every attempt
#[derive(Clone, Debug, PartialEq)]
pub struct ExecutionSettings {
    /// Sampling temperature
    pub temperature: f32,
    /// Completion token cap
    pub max_tokens: u32,
    /// Bound on each service connect
    pub connect_timeout: Duration,
    /// Bound on each model invocation
    pub invoke_timeout: Duration,
    /// Baseline factor for the `tokens_saved` estimate
    pub token_baseline_multiplier: u64,
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 2000,
            connect_timeout: Duration::from_secs(5),
            invoke_timeout: Duration::from_secs(120),
            token_baseline_multiplier: 3,
        }
    }
}

// ============================================================================
// Request Context
// ============================================================================

/// Per-call context carried through every attempt for log correlation
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RequestContext {
    /// Correlation id
    pub request_id: Uuid,
    /// Intent decided upstream, if known
    pub intent: Option<Intent>,
    /// Complexity decided upstream, if known
    pub complexity: Option<ComplexityTier>,
    /// Free-form caller metadata
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestContext {
    /// Fresh context with a random request id
    #[must_use]
    pub fn new() -> Self {
        Self {
            request_id: Uuid::new_v4(),
            intent: None,
            complexity: None,
            metadata: serde_json::Map::new(),
        }
    }

    /// Attach the classified intent
    #[must_use]
    pub fn with_intent(mut self, intent: Intent) -> Self {
        self.intent = Some(intent);
        self
    }

    /// Attach the analysed complexity
    #[must_use]
    pub fn with_complexity(mut self, complexity: ComplexityTier) -> Self {
        self.complexity = Some(complexity);
        self
    }

    /// Attach one metadata entry
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

// ============================================================================
// Attempt Records
// ============================================================================

/// Record of one attempt
#[derive(Clone, Debug, PartialEq)]
pub struct ExecutionAttempt {
    /// Model invoked
    pub model: String,
    /// First connected service, on success
    pub service: Option<String>,
    /// Service subset this attempt asked for
    pub requested_services: Vec<String>,
    /// Whether the model call succeeded
    pub success: bool,
    /// Failure description
    pub error: Option<String>,
    /// Wall-clock duration of the attempt
    pub duration: Duration,
    /// Estimated tokens consumed (0 on failure)
    pub tokens_used: u64,
    /// Estimated cost in USD (0 on failure)
    pub cost: f64,
}

/// Ordered attempts of one call; owned by the orchestration loop
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AttemptLog {
    attempts: Vec<ExecutionAttempt>,
}

impl AttemptLog {
    /// Empty log
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an attempt
    pub fn push(&mut self, attempt: ExecutionAttempt) {
        self.attempts.push(attempt);
    }

    /// Number of attempts
    #[must_use]
    pub fn len(&self) -> usize {
        self.attempts.len()
    }

    /// Whether nothing was attempted
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }

    /// Attempts in order
    pub fn iter(&self) -> impl Iterator<Item = &ExecutionAttempt> {
        self.attempts.iter()
    }

    /// Most recent attempt
    #[must_use]
    pub fn last(&self) -> Option<&ExecutionAttempt> {
        self.attempts.last()
    }

    /// Sum of attempt costs
    #[must_use]
    pub fn total_cost(&self) -> f64 {
        self.attempts.iter().map(|a| a.cost).sum()
    }

    /// Sum of attempt token estimates
    #[must_use]
    pub fn total_tokens(&self) -> u64 {
        self.attempts.iter().map(|a| a.tokens_used).sum()
    }

    /// Consume the log
    #[must_use]
    pub fn into_attempts(self) -> Vec<ExecutionAttempt> {
        self.attempts
    }
}

// ============================================================================
// Attempt Outcome
// ============================================================================

/// Inputs of one attempt
#[derive(Clone, Copy, Debug)]
pub struct AttemptInput<'a> {
    /// User message
    pub request: &'a str,
    /// System prompt, before service context is appended
    pub prompt: &'a str,
    /// Model to invoke
    pub model: &'a str,
    /// Services to connect
    pub services: &'a [String],
    /// Shared call context
    pub context: &'a RequestContext,
}

/// Successful attempt
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttemptSuccess {
    /// Model output
    pub response: String,
    /// Services that connected, in request order
    pub services_used: Vec<String>,
}

/// Failed attempt
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{model}: {error}")]
pub struct AttemptFailure {
    /// Model that failed
    pub model: String,
    /// Why it failed
    pub error: ProviderError,
}

/// Append the names of connected services to a system prompt
#[must_use]
pub fn with_service_context(prompt: &str, services: &[String]) -> String {
    if services.is_empty() {
        return prompt.to_string();
    }
    format!("{prompt}\n\nAvailable services: {}", services.join(", "))
}

// ============================================================================
// Held Connections
// ============================================================================

/// Connections owned by one attempt
///
/// Released with [`HeldConnections::release`]; whatever is still held when the
/// value is dropped (a cancelled call) is abandoned through the connector.
struct HeldConnections {
    connector: Arc<dyn ServiceConnector>,
    handles: VecDeque<ConnectionHandle>,
}

impl HeldConnections {
    fn new(connector: Arc<dyn ServiceConnector>) -> Self {
        Self {
            connector,
            handles: VecDeque::new(),
        }
    }

    fn names(&self) -> Vec<String> {
        self.handles.iter().map(|h| h.service.clone()).collect()
    }

    async fn release(mut self) {
        // Popped only once disconnected, so a drop mid-release still abandons it
        while let Some(handle) = self.handles.front().cloned() {
            self.connector.disconnect(handle).await;
            self.handles.pop_front();
        }
    }
}

impl Drop for HeldConnections {
    fn drop(&mut self) {
        for handle in self.handles.drain(..) {
            tracing::debug!(service = %handle.service, "Abandoning service connection");
            self.connector.abandon(&handle);
        }
    }
}

// ============================================================================
// Attempt Runner
// ============================================================================

/// Runs single attempts against shared collaborators
#[derive(Clone)]
pub struct AttemptRunner {
    pub(crate) catalog: Arc<ModelCatalog>,
    pub(crate) providers: Arc<ProviderRegistry>,
    pub(crate) services: Arc<ServiceRegistry>,
    pub(crate) connector: Arc<dyn ServiceConnector>,
    pub(crate) breaker: Arc<CircuitBreaker>,
    pub(crate) metrics: Arc<ExecutorMetrics>,
    pub(crate) settings: ExecutionSettings,
}

impl std::fmt::Debug for AttemptRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttemptRunner")
            .field("providers", &self.providers)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl AttemptRunner {
    /// Run one attempt, appending its record to `log`
    ///
    /// # Errors
    ///
    /// Returns an [`AttemptFailure`] when the model call fails or times out.
    /// Service connection problems never fail the attempt.
    pub async fn run(
        &self,
        input: AttemptInput<'_>,
        log: &mut AttemptLog,
    ) -> Result<AttemptSuccess, AttemptFailure> {
        let started = Instant::now();

        let connections = self.connect_services(input.services, input.context).await;
        let connected = connections.names();
        let system = with_service_context(input.prompt, &connected);

        let outcome = self.invoke(input.model, system, input.request).await;

        connections.release().await;
        let duration = started.elapsed();

        match outcome {
            Ok(completion) => {
                let text = [input.prompt, input.request, completion.content.as_str()].concat();
                let tokens_used = tokens_for(&text);
                let cost = self
                    .catalog
                    .estimate_text_cost(input.model, text.chars().count());

                self.breaker.record_success(input.model);
                self.metrics.record_attempt(input.model, true, duration);
                tracing::info!(
                    request_id = %input.context.request_id,
                    model = %input.model,
                    services = ?connected,
                    tokens = tokens_used,
                    "Attempt succeeded"
                );

                log.push(ExecutionAttempt {
                    model: input.model.to_string(),
                    service: connected.first().cloned(),
                    requested_services: input.services.to_vec(),
                    success: true,
                    error: None,
                    duration,
                    tokens_used,
                    cost,
                });

                Ok(AttemptSuccess {
                    response: completion.content,
                    services_used: connected,
                })
            }
            Err(error) => {
                let failures = self.breaker.record_failure(input.model);
                self.metrics.record_attempt(input.model, false, duration);
                tracing::error!(
                    request_id = %input.context.request_id,
                    model = %input.model,
                    error = %error,
                    failures,
                    "Attempt failed"
                );

                log.push(ExecutionAttempt {
                    model: input.model.to_string(),
                    service: None,
                    requested_services: input.services.to_vec(),
                    success: false,
                    error: Some(error.to_string()),
                    duration,
                    tokens_used: 0,
                    cost: 0.0,
                });

                Err(AttemptFailure {
                    model: input.model.to_string(),
                    error,
                })
            }
        }
    }

    async fn connect_services(
        &self,
        names: &[String],
        context: &RequestContext,
    ) -> HeldConnections {
        let mut connected = HeldConnections::new(Arc::clone(&self.connector));

        for name in names {
            match self.connect_one(name).await {
                Ok(handle) => connected.handles.push_back(handle),
                Err(e) => {
                    self.metrics.record_service_failure();
                    tracing::warn!(
                        request_id = %context.request_id,
                        service = %name,
                        error = %e,
                        "Service connection failed, continuing without it"
                    );
                }
            }
        }

        connected
    }

    async fn connect_one(&self, name: &str) -> Result<ConnectionHandle, ConnectError> {
        let descriptor = self
            .services
            .get_service(name)
            .ok_or_else(|| ConnectError::UnknownService(name.to_string()))?;
        if !descriptor.enabled {
            return Err(ConnectError::Disabled(name.to_string()));
        }

        let timeout = self.settings.connect_timeout;
        tokio::time::timeout(timeout, self.connector.connect(&descriptor))
            .await
            .map_err(|_| ConnectError::Timeout {
                service: name.to_string(),
                timeout,
            })?
    }

    async fn invoke(
        &self,
        model: &str,
        system: String,
        request: &str,
    ) -> Result<Completion, ProviderError> {
        let provider = self
            .providers
            .resolve(model)
            .ok_or_else(|| ProviderError::NotRegistered(model.to_string()))?;

        let completion_request = CompletionRequest::new(model, system, request)
            .with_temperature(self.settings.temperature)
            .with_max_tokens(self.settings.max_tokens);

        let timeout = self.settings.invoke_timeout;
        tokio::time::timeout(timeout, provider.complete(&completion_request))
            .await
            .map_err(|_| ProviderError::Timeout(timeout))?
    }
}
