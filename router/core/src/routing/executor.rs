//! Fallback Orchestration Loop
//!
//! Turns a (model, services) selection into a best-effort completion.
//!
//! ```text
//!  1. primary model, all requested services
//!        | fail
//!  2. each chain model, all requested services   (skipped while circuit OPEN)
//!        | all fail
//!  3. chain[0] (or primary), each reduced service subset
//!        | all fail
//!  4. ExecutionResult::Failure
//! ```
//!
//! Attempts are strictly sequential within a call. Many calls may share one
//! executor behind an `Arc`; the breaker and metrics are the only shared
//! mutable state.
//!
//! # Example
//!
//! ```ignore
//! let executor = FallbackExecutor::builder()
//!     .catalog(Arc::new(ModelCatalog::from_env()))
//!     .providers(Arc::new(providers))
//!     .config(load_config()?)
//!     .build()?;
//!
//! let result = executor
//!     .execute_with_fallback(request, prompt, "gpt-4o", &services, &RequestContext::new())
//!     .await;
//! ```

use std::sync::Arc;

use tokio::time::Instant;
use tracing::Instrument;

use super::attempt::{
    AttemptInput, AttemptLog, AttemptRunner, AttemptSuccess, ExecutionSettings, RequestContext,
};
use super::breaker::CircuitBreaker;
use super::fallback::{FallbackChain, FallbackChainBuilder};
use super::metrics::ExecutorMetrics;
use super::outcome::ExecutionResult;
use crate::catalog::ModelCatalog;
use crate::config::RouterConfig;
use crate::error::RouterError;
use crate::provider::ProviderRegistry;
use crate::services::{ServiceConnector, ServiceRegistry, TransportConnector};

// ============================================================================
// Builder
// ============================================================================

/// Assembles a [`FallbackExecutor`] from its collaborators
///
/// The catalog and provider registry are required. Everything else defaults
/// from the configuration: services from `[services.*]`, a breaker with the
/// configured thresholds, the bundled [`TransportConnector`] and fresh metrics.
#[derive(Default)]
pub struct FallbackExecutorBuilder {
    catalog: Option<Arc<ModelCatalog>>,
    providers: Option<Arc<ProviderRegistry>>,
    services: Option<Arc<ServiceRegistry>>,
    connector: Option<Arc<dyn ServiceConnector>>,
    breaker: Option<Arc<CircuitBreaker>>,
    metrics: Option<Arc<ExecutorMetrics>>,
    config: RouterConfig,
}

impl FallbackExecutorBuilder {
    /// Model catalog (required)
    #[must_use]
    pub fn catalog(mut self, catalog: Arc<ModelCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Model to provider routing (required)
    #[must_use]
    pub fn providers(mut self, providers: Arc<ProviderRegistry>) -> Self {
        self.providers = Some(providers);
        self
    }

    /// Service registry shared with other components
    #[must_use]
    pub fn services(mut self, services: Arc<ServiceRegistry>) -> Self {
        self.services = Some(services);
        self
    }

    /// Service connector
    #[must_use]
    pub fn connector(mut self, connector: Arc<dyn ServiceConnector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Breaker shared with other executors
    #[must_use]
    pub fn breaker(mut self, breaker: Arc<CircuitBreaker>) -> Self {
        self.breaker = Some(breaker);
        self
    }

    /// Metrics shared with other executors
    #[must_use]
    pub fn metrics(mut self, metrics: Arc<ExecutorMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Loaded configuration
    #[must_use]
    pub fn config(mut self, config: RouterConfig) -> Self {
        self.config = config;
        self
    }

    /// Validate and assemble
    ///
    /// # Errors
    ///
    /// - [`RouterError::MissingComponent`] if the catalog or providers were not supplied
    /// - [`RouterError::Config`] if the configuration is invalid
    /// - [`RouterError::UnknownModel`] if a tier names a model the catalog lacks
    /// - [`RouterError::NoModelsAvailable`] if no catalog model has a credential
    pub fn build(self) -> Result<FallbackExecutor, RouterError> {
        let catalog = self
            .catalog
            .ok_or(RouterError::MissingComponent("catalog"))?;
        let providers = self
            .providers
            .ok_or(RouterError::MissingComponent("providers"))?;

        self.config.validate()?;
        for (_, tier) in self.config.tiers.iter() {
            for model in std::iter::once(&tier.preferred).chain(&tier.fallback) {
                if catalog.lookup(model).is_none() {
                    return Err(RouterError::UnknownModel(model.clone()));
                }
            }
        }
        if !catalog.has_available_models() {
            return Err(RouterError::NoModelsAvailable);
        }

        let services = self
            .services
            .unwrap_or_else(|| Arc::new(ServiceRegistry::from_config(&self.config)));
        let connector = self
            .connector
            .unwrap_or_else(|| Arc::new(TransportConnector::new()));
        let breaker = self
            .breaker
            .unwrap_or_else(|| Arc::new(CircuitBreaker::with_config(self.config.breaker.clone())));
        let metrics = self.metrics.unwrap_or_default();

        tracing::info!(
            available_models = catalog.available_models().len(),
            routed_models = providers.len(),
            services = services.all_services().len(),
            failure_threshold = breaker.config().failure_threshold,
            "Fallback executor ready"
        );

        Ok(FallbackExecutor {
            chains: FallbackChainBuilder::from_config(&self.config),
            runner: AttemptRunner {
                catalog,
                providers,
                services,
                connector,
                breaker,
                metrics,
                settings: self.config.execution,
            },
        })
    }
}

// ============================================================================
// Executor
// ============================================================================

/// Executes requests with model and service fallback
#[derive(Clone, Debug)]
pub struct FallbackExecutor {
    runner: AttemptRunner,
    chains: FallbackChainBuilder,
}

impl FallbackExecutor {
    /// Start assembling an executor
    #[must_use]
    pub fn builder() -> FallbackExecutorBuilder {
        FallbackExecutorBuilder::default()
    }

    /// Shared circuit breaker
    #[must_use]
    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.runner.breaker
    }

    /// Shared metrics
    #[must_use]
    pub fn metrics(&self) -> &Arc<ExecutorMetrics> {
        &self.runner.metrics
    }

    /// Model catalog in use
    #[must_use]
    pub fn catalog(&self) -> &Arc<ModelCatalog> {
        &self.runner.catalog
    }

    /// Service registry in use
    #[must_use]
    pub fn services(&self) -> &Arc<ServiceRegistry> {
        &self.runner.services
    }

    /// Invocation settings
    #[must_use]
    pub fn settings(&self) -> &ExecutionSettings {
        &self.runner.settings
    }

    /// Alternatives that a call for `model` with `services` would walk
    #[must_use]
    pub fn fallback_chain(&self, model: &str, services: &[String]) -> FallbackChain {
        self.chains.build(model, services, &self.runner.catalog)
    }

    /// Run a request, falling back across models and service subsets
    ///
    /// Never fails: exhaustion is reported as [`ExecutionResult::Failure`]
    /// carrying every attempt made.
    pub async fn execute_with_fallback(
        &self,
        request: &str,
        prompt: &str,
        model: &str,
        services: &[String],
        context: &RequestContext,
    ) -> ExecutionResult {
        let span = tracing::info_span!(
            "execute",
            request_id = %context.request_id,
            primary = %model,
        );

        let result = self
            .run_chain(AttemptInput {
                request,
                prompt,
                model,
                services,
                context,
            })
            .instrument(span)
            .await;

        self.runner.metrics.record_execution(&result);
        result
    }

    async fn run_chain(&self, primary: AttemptInput<'_>) -> ExecutionResult {
        let started = Instant::now();
        let mut log = AttemptLog::new();
        let chain = self.fallback_chain(primary.model, primary.services);

        match self.runner.run(primary, &mut log).await {
            Ok(success) => return self.succeed(success, primary.model, &log, started),
            Err(failure) => {
                tracing::info!(
                    model = %primary.model,
                    error = %failure.error,
                    fallbacks = chain.models.len(),
                    "Primary model failed, trying fallbacks"
                );
            }
        }

        for fallback in &chain.models {
            if self.runner.breaker.is_open(fallback) {
                self.runner.metrics.record_circuit_skip(fallback);
                tracing::warn!(model = %fallback, "Circuit open, skipping fallback model");
                continue;
            }

            tracing::info!(
                model = %fallback,
                attempt = log.len() + 1,
                "Trying fallback model"
            );
            let input = AttemptInput {
                model: fallback,
                ..primary
            };
            if let Ok(success) = self.runner.run(input, &mut log).await {
                return self.succeed(success, fallback, &log, started);
            }
        }

        let breaker = &self.runner.breaker;
        let service_model = chain.service_fallback_model(|model| breaker.is_open(model));
        for subset in &chain.service_subsets {
            tracing::info!(
                model = %service_model,
                services = ?subset,
                attempt = log.len() + 1,
                "Trying reduced service set"
            );
            let input = AttemptInput {
                model: service_model,
                services: subset,
                ..primary
            };
            if let Ok(success) = self.runner.run(input, &mut log).await {
                return self.succeed(success, service_model, &log, started);
            }
        }

        tracing::error!(attempts = log.len(), "All execution attempts failed");
        ExecutionResult::failure(&log, started.elapsed())
    }

    fn succeed(
        &self,
        success: AttemptSuccess,
        model: &str,
        log: &AttemptLog,
        started: Instant,
    ) -> ExecutionResult {
        tracing::info!(
            model = %model,
            attempts = log.len(),
            "Execution succeeded"
        );
        ExecutionResult::success(
            success,
            model,
            log,
            started.elapsed(),
            self.runner.settings.token_baseline_multiplier,
        )
    }
}
