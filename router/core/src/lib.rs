//! Router Core - Fallback-Driven LLM Execution
//!
//! Routes a request to an LLM chosen for cost and complexity, then executes
//! it with automatic fallback across models and auxiliary tool-services.
//! Upstream classification (intent, complexity) and prompt writing happen
//! elsewhere; this crate turns their selection into a best-effort completion.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  caller: (request, prompt, tier or model, services, context) │
//! └──────────────────────────────┬───────────────────────────────┘
//!                                │
//! ┌──────────────────────────────┼───────────────────────────────┐
//! │                         ROUTER CORE                          │
//! │  ┌───────────────┐   ┌───────┴──────────┐   ┌──────────────┐ │
//! │  │ ModelSelector │──▶│ FallbackExecutor │──▶│ ExecResult   │ │
//! │  └───────┬───────┘   └──┬─────┬─────┬───┘   └──────────────┘ │
//! │          │              │     │     │                        │
//! │  ┌───────┴──────┐ ┌─────┴──┐ ┌┴─────┴────────┐ ┌──────────┐  │
//! │  │ ModelCatalog │ │Breaker │ │ProviderRegistry│ │ Services │  │
//! │  └──────────────┘ └────────┘ └───────────────┘ └──────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```ignore
//! use router_core::{
//!     load_config, ComplexityTier, FallbackExecutor, ModelCatalog, ModelSelector,
//!     ProviderRegistry, RequestContext, SelectionOptions,
//! };
//!
//! let config = load_config()?;
//! let catalog = Arc::new(ModelCatalog::from_env());
//!
//! let mut providers = ProviderRegistry::new();
//! providers.register_vendor(&catalog, Provider::OpenAi, Arc::new(my_openai_client));
//!
//! let selector = ModelSelector::new(catalog.clone(), config.tiers.clone());
//! let model = selector.select(ComplexityTier::Moderate, &SelectionOptions::default())?;
//!
//! let executor = FallbackExecutor::builder()
//!     .catalog(catalog)
//!     .providers(Arc::new(providers))
//!     .config(config)
//!     .build()?;
//!
//! let result = executor
//!     .execute_with_fallback(request, prompt, &model, &services, &RequestContext::new())
//!     .await;
//! ```
//!
//! # Module Overview
//!
//! - [`catalog`]: Model metadata, availability, cost estimation and selection
//! - [`config`]: TOML configuration with environment and programmatic overrides
//! - [`provider`]: LLM vendor trait and model-to-provider registry
//! - [`routing`]: Circuit breaker, fallback chains and the orchestration loop
//! - [`services`]: Tool-service descriptors, registry and connectors
//! - [`telemetry`]: Tracing subscriber setup

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod catalog;
pub mod config;
pub mod error;
pub mod provider;
pub mod routing;
pub mod services;
pub mod telemetry;

// Catalog exports
pub use catalog::{
    estimate_cost, ModelCatalog, ModelDescriptor, ModelSelector, PricingTier, Provider,
    SelectionOptions,
};

// Config exports
pub use config::{
    default_config_path, load_config, load_config_from_path, load_config_with_env, ComplexityTier,
    ConfigError, ConfigOverrides, ConfigSource, ExecutionTiers, RouterConfig, TierConfig,
};

pub use error::RouterError;

// Provider exports
pub use provider::{Completion, CompletionRequest, ModelProvider, ProviderError, ProviderRegistry};

// Routing exports
pub use routing::{
    CircuitBreaker, CircuitBreakerConfig, CircuitState, ExecutionAttempt, ExecutionResult,
    ExecutionSettings, ExecutorMetrics, FallbackExecutor, RequestContext,
};

// Service exports
pub use services::{
    ConnectError, ConnectionHandle, Intent, ServiceConnector, ServiceDescriptor, ServiceKind,
    ServiceRegistry, TransportConnector,
};
