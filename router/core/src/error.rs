//! Setup-time errors
//!
//! These are raised before any attempt is made. Failures that happen while
//! executing a request never surface as errors; they end up in the attempt log
//! of an [`ExecutionResult`](crate::routing::ExecutionResult).

use thiserror::Error;

use crate::config::ConfigError;

/// Errors raised while building or configuring the execution engine
#[derive(Debug, Error)]
pub enum RouterError {
    /// No catalog model has a provider credential
    #[error(
        "No models available: set at least one of OPENAI_API_KEY, GOOGLE_API_KEY or ANTHROPIC_API_KEY"
    )]
    NoModelsAvailable,

    /// Model id is not in the catalog
    #[error("Unknown model: {0}")]
    UnknownModel(String),

    /// A required collaborator was not supplied to the builder
    #[error("Executor is missing a component: {0}")]
    MissingComponent(&'static str),

    /// Configuration could not be loaded or is invalid
    #[error(transparent)]
    Config(#[from] ConfigError),
}
