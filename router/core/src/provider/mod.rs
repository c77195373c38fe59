//! Model Provider Seam
//!
//! Trait for the upstream LLM vendors plus an explicit model-to-provider
//! registry. The registry is filled once, when the catalog is loaded, so
//! dispatch never depends on the shape of a model name.
//!
//! ```text
//! "claude-3-haiku-20240307" --ProviderRegistry--> Arc<dyn ModelProvider>
//!                                                      |
//!                                     complete(&CompletionRequest)
//!                                                      v
//!                                     Result<Completion, ProviderError>
//! ```

mod registry;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use registry::ProviderRegistry;

// ============================================================================
// Request / Response
// ============================================================================

/// One completion call
#[derive(Clone, Debug, PartialEq)]
pub struct CompletionRequest {
    /// Model identifier
    pub model: String,
    /// System prompt (service context already appended)
    pub system: String,
    /// User message
    pub prompt: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Completion token cap
    pub max_tokens: u32,
}

impl CompletionRequest {
    /// Create a request with default sampling parameters
    pub fn new(
        model: impl Into<String>,
        system: impl Into<String>,
        prompt: impl Into<String>,
    ) -> Self {
        Self {
            model: model.into(),
            system: system.into(),
            prompt: prompt.into(),
            temperature: 0.7,
            max_tokens: 2000,
        }
    }

    /// Set temperature
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set max tokens
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// Result of a completion call
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Completion {
    /// Generated text
    pub content: String,
    /// Model that produced it
    pub model: String,
}

// ============================================================================
// Errors
// ============================================================================

/// Why a model invocation failed
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// No provider is registered for the model
    #[error("No provider registered for model {0}")]
    NotRegistered(String),

    /// Transport-level failure reaching the provider
    #[error("Network error: {0}")]
    Network(String),

    /// Credentials rejected
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Provider throttled the call
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Call exceeded the invocation timeout
    #[error("Model call timed out after {0:?}")]
    Timeout(Duration),

    /// Any other provider-reported failure
    #[error("Provider error: {0}")]
    Provider(String),
}

// ============================================================================
// Provider Trait
// ============================================================================

/// An upstream LLM vendor
///
/// Implementations handle provider-specific details (API formats, auth, etc.)
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Provider name for logs (e.g., "openai")
    fn name(&self) -> &str;

    /// Run one completion
    ///
    /// # Errors
    ///
    /// Returns a [`ProviderError`] describing why the call failed.
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, ProviderError>;
}
