//! Fallback Chain Construction
//!
//! Computes, per call, the ordered alternatives the orchestration loop walks
//! after the primary attempt fails.
//!
//! # Model chain
//!
//! ```text
//! primary = "gpt-4o"
//!     |
//!     v
//! 1. first tier whose preferred == primary  -> its fallback list, in order
//! 2. generic list (gpt-3.5-turbo, gemini-2.0-flash, claude-3-haiku-20240307)
//!    minus the primary and anything already present
//! 3. keep only available models, order preserved
//! ```
//!
//! # Service subsets
//!
//! Only built when more than one service was requested:
//!
//! ```text
//! [a, b, c, d] -> [a], [a, b], []
//! [a, b, c]    -> [a], [a],    []
//! [a, b]       -> [a],         []
//! ```
//!
//! The `[]` subset is always last, so the final attempt runs without services.

use crate::catalog::ModelCatalog;
use crate::config::{ExecutionTiers, RouterConfig, TierConfig};

/// Generic fallback models used when none are configured
pub const DEFAULT_GENERIC_FALLBACKS: &[&str] =
    &["gpt-3.5-turbo", "gemini-2.0-flash", "claude-3-haiku-20240307"];

// ============================================================================
// Chain Validation
// ============================================================================

/// Problems with a configured tier chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackChainError {
    /// Tier has no preferred model
    EmptyPreferred,
    /// The preferred model appears in its own fallback list
    CycleDetected {
        /// The repeated model
        model: String,
    },
    /// A fallback model is listed twice
    DuplicateModel {
        /// The repeated model
        model: String,
    },
    /// Chain is longer than allowed
    MaxDepthExceeded {
        /// Actual depth (preferred plus fallbacks)
        depth: usize,
        /// Allowed depth
        max: usize,
    },
}

impl std::fmt::Display for FallbackChainError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyPreferred => write!(f, "preferred model must not be empty"),
            Self::CycleDetected { model } => {
                write!(f, "cycle detected: {model} falls back to itself")
            }
            Self::DuplicateModel { model } => {
                write!(f, "model {model} appears more than once in the fallback list")
            }
            Self::MaxDepthExceeded { depth, max } => {
                write!(f, "chain depth {depth} exceeds maximum {max}")
            }
        }
    }
}

impl std::error::Error for FallbackChainError {}

/// Check a tier's chain for cycles, duplicates and excessive depth
///
/// # Errors
///
/// Returns the first [`FallbackChainError`] found.
pub fn validate_tier_chain(tier: &TierConfig, max_depth: usize) -> Result<(), FallbackChainError> {
    if tier.preferred.trim().is_empty() {
        return Err(FallbackChainError::EmptyPreferred);
    }

    let mut seen = std::collections::HashSet::new();
    for model in &tier.fallback {
        if *model == tier.preferred {
            return Err(FallbackChainError::CycleDetected {
                model: model.clone(),
            });
        }
        if !seen.insert(model.as_str()) {
            return Err(FallbackChainError::DuplicateModel {
                model: model.clone(),
            });
        }
    }

    let depth = 1 + tier.fallback.len();
    if depth > max_depth {
        return Err(FallbackChainError::MaxDepthExceeded {
            depth,
            max: max_depth,
        });
    }

    Ok(())
}

// ============================================================================
// Fallback Chain
// ============================================================================

/// Alternatives for one call
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FallbackChain {
    /// Model of the first attempt
    pub primary: String,

    /// Fallback models, in attempt order
    pub models: Vec<String>,

    /// Reduced service sets, in attempt order
    pub service_subsets: Vec<Vec<String>>,
}

impl FallbackChain {
    /// Upper bound on attempts for this chain (primary included)
    #[must_use]
    pub fn max_attempts(&self) -> usize {
        1 + self.models.len() + self.service_subsets.len()
    }

    /// Model used for the reduced-service attempts
    ///
    /// The first fallback model for which `is_open` is false, or the primary
    /// when every fallback is excluded or the chain is empty.
    #[must_use]
    pub fn service_fallback_model(&self, is_open: impl Fn(&str) -> bool) -> &str {
        self.models
            .iter()
            .find(|model| !is_open(model))
            .map_or(self.primary.as_str(), String::as_str)
    }
}

// ============================================================================
// Chain Builder
// ============================================================================

/// Builds [`FallbackChain`]s from the tier table and generic list
#[derive(Clone, Debug)]
pub struct FallbackChainBuilder {
    tiers: ExecutionTiers,
    generic: Vec<String>,
}

impl Default for FallbackChainBuilder {
    fn default() -> Self {
        Self {
            tiers: ExecutionTiers::default(),
            generic: DEFAULT_GENERIC_FALLBACKS
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }
}

impl FallbackChainBuilder {
    /// Create a builder from explicit inputs
    #[must_use]
    pub fn new(tiers: ExecutionTiers, generic: Vec<String>) -> Self {
        Self { tiers, generic }
    }

    /// Create a builder from loaded configuration
    #[must_use]
    pub fn from_config(config: &RouterConfig) -> Self {
        Self::new(config.tiers.clone(), config.generic_fallbacks.clone())
    }

    /// Ordered, available fallback models for `primary`
    #[must_use]
    pub fn model_chain(&self, primary: &str, catalog: &ModelCatalog) -> Vec<String> {
        let mut chain: Vec<String> = self
            .tiers
            .iter()
            .find(|(_, tier)| tier.preferred == primary)
            .map(|(_, tier)| tier.fallback.clone())
            .unwrap_or_default();

        for model in &self.generic {
            if model != primary && !chain.contains(model) {
                chain.push(model.clone());
            }
        }

        chain.retain(|model| catalog.is_available(model));
        chain
    }

    /// Reduced service sets for a request that named `services`
    #[must_use]
    pub fn service_subsets(services: &[String]) -> Vec<Vec<String>> {
        if services.len() <= 1 {
            return Vec::new();
        }

        let mut subsets = vec![vec![services[0].clone()]];
        if services.len() > 2 {
            subsets.push(services[..services.len() / 2].to_vec());
        }
        subsets.push(Vec::new());
        subsets
    }

    /// Full chain for one call
    #[must_use]
    pub fn build(&self, primary: &str, services: &[String], catalog: &ModelCatalog) -> FallbackChain {
        let chain = FallbackChain {
            primary: primary.to_string(),
            models: self.model_chain(primary, catalog),
            service_subsets: Self::service_subsets(services),
        };
        tracing::debug!(
            primary = %primary,
            models = ?chain.models,
            subsets = chain.service_subsets.len(),
            "Built fallback chain"
        );
        chain
    }
}
