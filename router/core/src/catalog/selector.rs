//! Tier-driven primary model selection
//!
//! ```text
//! complexity tier --> [preferred, fallback..] (+ cheapest models of the
//!                     matching pricing tier when fewer than 3)
//!                 --> caller's preferred models (first available wins)
//!                 --> max_cost / max_latency filters
//!                 --> first available candidate
//!                 --> first available model in the catalog
//!                 --> RouterError::NoModelsAvailable
//! ```

use std::sync::Arc;

use super::{estimate_cost, ModelCatalog};
use crate::config::{ComplexityTier, ExecutionTiers};
use crate::error::RouterError;

/// Tokens assumed when checking a candidate against `max_cost`
const COST_PROBE_INPUT_TOKENS: u64 = 1000;
const COST_PROBE_OUTPUT_TOKENS: u64 = 500;

/// Minimum candidate list length before the pricing tier is consulted
const MIN_CANDIDATES: usize = 3;

/// Caller constraints for [`ModelSelector::select`]
#[derive(Clone, Debug, Default)]
pub struct SelectionOptions {
    /// Models to use first, if any of them is available
    pub preferred_models: Vec<String>,
    /// Upper bound on the cost of a 1000-in / 500-out call (USD)
    pub max_cost: Option<f64>,
    /// Upper bound on the latency estimate
    pub max_latency_ms: Option<u32>,
}

impl SelectionOptions {
    /// No constraints
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Prefer the given models
    #[must_use]
    pub fn with_preferred_models(mut self, models: Vec<String>) -> Self {
        self.preferred_models = models;
        self
    }

    /// Cap the estimated cost
    #[must_use]
    pub fn with_max_cost(mut self, max_cost: f64) -> Self {
        self.max_cost = Some(max_cost);
        self
    }

    /// Cap the latency estimate
    #[must_use]
    pub fn with_max_latency_ms(mut self, max_latency_ms: u32) -> Self {
        self.max_latency_ms = Some(max_latency_ms);
        self
    }
}

/// Picks the primary model for a request
#[derive(Clone, Debug)]
pub struct ModelSelector {
    catalog: Arc<ModelCatalog>,
    tiers: ExecutionTiers,
}

impl ModelSelector {
    /// Create a selector over a loaded catalog
    #[must_use]
    pub fn new(catalog: Arc<ModelCatalog>, tiers: ExecutionTiers) -> Self {
        Self { catalog, tiers }
    }

    /// Ordered candidates for a tier, before any availability filtering
    #[must_use]
    pub fn candidates(&self, tier: ComplexityTier) -> Vec<String> {
        let tier_config = self.tiers.get(tier);
        let mut candidates = Vec::with_capacity(1 + tier_config.fallback.len());
        candidates.push(tier_config.preferred.clone());
        candidates.extend(tier_config.fallback.iter().cloned());

        if candidates.len() < MIN_CANDIDATES {
            for descriptor in self.catalog.models_by_tier(tier.pricing_tier()) {
                if !candidates.contains(&descriptor.id) {
                    candidates.push(descriptor.id.clone());
                }
            }
        }

        candidates
    }

    /// Select the primary model for a tier
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::NoModelsAvailable`] when no catalog model has a
    /// provider credential.
    pub fn select(
        &self,
        tier: ComplexityTier,
        options: &SelectionOptions,
    ) -> Result<String, RouterError> {
        if !self.catalog.has_available_models() {
            return Err(RouterError::NoModelsAvailable);
        }

        if let Some(model) = options
            .preferred_models
            .iter()
            .find(|m| self.catalog.is_available(m))
        {
            tracing::info!(model = %model, "Using preferred model");
            return Ok(model.clone());
        }

        let mut candidates = self.candidates(tier);

        if let Some(max_cost) = options.max_cost {
            candidates.retain(|id| {
                self.catalog.lookup(id).is_some_and(|d| {
                    estimate_cost(d, COST_PROBE_INPUT_TOKENS, COST_PROBE_OUTPUT_TOKENS) <= max_cost
                })
            });
        }

        if let Some(max_latency) = options.max_latency_ms {
            candidates.retain(|id| {
                self.catalog
                    .lookup(id)
                    .is_some_and(|d| d.avg_latency_ms <= max_latency)
            });
        }

        if let Some(model) = candidates.into_iter().find(|m| self.catalog.is_available(m)) {
            tracing::info!(model = %model, tier = %tier, "Selected model");
            return Ok(model);
        }

        // has_available_models() was checked above
        let fallback = self
            .catalog
            .available_models()
            .first()
            .map(|d| d.id.clone())
            .ok_or(RouterError::NoModelsAvailable)?;
        tracing::warn!(model = %fallback, tier = %tier, "No candidate fits, using first available model");
        Ok(fallback)
    }
}
