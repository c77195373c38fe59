//! Model Catalog
//!
//! Static table of model identifiers and their cost, latency and capability
//! metadata, plus the set of models usable in this process.
//!
//! # Availability
//!
//! A model is available only when its provider's credential is present. The
//! check runs once, when the catalog is loaded:
//!
//! ```text
//! OPENAI_API_KEY     -> gpt-4o, gpt-4o-mini, gpt-3.5-turbo, o3, o3-mini
//! GOOGLE_API_KEY     -> gemini-2.0-flash, gemini-2.5-flash, gemini-2.5-pro
//! ANTHROPIC_API_KEY  -> claude-3-opus, claude-3-sonnet, claude-3-haiku
//! ```
//!
//! Descriptors are immutable once the catalog is shared; load it, register any
//! custom models, then wrap it in an `Arc`.

pub mod selector;

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

pub use selector::{ModelSelector, SelectionOptions};

// ============================================================================
// Provider / Pricing Tier
// ============================================================================

/// Upstream vendor serving a model
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Provider {
    /// `OpenAI` (gpt, o-series)
    #[serde(rename = "openai")]
    OpenAi,
    /// Google (gemini)
    #[serde(rename = "google")]
    Google,
    /// Anthropic (claude)
    #[serde(rename = "anthropic")]
    Anthropic,
}

impl Provider {
    /// All providers in catalog order
    pub const ALL: [Provider; 3] = [Provider::OpenAi, Provider::Google, Provider::Anthropic];

    /// Environment variable holding this provider's credential
    #[must_use]
    pub fn credential_var(self) -> &'static str {
        match self {
            Self::OpenAi => "OPENAI_API_KEY",
            Self::Google => "GOOGLE_API_KEY",
            Self::Anthropic => "ANTHROPIC_API_KEY",
        }
    }

    /// Lowercase tag used in configuration and logs
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Google => "google",
            Self::Anthropic => "anthropic",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse price band of a model
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PricingTier {
    /// Cheapest models, used for simple requests
    Budget,
    /// Mid-range models
    Standard,
    /// Most capable and most expensive models
    Premium,
}

impl std::fmt::Display for PricingTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Budget => write!(f, "budget"),
            Self::Standard => write!(f, "standard"),
            Self::Premium => write!(f, "premium"),
        }
    }
}

// ============================================================================
// Model Descriptor
// ============================================================================

/// Capability flags of a model
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// Supports function/tool calling
    pub function_calling: bool,
    /// Accepts image input
    pub vision: bool,
    /// Supports streamed responses
    pub streaming: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            function_calling: true,
            vision: false,
            streaming: true,
        }
    }
}

/// Immutable metadata for one model
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    /// Model identifier as sent to the provider
    pub id: String,
    /// Vendor serving the model
    pub provider: Provider,
    /// Price band
    pub tier: PricingTier,
    /// USD per 1000 input tokens
    pub input_cost_per_1k: f64,
    /// USD per 1000 output tokens
    pub output_cost_per_1k: f64,
    /// Maximum context length in tokens
    pub max_context: u32,
    /// Average latency estimate in milliseconds
    pub avg_latency_ms: u32,
    /// Reliability score in `0.0..=1.0`
    pub reliability: f64,
    /// Capability flags
    pub capabilities: Capabilities,
}

impl ModelDescriptor {
    /// Create a descriptor with zero cost and neutral defaults
    pub fn new(id: impl Into<String>, provider: Provider, tier: PricingTier) -> Self {
        Self {
            id: id.into(),
            provider,
            tier,
            input_cost_per_1k: 0.0,
            output_cost_per_1k: 0.0,
            max_context: 8192,
            avg_latency_ms: 1000,
            reliability: 0.95,
            capabilities: Capabilities::default(),
        }
    }

    /// Set per-1K token pricing
    #[must_use]
    pub fn with_costs(mut self, input_per_1k: f64, output_per_1k: f64) -> Self {
        self.input_cost_per_1k = input_per_1k;
        self.output_cost_per_1k = output_per_1k;
        self
    }

    /// Set the latency estimate
    #[must_use]
    pub fn with_latency_ms(mut self, latency_ms: u32) -> Self {
        self.avg_latency_ms = latency_ms;
        self
    }

    /// Set the reliability score (clamped to `0.0..=1.0`)
    #[must_use]
    pub fn with_reliability(mut self, reliability: f64) -> Self {
        self.reliability = reliability.clamp(0.0, 1.0);
        self
    }

    /// Set the context window
    #[must_use]
    pub fn with_max_context(mut self, max_context: u32) -> Self {
        self.max_context = max_context;
        self
    }
}

// ============================================================================
// Built-in Table
// ============================================================================

struct Row {
    id: &'static str,
    provider: Provider,
    tier: PricingTier,
    input: f64,
    output: f64,
    context: u32,
    vision: bool,
    latency_ms: u32,
    reliability: f64,
}

#[rustfmt::skip]
const BUILTIN: &[Row] = &[
    Row { id: "gpt-4o", provider: Provider::OpenAi, tier: PricingTier::Premium, input: 0.005, output: 0.015, context: 128_000, vision: true, latency_ms: 3000, reliability: 0.98 },
    Row { id: "gpt-4o-mini", provider: Provider::OpenAi, tier: PricingTier::Standard, input: 0.000_15, output: 0.0006, context: 128_000, vision: true, latency_ms: 2000, reliability: 0.97 },
    Row { id: "gpt-3.5-turbo", provider: Provider::OpenAi, tier: PricingTier::Budget, input: 0.0005, output: 0.0015, context: 16_385, vision: false, latency_ms: 1000, reliability: 0.95 },
    Row { id: "o3", provider: Provider::OpenAi, tier: PricingTier::Premium, input: 0.015, output: 0.06, context: 200_000, vision: false, latency_ms: 5000, reliability: 0.99 },
    Row { id: "o3-mini", provider: Provider::OpenAi, tier: PricingTier::Standard, input: 0.003, output: 0.012, context: 200_000, vision: false, latency_ms: 3000, reliability: 0.97 },
    Row { id: "gemini-2.0-flash", provider: Provider::Google, tier: PricingTier::Budget, input: 0.0, output: 0.0, context: 1_000_000, vision: true, latency_ms: 800, reliability: 0.94 },
    Row { id: "gemini-2.5-flash", provider: Provider::Google, tier: PricingTier::Budget, input: 0.0001, output: 0.0003, context: 1_000_000, vision: true, latency_ms: 700, reliability: 0.95 },
    Row { id: "gemini-2.5-pro", provider: Provider::Google, tier: PricingTier::Standard, input: 0.001_25, output: 0.005, context: 1_000_000, vision: true, latency_ms: 2000, reliability: 0.97 },
    Row { id: "claude-3-opus-20240229", provider: Provider::Anthropic, tier: PricingTier::Premium, input: 0.015, output: 0.075, context: 200_000, vision: true, latency_ms: 4000, reliability: 0.98 },
    Row { id: "claude-3-sonnet-20240229", provider: Provider::Anthropic, tier: PricingTier::Standard, input: 0.003, output: 0.015, context: 200_000, vision: true, latency_ms: 2500, reliability: 0.97 },
    Row { id: "claude-3-haiku-20240307", provider: Provider::Anthropic, tier: PricingTier::Budget, input: 0.000_25, output: 0.001_25, context: 200_000, vision: true, latency_ms: 1200, reliability: 0.95 },
];

impl From<&Row> for ModelDescriptor {
    fn from(row: &Row) -> Self {
        Self {
            id: row.id.to_string(),
            provider: row.provider,
            tier: row.tier,
            input_cost_per_1k: row.input,
            output_cost_per_1k: row.output,
            max_context: row.context,
            avg_latency_ms: row.latency_ms,
            reliability: row.reliability,
            capabilities: Capabilities {
                vision: row.vision,
                ..Capabilities::default()
            },
        }
    }
}

// ============================================================================
// Cost Estimation
// ============================================================================

/// Cost in USD of a call with the given token counts
#[must_use]
pub fn estimate_cost(descriptor: &ModelDescriptor, input_tokens: u64, output_tokens: u64) -> f64 {
    (input_tokens as f64 / 1000.0) * descriptor.input_cost_per_1k
        + (output_tokens as f64 / 1000.0) * descriptor.output_cost_per_1k
}

/// Coarse token count: one token per four characters
#[must_use]
pub fn tokens_for(text: &str) -> u64 {
    (text.chars().count() / 4) as u64
}

/// Weights used by [`ModelCatalog::rank_by_value`]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ValueWeights {
    /// Weight of the (inverted) combined per-1K price
    pub cost: f64,
    /// Weight of the (inverted) latency estimate
    pub latency: f64,
    /// Weight of the reliability score
    pub reliability: f64,
}

impl Default for ValueWeights {
    fn default() -> Self {
        Self {
            cost: 0.4,
            latency: 0.3,
            reliability: 0.3,
        }
    }
}

// ============================================================================
// Model Catalog
// ============================================================================

/// Model metadata table with credential-derived availability
#[derive(Clone, Debug, Default)]
pub struct ModelCatalog {
    /// Descriptors in registration order
    models: Vec<ModelDescriptor>,

    /// `model_id` -> index into `models`
    index: HashMap<String, usize>,

    /// Providers whose credentials were found
    available_providers: HashSet<Provider>,
}

impl ModelCatalog {
    /// An empty catalog (no models, nothing available)
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// The built-in model table with no provider available
    #[must_use]
    pub fn builtin() -> Self {
        let mut catalog = Self::empty();
        for row in BUILTIN {
            catalog.register(ModelDescriptor::from(row));
        }
        catalog
    }

    /// Built-in table with availability read from the process environment
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_credentials(|var| std::env::var(var).is_ok_and(|v| !v.trim().is_empty()))
    }

    /// Built-in table with availability decided by `has_credential(env_var)`
    pub fn from_credentials(has_credential: impl Fn(&str) -> bool) -> Self {
        Self::with_available_providers(
            Provider::ALL
                .into_iter()
                .filter(|p| has_credential(p.credential_var())),
        )
    }

    /// Built-in table with the given providers marked available
    pub fn with_available_providers(providers: impl IntoIterator<Item = Provider>) -> Self {
        let mut catalog = Self::builtin();
        catalog.available_providers = providers.into_iter().collect();
        tracing::debug!(
            available = catalog.available_models().len(),
            total = catalog.models.len(),
            "Model catalog loaded"
        );
        catalog
    }

    /// Add or replace a descriptor
    pub fn register(&mut self, descriptor: ModelDescriptor) {
        if let Some(&idx) = self.index.get(&descriptor.id) {
            self.models[idx] = descriptor;
        } else {
            self.index.insert(descriptor.id.clone(), self.models.len());
            self.models.push(descriptor);
        }
    }

    /// Mark a provider's credential as present or absent
    pub fn set_provider_available(&mut self, provider: Provider, available: bool) {
        if available {
            self.available_providers.insert(provider);
        } else {
            self.available_providers.remove(&provider);
        }
    }

    /// Look up a model descriptor
    #[must_use]
    pub fn lookup(&self, model_id: &str) -> Option<&ModelDescriptor> {
        self.index.get(model_id).map(|&idx| &self.models[idx])
    }

    /// Whether the model is known and its provider credential is present
    #[must_use]
    pub fn is_available(&self, model_id: &str) -> bool {
        self.lookup(model_id)
            .is_some_and(|d| self.available_providers.contains(&d.provider))
    }

    /// Whether a provider's credential is present
    #[must_use]
    pub fn is_provider_available(&self, provider: Provider) -> bool {
        self.available_providers.contains(&provider)
    }

    /// All descriptors in table order
    pub fn models(&self) -> impl Iterator<Item = &ModelDescriptor> {
        self.models.iter()
    }

    /// Available descriptors in table order
    #[must_use]
    pub fn available_models(&self) -> Vec<&ModelDescriptor> {
        self.models
            .iter()
            .filter(|d| self.available_providers.contains(&d.provider))
            .collect()
    }

    /// Whether at least one model can be used
    #[must_use]
    pub fn has_available_models(&self) -> bool {
        self.models
            .iter()
            .any(|d| self.available_providers.contains(&d.provider))
    }

    /// All models of a pricing tier, cheapest input price first
    #[must_use]
    pub fn models_by_tier(&self, tier: PricingTier) -> Vec<&ModelDescriptor> {
        let mut models: Vec<_> = self.models.iter().filter(|d| d.tier == tier).collect();
        models.sort_by(|a, b| a.input_cost_per_1k.total_cmp(&b.input_cost_per_1k));
        models
    }

    /// Cost of a call from its text length
    ///
    /// Input tokens are `text_len / 4`, output tokens half of that. Unknown
    /// models cost nothing.
    #[must_use]
    pub fn estimate_text_cost(&self, model_id: &str, text_len: usize) -> f64 {
        let Some(descriptor) = self.lookup(model_id) else {
            return 0.0;
        };
        let input_tokens = (text_len / 4) as u64;
        estimate_cost(descriptor, input_tokens, input_tokens / 2)
    }

    /// Estimated cost of the same call on each known model, in input order
    #[must_use]
    pub fn compare_costs<S: AsRef<str>>(
        &self,
        model_ids: &[S],
        input_tokens: u64,
        output_tokens: u64,
    ) -> Vec<(String, f64)> {
        model_ids
            .iter()
            .filter_map(|id| self.lookup(id.as_ref()))
            .map(|d| (d.id.clone(), estimate_cost(d, input_tokens, output_tokens)))
            .collect()
    }

    /// Rank known models by weighted value, best first
    ///
    /// Each factor is normalised to `0.0..=1.0` (higher is better): price
    /// against 0.1 USD per combined 1K, latency against 10 s.
    #[must_use]
    pub fn rank_by_value<S: AsRef<str>>(
        &self,
        model_ids: &[S],
        weights: ValueWeights,
    ) -> Vec<(String, f64)> {
        let mut scored: Vec<(String, f64)> = model_ids
            .iter()
            .filter_map(|id| self.lookup(id.as_ref()))
            .map(|d| {
                let cost_score =
                    1.0 - ((d.input_cost_per_1k + d.output_cost_per_1k) / 0.1).min(1.0);
                let latency_score = 1.0 - (f64::from(d.avg_latency_ms) / 10_000.0).min(1.0);
                let score = cost_score * weights.cost
                    + latency_score * weights.latency
                    + d.reliability * weights.reliability;
                (d.id.clone(), score)
            })
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn test_builtin_table_complete() {
        let catalog = ModelCatalog::builtin();
        assert_eq!(catalog.models().count(), 11);

        let haiku = catalog.lookup("claude-3-haiku-20240307").unwrap();
        assert_eq!(haiku.provider, Provider::Anthropic);
        assert_eq!(haiku.tier, PricingTier::Budget);
        assert_eq!(haiku.max_context, 200_000);
        assert!(haiku.capabilities.vision);
        assert!(haiku.capabilities.function_calling);

        let turbo = catalog.lookup("gpt-3.5-turbo").unwrap();
        assert!(!turbo.capabilities.vision);
        assert_eq!(turbo.max_context, 16_385);
    }

    #[test]
    fn test_lookup_unknown_model() {
        assert!(ModelCatalog::builtin().lookup("llama3.2").is_none());
    }

    #[test]
    fn test_estimate_cost() {
        let catalog = ModelCatalog::builtin();
        let gpt4o = catalog.lookup("gpt-4o").unwrap();
        // 2 * 0.005 + 1 * 0.015
        assert!(approx(estimate_cost(gpt4o, 2000, 1000), 0.025));
        assert!(approx(estimate_cost(gpt4o, 0, 0), 0.0));

        let flash = catalog.lookup("gemini-2.0-flash").unwrap();
        assert!(approx(estimate_cost(flash, 50_000, 50_000), 0.0));
    }

    #[test]
    fn test_estimate_cost_is_pure() {
        let catalog = ModelCatalog::builtin();
        let o3 = catalog.lookup("o3").unwrap();
        let first = estimate_cost(o3, 1234, 567);
        let second = estimate_cost(o3, 1234, 567);
        assert_eq!(first.to_bits(), second.to_bits());
    }

    #[test]
    fn test_tokens_for() {
        assert_eq!(tokens_for(""), 0);
        assert_eq!(tokens_for("abc"), 0);
        assert_eq!(tokens_for("abcd"), 1);
        assert_eq!(tokens_for(&"x".repeat(401)), 100);
    }

    #[test]
    fn test_estimate_text_cost() {
        let catalog = ModelCatalog::builtin();
        // 4000 chars -> 1000 input, 500 output
        let cost = catalog.estimate_text_cost("gpt-4o", 4000);
        assert!(approx(cost, 0.005 + 0.0075));
        assert!(approx(catalog.estimate_text_cost("unknown", 4000), 0.0));
    }

    #[test]
    fn test_availability_from_credentials() {
        let catalog = ModelCatalog::from_credentials(|var| var == "GOOGLE_API_KEY");

        assert!(catalog.is_available("gemini-2.5-pro"));
        assert!(!catalog.is_available("gpt-4o"));
        assert!(!catalog.is_available("claude-3-opus-20240229"));
        assert!(!catalog.is_available("not-a-model"));

        let ids: Vec<_> = catalog.available_models().iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["gemini-2.0-flash", "gemini-2.5-flash", "gemini-2.5-pro"]);
    }

    #[test]
    fn test_no_credentials_no_models() {
        let catalog = ModelCatalog::from_credentials(|_| false);
        assert!(!catalog.has_available_models());
        assert!(catalog.available_models().is_empty());
        // Metadata still present
        assert!(catalog.lookup("gpt-4o").is_some());
    }

    #[test]
    fn test_register_custom_model() {
        let mut catalog = ModelCatalog::with_available_providers([Provider::OpenAi]);
        catalog.register(
            ModelDescriptor::new("gpt-custom", Provider::OpenAi, PricingTier::Standard)
                .with_costs(0.001, 0.002)
                .with_latency_ms(900),
        );

        assert!(catalog.is_available("gpt-custom"));
        assert_eq!(catalog.models().count(), 12);

        // Replacing keeps the slot
        catalog.register(
            ModelDescriptor::new("gpt-custom", Provider::OpenAi, PricingTier::Premium)
                .with_reliability(1.5),
        );
        assert_eq!(catalog.models().count(), 12);
        let custom = catalog.lookup("gpt-custom").unwrap();
        assert_eq!(custom.tier, PricingTier::Premium);
        assert!(approx(custom.reliability, 1.0));
    }

    #[test]
    fn test_models_by_tier_cheapest_first() {
        let catalog = ModelCatalog::builtin();
        let ids: Vec<_> = catalog
            .models_by_tier(PricingTier::Budget)
            .iter()
            .map(|d| d.id.as_str())
            .collect();
        assert_eq!(
            ids,
            vec![
                "gemini-2.0-flash",
                "gemini-2.5-flash",
                "claude-3-haiku-20240307",
                "gpt-3.5-turbo",
            ]
        );
    }

    #[test]
    fn test_compare_costs_skips_unknown() {
        let catalog = ModelCatalog::builtin();
        let costs = catalog.compare_costs(&["gpt-4o", "nope", "o3"], 1000, 1000);
        assert_eq!(costs.len(), 2);
        assert_eq!(costs[0].0, "gpt-4o");
        assert!(approx(costs[0].1, 0.02));
        assert!(approx(costs[1].1, 0.075));
    }

    #[test]
    fn test_rank_by_value() {
        let catalog = ModelCatalog::builtin();
        let ranked = catalog.rank_by_value(
            &["claude-3-opus-20240229", "gemini-2.5-flash", "gpt-4o"],
            ValueWeights::default(),
        );
        let order: Vec<_> = ranked.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(order, vec!["gemini-2.5-flash", "gpt-4o", "claude-3-opus-20240229"]);
    }

    #[test]
    fn test_provider_display_and_credentials() {
        assert_eq!(Provider::OpenAi.to_string(), "openai");
        assert_eq!(Provider::Anthropic.credential_var(), "ANTHROPIC_API_KEY");
        assert_eq!(PricingTier::Premium.to_string(), "premium");
    }
}
