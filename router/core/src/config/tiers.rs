//! Complexity tiers and their model preferences

use serde::{Deserialize, Serialize};

use crate::catalog::PricingTier;

/// Complexity band of a request, as decided by the upstream analyzer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComplexityTier {
    /// Short factual or formatting requests
    Simple,
    /// Multi-step but routine requests
    Moderate,
    /// Deep reasoning or long-form requests
    Complex,
}

impl ComplexityTier {
    /// Tiers in lookup order
    pub const ALL: [ComplexityTier; 3] = [
        ComplexityTier::Simple,
        ComplexityTier::Moderate,
        ComplexityTier::Complex,
    ];

    /// Pricing tier consulted when a tier's own candidate list is short
    #[must_use]
    pub fn pricing_tier(self) -> PricingTier {
        match self {
            Self::Simple => PricingTier::Budget,
            Self::Moderate => PricingTier::Standard,
            Self::Complex => PricingTier::Premium,
        }
    }
}

impl std::fmt::Display for ComplexityTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Simple => write!(f, "simple"),
            Self::Moderate => write!(f, "moderate"),
            Self::Complex => write!(f, "complex"),
        }
    }
}

/// Preferred model and ordered fallbacks for one tier
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierConfig {
    /// Model tried first
    pub preferred: String,
    /// Models tried after the preferred one, in order
    pub fallback: Vec<String>,
}

impl TierConfig {
    /// Create a tier entry
    pub fn new(preferred: impl Into<String>, fallback: Vec<String>) -> Self {
        Self {
            preferred: preferred.into(),
            fallback,
        }
    }
}

/// Tier table for all three complexity tiers
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionTiers {
    /// Simple tier
    pub simple: TierConfig,
    /// Moderate tier
    pub moderate: TierConfig,
    /// Complex tier
    pub complex: TierConfig,
}

impl Default for ExecutionTiers {
    fn default() -> Self {
        Self {
            simple: TierConfig::new(
                "gemini-2.0-flash",
                vec![
                    "gemini-2.5-flash".to_string(),
                    "claude-3-haiku-20240307".to_string(),
                ],
            ),
            moderate: TierConfig::new(
                "gpt-4o-mini",
                vec![
                    "gemini-2.5-pro".to_string(),
                    "claude-3-sonnet-20240229".to_string(),
                ],
            ),
            complex: TierConfig::new(
                "gpt-4o",
                vec!["claude-3-opus-20240229".to_string(), "o3-mini".to_string()],
            ),
        }
    }
}

impl ExecutionTiers {
    /// Entry for a tier
    #[must_use]
    pub fn get(&self, tier: ComplexityTier) -> &TierConfig {
        match tier {
            ComplexityTier::Simple => &self.simple,
            ComplexityTier::Moderate => &self.moderate,
            ComplexityTier::Complex => &self.complex,
        }
    }

    /// Mutable entry for a tier
    pub fn get_mut(&mut self, tier: ComplexityTier) -> &mut TierConfig {
        match tier {
            ComplexityTier::Simple => &mut self.simple,
            ComplexityTier::Moderate => &mut self.moderate,
            ComplexityTier::Complex => &mut self.complex,
        }
    }

    /// Entries in lookup order (simple, moderate, complex)
    pub fn iter(&self) -> impl Iterator<Item = (ComplexityTier, &TierConfig)> {
        ComplexityTier::ALL.into_iter().map(move |t| (t, self.get(t)))
    }
}
