//! Explicit model id -> provider mapping

use std::collections::HashMap;
use std::sync::Arc;

use super::ModelProvider;
use crate::catalog::{ModelCatalog, Provider};

/// Maps model identifiers to the provider that serves them
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    by_model: HashMap<String, Arc<dyn ModelProvider>>,
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut models: Vec<_> = self.by_model.keys().collect();
        models.sort();
        f.debug_struct("ProviderRegistry")
            .field("models", &models)
            .finish()
    }
}

impl ProviderRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Route one model to a provider
    pub fn register_model(&mut self, model_id: impl Into<String>, provider: Arc<dyn ModelProvider>) {
        self.by_model.insert(model_id.into(), provider);
    }

    /// Route every catalog model of `vendor` to `provider`
    ///
    /// Returns the number of models registered.
    pub fn register_vendor(
        &mut self,
        catalog: &ModelCatalog,
        vendor: Provider,
        provider: Arc<dyn ModelProvider>,
    ) -> usize {
        let mut count = 0;
        for descriptor in catalog.models().filter(|d| d.provider == vendor) {
            self.by_model
                .insert(descriptor.id.clone(), Arc::clone(&provider));
            count += 1;
        }
        tracing::debug!(vendor = %vendor, provider = provider.name(), models = count, "Registered provider");
        count
    }

    /// Provider serving `model_id`, if any
    #[must_use]
    pub fn resolve(&self, model_id: &str) -> Option<Arc<dyn ModelProvider>> {
        self.by_model.get(model_id).cloned()
    }

    /// Number of routed models
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_model.len()
    }

    /// Whether no model is routed
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_model.is_empty()
    }
}
