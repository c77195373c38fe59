//! Routing Test Utilities
//!
//! Scripted collaborators for exercising the fallback engine without real
//! LLM calls or child processes.
//!
//! # Usage
//!
//! ```ignore
//! let provider = Arc::new(ScriptedProvider::new());
//! provider.fail("gpt-4o", ProviderError::Network("reset".into()));
//! provider.respond("claude-3-opus-20240229", "fallback answer");
//!
//! // After the call, verify which models were invoked
//! assert_eq!(provider.call_models(), vec!["gpt-4o", "claude-3-opus-20240229"]);
//! ```

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::provider::{Completion, CompletionRequest, ModelProvider, ProviderError};
use crate::services::{ConnectError, ConnectionHandle, ServiceConnector, ServiceDescriptor};

// ============================================================================
// Scripted Provider
// ============================================================================

#[derive(Clone, Debug)]
enum Script {
    Respond(String),
    Fail(ProviderError),
    FailWithServices(ProviderError),
    Hang,
}

/// Provider whose behaviour is scripted per model
///
/// Unscripted models answer with `"<model> response"`.
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    scripts: Mutex<HashMap<String, Script>>,
    calls: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedProvider {
    /// Provider where every model succeeds
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `model` answer with `text`
    pub fn respond(&self, model: &str, text: &str) {
        self.scripts
            .lock()
            .insert(model.to_string(), Script::Respond(text.to_string()));
    }

    /// Make `model` fail with `error`
    pub fn fail(&self, model: &str, error: ProviderError) {
        self.scripts
            .lock()
            .insert(model.to_string(), Script::Fail(error));
    }

    /// Make `model` fail whenever services were attached to the call
    pub fn fail_with_services(&self, model: &str, error: ProviderError) {
        self.scripts
            .lock()
            .insert(model.to_string(), Script::FailWithServices(error));
    }

    /// Make `model` never answer
    pub fn hang(&self, model: &str) {
        self.scripts.lock().insert(model.to_string(), Script::Hang);
    }

    /// Every request received, in order
    pub fn calls(&self) -> Vec<CompletionRequest> {
        self.calls.lock().clone()
    }

    /// Models invoked, in order
    pub fn call_models(&self) -> Vec<String> {
        self.calls.lock().iter().map(|c| c.model.clone()).collect()
    }

    /// Number of invocations of `model`
    pub fn call_count(&self, model: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.model == model).count()
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, ProviderError> {
        self.calls.lock().push(request.clone());
        let script = self.scripts.lock().get(&request.model).cloned();

        match script {
            Some(Script::Fail(error)) => Err(error),
            Some(Script::FailWithServices(error))
                if request.system.contains("\n\nAvailable services:") =>
            {
                Err(error)
            }
            Some(Script::Hang) => std::future::pending().await,
            Some(Script::Respond(text)) => Ok(Completion {
                content: text,
                model: request.model.clone(),
            }),
            Some(Script::FailWithServices(_)) | None => Ok(Completion {
                content: format!("{} response", request.model),
                model: request.model.clone(),
            }),
        }
    }
}

// ============================================================================
// Mock Connector
// ============================================================================

/// Connector that records calls and fails or hangs on request
#[derive(Debug, Default)]
pub struct MockConnector {
    failing: Mutex<HashSet<String>>,
    hanging: Mutex<HashSet<String>>,
    connected: Mutex<Vec<String>>,
    disconnected: Mutex<Vec<String>>,
    abandoned: Mutex<Vec<String>>,
}

impl MockConnector {
    /// Connector where every service connects
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `service` refuse connections
    pub fn fail(&self, service: &str) {
        self.failing.lock().insert(service.to_string());
    }

    /// Make `service` never finish connecting
    pub fn hang(&self, service: &str) {
        self.hanging.lock().insert(service.to_string());
    }

    /// Services connected, in order
    pub fn connected(&self) -> Vec<String> {
        self.connected.lock().clone()
    }

    /// Services released, in order
    pub fn disconnected(&self) -> Vec<String> {
        self.disconnected.lock().clone()
    }

    /// Services abandoned by a dropped call, in order
    pub fn abandoned(&self) -> Vec<String> {
        self.abandoned.lock().clone()
    }
}

#[async_trait]
impl ServiceConnector for MockConnector {
    async fn connect(&self, service: &ServiceDescriptor) -> Result<ConnectionHandle, ConnectError> {
        if self.hanging.lock().contains(&service.name) {
            std::future::pending::<()>().await;
        }
        if self.failing.lock().contains(&service.name) {
            return Err(ConnectError::Status {
                service: service.name.clone(),
                status: 503,
            });
        }
        self.connected.lock().push(service.name.clone());
        Ok(ConnectionHandle::new(service))
    }

    async fn disconnect(&self, handle: ConnectionHandle) {
        self.disconnected.lock().push(handle.service);
    }

    fn abandon(&self, handle: &ConnectionHandle) {
        self.abandoned.lock().push(handle.service.clone());
    }
}
