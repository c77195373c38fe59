//! Auxiliary Tool-Services
//!
//! Services are external tools (filesystem access, search, ...) a model call
//! can be augmented with. This module holds their descriptors, the registry
//! loaded from configuration, and the connector seam used by the attempt
//! runner.
//!
//! ```text
//! [services.<name>] --> ServiceRegistry --get_service--> ServiceDescriptor
//!                                                              |
//!                                   ServiceConnector::connect  v
//!                                        (stdio child / http probe)
//! ```

pub mod connector;

use std::collections::{BTreeMap, HashMap};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::config::RouterConfig;

pub use connector::{ConnectError, ConnectionHandle, ServiceConnector, TransportConnector};

// ============================================================================
// Intent / Kind
// ============================================================================

/// Coarse category of user goal, as decided by the upstream classifier
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    /// Reading or retrieving content
    Read,
    /// Creating or modifying content
    Write,
    /// Looking something up
    Search,
    /// Examining or summarising content
    Analyze,
    /// Administrative operations
    Manage,
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read => write!(f, "read"),
            Self::Write => write!(f, "write"),
            Self::Search => write!(f, "search"),
            Self::Analyze => write!(f, "analyze"),
            Self::Manage => write!(f, "manage"),
        }
    }
}

/// How a service is reached
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKind {
    /// Child process speaking over stdin/stdout
    #[default]
    Stdio,
    /// HTTP endpoint
    Http,
    /// WebSocket endpoint
    WebSocket,
}

impl std::fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stdio => write!(f, "stdio"),
            Self::Http => write!(f, "http"),
            Self::WebSocket => write!(f, "websocket"),
        }
    }
}

// ============================================================================
// Service Descriptor
// ============================================================================

/// Definition of one auxiliary service
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    /// Unique service name
    pub name: String,
    /// Connection kind
    pub kind: ServiceKind,
    /// Program and leading arguments (stdio)
    pub command: Vec<String>,
    /// Extra arguments appended to `command` (stdio)
    pub args: Vec<String>,
    /// Extra environment; `API_KEY` doubles as the HTTP bearer token
    pub env: HashMap<String, String>,
    /// Base URL (http, websocket)
    pub url: Option<String>,
    /// Intents this service helps with
    pub supported_intents: Vec<Intent>,
    /// Human-readable description
    pub description: String,
    /// Disabled services are never connected
    pub enabled: bool,
    /// Higher values are preferred
    pub priority: i32,
}

impl ServiceDescriptor {
    /// Create an enabled descriptor with no launch parameters
    pub fn new(name: impl Into<String>, kind: ServiceKind) -> Self {
        Self {
            name: name.into(),
            kind,
            command: Vec::new(),
            args: Vec::new(),
            env: HashMap::new(),
            url: None,
            supported_intents: Vec::new(),
            description: String::new(),
            enabled: true,
            priority: 0,
        }
    }

    /// Stdio service launched with `command`
    pub fn stdio(name: impl Into<String>, command: Vec<String>) -> Self {
        let mut descriptor = Self::new(name, ServiceKind::Stdio);
        descriptor.command = command;
        descriptor
    }

    /// HTTP service at `url`
    pub fn http(name: impl Into<String>, url: impl Into<String>) -> Self {
        let mut descriptor = Self::new(name, ServiceKind::Http);
        descriptor.url = Some(url.into());
        descriptor
    }

    /// Declare supported intents
    #[must_use]
    pub fn with_intents(mut self, intents: Vec<Intent>) -> Self {
        self.supported_intents = intents;
        self
    }

    /// Set the priority weight
    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Whether the service declares `intent`
    #[must_use]
    pub fn supports(&self, intent: Intent) -> bool {
        self.supported_intents.contains(&intent)
    }

    /// Check that the launch parameters match the kind
    ///
    /// # Errors
    ///
    /// [`ConnectError::MissingCommand`] for a stdio service without a program,
    /// [`ConnectError::MissingUrl`] for a network service without a URL.
    pub fn validate(&self) -> Result<(), ConnectError> {
        match self.kind {
            ServiceKind::Stdio if self.command.first().map_or(true, String::is_empty) => {
                Err(ConnectError::MissingCommand(self.name.clone()))
            }
            ServiceKind::Http | ServiceKind::WebSocket
                if self.url.as_deref().map_or(true, str::is_empty) =>
            {
                Err(ConnectError::MissingUrl(self.name.clone()))
            }
            _ => Ok(()),
        }
    }
}

// ============================================================================
// Service Registry
// ============================================================================

/// Summary of the registry contents
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ServiceStats {
    /// Registered services
    pub total: usize,
    /// Enabled services
    pub enabled: usize,
    /// Disabled services
    pub disabled: usize,
    /// Service count per connection kind
    pub by_kind: BTreeMap<String, usize>,
    /// Service count per declared intent
    pub by_intent: BTreeMap<String, usize>,
    /// Service names
    pub services: Vec<String>,
}

/// Named services available to the execution engine
///
/// Thread-safe; services can be enabled, disabled, added and removed while
/// requests are in flight.
#[derive(Debug, Default)]
pub struct ServiceRegistry {
    services: RwLock<BTreeMap<String, ServiceDescriptor>>,
}

impl ServiceRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry from configured descriptors
    #[must_use]
    pub fn from_descriptors(descriptors: impl IntoIterator<Item = ServiceDescriptor>) -> Self {
        let registry = Self::new();
        for descriptor in descriptors {
            registry.register_service(descriptor);
        }
        registry
    }

    /// Create a registry from the `[services.<name>]` tables of a loaded config
    #[must_use]
    pub fn from_config(config: &RouterConfig) -> Self {
        Self::from_descriptors(config.services.iter().cloned())
    }

    /// Look up a service by name
    #[must_use]
    pub fn get_service(&self, name: &str) -> Option<ServiceDescriptor> {
        self.services.read().get(name).cloned()
    }

    /// Enabled services declaring `intent`, highest priority first
    #[must_use]
    pub fn services_for_intent(&self, intent: Intent) -> Vec<ServiceDescriptor> {
        let mut matching: Vec<_> = self
            .services
            .read()
            .values()
            .filter(|s| s.enabled && s.supports(intent))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.priority.cmp(&a.priority));
        matching
    }

    /// All registered services, ordered by name
    #[must_use]
    pub fn all_services(&self) -> Vec<ServiceDescriptor> {
        self.services.read().values().cloned().collect()
    }

    /// Enable a service. Returns `false` if it is not registered.
    pub fn enable_service(&self, name: &str) -> bool {
        self.set_enabled(name, true)
    }

    /// Disable a service. Returns `false` if it is not registered.
    pub fn disable_service(&self, name: &str) -> bool {
        self.set_enabled(name, false)
    }

    fn set_enabled(&self, name: &str, enabled: bool) -> bool {
        let mut services = self.services.write();
        let Some(service) = services.get_mut(name) else {
            return false;
        };
        service.enabled = enabled;
        tracing::info!(service = %name, enabled, "Service availability changed");
        true
    }

    /// Add or replace a service
    pub fn register_service(&self, descriptor: ServiceDescriptor) {
        tracing::debug!(service = %descriptor.name, kind = %descriptor.kind, "Registered service");
        self.services
            .write()
            .insert(descriptor.name.clone(), descriptor);
    }

    /// Remove a service, returning it if it was registered
    pub fn unregister_service(&self, name: &str) -> Option<ServiceDescriptor> {
        let removed = self.services.write().remove(name);
        if removed.is_some() {
            tracing::info!(service = %name, "Unregistered service");
        }
        removed
    }

    /// Registry summary
    #[must_use]
    pub fn stats(&self) -> ServiceStats {
        let services = self.services.read();
        let mut stats = ServiceStats {
            total: services.len(),
            ..ServiceStats::default()
        };

        for service in services.values() {
            if service.enabled {
                stats.enabled += 1;
            }
            *stats.by_kind.entry(service.kind.to_string()).or_insert(0) += 1;
            for intent in &service.supported_intents {
                *stats.by_intent.entry(intent.to_string()).or_insert(0) += 1;
            }
            stats.services.push(service.name.clone());
        }
        stats.disabled = stats.total - stats.enabled;
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn registry() -> ServiceRegistry {
        ServiceRegistry::from_descriptors([
            ServiceDescriptor::stdio("filesystem", vec!["fs-server".into()])
                .with_intents(vec![Intent::Read, Intent::Write])
                .with_priority(5),
            ServiceDescriptor::http("search", "http://localhost:8080")
                .with_intents(vec![Intent::Search, Intent::Read])
                .with_priority(10),
            ServiceDescriptor::stdio("git", vec!["git-server".into()])
                .with_intents(vec![Intent::Read, Intent::Manage]),
        ])
    }

    #[test]
    fn test_get_service() {
        let registry = registry();
        let fs = registry.get_service("filesystem").unwrap();
        assert_eq!(fs.kind, ServiceKind::Stdio);
        assert!(registry.get_service("missing").is_none());
    }

    #[test]
    fn test_services_for_intent_priority_order() {
        let registry = registry();
        let names: Vec<_> = registry
            .services_for_intent(Intent::Read)
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["search", "filesystem", "git"]);
        assert!(registry.services_for_intent(Intent::Analyze).is_empty());
    }

    #[test]
    fn test_disabled_services_excluded_from_intent_lookup() {
        let registry = registry();
        assert!(registry.disable_service("search"));
        let names: Vec<_> = registry
            .services_for_intent(Intent::Read)
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["filesystem", "git"]);

        assert!(registry.enable_service("search"));
        assert_eq!(registry.services_for_intent(Intent::Search).len(), 1);
        assert!(!registry.enable_service("missing"));
    }

    #[test]
    fn test_register_and_unregister() {
        let registry = registry();
        registry.register_service(
            ServiceDescriptor::http("analytics", "http://localhost:9000")
                .with_intents(vec![Intent::Analyze]),
        );
        assert_eq!(registry.services_for_intent(Intent::Analyze).len(), 1);

        let removed = registry.unregister_service("analytics").unwrap();
        assert_eq!(removed.name, "analytics");
        assert!(registry.services_for_intent(Intent::Analyze).is_empty());
        assert!(registry.unregister_service("analytics").is_none());
    }

    #[test]
    fn test_stats() {
        let registry = registry();
        registry.disable_service("git");
        let stats = registry.stats();

        assert_eq!(stats.total, 3);
        assert_eq!(stats.enabled, 2);
        assert_eq!(stats.disabled, 1);
        assert_eq!(stats.by_kind.get("stdio"), Some(&2));
        assert_eq!(stats.by_kind.get("http"), Some(&1));
        assert_eq!(stats.by_intent.get("read"), Some(&3));
        assert_eq!(stats.services, vec!["filesystem", "git", "search"]);
    }

    #[test]
    fn test_descriptor_validation() {
        assert!(ServiceDescriptor::stdio("ok", vec!["cat".into()]).validate().is_ok());
        assert!(matches!(
            ServiceDescriptor::stdio("bad", vec![]).validate(),
            Err(ConnectError::MissingCommand(_))
        ));
        assert!(matches!(
            ServiceDescriptor::new("bad", ServiceKind::Http).validate(),
            Err(ConnectError::MissingUrl(_))
        ));
    }

    #[test]
    fn test_kind_serde() {
        let kind: ServiceKind = serde_json::from_str("\"websocket\"").unwrap();
        assert_eq!(kind, ServiceKind::WebSocket);
        assert_eq!(ServiceKind::Http.to_string(), "http");
    }

    #[test]
    fn test_from_config() {
        let mut config = RouterConfig::default();
        config.services = vec![ServiceDescriptor::http("search", "http://localhost:8080")];
        let registry = ServiceRegistry::from_config(&config);
        assert_eq!(registry.all_services().len(), 1);
        assert!(registry.get_service("search").is_some());
    }
}
