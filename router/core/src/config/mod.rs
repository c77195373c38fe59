//! TOML Configuration File Support
//!
//! Loads the router configuration from `~/.config/llm-router/router.toml`,
//! the environment, and programmatic overrides.
//!
//! # Configuration Priority
//!
//! Configuration values are loaded with the following priority (highest first):
//! 1. [`ConfigOverrides`] supplied by the embedding host
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Default values
//!
//! # Example Configuration
//!
//! ```toml
//! [execution.simple]
//! preferred = "gemini-2.0-flash"
//! fallback = ["gemini-2.5-flash", "claude-3-haiku-20240307"]
//!
//! [execution.complex]
//! preferred = "gpt-4o"
//! fallback = ["claude-3-opus-20240229"]
//!
//! [fallback]
//! generic_models = ["gpt-3.5-turbo", "gemini-2.0-flash"]
//! invoke_timeout_ms = 60000
//! token_baseline_multiplier = 3
//!
//! [circuit_breaker]
//! failure_threshold = 3
//! timeout_secs = 300
//!
//! [services.filesystem]
//! type = "stdio"
//! command = ["npx", "-y", "@modelcontextprotocol/server-filesystem"]
//! supported_intents = ["read", "write"]
//! priority = 10
//!
//! [services.search]
//! type = "http"
//! url = "http://localhost:8080"
//! supported_intents = ["search"]
//! ```

mod tiers;

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::routing::attempt::ExecutionSettings;
use crate::routing::breaker::CircuitBreakerConfig;
use crate::routing::fallback::{validate_tier_chain, DEFAULT_GENERIC_FALLBACKS};
use crate::services::{Intent, ServiceDescriptor, ServiceKind};

pub use tiers::{ComplexityTier, ExecutionTiers, TierConfig};

/// Default maximum chain depth (preferred model plus fallbacks) per tier
pub const DEFAULT_MAX_CHAIN_DEPTH: usize = 8;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Tracks where a configuration value came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from programmatic overrides
    Override,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Override => write!(f, "override"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// One `[execution.<tier>]` table
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TierToml {
    /// Preferred model for the tier
    pub preferred: Option<String>,

    /// Ordered fallback models
    pub fallback: Option<Vec<String>>,
}

/// `[execution]` section: per-tier model preferences
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionToml {
    /// Simple requests
    pub simple: TierToml,

    /// Moderate requests
    pub moderate: TierToml,

    /// Complex requests
    pub complex: TierToml,
}

/// `[fallback]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackToml {
    /// Generic fallback models appended after tier fallbacks
    pub generic_models: Option<Vec<String>>,

    /// Sampling temperature for model calls
    pub temperature: Option<f32>,

    /// Completion token cap for model calls
    pub max_tokens: Option<u32>,

    /// Per-service connect timeout in milliseconds
    pub connect_timeout_ms: Option<u64>,

    /// Per-call model invocation timeout in milliseconds
    pub invoke_timeout_ms: Option<u64>,

    /// Baseline multiplier for the `tokens_saved` estimate
    pub token_baseline_multiplier: Option<u64>,

    /// Maximum tier chain depth accepted by validation
    pub max_chain_depth: Option<usize>,
}

/// `[circuit_breaker]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerToml {
    /// Failures within the window that open the circuit
    pub failure_threshold: Option<u32>,

    /// Window length in seconds, measured from the first failure
    pub timeout_secs: Option<u64>,
}

/// One `[services.<name>]` table
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceToml {
    /// Connection kind (`stdio`, `http`, `websocket`)
    #[serde(rename = "type")]
    pub kind: Option<ServiceKind>,

    /// Program and leading arguments for stdio services
    pub command: Option<Vec<String>>,

    /// Extra arguments appended to `command`
    pub args: Option<Vec<String>>,

    /// Extra environment for the service
    pub env: Option<HashMap<String, String>>,

    /// Base URL for http/websocket services
    pub url: Option<String>,

    /// Intents the service can help with
    pub supported_intents: Option<Vec<Intent>>,

    /// Human-readable description
    pub description: Option<String>,

    /// Whether the service may be used
    pub enabled: Option<bool>,

    /// Higher values are preferred
    pub priority: Option<i32>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterToml {
    /// Per-tier model preferences
    pub execution: ExecutionToml,

    /// Fallback and invocation settings
    pub fallback: FallbackToml,

    /// Circuit breaker settings
    pub circuit_breaker: CircuitBreakerToml,

    /// Auxiliary services keyed by name
    pub services: BTreeMap<String, ServiceToml>,
}

// =============================================================================
// Main Configuration Struct
// =============================================================================

/// Centralized configuration for the execution engine
///
/// Use [`load_config`] to load configuration with proper priority handling.
#[derive(Clone, Debug)]
pub struct RouterConfig {
    /// Per-tier model preferences
    pub tiers: ExecutionTiers,

    /// Generic fallback models, tried after the tier's own fallbacks
    pub generic_fallbacks: Vec<String>,

    /// Circuit breaker thresholds
    pub breaker: CircuitBreakerConfig,

    /// Invocation parameters and timeouts
    pub execution: ExecutionSettings,

    /// Maximum tier chain depth accepted by [`RouterConfig::validate`]
    pub max_chain_depth: usize,

    /// Auxiliary services
    pub services: Vec<ServiceDescriptor>,

    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,

    /// Source of configuration values
    source: ConfigSource,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            tiers: ExecutionTiers::default(),
            generic_fallbacks: DEFAULT_GENERIC_FALLBACKS
                .iter()
                .map(ToString::to_string)
                .collect(),
            breaker: CircuitBreakerConfig::default(),
            execution: ExecutionSettings::default(),
            max_chain_depth: DEFAULT_MAX_CHAIN_DEPTH,
            services: Vec::new(),
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl RouterConfig {
    /// Create a new configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the primary source of this configuration
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Set the configuration source
    pub fn set_source(&mut self, source: ConfigSource) {
        self.source = source;
    }

    /// Check the configuration for values the engine cannot run with
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] describing the first problem.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (tier, tier_config) in self.tiers.iter() {
            validate_tier_chain(tier_config, self.max_chain_depth).map_err(|e| {
                ConfigError::ValidationError(format!("execution.{tier}: {e}"))
            })?;
        }

        if self.breaker.failure_threshold == 0 {
            return Err(ConfigError::ValidationError(
                "circuit_breaker.failure_threshold must be at least 1".to_string(),
            ));
        }
        if self.breaker.timeout.is_zero() {
            return Err(ConfigError::ValidationError(
                "circuit_breaker.timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.execution.token_baseline_multiplier == 0 {
            return Err(ConfigError::ValidationError(
                "fallback.token_baseline_multiplier must be at least 1".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.execution.temperature) {
            return Err(ConfigError::ValidationError(format!(
                "fallback.temperature must be within 0.0..=2.0, got {}",
                self.execution.temperature
            )));
        }
        if self.execution.max_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "fallback.max_tokens must be at least 1".to_string(),
            ));
        }

        for service in &self.services {
            service
                .validate()
                .map_err(|e| ConfigError::ValidationError(format!("services.{}: {e}", service.name)))?;
        }

        Ok(())
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/llm-router/router.toml` or
/// `~/.config/llm-router/router.toml` if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("llm-router").join("router.toml"))
}

/// Load configuration from all sources with proper priority
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed, or if the
/// merged configuration fails validation. A missing config file is not an
/// error (defaults are used).
pub fn load_config() -> Result<RouterConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path, reading the process environment
///
/// # Errors
///
/// Returns an error if the specified config file cannot be read or parsed, or
/// if the result is invalid.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<RouterConfig, ConfigError> {
    load_config_with_env(path, |key| std::env::var(key).ok())
}

/// Load configuration from a specific path with an explicit environment lookup
///
/// # Errors
///
/// Same as [`load_config_from_path`].
pub fn load_config_with_env<F>(path: Option<PathBuf>, env: F) -> Result<RouterConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    // Start with defaults
    let mut config = RouterConfig::default();

    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: RouterToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, &toml_config);
            config.config_file_path = Some(config_path.clone());
            config.source = ConfigSource::File;

            tracing::info!(
                path = %config_path.display(),
                services = config.services.len(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    // Environment overrides file values
    apply_env_config(&mut config, env);

    config.validate()?;
    Ok(config)
}

/// Apply TOML configuration values to the config struct
fn apply_toml_config(config: &mut RouterConfig, toml: &RouterToml) {
    for (tier, tier_toml) in [
        (ComplexityTier::Simple, &toml.execution.simple),
        (ComplexityTier::Moderate, &toml.execution.moderate),
        (ComplexityTier::Complex, &toml.execution.complex),
    ] {
        let target = config.tiers.get_mut(tier);
        if let Some(ref preferred) = tier_toml.preferred {
            target.preferred.clone_from(preferred);
        }
        if let Some(ref fallback) = tier_toml.fallback {
            target.fallback.clone_from(fallback);
        }
    }

    let fallback = &toml.fallback;
    if let Some(ref models) = fallback.generic_models {
        config.generic_fallbacks.clone_from(models);
    }
    if let Some(temperature) = fallback.temperature {
        config.execution.temperature = temperature;
    }
    if let Some(max_tokens) = fallback.max_tokens {
        config.execution.max_tokens = max_tokens;
    }
    if let Some(ms) = fallback.connect_timeout_ms {
        config.execution.connect_timeout = Duration::from_millis(ms);
    }
    if let Some(ms) = fallback.invoke_timeout_ms {
        config.execution.invoke_timeout = Duration::from_millis(ms);
    }
    if let Some(multiplier) = fallback.token_baseline_multiplier {
        config.execution.token_baseline_multiplier = multiplier;
    }
    if let Some(depth) = fallback.max_chain_depth {
        config.max_chain_depth = depth;
    }

    if let Some(threshold) = toml.circuit_breaker.failure_threshold {
        config.breaker.failure_threshold = threshold;
    }
    if let Some(secs) = toml.circuit_breaker.timeout_secs {
        config.breaker.timeout = Duration::from_secs(secs);
    }

    config.services = toml
        .services
        .iter()
        .map(|(name, service)| service_from_toml(name, service))
        .collect();
}

fn service_from_toml(name: &str, toml: &ServiceToml) -> ServiceDescriptor {
    let mut descriptor = ServiceDescriptor::new(name, toml.kind.unwrap_or_default());
    descriptor.command = toml.command.clone().unwrap_or_default();
    descriptor.args = toml.args.clone().unwrap_or_default();
    descriptor.env = toml.env.clone().unwrap_or_default();
    descriptor.url.clone_from(&toml.url);
    descriptor.supported_intents = toml.supported_intents.clone().unwrap_or_default();
    descriptor.description = toml.description.clone().unwrap_or_default();
    descriptor.enabled = toml.enabled.unwrap_or(true);
    descriptor.priority = toml.priority.unwrap_or(0);
    descriptor
}

/// Apply environment variable overrides to the config
fn apply_env_config<F>(config: &mut RouterConfig, env: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(n) = env("ROUTER_FAILURE_THRESHOLD").and_then(|v| v.parse::<u32>().ok()) {
        config.breaker.failure_threshold = n;
        config.source = ConfigSource::Env;
    }
    if let Some(secs) = env("ROUTER_BREAKER_TIMEOUT_SECS").and_then(|v| v.parse::<u64>().ok()) {
        config.breaker.timeout = Duration::from_secs(secs);
        config.source = ConfigSource::Env;
    }
    if let Some(ms) = env("ROUTER_CONNECT_TIMEOUT_MS").and_then(|v| v.parse::<u64>().ok()) {
        config.execution.connect_timeout = Duration::from_millis(ms);
        config.source = ConfigSource::Env;
    }
    if let Some(ms) = env("ROUTER_INVOKE_TIMEOUT_MS").and_then(|v| v.parse::<u64>().ok()) {
        config.execution.invoke_timeout = Duration::from_millis(ms);
        config.source = ConfigSource::Env;
    }
    if let Some(m) = env("ROUTER_TOKEN_BASELINE_MULTIPLIER").and_then(|v| v.parse::<u64>().ok()) {
        config.execution.token_baseline_multiplier = m;
        config.source = ConfigSource::Env;
    }
}

// =============================================================================
// Programmatic Overrides
// =============================================================================

/// Overrides applied on top of file and environment values
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Override for the breaker threshold
    pub failure_threshold: Option<u32>,

    /// Override for the breaker window
    pub breaker_timeout: Option<Duration>,

    /// Override for the per-service connect timeout
    pub connect_timeout: Option<Duration>,

    /// Override for the model invocation timeout
    pub invoke_timeout: Option<Duration>,

    /// Override for the generic fallback list
    pub generic_fallbacks: Option<Vec<String>>,

    /// Per-tier replacements
    pub tiers: Vec<(ComplexityTier, TierConfig)>,
}

impl ConfigOverrides {
    /// Create empty overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the breaker threshold
    #[must_use]
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = Some(threshold);
        self
    }

    /// Override the breaker window
    #[must_use]
    pub fn with_breaker_timeout(mut self, timeout: Duration) -> Self {
        self.breaker_timeout = Some(timeout);
        self
    }

    /// Override the connect timeout
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Override the invocation timeout
    #[must_use]
    pub fn with_invoke_timeout(mut self, timeout: Duration) -> Self {
        self.invoke_timeout = Some(timeout);
        self
    }

    /// Replace the generic fallback list
    #[must_use]
    pub fn with_generic_fallbacks(mut self, models: Vec<String>) -> Self {
        self.generic_fallbacks = Some(models);
        self
    }

    /// Replace one tier's preferences
    #[must_use]
    pub fn with_tier(mut self, tier: ComplexityTier, tier_config: TierConfig) -> Self {
        self.tiers.push((tier, tier_config));
        self
    }

    /// Whether any override is set
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.failure_threshold.is_none()
            && self.breaker_timeout.is_none()
            && self.connect_timeout.is_none()
            && self.invoke_timeout.is_none()
            && self.generic_fallbacks.is_none()
            && self.tiers.is_empty()
    }

    /// Apply these overrides to a configuration
    pub fn apply(&self, config: &mut RouterConfig) {
        if self.is_empty() {
            return;
        }
        if let Some(threshold) = self.failure_threshold {
            config.breaker.failure_threshold = threshold;
        }
        if let Some(timeout) = self.breaker_timeout {
            config.breaker.timeout = timeout;
        }
        if let Some(timeout) = self.connect_timeout {
            config.execution.connect_timeout = timeout;
        }
        if let Some(timeout) = self.invoke_timeout {
            config.execution.invoke_timeout = timeout;
        }
        if let Some(ref models) = self.generic_fallbacks {
            config.generic_fallbacks.clone_from(models);
        }
        for (tier, tier_config) in &self.tiers {
            *config.tiers.get_mut(*tier) = tier_config.clone();
        }
        config.source = ConfigSource::Override;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn write_toml(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = RouterConfig::default();

        assert_eq!(config.source(), ConfigSource::Default);
        assert_eq!(config.breaker.failure_threshold, 3);
        assert_eq!(config.breaker.timeout, Duration::from_secs(300));
        assert_eq!(config.execution.token_baseline_multiplier, 3);
        assert_eq!(config.execution.max_tokens, 2000);
        assert_eq!(
            config.generic_fallbacks,
            vec!["gpt-3.5-turbo", "gemini-2.0-flash", "claude-3-haiku-20240307"]
        );
        assert!(config.services.is_empty());
        config.validate().unwrap();
    }

    #[test]
    fn test_default_config_path() {
        if let Some(p) = default_config_path() {
            assert!(p.to_string_lossy().contains("llm-router"));
            assert!(p.to_string_lossy().ends_with("router.toml"));
        }
    }

    #[test]
    fn test_parse_valid_toml() {
        let file = write_toml(
            r#"
[execution.simple]
preferred = "gemini-2.5-flash"
fallback = ["gpt-3.5-turbo"]

[execution.complex]
preferred = "o3"
fallback = ["gpt-4o", "claude-3-opus-20240229"]

[fallback]
generic_models = ["gemini-2.0-flash"]
temperature = 0.2
max_tokens = 512
connect_timeout_ms = 1500
invoke_timeout_ms = 30000
token_baseline_multiplier = 4

[circuit_breaker]
failure_threshold = 5
timeout_secs = 60

[services.filesystem]
type = "stdio"
command = ["npx", "-y", "server-filesystem"]
args = ["/tmp"]
supported_intents = ["read", "write"]
priority = 10

[services.search]
type = "http"
url = "http://localhost:8080"
env = { API_KEY = "secret" }
supported_intents = ["search"]
enabled = false
"#,
        );

        let config = load_config_with_env(Some(file.path().to_path_buf()), no_env).unwrap();

        assert_eq!(config.source(), ConfigSource::File);
        assert_eq!(config.tiers.simple.preferred, "gemini-2.5-flash");
        assert_eq!(config.tiers.simple.fallback, vec!["gpt-3.5-turbo"]);
        assert_eq!(config.tiers.complex.preferred, "o3");
        // Untouched tier keeps defaults
        assert_eq!(config.tiers.moderate.preferred, "gpt-4o-mini");

        assert_eq!(config.generic_fallbacks, vec!["gemini-2.0-flash"]);
        assert!((config.execution.temperature - 0.2).abs() < f32::EPSILON);
        assert_eq!(config.execution.max_tokens, 512);
        assert_eq!(config.execution.connect_timeout, Duration::from_millis(1500));
        assert_eq!(config.execution.invoke_timeout, Duration::from_secs(30));
        assert_eq!(config.execution.token_baseline_multiplier, 4);
        assert_eq!(config.breaker.failure_threshold, 5);
        assert_eq!(config.breaker.timeout, Duration::from_secs(60));

        assert_eq!(config.services.len(), 2);
        let fs = &config.services[0];
        assert_eq!(fs.name, "filesystem");
        assert_eq!(fs.kind, ServiceKind::Stdio);
        assert_eq!(fs.command, vec!["npx", "-y", "server-filesystem"]);
        assert_eq!(fs.args, vec!["/tmp"]);
        assert_eq!(fs.supported_intents, vec![Intent::Read, Intent::Write]);
        assert_eq!(fs.priority, 10);
        assert!(fs.enabled);

        let search = &config.services[1];
        assert_eq!(search.kind, ServiceKind::Http);
        assert_eq!(search.url.as_deref(), Some("http://localhost:8080"));
        assert_eq!(search.env.get("API_KEY").map(String::as_str), Some("secret"));
        assert!(!search.enabled);
    }

    #[test]
    fn test_parse_empty_toml() {
        let file = write_toml("");
        let config = load_config_with_env(Some(file.path().to_path_buf()), no_env).unwrap();
        assert_eq!(config.breaker.failure_threshold, 3);
        assert_eq!(config.tiers.complex.preferred, "gpt-4o");
        assert_eq!(config.source(), ConfigSource::File);
    }

    #[test]
    fn test_missing_file_graceful() {
        let path = PathBuf::from("/nonexistent/llm-router/router.toml");
        let config = load_config_with_env(Some(path), no_env).unwrap();
        assert_eq!(config.source(), ConfigSource::Default);
        assert!(config.config_file_path.is_none());
    }

    #[test]
    fn test_no_path_uses_defaults() {
        let config = load_config_with_env(None, no_env).unwrap();
        assert_eq!(config.source(), ConfigSource::Default);
    }

    #[test]
    fn test_malformed_toml_error() {
        let file = write_toml("[circuit_breaker\nfailure_threshold = ");
        let result = load_config_with_env(Some(file.path().to_path_buf()), no_env);
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_unknown_intent_rejected() {
        let file = write_toml(
            r#"
[services.fs]
type = "stdio"
command = ["cat"]
supported_intents = ["teleport"]
"#,
        );
        let result = load_config_with_env(Some(file.path().to_path_buf()), no_env);
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_env_overrides_file() {
        let file = write_toml(
            r#"
[circuit_breaker]
failure_threshold = 5
timeout_secs = 60
"#,
        );

        let env = |key: &str| match key {
            "ROUTER_FAILURE_THRESHOLD" => Some("7".to_string()),
            "ROUTER_INVOKE_TIMEOUT_MS" => Some("2500".to_string()),
            "ROUTER_CONNECT_TIMEOUT_MS" => Some("not-a-number".to_string()),
            _ => None,
        };
        let config = load_config_with_env(Some(file.path().to_path_buf()), env).unwrap();

        assert_eq!(config.breaker.failure_threshold, 7);
        assert_eq!(config.breaker.timeout, Duration::from_secs(60));
        assert_eq!(config.execution.invoke_timeout, Duration::from_millis(2500));
        // Unparseable values are ignored
        assert_eq!(
            config.execution.connect_timeout,
            ExecutionSettings::default().connect_timeout
        );
        assert_eq!(config.source(), ConfigSource::Env);
    }

    #[test]
    fn test_validation_rejects_self_fallback() {
        let file = write_toml(
            r#"
[execution.moderate]
preferred = "gpt-4o-mini"
fallback = ["gemini-2.5-pro", "gpt-4o-mini"]
"#,
        );
        let err = load_config_with_env(Some(file.path().to_path_buf()), no_env).unwrap_err();
        let ConfigError::ValidationError(msg) = err else {
            panic!("expected validation error, got {err:?}");
        };
        assert!(msg.contains("execution.moderate"), "{msg}");
    }

    #[test]
    fn test_validation_rejects_zero_threshold() {
        let file = write_toml("[circuit_breaker]\nfailure_threshold = 0\n");
        let result = load_config_with_env(Some(file.path().to_path_buf()), no_env);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_validation_rejects_stdio_without_command() {
        let file = write_toml("[services.broken]\ntype = \"stdio\"\n");
        let err = load_config_with_env(Some(file.path().to_path_buf()), no_env).unwrap_err();
        assert!(err.to_string().contains("services.broken"), "{err}");
    }

    #[test]
    fn test_overrides_win() {
        let mut config = load_config_with_env(None, |key: &str| {
            (key == "ROUTER_FAILURE_THRESHOLD").then(|| "4".to_string())
        })
        .unwrap();
        assert_eq!(config.breaker.failure_threshold, 4);

        let overrides = ConfigOverrides::new()
            .with_failure_threshold(9)
            .with_invoke_timeout(Duration::from_secs(5))
            .with_generic_fallbacks(vec!["gpt-4o".to_string()])
            .with_tier(ComplexityTier::Simple, TierConfig::new("o3-mini", vec![]));
        overrides.apply(&mut config);

        assert_eq!(config.breaker.failure_threshold, 9);
        assert_eq!(config.execution.invoke_timeout, Duration::from_secs(5));
        assert_eq!(config.generic_fallbacks, vec!["gpt-4o"]);
        assert_eq!(config.tiers.simple.preferred, "o3-mini");
        assert_eq!(config.source(), ConfigSource::Override);
    }

    #[test]
    fn test_empty_overrides_no_change() {
        let mut config = RouterConfig::default();
        ConfigOverrides::new().apply(&mut config);
        assert_eq!(config.source(), ConfigSource::Default);
    }

    #[test]
    fn test_config_source_display() {
        assert_eq!(ConfigSource::Override.to_string(), "override");
        assert_eq!(ConfigSource::Env.to_string(), "environment");
        assert_eq!(ConfigSource::File.to_string(), "config file");
        assert_eq!(ConfigSource::Default.to_string(), "default");
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::ValidationError("bad value".to_string());
        assert_eq!(err.to_string(), "Invalid configuration: bad value");

        let err = ConfigError::ReadError {
            path: PathBuf::from("/etc/router.toml"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.to_string().contains("/etc/router.toml"));
    }
}
