//! Service connection seam and the bundled transport connector
//!
//! The attempt runner only needs to know whether a service could be reached
//! and to release it afterwards. Tool-call protocols spoken over the
//! connection are out of scope here.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;
use tokio::process::{Child, Command};
use uuid::Uuid;

use super::{ServiceDescriptor, ServiceKind};

/// Time given to a killed child to be reaped
const REAP_TIMEOUT: Duration = Duration::from_secs(5);

/// A stdio service must still be running this long after spawn to count as
/// connected
pub const STARTUP_GRACE: Duration = Duration::from_millis(100);

// ============================================================================
// Errors
// ============================================================================

/// Why a service could not be connected
#[derive(Debug, Error)]
pub enum ConnectError {
    /// Name not present in the registry
    #[error("Unknown service: {0}")]
    UnknownService(String),

    /// Service exists but is disabled
    #[error("Service {0} is disabled")]
    Disabled(String),

    /// Stdio service without a program to run
    #[error("Service {0} has no command configured")]
    MissingCommand(String),

    /// Network service without a URL
    #[error("Service {0} has no url configured")]
    MissingUrl(String),

    /// Child process could not be started
    #[error("Failed to spawn service {service}: {source}")]
    Spawn {
        /// Service name
        service: String,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// Child process exited right after being started
    #[error("Service {service} exited during startup ({status})")]
    ExitedEarly {
        /// Service name
        service: String,
        /// Exit status description
        status: String,
    },

    /// Health probe request failed
    #[error("Health probe for service {service} failed: {source}")]
    Http {
        /// Service name
        service: String,
        /// Underlying HTTP client error
        source: reqwest::Error,
    },

    /// Health probe returned a non-success status
    #[error("Health probe for service {service} returned HTTP {status}")]
    Status {
        /// Service name
        service: String,
        /// HTTP status code
        status: u16,
    },

    /// Connecting took longer than the configured timeout
    #[error("Connecting to service {service} timed out after {timeout:?}")]
    Timeout {
        /// Service name
        service: String,
        /// Timeout that elapsed
        timeout: Duration,
    },

    /// Connection kind not handled by this connector
    #[error("{kind} services are not supported by this connector")]
    Unsupported {
        /// The unsupported kind
        kind: ServiceKind,
    },
}

// ============================================================================
// Connector Trait
// ============================================================================

/// A live connection to a service
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionHandle {
    /// Connection identifier
    pub id: Uuid,
    /// Service name
    pub service: String,
    /// Connection kind
    pub kind: ServiceKind,
}

impl ConnectionHandle {
    /// Create a handle with a fresh id
    #[must_use]
    pub fn new(service: &ServiceDescriptor) -> Self {
        Self {
            id: Uuid::new_v4(),
            service: service.name.clone(),
            kind: service.kind,
        }
    }
}

/// Establishes and releases service connections
#[async_trait]
pub trait ServiceConnector: Send + Sync {
    /// Connect to a service
    ///
    /// # Errors
    ///
    /// Returns a [`ConnectError`] if the process or endpoint cannot be reached.
    async fn connect(&self, service: &ServiceDescriptor) -> Result<ConnectionHandle, ConnectError>;

    /// Release a connection. Never fails; problems are logged.
    async fn disconnect(&self, handle: ConnectionHandle);

    /// Release a connection without awaiting anything
    ///
    /// Called when the owner of a connection is dropped before it could
    /// `disconnect`, e.g. a cancelled call. Connectors holding resources per
    /// handle must free them here. Releasing an unknown handle is a no-op.
    fn abandon(&self, _handle: &ConnectionHandle) {}
}

// ============================================================================
// Transport Connector
// ============================================================================

/// Connects stdio services by spawning them and http services by probing
/// `GET {url}/health`
#[derive(Debug, Default)]
pub struct TransportConnector {
    http: reqwest::Client,
    children: DashMap<Uuid, Child>,
}

impl TransportConnector {
    /// Create a connector with a default HTTP client
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a connector reusing an existing HTTP client
    #[must_use]
    pub fn with_client(http: reqwest::Client) -> Self {
        Self {
            http,
            children: DashMap::new(),
        }
    }

    /// Number of child processes currently held
    #[must_use]
    pub fn active_processes(&self) -> usize {
        self.children.len()
    }

    async fn spawn_stdio(
        &self,
        service: &ServiceDescriptor,
    ) -> Result<ConnectionHandle, ConnectError> {
        let (program, leading) = service
            .command
            .split_first()
            .filter(|(program, _)| !program.is_empty())
            .ok_or_else(|| ConnectError::MissingCommand(service.name.clone()))?;

        let mut child = Command::new(program)
            .args(leading)
            .args(&service.args)
            .envs(&service.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ConnectError::Spawn {
                service: service.name.clone(),
                source,
            })?;

        // Still running after the grace period counts as alive
        match tokio::time::timeout(STARTUP_GRACE, child.wait()).await {
            Ok(Ok(status)) => {
                return Err(ConnectError::ExitedEarly {
                    service: service.name.clone(),
                    status: status.to_string(),
                });
            }
            Ok(Err(source)) => {
                return Err(ConnectError::Spawn {
                    service: service.name.clone(),
                    source,
                });
            }
            Err(_) => {}
        }

        let handle = ConnectionHandle::new(service);
        tracing::debug!(
            service = %service.name,
            pid = child.id().unwrap_or_default(),
            "Spawned stdio service"
        );
        self.children.insert(handle.id, child);
        Ok(handle)
    }

    async fn probe_http(&self, service: &ServiceDescriptor) -> Result<ConnectionHandle, ConnectError> {
        let base = service
            .url
            .as_deref()
            .filter(|url| !url.is_empty())
            .ok_or_else(|| ConnectError::MissingUrl(service.name.clone()))?;
        let url = format!("{}/health", base.trim_end_matches('/'));

        let mut request = self.http.get(&url);
        if let Some(token) = service.env.get("API_KEY") {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|source| ConnectError::Http {
            service: service.name.clone(),
            source,
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ConnectError::Status {
                service: service.name.clone(),
                status: status.as_u16(),
            });
        }

        tracing::debug!(service = %service.name, url = %url, "HTTP service reachable");
        Ok(ConnectionHandle::new(service))
    }
}

#[async_trait]
impl ServiceConnector for TransportConnector {
    async fn connect(&self, service: &ServiceDescriptor) -> Result<ConnectionHandle, ConnectError> {
        match service.kind {
            ServiceKind::Stdio => self.spawn_stdio(service).await,
            ServiceKind::Http => self.probe_http(service).await,
            ServiceKind::WebSocket => Err(ConnectError::Unsupported { kind: service.kind }),
        }
    }

    async fn disconnect(&self, handle: ConnectionHandle) {
        let Some((_, mut child)) = self.children.remove(&handle.id) else {
            return;
        };

        if let Err(e) = child.start_kill() {
            tracing::debug!(service = %handle.service, error = %e, "Service already exited");
        }
        match tokio::time::timeout(REAP_TIMEOUT, child.wait()).await {
            Ok(Ok(status)) => {
                tracing::debug!(service = %handle.service, status = %status, "Stdio service stopped");
            }
            Ok(Err(e)) => {
                tracing::warn!(service = %handle.service, error = %e, "Failed to reap stdio service");
            }
            Err(_) => {
                tracing::warn!(service = %handle.service, "Timed out reaping stdio service");
            }
        }
    }

    fn abandon(&self, handle: &ConnectionHandle) {
        let Some((_, mut child)) = self.children.remove(&handle.id) else {
            return;
        };

        // Dropping the child afterwards hands reaping to the runtime
        if let Err(e) = child.start_kill() {
            tracing::debug!(service = %handle.service, error = %e, "Service already exited");
        }
        tracing::debug!(service = %handle.service, "Abandoned stdio service killed");
    }
}
