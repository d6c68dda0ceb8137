//! Backend connection lifecycle.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::backend::{ConnectionState, RestToolAdapter, ToolBackend};
use crate::config::{BackendConfig, BackendKind, MeshConfig};
use crate::error::{MeshError, Result};
use crate::registry::ToolRegistry;
use crate::tools::{ToolArguments, ToolDescriptor};
use crate::types::ToolInvocationResult;
use crate::util::with_optional_timeout;

/// A live, initialized backend.
pub struct BackendConnection {
    config: BackendConfig,
    client: Mutex<Box<dyn ToolBackend>>,
    connected_at: DateTime<Utc>,
}

impl BackendConnection {
    pub fn new(config: BackendConfig, client: Box<dyn ToolBackend>) -> Self {
        Self {
            config,
            client: Mutex::new(client),
            connected_at: Utc::now(),
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn kind(&self) -> BackendKind {
        self.config.kind
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    /// Invoke a tool by its backend-side name.
    pub async fn call_tool(
        &self,
        upstream_name: &str,
        arguments: &ToolArguments,
    ) -> Result<ToolInvocationResult> {
        let mut client = self.client.lock().await;
        client.call_tool(upstream_name, arguments).await
    }

    pub async fn close(&self) -> Result<()> {
        self.client.lock().await.close().await
    }
}

impl std::fmt::Debug for BackendConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConnection")
            .field("name", &self.config.name)
            .field("kind", &self.config.kind)
            .field("connected_at", &self.connected_at)
            .finish()
    }
}

/// Builds an uninitialized client for a backend entry.
pub trait BackendFactory: Send + Sync {
    fn create(&self, config: &BackendConfig) -> Result<Box<dyn ToolBackend>>;
}

/// Picks the client implementation from the entry's declared kind.
#[derive(Debug, Clone, Default)]
pub struct DefaultBackendFactory {
    http: reqwest::Client,
}

impl DefaultBackendFactory {
    pub fn with_http_client(http: reqwest::Client) -> Self {
        Self { http }
    }
}

impl BackendFactory for DefaultBackendFactory {
    fn create(&self, config: &BackendConfig) -> Result<Box<dyn ToolBackend>> {
        match config.kind {
            BackendKind::RestAdapter => Ok(Box::new(
                RestToolAdapter::from_config(config).with_http_client(self.http.clone()),
            )),
            #[cfg(feature = "native")]
            BackendKind::NativeProtocol => Ok(Box::new(
                crate::backend::NativeProtocolClient::from_config(config),
            )),
            #[cfg(not(feature = "native"))]
            BackendKind::NativeProtocol => Err(MeshError::Configuration(format!(
                "backend '{}' needs the `native` feature",
                config.name
            ))),
        }
    }
}

/// Connects configured backends and owns the resulting registry.
pub struct BackendConnectionManager {
    config: Arc<MeshConfig>,
    factory: Box<dyn BackendFactory>,
    registry: ToolRegistry,
}

impl BackendConnectionManager {
    pub fn new(config: Arc<MeshConfig>) -> Self {
        Self::with_factory(config, Box::new(DefaultBackendFactory::default()))
    }

    pub fn with_factory(config: Arc<MeshConfig>, factory: Box<dyn BackendFactory>) -> Self {
        let registry = ToolRegistry::new(config.driver.collision_policy);
        Self {
            config,
            factory,
            registry,
        }
    }

    pub fn config(&self) -> &MeshConfig {
        &self.config
    }

    /// Connect every enabled backend in declaration order.
    ///
    /// One backend failing is logged and skipped; the rest still connect.
    /// Returns the number of connected backends.
    pub async fn connect_all(&mut self) -> usize {
        let config = Arc::clone(&self.config);
        let timeout = config.driver.call_timeout();

        for entry in &config.backends {
            if !entry.enabled {
                info!(backend = %entry.name, "backend disabled, skipping");
                continue;
            }
            if self.registry.backend(&entry.name).is_some() {
                warn!(backend = %entry.name, "backend name already connected, skipping entry");
                continue;
            }

            match self.connect_one(entry, timeout).await {
                Ok((connection, tools)) => {
                    let exposed = self.registry.register_backend(Arc::new(connection), tools);
                    info!(
                        backend = %entry.name,
                        kind = %entry.kind,
                        tools = exposed,
                        "backend connected"
                    );
                }
                Err(e) => {
                    error!(backend = %entry.name, error = %e, "failed to connect backend");
                }
            }
        }

        info!(
            backends = self.connected_count(),
            tools = self.tool_count(),
            "backend initialization complete"
        );
        self.connected_count()
    }

    async fn connect_one(
        &self,
        entry: &BackendConfig,
        timeout: Option<std::time::Duration>,
    ) -> Result<(BackendConnection, Vec<ToolDescriptor>)> {
        let mut client = self.factory.create(entry)?;
        with_optional_timeout(timeout, client.initialize()).await?;
        if client.state() != ConnectionState::Connected {
            return Err(MeshError::connection(
                &entry.name,
                format!("initialize finished in state {:?}", client.state()),
            ));
        }
        let tools = client.list_tools().await?;
        Ok((BackendConnection::new(entry.clone(), client), tools))
    }

    pub fn connected_count(&self) -> usize {
        self.registry.backend_count()
    }

    pub fn tool_count(&self) -> usize {
        self.registry.len()
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Clear the registry and close every backend. Close failures are logged
    /// and never returned. Safe to call more than once.
    pub async fn close(&mut self) {
        let connections = self.registry.clear();
        if connections.is_empty() {
            return;
        }

        let results = join_all(connections.iter().map(|connection| connection.close())).await;
        for (connection, result) in connections.iter().zip(results) {
            match result {
                Ok(()) => info!(backend = %connection.name(), "backend closed"),
                Err(e) => warn!(backend = %connection.name(), error = %e, "error closing backend"),
            }
        }
    }
}
