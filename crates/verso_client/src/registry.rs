//! Explicit backend registry.
//!
//! Backend selection by name, without process-wide mutable state: the
//! composition root builds a [`ClientRegistry`], registers whatever backends
//! the deployment supports, and passes it by reference to whatever assembles
//! the store.

use crate::client::RawClient;
use crate::error::{ClientError, ClientResult};
use crate::memory::MemoryClient;
use std::collections::HashMap;
use std::sync::Arc;

/// Name of the built-in in-memory backend.
pub const MEMORY_BACKEND: &str = "memory";

/// Releases any resources a created client holds (connections, pools).
pub type DestroyFn = Box<dyn FnOnce() + Send>;

/// Probes a backend for liveness.
pub type HealthCheck = Box<dyn Fn() -> ClientResult<()> + Send + Sync>;

type ClientFactory =
    Box<dyn Fn(&BackendConfig) -> ClientResult<(Arc<dyn RawClient>, DestroyFn)> + Send + Sync>;
type HealthCheckFactory = Box<dyn Fn(&BackendConfig) -> ClientResult<HealthCheck> + Send + Sync>;

/// Configuration for creating a raw client.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Backend type, matched against registered factory names.
    pub backend: String,
    /// Server endpoints, for backends that need them.
    pub endpoints: Vec<String>,
    /// Root path under which the store namespaces all keys.
    pub prefix: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            backend: MEMORY_BACKEND.to_string(),
            endpoints: Vec::new(),
            prefix: "/registry".to_string(),
        }
    }
}

impl BackendConfig {
    /// Creates a configuration for the given backend type.
    #[must_use]
    pub fn new(backend: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
            ..Self::default()
        }
    }

    /// Sets the server endpoints.
    #[must_use]
    pub fn endpoints(mut self, endpoints: Vec<String>) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Sets the root prefix.
    #[must_use]
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }
}

/// Maps backend names to client factories and health checks.
pub struct ClientRegistry {
    factories: HashMap<String, ClientFactory>,
    health_checks: HashMap<String, HealthCheckFactory>,
}

impl ClientRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
            health_checks: HashMap::new(),
        }
    }

    /// Creates a registry with the built-in backends registered.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(
            MEMORY_BACKEND,
            Box::new(|_config| {
                let client: Arc<dyn RawClient> = Arc::new(MemoryClient::new());
                Ok((client, Box::new(|| {}) as DestroyFn))
            }),
            Box::new(|_config| Ok(Box::new(|| Ok(())) as HealthCheck)),
        );
        registry
    }

    /// Registers a backend under `name`, replacing any previous registration.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        factory: ClientFactory,
        health_check: HealthCheckFactory,
    ) {
        let name = name.into();
        self.factories.insert(name.clone(), factory);
        self.health_checks.insert(name, health_check);
    }

    /// Creates a client for the configured backend.
    ///
    /// # Errors
    ///
    /// [`ClientError::UnknownBackend`] if no factory is registered under the
    /// configured name.
    pub fn create(&self, config: &BackendConfig) -> ClientResult<(Arc<dyn RawClient>, DestroyFn)> {
        let factory = self
            .factories
            .get(&config.backend)
            .ok_or_else(|| ClientError::UnknownBackend {
                name: config.backend.clone(),
            })?;
        factory(config)
    }

    /// Creates a health-check probe for the configured backend.
    pub fn health_check(&self, config: &BackendConfig) -> ClientResult<HealthCheck> {
        let factory =
            self.health_checks
                .get(&config.backend)
                .ok_or_else(|| ClientError::UnknownBackend {
                    name: config.backend.clone(),
                })?;
        factory(config)
    }
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
