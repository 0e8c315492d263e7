//! Lifecycle management for the domain services.

use std::sync::Arc;

use anyhow::Context as _;
use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, warn};

use super::config::ServerConfig;

/// Handed to every service on `init`.
#[derive(Debug, Clone)]
pub struct ServiceContext {
    pub config: Arc<ServerConfig>,
}

/// A service started before the listener binds and stopped after it closes.
#[async_trait]
pub trait ManagedService: Send + Sync + 'static {
    /// Unique name, also the routing key (`"items"`, `"search"`).
    fn name(&self) -> &'static str;

    async fn init(&self, ctx: &ServiceContext) -> anyhow::Result<()>;

    /// `terminate` is set when the server is stopping after an error.
    async fn shutdown(&self, terminate: bool) -> anyhow::Result<()>;
}

/// Ordered set of managed services, keyed by name.
///
/// Initialized in registration order, shut down in reverse.
#[derive(Default)]
pub struct ServiceRegistry {
    services: RwLock<Vec<Arc<dyn ManagedService>>>,
}

impl ServiceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `service` and hands back the shared handle the router
    /// dispatches to. A service registered under a taken name takes over
    /// that name's slot in the lifecycle order.
    pub fn register<T: ManagedService>(&self, service: T) -> Arc<T> {
        let service = Arc::new(service);
        let entry: Arc<dyn ManagedService> = service.clone();
        let mut services = self.services.write();
        match services.iter_mut().find(|s| s.name() == entry.name()) {
            Some(slot) => *slot = entry,
            None => services.push(entry),
        }
        service
    }

    /// Registered names in lifecycle order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.services.read().iter().map(|s| s.name()).collect()
    }

    fn snapshot(&self) -> Vec<Arc<dyn ManagedService>> {
        self.services.read().clone()
    }

    /// Initializes every service in order, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// The failing service's error, tagged with its name.
    pub async fn init_all(&self, ctx: &ServiceContext) -> anyhow::Result<()> {
        for service in self.snapshot() {
            debug!(service = service.name(), "initializing service");
            service
                .init(ctx)
                .await
                .with_context(|| format!("service `{}` failed to initialize", service.name()))?;
        }
        Ok(())
    }

    /// Shuts every service down in reverse order. A failure is logged and
    /// the remaining services are still stopped.
    ///
    /// # Errors
    ///
    /// The first shutdown failure.
    pub async fn shutdown_all(&self, terminate: bool) -> anyhow::Result<()> {
        let mut first_err = None;
        for service in self.snapshot().into_iter().rev() {
            debug!(service = service.name(), terminate, "shutting down service");
            if let Err(err) = service.shutdown(terminate).await {
                warn!(service = service.name(), error = %err, "service shutdown failed");
                first_err.get_or_insert(err);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}
