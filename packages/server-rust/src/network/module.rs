//! The HTTP server: route table, listener binding and the serve/drain loop.
//!
//! Binding happens in `start()`, separately from `serve()`, so callers can
//! read back an OS-assigned port before traffic flows.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context as _;
use axum::routing::{delete, get, post};
use axum::Router;
use tokio::net::TcpListener;
use tracing::{info, warn};

use super::config::{NetworkConfig, TlsConfig};
use super::handlers::{
    add_item_handler, count_items_handler, health_handler, liveness_handler,
    lookup_advanced_handler, lookup_handler, readiness_handler, remove_item_handler,
    replace_item_handler, rpc_handler, AppState,
};
use super::middleware::with_http_layers;
use super::shutdown::ShutdownController;
use crate::service::{build_operation_pipeline, OperationRouter, OperationService, ServerConfig};
use crate::storage::ItemStore;

/// Grace period for in-flight requests once shutdown starts.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Every route, wrapped in the HTTP layers:
///
/// | Route | Handler |
/// |-------|---------|
/// | `GET /health`, `/health/live`, `/health/ready` | health checks |
/// | `POST /rpc` | `MsgPack` messages |
/// | `POST /items`, `PUT`/`DELETE /items/{id}`, `GET /items/count` | item CRUD |
/// | `POST /lookup`, `POST /lookup/advanced` | searches |
pub fn build_app(state: AppState) -> Router {
    let routes = Router::new()
        .route("/health", get(health_handler))
        .route("/health/live", get(liveness_handler))
        .route("/health/ready", get(readiness_handler))
        .route("/rpc", post(rpc_handler))
        .route("/items", post(add_item_handler))
        .route("/items/count", get(count_items_handler))
        .route(
            "/items/{id}",
            delete(remove_item_handler).put(replace_item_handler),
        )
        .route("/lookup", post(lookup_handler))
        .route("/lookup/advanced", post(lookup_advanced_handler));

    with_http_layers(routes, &state.config).with_state(state)
}

pub struct NetworkModule {
    listener: Option<TcpListener>,
    state: AppState,
}

impl NetworkModule {
    /// Wires the operation pipeline over `router`. Nothing is bound yet and
    /// the health state is `Starting`.
    #[must_use]
    pub fn new(
        config: NetworkConfig,
        server_config: Arc<ServerConfig>,
        store: Arc<dyn ItemStore>,
        router: OperationRouter,
    ) -> Self {
        let pipeline = build_operation_pipeline(router, &server_config);
        Self {
            listener: None,
            state: AppState {
                store,
                classifier: Arc::new(OperationService::new()),
                pipeline: Arc::new(parking_lot::Mutex::new(pipeline)),
                shutdown: Arc::new(ShutdownController::new()),
                config: Arc::new(config),
                start_time: Instant::now(),
            },
        }
    }

    /// The controller `serve()` watches. Calling `trigger_shutdown()` on it
    /// stops the server.
    #[must_use]
    pub fn shutdown_controller(&self) -> Arc<ShutdownController> {
        Arc::clone(&self.state.shutdown)
    }

    #[must_use]
    pub fn build_router(&self) -> Router {
        build_app(self.state.clone())
    }

    /// Binds the configured address and returns the bound port.
    ///
    /// # Errors
    ///
    /// The address cannot be bound.
    pub async fn start(&mut self) -> anyhow::Result<u16> {
        let addr = self.state.config.bind_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;
        let port = listener.local_addr()?.port();
        info!(host = %self.state.config.host, port, "listener bound");
        self.listener = Some(listener);
        Ok(port)
    }

    /// Marks the server ready and serves until the shutdown controller
    /// starts draining, then waits up to 30 seconds for in-flight requests.
    ///
    /// # Errors
    ///
    /// `start()` was not called, the server hit an I/O or TLS error, or the
    /// server stopped because of a fatal fault.
    pub async fn serve(self) -> anyhow::Result<()> {
        let router = self.build_router();
        let Self { listener, state } = self;
        let Some(listener) = listener else {
            anyhow::bail!("start() must be called before serve()");
        };
        let ctrl = state.shutdown;

        let stopping = {
            let ctrl = Arc::clone(&ctrl);
            async move { ctrl.shutdown_signalled().await }
        };

        ctrl.set_ready();
        let served = match &state.config.tls {
            None => {
                info!("serving plain HTTP");
                axum::serve(listener, router)
                    .with_graceful_shutdown(stopping)
                    .await
                    .map_err(anyhow::Error::from)
            }
            Some(tls) => serve_tls(listener, router, tls, stopping).await,
        };

        // An I/O failure must still stop readiness and drain.
        ctrl.trigger_shutdown();
        if ctrl.wait_for_drain(DRAIN_TIMEOUT).await {
            info!("all requests drained");
        } else {
            warn!(in_flight = ctrl.in_flight_count(), "drain timed out");
        }

        served?;
        match ctrl.fatal_reason() {
            Some(reason) => anyhow::bail!("server stopped after fatal fault: {reason}"),
            None => Ok(()),
        }
    }
}

/// Serves rustls connections on the already-bound `listener`.
async fn serve_tls(
    listener: TcpListener,
    router: Router,
    tls: &TlsConfig,
    stopping: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    use axum_server::tls_rustls::RustlsConfig;

    let rustls = RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path)
        .await
        .context("failed to load TLS certificate or key")?;

    let handle = axum_server::Handle::new();
    tokio::spawn({
        let handle = handle.clone();
        async move {
            stopping.await;
            handle.graceful_shutdown(None);
        }
    });

    info!(addr = %listener.local_addr()?, "serving TLS");
    axum_server::from_tcp_rustls(listener.into_std()?, rustls)
        .handle(handle)
        .serve(router.into_make_service())
        .await?;
    Ok(())
}
