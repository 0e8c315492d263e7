//! HTTP handler definitions for the Piscola server.
//!
//! This module defines `AppState` (the shared state carried through axum
//! extractors), the dispatch path every request takes into the operation
//! pipeline, and re-exports all handler functions for building the router.

pub mod health;
pub mod items;
pub mod rpc;

pub use health::{health_handler, liveness_handler, readiness_handler};
pub use items::{
    add_item_handler, count_items_handler, lookup_advanced_handler, lookup_handler,
    remove_item_handler, replace_item_handler,
};
pub use rpc::rpc_handler;

use std::sync::Arc;
use std::time::Instant;

use axum::http::{HeaderMap, StatusCode};
use piscola_core::Message;
use tower::ServiceExt;
use tracing::{debug, field, info_span, Instrument};

use super::middleware::REQUEST_ID_HEADER;
use super::{HealthState, NetworkConfig, ShutdownController};
use crate::service::{
    CallerOrigin, OperationError, OperationPipeline, OperationResponse, OperationService,
};
use crate::storage::ItemStore;

/// Shared application state passed to all axum handlers via `State` extraction.
///
/// Holds `Arc` references to shared resources so cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    /// The item store, read directly only by the health endpoint.
    pub store: Arc<dyn ItemStore>,
    /// Turns decoded messages into operations.
    pub classifier: Arc<OperationService>,
    /// Layered operation service. Each request drives its own clone.
    pub pipeline: Arc<parking_lot::Mutex<OperationPipeline>>,
    /// Graceful shutdown controller with health state and in-flight tracking.
    pub shutdown: Arc<ShutdownController>,
    /// Network configuration (bind address, TLS, CORS, request timeout).
    pub config: Arc<NetworkConfig>,
    /// Server process start time, used for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    /// Classifies `msg` and runs it through the operation pipeline inside an
    /// `operation` span that records elapsed time and outcome.
    ///
    /// Requests arriving while the server drains are refused as overloaded.
    /// A fatal store fault flips the shutdown controller into its fatal state
    /// before the error is returned.
    ///
    /// # Errors
    ///
    /// Returns the [`OperationError`] from classification or the pipeline.
    pub async fn dispatch(
        &self,
        msg: Message,
        origin: CallerOrigin,
        request_id: Option<String>,
    ) -> Result<OperationResponse, OperationError> {
        if matches!(
            self.shutdown.health_state(),
            HealthState::Draining | HealthState::Stopped
        ) {
            debug!(request = msg.variant_name(), "refusing request while draining");
            return Err(OperationError::Overloaded);
        }

        let _guard = self.shutdown.in_flight_guard();
        let op = self.classifier.classify(msg, origin, request_id)?;

        let ctx = op.ctx();
        let span = info_span!(
            "operation",
            operation = op.name(),
            service = ctx.service_name,
            origin = ctx.caller_origin.as_str(),
            call_id = ctx.call_id,
            request_id = ctx.request_id.as_deref(),
            elapsed_us = field::Empty,
            outcome = field::Empty,
        );

        let started = Instant::now();
        let pipeline = self.pipeline.lock().clone();
        let result = pipeline.oneshot(op).instrument(span.clone()).await;

        let outcome = match &result {
            Ok(_) => "ok",
            Err(err) if err.is_fatal() => "fatal",
            Err(_) => "error",
        };
        span.record(
            "elapsed_us",
            u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX),
        );
        span.record("outcome", outcome);
        debug!(parent: &span, "operation finished");

        if let Err(err) = &result {
            if err.is_fatal() {
                self.shutdown.trigger_fatal(err.to_string());
            }
        }
        result
    }
}

/// Reads the request id assigned by the HTTP middleware.
pub(crate) fn request_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// HTTP status for a wire error code.
pub(crate) fn status_for_code(code: u32) -> StatusCode {
    u16::try_from(code)
        .ok()
        .and_then(|c| StatusCode::from_u16(c).ok())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;
    use std::time::Instant;

    use super::AppState;
    use crate::network::{NetworkConfig, ShutdownController};
    use crate::service::{
        build_operation_pipeline, register_domain_services, OperationService, ServerConfig,
        ServiceRegistry,
    };
    use crate::storage::{IndexedStore, ItemStore};

    /// A ready state over `store` with default configuration.
    pub(crate) fn state_with_store(store: Arc<dyn ItemStore>) -> AppState {
        let config = Arc::new(ServerConfig::default());
        let router = register_domain_services(&ServiceRegistry::new(), &store);
        let pipeline = build_operation_pipeline(router, &config);
        let shutdown = Arc::new(ShutdownController::new());
        shutdown.set_ready();
        AppState {
            store,
            classifier: Arc::new(OperationService::new()),
            pipeline: Arc::new(parking_lot::Mutex::new(pipeline)),
            shutdown,
            config: Arc::new(NetworkConfig::default()),
            start_time: Instant::now(),
        }
    }

    /// A ready state over an empty store.
    pub(crate) fn test_state() -> AppState {
        state_with_store(Arc::new(IndexedStore::new()))
    }
}
