//! The operation pipeline: the router wrapped in tower's stock load-shed,
//! concurrency-limit and timeout layers.

use std::time::Duration;

use tower::load_shed::error::Overloaded;
use tower::timeout::error::Elapsed;
use tower::util::BoxCloneService;
use tower::{BoxError, ServiceBuilder, ServiceExt};

use super::config::ServerConfig;
use super::operation::{Operation, OperationError, OperationResponse};
use super::router::OperationRouter;

/// The fully layered operation service. Clones share the concurrency limit
/// and the domain services.
pub type OperationPipeline = BoxCloneService<Operation, OperationResponse, OperationError>;

/// Wraps `router` so that at most `max_concurrent_operations` run at once
/// (extra calls fail fast with `Overloaded` instead of queueing) and each
/// call is cut off after `default_operation_timeout_ms`.
#[must_use]
pub fn build_operation_pipeline(router: OperationRouter, config: &ServerConfig) -> OperationPipeline {
    let timeout_ms = config.default_operation_timeout_ms;

    ServiceBuilder::new()
        .map_err(move |err| restore_error(err, timeout_ms))
        .load_shed()
        .concurrency_limit(config.max_concurrent_operations as usize)
        .timeout(Duration::from_millis(timeout_ms))
        .service(router)
        .boxed_clone()
}

/// Maps the boxed errors tower's layers produce back onto `OperationError`.
fn restore_error(err: BoxError, timeout_ms: u64) -> OperationError {
    if err.is::<Overloaded>() {
        tracing::warn!("shedding load");
        return OperationError::Overloaded;
    }
    if err.is::<Elapsed>() {
        tracing::warn!(timeout_ms, "operation timed out");
        return OperationError::Timeout { timeout_ms };
    }
    match err.downcast::<OperationError>() {
        Ok(err) => *err,
        Err(other) => OperationError::Internal(anyhow::anyhow!(other)),
    }
}
