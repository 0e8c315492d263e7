//! Routing of operations to domain services by name.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tower::util::BoxCloneService;
use tower::{Service, ServiceExt};

use super::operation::{Operation, OperationError, OperationResponse};

type DomainService = BoxCloneService<Operation, OperationResponse, OperationError>;

/// Dispatches each operation to the service named by its `service_name`.
///
/// Clones share the registered services. A name with no service fails with
/// `OperationError::UnknownService`.
#[derive(Clone, Default)]
pub struct OperationRouter {
    services: HashMap<&'static str, DomainService>,
}

impl OperationRouter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes operations for `name` to `service`, replacing any earlier one.
    pub fn register<S>(&mut self, name: &'static str, service: S)
    where
        S: Service<Operation, Response = OperationResponse, Error = OperationError>
            + Clone
            + Send
            + 'static,
        S::Future: Send + 'static,
    {
        self.services.insert(name, service.boxed_clone());
    }
}

impl Service<Operation> for OperationRouter {
    type Response = OperationResponse;
    type Error = OperationError;
    type Future = Pin<Box<dyn Future<Output = Result<OperationResponse, OperationError>> + Send>>;

    /// Readiness is checked per call on the chosen service.
    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, op: Operation) -> Self::Future {
        let service_name = op.ctx().service_name;
        match self.services.get(service_name) {
            Some(svc) => Box::pin(svc.clone().oneshot(op)),
            None => Box::pin(std::future::ready(Err(OperationError::UnknownService {
                name: service_name.to_string(),
            }))),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
