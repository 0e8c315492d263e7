//! Domain services.
//!
//! Each service implements both `ManagedService` (lifecycle) and
//! `tower::Service<Operation>` (request handling) on `Arc<Self>`. Both wrap the
//! shared [`ItemStore`]; the split only decides which operations a service
//! accepts.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use tower::Service;
use tracing::{error, info};

use crate::service::operation::{service_names, Operation, OperationError, OperationResponse};
use crate::service::registry::{ManagedService, ServiceContext, ServiceRegistry};
use crate::service::router::OperationRouter;
use crate::storage::{ItemStore, StoreError};

type OperationFuture =
    Pin<Box<dyn Future<Output = Result<OperationResponse, OperationError>> + Send>>;

fn wrong_service(op: &Operation, service_name: &'static str) -> OperationFuture {
    let err = OperationError::WrongService {
        operation: op.name(),
        service_name,
    };
    Box::pin(async move { Err(err) })
}

fn report(err: StoreError) -> OperationError {
    if err.is_fatal() {
        error!(error = %err, "item store invariant violated");
    }
    OperationError::from(err)
}

// ---------------------------------------------------------------------------
// ItemService
// ---------------------------------------------------------------------------

/// Handles `add`, `replace`, `remove` and `size`.
pub struct ItemService {
    store: Arc<dyn ItemStore>,
}

impl ItemService {
    #[must_use]
    pub fn new(store: Arc<dyn ItemStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ManagedService for ItemService {
    fn name(&self) -> &'static str {
        service_names::ITEMS
    }

    async fn init(&self, _ctx: &ServiceContext) -> anyhow::Result<()> {
        info!(items = self.store.size(), "items service ready");
        Ok(())
    }

    async fn shutdown(&self, _terminate: bool) -> anyhow::Result<()> {
        info!(items = self.store.size(), "items service stopped");
        Ok(())
    }
}

impl Service<Operation> for Arc<ItemService> {
    type Response = OperationResponse;
    type Error = OperationError;
    type Future = OperationFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, op: Operation) -> Self::Future {
        let store = Arc::clone(&self.store);
        match op {
            Operation::Add { item, .. } => Box::pin(async move {
                Ok(OperationResponse::Ack {
                    success: store.add(item),
                })
            }),
            Operation::Replace { item, .. } => Box::pin(async move {
                let success = store.put(item).map_err(report)?;
                Ok(OperationResponse::Ack { success })
            }),
            Operation::Remove { id, .. } => Box::pin(async move {
                let success = store.remove(id).map_err(report)?;
                Ok(OperationResponse::Ack { success })
            }),
            Operation::Size { .. } => Box::pin(async move {
                Ok(OperationResponse::Size {
                    size: store.size() as u64,
                })
            }),
            other => wrong_service(&other, service_names::ITEMS),
        }
    }
}

// ---------------------------------------------------------------------------
// SearchService
// ---------------------------------------------------------------------------

/// Handles `lookup` and `lookup_advanced`.
pub struct SearchService {
    store: Arc<dyn ItemStore>,
    log_requests: AtomicBool,
}

impl SearchService {
    #[must_use]
    pub fn new(store: Arc<dyn ItemStore>) -> Self {
        Self {
            store,
            log_requests: AtomicBool::new(true),
        }
    }
}

#[async_trait]
impl ManagedService for SearchService {
    fn name(&self) -> &'static str {
        service_names::SEARCH
    }

    async fn init(&self, ctx: &ServiceContext) -> anyhow::Result<()> {
        self.log_requests
            .store(ctx.config.log_requests, Ordering::Relaxed);
        Ok(())
    }

    async fn shutdown(&self, _terminate: bool) -> anyhow::Result<()> {
        Ok(())
    }
}

impl Service<Operation> for Arc<SearchService> {
    type Response = OperationResponse;
    type Error = OperationError;
    type Future = OperationFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, op: Operation) -> Self::Future {
        let store = Arc::clone(&self.store);
        let log_requests = self.log_requests.load(Ordering::Relaxed);
        match op {
            Operation::Lookup { query, .. } => Box::pin(async move {
                if log_requests {
                    info!(?query, "lookup");
                }
                let result = store.lookup(&query).map_err(report)?;
                Ok(OperationResponse::Lookup(result))
            }),
            Operation::LookupAdvanced { query, .. } => Box::pin(async move {
                if log_requests {
                    info!(?query, "lookup advanced");
                }
                let result = store.lookup_advanced(&query).map_err(report)?;
                Ok(OperationResponse::Lookup(result))
            }),
            other => wrong_service(&other, service_names::SEARCH),
        }
    }
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

/// Registers both domain services over `store` and returns a router that
/// dispatches to them.
pub fn register_domain_services(
    registry: &ServiceRegistry,
    store: &Arc<dyn ItemStore>,
) -> OperationRouter {
    let items = registry.register(ItemService::new(Arc::clone(store)));
    let search = registry.register(SearchService::new(Arc::clone(store)));

    let mut router = OperationRouter::new();
    router.register(service_names::ITEMS, items);
    router.register(service_names::SEARCH, search);
    router
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use piscola_core::{AdvancedQuery, Item, Query, SearchResult};
    use tower::ServiceExt;

    use super::*;
    use crate::service::config::ServerConfig;
    use crate::service::operation::{CallerOrigin, OperationContext};
    use crate::storage::IndexedStore;

    fn ctx(service_name: &'static str) -> OperationContext {
        OperationContext::new(1, service_name, CallerOrigin::Rpc)
    }

    fn store() -> Arc<dyn ItemStore> {
        Arc::new(IndexedStore::new())
    }

    #[tokio::test]
    async fn item_service_mutations() {
        let svc = Arc::new(ItemService::new(store()));

        let add = |item| Operation::Add {
            ctx: ctx(service_names::ITEMS),
            item,
        };
        let resp = svc.clone().oneshot(add(Item::new(1, 10, "a"))).await.unwrap();
        assert_eq!(resp, OperationResponse::Ack { success: true });
        let resp = svc.clone().oneshot(add(Item::new(1, 11, "b"))).await.unwrap();
        assert_eq!(resp, OperationResponse::Ack { success: false });

        let resp = svc
            .clone()
            .oneshot(Operation::Replace {
                ctx: ctx(service_names::ITEMS),
                item: Item::new(1, 12, "c"),
            })
            .await
            .unwrap();
        assert_eq!(resp, OperationResponse::Ack { success: true });

        let resp = svc
            .clone()
            .oneshot(Operation::Size {
                ctx: ctx(service_names::ITEMS),
            })
            .await
            .unwrap();
        assert_eq!(resp, OperationResponse::Size { size: 1 });

        let remove = || Operation::Remove {
            ctx: ctx(service_names::ITEMS),
            id: 1,
        };
        let resp = svc.clone().oneshot(remove()).await.unwrap();
        assert_eq!(resp, OperationResponse::Ack { success: true });
        let resp = svc.oneshot(remove()).await.unwrap();
        assert_eq!(resp, OperationResponse::Ack { success: false });
    }

    #[tokio::test]
    async fn search_service_lookups() {
        let store = store();
        store.add(Item::new(1, 1000, "foo"));
        store.add(Item::new(2, 1001, "foobar"));
        store.add(Item::new(3, 1002, "bar"));
        let svc = Arc::new(SearchService::new(store));

        let resp = svc
            .clone()
            .oneshot(Operation::Lookup {
                ctx: ctx(service_names::SEARCH),
                query: Query::new("foo*", 10),
            })
            .await
            .unwrap();
        assert_eq!(
            resp,
            OperationResponse::Lookup(SearchResult {
                ids: vec![2, 1],
                total: 2
            })
        );

        let resp = svc
            .oneshot(Operation::LookupAdvanced {
                ctx: ctx(service_names::SEARCH),
                query: AdvancedQuery {
                    include_patterns: vec!["*".to_string()],
                    exclude_patterns: vec!["foo*".to_string()],
                    limit: 10,
                    ..AdvancedQuery::default()
                },
            })
            .await
            .unwrap();
        assert_eq!(
            resp,
            OperationResponse::Lookup(SearchResult {
                ids: vec![3],
                total: 1
            })
        );
    }

    #[tokio::test]
    async fn search_service_rejects_bad_pattern() {
        let svc = Arc::new(SearchService::new(store()));
        let err = svc
            .oneshot(Operation::Lookup {
                ctx: ctx(service_names::SEARCH),
                query: Query::new("[abc", 10),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, OperationError::InvalidPattern(_)));
        assert!(!err.is_fatal());
    }

    #[tokio::test]
    async fn misrouted_operations_are_rejected() {
        let items = Arc::new(ItemService::new(store()));
        let err = items
            .oneshot(Operation::Lookup {
                ctx: ctx(service_names::ITEMS),
                query: Query::new("*", 1),
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            OperationError::WrongService {
                operation: "lookup",
                service_name: "items"
            }
        ));

        let search = Arc::new(SearchService::new(store()));
        let err = search
            .oneshot(Operation::Size {
                ctx: ctx(service_names::SEARCH),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, OperationError::WrongService { .. }));
    }

    #[tokio::test]
    async fn init_applies_request_logging_flag() {
        let svc = SearchService::new(store());
        let config = ServerConfig {
            log_requests: false,
            ..ServerConfig::default()
        };
        svc.init(&ServiceContext {
            config: Arc::new(config),
        })
        .await
        .unwrap();
        assert!(!svc.log_requests.load(Ordering::Relaxed));
    }

    #[tokio::test]
    async fn registered_services_share_one_store() {
        let registry = ServiceRegistry::new();
        let store = store();
        let router = register_domain_services(&registry, &store);

        assert_eq!(registry.names(), vec!["items", "search"]);

        router
            .clone()
            .oneshot(Operation::Add {
                ctx: ctx(service_names::ITEMS),
                item: Item::new(7, 1, "seven"),
            })
            .await
            .unwrap();
        let resp = router
            .oneshot(Operation::Lookup {
                ctx: ctx(service_names::SEARCH),
                query: Query::new("sev*", 5),
            })
            .await
            .unwrap();
        assert_eq!(
            resp,
            OperationResponse::Lookup(SearchResult {
                ids: vec![7],
                total: 1
            })
        );
        assert_eq!(store.size(), 1);
    }
}
