//! Message classification: converts `Message` into typed `Operation` variants.

use std::sync::atomic::{AtomicU64, Ordering};

use piscola_core::Message;

use super::operation::{
    service_names, CallerOrigin, ClassifyError, Operation, OperationContext,
};

/// Classifies incoming `Message` values into typed `Operation` variants.
///
/// Every classified message gets the next call id; ids start at 1 and are
/// never reused.
#[derive(Debug)]
pub struct OperationService {
    next_call_id: AtomicU64,
}

impl Default for OperationService {
    fn default() -> Self {
        Self {
            next_call_id: AtomicU64::new(1),
        }
    }
}

impl OperationService {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify a `Message` into an `Operation`.
    ///
    /// Mutations and `SIZE` route to the items service, lookups to the search
    /// service.
    ///
    /// # Errors
    ///
    /// Returns `ClassifyError::ServerToClient` for response messages
    /// (`ACK`, `LOOKUP_RESP`, `SIZE_RESP`, `ERROR`).
    pub fn classify(
        &self,
        msg: Message,
        caller_origin: CallerOrigin,
        request_id: Option<String>,
    ) -> Result<Operation, ClassifyError> {
        let mut request_id = request_id;
        let mut ctx = |service_name: &'static str| {
            let call_id = self.next_call_id.fetch_add(1, Ordering::Relaxed);
            let mut ctx = OperationContext::new(call_id, service_name, caller_origin);
            ctx.request_id = request_id.take();
            ctx
        };

        match msg {
            Message::Add { item } => Ok(Operation::Add {
                ctx: ctx(service_names::ITEMS),
                item,
            }),
            Message::Replace { item } => Ok(Operation::Replace {
                ctx: ctx(service_names::ITEMS),
                item,
            }),
            Message::Remove { id } => Ok(Operation::Remove {
                ctx: ctx(service_names::ITEMS),
                id,
            }),
            Message::Size => Ok(Operation::Size {
                ctx: ctx(service_names::ITEMS),
            }),
            Message::Lookup { query } => Ok(Operation::Lookup {
                ctx: ctx(service_names::SEARCH),
                query,
            }),
            Message::LookupAdvanced { query } => Ok(Operation::LookupAdvanced {
                ctx: ctx(service_names::SEARCH),
                query,
            }),
            other @ (Message::Ack { .. }
            | Message::LookupResp { .. }
            | Message::SizeResp { .. }
            | Message::Error { .. }) => Err(ClassifyError::ServerToClient {
                variant: other.variant_name(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use piscola_core::{AdvancedQuery, Item, Query, SearchResult};

    use super::*;

    fn make_service() -> OperationService {
        OperationService::new()
    }

    #[test]
    fn mutations_route_to_items_service() {
        let svc = make_service();
        let msgs = [
            Message::Add {
                item: Item::new(1, 1, "a"),
            },
            Message::Replace {
                item: Item::new(1, 2, "b"),
            },
            Message::Remove { id: 1 },
            Message::Size,
        ];
        for msg in msgs {
            let op = svc.classify(msg, CallerOrigin::Rpc, None).unwrap();
            assert_eq!(op.ctx().service_name, service_names::ITEMS);
        }
    }

    #[test]
    fn lookups_route_to_search_service() {
        let svc = make_service();
        let op = svc
            .classify(
                Message::Lookup {
                    query: Query::new("*", 5),
                },
                CallerOrigin::Rest,
                Some("req-1".to_string()),
            )
            .unwrap();
        assert!(matches!(op, Operation::Lookup { ref query, .. } if query.limit == 5));
        assert_eq!(op.ctx().service_name, service_names::SEARCH);
        assert_eq!(op.ctx().caller_origin, CallerOrigin::Rest);
        assert_eq!(op.ctx().request_id.as_deref(), Some("req-1"));

        let op = svc
            .classify(
                Message::LookupAdvanced {
                    query: AdvancedQuery::default(),
                },
                CallerOrigin::Rpc,
                None,
            )
            .unwrap();
        assert_eq!(op.ctx().service_name, service_names::SEARCH);
    }

    #[test]
    fn responses_are_rejected() {
        let svc = make_service();
        let msgs = [
            Message::Ack { success: true },
            Message::LookupResp {
                result: SearchResult::default(),
            },
            Message::SizeResp { size: 1 },
            Message::error(400, "bad"),
        ];
        for msg in msgs {
            let err = svc.classify(msg, CallerOrigin::Rpc, None).unwrap_err();
            assert!(matches!(err, ClassifyError::ServerToClient { .. }));
        }
    }

    #[test]
    fn call_ids_start_at_one_and_skip_rejected_messages() {
        let svc = make_service();
        let first = svc.classify(Message::Size, CallerOrigin::Rpc, None).unwrap();
        assert_eq!(first.ctx().call_id, 1);

        svc.classify(Message::Ack { success: true }, CallerOrigin::Rpc, None)
            .unwrap_err();
        let second = svc.classify(Message::Size, CallerOrigin::Rest, None).unwrap();
        assert_eq!(second.ctx().call_id, 2);
        assert_eq!(second.ctx().caller_origin, CallerOrigin::Rest);
    }
}
