//! Operation types flowing through the service pipeline.

use piscola_core::messages::{
    ERROR_CODE_BAD_REQUEST, ERROR_CODE_INTERNAL, ERROR_CODE_OVERLOADED, ERROR_CODE_TIMEOUT,
};
use piscola_core::{AdvancedQuery, Item, ItemId, Message, PatternError, Query, SearchResult};

use crate::storage::StoreError;

/// Names of the domain services operations are routed to.
pub mod service_names {
    /// Mutations and item counts.
    pub const ITEMS: &str = "items";
    /// Pattern and attribute lookups.
    pub const SEARCH: &str = "search";
}

/// Which transport an operation arrived through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallerOrigin {
    /// `MsgPack` RPC endpoint.
    Rpc,
    /// JSON REST endpoints.
    Rest,
}

impl CallerOrigin {
    /// Lowercase name recorded on operation spans.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rpc => "rpc",
            Self::Rest => "rest",
        }
    }
}

/// Context carried with every operation through the pipeline.
#[derive(Debug, Clone)]
pub struct OperationContext {
    /// Unique, monotonically increasing id assigned at classification.
    pub call_id: u64,
    /// Domain service that handles the operation.
    pub service_name: &'static str,
    /// Transport the request arrived through.
    pub caller_origin: CallerOrigin,
    /// `X-Request-Id` of the originating HTTP request, if any.
    pub request_id: Option<String>,
}

impl OperationContext {
    /// Creates a context with no request id.
    #[must_use]
    pub fn new(call_id: u64, service_name: &'static str, caller_origin: CallerOrigin) -> Self {
        Self {
            call_id,
            service_name,
            caller_origin,
            request_id: None,
        }
    }
}

/// Typed operations dispatched through the pipeline.
#[derive(Debug)]
pub enum Operation {
    /// Insert a new item.
    Add { ctx: OperationContext, item: Item },
    /// Insert or overwrite an item.
    Replace { ctx: OperationContext, item: Item },
    /// Remove an item.
    Remove { ctx: OperationContext, id: ItemId },
    /// Count stored items.
    Size { ctx: OperationContext },
    /// Single-pattern lookup.
    Lookup { ctx: OperationContext, query: Query },
    /// Multi-pattern lookup with filters.
    LookupAdvanced {
        ctx: OperationContext,
        query: AdvancedQuery,
    },
}

impl Operation {
    /// The operation's context.
    #[must_use]
    pub fn ctx(&self) -> &OperationContext {
        match self {
            Self::Add { ctx, .. }
            | Self::Replace { ctx, .. }
            | Self::Remove { ctx, .. }
            | Self::Size { ctx }
            | Self::Lookup { ctx, .. }
            | Self::LookupAdvanced { ctx, .. } => ctx,
        }
    }

    /// Short operation name for logs and spans.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Add { .. } => "add",
            Self::Replace { .. } => "replace",
            Self::Remove { .. } => "remove",
            Self::Size { .. } => "size",
            Self::Lookup { .. } => "lookup",
            Self::LookupAdvanced { .. } => "lookup_advanced",
        }
    }
}

/// Successful response from an operation handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationResponse {
    /// Outcome of add, replace or remove.
    Ack { success: bool },
    /// Item count.
    Size { size: u64 },
    /// Lookup result.
    Lookup(SearchResult),
}

impl From<OperationResponse> for Message {
    fn from(resp: OperationResponse) -> Self {
        match resp {
            OperationResponse::Ack { success } => Message::Ack { success },
            OperationResponse::Size { size } => Message::SizeResp { size },
            OperationResponse::Lookup(result) => Message::LookupResp { result },
        }
    }
}

/// Errors returned by operation handlers.
#[derive(Debug, thiserror::Error)]
pub enum OperationError {
    #[error(transparent)]
    InvalidPattern(#[from] PatternError),
    #[error(transparent)]
    UnexpectedMessage(#[from] ClassifyError),
    #[error("unknown service: {name}")]
    UnknownService { name: String },
    #[error("operation {operation} sent to wrong service {service_name}")]
    WrongService {
        operation: &'static str,
        service_name: &'static str,
    },
    #[error("operation timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    #[error("server overloaded, try again later")]
    Overloaded,
    #[error("fatal store fault: {0}")]
    Fatal(#[source] StoreError),
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for OperationError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InvalidPattern(e) => Self::InvalidPattern(e),
            fatal @ StoreError::IndexCorrupted { .. } => Self::Fatal(fatal),
        }
    }
}

impl OperationError {
    /// Wire error code (HTTP status semantics).
    #[must_use]
    pub fn code(&self) -> u32 {
        match self {
            Self::InvalidPattern(_) | Self::UnexpectedMessage(_) => ERROR_CODE_BAD_REQUEST,
            Self::Overloaded => ERROR_CODE_OVERLOADED,
            Self::Timeout { .. } => ERROR_CODE_TIMEOUT,
            Self::UnknownService { .. }
            | Self::WrongService { .. }
            | Self::Fatal(_)
            | Self::Internal(_) => ERROR_CODE_INTERNAL,
        }
    }

    /// Returns `true` when the server must stop serving.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }

    /// Converts the error into an `ERROR` message.
    #[must_use]
    pub fn to_message(&self) -> Message {
        Message::error(self.code(), self.to_string())
    }
}

/// Errors from classifying a `Message` into an `Operation`.
#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    #[error("server-to-client message cannot be classified as an operation: {variant}")]
    ServerToClient { variant: &'static str },
}

#[cfg(test)]
mod tests {
    use piscola_core::GlobPattern;

    use super::*;

    #[test]
    fn ctx_accessor_covers_every_variant() {
        let ops = [
            Operation::Add {
                ctx: OperationContext::new(1, service_names::ITEMS, CallerOrigin::Rpc),
                item: Item::new(1, 1, "a"),
            },
            Operation::Replace {
                ctx: OperationContext::new(2, service_names::ITEMS, CallerOrigin::Rpc),
                item: Item::new(1, 1, "a"),
            },
            Operation::Remove {
                ctx: OperationContext::new(3, service_names::ITEMS, CallerOrigin::Rpc),
                id: 1,
            },
            Operation::Size {
                ctx: OperationContext::new(4, service_names::ITEMS, CallerOrigin::Rpc),
            },
            Operation::Lookup {
                ctx: OperationContext::new(5, service_names::SEARCH, CallerOrigin::Rpc),
                query: Query::new("*", 1),
            },
            Operation::LookupAdvanced {
                ctx: OperationContext::new(6, service_names::SEARCH, CallerOrigin::Rpc),
                query: AdvancedQuery::default(),
            },
        ];
        let ids: Vec<u64> = ops.iter().map(|op| op.ctx().call_id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(ops[5].name(), "lookup_advanced");
    }

    #[test]
    fn store_errors_split_into_client_and_fatal() {
        let pattern_err = GlobPattern::compile("[").unwrap_err();
        let err = OperationError::from(StoreError::InvalidPattern(pattern_err));
        assert_eq!(err.code(), 400);
        assert!(!err.is_fatal());

        let err = OperationError::from(StoreError::IndexCorrupted { id: 1, time: 2 });
        assert_eq!(err.code(), 500);
        assert!(err.is_fatal());
        assert!(err.to_string().contains("item 1 missing from time bucket 2"));
    }

    #[test]
    fn error_codes() {
        assert_eq!(OperationError::Overloaded.code(), 503);
        assert_eq!(OperationError::Timeout { timeout_ms: 5 }.code(), 504);
        let classify = OperationError::from(ClassifyError::ServerToClient { variant: "Ack" });
        assert_eq!(classify.code(), 400);
    }

    #[test]
    fn error_to_message() {
        let Message::Error { payload } = OperationError::Overloaded.to_message() else {
            panic!("expected ERROR");
        };
        assert_eq!(payload.code, 503);
        assert_eq!(payload.message, "server overloaded, try again later");
    }

    #[test]
    fn response_into_message() {
        let msg: Message = OperationResponse::Lookup(SearchResult {
            ids: vec![3, 1],
            total: 2,
        })
        .into();
        assert_eq!(
            msg,
            Message::LookupResp {
                result: SearchResult { ids: vec![3, 1], total: 2 }
            }
        );
        assert_eq!(
            Message::from(OperationResponse::Size { size: 4 }),
            Message::SizeResp { size: 4 }
        );
    }
}
