//! Operation routing and execution framework.
//!
//! This module implements the service-oriented operation pipeline:
//!
//! 1. **Classification** (`classify`): `Message` -> `Result<Operation, ClassifyError>`
//! 2. **Pipeline** (`pipeline`): concurrency limit with load shedding, plus a per-call timeout
//! 3. **Routing** (`router`): Dispatch to domain services by `service_name`
//! 4. **Domain services** (`domain`): item mutations and searches over the store

pub mod classify;
pub mod config;
pub mod domain;
pub mod operation;
pub mod pipeline;
pub mod registry;
pub mod router;

pub use classify::OperationService;
pub use config::ServerConfig;
pub use domain::{register_domain_services, ItemService, SearchService};
pub use operation::{
    service_names, CallerOrigin, ClassifyError, Operation, OperationContext, OperationError,
    OperationResponse,
};
pub use pipeline::{build_operation_pipeline, OperationPipeline};
pub use registry::{ManagedService, ServiceContext, ServiceRegistry};
pub use router::OperationRouter;
