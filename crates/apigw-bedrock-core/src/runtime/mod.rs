//! Executable models of the deployed stack's runtime contracts.

pub mod capability;
pub mod gateway;
pub mod object_store;
pub mod provisioning;

pub use capability::{
    AuthorizedModelInvoker, AuthorizedObjectStore, FunctionContext, FunctionEnvironment,
    ModelInvoker, ObjectStore,
};
pub use gateway::{
    split_stage, AccessLogSink, Gateway, HttpRequest, MemoryLogSink, ProxyEvent, ProxyHandler,
    ProxyResponse,
};
pub use object_store::{Clock, LifecycleReport, ManualClock, MemoryObjectStore, SystemClock};
pub use provisioning::{Deployment, ResourceState, TeardownReport};
