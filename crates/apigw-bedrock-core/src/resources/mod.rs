//! Resource declarations for each stack component.
//!
//! Each component builds a typed description of itself (used by the runtime
//! models) and lowers it into one or more [`ResourceNode`]s for the graph and
//! the template.

pub mod auto_delete;
pub mod bucket;
pub mod cors;
pub mod front_door;
pub mod function;
pub mod lifecycle;
pub mod log_sink;
pub mod role;

pub use bucket::ResultStore;
pub use cors::CorsOptions;
pub use front_door::{FrontDoor, Route};
pub use function::ComputeFunction;
pub use lifecycle::{LifecycleRule, ObjectAction, StorageClass};
pub use log_sink::{AccessLogEntry, LogSink};
pub use role::{Capability, ExecutionRole};

use apigw_bedrock_config::RemovalPolicy;
use serde_json::Value;
use std::fmt;

/// Logical ids of every resource in the template.
pub mod ids {
    pub const BUCKET: &str = "BedrockResultBucket";
    pub const BUCKET_POLICY: &str = "BedrockResultBucketPolicy";
    pub const AUTO_DELETE_OBJECTS: &str = "BedrockResultBucketAutoDeleteObjectsCustomResource";
    pub const AUTO_DELETE_PROVIDER_ROLE: &str = "CustomS3AutoDeleteObjectsCustomResourceProviderRole";
    pub const AUTO_DELETE_PROVIDER: &str = "CustomS3AutoDeleteObjectsCustomResourceProviderHandler";
    pub const ROLE: &str = "BedrockLambdaFunctionRole";
    pub const FUNCTION: &str = "BedrockLambdaFunction";
    pub const LOG_GROUP: &str = "LogGroup";
    pub const REST_API: &str = "APIGateway";
    pub const CLOUDWATCH_ROLE: &str = "APIGatewayCloudWatchRole";
    pub const ACCOUNT: &str = "APIGatewayAccount";
    pub const ROOT_OPTIONS: &str = "APIGatewayOPTIONS";
    pub const ROUTE_RESOURCE: &str = "APIGatewaybedrock";
    pub const ROUTE_OPTIONS: &str = "APIGatewaybedrockOPTIONS";
    pub const ROUTE_METHOD: &str = "APIGatewaybedrockPOST";
    pub const ROUTE_PERMISSION: &str = "APIGatewaybedrockPOSTPermission";
    pub const DEPLOYMENT: &str = "APIGatewayDeployment";
    pub const STAGE: &str = "APIGatewayDeploymentStagev1";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Component {
    ResultStore,
    ExecutionRole,
    ComputeFunction,
    AccessLogSink,
    FrontDoor,
    Route,
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Component::ResultStore => "result-store",
            Component::ExecutionRole => "execution-role",
            Component::ComputeFunction => "compute-function",
            Component::AccessLogSink => "access-log-sink",
            Component::FrontDoor => "front-door",
            Component::Route => "route",
        };
        f.write_str(name)
    }
}

/// One declared resource: a vertex of the creation graph.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceNode {
    pub logical_id: String,
    pub component: Component,
    pub resource_type: &'static str,
    pub properties: Value,
    /// Logical ids that must exist before this one.
    pub depends_on: Vec<String>,
    /// Explicit deletion behavior; `None` means the provider default (delete).
    pub deletion: Option<RemovalPolicy>,
}

impl ResourceNode {
    pub fn new(
        logical_id: &str,
        component: Component,
        resource_type: &'static str,
        properties: Value,
    ) -> Self {
        Self {
            logical_id: logical_id.to_string(),
            component,
            resource_type,
            properties,
            depends_on: Vec::new(),
            deletion: None,
        }
    }

    pub fn depends_on<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for id in ids {
            let id = id.into();
            if !self.depends_on.contains(&id) {
                self.depends_on.push(id);
            }
        }
        self
    }

    pub fn deletion(mut self, removal: RemovalPolicy) -> Self {
        self.deletion = Some(removal);
        self
    }

    /// Whether teardown leaves this resource in place.
    pub fn is_retained(&self) -> bool {
        self.deletion == Some(RemovalPolicy::Retain)
    }
}
