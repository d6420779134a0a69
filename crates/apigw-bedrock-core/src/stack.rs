//! Stack composer: builds every component, wires them into the graph and
//! synthesizes the template.

use crate::context::StackContext;
use crate::error::Result;
use crate::graph::ResourceGraph;
use crate::naming::{ResourceNames, STACK_NAME};
use crate::resources::{
    front_door, function, ComputeFunction, ExecutionRole, FrontDoor, LogSink, ResourceNode,
    ResultStore,
};
use crate::runtime::gateway::Gateway;
use crate::template::{Parameter, Template};
use apigw_bedrock_config::StackConfig;
use std::sync::Arc;
use tracing::{debug, info};

const DESCRIPTION: &str = "API Gateway front door for a Bedrock image generation function";

#[derive(Debug, Clone)]
pub struct Stack {
    pub context: StackContext,
    pub names: ResourceNames,
    pub store: ResultStore,
    pub role: ExecutionRole,
    pub function: ComputeFunction,
    pub log_sink: LogSink,
    pub front_door: FrontDoor,
    graph: ResourceGraph,
}

impl Stack {
    pub fn compose(config: &StackConfig) -> Result<Self> {
        Self::from_context(StackContext::from_config(config)?)
    }

    pub fn from_context(context: StackContext) -> Result<Self> {
        let names = ResourceNames::derive(&context)?;

        let store = ResultStore::new(&names.bucket, context.removal);
        let role = ExecutionRole::new(&names.role, &context.account, &names.bucket);
        role.validate()?;
        let function =
            ComputeFunction::new(&names.function, &names.bucket, &context.function_log_level);
        let log_sink = LogSink::new(&names.log_group);
        let front_door = FrontDoor::new(&names.rest_api, context.caller_ip);
        front_door.policy.validate()?;

        let mut nodes: Vec<ResourceNode> = store.nodes();
        nodes.extend([role.to_node(), function.to_node(), log_sink.to_node()]);
        nodes.extend(front_door.nodes());
        for node in &nodes {
            debug!(
                logical_id = %node.logical_id,
                resource_type = node.resource_type,
                component = %node.component,
                "Declared resource"
            );
        }
        let graph = ResourceGraph::new(nodes)?;

        info!(
            stack = STACK_NAME,
            project = %context.project,
            environment = %context.environment,
            resources = graph.len(),
            "Composed stack"
        );

        Ok(Self {
            context,
            names,
            store,
            role,
            function,
            log_sink,
            front_door,
            graph,
        })
    }

    pub fn graph(&self) -> &ResourceGraph {
        &self.graph
    }

    pub fn creation_order(&self) -> Vec<&ResourceNode> {
        self.graph.creation_order()
    }

    pub fn teardown_order(&self) -> Vec<&ResourceNode> {
        self.graph.teardown_order()
    }

    /// Render the graph as a template, resources in creation order.
    pub fn synthesize(&self) -> Result<Template> {
        let mut template = Template::new(DESCRIPTION);
        template.add_parameter(
            function::CODE_BUCKET_PARAMETER,
            Parameter::string(&format!(
                "Bucket holding the packaged code asset from {}",
                self.function.code_path
            )),
        );
        template.add_parameter(
            function::CODE_KEY_PARAMETER,
            Parameter::string("Object key of the packaged code asset"),
        );

        for node in self.graph.creation_order() {
            template.add_resource(node)?;
        }
        for (name, value) in self.front_door.outputs() {
            template.add_output(name, value, None);
        }

        info!(resources = template.resources.len(), "Synthesized template");
        Ok(template)
    }

    /// Local model of the deployed front door.
    pub fn gateway(&self, api_id: &str) -> Gateway {
        Gateway::new(
            &self.front_door,
            &self.context.region,
            &self.context.account,
            api_id,
            Arc::new(crate::runtime::MemoryLogSink::default()),
        )
    }

    pub fn endpoint_url(&self, api_id: &str) -> String {
        self.front_door.endpoint_url(api_id, &self.context.region)
    }

    /// Resource policy with the API's ARN substituted in.
    pub fn resolved_policy(&self, api_id: &str) -> crate::policy::PolicyDocument {
        front_door::expand_shorthand(
            &self.front_door.policy,
            &self.context.region,
            &self.context.account,
            api_id,
        )
    }
}
