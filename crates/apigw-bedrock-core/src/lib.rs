//! Resource graph, policy engine and template synthesis for the
//! apigw-bedrock stack.
//!
//! [`Stack::compose`] turns a validated [`StackConfig`] into a resource graph
//! whose topological order drives creation and teardown.
//! [`Stack::synthesize`] renders that graph as a CloudFormation template. The
//! [`runtime`] module carries local models of what the deployed stack does:
//! the front door's policy and routing, the role-guarded capabilities of the
//! function, the bucket lifecycle and the provisioning lifecycle.
//!
//! [`StackConfig`]: apigw_bedrock_config::StackConfig

pub mod arn;
pub mod context;
pub mod error;
pub mod graph;
pub mod naming;
pub mod policy;
pub mod resources;
pub mod runtime;
pub mod stack;
pub mod template;

pub use context::StackContext;
pub use error::{ErrorCode, Result, StackError};
pub use graph::ResourceGraph;
pub use naming::{ResourceNames, STACK_NAME};
pub use stack::Stack;
pub use template::{Template, TemplateFormat};
