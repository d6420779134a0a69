//! Stack commands - synthesize the template, show the plan, check access

mod check_ip;
mod plan;
mod synth;

use anyhow::{Context, Result};
use apigw_bedrock_config::{ContextOverrides, StackConfig};
use apigw_bedrock_core::Stack;
use clap::{Args, Subcommand};

pub use check_ip::CheckIpArgs;
pub use synth::SynthArgs;

#[derive(Subcommand)]
pub enum StackCommand {
    /// Write the deployment template for the stack
    Synth(SynthArgs),
    /// Print resource creation and teardown order
    Plan,
    /// Evaluate the front door policy for a source address
    CheckIp(CheckIpArgs),
}

impl StackCommand {
    pub fn run(self, config: StackConfig) -> Result<()> {
        match self {
            StackCommand::Synth(args) => synth::run(args, config),
            StackCommand::Plan => plan::run(config),
            StackCommand::CheckIp(args) => check_ip::run(args, config),
        }
    }
}

/// Context values accepted on the command line
#[derive(Args, Debug, Default, Clone)]
pub struct ContextArgs {
    /// Project name used as the first part of every resource name
    #[arg(long, global = true)]
    pub project: Option<String>,

    /// Environment name (e.g., dev, prod)
    #[arg(long = "env", value_name = "ENV", global = true)]
    pub environment: Option<String>,

    /// The only source address allowed to call the API
    #[arg(long = "myip", value_name = "IP", global = true)]
    pub caller_ip: Option<String>,

    /// AWS account id the stack deploys into
    #[arg(long, global = true)]
    pub account: Option<String>,
}

impl From<ContextArgs> for ContextOverrides {
    fn from(args: ContextArgs) -> Self {
        ContextOverrides {
            project: args.project,
            environment: args.environment,
            caller_ip: args.caller_ip,
            account: args.account,
        }
    }
}

/// Validate the resolved configuration and compose the stack from it.
pub(crate) fn compose(config: &StackConfig) -> Result<Stack> {
    config.validate()?;
    Stack::compose(config).context("Failed to compose stack")
}
