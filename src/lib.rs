//! apigw-bedrock - compose, synthesize and dry-run the API Gateway front door
//! for a Bedrock image generation function.
//!
//! The binary layers configuration (defaults, TOML, environment, CLI flags),
//! initializes tracing and hands the resolved config to one of the
//! [`deploy::StackCommand`] subcommands.

mod init;

pub mod deploy;

pub use init::init_tracing;
