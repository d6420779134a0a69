use anyhow::{Context, Result};
use apigw_bedrock::deploy::{ContextArgs, StackCommand};
use apigw_bedrock_config::StackConfig;
use clap::Parser;
use std::path::PathBuf;

/// Synthesize the API Gateway + Bedrock image generation stack
#[derive(Parser)]
#[command(name = "apigw-bedrock")]
#[command(version)]
#[command(about = "Synthesize the API Gateway + Bedrock image generation stack", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: StackCommand,

    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Log level: trace, debug, info, warn, error
    #[arg(short = 'v', long, value_name = "LEVEL", global = true)]
    log_level: Option<String>,

    #[command(flatten)]
    context: ContextArgs,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Step 1: Layer defaults, config file and environment
    let mut config = match &cli.config {
        Some(path) => StackConfig::load_unvalidated(Some(path))
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => StackConfig::load_unvalidated(None).context("Failed to load configuration")?,
    };

    // Step 2: Apply CLI overrides (highest priority)
    config.apply_context(cli.context.into());
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }

    // Step 3: Initialize tracing before validation so its warnings show up
    apigw_bedrock::init_tracing(&config.logging);

    // Step 4: Validate, compose and run the command
    cli.command.run(config)
}
