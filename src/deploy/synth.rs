//! Deployment template synthesizer

use anyhow::{bail, Context, Result};
use apigw_bedrock_config::StackConfig;
use apigw_bedrock_core::resources::function::{CODE_BUCKET_PARAMETER, CODE_KEY_PARAMETER};
use apigw_bedrock_core::{TemplateFormat, STACK_NAME};
use clap::Args;
use dialoguer::{Confirm, Input};
use std::fs;
use std::io::IsTerminal;
use std::net::IpAddr;
use std::path::PathBuf;
use tracing::info;

#[derive(Args)]
pub struct SynthArgs {
    /// Template format: yaml or json
    #[arg(long, default_value = "yaml")]
    pub format: TemplateFormat,

    /// Write the template to this file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Overwrite existing file without asking
    #[arg(long)]
    pub force: bool,

    /// Never prompt for missing context values
    #[arg(long)]
    pub no_input: bool,
}

pub fn run(args: SynthArgs, mut config: StackConfig) -> Result<()> {
    if !config.missing_context().is_empty() && !args.no_input && std::io::stdin().is_terminal() {
        prompt_missing_context(&mut config)?;
    }

    let stack = super::compose(&config)?;
    let rendered = stack.synthesize()?.render(args.format)?;

    let Some(output_path) = args.output else {
        print!("{}", rendered);
        return Ok(());
    };

    if output_path.exists() && !args.force {
        if !std::io::stdin().is_terminal() {
            bail!(
                "{} already exists. Pass --force to overwrite.",
                output_path.display()
            );
        }
        let overwrite = Confirm::new()
            .with_prompt(format!("{} already exists. Overwrite?", output_path.display()))
            .default(false)
            .interact()?;
        if !overwrite {
            println!("Aborted.");
            return Ok(());
        }
    }

    fs::write(&output_path, &rendered)
        .with_context(|| format!("Failed to write {}", output_path.display()))?;
    info!(path = %output_path.display(), format = %args.format, "Wrote template");

    println!();
    println!("Created {}", output_path.display());
    println!();
    println!("Next steps:");
    println!("  1. Upload the function package to a code bucket");
    println!("  2. Deploy:");
    println!("     aws cloudformation deploy \\");
    println!("       --template-file {} \\", output_path.display());
    println!("       --stack-name {} \\", STACK_NAME);
    println!("       --capabilities CAPABILITY_NAMED_IAM \\");
    println!(
        "       --parameter-overrides {}=<code-bucket> {}=<code-key>",
        CODE_BUCKET_PARAMETER, CODE_KEY_PARAMETER
    );
    println!();
    println!("Only {} can call the API once deployed.", config.caller_ip);
    println!();

    Ok(())
}

fn prompt_missing_context(config: &mut StackConfig) -> Result<()> {
    for field in config.missing_context() {
        match field {
            "project" => {
                config.project = Input::new()
                    .with_prompt("Project name")
                    .validate_with(validate_name_part)
                    .interact_text()?
            }
            "env" => {
                config.environment = Input::new()
                    .with_prompt("Environment")
                    .default("dev".to_string())
                    .validate_with(validate_name_part)
                    .interact_text()?
            }
            "myip" => {
                config.caller_ip = Input::new()
                    .with_prompt("Your public IP address")
                    .validate_with(validate_ip)
                    .interact_text()?
            }
            "account" => {
                config.account = Input::new()
                    .with_prompt("AWS account id")
                    .validate_with(validate_account)
                    .interact_text()?
            }
            _ => {}
        }
    }
    Ok(())
}

#[allow(clippy::ptr_arg)]
fn validate_name_part(input: &String) -> Result<(), String> {
    if input.is_empty() {
        return Err("Value cannot be empty".to_string());
    }
    if !input
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err("Use only lowercase letters, numbers, and hyphens".to_string());
    }
    if input.starts_with('-') || input.ends_with('-') {
        return Err("Cannot start or end with a hyphen".to_string());
    }
    Ok(())
}

#[allow(clippy::ptr_arg)]
fn validate_ip(input: &String) -> Result<(), String> {
    input
        .trim()
        .parse::<IpAddr>()
        .map(|_| ())
        .map_err(|_| format!("'{}' is not an IPv4 or IPv6 address", input))
}

#[allow(clippy::ptr_arg)]
fn validate_account(input: &String) -> Result<(), String> {
    if input.len() != 12 || !input.chars().all(|c| c.is_ascii_digit()) {
        return Err("Account id must be 12 digits".to_string());
    }
    Ok(())
}
