// Configuration validation
//
// Validates that the context values are present and usable in resource names

use crate::{RemovalPolicy, StackConfig, PINNED_REGION};
use anyhow::{bail, Result};
use std::net::IpAddr;
use tracing::warn;

const FUNCTION_LOG_LEVELS: &[&str] = &["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"];

pub fn validate_config(config: &StackConfig) -> Result<()> {
    let missing = config.missing_context();
    if !missing.is_empty() {
        bail!(
            "missing context values: {} (pass --{} or set {}{})",
            missing.join(", "),
            missing[0],
            crate::ENV_PREFIX,
            missing[0].to_uppercase()
        );
    }

    validate_name_part("project", &config.project)?;
    validate_name_part("env", &config.environment)?;
    validate_caller_ip(&config.caller_ip)?;
    validate_account(&config.account)?;
    validate_region(&config.region)?;
    validate_function_log_level(&config.function_log_level)?;

    if config.removal == RemovalPolicy::Destroy {
        warn!(
            project = %config.project,
            env = %config.environment,
            "result bucket and its objects will be deleted on stack teardown"
        );
    }

    Ok(())
}

/// Project and environment end up in the bucket name, which only allows
/// lowercase letters, digits, hyphens and dots.
fn validate_name_part(field: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        bail!("{} must not be empty", field);
    }
    if !value
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        bail!(
            "{} '{}' must contain only lowercase letters, numbers, and hyphens",
            field,
            value
        );
    }
    if value.starts_with('-') || value.ends_with('-') {
        bail!("{} '{}' cannot start or end with a hyphen", field, value);
    }
    Ok(())
}

fn validate_caller_ip(value: &str) -> Result<()> {
    if value.trim().parse::<IpAddr>().is_err() {
        bail!("myip '{}' is not a valid IPv4 or IPv6 address", value);
    }
    Ok(())
}

fn validate_account(value: &str) -> Result<()> {
    if value.len() != 12 || !value.chars().all(|c| c.is_ascii_digit()) {
        bail!("account '{}' must be a 12-digit AWS account id", value);
    }
    Ok(())
}

fn validate_region(value: &str) -> Result<()> {
    if value.trim().is_empty() {
        bail!("region must not be empty");
    }
    if value != PINNED_REGION {
        bail!(
            "region '{}' is not supported; the stack is pinned to {}",
            value,
            PINNED_REGION
        );
    }
    Ok(())
}

fn validate_function_log_level(value: &str) -> Result<()> {
    if !FUNCTION_LOG_LEVELS.contains(&value) {
        bail!(
            "function_log_level '{}' must be one of {}",
            value,
            FUNCTION_LOG_LEVELS.join(", ")
        );
    }
    Ok(())
}
