use super::{LogFormat, RemovalPolicy, StackConfig};
use anyhow::{Context, Result};
use tracing::debug;

pub const ENV_PREFIX: &str = "APIGW_BEDROCK_";

/// Abstraction over environment-variable lookups so tests can supply
/// their own source of overrides.
pub trait EnvSource {
    fn get(&self, key: &str) -> Option<String>;

    /// Get an environment variable WITHOUT the APIGW_BEDROCK_ prefix
    /// Used for the CDK ambient variables (CDK_DEFAULT_ACCOUNT)
    fn get_raw(&self, key: &str) -> Option<String>;
}

/// Apply environment-variable overrides to the stack config.
pub fn apply_env_overrides<E: EnvSource>(config: &mut StackConfig, env: &E) -> Result<()> {
    // Ambient account first so an explicit APIGW_BEDROCK_ACCOUNT wins over it
    if let Some(account) = get_raw_env_string(env, "CDK_DEFAULT_ACCOUNT") {
        config.account = account;
    }
    if let Some(region) = get_raw_env_string(env, "CDK_DEFAULT_REGION") {
        debug!(
            ambient_region = %region,
            pinned_region = %config.region,
            "ignoring CDK_DEFAULT_REGION; stack region is pinned"
        );
    }

    // Context values
    if let Some(project) = get_env_string(env, "PROJECT") {
        config.project = project;
    }
    if let Some(environment) = get_env_string(env, "ENV") {
        config.environment = environment;
    }
    if let Some(caller_ip) = get_env_string(env, "MYIP") {
        config.caller_ip = caller_ip;
    }
    if let Some(account) = get_env_string(env, "ACCOUNT") {
        config.account = account;
    }
    if let Some(region) = get_env_string(env, "REGION") {
        config.region = region;
    }

    if let Some(removal) = get_env_string(env, "REMOVAL") {
        config.removal = removal
            .parse::<RemovalPolicy>()
            .context("Invalid APIGW_BEDROCK_REMOVAL value")?;
    }
    if let Some(level) = get_env_string(env, "FUNCTION_LOG_LEVEL") {
        config.function_log_level = level.to_uppercase();
    }

    // Synthesizer logging
    if let Some(level) = get_env_string(env, "LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(format) = get_env_string(env, "LOG_FORMAT") {
        config.logging.format = match format.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Text,
        };
    }

    Ok(())
}

fn get_env_string<E: EnvSource>(env: &E, key: &str) -> Option<String> {
    env.get(key).filter(|value| !value.trim().is_empty())
}

fn get_raw_env_string<E: EnvSource>(env: &E, key: &str) -> Option<String> {
    env.get_raw(key).filter(|value| !value.trim().is_empty())
}
