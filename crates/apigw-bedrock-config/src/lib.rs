// apigw-bedrock-config - Stack configuration passed once at process start
//
// Supports configuration from multiple sources:
// 1. CLI context flags (highest priority, applied by the binary)
// 2. Environment variables (APIGW_BEDROCK_* plus CDK_DEFAULT_ACCOUNT)
// 3. Config file path from APIGW_BEDROCK_CONFIG env var
// 4. Config file contents from APIGW_BEDROCK_CONFIG_CONTENT env var
// 5. Default config file location (./apigw-bedrock.toml)
// 6. Built-in defaults (lowest priority)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

mod env_overrides;
mod sources;
mod validation;

pub use env_overrides::{EnvSource, ENV_PREFIX};

/// Region every deployment is pinned to, regardless of the ambient default.
pub const PINNED_REGION: &str = "us-east-1";

/// Stack configuration: the three context values plus the two ambient values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackConfig {
    #[serde(default)]
    pub project: String,

    #[serde(default, alias = "env")]
    pub environment: String,

    /// The single public address allowed through the front door
    #[serde(default, alias = "myip")]
    pub caller_ip: String,

    #[serde(default)]
    pub account: String,

    #[serde(default = "default_region")]
    pub region: String,

    #[serde(default)]
    pub removal: RemovalPolicy,

    /// Value of the function's LOG_LEVEL environment variable
    #[serde(default = "default_function_log_level")]
    pub function_log_level: String,

    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_region() -> String {
    PINNED_REGION.to_string()
}

fn default_function_log_level() -> String {
    "INFO".to_string()
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            project: String::new(),
            environment: String::new(),
            caller_ip: String::new(),
            account: String::new(),
            region: default_region(),
            removal: RemovalPolicy::default(),
            function_log_level: default_function_log_level(),
            logging: LoggingConfig::default(),
        }
    }
}

/// What happens to stateful resources when the stack is torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemovalPolicy {
    /// Delete the resource, emptying the bucket first.
    #[default]
    Destroy,
    /// Leave the resource and its contents in the account.
    Retain,
}

impl std::fmt::Display for RemovalPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RemovalPolicy::Destroy => write!(f, "destroy"),
            RemovalPolicy::Retain => write!(f, "retain"),
        }
    }
}

impl std::str::FromStr for RemovalPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "destroy" | "delete" => Ok(RemovalPolicy::Destroy),
            "retain" | "keep" => Ok(RemovalPolicy::Retain),
            _ => anyhow::bail!("Unsupported removal policy: {}. Supported: destroy, retain", s),
        }
    }
}

/// Logging configuration for the synthesizer process itself
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

/// Context values supplied on the command line; `None` leaves the layered value alone.
#[derive(Debug, Clone, Default)]
pub struct ContextOverrides {
    pub project: Option<String>,
    pub environment: Option<String>,
    pub caller_ip: Option<String>,
    pub account: Option<String>,
}

impl StackConfig {
    /// Load configuration from defaults, config files and the process environment.
    pub fn load() -> Result<Self> {
        sources::load_config()
    }

    /// Load configuration from a specific file path (for CLI usage).
    pub fn load_from_path(path: impl AsRef<std::path::Path>) -> Result<Self> {
        sources::load_from_file_path(path)
    }

    /// Load without validating, so missing context values can still be supplied
    /// by CLI flags or prompts before `validate` runs.
    pub fn load_unvalidated(path: Option<&std::path::Path>) -> Result<Self> {
        sources::load_unvalidated(path)
    }

    /// Build a configuration from inline TOML plus an injected environment.
    pub fn load_with_env<E: EnvSource>(inline_config: Option<&str>, env: &E) -> Result<Self> {
        let mut config = StackConfig::default();

        if let Some(inline) = inline_config {
            let file_config: StackConfig =
                toml::from_str(inline).context("Failed to parse inline config content")?;
            config.merge(file_config);
        }

        config.apply_env_overrides_from(env)?;
        config.validate()?;
        Ok(config)
    }

    /// Merge another config into this one (used for TOML layering).
    /// Empty strings in `other` never clear a value already set.
    pub fn merge(&mut self, other: StackConfig) {
        merge_string(&mut self.project, other.project);
        merge_string(&mut self.environment, other.environment);
        merge_string(&mut self.caller_ip, other.caller_ip);
        merge_string(&mut self.account, other.account);
        merge_string(&mut self.region, other.region);
        merge_string(&mut self.function_log_level, other.function_log_level);
        self.removal = other.removal;
        self.logging = other.logging;
    }

    /// Apply environment overrides from a custom source.
    pub fn apply_env_overrides_from<E: EnvSource>(&mut self, env: &E) -> Result<()> {
        env_overrides::apply_env_overrides(self, env)
    }

    /// Apply CLI context flags (highest priority).
    pub fn apply_context(&mut self, overrides: ContextOverrides) {
        if let Some(project) = overrides.project {
            self.project = project;
        }
        if let Some(environment) = overrides.environment {
            self.environment = environment;
        }
        if let Some(caller_ip) = overrides.caller_ip {
            self.caller_ip = caller_ip;
        }
        if let Some(account) = overrides.account {
            self.account = account;
        }
    }

    /// Names of required context values that are still unset.
    pub fn missing_context(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.project.trim().is_empty() {
            missing.push("project");
        }
        if self.environment.trim().is_empty() {
            missing.push("env");
        }
        if self.caller_ip.trim().is_empty() {
            missing.push("myip");
        }
        if self.account.trim().is_empty() {
            missing.push("account");
        }
        missing
    }

    /// Parsed caller address. Call after `validate`.
    pub fn caller_ip_addr(&self) -> Result<IpAddr> {
        self.caller_ip
            .trim()
            .parse::<IpAddr>()
            .with_context(|| format!("myip '{}' is not a valid IP address", self.caller_ip))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }
}

fn merge_string(target: &mut String, value: String) {
    if !value.trim().is_empty() {
        *target = value;
    }
}
