// Configuration source loading.
//
// Priority order:
// 1. Environment variables (APIGW_BEDROCK_* prefix, CDK_DEFAULT_ACCOUNT)
// 2. Config file path from APIGW_BEDROCK_CONFIG
// 3. Inline config content from APIGW_BEDROCK_CONFIG_CONTENT
// 4. Default config file (./apigw-bedrock.toml)
// 5. Built-in defaults

use crate::env_overrides::{self, EnvSource, ENV_PREFIX};
use crate::StackConfig;
use anyhow::{Context, Result};
use std::env;
use std::path::Path;

const DEFAULT_CONFIG_FILE: &str = "./apigw-bedrock.toml";

/// Load configuration using the process environment and default file locations.
pub fn load_config() -> Result<StackConfig> {
    let config = load_unvalidated(None)?;
    config.validate()?;
    Ok(config)
}

/// Load configuration from a specific file path (for CLI --config flag).
/// Returns error if file doesn't exist or can't be parsed.
pub fn load_from_file_path(path: impl AsRef<Path>) -> Result<StackConfig> {
    let config = load_unvalidated(Some(path.as_ref()))?;
    config.validate()?;
    Ok(config)
}

/// Layer defaults, file and environment without validating.
pub fn load_unvalidated(path: Option<&Path>) -> Result<StackConfig> {
    let mut config = StackConfig::default();

    let file_config = match path {
        Some(path) => Some(read_config_file(path)?),
        None => load_from_default_sources()?,
    };
    if let Some(file_config) = file_config {
        config.merge(file_config);
    }

    env_overrides::apply_env_overrides(&mut config, &StdEnvSource)?;
    Ok(config)
}

fn load_from_default_sources() -> Result<Option<StackConfig>> {
    if let Ok(path) = env::var(format!("{}CONFIG", ENV_PREFIX)) {
        return read_config_file(Path::new(&path)).map(Some);
    }

    if let Ok(content) = env::var(format!("{}CONFIG_CONTENT", ENV_PREFIX)) {
        let config: StackConfig = toml::from_str(&content)
            .context("Failed to parse inline config from APIGW_BEDROCK_CONFIG_CONTENT")?;
        return Ok(Some(config));
    }

    let default_path = Path::new(DEFAULT_CONFIG_FILE);
    if default_path.exists() {
        return read_config_file(default_path).map(Some);
    }

    Ok(None)
}

fn read_config_file(path: &Path) -> Result<StackConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

struct StdEnvSource;

impl EnvSource for StdEnvSource {
    fn get(&self, key: &str) -> Option<String> {
        env::var(format!("{}{}", ENV_PREFIX, key)).ok()
    }

    fn get_raw(&self, key: &str) -> Option<String> {
        env::var(key).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn reads_explicit_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "project = \"acme\"\nenv = \"dev\"\nmyip = \"203.0.113.5\"\naccount = \"123456789012\""
        )
        .unwrap();

        let config = read_config_file(file.path()).unwrap();
        assert_eq!(config.project, "acme");
        assert_eq!(config.environment, "dev");
        assert_eq!(config.caller_ip, "203.0.113.5");
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = read_config_file(Path::new("/nonexistent/apigw-bedrock.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
