//! Typed view of the stack configuration used during composition.

use crate::error::{Result, StackError};
use apigw_bedrock_config::{RemovalPolicy, StackConfig};
use std::net::IpAddr;

/// Context values resolved once at process start and passed to the composer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackContext {
    pub project: String,
    pub environment: String,
    pub caller_ip: IpAddr,
    pub account: String,
    pub region: String,
    pub removal: RemovalPolicy,
    pub function_log_level: String,
}

impl StackContext {
    pub fn from_config(config: &StackConfig) -> Result<Self> {
        let required = |field: &'static str, value: &str| -> Result<String> {
            let value = value.trim();
            if value.is_empty() {
                return Err(StackError::invalid_context(field, "value is required"));
            }
            Ok(value.to_string())
        };

        let caller_ip = required("myip", &config.caller_ip)?
            .parse::<IpAddr>()
            .map_err(|e| StackError::invalid_context("myip", e.to_string()))?;

        Ok(Self {
            project: required("project", &config.project)?,
            environment: required("env", &config.environment)?,
            caller_ip,
            account: required("account", &config.account)?,
            region: required("region", &config.region)?,
            removal: config.removal,
            function_log_level: required("function_log_level", &config.function_log_level)?,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn acme_dev() -> StackContext {
        StackContext {
            project: "acme".to_string(),
            environment: "dev".to_string(),
            caller_ip: "203.0.113.5".parse().unwrap(),
            account: "123456789012".to_string(),
            region: "us-east-1".to_string(),
            removal: RemovalPolicy::Destroy,
            function_log_level: "INFO".to_string(),
        }
    }

    #[test]
    fn test_from_config() {
        let config = StackConfig {
            project: "acme".to_string(),
            environment: "dev".to_string(),
            caller_ip: " 203.0.113.5 ".to_string(),
            account: "123456789012".to_string(),
            ..StackConfig::default()
        };
        assert_eq!(StackContext::from_config(&config).unwrap(), acme_dev());
    }

    #[test]
    fn test_missing_caller_ip() {
        let config = StackConfig {
            project: "acme".to_string(),
            environment: "dev".to_string(),
            account: "123456789012".to_string(),
            ..StackConfig::default()
        };
        let err = StackContext::from_config(&config).unwrap_err();
        assert!(matches!(err, StackError::InvalidContext { field: "myip", .. }));
    }

    #[test]
    fn test_bad_caller_ip() {
        let config = StackConfig {
            project: "acme".to_string(),
            environment: "dev".to_string(),
            caller_ip: "not-an-ip".to_string(),
            account: "123456789012".to_string(),
            ..StackConfig::default()
        };
        assert!(StackContext::from_config(&config).is_err());
    }
}
