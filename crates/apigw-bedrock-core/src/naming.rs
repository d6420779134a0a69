//! Deterministic resource names derived from the stack context.

use crate::context::StackContext;
use crate::error::{Result, StackError};

/// Service segment shared by every resource name.
pub const BASE_NAME: &str = "handson-apigw-bedrock";

/// Logical name of the stack itself.
pub const STACK_NAME: &str = "AwsHandsonApigwBedrockStack";

/// Physical names of the stack's named resources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceNames {
    /// `project.env.handson-apigw-bedrock.account`
    pub bucket: String,
    /// `@role-lambda-project-env-handson-apigw-bedrock`
    pub role: String,
    /// `project-env-handson-apigw-bedrock`
    pub function: String,
    pub rest_api: String,
    /// Matches the rest API name.
    pub log_group: String,
}

impl ResourceNames {
    pub fn derive(context: &StackContext) -> Result<Self> {
        let bucket = [
            context.project.as_str(),
            context.environment.as_str(),
            BASE_NAME,
            context.account.as_str(),
        ]
        .join(".");
        let service = [context.project.as_str(), context.environment.as_str(), BASE_NAME].join("-");
        let role = ["@role", "lambda", service.as_str()].join("-");

        let names = Self {
            bucket,
            role,
            function: service.clone(),
            rest_api: service.clone(),
            log_group: service,
        };
        names.validate()?;
        Ok(names)
    }

    fn validate(&self) -> Result<()> {
        validate_bucket_name(&self.bucket)?;
        validate_role_name(&self.role)?;
        validate_function_name(&self.function)?;
        Ok(())
    }
}

pub fn validate_bucket_name(name: &str) -> Result<()> {
    let invalid = |reason: &str| Err(StackError::invalid_name("bucket", name, reason));

    if name.len() < 3 || name.len() > 63 {
        return invalid("must be 3-63 characters");
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.')
    {
        return invalid("must contain only lowercase letters, numbers, dots, and hyphens");
    }
    let edge_ok = |c: Option<char>| c.is_some_and(|c| c.is_ascii_lowercase() || c.is_ascii_digit());
    if !edge_ok(name.chars().next()) || !edge_ok(name.chars().last()) {
        return invalid("must begin and end with a letter or number");
    }
    if name.contains("..") || name.contains(".-") || name.contains("-.") {
        return invalid("must not contain adjacent dots or dot-hyphen pairs");
    }
    if name.parse::<std::net::Ipv4Addr>().is_ok() {
        return invalid("must not be formatted as an IP address");
    }
    Ok(())
}

pub fn validate_role_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > 64 {
        return Err(StackError::invalid_name(
            "role",
            name,
            "must be 1-64 characters",
        ));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "+=,.@_-".contains(c))
    {
        return Err(StackError::invalid_name(
            "role",
            name,
            "must contain only alphanumerics and +=,.@_-",
        ));
    }
    Ok(())
}

pub fn validate_function_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > 64 {
        return Err(StackError::invalid_name(
            "function",
            name,
            "must be 1-64 characters",
        ));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(StackError::invalid_name(
            "function",
            name,
            "must contain only alphanumerics, hyphens, and underscores",
        ));
    }
    Ok(())
}
