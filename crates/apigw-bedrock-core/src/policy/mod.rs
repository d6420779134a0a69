//! IAM-style policy documents.
//!
//! Documents serialize to the JSON shape CloudFormation and API Gateway accept
//! and can be evaluated locally against a [`RequestContext`] with
//! [`evaluate`]: every matching statement is considered, an explicit deny wins
//! over any allow, and a request no statement allows is implicitly denied.

mod evaluate;
mod matcher;

pub use evaluate::{evaluate, CallerPrincipal, Decision, RequestContext};
pub use matcher::{wildcard_match, IpRange};

use crate::error::{Result, StackError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const POLICY_VERSION: &str = "2012-10-17";

/// Condition key carrying the caller's source address.
pub const SOURCE_IP_KEY: &str = "aws:SourceIp";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyDocument {
    pub version: String,
    pub statement: Vec<Statement>,
}

impl PolicyDocument {
    pub fn new(statement: Vec<Statement>) -> Self {
        Self {
            version: POLICY_VERSION.to_string(),
            statement,
        }
    }

    /// Reject documents the provider would refuse at deploy time.
    pub fn validate(&self) -> Result<()> {
        if self.statement.is_empty() {
            return Err(invalid("document has no statements"));
        }
        for (idx, statement) in self.statement.iter().enumerate() {
            if statement.action.is_empty() {
                return Err(invalid(&format!("statement {} has no actions", idx)));
            }
            for action in &statement.action {
                if action != "*" && !action.contains(':') {
                    return Err(invalid(&format!(
                        "statement {} action '{}' is not service:action",
                        idx, action
                    )));
                }
            }
            for (operator, keys) in &statement.condition {
                if operator.is_ip_operator() {
                    for values in keys.values() {
                        for value in values {
                            IpRange::parse(value).map_err(|e| {
                                invalid(&format!("statement {} condition: {}", idx, e))
                            })?;
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

fn invalid(reason: &str) -> StackError {
    StackError::InvalidPolicy {
        reason: reason.to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    Allow,
    Deny,
}

/// Statement principal. Serializes as `{"AWS": "*"}` or `{"Service": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Principal {
    #[serde(rename = "AWS")]
    Aws(String),
    Service(String),
}

impl Principal {
    pub fn any() -> Self {
        Principal::Aws("*".to_string())
    }

    pub fn service(name: &str) -> Self {
        Principal::Service(name.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ConditionOperator {
    IpAddress,
    NotIpAddress,
    StringEquals,
    StringNotEquals,
    StringLike,
    ArnLike,
}

impl ConditionOperator {
    pub fn is_ip_operator(&self) -> bool {
        matches!(self, Self::IpAddress | Self::NotIpAddress)
    }

    /// Negated operators are satisfied when the key is absent from the request.
    pub fn is_negated(&self) -> bool {
        matches!(self, Self::NotIpAddress | Self::StringNotEquals)
    }
}

/// `operator -> condition key -> values`
pub type Conditions = BTreeMap<ConditionOperator, BTreeMap<String, Vec<String>>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Statement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,

    pub effect: Effect,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal: Option<Principal>,

    pub action: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resource: Vec<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub condition: Conditions,
}

impl Statement {
    pub fn allow() -> Self {
        Self::with_effect(Effect::Allow)
    }

    pub fn deny() -> Self {
        Self::with_effect(Effect::Deny)
    }

    fn with_effect(effect: Effect) -> Self {
        Self {
            sid: None,
            effect,
            principal: None,
            action: Vec::new(),
            resource: Vec::new(),
            condition: Conditions::new(),
        }
    }

    pub fn sid(mut self, sid: &str) -> Self {
        self.sid = Some(sid.to_string());
        self
    }

    pub fn principal(mut self, principal: Principal) -> Self {
        self.principal = Some(principal);
        self
    }

    pub fn actions<I, S>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.action.extend(actions.into_iter().map(Into::into));
        self
    }

    pub fn resources<I, S>(mut self, resources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.resource.extend(resources.into_iter().map(Into::into));
        self
    }

    pub fn condition<I, S>(mut self, operator: ConditionOperator, key: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.condition
            .entry(operator)
            .or_default()
            .entry(key.to_string())
            .or_default()
            .extend(values.into_iter().map(Into::into));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_serializes_to_iam_json() {
        let doc = PolicyDocument::new(vec![Statement::deny()
            .principal(Principal::any())
            .actions(["execute-api:Invoke"])
            .resources(["execute-api:/*/*/*"])
            .condition(
                ConditionOperator::NotIpAddress,
                SOURCE_IP_KEY,
                ["203.0.113.5"],
            )]);

        assert_eq!(
            serde_json::to_value(&doc).unwrap(),
            json!({
                "Version": "2012-10-17",
                "Statement": [{
                    "Effect": "Deny",
                    "Principal": {"AWS": "*"},
                    "Action": ["execute-api:Invoke"],
                    "Resource": ["execute-api:/*/*/*"],
                    "Condition": {"NotIpAddress": {"aws:SourceIp": ["203.0.113.5"]}}
                }]
            })
        );
    }

    #[test]
    fn test_service_principal_shape() {
        let value = serde_json::to_value(Principal::service("lambda.amazonaws.com")).unwrap();
        assert_eq!(value, json!({"Service": "lambda.amazonaws.com"}));
    }

    #[test]
    fn test_validate_rejects_malformed_documents() {
        assert!(PolicyDocument::new(vec![]).validate().is_err());
        assert!(PolicyDocument::new(vec![Statement::allow().resources(["*"])])
            .validate()
            .is_err());
        assert!(
            PolicyDocument::new(vec![Statement::allow().actions(["InvokeModel"])])
                .validate()
                .is_err()
        );
        let bad_ip = Statement::deny().actions(["execute-api:Invoke"]).condition(
            ConditionOperator::NotIpAddress,
            SOURCE_IP_KEY,
            ["my-laptop"],
        );
        assert!(PolicyDocument::new(vec![bad_ip]).validate().is_err());
    }
}
