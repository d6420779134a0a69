// Combined-statement policy evaluation.
//
// Every statement whose principal, action, resource and conditions match the
// request is collected. Any matching Deny wins; otherwise any matching Allow
// allows; otherwise the request is implicitly denied.

use super::matcher::{wildcard_match, IpRange};
use super::{ConditionOperator, Conditions, Effect, PolicyDocument, Principal, Statement, SOURCE_IP_KEY};
use std::collections::BTreeMap;
use std::net::IpAddr;

/// Who is making the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallerPrincipal {
    /// Unauthenticated caller of a public endpoint.
    Anonymous,
    /// An AWS service such as `lambda.amazonaws.com`.
    Service(String),
    /// An IAM identity ARN.
    Aws(String),
}

impl std::fmt::Display for CallerPrincipal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallerPrincipal::Anonymous => write!(f, "anonymous"),
            CallerPrincipal::Service(name) => write!(f, "{}", name),
            CallerPrincipal::Aws(arn) => write!(f, "{}", arn),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RequestContext {
    pub principal: CallerPrincipal,
    pub action: String,
    pub resource: String,
    pub source_ip: Option<IpAddr>,
    /// Additional string condition keys.
    pub keys: BTreeMap<String, String>,
}

impl RequestContext {
    pub fn new(principal: CallerPrincipal, action: &str, resource: &str) -> Self {
        Self {
            principal,
            action: action.to_string(),
            resource: resource.to_string(),
            source_ip: None,
            keys: BTreeMap::new(),
        }
    }

    pub fn with_source_ip(mut self, ip: IpAddr) -> Self {
        self.source_ip = Some(ip);
        self
    }

    pub fn with_key(mut self, key: &str, value: &str) -> Self {
        self.keys.insert(key.to_string(), value.to_string());
        self
    }

    fn key_value(&self, key: &str) -> Option<String> {
        if key.eq_ignore_ascii_case(SOURCE_IP_KEY) {
            return self.source_ip.map(|ip| ip.to_string());
        }
        self.keys.get(key).cloned()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    /// A Deny statement matched; carries its sid when it has one.
    ExplicitDeny(Option<String>),
    /// No statement allowed the request.
    ImplicitDeny,
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Decision::Allow => write!(f, "allow"),
            Decision::ExplicitDeny(Some(sid)) => write!(f, "explicit deny ({})", sid),
            Decision::ExplicitDeny(None) => write!(f, "explicit deny"),
            Decision::ImplicitDeny => write!(f, "implicit deny"),
        }
    }
}

/// Evaluate a set of documents together against one request.
pub fn evaluate(documents: &[&PolicyDocument], request: &RequestContext) -> Decision {
    let mut allowed = false;

    for statement in documents.iter().flat_map(|doc| doc.statement.iter()) {
        if !statement_matches(statement, request) {
            continue;
        }
        match statement.effect {
            Effect::Deny => return Decision::ExplicitDeny(statement.sid.clone()),
            Effect::Allow => allowed = true,
        }
    }

    if allowed {
        Decision::Allow
    } else {
        Decision::ImplicitDeny
    }
}

fn statement_matches(statement: &Statement, request: &RequestContext) -> bool {
    principal_matches(statement.principal.as_ref(), &request.principal)
        && statement
            .action
            .iter()
            .any(|action| wildcard_match(action, &request.action, true))
        && resource_matches(&statement.resource, &request.resource)
        && conditions_match(&statement.condition, request)
}

/// Identity policies carry no principal and apply to their holder.
fn principal_matches(principal: Option<&Principal>, caller: &CallerPrincipal) -> bool {
    match (principal, caller) {
        (None, _) => true,
        (Some(Principal::Aws(pattern)), _) if pattern == "*" => true,
        (Some(Principal::Aws(pattern)), CallerPrincipal::Aws(arn)) => {
            wildcard_match(pattern, arn, false)
        }
        (Some(Principal::Service(name)), CallerPrincipal::Service(caller)) => name == caller,
        _ => false,
    }
}

fn resource_matches(resources: &[String], resource: &str) -> bool {
    // A statement without Resource is only valid in resource policies,
    // where it covers the attached resource.
    resources.is_empty() || resources.iter().any(|r| wildcard_match(r, resource, false))
}

fn conditions_match(conditions: &Conditions, request: &RequestContext) -> bool {
    conditions.iter().all(|(operator, keys)| {
        keys.iter().all(|(key, values)| match request.key_value(key) {
            Some(actual) => operator_matches(*operator, &actual, values),
            None => operator.is_negated(),
        })
    })
}

fn operator_matches(operator: ConditionOperator, actual: &str, values: &[String]) -> bool {
    match operator {
        ConditionOperator::IpAddress => ip_in_any(actual, values),
        ConditionOperator::NotIpAddress => !ip_in_any(actual, values),
        ConditionOperator::StringEquals => values.iter().any(|v| v == actual),
        ConditionOperator::StringNotEquals => values.iter().all(|v| v != actual),
        ConditionOperator::StringLike | ConditionOperator::ArnLike => values
            .iter()
            .any(|pattern| wildcard_match(pattern, actual, false)),
    }
}

fn ip_in_any(actual: &str, ranges: &[String]) -> bool {
    let Ok(ip) = actual.parse::<IpAddr>() else {
        return false;
    };
    ranges
        .iter()
        .filter_map(|range| IpRange::parse(range).ok())
        .any(|range| range.contains(ip))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invoke_policy(allowed_ip: &str) -> PolicyDocument {
        PolicyDocument::new(vec![
            Statement::allow()
                .principal(Principal::any())
                .actions(["execute-api:Invoke"])
                .resources(["execute-api:/*/*/*"]),
            Statement::deny()
                .sid("SourceIpGuard")
                .principal(Principal::any())
                .actions(["execute-api:Invoke"])
                .resources(["execute-api:/*/*/*"])
                .condition(ConditionOperator::NotIpAddress, SOURCE_IP_KEY, [allowed_ip]),
        ])
    }

    fn invoke_from(ip: &str) -> RequestContext {
        RequestContext::new(
            CallerPrincipal::Anonymous,
            "execute-api:Invoke",
            "execute-api:/v1/POST/bedrock",
        )
        .with_source_ip(ip.parse().unwrap())
    }

    #[test]
    fn matching_ip_is_allowed() {
        let policy = invoke_policy("203.0.113.5");
        assert_eq!(evaluate(&[&policy], &invoke_from("203.0.113.5")), Decision::Allow);
    }

    #[test]
    fn other_ip_hits_the_deny() {
        let policy = invoke_policy("203.0.113.5");
        assert_eq!(
            evaluate(&[&policy], &invoke_from("198.51.100.9")),
            Decision::ExplicitDeny(Some("SourceIpGuard".to_string()))
        );
    }

    #[test]
    fn deny_wins_regardless_of_statement_order() {
        let mut policy = invoke_policy("203.0.113.5");
        policy.statement.reverse();
        assert!(!evaluate(&[&policy], &invoke_from("198.51.100.9")).is_allowed());
        assert!(evaluate(&[&policy], &invoke_from("203.0.113.5")).is_allowed());
    }

    #[test]
    fn no_allow_means_implicit_deny() {
        let policy = PolicyDocument::new(vec![Statement::allow()
            .actions(["s3:GetObject"])
            .resources(["arn:aws:s3:::b/*"])]);
        let request = RequestContext::new(
            CallerPrincipal::Anonymous,
            "s3:DeleteObject",
            "arn:aws:s3:::b/k",
        );
        assert_eq!(evaluate(&[&policy], &request), Decision::ImplicitDeny);
        assert_eq!(evaluate(&[], &request), Decision::ImplicitDeny);
    }

    #[test]
    fn missing_source_ip_satisfies_negated_operator() {
        let policy = invoke_policy("203.0.113.5");
        let request = RequestContext::new(
            CallerPrincipal::Anonymous,
            "execute-api:Invoke",
            "execute-api:/v1/GET/",
        );
        assert!(matches!(
            evaluate(&[&policy], &request),
            Decision::ExplicitDeny(_)
        ));
    }

    #[test]
    fn service_principal_must_match() {
        let trust = PolicyDocument::new(vec![Statement::allow()
            .principal(Principal::service("lambda.amazonaws.com"))
            .actions(["sts:AssumeRole"])]);
        let lambda = RequestContext::new(
            CallerPrincipal::Service("lambda.amazonaws.com".into()),
            "sts:AssumeRole",
            "arn:aws:iam::123456789012:role/r",
        );
        let ec2 = RequestContext::new(
            CallerPrincipal::Service("ec2.amazonaws.com".into()),
            "sts:AssumeRole",
            "arn:aws:iam::123456789012:role/r",
        );
        assert!(evaluate(&[&trust], &lambda).is_allowed());
        assert_eq!(evaluate(&[&trust], &ec2), Decision::ImplicitDeny);
        assert_eq!(
            evaluate(
                &[&trust],
                &RequestContext::new(CallerPrincipal::Anonymous, "sts:AssumeRole", "x")
            ),
            Decision::ImplicitDeny
        );
    }

    #[test]
    fn string_conditions() {
        let policy = PolicyDocument::new(vec![Statement::allow()
            .actions(["s3:PutObject"])
            .resources(["*"])
            .condition(
                ConditionOperator::StringEquals,
                "s3:x-amz-server-side-encryption",
                ["aws:kms"],
            )]);
        let base = RequestContext::new(CallerPrincipal::Anonymous, "s3:PutObject", "arn:aws:s3:::b/k");
        assert_eq!(evaluate(&[&policy], &base), Decision::ImplicitDeny);
        let with_key = base.with_key("s3:x-amz-server-side-encryption", "aws:kms");
        assert!(evaluate(&[&policy], &with_key).is_allowed());
    }
}
