//! Dry-run a request through the local model of the front door

use anyhow::{Context, Result};
use apigw_bedrock_config::StackConfig;
use apigw_bedrock_core::arn;
use apigw_bedrock_core::policy::{evaluate, CallerPrincipal, Decision, RequestContext};
use apigw_bedrock_core::resources::front_door::INVOKE_ACTION;
use apigw_bedrock_core::runtime::{
    split_stage, HttpRequest, ProxyEvent, ProxyHandler, ProxyResponse,
};
use apigw_bedrock_core::Stack;
use async_trait::async_trait;
use clap::Args;
use std::net::IpAddr;

/// Placeholder id used until the real API id is known
const DEFAULT_API_ID: &str = "a1b2c3d4e5";

#[derive(Args)]
pub struct CheckIpArgs {
    /// Source address of the simulated request
    pub ip: IpAddr,

    /// HTTP method
    #[arg(long, default_value = "POST")]
    pub method: String,

    /// Request path including the stage
    #[arg(long, default_value = "/v1/bedrock")]
    pub path: String,

    /// API id substituted into the resource policy
    #[arg(long, default_value = DEFAULT_API_ID)]
    pub api_id: String,
}

/// Stands in for the function so nothing is invoked.
struct DryRunHandler {
    function_name: String,
}

#[async_trait]
impl ProxyHandler for DryRunHandler {
    async fn handle(&self, event: ProxyEvent) -> apigw_bedrock_core::Result<ProxyResponse> {
        let body = serde_json::json!({
            "dryRun": true,
            "function": self.function_name,
            "resource": event.resource,
        });
        Ok(ProxyResponse::new(200, body.to_string()))
    }
}

#[derive(Debug)]
struct CheckOutcome {
    decision: Decision,
    response: ProxyResponse,
}

pub fn run(args: CheckIpArgs, config: StackConfig) -> Result<()> {
    let stack = super::compose(&config)?;

    let outcome = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?
        .block_on(check(&stack, &args));

    println!("{} {} from {}", args.method.to_ascii_uppercase(), args.path, args.ip);
    println!("  policy:   {}", outcome.decision);
    println!("  status:   {}", outcome.response.status_code);
    println!("  body:     {}", outcome.response.body);
    if outcome.decision.is_allowed() {
        println!("  endpoint: {}", stack.endpoint_url(&args.api_id));
    }
    Ok(())
}

async fn check(stack: &Stack, args: &CheckIpArgs) -> CheckOutcome {
    let method = args.method.to_ascii_uppercase();
    let request = HttpRequest::new(&method, &args.path, args.ip);
    let (stage, path) = split_stage(&request.path);
    let resource = arn::execute_api_arn(
        &stack.context.region,
        &stack.context.account,
        &args.api_id,
        stage,
        &method,
        path,
    );
    let authz = RequestContext::new(CallerPrincipal::Anonymous, INVOKE_ACTION, &resource)
        .with_source_ip(args.ip);
    let decision = evaluate(&[&stack.resolved_policy(&args.api_id)], &authz);

    let handler = DryRunHandler {
        function_name: stack.names.function.clone(),
    };
    let response = stack
        .gateway(&args.api_id)
        .dispatch(request, &handler)
        .await;

    CheckOutcome { decision, response }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deploy::tests::acme_dev;

    fn args(ip: &str, method: &str, path: &str) -> CheckIpArgs {
        CheckIpArgs {
            ip: ip.parse().unwrap(),
            method: method.to_string(),
            path: path.to_string(),
            api_id: DEFAULT_API_ID.to_string(),
        }
    }

    #[tokio::test]
    async fn test_configured_ip_reaches_function() {
        let stack = super::super::compose(&acme_dev()).unwrap();
        let outcome = check(&stack, &args("203.0.113.5", "post", "/v1/bedrock")).await;
        assert!(outcome.decision.is_allowed());
        assert_eq!(outcome.response.status_code, 200);
        assert!(outcome.response.body.contains("\"dryRun\":true"));
    }

    #[tokio::test]
    async fn test_other_ip_is_denied_explicitly() {
        let stack = super::super::compose(&acme_dev()).unwrap();
        let outcome = check(&stack, &args("198.51.100.7", "POST", "/v1/bedrock")).await;
        assert!(matches!(outcome.decision, Decision::ExplicitDeny(_)));
        assert_eq!(outcome.response.status_code, 403);
    }

    #[tokio::test]
    async fn test_unknown_route_is_allowed_but_unrouted() {
        let stack = super::super::compose(&acme_dev()).unwrap();
        let outcome = check(&stack, &args("203.0.113.5", "GET", "/v1/other")).await;
        assert!(outcome.decision.is_allowed());
        assert_eq!(outcome.response.status_code, 403);
        assert!(outcome.response.body.contains("Missing Authentication Token"));
    }
}
