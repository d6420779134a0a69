//! REST API front door: resource policy, route, stage and supporting resources.

use super::cors::CorsOptions;
use super::log_sink::access_log_format;
use super::{ids, Component, ResourceNode};
use crate::arn;
use crate::policy::{ConditionOperator, PolicyDocument, Principal, Statement, SOURCE_IP_KEY};
use crate::template::intrinsic::{self, get_att, join, reference};
use serde_json::{json, Value};
use std::net::IpAddr;

pub const STAGE_NAME: &str = "v1";
pub const ENDPOINT_TYPE: &str = "REGIONAL";
pub const INVOKE_ACTION: &str = "execute-api:Invoke";

/// Resource-policy shorthand for "this API".
pub const EXECUTE_API_SHORTHAND: &str = "execute-api:/";

const API_GATEWAY_SERVICE: &str = "apigateway.amazonaws.com";
const PUSH_TO_CLOUDWATCH_POLICY: &str = "service-role/AmazonAPIGatewayPushToCloudWatchLogs";

/// Allow everyone, then deny every caller whose source address differs.
pub fn resource_policy(caller_ip: IpAddr) -> PolicyDocument {
    let any_method = format!("{}*/*/*", EXECUTE_API_SHORTHAND);
    PolicyDocument::new(vec![
        Statement::allow()
            .principal(Principal::any())
            .actions([INVOKE_ACTION])
            .resources([any_method.clone()]),
        Statement::deny()
            .principal(Principal::any())
            .actions([INVOKE_ACTION])
            .resources([any_method])
            .condition(
                ConditionOperator::NotIpAddress,
                SOURCE_IP_KEY,
                [caller_ip.to_string()],
            ),
    ])
}

/// Rewrite `execute-api:/` resources to full ARNs of a deployed API.
pub fn expand_shorthand(policy: &PolicyDocument, region: &str, account: &str, api_id: &str) -> PolicyDocument {
    let prefix = format!("{}/", arn::execute_api_prefix(region, account, api_id));
    let mut expanded = policy.clone();
    for statement in &mut expanded.statement {
        for resource in &mut statement.resource {
            if let Some(rest) = resource.strip_prefix(EXECUTE_API_SHORTHAND) {
                *resource = format!("{}{}", prefix, rest);
            }
        }
    }
    expanded
}

/// The single proxied route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub path_part: String,
    pub method: String,
}

impl Default for Route {
    fn default() -> Self {
        Self {
            path_part: "bedrock".to_string(),
            method: "POST".to_string(),
        }
    }
}

impl Route {
    pub fn path(&self) -> String {
        format!("/{}", self.path_part)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FrontDoor {
    pub name: String,
    pub policy: PolicyDocument,
    pub stage: String,
    pub cors: CorsOptions,
    pub route: Route,
}

impl FrontDoor {
    pub fn new(name: &str, caller_ip: IpAddr) -> Self {
        Self {
            name: name.to_string(),
            policy: resource_policy(caller_ip),
            stage: STAGE_NAME.to_string(),
            cors: CorsOptions::default(),
            route: Route::default(),
        }
    }

    /// Nodes for the API and everything hanging off it.
    pub fn nodes(&self) -> Vec<ResourceNode> {
        let api = || reference(ids::REST_API);

        let rest_api = ResourceNode::new(
            ids::REST_API,
            Component::FrontDoor,
            "AWS::ApiGateway::RestApi",
            json!({
                "Name": self.name,
                "Policy": self.policy,
                "EndpointConfiguration": { "Types": [ENDPOINT_TYPE] },
            }),
        )
        .depends_on([ids::FUNCTION, ids::LOG_GROUP]);

        let cloudwatch_role = ResourceNode::new(
            ids::CLOUDWATCH_ROLE,
            Component::FrontDoor,
            "AWS::IAM::Role",
            json!({
                "AssumeRolePolicyDocument": PolicyDocument::new(vec![Statement::allow()
                    .principal(Principal::service(API_GATEWAY_SERVICE))
                    .actions(["sts:AssumeRole"])]),
                "ManagedPolicyArns": [arn::managed_policy_arn(PUSH_TO_CLOUDWATCH_POLICY)],
            }),
        )
        .depends_on([ids::FUNCTION, ids::LOG_GROUP]);

        let account = ResourceNode::new(
            ids::ACCOUNT,
            Component::FrontDoor,
            "AWS::ApiGateway::Account",
            json!({ "CloudWatchRoleArn": get_att(ids::CLOUDWATCH_ROLE, "Arn") }),
        )
        .depends_on([ids::CLOUDWATCH_ROLE, ids::REST_API]);

        let root_options = self
            .cors
            .options_method(ids::ROOT_OPTIONS, api(), get_att(ids::REST_API, "RootResourceId"))
            .depends_on([ids::REST_API]);

        let route_resource = ResourceNode::new(
            ids::ROUTE_RESOURCE,
            Component::Route,
            "AWS::ApiGateway::Resource",
            json!({
                "ParentId": get_att(ids::REST_API, "RootResourceId"),
                "PathPart": self.route.path_part,
                "RestApiId": api(),
            }),
        )
        .depends_on([ids::REST_API]);

        let mut route_options = self
            .cors
            .options_method(ids::ROUTE_OPTIONS, api(), reference(ids::ROUTE_RESOURCE))
            .depends_on([ids::ROUTE_RESOURCE]);
        route_options.component = Component::Route;

        let route_method = ResourceNode::new(
            ids::ROUTE_METHOD,
            Component::Route,
            "AWS::ApiGateway::Method",
            json!({
                "HttpMethod": self.route.method,
                "ResourceId": reference(ids::ROUTE_RESOURCE),
                "RestApiId": api(),
                "AuthorizationType": "NONE",
                "Integration": {
                    "Type": "AWS_PROXY",
                    "IntegrationHttpMethod": "POST",
                    "Uri": join("", vec![
                        json!("arn:"),
                        intrinsic::partition(),
                        json!(":apigateway:"),
                        intrinsic::region(),
                        json!(":lambda:path/2015-03-31/functions/"),
                        get_att(ids::FUNCTION, "Arn"),
                        json!("/invocations"),
                    ]),
                },
            }),
        )
        .depends_on([ids::ROUTE_RESOURCE, ids::FUNCTION]);

        let permission = ResourceNode::new(
            ids::ROUTE_PERMISSION,
            Component::Route,
            "AWS::Lambda::Permission",
            json!({
                "Action": "lambda:InvokeFunction",
                "FunctionName": get_att(ids::FUNCTION, "Arn"),
                "Principal": API_GATEWAY_SERVICE,
                "SourceArn": join("", vec![
                    json!("arn:"),
                    intrinsic::partition(),
                    json!(":execute-api:"),
                    intrinsic::region(),
                    json!(":"),
                    intrinsic::account_id(),
                    json!(":"),
                    api(),
                    json!("/"),
                    reference(ids::STAGE),
                    json!(format!("/{}{}", self.route.method, self.route.path())),
                ]),
            }),
        )
        .depends_on([ids::FUNCTION, ids::REST_API, ids::STAGE]);

        let deployment = ResourceNode::new(
            ids::DEPLOYMENT,
            Component::FrontDoor,
            "AWS::ApiGateway::Deployment",
            json!({
                "RestApiId": api(),
                "Description": "Automatically created by the RestApi construct",
            }),
        )
        .depends_on([
            ids::ROOT_OPTIONS,
            ids::ROUTE_RESOURCE,
            ids::ROUTE_OPTIONS,
            ids::ROUTE_METHOD,
        ]);

        let stage = ResourceNode::new(
            ids::STAGE,
            Component::FrontDoor,
            "AWS::ApiGateway::Stage",
            json!({
                "RestApiId": api(),
                "DeploymentId": reference(ids::DEPLOYMENT),
                "StageName": self.stage,
                "MethodSettings": [{
                    "ResourcePath": "/*",
                    "HttpMethod": "*",
                    "LoggingLevel": "INFO",
                    "DataTraceEnabled": false,
                }],
                "AccessLogSetting": {
                    "DestinationArn": get_att(ids::LOG_GROUP, "Arn"),
                    "Format": access_log_format(),
                },
            }),
        )
        .depends_on([ids::DEPLOYMENT, ids::ACCOUNT, ids::LOG_GROUP]);

        vec![
            rest_api,
            cloudwatch_role,
            account,
            root_options,
            route_resource,
            route_options,
            route_method,
            permission,
            deployment,
            stage,
        ]
    }

    /// Stack outputs: API id and invocation URL.
    pub fn outputs(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("restApiId", reference(ids::REST_API)),
            (
                "restApiEndpoint",
                join("", vec![
                    json!("https://"),
                    reference(ids::REST_API),
                    json!(".execute-api."),
                    intrinsic::region(),
                    json!("."),
                    intrinsic::url_suffix(),
                    json!("/"),
                    reference(ids::STAGE),
                    json!("/"),
                ]),
            ),
        ]
    }

    /// Invocation URL once the API id is known.
    pub fn endpoint_url(&self, api_id: &str, region: &str) -> String {
        format!(
            "https://{}.execute-api.{}.amazonaws.com/{}/",
            api_id, region, self.stage
        )
    }
}
