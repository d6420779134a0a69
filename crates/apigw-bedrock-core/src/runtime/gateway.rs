//! Request-path model of the deployed front door.
//!
//! A request is authorized against the resource policy first, then routed:
//! CORS preflights are answered locally, the single route is proxied to the
//! handler untouched, and anything else gets the platform's 403. Every request
//! produces one access log entry.

use crate::arn;
use crate::error::Result;
use crate::policy::{evaluate, CallerPrincipal, Decision, PolicyDocument, RequestContext};
use crate::resources::cors::CorsOptions;
use crate::resources::front_door::{expand_shorthand, FrontDoor, INVOKE_ACTION};
use crate::resources::AccessLogEntry;
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

pub const MISSING_TOKEN_MESSAGE: &str = "Missing Authentication Token";
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

/// Inbound HTTP request as seen by the front door.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: String,
    /// Path without the query string.
    pub path: String,
    pub query: BTreeMap<String, String>,
    pub source_ip: IpAddr,
    pub headers: BTreeMap<String, String>,
    pub body: Option<String>,
    pub protocol: String,
}

impl HttpRequest {
    /// `path` may carry a `?query`; it is split off before routing.
    pub fn new(method: &str, path: &str, source_ip: IpAddr) -> Self {
        let (path, query) = path.split_once('?').unwrap_or((path, ""));
        Self {
            method: method.to_string(),
            path: path.to_string(),
            query: parse_query(query),
            source_ip,
            headers: BTreeMap::new(),
            body: None,
            protocol: "HTTP/1.1".to_string(),
        }
    }

    pub fn with_body(mut self, body: &str) -> Self {
        self.body = Some(body.to_string());
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_string(), value.to_string());
        self
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyIdentity {
    pub source_ip: String,
    pub user: Option<String>,
    pub caller: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyRequestContext {
    pub account_id: String,
    pub api_id: String,
    pub stage: String,
    pub request_id: String,
    pub resource_id: String,
    pub resource_path: String,
    pub http_method: String,
    pub identity: ProxyIdentity,
}

/// Proxy integration event handed to the function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyEvent {
    pub resource: String,
    pub path: String,
    pub http_method: String,
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub query_string_parameters: Option<BTreeMap<String, String>>,
    pub body: Option<String>,
    pub is_base64_encoded: bool,
    pub request_context: ProxyRequestContext,
}

/// Proxy integration response returned by the function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyResponse {
    pub status_code: u16,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub is_base64_encoded: bool,
}

impl ProxyResponse {
    pub fn new(status_code: u16, body: impl Into<String>) -> Self {
        Self {
            status_code,
            headers: BTreeMap::new(),
            body: body.into(),
            is_base64_encoded: false,
        }
    }

    fn error(status_code: u16, error_type: &str, message: &str) -> Self {
        let mut response = Self::new(status_code, serde_json::json!({ "message": message }).to_string());
        response
            .headers
            .insert("Content-Type".to_string(), "application/json".to_string());
        response
            .headers
            .insert("x-amzn-ErrorType".to_string(), error_type.to_string());
        response
    }
}

#[async_trait]
pub trait ProxyHandler: Send + Sync {
    async fn handle(&self, event: ProxyEvent) -> Result<ProxyResponse>;
}

/// Destination for access log entries.
pub trait AccessLogSink: Send + Sync {
    fn record(&self, entry: AccessLogEntry);
}

/// Append-only in-memory sink.
#[derive(Debug, Default)]
pub struct MemoryLogSink {
    entries: Mutex<Vec<AccessLogEntry>>,
}

impl MemoryLogSink {
    pub fn entries(&self) -> Vec<AccessLogEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AccessLogSink for MemoryLogSink {
    fn record(&self, entry: AccessLogEntry) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry);
    }
}

#[derive(Debug, Clone)]
struct ApiResource {
    path: String,
    resource_id: String,
    methods: Vec<String>,
}

enum Outcome {
    Denied(Decision),
    NoRoute,
    Preflight,
    Proxied { integration_latency: u64 },
    IntegrationFailed { integration_latency: u64 },
}

pub struct Gateway {
    api_id: String,
    account: String,
    region: String,
    stage: String,
    policy: PolicyDocument,
    cors: CorsOptions,
    resources: Vec<ApiResource>,
    sink: Arc<dyn AccessLogSink>,
}

impl Gateway {
    pub fn new(
        front_door: &FrontDoor,
        region: &str,
        account: &str,
        api_id: &str,
        sink: Arc<dyn AccessLogSink>,
    ) -> Self {
        let resource_id = || Uuid::new_v4().simple().to_string()[..6].to_string();
        let resources = vec![
            ApiResource {
                path: "/".to_string(),
                resource_id: resource_id(),
                methods: vec!["OPTIONS".to_string()],
            },
            ApiResource {
                path: front_door.route.path(),
                resource_id: resource_id(),
                methods: vec!["OPTIONS".to_string(), front_door.route.method.clone()],
            },
        ];
        Self {
            api_id: api_id.to_string(),
            account: account.to_string(),
            region: region.to_string(),
            stage: front_door.stage.clone(),
            policy: expand_shorthand(&front_door.policy, region, account, api_id),
            cors: front_door.cors.clone(),
            resources,
            sink,
        }
    }

    pub fn api_id(&self) -> &str {
        &self.api_id
    }

    /// Authorize, route and answer one request.
    pub async fn dispatch(&self, request: HttpRequest, handler: &dyn ProxyHandler) -> ProxyResponse {
        let started = Instant::now();
        let request_time = Utc::now();
        let request_id = Uuid::new_v4().to_string();
        let method = request.method.to_ascii_uppercase();
        let (stage, path) = split_stage(&request.path);

        let invoke_arn = arn::execute_api_arn(
            &self.region,
            &self.account,
            &self.api_id,
            stage,
            &method,
            path,
        );
        let authz = RequestContext::new(CallerPrincipal::Anonymous, INVOKE_ACTION, &invoke_arn)
            .with_source_ip(request.source_ip);
        let decision = evaluate(&[&self.policy], &authz);

        let resource = (stage == self.stage)
            .then(|| self.resources.iter().find(|r| r.path == path))
            .flatten();

        let (response, outcome) = if !decision.is_allowed() {
            let mut message = format!(
                "User: anonymous is not authorized to perform: {} on resource: {}",
                INVOKE_ACTION, invoke_arn
            );
            if matches!(decision, Decision::ExplicitDeny(_)) {
                message.push_str(" with an explicit deny");
            }
            (
                ProxyResponse::error(403, "AccessDeniedException", &message),
                Outcome::Denied(decision),
            )
        } else {
            match resource.filter(|r| r.methods.contains(&method)) {
                None => (
                    ProxyResponse::error(403, "MissingAuthenticationTokenException", MISSING_TOKEN_MESSAGE),
                    Outcome::NoRoute,
                ),
                Some(_) if method == "OPTIONS" => (self.preflight(&request), Outcome::Preflight),
                Some(resource) => {
                    let event = self.proxy_event(&request, &method, resource, &request_id, stage);
                    let integration_started = Instant::now();
                    let result = handler.handle(event).await;
                    let integration_latency = elapsed_ms(integration_started);
                    match result {
                        Ok(response) => (response, Outcome::Proxied { integration_latency }),
                        Err(e) => {
                            warn!(request_id = %request_id, error = %e, "Integration failed");
                            (
                                ProxyResponse::error(502, "InternalServerErrorException", INTERNAL_ERROR_MESSAGE),
                                Outcome::IntegrationFailed { integration_latency },
                            )
                        }
                    }
                }
            }
        };

        let integration_latency = match outcome {
            Outcome::Proxied { integration_latency }
            | Outcome::IntegrationFailed { integration_latency } => integration_latency,
            _ => 0,
        };
        if let Outcome::Denied(decision) = &outcome {
            info!(source_ip = %request.source_ip, %decision, resource = %invoke_arn, "Request denied by resource policy");
        }

        let entry = AccessLogEntry {
            resource_id: resource.map_or_else(|| "-".to_string(), |r| r.resource_id.clone()),
            request_id,
            ip: request.source_ip.to_string(),
            user: "-".to_string(),
            caller: "-".to_string(),
            request_time: request_time.format("%d/%b/%Y:%H:%M:%S %z").to_string(),
            http_method: method,
            resource_path: resource.map_or_else(|| request.path.clone(), |r| r.path.clone()),
            status: response.status_code,
            protocol: request.protocol.clone(),
            response_length: response.body.len(),
            integration_latency,
            response_latency: elapsed_ms(started),
        };
        info!(
            target: "access_log",
            request_id = %entry.request_id,
            ip = %entry.ip,
            http_method = %entry.http_method,
            resource_path = %entry.resource_path,
            status = entry.status,
            response_length = entry.response_length,
            integration_latency = entry.integration_latency,
            response_latency = entry.response_latency,
            "access"
        );
        self.sink.record(entry);

        response
    }

    fn preflight(&self, request: &HttpRequest) -> ProxyResponse {
        let mut response = ProxyResponse::new(self.cors.status_code, "");
        response
            .headers
            .extend(self.cors.preflight_headers(request.header("Origin")));
        response
    }

    fn proxy_event(
        &self,
        request: &HttpRequest,
        method: &str,
        resource: &ApiResource,
        request_id: &str,
        stage: &str,
    ) -> ProxyEvent {
        ProxyEvent {
            resource: resource.path.clone(),
            path: resource.path.clone(),
            http_method: method.to_string(),
            headers: request.headers.clone(),
            query_string_parameters: (!request.query.is_empty()).then(|| request.query.clone()),
            body: request.body.clone(),
            is_base64_encoded: false,
            request_context: ProxyRequestContext {
                account_id: self.account.clone(),
                api_id: self.api_id.clone(),
                stage: stage.to_string(),
                request_id: request_id.to_string(),
                resource_id: resource.resource_id.clone(),
                resource_path: resource.path.clone(),
                http_method: method.to_string(),
                identity: ProxyIdentity {
                    source_ip: request.source_ip.to_string(),
                    user: None,
                    caller: None,
                },
            },
        }
    }
}

/// `/v1/bedrock` -> (`v1`, `/bedrock`); `/v1` -> (`v1`, `/`).
pub fn split_stage(path: &str) -> (&str, &str) {
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    match trimmed.find('/') {
        Some(idx) => {
            let rest = &trimmed[idx..];
            let rest = if rest.len() > 1 { rest.trim_end_matches('/') } else { rest };
            (&trimmed[..idx], rest)
        }
        None => (trimmed, "/"),
    }
}

fn parse_query(query: &str) -> BTreeMap<String, String> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (key.to_string(), value.to_string())
        })
        .collect()
}

fn elapsed_ms(since: Instant) -> u64 {
    u64::try_from(since.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StackError;

    struct Echo;

    #[async_trait]
    impl ProxyHandler for Echo {
        async fn handle(&self, event: ProxyEvent) -> Result<ProxyResponse> {
            Ok(ProxyResponse::new(201, event.body.unwrap_or_default()))
        }
    }

    struct Failing;

    #[async_trait]
    impl ProxyHandler for Failing {
        async fn handle(&self, _event: ProxyEvent) -> Result<ProxyResponse> {
            Err(StackError::storage("boom"))
        }
    }

    fn gateway() -> (Gateway, Arc<MemoryLogSink>) {
        let sink = Arc::new(MemoryLogSink::default());
        let front_door = FrontDoor::new("acme-dev-handson-apigw-bedrock", "203.0.113.5".parse().unwrap());
        let gateway = Gateway::new(&front_door, "us-east-1", "123456789012", "abc123", sink.clone());
        (gateway, sink)
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_split_stage() {
        assert_eq!(split_stage("/v1/bedrock"), ("v1", "/bedrock"));
        assert_eq!(split_stage("/v1/bedrock/"), ("v1", "/bedrock"));
        assert_eq!(split_stage("/v1"), ("v1", "/"));
        assert_eq!(split_stage("/v1/"), ("v1", "/"));
        assert_eq!(split_stage("/"), ("", "/"));
    }

    #[tokio::test]
    async fn test_allowed_post_is_proxied_unmodified() {
        let (gateway, sink) = gateway();
        let request = HttpRequest::new("POST", "/v1/bedrock", ip("203.0.113.5")).with_body("{\"prompt\":\"cat\"}");
        let response = gateway.dispatch(request, &Echo).await;
        assert_eq!(response.status_code, 201);
        assert_eq!(response.body, "{\"prompt\":\"cat\"}");

        let entries = sink.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].status, 201);
        assert_eq!(entries[0].resource_path, "/bedrock");
        assert_eq!(entries[0].ip, "203.0.113.5");
    }

    struct QueryEcho;

    #[async_trait]
    impl ProxyHandler for QueryEcho {
        async fn handle(&self, event: ProxyEvent) -> Result<ProxyResponse> {
            let body = serde_json::to_string(&event.query_string_parameters).unwrap_or_default();
            Ok(ProxyResponse::new(200, body))
        }
    }

    #[tokio::test]
    async fn test_query_string_does_not_affect_routing() {
        let (gateway, sink) = gateway();
        let request = HttpRequest::new("POST", "/v1/bedrock?size=512&draft", ip("203.0.113.5"));
        assert_eq!(request.path, "/v1/bedrock");

        let response = gateway.dispatch(request, &QueryEcho).await;
        assert_eq!(response.status_code, 200);
        assert_eq!(response.body, r#"{"draft":"","size":"512"}"#);
        assert_eq!(sink.entries()[0].resource_path, "/bedrock");

        let response = gateway
            .dispatch(HttpRequest::new("POST", "/v1/bedrock", ip("203.0.113.5")), &QueryEcho)
            .await;
        assert_eq!(response.body, "null");
    }

    #[tokio::test]
    async fn test_denied_ip_gets_403_everywhere() {
        let (gateway, sink) = gateway();
        for (method, path) in [("POST", "/v1/bedrock"), ("OPTIONS", "/v1/"), ("GET", "/v1/nowhere"), ("DELETE", "/prod/x")] {
            let response = gateway
                .dispatch(HttpRequest::new(method, path, ip("198.51.100.9")), &Echo)
                .await;
            assert_eq!(response.status_code, 403, "{method} {path}");
            assert_eq!(response.headers["x-amzn-ErrorType"], "AccessDeniedException");
            assert!(response.body.contains("explicit deny"));
        }
        assert_eq!(sink.len(), 4);
    }

    #[tokio::test]
    async fn test_preflight() {
        let (gateway, _) = gateway();
        let response = gateway
            .dispatch(HttpRequest::new("OPTIONS", "/v1/bedrock", ip("203.0.113.5")), &Echo)
            .await;
        assert_eq!(response.status_code, 200);
        assert_eq!(response.headers["Access-Control-Allow-Origin"], "*");
        assert!(response.headers["Access-Control-Allow-Methods"].contains("POST"));
    }

    #[tokio::test]
    async fn test_unknown_routes_get_missing_token() {
        let (gateway, _) = gateway();
        for (method, path) in [("GET", "/v1/bedrock"), ("POST", "/v1/other"), ("POST", "/prod/bedrock"), ("POST", "/v1/")] {
            let response = gateway
                .dispatch(HttpRequest::new(method, path, ip("203.0.113.5")), &Echo)
                .await;
            assert_eq!(response.status_code, 403, "{method} {path}");
            assert!(response.body.contains(MISSING_TOKEN_MESSAGE));
        }
    }

    #[tokio::test]
    async fn test_integration_failure_is_502() {
        let (gateway, sink) = gateway();
        let response = gateway
            .dispatch(HttpRequest::new("POST", "/v1/bedrock", ip("203.0.113.5")), &Failing)
            .await;
        assert_eq!(response.status_code, 502);
        assert_eq!(sink.entries()[0].status, 502);
    }
}
