//! CORS preflight configuration and its OPTIONS mock methods.

use super::{Component, ResourceNode};
use serde_json::{json, Value};

pub const ALL_ORIGINS: &str = "*";

pub const ALL_METHODS: [&str; 7] = ["OPTIONS", "GET", "PUT", "POST", "DELETE", "PATCH", "HEAD"];

pub const DEFAULT_HEADERS: [&str; 6] = [
    "Content-Type",
    "X-Amz-Date",
    "Authorization",
    "X-Api-Key",
    "X-Amz-Security-Token",
    "X-Amz-User-Agent",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorsOptions {
    pub allow_origins: Vec<String>,
    pub allow_methods: Vec<String>,
    pub allow_headers: Vec<String>,
    pub status_code: u16,
}

impl Default for CorsOptions {
    fn default() -> Self {
        Self {
            allow_origins: vec![ALL_ORIGINS.to_string()],
            allow_methods: ALL_METHODS.iter().map(|m| m.to_string()).collect(),
            allow_headers: DEFAULT_HEADERS.iter().map(|h| h.to_string()).collect(),
            status_code: 200,
        }
    }
}

impl CorsOptions {
    /// Response headers for a preflight from `origin`.
    pub fn preflight_headers(&self, origin: Option<&str>) -> Vec<(String, String)> {
        let allow_origin = if self.allow_origins.iter().any(|o| o == ALL_ORIGINS) {
            ALL_ORIGINS.to_string()
        } else {
            origin
                .filter(|o| self.allow_origins.iter().any(|allowed| allowed.as_str() == *o))
                .or_else(|| self.allow_origins.first().map(String::as_str))
                .unwrap_or_default()
                .to_string()
        };

        let mut headers = vec![
            (
                "Access-Control-Allow-Headers".to_string(),
                self.allow_headers.join(","),
            ),
            ("Access-Control-Allow-Origin".to_string(), allow_origin),
            (
                "Access-Control-Allow-Methods".to_string(),
                self.allow_methods.join(","),
            ),
        ];
        if self.allow_origins.iter().all(|o| o != ALL_ORIGINS) {
            headers.push(("Vary".to_string(), "Origin".to_string()));
        }
        headers
    }

    /// OPTIONS method answering the preflight with a MOCK integration.
    pub fn options_method(
        &self,
        logical_id: &str,
        rest_api: Value,
        resource_id: Value,
    ) -> ResourceNode {
        let quoted = |value: String| Value::String(format!("'{}'", value));
        let mut response_parameters = serde_json::Map::new();
        let mut method_parameters = serde_json::Map::new();
        for (name, value) in self.preflight_headers(None) {
            let key = format!("method.response.header.{}", name);
            response_parameters.insert(key.clone(), quoted(value));
            method_parameters.insert(key, Value::Bool(true));
        }
        let status = self.status_code.to_string();

        ResourceNode::new(
            logical_id,
            Component::FrontDoor,
            "AWS::ApiGateway::Method",
            json!({
                "HttpMethod": "OPTIONS",
                "ResourceId": resource_id,
                "RestApiId": rest_api,
                "AuthorizationType": "NONE",
                "Integration": {
                    "Type": "MOCK",
                    "RequestTemplates": { "application/json": "{ statusCode: 200 }" },
                    "IntegrationResponses": [{
                        "StatusCode": status,
                        "ResponseParameters": response_parameters,
                    }],
                },
                "MethodResponses": [{
                    "StatusCode": status,
                    "ResponseParameters": method_parameters,
                }],
            }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::intrinsic;

    #[test]
    fn test_default_preflight_headers() {
        let headers = CorsOptions::default().preflight_headers(Some("https://example.com"));
        let get = |name: &str| {
            headers
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str())
        };
        assert_eq!(get("Access-Control-Allow-Origin"), Some("*"));
        assert_eq!(
            get("Access-Control-Allow-Methods"),
            Some("OPTIONS,GET,PUT,POST,DELETE,PATCH,HEAD")
        );
        assert_eq!(
            get("Access-Control-Allow-Headers"),
            Some("Content-Type,X-Amz-Date,Authorization,X-Api-Key,X-Amz-Security-Token,X-Amz-User-Agent")
        );
        assert_eq!(get("Vary"), None);
    }

    #[test]
    fn test_specific_origins_echo_and_vary() {
        let cors = CorsOptions {
            allow_origins: vec!["http://localhost:3000".into(), "https://app.example.com".into()],
            ..CorsOptions::default()
        };
        let headers = cors.preflight_headers(Some("https://app.example.com"));
        assert!(headers.contains(&(
            "Access-Control-Allow-Origin".into(),
            "https://app.example.com".into()
        )));
        assert!(headers.contains(&("Vary".into(), "Origin".into())));

        let headers = cors.preflight_headers(Some("https://evil.example.com"));
        assert!(headers.contains(&(
            "Access-Control-Allow-Origin".into(),
            "http://localhost:3000".into()
        )));
    }

    #[test]
    fn test_options_method_node() {
        let node = CorsOptions::default().options_method(
            "Opts",
            intrinsic::reference("Api"),
            intrinsic::get_att("Api", "RootResourceId"),
        );
        let props = &node.properties;
        assert_eq!(props["HttpMethod"], "OPTIONS");
        assert_eq!(props["Integration"]["Type"], "MOCK");
        assert_eq!(props["Integration"]["IntegrationResponses"][0]["StatusCode"], "200");
        assert_eq!(
            props["Integration"]["IntegrationResponses"][0]["ResponseParameters"]
                ["method.response.header.Access-Control-Allow-Origin"],
            "'*'"
        );
        assert_eq!(
            props["MethodResponses"][0]["ResponseParameters"]
                ["method.response.header.Access-Control-Allow-Methods"],
            true
        );
    }
}
