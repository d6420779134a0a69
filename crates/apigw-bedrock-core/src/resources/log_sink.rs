//! Access log destination and the per-request entry it receives.

use super::{ids, Component, ResourceNode};
use apigw_bedrock_config::RemovalPolicy;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Access log keys and the `$context` variables that fill them.
pub const ACCESS_LOG_FIELDS: [(&str, &str); 13] = [
    ("resourceId", "$context.resourceId"),
    ("requestId", "$context.requestId"),
    ("ip", "$context.identity.sourceIp"),
    ("user", "$context.identity.user"),
    ("caller", "$context.identity.caller"),
    ("requestTime", "$context.requestTime"),
    ("httpMethod", "$context.httpMethod"),
    ("resourcePath", "$context.resourcePath"),
    ("status", "$context.status"),
    ("protocol", "$context.protocol"),
    ("responseLength", "$context.responseLength"),
    ("integrationLatency", "$context.integrationLatency"),
    ("responseLatency", "$context.responseLatency"),
];

/// JSON access log format. Numeric fields are left unquoted.
pub fn access_log_format() -> String {
    let numeric = ["status", "responseLength", "integrationLatency", "responseLatency"];
    let fields: Vec<String> = ACCESS_LOG_FIELDS
        .iter()
        .map(|(key, variable)| {
            if numeric.contains(key) {
                format!("\"{}\":{}", key, variable)
            } else {
                format!("\"{}\":\"{}\"", key, variable)
            }
        })
        .collect();
    format!("{{{}}}", fields.join(","))
}

/// One line written to the sink per request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessLogEntry {
    pub resource_id: String,
    pub request_id: String,
    pub ip: String,
    pub user: String,
    pub caller: String,
    pub request_time: String,
    pub http_method: String,
    pub resource_path: String,
    pub status: u16,
    pub protocol: String,
    pub response_length: usize,
    pub integration_latency: u64,
    pub response_latency: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSink {
    pub name: String,
}

impl LogSink {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }

    /// The log group always goes away with the stack.
    pub fn to_node(&self) -> ResourceNode {
        ResourceNode::new(
            ids::LOG_GROUP,
            Component::AccessLogSink,
            "AWS::Logs::LogGroup",
            json!({ "LogGroupName": self.name }),
        )
        .deletion(RemovalPolicy::Destroy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_is_valid_json_template() {
        let format = access_log_format();
        // Unquoted numeric variables are not JSON until substituted.
        let substituted = format
            .replace("$context.status", "200")
            .replace("$context.responseLength", "12")
            .replace("$context.integrationLatency", "40")
            .replace("$context.responseLatency", "45");
        let value: serde_json::Value = serde_json::from_str(&substituted).unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(object.len(), 13);
        assert_eq!(object["ip"], "$context.identity.sourceIp");
        assert_eq!(object["status"], 200);
    }

    #[test]
    fn test_entry_keys_match_format() {
        let entry = AccessLogEntry {
            resource_id: "abc123".into(),
            request_id: "r".into(),
            ip: "203.0.113.5".into(),
            user: "-".into(),
            caller: "-".into(),
            request_time: "01/Jan/2024:00:00:00 +0000".into(),
            http_method: "POST".into(),
            resource_path: "/bedrock".into(),
            status: 200,
            protocol: "HTTP/1.1".into(),
            response_length: 2,
            integration_latency: 1,
            response_latency: 2,
        };
        let value = serde_json::to_value(&entry).unwrap();
        for (key, _) in ACCESS_LOG_FIELDS {
            assert!(value.get(key).is_some(), "missing {key}");
        }
    }

    #[test]
    fn test_log_group_destroyed_with_stack() {
        let node = LogSink::new("acme-dev-handson-apigw-bedrock").to_node();
        assert_eq!(node.deletion, Some(RemovalPolicy::Destroy));
        assert_eq!(node.properties["LogGroupName"], "acme-dev-handson-apigw-bedrock");
    }
}
