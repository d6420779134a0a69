//! Compute function declaration.

use super::{ids, Component, ResourceNode};
use crate::template::intrinsic;
use indexmap::IndexMap;
use serde_json::json;

pub const CODE_ASSET_PATH: &str = "../src/lambda/handson-bedrock";
pub const HANDLER: &str = "index.lambda_handler";
pub const RUNTIME: &str = "python3.12";
pub const TIMEOUT_SECS: u32 = 25;
pub const ARCHITECTURE: &str = "arm64";

pub const ENV_BUCKET_NAME: &str = "S3_BUCKET_NAME";
pub const ENV_LOG_LEVEL: &str = "LOG_LEVEL";

/// Template parameters carrying the uploaded code asset location.
pub const CODE_BUCKET_PARAMETER: &str = "FunctionCodeBucket";
pub const CODE_KEY_PARAMETER: &str = "FunctionCodeKey";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComputeFunction {
    pub name: String,
    pub code_path: String,
    pub handler: String,
    pub runtime: String,
    pub timeout_secs: u32,
    pub architecture: String,
    pub environment: IndexMap<String, String>,
}

impl ComputeFunction {
    pub fn new(name: &str, bucket: &str, log_level: &str) -> Self {
        let mut environment = IndexMap::new();
        environment.insert(ENV_BUCKET_NAME.to_string(), bucket.to_string());
        environment.insert(ENV_LOG_LEVEL.to_string(), log_level.to_string());
        Self {
            name: name.to_string(),
            code_path: CODE_ASSET_PATH.to_string(),
            handler: HANDLER.to_string(),
            runtime: RUNTIME.to_string(),
            timeout_secs: TIMEOUT_SECS,
            architecture: ARCHITECTURE.to_string(),
            environment,
        }
    }

    pub fn to_node(&self) -> ResourceNode {
        ResourceNode::new(
            ids::FUNCTION,
            Component::ComputeFunction,
            "AWS::Lambda::Function",
            json!({
                "FunctionName": self.name,
                "Code": {
                    "S3Bucket": intrinsic::reference(CODE_BUCKET_PARAMETER),
                    "S3Key": intrinsic::reference(CODE_KEY_PARAMETER),
                },
                "Handler": self.handler,
                "Runtime": self.runtime,
                "Timeout": self.timeout_secs,
                "Architectures": [self.architecture],
                "Role": intrinsic::get_att(ids::ROLE, "Arn"),
                "Environment": { "Variables": self.environment },
            }),
        )
        .depends_on([ids::ROLE, ids::BUCKET])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_contract() {
        let function = ComputeFunction::new("acme-dev-handson-apigw-bedrock", "bucket.name", "INFO");
        let node = function.to_node();
        let props = &node.properties;
        assert_eq!(props["Handler"], "index.lambda_handler");
        assert_eq!(props["Runtime"], "python3.12");
        assert_eq!(props["Timeout"], 25);
        assert_eq!(props["Architectures"], json!(["arm64"]));
        assert_eq!(
            props["Environment"]["Variables"],
            json!({ "S3_BUCKET_NAME": "bucket.name", "LOG_LEVEL": "INFO" })
        );
        assert_eq!(props["Role"], json!({ "Fn::GetAtt": [ids::ROLE, "Arn"] }));
        assert_eq!(node.depends_on, vec![ids::ROLE, ids::BUCKET]);
        assert_eq!(function.code_path, "../src/lambda/handson-bedrock");
    }
}
