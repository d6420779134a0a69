//! ARN construction for the resources the stack owns or references.

/// Image model the function is allowed to invoke.
pub const MODEL_ID: &str = "stability.stable-diffusion-xl-v1";

/// Region the model grant is pinned to.
pub const MODEL_REGION: &str = "us-east-1";

pub fn foundation_model_arn(region: &str, model_id: &str) -> String {
    format!("arn:aws:bedrock:{}::foundation-model/{}", region, model_id)
}

/// The one external model ARN the execution role may invoke.
pub fn pinned_model_arn() -> String {
    foundation_model_arn(MODEL_REGION, MODEL_ID)
}

pub fn bucket_arn(bucket: &str) -> String {
    format!("arn:aws:s3:::{}", bucket)
}

pub fn object_arn(bucket: &str, key: &str) -> String {
    format!("arn:aws:s3:::{}/{}", bucket, key)
}

/// Every object key under the bucket.
pub fn object_prefix_arn(bucket: &str) -> String {
    object_arn(bucket, "*")
}

pub fn managed_policy_arn(name: &str) -> String {
    format!("arn:aws:iam::aws:policy/{}", name)
}

pub fn role_arn(account: &str, role_name: &str) -> String {
    format!("arn:aws:iam::{}:role/{}", account, role_name)
}

pub fn function_arn(region: &str, account: &str, function_name: &str) -> String {
    format!(
        "arn:aws:lambda:{}:{}:function:{}",
        region, account, function_name
    )
}

pub fn log_group_arn(region: &str, account: &str, log_group: &str) -> String {
    format!(
        "arn:aws:logs:{}:{}:log-group:{}:*",
        region, account, log_group
    )
}

/// Prefix that `execute-api:/` shorthand in a resource policy expands to.
pub fn execute_api_prefix(region: &str, account: &str, api_id: &str) -> String {
    format!("arn:aws:execute-api:{}:{}:{}", region, account, api_id)
}

/// ARN of one method invocation: `<prefix>/<stage>/<METHOD>/<path>`.
pub fn execute_api_arn(
    region: &str,
    account: &str,
    api_id: &str,
    stage: &str,
    method: &str,
    path: &str,
) -> String {
    format!(
        "{}/{}/{}/{}",
        execute_api_prefix(region, account, api_id),
        stage,
        method.to_ascii_uppercase(),
        path.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_arn_is_pinned() {
        assert_eq!(
            pinned_model_arn(),
            "arn:aws:bedrock:us-east-1::foundation-model/stability.stable-diffusion-xl-v1"
        );
    }

    #[test]
    fn test_object_arns() {
        assert_eq!(object_prefix_arn("b"), "arn:aws:s3:::b/*");
        assert_eq!(object_arn("b", "x/y.png"), "arn:aws:s3:::b/x/y.png");
    }

    #[test]
    fn test_execute_api_arn() {
        assert_eq!(
            execute_api_arn("us-east-1", "123456789012", "abc123", "v1", "post", "/bedrock"),
            "arn:aws:execute-api:us-east-1:123456789012:abc123/v1/POST/bedrock"
        );
    }
}
