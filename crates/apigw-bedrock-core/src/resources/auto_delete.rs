//! Emptying the result bucket before it is deleted.
//!
//! The provider can only delete empty buckets, so a destroy-on-teardown bucket
//! carries a custom resource whose delete handler removes every object version.
//! The custom resource depends on the bucket, its policy and the handler, so
//! teardown deletes it (and runs the handler) before any of them.

use super::role::{BASIC_EXECUTION_POLICY, LAMBDA_SERVICE};
use super::{ids, Component, ResourceNode};
use crate::arn;
use crate::template::intrinsic::{get_att, join, reference};
use serde_json::{json, Value};

pub const RESOURCE_TYPE: &str = "Custom::S3AutoDeleteObjects";
pub const HANDLER_RUNTIME: &str = "python3.12";
pub const HANDLER_TIMEOUT_SECS: u32 = 900;

/// Actions the handler's role gets on the bucket through the bucket policy.
pub const PURGE_ACTIONS: &[&str] = &[
    "s3:PutBucketPolicy",
    "s3:GetBucket*",
    "s3:List*",
    "s3:DeleteObject*",
];

const HANDLER_SOURCE: &str = r#"import boto3
import cfnresponse

s3 = boto3.client("s3")


def handler(event, context):
    try:
        if event["RequestType"] == "Delete":
            bucket = event["ResourceProperties"]["BucketName"]
            pages = s3.get_paginator("list_object_versions").paginate(Bucket=bucket)
            for page in pages:
                objects = [
                    {"Key": o["Key"], "VersionId": o["VersionId"]}
                    for o in page.get("Versions", []) + page.get("DeleteMarkers", [])
                ]
                if objects:
                    s3.delete_objects(Bucket=bucket, Delete={"Objects": objects, "Quiet": True})
        cfnresponse.send(event, context, cfnresponse.SUCCESS, {})
    except Exception as e:
        cfnresponse.send(event, context, cfnresponse.FAILED, {"Error": str(e)})
"#;

fn bucket_arn() -> Value {
    get_att(ids::BUCKET, "Arn")
}

/// Provider role, handler, bucket policy and the custom resource itself.
pub fn nodes() -> Vec<ResourceNode> {
    let provider_role = ResourceNode::new(
        ids::AUTO_DELETE_PROVIDER_ROLE,
        Component::ResultStore,
        "AWS::IAM::Role",
        json!({
            "AssumeRolePolicyDocument": {
                "Version": "2012-10-17",
                "Statement": [{
                    "Effect": "Allow",
                    "Principal": { "Service": LAMBDA_SERVICE },
                    "Action": "sts:AssumeRole",
                }],
            },
            "ManagedPolicyArns": [arn::managed_policy_arn(BASIC_EXECUTION_POLICY)],
        }),
    );

    let provider = ResourceNode::new(
        ids::AUTO_DELETE_PROVIDER,
        Component::ResultStore,
        "AWS::Lambda::Function",
        json!({
            "Code": { "ZipFile": HANDLER_SOURCE },
            "Handler": "index.handler",
            "Runtime": HANDLER_RUNTIME,
            "Timeout": HANDLER_TIMEOUT_SECS,
            "MemorySize": 128,
            "Role": get_att(ids::AUTO_DELETE_PROVIDER_ROLE, "Arn"),
            "Description": format!("Lambda function for auto-deleting objects in {}", ids::BUCKET),
        }),
    )
    .depends_on([ids::AUTO_DELETE_PROVIDER_ROLE]);

    let bucket_policy = ResourceNode::new(
        ids::BUCKET_POLICY,
        Component::ResultStore,
        "AWS::S3::BucketPolicy",
        json!({
            "Bucket": reference(ids::BUCKET),
            "PolicyDocument": {
                "Version": "2012-10-17",
                "Statement": [{
                    "Effect": "Allow",
                    "Principal": { "AWS": get_att(ids::AUTO_DELETE_PROVIDER_ROLE, "Arn") },
                    "Action": PURGE_ACTIONS,
                    "Resource": [bucket_arn(), join("", vec![bucket_arn(), json!("/*")])],
                }],
            },
        }),
    )
    .depends_on([ids::BUCKET, ids::AUTO_DELETE_PROVIDER_ROLE]);

    let custom = ResourceNode::new(
        ids::AUTO_DELETE_OBJECTS,
        Component::ResultStore,
        RESOURCE_TYPE,
        json!({
            "ServiceToken": get_att(ids::AUTO_DELETE_PROVIDER, "Arn"),
            "BucketName": reference(ids::BUCKET),
        }),
    )
    .depends_on([ids::BUCKET, ids::BUCKET_POLICY, ids::AUTO_DELETE_PROVIDER]);

    vec![provider_role, provider, bucket_policy, custom]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn find<'a>(nodes: &'a [ResourceNode], id: &str) -> &'a ResourceNode {
        nodes.iter().find(|n| n.logical_id == id).unwrap()
    }

    #[test]
    fn test_custom_resource_depends_on_what_it_uses() {
        let nodes = nodes();
        let custom = find(&nodes, ids::AUTO_DELETE_OBJECTS);
        assert_eq!(custom.resource_type, RESOURCE_TYPE);
        assert_eq!(
            custom.depends_on,
            vec![ids::BUCKET, ids::BUCKET_POLICY, ids::AUTO_DELETE_PROVIDER]
        );
        assert_eq!(custom.properties["BucketName"], json!({ "Ref": ids::BUCKET }));
        assert_eq!(
            custom.properties["ServiceToken"],
            json!({ "Fn::GetAtt": [ids::AUTO_DELETE_PROVIDER, "Arn"] })
        );
    }

    #[test]
    fn test_bucket_policy_lets_handler_purge() {
        let nodes = nodes();
        let policy = find(&nodes, ids::BUCKET_POLICY);
        let statement = &policy.properties["PolicyDocument"]["Statement"][0];
        assert_eq!(
            statement["Principal"]["AWS"],
            json!({ "Fn::GetAtt": [ids::AUTO_DELETE_PROVIDER_ROLE, "Arn"] })
        );
        assert!(statement["Action"]
            .as_array()
            .unwrap()
            .contains(&json!("s3:DeleteObject*")));
        assert_eq!(statement["Resource"][1]["Fn::Join"][1][1], "/*");
    }

    #[test]
    fn test_handler_runs_inline() {
        let nodes = nodes();
        let provider = find(&nodes, ids::AUTO_DELETE_PROVIDER);
        let code = provider.properties["Code"]["ZipFile"].as_str().unwrap();
        assert!(code.contains("delete_objects"));
        assert!(code.contains("cfnresponse.SUCCESS"));
        assert_eq!(provider.depends_on, vec![ids::AUTO_DELETE_PROVIDER_ROLE]);
    }
}
