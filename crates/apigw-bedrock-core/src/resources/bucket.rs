//! Private result bucket.

use super::auto_delete;
use super::lifecycle::LifecycleRule;
use super::{ids, Component, ResourceNode};
use crate::arn;
use apigw_bedrock_config::RemovalPolicy;
use serde_json::json;

/// Tag marking a bucket whose objects are emptied before deletion.
pub const AUTO_DELETE_TAG: &str = "apigw-bedrock:auto-delete-objects";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublicAccessBlock {
    pub block_public_acls: bool,
    pub block_public_policy: bool,
    pub ignore_public_acls: bool,
    pub restrict_public_buckets: bool,
}

impl PublicAccessBlock {
    pub const BLOCK_ALL: Self = Self {
        block_public_acls: true,
        block_public_policy: true,
        ignore_public_acls: true,
        restrict_public_buckets: true,
    };

    pub fn flags(&self) -> [bool; 4] {
        [
            self.block_public_acls,
            self.block_public_policy,
            self.ignore_public_acls,
            self.restrict_public_buckets,
        ]
    }

    pub fn blocks_all(&self) -> bool {
        self.flags().iter().all(|flag| *flag)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultStore {
    pub name: String,
    pub public_access: PublicAccessBlock,
    pub lifecycle: LifecycleRule,
    pub removal: RemovalPolicy,
}

impl ResultStore {
    pub fn new(name: &str, removal: RemovalPolicy) -> Self {
        Self {
            name: name.to_string(),
            public_access: PublicAccessBlock::BLOCK_ALL,
            lifecycle: LifecycleRule::default(),
            removal,
        }
    }

    pub fn arn(&self) -> String {
        arn::bucket_arn(&self.name)
    }

    pub fn objects_arn(&self) -> String {
        arn::object_prefix_arn(&self.name)
    }

    /// Teardown removes the bucket together with everything in it.
    pub fn auto_delete_objects(&self) -> bool {
        self.removal == RemovalPolicy::Destroy
    }

    pub fn to_node(&self) -> ResourceNode {
        let block = &self.public_access;
        let mut properties = json!({
            "BucketName": self.name,
            "AccessControl": "Private",
            "PublicAccessBlockConfiguration": {
                "BlockPublicAcls": block.block_public_acls,
                "BlockPublicPolicy": block.block_public_policy,
                "IgnorePublicAcls": block.ignore_public_acls,
                "RestrictPublicBuckets": block.restrict_public_buckets,
            },
            "BucketEncryption": {
                "ServerSideEncryptionConfiguration": [{
                    "ServerSideEncryptionByDefault": { "SSEAlgorithm": "aws:kms" }
                }]
            },
            "LifecycleConfiguration": { "Rules": [self.lifecycle.to_template()] },
        });
        if self.auto_delete_objects() {
            properties["Tags"] = json!([{ "Key": AUTO_DELETE_TAG, "Value": "true" }]);
        }

        ResourceNode::new(ids::BUCKET, Component::ResultStore, "AWS::S3::Bucket", properties)
            .deletion(self.removal)
    }

    /// The bucket plus, when teardown destroys it, the resources that empty it.
    pub fn nodes(&self) -> Vec<ResourceNode> {
        let mut nodes = vec![self.to_node()];
        if self.auto_delete_objects() {
            nodes.extend(auto_delete::nodes());
        }
        nodes
    }
}
