//! Execution role for the compute function.

use super::{ids, Component, ResourceNode};
use crate::arn;
use crate::error::{Result, StackError};
use crate::policy::{evaluate, CallerPrincipal, PolicyDocument, Principal, RequestContext, Statement};
use crate::template::intrinsic::{get_att, join};
use indexmap::IndexMap;
use serde_json::{json, Value};
use std::collections::BTreeSet;

pub const LAMBDA_SERVICE: &str = "lambda.amazonaws.com";
pub const BASIC_EXECUTION_POLICY: &str = "service-role/AWSLambdaBasicExecutionRole";

pub const INVOKE_MODEL_POLICY: &str = "BedrockInvokeModel";
pub const OBJECT_ACCESS_POLICY: &str = "S3PutObject";

/// One (action, resource) pair the role grants.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Capability {
    pub action: String,
    pub resource: String,
}

impl Capability {
    fn new(action: &str, resource: &str) -> Self {
        Self {
            action: action.to_string(),
            resource: resource.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionRole {
    pub name: String,
    pub account: String,
    pub trust: PolicyDocument,
    /// Managed policies by name, with the statements they grant.
    pub managed: IndexMap<String, PolicyDocument>,
    pub inline: IndexMap<String, PolicyDocument>,
}

impl ExecutionRole {
    pub fn new(name: &str, account: &str, bucket: &str) -> Self {
        let trust = PolicyDocument::new(vec![Statement::allow()
            .principal(Principal::service(LAMBDA_SERVICE))
            .actions(["sts:AssumeRole"])]);

        let mut managed = IndexMap::new();
        managed.insert(
            BASIC_EXECUTION_POLICY.to_string(),
            PolicyDocument::new(vec![Statement::allow()
                .actions([
                    "logs:CreateLogGroup",
                    "logs:CreateLogStream",
                    "logs:PutLogEvents",
                ])
                .resources(["*"])]),
        );

        let mut inline = IndexMap::new();
        inline.insert(
            INVOKE_MODEL_POLICY.to_string(),
            PolicyDocument::new(vec![Statement::allow()
                .actions(["bedrock:InvokeModel"])
                .resources([arn::pinned_model_arn()])]),
        );
        inline.insert(
            OBJECT_ACCESS_POLICY.to_string(),
            PolicyDocument::new(vec![Statement::allow()
                .actions(["s3:GetObject", "s3:PutObject"])
                .resources([arn::object_prefix_arn(bucket)])]),
        );

        Self {
            name: name.to_string(),
            account: account.to_string(),
            trust,
            managed,
            inline,
        }
    }

    pub fn arn(&self) -> String {
        arn::role_arn(&self.account, &self.name)
    }

    pub fn can_be_assumed_by(&self, caller: &CallerPrincipal) -> bool {
        let request = RequestContext::new(caller.clone(), "sts:AssumeRole", &self.arn());
        evaluate(&[&self.trust], &request).is_allowed()
    }

    /// Check an action the function performs under this role.
    pub fn authorize(&self, action: &str, resource: &str) -> Result<()> {
        let documents: Vec<&PolicyDocument> =
            self.managed.values().chain(self.inline.values()).collect();
        let request = RequestContext::new(CallerPrincipal::Aws(self.arn()), action, resource);
        let decision = evaluate(&documents, &request);
        tracing::debug!(role = %self.name, action, resource, %decision, "Role authorization");
        if decision.is_allowed() {
            Ok(())
        } else {
            Err(StackError::AccessDenied {
                principal: self.arn(),
                action: action.to_string(),
                resource: resource.to_string(),
            })
        }
    }

    /// Everything the inline policies grant.
    pub fn capabilities(&self) -> BTreeSet<Capability> {
        self.inline
            .values()
            .flat_map(|doc| doc.statement.iter())
            .flat_map(|statement| {
                statement.action.iter().flat_map(move |action| {
                    statement
                        .resource
                        .iter()
                        .map(move |resource| Capability::new(action, resource))
                })
            })
            .collect()
    }

    pub fn validate(&self) -> Result<()> {
        self.trust.validate()?;
        for doc in self.managed.values().chain(self.inline.values()) {
            doc.validate()?;
        }
        Ok(())
    }

    pub fn to_node(&self) -> ResourceNode {
        let managed_arns: Vec<String> = self
            .managed
            .keys()
            .map(|name| arn::managed_policy_arn(name))
            .collect();
        let policies: Vec<Value> = self
            .inline
            .iter()
            .map(|(name, doc)| {
                let mut document = json!(doc);
                if name == OBJECT_ACCESS_POLICY {
                    bind_objects_to_bucket(&mut document);
                }
                json!({ "PolicyName": name, "PolicyDocument": document })
            })
            .collect();

        ResourceNode::new(
            ids::ROLE,
            Component::ExecutionRole,
            "AWS::IAM::Role",
            json!({
                "RoleName": self.name,
                "AssumeRolePolicyDocument": self.trust,
                "ManagedPolicyArns": managed_arns,
                "Policies": policies,
            }),
        )
        .depends_on([ids::BUCKET])
    }
}

/// Point object grants at the bucket resource's ARN so the template carries
/// the deployment partition instead of a literal `arn:aws`.
fn bind_objects_to_bucket(document: &mut Value) {
    let objects = join("", vec![get_att(ids::BUCKET, "Arn"), json!("/*")]);
    if let Some(statements) = document["Statement"].as_array_mut() {
        for statement in statements {
            statement["Resource"] = json!([objects.clone()]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BUCKET: &str = "acme.dev.handson-apigw-bedrock.123456789012";

    fn role() -> ExecutionRole {
        ExecutionRole::new(
            "@role-lambda-acme-dev-handson-apigw-bedrock",
            "123456789012",
            BUCKET,
        )
    }

    #[test]
    fn test_capabilities_are_exact() {
        let expected: BTreeSet<Capability> = [
            Capability::new("bedrock:InvokeModel", &arn::pinned_model_arn()),
            Capability::new("s3:GetObject", &arn::object_prefix_arn(BUCKET)),
            Capability::new("s3:PutObject", &arn::object_prefix_arn(BUCKET)),
        ]
        .into_iter()
        .collect();
        assert_eq!(role().capabilities(), expected);
        assert_eq!(
            role().managed.keys().collect::<Vec<_>>(),
            vec![BASIC_EXECUTION_POLICY]
        );
    }

    #[test]
    fn test_authorize_granted_actions() {
        let role = role();
        role.authorize("s3:PutObject", &arn::object_arn(BUCKET, "out/1.png"))
            .unwrap();
        role.authorize("s3:GetObject", &arn::object_arn(BUCKET, "out/1.png"))
            .unwrap();
        role.authorize("bedrock:InvokeModel", &arn::pinned_model_arn())
            .unwrap();
        role.authorize(
            "logs:PutLogEvents",
            &arn::log_group_arn("us-east-1", "123456789012", "/aws/lambda/f"),
        )
        .unwrap();
    }

    #[test]
    fn test_authorize_denies_everything_else() {
        let role = role();
        for (action, resource) in [
            ("s3:DeleteObject", arn::object_arn(BUCKET, "out/1.png")),
            ("s3:ListBucket", arn::bucket_arn(BUCKET)),
            ("s3:PutObject", arn::object_arn("someone-else", "k")),
            (
                "bedrock:InvokeModel",
                arn::foundation_model_arn("us-east-1", "anthropic.claude-v2"),
            ),
            (
                "bedrock:InvokeModel",
                arn::foundation_model_arn("us-west-2", arn::MODEL_ID),
            ),
            ("dynamodb:PutItem", "*".to_string()),
        ] {
            let err = role.authorize(action, &resource).unwrap_err();
            assert!(matches!(err, StackError::AccessDenied { .. }), "{action}");
        }
    }

    #[test]
    fn test_trust_is_lambda_only() {
        let role = role();
        assert!(role.can_be_assumed_by(&CallerPrincipal::Service(LAMBDA_SERVICE.into())));
        assert!(!role.can_be_assumed_by(&CallerPrincipal::Service("ec2.amazonaws.com".into())));
        assert!(!role.can_be_assumed_by(&CallerPrincipal::Anonymous));
    }

    #[test]
    fn test_node_shape() {
        let node = role().to_node();
        assert_eq!(node.depends_on, vec![ids::BUCKET]);
        assert_eq!(
            node.properties["ManagedPolicyArns"][0],
            "arn:aws:iam::aws:policy/service-role/AWSLambdaBasicExecutionRole"
        );
        assert_eq!(node.properties["Policies"][0]["PolicyName"], INVOKE_MODEL_POLICY);
        assert_eq!(node.properties["Policies"][1]["PolicyName"], OBJECT_ACCESS_POLICY);
        assert_eq!(
            node.properties["Policies"][1]["PolicyDocument"]["Statement"][0]["Resource"],
            json!([{ "Fn::Join": ["", [{ "Fn::GetAtt": [ids::BUCKET, "Arn"] }, "/*"]] }])
        );
        assert_eq!(
            node.properties["Policies"][0]["PolicyDocument"]["Statement"][0]["Resource"],
            json!([arn::pinned_model_arn()])
        );
        assert_eq!(
            node.properties["AssumeRolePolicyDocument"]["Statement"][0]["Principal"]["Service"],
            LAMBDA_SERVICE
        );
        role().validate().unwrap();
    }
}
