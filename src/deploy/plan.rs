//! Creation and teardown order of the stack's resources

use anyhow::Result;
use apigw_bedrock_config::StackConfig;
use apigw_bedrock_core::resources::ResourceNode;
use apigw_bedrock_core::{Stack, STACK_NAME};

pub fn run(config: StackConfig) -> Result<()> {
    let stack = super::compose(&config)?;
    print!("{}", render_plan(&stack));
    Ok(())
}

fn render_plan(stack: &Stack) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{} ({}/{}, {} resources)\n\n",
        STACK_NAME,
        stack.context.project,
        stack.context.environment,
        stack.graph().len()
    ));

    out.push_str("Create:\n");
    for (i, node) in stack.creation_order().into_iter().enumerate() {
        out.push_str(&line(i + 1, node));
    }

    out.push_str("\nTeardown:\n");
    for (i, node) in stack.teardown_order().into_iter().enumerate() {
        let mut entry = line(i + 1, node);
        if node.is_retained() {
            entry.insert_str(entry.len() - 1, "  [retained]");
        }
        out.push_str(&entry);
    }
    out
}

fn line(position: usize, node: &ResourceNode) -> String {
    format!(
        "  {:>2}. {:<28} {:<36} {}\n",
        position, node.logical_id, node.resource_type, node.component
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deploy::tests::acme_dev;
    use apigw_bedrock_config::RemovalPolicy;

    #[test]
    fn test_plan_lists_every_resource_twice() {
        let stack = super::super::compose(&acme_dev()).unwrap();
        let plan = render_plan(&stack);
        let (create, teardown) = plan.split_once("Teardown:").unwrap();

        for node in stack.graph().nodes() {
            assert!(create.contains(&node.logical_id), "{}", node.logical_id);
            assert!(teardown.contains(&node.logical_id), "{}", node.logical_id);
        }
        assert!(create.contains(" 1. BedrockResultBucket"));
        assert!(!plan.contains("[retained]"));
    }

    #[test]
    fn test_plan_marks_retained_bucket() {
        let mut config = acme_dev();
        config.removal = RemovalPolicy::Retain;
        let stack = super::super::compose(&config).unwrap();
        let plan = render_plan(&stack);
        let retained: Vec<&str> = plan.lines().filter(|l| l.contains("[retained]")).collect();
        assert_eq!(retained.len(), 1);
        assert!(retained[0].contains("BedrockResultBucket"));
    }
}
