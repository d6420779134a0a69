//! Provisioning lifecycle of the stack's resources.
//!
//! Each resource moves not-created -> created -> (updated) -> destroyed, or
//! to retained when its removal policy keeps it. Deploy walks the creation
//! order; teardown walks the reverse. Deleting the auto-delete custom resource
//! empties the bucket. A bucket that still holds objects when its turn comes
//! cannot be deleted and stays behind as orphaned.

use super::object_store::MemoryObjectStore;
use crate::error::{Result, StackError};
use crate::graph::ResourceGraph;
use crate::resources::{ids, ResourceNode};
use crate::stack::Stack;
use indexmap::IndexMap;
use std::fmt;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceState {
    NotCreated,
    Created,
    Updated,
    Destroyed,
    Retained,
}

impl ResourceState {
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Created | Self::Updated)
    }
}

impl fmt::Display for ResourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotCreated => "not-created",
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Destroyed => "destroyed",
            Self::Retained => "retained",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
struct Tracked {
    retain: bool,
    state: ResourceState,
}

/// Outcome of a teardown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeardownReport {
    pub destroyed: Vec<String>,
    pub retained: Vec<String>,
    pub objects_deleted: usize,
    /// Resources still live after teardown.
    pub orphaned: Vec<String>,
}

impl TeardownReport {
    /// Nothing left behind at all.
    pub fn is_clean(&self) -> bool {
        self.orphaned.is_empty() && self.retained.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Deployment {
    resources: IndexMap<String, Tracked>,
    creation: Vec<String>,
}

impl Deployment {
    /// Track every resource of `stack`, none created yet.
    pub fn plan(stack: &Stack) -> Self {
        Self::from_graph(stack.graph())
    }

    pub fn from_graph(graph: &ResourceGraph) -> Self {
        let order = graph.creation_order();
        let creation: Vec<String> = order.iter().map(|n| n.logical_id.clone()).collect();
        let resources = order
            .into_iter()
            .map(|node: &ResourceNode| {
                (
                    node.logical_id.clone(),
                    Tracked {
                        retain: node.is_retained(),
                        state: ResourceState::NotCreated,
                    },
                )
            })
            .collect();
        Self {
            resources,
            creation,
        }
    }

    pub fn state(&self, logical_id: &str) -> Option<ResourceState> {
        self.resources.get(logical_id).map(|t| t.state)
    }

    pub fn live_resources(&self) -> Vec<&str> {
        self.resources
            .iter()
            .filter(|(_, t)| t.state.is_live())
            .map(|(id, _)| id.as_str())
            .collect()
    }

    /// Create every resource in creation order. Returns the ids created.
    pub fn deploy(&mut self) -> Result<Vec<String>> {
        if let Some((id, tracked)) = self.resources.iter().find(|(_, t)| t.state.is_live()) {
            return Err(transition_error(id, "create", tracked.state));
        }
        for id in &self.creation {
            if let Some(tracked) = self.resources.get_mut(id) {
                tracked.state = ResourceState::Created;
            }
        }
        info!(resources = self.creation.len(), "Deployed stack");
        Ok(self.creation.clone())
    }

    /// In-place update of a live resource.
    pub fn update(&mut self, logical_id: &str) -> Result<()> {
        let tracked = self.resources.get_mut(logical_id).ok_or_else(|| StackError::InvalidTransition {
            logical_id: logical_id.to_string(),
            operation: "update",
            state: "undeclared".to_string(),
        })?;
        if !tracked.state.is_live() {
            return Err(transition_error(logical_id, "update", tracked.state));
        }
        tracked.state = ResourceState::Updated;
        Ok(())
    }

    /// Remove everything in reverse creation order.
    pub fn teardown(&mut self, store: Option<&MemoryObjectStore>) -> Result<TeardownReport> {
        let mut report = TeardownReport::default();

        for id in self.creation.iter().rev() {
            let Some(tracked) = self.resources.get_mut(id) else {
                continue;
            };
            if !tracked.state.is_live() {
                continue;
            }

            if tracked.retain {
                tracked.state = ResourceState::Retained;
                report.retained.push(id.clone());
                continue;
            }

            if id == ids::AUTO_DELETE_OBJECTS {
                if let Some(store) = store {
                    report.objects_deleted += store.purge();
                }
            }
            if id == ids::BUCKET && store.is_some_and(|store| !store.is_empty()) {
                warn!(logical_id = %id, "Bucket is not empty and cannot be deleted");
                continue;
            }
            tracked.state = ResourceState::Destroyed;
            report.destroyed.push(id.clone());
        }

        report.orphaned = self
            .live_resources()
            .into_iter()
            .map(str::to_string)
            .collect();
        if !report.orphaned.is_empty() {
            warn!(orphaned = ?report.orphaned, "Resources left behind after teardown");
        }
        if !report.retained.is_empty() {
            warn!(retained = ?report.retained, "Resources retained after teardown");
        }
        info!(
            destroyed = report.destroyed.len(),
            objects_deleted = report.objects_deleted,
            "Tore down stack"
        );
        Ok(report)
    }
}

fn transition_error(logical_id: &str, operation: &'static str, state: ResourceState) -> StackError {
    StackError::InvalidTransition {
        logical_id: logical_id.to_string(),
        operation,
        state: state.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::tests::acme_dev;
    use crate::resources::ids;
    use crate::resources::ResultStore;
    use crate::runtime::object_store::ManualClock;
    use apigw_bedrock_config::RemovalPolicy;
    use std::sync::Arc;

    #[test]
    fn test_full_lifecycle() {
        let stack = Stack::from_context(acme_dev()).unwrap();
        let mut deployment = Deployment::plan(&stack);
        assert_eq!(deployment.state(ids::BUCKET), Some(ResourceState::NotCreated));

        let created = deployment.deploy().unwrap();
        assert_eq!(created.len(), 18);
        assert_eq!(created[0], ids::BUCKET);
        assert_eq!(created[4], ids::AUTO_DELETE_OBJECTS);
        assert_eq!(created[5], ids::ROLE);

        deployment.update(ids::FUNCTION).unwrap();
        assert_eq!(deployment.state(ids::FUNCTION), Some(ResourceState::Updated));

        let report = deployment.teardown(None).unwrap();
        assert!(report.is_clean());
        assert_eq!(report.destroyed.len(), 18);
        assert_eq!(report.destroyed.last().map(String::as_str), Some(ids::BUCKET));
        assert!(deployment.live_resources().is_empty());
    }

    #[test]
    fn test_invalid_transitions() {
        let stack = Stack::from_context(acme_dev()).unwrap();
        let mut deployment = Deployment::plan(&stack);
        assert!(matches!(
            deployment.update(ids::FUNCTION),
            Err(StackError::InvalidTransition { operation: "update", .. })
        ));
        deployment.deploy().unwrap();
        assert!(deployment.deploy().is_err());
        assert!(deployment.update("Nope").is_err());

        deployment.teardown(None).unwrap();
        assert!(deployment.update(ids::FUNCTION).is_err());
        // Recreate after a teardown.
        deployment.deploy().unwrap();
    }

    #[test]
    fn test_teardown_empties_bucket() {
        let stack = Stack::from_context(acme_dev()).unwrap();
        let store = MemoryObjectStore::new(&stack.store.name, Arc::new(ManualClock::default()));
        store.put("a.png", vec![1]);
        store.put("b.png", vec![2]);

        let mut deployment = Deployment::plan(&stack);
        deployment.deploy().unwrap();
        let report = deployment.teardown(Some(&store)).unwrap();
        assert_eq!(report.objects_deleted, 2);
        assert!(store.is_empty());
        assert!(report.is_clean());

        let purged_at = report
            .destroyed
            .iter()
            .position(|id| id == ids::AUTO_DELETE_OBJECTS)
            .unwrap();
        let bucket_at = report.destroyed.iter().position(|id| id == ids::BUCKET).unwrap();
        assert!(purged_at < bucket_at);
    }

    #[test]
    fn test_bucket_without_auto_delete_is_orphaned() {
        let store = ResultStore::new("acme.dev.handson-apigw-bedrock.123456789012", RemovalPolicy::Destroy);
        let graph = ResourceGraph::new(vec![store.to_node()]).unwrap();
        let objects = MemoryObjectStore::new(&store.name, Arc::new(ManualClock::default()));
        objects.put("a.png", vec![1]);

        let mut deployment = Deployment::from_graph(&graph);
        deployment.deploy().unwrap();
        let report = deployment.teardown(Some(&objects)).unwrap();

        assert_eq!(report.orphaned, vec![ids::BUCKET]);
        assert!(report.destroyed.is_empty());
        assert_eq!(report.objects_deleted, 0);
        assert!(!report.is_clean());
        assert_eq!(deployment.state(ids::BUCKET), Some(ResourceState::Created));
        assert!(objects.get("a.png").is_some());
    }

    #[test]
    fn test_empty_bucket_without_auto_delete_is_destroyed() {
        let store = ResultStore::new("acme.dev.handson-apigw-bedrock.123456789012", RemovalPolicy::Destroy);
        let graph = ResourceGraph::new(vec![store.to_node()]).unwrap();
        let objects = MemoryObjectStore::new(&store.name, Arc::new(ManualClock::default()));

        let mut deployment = Deployment::from_graph(&graph);
        deployment.deploy().unwrap();
        let report = deployment.teardown(Some(&objects)).unwrap();
        assert_eq!(report.destroyed, vec![ids::BUCKET]);
        assert!(report.is_clean());
    }

    #[test]
    fn test_retained_bucket_survives() {
        let mut context = acme_dev();
        context.removal = RemovalPolicy::Retain;
        let stack = Stack::from_context(context).unwrap();
        let store = MemoryObjectStore::new(&stack.store.name, Arc::new(ManualClock::default()));
        store.put("a.png", vec![1]);

        let mut deployment = Deployment::plan(&stack);
        deployment.deploy().unwrap();
        let report = deployment.teardown(Some(&store)).unwrap();
        assert_eq!(report.retained, vec![ids::BUCKET]);
        assert_eq!(report.objects_deleted, 0);
        assert!(report.orphaned.is_empty());
        assert!(!report.is_clean());
        assert_eq!(deployment.state(ids::BUCKET), Some(ResourceState::Retained));
        assert!(store.get("a.png").is_some());
    }
}
