//! Resource dependency graph.
//!
//! Nodes are indexed by insertion position; an edge `a -> b` means `a` must
//! exist before `b`. Creation order is a topological sort that breaks ties by
//! declaration order, teardown its reverse.

use crate::error::{Result, StackError};
use crate::resources::ResourceNode;
use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use petgraph::Direction;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

#[derive(Debug, Clone)]
pub struct ResourceGraph {
    nodes: Vec<ResourceNode>,
    index: HashMap<String, usize>,
    edges: DiGraphMap<usize, ()>,
    order: Vec<usize>,
}

impl ResourceGraph {
    /// Build and validate the graph: unique ids, known dependencies, no cycles.
    pub fn new(nodes: Vec<ResourceNode>) -> Result<Self> {
        let mut index = HashMap::with_capacity(nodes.len());
        let mut edges = DiGraphMap::new();

        for (idx, node) in nodes.iter().enumerate() {
            if index.insert(node.logical_id.clone(), idx).is_some() {
                return Err(StackError::DuplicateResource {
                    logical_id: node.logical_id.clone(),
                });
            }
            edges.add_node(idx);
        }

        for (idx, node) in nodes.iter().enumerate() {
            for dependency in &node.depends_on {
                let Some(&dep_idx) = index.get(dependency) else {
                    return Err(StackError::UnknownDependency {
                        logical_id: node.logical_id.clone(),
                        dependency: dependency.clone(),
                    });
                };
                if dep_idx == idx {
                    return Err(StackError::GraphCycle {
                        logical_id: node.logical_id.clone(),
                    });
                }
                edges.add_edge(dep_idx, idx, ());
            }
        }

        toposort(&edges, None).map_err(|cycle| StackError::GraphCycle {
            logical_id: nodes[cycle.node_id()].logical_id.clone(),
        })?;
        let order = declaration_ordered_sort(&edges, nodes.len());

        tracing::debug!(nodes = nodes.len(), edges = edges.edge_count(), "Resource graph built");

        Ok(Self {
            nodes,
            index,
            edges,
            order,
        })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, logical_id: &str) -> Option<&ResourceNode> {
        self.index.get(logical_id).map(|idx| &self.nodes[*idx])
    }

    /// Nodes in declaration order.
    pub fn nodes(&self) -> &[ResourceNode] {
        &self.nodes
    }

    pub fn creation_order(&self) -> Vec<&ResourceNode> {
        self.order.iter().map(|idx| &self.nodes[*idx]).collect()
    }

    pub fn teardown_order(&self) -> Vec<&ResourceNode> {
        self.order.iter().rev().map(|idx| &self.nodes[*idx]).collect()
    }

    /// Resources that depend directly on `logical_id`.
    pub fn dependents(&self, logical_id: &str) -> Vec<&ResourceNode> {
        self.neighbors(logical_id, Direction::Outgoing)
    }

    /// Resources `logical_id` depends on directly.
    pub fn dependencies(&self, logical_id: &str) -> Vec<&ResourceNode> {
        self.neighbors(logical_id, Direction::Incoming)
    }

    fn neighbors(&self, logical_id: &str, direction: Direction) -> Vec<&ResourceNode> {
        let Some(&idx) = self.index.get(logical_id) else {
            return Vec::new();
        };
        let mut found: Vec<usize> = self.edges.neighbors_directed(idx, direction).collect();
        found.sort_unstable();
        found.into_iter().map(|i| &self.nodes[i]).collect()
    }
}

/// Kahn's algorithm over an acyclic graph, always taking the earliest
/// declared node among those whose dependencies are met.
fn declaration_ordered_sort(edges: &DiGraphMap<usize, ()>, len: usize) -> Vec<usize> {
    let mut pending: Vec<usize> = (0..len)
        .map(|idx| edges.neighbors_directed(idx, Direction::Incoming).count())
        .collect();
    let mut ready: BinaryHeap<Reverse<usize>> = pending
        .iter()
        .enumerate()
        .filter(|(_, count)| **count == 0)
        .map(|(idx, _)| Reverse(idx))
        .collect();

    let mut order = Vec::with_capacity(len);
    while let Some(Reverse(idx)) = ready.pop() {
        order.push(idx);
        for next in edges.neighbors_directed(idx, Direction::Outgoing) {
            pending[next] -= 1;
            if pending[next] == 0 {
                ready.push(Reverse(next));
            }
        }
    }
    order
}
