// SPDX-License-Identifier: MIT OR Apache-2.0
//! Registry of node types and the behaviors bound to them.

use crate::evaluation::NodeBehavior;
use crate::graph::Graph;
use crate::node::{Node, NodeCategory, NodeId, NodeType};
use indexmap::IndexMap;

/// Builds the behavior for one node, reading its settings once
pub type BehaviorFactory = Box<dyn Fn(&Node) -> Box<dyn NodeBehavior>>;

/// Registry of available node types
pub struct NodeRegistry {
    /// Registered node types by ID
    types: IndexMap<String, NodeType>,
    /// Behavior factories by type ID
    factories: IndexMap<String, BehaviorFactory>,
}

impl NodeRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            types: IndexMap::new(),
            factories: IndexMap::new(),
        }
    }

    /// Register a node type with its behavior factory
    pub fn register<F>(&mut self, node_type: NodeType, factory: F)
    where
        F: Fn(&Node) -> Box<dyn NodeBehavior> + 'static,
    {
        self.factories.insert(node_type.id.clone(), Box::new(factory));
        self.types.insert(node_type.id.clone(), node_type);
    }

    /// Get a node type by ID
    pub fn get(&self, id: &str) -> Option<&NodeType> {
        self.types.get(id)
    }

    /// Get all registered types
    pub fn types(&self) -> impl Iterator<Item = &NodeType> {
        self.types.values()
    }

    /// Get types by category
    pub fn types_in_category(&self, category: NodeCategory) -> impl Iterator<Item = &NodeType> {
        self.types.values().filter(move |t| t.category == category)
    }

    /// Create a node from a type ID
    pub fn create_node(&self, type_id: &str) -> Option<Node> {
        self.get(type_id).map(Node::new)
    }

    /// Build the behavior for a node
    pub fn instantiate(&self, node: &Node) -> Result<Box<dyn NodeBehavior>, BindError> {
        let factory = self.factories.get(&node.node_type).ok_or_else(|| BindError::UnknownNodeType {
            node: node.id,
            type_id: node.node_type.clone(),
        })?;
        Ok(factory(node))
    }

    /// Build behaviors for every node of a graph
    pub fn bind(&self, graph: &Graph) -> Result<BehaviorTable, BindError> {
        let mut table = BehaviorTable::default();
        table.sync(graph, self)?;
        Ok(table)
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Behaviors bound to the nodes of one graph
#[derive(Default)]
pub struct BehaviorTable {
    behaviors: IndexMap<NodeId, Box<dyn NodeBehavior>>,
}

impl BehaviorTable {
    /// Bind new nodes and drop behaviors of removed ones
    pub fn sync(&mut self, graph: &Graph, registry: &NodeRegistry) -> Result<(), BindError> {
        self.behaviors.retain(|id, _| graph.node(*id).is_some());
        for node in graph.nodes() {
            if !self.behaviors.contains_key(&node.id) {
                let behavior = registry.instantiate(node)?;
                tracing::debug!("Bound behavior '{}' to node {:?}", node.node_type, node.id);
                self.behaviors.insert(node.id, behavior);
            }
        }
        Ok(())
    }

    /// Behavior of a node
    pub fn get_mut(&mut self, node_id: NodeId) -> Option<&mut (dyn NodeBehavior + 'static)> {
        self.behaviors.get_mut(&node_id).map(Box::as_mut)
    }

    /// Reset the progress of every node
    pub fn reset_all(&mut self) {
        for behavior in self.behaviors.values_mut() {
            behavior.reset();
        }
    }

    /// Number of bound behaviors
    pub fn len(&self) -> usize {
        self.behaviors.len()
    }

    /// Whether no behavior is bound
    pub fn is_empty(&self) -> bool {
        self.behaviors.is_empty()
    }
}

/// Error when binding behaviors to a graph
#[derive(Debug, thiserror::Error)]
pub enum BindError {
    /// Node type is not registered
    #[error("Unknown node type '{type_id}' on node {node:?}")]
    UnknownNodeType {
        /// Offending node
        node: NodeId,
        /// Type ID the node refers to
        type_id: String,
    },
}
