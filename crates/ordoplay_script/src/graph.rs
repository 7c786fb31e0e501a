// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph data structure containing nodes and connections.
//!
//! The graph is the sole owner of nodes and connections. Everything else refers
//! to them by ID, so there are no ownership cycles between nodes, ports and the
//! graph itself.

use crate::connection::{Connection, ConnectionId};
use crate::node::{EntryKind, Node, NodeId, UNSCHEDULED};
use crate::port::{PortDirection, PortId};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

/// A node graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Graph {
    /// Graph name, used to tag diagnostics
    pub name: String,
    /// Nodes in the graph
    nodes: IndexMap<NodeId, Node>,
    /// Connections between nodes
    connections: IndexMap<ConnectionId, Connection>,
    /// Bumped on every topology change
    #[serde(skip)]
    revision: u64,
}

/// Nodes where control flow splits or joins
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BranchAnalysis {
    /// Nodes with an execution output that has more than one connection
    pub begins: IndexSet<NodeId>,
    /// Nodes with an execution input that has more than one connection
    pub ends: IndexSet<NodeId>,
}

impl Graph {
    /// Create a new empty graph
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: IndexMap::new(),
            connections: IndexMap::new(),
            revision: 0,
        }
    }

    /// Topology revision; changes whenever nodes or connections change
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Add a node to the graph
    pub fn add_node(&mut self, node: Node) -> NodeId {
        let id = node.id;
        self.nodes.insert(id, node);
        self.revision += 1;
        id
    }

    /// Remove a node and its connections
    pub fn remove_node(&mut self, node_id: NodeId) -> Option<Node> {
        let removed = self.nodes.shift_remove(&node_id)?;
        self.connections.retain(|_, c| !c.involves_node(node_id));
        self.revision += 1;
        Some(removed)
    }

    /// Get a node by ID
    pub fn node(&self, node_id: NodeId) -> Option<&Node> {
        self.nodes.get(&node_id)
    }

    /// Get a mutable node by ID
    pub fn node_mut(&mut self, node_id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&node_id)
    }

    /// Get all nodes
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Get all nodes mutably
    pub fn nodes_mut(&mut self) -> impl Iterator<Item = &mut Node> {
        self.nodes.values_mut()
    }

    /// Get all node IDs
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Rank of a node, [`UNSCHEDULED`] when missing
    pub fn compute_order(&self, node_id: NodeId) -> i32 {
        self.nodes.get(&node_id).map_or(UNSCHEDULED, |n| n.compute_order)
    }

    /// Add a connection from an output port to an input port
    pub fn connect(
        &mut self,
        from_node: NodeId,
        from_port: PortId,
        to_node: NodeId,
        to_port: PortId,
    ) -> Result<ConnectionId, ConnectionError> {
        let source_node = self.nodes.get(&from_node)
            .ok_or(ConnectionError::NodeNotFound(from_node))?;
        let target_node = self.nodes.get(&to_node)
            .ok_or(ConnectionError::NodeNotFound(to_node))?;

        let source_port = source_node.port(&from_port)
            .ok_or(ConnectionError::PortNotFound(from_port))?;
        let target_port = target_node.port(&to_port)
            .ok_or(ConnectionError::PortNotFound(to_port))?;

        if source_port.direction != PortDirection::Output || !source_port.can_connect(target_port) {
            return Err(ConnectionError::IncompatiblePorts);
        }

        if !target_port.multi_connect && self.connections.values().any(|c| c.to_port == to_port) {
            return Err(ConnectionError::PortAlreadyConnected(to_port));
        }

        let exec = source_port.is_exec();

        // A looping execution chain is representable, scheduling reports it
        if from_node == to_node && !exec {
            return Err(ConnectionError::SelfLoop);
        }

        let connection = if exec {
            Connection::exec(from_node, from_port, to_node, to_port)
        } else {
            Connection::data(from_node, from_port, to_node, to_port)
        };
        let id = connection.id;
        self.connections.insert(id, connection);
        self.revision += 1;
        Ok(id)
    }

    /// Connect two ports by field name
    pub fn connect_by_name(
        &mut self,
        from_node: NodeId,
        from_name: &str,
        to_node: NodeId,
        to_name: &str,
    ) -> Result<ConnectionId, ConnectionError> {
        let from_port = self.nodes.get(&from_node)
            .ok_or(ConnectionError::NodeNotFound(from_node))?
            .outputs.iter().find(|p| p.name == from_name)
            .map(|p| p.id)
            .ok_or_else(|| ConnectionError::PortNameNotFound(from_name.to_string()))?;
        let to_port = self.nodes.get(&to_node)
            .ok_or(ConnectionError::NodeNotFound(to_node))?
            .inputs.iter().find(|p| p.name == to_name)
            .map(|p| p.id)
            .ok_or_else(|| ConnectionError::PortNameNotFound(to_name.to_string()))?;
        self.connect(from_node, from_port, to_node, to_port)
    }

    /// Remove a connection
    pub fn disconnect(&mut self, connection_id: ConnectionId) -> Option<Connection> {
        let removed = self.connections.shift_remove(&connection_id)?;
        self.revision += 1;
        Some(removed)
    }

    /// Get a connection by ID
    pub fn connection(&self, connection_id: ConnectionId) -> Option<&Connection> {
        self.connections.get(&connection_id)
    }

    /// Get all connections
    pub fn connections(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values()
    }

    /// Get connections from a specific port
    pub fn connections_from(&self, port_id: PortId) -> impl Iterator<Item = &Connection> {
        self.connections.values().filter(move |c| c.from_port == port_id)
    }

    /// Get connections to a specific port
    pub fn connections_to(&self, port_id: PortId) -> impl Iterator<Item = &Connection> {
        self.connections.values().filter(move |c| c.to_port == port_id)
    }

    /// Get connections involving a node
    pub fn connections_for_node(&self, node_id: NodeId) -> impl Iterator<Item = &Connection> {
        self.connections.values().filter(move |c| c.involves_node(node_id))
    }

    /// Get the number of connections
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Entry nodes of the given kinds, ordered by authoring position (top to bottom),
    /// then by id
    pub fn entry_nodes(&self, kinds: &[EntryKind]) -> Vec<NodeId> {
        let mut entries: Vec<&Node> = self
            .nodes
            .values()
            .filter(|n| n.category.entry_kind().is_some_and(|k| kinds.contains(&k)))
            .collect();
        entries.sort_by(|a, b| {
            a.position[1]
                .total_cmp(&b.position[1])
                .then(a.position[0].total_cmp(&b.position[0]))
                .then(a.id.cmp(&b.id))
        });
        entries.into_iter().map(|n| n.id).collect()
    }

    /// Every node reachable over one execution link from `node_id`
    pub fn possible_next_nodes(&self, node_id: NodeId) -> Vec<NodeId> {
        let mut next = IndexSet::new();
        for c in self.connections.values() {
            if c.exec && c.from_node == node_id {
                next.insert(c.to_node);
            }
        }
        next.into_iter().collect()
    }

    /// Node behind the first link of the given execution output slot
    pub fn next_node(&self, node_id: NodeId, exec_slot: usize) -> Option<NodeId> {
        let port = self.nodes.get(&node_id)?.outputs.get(exec_slot)?;
        if !port.is_exec() {
            return None;
        }
        self.connections_from(port.id).next().map(|c| c.to_node)
    }

    /// Every node feeding any input of `node_id`, control or data
    pub fn input_nodes(&self, node_id: NodeId) -> Vec<NodeId> {
        let mut sources = IndexSet::new();
        for c in self.connections.values() {
            if c.to_node == node_id {
                sources.insert(c.from_node);
            }
        }
        sources.into_iter().collect()
    }

    /// Nodes feeding the data inputs of `node_id`
    pub fn data_input_nodes(&self, node_id: NodeId) -> Vec<NodeId> {
        let mut sources = IndexSet::new();
        for c in self.connections.values() {
            if !c.exec && c.to_node == node_id {
                sources.insert(c.from_node);
            }
        }
        sources.into_iter().collect()
    }

    /// Copy the node's data output values into every connected input slot
    pub fn push_outputs(&mut self, node_id: NodeId) {
        let Some(node) = self.nodes.get(&node_id) else {
            return;
        };

        let mut deliveries = Vec::new();
        for port in node.outputs.iter().filter(|p| !p.is_exec()) {
            let Some(value) = port.value.as_ref() else {
                continue;
            };
            for c in self.connections.values().filter(|c| c.from_port == port.id) {
                deliveries.push((c.to_node, c.to_port, value.clone()));
            }
        }

        for (to_node, to_port, value) in deliveries {
            if let Some(port) = self.nodes.get_mut(&to_node).and_then(|n| n.port_mut(&to_port)) {
                port.value = Some(value);
            }
        }
    }

    /// Set every rank back to [`UNSCHEDULED`]
    pub fn reset_compute_order(&mut self) {
        for node in self.nodes.values_mut() {
            node.compute_order = UNSCHEDULED;
        }
    }

    /// Find the split and join points of the control flow
    pub fn find_branches(&self) -> BranchAnalysis {
        let mut analysis = BranchAnalysis::default();

        for node in self.nodes.values() {
            for port in node.inputs.iter().filter(|p| p.is_exec()) {
                if self.connections_to(port.id).count() > 1 {
                    analysis.ends.insert(node.id);
                }
            }
            for port in node.outputs.iter().filter(|p| p.is_exec()) {
                if self.connections_from(port.id).count() > 1 {
                    analysis.begins.insert(node.id);
                }
            }
        }

        analysis
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new("Untitled")
    }
}

/// Error when creating a connection
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// Node not found
    #[error("Node not found: {0:?}")]
    NodeNotFound(NodeId),

    /// Port not found
    #[error("Port not found: {0:?}")]
    PortNotFound(PortId),

    /// No port with that field name
    #[error("No port named '{0}'")]
    PortNameNotFound(String),

    /// Incompatible port types or directions
    #[error("Incompatible port types")]
    IncompatiblePorts,

    /// Data input already has a provider
    #[error("Port already connected: {0:?}")]
    PortAlreadyConnected(PortId),

    /// Data self-loop not allowed
    #[error("Self-loop not allowed")]
    SelfLoop,
}
