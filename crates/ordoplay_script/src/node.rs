// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node definitions for the graph framework.

use crate::port::{Port, PortDirection, PortId, PortValue};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Rank of a node that no scheduling pass has reached
pub const UNSCHEDULED: i32 = -1;

/// Unique identifier for a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub Uuid);

impl NodeId {
    /// Create a new random node ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

/// Which host signal starts a walk from an entry node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryKind {
    /// Once, when the script starts
    Start,
    /// Every simulation tick
    Update,
    /// An object entered the owner's trigger volume
    TriggerEntered,
    /// An object left the owner's trigger volume
    TriggerExited,
    /// The owner collided with an object
    Collision,
    /// A named script event was raised
    Event,
    /// An object entered, stayed in or left a named zone
    ZoneEvent,
}

impl EntryKind {
    /// All entry kinds, in the order a processor registers them by default
    pub fn all() -> &'static [EntryKind] {
        &[
            EntryKind::Start,
            EntryKind::Update,
            EntryKind::TriggerEntered,
            EntryKind::TriggerExited,
            EntryKind::Collision,
            EntryKind::Event,
            EntryKind::ZoneEvent,
        ]
    }
}

/// Node category, fixed when the node is created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeCategory {
    /// Execution starter: begins a fresh control-flow walk
    Entry(EntryKind),
    /// Runs along the control path and may span several ticks
    Action,
    /// Pure value producer, pulled by its consumers
    Data,
}

impl NodeCategory {
    /// Whether the node takes part in control flow (entry or action)
    pub fn is_flow(&self) -> bool {
        !matches!(self, Self::Data)
    }

    /// Entry kind, if this is an entry node
    pub fn entry_kind(&self) -> Option<EntryKind> {
        match self {
            Self::Entry(kind) => Some(*kind),
            _ => None,
        }
    }
}

/// Node type definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeType {
    /// Unique type identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Category
    pub category: NodeCategory,
    /// Description
    pub description: String,
    /// Default input ports
    pub inputs: Vec<Port>,
    /// Default output ports
    pub outputs: Vec<Port>,
}

/// A node instance in the graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Unique instance ID
    pub id: NodeId,
    /// Node type ID
    pub node_type: String,
    /// Display name (can be customized)
    pub name: String,
    /// Category copied from the type
    pub category: NodeCategory,
    /// Authoring position, only used to order entry nodes
    pub position: [f32; 2],
    /// Input ports
    pub inputs: Vec<Port>,
    /// Output ports
    pub outputs: Vec<Port>,
    /// Per-instance configuration read when the behavior is bound
    #[serde(default)]
    pub settings: IndexMap<String, PortValue>,
    /// Scheduling rank, derived state
    #[serde(skip, default = "unscheduled")]
    pub compute_order: i32,
}

fn unscheduled() -> i32 {
    UNSCHEDULED
}

impl Node {
    /// Create a new node from a type definition
    pub fn new(node_type: &NodeType) -> Self {
        Self {
            id: NodeId::new(),
            node_type: node_type.id.clone(),
            name: node_type.name.clone(),
            category: node_type.category,
            position: [0.0, 0.0],
            inputs: node_type.inputs.iter().map(Port::instantiate).collect(),
            outputs: node_type.outputs.iter().map(Port::instantiate).collect(),
            settings: IndexMap::new(),
            compute_order: UNSCHEDULED,
        }
    }

    /// Set the position
    pub fn with_position(mut self, x: f32, y: f32) -> Self {
        self.position = [x, y];
        self
    }

    /// Set a configuration value
    pub fn with_setting(mut self, key: impl Into<String>, value: PortValue) -> Self {
        self.settings.insert(key.into(), value);
        self
    }

    /// Set the default value of an input port
    pub fn with_input_default(mut self, name: &str, value: PortValue) -> Self {
        if let Some(port) = self.inputs.iter_mut().find(|p| p.name == name) {
            port.default_value = Some(value);
        }
        self
    }

    /// Get a configuration value
    pub fn setting(&self, key: &str) -> Option<&PortValue> {
        self.settings.get(key)
    }

    /// Get an input port by index
    pub fn input(&self, index: usize) -> Option<&Port> {
        self.inputs.get(index)
    }

    /// Get an output port by index
    pub fn output(&self, index: usize) -> Option<&Port> {
        self.outputs.get(index)
    }

    /// Slot index of the input port with the given field name
    pub fn input_slot(&self, name: &str) -> Option<usize> {
        self.inputs.iter().position(|p| p.name == name)
    }

    /// Slot index of the output port with the given field name
    pub fn output_slot(&self, name: &str) -> Option<usize> {
        self.outputs.iter().position(|p| p.name == name)
    }

    /// Direction and slot index of a port
    pub fn slot_of(&self, port_id: PortId) -> Option<(PortDirection, usize)> {
        if let Some(i) = self.inputs.iter().position(|p| p.id == port_id) {
            return Some((PortDirection::Input, i));
        }
        self.outputs
            .iter()
            .position(|p| p.id == port_id)
            .map(|i| (PortDirection::Output, i))
    }

    /// Get a port by ID
    pub fn port(&self, port_id: &PortId) -> Option<&Port> {
        self.inputs.iter().find(|p| p.id == *port_id)
            .or_else(|| self.outputs.iter().find(|p| p.id == *port_id))
    }

    /// Get a mutable port by ID
    pub fn port_mut(&mut self, port_id: &PortId) -> Option<&mut Port> {
        let Self { inputs, outputs, .. } = self;
        inputs.iter_mut().chain(outputs.iter_mut()).find(|p| p.id == *port_id)
    }

    /// Get all ports
    pub fn ports(&self) -> impl Iterator<Item = &Port> {
        self.inputs.iter().chain(self.outputs.iter())
    }

    /// First execution output, the default path after a finished evaluation
    pub fn default_exec_output(&self) -> Option<usize> {
        self.outputs.iter().position(Port::is_exec)
    }

    /// Whether a scheduling pass has ranked this node
    pub fn is_scheduled(&self) -> bool {
        self.compute_order > UNSCHEDULED
    }

    /// Clear every slot value
    pub fn clear_values(&mut self) {
        for port in self.inputs.iter_mut().chain(self.outputs.iter_mut()) {
            port.value = None;
        }
    }
}
