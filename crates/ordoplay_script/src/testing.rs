// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph builders and instrumented behaviors for tests.
//!
//! Probe nodes record every evaluation in a shared [`ProbeLog`], so tests can
//! assert exactly which nodes ran, how often, and in which order.

use crate::connection::ConnectionId;
use crate::evaluation::{EvaluationError, NodeBehavior, NodeContext, ProcessingStatus};
use crate::graph::Graph;
use crate::node::{EntryKind, Node, NodeCategory, NodeId, NodeType};
use crate::port::{Port, PortType, PortValue};
use crate::registry::NodeRegistry;
use std::cell::RefCell;
use std::rc::Rc;

/// Type ID of probe action nodes
pub const PROBE_ACTION: &str = "probe_action";
/// Type ID of probe data nodes
pub const PROBE_DATA: &str = "probe_data";

/// Slot of the `Out` output on probe actions
pub const ACTION_OUT: usize = 2;
/// Slot of the `Alt` execution output on probe actions
pub const ACTION_ALT: usize = 1;

/// Type ID of the probe entry for a kind
pub fn probe_entry_id(kind: EntryKind) -> String {
    format!("probe_entry_{kind:?}")
}

/// Entry node type: `Exec` and `Payload` outputs
pub fn entry_type(kind: EntryKind) -> NodeType {
    NodeType {
        id: probe_entry_id(kind),
        name: format!("On {kind:?}"),
        category: NodeCategory::Entry(kind),
        description: "Probe entry".to_string(),
        inputs: vec![],
        outputs: vec![
            Port::output("Exec", PortType::Exec),
            Port::output("Payload", PortType::Any),
        ],
    }
}

/// Action node type: `Exec`, `A`, `B` inputs; `Exec`, `Alt`, `Out` outputs
pub fn action_type() -> NodeType {
    NodeType {
        id: PROBE_ACTION.to_string(),
        name: "Probe Action".to_string(),
        category: NodeCategory::Action,
        description: "Probe action".to_string(),
        inputs: vec![
            Port::input("Exec", PortType::Exec),
            Port::input("A", PortType::Any),
            Port::input("B", PortType::Any),
        ],
        outputs: vec![
            Port::output("Exec", PortType::Exec),
            Port::output("Alt", PortType::Exec),
            Port::output("Out", PortType::Any),
        ],
    }
}

/// Data node type: `A`, `B` inputs; `Out` output
pub fn data_type() -> NodeType {
    NodeType {
        id: PROBE_DATA.to_string(),
        name: "Probe Data".to_string(),
        category: NodeCategory::Data,
        description: "Probe data".to_string(),
        inputs: vec![
            Port::input("A", PortType::Any),
            Port::input("B", PortType::Any),
        ],
        outputs: vec![Port::output("Out", PortType::Any)],
    }
}

/// Shared record of probe evaluations
#[derive(Debug, Clone, Default)]
pub struct ProbeLog(Rc<RefCell<Vec<NodeId>>>);

impl ProbeLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, id: NodeId) {
        self.0.borrow_mut().push(id);
    }

    /// Every evaluation so far, in order
    pub fn evaluations(&self) -> Vec<NodeId> {
        self.0.borrow().clone()
    }

    /// How often a node was evaluated
    pub fn count(&self, id: NodeId) -> usize {
        self.0.borrow().iter().filter(|e| **e == id).count()
    }

    /// Forget all evaluations
    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }
}

fn sum_inputs(ctx: &NodeContext<'_>, slots: &[usize]) -> f32 {
    slots
        .iter()
        .filter_map(|s| ctx.input(*s).and_then(PortValue::as_float))
        .sum()
}

struct ProbeEntry {
    log: ProbeLog,
}

impl NodeBehavior for ProbeEntry {
    fn evaluate(&mut self, ctx: &mut NodeContext<'_>) -> Result<ProcessingStatus, EvaluationError> {
        self.log.record(ctx.id());
        Ok(ProcessingStatus::Finished)
    }
}

/// Settings: `unfinished` (Int, ticks to stay unfinished), `follow` (Int,
/// execution output), `fail` (Bool, return an error)
struct ProbeAction {
    log: ProbeLog,
    unfinished: i32,
    follow: Option<usize>,
    fail: bool,
    pending: i32,
}

impl NodeBehavior for ProbeAction {
    fn evaluate(&mut self, ctx: &mut NodeContext<'_>) -> Result<ProcessingStatus, EvaluationError> {
        self.log.record(ctx.id());
        if self.fail {
            return Err(EvaluationError::Custom(format!("probe {:?} failed", ctx.id())));
        }

        let sum = sum_inputs(ctx, &[1, 2]);
        ctx.set_output(ACTION_OUT, PortValue::Float(sum));
        if let Some(slot) = self.follow {
            ctx.follow(slot);
        }

        if self.pending < self.unfinished {
            self.pending += 1;
            return Ok(ProcessingStatus::Unfinished);
        }
        self.reset();
        Ok(ProcessingStatus::Finished)
    }

    fn reset(&mut self) {
        self.pending = 0;
    }
}

/// Settings: `value` (Float, added to the inputs, default 1.0)
struct ProbeData {
    log: ProbeLog,
    value: f32,
}

impl NodeBehavior for ProbeData {
    fn evaluate(&mut self, ctx: &mut NodeContext<'_>) -> Result<ProcessingStatus, EvaluationError> {
        self.log.record(ctx.id());
        let sum = self.value + sum_inputs(ctx, &[0, 1]);
        ctx.set_output(0, PortValue::Float(sum));
        Ok(ProcessingStatus::Finished)
    }
}

/// Registry with probe entries for every kind, probe actions and probe data nodes
pub fn probe_registry(log: &ProbeLog) -> NodeRegistry {
    let mut registry = NodeRegistry::new();

    for &kind in EntryKind::all() {
        let log = log.clone();
        registry.register(entry_type(kind), move |_| {
            Box::new(ProbeEntry { log: log.clone() })
        });
    }

    let action_log = log.clone();
    registry.register(action_type(), move |node: &Node| {
        Box::new(ProbeAction {
            log: action_log.clone(),
            unfinished: node.setting("unfinished").and_then(PortValue::as_int).unwrap_or(0),
            follow: node
                .setting("follow")
                .and_then(PortValue::as_int)
                .and_then(|s| usize::try_from(s).ok()),
            fail: node.setting("fail").and_then(PortValue::as_bool).unwrap_or(false),
            pending: 0,
        })
    });

    let data_log = log.clone();
    registry.register(data_type(), move |node: &Node| {
        Box::new(ProbeData {
            log: data_log.clone(),
            value: node.setting("value").and_then(PortValue::as_float).unwrap_or(1.0),
        })
    });

    registry
}

/// Fluent construction of probe graphs
pub struct GraphBuilder {
    graph: Graph,
}

impl GraphBuilder {
    /// Start a new graph
    pub fn new(name: &str) -> Self {
        Self {
            graph: Graph::new(name),
        }
    }

    /// Add an entry node at the given vertical position
    pub fn entry(&mut self, kind: EntryKind, y: f32) -> NodeId {
        self.graph.add_node(Node::new(&entry_type(kind)).with_position(0.0, y))
    }

    /// Add a probe action
    pub fn action(&mut self) -> NodeId {
        self.graph.add_node(Node::new(&action_type()))
    }

    /// Add a probe data node
    pub fn data(&mut self) -> NodeId {
        self.graph.add_node(Node::new(&data_type()))
    }

    /// Set a node setting
    pub fn set(&mut self, node: NodeId, key: &str, value: PortValue) -> &mut Self {
        if let Some(n) = self.graph.node_mut(node) {
            n.settings.insert(key.to_string(), value);
        }
        self
    }

    /// Execution link from the default output of `from` into `to`
    pub fn flow(&mut self, from: NodeId, to: NodeId) -> ConnectionId {
        self.graph
            .connect_by_name(from, "Exec", to, "Exec")
            .expect("execution link")
    }

    /// Execution link from the `Alt` output of `from` into `to`
    pub fn flow_alt(&mut self, from: NodeId, to: NodeId) -> ConnectionId {
        let name = if self.graph.node(from).is_some_and(|n| n.output_slot("Alt").is_some()) {
            "Alt"
        } else {
            "Exec"
        };
        self.graph
            .connect_by_name(from, name, to, "Exec")
            .expect("execution link")
    }

    /// Data link from the producer's value output into the named consumer input
    pub fn feed(&mut self, from: NodeId, to: NodeId, input: &str) -> ConnectionId {
        let output = if self.graph.node(from).is_some_and(|n| n.output_slot("Out").is_some()) {
            "Out"
        } else {
            "Payload"
        };
        self.graph
            .connect_by_name(from, output, to, input)
            .expect("data link")
    }

    /// Access the graph under construction
    pub fn graph_mut(&mut self) -> &mut Graph {
        &mut self.graph
    }

    /// Finish building
    pub fn build(self) -> Graph {
        self.graph
    }
}
