// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node evaluation contract.
//!
//! A [`NodeBehavior`] is bound to every node of a graph. The interpreter hands it
//! a [`NodeContext`] that exposes the node's slots by index, the frame clock and
//! the choice of which execution output to follow next.

use crate::node::{Node, NodeId};
use crate::port::{EntityId, PortType, PortValue};

/// Outcome of a single evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessingStatus {
    /// The node is done, the walk may advance
    #[default]
    Finished,
    /// The node needs to be evaluated again on the next tick
    Unfinished,
}

impl ProcessingStatus {
    /// Check if the node is done
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Finished)
    }
}

/// Simulation clock visible to nodes
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameTime {
    /// Number of ticks advanced so far
    pub frame: u64,
    /// Seconds covered by the current tick
    pub delta: f32,
    /// Seconds since the script started
    pub elapsed: f32,
}

impl FrameTime {
    /// Move the clock forward by one tick
    pub fn advance(&mut self, delta: f32) {
        self.frame += 1;
        self.delta = delta;
        self.elapsed += delta;
    }
}

/// Access to a node's slots during evaluation
pub struct NodeContext<'a> {
    node: &'a mut Node,
    time: FrameTime,
    next_exec: Option<usize>,
}

impl<'a> NodeContext<'a> {
    /// Create a context for one evaluation of `node`
    pub fn new(node: &'a mut Node, time: FrameTime) -> Self {
        let next_exec = node.default_exec_output();
        Self {
            node,
            time,
            next_exec,
        }
    }

    /// ID of the node being evaluated
    pub fn id(&self) -> NodeId {
        self.node.id
    }

    /// Display name of the node being evaluated
    pub fn name(&self) -> &str {
        &self.node.name
    }

    /// Simulation clock
    pub fn time(&self) -> FrameTime {
        self.time
    }

    /// Value of an input slot (connected value, else default)
    pub fn input(&self, slot: usize) -> Option<&PortValue> {
        self.node.inputs.get(slot).and_then(|p| p.current())
    }

    /// Required float input
    pub fn input_float(&self, slot: usize) -> Result<f32, EvaluationError> {
        let value = self.require(slot)?;
        value.as_float().ok_or_else(|| self.mismatch(slot, PortType::Float))
    }

    /// Required integer input
    pub fn input_int(&self, slot: usize) -> Result<i32, EvaluationError> {
        let value = self.require(slot)?;
        value.as_int().ok_or_else(|| self.mismatch(slot, PortType::Int))
    }

    /// Required boolean input
    pub fn input_bool(&self, slot: usize) -> Result<bool, EvaluationError> {
        let value = self.require(slot)?;
        value.as_bool().ok_or_else(|| self.mismatch(slot, PortType::Bool))
    }

    /// Optional text input, any value is rendered as text
    pub fn input_text(&self, slot: usize) -> Option<String> {
        self.input(slot).map(ToString::to_string)
    }

    /// Optional entity input
    pub fn input_entity(&self, slot: usize) -> Option<EntityId> {
        self.input(slot).and_then(PortValue::as_entity)
    }

    /// Write a value into an output slot
    pub fn set_output(&mut self, slot: usize, value: PortValue) {
        if let Some(port) = self.node.outputs.get_mut(slot) {
            port.value = Some(value);
        }
    }

    /// Choose the execution output to follow once this evaluation finishes
    pub fn follow(&mut self, slot: usize) {
        self.next_exec = Some(slot);
    }

    /// Execution output chosen so far
    pub fn chosen_exec(&self) -> Option<usize> {
        self.next_exec
    }

    fn require(&self, slot: usize) -> Result<&PortValue, EvaluationError> {
        self.input(slot).ok_or_else(|| EvaluationError::MissingInput {
            node: self.node.id,
            port: self.port_name(slot),
        })
    }

    fn mismatch(&self, slot: usize, expected: PortType) -> EvaluationError {
        EvaluationError::TypeMismatch {
            node: self.node.id,
            port: self.port_name(slot),
            expected,
        }
    }

    fn port_name(&self, slot: usize) -> String {
        self.node
            .inputs
            .get(slot)
            .map_or_else(|| format!("#{slot}"), |p| p.name.clone())
    }
}

/// Runtime behavior bound to a node
pub trait NodeBehavior {
    /// Evaluate the node: read inputs, act, write outputs
    fn evaluate(&mut self, ctx: &mut NodeContext<'_>) -> Result<ProcessingStatus, EvaluationError>;

    /// Clear multi-tick progress
    fn reset(&mut self) {}
}

/// Error raised by a node's own evaluation
#[derive(Debug, thiserror::Error)]
pub enum EvaluationError {
    /// Node not found
    #[error("Node not found: {0:?}")]
    NodeNotFound(NodeId),

    /// Node has no bound behavior
    #[error("No behavior bound to node {0:?}")]
    Unbound(NodeId),

    /// Missing required input
    #[error("Missing required input '{port}' on node {node:?}")]
    MissingInput {
        /// Node being evaluated
        node: NodeId,
        /// Field name of the input
        port: String,
    },

    /// Input holds a value of the wrong type
    #[error("Input '{port}' on node {node:?} is not {expected:?}")]
    TypeMismatch {
        /// Node being evaluated
        node: NodeId,
        /// Field name of the input
        port: String,
        /// Type the node asked for
        expected: PortType,
    },

    /// Custom error
    #[error("{0}")]
    Custom(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{NodeCategory, NodeType};
    use crate::port::Port;

    fn sample_node() -> Node {
        Node::new(&NodeType {
            id: "sample".to_string(),
            name: "Sample".to_string(),
            category: NodeCategory::Action,
            description: String::new(),
            inputs: vec![
                Port::input("Exec", PortType::Exec),
                Port::input("Amount", PortType::Int).with_default(PortValue::Int(3)),
                Port::input("Flag", PortType::Bool),
            ],
            outputs: vec![
                Port::output("Then", PortType::Exec),
                Port::output("Else", PortType::Exec),
                Port::output("Result", PortType::Float),
            ],
        })
    }

    #[test]
    fn test_inputs_and_errors() {
        let mut node = sample_node();
        let ctx = NodeContext::new(&mut node, FrameTime::default());
        assert_eq!(ctx.input_int(1).unwrap(), 3);
        assert_eq!(ctx.input_float(1).unwrap(), 3.0);
        assert!(matches!(ctx.input_bool(2), Err(EvaluationError::MissingInput { .. })));
        assert!(matches!(ctx.input_bool(1), Err(EvaluationError::TypeMismatch { .. })));
        assert_eq!(ctx.input_text(1).as_deref(), Some("3"));
    }

    #[test]
    fn test_outputs_and_follow() {
        let mut node = sample_node();
        {
            let mut ctx = NodeContext::new(&mut node, FrameTime::default());
            assert_eq!(ctx.chosen_exec(), Some(0));
            ctx.follow(1);
            ctx.set_output(2, PortValue::Float(1.5));
            assert_eq!(ctx.chosen_exec(), Some(1));
        }
        assert_eq!(node.outputs[2].value, Some(PortValue::Float(1.5)));
    }

    #[test]
    fn test_clock_advance() {
        let mut time = FrameTime::default();
        time.advance(0.5);
        time.advance(0.25);
        assert_eq!(time.frame, 2);
        assert_eq!(time.delta, 0.25);
        assert_eq!(time.elapsed, 0.75);
    }
}
