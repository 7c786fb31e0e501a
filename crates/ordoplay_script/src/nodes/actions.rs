// SPDX-License-Identifier: MIT OR Apache-2.0
//! Action nodes.

use super::ids;
use crate::evaluation::{EvaluationError, NodeBehavior, NodeContext, ProcessingStatus};
use crate::node::{NodeCategory, NodeType};
use crate::port::{Port, PortType, PortValue};
use crate::registry::NodeRegistry;

/// Prints its text once per tick until it was printed `Amount` times
#[derive(Default)]
struct Log {
    printed: i32,
}

impl NodeBehavior for Log {
    fn evaluate(&mut self, ctx: &mut NodeContext<'_>) -> Result<ProcessingStatus, EvaluationError> {
        let amount = ctx.input_int(2)?.max(1);
        let text = ctx.input_text(1).unwrap_or_default();
        tracing::info!("[{}] {}", ctx.name(), text);

        self.printed += 1;
        if self.printed < amount {
            return Ok(ProcessingStatus::Unfinished);
        }
        self.reset();
        Ok(ProcessingStatus::Finished)
    }

    fn reset(&mut self) {
        self.printed = 0;
    }
}

struct Branch;

impl NodeBehavior for Branch {
    fn evaluate(&mut self, ctx: &mut NodeContext<'_>) -> Result<ProcessingStatus, EvaluationError> {
        let condition = ctx.input_bool(1)?;
        ctx.follow(if condition { 0 } else { 1 });
        Ok(ProcessingStatus::Finished)
    }
}

/// Holds the walk until `Seconds` of simulation time went by
#[derive(Default)]
struct Wait {
    waited: f32,
}

impl NodeBehavior for Wait {
    fn evaluate(&mut self, ctx: &mut NodeContext<'_>) -> Result<ProcessingStatus, EvaluationError> {
        let seconds = ctx.input_float(1)?;
        self.waited += ctx.time().delta;
        if self.waited < seconds {
            return Ok(ProcessingStatus::Unfinished);
        }
        self.reset();
        Ok(ProcessingStatus::Finished)
    }

    fn reset(&mut self) {
        self.waited = 0.0;
    }
}

pub(super) fn register(registry: &mut NodeRegistry) {
    registry.register(
        NodeType {
            id: ids::LOG.to_string(),
            name: "Log".to_string(),
            category: NodeCategory::Action,
            description: "Print text to the log, once per tick, Amount times".to_string(),
            inputs: vec![
                Port::input("Exec", PortType::Exec),
                Port::input("Text", PortType::String),
                Port::input("Amount", PortType::Int).with_default(PortValue::Int(1)),
            ],
            outputs: vec![Port::output("Exec", PortType::Exec)],
        },
        |_| Box::new(Log::default()),
    );

    registry.register(
        NodeType {
            id: ids::BRANCH.to_string(),
            name: "Branch".to_string(),
            category: NodeCategory::Action,
            description: "If/else branching".to_string(),
            inputs: vec![
                Port::input("Exec", PortType::Exec),
                Port::input("Condition", PortType::Bool),
            ],
            outputs: vec![
                Port::output("True", PortType::Exec),
                Port::output("False", PortType::Exec),
            ],
        },
        |_| Box::new(Branch),
    );

    registry.register(
        NodeType {
            id: ids::WAIT.to_string(),
            name: "Wait".to_string(),
            category: NodeCategory::Action,
            description: "Continue after a delay".to_string(),
            inputs: vec![
                Port::input("Exec", PortType::Exec),
                Port::input("Seconds", PortType::Float).with_default(PortValue::Float(1.0)),
            ],
            outputs: vec![Port::output("Exec", PortType::Exec)],
        },
        |_| Box::new(Wait::default()),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::FrameTime;
    use crate::node::Node;
    use crate::nodes::create_script_registry;

    fn evaluate(
        behavior: &mut dyn NodeBehavior,
        node: &mut Node,
        time: FrameTime,
    ) -> (ProcessingStatus, Option<usize>) {
        let mut ctx = NodeContext::new(node, time);
        let status = behavior.evaluate(&mut ctx).unwrap();
        (status, ctx.chosen_exec())
    }

    #[test]
    fn test_log_repeats_amount_times() {
        let registry = create_script_registry();
        let mut node = registry
            .create_node(ids::LOG)
            .unwrap()
            .with_input_default("Text", PortValue::String("hello".to_string()))
            .with_input_default("Amount", PortValue::Int(3));
        let mut log = registry.instantiate(&node).unwrap();

        let statuses: Vec<_> = (0..4)
            .map(|_| evaluate(log.as_mut(), &mut node, FrameTime::default()).0)
            .collect();
        assert_eq!(
            statuses,
            vec![
                ProcessingStatus::Unfinished,
                ProcessingStatus::Unfinished,
                ProcessingStatus::Finished,
                ProcessingStatus::Unfinished,
            ]
        );
    }

    #[test]
    fn test_log_amount_at_least_once() {
        let registry = create_script_registry();
        let mut node = registry
            .create_node(ids::LOG)
            .unwrap()
            .with_input_default("Amount", PortValue::Int(0));
        let mut log = registry.instantiate(&node).unwrap();
        assert!(evaluate(log.as_mut(), &mut node, FrameTime::default()).0.is_finished());
    }

    #[test]
    fn test_branch_follows_condition() {
        let registry = create_script_registry();
        let mut node = registry
            .create_node(ids::BRANCH)
            .unwrap()
            .with_input_default("Condition", PortValue::Bool(false));
        let mut branch = registry.instantiate(&node).unwrap();
        assert_eq!(evaluate(branch.as_mut(), &mut node, FrameTime::default()).1, Some(1));

        node.inputs[1].value = Some(PortValue::Bool(true));
        assert_eq!(evaluate(branch.as_mut(), &mut node, FrameTime::default()).1, Some(0));
    }

    #[test]
    fn test_branch_without_condition_fails() {
        let registry = create_script_registry();
        let mut node = registry.create_node(ids::BRANCH).unwrap();
        let mut branch = registry.instantiate(&node).unwrap();
        let mut ctx = NodeContext::new(&mut node, FrameTime::default());
        assert!(matches!(
            branch.evaluate(&mut ctx),
            Err(EvaluationError::MissingInput { ref port, .. }) if port == "Condition"
        ));
    }

    #[test]
    fn test_wait_counts_simulation_time() {
        let registry = create_script_registry();
        let mut node = registry.create_node(ids::WAIT).unwrap();
        let mut wait = registry.instantiate(&node).unwrap();

        let mut time = FrameTime::default();
        time.advance(0.4);
        assert!(!evaluate(wait.as_mut(), &mut node, time).0.is_finished());
        assert!(!evaluate(wait.as_mut(), &mut node, time).0.is_finished());
        assert!(evaluate(wait.as_mut(), &mut node, time).0.is_finished());

        wait.reset();
        assert!(!evaluate(wait.as_mut(), &mut node, time).0.is_finished());
    }
}
