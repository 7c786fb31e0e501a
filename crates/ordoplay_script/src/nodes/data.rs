// SPDX-License-Identifier: MIT OR Apache-2.0
//! Pure data nodes. They are pulled by their consumers and never hold the walk.

use super::ids;
use crate::evaluation::{EvaluationError, NodeBehavior, NodeContext, ProcessingStatus};
use crate::node::{Node, NodeCategory, NodeType};
use crate::port::{Port, PortType, PortValue};
use crate::registry::NodeRegistry;

/// Setting holding the value of a `constant` node
pub const VALUE_SETTING: &str = "value";
/// Setting holding the template of a `format` node, `{}` marks the value
pub const TEMPLATE_SETTING: &str = "template";

struct Constant {
    value: PortValue,
}

impl NodeBehavior for Constant {
    fn evaluate(&mut self, ctx: &mut NodeContext<'_>) -> Result<ProcessingStatus, EvaluationError> {
        ctx.set_output(0, self.value.clone());
        Ok(ProcessingStatus::Finished)
    }
}

struct Add;

impl NodeBehavior for Add {
    fn evaluate(&mut self, ctx: &mut NodeContext<'_>) -> Result<ProcessingStatus, EvaluationError> {
        let sum = ctx.input_float(0)? + ctx.input_float(1)?;
        ctx.set_output(0, PortValue::Float(sum));
        Ok(ProcessingStatus::Finished)
    }
}

struct Greater;

impl NodeBehavior for Greater {
    fn evaluate(&mut self, ctx: &mut NodeContext<'_>) -> Result<ProcessingStatus, EvaluationError> {
        let greater = ctx.input_float(0)? > ctx.input_float(1)?;
        ctx.set_output(0, PortValue::Bool(greater));
        Ok(ProcessingStatus::Finished)
    }
}

struct Format {
    template: String,
}

impl NodeBehavior for Format {
    fn evaluate(&mut self, ctx: &mut NodeContext<'_>) -> Result<ProcessingStatus, EvaluationError> {
        let value = ctx.input_text(0).unwrap_or_default();
        let text = self.template.replacen("{}", &value, 1);
        ctx.set_output(0, PortValue::String(text));
        Ok(ProcessingStatus::Finished)
    }
}

fn number_inputs() -> Vec<Port> {
    vec![
        Port::input("A", PortType::Float).with_default(PortValue::Float(0.0)),
        Port::input("B", PortType::Float).with_default(PortValue::Float(0.0)),
    ]
}

pub(super) fn register(registry: &mut NodeRegistry) {
    registry.register(
        NodeType {
            id: ids::CONSTANT.to_string(),
            name: "Constant".to_string(),
            category: NodeCategory::Data,
            description: "A fixed value".to_string(),
            inputs: vec![],
            outputs: vec![Port::output("Value", PortType::Any)],
        },
        |node: &Node| {
            let value = node
                .setting(VALUE_SETTING)
                .cloned()
                .unwrap_or(PortValue::Float(0.0));
            Box::new(Constant { value })
        },
    );

    registry.register(
        NodeType {
            id: ids::ADD.to_string(),
            name: "Add".to_string(),
            category: NodeCategory::Data,
            description: "A + B".to_string(),
            inputs: number_inputs(),
            outputs: vec![Port::output("Result", PortType::Float)],
        },
        |_| Box::new(Add),
    );

    registry.register(
        NodeType {
            id: ids::GREATER.to_string(),
            name: "Greater".to_string(),
            category: NodeCategory::Data,
            description: "A > B".to_string(),
            inputs: number_inputs(),
            outputs: vec![Port::output("Result", PortType::Bool)],
        },
        |_| Box::new(Greater),
    );

    registry.register(
        NodeType {
            id: ids::FORMAT.to_string(),
            name: "Format".to_string(),
            category: NodeCategory::Data,
            description: "Insert a value into a text template".to_string(),
            inputs: vec![Port::input("Value", PortType::Any)],
            outputs: vec![Port::output("Text", PortType::String)],
        },
        |node: &Node| {
            let template = node
                .setting(TEMPLATE_SETTING)
                .and_then(PortValue::as_str)
                .unwrap_or("{}")
                .to_string();
            Box::new(Format { template })
        },
    );
}
