// SPDX-License-Identifier: MIT OR Apache-2.0
//! Entry nodes, one per host signal.
//!
//! Payloads (other object, event value) are written into the payload slot by
//! the host before the walk starts; the entry only forwards them.

use super::{ids, PAYLOAD_SLOT};
use crate::evaluation::{EvaluationError, NodeBehavior, NodeContext, ProcessingStatus};
use crate::node::{EntryKind, NodeCategory, NodeType};
use crate::port::{Port, PortType, PortValue};
use crate::registry::NodeRegistry;

/// Setting holding the event name an `on_event` node listens to
pub const EVENT_SETTING: &str = "event";
/// Setting holding the zone name an `on_zone_event` node listens to
pub const ZONE_SETTING: &str = "zone";
/// Setting holding the zone activation (`Enter`, `Stay` or `Exit`)
pub const ACTIVATION_SETTING: &str = "activation";

struct Entry {
    writes_delta: bool,
}

impl NodeBehavior for Entry {
    fn evaluate(&mut self, ctx: &mut NodeContext<'_>) -> Result<ProcessingStatus, EvaluationError> {
        if self.writes_delta {
            let delta = ctx.time().delta;
            ctx.set_output(PAYLOAD_SLOT, PortValue::Float(delta));
        }
        Ok(ProcessingStatus::Finished)
    }
}

fn entry_type(id: &str, name: &str, kind: EntryKind, description: &str, payload: Option<Port>) -> NodeType {
    let mut outputs = vec![Port::output("Exec", PortType::Exec)];
    outputs.extend(payload);
    NodeType {
        id: id.to_string(),
        name: name.to_string(),
        category: NodeCategory::Entry(kind),
        description: description.to_string(),
        inputs: vec![],
        outputs,
    }
}

pub(super) fn register(registry: &mut NodeRegistry) {
    let entries = [
        entry_type(ids::ON_START, "On Start", EntryKind::Start, "Runs once when the script starts", None),
        entry_type(
            ids::ON_UPDATE,
            "On Update",
            EntryKind::Update,
            "Runs every tick",
            Some(Port::output("Delta Time", PortType::Float)),
        ),
        entry_type(
            ids::ON_TRIGGER_ENTERED,
            "On Trigger Entered",
            EntryKind::TriggerEntered,
            "An object entered the trigger volume",
            Some(Port::output("Other", PortType::Entity)),
        ),
        entry_type(
            ids::ON_TRIGGER_EXITED,
            "On Trigger Exited",
            EntryKind::TriggerExited,
            "An object left the trigger volume",
            Some(Port::output("Other", PortType::Entity)),
        ),
        entry_type(
            ids::ON_COLLISION,
            "On Collision",
            EntryKind::Collision,
            "The owner collided with an object",
            Some(Port::output("Other", PortType::Entity)),
        ),
        entry_type(
            ids::ON_EVENT,
            "On Event",
            EntryKind::Event,
            "A named event was raised",
            Some(Port::output("Payload", PortType::Any)),
        ),
        entry_type(
            ids::ON_ZONE_EVENT,
            "On Zone Event",
            EntryKind::ZoneEvent,
            "An object entered, stayed in or left a zone",
            Some(Port::output("Other", PortType::Entity)),
        ),
    ];

    for node_type in entries {
        let writes_delta = node_type.id == ids::ON_UPDATE;
        registry.register(node_type, move |_| Box::new(Entry { writes_delta }));
    }
}
