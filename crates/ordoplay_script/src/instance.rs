// SPDX-License-Identifier: MIT OR Apache-2.0
//! Host integration.
//!
//! A [`ScriptInstance`] is what a game object owns. The host calls
//! [`ScriptInstance::run_start`] once, [`ScriptInstance::run_update`] every
//! tick and hands over everything else as [`ScriptMessage`]s. Payloads are
//! written into the entry nodes' payload slot before their walks run.

use crate::evaluation::ProcessingStatus;
use crate::node::{EntryKind, NodeCategory, NodeId};
use crate::nodes::entries::{ACTIVATION_SETTING, EVENT_SETTING, ZONE_SETTING};
use crate::nodes::PAYLOAD_SLOT;
use crate::port::{EntityId, PortValue};
use crate::processor::{GraphProcessor, ProcessError};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Phase of an object's presence in a zone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ZoneActivation {
    /// The object just entered
    Enter,
    /// The object is still inside
    Stay,
    /// The object just left
    Exit,
}

impl ZoneActivation {
    /// Parse the name used in node settings
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Enter" => Some(Self::Enter),
            "Stay" => Some(Self::Stay),
            "Exit" => Some(Self::Exit),
            _ => None,
        }
    }
}

/// Signal from the host
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptMessage {
    /// An object entered the owner's trigger volume
    TriggerEntered(EntityId),
    /// An object left the owner's trigger volume
    TriggerExited(EntityId),
    /// The owner collided with an object
    CollisionEntered(EntityId),
    /// A named event was raised
    Event {
        /// Event name
        name: String,
        /// Value handed to the listening entries
        payload: Option<PortValue>,
    },
    /// Zone activity
    Zone {
        /// Zone name
        zone: String,
        /// Phase of the activity
        activation: ZoneActivation,
        /// Object moving through the zone
        other: EntityId,
    },
}

#[derive(Debug, Clone)]
struct ZoneListener {
    node: NodeId,
    zone: String,
    /// `None` listens to every activation
    activation: Option<ZoneActivation>,
}

/// Entry nodes indexed by what they listen to
#[derive(Debug, Default)]
struct Listeners {
    revision: Option<u64>,
    events: IndexMap<String, Vec<NodeId>>,
    zones: Vec<ZoneListener>,
    collision: bool,
}

/// A running script: the processor plus event routing
pub struct ScriptInstance {
    processor: GraphProcessor,
    listeners: Listeners,
}

impl ScriptInstance {
    /// Wrap a processor
    pub fn new(processor: GraphProcessor) -> Self {
        Self {
            processor,
            listeners: Listeners::default(),
        }
    }

    /// Reset every node and walk, re-rank a stale graph and index listeners
    pub fn init(&mut self) -> Result<(), ProcessError> {
        self.processor.reset();
        self.processor.ensure_ready()?;
        let diagnostics = self.processor.schedule_report().diagnostics.len();
        if diagnostics > 0 {
            tracing::warn!(
                "Graph '{}' scheduled with {} diagnostics",
                self.processor.graph().name,
                diagnostics
            );
        }
        self.listeners.revision = None;
        self.refresh_listeners();
        tracing::info!(
            "Initialized script '{}' ({} nodes)",
            self.processor.graph().name,
            self.processor.graph().node_count()
        );
        Ok(())
    }

    /// Run the `Start` entries
    pub fn run_start(&mut self) -> Result<ProcessingStatus, ProcessError> {
        self.processor.run(EntryKind::Start)
    }

    /// Advance the clock, resume paused walks, then run the `Update` entries
    pub fn run_update(&mut self, delta: f32) -> Result<ProcessingStatus, ProcessError> {
        self.processor.advance_time(delta);
        let paused = self.processor.run_paused()?;
        let update = self.processor.run(EntryKind::Update)?;
        Ok(combine(paused, update))
    }

    /// Route a host message to the entries listening to it
    pub fn deliver(&mut self, message: ScriptMessage) -> Result<ProcessingStatus, ProcessError> {
        self.refresh_listeners();

        match message {
            ScriptMessage::TriggerEntered(other) => {
                self.run_with_payload(EntryKind::TriggerEntered, PortValue::Entity(other))
            }
            ScriptMessage::TriggerExited(other) => {
                self.run_with_payload(EntryKind::TriggerExited, PortValue::Entity(other))
            }
            ScriptMessage::CollisionEntered(other) => {
                if !self.listeners.collision {
                    return Ok(ProcessingStatus::Finished);
                }
                self.run_with_payload(EntryKind::Collision, PortValue::Entity(other))
            }
            ScriptMessage::Event { name, payload } => {
                let seeds = self.listeners.events.get(&name).cloned().unwrap_or_default();
                if seeds.is_empty() {
                    tracing::debug!("No listener for event '{}'", name);
                    return Ok(ProcessingStatus::Finished);
                }
                if let Some(payload) = payload {
                    self.write_payload(&seeds, &payload);
                }
                self.processor.run_from(&seeds, EntryKind::Event)
            }
            ScriptMessage::Zone {
                zone,
                activation,
                other,
            } => {
                let seeds: Vec<NodeId> = self
                    .listeners
                    .zones
                    .iter()
                    .filter(|l| l.zone == zone && l.activation.map_or(true, |a| a == activation))
                    .map(|l| l.node)
                    .collect();
                if seeds.is_empty() {
                    return Ok(ProcessingStatus::Finished);
                }
                self.write_payload(&seeds, &PortValue::Entity(other));
                self.processor.run_from(&seeds, EntryKind::ZoneEvent)
            }
        }
    }

    /// Whether any collision entry exists
    pub fn has_collision_nodes(&mut self) -> bool {
        self.refresh_listeners();
        self.listeners.collision
    }

    /// Event names with at least one listener
    pub fn event_names(&mut self) -> Vec<String> {
        self.refresh_listeners();
        self.listeners.events.keys().cloned().collect()
    }

    /// The wrapped processor
    pub fn processor(&self) -> &GraphProcessor {
        &self.processor
    }

    /// Mutable access to the wrapped processor
    pub fn processor_mut(&mut self) -> &mut GraphProcessor {
        &mut self.processor
    }

    fn run_with_payload(
        &mut self,
        kind: EntryKind,
        payload: PortValue,
    ) -> Result<ProcessingStatus, ProcessError> {
        let entries = self.processor.graph().entry_nodes(&[kind]);
        self.write_payload(&entries, &payload);
        self.processor.run(kind)
    }

    fn write_payload(&mut self, nodes: &[NodeId], payload: &PortValue) {
        for &node in nodes {
            self.processor.set_output(node, PAYLOAD_SLOT, payload.clone());
        }
    }

    /// Rebuild the listener index if the graph changed
    fn refresh_listeners(&mut self) {
        let graph = self.processor.graph();
        if self.listeners.revision == Some(graph.revision()) {
            return;
        }

        let mut listeners = Listeners {
            revision: Some(graph.revision()),
            ..Default::default()
        };

        for node in graph.nodes() {
            match node.category {
                NodeCategory::Entry(EntryKind::Event) => {
                    let Some(name) = node.setting(EVENT_SETTING).and_then(PortValue::as_str) else {
                        tracing::warn!("Event node {:?} has no event name", node.id);
                        continue;
                    };
                    listeners.events.entry(name.to_string()).or_default().push(node.id);
                }
                NodeCategory::Entry(EntryKind::ZoneEvent) => {
                    let Some(zone) = node.setting(ZONE_SETTING).and_then(PortValue::as_str) else {
                        tracing::warn!("Zone node {:?} has no zone name", node.id);
                        continue;
                    };
                    let activation = node
                        .setting(ACTIVATION_SETTING)
                        .and_then(PortValue::as_str)
                        .and_then(ZoneActivation::from_name);
                    listeners.zones.push(ZoneListener {
                        node: node.id,
                        zone: zone.to_string(),
                        activation,
                    });
                }
                NodeCategory::Entry(EntryKind::Collision) => listeners.collision = true,
                _ => {}
            }
        }

        // Listeners fire top to bottom, like every other entry
        let order = graph.entry_nodes(&[EntryKind::Event, EntryKind::ZoneEvent]);
        let position = |id: &NodeId| order.iter().position(|e| e == id);
        for seeds in listeners.events.values_mut() {
            seeds.sort_by_key(&position);
        }
        listeners.zones.sort_by_key(|l| position(&l.node));

        tracing::debug!(
            "Indexed {} event and {} zone listeners",
            listeners.events.values().map(Vec::len).sum::<usize>(),
            listeners.zones.len()
        );
        self.listeners = listeners;
    }
}

fn combine(a: ProcessingStatus, b: ProcessingStatus) -> ProcessingStatus {
    if a.is_finished() && b.is_finished() {
        ProcessingStatus::Finished
    } else {
        ProcessingStatus::Unfinished
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::ProcessorSettings;
    use crate::testing::{probe_registry, GraphBuilder, ProbeLog, ACTION_OUT};

    fn instance(b: GraphBuilder, log: &ProbeLog) -> ScriptInstance {
        let processor =
            GraphProcessor::new(b.build(), probe_registry(log), ProcessorSettings::default()).unwrap();
        let mut instance = ScriptInstance::new(processor);
        instance.init().unwrap();
        instance
    }

    fn event(name: &str, payload: Option<PortValue>) -> ScriptMessage {
        ScriptMessage::Event {
            name: name.to_string(),
            payload,
        }
    }

    #[test]
    fn test_event_reaches_only_its_listeners() {
        let mut b = GraphBuilder::new("events");
        let open = b.entry(EntryKind::Event, 0.0);
        let close = b.entry(EntryKind::Event, 10.0);
        let on_open = b.action();
        let on_close = b.action();
        b.flow(open, on_open);
        b.flow(close, on_close);
        b.feed(open, on_open, "A");
        b.set(open, EVENT_SETTING, PortValue::String("open".to_string()));
        b.set(close, EVENT_SETTING, PortValue::String("close".to_string()));
        let log = ProbeLog::new();
        let mut instance = instance(b, &log);

        let status = instance.deliver(event("open", Some(PortValue::Float(3.0)))).unwrap();
        assert!(status.is_finished());
        assert_eq!(log.evaluations(), vec![open, on_open]);
        let node = instance.processor().graph().node(on_open).unwrap();
        assert_eq!(node.outputs[ACTION_OUT].value, Some(PortValue::Float(3.0)));

        instance.deliver(event("missing", None)).unwrap();
        assert_eq!(log.evaluations().len(), 2);
        assert_eq!(instance.event_names(), vec!["open".to_string(), "close".to_string()]);
    }

    #[test]
    fn test_zone_activation_filter() {
        let mut b = GraphBuilder::new("zones");
        let enter = b.entry(EntryKind::ZoneEvent, 0.0);
        let any = b.entry(EntryKind::ZoneEvent, 10.0);
        let elsewhere = b.entry(EntryKind::ZoneEvent, 20.0);
        b.set(enter, ZONE_SETTING, PortValue::String("door".to_string()));
        b.set(enter, ACTIVATION_SETTING, PortValue::String("Enter".to_string()));
        b.set(any, ZONE_SETTING, PortValue::String("door".to_string()));
        b.set(elsewhere, ZONE_SETTING, PortValue::String("hall".to_string()));
        let log = ProbeLog::new();
        let mut instance = instance(b, &log);

        let zone = |activation| ScriptMessage::Zone {
            zone: "door".to_string(),
            activation,
            other: EntityId(9),
        };
        instance.deliver(zone(ZoneActivation::Exit)).unwrap();
        assert_eq!(log.evaluations(), vec![any]);

        log.clear();
        instance.deliver(zone(ZoneActivation::Enter)).unwrap();
        assert_eq!(log.evaluations(), vec![enter, any]);
        let node = instance.processor().graph().node(enter).unwrap();
        assert_eq!(node.outputs[PAYLOAD_SLOT].value, Some(PortValue::Entity(EntityId(9))));
    }

    #[test]
    fn test_collision_skipped_without_listeners() {
        let mut b = GraphBuilder::new("no-collision");
        let trigger = b.entry(EntryKind::TriggerEntered, 0.0);
        let log = ProbeLog::new();
        let mut instance = instance(b, &log);

        assert!(!instance.has_collision_nodes());
        instance.deliver(ScriptMessage::CollisionEntered(EntityId(1))).unwrap();
        assert!(log.evaluations().is_empty());

        instance.deliver(ScriptMessage::TriggerEntered(EntityId(2))).unwrap();
        assert_eq!(log.evaluations(), vec![trigger]);
        let node = instance.processor().graph().node(trigger).unwrap();
        assert_eq!(node.outputs[PAYLOAD_SLOT].value, Some(PortValue::Entity(EntityId(2))));
    }

    #[test]
    fn test_update_resumes_paused_events() {
        let mut b = GraphBuilder::new("paused-event");
        let entry = b.entry(EntryKind::Event, 0.0);
        let slow = b.action();
        b.flow(entry, slow);
        b.set(entry, EVENT_SETTING, PortValue::String("go".to_string()));
        b.set(slow, "unfinished", PortValue::Int(1));
        let log = ProbeLog::new();
        let mut instance = instance(b, &log);

        let status = instance.deliver(event("go", None)).unwrap();
        assert_eq!(status, ProcessingStatus::Unfinished);
        assert_eq!(instance.processor().paused_count(), 1);

        assert!(instance.run_update(0.1).unwrap().is_finished());
        assert_eq!(instance.processor().paused_count(), 0);
        assert_eq!(log.count(slow), 2);
        assert_eq!(instance.processor().time().frame, 1);
    }

    #[test]
    fn test_listeners_follow_graph_edits() {
        let mut b = GraphBuilder::new("edited");
        b.entry(EntryKind::Start, 0.0);
        let log = ProbeLog::new();
        let mut instance = instance(b, &log);
        assert!(instance.event_names().is_empty());

        let added = instance.processor_mut().graph_mut().add_node(
            crate::node::Node::new(&crate::testing::entry_type(EntryKind::Event))
                .with_setting(EVENT_SETTING, PortValue::String("late".to_string())),
        );
        instance.deliver(event("late", None)).unwrap();
        assert_eq!(log.evaluations(), vec![added]);
    }

    #[test]
    fn test_start_and_update() {
        let mut b = GraphBuilder::new("lifecycle");
        let start = b.entry(EntryKind::Start, 0.0);
        let update = b.entry(EntryKind::Update, 10.0);
        let log = ProbeLog::new();
        let mut instance = instance(b, &log);

        instance.run_start().unwrap();
        instance.run_update(0.016).unwrap();
        instance.run_update(0.016).unwrap();
        assert_eq!(log.count(start), 1);
        assert_eq!(log.count(update), 2);
    }

    #[test]
    fn test_init_ranks_nodes_added_since_last_pass() {
        let mut b = GraphBuilder::new("reinit");
        let update = b.entry(EntryKind::Update, 0.0);
        let first = b.action();
        b.flow(update, first);
        let log = ProbeLog::new();
        let mut instance = instance(b, &log);
        assert_eq!(instance.processor().schedule_report().scheduled, 2);

        let graph = instance.processor_mut().graph_mut();
        let added = graph.add_node(crate::node::Node::new(&crate::testing::action_type()));
        graph.connect_by_name(first, "Exec", added, "Exec").unwrap();
        instance.init().unwrap();

        assert_eq!(instance.processor().schedule_report().scheduled, 3);
        assert_eq!(instance.processor().graph().node(added).unwrap().compute_order, 2);
    }
}
