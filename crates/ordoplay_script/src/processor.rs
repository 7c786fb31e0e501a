// SPDX-License-Identifier: MIT OR Apache-2.0
//! Execution interpreter.
//!
//! The [`GraphProcessor`] owns a graph and the behaviors bound to it. Every
//! entry node of a kind has a cursor that remembers where its walk stopped.
//! Each call to [`GraphProcessor::run`] continues every walk of that kind until
//! a node reports [`ProcessingStatus::Unfinished`] or the walk runs out of
//! execution links, in which case the cursor returns to its entry node.
//!
//! Before a node is evaluated, the data producers feeding it are pulled: they
//! are resolved recursively, evaluated, and their outputs copied into the
//! consumer's input slots.

use crate::evaluation::{EvaluationError, FrameTime, NodeContext, ProcessingStatus};
use crate::graph::Graph;
use crate::node::{EntryKind, Node, NodeId};
use crate::port::PortValue;
use crate::registry::{BehaviorTable, BindError, NodeRegistry};
use crate::scheduler::{data_producers, ComputeOrderScheduler, ScheduleReport};
use crate::settings::{DataMemoization, ProcessorSettings};
use indexmap::{IndexMap, IndexSet};

/// Position of one walk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    /// Node the walk started from
    pub entry: NodeId,
    /// Node to evaluate next
    pub current: NodeId,
}

impl Cursor {
    /// A walk that has not left its entry yet
    pub fn at(entry: NodeId) -> Self {
        Self {
            entry,
            current: entry,
        }
    }
}

/// Walk started by [`GraphProcessor::run_from`] that did not finish yet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PausedWalk {
    /// Kind the walk was started for
    pub kind: EntryKind,
    /// Where the walk stopped
    pub cursor: Cursor,
}

/// How a walk ended for this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WalkOutcome {
    /// Ran out of execution links
    Completed,
    /// A node reported Unfinished
    Paused,
    /// Hit the step bound before evaluating the current node
    Suspended,
}

impl WalkOutcome {
    fn status(self) -> ProcessingStatus {
        match self {
            WalkOutcome::Completed => ProcessingStatus::Finished,
            WalkOutcome::Paused | WalkOutcome::Suspended => ProcessingStatus::Unfinished,
        }
    }
}

/// Error surfaced by [`GraphProcessor`]
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    /// A node could not be bound to a behavior
    #[error(transparent)]
    Bind(#[from] BindError),

    /// A node's own evaluation failed
    #[error(transparent)]
    Evaluation(#[from] EvaluationError),
}

/// Interpreter for one script graph
pub struct GraphProcessor {
    graph: Graph,
    registry: NodeRegistry,
    behaviors: BehaviorTable,
    scheduler: ComputeOrderScheduler,
    settings: ProcessorSettings,
    /// Entry kinds ranked by every scheduling pass
    kinds: Vec<EntryKind>,
    walks: IndexMap<EntryKind, Vec<Cursor>>,
    paused: Vec<PausedWalk>,
    scheduled_revision: Option<u64>,
    bound_revision: u64,
    last_report: ScheduleReport,
    time: FrameTime,
}

impl GraphProcessor {
    /// Bind behaviors to every node of `graph`
    pub fn new(
        graph: Graph,
        registry: NodeRegistry,
        settings: ProcessorSettings,
    ) -> Result<Self, BindError> {
        let behaviors = registry.bind(&graph)?;
        let bound_revision = graph.revision();
        tracing::debug!("Bound {} behaviors for graph '{}'", behaviors.len(), graph.name);

        Ok(Self {
            graph,
            registry,
            behaviors,
            scheduler: ComputeOrderScheduler::from_settings(&settings),
            settings,
            kinds: EntryKind::all().to_vec(),
            walks: IndexMap::new(),
            paused: Vec::new(),
            scheduled_revision: None,
            bound_revision,
            last_report: ScheduleReport::default(),
            time: FrameTime::default(),
        })
    }

    /// Restrict the entry kinds that scheduling starts from
    pub fn set_entry_kinds(&mut self, kinds: &[EntryKind]) {
        self.kinds = kinds.to_vec();
        self.scheduled_revision = None;
    }

    /// Entry kinds that scheduling starts from
    pub fn entry_kinds(&self) -> &[EntryKind] {
        &self.kinds
    }

    /// Rank every node reachable from the registered entry kinds
    pub fn update_compute_order(&mut self) -> &ScheduleReport {
        self.last_report = self.scheduler.recompute_kinds(&mut self.graph, &self.kinds);
        self.scheduled_revision = Some(self.graph.revision());
        &self.last_report
    }

    /// Report of the latest scheduling pass
    pub fn schedule_report(&self) -> &ScheduleReport {
        &self.last_report
    }

    /// Re-bind and re-rank if the topology changed since the last pass
    pub fn ensure_ready(&mut self) -> Result<(), BindError> {
        let revision = self.graph.revision();

        if self.bound_revision != revision {
            self.behaviors.sync(&self.graph, &self.registry)?;
            self.bound_revision = revision;
            let graph = &self.graph;
            self.paused.retain(|p| graph.node(p.cursor.current).is_some());
        }

        if self.scheduled_revision != Some(revision) {
            self.update_compute_order();
        }
        Ok(())
    }

    /// Continue every walk started by the entry nodes of `kind`
    pub fn run(&mut self, kind: EntryKind) -> Result<ProcessingStatus, ProcessError> {
        self.ensure_ready()?;

        let mut cursors = self.sync_cursors(kind);
        let mut status = ProcessingStatus::Finished;
        let mut result = Ok(());

        for cursor in &mut cursors {
            match self.walk_cursor(cursor) {
                Ok(outcome) => {
                    if outcome == WalkOutcome::Completed {
                        cursor.current = cursor.entry;
                    } else {
                        status = ProcessingStatus::Unfinished;
                    }
                }
                Err(err) => {
                    result = Err(err);
                    break;
                }
            }
        }

        self.walks.insert(kind, cursors);
        result.map(|()| status)
    }

    /// Start walks at explicit nodes instead of the entry nodes of `kind`.
    ///
    /// A seed with a paused walk resumes that walk. Walks that stay unfinished
    /// are kept for [`run_paused`](Self::run_paused).
    pub fn run_from(
        &mut self,
        seeds: &[NodeId],
        kind: EntryKind,
    ) -> Result<ProcessingStatus, ProcessError> {
        self.ensure_ready()?;

        let mut status = ProcessingStatus::Finished;
        for &seed in seeds {
            if self.graph.node(seed).is_none() {
                tracing::warn!("Seed {:?} is not part of graph '{}'", seed, self.graph.name);
                continue;
            }

            let mut cursor = match self
                .paused
                .iter()
                .position(|p| p.kind == kind && p.cursor.entry == seed)
            {
                Some(index) => self.paused.remove(index).cursor,
                None => Cursor::at(seed),
            };

            let outcome = self.walk_cursor(&mut cursor)?;
            if outcome != WalkOutcome::Completed {
                self.paused.push(PausedWalk { kind, cursor });
                status = ProcessingStatus::Unfinished;
            }
        }
        Ok(status)
    }

    /// Resume every paused walk once
    pub fn run_paused(&mut self) -> Result<ProcessingStatus, ProcessError> {
        self.ensure_ready()?;

        let pending = std::mem::take(&mut self.paused);
        let mut status = ProcessingStatus::Finished;
        let mut iter = pending.into_iter();

        while let Some(mut walk) = iter.next() {
            match self.walk_cursor(&mut walk.cursor) {
                Ok(WalkOutcome::Completed) => {}
                Ok(_) => {
                    self.paused.push(walk);
                    status = ProcessingStatus::Unfinished;
                }
                Err(err) => {
                    self.paused.push(walk);
                    self.paused.extend(iter);
                    return Err(err);
                }
            }
        }
        Ok(status)
    }

    /// Abort every walk: reset behaviors, clear slot values and return all
    /// cursors to their entry nodes
    pub fn reset(&mut self) {
        self.behaviors.reset_all();
        for node in self.graph.nodes_mut() {
            node.clear_values();
        }
        for cursors in self.walks.values_mut() {
            for cursor in cursors.iter_mut() {
                cursor.current = cursor.entry;
            }
        }
        self.paused.clear();
        tracing::debug!("Reset graph '{}'", self.graph.name);
    }

    /// Node the walk from `entry` evaluates next
    pub fn current_node(&self, kind: EntryKind, entry: NodeId) -> Option<NodeId> {
        self.walks
            .get(&kind)?
            .iter()
            .find(|c| c.entry == entry)
            .map(|c| c.current)
    }

    /// Paused walks waiting for [`run_paused`](Self::run_paused)
    pub fn paused_walks(&self) -> &[PausedWalk] {
        &self.paused
    }

    /// Number of paused walks
    pub fn paused_count(&self) -> usize {
        self.paused.len()
    }

    /// Move the clock forward by one tick
    pub fn advance_time(&mut self, delta: f32) {
        self.time.advance(delta);
    }

    /// Simulation clock
    pub fn time(&self) -> FrameTime {
        self.time
    }

    /// Processor settings
    pub fn settings(&self) -> &ProcessorSettings {
        &self.settings
    }

    /// The graph being interpreted
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Mutable access to the graph. Topology edits are picked up on the next
    /// run; settings changes only reach behaviors bound afterwards.
    pub fn graph_mut(&mut self) -> &mut Graph {
        &mut self.graph
    }

    /// Write a value into an output slot of a node, e.g. an event payload on an
    /// entry node before it runs
    pub fn set_output(&mut self, node_id: NodeId, slot: usize, value: PortValue) -> bool {
        let Some(port) = self.graph.node_mut(node_id).and_then(|n| n.outputs.get_mut(slot)) else {
            return false;
        };
        port.value = Some(value);
        true
    }

    /// Cursors for the current entry nodes of `kind`, keeping the position of
    /// walks whose nodes still exist
    fn sync_cursors(&mut self, kind: EntryKind) -> Vec<Cursor> {
        let previous = self.walks.shift_remove(&kind).unwrap_or_default();
        self.graph
            .entry_nodes(&[kind])
            .into_iter()
            .map(|entry| {
                previous
                    .iter()
                    .find(|c| c.entry == entry && self.graph.node(c.current).is_some())
                    .copied()
                    .unwrap_or_else(|| Cursor::at(entry))
            })
            .collect()
    }

    fn walk_cursor(&mut self, cursor: &mut Cursor) -> Result<WalkOutcome, ProcessError> {
        let mut walker = Walker {
            graph: &mut self.graph,
            behaviors: &mut self.behaviors,
            settings: &self.settings,
            time: self.time,
            resolved: IndexSet::new(),
        };
        let outcome = walker.walk(&mut cursor.current)?;
        tracing::trace!(
            "Walk from {:?} ended {:?} at {:?}",
            cursor.entry,
            outcome.status(),
            cursor.current
        );
        Ok(outcome)
    }
}

/// One walk over the graph within a single tick
struct Walker<'a> {
    graph: &'a mut Graph,
    behaviors: &'a mut BehaviorTable,
    settings: &'a ProcessorSettings,
    time: FrameTime,
    /// Data producers already evaluated in the current resolution scope
    resolved: IndexSet<NodeId>,
}

impl Walker<'_> {
    /// Evaluate nodes from `current` along the chosen execution links.
    /// `current` is left on the node the walk stopped at.
    fn walk(&mut self, current: &mut NodeId) -> Result<WalkOutcome, ProcessError> {
        let mut steps = 0;

        loop {
            let id = *current;
            if !self.graph.node(id).is_some_and(Node::is_scheduled) {
                tracing::warn!(
                    "Node {:?} of graph '{}' has no compute order, skipping",
                    id,
                    self.graph.name
                );
                return Ok(WalkOutcome::Completed);
            }

            if steps >= self.settings.max_walk_steps {
                tracing::warn!(
                    "Walk in graph '{}' evaluated {} nodes this tick, suspending at {:?}",
                    self.graph.name,
                    steps,
                    id
                );
                return Ok(WalkOutcome::Suspended);
            }
            steps += 1;

            if self.settings.data_memoization == DataMemoization::PerNode {
                self.resolved.clear();
            }
            self.resolve_data(id)?;

            let (status, chosen) = self.evaluate(id)?;
            self.graph.push_outputs(id);

            if !status.is_finished() {
                return Ok(WalkOutcome::Paused);
            }

            match chosen.and_then(|slot| self.graph.next_node(id, slot)) {
                Some(next) => *current = next,
                None => return Ok(WalkOutcome::Completed),
            }
        }
    }

    /// Pull every data producer feeding `consumer`, deepest first
    fn resolve_data(&mut self, consumer: NodeId) -> Result<(), ProcessError> {
        for producer in data_producers(self.graph, consumer) {
            if !self.resolved.insert(producer) {
                continue;
            }
            if !self.graph.node(producer).is_some_and(Node::is_scheduled) {
                tracing::warn!(
                    "Data node {:?} of graph '{}' has no compute order, skipping",
                    producer,
                    self.graph.name
                );
                continue;
            }

            self.resolve_data(producer)?;
            self.evaluate(producer)?;
            self.graph.push_outputs(producer);
        }
        Ok(())
    }

    fn evaluate(&mut self, id: NodeId) -> Result<(ProcessingStatus, Option<usize>), EvaluationError> {
        let behavior = self.behaviors.get_mut(id).ok_or(EvaluationError::Unbound(id))?;
        let node = self.graph.node_mut(id).ok_or(EvaluationError::NodeNotFound(id))?;

        let mut ctx = NodeContext::new(node, self.time);
        let status = behavior.evaluate(&mut ctx)?;
        Ok((status, ctx.chosen_exec()))
    }
}
