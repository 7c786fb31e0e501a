// SPDX-License-Identifier: MIT OR Apache-2.0
//! Compute-order scheduling.
//!
//! Ranks are assigned in two passes:
//!
//! 1. A breadth-first pass over execution links, seeded with every entry node at
//!    once. A node is ranked by the frontier that reaches it; a deeper frontier
//!    reaching it again re-ranks it, so a merge point always sits after its
//!    longest branch.
//! 2. A data pass over the frontier classes of the first pass. Each class is
//!    shifted by the longest data-producer chain feeding it, then the producers
//!    are ranked backwards from their consumers.
//!
//! After both passes an execution link `A -> B` has `rank(A) <= rank(B)` and a
//! data link from a data node `A` to a scheduled node `B` has `rank(A) < rank(B)`.

use crate::graph::{BranchAnalysis, Graph};
use crate::node::{EntryKind, NodeCategory, NodeId, UNSCHEDULED};
use crate::settings::{ProcessorSettings, DEFAULT_MAX_FRONTIERS};
use indexmap::{IndexMap, IndexSet};

/// Non-fatal problem found while scheduling
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleDiagnostic {
    /// The control-flow pass hit the frontier bound (cycle or runaway graph)
    RunawayControlFlow {
        /// Graph name
        graph: String,
        /// Frontiers processed before giving up
        frontiers: usize,
    },
    /// A data producer depends on itself
    DataCycle {
        /// Graph name
        graph: String,
        /// Consumer whose dependency chain loops
        node: NodeId,
    },
}

/// Result of a scheduling pass
#[derive(Debug, Clone, Default)]
pub struct ScheduleReport {
    /// Entry nodes the pass started from
    pub entries: Vec<NodeId>,
    /// Nodes that received a rank
    pub scheduled: usize,
    /// Problems found on the way
    pub diagnostics: Vec<ScheduleDiagnostic>,
    /// Split and join points of the control flow
    pub branches: BranchAnalysis,
}

impl ScheduleReport {
    /// Check if the pass finished without diagnostics
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// Assigns compute orders to the nodes of a graph
#[derive(Debug, Clone)]
pub struct ComputeOrderScheduler {
    max_frontiers: usize,
}

impl ComputeOrderScheduler {
    /// Create a scheduler with the given frontier bound
    pub fn new(max_frontiers: usize) -> Self {
        Self { max_frontiers }
    }

    /// Create a scheduler from processor settings
    pub fn from_settings(settings: &ProcessorSettings) -> Self {
        Self::new(settings.max_frontiers)
    }

    /// Recompute ranks for the entry nodes of one category
    pub fn recompute(&self, graph: &mut Graph, kind: EntryKind) -> ScheduleReport {
        self.recompute_kinds(graph, &[kind])
    }

    /// Recompute ranks for the entry nodes of several categories in one pass
    pub fn recompute_kinds(&self, graph: &mut Graph, kinds: &[EntryKind]) -> ScheduleReport {
        graph.reset_compute_order();

        let mut report = ScheduleReport {
            branches: graph.find_branches(),
            ..Default::default()
        };

        let entries = graph.entry_nodes(kinds);
        if entries.is_empty() {
            return report;
        }
        report.entries = entries.clone();

        let computed = self.control_pass(graph, &entries, &mut report);
        let data_ranked = self.data_pass(graph, &computed, &mut report);

        report.scheduled = computed.len() + data_ranked;
        tracing::debug!(
            "Scheduled {} nodes of graph '{}' from {} entries",
            report.scheduled,
            graph.name,
            report.entries.len()
        );
        report
    }

    /// Breadth-first pass along execution links. Returns the ranked nodes in the
    /// order they were first reached.
    fn control_pass(
        &self,
        graph: &mut Graph,
        entries: &[NodeId],
        report: &mut ScheduleReport,
    ) -> IndexSet<NodeId> {
        let mut computed = IndexSet::new();
        let mut frontier: IndexSet<NodeId> = entries.iter().copied().collect();
        let mut rank: i32 = 0;

        while !frontier.is_empty() {
            if rank as usize > self.max_frontiers {
                tracing::error!(
                    "Infinite loop in nodes of graph '{}' detected, scheduling stopped after {} frontiers",
                    graph.name,
                    rank
                );
                report.diagnostics.push(ScheduleDiagnostic::RunawayControlFlow {
                    graph: graph.name.clone(),
                    frontiers: rank as usize,
                });
                break;
            }

            let mut next = IndexSet::new();
            for &id in &frontier {
                let Some(node) = graph.node_mut(id) else {
                    continue;
                };
                if node.compute_order < rank {
                    node.compute_order = rank;
                    computed.insert(id);
                    next.extend(graph.possible_next_nodes(id));
                }
            }

            frontier = next;
            rank += 1;
        }

        computed
    }

    /// Widen frontier classes by their data chains and rank the producers.
    /// Returns the number of data producers that received a rank.
    fn data_pass(
        &self,
        graph: &mut Graph,
        computed: &IndexSet<NodeId>,
        report: &mut ScheduleReport,
    ) -> usize {
        // Stable sort keeps first-reached order inside a class
        let mut finals: Vec<(NodeId, i32)> = computed
            .iter()
            .map(|&id| (id, graph.compute_order(id)))
            .collect();
        finals.sort_by_key(|&(_, rank)| rank);

        let mut producers: IndexMap<NodeId, i32> = IndexMap::new();
        let mut offset = 0;
        let mut low = 0;

        while low < finals.len() {
            let class_rank = finals[low].1;
            let high = finals[low..]
                .iter()
                .position(|&(_, rank)| rank != class_rank)
                .map_or(finals.len(), |p| low + p);
            let class = &finals[low..high];

            let longest = class
                .iter()
                .map(|&(id, _)| self.longest_dependency_chain(graph, id, report))
                .max()
                .unwrap_or(0);

            let rank = class_rank + offset + longest;
            for &(id, _) in class {
                if let Some(node) = graph.node_mut(id) {
                    node.compute_order = rank;
                }
            }
            for &(id, _) in class {
                Self::rank_producers(graph, id, &mut producers);
            }

            offset += longest;
            low = high;
        }

        producers.len()
    }

    /// Number of data-producer generations feeding `start`
    fn longest_dependency_chain(
        &self,
        graph: &Graph,
        start: NodeId,
        report: &mut ScheduleReport,
    ) -> i32 {
        let limit = graph.node_count();
        let mut frontier = data_producers(graph, start);
        let mut length = 0;

        while !frontier.is_empty() {
            length += 1;
            if length as usize > limit {
                let diagnostic = ScheduleDiagnostic::DataCycle {
                    graph: graph.name.clone(),
                    node: start,
                };
                if !report.diagnostics.contains(&diagnostic) {
                    tracing::error!(
                        "Cyclic data dependency feeding node {:?} in graph '{}'",
                        start,
                        graph.name
                    );
                    report.diagnostics.push(diagnostic);
                }
                break;
            }

            let mut next = IndexSet::new();
            for &id in &frontier {
                next.extend(data_producers(graph, id));
            }
            frontier = next;
        }

        length
    }

    /// Walk backwards from `start` giving every data producer one less than its
    /// consumer. A producer shared by several consumers keeps the lowest rank it
    /// was offered, so it stays ahead of all of them.
    fn rank_producers(graph: &mut Graph, start: NodeId, producers: &mut IndexMap<NodeId, i32>) {
        let limit = graph.node_count();
        let mut frontier = data_producers(graph, start);
        let mut rank = graph.compute_order(start);
        let mut depth = 0;

        while !frontier.is_empty() && depth < limit {
            rank -= 1;
            depth += 1;

            let mut next = IndexSet::new();
            for &id in &frontier {
                let assigned = producers
                    .entry(id)
                    .and_modify(|r| *r = (*r).min(rank))
                    .or_insert(rank);
                let assigned = *assigned;
                if let Some(node) = graph.node_mut(id) {
                    node.compute_order = assigned;
                }
                next.extend(data_producers(graph, id));
            }
            frontier = next;
        }
    }
}

impl Default for ComputeOrderScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRONTIERS)
    }
}

/// Data-category nodes feeding the data inputs of `node_id`
pub(crate) fn data_producers(graph: &Graph, node_id: NodeId) -> IndexSet<NodeId> {
    graph
        .data_input_nodes(node_id)
        .into_iter()
        .filter(|id| graph.node(*id).is_some_and(|n| n.category == NodeCategory::Data))
        .collect()
}

/// Check the ordering invariants on a scheduled graph. Returns the offending
/// connections as `(from, to)` pairs.
pub fn ordering_violations(graph: &Graph) -> Vec<(NodeId, NodeId)> {
    graph
        .connections()
        .filter(|c| {
            let from = graph.compute_order(c.from_node);
            let to = graph.compute_order(c.to_node);
            if from == UNSCHEDULED || to == UNSCHEDULED {
                return false;
            }
            if c.exec {
                to < from
            } else {
                let from_is_data = graph
                    .node(c.from_node)
                    .is_some_and(|n| n.category == NodeCategory::Data);
                from_is_data && from >= to
            }
        })
        .map(|c| (c.from_node, c.to_node))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::GraphBuilder;

    #[test]
    fn test_linear_chain() {
        let mut b = GraphBuilder::new("chain");
        let entry = b.entry(EntryKind::Update, 0.0);
        let mut chain = vec![entry];
        for _ in 0..5 {
            let next = b.action();
            b.flow(*chain.last().unwrap(), next);
            chain.push(next);
        }
        let mut graph = b.build();

        let report = ComputeOrderScheduler::default().recompute(&mut graph, EntryKind::Update);
        assert!(report.is_clean());
        assert_eq!(report.scheduled, 6);
        for (i, id) in chain.iter().enumerate() {
            assert_eq!(graph.compute_order(*id), i as i32);
        }
    }

    #[test]
    fn test_no_entries_schedules_nothing() {
        let mut b = GraphBuilder::new("empty");
        let a = b.action();
        let c = b.action();
        b.flow(a, c);
        let mut graph = b.build();

        let report = ComputeOrderScheduler::default().recompute(&mut graph, EntryKind::Start);
        assert_eq!(report.scheduled, 0);
        assert_eq!(graph.compute_order(a), UNSCHEDULED);
        assert_eq!(graph.compute_order(c), UNSCHEDULED);
    }

    #[test]
    fn test_other_category_left_unscheduled() {
        let mut b = GraphBuilder::new("categories");
        let start = b.entry(EntryKind::Start, 0.0);
        let update = b.entry(EntryKind::Update, 10.0);
        let a = b.action();
        let u = b.action();
        b.flow(start, a);
        b.flow(update, u);
        let mut graph = b.build();

        ComputeOrderScheduler::default().recompute(&mut graph, EntryKind::Start);
        assert_eq!(graph.compute_order(a), 1);
        assert_eq!(graph.compute_order(update), UNSCHEDULED);
        assert_eq!(graph.compute_order(u), UNSCHEDULED);

        ComputeOrderScheduler::default()
            .recompute_kinds(&mut graph, &[EntryKind::Start, EntryKind::Update]);
        assert_eq!(graph.compute_order(update), 0);
        assert_eq!(graph.compute_order(u), 1);
    }

    #[test]
    fn test_merge_after_longest_branch() {
        let mut b = GraphBuilder::new("merge");
        let entry = b.entry(EntryKind::Update, 0.0);
        let left = b.action();
        let left2 = b.action();
        let right = b.action();
        let merge = b.action();
        b.flow(entry, left);
        b.flow_alt(entry, right);
        b.flow(left, left2);
        b.flow(left2, merge);
        b.flow(right, merge);
        let mut graph = b.build();

        let report = ComputeOrderScheduler::default().recompute(&mut graph, EntryKind::Update);
        assert!(report.branches.ends.contains(&merge));
        assert_eq!(graph.compute_order(right), 1);
        assert_eq!(graph.compute_order(left2), 2);
        assert_eq!(graph.compute_order(merge), 3);
        assert!(ordering_violations(&graph).is_empty());
    }

    #[test]
    fn test_merge_widened_by_data_chain() {
        let mut b = GraphBuilder::new("merge-data");
        let entry = b.entry(EntryKind::Update, 0.0);
        let left = b.action();
        let right = b.action();
        let merge = b.action();
        let value = b.data();
        b.flow(entry, left);
        b.flow_alt(entry, right);
        b.flow(left, merge);
        b.flow(right, merge);
        b.feed(value, merge, "A");
        let mut graph = b.build();

        ComputeOrderScheduler::default().recompute(&mut graph, EntryKind::Update);
        // merge sits at frontier 2, one producer generation pushes it to 3
        assert_eq!(graph.compute_order(merge), 3);
        assert_eq!(graph.compute_order(value), 2);
        assert!(graph.compute_order(merge) >= graph.compute_order(left).max(graph.compute_order(right)));
    }

    #[test]
    fn test_data_widening_offsets_later_classes() {
        let mut b = GraphBuilder::new("widening");
        let entry = b.entry(EntryKind::Update, 0.0);
        let a = b.action();
        let c = b.action();
        let d1 = b.data();
        let d0 = b.data();
        b.flow(entry, a);
        b.flow(a, c);
        b.feed(d1, a, "A");
        b.feed(d0, d1, "A");
        let mut graph = b.build();

        let report = ComputeOrderScheduler::default().recompute(&mut graph, EntryKind::Update);
        assert_eq!(report.scheduled, 5);
        assert_eq!(graph.compute_order(entry), 0);
        assert_eq!(graph.compute_order(d0), 1);
        assert_eq!(graph.compute_order(d1), 2);
        assert_eq!(graph.compute_order(a), 3);
        assert_eq!(graph.compute_order(c), 4);
    }

    #[test]
    fn test_shared_producer_stays_ahead_of_all_consumers() {
        let mut b = GraphBuilder::new("shared");
        let entry = b.entry(EntryKind::Update, 0.0);
        let first = b.action();
        let second = b.action();
        let third = b.action();
        let shared = b.data();
        let deep = b.data();
        b.flow(entry, first);
        b.flow(first, second);
        b.flow(second, third);
        b.feed(shared, first, "A");
        b.feed(deep, third, "A");
        b.feed(shared, deep, "A");
        let mut graph = b.build();

        ComputeOrderScheduler::default().recompute(&mut graph, EntryKind::Update);
        assert!(graph.compute_order(shared) < graph.compute_order(first));
        assert!(graph.compute_order(shared) < graph.compute_order(deep));
        assert!(graph.compute_order(deep) < graph.compute_order(third));
        assert!(ordering_violations(&graph).is_empty());
    }

    #[test]
    fn test_control_cycle_is_reported() {
        let mut b = GraphBuilder::new("looping");
        let looping = b.entry(EntryKind::Update, 0.0);
        let a = b.action();
        let c = b.action();
        b.flow(looping, a);
        b.flow(a, c);
        b.flow(c, a);

        let other = b.entry(EntryKind::Update, 100.0);
        let x = b.action();
        let y = b.action();
        b.flow(other, x);
        b.flow(x, y);
        let mut graph = b.build();

        let report = ComputeOrderScheduler::new(64).recompute(&mut graph, EntryKind::Update);
        assert!(matches!(
            report.diagnostics.as_slice(),
            [ScheduleDiagnostic::RunawayControlFlow { graph, .. }] if graph == "looping"
        ));
        assert_eq!(graph.compute_order(other), 0);
        assert_eq!(graph.compute_order(x), 1);
        assert_eq!(graph.compute_order(y), 2);
        assert!(graph.compute_order(a) > 0);
    }

    #[test]
    fn test_self_loop_is_reported() {
        let mut b = GraphBuilder::new("self");
        let entry = b.entry(EntryKind::Update, 0.0);
        let a = b.action();
        b.flow(entry, a);
        b.flow(a, a);
        let mut graph = b.build();

        let report = ComputeOrderScheduler::new(16).recompute(&mut graph, EntryKind::Update);
        assert!(!report.is_clean());
        assert_eq!(graph.compute_order(entry), 0);
    }

    #[test]
    fn test_data_cycle_is_reported() {
        let mut b = GraphBuilder::new("data-loop");
        let entry = b.entry(EntryKind::Update, 0.0);
        let a = b.action();
        let p = b.data();
        let q = b.data();
        b.flow(entry, a);
        b.feed(p, a, "A");
        b.feed(q, p, "A");
        b.feed(p, q, "A");
        let mut graph = b.build();

        let report = ComputeOrderScheduler::default().recompute(&mut graph, EntryKind::Update);
        assert!(report
            .diagnostics
            .iter()
            .any(|d| matches!(d, ScheduleDiagnostic::DataCycle { node, .. } if *node == a)));
        assert!(graph.compute_order(a) >= 0);
    }

    #[test]
    fn test_unreachable_nodes_stay_unscheduled() {
        let mut b = GraphBuilder::new("dangling");
        let entry = b.entry(EntryKind::Update, 0.0);
        let a = b.action();
        let orphan = b.action();
        let orphan_data = b.data();
        b.flow(entry, a);
        b.feed(orphan_data, orphan, "A");
        let mut graph = b.build();

        ComputeOrderScheduler::default().recompute(&mut graph, EntryKind::Update);
        assert_eq!(graph.compute_order(orphan), UNSCHEDULED);
        assert_eq!(graph.compute_order(orphan_data), UNSCHEDULED);
    }

    #[test]
    fn test_multiple_entries_share_frontiers() {
        let mut b = GraphBuilder::new("entries");
        let first = b.entry(EntryKind::Update, 0.0);
        let second = b.entry(EntryKind::Update, 50.0);
        let a = b.action();
        let shared = b.action();
        b.flow(first, a);
        b.flow(a, shared);
        b.flow(second, shared);
        let mut graph = b.build();

        let report = ComputeOrderScheduler::default().recompute(&mut graph, EntryKind::Update);
        assert_eq!(report.entries, vec![first, second]);
        assert_eq!(graph.compute_order(second), 0);
        assert_eq!(graph.compute_order(shared), 2);
    }

    #[test]
    fn test_recompute_resets_previous_ranks() {
        let mut b = GraphBuilder::new("reset");
        let entry = b.entry(EntryKind::Update, 0.0);
        let a = b.action();
        let link = b.flow(entry, a);
        let mut graph = b.build();

        let scheduler = ComputeOrderScheduler::default();
        scheduler.recompute(&mut graph, EntryKind::Update);
        assert_eq!(graph.compute_order(a), 1);

        graph.disconnect(link);
        scheduler.recompute(&mut graph, EntryKind::Update);
        assert_eq!(graph.compute_order(a), UNSCHEDULED);
    }
}
