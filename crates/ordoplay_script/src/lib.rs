// SPDX-License-Identifier: MIT OR Apache-2.0
//! Visual scripting runtime for `OrdoPlay`.
//!
//! Scripts are node graphs with two kinds of links: execution links decide
//! which node runs next, data links carry values from producers to consumers.
//!
//! ## Architecture
//!
//! - [`graph`]: nodes, typed ports and validated connections
//! - [`scheduler`]: assigns every reachable node a compute order
//! - [`processor`]: walks the graph from entry nodes, tick by tick, pulling
//!   data producers before each node and resuming nodes that span ticks
//! - [`registry`] and [`nodes`]: node types and the behaviors bound to them
//! - [`instance`]: routes host signals (start, update, triggers, events, zones)
//! - [`document`]: RON persistence

pub mod connection;
pub mod document;
pub mod evaluation;
pub mod graph;
pub mod instance;
pub mod node;
pub mod nodes;
pub mod port;
pub mod processor;
pub mod registry;
pub mod scheduler;
pub mod settings;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use connection::{Connection, ConnectionId};
pub use document::{DocumentError, ScriptDocument};
pub use evaluation::{EvaluationError, FrameTime, NodeBehavior, NodeContext, ProcessingStatus};
pub use graph::{BranchAnalysis, ConnectionError, Graph};
pub use instance::{ScriptInstance, ScriptMessage, ZoneActivation};
pub use node::{EntryKind, Node, NodeCategory, NodeId, NodeType, UNSCHEDULED};
pub use nodes::create_script_registry;
pub use port::{EntityId, Port, PortDirection, PortId, PortKind, PortType, PortValue};
pub use processor::{GraphProcessor, ProcessError};
pub use registry::{BehaviorTable, BindError, NodeRegistry};
pub use scheduler::{ComputeOrderScheduler, ScheduleDiagnostic, ScheduleReport};
pub use settings::{DataMemoization, ProcessorSettings};
