// SPDX-License-Identifier: MIT OR Apache-2.0
//! Built-in script nodes.
//!
//! Entry nodes for every host signal, a few actions that span ticks and pure
//! data nodes for arithmetic and text.

pub mod actions;
pub mod data;
pub mod entries;

use crate::registry::NodeRegistry;

/// Output slot carrying the payload of an entry node (delta time, other
/// object or event value)
pub const PAYLOAD_SLOT: usize = 1;

/// Type IDs of the built-in nodes
pub mod ids {
    /// Runs once when the script starts
    pub const ON_START: &str = "on_start";
    /// Runs every tick
    pub const ON_UPDATE: &str = "on_update";
    /// An object entered the trigger volume
    pub const ON_TRIGGER_ENTERED: &str = "on_trigger_entered";
    /// An object left the trigger volume
    pub const ON_TRIGGER_EXITED: &str = "on_trigger_exited";
    /// The owner collided with an object
    pub const ON_COLLISION: &str = "on_collision";
    /// A named event was raised
    pub const ON_EVENT: &str = "on_event";
    /// Zone activity
    pub const ON_ZONE_EVENT: &str = "on_zone_event";
    /// Print text
    pub const LOG: &str = "log";
    /// If/else
    pub const BRANCH: &str = "branch";
    /// Delay
    pub const WAIT: &str = "wait";
    /// Fixed value
    pub const CONSTANT: &str = "constant";
    /// Sum of two numbers
    pub const ADD: &str = "add";
    /// Comparison of two numbers
    pub const GREATER: &str = "greater";
    /// Text from a template
    pub const FORMAT: &str = "format";
}

/// Create the registry of every built-in node
pub fn create_script_registry() -> NodeRegistry {
    let mut registry = NodeRegistry::new();
    entries::register(&mut registry);
    actions::register(&mut registry);
    data::register(&mut registry);
    registry
}
