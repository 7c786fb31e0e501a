// SPDX-License-Identifier: MIT OR Apache-2.0
//! Port definitions for node inputs/outputs.
//!
//! A port is either an execution link (control flow) or a typed data slot.
//! Data slots carry the value that was last written into them, so a node reads
//! its inputs by slot index instead of looking fields up by name every tick.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortId(pub Uuid);

impl PortId {
    /// Create a new random port ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PortId {
    fn default() -> Self {
        Self::new()
    }
}

/// Port direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortDirection {
    /// Input port
    Input,
    /// Output port
    Output,
}

/// Whether a port carries control flow or data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortKind {
    /// "Run next" control flow
    ExecutionLink,
    /// Computed value
    Data,
}

/// Data type that can flow through ports
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortType {
    /// Execution flow
    Exec,
    /// Boolean value
    Bool,
    /// Integer value
    Int,
    /// Floating point value
    Float,
    /// 3D vector
    Vector3,
    /// String value
    String,
    /// Entity reference
    Entity,
    /// Any type (for generic nodes)
    Any,
}

impl PortType {
    /// Kind of link this type represents
    pub fn kind(&self) -> PortKind {
        match self {
            Self::Exec => PortKind::ExecutionLink,
            _ => PortKind::Data,
        }
    }

    /// Check if this type can connect to another type
    pub fn can_connect_to(&self, other: &PortType) -> bool {
        // Execution links only pair with execution links
        if matches!(self, Self::Exec) || matches!(other, Self::Exec) {
            return self == other;
        }

        if matches!(self, Self::Any) || matches!(other, Self::Any) {
            return true;
        }

        if self == other {
            return true;
        }

        match (self, other) {
            (Self::Int, Self::Float) | (Self::Float, Self::Int) => true,
            (Self::Float, Self::Vector3) => true,
            // Everything can be shown as text
            (_, Self::String) => true,
            _ => false,
        }
    }
}

/// A port on a node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Port {
    /// Unique port ID
    pub id: PortId,
    /// Field name this port maps to
    pub name: String,
    /// Port direction
    pub direction: PortDirection,
    /// Data type
    pub port_type: PortType,
    /// Default value (for inputs)
    pub default_value: Option<PortValue>,
    /// Whether multiple connections are allowed
    pub multi_connect: bool,
    /// Value currently held by the slot
    #[serde(skip)]
    pub value: Option<PortValue>,
}

impl Port {
    /// Create a new port
    pub fn new(
        id: PortId,
        name: impl Into<String>,
        port_type: PortType,
        direction: PortDirection,
    ) -> Self {
        // Outputs fan out, execution inputs merge
        let multi_connect = direction == PortDirection::Output || port_type == PortType::Exec;
        Self {
            id,
            name: name.into(),
            direction,
            port_type,
            default_value: None,
            multi_connect,
            value: None,
        }
    }

    /// Create a new input port
    pub fn input(name: impl Into<String>, port_type: PortType) -> Self {
        Self::new(PortId::new(), name, port_type, PortDirection::Input)
    }

    /// Create a new output port
    pub fn output(name: impl Into<String>, port_type: PortType) -> Self {
        Self::new(PortId::new(), name, port_type, PortDirection::Output)
    }

    /// Set the default value
    pub fn with_default(mut self, value: PortValue) -> Self {
        self.default_value = Some(value);
        self
    }

    /// Copy of this port with a fresh ID and an empty slot
    pub fn instantiate(&self) -> Self {
        Self {
            id: PortId::new(),
            value: None,
            ..self.clone()
        }
    }

    /// Kind of link carried by this port
    pub fn kind(&self) -> PortKind {
        self.port_type.kind()
    }

    /// Whether this port carries control flow
    pub fn is_exec(&self) -> bool {
        self.kind() == PortKind::ExecutionLink
    }

    /// Current slot value, falling back to the default
    pub fn current(&self) -> Option<&PortValue> {
        self.value.as_ref().or(self.default_value.as_ref())
    }

    /// Check if a connection to another port is valid
    pub fn can_connect(&self, other: &Port) -> bool {
        if self.direction == other.direction {
            return false;
        }

        self.port_type.can_connect_to(&other.port_type)
    }
}

/// Handle to a host-side object (game object, collider, ...)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityId(pub u64);

/// Value that can be stored in a port
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PortValue {
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i32),
    /// Float
    Float(f32),
    /// 3D vector
    Vector3([f32; 3]),
    /// String
    String(String),
    /// Entity reference
    Entity(EntityId),
}

impl PortValue {
    /// Get the port type for this value
    pub fn port_type(&self) -> PortType {
        match self {
            Self::Bool(_) => PortType::Bool,
            Self::Int(_) => PortType::Int,
            Self::Float(_) => PortType::Float,
            Self::Vector3(_) => PortType::Vector3,
            Self::String(_) => PortType::String,
            Self::Entity(_) => PortType::Entity,
        }
    }

    /// Numeric view, integers widen to floats
    pub fn as_float(&self) -> Option<f32> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f32),
            _ => None,
        }
    }

    /// Integer view, floats are truncated
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Float(v) => Some(*v as i32),
            _ => None,
        }
    }

    /// Boolean view
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// String view
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    /// Entity view
    pub fn as_entity(&self) -> Option<EntityId> {
        match self {
            Self::Entity(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for PortValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Vector3([x, y, z]) => write!(f, "({x}, {y}, {z})"),
            Self::String(v) => f.write_str(v),
            Self::Entity(v) => write!(f, "Entity({})", v.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exec_only_connects_to_exec() {
        assert!(PortType::Exec.can_connect_to(&PortType::Exec));
        assert!(!PortType::Exec.can_connect_to(&PortType::Any));
        assert!(!PortType::Float.can_connect_to(&PortType::Exec));
    }

    #[test]
    fn test_implicit_conversions() {
        assert!(PortType::Int.can_connect_to(&PortType::Float));
        assert!(PortType::Entity.can_connect_to(&PortType::String));
        assert!(!PortType::String.can_connect_to(&PortType::Bool));
    }

    #[test]
    fn test_exec_inputs_accept_merges() {
        let exec_in = Port::input("Exec", PortType::Exec);
        let data_in = Port::input("Value", PortType::Float);
        assert!(exec_in.multi_connect);
        assert!(!data_in.multi_connect);
    }

    #[test]
    fn test_current_falls_back_to_default() {
        let mut port = Port::input("Amount", PortType::Int).with_default(PortValue::Int(1));
        assert_eq!(port.current(), Some(&PortValue::Int(1)));
        port.value = Some(PortValue::Int(4));
        assert_eq!(port.current(), Some(&PortValue::Int(4)));

        let copy = port.instantiate();
        assert_ne!(copy.id, port.id);
        assert_eq!(copy.current(), Some(&PortValue::Int(1)));
    }
}
