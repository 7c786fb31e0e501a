// SPDX-License-Identifier: MIT OR Apache-2.0
//! Processor configuration.

use serde::{Deserialize, Serialize};

/// Default bound on control-flow frontiers before a graph is reported as runaway
pub const DEFAULT_MAX_FRONTIERS: usize = 5000;

/// Default bound on nodes evaluated by one walk within a single tick
pub const DEFAULT_MAX_WALK_STEPS: usize = 10_000;

/// How long an evaluated data producer is remembered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DataMemoization {
    /// Producers are evaluated at most once per consumer resolution step
    #[default]
    PerNode,
    /// Producers are evaluated at most once per walk
    PerWalk,
}

/// Scheduler and interpreter settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorSettings {
    /// Frontier bound of the control-flow pass
    pub max_frontiers: usize,
    /// Node evaluations allowed per walk and tick
    pub max_walk_steps: usize,
    /// Producer memoization scope
    pub data_memoization: DataMemoization,
}

impl Default for ProcessorSettings {
    fn default() -> Self {
        Self {
            max_frontiers: DEFAULT_MAX_FRONTIERS,
            max_walk_steps: DEFAULT_MAX_WALK_STEPS,
            data_memoization: DataMemoization::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_use_defaults() {
        let settings: ProcessorSettings = ron::from_str("(max_frontiers: 64)").unwrap();
        assert_eq!(settings.max_frontiers, 64);
        assert_eq!(settings.max_walk_steps, DEFAULT_MAX_WALK_STEPS);
        assert_eq!(settings.data_memoization, DataMemoization::PerNode);
    }
}
