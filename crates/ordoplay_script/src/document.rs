// SPDX-License-Identifier: MIT OR Apache-2.0
//! Script documents: a graph plus its processor settings, stored as RON.

use crate::graph::Graph;
use crate::instance::ScriptInstance;
use crate::processor::GraphProcessor;
use crate::registry::{BindError, NodeRegistry};
use crate::settings::ProcessorSettings;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Current script document format version
pub const SCRIPT_FORMAT_VERSION: u32 = 1;

/// File extension of script documents
pub const SCRIPT_EXTENSION: &str = "script.ron";

/// A saved script
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptDocument {
    /// Format version
    pub version: u32,
    /// Script name
    pub name: String,
    /// Scheduler and interpreter settings
    #[serde(default)]
    pub settings: ProcessorSettings,
    /// The script graph
    pub graph: Graph,
}

impl ScriptDocument {
    /// Create a document around a graph with default settings
    pub fn new(graph: Graph) -> Self {
        Self {
            version: SCRIPT_FORMAT_VERSION,
            name: graph.name.clone(),
            settings: ProcessorSettings::default(),
            graph,
        }
    }

    /// Parse a document from RON text
    pub fn from_ron_str(source: &str) -> Result<Self, DocumentError> {
        let document: ScriptDocument = ron::from_str(source)?;

        if document.version > SCRIPT_FORMAT_VERSION {
            return Err(DocumentError::UnsupportedVersion {
                found: document.version,
                supported: SCRIPT_FORMAT_VERSION,
            });
        }

        Ok(document)
    }

    /// Serialize the document to RON text
    pub fn to_ron_string(&self) -> Result<String, DocumentError> {
        let config = ron::ser::PrettyConfig::default()
            .struct_names(true)
            .enumerate_arrays(false);
        Ok(ron::ser::to_string_pretty(self, config)?)
    }

    /// Load a document from a file
    pub fn load(path: &Path) -> Result<Self, DocumentError> {
        let content = std::fs::read_to_string(path)?;
        let document = Self::from_ron_str(&content)?;
        tracing::info!("Loaded script '{}' from {}", document.name, path.display());
        Ok(document)
    }

    /// Save the document to a file
    pub fn save(&self, path: &Path) -> Result<(), DocumentError> {
        let content = self.to_ron_string()?;
        std::fs::write(path, content)?;
        tracing::info!("Saved script '{}' to {}", self.name, path.display());
        Ok(())
    }

    /// Bind the graph against a registry and wrap it in a script instance
    pub fn instantiate(self, registry: NodeRegistry) -> Result<ScriptInstance, BindError> {
        let processor = GraphProcessor::new(self.graph, registry, self.settings)?;
        Ok(ScriptInstance::new(processor))
    }
}

/// Error when loading or saving a script document
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    /// File could not be read or written
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Text is not a valid document
    #[error("Failed to parse script document: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// Document could not be serialized
    #[error("Failed to serialize script document: {0}")]
    Serialize(#[from] ron::Error),

    /// Document was written by a newer version
    #[error("Script version {found} is newer than supported version {supported}")]
    UnsupportedVersion {
        /// Version found in the document
        found: u32,
        /// Newest supported version
        supported: u32,
    },
}
