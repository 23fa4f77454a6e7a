//! Persisted form of a graph.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::LibraryError;
use crate::model::identifier::{Identifier, IdentifierSnapshot};
use crate::model::modifier::ModifierData;
use crate::model::node::{NodeId, NodeKind, Vec2};
use crate::model::path::Path;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct NodeData {
    pub id: NodeId,
    pub kind: NodeKind,
    pub factory: Identifier,
    pub location: Option<PathBuf>,
    pub position: Vec2,
    pub size: Vec2,
    pub modifiers: Vec<ModifierData>,
    pub expanded: Vec<Path>,
}

impl NodeData {
    pub fn new(kind: NodeKind, factory: Identifier) -> Self {
        Self {
            id: NodeId::new(),
            kind,
            factory,
            location: None,
            position: Vec2::default(),
            size: Vec2::default(),
            modifiers: Vec::new(),
            expanded: Vec::new(),
        }
    }

    pub fn with_location(mut self, location: impl Into<PathBuf>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_modifier(mut self, modifier: ModifierData) -> Self {
        self.modifiers.push(modifier);
        self
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ProjectData {
    pub project_id: Uuid,
    pub nodes: Vec<NodeData>,
}

impl ProjectData {
    pub fn new() -> Self {
        Self {
            project_id: Uuid::new_v4(),
            nodes: Vec::new(),
        }
    }
}

impl Default for ProjectData {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct FactoryVersion {
    pub identifier: Identifier,
    pub version: u32,
}

/// A graph together with what its identifiers mean, so that it can be
/// loaded by a process with a different interning table.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct GraphBundle {
    pub project: ProjectData,
    pub identifiers: Vec<IdentifierSnapshot>,
    pub factory_versions: Vec<FactoryVersion>,
}

impl GraphBundle {
    pub fn to_json(&self) -> Result<String, LibraryError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, LibraryError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, LibraryError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, LibraryError> {
        Ok(bincode::deserialize(bytes)?)
    }

    pub fn version_of(&self, identifier: Identifier) -> Option<u32> {
        self.factory_versions
            .iter()
            .find(|v| v.identifier == identifier)
            .map(|v| v.version)
    }
}
