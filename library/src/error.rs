use thiserror::Error;

use crate::model::node::NodeId;
use crate::model::path::Path;

#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("Path {path} does not resolve: {reason}")]
    PathResolution { path: Path, reason: String },
    #[error("Model error: {0}")]
    Model(String),
    #[error("No registry entry for identifier '{0}'")]
    RegistryLookup(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Transfer encoding error: {0}")]
    Transfer(#[from] bincode::Error),
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),
    #[error("Command error: {0}")]
    Command(String),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl LibraryError {
    pub fn path_resolution(path: &Path, reason: impl Into<String>) -> Self {
        LibraryError::PathResolution {
            path: path.clone(),
            reason: reason.into(),
        }
    }

    pub fn model(reason: impl Into<String>) -> Self {
        LibraryError::Model(reason.into())
    }

    pub fn command(reason: impl Into<String>) -> Self {
        LibraryError::Command(reason.into())
    }
}
