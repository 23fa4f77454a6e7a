pub mod builtin;
pub mod command;
pub mod error;
pub mod graph;
pub mod model;
pub mod plugin;
pub mod service;
pub mod util;

use std::sync::Arc;

pub use error::LibraryError;
pub use graph::{Graph, ProcessReport};
pub use model::identifier::{Identifier, IdentifierInterner};
pub use model::modifier::ModifierData;
pub use model::node::{Node, NodeId, NodeKind, Vec2};
pub use model::path::Path;
pub use model::project::{GraphBundle, NodeData, ProjectData};
pub use model::value::{Scalar, ValueNode};
pub use plugin::PluginManager;
pub use service::ProjectService;

/// Creates a plugin manager with its own interning table and every
/// built-in format and processor registered.
pub fn create_plugin_manager() -> Arc<PluginManager> {
    Arc::new(PluginManager::with_builtins(Arc::new(
        IdentifierInterner::new(),
    )))
}
