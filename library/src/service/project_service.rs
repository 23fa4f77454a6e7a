use std::fs;
use std::path::Path as FsPath;
use std::sync::Arc;

use log::{Level, info};

use crate::command::{
    AddArrayEntriesCommand, AddModifierCommand, AddNodeCommand, Command, CommandManager,
    MoveNodeCommand, RemoveArrayEntriesCommand, RemoveModifierCommand, RemoveNodeCommand,
    SetExpandedCommand,
};
use crate::error::LibraryError;
use crate::graph::{Graph, ProcessReport, remap_bundle};
use crate::model::modifier::ModifierData;
use crate::model::node::{Node, NodeId, NodeKind, Vec2};
use crate::model::path::Path;
use crate::model::project::{GraphBundle, NodeData, ProjectData};
use crate::plugin::PluginManager;
use crate::util::timing::{ScopedTimer, measure};

/// Editing front door: every mutation goes through the command history.
pub struct ProjectService {
    graph: Graph,
    history: CommandManager,
    plugin_manager: Arc<PluginManager>,
}

impl ProjectService {
    pub fn new(plugin_manager: Arc<PluginManager>) -> Self {
        Self::with_history_limit(plugin_manager, None)
    }

    pub fn with_history_limit(plugin_manager: Arc<PluginManager>, limit: Option<usize>) -> Self {
        let history = match limit {
            Some(limit) => CommandManager::with_limit(limit),
            None => CommandManager::new(),
        };
        Self {
            graph: Graph::new(Arc::clone(&plugin_manager)),
            history,
            plugin_manager,
        }
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn history(&self) -> &CommandManager {
        &self.history
    }

    pub fn get_plugin_manager(&self) -> Arc<PluginManager> {
        Arc::clone(&self.plugin_manager)
    }

    // --- Queries ---

    pub fn get_node(&self, id: NodeId) -> Result<&Node, LibraryError> {
        self.graph.node(id)
    }

    pub fn get_nodes(&self) -> Vec<&Node> {
        self.graph.nodes().collect()
    }

    // --- Edits ---

    pub fn execute(&mut self, command: Box<dyn Command>) -> Result<(), LibraryError> {
        self.history.execute(&mut self.graph, command)
    }

    /// Returns the id the node was given, which differs from `data.id`
    /// when that one was already taken.
    pub fn add_node(&mut self, data: NodeData) -> Result<NodeId, LibraryError> {
        self.execute(Box::new(AddNodeCommand::new(data)))?;
        self.graph
            .node_ids()
            .last()
            .copied()
            .ok_or_else(|| LibraryError::command("node was not added"))
    }

    pub fn remove_node(&mut self, id: NodeId) -> Result<(), LibraryError> {
        self.execute(Box::new(RemoveNodeCommand::new(id)))
    }

    pub fn move_node(&mut self, id: NodeId, position: Vec2) -> Result<(), LibraryError> {
        self.execute(Box::new(MoveNodeCommand::new(id, position)))
    }

    pub fn add_modifier(&mut self, id: NodeId, data: ModifierData) -> Result<(), LibraryError> {
        self.execute(Box::new(AddModifierCommand::new(id, data)))
    }

    pub fn remove_modifier(&mut self, id: NodeId, target: &Path) -> Result<(), LibraryError> {
        self.execute(Box::new(RemoveModifierCommand::new(id, target.clone())))
    }

    pub fn add_array_entries(
        &mut self,
        id: NodeId,
        array: &Path,
        index: usize,
        count: usize,
    ) -> Result<(), LibraryError> {
        self.execute(Box::new(AddArrayEntriesCommand::new(
            id,
            array.clone(),
            index,
            count,
        )))
    }

    pub fn remove_array_entries(
        &mut self,
        id: NodeId,
        array: &Path,
        index: usize,
        count: usize,
    ) -> Result<(), LibraryError> {
        self.execute(Box::new(RemoveArrayEntriesCommand::new(
            id,
            array.clone(),
            index,
            count,
        )))
    }

    pub fn set_expanded(
        &mut self,
        id: NodeId,
        path: &Path,
        expanded: bool,
    ) -> Result<(), LibraryError> {
        self.execute(Box::new(SetExpandedCommand::new(id, path.clone(), expanded)))
    }

    pub fn begin_gesture(&mut self, name: &str) {
        self.history.begin_gesture(name);
    }

    pub fn end_gesture(&mut self) {
        self.history.end_gesture();
    }

    pub fn undo(&mut self) -> Result<bool, LibraryError> {
        self.history.undo(&mut self.graph)
    }

    pub fn redo(&mut self) -> Result<bool, LibraryError> {
        self.history.redo(&mut self.graph)
    }

    pub fn mark_saved(&mut self) {
        self.history.mark_saved();
    }

    pub fn is_at_cursor(&self) -> bool {
        self.history.is_at_cursor()
    }

    // --- Evaluation and files ---

    pub fn process(&mut self) -> ProcessReport {
        self.graph.process()
    }

    pub fn try_to_reload_source(&mut self, id: NodeId) -> Result<(), LibraryError> {
        measure(format!("Reload source {}", id), Level::Info, || {
            self.graph.reload_source(id)
        })
    }

    pub fn try_to_save_target(&mut self, id: NodeId) -> Result<(), LibraryError> {
        self.graph.save_target(id)
    }

    /// Saves every target, returning the ones that failed.
    pub fn save_all_targets(&mut self) -> Vec<(NodeId, LibraryError)> {
        let targets: Vec<NodeId> = self
            .graph
            .nodes()
            .filter(|node| node.kind() == NodeKind::Target)
            .map(Node::id)
            .collect();
        targets
            .into_iter()
            .filter_map(|id| self.graph.save_target(id).err().map(|e| (id, e)))
            .collect()
    }

    // --- Persistence ---

    pub fn extract_project_data(&self) -> ProjectData {
        self.graph.extract_project_data()
    }

    /// Replaces the whole graph. History starts over.
    pub fn set_project_data(&mut self, data: &ProjectData) -> Result<(), LibraryError> {
        let graph = Graph::from_project_data(Arc::clone(&self.plugin_manager), data)?;
        self.graph = graph;
        self.history.clear();
        Ok(())
    }

    pub fn export_bundle(&self) -> GraphBundle {
        self.graph.export_bundle()
    }

    /// Loads a bundle written by any process. Returns version warnings.
    pub fn import_bundle(&mut self, bundle: &GraphBundle) -> Result<Vec<String>, LibraryError> {
        let (project, warnings) = remap_bundle(bundle, &self.plugin_manager)?;
        self.set_project_data(&project)?;
        Ok(warnings)
    }

    pub fn to_transfer_bytes(&self) -> Result<Vec<u8>, LibraryError> {
        self.export_bundle().to_bytes()
    }

    pub fn from_transfer_bytes(&mut self, bytes: &[u8]) -> Result<Vec<String>, LibraryError> {
        let bundle = GraphBundle::from_bytes(bytes)?;
        self.import_bundle(&bundle)
    }

    pub fn save_bundle_file(&mut self, path: &FsPath) -> Result<(), LibraryError> {
        let json = self.export_bundle().to_json()?;
        fs::write(path, json)?;
        self.mark_saved();
        info!("Project saved to {}", path.display());
        Ok(())
    }

    pub fn load_bundle_file(&mut self, path: &FsPath) -> Result<Vec<String>, LibraryError> {
        let _timer = ScopedTimer::info(format!("Load project {}", path.display()));
        let json = fs::read_to_string(path)?;
        let bundle = GraphBundle::from_json(&json)?;
        self.import_bundle(&bundle)
    }
}
