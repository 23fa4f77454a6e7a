//! The node graph: ownership of nodes, edits routed to them, and the
//! derived connection index used by evaluation.

pub mod connections;
pub mod evaluation;

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use log::{debug, warn};
use uuid::Uuid;

use crate::error::LibraryError;
use crate::model::identifier::Identifier;
use crate::model::modifier::ModifierData;
use crate::model::node::{Node, NodeId, NodeKind, Vec2};
use crate::model::path::Path;
use crate::model::project::{FactoryVersion, GraphBundle, NodeData, ProjectData};
use crate::model::value::ValueNode;
use crate::plugin::PluginManager;
use crate::util::timing::ScopedTimer;

pub use connections::{ConnectionIndex, ConnectionInfo, ConnectionRef};
pub use evaluation::ProcessReport;

struct RemovedNode {
    node: Node,
    position: usize,
}

/// What an array-entry removal took away, enough to put it back exactly.
#[derive(Clone, Debug, PartialEq)]
pub struct RemovedEntries {
    pub values: Vec<ValueNode>,
    /// Modifiers detached because they addressed a removed entry.
    pub modifiers: Vec<(NodeId, ModifierData)>,
    /// The array-size modifier before the removal.
    pub array_modifier: Option<ModifierData>,
}

pub struct Graph {
    project_id: Uuid,
    plugins: Arc<PluginManager>,
    nodes: HashMap<NodeId, Node>,
    /// Insertion order; evaluation breaks ties by it.
    order: Vec<NodeId>,
    removed: HashMap<NodeId, RemovedNode>,
    issued: HashSet<NodeId>,
    connections: ConnectionIndex,
}

impl Graph {
    pub fn new(plugins: Arc<PluginManager>) -> Self {
        Self {
            project_id: Uuid::new_v4(),
            plugins,
            nodes: HashMap::new(),
            order: Vec::new(),
            removed: HashMap::new(),
            issued: HashSet::new(),
            connections: ConnectionIndex::default(),
        }
    }

    pub fn from_project_data(
        plugins: Arc<PluginManager>,
        data: &ProjectData,
    ) -> Result<Self, LibraryError> {
        let mut graph = Self::new(plugins);
        graph.project_id = data.project_id;
        for node_data in &data.nodes {
            let node = graph.create_node(node_data);
            graph.add_node(node)?;
        }
        debug!(
            "Graph: loaded project {} with {} nodes",
            graph.project_id,
            graph.nodes.len()
        );
        Ok(graph)
    }

    pub fn project_id(&self) -> Uuid {
        self.project_id
    }

    pub fn plugins(&self) -> &Arc<PluginManager> {
        &self.plugins
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Whether `id` was ever handed to this graph.
    pub fn is_issued(&self, id: NodeId) -> bool {
        self.issued.contains(&id)
    }

    pub fn is_removed(&self, id: NodeId) -> bool {
        self.removed.contains_key(&id)
    }

    pub fn node(&self, id: NodeId) -> Result<&Node, LibraryError> {
        self.nodes.get(&id).ok_or(LibraryError::NodeNotFound(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, LibraryError> {
        self.nodes.get_mut(&id).ok_or(LibraryError::NodeNotFound(id))
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.order.iter().filter_map(|id| self.nodes.get(id))
    }

    pub fn node_ids(&self) -> &[NodeId] {
        &self.order
    }

    pub fn connections(&self) -> &ConnectionIndex {
        &self.connections
    }

    pub fn create_node(&self, data: &NodeData) -> Node {
        Node::from_data(data, &self.plugins)
    }

    // --- Nodes ---

    pub fn add_node(&mut self, node: Node) -> Result<NodeId, LibraryError> {
        let id = node.id();
        if self.issued.contains(&id) {
            return Err(LibraryError::InvalidArgument(format!(
                "node id {} is already in use",
                id
            )));
        }
        debug!("Graph: adding {} node {}", node.kind(), id);
        self.issued.insert(id);
        self.order.push(id);
        self.nodes.insert(id, node);
        self.connections.invalidate();
        Ok(id)
    }

    /// Nodes holding a connection that reads from `id`, excluding `id` itself.
    pub fn dependents_of(&self, id: NodeId) -> Vec<NodeId> {
        self.nodes()
            .filter(|node| {
                node.id() != id
                    && node
                        .connections()
                        .any(|m| m.data().source().is_some_and(|(source, _)| source == id))
            })
            .map(Node::id)
            .collect()
    }

    /// Moves a node into the removed set. Fails while anything reads from it.
    pub fn remove_node(&mut self, id: NodeId) -> Result<(), LibraryError> {
        if !self.nodes.contains_key(&id) {
            return Err(LibraryError::NodeNotFound(id));
        }
        let dependents = self.dependents_of(id);
        if !dependents.is_empty() {
            return Err(LibraryError::InvalidArgument(format!(
                "node {} still has {} dependent node(s)",
                id,
                dependents.len()
            )));
        }
        let position = self
            .order
            .iter()
            .position(|n| *n == id)
            .ok_or(LibraryError::NodeNotFound(id))?;
        self.order.remove(position);
        let node = self.nodes.remove(&id).ok_or(LibraryError::NodeNotFound(id))?;
        self.removed.insert(id, RemovedNode { node, position });
        self.connections.invalidate();
        debug!("Graph: removed node {}", id);
        Ok(())
    }

    /// Puts a removed node back where it was.
    pub fn restore_node(&mut self, id: NodeId) -> Result<(), LibraryError> {
        let RemovedNode { node, position } = self.removed.remove(&id).ok_or_else(|| {
            LibraryError::InvalidArgument(format!("node {} is not in the removed set", id))
        })?;
        let position = position.min(self.order.len());
        self.order.insert(position, id);
        self.nodes.insert(id, node);
        self.connections.invalidate();
        debug!("Graph: restored node {}", id);
        Ok(())
    }

    /// Returns the previous position.
    pub fn move_node(&mut self, id: NodeId, position: Vec2) -> Result<Vec2, LibraryError> {
        let node = self.node_mut(id)?;
        Ok(std::mem::replace(&mut node.presentation.position, position))
    }

    /// Returns whether the path was expanded before.
    pub fn set_expanded(
        &mut self,
        id: NodeId,
        path: Path,
        expanded: bool,
    ) -> Result<bool, LibraryError> {
        Ok(self.node_mut(id)?.set_expanded(path, expanded))
    }

    pub fn reload_source(&mut self, id: NodeId) -> Result<(), LibraryError> {
        self.node_mut(id)?.reload()
    }

    pub fn save_target(&mut self, id: NodeId) -> Result<(), LibraryError> {
        self.node_mut(id)?.save()
    }

    // --- Modifiers ---

    /// Attaches a modifier; returns the one it replaced.
    pub fn add_modifier(
        &mut self,
        id: NodeId,
        data: ModifierData,
    ) -> Result<Option<ModifierData>, LibraryError> {
        let is_connection = data.is_connection();
        let replaced = self.node_mut(id)?.add_modifier(data);
        if is_connection || replaced.as_ref().is_some_and(ModifierData::is_connection) {
            self.connections.invalidate();
        }
        Ok(replaced)
    }

    pub fn remove_modifier(
        &mut self,
        id: NodeId,
        target: &Path,
    ) -> Result<ModifierData, LibraryError> {
        let removed = self.node_mut(id)?.remove_modifier(target)?;
        if removed.is_connection() {
            self.connections.invalidate();
        }
        Ok(removed)
    }

    // --- Array entries ---

    fn array_modifier(node: &Node, array: &Path) -> Result<Option<ModifierData>, LibraryError> {
        match node.modifier(array).map(|m| m.data()) {
            None => Ok(None),
            Some(data @ ModifierData::ArraySize { .. }) => Ok(Some(data.clone())),
            Some(other) => Err(LibraryError::InvalidArgument(format!(
                "'{}' is driven by a {} modifier",
                array,
                other.kind_name()
            ))),
        }
    }

    /// Inserts `count` default entries before `index` in the input array at
    /// `array`, shifting every path that addresses later entries.
    /// Returns the array-size modifier as it was before.
    pub fn add_array_entries(
        &mut self,
        id: NodeId,
        array: &Path,
        index: usize,
        count: usize,
    ) -> Result<Option<ModifierData>, LibraryError> {
        if count == 0 {
            return Err(LibraryError::InvalidArgument(
                "cannot add zero entries".to_string(),
            ));
        }
        let node = self.node_mut(id)?;
        let previous = Self::array_modifier(node, array)?;
        let entries = node.input_array_mut(array)?;
        let len = entries.len();
        let new_len = len
            .checked_add(count)
            .filter(|n| isize::try_from(*n).is_ok())
            .ok_or_else(|| {
                LibraryError::InvalidArgument(format!(
                    "cannot add {} entries to an array of {}",
                    count, len
                ))
            })?;
        entries.insert_entries(index, count)?;
        node.set_array_size(array, new_len)?;
        self.shift(id, array, index, count as isize);
        Ok(previous)
    }

    /// Undoes [`Graph::add_array_entries`].
    pub fn revoke_array_entries(
        &mut self,
        id: NodeId,
        array: &Path,
        index: usize,
        count: usize,
        previous: Option<ModifierData>,
    ) -> Result<(), LibraryError> {
        self.remove_array_entries(id, array, index, count)?;
        self.node_mut(id)?.restore_array_size(array, previous);
        Ok(())
    }

    /// Removes `count` entries starting at `index`. Modifiers addressing the
    /// removed entries, and connections reading from them, are detached and
    /// returned along with the values.
    pub fn remove_array_entries(
        &mut self,
        id: NodeId,
        array: &Path,
        index: usize,
        count: usize,
    ) -> Result<RemovedEntries, LibraryError> {
        if count == 0 {
            return Err(LibraryError::InvalidArgument(
                "cannot remove zero entries".to_string(),
            ));
        }
        let node = self.node_mut(id)?;
        let array_modifier = Self::array_modifier(node, array)?;
        let entries = node.input_array_mut(array)?;
        let len = entries.len();
        let values = entries.remove_entries(index, count)?;
        node.set_array_size(array, len - count)?;
        let modifiers = self.shift(id, array, index, -(count as isize));
        Ok(RemovedEntries {
            values,
            modifiers,
            array_modifier,
        })
    }

    /// Undoes [`Graph::remove_array_entries`].
    pub fn restore_array_entries(
        &mut self,
        id: NodeId,
        array: &Path,
        index: usize,
        removed: RemovedEntries,
    ) -> Result<(), LibraryError> {
        let count = removed.values.len();
        let node = self.node_mut(id)?;
        node.input_array_mut(array)?.insert_nodes(index, removed.values)?;
        node.restore_array_size(array, removed.array_modifier);
        self.shift(id, array, index, count as isize);
        for (owner, data) in removed.modifiers {
            match self.nodes.get_mut(&owner) {
                Some(node) => node.restore_modifier(data),
                None => warn!("Graph: node {} vanished; dropping '{}'", owner, data),
            }
        }
        self.connections.invalidate();
        Ok(())
    }

    /// Scatter pass after a resize of the array at `array` in node `id`:
    /// entries at or after `pivot` moved by `delta`. Returns the modifiers
    /// detached because they addressed removed entries.
    fn shift(
        &mut self,
        id: NodeId,
        array: &Path,
        pivot: usize,
        delta: isize,
    ) -> Vec<(NodeId, ModifierData)> {
        let mut detached = Vec::new();
        let mut output_is_input = false;
        if let Some(node) = self.nodes.get_mut(&id) {
            output_is_input = node.kind() == NodeKind::Source;
            detached.extend(
                node.shift_targets(array, pivot, delta)
                    .into_iter()
                    .map(|data| (id, data)),
            );
        }
        // Only a source exposes its input; a processor's output is unaffected.
        if output_is_input {
            for owner in &self.order {
                if let Some(node) = self.nodes.get_mut(owner) {
                    detached.extend(
                        node.shift_sources(id, array, pivot, delta)
                            .into_iter()
                            .map(|data| (*owner, data)),
                    );
                }
            }
        }
        debug!(
            "Graph: shifted paths under {}:{} at {} by {} ({} detached)",
            id,
            array,
            pivot,
            delta,
            detached.len()
        );
        self.connections.invalidate();
        detached
    }

    // --- Persistence ---

    pub fn extract_project_data(&self) -> ProjectData {
        ProjectData {
            project_id: self.project_id,
            nodes: self.nodes().map(Node::to_data).collect(),
        }
    }

    pub fn export_bundle(&self) -> GraphBundle {
        let project = self.extract_project_data();
        let factories: BTreeSet<Identifier> = project.nodes.iter().map(|n| n.factory).collect();
        let identifiers = self
            .plugins
            .identifiers()
            .snapshot_of(factories.iter().copied());
        let factory_versions = factories
            .iter()
            .filter_map(|id| {
                self.plugins.version_of(*id).map(|version| FactoryVersion {
                    identifier: *id,
                    version,
                })
            })
            .collect();
        GraphBundle {
            project,
            identifiers,
            factory_versions,
        }
    }
}

/// Translates a bundle's discriminators into `plugins`' interning table.
/// Returns the remapped project and one warning per version mismatch.
pub fn remap_bundle(
    bundle: &GraphBundle,
    plugins: &PluginManager,
) -> Result<(ProjectData, Vec<String>), LibraryError> {
    let _timer = ScopedTimer::debug("Graph bundle remap");
    let interner = plugins.identifiers();
    let mut mapping: HashMap<Identifier, Identifier> = HashMap::new();
    let mut warnings = Vec::new();
    for snapshot in &bundle.identifiers {
        let local = interner.intern(&snapshot.key.name, snapshot.key.uuid);
        mapping.insert(snapshot.identifier, local);
        let recorded = bundle.version_of(snapshot.identifier);
        match (recorded, plugins.version_of(local)) {
            (_, None) => warnings.push(format!(
                "'{}' is not registered in this process",
                snapshot.key
            )),
            (Some(saved), Some(current)) if saved != current => warnings.push(format!(
                "'{}' was saved with version {} but version {} is registered",
                snapshot.key.name, saved, current
            )),
            _ => {}
        }
    }
    for warning in &warnings {
        warn!("Graph bundle: {}", warning);
    }

    let mut project = bundle.project.clone();
    for node in &mut project.nodes {
        node.factory = *mapping.get(&node.factory).ok_or_else(|| {
            LibraryError::Parse(format!(
                "bundle does not describe identifier {} used by node {}",
                node.factory, node.id
            ))
        })?;
    }
    Ok((project, warnings))
}
