use std::any::Any;
use std::time::SystemTime;

use log::debug;

use super::Command;
use crate::error::LibraryError;
use crate::graph::{Graph, RemovedEntries};
use crate::model::modifier::ModifierData;
use crate::model::node::{NodeId, Vec2};
use crate::model::path::Path;
use crate::model::project::NodeData;

fn not_initialized(name: &str) -> LibraryError {
    LibraryError::command(format!("'{}' was not initialized", name))
}

fn array_len(graph: &Graph, node: NodeId, array: &Path) -> Result<usize, LibraryError> {
    graph
        .node(node)?
        .input()
        .follow(array)?
        .as_array()
        .map(|a| a.len())
        .ok_or_else(|| LibraryError::InvalidArgument(format!("'{}' is not an array", array)))
}

#[derive(Debug)]
pub struct AddNodeCommand {
    data: NodeData,
    timestamp: SystemTime,
}

impl AddNodeCommand {
    pub fn new(data: NodeData) -> Self {
        Self {
            data,
            timestamp: SystemTime::now(),
        }
    }

    /// The id the node gets; final once the command is initialized.
    pub fn node_id(&self) -> NodeId {
        self.data.id
    }
}

impl Command for AddNodeCommand {
    fn name(&self) -> &str {
        "Add Node"
    }

    fn timestamp(&self) -> SystemTime {
        self.timestamp
    }

    fn initialize(&mut self, graph: &Graph) -> Result<(), LibraryError> {
        while graph.is_issued(self.data.id) {
            let fresh = NodeId::new();
            debug!("AddNodeCommand: id {} is taken, using {}", self.data.id, fresh);
            self.data.id = fresh;
        }
        Ok(())
    }

    fn execute(&mut self, graph: &mut Graph) -> Result<(), LibraryError> {
        if graph.is_removed(self.data.id) {
            return graph.restore_node(self.data.id);
        }
        let node = graph.create_node(&self.data);
        graph.add_node(node).map(|_| ())
    }

    fn undo(&mut self, graph: &mut Graph) -> Result<(), LibraryError> {
        graph.remove_node(self.data.id)
    }

    /// Placing a node and then dragging it is one edit.
    fn should_subsume(&self, next: &dyn Command) -> bool {
        next.as_any()
            .downcast_ref::<MoveNodeCommand>()
            .is_some_and(|m| m.node == self.data.id)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug)]
pub struct RemoveNodeCommand {
    node: NodeId,
    timestamp: SystemTime,
}

impl RemoveNodeCommand {
    pub fn new(node: NodeId) -> Self {
        Self {
            node,
            timestamp: SystemTime::now(),
        }
    }
}

impl Command for RemoveNodeCommand {
    fn name(&self) -> &str {
        "Remove Node"
    }

    fn timestamp(&self) -> SystemTime {
        self.timestamp
    }

    fn initialize(&mut self, graph: &Graph) -> Result<(), LibraryError> {
        graph.node(self.node)?;
        let dependents = graph.dependents_of(self.node);
        if !dependents.is_empty() {
            return Err(LibraryError::command(format!(
                "node {} is read by {} other node(s)",
                self.node,
                dependents.len()
            )));
        }
        Ok(())
    }

    fn execute(&mut self, graph: &mut Graph) -> Result<(), LibraryError> {
        graph.remove_node(self.node)
    }

    fn undo(&mut self, graph: &mut Graph) -> Result<(), LibraryError> {
        graph.restore_node(self.node)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug)]
pub struct MoveNodeCommand {
    node: NodeId,
    position: Vec2,
    previous: Option<Vec2>,
    timestamp: SystemTime,
}

impl MoveNodeCommand {
    pub fn new(node: NodeId, position: Vec2) -> Self {
        Self {
            node,
            position,
            previous: None,
            timestamp: SystemTime::now(),
        }
    }
}

impl Command for MoveNodeCommand {
    fn name(&self) -> &str {
        "Move Node"
    }

    fn timestamp(&self) -> SystemTime {
        self.timestamp
    }

    fn initialize(&mut self, graph: &Graph) -> Result<(), LibraryError> {
        self.previous = Some(graph.node(self.node)?.presentation.position);
        Ok(())
    }

    fn execute(&mut self, graph: &mut Graph) -> Result<(), LibraryError> {
        graph.move_node(self.node, self.position).map(|_| ())
    }

    fn undo(&mut self, graph: &mut Graph) -> Result<(), LibraryError> {
        let previous = self.previous.ok_or_else(|| not_initialized(self.name()))?;
        graph.move_node(self.node, previous).map(|_| ())
    }

    fn should_subsume(&self, next: &dyn Command) -> bool {
        next.as_any()
            .downcast_ref::<MoveNodeCommand>()
            .is_some_and(|m| m.node == self.node)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug)]
pub struct AddModifierCommand {
    node: NodeId,
    data: ModifierData,
    replaced: Option<ModifierData>,
    timestamp: SystemTime,
}

impl AddModifierCommand {
    pub fn new(node: NodeId, data: ModifierData) -> Self {
        Self {
            node,
            data,
            replaced: None,
            timestamp: SystemTime::now(),
        }
    }
}

impl Command for AddModifierCommand {
    fn name(&self) -> &str {
        if self.data.is_connection() {
            "Connect"
        } else {
            "Set Value"
        }
    }

    fn timestamp(&self) -> SystemTime {
        self.timestamp
    }

    fn initialize(&mut self, graph: &Graph) -> Result<(), LibraryError> {
        let node = graph.node(self.node)?;
        self.replaced = node
            .modifier(self.data.target())
            .map(|m| m.data().clone());
        Ok(())
    }

    fn execute(&mut self, graph: &mut Graph) -> Result<(), LibraryError> {
        let replaced = graph.add_modifier(self.node, self.data.clone())?;
        debug_assert_eq!(replaced, self.replaced);
        Ok(())
    }

    fn undo(&mut self, graph: &mut Graph) -> Result<(), LibraryError> {
        graph.remove_modifier(self.node, self.data.target())?;
        if let Some(replaced) = &self.replaced {
            graph.add_modifier(self.node, replaced.clone())?;
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug)]
pub struct RemoveModifierCommand {
    node: NodeId,
    target: Path,
    removed: Option<ModifierData>,
    timestamp: SystemTime,
}

impl RemoveModifierCommand {
    pub fn new(node: NodeId, target: Path) -> Self {
        Self {
            node,
            target,
            removed: None,
            timestamp: SystemTime::now(),
        }
    }
}

impl Command for RemoveModifierCommand {
    fn name(&self) -> &str {
        "Remove Modifier"
    }

    fn timestamp(&self) -> SystemTime {
        self.timestamp
    }

    fn initialize(&mut self, graph: &Graph) -> Result<(), LibraryError> {
        let modifier = graph.node(self.node)?.modifier(&self.target).ok_or_else(|| {
            LibraryError::command(format!(
                "node {} has no modifier at '{}'",
                self.node, self.target
            ))
        })?;
        self.removed = Some(modifier.data().clone());
        Ok(())
    }

    fn execute(&mut self, graph: &mut Graph) -> Result<(), LibraryError> {
        graph.remove_modifier(self.node, &self.target).map(|_| ())
    }

    fn undo(&mut self, graph: &mut Graph) -> Result<(), LibraryError> {
        let removed = self
            .removed
            .clone()
            .ok_or_else(|| not_initialized(self.name()))?;
        graph.add_modifier(self.node, removed).map(|_| ())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug)]
pub struct AddArrayEntriesCommand {
    node: NodeId,
    array: Path,
    index: usize,
    count: usize,
    previous: Option<ModifierData>,
    timestamp: SystemTime,
}

impl AddArrayEntriesCommand {
    pub fn new(node: NodeId, array: Path, index: usize, count: usize) -> Self {
        Self {
            node,
            array,
            index,
            count,
            previous: None,
            timestamp: SystemTime::now(),
        }
    }
}

impl Command for AddArrayEntriesCommand {
    fn name(&self) -> &str {
        "Add Entries"
    }

    fn timestamp(&self) -> SystemTime {
        self.timestamp
    }

    fn initialize(&mut self, graph: &Graph) -> Result<(), LibraryError> {
        let len = array_len(graph, self.node, &self.array)?;
        if self.count == 0 || self.index > len || len.checked_add(self.count).is_none() {
            return Err(LibraryError::InvalidArgument(format!(
                "cannot add {} entries at {} to an array of {}",
                self.count, self.index, len
            )));
        }
        Ok(())
    }

    fn execute(&mut self, graph: &mut Graph) -> Result<(), LibraryError> {
        self.previous = graph.add_array_entries(self.node, &self.array, self.index, self.count)?;
        Ok(())
    }

    fn undo(&mut self, graph: &mut Graph) -> Result<(), LibraryError> {
        graph.revoke_array_entries(
            self.node,
            &self.array,
            self.index,
            self.count,
            self.previous.clone(),
        )
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug)]
pub struct RemoveArrayEntriesCommand {
    node: NodeId,
    array: Path,
    index: usize,
    count: usize,
    removed: Option<RemovedEntries>,
    timestamp: SystemTime,
}

impl RemoveArrayEntriesCommand {
    pub fn new(node: NodeId, array: Path, index: usize, count: usize) -> Self {
        Self {
            node,
            array,
            index,
            count,
            removed: None,
            timestamp: SystemTime::now(),
        }
    }
}

impl Command for RemoveArrayEntriesCommand {
    fn name(&self) -> &str {
        "Remove Entries"
    }

    fn timestamp(&self) -> SystemTime {
        self.timestamp
    }

    fn initialize(&mut self, graph: &Graph) -> Result<(), LibraryError> {
        let len = array_len(graph, self.node, &self.array)?;
        if self.count == 0 || self.index.checked_add(self.count).is_none_or(|end| end > len) {
            return Err(LibraryError::InvalidArgument(format!(
                "cannot remove {} entries at {} from an array of {}",
                self.count, self.index, len
            )));
        }
        Ok(())
    }

    fn execute(&mut self, graph: &mut Graph) -> Result<(), LibraryError> {
        let removed = graph.remove_array_entries(self.node, &self.array, self.index, self.count)?;
        self.removed = Some(removed);
        Ok(())
    }

    fn undo(&mut self, graph: &mut Graph) -> Result<(), LibraryError> {
        let removed = self.removed.take().ok_or_else(|| not_initialized(self.name()))?;
        graph.restore_array_entries(self.node, &self.array, self.index, removed)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug)]
pub struct SetExpandedCommand {
    node: NodeId,
    path: Path,
    expanded: bool,
    previous: bool,
    timestamp: SystemTime,
}

impl SetExpandedCommand {
    pub fn new(node: NodeId, path: Path, expanded: bool) -> Self {
        Self {
            node,
            path,
            expanded,
            previous: false,
            timestamp: SystemTime::now(),
        }
    }
}

impl Command for SetExpandedCommand {
    fn name(&self) -> &str {
        if self.expanded { "Expand" } else { "Collapse" }
    }

    fn timestamp(&self) -> SystemTime {
        self.timestamp
    }

    fn initialize(&mut self, graph: &Graph) -> Result<(), LibraryError> {
        self.previous = graph.node(self.node)?.expanded().contains(&self.path);
        Ok(())
    }

    fn execute(&mut self, graph: &mut Graph) -> Result<(), LibraryError> {
        graph
            .set_expanded(self.node, self.path.clone(), self.expanded)
            .map(|_| ())
    }

    fn undo(&mut self, graph: &mut Graph) -> Result<(), LibraryError> {
        graph
            .set_expanded(self.node, self.path.clone(), self.previous)
            .map(|_| ())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
