//! Reversible edits and their history.

pub mod compound;
pub mod graph_commands;
pub mod manager;

use std::any::Any;
use std::fmt;
use std::time::SystemTime;

use crate::error::LibraryError;
use crate::graph::Graph;

pub use compound::CompoundCommand;
pub use graph_commands::{
    AddArrayEntriesCommand, AddModifierCommand, AddNodeCommand, MoveNodeCommand,
    RemoveArrayEntriesCommand, RemoveModifierCommand, RemoveNodeCommand, SetExpandedCommand,
};
pub use manager::CommandManager;

/// An executable and reversible edit of a graph.
///
/// `initialize` runs once, before the first `execute`, and may only read
/// the graph; whatever it captures is what `execute` and `undo` work from.
/// After an `undo`, calling `execute` again must redo the edit exactly.
pub trait Command: fmt::Debug {
    /// Human-readable name for history listings.
    fn name(&self) -> &str;

    fn timestamp(&self) -> SystemTime;

    fn initialize(&mut self, graph: &Graph) -> Result<(), LibraryError>;

    fn execute(&mut self, graph: &mut Graph) -> Result<(), LibraryError>;

    fn undo(&mut self, graph: &mut Graph) -> Result<(), LibraryError>;

    /// Whether `next`, arriving right after this command, should be merged
    /// into this command's history entry.
    fn should_subsume(&self, _next: &dyn Command) -> bool {
        false
    }

    fn as_any(&self) -> &dyn Any;
}
