use std::any::Any;
use std::time::SystemTime;

use log::{error, warn};

use super::Command;
use crate::error::LibraryError;
use crate::graph::Graph;

/// Runs a sequence of commands as one atomic edit.
///
/// Each child is initialized right before it executes, so it sees the
/// effects of its predecessors. If any child fails, the ones already
/// executed are undone in reverse and the compound fails as a whole.
#[derive(Debug)]
pub struct CompoundCommand {
    name: String,
    commands: Vec<Box<dyn Command>>,
    initialized: usize,
    executed: usize,
    timestamp: SystemTime,
}

impl CompoundCommand {
    pub fn new(name: impl Into<String>, commands: Vec<Box<dyn Command>>) -> Self {
        Self {
            name: name.into(),
            commands,
            initialized: 0,
            executed: 0,
            timestamp: SystemTime::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    fn roll_back(&mut self, graph: &mut Graph) {
        for command in self.commands[..self.executed].iter_mut().rev() {
            if let Err(e) = command.undo(graph) {
                error!(
                    "CompoundCommand '{}': rolling back '{}' failed: {}",
                    self.name,
                    command.name(),
                    e
                );
            }
        }
        self.executed = 0;
    }
}

impl Command for CompoundCommand {
    fn name(&self) -> &str {
        &self.name
    }

    fn timestamp(&self) -> SystemTime {
        self.timestamp
    }

    fn initialize(&mut self, _graph: &Graph) -> Result<(), LibraryError> {
        Ok(())
    }

    fn execute(&mut self, graph: &mut Graph) -> Result<(), LibraryError> {
        for index in 0..self.commands.len() {
            let command = &mut self.commands[index];
            let result = if index < self.initialized {
                command.execute(graph)
            } else {
                command
                    .initialize(graph)
                    .and_then(|()| command.execute(graph))
            };
            self.initialized = self.initialized.max(index + 1);
            if let Err(e) = result {
                warn!(
                    "CompoundCommand '{}': step {} ('{}') failed: {}",
                    self.name,
                    index,
                    command.name(),
                    e
                );
                self.roll_back(graph);
                return Err(LibraryError::command(format!(
                    "'{}' failed at step {}: {}",
                    self.name, index, e
                )));
            }
            self.executed = index + 1;
        }
        Ok(())
    }

    fn undo(&mut self, graph: &mut Graph) -> Result<(), LibraryError> {
        for command in self.commands[..self.executed].iter_mut().rev() {
            command.undo(graph)?;
        }
        self.executed = 0;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
