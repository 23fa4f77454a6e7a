//! Linear undo/redo history with merging and a saved-state cursor.

use log::{debug, warn};

use super::Command;
use crate::error::LibraryError;
use crate::graph::Graph;

struct Entry {
    command: Box<dyn Command>,
    /// Commands executed after `command` and merged into its entry.
    merged: Vec<Box<dyn Command>>,
    name: Option<String>,
}

impl Entry {
    fn name(&self) -> &str {
        self.name.as_deref().unwrap_or_else(|| self.command.name())
    }

    fn latest(&self) -> &dyn Command {
        &**self.merged.last().unwrap_or(&self.command)
    }

    fn undo(&mut self, graph: &mut Graph) -> Result<(), LibraryError> {
        for command in self.merged.iter_mut().rev() {
            command.undo(graph)?;
        }
        self.command.undo(graph)
    }

    fn redo(&mut self, graph: &mut Graph) -> Result<(), LibraryError> {
        self.command.execute(graph)?;
        for command in self.merged.iter_mut() {
            command.execute(graph)?;
        }
        Ok(())
    }
}

struct Gesture {
    name: String,
    /// History entry the gesture's commands go into, once there is one.
    entry: Option<usize>,
}

pub struct CommandManager {
    history: Vec<Entry>,
    /// Number of applied entries; everything after it can be redone.
    position: usize,
    /// The position that matches the last persisted state, if still reachable.
    cursor: Option<usize>,
    limit: Option<usize>,
    gesture: Option<Gesture>,
}

impl Default for CommandManager {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandManager {
    pub fn new() -> Self {
        Self {
            history: Vec::new(),
            position: 0,
            cursor: Some(0),
            limit: None,
            gesture: None,
        }
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit: Some(limit.max(1)),
            ..Self::new()
        }
    }

    pub fn execute(
        &mut self,
        graph: &mut Graph,
        mut command: Box<dyn Command>,
    ) -> Result<(), LibraryError> {
        if let Err(e) = command.initialize(graph) {
            warn!("Command '{}' rejected: {}", command.name(), e);
            self.cursor = None;
            return Err(e);
        }
        let merge_into = self.merge_target(&*command);
        if let Err(e) = command.execute(graph) {
            warn!("Command '{}' failed: {}", command.name(), e);
            self.cursor = None;
            return Err(e);
        }

        match merge_into {
            Some(index) => {
                debug!(
                    "Command '{}' merged into '{}'",
                    command.name(),
                    self.history[index].name()
                );
                if self.cursor == Some(self.position) {
                    self.cursor = None;
                }
                self.history[index].merged.push(command);
            }
            None => {
                debug!("Command '{}' executed", command.name());
                if self.position < self.history.len() {
                    self.history.truncate(self.position);
                    if self.cursor.is_some_and(|c| c > self.position) {
                        self.cursor = None;
                    }
                }
                let name = self.gesture.as_ref().map(|g| g.name.clone());
                self.history.push(Entry {
                    command,
                    merged: Vec::new(),
                    name,
                });
                self.position = self.history.len();
                if let Some(gesture) = &mut self.gesture {
                    gesture.entry = Some(self.position - 1);
                }
                self.enforce_limit();
            }
        }
        Ok(())
    }

    /// The entry `command` merges into: the open gesture's entry, or the
    /// newest entry if its latest command subsumes `command`. Only the
    /// newest entry qualifies, and only without pending redo.
    fn merge_target(&self, command: &dyn Command) -> Option<usize> {
        if self.position == 0 || self.position != self.history.len() {
            return None;
        }
        let newest = self.position - 1;
        if let Some(gesture) = &self.gesture {
            return gesture.entry.filter(|entry| *entry == newest);
        }
        self.history[newest]
            .latest()
            .should_subsume(command)
            .then_some(newest)
    }

    fn enforce_limit(&mut self) {
        let Some(limit) = self.limit else {
            return;
        };
        while self.history.len() > limit {
            self.history.remove(0);
            self.position -= 1;
            self.cursor = self.cursor.and_then(|c| c.checked_sub(1));
            if let Some(gesture) = &mut self.gesture {
                gesture.entry = gesture.entry.and_then(|e| e.checked_sub(1));
            }
        }
    }

    /// Returns whether anything was undone.
    pub fn undo(&mut self, graph: &mut Graph) -> Result<bool, LibraryError> {
        if self.position == 0 {
            return Ok(false);
        }
        self.gesture = None;
        let entry = &mut self.history[self.position - 1];
        debug!("Undoing '{}'", entry.name());
        entry.undo(graph)?;
        self.position -= 1;
        Ok(true)
    }

    /// Returns whether anything was redone.
    pub fn redo(&mut self, graph: &mut Graph) -> Result<bool, LibraryError> {
        if self.position == self.history.len() {
            return Ok(false);
        }
        self.gesture = None;
        let entry = &mut self.history[self.position];
        debug!("Redoing '{}'", entry.name());
        entry.redo(graph)?;
        self.position += 1;
        Ok(true)
    }

    /// Merges every command executed until [`CommandManager::end_gesture`]
    /// into one history entry named `name`.
    pub fn begin_gesture(&mut self, name: impl Into<String>) {
        if let Some(open) = &self.gesture {
            warn!("Gesture '{}' was still open", open.name);
        }
        self.gesture = Some(Gesture {
            name: name.into(),
            entry: None,
        });
    }

    pub fn end_gesture(&mut self) {
        self.gesture = None;
    }

    pub fn in_gesture(&self) -> bool {
        self.gesture.is_some()
    }

    pub fn mark_saved(&mut self) {
        self.cursor = Some(self.position);
    }

    pub fn is_at_cursor(&self) -> bool {
        self.cursor == Some(self.position)
    }

    pub fn can_undo(&self) -> bool {
        self.position > 0
    }

    pub fn can_redo(&self) -> bool {
        self.position < self.history.len()
    }

    pub fn undo_name(&self) -> Option<&str> {
        self.position
            .checked_sub(1)
            .and_then(|i| self.history.get(i))
            .map(Entry::name)
    }

    pub fn redo_name(&self) -> Option<&str> {
        self.history.get(self.position).map(Entry::name)
    }

    /// Entry names, oldest first.
    pub fn history(&self) -> Vec<&str> {
        self.history.iter().map(Entry::name).collect()
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn clear(&mut self) {
        self.history.clear();
        self.position = 0;
        self.cursor = Some(0);
        self.gesture = None;
    }
}
