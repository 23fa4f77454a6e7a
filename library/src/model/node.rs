//! Graph nodes: sources that load, targets that save, processors that transform.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;

use log::{debug, info, warn};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::LibraryError;
use crate::model::identifier::Identifier;
use crate::model::modifier::{ConnectionSource, Modifier, ModifierData, ModifierOutcome};
use crate::model::path::{Path, Reindex};
use crate::model::project::NodeData;
use crate::model::value::{Array, ChangeFlags, ValueNode};
use crate::plugin::PluginManager;
use crate::plugin::traits::{FileFormat, FormatContext, Processor};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct NodeId(Uuid);

impl NodeId {
    pub fn new() -> Self {
        NodeId(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        NodeId(uuid)
    }

    pub fn uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Source,
    Target,
    Processor,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeKind::Source => "source",
            NodeKind::Target => "target",
            NodeKind::Processor => "processor",
        };
        write!(f, "{}", s)
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Vec2 {
    pub x: OrderedFloat<f64>,
    pub y: OrderedFloat<f64>,
}

impl Vec2 {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x: OrderedFloat(x),
            y: OrderedFloat(y),
        }
    }
}

/// Opaque layout data kept for whatever front end draws the graph.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Presentation {
    pub position: Vec2,
    pub size: Vec2,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FailureKind {
    Registry,
    Io,
    Parse,
    DependencyLoop,
    Processing,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeFailure {
    pub kind: FailureKind,
    pub reason: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EvalState {
    #[default]
    Unvisited,
    Sorted,
    InDependencyLoop,
}

enum Behavior {
    Format(Arc<dyn FileFormat>),
    Processor(Box<dyn Processor>),
    Unresolved,
}

impl fmt::Debug for Behavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Behavior::Format(format) => write!(f, "Format({})", format.name()),
            Behavior::Processor(_) => write!(f, "Processor"),
            Behavior::Unresolved => write!(f, "Unresolved"),
        }
    }
}

#[derive(Debug)]
pub struct Node {
    id: NodeId,
    kind: NodeKind,
    factory: Identifier,
    location: Option<PathBuf>,
    pub presentation: Presentation,
    expanded: BTreeSet<Path>,
    modifiers: BTreeMap<Path, Modifier>,
    /// The unmodified tree: loaded contents, or the declared prototype.
    base: ValueNode,
    input: ValueNode,
    output: Option<ValueNode>,
    behavior: Behavior,
    failure: Option<NodeFailure>,
    pub(crate) eval_state: EvalState,
    saved_hash: Option<u64>,
    input_hash: Option<u64>,
    needs_recompute: bool,
}

impl Node {
    /// Creates a node through the registry. Failures are recorded on the
    /// node rather than returned.
    pub fn new(
        id: NodeId,
        kind: NodeKind,
        factory: Identifier,
        location: Option<PathBuf>,
        plugins: &PluginManager,
    ) -> Self {
        let mut node = Self::resolve(id, kind, factory, location, plugins);
        node.settle();
        node
    }

    pub fn from_data(data: &NodeData, plugins: &PluginManager) -> Self {
        let mut node = Self::resolve(
            data.id,
            data.kind,
            data.factory,
            data.location.clone(),
            plugins,
        );
        node.presentation = Presentation {
            position: data.position,
            size: data.size,
        };
        node.expanded = data.expanded.iter().cloned().collect();
        for modifier in &data.modifiers {
            let previous = node
                .modifiers
                .insert(modifier.target().clone(), Modifier::new(modifier.clone()));
            if previous.is_some() {
                warn!(
                    "Node {}: more than one modifier at '{}'; keeping the last",
                    data.id,
                    modifier.target()
                );
            }
        }
        node.settle();
        node
    }

    fn resolve(
        id: NodeId,
        kind: NodeKind,
        factory: Identifier,
        location: Option<PathBuf>,
        plugins: &PluginManager,
    ) -> Self {
        let mut node = Self {
            id,
            kind,
            factory,
            location,
            presentation: Presentation::default(),
            expanded: BTreeSet::new(),
            modifiers: BTreeMap::new(),
            base: ValueNode::empty_record(),
            input: ValueNode::empty_record(),
            output: None,
            behavior: Behavior::Unresolved,
            failure: None,
            eval_state: EvalState::Unvisited,
            saved_hash: None,
            input_hash: None,
            needs_recompute: true,
        };
        let resolved = match kind {
            NodeKind::Source | NodeKind::Target => plugins.lookup_format(factory).map(|format| {
                node.base = format.prototype();
                Behavior::Format(format)
            }),
            NodeKind::Processor => plugins.lookup_processor(factory).map(|factory| {
                let processor = factory.create();
                node.base = processor.input_prototype();
                node.output = Some(processor.output_prototype());
                Behavior::Processor(processor)
            }),
        };
        match resolved {
            Ok(behavior) => node.behavior = behavior,
            Err(e) => {
                warn!("Node {}: cannot create {}: {}", id, kind, e);
                node.fail(FailureKind::Registry, e.to_string());
            }
        }
        node
    }

    /// Brings the input tree in line with the base and the attached modifiers.
    fn settle(&mut self) {
        if self.kind == NodeKind::Source && !matches!(self.behavior, Behavior::Unresolved) {
            // The failure is kept on the node.
            let _ = self.reload();
        } else {
            self.rebuild_input();
        }
    }

    // --- Accessors ---

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn factory(&self) -> Identifier {
        self.factory
    }

    pub fn location(&self) -> Option<&std::path::Path> {
        self.location.as_deref()
    }

    pub fn base(&self) -> &ValueNode {
        &self.base
    }

    pub fn input(&self) -> &ValueNode {
        &self.input
    }

    /// What connections read from this node. `None` for targets and failed nodes.
    pub fn output(&self) -> Option<&ValueNode> {
        if self.failure.is_some() {
            return None;
        }
        match self.kind {
            NodeKind::Source => Some(&self.input),
            NodeKind::Processor => self.output.as_ref(),
            NodeKind::Target => None,
        }
    }

    pub fn failure(&self) -> Option<&NodeFailure> {
        self.failure.as_ref()
    }

    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }

    pub fn eval_state(&self) -> EvalState {
        self.eval_state
    }

    pub fn modifiers(&self) -> impl Iterator<Item = &Modifier> {
        self.modifiers.values()
    }

    pub fn modifier(&self, target: &Path) -> Option<&Modifier> {
        self.modifiers.get(target)
    }

    pub fn connections(&self) -> impl Iterator<Item = &Modifier> {
        self.modifiers.values().filter(|m| m.data().is_connection())
    }

    pub fn expanded(&self) -> &BTreeSet<Path> {
        &self.expanded
    }

    /// Returns whether the path was expanded before.
    pub fn set_expanded(&mut self, path: Path, expanded: bool) -> bool {
        if expanded {
            !self.expanded.insert(path)
        } else {
            self.expanded.remove(&path)
        }
    }

    /// A target whose input differs from what it last wrote.
    pub fn is_dirty(&self) -> bool {
        self.kind == NodeKind::Target && self.saved_hash != Some(self.input.get_hash())
    }

    pub fn to_data(&self) -> NodeData {
        NodeData {
            id: self.id,
            kind: self.kind,
            factory: self.factory,
            location: self.location.clone(),
            position: self.presentation.position,
            size: self.presentation.size,
            modifiers: self.modifiers.values().map(|m| m.data().clone()).collect(),
            expanded: self.expanded.iter().cloned().collect(),
        }
    }

    // --- Failure bookkeeping ---

    fn fail(&mut self, kind: FailureKind, reason: String) {
        self.failure = Some(NodeFailure { kind, reason });
    }

    fn clear_failure(&mut self, kinds: &[FailureKind]) {
        if self.failure.as_ref().is_some_and(|f| kinds.contains(&f.kind)) {
            self.failure = None;
        }
    }

    pub(crate) fn begin_pass(&mut self) {
        self.eval_state = EvalState::Unvisited;
        self.clear_failure(&[FailureKind::DependencyLoop]);
    }

    pub(crate) fn mark_in_loop(&mut self) {
        self.eval_state = EvalState::InDependencyLoop;
        if self.failure.is_none() {
            self.fail(
                FailureKind::DependencyLoop,
                "node is part of a dependency loop".to_string(),
            );
        }
    }

    pub(crate) fn clear_changes(&mut self) {
        self.input.clear_changes();
        if let Some(output) = &mut self.output {
            output.clear_changes();
        }
    }

    // --- Files ---

    /// Re-reads a source's file. On failure the format's prototype stands in
    /// for the contents and the node is marked failed.
    pub fn reload(&mut self) -> Result<(), LibraryError> {
        let format = match (&self.kind, &self.behavior) {
            (NodeKind::Source, Behavior::Format(format)) => Arc::clone(format),
            (NodeKind::Source, _) => {
                return Err(LibraryError::RegistryLookup(self.factory.to_string()));
            }
            _ => {
                return Err(LibraryError::InvalidArgument(format!(
                    "node {} is a {}, not a source",
                    self.id, self.kind
                )));
            }
        };
        let result = self.read(format.as_ref());
        let outcome = match result {
            Ok(tree) => {
                info!("Node {}: loaded {}", self.id, self.location_display());
                self.base = tree;
                self.clear_failure(&[FailureKind::Io, FailureKind::Parse]);
                Ok(())
            }
            Err(e) => {
                warn!("Node {}: failed to load {}: {}", self.id, self.location_display(), e);
                let kind = match e {
                    LibraryError::Io(_) | LibraryError::InvalidArgument(_) => FailureKind::Io,
                    _ => FailureKind::Parse,
                };
                self.base = format.prototype();
                self.fail(kind, e.to_string());
                Err(e)
            }
        };
        self.rebuild_input();
        outcome
    }

    fn read(&self, format: &dyn FileFormat) -> Result<ValueNode, LibraryError> {
        let location = self.require_location()?;
        let file = File::open(location)?;
        let mut reader = BufReader::new(file);
        let context = FormatContext { location };
        let mut tree = format.load(&mut reader, &context)?;
        tree.clear_changes();
        Ok(tree)
    }

    /// Writes a target's input tree to its location.
    pub fn save(&mut self) -> Result<(), LibraryError> {
        let format = match (&self.kind, &self.behavior) {
            (NodeKind::Target, Behavior::Format(format)) => Arc::clone(format),
            (NodeKind::Target, _) => {
                return Err(LibraryError::RegistryLookup(self.factory.to_string()));
            }
            _ => {
                return Err(LibraryError::InvalidArgument(format!(
                    "node {} is a {}, not a target",
                    self.id, self.kind
                )));
            }
        };
        match self.write(format.as_ref()) {
            Ok(()) => {
                info!("Node {}: saved {}", self.id, self.location_display());
                self.saved_hash = Some(self.input.get_hash());
                self.clear_failure(&[FailureKind::Io]);
                Ok(())
            }
            Err(e) => {
                warn!("Node {}: failed to save {}: {}", self.id, self.location_display(), e);
                self.fail(FailureKind::Io, e.to_string());
                Err(e)
            }
        }
    }

    fn write(&self, format: &dyn FileFormat) -> Result<(), LibraryError> {
        let location = self.require_location()?;
        let file = File::create(location)?;
        let mut writer = BufWriter::new(file);
        let context = FormatContext { location };
        format.save(&self.input, &mut writer, &context)?;
        writer.flush()?;
        Ok(())
    }

    fn require_location(&self) -> Result<&std::path::Path, LibraryError> {
        self.location.as_deref().ok_or_else(|| {
            LibraryError::InvalidArgument(format!("node {} has no file location", self.id))
        })
    }

    fn location_display(&self) -> String {
        self.location
            .as_ref()
            .map_or_else(|| "<no location>".to_string(), |l| l.display().to_string())
    }

    // --- Evaluation ---

    /// Local recompute for one pass. Returns whether the processor ran.
    pub(crate) fn recompute(&mut self) -> bool {
        match self.kind {
            NodeKind::Source => false,
            NodeKind::Target => {
                self.input_hash = Some(self.input.get_hash());
                false
            }
            NodeKind::Processor => self.run_processor(),
        }
    }

    fn run_processor(&mut self) -> bool {
        let Behavior::Processor(processor) = &mut self.behavior else {
            return false;
        };
        let retry = self
            .failure
            .as_ref()
            .is_some_and(|f| f.kind == FailureKind::Processing);
        if !(self.needs_recompute
            || retry
            || self.output.is_none()
            || self.input.is_changed(ChangeFlags::ALL))
        {
            return false;
        }
        match processor.process(&self.input) {
            Ok(result) => {
                let reused = match self.output.as_mut() {
                    Some(output) => output.assign_from(&result).is_ok(),
                    None => false,
                };
                if !reused {
                    let mut result = result;
                    result.mark_all_changed(ChangeFlags::ALL);
                    self.output = Some(result);
                }
                self.needs_recompute = false;
                self.clear_failure(&[FailureKind::Processing]);
                debug!("Node {}: processed", self.id);
            }
            Err(e) => {
                warn!("Node {}: processing failed: {}", self.id, e);
                self.needs_recompute = true;
                self.fail(FailureKind::Processing, e.to_string());
            }
        }
        true
    }

    // --- Modifiers ---

    /// Rebuilds the input from the base, re-applying every local modifier.
    /// Connections are left to be forced on the next pass.
    fn rebuild_input(&mut self) {
        let mut input = self.base.clone();
        input.mark_all_changed(ChangeFlags::ALL);
        self.input = input;
        let keys: Vec<Path> = self.modifiers.keys().cloned().collect();
        self.reapply(keys);
    }

    /// Structural modifiers first, shallowest first, so that the paths the
    /// others address exist by the time they run.
    fn reapply(&mut self, mut keys: Vec<Path>) {
        keys.sort_by_key(|key| {
            let structural = self
                .modifiers
                .get(key)
                .is_some_and(|m| m.data().is_structural());
            (!structural, if structural { key.len() } else { 0 })
        });
        for key in keys {
            if let Some(modifier) = self.modifiers.get_mut(&key) {
                if modifier.data().is_connection() {
                    modifier.mark_not_applied();
                } else {
                    modifier.apply_local(&mut self.input);
                }
            }
        }
    }

    /// Attaches a modifier, replacing and reverting whatever was at its target.
    pub fn add_modifier(&mut self, data: ModifierData) -> Option<ModifierData> {
        let target = data.target().clone();
        let replaced = self.detach_modifier(&target).map(|m| m.data().clone());
        let mut modifier = Modifier::new(data);
        modifier.apply_local(&mut self.input);
        debug!("Node {}: attached '{}'", self.id, modifier.data());
        self.modifiers.insert(target, modifier);
        replaced
    }

    pub fn remove_modifier(&mut self, target: &Path) -> Result<ModifierData, LibraryError> {
        self.detach_modifier(target)
            .map(|m| m.data().clone())
            .ok_or_else(|| {
                LibraryError::InvalidArgument(format!(
                    "node {} has no modifier at '{}'",
                    self.id, target
                ))
            })
    }

    fn detach_modifier(&mut self, target: &Path) -> Option<Modifier> {
        let mut modifier = self.modifiers.remove(target)?;
        modifier.revert(&mut self.input, &self.base);
        modifier.flags.removed = true;
        let affected: Vec<Path> = self
            .modifiers
            .iter()
            .filter(|(key, m)| key.starts_with(target) || (m.data().is_connection() && target.starts_with(key)))
            .map(|(key, _)| key.clone())
            .collect();
        self.reapply(affected);
        Some(modifier)
    }

    /// Applies a connection. When it rewrites its subtree, the modifiers
    /// nested under it are applied again on top.
    pub(crate) fn apply_connection(&mut self, target: &Path, source: ConnectionSource) {
        let Some(modifier) = self.modifiers.get_mut(target) else {
            return;
        };
        let rewrites = match &source {
            ConnectionSource::Value(_) => true,
            ConnectionSource::Missing(_) => modifier.outcome() != ModifierOutcome::SourceMissing,
            ConnectionSource::Unchanged => false,
        };
        modifier.apply_connection(source, &mut self.input);
        if !rewrites || modifier.outcome() == ModifierOutcome::TargetMissing {
            return;
        }
        let nested: Vec<Path> = self
            .modifiers
            .keys()
            .filter(|key| *key != target && key.starts_with(target))
            .cloned()
            .collect();
        self.reapply(nested);
    }

    /// Gives local modifiers whose target did not resolve another chance.
    pub(crate) fn retry_missing_targets(&mut self) {
        let missing: Vec<Path> = self
            .modifiers
            .iter()
            .filter(|(_, m)| {
                !m.data().is_connection() && m.outcome() == ModifierOutcome::TargetMissing
            })
            .map(|(key, _)| key.clone())
            .collect();
        if !missing.is_empty() {
            debug!("Node {}: retrying {} modifier(s)", self.id, missing.len());
            self.reapply(missing);
        }
    }

    pub(crate) fn input_array_mut(&mut self, path: &Path) -> Result<&mut Array, LibraryError> {
        let node = self.input.follow_mut(path)?;
        let kind = node.kind_name();
        node.as_array_mut().ok_or_else(|| {
            LibraryError::InvalidArgument(format!("'{}' is a {}, not an array", path, kind))
        })
    }

    /// Records a new length for the array at `path` without touching the tree.
    pub(crate) fn set_array_size(&mut self, path: &Path, size: usize) -> Result<(), LibraryError> {
        let data = ModifierData::ArraySize {
            target: path.clone(),
            size,
        };
        match self.modifiers.get_mut(path) {
            Some(existing) if matches!(existing.data(), ModifierData::ArraySize { .. }) => {
                existing.set_data(data);
            }
            Some(existing) => {
                return Err(LibraryError::InvalidArgument(format!(
                    "'{}' is driven by a {} modifier",
                    path,
                    existing.data().kind_name()
                )));
            }
            None => {
                self.modifiers.insert(path.clone(), Modifier::applied(data));
            }
        }
        Ok(())
    }

    /// Puts back the array-size modifier as it was, without touching the tree.
    pub(crate) fn restore_array_size(&mut self, path: &Path, previous: Option<ModifierData>) {
        match previous {
            Some(data) => {
                self.modifiers.insert(path.clone(), Modifier::applied(data));
            }
            None => {
                self.modifiers.remove(path);
            }
        }
    }

    /// Re-attaches a modifier captured by an array removal.
    pub(crate) fn restore_modifier(&mut self, data: ModifierData) {
        let target = data.target().clone();
        let mut modifier = Modifier::new(data);
        modifier.apply_local(&mut self.input);
        self.modifiers.insert(target, modifier);
    }

    /// Moves modifier targets across a resize of the array at `array`.
    /// Returns the modifiers whose targets were removed.
    pub(crate) fn shift_targets(
        &mut self,
        array: &Path,
        pivot: usize,
        delta: isize,
    ) -> Vec<ModifierData> {
        let affected: Vec<(Path, Reindex)> = self
            .modifiers
            .keys()
            .filter_map(|key| match key.reindexed(array, pivot, delta) {
                Reindex::Unaffected => None,
                reindex => Some((key.clone(), reindex)),
            })
            .collect();
        let detached: Vec<(Reindex, Modifier)> = affected
            .into_iter()
            .filter_map(|(key, reindex)| self.modifiers.remove(&key).map(|m| (reindex, m)))
            .collect();

        let mut removed = Vec::new();
        for (reindex, mut modifier) in detached {
            match reindex {
                Reindex::Moved(target) => {
                    modifier.set_data(modifier.data().with_target(target.clone()));
                    modifier.flags.moved = true;
                    self.modifiers.insert(target, modifier);
                }
                Reindex::Removed => {
                    modifier.flags.removed = true;
                    removed.push(modifier.data().clone());
                }
                Reindex::Unaffected => {}
            }
        }
        removed
    }

    /// Moves the source paths of connections reading from `source`.
    /// Connections whose source was removed are detached and returned.
    pub(crate) fn shift_sources(
        &mut self,
        source: NodeId,
        array: &Path,
        pivot: usize,
        delta: isize,
    ) -> Vec<ModifierData> {
        let mut orphaned = Vec::new();
        for modifier in self.modifiers.values_mut() {
            let Some((source_node, source_path)) = modifier.data().source() else {
                continue;
            };
            if source_node != source {
                continue;
            }
            match source_path.reindexed(array, pivot, delta) {
                Reindex::Moved(path) => {
                    modifier.set_data(modifier.data().with_source_path(path));
                    modifier.flags.moved = true;
                }
                Reindex::Removed => orphaned.push(modifier.target().clone()),
                Reindex::Unaffected => {}
            }
        }
        orphaned
            .iter()
            .filter_map(|target| self.detach_modifier(target))
            .map(|m| m.data().clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::{INTEGER_TEXT_FORMAT, SEQUENCE_PROCESSOR};
    use crate::model::identifier::IdentifierInterner;
    use uuid::Uuid;

    fn plugins() -> PluginManager {
        PluginManager::with_builtins(Arc::new(IdentifierInterner::new()))
    }

    fn p(s: &str) -> Path {
        s.parse().unwrap()
    }

    #[test]
    fn test_unknown_factory_marks_node_failed() {
        let plugins = plugins();
        let stray = plugins.identifiers().intern("missing", Uuid::new_v4());
        let node = Node::new(NodeId::new(), NodeKind::Processor, stray, None, &plugins);
        assert_eq!(node.failure().unwrap().kind, FailureKind::Registry);
        assert_eq!(node.input(), &ValueNode::empty_record());
        assert!(node.output().is_none());
    }

    #[test]
    fn test_source_without_file_uses_prototype() {
        let plugins = plugins();
        let format = plugins.format_id(INTEGER_TEXT_FORMAT).unwrap();
        let location = std::env::temp_dir().join(format!("treeflow-missing-{}", Uuid::new_v4()));
        let node = Node::new(NodeId::new(), NodeKind::Source, format, Some(location), &plugins);
        assert_eq!(node.failure().unwrap().kind, FailureKind::Io);
        assert_eq!(node.input().as_integer(), Some(0));
    }

    #[test]
    fn test_processor_recomputes_on_change_only() {
        let plugins = plugins();
        let factory = plugins.processor_id(SEQUENCE_PROCESSOR).unwrap();
        let mut node = Node::new(NodeId::new(), NodeKind::Processor, factory, None, &plugins);
        assert!(node.recompute());
        node.clear_changes();
        assert!(!node.recompute());

        node.add_modifier(ModifierData::constant(p("count"), 3));
        assert!(node.recompute());
        assert_eq!(node.output().unwrap().as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_replacing_a_modifier_reverts_the_old_one() {
        let plugins = plugins();
        let factory = plugins.processor_id(SEQUENCE_PROCESSOR).unwrap();
        let mut node = Node::new(NodeId::new(), NodeKind::Processor, factory, None, &plugins);
        assert!(node.add_modifier(ModifierData::constant(p("value"), 7)).is_none());
        let replaced = node.add_modifier(ModifierData::connection(p("value"), NodeId::new(), Path::root()));
        assert_eq!(replaced, Some(ModifierData::constant(p("value"), 7)));
        assert_eq!(node.input().follow(&p("value")).unwrap().as_integer(), Some(0));
        assert_eq!(
            node.modifier(&p("value")).unwrap().outcome(),
            ModifierOutcome::NotApplied
        );
        assert_eq!(node.modifiers().count(), 1);
    }

    #[test]
    fn test_shift_targets_moves_and_drops() {
        let plugins = plugins();
        let factory = plugins.processor_id(SEQUENCE_PROCESSOR).unwrap();
        let mut node = Node::new(NodeId::new(), NodeKind::Processor, factory, None, &plugins);
        for i in 0..3 {
            node.add_modifier(ModifierData::constant(p(&format!("items[{}]", i)), i as i64));
        }
        let removed = node.shift_targets(&p("items"), 1, -1);
        assert_eq!(removed, [ModifierData::constant(p("items[1]"), 1)]);
        let targets: Vec<String> = node.modifiers().map(|m| m.target().to_string()).collect();
        assert_eq!(targets, ["items[0]", "items[1]"]);
        assert!(node.modifier(&p("items[1]")).unwrap().flags.moved);
        assert!(!node.modifier(&p("items[0]")).unwrap().flags.moved);
    }
}
