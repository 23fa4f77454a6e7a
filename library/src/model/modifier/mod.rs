//! Live modifiers: apply, revert, and remember how the last application went.

mod data;

pub use data::ModifierData;

use log::debug;

use crate::error::LibraryError;
use crate::model::path::{Path, PathStep};
use crate::model::value::ValueNode;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ModifierOutcome {
    NotApplied,
    Success,
    TargetMissing,
    SourceMissing,
    ApplicationFailed,
}

impl ModifierOutcome {
    pub fn is_failure(self) -> bool {
        matches!(
            self,
            ModifierOutcome::TargetMissing
                | ModifierOutcome::SourceMissing
                | ModifierOutcome::ApplicationFailed
        )
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ModifierFlags {
    /// Not applied successfully since it was attached.
    pub is_new: bool,
    /// Its paths were shifted by an array resize.
    pub moved: bool,
    /// Detached from its node, kept for undo.
    pub removed: bool,
}

/// What a connection reads from its source node on this pass.
#[derive(Debug)]
pub enum ConnectionSource {
    Missing(String),
    /// The source subtree has not changed since the last application.
    Unchanged,
    Value(ValueNode),
}

#[derive(Clone, Debug)]
pub struct Modifier {
    data: ModifierData,
    outcome: ModifierOutcome,
    reason: Option<String>,
    pub flags: ModifierFlags,
}

impl Modifier {
    pub fn new(data: ModifierData) -> Self {
        Self {
            data,
            outcome: ModifierOutcome::NotApplied,
            reason: None,
            flags: ModifierFlags {
                is_new: true,
                ..ModifierFlags::default()
            },
        }
    }

    /// A modifier whose effect is already present in the tree.
    pub(crate) fn applied(data: ModifierData) -> Self {
        Self {
            data,
            outcome: ModifierOutcome::Success,
            reason: None,
            flags: ModifierFlags::default(),
        }
    }

    pub fn data(&self) -> &ModifierData {
        &self.data
    }

    pub fn target(&self) -> &Path {
        self.data.target()
    }

    pub fn outcome(&self) -> ModifierOutcome {
        self.outcome
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    pub fn is_failed(&self) -> bool {
        self.outcome.is_failure()
    }

    /// New, never applied, or previously failing modifiers must be applied
    /// even when their source did not change.
    pub fn needs_forcing(&self) -> bool {
        self.flags.is_new || self.outcome != ModifierOutcome::Success
    }

    pub(crate) fn set_data(&mut self, data: ModifierData) {
        debug_assert_eq!(data.kind_name(), self.data.kind_name());
        self.data = data;
    }

    pub(crate) fn mark_not_applied(&mut self) {
        self.outcome = ModifierOutcome::NotApplied;
        self.reason = None;
    }

    fn finish(&mut self, outcome: ModifierOutcome, reason: Option<String>) {
        if let Some(reason) = &reason {
            debug!("Modifier '{}': {:?}: {}", self.data, outcome, reason);
        }
        self.outcome = outcome;
        self.reason = reason;
        if outcome == ModifierOutcome::Success {
            self.flags.is_new = false;
        }
    }

    /// Applies a local modifier to the owning node's input tree.
    ///
    /// Connections are applied by the graph through [`Modifier::apply_connection`].
    pub fn apply_local(&mut self, input: &mut ValueNode) {
        let target = self.data.target().clone();
        let result = match &self.data {
            ModifierData::Constant { value, .. } => match input.try_follow_mut(&target) {
                Some(node) => node.set_scalar(value).map(|_| ()),
                None => return self.target_missing(),
            },
            ModifierData::ArraySize { size, .. } => match input.try_follow_mut(&target) {
                Some(node) => match node.as_array_mut() {
                    Some(array) => {
                        array.resize(*size);
                        Ok(())
                    }
                    None => Err(LibraryError::model(format!(
                        "cannot resize a {}",
                        node.kind_name()
                    ))),
                },
                None => return self.target_missing(),
            },
            ModifierData::ActivateOptional { .. } => {
                let Some((parent, name)) = split_field(&target) else {
                    return self.finish(
                        ModifierOutcome::ApplicationFailed,
                        Some(format!("'{}' does not name a record field", target)),
                    );
                };
                match input.try_follow_mut(&parent) {
                    Some(node) => match node.as_record_mut() {
                        Some(record) => record.activate(name).map(|_| ()),
                        None => Err(LibraryError::model(format!(
                            "'{}' is not a record",
                            parent
                        ))),
                    },
                    None => return self.target_missing(),
                }
            }
            ModifierData::Connection { .. } => return,
        };
        self.conclude(result, input);
    }

    /// Applies a connection given what its source currently holds.
    pub fn apply_connection(&mut self, source: ConnectionSource, input: &mut ValueNode) {
        let target = self.data.target().clone();
        let Some(node) = input.try_follow_mut(&target) else {
            return self.target_missing();
        };
        match source {
            ConnectionSource::Missing(reason) => {
                if self.outcome != ModifierOutcome::SourceMissing {
                    node.set_to_default();
                }
                self.finish(ModifierOutcome::SourceMissing, Some(reason));
            }
            ConnectionSource::Unchanged => {
                debug_assert!(!self.needs_forcing(), "forced connection without a value");
            }
            ConnectionSource::Value(value) => {
                let result = node.assign_from(&value);
                self.conclude(result, input);
            }
        }
    }

    fn target_missing(&mut self) {
        let reason = format!("target '{}' does not resolve", self.data.target());
        self.finish(ModifierOutcome::TargetMissing, Some(reason));
    }

    fn conclude(&mut self, result: Result<(), LibraryError>, input: &mut ValueNode) {
        match result {
            Ok(()) => self.finish(ModifierOutcome::Success, None),
            Err(e) => {
                if let Some(node) = input.try_follow_mut(self.data.target()) {
                    node.set_to_default();
                }
                self.finish(ModifierOutcome::ApplicationFailed, Some(e.to_string()));
            }
        }
    }

    /// Undoes this modifier's effect, restoring the target from `base`
    /// where it resolves there and resetting it to default otherwise.
    pub fn revert(&mut self, input: &mut ValueNode, base: &ValueNode) {
        let target = self.data.target().clone();
        match &self.data {
            ModifierData::ActivateOptional { .. } => {
                if let Some((parent, name)) = split_field(&target) {
                    let keep_active = base.try_follow(&target);
                    if let Some(record) = input.try_follow_mut(&parent).and_then(|n| n.as_record_mut()) {
                        match keep_active {
                            Some(from_base) => {
                                if let Some(field) = record.field_mut(name) {
                                    restore(field, from_base);
                                }
                            }
                            None => {
                                // Only optional fields can carry this modifier successfully.
                                let _ = record.deactivate(name);
                            }
                        }
                    }
                }
            }
            ModifierData::ArraySize { .. } => {
                if let Some(array) = input.try_follow_mut(&target).and_then(|n| n.as_array_mut()) {
                    let len = base
                        .try_follow(&target)
                        .and_then(ValueNode::as_array)
                        .map_or(array.default_len(), |a| a.len());
                    array.resize(len);
                }
            }
            ModifierData::Constant { .. } | ModifierData::Connection { .. } => {
                if let Some(node) = input.try_follow_mut(&target) {
                    match base.try_follow(&target) {
                        Some(from_base) => restore(node, from_base),
                        None => node.set_to_default(),
                    }
                }
            }
        }
        self.mark_not_applied();
    }
}

fn restore(node: &mut ValueNode, from_base: &ValueNode) {
    if node.assign_from(from_base).is_err() {
        node.set_to_default();
    }
}

fn split_field(target: &Path) -> Option<(Path, &str)> {
    match target.last()? {
        PathStep::Field(name) => Some((target.parent()?, name.as_str())),
        PathStep::Index(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::node::NodeId;
    use crate::model::value::{ChangeFlags, Record, Scalar};

    fn p(s: &str) -> Path {
        s.parse().unwrap()
    }

    fn tree() -> ValueNode {
        Record::new()
            .with_field("count", ValueNode::integer(1))
            .with_field("items", ValueNode::array(ValueNode::integer(0), 1))
            .with_optional("label", ValueNode::leaf("none"))
            .into()
    }

    #[test]
    fn test_constant_apply_and_revert() {
        let base = tree();
        let mut input = base.clone();
        let mut modifier = Modifier::new(ModifierData::constant(p("count"), 5));
        assert!(modifier.needs_forcing());

        modifier.apply_local(&mut input);
        assert_eq!(modifier.outcome(), ModifierOutcome::Success);
        assert!(!modifier.flags.is_new);
        assert_eq!(input.follow(&p("count")).unwrap().as_integer(), Some(5));

        modifier.revert(&mut input, &base);
        assert_eq!(modifier.outcome(), ModifierOutcome::NotApplied);
        assert_eq!(input, base);
    }

    #[test]
    fn test_missing_target_is_reported() {
        let mut input = tree();
        let mut modifier = Modifier::new(ModifierData::constant(p("items[3]"), 1));
        modifier.apply_local(&mut input);
        assert_eq!(modifier.outcome(), ModifierOutcome::TargetMissing);
        assert!(modifier.reason().unwrap().contains("items[3]"));
        assert!(modifier.is_failed());
    }

    #[test]
    fn test_failed_application_resets_target() {
        let mut input = tree();
        input
            .follow_mut(&p("count"))
            .unwrap()
            .set_scalar(&Scalar::Integer(9))
            .unwrap();
        let mut modifier = Modifier::new(ModifierData::constant(p("count"), "nine"));
        modifier.apply_local(&mut input);
        assert_eq!(modifier.outcome(), ModifierOutcome::ApplicationFailed);
        assert_eq!(input.follow(&p("count")).unwrap().as_integer(), Some(1));
        assert!(modifier.flags.is_new);
    }

    #[test]
    fn test_structural_modifiers() {
        let base = tree();
        let mut input = base.clone();
        let mut size = Modifier::new(ModifierData::ArraySize {
            target: p("items"),
            size: 3,
        });
        let mut label = Modifier::new(ModifierData::ActivateOptional { target: p("label") });
        size.apply_local(&mut input);
        label.apply_local(&mut input);
        assert_eq!(input.follow(&p("items")).unwrap().as_array().unwrap().len(), 3);
        assert!(input.try_follow(&p("label")).is_some());

        size.revert(&mut input, &base);
        label.revert(&mut input, &base);
        assert_eq!(input, base);

        let mut bad = Modifier::new(ModifierData::ArraySize {
            target: p("count"),
            size: 2,
        });
        bad.apply_local(&mut input);
        assert_eq!(bad.outcome(), ModifierOutcome::ApplicationFailed);
    }

    #[test]
    fn test_connection_source_missing_resets_once() {
        let mut input = tree();
        let mut modifier = Modifier::new(ModifierData::connection(
            p("count"),
            NodeId::new(),
            Path::root(),
        ));
        modifier.apply_connection(ConnectionSource::Value(ValueNode::integer(4)), &mut input);
        assert_eq!(modifier.outcome(), ModifierOutcome::Success);
        assert_eq!(input.follow(&p("count")).unwrap().as_integer(), Some(4));

        input.clear_changes();
        modifier.apply_connection(ConnectionSource::Missing("gone".into()), &mut input);
        assert_eq!(modifier.outcome(), ModifierOutcome::SourceMissing);
        assert_eq!(input.follow(&p("count")).unwrap().as_integer(), Some(1));
        assert!(input.is_changed(ChangeFlags::VALUE));

        input.clear_changes();
        modifier.apply_connection(ConnectionSource::Missing("gone".into()), &mut input);
        assert!(!input.is_changed(ChangeFlags::ALL));
        assert_eq!(modifier.reason(), Some("gone"));
    }

    #[test]
    fn test_connection_kind_mismatch_fails() {
        let mut input = tree();
        let mut modifier = Modifier::new(ModifierData::connection(
            p("count"),
            NodeId::new(),
            Path::root(),
        ));
        modifier.apply_connection(
            ConnectionSource::Value(ValueNode::empty_record()),
            &mut input,
        );
        assert_eq!(modifier.outcome(), ModifierOutcome::ApplicationFailed);
        assert!(modifier.needs_forcing());
    }
}
