use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::ptr;

use serde::{Deserialize, Serialize};

use super::changes::ChangeFlags;
use super::scalar::{Scalar, ScalarKind};
use crate::error::LibraryError;
use crate::model::path::{Path, PathStep};

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Leaf {
    value: Scalar,
    default: Scalar,
    #[serde(skip)]
    changes: ChangeFlags,
}

impl Leaf {
    pub fn new(value: Scalar) -> Self {
        Self {
            default: value.clone(),
            value,
            changes: ChangeFlags::NONE,
        }
    }

    pub fn with_default(value: Scalar, default: Scalar) -> Self {
        Self {
            value,
            default,
            changes: ChangeFlags::NONE,
        }
    }

    pub fn value(&self) -> &Scalar {
        &self.value
    }

    pub fn default_value(&self) -> &Scalar {
        &self.default
    }

    pub fn kind(&self) -> ScalarKind {
        self.default.kind()
    }

    fn set(&mut self, value: &Scalar) -> Result<bool, LibraryError> {
        let value = value.coerce_to(self.kind())?;
        if value == self.value {
            return Ok(false);
        }
        self.value = value;
        self.changes |= ChangeFlags::VALUE;
        Ok(true)
    }
}

impl PartialEq for Leaf {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value && self.default == other.default
    }
}

impl Eq for Leaf {}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct RecordField {
    name: String,
    value: ValueNode,
    optional: bool,
    active: bool,
}

impl RecordField {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &ValueNode {
        &self.value
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
}

/// Named children in declaration order. Optional fields exist in the
/// declaration but are only addressable while active.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Record {
    fields: Vec<RecordField>,
    #[serde(skip)]
    changes: ChangeFlags,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(mut self, name: &str, value: ValueNode) -> Self {
        self.declare(name, value, false);
        self
    }

    pub fn with_optional(mut self, name: &str, value: ValueNode) -> Self {
        self.declare(name, value, true);
        self
    }

    fn declare(&mut self, name: &str, value: ValueNode, optional: bool) {
        debug_assert!(
            self.fields.iter().all(|f| f.name != name),
            "field '{}' declared twice",
            name
        );
        self.fields.push(RecordField {
            name: name.to_string(),
            value,
            optional,
            active: !optional,
        });
    }

    /// Active fields in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = &RecordField> {
        self.fields.iter().filter(|f| f.active)
    }

    /// Every declared field, including inactive optional ones.
    pub fn declared_fields(&self) -> &[RecordField] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&ValueNode> {
        self.fields
            .iter()
            .find(|f| f.active && f.name == name)
            .map(|f| &f.value)
    }

    pub fn field_mut(&mut self, name: &str) -> Option<&mut ValueNode> {
        self.fields
            .iter_mut()
            .find(|f| f.active && f.name == name)
            .map(|f| &mut f.value)
    }

    pub fn len(&self) -> usize {
        self.fields().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn declared_mut(&mut self, name: &str) -> Result<&mut RecordField, LibraryError> {
        self.fields
            .iter_mut()
            .find(|f| f.name == name)
            .ok_or_else(|| LibraryError::model(format!("record has no field '{}'", name)))
    }

    /// Makes an optional field addressable, starting from its default value.
    /// Returns whether the field was inactive before.
    pub fn activate(&mut self, name: &str) -> Result<bool, LibraryError> {
        let field = self.declared_mut(name)?;
        if !field.optional {
            return Err(LibraryError::model(format!(
                "field '{}' is not optional",
                name
            )));
        }
        if field.active {
            return Ok(false);
        }
        field.active = true;
        field.value.set_to_default();
        self.changes |= ChangeFlags::STRUCTURE;
        Ok(true)
    }

    pub fn deactivate(&mut self, name: &str) -> Result<bool, LibraryError> {
        let field = self.declared_mut(name)?;
        if !field.optional {
            return Err(LibraryError::model(format!(
                "field '{}' is not optional",
                name
            )));
        }
        if !field.active {
            return Ok(false);
        }
        field.active = false;
        self.changes |= ChangeFlags::STRUCTURE;
        Ok(true)
    }

    fn assign_from(&mut self, source: &Record) -> Result<(), LibraryError> {
        for field in self.fields.iter_mut() {
            match source.fields.iter().find(|f| f.active && f.name == field.name) {
                Some(src) => {
                    if !field.active {
                        field.active = true;
                        self.changes |= ChangeFlags::STRUCTURE;
                    }
                    field.value.assign_from(&src.value)?;
                }
                None if field.optional => {
                    if field.active {
                        field.active = false;
                        self.changes |= ChangeFlags::STRUCTURE;
                    }
                }
                None => {
                    return Err(LibraryError::model(format!(
                        "source record has no field '{}'",
                        field.name
                    )));
                }
            }
        }
        Ok(())
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.fields == other.fields
    }
}

impl Eq for Record {}

/// Homogeneous, resizable list. New entries are copies of the prototype.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Array {
    elements: Vec<ValueNode>,
    prototype: Box<ValueNode>,
    default_len: usize,
    #[serde(skip)]
    changes: ChangeFlags,
}

impl Array {
    pub fn new(prototype: ValueNode, default_len: usize) -> Self {
        let mut array = Self {
            elements: Vec::new(),
            prototype: Box::new(prototype),
            default_len,
            changes: ChangeFlags::NONE,
        };
        array.prototype.clear_changes();
        array.elements = (0..default_len).map(|_| array.fresh_element()).collect();
        array
    }

    /// An array holding `elements`, resetting to empty.
    pub fn from_elements(prototype: ValueNode, elements: Vec<ValueNode>) -> Self {
        let mut array = Self::new(prototype, 0);
        array.elements = elements;
        array
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn default_len(&self) -> usize {
        self.default_len
    }

    pub fn elements(&self) -> &[ValueNode] {
        &self.elements
    }

    pub fn get(&self, index: usize) -> Option<&ValueNode> {
        self.elements.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut ValueNode> {
        self.elements.get_mut(index)
    }

    pub fn prototype(&self) -> &ValueNode {
        &self.prototype
    }

    fn fresh_element(&self) -> ValueNode {
        let mut element = (*self.prototype).clone();
        element.set_to_default();
        element.clear_changes();
        element
    }

    pub fn resize(&mut self, len: usize) {
        if len == self.elements.len() {
            return;
        }
        if len < self.elements.len() {
            self.elements.truncate(len);
        } else {
            let extra = len - self.elements.len();
            for _ in 0..extra {
                let element = self.fresh_element();
                self.elements.push(element);
            }
        }
        self.changes |= ChangeFlags::STRUCTURE;
    }

    /// Inserts `count` default entries before `index`.
    pub fn insert_entries(&mut self, index: usize, count: usize) -> Result<(), LibraryError> {
        let entries = (0..count).map(|_| self.fresh_element()).collect();
        self.insert_nodes(index, entries)
    }

    pub fn insert_nodes(&mut self, index: usize, nodes: Vec<ValueNode>) -> Result<(), LibraryError> {
        if index > self.elements.len() {
            return Err(LibraryError::InvalidArgument(format!(
                "insert position {} is past the end of an array of {}",
                index,
                self.elements.len()
            )));
        }
        if nodes.is_empty() {
            return Ok(());
        }
        self.elements.splice(index..index, nodes);
        self.changes |= ChangeFlags::STRUCTURE;
        Ok(())
    }

    /// Removes `count` entries starting at `index`, returning them.
    pub fn remove_entries(
        &mut self,
        index: usize,
        count: usize,
    ) -> Result<Vec<ValueNode>, LibraryError> {
        let end = match index.checked_add(count) {
            Some(end) if end <= self.elements.len() => end,
            _ => {
                return Err(LibraryError::InvalidArgument(format!(
                    "cannot remove {} entries at {} from an array of {}",
                    count,
                    index,
                    self.elements.len()
                )));
            }
        };
        if count == 0 {
            return Ok(Vec::new());
        }
        self.changes |= ChangeFlags::STRUCTURE;
        Ok(self.elements.drain(index..end).collect())
    }

    fn assign_from(&mut self, source: &Array) -> Result<(), LibraryError> {
        self.resize(source.len());
        for (target, src) in self.elements.iter_mut().zip(&source.elements) {
            target.assign_from(src)?;
        }
        Ok(())
    }
}

impl PartialEq for Array {
    fn eq(&self, other: &Self) -> bool {
        self.elements == other.elements
            && self.prototype == other.prototype
            && self.default_len == other.default_len
    }
}

impl Eq for Array {}

/// A self-describing data tree.
///
/// Equality compares contents only; change bits are bookkeeping.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum ValueNode {
    Leaf(Leaf),
    Record(Record),
    Array(Array),
}

impl ValueNode {
    pub fn leaf(value: impl Into<Scalar>) -> Self {
        ValueNode::Leaf(Leaf::new(value.into()))
    }

    pub fn integer(value: i64) -> Self {
        ValueNode::leaf(value)
    }

    pub fn array(prototype: ValueNode, default_len: usize) -> Self {
        ValueNode::Array(Array::new(prototype, default_len))
    }

    pub fn empty_record() -> Self {
        ValueNode::Record(Record::new())
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            ValueNode::Leaf(_) => "leaf",
            ValueNode::Record(_) => "record",
            ValueNode::Array(_) => "array",
        }
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            ValueNode::Leaf(leaf) => Some(&leaf.value),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        self.as_scalar().and_then(Scalar::as_integer)
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            ValueNode::Record(record) => Some(record),
            _ => None,
        }
    }

    pub fn as_record_mut(&mut self) -> Option<&mut Record> {
        match self {
            ValueNode::Record(record) => Some(record),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Array> {
        match self {
            ValueNode::Array(array) => Some(array),
            _ => None,
        }
    }

    pub fn as_array_mut(&mut self) -> Option<&mut Array> {
        match self {
            ValueNode::Array(array) => Some(array),
            _ => None,
        }
    }

    // --- Change tracking ---

    /// Bits recorded on this node itself, not its descendants.
    pub fn own_changes(&self) -> ChangeFlags {
        match self {
            ValueNode::Leaf(leaf) => leaf.changes,
            ValueNode::Record(record) => record.changes,
            ValueNode::Array(array) => array.changes,
        }
    }

    pub fn mark_changed(&mut self, flags: ChangeFlags) {
        match self {
            ValueNode::Leaf(leaf) => leaf.changes |= flags,
            ValueNode::Record(record) => record.changes |= flags,
            ValueNode::Array(array) => array.changes |= flags,
        }
    }

    /// Marks this node and every descendant.
    pub fn mark_all_changed(&mut self, flags: ChangeFlags) {
        self.mark_changed(flags);
        match self {
            ValueNode::Leaf(_) => {}
            ValueNode::Record(record) => {
                for field in record.fields.iter_mut() {
                    field.value.mark_all_changed(flags);
                }
            }
            ValueNode::Array(array) => {
                for element in array.elements.iter_mut() {
                    element.mark_all_changed(flags);
                }
            }
        }
    }

    /// Whether this node or any descendant carries a bit in `mask`.
    pub fn is_changed(&self, mask: ChangeFlags) -> bool {
        if self.own_changes().intersects(mask) {
            return true;
        }
        match self {
            ValueNode::Leaf(_) => false,
            ValueNode::Record(record) => record.fields.iter().any(|f| f.value.is_changed(mask)),
            ValueNode::Array(array) => array.elements.iter().any(|e| e.is_changed(mask)),
        }
    }

    pub fn clear_changes(&mut self) {
        match self {
            ValueNode::Leaf(leaf) => leaf.changes = ChangeFlags::NONE,
            ValueNode::Record(record) => {
                record.changes = ChangeFlags::NONE;
                for field in record.fields.iter_mut() {
                    field.value.clear_changes();
                }
            }
            ValueNode::Array(array) => {
                array.changes = ChangeFlags::NONE;
                for element in array.elements.iter_mut() {
                    element.clear_changes();
                }
            }
        }
    }

    /// Recursively resets the tree to its declared defaults.
    pub fn set_to_default(&mut self) {
        match self {
            ValueNode::Leaf(leaf) => {
                if leaf.value != leaf.default {
                    leaf.value = leaf.default.clone();
                    leaf.changes |= ChangeFlags::VALUE;
                }
            }
            ValueNode::Record(record) => {
                for field in record.fields.iter_mut() {
                    if field.optional && field.active {
                        field.active = false;
                        record.changes |= ChangeFlags::STRUCTURE;
                    }
                    field.value.set_to_default();
                }
            }
            ValueNode::Array(array) => {
                let len = array.default_len;
                array.resize(len);
                for element in array.elements.iter_mut() {
                    element.set_to_default();
                }
            }
        }
    }

    // --- Hashing ---

    fn hash_contents<H: Hasher>(&self, state: &mut H) {
        match self {
            ValueNode::Leaf(leaf) => leaf.value.hash(state),
            ValueNode::Record(record) => {
                for field in record.fields() {
                    field.name.hash(state);
                    field.value.hash_contents(state);
                }
            }
            ValueNode::Array(array) => {
                array.elements.len().hash(state);
                for element in &array.elements {
                    element.hash_contents(state);
                }
            }
        }
    }

    /// Hash of the visible contents.
    pub fn get_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash_contents(&mut hasher);
        hasher.finish()
    }

    // --- Addressing ---

    pub fn children(&self) -> Vec<(PathStep, &ValueNode)> {
        match self {
            ValueNode::Leaf(_) => Vec::new(),
            ValueNode::Record(record) => record
                .fields()
                .map(|f| (PathStep::Field(f.name.clone()), &f.value))
                .collect(),
            ValueNode::Array(array) => array
                .elements
                .iter()
                .enumerate()
                .map(|(i, e)| (PathStep::Index(i), e))
                .collect(),
        }
    }

    pub fn child_from_step(&self, step: &PathStep) -> Option<&ValueNode> {
        match (self, step) {
            (ValueNode::Record(record), PathStep::Field(name)) => record.field(name),
            (ValueNode::Array(array), PathStep::Index(i)) => array.get(*i),
            _ => None,
        }
    }

    pub fn child_from_step_mut(&mut self, step: &PathStep) -> Option<&mut ValueNode> {
        match (self, step) {
            (ValueNode::Record(record), PathStep::Field(name)) => record.field_mut(name),
            (ValueNode::Array(array), PathStep::Index(i)) => array.get_mut(*i),
            _ => None,
        }
    }

    /// The step leading from `self` to `child`, matched by identity.
    pub fn step_to_child(&self, child: &ValueNode) -> Option<PathStep> {
        match self {
            ValueNode::Leaf(_) => None,
            ValueNode::Record(record) => record
                .fields()
                .find(|f| ptr::eq(&f.value, child))
                .map(|f| PathStep::Field(f.name.clone())),
            ValueNode::Array(array) => array
                .elements
                .iter()
                .position(|e| ptr::eq(e, child))
                .map(PathStep::Index),
        }
    }

    pub fn try_follow(&self, path: &Path) -> Option<&ValueNode> {
        let mut node = self;
        for step in path.steps() {
            node = node.child_from_step(step)?;
        }
        Some(node)
    }

    pub fn try_follow_mut(&mut self, path: &Path) -> Option<&mut ValueNode> {
        let mut node = self;
        for step in path.steps() {
            node = node.child_from_step_mut(step)?;
        }
        Some(node)
    }

    pub fn follow(&self, path: &Path) -> Result<&ValueNode, LibraryError> {
        let mut node = self;
        for (depth, step) in path.steps().iter().enumerate() {
            node = match node.child_from_step(step) {
                Some(child) => child,
                None => return Err(unresolved(path, depth, node.kind_name())),
            };
        }
        Ok(node)
    }

    pub fn follow_mut(&mut self, path: &Path) -> Result<&mut ValueNode, LibraryError> {
        let mut node = self;
        for (depth, step) in path.steps().iter().enumerate() {
            let kind = node.kind_name();
            node = match node.child_from_step_mut(step) {
                Some(child) => child,
                None => return Err(unresolved(path, depth, kind)),
            };
        }
        Ok(node)
    }

    // --- Mutation ---

    /// Stores a scalar into this leaf. Returns whether the value changed.
    pub fn set_scalar(&mut self, value: &Scalar) -> Result<bool, LibraryError> {
        match self {
            ValueNode::Leaf(leaf) => leaf.set(value),
            other => Err(LibraryError::model(format!(
                "cannot store a scalar in a {}",
                other.kind_name()
            ))),
        }
    }

    /// Copies the contents of a structurally compatible tree into `self`.
    ///
    /// Only the parts that actually differ get change bits.
    pub fn assign_from(&mut self, source: &ValueNode) -> Result<(), LibraryError> {
        match (self, source) {
            (ValueNode::Leaf(target), ValueNode::Leaf(src)) => target.set(&src.value).map(|_| ()),
            (ValueNode::Record(target), ValueNode::Record(src)) => target.assign_from(src),
            (ValueNode::Array(target), ValueNode::Array(src)) => target.assign_from(src),
            (target, src) => Err(LibraryError::model(format!(
                "cannot assign a {} into a {}",
                src.kind_name(),
                target.kind_name()
            ))),
        }
    }
}

fn unresolved(path: &Path, depth: usize, kind: &str) -> LibraryError {
    let step = &path.steps()[depth];
    LibraryError::path_resolution(
        path,
        format!(
            "no child '{}' in the {} at '{}'",
            step,
            kind,
            path.truncated(depth)
        ),
    )
}

impl From<Record> for ValueNode {
    fn from(record: Record) -> Self {
        ValueNode::Record(record)
    }
}

impl From<Array> for ValueNode {
    fn from(array: Array) -> Self {
        ValueNode::Array(array)
    }
}

impl From<Leaf> for ValueNode {
    fn from(leaf: Leaf) -> Self {
        ValueNode::Leaf(leaf)
    }
}
