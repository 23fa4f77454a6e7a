use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::node::NodeId;
use crate::model::path::Path;
use crate::model::value::Scalar;

/// Serializable description of one edit attached to a node's input tree.
///
/// `Constant`, `ActivateOptional` and `ArraySize` only touch the owning
/// node. `Connection` copies a subtree out of another node's output and is
/// what induces evaluation order between nodes.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum ModifierData {
    Constant {
        target: Path,
        value: Scalar,
    },
    /// `target` is the optional field itself.
    ActivateOptional {
        target: Path,
    },
    ArraySize {
        target: Path,
        size: usize,
    },
    Connection {
        target: Path,
        source_node: NodeId,
        source_path: Path,
    },
}

impl ModifierData {
    pub fn constant(target: Path, value: impl Into<Scalar>) -> Self {
        ModifierData::Constant {
            target,
            value: value.into(),
        }
    }

    pub fn connection(target: Path, source_node: NodeId, source_path: Path) -> Self {
        ModifierData::Connection {
            target,
            source_node,
            source_path,
        }
    }

    pub fn target(&self) -> &Path {
        match self {
            ModifierData::Constant { target, .. }
            | ModifierData::ActivateOptional { target }
            | ModifierData::ArraySize { target, .. }
            | ModifierData::Connection { target, .. } => target,
        }
    }

    pub fn with_target(&self, new_target: Path) -> Self {
        let mut data = self.clone();
        match &mut data {
            ModifierData::Constant { target, .. }
            | ModifierData::ActivateOptional { target }
            | ModifierData::ArraySize { target, .. }
            | ModifierData::Connection { target, .. } => *target = new_target,
        }
        data
    }

    pub fn is_connection(&self) -> bool {
        matches!(self, ModifierData::Connection { .. })
    }

    /// Modifiers that change which paths exist in the tree.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            ModifierData::ActivateOptional { .. } | ModifierData::ArraySize { .. }
        )
    }

    pub fn source(&self) -> Option<(NodeId, &Path)> {
        match self {
            ModifierData::Connection {
                source_node,
                source_path,
                ..
            } => Some((*source_node, source_path)),
            _ => None,
        }
    }

    /// A copy reading from `new_source` instead. Local modifiers are returned unchanged.
    pub fn with_source_path(&self, new_source: Path) -> Self {
        let mut data = self.clone();
        if let ModifierData::Connection { source_path, .. } = &mut data {
            *source_path = new_source;
        }
        data
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            ModifierData::Constant { .. } => "constant",
            ModifierData::ActivateOptional { .. } => "activate",
            ModifierData::ArraySize { .. } => "array size",
            ModifierData::Connection { .. } => "connection",
        }
    }
}

impl fmt::Display for ModifierData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModifierData::Constant { target, value } => write!(f, "{} = {}", target, value),
            ModifierData::ActivateOptional { target } => write!(f, "activate {}", target),
            ModifierData::ArraySize { target, size } => write!(f, "{} has {} entries", target, size),
            ModifierData::Connection {
                target,
                source_node,
                source_path,
            } => write!(f, "{} <- {}:{}", target, source_node, source_path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> Path {
        s.parse().unwrap()
    }

    #[test]
    fn test_retargeting_keeps_payload() {
        let source = NodeId::new();
        let data = ModifierData::connection(p("values[2]"), source, p("out[1]"));
        let moved = data.with_target(p("values[4]")).with_source_path(p("out[0]"));
        assert_eq!(moved.target(), &p("values[4]"));
        assert_eq!(moved.source(), Some((source, &p("out[0]"))));

        let constant = ModifierData::constant(p("x"), 3);
        assert_eq!(constant.with_source_path(p("y")), constant);
        assert!(!constant.is_structural());
        assert!(ModifierData::ArraySize { target: p("x"), size: 1 }.is_structural());
    }

    #[test]
    fn test_json_shape_is_externally_tagged() {
        let data = ModifierData::constant(p("a.b[1]"), 5);
        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json["Constant"]["target"][0]["Field"], "a");
        let back: ModifierData = serde_json::from_value(json).unwrap();
        assert_eq!(back, data);
    }
}
