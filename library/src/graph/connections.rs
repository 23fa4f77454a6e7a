//! Derived index of which nodes read from which.

use std::collections::HashMap;

use crate::model::node::{Node, NodeId, NodeKind};
use crate::model::path::Path;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionRef {
    /// Node owning the connection modifier.
    pub node: NodeId,
    pub target: Path,
    pub source_node: NodeId,
    pub source_path: Path,
}

#[derive(Clone, Debug, Default)]
pub struct ConnectionInfo {
    pub depends_on: Vec<ConnectionRef>,
    pub dependents: Vec<ConnectionRef>,
}

/// Rebuilt from the nodes' connection modifiers whenever it is stale.
#[derive(Debug)]
pub struct ConnectionIndex {
    info: HashMap<NodeId, ConnectionInfo>,
    /// Connections whose source node is absent or has no output.
    broken: Vec<ConnectionRef>,
    stale: bool,
}

impl Default for ConnectionIndex {
    fn default() -> Self {
        Self {
            info: HashMap::new(),
            broken: Vec::new(),
            stale: true,
        }
    }
}

impl ConnectionIndex {
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    pub fn invalidate(&mut self) {
        self.stale = true;
    }

    pub fn rebuild(&mut self, nodes: &HashMap<NodeId, Node>, order: &[NodeId]) {
        self.info.clear();
        self.broken.clear();
        for id in order {
            self.info.entry(*id).or_default();
        }
        for id in order {
            let Some(node) = nodes.get(id) else {
                continue;
            };
            for modifier in node.connections() {
                let Some((source_node, source_path)) = modifier.data().source() else {
                    continue;
                };
                let connection = ConnectionRef {
                    node: *id,
                    target: modifier.target().clone(),
                    source_node,
                    source_path: source_path.clone(),
                };
                let resolved = nodes
                    .get(&source_node)
                    .is_some_and(|source| source.kind() != NodeKind::Target);
                if resolved {
                    self.info
                        .entry(source_node)
                        .or_default()
                        .dependents
                        .push(connection.clone());
                    self.info.entry(*id).or_default().depends_on.push(connection);
                } else {
                    self.broken.push(connection);
                }
            }
        }
        self.stale = false;
    }

    pub fn info(&self, node: NodeId) -> Option<&ConnectionInfo> {
        self.info.get(&node)
    }

    pub fn depends_on(&self, node: NodeId) -> &[ConnectionRef] {
        self.info
            .get(&node)
            .map(|info| info.depends_on.as_slice())
            .unwrap_or_default()
    }

    pub fn dependents(&self, node: NodeId) -> &[ConnectionRef] {
        self.info
            .get(&node)
            .map(|info| info.dependents.as_slice())
            .unwrap_or_default()
    }

    pub fn broken(&self) -> &[ConnectionRef] {
        &self.broken
    }
}
