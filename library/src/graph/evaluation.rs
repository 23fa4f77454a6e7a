//! One evaluation pass over the graph.
//!
//! Nodes are ordered by repeatedly extracting those whose dependencies have
//! all been extracted. Whatever cannot be extracted sits in or behind a
//! dependency loop; those nodes are marked failed and skipped, and the rest
//! of the graph evaluates normally.

use std::collections::HashMap;
use std::time::Duration;

use log::{debug, warn};

use super::Graph;
use super::connections::ConnectionRef;
use crate::model::modifier::ConnectionSource;
use crate::model::node::{EvalState, Node, NodeId, NodeKind};
use crate::model::value::ChangeFlags;
use crate::util::timing::ScopedTimer;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProcessReport {
    /// Nodes in the order they were evaluated.
    pub order: Vec<NodeId>,
    pub in_loop: Vec<NodeId>,
    /// Every node failed at the end of the pass, for whatever reason.
    pub failed: Vec<NodeId>,
    pub elapsed: Duration,
}

impl Graph {
    pub fn process(&mut self) -> ProcessReport {
        let timer =
            ScopedTimer::debug_lazy(|| format!("Graph::process ({} nodes)", self.nodes.len()));

        if self.connections.is_stale() {
            self.connections.rebuild(&self.nodes, &self.order);
            debug!(
                "Graph: rebuilt connection index ({} broken)",
                self.connections.broken().len()
            );
        }
        for node in self.nodes.values_mut() {
            node.begin_pass();
        }

        let (order, in_loop) = self.sort();
        for id in &in_loop {
            if let Some(node) = self.nodes.get_mut(id) {
                node.mark_in_loop();
            }
        }
        if !in_loop.is_empty() {
            warn!("Graph: {} node(s) are in a dependency loop", in_loop.len());
        }

        for id in &order {
            self.evaluate(*id);
        }
        // Dependents have read the changes by now.
        for id in &order {
            if let Some(node) = self.nodes.get_mut(id) {
                node.clear_changes();
            }
        }

        let failed = self
            .nodes()
            .filter(|node| node.is_failed())
            .map(Node::id)
            .collect();
        ProcessReport {
            order,
            in_loop,
            failed,
            elapsed: timer.elapsed(),
        }
    }

    /// Returns the extraction order and the nodes that could not be extracted.
    fn sort(&mut self) -> (Vec<NodeId>, Vec<NodeId>) {
        let mut remaining: HashMap<NodeId, usize> = self
            .order
            .iter()
            .map(|id| (*id, self.connections.depends_on(*id).len()))
            .collect();
        let mut sorted = Vec::with_capacity(self.order.len());

        loop {
            let mut extracted = false;
            for id in &self.order {
                if remaining.get(id) != Some(&0) {
                    continue;
                }
                remaining.remove(id);
                for dependent in self.connections.dependents(*id) {
                    if let Some(count) = remaining.get_mut(&dependent.node) {
                        *count = count.saturating_sub(1);
                    }
                }
                if let Some(node) = self.nodes.get_mut(id) {
                    node.eval_state = EvalState::Sorted;
                }
                sorted.push(*id);
                extracted = true;
            }
            if !extracted {
                break;
            }
        }

        let in_loop = self
            .order
            .iter()
            .filter(|id| remaining.contains_key(id))
            .copied()
            .collect();
        (sorted, in_loop)
    }

    /// Pulls the node's incoming connections, shallowest target first so
    /// that nested modifiers are applied on top, then recomputes it.
    fn evaluate(&mut self, id: NodeId) {
        let mut incoming: Vec<(ConnectionRef, bool)> = self
            .connections
            .depends_on(id)
            .iter()
            .map(|connection| (connection.clone(), false))
            .chain(
                self.connections
                    .broken()
                    .iter()
                    .filter(|connection| connection.node == id)
                    .map(|connection| (connection.clone(), true)),
            )
            .collect();
        incoming.sort_by_key(|(connection, _)| connection.target.len());

        if let Some(node) = self.nodes.get_mut(&id) {
            node.retry_missing_targets();
        }
        for (connection, broken) in &incoming {
            if *broken {
                self.apply_broken(connection);
            } else {
                self.apply_incoming(connection);
            }
        }
        if let Some(node) = self.nodes.get_mut(&id) {
            node.recompute();
        }
    }

    /// Applies one connection if its source changed or the modifier has to
    /// be forced.
    fn apply_incoming(&mut self, connection: &ConnectionRef) {
        let Some(modifier) = self
            .nodes
            .get(&connection.node)
            .and_then(|node| node.modifier(&connection.target))
        else {
            return;
        };
        let forced = modifier.needs_forcing();

        let source = match self
            .nodes
            .get(&connection.source_node)
            .and_then(Node::output)
        {
            None => ConnectionSource::Missing(format!(
                "node {} has no output",
                connection.source_node
            )),
            Some(output) => match output.try_follow(&connection.source_path) {
                None => ConnectionSource::Missing(format!(
                    "'{}' does not resolve in the output of node {}",
                    connection.source_path, connection.source_node
                )),
                Some(value) if forced || value.is_changed(ChangeFlags::ALL) => {
                    ConnectionSource::Value(value.clone())
                }
                Some(_) => ConnectionSource::Unchanged,
            },
        };
        if let Some(target) = self.nodes.get_mut(&connection.node) {
            target.apply_connection(&connection.target, source);
        }
    }

    /// Connections without a usable source node are applied as missing so
    /// that they do not keep a stale value.
    fn apply_broken(&mut self, connection: &ConnectionRef) {
        let reason = match self.nodes.get(&connection.source_node) {
            Some(source) if source.kind() == NodeKind::Target => format!(
                "node {} is a target and has no output",
                connection.source_node
            ),
            _ => format!("node {} does not exist", connection.source_node),
        };
        let Some(node) = self.nodes.get_mut(&connection.node) else {
            return;
        };
        let already_failed = node
            .modifier(&connection.target)
            .is_none_or(|m| m.is_failed());
        if !already_failed {
            node.apply_connection(&connection.target, ConnectionSource::Missing(reason));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::{SEQUENCE_PROCESSOR, SUM_PROCESSOR};
    use crate::model::identifier::IdentifierInterner;
    use crate::model::modifier::{ModifierData, ModifierOutcome};
    use crate::model::node::FailureKind;
    use crate::model::path::Path;
    use crate::model::project::NodeData;
    use crate::plugin::PluginManager;
    use std::sync::Arc;

    fn p(s: &str) -> Path {
        s.parse().unwrap()
    }

    fn setup() -> Graph {
        Graph::new(Arc::new(PluginManager::with_builtins(Arc::new(
            IdentifierInterner::new(),
        ))))
    }

    fn sequence(graph: &mut Graph) -> NodeId {
        let factory = graph.plugins().processor_id(SEQUENCE_PROCESSOR).unwrap();
        let node = graph.create_node(&NodeData::new(NodeKind::Processor, factory));
        graph.add_node(node).unwrap()
    }

    fn output(graph: &Graph, id: NodeId) -> Vec<i64> {
        graph
            .node(id)
            .unwrap()
            .output()
            .unwrap()
            .as_array()
            .unwrap()
            .elements()
            .iter()
            .map(|e| e.as_integer().unwrap())
            .collect()
    }

    #[test]
    fn test_chain_evaluates_in_dependency_order() {
        let mut graph = setup();
        let downstream = sequence(&mut graph);
        let upstream = sequence(&mut graph);
        graph
            .add_modifier(upstream, ModifierData::constant(p("value"), 10))
            .unwrap();
        graph
            .add_modifier(
                downstream,
                ModifierData::connection(p("value"), upstream, p("[1]")),
            )
            .unwrap();

        let report = graph.process();
        assert_eq!(report.order, [upstream, downstream]);
        assert!(report.failed.is_empty());
        assert_eq!(output(&graph, downstream), [11, 12]);
    }

    #[test]
    fn test_unchanged_source_is_not_copied_again() {
        let mut graph = setup();
        let a = sequence(&mut graph);
        let b = sequence(&mut graph);
        graph
            .add_modifier(b, ModifierData::connection(p("value"), a, p("[0]")))
            .unwrap();
        graph.process();
        assert!(!graph.node(b).unwrap().modifier(&p("value")).unwrap().needs_forcing());

        let report = graph.process();
        assert_eq!(report.order.len(), 2);
        assert_eq!(output(&graph, b), [0, 1]);
    }

    #[test]
    fn test_nested_connection_is_applied_over_its_parent() {
        let mut graph = setup();
        let whole = sequence(&mut graph);
        let single = sequence(&mut graph);
        let factory = graph.plugins().processor_id(SUM_PROCESSOR).unwrap();
        let node = graph.create_node(&NodeData::new(NodeKind::Processor, factory));
        let sum = graph.add_node(node).unwrap();
        graph
            .add_modifier(single, ModifierData::constant(p("value"), 10))
            .unwrap();
        graph
            .add_modifier(sum, ModifierData::connection(p("values[0]"), single, p("[1]")))
            .unwrap();
        graph
            .add_modifier(sum, ModifierData::connection(p("values"), whole, Path::root()))
            .unwrap();

        let total = |graph: &Graph| graph.node(sum).unwrap().output().unwrap().as_integer();
        graph.process();
        assert_eq!(total(&graph), Some(11 + 1));

        graph
            .add_modifier(whole, ModifierData::constant(p("value"), 5))
            .unwrap();
        graph.process();
        assert_eq!(total(&graph), Some(11 + 6));
        let nested = graph.node(sum).unwrap().modifier(&p("values[0]")).unwrap();
        assert_eq!(nested.outcome(), ModifierOutcome::Success);
    }

    #[test]
    fn test_self_connection_is_a_loop() {
        let mut graph = setup();
        let a = sequence(&mut graph);
        let b = sequence(&mut graph);
        graph
            .add_modifier(a, ModifierData::connection(p("value"), a, p("[0]")))
            .unwrap();
        let report = graph.process();
        assert_eq!(report.in_loop, [a]);
        assert_eq!(report.order, [b]);
        assert_eq!(
            graph.node(a).unwrap().failure().unwrap().kind,
            FailureKind::DependencyLoop
        );
    }

    #[test]
    fn test_missing_source_node_surfaces() {
        let mut graph = setup();
        let a = sequence(&mut graph);
        graph
            .add_modifier(a, ModifierData::connection(p("count"), NodeId::new(), Path::root()))
            .unwrap();
        let report = graph.process();
        assert!(report.failed.is_empty());
        let modifier = graph.node(a).unwrap().modifier(&p("count")).unwrap();
        assert_eq!(modifier.outcome(), ModifierOutcome::SourceMissing);
        assert!(modifier.reason().unwrap().contains("does not exist"));
        assert_eq!(graph.connections().broken().len(), 1);
    }
}
