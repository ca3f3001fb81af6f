//! The workflow graph document model
//!
//! `GraphModel` owns the nodes and edges of one workflow. Every mutator
//! takes `&self` and returns a new model, so a model value is an immutable
//! snapshot. The two halves are reference counted: a node-only mutation
//! shares the untouched edge list with its predecessor, which keeps
//! history snapshots cheap.
//!
//! Only id uniqueness and edge endpoints are enforced here. Everything
//! else a runnable workflow needs (terminators, connectivity, complete
//! branches) is reported by [`crate::validation`], since a graph is
//! routinely invalid while it is being edited.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::GraphError;
use crate::types::{NodeConfig, NodeKind, WorkflowEdge, WorkflowNode};

/// Result type for model mutations
pub type GraphResult<T> = std::result::Result<T, GraphError>;

/// Persistence shape of a graph: plain `{nodes, edges}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphDocument {
    #[serde(default)]
    pub nodes: Vec<WorkflowNode>,
    #[serde(default)]
    pub edges: Vec<WorkflowEdge>,
}

/// An immutable workflow graph value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphModel {
    nodes: Arc<Vec<WorkflowNode>>,
    edges: Arc<Vec<WorkflowEdge>>,
}

impl GraphModel {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a model from a persisted document without structural checks.
    ///
    /// Documents come from outside the editor and may carry dangling
    /// edges; validation reports those.
    pub fn from_document(document: GraphDocument) -> Self {
        Self {
            nodes: Arc::new(document.nodes),
            edges: Arc::new(document.edges),
        }
    }

    /// Snapshot the model into its persistence shape
    pub fn to_document(&self) -> GraphDocument {
        GraphDocument {
            nodes: self.nodes.as_ref().clone(),
            edges: self.edges.as_ref().clone(),
        }
    }

    /// Nodes in insertion order
    pub fn nodes(&self) -> &[WorkflowNode] {
        &self.nodes
    }

    /// Edges in insertion order
    pub fn edges(&self) -> &[WorkflowEdge] {
        &self.edges
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    /// Find a node by ID
    pub fn find_node(&self, id: &str) -> Option<&WorkflowNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Find an edge by ID
    pub fn find_edge(&self, id: &str) -> Option<&WorkflowEdge> {
        self.edges.iter().find(|e| e.id == id)
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.find_node(id).is_some()
    }

    /// Get edges coming into a node
    pub fn incoming_edges<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a WorkflowEdge> + 'a {
        self.edges.iter().filter(move |e| e.target == node_id)
    }

    /// Get edges going out of a node, in insertion order
    pub fn outgoing_edges<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a WorkflowEdge> + 'a {
        self.edges.iter().filter(move |e| e.source == node_id)
    }

    /// All nodes of the given kind, in insertion order
    pub fn nodes_of_kind(&self, kind: NodeKind) -> impl Iterator<Item = &WorkflowNode> + '_ {
        self.nodes.iter().filter(move |n| n.kind() == kind)
    }

    /// Append a node.
    ///
    /// Fails with `DuplicateId` if the ID is taken. No structural checks:
    /// a graph may have zero start nodes mid-edit.
    pub fn add_node(&self, node: WorkflowNode) -> GraphResult<Self> {
        if self.contains_node(&node.id) {
            return Err(GraphError::DuplicateId { id: node.id });
        }
        let mut nodes = self.nodes.as_ref().clone();
        nodes.push(node);
        Ok(Self {
            nodes: Arc::new(nodes),
            edges: Arc::clone(&self.edges),
        })
    }

    /// Remove a node and every edge that starts or ends at it
    pub fn remove_node(&self, id: &str) -> GraphResult<Self> {
        if !self.contains_node(id) {
            return Err(GraphError::NotFound(id.to_string()));
        }
        let nodes: Vec<WorkflowNode> = self.nodes.iter().filter(|n| n.id != id).cloned().collect();
        let edges: Vec<WorkflowEdge> = self
            .edges
            .iter()
            .filter(|e| e.source != id && e.target != id)
            .cloned()
            .collect();
        Ok(Self {
            nodes: Arc::new(nodes),
            edges: Arc::new(edges),
        })
    }

    /// Append an edge.
    ///
    /// Both endpoints must exist. Parallel edges and repeated source ports
    /// are accepted; validation flags the suspicious ones.
    pub fn add_edge(&self, edge: WorkflowEdge) -> GraphResult<Self> {
        for endpoint in [&edge.source, &edge.target] {
            if !self.contains_node(endpoint) {
                return Err(GraphError::UnknownEndpoint {
                    edge_id: edge.id.clone(),
                    node_id: endpoint.clone(),
                });
            }
        }
        if self.find_edge(&edge.id).is_some() {
            return Err(GraphError::DuplicateId { id: edge.id });
        }
        let mut edges = self.edges.as_ref().clone();
        edges.push(edge);
        Ok(Self {
            nodes: Arc::clone(&self.nodes),
            edges: Arc::new(edges),
        })
    }

    /// Remove a single edge
    pub fn remove_edge(&self, id: &str) -> GraphResult<Self> {
        if self.find_edge(id).is_none() {
            return Err(GraphError::NotFound(id.to_string()));
        }
        let edges: Vec<WorkflowEdge> = self.edges.iter().filter(|e| e.id != id).cloned().collect();
        Ok(Self {
            nodes: Arc::clone(&self.nodes),
            edges: Arc::new(edges),
        })
    }

    /// Shallow-merge `patch` into a node's config.
    ///
    /// Top-level keys of the patch replace the matching config keys. The
    /// patch may not change the node's `kind`, may only name fields the
    /// kind has, and the merged object must still be a valid config for
    /// that kind.
    pub fn update_node_config(&self, id: &str, patch: &serde_json::Value) -> GraphResult<Self> {
        let node = self
            .find_node(id)
            .ok_or_else(|| GraphError::NotFound(id.to_string()))?;
        let invalid = |reason: String| GraphError::InvalidConfigPatch {
            node_id: id.to_string(),
            reason,
        };

        let patch = patch
            .as_object()
            .ok_or_else(|| invalid("patch must be a JSON object".to_string()))?;
        if let Some(kind) = patch.get("kind") {
            if kind.as_str() != Some(node.kind().as_str()) {
                return Err(invalid(format!("cannot change kind of a {} node", node.kind())));
            }
        }

        let mut merged = match serde_json::to_value(&node.config) {
            Ok(serde_json::Value::Object(map)) => map,
            Ok(_) => return Err(invalid("config did not serialize to an object".to_string())),
            Err(e) => return Err(invalid(e.to_string())),
        };
        for (key, value) in patch {
            merged.insert(key.clone(), value.clone());
        }
        let config: NodeConfig = serde_json::from_value(serde_json::Value::Object(merged))
            .map_err(|e| invalid(e.to_string()))?;

        // Keys the config type dropped were never fields of this kind.
        // Null and empty-list values clear optional fields, which are not
        // serialized back.
        let known = match serde_json::to_value(&config) {
            Ok(serde_json::Value::Object(map)) => map,
            Ok(_) => return Err(invalid("config did not serialize to an object".to_string())),
            Err(e) => return Err(invalid(e.to_string())),
        };
        let unknown = patch.iter().find(|(key, value)| {
            !known.contains_key(key.as_str())
                && !value.is_null()
                && !value.as_array().is_some_and(|items| items.is_empty())
        });
        if let Some((key, _)) = unknown {
            return Err(invalid(format!("unknown key '{}' for a {} node", key, node.kind())));
        }

        Ok(self.replace_node(id, |n| n.config = config))
    }

    /// Move a node in the editor
    pub fn move_node(&self, id: &str, position: (f64, f64)) -> GraphResult<Self> {
        if !self.contains_node(id) {
            return Err(GraphError::NotFound(id.to_string()));
        }
        Ok(self.replace_node(id, |n| n.position = position))
    }

    /// Change a node's label
    pub fn rename_node(&self, id: &str, label: impl Into<String>) -> GraphResult<Self> {
        if !self.contains_node(id) {
            return Err(GraphError::NotFound(id.to_string()));
        }
        let label = label.into();
        Ok(self.replace_node(id, |n| n.label = label))
    }

    fn replace_node(&self, id: &str, update: impl FnOnce(&mut WorkflowNode)) -> Self {
        let mut nodes = self.nodes.as_ref().clone();
        if let Some(node) = nodes.iter_mut().find(|n| n.id == id) {
            update(node);
        }
        Self {
            nodes: Arc::new(nodes),
            edges: Arc::clone(&self.edges),
        }
    }
}

impl From<GraphDocument> for GraphModel {
    fn from(document: GraphDocument) -> Self {
        Self::from_document(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Port, StepConfig, TaskConfig};

    fn node(id: &str, kind: NodeKind) -> WorkflowNode {
        WorkflowNode::new(id, kind, (0.0, 0.0))
    }

    fn three_nodes() -> GraphModel {
        GraphModel::new()
            .add_node(node("a", NodeKind::Start))
            .and_then(|g| g.add_node(node("b", NodeKind::Task)))
            .and_then(|g| g.add_node(node("c", NodeKind::End)))
            .unwrap()
    }

    #[test]
    fn test_add_node_rejects_duplicate() {
        let graph = three_nodes();
        let err = graph.add_node(node("b", NodeKind::Task)).unwrap_err();
        assert_eq!(err, GraphError::DuplicateId { id: "b".to_string() });
        assert_eq!(graph.nodes().len(), 3);
    }

    #[test]
    fn test_add_node_leaves_original_untouched() {
        let before = three_nodes();
        let after = before.add_node(node("d", NodeKind::Task)).unwrap();
        assert_eq!(before.nodes().len(), 3);
        assert_eq!(after.nodes().len(), 4);
    }

    #[test]
    fn test_add_edge_unknown_endpoint() {
        let graph = three_nodes();
        let err = graph
            .add_edge(WorkflowEdge::new("e1", "a", "missing"))
            .unwrap_err();
        assert_eq!(
            err,
            GraphError::UnknownEndpoint {
                edge_id: "e1".to_string(),
                node_id: "missing".to_string()
            }
        );
    }

    #[test]
    fn test_add_edge_allows_parallel_edges() {
        let graph = three_nodes()
            .add_edge(WorkflowEdge::new("e1", "a", "b"))
            .and_then(|g| g.add_edge(WorkflowEdge::new("e2", "a", "b")))
            .unwrap();
        assert_eq!(graph.outgoing_edges("a").count(), 2);
    }

    #[test]
    fn test_remove_node_cascades_edges() {
        // "b" is the source of two edges and the target of one
        let graph = three_nodes()
            .add_node(node("d", NodeKind::End))
            .and_then(|g| g.add_edge(WorkflowEdge::new("e1", "a", "b")))
            .and_then(|g| g.add_edge(WorkflowEdge::new("e2", "b", "c")))
            .and_then(|g| g.add_edge(WorkflowEdge::new("e3", "b", "d")))
            .unwrap();

        let removed = graph.remove_node("b").unwrap();
        assert!(removed.edges().is_empty());
        assert!(removed.find_node("b").is_none());
        assert!(removed
            .edges()
            .iter()
            .all(|e| e.source != "b" && e.target != "b"));
    }

    #[test]
    fn test_remove_node_keeps_unrelated_edges() {
        let graph = three_nodes()
            .add_edge(WorkflowEdge::new("e1", "a", "b"))
            .and_then(|g| g.add_edge(WorkflowEdge::new("e2", "a", "c")))
            .unwrap();
        let removed = graph.remove_node("b").unwrap();
        assert_eq!(removed.edges().len(), 1);
        assert_eq!(removed.edges()[0].id, "e2");
    }

    #[test]
    fn test_remove_missing_node() {
        assert_eq!(
            three_nodes().remove_node("zzz").unwrap_err(),
            GraphError::NotFound("zzz".to_string())
        );
    }

    #[test]
    fn test_update_node_config_shallow_merge() {
        let graph = three_nodes()
            .update_node_config(
                "b",
                &serde_json::json!({"action": "reload", "timeoutSeconds": 30}),
            )
            .unwrap();
        let b = graph.find_node("b").unwrap();
        assert_eq!(
            b.config.step,
            StepConfig::Task(TaskConfig {
                action: Some("reload".to_string()),
                description: None,
            })
        );
        assert_eq!(b.config.timeout_seconds, Some(30));
    }

    #[test]
    fn test_update_node_config_rejects_kind_change() {
        let err = three_nodes()
            .update_node_config("b", &serde_json::json!({"kind": "loop"}))
            .unwrap_err();
        assert!(matches!(err, GraphError::InvalidConfigPatch { .. }));
    }

    #[test]
    fn test_update_node_config_not_found() {
        let err = three_nodes()
            .update_node_config("nope", &serde_json::json!({}))
            .unwrap_err();
        assert_eq!(err, GraphError::NotFound("nope".to_string()));
    }

    #[test]
    fn test_document_roundtrip() {
        let graph = three_nodes()
            .add_node(node("check", NodeKind::Condition))
            .and_then(|g| g.add_edge(WorkflowEdge::new("e1", "a", "check")))
            .and_then(|g| g.add_edge(WorkflowEdge::new("e2", "check", "b").from_port(Port::True)))
            .unwrap();

        let json = serde_json::to_string(&graph.to_document()).unwrap();
        let loaded: GraphDocument = serde_json::from_str(&json).unwrap();
        let reloaded = GraphModel::from_document(loaded.clone());
        assert_eq!(reloaded, graph);
        assert_eq!(serde_json::to_string(&reloaded.to_document()).unwrap(), json);
    }

    #[test]
    fn test_document_roundtrip_keeps_fractional_positions() {
        let positions = [
            (123.45678901234567, 0.1),
            (-0.30000000000000004, 1e-7),
            (2.0 / 3.0, 1234.5678 * 3.3),
        ];
        let mut graph = GraphModel::new();
        for (i, position) in positions.iter().enumerate() {
            graph = graph
                .add_node(WorkflowNode::new(format!("n{}", i), NodeKind::Task, *position))
                .unwrap();
        }

        let json = serde_json::to_string(&graph.to_document()).unwrap();
        let reloaded = GraphModel::from_document(serde_json::from_str(&json).unwrap());
        for (node, position) in reloaded.nodes().iter().zip(positions) {
            assert_eq!(node.position.0.to_bits(), position.0.to_bits());
            assert_eq!(node.position.1.to_bits(), position.1.to_bits());
        }
        assert_eq!(reloaded, graph);
    }

    #[test]
    fn test_update_node_config_rejects_unknown_key() {
        let graph = three_nodes();
        let err = graph
            .update_node_config("a", &serde_json::json!({"foo": 1}))
            .unwrap_err();
        assert!(matches!(err, GraphError::InvalidConfigPatch { ref node_id, .. } if node_id == "a"));

        // Clearing an optional field is not an unknown key
        let cleared = graph
            .update_node_config("b", &serde_json::json!({"timeoutSeconds": null, "action": null}))
            .unwrap();
        assert_eq!(cleared.find_node("b"), graph.find_node("b"));
    }

    #[test]
    fn test_node_mutation_shares_edges() {
        let graph = three_nodes()
            .add_edge(WorkflowEdge::new("e1", "a", "b"))
            .unwrap();
        let moved = graph.move_node("b", (5.0, 5.0)).unwrap();
        assert!(Arc::ptr_eq(&graph.edges, &moved.edges));
        assert_eq!(moved.find_node("b").unwrap().position, (5.0, 5.0));
    }
}
