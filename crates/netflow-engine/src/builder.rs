//! Fluent builder for workflow graphs
//!
//! Provides a fluent API for constructing graphs programmatically, mostly
//! for fixtures and scripted imports. Nothing is checked while building;
//! run the result through [`crate::validation::validate_workflow`].

use crate::graph::{GraphDocument, GraphModel};
use crate::types::{
    CommandExecuteConfig, ConditionConfig, ConfigDeployConfig, DeviceConnectConfig,
    ErrorHandling, LoopConfig, Port, StatusCheckConfig, StepConfig, WorkflowEdge, WorkflowNode,
};

/// Horizontal spacing between auto-placed nodes
const NODE_SPACING: f64 = 200.0;

/// Fluent builder for constructing workflow graphs
///
/// # Example
///
/// ```ignore
/// let graph = WorkflowBuilder::new()
///     .add_start("start")
///     .add_condition("check", ConditionConfig { expression: "ok".into() })
///     .add_end("done")
///     .add_end("abort")
///     .connect("start", "check")
///     .connect_port("check", Port::True, "done")
///     .connect_port("check", Port::False, "abort")
///     .build();
/// ```
#[derive(Debug, Default)]
pub struct WorkflowBuilder {
    nodes: Vec<WorkflowNode>,
    edges: Vec<WorkflowEdge>,
    edge_counter: usize,
}

impl WorkflowBuilder {
    /// Create a new, empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node with an explicit payload, placed to the right of the last one
    pub fn add_step(mut self, id: impl Into<String>, step: StepConfig) -> Self {
        let position = (self.nodes.len() as f64 * NODE_SPACING, 0.0);
        self.nodes.push(WorkflowNode::with_config(id, step, position));
        self
    }

    /// Add a Start node
    pub fn add_start(self, id: impl Into<String>) -> Self {
        self.add_step(id, StepConfig::Start)
    }

    /// Add an End node
    pub fn add_end(self, id: impl Into<String>) -> Self {
        self.add_step(id, StepConfig::End)
    }

    /// Add a Task node with an empty action
    pub fn add_task(self, id: impl Into<String>) -> Self {
        self.add_step(id, StepConfig::Task(Default::default()))
    }

    /// Add a Condition node
    pub fn add_condition(self, id: impl Into<String>, config: ConditionConfig) -> Self {
        self.add_step(id, StepConfig::Condition(config))
    }

    /// Add a Loop node bounded by `max_iterations`
    pub fn add_loop(self, id: impl Into<String>, max_iterations: u32) -> Self {
        self.add_step(
            id,
            StepConfig::Loop(LoopConfig {
                max_iterations,
                until: None,
            }),
        )
    }

    pub fn add_device_connect(self, id: impl Into<String>, config: DeviceConnectConfig) -> Self {
        self.add_step(id, StepConfig::DeviceConnect(config))
    }

    pub fn add_config_deploy(self, id: impl Into<String>, config: ConfigDeployConfig) -> Self {
        self.add_step(id, StepConfig::ConfigDeploy(config))
    }

    pub fn add_command_execute(self, id: impl Into<String>, config: CommandExecuteConfig) -> Self {
        self.add_step(id, StepConfig::CommandExecute(config))
    }

    pub fn add_status_check(self, id: impl Into<String>, config: StatusCheckConfig) -> Self {
        self.add_step(id, StepConfig::StatusCheck(config))
    }

    /// Set the label of the most recently added node
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        if let Some(node) = self.nodes.last_mut() {
            node.label = label.into();
        }
        self
    }

    /// Set the retry policy of the most recently added node
    pub fn with_error_handling(mut self, error_handling: ErrorHandling) -> Self {
        if let Some(node) = self.nodes.last_mut() {
            node.config.error_handling = Some(error_handling);
        }
        self
    }

    /// Set the timeout of the most recently added node
    pub fn with_timeout(mut self, seconds: u32) -> Self {
        if let Some(node) = self.nodes.last_mut() {
            node.config.timeout_seconds = Some(seconds);
        }
        self
    }

    /// Connect two nodes through the default output (auto-generates edge ID)
    pub fn connect(mut self, source: impl Into<String>, target: impl Into<String>) -> Self {
        let id = self.next_edge_id();
        self.edges.push(WorkflowEdge::new(id, source, target));
        self
    }

    /// Connect two nodes through a named port (auto-generates edge ID)
    pub fn connect_port(
        mut self,
        source: impl Into<String>,
        port: Port,
        target: impl Into<String>,
    ) -> Self {
        let id = self.next_edge_id();
        self.edges
            .push(WorkflowEdge::new(id, source, target).from_port(port));
        self
    }

    /// Add an edge with an explicit ID
    pub fn add_edge(mut self, edge: WorkflowEdge) -> Self {
        self.edges.push(edge);
        self
    }

    fn next_edge_id(&mut self) -> String {
        self.edge_counter += 1;
        format!("edge-{}", self.edge_counter)
    }

    /// Build the persistence document without validation
    pub fn build_document(self) -> GraphDocument {
        GraphDocument {
            nodes: self.nodes,
            edges: self.edges,
        }
    }

    /// Build the graph without validation
    pub fn build(self) -> GraphModel {
        GraphModel::from_document(self.build_document())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NodeKind;

    #[test]
    fn test_builder_generates_edge_ids() {
        let graph = WorkflowBuilder::new()
            .add_start("start")
            .add_task("work")
            .add_end("end")
            .connect("start", "work")
            .connect("work", "end")
            .build();

        assert_eq!(graph.nodes().len(), 3);
        let ids: Vec<&str> = graph.edges().iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["edge-1", "edge-2"]);
    }

    #[test]
    fn test_builder_modifiers_apply_to_last_node() {
        let graph = WorkflowBuilder::new()
            .add_start("start")
            .add_task("work")
            .with_label("Reload")
            .with_timeout(30)
            .build();

        let work = graph.find_node("work").unwrap();
        assert_eq!(work.kind(), NodeKind::Task);
        assert_eq!(work.label, "Reload");
        assert_eq!(work.config.timeout_seconds, Some(30));
        assert_eq!(graph.find_node("start").unwrap().config.timeout_seconds, None);
    }

    #[test]
    fn test_builder_keeps_dangling_edges() {
        let graph = WorkflowBuilder::new()
            .add_start("start")
            .connect("start", "missing")
            .build();
        assert_eq!(graph.edges().len(), 1);
    }
}
