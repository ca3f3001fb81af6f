//! Core types for workflow graphs
//!
//! These types define the structure of an automation workflow: typed
//! steps (nodes), the directed connections between them (edges), the
//! named output ports branching steps expose, and the per-kind
//! configuration each step carries.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Unique identifier for a node
pub type NodeId = String;

/// Unique identifier for an edge
pub type EdgeId = String;

/// The closed set of step kinds a workflow node can have
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeKind {
    /// Entry point of the workflow. Exactly one per valid graph.
    Start,
    /// Exit point of the workflow. At least one per valid graph.
    End,
    /// Generic runner-side action
    Task,
    /// Two-way branch on an expression
    Condition,
    /// Bounded repetition of a body
    Loop,
    /// Open a session to one or more devices
    DeviceConnect,
    /// Push configuration lines to the connected devices
    ConfigDeploy,
    /// Run operational commands on the connected devices
    CommandExecute,
    /// Capture the running configuration
    ConfigBackup,
    /// Run a command and branch on whether its output matches
    StatusCheck,
}

impl NodeKind {
    /// Every kind, in declaration order
    pub const ALL: [NodeKind; 10] = [
        NodeKind::Start,
        NodeKind::End,
        NodeKind::Task,
        NodeKind::Condition,
        NodeKind::Loop,
        NodeKind::DeviceConnect,
        NodeKind::ConfigDeploy,
        NodeKind::CommandExecute,
        NodeKind::ConfigBackup,
        NodeKind::StatusCheck,
    ];

    /// Ports an outgoing edge from this kind may name.
    ///
    /// An empty slice means the kind has a single default output and its
    /// edges carry no port.
    pub fn output_ports(&self) -> &'static [Port] {
        match self {
            NodeKind::Condition => &[Port::True, Port::False],
            NodeKind::Loop => &[Port::Continue, Port::Break],
            NodeKind::StatusCheck => &[Port::Success, Port::Failure],
            NodeKind::Start
            | NodeKind::End
            | NodeKind::Task
            | NodeKind::DeviceConnect
            | NodeKind::ConfigDeploy
            | NodeKind::CommandExecute
            | NodeKind::ConfigBackup => &[],
        }
    }

    /// Whether outgoing edges of this kind select a branch by port
    pub fn is_branching(&self) -> bool {
        !self.output_ports().is_empty()
    }

    /// Whether `port` is legal on an edge leaving this kind
    pub fn accepts_port(&self, port: Option<Port>) -> bool {
        match port {
            Some(port) => self.output_ports().contains(&port),
            None => !self.is_branching(),
        }
    }

    /// Wire name used in documents and messages
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Start => "start",
            NodeKind::End => "end",
            NodeKind::Task => "task",
            NodeKind::Condition => "condition",
            NodeKind::Loop => "loop",
            NodeKind::DeviceConnect => "deviceConnect",
            NodeKind::ConfigDeploy => "configDeploy",
            NodeKind::CommandExecute => "commandExecute",
            NodeKind::ConfigBackup => "configBackup",
            NodeKind::StatusCheck => "statusCheck",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named output slot on a branching node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Port {
    True,
    False,
    Continue,
    Break,
    Success,
    Failure,
}

impl Port {
    pub fn as_str(&self) -> &'static str {
        match self {
            Port::True => "true",
            Port::False => "false",
            Port::Continue => "continue",
            Port::Break => "break",
            Port::Success => "success",
            Port::Failure => "failure",
        }
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the execution agent should do once a step has exhausted its retries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnError {
    /// Abort the whole run
    #[default]
    Stop,
    /// Record the failure and move on to the next step
    Continue,
    /// Ask the runner to restore the last backup, then abort
    Rollback,
}

impl OnError {
    pub fn as_str(&self) -> &'static str {
        match self {
            OnError::Stop => "stop",
            OnError::Continue => "continue",
            OnError::Rollback => "rollback",
        }
    }
}

/// Retry policy copied verbatim into the generated script
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorHandling {
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default)]
    pub retry_interval_seconds: u32,
    #[serde(default)]
    pub on_error: OnError,
}

/// Which devices a `deviceConnect` step talks to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TargetSelector {
    /// A single literal host name or address
    Host { host: String },
    /// A device group resolved at compile time
    #[serde(rename_all = "camelCase")]
    DeviceGroup { group_ref: String },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionConfig {
    /// Expression the runner evaluates against the last step output
    #[serde(default)]
    pub expression: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoopConfig {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    /// Optional early-exit expression checked after every iteration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub until: Option<String>,
}

fn default_max_iterations() -> u32 {
    1
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            until: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceConnectConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<TargetSelector>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigDeployConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_ref: Option<String>,
    /// Lines appended after the template body
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub commands: Vec<String>,
    #[serde(default)]
    pub save_config: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandExecuteConfig {
    /// Command lines; `{{name}}` tokens are filled from resolved variables
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub commands: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_ref: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigBackupConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCheckConfig {
    #[serde(default)]
    pub command: String,
    /// Text the command output must contain for the `success` branch
    #[serde(default)]
    pub expect: String,
}

/// Per-kind parameter payload, tagged by `kind`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum StepConfig {
    Start,
    End,
    Task(TaskConfig),
    Condition(ConditionConfig),
    Loop(LoopConfig),
    DeviceConnect(DeviceConnectConfig),
    ConfigDeploy(ConfigDeployConfig),
    CommandExecute(CommandExecuteConfig),
    ConfigBackup(ConfigBackupConfig),
    StatusCheck(StatusCheckConfig),
}

impl StepConfig {
    pub fn kind(&self) -> NodeKind {
        match self {
            StepConfig::Start => NodeKind::Start,
            StepConfig::End => NodeKind::End,
            StepConfig::Task(_) => NodeKind::Task,
            StepConfig::Condition(_) => NodeKind::Condition,
            StepConfig::Loop(_) => NodeKind::Loop,
            StepConfig::DeviceConnect(_) => NodeKind::DeviceConnect,
            StepConfig::ConfigDeploy(_) => NodeKind::ConfigDeploy,
            StepConfig::CommandExecute(_) => NodeKind::CommandExecute,
            StepConfig::ConfigBackup(_) => NodeKind::ConfigBackup,
            StepConfig::StatusCheck(_) => NodeKind::StatusCheck,
        }
    }

    /// Default payload for a kind
    pub fn for_kind(kind: NodeKind) -> Self {
        match kind {
            NodeKind::Start => StepConfig::Start,
            NodeKind::End => StepConfig::End,
            NodeKind::Task => StepConfig::Task(TaskConfig::default()),
            NodeKind::Condition => StepConfig::Condition(ConditionConfig::default()),
            NodeKind::Loop => StepConfig::Loop(LoopConfig::default()),
            NodeKind::DeviceConnect => StepConfig::DeviceConnect(DeviceConnectConfig::default()),
            NodeKind::ConfigDeploy => StepConfig::ConfigDeploy(ConfigDeployConfig::default()),
            NodeKind::CommandExecute => StepConfig::CommandExecute(CommandExecuteConfig::default()),
            NodeKind::ConfigBackup => StepConfig::ConfigBackup(ConfigBackupConfig::default()),
            NodeKind::StatusCheck => StepConfig::StatusCheck(StatusCheckConfig::default()),
        }
    }
}

/// A node's full configuration: the kind payload plus shared policy fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeConfig {
    #[serde(flatten)]
    pub step: StepConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_handling: Option<ErrorHandling>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u32>,
}

impl NodeConfig {
    pub fn new(step: StepConfig) -> Self {
        Self {
            step,
            error_handling: None,
            timeout_seconds: None,
        }
    }
}

impl From<StepConfig> for NodeConfig {
    fn from(step: StepConfig) -> Self {
        Self::new(step)
    }
}

/// A step in the workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowNode {
    /// Unique identifier, stable for the node's lifetime
    pub id: NodeId,
    /// Human-readable name
    #[serde(default)]
    pub label: String,
    /// Position in the editor (x, y); ignored by compilation
    #[serde(default)]
    pub position: (f64, f64),
    pub config: NodeConfig,
}

impl WorkflowNode {
    /// Create a node with the default payload for `kind`
    pub fn new(id: impl Into<String>, kind: NodeKind, position: (f64, f64)) -> Self {
        Self::with_config(id, StepConfig::for_kind(kind), position)
    }

    /// Create a node with an explicit payload
    pub fn with_config(
        id: impl Into<String>,
        step: StepConfig,
        position: (f64, f64),
    ) -> Self {
        let id = id.into();
        Self {
            label: id.clone(),
            id,
            position,
            config: NodeConfig::new(step),
        }
    }

    pub fn labeled(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn kind(&self) -> NodeKind {
        self.config.step.kind()
    }
}

/// A directed connection between two nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowEdge {
    /// Unique identifier for this edge
    pub id: EdgeId,
    /// Source node ID
    pub source: NodeId,
    /// Target node ID
    pub target: NodeId,
    /// Branch selector on the source node; absent for single-output kinds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_port: Option<Port>,
}

impl WorkflowEdge {
    pub fn new(
        id: impl Into<String>,
        source: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            source_port: None,
        }
    }

    pub fn from_port(mut self, port: Port) -> Self {
        self.source_port = Some(port);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_branching_ports() {
        assert_eq!(NodeKind::Condition.output_ports(), &[Port::True, Port::False]);
        assert_eq!(NodeKind::Loop.output_ports(), &[Port::Continue, Port::Break]);
        assert!(NodeKind::StatusCheck.is_branching());
        assert!(!NodeKind::CommandExecute.is_branching());
    }

    #[test]
    fn test_accepts_port() {
        assert!(NodeKind::Condition.accepts_port(Some(Port::False)));
        assert!(!NodeKind::Condition.accepts_port(Some(Port::Break)));
        assert!(!NodeKind::Condition.accepts_port(None));
        assert!(NodeKind::Task.accepts_port(None));
        assert!(!NodeKind::Task.accepts_port(Some(Port::True)));
    }

    #[test]
    fn test_kind_matches_payload() {
        for kind in NodeKind::ALL {
            assert_eq!(StepConfig::for_kind(kind).kind(), kind);
        }
    }

    #[test]
    fn test_node_serialization_shape() {
        let node = WorkflowNode::with_config(
            "connect",
            StepConfig::DeviceConnect(DeviceConnectConfig {
                credential_ref: Some("lab-admin".to_string()),
                target: Some(TargetSelector::DeviceGroup {
                    group_ref: "core".to_string(),
                }),
            }),
            (10.0, 20.0),
        );
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["config"]["kind"], "deviceConnect");
        assert_eq!(json["config"]["credentialRef"], "lab-admin");
        assert_eq!(json["config"]["target"]["type"], "deviceGroup");
        assert_eq!(json["config"]["target"]["groupRef"], "core");
        assert_eq!(json["position"], serde_json::json!([10.0, 20.0]));

        let restored: WorkflowNode = serde_json::from_value(json).unwrap();
        assert_eq!(restored, node);
    }

    #[test]
    fn test_policy_fields_live_in_config() {
        let mut node = WorkflowNode::new("deploy", NodeKind::ConfigDeploy, (0.0, 0.0));
        node.config.error_handling = Some(ErrorHandling {
            retry_count: 3,
            retry_interval_seconds: 10,
            on_error: OnError::Rollback,
        });
        node.config.timeout_seconds = Some(60);

        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["config"]["errorHandling"]["retryCount"], 3);
        assert_eq!(json["config"]["errorHandling"]["onError"], "rollback");
        assert_eq!(json["config"]["timeoutSeconds"], 60);
    }

    #[test]
    fn test_edge_port_serialization() {
        let edge = WorkflowEdge::new("e1", "check", "ok").from_port(Port::True);
        let json = serde_json::to_string(&edge).unwrap();
        assert!(json.contains("\"sourcePort\":\"true\""));

        let plain = WorkflowEdge::new("e2", "a", "b");
        let json = serde_json::to_string(&plain).unwrap();
        assert!(!json.contains("sourcePort"));
    }
}
