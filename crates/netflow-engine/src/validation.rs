//! Structural validation for workflow graphs
//!
//! `validate_workflow` runs a fixed, ordered list of checks and returns
//! every finding, never just the first. Findings come out in check order
//! and, within a check, in node or edge insertion order, so a given graph
//! always produces an identical list.
//!
//! Only `Severity::Error` findings block compilation.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::graph::GraphModel;
use crate::types::{EdgeId, NodeId, NodeKind, Port, StepConfig, WorkflowNode};

/// How serious a finding is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// Stable machine-readable identifier of a finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCode {
    MissingStart,
    MissingEnd,
    MultipleStarts,
    EdgeIntoStart,
    EdgeOutOfEnd,
    NoIncomingEdge,
    NoOutgoingEdge,
    MissingBranch,
    DanglingEdge,
    IllegalPort,
    DuplicatePort,
    FanOut,
    Unreachable,
    CycleOutsideLoop,
    IncompleteConfig,
    NoFailureBranch,
    UnresolvedResource,
    TruncatedPath,
}

/// A single validation (or compile diagnostic) finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationIssue {
    pub severity: Severity,
    pub code: IssueCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edge_id: Option<EdgeId>,
    /// The port a branch finding is about
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<Port>,
}

impl ValidationIssue {
    pub fn new(severity: Severity, code: IssueCode, message: impl Into<String>) -> Self {
        Self {
            severity,
            code,
            message: message.into(),
            node_id: None,
            edge_id: None,
            port: None,
        }
    }

    pub(crate) fn error(code: IssueCode, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, code, message)
    }

    pub(crate) fn warning(code: IssueCode, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, code, message)
    }

    pub(crate) fn info(code: IssueCode, message: impl Into<String>) -> Self {
        Self::new(Severity::Info, code, message)
    }

    pub(crate) fn at_node(mut self, node_id: impl Into<String>) -> Self {
        self.node_id = Some(node_id.into());
        self
    }

    pub(crate) fn at_edge(mut self, edge_id: impl Into<String>) -> Self {
        self.edge_id = Some(edge_id.into());
        self
    }

    pub(crate) fn on_port(mut self, port: Port) -> Self {
        self.port = Some(port);
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.severity, self.message)
    }
}

/// Whether any finding blocks compilation
pub fn has_errors(issues: &[ValidationIssue]) -> bool {
    issues.iter().any(ValidationIssue::is_error)
}

/// Validate a workflow graph
///
/// Returns all findings (not just the first), in check order.
pub fn validate_workflow(graph: &GraphModel) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    check_terminators(graph, &mut issues);
    check_terminal_edges(graph, &mut issues);
    check_connectivity(graph, &mut issues);
    check_branch_completeness(graph, &mut issues);
    check_edge_references(graph, &mut issues);
    check_port_legality(graph, &mut issues);
    check_duplicate_ports(graph, &mut issues);
    check_fan_out(graph, &mut issues);
    check_reachability(graph, &mut issues);
    detect_cycles_outside_loops(graph, &mut issues);
    check_step_configs(graph, &mut issues);

    log::debug!(
        "Validated graph ({} nodes, {} edges): {} finding(s)",
        graph.nodes().len(),
        graph.edges().len(),
        issues.len()
    );
    issues
}

/// Check Start/End node presence
fn check_terminators(graph: &GraphModel, issues: &mut Vec<ValidationIssue>) {
    let starts: Vec<&WorkflowNode> = graph.nodes_of_kind(NodeKind::Start).collect();
    let end_count = graph.nodes_of_kind(NodeKind::End).count();

    if starts.is_empty() {
        issues.push(ValidationIssue::error(
            IssueCode::MissingStart,
            "Workflow has no start node",
        ));
    }
    if end_count == 0 {
        issues.push(ValidationIssue::error(
            IssueCode::MissingEnd,
            "Workflow has no end node",
        ));
    }
    for extra in starts.iter().skip(1) {
        issues.push(
            ValidationIssue::error(
                IssueCode::MultipleStarts,
                format!("Start node '{}' is one of several; a workflow has exactly one", extra.id),
            )
            .at_node(&extra.id),
        );
    }
}

/// Start nodes are source-only, end nodes are sink-only
fn check_terminal_edges(graph: &GraphModel, issues: &mut Vec<ValidationIssue>) {
    for edge in graph.edges() {
        let target_kind = graph.find_node(&edge.target).map(WorkflowNode::kind);
        let source_kind = graph.find_node(&edge.source).map(WorkflowNode::kind);

        if target_kind == Some(NodeKind::Start) {
            issues.push(
                ValidationIssue::error(
                    IssueCode::EdgeIntoStart,
                    format!("Start node '{}' cannot have incoming edges", edge.target),
                )
                .at_node(&edge.target)
                .at_edge(&edge.id),
            );
        }
        if source_kind == Some(NodeKind::End) {
            issues.push(
                ValidationIssue::error(
                    IssueCode::EdgeOutOfEnd,
                    format!("End node '{}' cannot have outgoing edges", edge.source),
                )
                .at_node(&edge.source)
                .at_edge(&edge.id),
            );
        }
    }
}

/// Every intermediate node needs a way in and a way out
fn check_connectivity(graph: &GraphModel, issues: &mut Vec<ValidationIssue>) {
    for node in graph.nodes() {
        if matches!(node.kind(), NodeKind::Start | NodeKind::End) {
            continue;
        }
        if graph.incoming_edges(&node.id).next().is_none() {
            issues.push(
                ValidationIssue::error(
                    IssueCode::NoIncomingEdge,
                    format!("Node '{}' has no incoming edge", node.id),
                )
                .at_node(&node.id),
            );
        }
        if graph.outgoing_edges(&node.id).next().is_none() {
            issues.push(
                ValidationIssue::error(
                    IssueCode::NoOutgoingEdge,
                    format!("Node '{}' has no outgoing edge", node.id),
                )
                .at_node(&node.id),
            );
        }
    }
}

/// Condition and loop nodes must wire both of their ports
fn check_branch_completeness(graph: &GraphModel, issues: &mut Vec<ValidationIssue>) {
    for node in graph.nodes() {
        let kind = node.kind();
        if !matches!(kind, NodeKind::Condition | NodeKind::Loop) {
            continue;
        }
        let wired: HashSet<Port> = graph
            .outgoing_edges(&node.id)
            .filter_map(|e| e.source_port)
            .collect();
        for port in kind.output_ports() {
            if !wired.contains(port) {
                issues.push(
                    ValidationIssue::error(
                        IssueCode::MissingBranch,
                        format!("{} node '{}' is missing its '{}' branch", kind, node.id, port),
                    )
                    .at_node(&node.id)
                    .on_port(*port),
                );
            }
        }
    }
}

/// Check that all edge source/target nodes exist
fn check_edge_references(graph: &GraphModel, issues: &mut Vec<ValidationIssue>) {
    for edge in graph.edges() {
        for endpoint in [&edge.source, &edge.target] {
            if !graph.contains_node(endpoint) {
                issues.push(
                    ValidationIssue::error(
                        IssueCode::DanglingEdge,
                        format!("Edge '{}' references unknown node '{}'", edge.id, endpoint),
                    )
                    .at_edge(&edge.id),
                );
            }
        }
    }
}

/// An edge's port must be one its source kind offers
fn check_port_legality(graph: &GraphModel, issues: &mut Vec<ValidationIssue>) {
    for edge in graph.edges() {
        let Some(source) = graph.find_node(&edge.source) else {
            continue;
        };
        let kind = source.kind();
        if kind.accepts_port(edge.source_port) {
            continue;
        }
        let message = match edge.source_port {
            Some(port) => format!(
                "Edge '{}' uses port '{}', which a {} node does not have",
                edge.id, port, kind
            ),
            None => format!(
                "Edge '{}' leaves {} node '{}' without naming a port",
                edge.id, kind, source.id
            ),
        };
        let mut issue = ValidationIssue::error(IssueCode::IllegalPort, message)
            .at_node(&source.id)
            .at_edge(&edge.id);
        if let Some(port) = edge.source_port {
            issue = issue.on_port(port);
        }
        issues.push(issue);
    }
}

/// More than one edge on the same branch port is suspect
fn check_duplicate_ports(graph: &GraphModel, issues: &mut Vec<ValidationIssue>) {
    for node in graph.nodes() {
        if !node.kind().is_branching() {
            continue;
        }
        let mut seen: HashSet<Port> = HashSet::new();
        for edge in graph.outgoing_edges(&node.id) {
            let Some(port) = edge.source_port else {
                continue;
            };
            if !seen.insert(port) {
                issues.push(
                    ValidationIssue::warning(
                        IssueCode::DuplicatePort,
                        format!(
                            "Edge '{}' is a second '{}' branch of '{}'; only the first is compiled",
                            edge.id, port, node.id
                        ),
                    )
                    .at_node(&node.id)
                    .at_edge(&edge.id)
                    .on_port(port),
                );
            }
        }
    }
}

/// Several edges out of a single-output node run one after another
fn check_fan_out(graph: &GraphModel, issues: &mut Vec<ValidationIssue>) {
    for node in graph.nodes() {
        if node.kind().is_branching() {
            continue;
        }
        let count = graph.outgoing_edges(&node.id).count();
        if count > 1 {
            issues.push(
                ValidationIssue::warning(
                    IssueCode::FanOut,
                    format!(
                        "Node '{}' has {} outgoing edges; their paths are emitted one after another in edge order",
                        node.id, count
                    ),
                )
                .at_node(&node.id),
            );
        }
    }
}

/// Nodes the start node cannot reach are never compiled
fn check_reachability(graph: &GraphModel, issues: &mut Vec<ValidationIssue>) {
    let Some(start) = graph.nodes_of_kind(NodeKind::Start).next() else {
        return;
    };

    let mut reached: HashSet<&str> = HashSet::new();
    let mut queue: VecDeque<&str> = VecDeque::new();
    reached.insert(&start.id);
    queue.push_back(&start.id);
    while let Some(node_id) = queue.pop_front() {
        for edge in graph.outgoing_edges(node_id) {
            if graph.contains_node(&edge.target) && reached.insert(&edge.target) {
                queue.push_back(&edge.target);
            }
        }
    }

    for node in graph.nodes() {
        if node.kind() == NodeKind::Start || reached.contains(node.id.as_str()) {
            continue;
        }
        issues.push(
            ValidationIssue::warning(
                IssueCode::Unreachable,
                format!("Node '{}' cannot be reached from the start node", node.id),
            )
            .at_node(&node.id),
        );
    }
}

/// Detect cycles that bypass every loop node, using Kahn's algorithm
///
/// Loop nodes are removed first; anything Kahn's algorithm cannot visit
/// afterwards sits on (or behind) a cycle no loop node controls.
fn detect_cycles_outside_loops(graph: &GraphModel, issues: &mut Vec<ValidationIssue>) {
    let mut in_degree: HashMap<&str, usize> = HashMap::new();
    for node in graph.nodes() {
        if node.kind() != NodeKind::Loop {
            in_degree.insert(&node.id, 0);
        }
    }
    for edge in graph.edges() {
        if in_degree.contains_key(edge.source.as_str()) {
            if let Some(deg) = in_degree.get_mut(edge.target.as_str()) {
                *deg += 1;
            }
        }
    }

    let mut queue: VecDeque<&str> = in_degree
        .iter()
        .filter(|(_, &deg)| deg == 0)
        .map(|(&id, _)| id)
        .collect();

    let mut visited = 0;
    while let Some(node_id) = queue.pop_front() {
        visited += 1;
        for edge in graph.outgoing_edges(node_id) {
            if let Some(deg) = in_degree.get_mut(edge.target.as_str()) {
                *deg -= 1;
                if *deg == 0 {
                    queue.push_back(&edge.target);
                }
            }
        }
    }

    if visited < in_degree.len() {
        issues.push(ValidationIssue::warning(
            IssueCode::CycleOutsideLoop,
            "Cycle detected that does not pass through a loop node; the compiler stops such paths where they repeat",
        ));
    }
}

/// Steps whose configuration leaves the runner nothing to do
fn check_step_configs(graph: &GraphModel, issues: &mut Vec<ValidationIssue>) {
    for node in graph.nodes() {
        let mut gaps: Vec<&str> = Vec::new();
        match &node.config.step {
            StepConfig::Start | StepConfig::End | StepConfig::Task(_) | StepConfig::ConfigBackup(_) => {}
            StepConfig::Condition(config) => {
                if config.expression.trim().is_empty() {
                    gaps.push("has an empty expression");
                }
            }
            StepConfig::Loop(config) => {
                if config.max_iterations == 0 {
                    gaps.push("allows zero iterations");
                }
            }
            StepConfig::DeviceConnect(config) => {
                if config.credential_ref.is_none() {
                    gaps.push("has no credential");
                }
                if config.target.is_none() {
                    gaps.push("has no target");
                }
            }
            StepConfig::ConfigDeploy(config) => {
                if config.template_ref.is_none() && config.commands.is_empty() {
                    gaps.push("has neither a template nor commands");
                }
            }
            StepConfig::CommandExecute(config) => {
                if config.template_ref.is_none() && config.commands.is_empty() {
                    gaps.push("has no commands");
                }
            }
            StepConfig::StatusCheck(config) => {
                if config.command.trim().is_empty() {
                    gaps.push("has no command");
                }
            }
        }
        for gap in gaps {
            issues.push(
                ValidationIssue::warning(
                    IssueCode::IncompleteConfig,
                    format!("{} node '{}' {}", node.kind(), node.id, gap),
                )
                .at_node(&node.id),
            );
        }

        if node.kind() == NodeKind::StatusCheck
            && !graph
                .outgoing_edges(&node.id)
                .any(|e| e.source_port == Some(Port::Failure))
        {
            issues.push(
                ValidationIssue::info(
                    IssueCode::NoFailureBranch,
                    format!("Status check '{}' has no failure branch; a failed check aborts the run", node.id),
                )
                .at_node(&node.id)
                .on_port(Port::Failure),
            );
        }
    }
}
