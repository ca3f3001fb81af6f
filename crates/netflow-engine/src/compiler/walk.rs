//! Path expansion from the start node
//!
//! The walk follows every path from `start` to an `end` and builds a tree
//! of fragments: one per visited node, with branch bodies nested under
//! `condition`, `loop` and `statusCheck` headers. A node reachable along
//! several paths is expanded once per path.
//!
//! Back-edges are handled against the current path only. An edge back to
//! the innermost enclosing loop ends that loop's body (the next iteration
//! starts); any other edge back onto the path stops expansion there and
//! leaves a diagnostic.

use crate::constants::steps;
use crate::error::CompileError;
use crate::graph::GraphModel;
use crate::options::CompilerOptions;
use crate::resolve::ResourceResolver;
use crate::templates::{TemplateFields, TemplateTable, TOKEN_PATTERN};
use crate::types::{
    DeviceConnectConfig, NodeConfig, NodeId, NodeKind, Port, StepConfig, TargetSelector,
    WorkflowEdge, WorkflowNode,
};
use crate::validation::{IssueCode, ValidationIssue};

use super::literal;
use super::{placeholder, CompiledStep, ResourceKind, ResourceReference};

const PASS: &str = "pass";
const ELSE: &str = "else:";

/// One emitted node plus the bodies nested under it
#[derive(Debug)]
pub(super) struct Fragment {
    node_id: NodeId,
    depends_on: Vec<NodeId>,
    depth: usize,
    text: String,
    arms: Vec<Arm>,
}

/// A branch body under a block header
#[derive(Debug)]
struct Arm {
    /// Line introducing the arm; `None` when the header itself opens it
    header: Option<&'static str>,
    body: Vec<Fragment>,
    /// Emitted when the body is empty
    fallback: String,
}

impl Fragment {
    /// Append this fragment and its nested bodies in preorder
    ///
    /// Children are flattened first so each subtree's text is built once
    /// and reused by its parent. Returns the index of this fragment's step.
    pub(super) fn flatten_into(
        &self,
        indent: &str,
        budget: &mut TextBudget,
        steps: &mut Vec<CompiledStep>,
    ) -> Result<usize, CompileError> {
        let index = steps.len();
        steps.push(CompiledStep {
            node_id: self.node_id.clone(),
            emitted_text: String::new(),
            depends_on: self.depends_on.clone(),
            depth: self.depth,
        });

        let mut text = self.text.clone();
        for arm in &self.arms {
            if let Some(header) = arm.header {
                text.push('\n');
                text.push_str(header);
            }
            if arm.body.is_empty() {
                text.push('\n');
                text.push_str(indent);
                text.push_str(&arm.fallback);
            }
            for child in &arm.body {
                let child = child.flatten_into(indent, budget, steps)?;
                push_indented(&mut text, &steps[child].emitted_text, indent);
            }
        }

        budget.spend(text.len())?;
        steps[index].emitted_text = text;
        Ok(index)
    }
}

fn push_indented(out: &mut String, text: &str, indent: &str) {
    for line in text.lines() {
        out.push('\n');
        if !line.is_empty() {
            out.push_str(indent);
            out.push_str(line);
        }
    }
}

/// Byte allowance for the text of all emitted steps
pub(super) struct TextBudget {
    limit: usize,
    used: usize,
}

impl TextBudget {
    pub(super) fn new(limit: usize) -> Self {
        Self { limit, used: 0 }
    }

    fn spend(&mut self, bytes: usize) -> Result<(), CompileError> {
        self.used = self.used.saturating_add(bytes);
        if self.used > self.limit {
            return Err(CompileError::OutputLimitExceeded { limit: self.limit });
        }
        Ok(())
    }
}

/// Everything a finished walk produced
pub(super) struct WalkOutput {
    pub fragments: Vec<Fragment>,
    pub resources: Vec<ResourceReference>,
    pub diagnostics: Vec<ValidationIssue>,
}

pub(super) struct Walker<'a> {
    graph: &'a GraphModel,
    resolver: &'a dyn ResourceResolver,
    templates: &'a TemplateTable,
    options: &'a CompilerOptions,
    resources: Vec<ResourceReference>,
    diagnostics: Vec<ValidationIssue>,
    /// Node ids on the path being expanded
    path: Vec<&'a str>,
    /// Enclosing loop nodes, innermost last
    loops: Vec<&'a str>,
    emitted: usize,
}

impl<'a> Walker<'a> {
    pub(super) fn new(
        graph: &'a GraphModel,
        resolver: &'a dyn ResourceResolver,
        templates: &'a TemplateTable,
        options: &'a CompilerOptions,
    ) -> Self {
        Self {
            graph,
            resolver,
            templates,
            options,
            resources: Vec::new(),
            diagnostics: Vec::new(),
            path: Vec::new(),
            loops: Vec::new(),
            emitted: 0,
        }
    }

    pub(super) fn run(mut self, start: &'a WorkflowNode) -> Result<WalkOutput, CompileError> {
        let mut fragments = Vec::new();
        self.walk(start, None, 0, &mut fragments)?;
        Ok(WalkOutput {
            fragments,
            resources: self.resources,
            diagnostics: self.diagnostics,
        })
    }

    /// Expand everything reachable from `first` at one nesting level
    ///
    /// Runs of nodes at the same level are walked iteratively; only branch
    /// bodies recurse, and those are bounded by `max_nesting_depth`.
    fn walk(
        &mut self,
        first: &'a WorkflowNode,
        parent: Option<&'a str>,
        depth: usize,
        out: &mut Vec<Fragment>,
    ) -> Result<(), CompileError> {
        let base = self.path.len();
        let result = self.walk_level(first, parent, depth, out);
        self.path.truncate(base);
        result
    }

    fn walk_level(
        &mut self,
        first: &'a WorkflowNode,
        parent: Option<&'a str>,
        depth: usize,
        out: &mut Vec<Fragment>,
    ) -> Result<(), CompileError> {
        // Continuations not yet expanded, next one last, with the path
        // length to restore before expanding each
        let mut pending: Vec<(&'a WorkflowEdge, &'a str, usize)> = Vec::new();
        let mut next = Some((first, parent));

        loop {
            if let Some((node, parent)) = next.take() {
                self.emitted += 1;
                if self.emitted > self.options.max_emitted_steps {
                    return Err(CompileError::StepLimitExceeded {
                        limit: self.options.max_emitted_steps,
                    });
                }

                self.path.push(&node.id);
                let continuations = self.expand(node, parent, depth, out)?;
                let mark = self.path.len();
                for edge in continuations.into_iter().rev() {
                    pending.push((edge, node.id.as_str(), mark));
                }
            }

            let Some((edge, from, mark)) = pending.pop() else {
                return Ok(());
            };
            self.path.truncate(mark);
            next = self.resolve(edge, from).map(|node| (node, Some(from)));
        }
    }

    /// Emit `node` and return the edges that continue at its level
    fn expand(
        &mut self,
        node: &'a WorkflowNode,
        parent: Option<&str>,
        depth: usize,
        out: &mut Vec<Fragment>,
    ) -> Result<Vec<&'a WorkflowEdge>, CompileError> {
        let id = node.id.as_str();
        let fields = self.step_fields(node);
        let mut fragment = Fragment {
            node_id: node.id.clone(),
            depends_on: parent.map(|p| vec![p.to_string()]).unwrap_or_default(),
            depth,
            text: self.templates.render(node.kind(), &fields),
            arms: Vec::new(),
        };

        let continuations = match node.kind() {
            NodeKind::Condition => {
                let when_true = self.branch(id, Port::True, depth + 1)?;
                let when_false = self.branch(id, Port::False, depth + 1)?;
                fragment.arms = vec![
                    Arm { header: None, body: when_true, fallback: PASS.to_string() },
                    Arm { header: Some(ELSE), body: when_false, fallback: PASS.to_string() },
                ];
                Vec::new()
            }
            NodeKind::StatusCheck => {
                let on_success = self.branch(id, Port::Success, depth + 1)?;
                let failure_fallback = if self.port_edge(id, Port::Failure).is_some() {
                    PASS.to_string()
                } else {
                    format!("raise StepFailed({})", literal::string(id))
                };
                let on_failure = self.branch(id, Port::Failure, depth + 1)?;
                fragment.arms = vec![
                    Arm { header: None, body: on_success, fallback: PASS.to_string() },
                    Arm { header: Some(ELSE), body: on_failure, fallback: failure_fallback },
                ];
                Vec::new()
            }
            NodeKind::Loop => {
                self.loops.push(id);
                let body = self.branch(id, Port::Continue, depth + 1);
                self.loops.pop();
                fragment.arms = vec![Arm { header: None, body: body?, fallback: PASS.to_string() }];
                self.port_edge(id, Port::Break).into_iter().collect()
            }
            // Fan-out continuations run one after another, in edge order
            NodeKind::Start
            | NodeKind::End
            | NodeKind::Task
            | NodeKind::DeviceConnect
            | NodeKind::ConfigDeploy
            | NodeKind::CommandExecute
            | NodeKind::ConfigBackup => {
                let graph = self.graph;
                graph.outgoing_edges(id).collect()
            }
        };
        out.push(fragment);
        Ok(continuations)
    }

    /// Expand the body behind the first edge on `port`
    fn branch(&mut self, id: &'a str, port: Port, depth: usize) -> Result<Vec<Fragment>, CompileError> {
        let mut body = Vec::new();
        let Some(edge) = self.port_edge(id, port) else {
            return Ok(body);
        };
        if depth > self.options.max_nesting_depth {
            return Err(CompileError::NestingTooDeep {
                limit: self.options.max_nesting_depth,
            });
        }
        if let Some(node) = self.resolve(edge, id) {
            self.walk(node, Some(id), depth, &mut body)?;
        }
        Ok(body)
    }

    fn port_edge(&self, id: &'a str, port: Port) -> Option<&'a WorkflowEdge> {
        let graph = self.graph;
        graph
            .outgoing_edges(id)
            .find(|e| e.source_port == Some(port))
    }

    /// The node behind `edge`, or `None` when the edge turns back onto the path
    fn resolve(&mut self, edge: &'a WorkflowEdge, from: &str) -> Option<&'a WorkflowNode> {
        let target = edge.target.as_str();
        if self.path.contains(&target) {
            if self.loops.last() == Some(&target) {
                return None;
            }
            let issue = ValidationIssue::warning(
                IssueCode::TruncatedPath,
                format!(
                    "Edge '{}' from '{}' returns to '{}' outside a loop body; the path stops there",
                    edge.id, from, target
                ),
            )
            .at_node(from)
            .at_edge(&edge.id);
            if !self.diagnostics.contains(&issue) {
                log::warn!("{}", issue.message);
                self.diagnostics.push(issue);
            }
            return None;
        }

        // Dangling edges never survive validation
        let graph = self.graph;
        graph.find_node(target)
    }

    fn step_fields(&mut self, node: &'a WorkflowNode) -> TemplateFields {
        let mut fields = TemplateFields::new();
        fields.insert("id", literal::string(&node.id));
        fields.insert("label", literal::string(&node.label));
        fields.insert("policy", policy(&node.config));

        match &node.config.step {
            StepConfig::Start | StepConfig::End => {}
            StepConfig::Task(config) => {
                fields.insert("action", literal::optional_string(config.action.as_deref()));
                fields.insert(
                    "description",
                    literal::optional_string(config.description.as_deref()),
                );
            }
            StepConfig::Condition(config) => {
                fields.insert("expression", literal::string(&config.expression));
            }
            StepConfig::Loop(config) => {
                fields.insert("max_iterations", literal::number(config.max_iterations));
                fields.insert("until", literal::optional_string(config.until.as_deref()));
            }
            StepConfig::DeviceConnect(config) => self.connection_fields(&node.id, config, &mut fields),
            StepConfig::ConfigDeploy(config) => {
                let mut commands = Vec::new();
                if let Some(template_ref) = &config.template_ref {
                    commands.extend(self.template_lines(&node.id, template_ref));
                }
                for line in &config.commands {
                    commands.push(self.substitute_variables(&node.id, line));
                }
                fields.insert("commands", literal::string_list(&commands));
                fields.insert("save_config", literal::boolean(config.save_config));
                fields.insert("template", literal::optional_string(config.template_ref.as_deref()));
            }
            StepConfig::CommandExecute(config) => {
                let mut commands = Vec::new();
                if let Some(template_ref) = &config.template_ref {
                    commands.extend(self.template_lines(&node.id, template_ref));
                }
                for line in &config.commands {
                    commands.push(self.substitute_variables(&node.id, line));
                }
                fields.insert("commands", literal::string_list(&commands));
            }
            StepConfig::ConfigBackup(config) => {
                let command = config.command.as_deref().unwrap_or(steps::BACKUP_COMMAND);
                fields.insert("command", literal::string(command));
                fields.insert(
                    "destination",
                    literal::optional_string(config.destination.as_deref()),
                );
            }
            StepConfig::StatusCheck(config) => {
                let command = self.substitute_variables(&node.id, &config.command);
                fields.insert("command", literal::string(&command));
                fields.insert("expect", literal::string(&config.expect));
            }
        }
        fields
    }

    fn connection_fields(
        &mut self,
        node_id: &str,
        config: &DeviceConnectConfig,
        fields: &mut TemplateFields,
    ) {
        let resolver = self.resolver;

        let hosts = match &config.target {
            None => Vec::new(),
            Some(TargetSelector::Host { host }) => vec![host.clone()],
            Some(TargetSelector::DeviceGroup { group_ref }) => match resolver.device_group(group_ref) {
                Some(group) => group.hosts.clone(),
                None => vec![self.unresolved(ResourceKind::DeviceGroup, group_ref, node_id)],
            },
        };
        fields.insert("hosts", literal::string_list(&hosts));
        fields.insert("credential", literal::optional_string(config.credential_ref.as_deref()));

        let Some(credential_ref) = config.credential_ref.as_deref() else {
            for field in ["device_type", "username", "password", "secret", "port", "conn_timeout", "global_delay_factor"] {
                fields.insert(field, literal::none());
            }
            return;
        };

        match resolver.credential(credential_ref) {
            Some(credential) => {
                let redact = self.options.redact_secrets;
                let secret_lookup = |name: &str| {
                    format!("ctx.secret({}, {})", literal::string(credential_ref), literal::string(name))
                };
                fields.insert("device_type", literal::string(&credential.device_type));
                fields.insert("username", literal::string(&credential.username));
                fields.insert(
                    "password",
                    if redact { secret_lookup("password") } else { literal::string(&credential.password) },
                );
                fields.insert(
                    "secret",
                    match &credential.secret {
                        Some(_) if redact => secret_lookup("secret"),
                        Some(secret) => literal::string(secret),
                        None => literal::none(),
                    },
                );
                fields.insert("port", literal::number(credential.port));
                fields.insert("conn_timeout", literal::optional_number(credential.conn_timeout));
                fields.insert(
                    "global_delay_factor",
                    literal::optional_number(credential.global_delay_factor),
                );
            }
            None => {
                let token = literal::string(&self.unresolved(ResourceKind::Credential, credential_ref, node_id));
                for field in ["device_type", "username", "password", "secret", "port"] {
                    fields.insert(field, token.clone());
                }
                fields.insert("conn_timeout", literal::none());
                fields.insert("global_delay_factor", literal::none());
            }
        }
    }

    /// Resolve a template into command lines, with variables filled in
    fn template_lines(&mut self, node_id: &str, template_ref: &str) -> Vec<String> {
        let resolver = self.resolver;
        match resolver.template(template_ref) {
            Some(text) => text
                .lines()
                .map(str::trim_end)
                .filter(|line| !line.is_empty())
                .map(|line| self.substitute_variables(node_id, line))
                .collect(),
            None => vec![self.unresolved(ResourceKind::Template, template_ref, node_id)],
        }
    }

    fn substitute_variables(&mut self, node_id: &str, line: &str) -> String {
        let resolver = self.resolver;
        TOKEN_PATTERN
            .replace_all(line, |captures: &regex::Captures<'_>| {
                let name = &captures[1];
                match resolver.variable(name) {
                    Some(value) => value.to_string(),
                    None => self.unresolved(ResourceKind::Variable, name, node_id),
                }
            })
            .into_owned()
    }

    /// Record an unresolved reference and return its placeholder token
    fn unresolved(&mut self, kind: ResourceKind, id: &str, node_id: &str) -> String {
        let newly_referenced = match self
            .resources
            .iter_mut()
            .find(|r| r.kind == kind && r.id == id)
        {
            Some(resource) if resource.referenced_by.iter().any(|n| n == node_id) => false,
            Some(resource) => {
                resource.referenced_by.push(node_id.to_string());
                true
            }
            None => {
                self.resources.push(ResourceReference {
                    kind,
                    id: id.to_string(),
                    referenced_by: vec![node_id.to_string()],
                });
                true
            }
        };

        if newly_referenced {
            log::warn!("Node '{}' references unresolved {} '{}'", node_id, kind, id);
            self.diagnostics.push(
                ValidationIssue::warning(
                    IssueCode::UnresolvedResource,
                    format!("Node '{}' references unresolved {} '{}'", node_id, kind, id),
                )
                .at_node(node_id),
            );
        }
        placeholder(kind, id)
    }
}

/// Retry and timeout keyword arguments, copied verbatim from the node
fn policy(config: &NodeConfig) -> String {
    let handling = config.error_handling.clone().unwrap_or_default();
    format!(
        "retries={}, retry_interval={}, on_error={}, timeout={}",
        handling.retry_count,
        handling.retry_interval_seconds,
        literal::string(handling.on_error.as_str()),
        literal::optional_number(config.timeout_seconds)
    )
}
