//! Graph-to-script compiler
//!
//! `ScriptCompiler::compile` turns a valid workflow graph into an ordered
//! list of script steps plus a manifest of the external resources the
//! caller could not resolve.
//!
//! # Pipeline
//!
//! 1. Re-validate the graph; any error-severity finding refuses compilation
//!    with [`CompileError::NotCompilable`] carrying the full finding list.
//! 2. Walk every path from the start node (see `walk`), nesting branch
//!    bodies under their `condition`/`loop`/`statusCheck` headers.
//! 3. Render each node through the template table. Unresolved references
//!    become placeholder tokens plus `resources` entries, never errors.
//!
//! Output is a pure function of `(graph, resolver, templates, options)`:
//! no timestamps, no random ids, and only insertion-ordered collections.

mod literal;
mod walk;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::placeholders;
use crate::error::CompileError;
use crate::graph::GraphModel;
use crate::options::CompilerOptions;
use crate::resolve::ResourceResolver;
use crate::templates::TemplateTable;
use crate::types::{NodeId, NodeKind};
use crate::validation::{has_errors, validate_workflow, ValidationIssue};

use walk::{TextBudget, Walker};

/// What kind of external entity a reference names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Credential,
    DeviceGroup,
    Template,
    Variable,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Credential => "credential",
            ResourceKind::DeviceGroup => "device_group",
            ResourceKind::Template => "template",
            ResourceKind::Variable => "variable",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Token left in emitted text where a resolved value was expected
pub fn placeholder(kind: ResourceKind, id: &str) -> String {
    format!("{}{}:{}{}", placeholders::PREFIX, kind, id, placeholders::SUFFIX)
}

/// An external entity the execution environment must still supply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceReference {
    pub kind: ResourceKind,
    pub id: String,
    /// Nodes that reference it, in first-encounter order
    pub referenced_by: Vec<NodeId>,
}

/// One emitted step, traceable to its node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledStep {
    pub node_id: NodeId,
    /// Step text, relative to its own nesting level. Block steps include
    /// their nested bodies.
    pub emitted_text: String,
    /// The step this one follows on its path (empty for the start node)
    pub depends_on: Vec<NodeId>,
    /// Nesting level under branch headers; 0 is the function body
    pub depth: usize,
}

/// The compiler's output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledScript {
    /// All steps in preorder: each block step precedes the steps nested in it
    pub steps: Vec<CompiledStep>,
    /// Unresolved references, deduplicated per kind and id
    pub resources: Vec<ResourceReference>,
    /// Warnings raised while compiling (unresolved references, truncated paths)
    pub diagnostics: Vec<ValidationIssue>,
}

impl CompiledScript {
    /// Steps directly in the function body
    pub fn top_level_steps(&self) -> impl Iterator<Item = &CompiledStep> {
        self.steps.iter().filter(|s| s.depth == 0)
    }

    /// Every emission of a node (one per path that reaches it)
    pub fn steps_for<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a CompiledStep> + 'a {
        self.steps.iter().filter(move |s| s.node_id == node_id)
    }

    pub fn is_fully_resolved(&self) -> bool {
        self.resources.is_empty()
    }

    /// Render the complete script
    ///
    /// `options` should be the ones the script was compiled with; nested
    /// bodies were indented at compile time.
    pub fn render(&self, options: &CompilerOptions) -> String {
        let indent = options.indent();
        let mut out = String::new();

        if !options.header_comment.is_empty() {
            for line in options.header_comment.lines() {
                out.push_str(&format!("# {}\n", line));
            }
            out.push('\n');
        }
        out.push_str(&format!("from {} import StepFailed\n\n\n", options.runtime_module));
        out.push_str(&format!("def {}(ctx):\n", options.function_name));
        for step in self.top_level_steps() {
            for line in step.emitted_text.lines() {
                if !line.is_empty() {
                    out.push_str(&indent);
                    out.push_str(line);
                }
                out.push('\n');
            }
        }
        out.push_str(&format!("{}return ctx\n", indent));
        out
    }
}

/// Builder for a compiler with custom templates or options
#[derive(Debug, Default)]
pub struct ScriptCompilerBuilder {
    templates: Vec<(NodeKind, String)>,
    options: CompilerOptions,
}

impl ScriptCompilerBuilder {
    /// Override the template for one kind
    pub fn with_template(mut self, kind: NodeKind, text: impl Into<String>) -> Self {
        self.templates.push((kind, text.into()));
        self
    }

    pub fn with_options(mut self, options: CompilerOptions) -> Self {
        self.options = options;
        self
    }

    /// Fails if a template references a field its kind does not provide
    pub fn build(self) -> Result<ScriptCompiler, CompileError> {
        let mut table = TemplateTable::default();
        for (kind, text) in self.templates {
            table.set(kind, text)?;
        }
        Ok(ScriptCompiler {
            templates: table,
            options: self.options,
        })
    }
}

/// Compiles validated workflow graphs into runner scripts
#[derive(Debug, Clone, Default)]
pub struct ScriptCompiler {
    templates: TemplateTable,
    options: CompilerOptions,
}

impl ScriptCompiler {
    /// A compiler with the default templates and options
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> ScriptCompilerBuilder {
        ScriptCompilerBuilder::default()
    }

    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    pub fn templates(&self) -> &TemplateTable {
        &self.templates
    }

    /// Compile `graph`, substituting values from `resolver`
    pub fn compile(
        &self,
        graph: &GraphModel,
        resolver: &dyn ResourceResolver,
    ) -> Result<CompiledScript, CompileError> {
        let issues = validate_workflow(graph);
        if has_errors(&issues) {
            log::info!(
                "Refusing to compile: {} validation error(s)",
                issues.iter().filter(|i| i.is_error()).count()
            );
            return Err(CompileError::NotCompilable { issues });
        }
        let Some(start) = graph.nodes_of_kind(NodeKind::Start).next() else {
            return Err(CompileError::NotCompilable { issues });
        };

        let output = Walker::new(graph, resolver, &self.templates, &self.options).run(start)?;

        let indent = self.options.indent();
        let mut budget = TextBudget::new(self.options.max_emitted_bytes);
        let mut steps = Vec::new();
        for fragment in &output.fragments {
            fragment.flatten_into(&indent, &mut budget, &mut steps)?;
        }

        log::info!(
            "Compiled {} node(s) into {} step(s), {} unresolved resource(s)",
            graph.nodes().len(),
            steps.len(),
            output.resources.len()
        );
        Ok(CompiledScript {
            steps,
            resources: output.resources,
            diagnostics: output.diagnostics,
        })
    }

    /// Compile and render in one go
    pub fn compile_to_string(
        &self,
        graph: &GraphModel,
        resolver: &dyn ResourceResolver,
    ) -> Result<String, CompileError> {
        Ok(self.compile(graph, resolver)?.render(&self.options))
    }
}
