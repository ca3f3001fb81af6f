//! Per-kind text templates for generated steps
//!
//! Each node kind has one template. `{{field}}` tokens are replaced with
//! values the compiler prepares for that kind; every value is already a
//! complete script expression (quoted string, list, number, `None`), except
//! `policy` which expands to the retry/timeout keyword arguments.
//!
//! Templates for `condition`, `loop` and `statusCheck` are block headers:
//! the compiler nests the branch bodies under them.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::error::CompileError;
use crate::types::NodeKind;

/// Matches `{{name}}` tokens, allowing inner whitespace
pub(crate) static TOKEN_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}")
        .unwrap_or_else(|e| panic!("Static regex TOKEN_PATTERN failed to compile: {}", e))
});

/// Fields every kind provides
const COMMON_FIELDS: &[&str] = &["id", "label", "policy"];

/// Fields a template for `kind` may reference, beyond [`COMMON_FIELDS`]
pub fn kind_fields(kind: NodeKind) -> &'static [&'static str] {
    match kind {
        NodeKind::Start | NodeKind::End => &[],
        NodeKind::Task => &["action", "description"],
        NodeKind::Condition => &["expression"],
        NodeKind::Loop => &["max_iterations", "until"],
        NodeKind::DeviceConnect => &[
            "credential",
            "hosts",
            "device_type",
            "username",
            "password",
            "secret",
            "port",
            "conn_timeout",
            "global_delay_factor",
        ],
        NodeKind::ConfigDeploy => &["commands", "save_config", "template"],
        NodeKind::CommandExecute => &["commands"],
        NodeKind::ConfigBackup => &["command", "destination"],
        NodeKind::StatusCheck => &["command", "expect"],
    }
}

/// Whether a template for `kind` may reference `field`
pub fn is_known_field(kind: NodeKind, field: &str) -> bool {
    COMMON_FIELDS.contains(&field) || kind_fields(kind).contains(&field)
}

fn default_template(kind: NodeKind) -> &'static str {
    match kind {
        NodeKind::Start => "ctx.begin({{id}})",
        NodeKind::End => "ctx.finish({{id}})",
        NodeKind::Task => "ctx.run_task({{id}}, action={{action}}, {{policy}})",
        NodeKind::Condition => "if ctx.evaluate({{id}}, {{expression}}):",
        NodeKind::Loop => {
            "for iteration in ctx.iterations({{id}}, max_iterations={{max_iterations}}, until={{until}}):"
        }
        NodeKind::DeviceConnect => concat!(
            "ctx.connect(\n",
            "    {{id}},\n",
            "    hosts={{hosts}},\n",
            "    device_type={{device_type}},\n",
            "    username={{username}},\n",
            "    password={{password}},\n",
            "    secret={{secret}},\n",
            "    port={{port}},\n",
            "    conn_timeout={{conn_timeout}},\n",
            "    global_delay_factor={{global_delay_factor}},\n",
            "    {{policy}},\n",
            ")"
        ),
        NodeKind::ConfigDeploy => {
            "ctx.deploy_config({{id}}, commands={{commands}}, save_config={{save_config}}, {{policy}})"
        }
        NodeKind::CommandExecute => "ctx.execute({{id}}, commands={{commands}}, {{policy}})",
        NodeKind::ConfigBackup => {
            "ctx.backup_config({{id}}, command={{command}}, destination={{destination}}, {{policy}})"
        }
        NodeKind::StatusCheck => {
            "if ctx.check_status({{id}}, command={{command}}, expect={{expect}}, {{policy}}):"
        }
    }
}

/// Values for one step's template, keyed by field name
pub type TemplateFields = BTreeMap<&'static str, String>;

/// The template-per-kind table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateTable {
    templates: BTreeMap<NodeKind, String>,
}

impl Default for TemplateTable {
    fn default() -> Self {
        let templates = NodeKind::ALL
            .iter()
            .map(|kind| (*kind, default_template(*kind).to_string()))
            .collect();
        Self { templates }
    }
}

impl TemplateTable {
    /// Replace the template for `kind`.
    ///
    /// Fails if the text references a field `kind` does not provide; the
    /// table is left unchanged in that case.
    pub fn set(&mut self, kind: NodeKind, text: impl Into<String>) -> Result<(), CompileError> {
        let text = text.into();
        for captures in TOKEN_PATTERN.captures_iter(&text) {
            let field = &captures[1];
            if !is_known_field(kind, field) {
                return Err(CompileError::UnknownTemplateField {
                    kind,
                    field: field.to_string(),
                });
            }
        }
        self.templates.insert(kind, text);
        Ok(())
    }

    pub fn get(&self, kind: NodeKind) -> &str {
        self.templates
            .get(&kind)
            .map(String::as_str)
            .unwrap_or_else(|| default_template(kind))
    }

    /// Substitute `fields` into the template for `kind`.
    ///
    /// Substituted values are not scanned again, so a value containing
    /// `{{...}}` is emitted as-is.
    pub fn render(&self, kind: NodeKind, fields: &TemplateFields) -> String {
        TOKEN_PATTERN
            .replace_all(self.get(kind), |captures: &Captures<'_>| {
                fields.get(&captures[1]).cloned().unwrap_or_default()
            })
            .into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_only_use_known_fields() {
        let table = TemplateTable::default();
        for kind in NodeKind::ALL {
            for captures in TOKEN_PATTERN.captures_iter(table.get(kind)) {
                assert!(
                    is_known_field(kind, &captures[1]),
                    "default {} template uses unknown field {}",
                    kind,
                    &captures[1]
                );
            }
        }
    }

    #[test]
    fn test_branching_templates_are_headers() {
        let table = TemplateTable::default();
        for kind in NodeKind::ALL.into_iter().filter(NodeKind::is_branching) {
            assert!(table.get(kind).ends_with(':'), "{} template is not a block header", kind);
        }
    }

    #[test]
    fn test_render_substitutes_fields() {
        let table = TemplateTable::default();
        let mut fields = TemplateFields::new();
        fields.insert("id", "\"done\"".to_string());
        assert_eq!(table.render(NodeKind::End, &fields), "ctx.finish(\"done\")");
    }

    #[test]
    fn test_render_does_not_rescan_values() {
        let mut table = TemplateTable::default();
        table.set(NodeKind::CommandExecute, "run({{ commands }})").unwrap();
        let mut fields = TemplateFields::new();
        fields.insert("commands", "[\"echo {{id}}\"]".to_string());
        fields.insert("id", "\"x\"".to_string());
        assert_eq!(
            table.render(NodeKind::CommandExecute, &fields),
            "run([\"echo {{id}}\"])"
        );
    }

    #[test]
    fn test_set_rejects_unknown_field() {
        let mut table = TemplateTable::default();
        let err = table
            .set(NodeKind::ConfigBackup, "backup({{hosts}})")
            .unwrap_err();
        assert!(matches!(
            err,
            CompileError::UnknownTemplateField { kind: NodeKind::ConfigBackup, ref field } if field == "hosts"
        ));
        assert_eq!(table, TemplateTable::default());
    }
}
