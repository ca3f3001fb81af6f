//! Compiler options
//!
//! Every field has a default from [`crate::constants`], so an options file
//! only needs the keys it changes.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants::script;
use crate::error::Result;

/// Options controlling generated script text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompilerOptions {
    /// Spaces per indentation level
    pub indent_width: usize,
    /// Name of the generated entry-point function
    pub function_name: String,
    /// Module the script imports its runtime from
    pub runtime_module: String,
    /// Comment placed on the first line; empty for none
    pub header_comment: String,
    /// Emit credential passwords and secrets as runtime lookups instead of literals
    pub redact_secrets: bool,
    /// Upper bound on emitted steps
    pub max_emitted_steps: usize,
    /// Upper bound on bytes of emitted step text
    pub max_emitted_bytes: usize,
    pub max_nesting_depth: usize,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            indent_width: script::INDENT_WIDTH,
            function_name: script::FUNCTION_NAME.to_string(),
            runtime_module: script::RUNTIME_MODULE.to_string(),
            header_comment: script::HEADER_COMMENT.to_string(),
            redact_secrets: false,
            max_emitted_steps: script::MAX_EMITTED_STEPS,
            max_emitted_bytes: script::MAX_EMITTED_BYTES,
            max_nesting_depth: script::MAX_NESTING_DEPTH,
        }
    }
}

impl CompilerOptions {
    /// Load options from a JSON file; missing keys keep their defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let options = serde_json::from_str(&content)?;
        log::debug!("Loaded compiler options from {:?}", path.as_ref());
        Ok(options)
    }

    /// One level of indentation
    pub fn indent(&self) -> String {
        " ".repeat(self.indent_width)
    }
}
