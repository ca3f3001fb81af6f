//! Engine-wide constants
//!
//! Single source of truth for compiler defaults and placeholder syntax.

/// Defaults for generated scripts
pub mod script {
    /// Spaces per indentation level
    pub const INDENT_WIDTH: usize = 4;
    /// Name of the generated entry-point function
    pub const FUNCTION_NAME: &str = "run_workflow";
    /// Module the generated script imports its runtime from
    pub const RUNTIME_MODULE: &str = "netflow_runtime";
    /// First line of every generated script
    pub const HEADER_COMMENT: &str = "Generated by netflow. Do not edit by hand.";
    /// Upper bound on steps emitted by one compile (paths are expanded per branch)
    pub const MAX_EMITTED_STEPS: usize = 10_000;
    /// Upper bound on the bytes of text across all emitted steps
    pub const MAX_EMITTED_BYTES: usize = 16 * 1024 * 1024;
    /// Deepest branch body; the function body is level 0
    pub const MAX_NESTING_DEPTH: usize = 64;
}

/// Placeholder tokens for unresolved references
pub mod placeholders {
    /// Prefix of the token left where a resolved value was expected
    pub const PREFIX: &str = "<<unresolved:";
    /// Suffix closing the token
    pub const SUFFIX: &str = ">>";
}

/// Defaults for step configuration
pub mod steps {
    /// Command used by `configBackup` when none is configured
    pub const BACKUP_COMMAND: &str = "show running-config";
    /// SSH port assumed when a credential does not name one
    pub const DEVICE_PORT: u16 = 22;
}

/// Edit history limits
pub mod history {
    /// Snapshot limit for new sessions; `None` keeps every snapshot
    pub const MAX_SNAPSHOTS: Option<usize> = None;
}

/// Workflow store layout
pub mod store {
    /// File extension of persisted graph documents
    pub const EXTENSION: &str = "json";
}
