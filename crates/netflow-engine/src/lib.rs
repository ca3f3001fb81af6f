//! Netflow Engine - visual network-automation workflows
//!
//! This crate holds the core of a small visual-programming system for
//! network automation: an operator composes a procedure as a graph of typed
//! steps (connect, deploy, execute, check, branch, loop) and the engine
//! turns the graph into a script for a separate runner. It provides:
//!
//! - An immutable graph model whose edits return new snapshots
//! - Linear undo/redo over those snapshots
//! - Ordered, deterministic structural validation
//! - A template-driven compiler with an unresolved-resource manifest
//!
//! # Architecture
//!
//! - `GraphModel`: nodes and edges behind `Arc`, cheap to snapshot
//! - `HistoryStack`: snapshots plus a cursor
//! - `EditorSession`: owns one graph and its history, gates compilation
//! - `ScriptCompiler`: walks every path from `start`, renders per-kind templates
//! - `WorkflowStore`: saved graph documents with optional JSON persistence
//!
//! Nothing here talks to devices; the generated script does, later.
//!
//! # Example
//!
//! ```ignore
//! use netflow_engine::{ResolvedConfig, ScriptCompiler, WorkflowBuilder};
//!
//! let graph = WorkflowBuilder::new()
//!     .add_start("start")
//!     .add_end("end")
//!     .connect("start", "end")
//!     .build();
//! let script = ScriptCompiler::new().compile(&graph, &ResolvedConfig::new())?;
//! println!("{}", script.render(&Default::default()));
//! ```

pub mod builder;
pub mod compiler;
pub mod constants;
pub mod error;
pub mod events;
pub mod graph;
pub mod options;
pub mod resolve;
pub mod session;
pub mod store;
pub mod templates;
pub mod types;
pub mod undo;
pub mod validation;

// Re-export key types
pub use builder::WorkflowBuilder;
pub use compiler::{
    placeholder, CompiledScript, CompiledStep, ResourceKind, ResourceReference, ScriptCompiler,
    ScriptCompilerBuilder,
};
pub use error::{CompileError, GraphError, NetflowError, Result};
pub use events::{EventError, EventSink, NullEventSink, SessionEvent, VecEventSink};
pub use graph::{GraphDocument, GraphModel, GraphResult};
pub use options::CompilerOptions;
pub use resolve::{Credential, DeviceGroup, ResolvedConfig, ResourceResolver};
pub use session::{EditorSession, UndoRedoState};
pub use store::{StoredWorkflow, WorkflowMetadata, WorkflowStore};
pub use templates::TemplateTable;
pub use types::{
    EdgeId, ErrorHandling, NodeConfig, NodeId, NodeKind, OnError, Port, StepConfig,
    TargetSelector, WorkflowEdge, WorkflowNode,
};
pub use undo::HistoryStack;
pub use validation::{has_errors, validate_workflow, IssueCode, Severity, ValidationIssue};
