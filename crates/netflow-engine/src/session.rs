//! Editor session: one graph, its history, and the compiler gate
//!
//! An `EditorSession` owns exactly one workflow graph (the snapshot under
//! the history cursor) and the `HistoryStack` behind it. Every successful
//! edit records a new snapshot; a failed edit records nothing and leaves
//! the graph as it was. Sessions are never shared: hand a `&mut` to
//! whichever surface needs to edit.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::compiler::{CompiledScript, ScriptCompiler};
use crate::constants::history;
use crate::error::CompileError;
use crate::events::{EventSink, NullEventSink, SessionEvent};
use crate::graph::{GraphDocument, GraphModel, GraphResult};
use crate::resolve::ResourceResolver;
use crate::types::{EdgeId, Port, WorkflowEdge, WorkflowNode};
use crate::undo::HistoryStack;
use crate::validation::{validate_workflow, Severity, ValidationIssue};

/// State of undo/redo for a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UndoRedoState {
    pub can_undo: bool,
    pub can_redo: bool,
    /// Cursor position in the history
    pub position: usize,
    pub snapshot_count: usize,
}

pub struct EditorSession {
    id: String,
    history: HistoryStack,
    compiler: ScriptCompiler,
    events: Arc<dyn EventSink>,
}

impl EditorSession {
    /// Start a session on `initial` with unbounded history
    pub fn new(initial: GraphModel) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            history: match history::MAX_SNAPSHOTS {
                Some(max) => HistoryStack::with_limit(initial, max),
                None => HistoryStack::new(initial),
            },
            compiler: ScriptCompiler::new(),
            events: Arc::new(NullEventSink),
        }
    }

    /// Start a session from a persisted document
    pub fn open(document: GraphDocument) -> Self {
        Self::new(GraphModel::from_document(document))
    }

    /// Keep at most `max_snapshots` history entries
    pub fn with_history_limit(mut self, max_snapshots: usize) -> Self {
        self.history = HistoryStack::with_limit(self.history.current().clone(), max_snapshots);
        self
    }

    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn with_compiler(mut self, compiler: ScriptCompiler) -> Self {
        self.compiler = compiler;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// The current graph
    pub fn graph(&self) -> &GraphModel {
        self.history.current()
    }

    /// The current graph in its persistence shape
    pub fn document(&self) -> GraphDocument {
        self.graph().to_document()
    }

    pub fn add_node(&mut self, node: WorkflowNode) -> GraphResult<()> {
        self.apply("add_node", |graph| graph.add_node(node))
    }

    /// Remove a node together with every edge attached to it
    pub fn remove_node(&mut self, id: &str) -> GraphResult<()> {
        self.apply("remove_node", |graph| graph.remove_node(id))
    }

    pub fn add_edge(&mut self, edge: WorkflowEdge) -> GraphResult<()> {
        self.apply("add_edge", |graph| graph.add_edge(edge))
    }

    /// Connect two nodes under a freshly minted edge id
    pub fn connect(
        &mut self,
        source: &str,
        target: &str,
        port: Option<Port>,
    ) -> GraphResult<EdgeId> {
        let id = Uuid::new_v4().to_string();
        let mut edge = WorkflowEdge::new(id.clone(), source, target);
        edge.source_port = port;
        self.add_edge(edge)?;
        Ok(id)
    }

    pub fn remove_edge(&mut self, id: &str) -> GraphResult<()> {
        self.apply("remove_edge", |graph| graph.remove_edge(id))
    }

    /// Shallow-merge `patch` into a node's config
    pub fn update_node_config(&mut self, id: &str, patch: &serde_json::Value) -> GraphResult<()> {
        self.apply("update_node_config", |graph| graph.update_node_config(id, patch))
    }

    pub fn move_node(&mut self, id: &str, position: (f64, f64)) -> GraphResult<()> {
        self.apply("move_node", |graph| graph.move_node(id, position))
    }

    pub fn rename_node(&mut self, id: &str, label: &str) -> GraphResult<()> {
        self.apply("rename_node", |graph| graph.rename_node(id, label))
    }

    /// Step back one edit. Returns false when there is nothing to undo.
    pub fn undo(&mut self) -> bool {
        if self.history.undo().is_none() {
            return false;
        }
        log::debug!("Session {}: undo to snapshot {}", self.id, self.history.position());
        self.notify_changed();
        true
    }

    /// Step forward one edit. Returns false when there is nothing to redo.
    pub fn redo(&mut self) -> bool {
        if self.history.redo().is_none() {
            return false;
        }
        log::debug!("Session {}: redo to snapshot {}", self.id, self.history.position());
        self.notify_changed();
        true
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn undo_redo_state(&self) -> UndoRedoState {
        UndoRedoState {
            can_undo: self.history.can_undo(),
            can_redo: self.history.can_redo(),
            position: self.history.position(),
            snapshot_count: self.history.len(),
        }
    }

    /// Validate the current graph
    pub fn validate(&self) -> Vec<ValidationIssue> {
        let issues = validate_workflow(self.graph());
        let count = |severity: Severity| issues.iter().filter(|i| i.severity == severity).count();
        self.emit(SessionEvent::Validated {
            error_count: count(Severity::Error),
            warning_count: count(Severity::Warning),
            info_count: count(Severity::Info),
        });
        issues
    }

    /// Compile the current graph; refused while validation reports errors
    pub fn compile(&self, resolver: &dyn ResourceResolver) -> Result<CompiledScript, CompileError> {
        match self.compiler.compile(self.graph(), resolver) {
            Ok(script) => {
                self.emit(SessionEvent::Compiled {
                    step_count: script.steps.len(),
                    unresolved_count: script.resources.len(),
                });
                Ok(script)
            }
            Err(e) => {
                self.emit(SessionEvent::CompileFailed {
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Run a model mutation and record its result
    fn apply(
        &mut self,
        operation: &str,
        mutate: impl FnOnce(&GraphModel) -> GraphResult<GraphModel>,
    ) -> GraphResult<()> {
        let next = mutate(self.graph()).map_err(|e| {
            log::debug!("Session {}: {} rejected: {}", self.id, operation, e);
            e
        })?;
        self.history.record(next);
        log::debug!(
            "Session {}: {} recorded snapshot {}",
            self.id,
            operation,
            self.history.position()
        );
        self.notify_changed();
        Ok(())
    }

    fn notify_changed(&self) {
        let graph = self.graph();
        self.emit(SessionEvent::GraphChanged {
            can_undo: self.history.can_undo(),
            can_redo: self.history.can_redo(),
            node_count: graph.nodes().len(),
            edge_count: graph.edges().len(),
        });
    }

    fn emit(&self, event: SessionEvent) {
        if let Err(e) = self.events.send(event) {
            log::warn!("Session {}: failed to send event: {}", self.id, e);
        }
    }
}

impl Default for EditorSession {
    fn default() -> Self {
        Self::new(GraphModel::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::VecEventSink;
    use crate::error::GraphError;
    use crate::resolve::ResolvedConfig;
    use crate::types::NodeKind;

    fn node(id: &str, kind: NodeKind) -> WorkflowNode {
        WorkflowNode::new(id, kind, (0.0, 0.0))
    }

    #[test]
    fn test_edits_record_history() {
        let mut session = EditorSession::default();
        session.add_node(node("start", NodeKind::Start)).unwrap();
        session.add_node(node("end", NodeKind::End)).unwrap();
        let edge_id = session.connect("start", "end", None).unwrap();

        assert_eq!(session.graph().edges().len(), 1);
        assert_eq!(session.graph().edges()[0].id, edge_id);
        assert_eq!(session.undo_redo_state().snapshot_count, 4);

        assert!(session.undo());
        assert!(session.graph().edges().is_empty());
        assert!(session.redo());
        assert_eq!(session.graph().edges().len(), 1);
        assert!(!session.redo());
    }

    #[test]
    fn test_failed_edit_records_nothing() {
        let mut session = EditorSession::default();
        session.add_node(node("a", NodeKind::Task)).unwrap();
        let before = session.graph().clone();

        let err = session.add_node(node("a", NodeKind::Task)).unwrap_err();
        assert_eq!(err, GraphError::DuplicateId { id: "a".to_string() });
        assert!(session.connect("a", "ghost", None).is_err());
        assert_eq!(session.graph(), &before);
        assert_eq!(session.undo_redo_state().snapshot_count, 2);
    }

    #[test]
    fn test_undo_to_initial() {
        let mut session = EditorSession::default();
        for i in 0..5 {
            session.add_node(node(&format!("n{}", i), NodeKind::Task)).unwrap();
        }
        while session.undo() {}
        assert!(session.graph().is_empty());
        assert!(!session.can_undo());
    }

    #[test]
    fn test_events() {
        let sink = Arc::new(VecEventSink::new());
        let mut session = EditorSession::default().with_event_sink(sink.clone());

        session.add_node(node("start", NodeKind::Start)).unwrap();
        session.undo();
        session.validate();

        let events = sink.events();
        assert_eq!(
            events,
            vec![
                SessionEvent::GraphChanged {
                    can_undo: true,
                    can_redo: false,
                    node_count: 1,
                    edge_count: 0,
                },
                SessionEvent::GraphChanged {
                    can_undo: false,
                    can_redo: true,
                    node_count: 0,
                    edge_count: 0,
                },
                SessionEvent::Validated {
                    error_count: 2,
                    warning_count: 0,
                    info_count: 0,
                },
            ]
        );
    }

    struct ClosedSink;

    impl EventSink for ClosedSink {
        fn send(&self, _event: SessionEvent) -> Result<(), crate::events::EventError> {
            Err(crate::events::EventError {
                message: "receiver dropped".to_string(),
            })
        }
    }

    #[test]
    fn test_failing_sink_does_not_block_edits() {
        let mut session = EditorSession::default().with_event_sink(Arc::new(ClosedSink));
        session.add_node(node("start", NodeKind::Start)).unwrap();
        assert!(session.undo());
        assert!(session.graph().is_empty());
    }

    #[test]
    fn test_events_after_clear() {
        let sink = Arc::new(VecEventSink::new());
        let mut session = EditorSession::default().with_event_sink(sink.clone());
        session.add_node(node("a", NodeKind::Task)).unwrap();
        sink.clear();

        assert!(!session.redo());
        assert!(sink.events().is_empty());
        session.rename_node("a", "Reload").unwrap();
        assert_eq!(sink.events().len(), 1);
    }

    #[test]
    fn test_compile_gate() {
        let sink = Arc::new(VecEventSink::new());
        let mut session = EditorSession::default().with_event_sink(sink.clone());
        assert!(matches!(
            session.compile(&ResolvedConfig::new()),
            Err(CompileError::NotCompilable { .. })
        ));

        session.add_node(node("start", NodeKind::Start)).unwrap();
        session.add_node(node("end", NodeKind::End)).unwrap();
        session.connect("start", "end", None).unwrap();
        let script = session.compile(&ResolvedConfig::new()).unwrap();
        assert_eq!(script.steps.len(), 2);
        assert_eq!(
            sink.events().last(),
            Some(&SessionEvent::Compiled {
                step_count: 2,
                unresolved_count: 0,
            })
        );
    }

    #[test]
    fn test_history_limit() {
        let mut session = EditorSession::default().with_history_limit(3);
        for i in 0..5 {
            session.add_node(node(&format!("n{}", i), NodeKind::Task)).unwrap();
        }
        assert_eq!(session.undo_redo_state().snapshot_count, 3);
        assert!(session.undo());
        assert!(session.undo());
        assert!(!session.undo());
        assert_eq!(session.graph().nodes().len(), 3);
    }

    #[test]
    fn test_open_document_roundtrip() {
        let mut session = EditorSession::default();
        session.add_node(node("start", NodeKind::Start)).unwrap();
        session.update_node_config("start", &serde_json::json!({"timeoutSeconds": 5})).unwrap();
        let reopened = EditorSession::open(session.document());
        assert_eq!(reopened.graph(), session.graph());
        assert!(!reopened.can_undo());
    }
}
