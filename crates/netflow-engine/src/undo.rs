//! Undo/redo over graph snapshots
//!
//! History is a linear list of immutable `GraphModel` snapshots plus a
//! cursor. Recording after an undo truncates the redo tail; branching
//! redo trees are not kept.
//!
//! # Design Choice: Snapshots vs Command Pattern
//!
//! Mutations never need an inverse operation: every edit already yields a
//! whole new model, and models share unchanged halves through `Arc`, so a
//! snapshot costs two pointer copies.

use std::collections::VecDeque;

use crate::graph::GraphModel;

/// Undo/redo stack of graph snapshots
#[derive(Debug, Clone)]
pub struct HistoryStack {
    /// Snapshots, oldest first
    snapshots: VecDeque<GraphModel>,
    /// Current position in the stack
    current: usize,
    /// Maximum number of snapshots to keep; `None` keeps everything
    max_snapshots: Option<usize>,
}

impl HistoryStack {
    /// Create an unbounded stack holding the initial graph
    pub fn new(initial: GraphModel) -> Self {
        let mut snapshots = VecDeque::new();
        snapshots.push_back(initial);
        Self {
            snapshots,
            current: 0,
            max_snapshots: None,
        }
    }

    /// Create a stack that evicts the oldest snapshot beyond `max_snapshots`
    pub fn with_limit(initial: GraphModel, max_snapshots: usize) -> Self {
        Self {
            max_snapshots: Some(max_snapshots.max(1)), // At least 1 snapshot
            ..Self::new(initial)
        }
    }

    /// Record a snapshot after the cursor.
    ///
    /// This truncates any redo history (snapshots after current position).
    pub fn record(&mut self, snapshot: GraphModel) {
        self.snapshots.truncate(self.current + 1);
        self.snapshots.push_back(snapshot);
        self.current = self.snapshots.len() - 1;

        if let Some(max) = self.max_snapshots {
            while self.snapshots.len() > max {
                self.snapshots.pop_front();
                self.current = self.current.saturating_sub(1);
            }
        }
    }

    /// Undo: move back one snapshot
    ///
    /// Returns the previous graph state, or None if at the beginning.
    pub fn undo(&mut self) -> Option<&GraphModel> {
        if self.current > 0 {
            self.current -= 1;
            self.snapshots.get(self.current)
        } else {
            None
        }
    }

    /// Redo: move forward one snapshot
    ///
    /// Returns the next graph state, or None if at the end.
    pub fn redo(&mut self) -> Option<&GraphModel> {
        if self.current + 1 < self.snapshots.len() {
            self.current += 1;
            self.snapshots.get(self.current)
        } else {
            None
        }
    }

    /// The snapshot under the cursor
    pub fn current(&self) -> &GraphModel {
        // The stack is created with one snapshot and never shrinks below it
        &self.snapshots[self.current]
    }

    /// Check if undo is available
    pub fn can_undo(&self) -> bool {
        self.current > 0
    }

    /// Check if redo is available
    pub fn can_redo(&self) -> bool {
        self.current + 1 < self.snapshots.len()
    }

    /// Cursor position, 0 being the oldest kept snapshot
    pub fn position(&self) -> usize {
        self.current
    }

    /// Get the number of snapshots
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Drop all history, keeping only the current snapshot
    pub fn clear(&mut self) {
        let current = self.current().clone();
        self.snapshots.clear();
        self.snapshots.push_back(current);
        self.current = 0;
    }
}

impl Default for HistoryStack {
    fn default() -> Self {
        Self::new(GraphModel::new())
    }
}
