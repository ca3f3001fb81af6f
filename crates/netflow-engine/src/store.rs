//! Workflow storage with file persistence.
//!
//! Saved workflows are graph documents plus a name and description. The
//! store keeps them in memory and optionally mirrors each one to a JSON
//! file named after its id. History is never persisted, only the graph.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants::store;
use crate::error::Result;
use crate::graph::{GraphDocument, GraphModel};

/// A saved workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredWorkflow {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub graph: GraphDocument,
}

impl StoredWorkflow {
    pub fn new(id: impl Into<String>, name: impl Into<String>, graph: &GraphModel) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            graph: graph.to_document(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// The stored graph as a model
    pub fn model(&self) -> GraphModel {
        GraphModel::from_document(self.graph.clone())
    }
}

/// Metadata for a saved workflow (for listing).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowMetadata {
    pub id: String,
    pub name: String,
    pub description: String,
    pub node_count: usize,
    pub edge_count: usize,
}

/// In-memory workflow store with optional file persistence.
///
/// # Example
///
/// ```ignore
/// use netflow_engine::WorkflowStore;
///
/// let mut store = WorkflowStore::with_persistence(".netflow/workflows");
/// let count = store.load_from_disk()?;
/// store.insert(StoredWorkflow::new("core-upgrade", "Core upgrade", session.graph()))?;
/// ```
#[derive(Debug, Default)]
pub struct WorkflowStore {
    /// Stored workflows, keyed by ID.
    workflows: BTreeMap<String, StoredWorkflow>,
    /// Optional path for file persistence.
    persist_path: Option<PathBuf>,
}

impl WorkflowStore {
    /// Create a new in-memory store without persistence.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that persists to the given directory.
    ///
    /// The directory will be created if it doesn't exist when saving.
    pub fn with_persistence(path: impl AsRef<Path>) -> Self {
        Self {
            workflows: BTreeMap::new(),
            persist_path: Some(path.as_ref().to_path_buf()),
        }
    }

    /// Load all workflows from the persistence directory.
    ///
    /// Unreadable files are skipped with a warning. Returns the number of
    /// workflows loaded.
    pub fn load_from_disk(&mut self) -> Result<usize> {
        let Some(ref path) = self.persist_path else {
            return Ok(0);
        };

        if !path.exists() {
            return Ok(0);
        }

        let mut count = 0;
        for entry in std::fs::read_dir(path)? {
            let file_path = entry?.path();
            if file_path.extension().map_or(true, |e| e != store::EXTENSION) {
                continue;
            }

            let content = match std::fs::read_to_string(&file_path) {
                Ok(content) => content,
                Err(e) => {
                    log::warn!("Failed to read workflow from {:?}: {}", file_path, e);
                    continue;
                }
            };
            match serde_json::from_str::<StoredWorkflow>(&content) {
                Ok(workflow) => {
                    log::info!("Loaded workflow '{}' from {:?}", workflow.id, file_path);
                    self.workflows.insert(workflow.id.clone(), workflow);
                    count += 1;
                }
                Err(e) => {
                    log::warn!("Failed to parse workflow from {:?}: {}", file_path, e);
                }
            }
        }
        Ok(count)
    }

    fn file_path(&self, id: &str) -> Option<Result<PathBuf>> {
        let path = self.persist_path.as_ref()?;
        if id.is_empty() || id.contains(['/', '\\']) || id.starts_with('.') {
            return Some(Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("workflow id '{}' is not usable as a file name", id),
            )
            .into()));
        }
        Some(Ok(path.join(format!("{}.{}", id, store::EXTENSION))))
    }

    /// Save a workflow to disk (if persistence is enabled).
    fn save_to_disk(&self, workflow: &StoredWorkflow) -> Result<()> {
        let Some(file_path) = self.file_path(&workflow.id).transpose()? else {
            return Ok(());
        };
        if let Some(dir) = file_path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let content = serde_json::to_string_pretty(workflow)?;
        std::fs::write(&file_path, content)?;
        log::debug!("Saved workflow '{}' to {:?}", workflow.id, file_path);
        Ok(())
    }

    /// Delete a workflow from disk (if persistence is enabled).
    fn delete_from_disk(&self, id: &str) -> Result<()> {
        let Some(file_path) = self.file_path(id).transpose()? else {
            return Ok(());
        };
        if file_path.exists() {
            std::fs::remove_file(&file_path)?;
            log::debug!("Deleted workflow '{}' from {:?}", id, file_path);
        }
        Ok(())
    }

    /// Get a workflow by ID.
    pub fn get(&self, id: &str) -> Option<&StoredWorkflow> {
        self.workflows.get(id)
    }

    /// Insert or replace a workflow.
    ///
    /// The workflow is persisted first; on a write failure the store is
    /// left unchanged.
    pub fn insert(&mut self, workflow: StoredWorkflow) -> Result<()> {
        self.save_to_disk(&workflow)?;
        self.workflows.insert(workflow.id.clone(), workflow);
        Ok(())
    }

    /// Remove a workflow by ID.
    ///
    /// Returns the removed workflow if it existed.
    pub fn remove(&mut self, id: &str) -> Result<Option<StoredWorkflow>> {
        self.delete_from_disk(id)?;
        Ok(self.workflows.remove(id))
    }

    /// List all workflows, ordered by ID.
    pub fn list(&self) -> Vec<WorkflowMetadata> {
        self.workflows
            .values()
            .map(|w| WorkflowMetadata {
                id: w.id.clone(),
                name: w.name.clone(),
                description: w.description.clone(),
                node_count: w.graph.nodes.len(),
                edge_count: w.graph.edges.len(),
            })
            .collect()
    }

    /// Check if a workflow exists.
    pub fn contains(&self, id: &str) -> bool {
        self.workflows.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.workflows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workflows.is_empty()
    }
}
