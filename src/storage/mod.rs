//! Project Storage
//!
//! The `ProjectStore` collaborator: read the current snapshot, apply a patch.
//! Writes are visible to the next read; nothing else is assumed by callers.

pub mod database;
pub mod state;

pub use database::{PatchLogEntry, PoolConfig, SqliteStore};
pub use state::{
    AnalysisOutput, AnalysisState, GenerationStage, ProjectPatch, ProjectState, StepFailure,
    WorkItem,
};

use std::sync::{Arc, Mutex};

use crate::types::{PipelineError, Result};

/// Snapshot/patch access to the single project record set
pub trait ProjectStore: Send + Sync {
    /// Current state
    fn snapshot(&self) -> Result<ProjectState>;

    /// Apply one patch atomically and return the resulting state
    fn apply(&self, patch: ProjectPatch) -> Result<ProjectState>;

    /// Replace the whole state (project initialization)
    fn replace(&self, state: ProjectState) -> Result<()>;
}

/// Shared store handle for the runners.
pub type SharedStore = Arc<dyn ProjectStore>;

/// Mutex-guarded in-process store
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<ProjectState>,
}

impl MemoryStore {
    pub fn new(state: ProjectState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, ProjectState>> {
        self.state
            .lock()
            .map_err(|_| PipelineError::Storage("project state lock poisoned".to_string()))
    }
}

impl ProjectStore for MemoryStore {
    fn snapshot(&self) -> Result<ProjectState> {
        Ok(self.lock()?.clone())
    }

    fn apply(&self, patch: ProjectPatch) -> Result<ProjectState> {
        let mut guard = self.lock()?;
        let mut next = guard.clone();
        next.apply(patch)?;
        *guard = next.clone();
        Ok(next)
    }

    fn replace(&self, state: ProjectState) -> Result<()> {
        *self.lock()? = state;
        Ok(())
    }
}
