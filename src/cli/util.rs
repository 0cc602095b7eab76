//! CLI Common Utilities
//!
//! Shared initialization and context management for CLI commands.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::ai::provider::create_provider;
use crate::config::{Config, ConfigLoader};
use crate::generation::LlmGenerationService;
use crate::pipeline::{PhaseController, PipelineSettings};
use crate::storage::SqliteStore;
use crate::types::{PipelineError, Result};

/// Command execution context
///
/// Resolved against an explicit project root so commands can be driven
/// from tests without changing the working directory.
#[derive(Clone)]
pub struct CommandContext {
    /// Project root directory
    pub project_root: PathBuf,
    /// Project data directory (.scriptflow)
    pub project_dir: PathBuf,
    /// Loaded configuration
    pub config: Config,
    pub store: Arc<SqliteStore>,
}

impl CommandContext {
    /// Load the context for the current directory
    pub fn load() -> Result<Self> {
        let root = std::env::current_dir()?;
        Self::load_in(&root)
    }

    /// Validates initialization, loads config, and opens the project store.
    pub fn load_in(root: &Path) -> Result<Self> {
        let project_dir = require_initialized(root)?;
        let config = ConfigLoader::load_in(root)?;
        let store = SqliteStore::open(root.join(ConfigLoader::database_path()))?;

        if !store.is_initialized()? {
            return Err(PipelineError::NotInitialized);
        }

        Ok(Self {
            project_root: root.to_path_buf(),
            project_dir,
            config,
            store: Arc::new(store),
        })
    }

    /// Build a controller backed by the configured LLM provider
    pub fn controller(&self) -> Result<PhaseController> {
        let provider = create_provider(&self.config.llm.to_provider_config())?;
        let service = LlmGenerationService::new(provider, self.config.pipeline.max_script_chars);
        Ok(PhaseController::new(
            self.store.clone(),
            Arc::new(service),
            PipelineSettings::from_config(&self.config),
        ))
    }

    /// Whether review points should be confirmed without asking
    pub fn unattended(&self, requested: bool) -> bool {
        requested || self.config.pipeline.auto_confirm
    }
}

/// Require a project under `root`
///
/// Returns the .scriptflow directory path if initialized,
/// or `PipelineError::NotInitialized` if not.
pub fn require_initialized(root: &Path) -> Result<PathBuf> {
    if !is_initialized(root) {
        return Err(PipelineError::NotInitialized);
    }
    Ok(root.join(ConfigLoader::project_dir()))
}

/// Check if a project database exists under `root`
pub fn is_initialized(root: &Path) -> bool {
    ConfigLoader::is_project_initialized(root)
}
