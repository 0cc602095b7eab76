//! ScriptFlow - Script-to-Video-Prompt Pipeline
//!
//! Takes a multi-episode script through three LLM-driven phases and keeps
//! every intermediate result in a local project store:
//!
//! 1. **Analysis**: project summary, episode summaries, characters and
//!    locations, each step reviewed before the next one starts
//! 2. **Shot Generation**: one shot list per episode, reviewed per episode
//! 3. **Prompt Generation**: video prompts per scene, resumable per chunk
//!
//! Failures halt the pipeline on the failed unit; `retry` and `skip` are
//! always explicit commands.
//!
//! ## Quick Start
//!
//! ```ignore
//! use scriptflow::{Command, PhaseController, PipelineSettings, SqliteStore};
//!
//! let store = Arc::new(SqliteStore::open(".scriptflow/project.db")?);
//! let controller = PhaseController::new(store, service, PipelineSettings::default());
//! let outcome = controller.execute(Command::Run).await?;
//! ```
//!
//! ## Modules
//!
//! - [`pipeline`]: phase controller and the three phase runners
//! - [`generation`]: the generation service over an LLM provider
//! - [`ai`]: LLM providers, response repair, usage metrics
//! - [`storage`]: project state, patches, SQLite persistence
//! - [`script`]: episode parsing and shot import

pub mod ai;
pub mod cli;
pub mod config;
pub mod generation;
pub mod pipeline;
pub mod script;
pub mod storage;
pub mod types;

// =============================================================================
// Core Re-exports
// =============================================================================

// Configuration
pub use config::{Config, ConfigLoader, LlmConfig, PipelineConfig, ProviderKind};

// Error Types
pub use types::error::{ErrorCategory, PipelineError, Result, ResultExt};

// Storage
pub use storage::{MemoryStore, ProjectPatch, ProjectState, ProjectStore, SharedStore, SqliteStore};

// =============================================================================
// Pipeline Re-exports
// =============================================================================

pub use pipeline::{
    AnalysisSubStep, Command, EpisodeShotGenerator, Phase, PhaseController, PipelineSettings,
    RunOutcome, ScenePromptGenerator,
};

pub use generation::{GenerationService, LlmGenerationService, SharedGenerationService};

// =============================================================================
// AI Re-exports
// =============================================================================

pub use ai::{
    LlmProvider, StatsCounter, TokenUsage, UsageLedger, UsageScope, create_provider,
};
