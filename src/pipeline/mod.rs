//! Pipeline Orchestration
//!
//! Drives a parsed script through three generation phases:
//!
//! ```text
//! IDLE -> ANALYSIS -> SHOT_GENERATION -> PROMPT_GENERATION -> DONE
//!           |                 ^
//!           +-- shortcut -----+--> PROMPT_GENERATION (all episodes have shots)
//! ```
//!
//! - `analysis`: six ordered sub-steps, single calls or per-item queues
//! - `shots`: per-episode shot lists, halts on the first failure
//! - `prompts`: per-episode, scene-chunked prompt generation with resume
//! - `controller`: phase state machine gated on explicit confirmation
//!
//! Every runner awaits one generation call at a time and writes through the
//! `ProjectStore` reducer, so there is exactly one writer at any moment.

mod analysis;
mod chunking;
mod controller;
mod prompts;
mod shots;

#[cfg(test)]
pub(crate) mod testing;

pub use analysis::AnalysisSubStepRunner;
pub use chunking::{DEFAULT_SCENE_KEY, SceneChunk, SceneKey, scene_chunks, scene_key};
pub use controller::{Command, PhaseController, RunOutcome};
pub use prompts::ScenePromptGenerator;
pub use shots::EpisodeShotGenerator;

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ai::metrics::UsageScope;
use crate::config::Config;

// =============================================================================
// Phase
// =============================================================================

/// Top-level pipeline phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Idle,
    Analysis,
    ShotGeneration,
    PromptGeneration,
    Done,
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Analysis => "Analysis",
            Self::ShotGeneration => "Shot Generation",
            Self::PromptGeneration => "Prompt Generation",
            Self::Done => "Done",
        }
    }

    /// The phase a confirmation leads to, `None` once done
    pub fn next(&self) -> Option<Self> {
        match self {
            Self::Idle => Some(Self::Analysis),
            Self::Analysis => Some(Self::ShotGeneration),
            Self::ShotGeneration => Some(Self::PromptGeneration),
            Self::PromptGeneration => Some(Self::Done),
            Self::Done => None,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Analysis Sub-Step
// =============================================================================

/// Ordered sub-steps of the analysis phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisSubStep {
    #[default]
    Idle = 0,
    ProjectSummary = 1,
    EpisodeSummaries = 2,
    CharacterList = 3,
    CharacterDeepDive = 4,
    LocationList = 5,
    LocationDeepDive = 6,
    Complete = 7,
}

impl AnalysisSubStep {
    /// Number of working sub-steps (excludes Idle and Complete)
    pub const COUNT: usize = 6;

    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    pub fn from_u8(step: u8) -> Option<Self> {
        match step {
            0 => Some(Self::Idle),
            1 => Some(Self::ProjectSummary),
            2 => Some(Self::EpisodeSummaries),
            3 => Some(Self::CharacterList),
            4 => Some(Self::CharacterDeepDive),
            5 => Some(Self::LocationList),
            6 => Some(Self::LocationDeepDive),
            7 => Some(Self::Complete),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::ProjectSummary => "Project Summary",
            Self::EpisodeSummaries => "Episode Summaries",
            Self::CharacterList => "Character List",
            Self::CharacterDeepDive => "Character Deep Dive",
            Self::LocationList => "Location List",
            Self::LocationDeepDive => "Location Deep Dive",
            Self::Complete => "Complete",
        }
    }

    /// Following sub-step, `None` after Complete
    pub fn next(&self) -> Option<Self> {
        Self::from_u8(self.as_u8() + 1)
    }

    /// Queue-driven steps process one work item per call
    pub fn is_queue_step(&self) -> bool {
        matches!(
            self,
            Self::EpisodeSummaries | Self::CharacterDeepDive | Self::LocationDeepDive
        )
    }

    /// Single steps make exactly one call
    pub fn is_single_step(&self) -> bool {
        matches!(
            self,
            Self::ProjectSummary | Self::CharacterList | Self::LocationList
        )
    }

    /// Ledger bucket for calls made by this step
    pub fn usage_scope(&self) -> Option<UsageScope> {
        match self {
            Self::ProjectSummary => Some(UsageScope::ProjectSummary),
            Self::EpisodeSummaries => Some(UsageScope::EpisodeSummaries),
            Self::CharacterList => Some(UsageScope::CharacterList),
            Self::CharacterDeepDive => Some(UsageScope::CharacterDeepDive),
            Self::LocationList => Some(UsageScope::LocationList),
            Self::LocationDeepDive => Some(UsageScope::LocationDeepDive),
            Self::Idle | Self::Complete => None,
        }
    }
}

impl fmt::Display for AnalysisSubStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Settings
// =============================================================================

/// Guides and limits every runner passes to the generation service
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub style_guide: String,
    pub shot_guide: String,
    pub prompt_guide: String,
    pub max_script_chars: usize,
    /// Pause after each successful scene-chunk call
    pub chunk_delay: Duration,
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            style_guide: config.guides.style.clone(),
            shot_guide: config.guides.shot_format.clone(),
            prompt_guide: config.guides.prompt_style.clone(),
            max_script_chars: config.pipeline.max_script_chars,
            chunk_delay: config.pipeline.chunk_delay(),
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}
