//! Generation Service
//!
//! The collaborator the pipeline calls for every unit of work. Each operation
//! returns its payload together with the token usage of the call, or fails
//! with a human-readable error. The pipeline never retries on its own.

mod llm;
mod prompts;
mod schemas;

pub use llm::LlmGenerationService;
pub use prompts::{PromptBuilder, PromptTemplates, render_context, truncate_chars};
pub use schemas::GenerationSchemas;

use std::sync::Arc;

use async_trait::async_trait;

use crate::ai::provider::TokenUsage;
use crate::types::{
    Character, CharacterForm, Location, LocationVisuals, ProjectContext, Result, Shot, ShotPrompt,
};

/// Payload of one generation call plus what it cost
#[derive(Debug, Clone, PartialEq)]
pub struct Generated<T> {
    pub result: T,
    pub usage: TokenUsage,
}

impl<T> Generated<T> {
    pub fn new(result: T, usage: TokenUsage) -> Self {
        Self { result, usage }
    }
}

/// Inputs of one episode's shot-list generation
#[derive(Debug, Clone, Copy)]
pub struct EpisodeShotsRequest<'a> {
    pub title: &'a str,
    pub content: &'a str,
    /// Summary written by the analysis phase
    pub summary: &'a str,
    pub context: &'a ProjectContext,
    pub shot_guide: &'a str,
    /// 0-based position of the episode
    pub index: usize,
    pub style_guide: &'a str,
}

/// Inputs of one scene chunk's prompt generation
#[derive(Debug, Clone, Copy)]
pub struct ScenePromptsRequest<'a> {
    pub shots: &'a [Shot],
    pub context: &'a ProjectContext,
    pub prompt_guide: &'a str,
    pub style_guide: &'a str,
}

#[async_trait]
pub trait GenerationService: Send + Sync {
    async fn project_summary(&self, script: &str, style_guide: &str) -> Result<Generated<String>>;

    async fn episode_summary(
        &self,
        title: &str,
        content: &str,
        project_summary: &str,
    ) -> Result<Generated<String>>;

    async fn character_list(
        &self,
        script: &str,
        project_summary: &str,
    ) -> Result<Generated<Vec<Character>>>;

    async fn character_deep_dive(
        &self,
        name: &str,
        script: &str,
        project_summary: &str,
        style_guide: &str,
    ) -> Result<Generated<Vec<CharacterForm>>>;

    async fn location_list(
        &self,
        script: &str,
        project_summary: &str,
    ) -> Result<Generated<Vec<Location>>>;

    async fn location_deep_dive(
        &self,
        name: &str,
        script: &str,
        style_guide: &str,
    ) -> Result<Generated<LocationVisuals>>;

    async fn episode_shots(&self, request: EpisodeShotsRequest<'_>) -> Result<Generated<Vec<Shot>>>;

    async fn scene_prompts(
        &self,
        request: ScenePromptsRequest<'_>,
    ) -> Result<Generated<Vec<ShotPrompt>>>;
}

/// Shared generation service handle.
pub type SharedGenerationService = Arc<dyn GenerationService>;
