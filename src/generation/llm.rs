//! LLM-backed GenerationService
//!
//! Builds a prompt and schema per operation, calls the configured provider,
//! and deserializes the repaired JSON into typed results. A payload that does
//! not fit the expected shape fails that unit of work.

use std::collections::HashSet;

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use super::prompts::{PromptTemplates, truncate_chars};
use super::schemas::GenerationSchemas;
use super::{EpisodeShotsRequest, Generated, GenerationService, ScenePromptsRequest};
use crate::ai::provider::SharedProvider;
use crate::types::{
    Character, CharacterForm, Location, LocationType, LocationVisuals, PipelineError, Result,
    Shot, ShotPrompt,
};

// =============================================================================
// Response Payloads
// =============================================================================

#[derive(Debug, Deserialize)]
struct SummaryPayload {
    summary: String,
}

#[derive(Debug, Deserialize)]
struct CharacterListPayload {
    characters: Vec<CharacterEntry>,
}

#[derive(Debug, Deserialize)]
struct CharacterEntry {
    name: String,
    #[serde(default)]
    is_main: bool,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct FormsPayload {
    forms: Vec<CharacterForm>,
}

#[derive(Debug, Deserialize)]
struct LocationListPayload {
    locations: Vec<LocationEntry>,
}

#[derive(Debug, Deserialize)]
struct LocationEntry {
    name: String,
    #[serde(rename = "type", default)]
    kind: LocationType,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct ShotListPayload {
    shots: Vec<Shot>,
}

#[derive(Debug, Deserialize)]
struct ScenePromptsPayload {
    prompts: Vec<ShotPrompt>,
}

// =============================================================================
// Service
// =============================================================================

pub struct LlmGenerationService {
    provider: SharedProvider,
    max_script_chars: usize,
}

impl LlmGenerationService {
    pub fn new(provider: SharedProvider, max_script_chars: usize) -> Self {
        Self {
            provider,
            max_script_chars,
        }
    }

    fn script(&self, script: &str) -> String {
        truncate_chars(script, self.max_script_chars)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        unit: &str,
        prompt: String,
        schema: Value,
    ) -> Result<Generated<T>> {
        debug!(
            unit,
            provider = self.provider.name(),
            model = self.provider.model(),
            prompt_chars = prompt.len(),
            "Generation call"
        );

        let response = self.provider.generate(&prompt, &schema).await?;
        let payload = serde_json::from_value::<T>(response.content).map_err(|e| {
            PipelineError::generation(unit, format!("unexpected response shape: {}", e))
                .with_usage(response.usage)
        })?;
        Ok(Generated::new(payload, response.usage))
    }
}

fn non_empty_summary(unit: &str, summary: String) -> Result<String> {
    let summary = summary.trim().to_string();
    if summary.is_empty() {
        return Err(PipelineError::generation(unit, "empty summary"));
    }
    Ok(summary)
}

/// Reject shot lists the later phases cannot work with
fn validate_shots(unit: &str, shots: Vec<Shot>) -> Result<Vec<Shot>> {
    if shots.is_empty() {
        return Err(PipelineError::generation(unit, "no shots returned"));
    }

    let mut seen = HashSet::new();
    shots
        .into_iter()
        .map(|mut shot| {
            shot.id = shot.id.trim().to_string();
            if shot.id.is_empty() {
                return Err(PipelineError::generation(unit, "shot without id"));
            }
            if !seen.insert(shot.id.clone()) {
                return Err(PipelineError::generation(
                    unit,
                    format!("duplicate shot id '{}'", shot.id),
                ));
            }
            shot.sora_prompt = None;
            Ok(shot)
        })
        .collect()
}

#[async_trait]
impl GenerationService for LlmGenerationService {
    async fn project_summary(&self, script: &str, style_guide: &str) -> Result<Generated<String>> {
        let prompt = PromptTemplates::project_summary(&self.script(script), style_guide);
        let out: Generated<SummaryPayload> = self
            .call("project summary", prompt, GenerationSchemas::summary())
            .await?;
        let summary = non_empty_summary("project summary", out.result.summary)
            .map_err(|e| e.with_usage(out.usage))?;
        Ok(Generated::new(summary, out.usage))
    }

    async fn episode_summary(
        &self,
        title: &str,
        content: &str,
        project_summary: &str,
    ) -> Result<Generated<String>> {
        let unit = format!("episode summary '{}'", title);
        let prompt = PromptTemplates::episode_summary(title, content, project_summary);
        let out: Generated<SummaryPayload> =
            self.call(&unit, prompt, GenerationSchemas::summary()).await?;
        let summary =
            non_empty_summary(&unit, out.result.summary).map_err(|e| e.with_usage(out.usage))?;
        Ok(Generated::new(summary, out.usage))
    }

    async fn character_list(
        &self,
        script: &str,
        project_summary: &str,
    ) -> Result<Generated<Vec<Character>>> {
        let prompt = PromptTemplates::character_list(&self.script(script), project_summary);
        let out: Generated<CharacterListPayload> = self
            .call("character list", prompt, GenerationSchemas::character_list())
            .await?;

        let characters = out
            .result
            .characters
            .into_iter()
            .filter(|c| !c.name.trim().is_empty())
            .map(|c| Character {
                name: c.name.trim().to_string(),
                is_main: c.is_main,
                description: c.description,
                ..Default::default()
            })
            .collect();
        Ok(Generated::new(characters, out.usage))
    }

    async fn character_deep_dive(
        &self,
        name: &str,
        script: &str,
        project_summary: &str,
        style_guide: &str,
    ) -> Result<Generated<Vec<CharacterForm>>> {
        let prompt = PromptTemplates::character_deep_dive(
            name,
            &self.script(script),
            project_summary,
            style_guide,
        );
        let out: Generated<FormsPayload> = self
            .call(
                &format!("character deep dive '{}'", name),
                prompt,
                GenerationSchemas::character_forms(),
            )
            .await?;
        Ok(Generated::new(out.result.forms, out.usage))
    }

    async fn location_list(
        &self,
        script: &str,
        project_summary: &str,
    ) -> Result<Generated<Vec<Location>>> {
        let prompt = PromptTemplates::location_list(&self.script(script), project_summary);
        let out: Generated<LocationListPayload> = self
            .call("location list", prompt, GenerationSchemas::location_list())
            .await?;

        let locations = out
            .result
            .locations
            .into_iter()
            .filter(|l| !l.name.trim().is_empty())
            .map(|l| Location {
                name: l.name.trim().to_string(),
                kind: l.kind,
                description: l.description,
                ..Default::default()
            })
            .collect();
        Ok(Generated::new(locations, out.usage))
    }

    async fn location_deep_dive(
        &self,
        name: &str,
        script: &str,
        style_guide: &str,
    ) -> Result<Generated<LocationVisuals>> {
        let prompt = PromptTemplates::location_deep_dive(name, &self.script(script), style_guide);
        self.call(
            &format!("location deep dive '{}'", name),
            prompt,
            GenerationSchemas::location_visuals(),
        )
        .await
    }

    async fn episode_shots(&self, request: EpisodeShotsRequest<'_>) -> Result<Generated<Vec<Shot>>> {
        let unit = format!("shot list for episode {}", request.index + 1);
        let prompt = PromptTemplates::episode_shots(
            request.title,
            request.content,
            request.summary,
            request.context,
            request.shot_guide,
            request.index + 1,
            request.style_guide,
        );
        let out: Generated<ShotListPayload> =
            self.call(&unit, prompt, GenerationSchemas::shot_list()).await?;
        let shots =
            validate_shots(&unit, out.result.shots).map_err(|e| e.with_usage(out.usage))?;
        Ok(Generated::new(shots, out.usage))
    }

    async fn scene_prompts(
        &self,
        request: ScenePromptsRequest<'_>,
    ) -> Result<Generated<Vec<ShotPrompt>>> {
        let unit = match request.shots.first() {
            Some(shot) => format!("scene prompts from shot {}", shot.id),
            None => "scene prompts".to_string(),
        };
        let prompt = PromptTemplates::scene_prompts(
            request.shots,
            request.context,
            request.prompt_guide,
            request.style_guide,
        );
        let out: Generated<ScenePromptsPayload> = self
            .call(&unit, prompt, GenerationSchemas::scene_prompts())
            .await?;
        Ok(Generated::new(out.result.prompts, out.usage))
    }
}
