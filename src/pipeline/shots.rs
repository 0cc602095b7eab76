//! Episode Shot Generator
//!
//! Phase 2. Walks episodes in id order from a cursor, one shot-list call per
//! episode. Each generated list waits in `review_shots` for confirmation;
//! confirming moves on to the next episode. The first failure halts the walk
//! with the episode in `error` and the cursor on it.

use tracing::{error, info, instrument};

use super::{Phase, PipelineSettings, RunOutcome};
use crate::generation::{EpisodeShotsRequest, SharedGenerationService};
use crate::storage::{GenerationStage, ProjectPatch, ProjectState, SharedStore};
use crate::types::{Episode, EpisodeStatus, PipelineError, Result};

pub struct EpisodeShotGenerator {
    store: SharedStore,
    service: SharedGenerationService,
    settings: PipelineSettings,
}

impl EpisodeShotGenerator {
    pub fn new(
        store: SharedStore,
        service: SharedGenerationService,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            store,
            service,
            settings,
        }
    }

    /// Generate from episode `index` onwards until a review point, a failure,
    /// or the end of the episode list. An episode in `error` is reported, not
    /// regenerated; that takes `retry`.
    pub async fn generate(&self, index: usize) -> Result<RunOutcome> {
        self.walk(index, false).await
    }

    /// Accept the current episode's shots and continue with the next one
    pub async fn confirm(&self) -> Result<RunOutcome> {
        let state = self.expect_phase("confirm")?;
        let index = state.cursor;
        let episode = current(&state, "confirm")?;

        if episode.status != EpisodeStatus::ReviewShots {
            return Err(PipelineError::invalid_command(
                "confirm",
                Phase::ShotGeneration,
                format!(
                    "episode {} is {}, not waiting for shot review",
                    episode.id, episode.status
                ),
            ));
        }

        self.store.apply(ProjectPatch::EpisodeStatusSet {
            episode_id: episode.id,
            status: EpisodeStatus::ConfirmedShots,
        })?;
        info!(episode = episode.id, "Shots confirmed");
        self.store
            .apply(ProjectPatch::CursorMoved { cursor: index + 1 })?;
        self.generate(index + 1).await
    }

    /// Regenerate the failed episode under the cursor
    pub async fn retry(&self) -> Result<RunOutcome> {
        let state = self.expect_phase("retry")?;
        let episode = current(&state, "retry")?;

        if episode.status != EpisodeStatus::Error {
            return Err(PipelineError::invalid_command(
                "retry",
                Phase::ShotGeneration,
                format!("episode {} has not failed", episode.id),
            ));
        }

        info!(episode = episode.id, "Retrying shot generation");
        self.walk(state.cursor, true).await
    }

    async fn walk(&self, from: usize, retrying: bool) -> Result<RunOutcome> {
        let mut index = from;

        loop {
            let state = self.expect_phase("generate shots")?;

            let Some(episode) = state.episode_at(index) else {
                self.store.apply(ProjectPatch::PhaseChanged {
                    phase: Phase::PromptGeneration,
                })?;
                self.store.apply(ProjectPatch::CursorMoved { cursor: 0 })?;
                info!(episodes = state.episodes.len(), "Shot generation finished");
                return Ok(RunOutcome::PhaseFinished {
                    next: Phase::PromptGeneration,
                });
            };

            if state.cursor != index {
                self.store.apply(ProjectPatch::CursorMoved { cursor: index })?;
            }

            match episode.status {
                // Supplied externally or already past this phase
                EpisodeStatus::ConfirmedShots
                | EpisodeStatus::GeneratingSora
                | EpisodeStatus::ReviewSora
                | EpisodeStatus::Completed
                    if episode.has_shots() =>
                {
                    index += 1;
                    continue;
                }
                EpisodeStatus::ReviewShots => return Ok(awaiting_review(episode)),
                EpisodeStatus::Error if !(retrying && index == from) => {
                    return Ok(halted(episode));
                }
                _ => {}
            }

            return self.generate_episode(index, &state).await;
        }
    }

    #[instrument(skip(self, state), fields(episode = state.episodes[index].id))]
    async fn generate_episode(&self, index: usize, state: &ProjectState) -> Result<RunOutcome> {
        let episode = &state.episodes[index];
        let episode_id = episode.id;

        self.store.apply(ProjectPatch::EpisodeStarted {
            episode_id,
            status: EpisodeStatus::Generating,
        })?;

        let summary = if episode.summary.is_empty() {
            state.context.episode_summary(episode_id).unwrap_or_default()
        } else {
            episode.summary.as_str()
        };

        let request = EpisodeShotsRequest {
            title: &episode.title,
            content: &episode.content,
            summary,
            context: &state.context,
            shot_guide: &self.settings.shot_guide,
            index,
            style_guide: &self.settings.style_guide,
        };

        match self.service.episode_shots(request).await {
            Ok(generated) => {
                info!(
                    shots = generated.result.len(),
                    tokens = generated.usage.total_tokens,
                    "Shot list generated"
                );
                let updated = self.store.apply(ProjectPatch::ShotsGenerated {
                    episode_id,
                    shots: generated.result,
                    usage: generated.usage,
                })?;
                Ok(awaiting_review(&updated.episodes[index]))
            }
            Err(e) => {
                let message = e.to_string();
                error!("Shot generation failed: {}", message);
                let updated = self.store.apply(ProjectPatch::EpisodeFailed {
                    episode_id,
                    stage: GenerationStage::Shots,
                    message,
                    usage: None,
                    call_usage: e.spent_usage(),
                })?;
                Ok(halted(&updated.episodes[index]))
            }
        }
    }

    fn expect_phase(&self, action: &str) -> Result<ProjectState> {
        let state = self.store.snapshot()?;
        if state.phase != Phase::ShotGeneration {
            return Err(PipelineError::invalid_command(
                action,
                state.phase,
                "shot generation is not active",
            ));
        }
        Ok(state)
    }
}

fn current<'a>(state: &'a ProjectState, action: &str) -> Result<&'a Episode> {
    state.episode_at(state.cursor).ok_or_else(|| {
        PipelineError::invalid_command(action, state.phase, "no episode under the cursor")
    })
}

fn awaiting_review(episode: &Episode) -> RunOutcome {
    RunOutcome::awaiting(
        Phase::ShotGeneration,
        format!(
            "review {} shots of episode {} ({})",
            episode.shots.len(),
            episode.id,
            episode.title
        ),
    )
}

fn halted(episode: &Episode) -> RunOutcome {
    RunOutcome::halted(
        Phase::ShotGeneration,
        format!("episode {}", episode.id),
        episode.error_msg.clone().unwrap_or_default(),
    )
}
