//! Scene Prompt Generator
//!
//! Phase 3. For each episode, shots are grouped into scene chunks and every
//! chunk is one generation call. Each chunk's prompts and the running usage
//! are persisted before the next chunk starts, so a failed or interrupted
//! episode resumes at the first incomplete chunk.

use tracing::{debug, error, info, instrument, warn};

use super::{Phase, PipelineSettings, RunOutcome, scene_chunks};
use crate::ai::provider::TokenUsage;
use crate::generation::{ScenePromptsRequest, SharedGenerationService};
use crate::storage::{GenerationStage, ProjectPatch, ProjectState, SharedStore};
use crate::types::{Episode, EpisodeStatus, PipelineError, ProjectContext, Result, Shot};

pub struct ScenePromptGenerator {
    store: SharedStore,
    service: SharedGenerationService,
    settings: PipelineSettings,
}

impl ScenePromptGenerator {
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
    /// or the end of the episode list
    pub async fn generate(&self, index: usize) -> Result<RunOutcome> {
        self.walk(index, false).await
    }

    /// Accept the current episode's prompts and continue with the next one
    pub async fn confirm(&self) -> Result<RunOutcome> {
        let state = self.expect_phase("confirm")?;
        let index = state.cursor;
        let episode = current(&state, "confirm")?;

        if episode.status != EpisodeStatus::ReviewSora {
            return Err(PipelineError::invalid_command(
                "confirm",
                Phase::PromptGeneration,
                format!(
                    "episode {} is {}, not waiting for prompt review",
                    episode.id, episode.status
                ),
            ));
        }

        self.store.apply(ProjectPatch::EpisodeStatusSet {
            episode_id: episode.id,
            status: EpisodeStatus::Completed,
        })?;
        info!(episode = episode.id, "Episode completed");
        self.store
            .apply(ProjectPatch::CursorMoved { cursor: index + 1 })?;
        self.generate(index + 1).await
    }

    /// Resume the failed episode under the cursor
    pub async fn retry(&self) -> Result<RunOutcome> {
        let state = self.expect_phase("retry")?;
        let episode = current(&state, "retry")?;

        if episode.status != EpisodeStatus::Error {
            return Err(PipelineError::invalid_command(
                "retry",
                Phase::PromptGeneration,
                format!("episode {} has not failed", episode.id),
            ));
        }

        info!(episode = episode.id, "Retrying prompt generation");
        self.walk(state.cursor, true).await
    }

    async fn walk(&self, from: usize, retrying: bool) -> Result<RunOutcome> {
        let mut index = from;

        loop {
            let state = self.expect_phase("generate prompts")?;

            let Some(episode) = state.episode_at(index) else {
                self.store.apply(ProjectPatch::PhaseChanged { phase: Phase::Done })?;
                self.store.apply(ProjectPatch::CursorMoved { cursor: 0 })?;
                info!(episodes = state.episodes.len(), "Prompt generation finished");
                return Ok(RunOutcome::PhaseFinished { next: Phase::Done });
            };

            if state.cursor != index {
                self.store.apply(ProjectPatch::CursorMoved { cursor: index })?;
            }

            match episode.status {
                EpisodeStatus::Completed => {
                    index += 1;
                    continue;
                }
                _ if !episode.has_shots() => {
                    debug!(episode = episode.id, "No shots, skipping");
                    index += 1;
                    continue;
                }
                EpisodeStatus::ReviewSora => return Ok(awaiting_review(episode)),
                EpisodeStatus::Error if !(retrying && index == from) => {
                    return Ok(halted(episode));
                }
                _ => {}
            }

            let episode = episode.clone();
            return self.generate_episode(episode, &state.context).await;
        }
    }

    #[instrument(skip(self, episode, context), fields(episode = episode.id))]
    async fn generate_episode(
        &self,
        episode: Episode,
        context: &ProjectContext,
    ) -> Result<RunOutcome> {
        let episode_id = episode.id;
        // A failed or interrupted run keeps its completed chunks and usage
        let resume = matches!(
            episode.status,
            EpisodeStatus::Error | EpisodeStatus::GeneratingSora
        );
        let mut usage = if resume {
            episode.usage.prompts
        } else {
            TokenUsage::default()
        };

        self.store.apply(ProjectPatch::EpisodeStarted {
            episode_id,
            status: EpisodeStatus::GeneratingSora,
        })?;

        let chunks = scene_chunks(&episode.shots);
        info!(chunks = chunks.len(), resume, "Generating scene prompts");

        for (position, chunk) in chunks.iter().enumerate() {
            if resume && chunk.is_complete() {
                debug!(scene = %chunk.key, "Chunk already complete, skipping");
                continue;
            }

            let shots: Vec<Shot> = chunk.shots.iter().map(|shot| (*shot).clone()).collect();
            let request = ScenePromptsRequest {
                shots: &shots,
                context,
                prompt_guide: &self.settings.prompt_guide,
                style_guide: &self.settings.style_guide,
            };

            let mut spent = TokenUsage::default();
            let failure = match self.service.scene_prompts(request).await {
                Ok(generated) => {
                    usage += generated.usage;
                    let prompts: Vec<_> = generated
                        .result
                        .into_iter()
                        .filter(|prompt| chunk.contains(&prompt.id))
                        .collect();

                    let updated = self.store.apply(ProjectPatch::ScenePromptsMerged {
                        episode_id,
                        prompts,
                        episode_usage: usage,
                        call_usage: generated.usage,
                    })?;
                    debug!(scene = %chunk.key, tokens = generated.usage.total_tokens, "Chunk merged");

                    let unanswered = updated
                        .episode(episode_id)
                        .map(|e| {
                            e.shots
                                .iter()
                                .filter(|s| chunk.contains(&s.id) && !s.has_prompt())
                                .count()
                        })
                        .unwrap_or_default();
                    if unanswered > 0 {
                        warn!(scene = %chunk.key, unanswered, "Response missed shots");
                        Some(format!(
                            "scene {}: no prompt returned for {} shot(s)",
                            chunk.key, unanswered
                        ))
                    } else {
                        None
                    }
                }
                Err(e) => {
                    spent = e.spent_usage();
                    usage += spent;
                    Some(format!("scene {}: {}", chunk.key, e))
                }
            };

            if let Some(message) = failure {
                error!("Prompt generation failed: {}", message);
                let updated = self.store.apply(ProjectPatch::EpisodeFailed {
                    episode_id,
                    stage: GenerationStage::Prompts,
                    message,
                    usage: Some(usage),
                    call_usage: spent,
                })?;
                return match updated.episode(episode_id) {
                    Some(episode) => Ok(halted(episode)),
                    None => Err(PipelineError::UnknownEpisode(episode_id)),
                };
            }

            if position + 1 < chunks.len() && !self.settings.chunk_delay.is_zero() {
                tokio::time::sleep(self.settings.chunk_delay).await;
            }
        }

        let updated = self
            .store
            .apply(ProjectPatch::PromptsCompleted { episode_id })?;
        info!(tokens = usage.total_tokens, "Scene prompts ready for review");
        match updated.episode(episode_id) {
            Some(episode) => Ok(awaiting_review(episode)),
            None => Err(PipelineError::UnknownEpisode(episode_id)),
        }
    }

    fn expect_phase(&self, action: &str) -> Result<ProjectState> {
        let state = self.store.snapshot()?;
        if state.phase != Phase::PromptGeneration {
            return Err(PipelineError::invalid_command(
                action,
                state.phase,
                "prompt generation is not active",
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
        Phase::PromptGeneration,
        format!(
            "review {} prompts of episode {} ({})",
            episode.prompted_shots(),
            episode.id,
            episode.title
        ),
    )
}

fn halted(episode: &Episode) -> RunOutcome {
    RunOutcome::halted(
        Phase::PromptGeneration,
        format!("episode {}", episode.id),
        episode.error_msg.clone().unwrap_or_default(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::testing::{Harness, Op, harness, harness_with_delay};
    use std::time::Duration;
    use crate::ai::metrics::UsageScope;
    use crate::pipeline::{AnalysisSubStep, Command};
    use crate::storage::ProjectStore;

    /// Analysis done, shots imported, prompt generation active at episode 1
    fn ready(h: &Harness, shot_ids: &[&[&str]]) {
        let mut state = h.store.snapshot().unwrap();
        state.phase = Phase::PromptGeneration;
        state.analysis.sub_step = AnalysisSubStep::Complete;
        for (episode, ids) in state.episodes.iter_mut().zip(shot_ids) {
            episode.shots = ids.iter().map(|id| Shot::new(*id, "shot")).collect();
            episode.status = if ids.is_empty() {
                EpisodeStatus::Pending
            } else {
                EpisodeStatus::ConfirmedShots
            };
        }
        h.store.replace(state).unwrap();
    }

    #[tokio::test]
    async fn test_chunk_failure_then_resume_skips_completed_chunk() {
        let h = harness(1);
        ready(&h, &[&["1-01", "1-02", "2-01"]]);
        h.service.fail(Op::ScenePrompts, Some("2"), 1);

        let outcome = h.controller.execute(Command::Run).await.unwrap();
        assert!(outcome.is_halted());

        let state = h.store.snapshot().unwrap();
        let episode = &state.episodes[0];
        assert_eq!(episode.status, EpisodeStatus::Error);
        assert!(episode.shots[0].has_prompt());
        assert!(episode.shots[1].has_prompt());
        assert!(!episode.shots[2].has_prompt());
        let first_chunk_usage = h.service.usage_per_call();
        assert_eq!(episode.usage.prompts, first_chunk_usage);
        assert_eq!(state.stats.prompts.error, 1);
        assert_eq!(h.service.calls(Op::ScenePrompts), vec!["1", "2"]);

        h.controller.execute(Command::Retry).await.unwrap();
        assert_eq!(h.service.calls(Op::ScenePrompts), vec!["1", "2", "2"]);

        let state = h.store.snapshot().unwrap();
        let episode = &state.episodes[0];
        assert_eq!(episode.status, EpisodeStatus::ReviewSora);
        assert!(episode.shots.iter().all(Shot::has_prompt));
        assert!(episode.error_msg.is_none());
        assert_eq!(
            episode.usage.prompts.total_tokens,
            first_chunk_usage.total_tokens * 2
        );
        assert_eq!(state.stats.prompts.success, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_chunk_delay_only_between_generated_chunks() {
        let delay = Duration::from_millis(500);
        let h = harness_with_delay(1, delay);
        ready(&h, &[&["1-01", "2-01", "3-01"]]);
        h.service.fail(Op::ScenePrompts, Some("2"), 1);

        // chunk 1 succeeds, chunk 2 fails: one pause before the failing call
        let start = tokio::time::Instant::now();
        let outcome = h.controller.execute(Command::Run).await.unwrap();
        assert!(outcome.is_halted());
        assert_eq!(start.elapsed(), delay);

        // chunk 1 is skipped on resume, chunk 3 is last: one pause after chunk 2
        let start = tokio::time::Instant::now();
        h.controller.execute(Command::Retry).await.unwrap();
        assert_eq!(start.elapsed(), delay);

        assert_eq!(h.service.calls(Op::ScenePrompts), vec!["1", "2", "2", "3"]);
        let state = h.store.snapshot().unwrap();
        assert_eq!(state.episodes[0].status, EpisodeStatus::ReviewSora);
    }

    #[tokio::test(start_paused = true)]
    async fn test_chunk_delay_full_episode() {
        let delay = Duration::from_millis(250);
        let h = harness_with_delay(1, delay);
        ready(&h, &[&["1-01", "2-01", "3-01"]]);

        let start = tokio::time::Instant::now();
        h.controller.execute(Command::Run).await.unwrap();
        assert_eq!(start.elapsed(), delay * 2);
    }

    #[tokio::test]
    async fn test_rejected_chunk_usage_stays_in_ledger() {
        let h = harness(1);
        ready(&h, &[&["1-01", "2-01"]]);
        h.service.reject(Op::ScenePrompts, Some("2"), 1);
        let per_call = h.service.usage_per_call().total_tokens;

        h.controller.execute(Command::Run).await.unwrap();
        let state = h.store.snapshot().unwrap();
        assert_eq!(state.episodes[0].usage.prompts.total_tokens, per_call * 2);
        assert_eq!(
            state.usage.scope(UsageScope::PromptGeneration).total_tokens,
            per_call * 2
        );

        h.controller.execute(Command::Retry).await.unwrap();
        let state = h.store.snapshot().unwrap();
        assert_eq!(state.episodes[0].status, EpisodeStatus::ReviewSora);
        assert_eq!(state.episodes[0].usage.prompts.total_tokens, per_call * 3);
        assert_eq!(state.usage.overall().total_tokens, per_call * 3);
    }

    #[tokio::test]
    async fn test_resume_of_complete_episode_makes_no_calls() {
        let h = harness(1);
        ready(&h, &[&["1-01", "2-01"]]);

        let mut state = h.store.snapshot().unwrap();
        for shot in &mut state.episodes[0].shots {
            shot.sora_prompt = Some(format!("existing {}", shot.id));
        }
        state.episodes[0].status = EpisodeStatus::GeneratingSora;
        h.store.replace(state.clone()).unwrap();

        h.controller.execute(Command::Run).await.unwrap();
        h.controller.execute(Command::Run).await.unwrap();

        assert!(h.service.calls(Op::ScenePrompts).is_empty());
        let after = h.store.snapshot().unwrap();
        assert_eq!(after.episodes[0].shots, state.episodes[0].shots);
        assert_eq!(after.episodes[0].status, EpisodeStatus::ReviewSora);
    }

    #[tokio::test]
    async fn test_missing_prompts_fail_the_chunk() {
        let h = harness(1);
        ready(&h, &[&["1-01", "1-02"]]);
        h.service.drop_prompt("1-02");

        let outcome = h.controller.execute(Command::Run).await.unwrap();
        assert!(outcome.is_halted());

        let state = h.store.snapshot().unwrap();
        assert!(state.episodes[0].shots[0].has_prompt());
        assert!(!state.episodes[0].shots[1].has_prompt());
        assert!(state.episodes[0].error_msg.as_deref().unwrap_or("").contains("1 shot"));
    }

    #[tokio::test]
    async fn test_zero_shot_episode_skipped_and_confirm_reaches_done() {
        let h = harness(2);
        ready(&h, &[&[], &["2-1-01"]]);

        let outcome = h.controller.execute(Command::Run).await.unwrap();
        assert!(matches!(outcome, RunOutcome::AwaitingConfirmation { .. }));
        let state = h.store.snapshot().unwrap();
        assert_eq!(state.cursor, 1);
        assert_eq!(state.episodes[1].status, EpisodeStatus::ReviewSora);

        let outcome = h.controller.execute(Command::Confirm).await.unwrap();
        assert_eq!(outcome, RunOutcome::Done);
        let state = h.store.snapshot().unwrap();
        assert_eq!(state.phase, Phase::Done);
        assert_eq!(state.cursor, 0);
        assert_eq!(state.episodes[1].status, EpisodeStatus::Completed);
    }

    #[tokio::test]
    async fn test_no_automatic_advance_past_review() {
        let h = harness(2);
        ready(&h, &[&["1-01"], &["2-01"]]);

        h.controller.execute(Command::Run).await.unwrap();
        h.controller.execute(Command::Run).await.unwrap();

        let state = h.store.snapshot().unwrap();
        assert_eq!(state.episodes[0].status, EpisodeStatus::ReviewSora);
        assert_eq!(state.episodes[1].status, EpisodeStatus::ConfirmedShots);
        assert_eq!(h.service.calls(Op::ScenePrompts), vec!["1"]);
    }

    #[tokio::test]
    async fn test_completed_status_never_reverts() {
        let h = harness(2);
        ready(&h, &[&["1-01"], &["2-01"]]);
        h.service.fail(Op::ScenePrompts, Some("2"), 1);

        h.controller.execute(Command::Run).await.unwrap();
        h.controller.execute(Command::Confirm).await.unwrap();
        h.controller.execute(Command::Retry).await.unwrap();
        h.controller.execute(Command::Confirm).await.unwrap();

        let state = h.store.snapshot().unwrap();
        assert_eq!(state.episodes[0].status, EpisodeStatus::Completed);
        assert_eq!(state.episodes[1].status, EpisodeStatus::Completed);
        assert_eq!(state.phase, Phase::Done);
        let err = h
            .store
            .apply(ProjectPatch::EpisodeStarted {
                episode_id: 1,
                status: EpisodeStatus::GeneratingSora,
            })
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidTransition { .. }));
    }
}
