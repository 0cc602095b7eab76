//! Project state and its reducer
//!
//! `ProjectState` is the single record set every runner reads and writes.
//! Runners never mutate it directly: each step produces a `ProjectPatch`
//! and the store applies it through `ProjectState::apply`, which validates
//! the change before touching anything.

use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ai::metrics::{StatsCategory, StatsCounter, UsageLedger, UsageScope};
use crate::ai::provider::TokenUsage;
use crate::pipeline::{AnalysisSubStep, Phase};
use crate::types::{
    Character, CharacterForm, Episode, EpisodeStatus, Location, LocationVisuals, PipelineError,
    ProjectContext, Result, Shot, ShotPrompt, ValidationErrorKind,
};

// =============================================================================
// Analysis State
// =============================================================================

/// One unit of work of a queue-driven analysis step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum WorkItem {
    Episode(u32),
    Character(String),
    Location(String),
}

impl fmt::Display for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Episode(id) => write!(f, "episode {}", id),
            Self::Character(id) => write!(f, "character {}", id),
            Self::Location(id) => write!(f, "location {}", id),
        }
    }
}

/// A failed analysis call waiting for retry or skip
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepFailure {
    pub step: AnalysisSubStep,
    /// Head item for queue steps
    pub item: Option<WorkItem>,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisState {
    pub sub_step: AnalysisSubStep,
    pub queue: VecDeque<WorkItem>,
    pub failure: Option<StepFailure>,
    /// Set once a single step produced its result
    pub step_done: bool,
}

impl AnalysisState {
    /// Whether the current sub-step may be confirmed
    pub fn is_step_complete(&self) -> bool {
        match self.sub_step {
            AnalysisSubStep::Idle => false,
            AnalysisSubStep::Complete => true,
            step if step.is_queue_step() => self.queue.is_empty(),
            _ => self.step_done,
        }
    }
}

/// Result of one analysis call, written into the project context
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisOutput {
    ProjectSummary(String),
    EpisodeSummary {
        episode_id: u32,
        summary: String,
    },
    CharacterList(Vec<Character>),
    CharacterForms {
        character_id: String,
        forms: Vec<CharacterForm>,
    },
    LocationList(Vec<Location>),
    LocationVisuals {
        location_id: String,
        visuals: LocationVisuals,
    },
}

// =============================================================================
// Patches
// =============================================================================

/// Which per-episode generator an episode event belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationStage {
    Shots,
    Prompts,
}

/// Every mutation of the project state
#[derive(Debug, Clone, PartialEq)]
pub enum ProjectPatch {
    PhaseChanged {
        phase: Phase,
    },
    CursorMoved {
        cursor: usize,
    },
    /// Enter a sub-step with its seeded work queue
    SubStepEntered {
        step: AnalysisSubStep,
        queue: Vec<WorkItem>,
    },
    AnalysisSucceeded {
        step: AnalysisSubStep,
        item: Option<WorkItem>,
        output: AnalysisOutput,
        usage: TokenUsage,
    },
    AnalysisFailed {
        step: AnalysisSubStep,
        item: Option<WorkItem>,
        message: String,
        /// Tokens the failed call still consumed
        usage: TokenUsage,
    },
    /// Clear a pending failure before retrying it
    AnalysisFailureCleared {
        step: AnalysisSubStep,
    },
    /// Drop the failed head item of a queue step
    AnalysisItemSkipped {
        step: AnalysisSubStep,
    },
    EpisodeStarted {
        episode_id: u32,
        status: EpisodeStatus,
    },
    ShotsGenerated {
        episode_id: u32,
        shots: Vec<Shot>,
        usage: TokenUsage,
    },
    EpisodeFailed {
        episode_id: u32,
        stage: GenerationStage,
        message: String,
        /// Prompt usage accumulated before the failure
        usage: Option<TokenUsage>,
        /// Tokens the failed call still consumed
        call_usage: TokenUsage,
    },
    /// One scene chunk of prompts, persisted before the next chunk starts
    ScenePromptsMerged {
        episode_id: u32,
        prompts: Vec<ShotPrompt>,
        episode_usage: TokenUsage,
        call_usage: TokenUsage,
    },
    PromptsCompleted {
        episode_id: u32,
    },
    EpisodeStatusSet {
        episode_id: u32,
        status: EpisodeStatus,
    },
    ShotsImported {
        episode_id: u32,
        shots: Vec<Shot>,
    },
}

impl ProjectPatch {
    /// Stable name used in the patch log
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PhaseChanged { .. } => "phase_changed",
            Self::CursorMoved { .. } => "cursor_moved",
            Self::SubStepEntered { .. } => "sub_step_entered",
            Self::AnalysisSucceeded { .. } => "analysis_succeeded",
            Self::AnalysisFailed { .. } => "analysis_failed",
            Self::AnalysisFailureCleared { .. } => "analysis_failure_cleared",
            Self::AnalysisItemSkipped { .. } => "analysis_item_skipped",
            Self::EpisodeStarted { .. } => "episode_started",
            Self::ShotsGenerated { .. } => "shots_generated",
            Self::EpisodeFailed { .. } => "episode_failed",
            Self::ScenePromptsMerged { .. } => "scene_prompts_merged",
            Self::PromptsCompleted { .. } => "prompts_completed",
            Self::EpisodeStatusSet { .. } => "episode_status_set",
            Self::ShotsImported { .. } => "shots_imported",
        }
    }

    pub fn episode_id(&self) -> Option<u32> {
        match self {
            Self::EpisodeStarted { episode_id, .. }
            | Self::ShotsGenerated { episode_id, .. }
            | Self::EpisodeFailed { episode_id, .. }
            | Self::ScenePromptsMerged { episode_id, .. }
            | Self::PromptsCompleted { episode_id }
            | Self::EpisodeStatusSet { episode_id, .. }
            | Self::ShotsImported { episode_id, .. } => Some(*episode_id),
            Self::AnalysisSucceeded {
                output: AnalysisOutput::EpisodeSummary { episode_id, .. },
                ..
            } => Some(*episode_id),
            _ => None,
        }
    }
}

// =============================================================================
// Project State
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectState {
    pub name: String,
    pub script: String,
    pub episodes: Vec<Episode>,
    pub context: ProjectContext,
    pub phase: Phase,
    pub analysis: AnalysisState,
    /// Index of the current episode in Phase 2/3
    pub cursor: usize,
    pub usage: UsageLedger,
    pub stats: StatsCounter,
    /// Number of patches applied so far
    pub revision: u64,
}

impl ProjectState {
    pub fn new(name: impl Into<String>, script: impl Into<String>, episodes: Vec<Episode>) -> Self {
        Self {
            name: name.into(),
            script: script.into(),
            episodes,
            ..Default::default()
        }
    }

    pub fn episode(&self, episode_id: u32) -> Option<&Episode> {
        self.episodes.iter().find(|e| e.id == episode_id)
    }

    pub fn episode_at(&self, index: usize) -> Option<&Episode> {
        self.episodes.get(index)
    }

    /// Index of an episode id in parse order
    pub fn episode_index(&self, episode_id: u32) -> Option<usize> {
        self.episodes.iter().position(|e| e.id == episode_id)
    }

    pub fn all_episodes_have_shots(&self) -> bool {
        !self.episodes.is_empty() && self.episodes.iter().all(Episode::has_shots)
    }

    fn episode_mut(&mut self, episode_id: u32) -> Result<&mut Episode> {
        self.episodes
            .iter_mut()
            .find(|e| e.id == episode_id)
            .ok_or(PipelineError::UnknownEpisode(episode_id))
    }

    fn transition(&mut self, episode_id: u32, next: EpisodeStatus) -> Result<&mut Episode> {
        let episode = self.episode_mut(episode_id)?;
        if !episode.status.can_transition_to(next) {
            return Err(PipelineError::InvalidTransition {
                episode_id,
                from: episode.status.to_string(),
                to: next.to_string(),
            });
        }
        episode.status = next;
        Ok(episode)
    }

    fn expect_sub_step(&self, step: AnalysisSubStep, action: &str) -> Result<()> {
        if self.analysis.sub_step != step {
            return Err(PipelineError::invalid_command(
                action,
                self.analysis.sub_step,
                format!("patch targets {}", step),
            ));
        }
        Ok(())
    }

    /// Apply one patch. On error nothing observable has changed.
    pub fn apply(&mut self, patch: ProjectPatch) -> Result<()> {
        match patch {
            ProjectPatch::PhaseChanged { phase } => self.phase = phase,
            ProjectPatch::CursorMoved { cursor } => self.cursor = cursor,
            ProjectPatch::SubStepEntered { step, queue } => {
                self.analysis = AnalysisState {
                    sub_step: step,
                    queue: queue.into(),
                    failure: None,
                    step_done: false,
                };
            }
            ProjectPatch::AnalysisSucceeded {
                step,
                item,
                output,
                usage,
            } => {
                self.expect_sub_step(step, "record analysis result")?;
                if step.is_queue_step() && self.analysis.queue.front() != item.as_ref() {
                    return Err(PipelineError::invalid_command(
                        "record analysis result",
                        step,
                        "result does not belong to the queue head",
                    ));
                }
                self.write_analysis_output(output)?;
                if let Some(scope) = step.usage_scope() {
                    self.usage.record(scope, usage);
                }
                self.stats.record_success(StatsCategory::Analysis);
                self.analysis.failure = None;
                if step.is_queue_step() {
                    self.analysis.queue.pop_front();
                } else {
                    self.analysis.step_done = true;
                }
            }
            ProjectPatch::AnalysisFailed {
                step,
                item,
                message,
                usage,
            } => {
                self.expect_sub_step(step, "record analysis failure")?;
                if let Some(scope) = step.usage_scope() {
                    self.usage.record(scope, usage);
                }
                // Queue items are counted once resolved (skip or successful retry)
                if !step.is_queue_step() {
                    self.stats.record_error(StatsCategory::Analysis);
                }
                self.analysis.failure = Some(StepFailure {
                    step,
                    item,
                    message,
                });
            }
            ProjectPatch::AnalysisFailureCleared { step } => {
                self.expect_sub_step(step, "retry")?;
                self.analysis.failure = None;
            }
            ProjectPatch::AnalysisItemSkipped { step } => {
                self.expect_sub_step(step, "skip")?;
                if !step.is_queue_step() || self.analysis.queue.is_empty() {
                    return Err(PipelineError::invalid_command(
                        "skip",
                        step,
                        "no queued item to skip",
                    ));
                }
                self.analysis.queue.pop_front();
                self.analysis.failure = None;
                self.stats.record_error(StatsCategory::Analysis);
            }
            ProjectPatch::EpisodeStarted { episode_id, status } => {
                if !matches!(
                    status,
                    EpisodeStatus::Generating | EpisodeStatus::GeneratingSora
                ) {
                    return Err(PipelineError::invalid_command(
                        "start episode",
                        self.phase,
                        format!("{} is not a generation status", status),
                    ));
                }
                let episode = self.transition(episode_id, status)?;
                episode.error_msg = None;
            }
            ProjectPatch::ShotsGenerated {
                episode_id,
                shots,
                usage,
            } => {
                let episode = self.transition(episode_id, EpisodeStatus::ReviewShots)?;
                episode.shots = shots;
                episode.usage.shots += usage;
                self.usage.record(UsageScope::ShotGeneration, usage);
                self.stats.record_success(StatsCategory::Shots);
            }
            ProjectPatch::EpisodeFailed {
                episode_id,
                stage,
                message,
                usage,
                call_usage,
            } => {
                let episode = self.transition(episode_id, EpisodeStatus::Error)?;
                episode.error_msg = Some(message);
                match stage {
                    GenerationStage::Shots => {
                        episode.usage.shots += call_usage;
                        self.usage.record(UsageScope::ShotGeneration, call_usage);
                        self.stats.record_error(StatsCategory::Shots);
                    }
                    GenerationStage::Prompts => {
                        if let Some(usage) = usage {
                            episode.usage.prompts = usage;
                        }
                        self.usage.record(UsageScope::PromptGeneration, call_usage);
                        self.stats.record_error(StatsCategory::Prompts);
                    }
                }
            }
            ProjectPatch::ScenePromptsMerged {
                episode_id,
                prompts,
                episode_usage,
                call_usage,
            } => {
                let episode = self.episode_mut(episode_id)?;
                if episode.status != EpisodeStatus::GeneratingSora {
                    return Err(PipelineError::InvalidTransition {
                        episode_id,
                        from: episode.status.to_string(),
                        to: "prompt merge".to_string(),
                    });
                }
                for prompt in prompts {
                    if let Some(shot) = episode.shots.iter_mut().find(|s| s.id == prompt.id) {
                        shot.sora_prompt = Some(prompt.prompt);
                    }
                }
                episode.usage.prompts = episode_usage;
                self.usage.record(UsageScope::PromptGeneration, call_usage);
            }
            ProjectPatch::PromptsCompleted { episode_id } => {
                self.transition(episode_id, EpisodeStatus::ReviewSora)?;
                self.stats.record_success(StatsCategory::Prompts);
            }
            ProjectPatch::EpisodeStatusSet { episode_id, status } => {
                if status == EpisodeStatus::ConfirmedShots
                    && !self.episode(episode_id).is_some_and(Episode::has_shots)
                {
                    return Err(PipelineError::validation(
                        ValidationErrorKind::MissingField,
                        format!("episode {} has no shots to confirm", episode_id),
                    ));
                }
                self.transition(episode_id, status)?;
            }
            ProjectPatch::ShotsImported { episode_id, shots } => {
                if shots.is_empty() {
                    return Err(PipelineError::validation(
                        ValidationErrorKind::MissingField,
                        format!("episode {} import has no shots", episode_id),
                    ));
                }
                let episode = self.episode_mut(episode_id)?;
                if !episode.status.accepts_import() {
                    return Err(PipelineError::InvalidTransition {
                        episode_id,
                        from: episode.status.to_string(),
                        to: EpisodeStatus::ConfirmedShots.to_string(),
                    });
                }
                episode.shots = shots;
                episode.status = EpisodeStatus::ConfirmedShots;
                episode.error_msg = None;
            }
        }
        self.revision += 1;
        Ok(())
    }

    fn write_analysis_output(&mut self, output: AnalysisOutput) -> Result<()> {
        match output {
            AnalysisOutput::ProjectSummary(summary) => self.context.project_summary = summary,
            AnalysisOutput::EpisodeSummary {
                episode_id,
                summary,
            } => {
                self.episode_mut(episode_id)?.summary = summary.clone();
                self.context.upsert_episode_summary(episode_id, summary);
            }
            AnalysisOutput::CharacterList(characters) => self.context.characters = characters,
            AnalysisOutput::CharacterForms {
                character_id,
                forms,
            } => {
                let character = self
                    .context
                    .characters
                    .iter_mut()
                    .find(|c| c.id == character_id)
                    .ok_or_else(|| unknown_reference("character", &character_id))?;
                character.forms = forms;
            }
            AnalysisOutput::LocationList(locations) => self.context.locations = locations,
            AnalysisOutput::LocationVisuals {
                location_id,
                visuals,
            } => {
                let location = self
                    .context
                    .locations
                    .iter_mut()
                    .find(|l| l.id == location_id)
                    .ok_or_else(|| unknown_reference("location", &location_id))?;
                location.visuals = Some(visuals);
            }
        }
        Ok(())
    }
}

fn unknown_reference(kind: &str, id: &str) -> PipelineError {
    PipelineError::validation(
        ValidationErrorKind::UnknownReference,
        format!("unknown {} '{}'", kind, id),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with_shots() -> ProjectState {
        let mut ep = Episode::new(1, "Pilot", "INT. HOUSE");
        ep.shots = vec![Shot::new("1-01", "a"), Shot::new("1-02", "b")];
        ProjectState::new("demo", "script", vec![ep, Episode::new(2, "Two", "EXT.")])
    }

    #[test]
    fn test_illegal_transition_rejected_without_change() {
        let mut state = state_with_shots();
        let before = state.clone();
        let err = state
            .apply(ProjectPatch::PromptsCompleted { episode_id: 1 })
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidTransition { .. }));
        assert_eq!(state, before);
    }

    #[test]
    fn test_unknown_episode() {
        let mut state = state_with_shots();
        let err = state
            .apply(ProjectPatch::EpisodeStarted {
                episode_id: 9,
                status: EpisodeStatus::Generating,
            })
            .unwrap_err();
        assert!(matches!(err, PipelineError::UnknownEpisode(9)));
    }

    #[test]
    fn test_shots_generated_records_usage_and_stats() {
        let mut state = state_with_shots();
        state
            .apply(ProjectPatch::EpisodeStarted {
                episode_id: 2,
                status: EpisodeStatus::Generating,
            })
            .unwrap();
        state
            .apply(ProjectPatch::ShotsGenerated {
                episode_id: 2,
                shots: vec![Shot::new("2-01", "x")],
                usage: TokenUsage::from_counts(10, 5),
            })
            .unwrap();

        let ep = state.episode(2).unwrap();
        assert_eq!(ep.status, EpisodeStatus::ReviewShots);
        assert_eq!(ep.usage.shots.total_tokens, 15);
        assert_eq!(state.usage.scope(UsageScope::ShotGeneration).total_tokens, 15);
        assert_eq!(state.stats.shots.success, 1);
        assert_eq!(state.revision, 2);
    }

    #[test]
    fn test_prompt_merge_touches_only_listed_shots() {
        let mut state = state_with_shots();
        state
            .apply(ProjectPatch::EpisodeStatusSet {
                episode_id: 1,
                status: EpisodeStatus::ConfirmedShots,
            })
            .unwrap();
        state
            .apply(ProjectPatch::EpisodeStarted {
                episode_id: 1,
                status: EpisodeStatus::GeneratingSora,
            })
            .unwrap();
        state
            .apply(ProjectPatch::ScenePromptsMerged {
                episode_id: 1,
                prompts: vec![
                    ShotPrompt {
                        id: "1-02".into(),
                        prompt: "slow dolly".into(),
                    },
                    ShotPrompt {
                        id: "9-99".into(),
                        prompt: "stray".into(),
                    },
                ],
                episode_usage: TokenUsage::from_counts(3, 3),
                call_usage: TokenUsage::from_counts(3, 3),
            })
            .unwrap();

        let ep = state.episode(1).unwrap();
        assert_eq!(ep.shots[0].sora_prompt, None);
        assert_eq!(ep.shots[1].sora_prompt.as_deref(), Some("slow dolly"));
        assert_eq!(ep.usage.prompts.total_tokens, 6);
    }

    #[test]
    fn test_confirm_requires_shots() {
        let mut state = state_with_shots();
        let err = state
            .apply(ProjectPatch::EpisodeStatusSet {
                episode_id: 2,
                status: EpisodeStatus::ConfirmedShots,
            })
            .unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
    }

    #[test]
    fn test_queue_success_must_match_head() {
        let mut state = state_with_shots();
        state
            .apply(ProjectPatch::SubStepEntered {
                step: AnalysisSubStep::EpisodeSummaries,
                queue: vec![WorkItem::Episode(1), WorkItem::Episode(2)],
            })
            .unwrap();
        let err = state
            .apply(ProjectPatch::AnalysisSucceeded {
                step: AnalysisSubStep::EpisodeSummaries,
                item: Some(WorkItem::Episode(2)),
                output: AnalysisOutput::EpisodeSummary {
                    episode_id: 2,
                    summary: "s".into(),
                },
                usage: TokenUsage::default(),
            })
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidCommand { .. }));
        assert_eq!(state.analysis.queue.len(), 2);
    }

    #[test]
    fn test_skip_pops_head_and_counts_error() {
        let mut state = state_with_shots();
        state
            .apply(ProjectPatch::SubStepEntered {
                step: AnalysisSubStep::EpisodeSummaries,
                queue: vec![WorkItem::Episode(1), WorkItem::Episode(2)],
            })
            .unwrap();
        state
            .apply(ProjectPatch::AnalysisFailed {
                step: AnalysisSubStep::EpisodeSummaries,
                item: Some(WorkItem::Episode(1)),
                message: "boom".into(),
                usage: TokenUsage::from_counts(40, 10),
            })
            .unwrap();
        assert_eq!(state.stats.analysis.error, 0);
        assert_eq!(
            state.usage.scope(UsageScope::EpisodeSummaries).total_tokens,
            50
        );

        state
            .apply(ProjectPatch::AnalysisItemSkipped {
                step: AnalysisSubStep::EpisodeSummaries,
            })
            .unwrap();
        assert_eq!(state.analysis.queue.front(), Some(&WorkItem::Episode(2)));
        assert!(state.analysis.failure.is_none());
        assert_eq!(state.stats.analysis.error, 1);
        assert_eq!(state.stats.analysis.total, 1);
    }

    #[test]
    fn test_import_rejected_after_prompt_generation_started() {
        let mut state = state_with_shots();
        state
            .apply(ProjectPatch::EpisodeStatusSet {
                episode_id: 1,
                status: EpisodeStatus::ConfirmedShots,
            })
            .unwrap();
        state
            .apply(ProjectPatch::EpisodeStarted {
                episode_id: 1,
                status: EpisodeStatus::GeneratingSora,
            })
            .unwrap();
        let err = state
            .apply(ProjectPatch::ShotsImported {
                episode_id: 1,
                shots: vec![Shot::new("1-01", "new")],
            })
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidTransition { .. }));
    }

    #[test]
    fn test_import_cannot_clear_failed_episode() {
        let mut state = state_with_shots();
        for patch in [
            ProjectPatch::EpisodeStatusSet {
                episode_id: 1,
                status: EpisodeStatus::ConfirmedShots,
            },
            ProjectPatch::EpisodeStarted {
                episode_id: 1,
                status: EpisodeStatus::GeneratingSora,
            },
            ProjectPatch::EpisodeFailed {
                episode_id: 1,
                stage: GenerationStage::Prompts,
                message: "chunk 2 failed".into(),
                usage: Some(TokenUsage::from_counts(60, 60)),
                call_usage: TokenUsage::default(),
            },
        ] {
            state.apply(patch).unwrap();
        }
        let revision = state.revision;

        let err = state
            .apply(ProjectPatch::ShotsImported {
                episode_id: 1,
                shots: vec![Shot::new("1-01", "new")],
            })
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidTransition { .. }));

        let ep = state.episode(1).unwrap();
        assert_eq!(ep.status, EpisodeStatus::Error);
        assert_eq!(ep.usage.prompts.total_tokens, 120);
        assert_eq!(state.revision, revision);
    }

    #[test]
    fn test_rejected_shot_call_usage_is_recorded() {
        let mut state = state_with_shots();
        state
            .apply(ProjectPatch::EpisodeStarted {
                episode_id: 2,
                status: EpisodeStatus::Generating,
            })
            .unwrap();
        state
            .apply(ProjectPatch::EpisodeFailed {
                episode_id: 2,
                stage: GenerationStage::Shots,
                message: "duplicate shot id '2-01'".into(),
                usage: None,
                call_usage: TokenUsage::from_counts(100, 25),
            })
            .unwrap();

        assert_eq!(state.episode(2).unwrap().usage.shots.total_tokens, 125);
        assert_eq!(state.usage.scope(UsageScope::ShotGeneration).total_tokens, 125);
        assert_eq!(state.usage.overall().total_tokens, 125);
        assert_eq!(state.stats.shots.error, 1);
    }

    #[test]
    fn test_state_serde_roundtrip_keeps_prompt_sentinel() {
        let mut state = state_with_shots();
        state.episodes[0].shots[0].sora_prompt = Some(String::new());
        let json = serde_json::to_string(&state).unwrap();
        let back: ProjectState = serde_json::from_str(&json).unwrap();
        assert_eq!(back.episodes[0].shots[0].sora_prompt, Some(String::new()));
        assert_eq!(back.episodes[0].shots[1].sora_prompt, None);
    }

    #[test]
    fn test_patch_kind_and_episode() {
        let patch = ProjectPatch::PromptsCompleted { episode_id: 4 };
        assert_eq!(patch.kind(), "prompts_completed");
        assert_eq!(patch.episode_id(), Some(4));
        assert_eq!(ProjectPatch::CursorMoved { cursor: 1 }.episode_id(), None);
    }
}
