//! Analysis Sub-Step Runner
//!
//! Phase 1. Single steps (project summary, character list, location list)
//! make one call and wait for confirmation. Queue steps (episode summaries,
//! character deep dive, location deep dive) drain a work queue seeded on
//! entry, one item per call, head first. A failed queue item stays at the
//! head until it is retried or skipped.

use std::collections::HashSet;

use tracing::{debug, info, instrument, warn};

use super::{AnalysisSubStep, Phase, PipelineSettings, RunOutcome};
use crate::ai::provider::TokenUsage;
use crate::generation::{SharedGenerationService, truncate_chars};
use crate::storage::{
    AnalysisOutput, ProjectPatch, ProjectState, SharedStore, StepFailure, WorkItem,
};
use crate::types::{PipelineError, Result};

pub struct AnalysisSubStepRunner {
    store: SharedStore,
    service: SharedGenerationService,
    settings: PipelineSettings,
}

impl AnalysisSubStepRunner {
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

    /// Enter the first sub-step and run it
    pub async fn start(&self) -> Result<RunOutcome> {
        let state = self.store.snapshot()?;
        if state.analysis.sub_step != AnalysisSubStep::Idle {
            return Err(PipelineError::invalid_command(
                "start analysis",
                state.analysis.sub_step,
                "analysis already started",
            ));
        }
        self.enter(AnalysisSubStep::ProjectSummary, &state).await
    }

    /// Work on the current sub-step until it needs confirmation or fails.
    /// A pending failure is reported, never re-run.
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<RunOutcome> {
        let state = self.store.snapshot()?;
        let step = state.analysis.sub_step;

        if let Some(failure) = &state.analysis.failure {
            return Ok(halted(failure));
        }

        match step {
            AnalysisSubStep::Idle => Err(PipelineError::invalid_command(
                "run analysis",
                step,
                "analysis has not started",
            )),
            AnalysisSubStep::Complete => Ok(RunOutcome::awaiting(
                Phase::Analysis,
                "analysis complete, confirm to start shot generation",
            )),
            _ if step.is_queue_step() => self.drain(step).await,
            _ if state.analysis.step_done => Ok(awaiting_step(step)),
            _ => self.run_single(step, &state).await,
        }
    }

    /// Advance to the next sub-step once the current one is finished
    pub async fn confirm(&self) -> Result<RunOutcome> {
        let state = self.store.snapshot()?;
        let step = state.analysis.sub_step;

        if state.analysis.failure.is_some() {
            return Err(PipelineError::invalid_command(
                "confirm",
                step,
                "resolve the failed item with retry or skip first",
            ));
        }
        if !state.analysis.is_step_complete() {
            return Err(PipelineError::invalid_command(
                "confirm",
                step,
                "the sub-step has not finished",
            ));
        }

        match step.next() {
            Some(next) => self.enter(next, &state).await,
            None => Err(PipelineError::invalid_command(
                "confirm",
                step,
                "analysis is complete",
            )),
        }
    }

    /// Re-issue the failed call
    pub async fn retry(&self) -> Result<RunOutcome> {
        let state = self.store.snapshot()?;
        let step = state.analysis.sub_step;
        let Some(failure) = &state.analysis.failure else {
            return Err(PipelineError::invalid_command(
                "retry",
                step,
                "there is no failed item",
            ));
        };

        info!(%step, item = ?failure.item, "Retrying failed analysis call");
        self.store
            .apply(ProjectPatch::AnalysisFailureCleared { step })?;
        self.run().await
    }

    /// Drop the failed head item, count it as an error, keep draining
    pub async fn skip(&self) -> Result<RunOutcome> {
        let state = self.store.snapshot()?;
        let step = state.analysis.sub_step;

        if !step.is_queue_step() {
            return Err(PipelineError::invalid_command(
                "skip",
                step,
                "only queue-driven steps can skip an item; use retry",
            ));
        }
        let Some(failure) = &state.analysis.failure else {
            return Err(PipelineError::invalid_command(
                "skip",
                step,
                "there is no failed item",
            ));
        };

        warn!(%step, item = ?failure.item, "Skipping failed analysis item");
        self.store.apply(ProjectPatch::AnalysisItemSkipped { step })?;
        self.run().await
    }

    async fn enter(&self, step: AnalysisSubStep, state: &ProjectState) -> Result<RunOutcome> {
        let queue = seed_queue(step, state);
        info!(%step, queued = queue.len(), "Entering analysis sub-step");
        self.store
            .apply(ProjectPatch::SubStepEntered { step, queue })?;
        self.run().await
    }

    async fn run_single(&self, step: AnalysisSubStep, state: &ProjectState) -> Result<RunOutcome> {
        let script = truncate_chars(&state.script, self.settings.max_script_chars);
        let project_summary = state.context.project_summary.as_str();

        let result = match step {
            AnalysisSubStep::ProjectSummary => self
                .service
                .project_summary(&script, &self.settings.style_guide)
                .await
                .map(|g| (AnalysisOutput::ProjectSummary(g.result), g.usage)),
            AnalysisSubStep::CharacterList => self
                .service
                .character_list(&script, project_summary)
                .await
                .map(|mut g| {
                    assign_ids(g.result.iter_mut().map(|c| &mut c.id), "char");
                    (AnalysisOutput::CharacterList(g.result), g.usage)
                }),
            AnalysisSubStep::LocationList => self
                .service
                .location_list(&script, project_summary)
                .await
                .map(|mut g| {
                    assign_ids(g.result.iter_mut().map(|l| &mut l.id), "loc");
                    (AnalysisOutput::LocationList(g.result), g.usage)
                }),
            _ => {
                return Err(PipelineError::invalid_command(
                    "run analysis",
                    step,
                    "not a single-call step",
                ));
            }
        };

        Ok(self
            .record(step, None, result)?
            .unwrap_or_else(|| awaiting_step(step)))
    }

    /// Level-triggered drain: while the queue has a head and nothing is in
    /// flight, process the head.
    async fn drain(&self, step: AnalysisSubStep) -> Result<RunOutcome> {
        loop {
            let state = self.store.snapshot()?;
            let Some(item) = state.analysis.queue.front().cloned() else {
                return Ok(awaiting_step(step));
            };

            debug!(%step, %item, remaining = state.analysis.queue.len(), "Processing queue head");
            let result = self.process_item(&item, &state).await;
            if let Some(halt) = self.record(step, Some(item), result)? {
                return Ok(halt);
            }
        }
    }

    async fn process_item(
        &self,
        item: &WorkItem,
        state: &ProjectState,
    ) -> Result<(AnalysisOutput, TokenUsage)> {
        let script = truncate_chars(&state.script, self.settings.max_script_chars);
        let context = &state.context;

        match item {
            WorkItem::Episode(id) => {
                let episode = state.episode(*id).ok_or(PipelineError::UnknownEpisode(*id))?;
                let generated = self
                    .service
                    .episode_summary(&episode.title, &episode.content, &context.project_summary)
                    .await?;
                Ok((
                    AnalysisOutput::EpisodeSummary {
                        episode_id: *id,
                        summary: generated.result,
                    },
                    generated.usage,
                ))
            }
            WorkItem::Character(id) => {
                let character = context
                    .characters
                    .iter()
                    .find(|c| &c.id == id)
                    .ok_or_else(|| missing(item))?;
                let generated = self
                    .service
                    .character_deep_dive(
                        &character.name,
                        &script,
                        &context.project_summary,
                        &self.settings.style_guide,
                    )
                    .await?;
                Ok((
                    AnalysisOutput::CharacterForms {
                        character_id: id.clone(),
                        forms: generated.result,
                    },
                    generated.usage,
                ))
            }
            WorkItem::Location(id) => {
                let location = context
                    .locations
                    .iter()
                    .find(|l| &l.id == id)
                    .ok_or_else(|| missing(item))?;
                let generated = self
                    .service
                    .location_deep_dive(&location.name, &script, &self.settings.style_guide)
                    .await?;
                Ok((
                    AnalysisOutput::LocationVisuals {
                        location_id: id.clone(),
                        visuals: generated.result,
                    },
                    generated.usage,
                ))
            }
        }
    }

    /// Turn a call result into a patch. Generation failures become state
    /// and come back as the halt outcome.
    fn record(
        &self,
        step: AnalysisSubStep,
        item: Option<WorkItem>,
        result: Result<(AnalysisOutput, TokenUsage)>,
    ) -> Result<Option<RunOutcome>> {
        match result {
            Ok((output, usage)) => {
                info!(%step, item = ?item, tokens = usage.total_tokens, "Analysis call succeeded");
                self.store.apply(ProjectPatch::AnalysisSucceeded {
                    step,
                    item,
                    output,
                    usage,
                })?;
                Ok(None)
            }
            Err(e) => {
                let message = e.to_string();
                warn!(%step, item = ?item, "Analysis call failed: {}", message);
                let failure = StepFailure {
                    step,
                    item: item.clone(),
                    message: message.clone(),
                };
                self.store.apply(ProjectPatch::AnalysisFailed {
                    step,
                    item,
                    message,
                    usage: e.spent_usage(),
                })?;
                Ok(Some(halted(&failure)))
            }
        }
    }
}

/// Work queue of a sub-step, in enumeration order
fn seed_queue(step: AnalysisSubStep, state: &ProjectState) -> Vec<WorkItem> {
    let context = &state.context;
    match step {
        AnalysisSubStep::EpisodeSummaries => state
            .episodes
            .iter()
            .map(|e| WorkItem::Episode(e.id))
            .collect(),
        AnalysisSubStep::CharacterDeepDive => context
            .main_characters()
            .map(|c| WorkItem::Character(c.id.clone()))
            .collect(),
        AnalysisSubStep::LocationDeepDive => context
            .core_locations()
            .map(|l| WorkItem::Location(l.id.clone()))
            .collect(),
        _ => Vec::new(),
    }
}

/// Keep unique non-empty ids, give the rest `<prefix>-NN`
fn assign_ids<'a>(ids: impl Iterator<Item = &'a mut String>, prefix: &str) {
    let mut taken = HashSet::new();
    let mut missing = Vec::new();

    for id in ids {
        let trimmed = id.trim().to_string();
        if trimmed.is_empty() || !taken.insert(trimmed.clone()) {
            missing.push(id);
        } else {
            *id = trimmed;
        }
    }

    let mut counter = 0;
    for id in missing {
        let fresh = loop {
            counter += 1;
            let candidate = format!("{}-{:02}", prefix, counter);
            if !taken.contains(&candidate) {
                break candidate;
            }
        };
        taken.insert(fresh.clone());
        *id = fresh;
    }
}

fn missing(item: &WorkItem) -> PipelineError {
    PipelineError::generation(item.to_string(), "no longer present in the project context")
}

fn awaiting_step(step: AnalysisSubStep) -> RunOutcome {
    RunOutcome::awaiting(Phase::Analysis, format!("{} finished", step))
}

fn halted(failure: &StepFailure) -> RunOutcome {
    let unit = match &failure.item {
        Some(item) => format!("{} ({})", failure.step, item),
        None => failure.step.to_string(),
    };
    RunOutcome::halted(Phase::Analysis, unit, failure.message.clone())
}
