//! Phase Controller
//!
//! Top-level state machine. Holds no state of its own: the current phase
//! lives in the project store, and every command is routed to the runner
//! that owns that phase.

use std::fmt;

use serde::Serialize;
use tracing::{info, instrument};

use super::{
    AnalysisSubStep, AnalysisSubStepRunner, EpisodeShotGenerator, Phase, PipelineSettings,
    ScenePromptGenerator,
};
use crate::generation::SharedGenerationService;
use crate::storage::{ProjectPatch, SharedStore};
use crate::types::{EpisodeStatus, PipelineError, Result};

/// Where a runner stopped
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    /// A review point waits for `confirm`
    AwaitingConfirmation { phase: Phase, detail: String },
    /// A unit of work failed; resolve with `retry` (or `skip` in analysis queues)
    Halted {
        phase: Phase,
        unit: String,
        message: String,
    },
    /// The runner finished its phase and moved the pipeline to `next`
    PhaseFinished { next: Phase },
    Done,
}

impl RunOutcome {
    pub fn awaiting(phase: Phase, detail: impl Into<String>) -> Self {
        Self::AwaitingConfirmation {
            phase,
            detail: detail.into(),
        }
    }

    pub fn halted(phase: Phase, unit: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Halted {
            phase,
            unit: unit.into(),
            message: message.into(),
        }
    }

    pub fn is_halted(&self) -> bool {
        matches!(self, Self::Halted { .. })
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AwaitingConfirmation { phase, detail } => {
                write!(f, "[{}] waiting for confirmation: {}", phase, detail)
            }
            Self::Halted {
                phase,
                unit,
                message,
            } => write!(f, "[{}] {} failed: {}", phase, unit, message),
            Self::PhaseFinished { next } => write!(f, "entered {}", next),
            Self::Done => write!(f, "pipeline complete"),
        }
    }
}

/// User commands accepted by the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Start from IDLE or continue the current step
    Run,
    Confirm,
    Retry,
    Skip,
    /// Analysis COMPLETE -> PROMPT_GENERATION when every episode has shots
    Shortcut,
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Run => write!(f, "run"),
            Self::Confirm => write!(f, "confirm"),
            Self::Retry => write!(f, "retry"),
            Self::Skip => write!(f, "skip"),
            Self::Shortcut => write!(f, "shortcut"),
        }
    }
}

pub struct PhaseController {
    store: SharedStore,
    analysis: AnalysisSubStepRunner,
    shots: EpisodeShotGenerator,
    prompts: ScenePromptGenerator,
}

impl PhaseController {
    pub fn new(
        store: SharedStore,
        service: SharedGenerationService,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            analysis: AnalysisSubStepRunner::new(
                store.clone(),
                service.clone(),
                settings.clone(),
            ),
            shots: EpisodeShotGenerator::new(store.clone(), service.clone(), settings.clone()),
            prompts: ScenePromptGenerator::new(store.clone(), service, settings),
            store,
        }
    }

    pub fn phase(&self) -> Result<Phase> {
        Ok(self.store.snapshot()?.phase)
    }

    /// Execute one command and follow automatic phase hand-offs
    #[instrument(skip(self), fields(command = %command))]
    pub async fn execute(&self, command: Command) -> Result<RunOutcome> {
        let outcome = match command {
            Command::Run => self.run().await?,
            Command::Confirm => self.confirm().await?,
            Command::Retry => self.retry().await?,
            Command::Skip => self.skip().await?,
            Command::Shortcut => self.shortcut().await?,
        };
        self.follow(outcome).await
    }

    /// Execute a command, then confirm every review point until the
    /// pipeline is done or a failure halts it
    pub async fn execute_unattended(&self, command: Command) -> Result<RunOutcome> {
        let mut outcome = self.execute(command).await?;
        while let RunOutcome::AwaitingConfirmation { phase, detail } = &outcome {
            info!(%phase, "Auto-confirming: {}", detail);
            outcome = self.execute(Command::Confirm).await?;
        }
        Ok(outcome)
    }

    async fn run(&self) -> Result<RunOutcome> {
        let state = self.store.snapshot()?;
        match state.phase {
            Phase::Idle => self.enter_analysis().await,
            Phase::Analysis => self.analysis.run().await,
            Phase::ShotGeneration => self.shots.generate(state.cursor).await,
            Phase::PromptGeneration => self.prompts.generate(state.cursor).await,
            Phase::Done => Ok(RunOutcome::Done),
        }
    }

    async fn confirm(&self) -> Result<RunOutcome> {
        let state = self.store.snapshot()?;
        match state.phase {
            Phase::Idle => self.enter_analysis().await,
            Phase::Analysis if state.analysis.sub_step == AnalysisSubStep::Complete => {
                self.store.apply(ProjectPatch::PhaseChanged {
                    phase: Phase::ShotGeneration,
                })?;
                self.store.apply(ProjectPatch::CursorMoved { cursor: 0 })?;
                info!("Entering shot generation");
                self.shots.generate(0).await
            }
            Phase::Analysis => self.analysis.confirm().await,
            Phase::ShotGeneration => self.shots.confirm().await,
            Phase::PromptGeneration => self.prompts.confirm().await,
            Phase::Done => Err(PipelineError::invalid_command(
                Command::Confirm,
                state.phase,
                "the pipeline is already done",
            )),
        }
    }

    async fn retry(&self) -> Result<RunOutcome> {
        let phase = self.phase()?;
        match phase {
            Phase::Analysis => self.analysis.retry().await,
            Phase::ShotGeneration => self.shots.retry().await,
            Phase::PromptGeneration => self.prompts.retry().await,
            Phase::Idle | Phase::Done => Err(PipelineError::invalid_command(
                Command::Retry,
                phase,
                "nothing has failed",
            )),
        }
    }

    async fn skip(&self) -> Result<RunOutcome> {
        let phase = self.phase()?;
        if phase != Phase::Analysis {
            return Err(PipelineError::invalid_command(
                Command::Skip,
                phase,
                "only failed analysis queue items can be skipped; use retry",
            ));
        }
        self.analysis.skip().await
    }

    async fn shortcut(&self) -> Result<RunOutcome> {
        let state = self.store.snapshot()?;
        if state.phase != Phase::Analysis || state.analysis.sub_step != AnalysisSubStep::Complete
        {
            return Err(PipelineError::invalid_command(
                Command::Shortcut,
                state.phase,
                "analysis must be complete",
            ));
        }
        if !state.all_episodes_have_shots() {
            return Err(PipelineError::invalid_command(
                Command::Shortcut,
                state.phase,
                "every episode needs a shot list",
            ));
        }

        for episode in &state.episodes {
            if matches!(
                episode.status,
                EpisodeStatus::Pending | EpisodeStatus::ReviewShots
            ) {
                self.store.apply(ProjectPatch::EpisodeStatusSet {
                    episode_id: episode.id,
                    status: EpisodeStatus::ConfirmedShots,
                })?;
            }
        }

        self.store.apply(ProjectPatch::PhaseChanged {
            phase: Phase::PromptGeneration,
        })?;
        self.store.apply(ProjectPatch::CursorMoved { cursor: 0 })?;
        info!("Skipping shot generation, all episodes have shots");
        self.prompts.generate(0).await
    }

    async fn enter_analysis(&self) -> Result<RunOutcome> {
        self.store.apply(ProjectPatch::PhaseChanged {
            phase: Phase::Analysis,
        })?;
        info!("Entering analysis");
        self.analysis.start().await
    }

    /// Start the runner of a phase a previous runner handed off to
    async fn follow(&self, mut outcome: RunOutcome) -> Result<RunOutcome> {
        loop {
            match outcome {
                RunOutcome::PhaseFinished {
                    next: Phase::PromptGeneration,
                } => {
                    info!("Entering prompt generation");
                    outcome = self.prompts.generate(0).await?;
                }
                RunOutcome::PhaseFinished { next: Phase::Done } => return Ok(RunOutcome::Done),
                other => return Ok(other),
            }
        }
    }
}
