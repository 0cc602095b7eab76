//! Scripted generation service and harness for pipeline tests

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::{AnalysisSubStep, Command, PhaseController, PipelineSettings, scene_key};
use crate::ai::provider::TokenUsage;
use crate::generation::{EpisodeShotsRequest, GenerationService, Generated, ScenePromptsRequest};
use crate::storage::{MemoryStore, ProjectState, ProjectStore};
use crate::types::{
    Character, CharacterForm, Episode, Location, LocationType, LocationVisuals, PipelineError,
    Result, Shot, ShotPrompt,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Op {
    ProjectSummary,
    EpisodeSummary,
    CharacterList,
    CharacterDeepDive,
    LocationList,
    LocationDeepDive,
    EpisodeShots,
    ScenePrompts,
}

struct FailRule {
    op: Op,
    key: Option<String>,
    remaining: usize,
    spent: TokenUsage,
}

#[derive(Default)]
struct Script {
    rules: Vec<FailRule>,
    dropped_prompts: Vec<String>,
    calls: Vec<(Op, String)>,
}

/// Deterministic `GenerationService` with injectable failures.
///
/// Calls are logged under a key: episode title for summaries and shot
/// lists, name for deep dives, scene key for scene prompts, empty otherwise.
#[derive(Default)]
pub(crate) struct ScriptedService {
    script: Mutex<Script>,
}

impl ScriptedService {
    /// Fail the next `times` calls of `op` (matching `key` when given)
    pub fn fail(&self, op: Op, key: Option<&str>, times: usize) {
        self.push_rule(op, key, times, TokenUsage::default());
    }

    /// Like `fail`, but each failed call reports the tokens it consumed,
    /// as a rejected payload does
    pub fn reject(&self, op: Op, key: Option<&str>, times: usize) {
        self.push_rule(op, key, times, self.usage_per_call());
    }

    fn push_rule(&self, op: Op, key: Option<&str>, times: usize, spent: TokenUsage) {
        self.script.lock().unwrap().rules.push(FailRule {
            op,
            key: key.map(str::to_string),
            remaining: times,
            spent,
        });
    }

    /// Leave this shot out of every scene-prompt response
    pub fn drop_prompt(&self, shot_id: &str) {
        self.script
            .lock()
            .unwrap()
            .dropped_prompts
            .push(shot_id.to_string());
    }

    pub fn calls(&self, op: Op) -> Vec<String> {
        self.script
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|(o, _)| *o == op)
            .map(|(_, key)| key.clone())
            .collect()
    }

    pub fn usage_per_call(&self) -> TokenUsage {
        TokenUsage::from_counts(100, 20)
    }

    fn call<T>(&self, op: Op, key: &str, result: T) -> Result<Generated<T>> {
        let mut script = self.script.lock().unwrap();
        script.calls.push((op, key.to_string()));

        let rule = script.rules.iter_mut().find(|rule| {
            rule.op == op
                && rule.remaining > 0
                && rule.key.as_deref().is_none_or(|k| k == key)
        });
        if let Some(rule) = rule {
            rule.remaining -= 1;
            return Err(
                PipelineError::generation(format!("{:?} {}", op, key), "scripted failure")
                    .with_usage(rule.spent),
            );
        }

        Ok(Generated::new(result, self.usage_per_call()))
    }
}

#[async_trait]
impl GenerationService for ScriptedService {
    async fn project_summary(&self, _script: &str, _style_guide: &str) -> Result<Generated<String>> {
        self.call(Op::ProjectSummary, "", "A crew plans one last heist.".to_string())
    }

    async fn episode_summary(
        &self,
        title: &str,
        _content: &str,
        _project_summary: &str,
    ) -> Result<Generated<String>> {
        self.call(Op::EpisodeSummary, title, format!("What happens in {}", title))
    }

    async fn character_list(
        &self,
        _script: &str,
        _project_summary: &str,
    ) -> Result<Generated<Vec<Character>>> {
        let character = |name: &str, is_main: bool| Character {
            name: name.to_string(),
            is_main,
            ..Default::default()
        };
        self.call(
            Op::CharacterList,
            "",
            vec![
                character("Mara", true),
                character("Theo", true),
                character("Guard", false),
            ],
        )
    }

    async fn character_deep_dive(
        &self,
        name: &str,
        _script: &str,
        _project_summary: &str,
        _style_guide: &str,
    ) -> Result<Generated<Vec<CharacterForm>>> {
        self.call(
            Op::CharacterDeepDive,
            name,
            vec![CharacterForm {
                name: "default".to_string(),
                appearance: format!("{} in a grey coat", name),
            }],
        )
    }

    async fn location_list(
        &self,
        _script: &str,
        _project_summary: &str,
    ) -> Result<Generated<Vec<Location>>> {
        let location = |name: &str, kind: LocationType| Location {
            name: name.to_string(),
            kind,
            ..Default::default()
        };
        self.call(
            Op::LocationList,
            "",
            vec![
                location("Vault", LocationType::Core),
                location("Street", LocationType::Secondary),
            ],
        )
    }

    async fn location_deep_dive(
        &self,
        name: &str,
        _script: &str,
        _style_guide: &str,
    ) -> Result<Generated<LocationVisuals>> {
        self.call(
            Op::LocationDeepDive,
            name,
            LocationVisuals {
                atmosphere: "tense".to_string(),
                lighting: "cold fluorescent".to_string(),
                key_elements: vec!["steel door".to_string()],
            },
        )
    }

    async fn episode_shots(&self, request: EpisodeShotsRequest<'_>) -> Result<Generated<Vec<Shot>>> {
        let n = request.index + 1;
        let shots = vec![
            Shot::new(format!("{}-1-01", n), "establishing"),
            Shot::new(format!("{}-1-02", n), "reaction"),
            Shot::new(format!("{}-2-01", n), "exit"),
        ];
        self.call(Op::EpisodeShots, request.title, shots)
    }

    async fn scene_prompts(
        &self,
        request: ScenePromptsRequest<'_>,
    ) -> Result<Generated<Vec<ShotPrompt>>> {
        let key = request
            .shots
            .first()
            .map(|shot| scene_key(&shot.id).to_string())
            .unwrap_or_default();
        let dropped = self.script.lock().unwrap().dropped_prompts.clone();
        let prompts = request
            .shots
            .iter()
            .filter(|shot| !dropped.contains(&shot.id))
            .map(|shot| ShotPrompt {
                id: shot.id.clone(),
                prompt: format!("cinematic {}", shot.description),
            })
            .collect();
        self.call(Op::ScenePrompts, &key, prompts)
    }
}

pub(crate) struct Harness {
    pub store: Arc<MemoryStore>,
    pub service: Arc<ScriptedService>,
    pub controller: PhaseController,
}

impl Harness {
    /// Run analysis through to COMPLETE, confirming every sub-step
    pub async fn finish_analysis(&self) {
        self.controller.execute(Command::Run).await.unwrap();
        while self.store.snapshot().unwrap().analysis.sub_step != AnalysisSubStep::Complete {
            self.controller.execute(Command::Confirm).await.unwrap();
        }
    }
}

/// A project of `episodes` episodes titled "Episode N", no delay between chunks
pub(crate) fn harness(episodes: u32) -> Harness {
    harness_with_delay(episodes, Duration::ZERO)
}

pub(crate) fn harness_with_delay(episodes: u32, chunk_delay: Duration) -> Harness {
    let list = (1..=episodes)
        .map(|id| Episode::new(id, format!("Episode {}", id), format!("Scene text {}", id)))
        .collect();
    let store = Arc::new(MemoryStore::new(ProjectState::new(
        "test",
        "FADE IN.",
        list,
    )));
    let service = Arc::new(ScriptedService::default());
    let settings = PipelineSettings {
        chunk_delay,
        ..Default::default()
    };
    let controller = PhaseController::new(store.clone(), service.clone(), settings);

    Harness {
        store,
        service,
        controller,
    }
}
