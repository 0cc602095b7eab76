//! Project record types
//!
//! Episodes, shots and the analysis context shared by every phase.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ai::provider::TokenUsage;

// =============================================================================
// Episode Status
// =============================================================================

/// Lifecycle of one episode across shot and prompt generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EpisodeStatus {
    #[default]
    Pending,
    Generating,
    ReviewShots,
    ConfirmedShots,
    GeneratingSora,
    ReviewSora,
    Completed,
    Error,
}

impl EpisodeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Generating => "generating",
            Self::ReviewShots => "review_shots",
            Self::ConfirmedShots => "confirmed_shots",
            Self::GeneratingSora => "generating_sora",
            Self::ReviewSora => "review_sora",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }

    /// Whether `self -> next` is a legal status change.
    ///
    /// Forward-only; `completed` is terminal; `error` is left only by
    /// re-entering a generation step. Re-entering a `generating*` status is
    /// allowed so an interrupted run can be resumed. `pending ->
    /// confirmed_shots` is the path of externally supplied shot lists.
    pub fn can_transition_to(&self, next: EpisodeStatus) -> bool {
        use EpisodeStatus::*;
        matches!(
            (self, next),
            (Pending, Generating)
                | (Pending, ConfirmedShots)
                | (Generating, Generating)
                | (Generating, ReviewShots)
                | (Generating, Error)
                | (ReviewShots, ConfirmedShots)
                | (ConfirmedShots, GeneratingSora)
                | (GeneratingSora, GeneratingSora)
                | (GeneratingSora, ReviewSora)
                | (GeneratingSora, Error)
                | (ReviewSora, Completed)
                | (Error, Generating)
                | (Error, GeneratingSora)
        )
    }

    /// Whether externally supplied shots may replace this episode's list.
    /// An `error` episode leaves that state only through `retry`.
    pub fn accepts_import(&self) -> bool {
        matches!(
            self,
            Self::Pending | Self::ReviewShots | Self::ConfirmedShots
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl fmt::Display for EpisodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EpisodeStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "generating" => Ok(Self::Generating),
            "review_shots" => Ok(Self::ReviewShots),
            "confirmed_shots" => Ok(Self::ConfirmedShots),
            "generating_sora" => Ok(Self::GeneratingSora),
            "review_sora" => Ok(Self::ReviewSora),
            "completed" => Ok(Self::Completed),
            "error" => Ok(Self::Error),
            _ => Err(format!("unknown episode status: {}", s)),
        }
    }
}

// =============================================================================
// Episodes and Shots
// =============================================================================

/// One shot of an episode's shot list.
///
/// The id is hierarchical (`episode-scene-shot`, e.g. `1-1-01`); everything
/// before the last `-` segment is the scene key.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Shot {
    pub id: String,
    pub description: String,
    /// Seconds
    pub duration: f32,
    pub shot_type: String,
    pub movement: String,
    pub dialogue: String,
    /// `None` until prompt generation produced a value for this shot
    pub sora_prompt: Option<String>,
}

impl Shot {
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            ..Default::default()
        }
    }

    pub fn has_prompt(&self) -> bool {
        self.sora_prompt.is_some()
    }
}

/// Generated prompt for one shot, as returned by scene-prompt generation
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ShotPrompt {
    pub id: String,
    pub prompt: String,
}

/// Token usage charged to one episode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EpisodeUsage {
    pub shots: TokenUsage,
    pub prompts: TokenUsage,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Episode {
    /// 1-based, contiguous, fixed at parse time
    pub id: u32,
    pub title: String,
    pub content: String,
    /// Written by the episode-summaries analysis step
    pub summary: String,
    pub shots: Vec<Shot>,
    pub status: EpisodeStatus,
    pub error_msg: Option<String>,
    pub usage: EpisodeUsage,
}

impl Episode {
    pub fn new(id: u32, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn has_shots(&self) -> bool {
        !self.shots.is_empty()
    }

    pub fn prompted_shots(&self) -> usize {
        self.shots.iter().filter(|s| s.has_prompt()).count()
    }
}

// =============================================================================
// Analysis Context
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EpisodeSummary {
    pub episode_id: u32,
    pub summary: String,
}

/// A visual variant of a main character (costume, age, condition)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CharacterForm {
    pub name: String,
    pub appearance: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Character {
    pub id: String,
    pub name: String,
    pub is_main: bool,
    pub description: String,
    /// Filled by the deep dive, main characters only
    pub forms: Vec<CharacterForm>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationType {
    Core,
    #[default]
    Secondary,
}

/// Reference visuals for a core location
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationVisuals {
    pub atmosphere: String,
    pub lighting: String,
    pub key_elements: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Location {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: LocationType,
    pub description: String,
    /// Filled by the deep dive, core locations only
    pub visuals: Option<LocationVisuals>,
}

impl Location {
    pub fn is_core(&self) -> bool {
        self.kind == LocationType::Core
    }
}

/// Everything the analysis phase learned about the script
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectContext {
    pub project_summary: String,
    pub episode_summaries: Vec<EpisodeSummary>,
    pub characters: Vec<Character>,
    pub locations: Vec<Location>,
}

impl ProjectContext {
    pub fn episode_summary(&self, episode_id: u32) -> Option<&str> {
        self.episode_summaries
            .iter()
            .find(|s| s.episode_id == episode_id)
            .map(|s| s.summary.as_str())
    }

    /// Insert or replace the summary of one episode
    pub fn upsert_episode_summary(&mut self, episode_id: u32, summary: String) {
        match self
            .episode_summaries
            .iter_mut()
            .find(|s| s.episode_id == episode_id)
        {
            Some(existing) => existing.summary = summary,
            None => self.episode_summaries.push(EpisodeSummary {
                episode_id,
                summary,
            }),
        }
    }

    pub fn main_characters(&self) -> impl Iterator<Item = &Character> {
        self.characters.iter().filter(|c| c.is_main)
    }

    pub fn core_locations(&self) -> impl Iterator<Item = &Location> {
        self.locations.iter().filter(|l| l.is_core())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [EpisodeStatus; 8] = [
        EpisodeStatus::Pending,
        EpisodeStatus::Generating,
        EpisodeStatus::ReviewShots,
        EpisodeStatus::ConfirmedShots,
        EpisodeStatus::GeneratingSora,
        EpisodeStatus::ReviewSora,
        EpisodeStatus::Completed,
        EpisodeStatus::Error,
    ];

    #[test]
    fn test_completed_is_terminal() {
        for next in ALL {
            assert!(!EpisodeStatus::Completed.can_transition_to(next));
        }
    }

    #[test]
    fn test_error_exits_only_into_generation() {
        let exits: Vec<_> = ALL
            .into_iter()
            .filter(|next| EpisodeStatus::Error.can_transition_to(*next))
            .collect();
        assert_eq!(
            exits,
            vec![EpisodeStatus::Generating, EpisodeStatus::GeneratingSora]
        );
    }

    #[test]
    fn test_import_only_before_prompt_generation() {
        let accepting: Vec<_> = ALL.into_iter().filter(|s| s.accepts_import()).collect();
        assert_eq!(
            accepting,
            vec![
                EpisodeStatus::Pending,
                EpisodeStatus::ReviewShots,
                EpisodeStatus::ConfirmedShots
            ]
        );
    }

    #[test]
    fn test_happy_path_is_legal() {
        let path = [
            EpisodeStatus::Pending,
            EpisodeStatus::Generating,
            EpisodeStatus::ReviewShots,
            EpisodeStatus::ConfirmedShots,
            EpisodeStatus::GeneratingSora,
            EpisodeStatus::ReviewSora,
            EpisodeStatus::Completed,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{:?}", pair);
        }
    }

    #[test]
    fn test_no_backwards_review() {
        assert!(!EpisodeStatus::ReviewSora.can_transition_to(EpisodeStatus::ReviewShots));
        assert!(!EpisodeStatus::ConfirmedShots.can_transition_to(EpisodeStatus::Pending));
    }

    #[test]
    fn test_status_string_roundtrip() {
        for status in ALL {
            assert_eq!(status.as_str().parse::<EpisodeStatus>().unwrap(), status);
            assert_eq!(
                serde_json::to_value(status).unwrap(),
                serde_json::Value::String(status.to_string())
            );
        }
    }

    #[test]
    fn test_upsert_episode_summary() {
        let mut ctx = ProjectContext::default();
        ctx.upsert_episode_summary(2, "first".into());
        ctx.upsert_episode_summary(2, "second".into());
        assert_eq!(ctx.episode_summaries.len(), 1);
        assert_eq!(ctx.episode_summary(2), Some("second"));
        assert_eq!(ctx.episode_summary(1), None);
    }

    #[test]
    fn test_location_type_serialized_as_type() {
        let loc = Location {
            id: "loc-1".into(),
            name: "Harbor".into(),
            kind: LocationType::Core,
            ..Default::default()
        };
        let json = serde_json::to_value(&loc).unwrap();
        assert_eq!(json["type"], "core");
        assert!(loc.is_core());
    }
}
