//! Usage and Outcome Metrics
//!
//! Two additive counters carried inside the project state:
//!
//! - `UsageLedger`: token usage, overall and per scope (analysis sub-step or
//!   generation phase). Only `record` mutates it, so no total ever decreases.
//! - `StatsCounter`: `{total, success, error}` per phase category. Every
//!   recorded outcome bumps `total` together with exactly one of the others.
//!
//! ## Usage
//!
//! ```ignore
//! let mut ledger = UsageLedger::default();
//! ledger.record(UsageScope::ProjectSummary, response.usage);
//! println!("{}", ledger.overall());
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ai::provider::TokenUsage;

// =============================================================================
// Usage Ledger
// =============================================================================

/// Bucket a generation call is charged to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageScope {
    ProjectSummary,
    EpisodeSummaries,
    CharacterList,
    CharacterDeepDive,
    LocationList,
    LocationDeepDive,
    ShotGeneration,
    PromptGeneration,
}

impl UsageScope {
    pub const ALL: [UsageScope; 8] = [
        Self::ProjectSummary,
        Self::EpisodeSummaries,
        Self::CharacterList,
        Self::CharacterDeepDive,
        Self::LocationList,
        Self::LocationDeepDive,
        Self::ShotGeneration,
        Self::PromptGeneration,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProjectSummary => "project_summary",
            Self::EpisodeSummaries => "episode_summaries",
            Self::CharacterList => "character_list",
            Self::CharacterDeepDive => "character_deep_dive",
            Self::LocationList => "location_list",
            Self::LocationDeepDive => "location_deep_dive",
            Self::ShotGeneration => "shot_generation",
            Self::PromptGeneration => "prompt_generation",
        }
    }
}

impl fmt::Display for UsageScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Additive token-usage accumulator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UsageLedger {
    overall: TokenUsage,
    scopes: BTreeMap<UsageScope, TokenUsage>,
}

impl UsageLedger {
    /// Merge one call's usage into the overall total and its scope
    pub fn record(&mut self, scope: UsageScope, usage: TokenUsage) {
        self.overall += usage;
        *self.scopes.entry(scope).or_default() += usage;
    }

    pub fn overall(&self) -> TokenUsage {
        self.overall
    }

    pub fn scope(&self, scope: UsageScope) -> TokenUsage {
        self.scopes.get(&scope).copied().unwrap_or_default()
    }

    /// Non-empty scopes in declaration order
    pub fn scopes(&self) -> impl Iterator<Item = (UsageScope, TokenUsage)> + '_ {
        self.scopes.iter().map(|(scope, usage)| (*scope, *usage))
    }
}

// =============================================================================
// Stats Counter
// =============================================================================

/// Phase category a unit of work is counted under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatsCategory {
    Analysis,
    Shots,
    Prompts,
}

impl fmt::Display for StatsCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Analysis => write!(f, "analysis"),
            Self::Shots => write!(f, "shots"),
            Self::Prompts => write!(f, "prompts"),
        }
    }
}

/// Outcome counts of one category
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub total: u64,
    pub success: u64,
    pub error: u64,
}

/// Monotonic per-category outcome counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsCounter {
    pub analysis: Stats,
    pub shots: Stats,
    pub prompts: Stats,
}

impl StatsCounter {
    pub fn record_success(&mut self, category: StatsCategory) {
        let stats = self.get_mut(category);
        stats.total += 1;
        stats.success += 1;
    }

    pub fn record_error(&mut self, category: StatsCategory) {
        let stats = self.get_mut(category);
        stats.total += 1;
        stats.error += 1;
    }

    pub fn get(&self, category: StatsCategory) -> Stats {
        match category {
            StatsCategory::Analysis => self.analysis,
            StatsCategory::Shots => self.shots,
            StatsCategory::Prompts => self.prompts,
        }
    }

    fn get_mut(&mut self, category: StatsCategory) -> &mut Stats {
        match category {
            StatsCategory::Analysis => &mut self.analysis,
            StatsCategory::Shots => &mut self.shots,
            StatsCategory::Prompts => &mut self.prompts,
        }
    }
}
