//! Status Command
//!
//! Display pipeline progress: phase, episodes, outcome counts and usage.

use serde_json::{Value, json};

use crate::ai::metrics::{StatsCategory, UsageScope};
use crate::cli::ui::Output;
use crate::cli::util::{CommandContext, is_initialized};
use crate::pipeline::Phase;
use crate::storage::{PatchLogEntry, ProjectState, ProjectStore};
use crate::types::Result;

const RECENT_PATCHES: usize = 10;

pub fn run(format: &str, detailed: bool) -> Result<()> {
    let root = std::env::current_dir()?;
    let json_output = format == "json";

    if !is_initialized(&root) {
        if json_output {
            println!("{}", json!({ "status": "not_initialized" }));
        } else {
            println!("ScriptFlow Status");
            println!("══════════════════════════════════════");
            println!("Not initialized. Run 'scriptflow init --script <file>' first.");
        }
        // Informational: an uninitialized directory is not a failure
        return Ok(());
    }

    let ctx = CommandContext::load_in(&root)?;
    let state = ctx.store.snapshot()?;
    let patches = if detailed {
        ctx.store.recent_patches(RECENT_PATCHES)?
    } else {
        Vec::new()
    };

    if json_output {
        let report = build_report(&state, &patches);
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_text(&state, &patches, detailed);
    }
    Ok(())
}

/// Machine-readable status snapshot
pub fn build_report(state: &ProjectState, patches: &[PatchLogEntry]) -> Value {
    let episodes: Vec<Value> = state
        .episodes
        .iter()
        .map(|e| {
            json!({
                "id": e.id,
                "title": e.title,
                "status": e.status,
                "shots": e.shots.len(),
                "prompted": e.prompted_shots(),
                "error": e.error_msg,
                "usage": e.usage,
            })
        })
        .collect();

    let usage: serde_json::Map<String, Value> = state
        .usage
        .scopes()
        .map(|(scope, usage)| (scope.to_string(), json!(usage)))
        .collect();

    let mut report = json!({
        "status": "initialized",
        "project": state.name,
        "phase": state.phase,
        "sub_step": state.analysis.sub_step,
        "cursor": state.cursor,
        "revision": state.revision,
        "pending_queue": state.analysis.queue.len(),
        "failure": state.analysis.failure,
        "episodes": episodes,
        "stats": state.stats,
        "usage": {
            "overall": state.usage.overall(),
            "scopes": usage,
        },
    });

    if !patches.is_empty() {
        report["recent_patches"] = json!(patches);
    }
    report
}

fn print_text(state: &ProjectState, patches: &[PatchLogEntry], detailed: bool) {
    let out = Output::new();

    println!("ScriptFlow Status");
    println!("══════════════════════════════════════");
    out.field("Project", &state.name);
    out.field("Phase", state.phase);
    if state.phase == Phase::Analysis {
        out.field("Sub-step", state.analysis.sub_step.name());
        if !state.analysis.queue.is_empty() {
            out.field("Queue", format!("{} item(s) left", state.analysis.queue.len()));
        }
    }
    if let Some(failure) = &state.analysis.failure {
        let unit = failure
            .item
            .as_ref()
            .map(|item| item.to_string())
            .unwrap_or_else(|| failure.step.name().to_string());
        out.error(&format!("{} failed: {}", unit, failure.message));
    }

    out.section("Episodes");
    for (index, episode) in state.episodes.iter().enumerate() {
        let marker = if index == state.cursor
            && matches!(state.phase, Phase::ShotGeneration | Phase::PromptGeneration)
        {
            "▶"
        } else {
            " "
        };
        println!(
            "{} {:>3}. {:<28} {:<16} {:>3} shots, {:>3} prompts",
            marker,
            episode.id,
            truncate(&episode.title, 28),
            episode.status.as_str(),
            episode.shots.len(),
            episode.prompted_shots()
        );
        if let Some(message) = &episode.error_msg {
            println!("       {}", message);
        }
    }

    out.section("Outcomes");
    for category in [
        StatsCategory::Analysis,
        StatsCategory::Shots,
        StatsCategory::Prompts,
    ] {
        let stats = state.stats.get(category);
        out.field(
            &category.to_string(),
            format!("{} total, {} ok, {} failed", stats.total, stats.success, stats.error),
        );
    }

    out.section("Token Usage");
    out.field("overall", state.usage.overall());
    if detailed {
        for scope in UsageScope::ALL {
            let usage = state.usage.scope(scope);
            if !usage.is_empty() {
                out.field(scope.as_str(), usage);
            }
        }
    }

    if !patches.is_empty() {
        out.section("Recent Changes");
        for patch in patches {
            let episode = patch
                .episode_id
                .map(|id| format!(" (episode {})", id))
                .unwrap_or_default();
            println!(
                "  #{:<5} {}{}  {}",
                patch.revision, patch.kind, episode, patch.applied_at
            );
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let head: String = text.chars().take(max_chars.saturating_sub(1)).collect();
        format!("{}…", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::provider::TokenUsage;
    use crate::storage::ProjectPatch;
    use crate::types::{Episode, Shot};

    fn state() -> ProjectState {
        let mut state = ProjectState::new(
            "heist",
            "script",
            vec![Episode::new(1, "One", "a"), Episode::new(2, "Two", "b")],
        );
        state
            .apply(ProjectPatch::ShotsImported {
                episode_id: 1,
                shots: vec![Shot::new("1-1-01", "door")],
            })
            .unwrap();
        state
    }

    #[test]
    fn test_report_lists_episodes() {
        let report = build_report(&state(), &[]);
        assert_eq!(report["project"], "heist");
        assert_eq!(report["phase"], "idle");
        assert_eq!(report["episodes"][0]["status"], "confirmed_shots");
        assert_eq!(report["episodes"][0]["shots"], 1);
        assert_eq!(report["episodes"][1]["shots"], 0);
        assert!(report.get("recent_patches").is_none());
    }

    #[test]
    fn test_report_includes_usage_and_patches() {
        let mut state = state();
        state
            .usage
            .record(UsageScope::ProjectSummary, TokenUsage::from_counts(10, 5));
        let patches = vec![PatchLogEntry {
            revision: 1,
            kind: "shots_imported".to_string(),
            episode_id: Some(1),
            applied_at: "2026-01-01T00:00:00Z".to_string(),
        }];

        let report = build_report(&state, &patches);
        assert_eq!(report["usage"]["overall"]["total_tokens"], 15);
        assert_eq!(
            report["usage"]["scopes"]["project_summary"]["prompt_tokens"],
            10
        );
        assert_eq!(report["recent_patches"][0]["kind"], "shots_imported");
    }

    #[test]
    fn test_truncate_keeps_char_boundaries() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("第一集第二集", 4), "第一集…");
    }
}
