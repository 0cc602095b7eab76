//! Export Command
//!
//! Write the project (analysis context, shot lists with prompts, usage) as
//! JSON or YAML.

use std::path::Path;

use serde::Serialize;

use crate::ai::metrics::{StatsCounter, UsageLedger};
use crate::cli::ui::Output;
use crate::cli::util::CommandContext;
use crate::pipeline::Phase;
use crate::storage::{ProjectState, ProjectStore};
use crate::types::{Episode, PipelineError, ProjectContext, Result};

/// Exported view of a project; internal cursors and queues are left out
#[derive(Debug, Serialize)]
pub struct ProjectExport<'a> {
    pub name: &'a str,
    pub phase: Phase,
    pub context: &'a ProjectContext,
    pub episodes: &'a [Episode],
    pub usage: &'a UsageLedger,
    pub stats: &'a StatsCounter,
}

impl<'a> From<&'a ProjectState> for ProjectExport<'a> {
    fn from(state: &'a ProjectState) -> Self {
        Self {
            name: &state.name,
            phase: state.phase,
            context: &state.context,
            episodes: &state.episodes,
            usage: &state.usage,
            stats: &state.stats,
        }
    }
}

pub fn run(format: &str, output: Option<&Path>) -> Result<()> {
    let ctx = CommandContext::load()?;
    let state = ctx.store.snapshot()?;
    let rendered = render(&state, format)?;

    match output {
        Some(path) => {
            std::fs::write(path, &rendered)?;
            Output::new().success(&format!("Exported '{}' to {}", state.name, path.display()));
        }
        None => println!("{}", rendered),
    }
    Ok(())
}

pub fn render(state: &ProjectState, format: &str) -> Result<String> {
    let export = ProjectExport::from(state);
    match format {
        "json" => Ok(serde_json::to_string_pretty(&export)?),
        "yaml" => Ok(serde_yaml::to_string(&export)?),
        other => Err(PipelineError::Config(format!(
            "Unknown export format '{}'. Valid values: json, yaml",
            other
        ))),
    }
}
