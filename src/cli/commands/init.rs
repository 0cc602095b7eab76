//! Init Command
//!
//! Create a project from a script file in the current directory.

use std::path::Path;

use crate::cli::ui::Output;
use crate::cli::util::is_initialized;
use crate::config::ConfigLoader;
use crate::script::parse_episodes;
use crate::storage::{ProjectState, ProjectStore, SqliteStore};
use crate::types::{PipelineError, Result};

pub fn run(script: &Path, name: Option<String>, force: bool) -> Result<()> {
    let root = std::env::current_dir()?;
    let state = run_in(&root, script, name, force)?;

    // Global config is created once, never overwritten
    if let Err(e) = ConfigLoader::init_global(false) {
        tracing::debug!("Global config init skipped: {}", e);
    }

    let out = Output::new();
    out.success("Initialized ScriptFlow in .scriptflow/");
    out.field("Project", &state.name);
    out.field("Episodes", state.episodes.len());
    for episode in &state.episodes {
        println!("    {:>3}. {}", episode.id, episode.title);
    }
    println!();
    println!("Next steps:");
    println!("  1. Configure the LLM in .scriptflow/config.toml (or export OPENAI_API_KEY)");
    println!("  2. Run 'scriptflow run' to start the analysis");
    Ok(())
}

/// Parse `script`, create the project directory and store the initial state
pub fn run_in(root: &Path, script: &Path, name: Option<String>, force: bool) -> Result<ProjectState> {
    if is_initialized(root) && !force {
        return Err(PipelineError::Config(
            "Already initialized. Use --force to overwrite.".to_string(),
        ));
    }

    let text = std::fs::read_to_string(script)?;
    let episodes = parse_episodes(&text)?;

    let name = name.unwrap_or_else(|| {
        script
            .file_stem()
            .and_then(|n| n.to_str())
            .unwrap_or("project")
            .to_string()
    });

    ConfigLoader::init_project(root, Some(&name))?;

    let store = SqliteStore::open(root.join(ConfigLoader::database_path()))?;
    let state = ProjectState::new(name, text, episodes);
    store.replace(state.clone())?;

    tracing::info!(
        project = %state.name,
        episodes = state.episodes.len(),
        "Project initialized"
    );
    Ok(state)
}
