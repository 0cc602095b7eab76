//! Script Parsing and Shot Import
//!
//! Splits a script into episodes on episode headings and loads externally
//! produced shot lists. Both run outside the pipeline: malformed input fails
//! here, immediately, and nothing is stored.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info, warn};

use crate::storage::{ProjectPatch, ProjectStore};
use crate::types::{
    Episode, PipelineError, Result, Shot, ValidationError, ValidationErrorKind,
};

/// `Episode 3`, `EP03`, `Ep. 3 - Title`, `# Episode 3: Title`, `第3集`
static EPISODE_HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^[ \t]*(?:#{1,6}[ \t]*)?(?:(?i:episode|ep)[ \t.]*(\d+)|第[ \t]*(\d+)[ \t]*[集话話])[ \t]*(?:[:：.\-–—][ \t]*)?(.*?)[ \t]*$",
    )
    .expect("episode heading pattern is valid")
});

// =============================================================================
// Episodes
// =============================================================================

/// Split a script into episodes with contiguous ids 1..N in parse order.
///
/// Text before the first heading is treated as front matter and left out of
/// every episode. A script without headings becomes a single episode.
pub fn parse_episodes(text: &str) -> Result<Vec<Episode>> {
    if text.trim().is_empty() {
        return Err(PipelineError::validation(
            ValidationErrorKind::MissingField,
            "script is empty",
        ));
    }

    let headings: Vec<_> = EPISODE_HEADING.captures_iter(text).collect();
    if headings.is_empty() {
        debug!("No episode headings found, using the whole script as one episode");
        return Ok(vec![Episode::new(1, "Episode 1", text.trim())]);
    }

    let mut episodes = Vec::with_capacity(headings.len());
    for (position, caps) in headings.iter().enumerate() {
        let Some(whole) = caps.get(0) else { continue };
        let id = position as u32 + 1;

        let declared = caps
            .get(1)
            .or_else(|| caps.get(2))
            .and_then(|m| m.as_str().parse::<u32>().ok());
        if declared.is_some_and(|n| n != id) {
            warn!(
                heading = whole.as_str().trim(),
                assigned = id,
                "Episode heading number differs from its position"
            );
        }

        let title = caps
            .get(3)
            .map(|m| m.as_str().trim())
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Episode {}", id));

        let end = headings
            .get(position + 1)
            .and_then(|next| next.get(0))
            .map(|m| m.start())
            .unwrap_or(text.len());
        let content = text[whole.end()..end].trim();

        episodes.push(Episode::new(id, title, content));
    }

    if let Some(empty) = episodes.iter().find(|e| e.content.is_empty()) {
        warn!(episode = empty.id, "Episode has no content");
    }
    info!(episodes = episodes.len(), "Parsed script");
    Ok(episodes)
}

// =============================================================================
// Shot Import
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportFormat {
    Json,
    Yaml,
}

impl ImportFormat {
    /// `.yaml` / `.yml` are YAML, anything else JSON
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                Self::Yaml
            }
            _ => Self::Json,
        }
    }
}

/// Shot lists keyed by episode id
pub type ShotImport = BTreeMap<u32, Vec<Shot>>;

/// Parse an import document: a map from episode id to its shot list.
/// Generated prompts in the input are discarded.
pub fn parse_shot_import(text: &str, format: ImportFormat) -> Result<ShotImport> {
    let mut import: ShotImport = match format {
        ImportFormat::Json => serde_json::from_str(text)?,
        ImportFormat::Yaml => serde_yaml::from_str(text)?,
    };

    for shots in import.values_mut() {
        for shot in shots {
            shot.id = shot.id.trim().to_string();
            shot.sora_prompt = None;
        }
    }
    Ok(import)
}

/// Check an import against the project's episodes.
pub fn validate_import(import: &ShotImport, episodes: &[Episode]) -> Result<()> {
    if import.is_empty() {
        return Err(PipelineError::validation(
            ValidationErrorKind::MissingField,
            "import contains no episodes",
        ));
    }

    for (episode_id, shots) in import {
        let field = format!("episodes.{}", episode_id);

        if !episodes.iter().any(|e| e.id == *episode_id) {
            return Err(invalid(
                ValidationErrorKind::UnknownReference,
                format!("episode {} does not exist", episode_id),
                &field,
            ));
        }
        if shots.is_empty() {
            return Err(invalid(
                ValidationErrorKind::MissingField,
                format!("episode {} has an empty shot list", episode_id),
                &field,
            ));
        }

        let mut seen = HashSet::new();
        for (position, shot) in shots.iter().enumerate() {
            let field = format!("{}[{}]", field, position);
            if shot.id.is_empty() {
                return Err(invalid(
                    ValidationErrorKind::MissingField,
                    "shot id is empty",
                    &format!("{}.id", field),
                ));
            }
            if !seen.insert(shot.id.as_str()) {
                return Err(invalid(
                    ValidationErrorKind::Duplicate,
                    format!("shot id '{}' appears twice", shot.id),
                    &format!("{}.id", field),
                ));
            }
            if shot.description.trim().is_empty() {
                return Err(invalid(
                    ValidationErrorKind::MissingField,
                    format!("shot '{}' has no description", shot.id),
                    &format!("{}.description", field),
                ));
            }
            if !shot.duration.is_finite() || shot.duration < 0.0 {
                return Err(invalid(
                    ValidationErrorKind::Format,
                    format!("shot '{}' has an invalid duration", shot.id),
                    &format!("{}.duration", field),
                ));
            }
        }
    }
    Ok(())
}

/// Read, validate and store an import file. Either every episode in the
/// file is imported or none is.
pub fn import_shots(store: &dyn ProjectStore, path: &Path) -> Result<Vec<u32>> {
    let text = std::fs::read_to_string(path)?;
    let import = parse_shot_import(&text, ImportFormat::from_path(path))?;

    let state = store.snapshot()?;
    validate_import(&import, &state.episodes)?;

    for episode_id in import.keys() {
        if let Some(episode) = state.episode(*episode_id)
            && !episode.status.accepts_import()
        {
            return Err(PipelineError::InvalidTransition {
                episode_id: *episode_id,
                from: episode.status.to_string(),
                to: "imported shots".to_string(),
            });
        }
    }

    let ids: Vec<u32> = import.keys().copied().collect();
    for (episode_id, shots) in import {
        info!(episode = episode_id, shots = shots.len(), "Importing shots");
        store.apply(ProjectPatch::ShotsImported { episode_id, shots })?;
    }
    Ok(ids)
}

fn invalid(kind: ValidationErrorKind, message: impl Into<String>, field: &str) -> PipelineError {
    PipelineError::Validation(ValidationError::new(kind, message).with_field(field))
}
