//! Prompt Builder
//!
//! Standardized prompt construction for every generation operation:
//! role, numbered objectives, then labelled input sections.

use crate::types::{ProjectContext, Shot};

/// Prompt section types
#[derive(Debug, Clone)]
enum PromptSection {
    Role { expertise: String, task: String },
    Objectives(Vec<String>),
    Text { header: String, content: String },
}

/// Prompt builder for consistent prompt construction
#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    sections: Vec<PromptSection>,
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn role(mut self, expertise: &str, task: &str) -> Self {
        self.sections.push(PromptSection::Role {
            expertise: expertise.to_string(),
            task: task.to_string(),
        });
        self
    }

    pub fn objectives(mut self, objectives: Vec<&str>) -> Self {
        self.sections.push(PromptSection::Objectives(
            objectives.into_iter().map(String::from).collect(),
        ));
        self
    }

    /// Add a headed section; empty content is left out
    pub fn section(mut self, header: &str, content: &str) -> Self {
        if !content.trim().is_empty() {
            self.sections.push(PromptSection::Text {
                header: header.to_string(),
                content: content.to_string(),
            });
        }
        self
    }

    pub fn build(self) -> String {
        let mut prompt = String::new();

        for section in self.sections {
            match section {
                PromptSection::Role { expertise, task } => {
                    prompt.push_str("<ROLE>\n");
                    prompt.push_str(&format!("You are an expert {} working on {}.\n", expertise, task));
                    prompt.push_str("</ROLE>\n\n");
                }
                PromptSection::Objectives(objectives) => {
                    prompt.push_str("<OBJECTIVES>\n");
                    for (i, obj) in objectives.iter().enumerate() {
                        prompt.push_str(&format!("{}. {}\n", i + 1, obj));
                    }
                    prompt.push_str("</OBJECTIVES>\n\n");
                }
                PromptSection::Text { header, content } => {
                    prompt.push_str(&format!("# {}\n\n", header));
                    prompt.push_str(content.trim_end());
                    prompt.push_str("\n\n");
                }
            }
        }

        prompt.trim_end().to_string()
    }
}

/// Cut text to at most `max_chars` characters, marking the cut.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}\n[... truncated ...]", &text[..byte_idx]),
        None => text.to_string(),
    }
}

/// Render the analysis context as prompt text
pub fn render_context(context: &ProjectContext) -> String {
    let mut out = String::new();

    if !context.project_summary.is_empty() {
        out.push_str(&format!("Project: {}\n", context.project_summary));
    }

    if !context.characters.is_empty() {
        out.push_str("\nCharacters:\n");
        for character in &context.characters {
            let role = if character.is_main { "main" } else { "supporting" };
            out.push_str(&format!("- {} ({})", character.name, role));
            if !character.description.is_empty() {
                out.push_str(&format!(": {}", character.description));
            }
            out.push('\n');
            for form in &character.forms {
                out.push_str(&format!("  * {}: {}\n", form.name, form.appearance));
            }
        }
    }

    if !context.locations.is_empty() {
        out.push_str("\nLocations:\n");
        for location in &context.locations {
            out.push_str(&format!("- {}", location.name));
            if !location.description.is_empty() {
                out.push_str(&format!(": {}", location.description));
            }
            out.push('\n');
            if let Some(visuals) = &location.visuals {
                out.push_str(&format!(
                    "  * atmosphere: {}; lighting: {}; elements: {}\n",
                    visuals.atmosphere,
                    visuals.lighting,
                    visuals.key_elements.join(", ")
                ));
            }
        }
    }

    out.trim_end().to_string()
}

fn render_shots(shots: &[Shot]) -> String {
    shots
        .iter()
        .map(|shot| {
            let mut line = format!(
                "[{}] {} | {} | {:.1}s",
                shot.id, shot.shot_type, shot.description, shot.duration
            );
            if !shot.movement.is_empty() {
                line.push_str(&format!(" | camera: {}", shot.movement));
            }
            if !shot.dialogue.is_empty() {
                line.push_str(&format!(" | dialogue: \"{}\"", shot.dialogue));
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Prompt templates, one per generation operation
pub struct PromptTemplates;

impl PromptTemplates {
    pub fn project_summary(script: &str, style_guide: &str) -> String {
        PromptBuilder::new()
            .role("script analyst", "a serialized screen adaptation")
            .objectives(vec![
                "Summarize the whole story: premise, main conflict, arc, and ending",
                "Name the genre and tone",
                "Keep it under 300 words",
            ])
            .section("Style Guide", style_guide)
            .section("Script", script)
            .build()
    }

    pub fn episode_summary(title: &str, content: &str, project_summary: &str) -> String {
        PromptBuilder::new()
            .role("script analyst", "episode breakdowns")
            .objectives(vec![
                "Summarize this episode's events in order",
                "Mention which characters appear and where scenes take place",
                "Keep it under 150 words",
            ])
            .section("Project Summary", project_summary)
            .section(&format!("Episode: {}", title), content)
            .build()
    }

    pub fn character_list(script: &str, project_summary: &str) -> String {
        PromptBuilder::new()
            .role("casting director", "a character breakdown")
            .objectives(vec![
                "List every named character",
                "Mark protagonists and recurring leads with is_main = true",
                "Give a one-sentence description of each",
            ])
            .section("Project Summary", project_summary)
            .section("Script", script)
            .build()
    }

    pub fn character_deep_dive(
        name: &str,
        script: &str,
        project_summary: &str,
        style_guide: &str,
    ) -> String {
        let focus = format!("Describe every distinct visual form of {}", name);
        PromptBuilder::new()
            .role("character designer", "visual continuity for a main character")
            .objectives(vec![
                focus.as_str(),
                "Cover face, hair, build, clothing, and signature props",
                "Keep descriptions concrete enough to reproduce in every shot",
            ])
            .section("Style Guide", style_guide)
            .section("Project Summary", project_summary)
            .section("Script", script)
            .build()
    }

    pub fn location_list(script: &str, project_summary: &str) -> String {
        PromptBuilder::new()
            .role("production designer", "a location breakdown")
            .objectives(vec![
                "List every distinct location",
                "Mark recurring or story-critical sets as type core, the rest as secondary",
                "Give a one-sentence description of each",
            ])
            .section("Project Summary", project_summary)
            .section("Script", script)
            .build()
    }

    pub fn location_deep_dive(name: &str, script: &str, style_guide: &str) -> String {
        let focus = format!("Describe the look of {}", name);
        PromptBuilder::new()
            .role("production designer", "visual continuity for a core set")
            .objectives(vec![
                focus.as_str(),
                "Give atmosphere, lighting, and the key elements that must stay consistent",
            ])
            .section("Style Guide", style_guide)
            .section("Script", script)
            .build()
    }

    pub fn episode_shots(
        title: &str,
        content: &str,
        summary: &str,
        context: &ProjectContext,
        shot_guide: &str,
        episode_number: usize,
        style_guide: &str,
    ) -> String {
        let id_rule = format!(
            "Use ids '{}-<scene>-<shot>' with a two-digit shot number, e.g. '{}-1-01'",
            episode_number, episode_number
        );
        PromptBuilder::new()
            .role("storyboard artist", "a shot list")
            .objectives(vec![
                "Break the episode into shots in story order",
                id_rule.as_str(),
                "Give each shot a description, duration in seconds, shot type, camera movement, and dialogue",
            ])
            .section("Shot Format Guide", shot_guide)
            .section("Style Guide", style_guide)
            .section("Project Context", &render_context(context))
            .section("Episode Summary", summary)
            .section(&format!("Episode {}: {}", episode_number, title), content)
            .build()
    }

    pub fn scene_prompts(
        shots: &[Shot],
        context: &ProjectContext,
        prompt_guide: &str,
        style_guide: &str,
    ) -> String {
        PromptBuilder::new()
            .role("video prompt writer", "text-to-video prompts for one scene")
            .objectives(vec![
                "Write one video-generation prompt per shot, keeping the shot id unchanged",
                "Describe subject, action, setting, lighting, and camera in each prompt",
                "Keep characters and locations visually consistent with the context",
            ])
            .section("Prompt Style Guide", prompt_guide)
            .section("Style Guide", style_guide)
            .section("Project Context", &render_context(context))
            .section("Shots", &render_shots(shots))
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Character, CharacterForm};

    #[test]
    fn test_builder_skips_empty_sections() {
        let prompt = PromptBuilder::new()
            .role("analyst", "tests")
            .section("Empty", "   ")
            .section("Script", "FADE IN.")
            .build();
        assert!(prompt.starts_with("<ROLE>"));
        assert!(!prompt.contains("# Empty"));
        assert!(prompt.ends_with("FADE IN."));
    }

    #[test]
    fn test_truncate_chars_multibyte() {
        assert_eq!(truncate_chars("第一集", 10), "第一集");
        let cut = truncate_chars("第一集开始", 2);
        assert!(cut.starts_with("第一\n"));
        assert!(cut.contains("truncated"));
    }

    #[test]
    fn test_render_context_lists_forms() {
        let context = ProjectContext {
            project_summary: "A heist.".into(),
            characters: vec![Character {
                id: "char-01".into(),
                name: "Mara".into(),
                is_main: true,
                forms: vec![CharacterForm {
                    name: "disguise".into(),
                    appearance: "red wig".into(),
                }],
                ..Default::default()
            }],
            ..Default::default()
        };
        let text = render_context(&context);
        assert!(text.contains("Mara (main)"));
        assert!(text.contains("disguise: red wig"));
    }

    #[test]
    fn test_scene_prompt_lists_shot_ids() {
        let shots = vec![Shot::new("1-1-01", "Door opens"), Shot::new("1-1-02", "Mara enters")];
        let prompt =
            PromptTemplates::scene_prompts(&shots, &ProjectContext::default(), "cinematic", "");
        assert!(prompt.contains("[1-1-01]"));
        assert!(prompt.contains("[1-1-02]"));
        assert!(prompt.contains("# Prompt Style Guide"));
    }

    #[test]
    fn test_episode_shots_id_convention() {
        let prompt = PromptTemplates::episode_shots(
            "Pilot",
            "INT. BANK",
            "",
            &ProjectContext::default(),
            "",
            3,
            "",
        );
        assert!(prompt.contains("'3-1-01'"));
        assert!(prompt.contains("# Episode 3: Pilot"));
    }
}
