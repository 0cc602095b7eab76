//! Prompt building utilities for LLM providers.
//!
//! Both providers describe the expected JSON shape in plain text; OpenAI puts
//! it in the system message, Ollama appends it to the prompt.

use serde_json::Value;

/// Role line shared by all providers.
pub const SYSTEM_ROLE: &str =
    "You are a film pre-production assistant: script analyst, storyboard artist and prompt writer.";

/// Schema instructions for a structured response, `None` for a null schema.
pub fn schema_instructions(schema: &Value) -> Option<String> {
    if schema.is_null() {
        return None;
    }

    let schema_str = serde_json::to_string_pretty(schema).unwrap_or_else(|_| schema.to_string());
    Some(format!(
        "Respond with valid JSON matching this schema:\n```json\n{}\n```\n\nRespond ONLY with valid JSON, no explanation.",
        schema_str
    ))
}

/// Build a single prompt carrying role, task and schema instructions.
pub fn build_schema_prompt(user_prompt: &str, schema: &Value) -> String {
    match schema_instructions(schema) {
        Some(instructions) => format!(
            "{}\n\n{}\n\n---\n\n{}",
            SYSTEM_ROLE, user_prompt, instructions
        ),
        None => format!("{}\n\n{}", SYSTEM_ROLE, user_prompt),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_schema_instructions_null_schema() {
        assert!(schema_instructions(&Value::Null).is_none());
    }

    #[test]
    fn test_build_schema_prompt_null_schema() {
        let prompt = "Summarize this episode";
        let result = build_schema_prompt(prompt, &Value::Null);
        assert!(result.ends_with(prompt));
        assert!(!result.contains("schema"));
    }

    #[test]
    fn test_build_schema_prompt_with_schema() {
        let prompt = "Summarize this episode";
        let schema = json!({"type": "object", "properties": {"summary": {"type": "string"}}});
        let result = build_schema_prompt(prompt, &schema);

        assert!(result.starts_with(SYSTEM_ROLE));
        assert!(result.contains(prompt));
        assert!(result.contains("\"summary\""));
    }
}
