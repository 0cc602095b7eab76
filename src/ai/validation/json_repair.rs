//! JSON Repair Mechanism
//!
//! Unified JSON extraction and repair for LLM responses.
//!
//! Handles common LLM JSON output issues:
//! - Markdown code fence wrapping (```json ... ```)
//! - Missing closing braces/brackets (truncated output)
//! - Trailing commas
//! - Strings broken by a raw newline
//! - JSON embedded in explanatory text

use serde_json::Value;
use tracing::{debug, warn};

use crate::types::{ErrorCategory, LlmError, PipelineError, Result};

// =============================================================================
// Convenience Functions
// =============================================================================

/// Extract and parse JSON from an LLM response
pub fn extract_json_from_response(content: &str) -> Result<Value> {
    JsonRepairer::new()
        .parse_or_repair(content)
        .map(|(value, _)| value)
}

/// Extract and parse JSON, returning whether repair was needed
pub fn extract_json_with_repair_status(content: &str) -> Result<(Value, bool)> {
    JsonRepairer::new().parse_or_repair(content)
}

// =============================================================================
// JsonRepairer
// =============================================================================

#[derive(Debug, Default, Clone, Copy)]
pub struct JsonRepairer;

impl JsonRepairer {
    pub fn new() -> Self {
        Self
    }

    /// Parse JSON, attempting repair if the initial parse fails
    ///
    /// Returns (Value, was_repaired)
    pub fn parse_or_repair(&self, raw: &str) -> Result<(Value, bool)> {
        let cleaned = preprocess(raw);

        if let Ok(value) = serde_json::from_str::<Value>(&cleaned) {
            return Ok((value, false));
        }

        debug!("Initial JSON parse failed, attempting repair");

        if let Ok(value) = serde_json::from_str::<Value>(&repair(&cleaned)) {
            warn!("JSON repaired in place");
            return Ok((value, true));
        }

        if let Some(embedded) = extract_embedded(&cleaned)
            && let Ok(value) = serde_json::from_str::<Value>(&repair(embedded))
        {
            warn!("JSON extracted from mixed content");
            return Ok((value, true));
        }

        Err(PipelineError::Llm(LlmError::new(
            ErrorCategory::ParseError,
            format!(
                "Failed to parse or repair JSON. Content preview: {}...",
                cleaned.chars().take(200).collect::<String>()
            ),
        )))
    }
}

fn preprocess(raw: &str) -> String {
    let s = raw.trim().trim_start_matches('\u{feff}');
    strip_code_fences(s).trim().to_string()
}

fn strip_code_fences(s: &str) -> &str {
    let mut result = s;

    if result.starts_with("```")
        && let Some(first_newline) = result.find('\n')
    {
        result = &result[first_newline + 1..];
    }

    if let Some(stripped) = result.trim_end().strip_suffix("```") {
        result = stripped;
    }

    result
}

fn repair(s: &str) -> String {
    close_open_structures(&strip_trailing_commas(&close_broken_strings(s)))
}

/// Tracks whether the scanner is inside a string literal.
#[derive(Default)]
struct StringState {
    in_string: bool,
    escape: bool,
}

impl StringState {
    /// Feed one char; returns true when the char belongs to a string literal
    /// (including its closing quote).
    fn consume(&mut self, ch: char) -> bool {
        if self.in_string {
            if self.escape {
                self.escape = false;
            } else if ch == '\\' {
                self.escape = true;
            } else if ch == '"' {
                self.in_string = false;
            }
            return true;
        }
        if ch == '"' {
            self.in_string = true;
            return true;
        }
        false
    }
}

/// Close a string literal cut by a raw newline.
fn close_broken_strings(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 8);
    let mut state = StringState::default();

    for ch in s.chars() {
        if state.in_string && !state.escape && (ch == '\n' || ch == '\r') {
            result.push('"');
            state.in_string = false;
            result.push(ch);
            continue;
        }
        state.consume(ch);
        result.push(ch);
    }

    result
}

/// Drop commas directly followed by `]` or `}`.
fn strip_trailing_commas(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut result = String::with_capacity(s.len());
    let mut state = StringState::default();

    for (i, &ch) in chars.iter().enumerate() {
        if state.consume(ch) {
            result.push(ch);
            continue;
        }
        if ch == ',' {
            let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
            if matches!(next, Some(']') | Some('}')) {
                continue;
            }
        }
        result.push(ch);
    }

    result
}

/// Append the closers of every structure left open, innermost first.
fn close_open_structures(s: &str) -> String {
    let mut stack = Vec::new();
    let mut state = StringState::default();

    for ch in s.chars() {
        if state.consume(ch) {
            continue;
        }
        match ch {
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' if stack.last() == Some(&ch) => {
                stack.pop();
            }
            _ => {}
        }
    }

    let mut result = s.trim_end().to_string();
    if state.in_string {
        result.push('"');
    }
    if result.ends_with(',') {
        result.pop();
    }
    while let Some(closer) = stack.pop() {
        result.push(closer);
    }
    result
}

/// First JSON object/array embedded in prose; runs to the end if unclosed.
fn extract_embedded(s: &str) -> Option<&str> {
    let start = s.find(['{', '['])?;
    let mut depth = 0i32;
    let mut state = StringState::default();

    for (i, ch) in s[start..].char_indices() {
        if state.consume(ch) {
            continue;
        }
        match ch {
            '{' | '[' => depth += 1,
            '}' | ']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&s[start..start + i + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }

    Some(&s[start..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_json() {
        let (_, repaired) = JsonRepairer::new()
            .parse_or_repair(r#"{"summary": "A quiet town."}"#)
            .unwrap();
        assert!(!repaired);
    }

    #[test]
    fn test_strip_code_fences() {
        let input = "```json\n{\"summary\": \"value\"}\n```";
        let (value, _) = JsonRepairer::new().parse_or_repair(input).unwrap();
        assert_eq!(value["summary"], "value");
    }

    #[test]
    fn test_fix_trailing_comma() {
        let input = r#"{"shots": [{"id": "1-01"},]}"#;
        let (value, repaired) = JsonRepairer::new().parse_or_repair(input).unwrap();
        assert!(repaired);
        assert_eq!(value["shots"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_comma_inside_string_untouched() {
        let input = r#"{"dialogue": "Wait, ]", "x": [1,]}"#;
        let (value, _) = JsonRepairer::new().parse_or_repair(input).unwrap();
        assert_eq!(value["dialogue"], "Wait, ]");
    }

    #[test]
    fn test_balance_brackets() {
        let input = r#"{"shots": [{"id": "1-01"}"#;
        let (value, repaired) = JsonRepairer::new().parse_or_repair(input).unwrap();
        assert!(repaired);
        assert!(value["shots"].is_array());
    }

    #[test]
    fn test_truncated_mid_string() {
        let input = r#"{"prompts": [{"id": "1-01", "prompt": "Wide shot of the har"#;
        let (value, repaired) = JsonRepairer::new().parse_or_repair(input).unwrap();
        assert!(repaired);
        assert_eq!(value["prompts"][0]["prompt"], "Wide shot of the har");
    }

    #[test]
    fn test_extract_from_mixed() {
        let input = r#"Here is the shot list:
{"shots": [{"id": "1-01", "description": "Dawn"}]}
Hope this helps!"#;
        let (value, repaired) = JsonRepairer::new().parse_or_repair(input).unwrap();
        assert!(repaired);
        assert!(value["shots"].is_array());
    }

    #[test]
    fn test_string_broken_by_newline() {
        let input = "{\"name\": \"unterminated\n, \"other\": \"value\"}";
        assert!(JsonRepairer::new().parse_or_repair(input).is_ok());
    }

    #[test]
    fn test_unrepairable_is_parse_error() {
        let err = extract_json_from_response("no json here at all").unwrap_err();
        match err {
            PipelineError::Llm(e) => assert_eq!(e.category, ErrorCategory::ParseError),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
