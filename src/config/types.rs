//! Configuration Types
//!
//! All configuration structures with sensible defaults.
//! Supports global (~/.config/scriptflow/) and project (.scriptflow/) level configuration.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ai::provider::ProviderConfig;
use crate::types::{PipelineError, Result};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Configuration version
    pub version: String,

    /// Project-specific settings
    pub project: ProjectConfig,

    /// LLM provider settings
    pub llm: LlmConfig,

    /// Orchestration settings
    pub pipeline: PipelineConfig,

    /// Guide texts handed to every generation call
    pub guides: GuidesConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            project: ProjectConfig::default(),
            llm: LlmConfig::default(),
            pipeline: PipelineConfig::default(),
            guides: GuidesConfig::default(),
        }
    }
}

impl Config {
    /// Validate configuration values are within acceptable ranges.
    /// Returns `PipelineError::Config` on validation failure.
    pub fn validate(&self) -> Result<()> {
        self.llm.provider.parse::<ProviderKind>()?;

        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(PipelineError::Config(format!(
                "LLM temperature must be between 0.0 and 2.0, got {}",
                self.llm.temperature
            )));
        }

        if self.llm.timeout_secs == 0 {
            return Err(PipelineError::Config(
                "LLM timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.llm.max_tokens == 0 {
            return Err(PipelineError::Config(
                "LLM max_tokens must be greater than 0".to_string(),
            ));
        }

        if self.pipeline.max_script_chars < 1_000 {
            return Err(PipelineError::Config(format!(
                "pipeline.max_script_chars must be at least 1000, got {}",
                self.pipeline.max_script_chars
            )));
        }

        Ok(())
    }
}

// =============================================================================
// Project Configuration
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Project name (defaults to the script file stem)
    pub name: Option<String>,
}

// =============================================================================
// LLM Configuration
// =============================================================================

/// Supported LLM backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    OpenAi,
    Ollama,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OpenAi => write!(f, "openai"),
            Self::Ollama => write!(f, "ollama"),
        }
    }
}

impl FromStr for ProviderKind {
    type Err = PipelineError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            _ => Err(PipelineError::Config(format!(
                "Unknown LLM provider '{}'. Supported: openai, ollama",
                s
            ))),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name
    pub provider: String,

    /// Model name (provider default when unset)
    pub model: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Sampling temperature
    pub temperature: f32,

    /// Maximum response tokens
    pub max_tokens: usize,

    /// Custom endpoint
    pub api_base: Option<String>,

    /// API key; `OPENAI_API_KEY` is used when unset
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default().to_string(),
            model: None,
            timeout_secs: 300,
            temperature: 0.7,
            max_tokens: 8192,
            api_base: None,
            api_key: None,
        }
    }
}

impl fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("api_base", &self.api_base)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl LlmConfig {
    pub fn to_provider_config(&self) -> ProviderConfig {
        ProviderConfig {
            provider: self.provider.to_lowercase(),
            model: self.model.clone(),
            timeout_secs: self.timeout_secs,
            temperature: self.temperature,
            api_key: self.api_key.clone(),
            api_base: self.api_base.clone(),
            max_tokens: self.max_tokens,
        }
    }
}

// =============================================================================
// Pipeline Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Pause after each successful scene-chunk call (milliseconds)
    pub chunk_delay_ms: u64,

    /// Confirm every review point without asking
    pub auto_confirm: bool,

    /// Script characters sent with analysis prompts
    pub max_script_chars: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk_delay_ms: 1000,
            auto_confirm: false,
            max_script_chars: 30_000,
        }
    }
}

impl PipelineConfig {
    pub fn chunk_delay(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.chunk_delay_ms)
    }
}

// =============================================================================
// Guides
// =============================================================================

const DEFAULT_STYLE_GUIDE: &str = "Cinematic live-action look. Naturalistic lighting, \
grounded production design, consistent character appearance across episodes.";

const DEFAULT_SHOT_FORMAT: &str = "Shots of 2-8 seconds. Shot types: wide, medium, \
close-up, extreme close-up, over-the-shoulder, POV, insert. Name camera movement \
explicitly (static, pan, tilt, dolly, tracking, handheld, crane).";

const DEFAULT_PROMPT_STYLE: &str = "One paragraph per shot in English. Order: shot \
type and camera, subject and action, setting, lighting and mood. Refer to characters \
by their visual description, never only by name.";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GuidesConfig {
    /// Overall visual style
    pub style: String,

    /// Shot-list conventions for shot generation
    pub shot_format: String,

    /// Prompt-writing conventions for prompt generation
    pub prompt_style: String,
}

impl Default for GuidesConfig {
    fn default() -> Self {
        Self {
            style: DEFAULT_STYLE_GUIDE.to_string(),
            shot_format: DEFAULT_SHOT_FORMAT.to_string(),
            prompt_style: DEFAULT_PROMPT_STYLE.to_string(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.version, "1.0");
        assert_eq!(config.llm.provider, "openai");
        assert_eq!(config.pipeline.chunk_delay_ms, 1000);
        assert!(!config.pipeline.auto_confirm);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_provider_kind() {
        assert_eq!(ProviderKind::OpenAi.to_string(), "openai");
        assert_eq!(ProviderKind::Ollama.to_string(), "ollama");
        assert_eq!("Ollama".parse::<ProviderKind>().unwrap(), ProviderKind::Ollama);
        assert!("claude".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let mut config = Config::default();
        config.llm.temperature = 2.5;
        assert!(matches!(config.validate(), Err(PipelineError::Config(_))));

        let mut config = Config::default();
        config.llm.provider = "nope".into();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.llm.timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_api_key_not_serialized_or_debugged() {
        let mut config = Config::default();
        config.llm.api_key = Some("sk-secret".into());
        let toml = toml::to_string(&config).unwrap();
        assert!(!toml.contains("sk-secret"));
        assert!(!format!("{:?}", config.llm).contains("sk-secret"));
    }

    #[test]
    fn test_provider_config_mapping() {
        let mut llm = LlmConfig::default();
        llm.provider = "Ollama".into();
        llm.model = Some("llama3".into());
        let provider = llm.to_provider_config();
        assert_eq!(provider.provider, "ollama");
        assert_eq!(provider.model.as_deref(), Some("llama3"));
        assert_eq!(provider.max_tokens, 8192);
    }
}
