//! LLM Provider Abstraction
//!
//! Defines the LlmProvider trait for structured LLM output generation.
//! All providers return `LlmResponse` with token usage so every generation
//! call can be charged to the usage ledgers.

mod ollama;
mod openai;
mod prompt_utils;

pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;

// Re-export error types from centralized location
pub use crate::types::{ErrorCategory, ErrorClassifier, LlmError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::iter::Sum;
use std::ops::{Add, AddAssign};
use std::sync::Arc;

use crate::types::{PipelineError, Result};

// =============================================================================
// LLM Response with Usage Metrics
// =============================================================================

/// Complete LLM response including content and usage metrics
#[derive(Debug, Clone)]
pub struct LlmResponse {
    /// Generated content (structured JSON)
    pub content: Value,
    /// Token usage metrics
    pub usage: TokenUsage,
    /// Response timing
    pub timing: ResponseTiming,
    /// Provider and model info
    pub metadata: ResponseMetadata,
}

impl LlmResponse {
    /// Create response with content only (usage unknown)
    pub fn content_only(content: Value) -> Self {
        Self {
            content,
            usage: TokenUsage::default(),
            timing: ResponseTiming::default(),
            metadata: ResponseMetadata::default(),
        }
    }

    pub fn with_metrics(
        content: Value,
        usage: TokenUsage,
        timing: ResponseTiming,
        metadata: ResponseMetadata,
    ) -> Self {
        Self {
            content,
            usage,
            timing,
            metadata,
        }
    }
}

/// Token usage counters of one or more generation calls.
///
/// Usage is only ever combined by pairwise addition; nothing overwrites a
/// recorded value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub response_tokens: u64,
    pub total_tokens: u64,
}

impl TokenUsage {
    /// Build usage from prompt/response counts, deriving the total
    pub fn from_counts(prompt_tokens: u64, response_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            response_tokens,
            total_tokens: prompt_tokens.saturating_add(response_tokens),
        }
    }

    /// Pairwise sum of two usages
    pub fn merge(self, other: Self) -> Self {
        Self {
            prompt_tokens: self.prompt_tokens.saturating_add(other.prompt_tokens),
            response_tokens: self.response_tokens.saturating_add(other.response_tokens),
            total_tokens: self.total_tokens.saturating_add(other.total_tokens),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.total_tokens == 0 && self.prompt_tokens == 0 && self.response_tokens == 0
    }
}

impl Add for TokenUsage {
    type Output = TokenUsage;

    fn add(self, rhs: Self) -> Self::Output {
        self.merge(rhs)
    }
}

impl AddAssign for TokenUsage {
    fn add_assign(&mut self, rhs: Self) {
        *self = self.merge(rhs);
    }
}

impl Sum for TokenUsage {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(TokenUsage::default(), TokenUsage::merge)
    }
}

impl std::fmt::Display for TokenUsage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} tokens ({} prompt / {} response)",
            self.total_tokens, self.prompt_tokens, self.response_tokens
        )
    }
}

/// Response timing metrics
#[derive(Debug, Clone, Default)]
pub struct ResponseTiming {
    /// Total response time in milliseconds (wall clock)
    pub total_ms: u64,
    /// API processing time in milliseconds (from provider response)
    pub api_ms: Option<u64>,
}

impl ResponseTiming {
    pub fn from_duration(duration: std::time::Duration) -> Self {
        Self {
            total_ms: duration.as_millis() as u64,
            api_ms: None,
        }
    }

    pub fn with_api_time(duration: std::time::Duration, api_ms: Option<u64>) -> Self {
        Self {
            total_ms: duration.as_millis() as u64,
            api_ms,
        }
    }
}

/// Response metadata
#[derive(Debug, Clone, Default)]
pub struct ResponseMetadata {
    pub model: String,
    pub provider: String,
}

/// Shared LLM provider handle.
pub type SharedProvider = Arc<dyn LlmProvider + Send + Sync>;

// =============================================================================
// Provider Configuration
// =============================================================================

/// Configuration for LLM providers
///
/// API keys are never serialized and are redacted in debug output. Each
/// provider converts the key to `SecretString` internally.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Provider type: "openai", "ollama"
    pub provider: String,
    /// Model name (provider-specific)
    pub model: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Temperature for LLM generation
    pub temperature: f32,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// API base URL (for custom endpoints)
    pub api_base: Option<String>,
    /// Maximum tokens to generate
    pub max_tokens: usize,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .field("temperature", &self.temperature)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("api_base", &self.api_base)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: None,
            timeout_secs: 300,
            temperature: 0.7,
            api_key: None,
            api_base: None,
            max_tokens: 8192,
        }
    }
}

// =============================================================================
// LLM Provider Trait
// =============================================================================

/// LLM Provider trait for structured output generation with usage metrics
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate structured output guided by a JSON Schema
    ///
    /// Returns `LlmResponse` containing both the content and usage metrics.
    async fn generate(&self, prompt: &str, schema: &Value) -> Result<LlmResponse>;

    /// Provider name for logging
    fn name(&self) -> &str;

    /// Model name currently in use
    fn model(&self) -> &str;
}

/// Create a shared provider from configuration
pub fn create_provider(config: &ProviderConfig) -> Result<SharedProvider> {
    match config.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAiProvider::new(config.clone())?)),
        "ollama" => Ok(Arc::new(OllamaProvider::new(config.clone())?)),
        _ => Err(PipelineError::Config(format!(
            "Unknown provider: {}. Supported: openai, ollama",
            config.provider
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn usage_strategy() -> impl Strategy<Value = TokenUsage> {
        (0u64..1_000_000, 0u64..1_000_000).prop_map(|(p, r)| TokenUsage::from_counts(p, r))
    }

    #[test]
    fn test_from_counts_derives_total() {
        let usage = TokenUsage::from_counts(120, 30);
        assert_eq!(usage.total_tokens, 150);
        assert!(!usage.is_empty());
        assert!(TokenUsage::default().is_empty());
    }

    #[test]
    fn test_sum_of_usages() {
        let total: TokenUsage = vec![
            TokenUsage::from_counts(1, 2),
            TokenUsage::from_counts(3, 4),
            TokenUsage::from_counts(5, 6),
        ]
        .into_iter()
        .sum();
        assert_eq!(total, TokenUsage::from_counts(9, 12));
    }

    #[test]
    fn test_add_assign() {
        let mut usage = TokenUsage::from_counts(10, 10);
        usage += TokenUsage::from_counts(5, 0);
        assert_eq!(usage.prompt_tokens, 15);
        assert_eq!(usage.total_tokens, 25);
    }

    #[test]
    fn test_provider_config_debug_redacts_key() {
        let config = ProviderConfig {
            api_key: Some("sk-secret".to_string()),
            ..Default::default()
        };
        let debug = format!("{:?}", config);
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("sk-secret"));
    }

    #[test]
    fn test_create_provider_unknown() {
        let config = ProviderConfig {
            provider: "telepathy".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            create_provider(&config),
            Err(PipelineError::Config(_))
        ));
    }

    proptest! {
        #[test]
        fn prop_merge_adds_totals(a in usage_strategy(), b in usage_strategy()) {
            prop_assert_eq!(a.merge(b).total_tokens, a.total_tokens + b.total_tokens);
        }

        #[test]
        fn prop_merge_commutative(a in usage_strategy(), b in usage_strategy()) {
            prop_assert_eq!(a.merge(b), b.merge(a));
        }

        #[test]
        fn prop_merge_associative(
            a in usage_strategy(),
            b in usage_strategy(),
            c in usage_strategy(),
        ) {
            prop_assert_eq!(a.merge(b).merge(c), a.merge(b.merge(c)));
        }

        #[test]
        fn prop_merge_never_decreases(a in usage_strategy(), b in usage_strategy()) {
            let merged = a + b;
            prop_assert!(merged.total_tokens >= a.total_tokens);
            prop_assert!(merged.prompt_tokens >= a.prompt_tokens);
            prop_assert!(merged.response_tokens >= a.response_tokens);
        }
    }
}
