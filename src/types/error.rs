//! Unified Error Type System
//!
//! Centralized error types for the whole pipeline.
//!
//! ## Error Categories
//!
//! Provider failures are classified so a halted item can be shown with a
//! hint (rate limit, auth, network, ...). The orchestrator never acts on the
//! category by itself: every retry or skip is an explicit user command.
//!
//! ## Propagation
//!
//! - Generation failures are caught by the active runner and turned into
//!   episode/queue state; they never surface as `Err` from a runner.
//! - Structural failures (store, illegal transitions, bad commands, malformed
//!   imports) propagate as `PipelineError`.

use thiserror::Error;

use crate::ai::provider::TokenUsage;

// =============================================================================
// Error Categories
// =============================================================================

/// What kind of provider failure halted a unit of work
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    RateLimit,
    /// Prompt or response exceeded the model's context
    TokenLimit,
    Auth,
    Network,
    /// Provider down or model not available
    Unavailable,
    BadRequest,
    /// The model answered, but not with the expected JSON
    ParseError,
    Transient,
    Unknown,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::RateLimit => "RATE_LIMIT",
            Self::TokenLimit => "TOKEN_LIMIT",
            Self::Auth => "AUTH",
            Self::Network => "NETWORK",
            Self::Unavailable => "UNAVAILABLE",
            Self::BadRequest => "BAD_REQUEST",
            Self::ParseError => "PARSE_ERROR",
            Self::Transient => "TRANSIENT",
            Self::Unknown => "UNKNOWN",
        };
        f.write_str(label)
    }
}

impl ErrorCategory {
    /// Short hint shown next to a halted item
    pub fn hint(&self) -> &'static str {
        match self {
            Self::RateLimit => "rate limited; wait a moment, then retry",
            Self::TokenLimit => "request too large for the model; lower pipeline.max_script_chars",
            Self::Auth => "check the API key",
            Self::Network => "network problem; retry when the connection is back",
            Self::Unavailable => "provider or model unavailable; check llm.model and llm.api_base",
            Self::BadRequest => "request rejected by the provider",
            Self::ParseError => "model returned malformed output; retry usually helps",
            Self::Transient => "temporary provider issue; retry",
            Self::Unknown => "unclassified failure",
        }
    }
}

// =============================================================================
// LLM Error
// =============================================================================

/// Provider failure with its category
#[derive(Debug, Clone)]
pub struct LlmError {
    pub category: ErrorCategory,
    pub message: String,
    pub provider: Option<String>,
}

impl std::fmt::Display for LlmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.provider {
            Some(provider) => write!(f, "[{}:{}] {}", provider, self.category, self.message),
            None => write!(f, "[{}] {}", self.category, self.message),
        }
    }
}

impl std::error::Error for LlmError {}

impl LlmError {
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
            provider: None,
        }
    }

    pub fn for_provider(mut self, provider: &str) -> Self {
        if !provider.is_empty() {
            self.provider = Some(provider.to_string());
        }
        self
    }
}

// =============================================================================
// Error Classifier
// =============================================================================

/// Lowercase fragments that identify a category, checked top to bottom
const MESSAGE_PATTERNS: &[(ErrorCategory, &[&str])] = &[
    (
        ErrorCategory::RateLimit,
        &["rate limit", "429", "too many requests", "quota"],
    ),
    (
        ErrorCategory::TokenLimit,
        &[
            "context length",
            "context window",
            "maximum context",
            "too many tokens",
            "too large",
        ],
    ),
    (
        ErrorCategory::Auth,
        &["401", "403", "api key", "unauthorized", "permission denied"],
    ),
    (
        ErrorCategory::Network,
        &["failed to connect", "connection", "dns", "timed out", "timeout"],
    ),
    (
        ErrorCategory::Unavailable,
        &["503", "502", "service unavailable", "not found", "ollama pull"],
    ),
    (
        ErrorCategory::BadRequest,
        &["400", "bad request", "invalid request"],
    ),
    (
        ErrorCategory::ParseError,
        &["parse", "json", "missing field", "expected"],
    ),
    (
        ErrorCategory::Transient,
        &["temporar", "overloaded", "500", "internal server error"],
    ),
];

/// Maps raw provider failures onto an `ErrorCategory`
pub struct ErrorClassifier;

impl ErrorClassifier {
    /// Classify by message text; `provider` may be empty
    pub fn classify(message: &str, provider: &str) -> LlmError {
        let lower = message.to_lowercase();
        let category = MESSAGE_PATTERNS
            .iter()
            .find(|(_, needles)| needles.iter().any(|needle| lower.contains(needle)))
            .map(|(category, _)| *category)
            .unwrap_or(ErrorCategory::Unknown);

        LlmError::new(category, message).for_provider(provider)
    }

    /// Classify a non-success HTTP response
    pub fn classify_http_status(status: u16, message: &str, provider: &str) -> LlmError {
        let category = match status {
            429 => ErrorCategory::RateLimit,
            401 | 403 => ErrorCategory::Auth,
            408 => ErrorCategory::Network,
            413 => ErrorCategory::TokenLimit,
            400 | 422 => ErrorCategory::BadRequest,
            404 => ErrorCategory::Unavailable,
            500..=599 => ErrorCategory::Transient,
            _ => ErrorCategory::Unknown,
        };
        LlmError::new(category, message).for_provider(provider)
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Structured validation error for imported data
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub kind: ValidationErrorKind,
    /// Field or record that failed validation
    pub field: Option<String>,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(field) = &self.field {
            write!(f, "Validation failed for '{}': {}", field, self.message)
        } else {
            write!(f, "Validation failed: {}", self.message)
        }
    }
}

impl std::error::Error for ValidationError {}

impl ValidationError {
    pub fn new(kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            field: None,
            message: message.into(),
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// Required field missing or empty
    MissingField,
    /// Invalid format
    Format,
    /// Reference to an unknown record
    UnknownReference,
    /// Duplicate identifier
    Duplicate,
}

// =============================================================================
// Application Error
// =============================================================================

#[derive(Debug, Error)]
pub enum PipelineError {
    // -------------------------------------------------------------------------
    // System Errors (auto From impl)
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    // -------------------------------------------------------------------------
    // LLM Errors
    // -------------------------------------------------------------------------
    #[error("LLM error: {0}")]
    Llm(LlmError),

    #[error("LLM API error: {0}")]
    LlmApi(String),

    /// A generation unit produced an unusable payload. `usage` is what the
    /// rejected call consumed.
    #[error("Generation failed for {unit}: {message}")]
    Generation {
        unit: String,
        message: String,
        usage: TokenUsage,
    },

    // -------------------------------------------------------------------------
    // Pipeline Errors
    // -------------------------------------------------------------------------
    #[error("Episode {episode_id}: illegal status change {from} -> {to}")]
    InvalidTransition {
        episode_id: u32,
        from: String,
        to: String,
    },

    #[error("Cannot {command} during {phase}: {reason}")]
    InvalidCommand {
        command: String,
        phase: String,
        reason: String,
    },

    #[error("Unknown episode: {0}")]
    UnknownEpisode(u32),

    // -------------------------------------------------------------------------
    // Domain Errors
    // -------------------------------------------------------------------------
    #[error("{0}")]
    Validation(ValidationError),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Not initialized: run 'scriptflow init' first")]
    NotInitialized,

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<LlmError> for PipelineError {
    fn from(err: LlmError) -> Self {
        PipelineError::Llm(err)
    }
}

impl From<ValidationError> for PipelineError {
    fn from(err: ValidationError) -> Self {
        PipelineError::Validation(err)
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

impl PipelineError {
    pub fn generation(unit: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Generation {
            unit: unit.into(),
            message: message.into(),
            usage: TokenUsage::default(),
        }
    }

    /// Attach the usage of the call whose payload was rejected
    pub fn with_usage(self, spent: TokenUsage) -> Self {
        match self {
            Self::Generation {
                unit,
                message,
                usage,
            } => Self::Generation {
                unit,
                message,
                usage: usage + spent,
            },
            other => other,
        }
    }

    /// Tokens consumed by a failed call, zero when none were
    pub fn spent_usage(&self) -> TokenUsage {
        match self {
            Self::Generation { usage, .. } => *usage,
            _ => TokenUsage::default(),
        }
    }

    pub fn invalid_command(
        command: impl std::fmt::Display,
        phase: impl std::fmt::Display,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidCommand {
            command: command.to_string(),
            phase: phase.to_string(),
            reason: reason.into(),
        }
    }

    pub fn validation(kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self::Validation(ValidationError::new(kind, message))
    }
}

/// Context extension trait for adding context to errors
pub trait ResultExt<T> {
    fn with_context<C: Into<String>>(self, context: C) -> Result<T>;
}

impl<T, E: std::error::Error + Send + Sync + 'static> ResultExt<T> for std::result::Result<T, E> {
    fn with_context<C: Into<String>>(self, context: C) -> Result<T> {
        self.map_err(|e| PipelineError::Storage(format!("{}: {}", context.into(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_provider_messages() {
        let cases = [
            ("Rate limit reached for gpt-4o in organization", ErrorCategory::RateLimit),
            ("This model's maximum context length is 128000 tokens", ErrorCategory::TokenLimit),
            ("Incorrect API key provided: sk-...", ErrorCategory::Auth),
            (
                "Failed to connect to Ollama at http://localhost:11434",
                ErrorCategory::Network,
            ),
            ("model 'llama3' not found, try pulling it first", ErrorCategory::Unavailable),
            ("Failed to parse episode shots: missing field `id`", ErrorCategory::ParseError),
            ("The server is overloaded", ErrorCategory::Transient),
            ("Something odd happened", ErrorCategory::Unknown),
        ];
        for (message, expected) in cases {
            assert_eq!(
                ErrorClassifier::classify(message, "openai").category,
                expected,
                "{}",
                message
            );
        }
    }

    #[test]
    fn test_classify_http_status() {
        let category = |status| ErrorClassifier::classify_http_status(status, "", "x").category;
        assert_eq!(category(429), ErrorCategory::RateLimit);
        assert_eq!(category(401), ErrorCategory::Auth);
        assert_eq!(category(404), ErrorCategory::Unavailable);
        assert_eq!(category(529), ErrorCategory::Transient);
        assert_eq!(category(302), ErrorCategory::Unknown);
    }

    #[test]
    fn test_llm_error_display() {
        let err = ErrorClassifier::classify("Too many requests", "openai");
        assert_eq!(err.to_string(), "[openai:RATE_LIMIT] Too many requests");

        let err = ErrorClassifier::classify("connection reset", "");
        assert_eq!(err.to_string(), "[NETWORK] connection reset");
    }

    #[test]
    fn test_invalid_transition_display() {
        let err = PipelineError::InvalidTransition {
            episode_id: 3,
            from: "completed".to_string(),
            to: "generating".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Episode 3: illegal status change completed -> generating"
        );
    }

    #[test]
    fn test_generation_error_keeps_spent_usage() {
        let err = PipelineError::generation("episode summary 'Pilot'", "empty summary")
            .with_usage(TokenUsage::from_counts(100, 25));
        assert_eq!(err.spent_usage().total_tokens, 125);
        assert_eq!(
            err.to_string(),
            "Generation failed for episode summary 'Pilot': empty summary"
        );

        let err = PipelineError::UnknownEpisode(3).with_usage(TokenUsage::from_counts(1, 1));
        assert_eq!(err.spent_usage(), TokenUsage::default());
    }

    #[test]
    fn test_validation_error_names_field() {
        let err: PipelineError =
            ValidationError::new(ValidationErrorKind::Duplicate, "shot id '1-01' appears twice")
                .with_field("episodes.1[1].id")
                .into();
        assert_eq!(
            err.to_string(),
            "Validation failed for 'episodes.1[1].id': shot id '1-01' appears twice"
        );
    }
}
