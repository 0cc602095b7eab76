//! AI Integration Layer
//!
//! LLM providers, response repair, and the usage/outcome counters every
//! generation call feeds.

pub mod metrics;
pub mod provider;
pub mod validation;

pub use metrics::{Stats, StatsCategory, StatsCounter, UsageLedger, UsageScope};
pub use provider::{
    ErrorCategory, ErrorClassifier, LlmError, LlmProvider, LlmResponse, OllamaProvider,
    OpenAiProvider, ProviderConfig, ResponseMetadata, ResponseTiming, SharedProvider, TokenUsage,
    create_provider,
};
pub use validation::{JsonRepairer, extract_json_from_response};
