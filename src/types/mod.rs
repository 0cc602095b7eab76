pub mod error;
pub mod project;

pub use error::{
    ErrorCategory, ErrorClassifier, LlmError, PipelineError, Result, ResultExt, ValidationError,
    ValidationErrorKind,
};
pub use project::*;
