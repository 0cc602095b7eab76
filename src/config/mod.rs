//! Configuration Management
//!
//! Hierarchical resolution, later sources win:
//! 1. Built-in defaults
//! 2. Global config (~/.config/scriptflow/config.toml)
//! 3. Project config (.scriptflow/config.toml)
//! 4. Environment variables (SCRIPTFLOW_*)
//! 5. CLI flags (`--yes`, `--verbose`)

mod loader;
mod types;

pub use loader::ConfigLoader;
pub use types::*;
