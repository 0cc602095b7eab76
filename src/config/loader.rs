//! Configuration Loader (Figment-based)
//!
//! Loads and merges configuration from multiple sources using Figment:
//! 1. Built-in defaults (Serialized)
//! 2. Global config (~/.config/scriptflow/config.toml)
//! 3. Project config (.scriptflow/config.toml)
//! 4. Environment variables (SCRIPTFLOW_* prefix, `__` between key segments)

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::types::Config;
use crate::types::{PipelineError, Result};

const PROJECT_DIR: &str = ".scriptflow";
const DB_FILE: &str = "project.db";

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with full resolution chain:
    /// defaults → global → project → env vars
    pub fn load() -> Result<Config> {
        Self::load_in(Path::new("."))
    }

    /// Same chain with the project directory resolved under `root`
    pub fn load_in(root: &Path) -> Result<Config> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        if let Some(global_path) = Self::global_config_path()
            && global_path.exists()
        {
            debug!("Loading global config from: {}", global_path.display());
            figment = figment.merge(Toml::file(&global_path));
        }

        let project_path = root.join(Self::project_config_path());
        if project_path.exists() {
            debug!("Loading project config from: {}", project_path.display());
            figment = figment.merge(Toml::file(&project_path));
        }

        // SCRIPTFLOW_PIPELINE__CHUNK_DELAY_MS -> pipeline.chunk_delay_ms
        figment = figment.merge(Env::prefixed("SCRIPTFLOW_").split("__").lowercase(true));

        let config: Config = figment
            .extract()
            .map_err(|e| PipelineError::Config(format!("Configuration error: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a specific file only
    pub fn load_from_file(path: &Path) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .extract()
            .map_err(|e| PipelineError::Config(format!("Configuration error: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    // =========================================================================
    // Path Management
    // =========================================================================

    /// Get path to global config directory (~/.config/scriptflow/)
    pub fn global_dir() -> Option<PathBuf> {
        env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| {
                env::var("HOME")
                    .ok()
                    .map(|home| PathBuf::from(home).join(".config"))
            })
            .map(|p| p.join("scriptflow"))
    }

    /// Get path to global config file
    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_dir().map(|dir| dir.join("config.toml"))
    }

    /// Get path to project config file, relative to the project root
    pub fn project_config_path() -> PathBuf {
        Self::project_dir().join("config.toml")
    }

    /// Get project data directory, relative to the project root
    pub fn project_dir() -> PathBuf {
        PathBuf::from(PROJECT_DIR)
    }

    /// Project database, relative to the project root
    pub fn database_path() -> PathBuf {
        Self::project_dir().join(DB_FILE)
    }

    // =========================================================================
    // Config Commands
    // =========================================================================

    /// Show config file paths
    pub fn show_path() {
        println!("Configuration paths:");
        println!();

        if let Some(global) = Self::global_config_path() {
            let exists = if global.exists() { "✓" } else { "✗" };
            println!("  Global:   {} {}", exists, global.display());
        } else {
            println!("  Global:   (not available)");
        }

        let project = Self::project_config_path();
        let exists = if project.exists() { "✓" } else { "✗" };
        println!("  Project:  {} {}", exists, project.display());

        let db = Self::database_path();
        let exists = if db.exists() { "✓" } else { "✗" };
        println!("  Database: {} {}", exists, db.display());
    }

    /// Show current effective configuration
    pub fn show_config(as_json: bool) -> Result<()> {
        let config = Self::load()?;

        if as_json {
            println!("{}", serde_json::to_string_pretty(&config)?);
        } else {
            println!(
                "{}",
                toml::to_string_pretty(&config).map_err(|e| PipelineError::Config(e.to_string()))?
            );
        }

        Ok(())
    }

    // =========================================================================
    // Initialization
    // =========================================================================

    /// Initialize global configuration
    pub fn init_global(force: bool) -> Result<PathBuf> {
        let global_dir = Self::global_dir().ok_or_else(|| {
            PipelineError::Config("Cannot determine global config directory".to_string())
        })?;

        fs::create_dir_all(&global_dir)?;

        let config_path = global_dir.join("config.toml");
        if !config_path.exists() || force {
            fs::write(&config_path, Self::default_global_config())?;
            info!("Created global config: {}", config_path.display());
        } else {
            info!("Global config exists: {}", config_path.display());
        }

        Ok(global_dir)
    }

    /// Initialize project configuration under `root`
    pub fn init_project(root: &Path, name: Option<&str>) -> Result<PathBuf> {
        let project_dir = root.join(Self::project_dir());
        fs::create_dir_all(&project_dir)?;

        let config_path = project_dir.join("config.toml");
        if !config_path.exists() {
            fs::write(&config_path, Self::default_project_config(name))?;
            info!("Created project config: {}", config_path.display());
        }

        Ok(project_dir)
    }

    /// Check if a project exists under `root`
    pub fn is_project_initialized(root: &Path) -> bool {
        root.join(Self::database_path()).exists()
    }

    // =========================================================================
    // Internal
    // =========================================================================

    fn default_global_config() -> String {
        r#"# ScriptFlow Global Configuration
# User-wide defaults. Project settings in .scriptflow/config.toml override these.

version = "1.0"

[llm]
provider = "openai"
timeout_secs = 300
temperature = 0.7
max_tokens = 8192

[pipeline]
chunk_delay_ms = 1000
auto_confirm = false
"#
        .to_string()
    }

    fn default_project_config(name: Option<&str>) -> String {
        let project_name = name.unwrap_or("project");
        format!(
            r#"# ScriptFlow Project Configuration
# Project-specific settings that override global defaults.

version = "1.0"

[project]
name = "{}"

[pipeline]
# Pause between scene-chunk calls during prompt generation
chunk_delay_ms = 1000
max_script_chars = 30000

# Uncomment to override the built-in guides
# [guides]
# style = "..."
# shot_format = "..."
# prompt_style = "..."
"#,
            project_name
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_project_writes_loadable_config() {
        let temp_dir = TempDir::new().unwrap();
        let dir = ConfigLoader::init_project(temp_dir.path(), Some("heist")).unwrap();

        assert!(dir.join("config.toml").exists());
        assert!(!ConfigLoader::is_project_initialized(temp_dir.path()));

        let config = ConfigLoader::load_from_file(&dir.join("config.toml")).unwrap();
        assert_eq!(config.project.name.as_deref(), Some("heist"));
        assert_eq!(config.pipeline.max_script_chars, 30_000);
    }

    #[test]
    fn test_project_file_overrides_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(
            &path,
            "[llm]\nprovider = \"ollama\"\n\n[pipeline]\nchunk_delay_ms = 0\nauto_confirm = true\n",
        )
        .unwrap();

        let config = ConfigLoader::load_from_file(&path).unwrap();
        assert_eq!(config.llm.provider, "ollama");
        assert_eq!(config.pipeline.chunk_delay_ms, 0);
        assert!(config.pipeline.auto_confirm);
        assert_eq!(config.llm.timeout_secs, 300);
    }

    #[test]
    fn test_invalid_file_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "[llm]\ntemperature = 9.0\n").unwrap();

        assert!(matches!(
            ConfigLoader::load_from_file(&path),
            Err(PipelineError::Config(_))
        ));
    }

    #[test]
    fn test_default_templates_parse() {
        let global: Config = toml::from_str(&ConfigLoader::default_global_config()).unwrap();
        assert_eq!(global.pipeline.chunk_delay_ms, 1000);
        let project: Config =
            toml::from_str(&ConfigLoader::default_project_config(None)).unwrap();
        assert_eq!(project.project.name.as_deref(), Some("project"));
    }
}
