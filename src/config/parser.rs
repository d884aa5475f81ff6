//! Configuration parser for loading project files.
//!
//! This module handles loading configuration from YAML files, `.env` files
//! and environment variables, with proper precedence and error handling.

use crate::error::{ConfigError, DriftError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::spec::DriftConfig;

/// Environment variable holding the remote API token.
pub const API_TOKEN_VAR: &str = "DRIFTSCOPE_API_TOKEN";

/// Configuration parser for loading project configuration.
#[derive(Debug, Default)]
pub struct ConfigParser {
    /// Base path for resolving relative paths.
    base_path: Option<PathBuf>,
}

impl ConfigParser {
    /// Creates a new configuration parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the base path for resolving relative paths.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<DriftConfig> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        if !path.exists() {
            return Err(DriftError::Config(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            DriftError::Config(ConfigError::ParseError {
                message: format!("Failed to read file: {e}"),
                location: Some(path.display().to_string()),
            })
        })?;

        self.parse_yaml(&content, Some(path))
    }

    /// Parses configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<DriftConfig> {
        debug!("Parsing YAML configuration");

        let config: DriftConfig = serde_yaml::from_str(content).map_err(|e| {
            let location = source.map(|p| p.display().to_string());
            DriftError::Config(ConfigError::ParseError {
                message: format!("YAML parse error: {e}"),
                location,
            })
        })?;

        debug!("Successfully parsed configuration for project: {}", config.project.name);
        Ok(config)
    }

    /// Loads configuration with environment variable overrides.
    ///
    /// Recognized variables: `DRIFTSCOPE_PROJECT_NAME`,
    /// `DRIFTSCOPE_DEFAULT_BRANCH`, `DRIFTSCOPE_STORE_PATH` and
    /// `DRIFTSCOPE_API_URL`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_with_env(&self, path: impl AsRef<Path>) -> Result<DriftConfig> {
        let mut config = self.load_file(path)?;
        Self::apply_env_overrides(&mut config);
        Ok(config)
    }

    /// Applies environment variable overrides to the configuration.
    fn apply_env_overrides(config: &mut DriftConfig) {
        if let Ok(name) = std::env::var("DRIFTSCOPE_PROJECT_NAME") {
            debug!("Overriding project.name from environment");
            config.project.name = name;
        }

        if let Ok(branch) = std::env::var("DRIFTSCOPE_DEFAULT_BRANCH") {
            debug!("Overriding project.default_branch from environment");
            config.project.default_branch = branch;
        }

        if let Ok(path) = std::env::var("DRIFTSCOPE_STORE_PATH") {
            debug!("Overriding store.path from environment");
            config.store.path = Some(path);
        }

        if let Ok(url) = std::env::var("DRIFTSCOPE_API_URL") {
            debug!("Overriding store.url from environment");
            config.store.url = Some(url);
        }
    }

    /// Loads the .env file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| {
                DriftError::Config(ConfigError::ParseError {
                    message: format!("Failed to load .env file: {e}"),
                    location: Some(env_path.display().to_string()),
                })
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }

    /// Gets the remote API token from the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is not set.
    pub fn api_token() -> Result<String> {
        std::env::var(API_TOKEN_VAR).map_err(|_| {
            DriftError::Config(ConfigError::MissingEnvVar {
                name: String::from(API_TOKEN_VAR),
            })
        })
    }
}

/// Default configuration file names to search for.
pub const DEFAULT_CONFIG_FILES: &[&str] = &[
    "driftscope.yaml",
    "driftscope.yml",
    ".driftscope.yaml",
];

/// Finds the configuration file in the start directory or its parents,
/// falling back to the user configuration directory.
///
/// # Errors
///
/// Returns an error if no configuration file is found.
pub fn find_config_file(start_dir: impl AsRef<Path>) -> Result<PathBuf> {
    let start = start_dir.as_ref();
    let mut current = start.to_path_buf();

    loop {
        if let Some(found) = find_in_dir(&current) {
            return Ok(found);
        }

        if !current.pop() {
            break;
        }
    }

    if let Some(found) = dirs::config_dir()
        .map(|dir| dir.join("driftscope"))
        .and_then(|dir| find_in_dir(&dir))
    {
        return Ok(found);
    }

    Err(DriftError::Config(ConfigError::FileNotFound {
        path: start.join(DEFAULT_CONFIG_FILES[0]),
    }))
}

fn find_in_dir(dir: &Path) -> Option<PathBuf> {
    DEFAULT_CONFIG_FILES
        .iter()
        .map(|filename| dir.join(filename))
        .find(|path| path.exists())
        .inspect(|path| info!("Found configuration file: {}", path.display()))
}
