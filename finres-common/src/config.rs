//! Configuration loading and config file resolution
//!
//! Config file priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. `finres.toml` in the working directory
//! 4. `<user config dir>/finres/config.toml`
//!
//! When none of these exist, callers fall back to compiled defaults.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "FINRES_CONFIG";

/// Config file name looked up in the working directory
pub const LOCAL_CONFIG_FILE: &str = "finres.toml";

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Resolves which config file (if any) should be loaded
pub struct ConfigPathResolver {
    env_var_name: String,
    local_dir: PathBuf,
}

impl ConfigPathResolver {
    pub fn new() -> Self {
        Self {
            env_var_name: CONFIG_ENV_VAR.to_string(),
            local_dir: PathBuf::from("."),
        }
    }

    /// Override the environment variable consulted at priority 2
    pub fn with_env_var(mut self, name: &str) -> Self {
        self.env_var_name = name.to_string();
        self
    }

    /// Override the directory searched for `finres.toml`
    pub fn with_local_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.local_dir = dir.into();
        self
    }

    /// Resolve the config file path
    ///
    /// # Arguments
    /// * `cli_arg` - Path given on the command line, if any
    ///
    /// # Returns
    /// * `Some(path)` for an explicit or discovered file, `None` when defaults apply
    pub fn resolve(&self, cli_arg: Option<&Path>) -> Option<PathBuf> {
        // Priority 1: Command-line argument
        if let Some(path) = cli_arg {
            return Some(path.to_path_buf());
        }

        // Priority 2: Environment variable
        if let Ok(path) = std::env::var(&self.env_var_name) {
            if !path.trim().is_empty() {
                return Some(PathBuf::from(path));
            }
        }

        // Priority 3: Working directory
        let local = self.local_dir.join(LOCAL_CONFIG_FILE);
        if local.exists() {
            return Some(local);
        }

        // Priority 4: User config directory
        dirs::config_dir()
            .map(|d| d.join("finres").join("config.toml"))
            .filter(|p| p.exists())
    }
}

impl Default for ConfigPathResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Load and deserialize a TOML file
///
/// # Arguments
/// * `path` - TOML file to read
///
/// # Returns
/// * Deserialized value, or `Error::Io` / `Error::Config` on failure
pub fn load_toml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
}

/// Load a TOML file if a path was resolved, otherwise use compiled defaults
///
/// An explicitly resolved path that does not exist is an error; a missing
/// optional file is not.
pub fn load_or_default<T: DeserializeOwned + Default>(path: Option<&Path>) -> Result<T> {
    match path {
        Some(path) => {
            if !path.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            info!("Loading configuration from {}", path.display());
            load_toml(path)
        }
        None => {
            warn!("No config file found, using built-in defaults");
            Ok(T::default())
        }
    }
}
