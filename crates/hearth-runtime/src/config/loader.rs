//! Configuration loader using figment.
//!
//! Sources are layered, later overriding earlier:
//!
//! 1. Built-in defaults
//! 2. Profile-specific file (`hearth.{profile}.toml`)
//! 3. Main file (`hearth.toml`), searched in the current directory, any
//!    added search paths, and `~/.config/hearth/`
//! 4. Environment variables (`HEARTH_*`, `__` as the section separator —
//!    `HEARTH_LOGGING__LEVEL=debug` maps to `logging.level`)
//!
//! The `toml-config` feature (enabled by the facade crate's default
//! features) turns on TOML file loading; without it only defaults and
//! environment variables apply.

use std::path::{Path, PathBuf};

use figment::Figment;
#[cfg(feature = "toml-config")]
use figment::providers::{Format, Toml};
use figment::providers::{Env, Serialized};
use tracing::debug;

use super::error::{ConfigError, ConfigResult};
use super::schema::HearthConfig;

const FILE_STEM: &str = "hearth";
const ENV_PREFIX: &str = "HEARTH_";

/// Configuration profile for environment-specific settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Profile {
    /// Development profile (default).
    #[default]
    Development,
    /// Production profile.
    Production,
    /// Custom profile name.
    Custom(String),
}

impl Profile {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Custom(name) => name,
        }
    }

    /// Reads `HEARTH_PROFILE`, defaulting to development.
    pub fn from_env() -> Self {
        std::env::var("HEARTH_PROFILE")
            .map(|p| Self::from_name(&p))
            .unwrap_or_default()
    }

    fn from_name(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "development" | "dev" => Self::Development,
            other => Self::Custom(other.to_string()),
        }
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Multi-source configuration loader.
///
/// # Example
///
/// ```rust,ignore
/// let config = ConfigLoader::new()
///     .with_current_dir()
///     .profile("production")
///     .load()?;
/// ```
pub struct ConfigLoader {
    profile: Profile,
    search_paths: Vec<PathBuf>,
    load_env: bool,
    config_file: Option<PathBuf>,
    overrides: Option<HearthConfig>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            profile: Profile::from_env(),
            search_paths: Vec::new(),
            load_env: true,
            config_file: None,
            overrides: None,
        }
    }

    /// Adds the current directory to the search paths.
    pub fn with_current_dir(mut self) -> Self {
        self.search_paths.push(PathBuf::from("."));
        self
    }

    /// Sets the configuration profile.
    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Profile::from_name(&profile.into());
        self
    }

    /// Adds a search path for configuration files.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Loads a specific configuration file instead of searching.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Enables environment variable loading (the default).
    pub fn with_env(mut self) -> Self {
        self.load_env = true;
        self
    }

    /// Disables environment variable loading.
    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self
    }

    /// Merges programmatic overrides at the highest priority.
    pub fn merge(mut self, config: HearthConfig) -> Self {
        self.overrides = Some(config);
        self
    }

    /// Every path the loader will consider for the main config file.
    fn candidate_paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.search_paths.clone();
        if let Some(home_config) = dirs::config_dir() {
            paths.push(home_config.join(FILE_STEM));
        }
        paths
    }

    /// Loads and merges all configured sources.
    pub fn load(self) -> ConfigResult<HearthConfig> {
        let mut figment = Figment::from(Serialized::defaults(HearthConfig::default()));

        #[cfg(feature = "toml-config")]
        {
            if let Some(file) = &self.config_file {
                if !file.exists() {
                    return Err(ConfigError::FileNotFound(file.clone()));
                }
                figment = figment.merge(Toml::file(file));
            } else {
                for dir in self.candidate_paths() {
                    let profile_file =
                        dir.join(format!("{FILE_STEM}.{}.toml", self.profile.as_str()));
                    let main_file = dir.join(format!("{FILE_STEM}.toml"));
                    figment = figment.merge(Toml::file(profile_file));
                    figment = figment.merge(Toml::file(main_file));
                }
            }
        }
        #[cfg(not(feature = "toml-config"))]
        {
            let _ = self.candidate_paths();
            if let Some(file) = &self.config_file {
                return Err(ConfigError::FileNotFound(file.clone()));
            }
        }

        if self.load_env {
            figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));
        }

        if let Some(overrides) = self.overrides {
            figment = figment.merge(Serialized::defaults(overrides));
        }

        let config: HearthConfig = figment.extract()?;
        debug!(profile = %self.profile, "configuration loaded");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_load_without_any_sources() {
        let config = ConfigLoader::new().without_env().load().unwrap();
        assert_eq!(config.dispatch.workers, 4);
    }

    #[test]
    fn profile_names_normalize() {
        assert_eq!(Profile::from_name("PROD"), Profile::Production);
        assert_eq!(Profile::from_name("dev"), Profile::Development);
        assert_eq!(
            Profile::from_name("staging"),
            Profile::Custom("staging".into())
        );
    }

    #[test]
    fn programmatic_overrides_win() {
        let mut overrides = HearthConfig::default();
        overrides.client.default_timeout_ms = 1234;
        let config = ConfigLoader::new()
            .without_env()
            .merge(overrides)
            .load()
            .unwrap();
        assert_eq!(config.client.default_timeout_ms, 1234);
    }
}
