//! Configuration loading, validation, and management for Persona.
//!
//! Loads configuration from `~/.persona/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Log levels accepted by `[logging] level`.
const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// The root configuration structure.
///
/// Maps directly to `~/.persona/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Where records and user preferences are read from
    #[serde(default)]
    pub store: StoreConfig,

    /// Inheritance resolution limits
    #[serde(default)]
    pub resolver: ResolverConfig,

    /// Compiled-record cache
    #[serde(default)]
    pub cache: CacheConfig,

    /// Log output
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// "file" or "memory". A memory store starts empty and is filled by the
    /// embedding program, so the `persona` CLI only works with "file".
    #[serde(default = "default_store_backend")]
    pub backend: String,

    /// Directory of `*.toml` / `*.json` record documents
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub records_dir: Option<String>,

    /// Directory of `<user_id>.toml` preference files
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferences_dir: Option<String>,
}

fn default_store_backend() -> String {
    "file".into()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            records_dir: None,
            preferences_dir: None,
        }
    }
}

impl StoreConfig {
    /// Records directory, defaulting to `~/.persona/records`.
    pub fn records_path(&self) -> PathBuf {
        self.records_dir
            .as_deref()
            .map(expand_home)
            .unwrap_or_else(|| EngineConfig::config_dir().join("records"))
    }

    /// Preferences directory, defaulting to `~/.persona/preferences`.
    pub fn preferences_path(&self) -> PathBuf {
        self.preferences_dir
            .as_deref()
            .map(expand_home)
            .unwrap_or_else(|| EngineConfig::config_dir().join("preferences"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Longest ancestor chain accepted, leaf included
    #[serde(default = "default_max_chain_depth")]
    pub max_chain_depth: usize,
}

fn default_max_chain_depth() -> usize {
    16
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_chain_depth: default_max_chain_depth(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl EngineConfig {
    /// Load configuration from the default path (~/.persona/config.toml).
    ///
    /// Environment overrides (highest priority):
    /// - `PERSONA_RECORDS_DIR`
    /// - `PERSONA_PREFERENCES_DIR`
    /// - `PERSONA_LOG_LEVEL`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        if let Ok(dir) = std::env::var("PERSONA_RECORDS_DIR") {
            config.store.records_dir = Some(dir);
        }
        if let Ok(dir) = std::env::var("PERSONA_PREFERENCES_DIR") {
            config.store.preferences_dir = Some(dir);
        }
        if let Ok(level) = std::env::var("PERSONA_LOG_LEVEL") {
            config.logging.level = level;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".persona")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !matches!(self.store.backend.as_str(), "file" | "memory") {
            return Err(ConfigError::ValidationError(format!(
                "store.backend must be \"file\" or \"memory\", got \"{}\"",
                self.store.backend
            )));
        }

        if self.resolver.max_chain_depth == 0 {
            return Err(ConfigError::ValidationError(
                "resolver.max_chain_depth must be at least 1".into(),
            ));
        }

        if !LOG_LEVELS.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "logging.level must be one of {}, got \"{}\"",
                LOG_LEVELS.join(", "),
                self.logging.level
            )));
        }

        Ok(())
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

/// Expand a leading `~/` to the home directory.
fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs_home().join(rest),
        None => PathBuf::from(path),
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = EngineConfig::default();
        assert_eq!(config.store.backend, "file");
        assert_eq!(config.resolver.max_chain_depth, 16);
        assert!(config.cache.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = EngineConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: EngineConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.store.backend, config.store.backend);
        assert_eq!(parsed.logging.level, config.logging.level);
    }

    #[test]
    fn zero_chain_depth_rejected() {
        let config = EngineConfig {
            resolver: ResolverConfig { max_chain_depth: 0 },
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_backend_rejected() {
        let mut config = EngineConfig::default();
        config.store.backend = "postgres".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("postgres"));
    }

    #[test]
    fn unknown_log_level_rejected() {
        let mut config = EngineConfig::default();
        config.logging.level = "chatty".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = EngineConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.store.backend, "file");
    }

    #[test]
    fn load_from_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[store]
backend = "file"
records_dir = "/srv/persona/records"

[resolver]
max_chain_depth = 4

[cache]
enabled = false

[logging]
level = "debug"
json = true
"#,
        )
        .unwrap();

        let config = EngineConfig::load_from(&path).unwrap();
        assert_eq!(config.store.records_path(), PathBuf::from("/srv/persona/records"));
        assert_eq!(config.resolver.max_chain_depth, 4);
        assert!(!config.cache.enabled);
        assert!(config.logging.json);
    }

    #[test]
    fn invalid_file_is_a_parse_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[resolver]\nmax_chain_depth = \"many\"\n").unwrap();
        assert!(matches!(
            EngineConfig::load_from(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = EngineConfig::default_toml();
        assert!(toml_str.contains("max_chain_depth = 16"));
        assert!(toml_str.contains("backend = \"file\""));
    }

    #[test]
    fn default_paths_live_under_config_dir() {
        let store = StoreConfig::default();
        assert!(store.records_path().ends_with(".persona/records"));
        assert!(store.preferences_path().ends_with(".persona/preferences"));
    }
}
