use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON5 parse error: {0}")]
    Json5(#[from] json5::Error),
    #[error("Home directory not found")]
    NoHomeDir,
}

/// Notification dispatch configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Number of worker tasks draining the notification queue.
    #[serde(default = "default_notify_workers")]
    pub workers: usize,
    /// Queue capacity; a full queue drops notifications instead of blocking
    /// the scheduler.
    #[serde(default = "default_notify_queue")]
    pub queue_size: usize,
}

fn default_notify_workers() -> usize {
    2
}

fn default_notify_queue() -> usize {
    64
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            workers: default_notify_workers(),
            queue_size: default_notify_queue(),
        }
    }
}

/// Top-level anacrond configuration. Loaded once at startup and passed into
/// constructors; nothing reads it from ambient global state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the job database, execution log, and scripts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    /// Seconds between scheduler passes.
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,
    /// Deadline for a single command execution, in seconds. Expired commands
    /// are force-killed.
    #[serde(default = "default_exec_timeout_secs")]
    pub exec_timeout_secs: u64,
    /// Interpreter for script commands. When unset, resolved via `which
    /// python3` at startup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interpreter: Option<PathBuf>,
    /// Notification dispatch settings.
    #[serde(default)]
    pub notify: NotifyConfig,
}

fn default_tick_secs() -> u64 {
    60
}

fn default_exec_timeout_secs() -> u64 {
    300
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: None,
            tick_secs: default_tick_secs(),
            exec_timeout_secs: default_exec_timeout_secs(),
            interpreter: None,
            notify: NotifyConfig::default(),
        }
    }
}

impl Config {
    /// Effective data directory (configured, or `~/.anacrond`).
    pub fn data_dir(&self) -> Result<PathBuf, ConfigError> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => default_data_dir(),
        }
    }

    /// Path of the job database.
    pub fn db_path(&self) -> Result<PathBuf, ConfigError> {
        Ok(self.data_dir()?.join("jobs.db"))
    }

    /// Path of the execution log.
    pub fn log_path(&self) -> Result<PathBuf, ConfigError> {
        Ok(self.data_dir()?.join("output.log"))
    }

    /// Directory script commands are resolved against.
    pub fn script_dir(&self) -> Result<PathBuf, ConfigError> {
        Ok(self.data_dir()?.join("scripts"))
    }
}

/// Resolve the default data directory (~/.anacrond/).
pub fn default_data_dir() -> Result<PathBuf, ConfigError> {
    dirs::home_dir()
        .map(|h| h.join(".anacrond"))
        .ok_or(ConfigError::NoHomeDir)
}

/// Resolve the config file path (~/.anacrond/config.json5).
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(default_data_dir()?.join("config.json5"))
}

/// Load configuration from the default path, falling back to defaults.
pub fn load_config() -> Result<Config, ConfigError> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    let path = config_file_path()?;
    load_config_from(&path)
}

/// Load configuration from a specific path, falling back to defaults if not
/// found.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        tracing::debug!("Config file not found at {}, using defaults", path.display());
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config: Config = json5::from_str(&content)?;
    Ok(config)
}

/// Ensure the data directory and script subdirectory exist.
pub fn ensure_data_dir(config: &Config) -> Result<PathBuf, ConfigError> {
    let dir = config.data_dir()?;
    std::fs::create_dir_all(config.script_dir()?)?;
    Ok(dir)
}

/// Save configuration to the default path.
pub fn save_config(config: &Config) -> Result<(), ConfigError> {
    let dir = ensure_data_dir(config)?;
    let path = dir.join("config.json5");
    let content = serde_json::to_string_pretty(config)
        .map_err(|e| ConfigError::Io(std::io::Error::other(e)))?;
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.tick_secs, 60);
        assert_eq!(config.exec_timeout_secs, 300);
        assert_eq!(config.notify.workers, 2);
        assert!(config.interpreter.is_none());
    }

    #[test]
    fn test_json5_parse() {
        let json5_str = r#"{
            tick_secs: 5,
            exec_timeout_secs: 30,
            interpreter: "/usr/local/bin/python3",
            notify: { workers: 4 },
        }"#;
        let config: Config = json5::from_str(json5_str).unwrap();
        assert_eq!(config.tick_secs, 5);
        assert_eq!(config.exec_timeout_secs, 30);
        assert_eq!(
            config.interpreter.as_deref(),
            Some(Path::new("/usr/local/bin/python3"))
        );
        assert_eq!(config.notify.workers, 4);
        // Unset fields keep their defaults.
        assert_eq!(config.notify.queue_size, 64);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(&dir.path().join("nope.json5")).unwrap();
        assert_eq!(config.tick_secs, 60);
    }

    #[test]
    fn test_derived_paths_follow_data_dir() {
        let config = Config {
            data_dir: Some(PathBuf::from("/var/lib/anacrond")),
            ..Config::default()
        };
        assert_eq!(
            config.db_path().unwrap(),
            PathBuf::from("/var/lib/anacrond/jobs.db")
        );
        assert_eq!(
            config.script_dir().unwrap(),
            PathBuf::from("/var/lib/anacrond/scripts")
        );
        assert_eq!(
            config.log_path().unwrap(),
            PathBuf::from("/var/lib/anacrond/output.log")
        );
    }
}
