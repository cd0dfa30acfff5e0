//! Application-level configuration loading: vocabulary, write consistency and watcher tuning.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

use crate::state::board::Vocabulary;

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "CODENAMES_CONFIG_PATH";
const DEFAULT_MAX_WRITE_ATTEMPTS: u32 = 5;
const DEFAULT_WATCH_POLL_INTERVAL_MS: u64 = 500;

/// How writers guard their read-decide-write cycle against each other.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsistencyMode {
    /// Re-check on a fresh snapshot, then write unconditionally; each path is last-write-wins.
    BestEffort,
    /// Write only if the document is still at the revision that was read, retrying otherwise.
    #[default]
    CompareAndSwap,
}

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    vocabulary: Vocabulary,
    consistency: ConsistencyMode,
    max_write_attempts: u32,
    watch_poll_interval: Duration,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match Self::from_json(&contents) {
                Ok(app_config) => {
                    info!(
                        path = %path.display(),
                        words = app_config.vocabulary.len(),
                        consistency = ?app_config.consistency,
                        "loaded config"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Parse the JSON configuration format; absent keys keep their defaults.
    pub fn from_json(contents: &str) -> serde_json::Result<Self> {
        serde_json::from_str::<RawConfig>(contents).map(Into::into)
    }

    /// Words boards are dealt from.
    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    /// Write guard used by every writer of this process.
    pub fn consistency(&self) -> ConsistencyMode {
        self.consistency
    }

    /// Read-decide-write cycles attempted before giving up under contention.
    pub fn max_write_attempts(&self) -> u32 {
        self.max_write_attempts
    }

    /// Poll period for backends without push notifications.
    pub fn watch_poll_interval(&self) -> Duration {
        self.watch_poll_interval
    }

    /// Same configuration with another consistency mode.
    pub fn with_consistency(mut self, consistency: ConsistencyMode) -> Self {
        self.consistency = consistency;
        self
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            vocabulary: Vocabulary::builtin(),
            consistency: ConsistencyMode::default(),
            max_write_attempts: DEFAULT_MAX_WRITE_ATTEMPTS,
            watch_poll_interval: Duration::from_millis(DEFAULT_WATCH_POLL_INTERVAL_MS),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    #[serde(default)]
    vocabulary: Option<Vec<String>>,
    #[serde(default)]
    consistency: Option<ConsistencyMode>,
    #[serde(default)]
    max_write_attempts: Option<u32>,
    #[serde(default)]
    watch_poll_interval_ms: Option<u64>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = Self::default();
        Self {
            vocabulary: value
                .vocabulary
                .map(Vocabulary::new)
                .unwrap_or(defaults.vocabulary),
            consistency: value.consistency.unwrap_or(defaults.consistency),
            max_write_attempts: value
                .max_write_attempts
                .filter(|attempts| *attempts > 0)
                .unwrap_or(defaults.max_write_attempts),
            watch_poll_interval: value
                .watch_poll_interval_ms
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis)
                .unwrap_or(defaults.watch_poll_interval),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
