//! Application-level configuration loading: JSON file first, then environment overrides.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "TRIVIA_BACK_CONFIG_PATH";

const DEFAULT_PORT: u16 = 9090;
const DEFAULT_MONGO_URI: &str = "mongodb://localhost:27017";
const DEFAULT_MONGO_DB: &str = "trivia";
const DEFAULT_LEADERBOARD_SIZE: usize = 3;
const DEFAULT_MUTATION_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_MAX_CAS_RETRIES: u32 = 3;

/// Which persistence backend the server should install.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// Process-local maps; data is lost on restart.
    Memory,
    /// MongoDB collections (requires the `mongo-store` feature).
    Mongo,
}

impl StorageBackend {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" => Some(StorageBackend::Memory),
            "mongo" | "mongodb" => Some(StorageBackend::Mongo),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// TCP port the HTTP server binds to.
    pub port: u16,
    /// Selected persistence backend.
    pub storage: StorageBackend,
    /// MongoDB connection string.
    pub mongo_uri: String,
    /// MongoDB database name.
    pub mongo_db: String,
    /// Number of entries exposed in the `top3` view.
    pub leaderboard_size: usize,
    /// Upper bound for a single gated room mutation.
    pub mutation_timeout: Duration,
    /// How many times a compare-and-swap miss is retried before giving up.
    pub max_cas_retries: u32,
}

impl AppConfig {
    /// Load the configuration file (if any) and apply environment overrides.
    pub fn load() -> Self {
        let mut config = Self::from_file();
        config.apply_env(|key| env::var(key).ok());
        config
    }

    fn from_file() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    info!(path = %path.display(), "loaded configuration file");
                    raw.into()
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

    /// Apply `PORT`/`SERVER_PORT`, `STORAGE_BACKEND`, `MONGO_URI` and `MONGO_DB`.
    fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("PORT")
            .or_else(|| lookup("SERVER_PORT"))
            .and_then(|value| value.parse::<u16>().ok())
        {
            self.port = port;
        }

        if let Some(raw) = lookup("STORAGE_BACKEND") {
            match StorageBackend::parse(&raw) {
                Some(backend) => self.storage = backend,
                None => warn!(value = %raw, "ignoring unknown STORAGE_BACKEND"),
            }
        }

        if let Some(uri) = lookup("MONGO_URI").filter(|value| !value.is_empty()) {
            self.mongo_uri = uri;
        }
        if let Some(db) = lookup("MONGO_DB").filter(|value| !value.is_empty()) {
            self.mongo_db = db;
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        RawConfig::default().into()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    port: Option<u16>,
    storage: Option<StorageBackend>,
    mongo_uri: Option<String>,
    mongo_db: Option<String>,
    leaderboard_size: Option<usize>,
    mutation_timeout_ms: Option<u64>,
    max_cas_retries: Option<u32>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        Self {
            port: value.port.unwrap_or(DEFAULT_PORT),
            storage: value.storage.unwrap_or(StorageBackend::Memory),
            mongo_uri: value.mongo_uri.unwrap_or_else(|| DEFAULT_MONGO_URI.into()),
            mongo_db: value.mongo_db.unwrap_or_else(|| DEFAULT_MONGO_DB.into()),
            leaderboard_size: value
                .leaderboard_size
                .filter(|size| *size > 0)
                .unwrap_or(DEFAULT_LEADERBOARD_SIZE),
            mutation_timeout: Duration::from_millis(
                value
                    .mutation_timeout_ms
                    .unwrap_or(DEFAULT_MUTATION_TIMEOUT_MS),
            ),
            max_cas_retries: value.max_cas_retries.unwrap_or(DEFAULT_MAX_CAS_RETRIES),
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

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn defaults_match_reference_values() {
        let config = AppConfig::default();
        assert_eq!(config.port, 9090);
        assert_eq!(config.storage, StorageBackend::Memory);
        assert_eq!(config.leaderboard_size, 3);
        assert_eq!(config.mutation_timeout, Duration::from_secs(5));
        assert_eq!(config.max_cas_retries, 3);
    }

    #[test]
    fn partial_file_keeps_defaults_for_missing_keys() {
        let raw: RawConfig =
            serde_json::from_str(r#"{"storage": "mongo", "leaderboard_size": 5}"#).unwrap();
        let config = AppConfig::from(raw);
        assert_eq!(config.storage, StorageBackend::Mongo);
        assert_eq!(config.leaderboard_size, 5);
        assert_eq!(config.mongo_db, "trivia");
    }

    #[test]
    fn zero_leaderboard_size_falls_back() {
        let raw: RawConfig = serde_json::from_str(r#"{"leaderboard_size": 0}"#).unwrap();
        assert_eq!(AppConfig::from(raw).leaderboard_size, 3);
    }

    #[test]
    fn environment_overrides_file_values() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("SERVER_PORT", "8081"),
            ("STORAGE_BACKEND", "MongoDB"),
            ("MONGO_DB", "quiz"),
        ]);
        let mut config = AppConfig::default();
        config.apply_env(|key| vars.get(key).map(|value| value.to_string()));

        assert_eq!(config.port, 8081);
        assert_eq!(config.storage, StorageBackend::Mongo);
        assert_eq!(config.mongo_db, "quiz");
        assert_eq!(config.mongo_uri, DEFAULT_MONGO_URI);
    }

    #[test]
    fn unknown_backend_is_ignored() {
        let mut config = AppConfig::default();
        config.apply_env(|key| (key == "STORAGE_BACKEND").then(|| "redis".to_string()));
        assert_eq!(config.storage, StorageBackend::Memory);
    }
}
