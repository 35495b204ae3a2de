use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;

/// Default `SQLite` database, relative to the working directory.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/app.db";

/// Default location of the serialized model artifact.
pub const DEFAULT_MODEL_PATH: &str = "artifacts/model.json";

/// Default location of the training dataset.
pub const DEFAULT_DATASET_PATH: &str = "data/diabetes.csv";

/// Default HTTP bind address.
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Database connection URL
    pub database_url: String,

    /// Path of the serialized model artifact
    pub model_path: PathBuf,

    /// Path of the training dataset CSV
    pub dataset_path: PathBuf,

    /// Address the HTTP server binds to
    pub bind_addr: SocketAddr,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            dataset_path: PathBuf::from(DEFAULT_DATASET_PATH),
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
        }
    }
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// Optional environment variables:
    /// - `DATABASE_URL`: `SQLite` connection string (default: `sqlite://data/app.db`)
    /// - `MODEL_PATH`: model artifact location (default: `artifacts/model.json`)
    /// - `DATASET_PATH`: training CSV location (default: `data/diabetes.csv`)
    /// - `BIND_ADDR`: HTTP listen address (default: `0.0.0.0:8000`)
    ///
    /// # Errors
    ///
    /// Returns an error if `BIND_ADDR` is not a valid socket address.
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if `BIND_ADDR` is not a valid socket address.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let database_url =
            lookup("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());

        let model_path = lookup("MODEL_PATH")
            .map_or_else(|| PathBuf::from(DEFAULT_MODEL_PATH), PathBuf::from);

        let dataset_path = lookup("DATASET_PATH")
            .map_or_else(|| PathBuf::from(DEFAULT_DATASET_PATH), PathBuf::from);

        let bind_addr = lookup("BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse()
            .context("BIND_ADDR must be a socket address such as 0.0.0.0:8000")?;

        Ok(Self {
            database_url,
            model_path,
            dataset_path,
            bind_addr,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = Config::from_lookup(|_| None).expect("defaults are valid");
        assert_eq!(config, Config::default());
        assert_eq!(config.bind_addr.port(), 8000);
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "sqlite::memory:"),
            ("MODEL_PATH", "/tmp/m.json"),
            ("BIND_ADDR", "127.0.0.1:9000"),
        ]))
        .expect("valid overrides");

        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.model_path, PathBuf::from("/tmp/m.json"));
        assert_eq!(config.dataset_path, PathBuf::from(DEFAULT_DATASET_PATH));
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:9000");
    }

    #[test]
    fn test_invalid_bind_addr() {
        let result = Config::from_lookup(lookup_from(&[("BIND_ADDR", "not-an-address")]));
        assert!(result.is_err());
    }
}
