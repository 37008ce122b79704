use std::time::Duration;

use config::{Config, ConfigError, Environment, Source};
use serde::Deserialize;

use crate::types::{
    DEFAULT_DATABASE_NAME, DEFAULT_MONGODB_URI, DEFAULT_PORT, DEFAULT_STORE_TIMEOUT_SECS,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Mongo,
    Memory,
}

/// Runtime settings, read from the process environment (and `.env` via dotenv).
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub port: u16,
    pub bind_host: String,
    pub mongodb_uri: String,
    pub database_name: String,
    pub store_backend: StoreBackend,
    pub store_timeout_secs: u64,
    /// Answer lookups of missing documents with 404 instead of 500.
    pub strict_not_found: bool,
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_source(Environment::default())
    }

    fn from_source<S>(source: S) -> Result<Self, ConfigError>
    where
        S: Source + Send + Sync + 'static,
    {
        Config::builder()
            .set_default("port", DEFAULT_PORT)?
            .set_default("bind_host", "0.0.0.0")?
            .set_default("mongodb_uri", DEFAULT_MONGODB_URI)?
            .set_default("database_name", DEFAULT_DATABASE_NAME)?
            .set_default("store_backend", "mongo")?
            .set_default("store_timeout_secs", DEFAULT_STORE_TIMEOUT_SECS)?
            .set_default("strict_not_found", false)?
            .add_source(source)
            .build()?
            .try_deserialize()
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store_timeout_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings_from(vars: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        let map = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        Settings::from_source(Environment::default().source(Some(map)))
    }

    #[test]
    fn defaults_apply_without_environment() {
        let settings = settings_from(&[]).unwrap();

        assert_eq!(settings.port, 8000);
        assert_eq!(settings.mongodb_uri, "mongodb://localhost:27017");
        assert_eq!(settings.database_name, "restaurant");
        assert_eq!(settings.store_backend, StoreBackend::Mongo);
        assert_eq!(settings.store_timeout(), Duration::from_secs(100));
        assert!(!settings.strict_not_found);
    }

    #[test]
    fn environment_overrides_defaults() {
        let settings = settings_from(&[
            ("PORT", "9100"),
            ("STORE_BACKEND", "memory"),
            ("STRICT_NOT_FOUND", "true"),
            ("STORE_TIMEOUT_SECS", "0"),
        ])
        .unwrap();

        assert_eq!(settings.port, 9100);
        assert_eq!(settings.store_backend, StoreBackend::Memory);
        assert!(settings.strict_not_found);
        assert_eq!(settings.store_timeout(), Duration::from_secs(1));
    }

    #[test]
    fn rejects_unparseable_port() {
        assert!(settings_from(&[("PORT", "eighty")]).is_err());
    }
}
