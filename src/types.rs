use std::fmt::{Display, Formatter};

use thiserror::Error;

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_RECORDS_PER_PAGE: u64 = 10;

pub const DEFAULT_PORT: i64 = 8000;
pub const DEFAULT_MONGODB_URI: &str = "mongodb://localhost:27017";
pub const DEFAULT_DATABASE_NAME: &str = "restaurant";
pub const DEFAULT_STORE_TIMEOUT_SECS: i64 = 100;

#[derive(Debug)]
pub struct StoreInitializationError(pub String);

impl Display for StoreInitializationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.pad(&self.0)
    }
}

impl std::error::Error for StoreInitializationError {}

/// Everything that can stop the server before it starts accepting requests.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid configuration: {0}")]
    Config(#[from] config::ConfigError),

    #[error("document store unavailable: {0}")]
    Store(#[from] StoreInitializationError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
