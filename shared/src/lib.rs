// shared/src/lib.rs
use std::time::Duration;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("not found")]
    NotFound,
    #[error("cache unavailable: {0}")]
    CacheUnavailable(String),
    #[error("data store unavailable: {0}")]
    DataStoreUnavailable(String),
    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("internal: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// How long a cache entry lives once written.
///
/// `Never` is the "forever" entry: it is only removed by an explicit delete.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Expiry {
    #[default]
    Never,
    After(Duration),
}

impl Expiry {
    pub fn from_millis(ms: u64) -> Self {
        Expiry::After(Duration::from_millis(ms))
    }

    /// Time to live, `None` for entries that never expire.
    pub fn ttl(&self) -> Option<Duration> {
        match self {
            Expiry::Never => None,
            Expiry::After(d) => Some(*d),
        }
    }
}

pub mod config;
