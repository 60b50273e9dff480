use crate::{Error, Result};
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

pub struct Config {
    pub data_dir: String,
    pub cache_key: String,
    pub cache_max_entries: Option<u64>,
    pub event_capacity: usize,
    pub max_redeliveries: u32,
    pub redelivery_backoff: Duration,
    pub seed_posts: usize,
}

impl Config {
    const DEFAULT_DATA_DIR: &str = "./data";
    const DEFAULT_CACHE_KEY: &str = "posts";
    const DEFAULT_EVENT_CAPACITY: usize = 1024;
    const DEFAULT_MAX_REDELIVERIES: u32 = 3;
    const DEFAULT_REDELIVERY_BACKOFF_MS: u64 = 200;

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let cache_key = lookup("POSTCACHE_CACHE_KEY")
            .unwrap_or_else(|| Self::DEFAULT_CACHE_KEY.to_string());
        if cache_key.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "POSTCACHE_CACHE_KEY must not be empty".to_string(),
            ));
        }

        let cache_max_entries: Option<u64> = parse_var(&lookup, "POSTCACHE_CACHE_MAX_ENTRIES")?;
        if cache_max_entries == Some(0) {
            return Err(Error::InvalidConfig(
                "POSTCACHE_CACHE_MAX_ENTRIES must be at least 1".to_string(),
            ));
        }

        let seed_posts = parse_var(&lookup, "POSTCACHE_SEED_POSTS")?.unwrap_or(0);
        if seed_posts > 0 {
            warn!(seed_posts, "Seeding is enabled, fake posts will be written to an empty store");
        }

        Ok(Self {
            data_dir: lookup("POSTCACHE_DATA_DIR")
                .unwrap_or_else(|| Self::DEFAULT_DATA_DIR.to_string()),
            cache_key,
            cache_max_entries,
            event_capacity: parse_var(&lookup, "POSTCACHE_EVENT_CAPACITY")?
                .unwrap_or(Self::DEFAULT_EVENT_CAPACITY),
            max_redeliveries: parse_var(&lookup, "POSTCACHE_MAX_REDELIVERIES")?
                .unwrap_or(Self::DEFAULT_MAX_REDELIVERIES),
            redelivery_backoff: Duration::from_millis(
                parse_var(&lookup, "POSTCACHE_REDELIVERY_BACKOFF_MS")?
                    .unwrap_or(Self::DEFAULT_REDELIVERY_BACKOFF_MS),
            ),
            seed_posts,
        })
    }
}

fn parse_var<F, T>(lookup: &F, name: &str) -> Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| Error::InvalidConfig(format!("{name}={raw:?} is not a valid value"))),
    }
}
