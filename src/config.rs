//! Runtime settings for the covidtracking.com client, read from the
//! environment (after `.env` has been loaded).

use anyhow::{Context, Result};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://covidtracking.com/api/states/daily";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub connect_timeout: Duration,
    /// Extra attempts per day after the first failure.
    pub retries: u32,
    pub retry_backoff: Duration,
    /// Maximum number of days fetched at once.
    pub concurrency: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            retries: 2,
            retry_backoff: Duration::from_millis(500),
            concurrency: 4,
        }
    }
}

impl ApiConfig {
    /// Reads `COVID_API_*` variables, keeping defaults for any that are unset.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ApiConfig::from_env`] with an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let config = Self {
            base_url: lookup("COVID_API_BASE_URL").unwrap_or(defaults.base_url),
            timeout: parse_or(&lookup, "COVID_API_TIMEOUT_SECS", defaults.timeout.as_secs())
                .map(Duration::from_secs)?,
            connect_timeout: parse_or(
                &lookup,
                "COVID_API_CONNECT_TIMEOUT_SECS",
                defaults.connect_timeout.as_secs(),
            )
            .map(Duration::from_secs)?,
            retries: parse_or(&lookup, "COVID_API_RETRIES", defaults.retries)?,
            retry_backoff: parse_or(
                &lookup,
                "COVID_API_RETRY_BACKOFF_MS",
                defaults.retry_backoff.as_millis() as u64,
            )
            .map(Duration::from_millis)?,
            concurrency: parse_or(&lookup, "COVID_API_CONCURRENCY", defaults.concurrency)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Overrides the concurrency limit, e.g. from a CLI flag.
    pub fn with_concurrency(mut self, concurrency: usize) -> Result<Self> {
        self.concurrency = concurrency;
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            anyhow::bail!("concurrency must be at least 1");
        }
        if self.base_url.trim().is_empty() {
            anyhow::bail!("COVID_API_BASE_URL must not be empty");
        }
        Ok(())
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {key}: '{raw}'")),
        None => Ok(default),
    }
}
