//! Trait and helpers for fetching the daily state records over a date range.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use futures::{StreamExt, TryStreamExt};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::ApiConfig;
use crate::parser::parse_day;

/// Abstraction over a provider of per-day state records (e.g. covidtracking.com).
#[async_trait::async_trait]
pub trait DailySource: Send + Sync {
    /// Returns the raw records published for `date`, one per state.
    async fn fetch_day(&self, date: NaiveDate) -> Result<Vec<Value>>;
}

/// How a date range is fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeOptions {
    /// Days in flight at once.
    pub concurrency: usize,
    /// Extra attempts per day.
    pub retries: u32,
    /// Wait before retry `n` is `retry_backoff * n`.
    pub retry_backoff: Duration,
}

impl Default for RangeOptions {
    fn default() -> Self {
        Self::from(&ApiConfig::default())
    }
}

impl From<&ApiConfig> for RangeOptions {
    fn from(config: &ApiConfig) -> Self {
        Self {
            concurrency: config.concurrency,
            retries: config.retries,
            retry_backoff: config.retry_backoff,
        }
    }
}

/// Every calendar day in `[start, end]`. Empty if `start > end`.
pub fn days_in_range(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    start.iter_days().take_while(|d| *d <= end).collect()
}

/// Fetches one day, retrying failures with linear backoff.
pub async fn fetch_day_with_retry<S: DailySource + ?Sized>(
    source: &S,
    date: NaiveDate,
    retries: u32,
    backoff: Duration,
) -> Result<Vec<Value>> {
    let mut attempt = 0;
    loop {
        match source.fetch_day(date).await {
            Ok(items) => return Ok(items),
            Err(e) if attempt < retries => {
                attempt += 1;
                warn!(date = %date, attempt, error = %e, "Day fetch failed, retrying");
                tokio::time::sleep(backoff * attempt).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Fetches every day in `[start, end]` and concatenates the records in
/// chronological day order.
///
/// Up to `options.concurrency` days are fetched at once. The merge order does
/// not depend on which request finishes first.
///
/// # Errors
///
/// Fails as soon as any day fails after its retries; the error names the day.
#[tracing::instrument(skip_all, fields(start = %start, end = %end, concurrency = options.concurrency))]
pub async fn fetch_range<S: DailySource + ?Sized>(
    source: &S,
    start: NaiveDate,
    end: NaiveDate,
    options: &RangeOptions,
) -> Result<Vec<Value>> {
    let days = days_in_range(start, end);
    let day_count = days.len();
    let retries = options.retries;
    let backoff = options.retry_backoff;

    let per_day: Vec<Vec<Value>> = futures::stream::iter(days)
        .map(|date| async move {
            let items = fetch_day_with_retry(source, date, retries, backoff)
                .await
                .with_context(|| format!("failed to fetch records for {date}"))?;
            debug!(date = %date, records = items.len(), "Day fetched");
            Ok::<_, anyhow::Error>(items)
        })
        .buffered(options.concurrency.max(1))
        .try_collect()
        .await?;

    let records: Vec<Value> = per_day.into_iter().flatten().collect();
    info!(days = day_count, records = records.len(), "Date range fetched");
    Ok(records)
}

/// Reads a JSON array of daily records from a local file.
pub fn load_file(path: &str) -> Result<Vec<Value>> {
    let bytes = std::fs::read(path).with_context(|| format!("failed to read '{path}'"))?;
    parse_day(&bytes).with_context(|| format!("failed to parse '{path}'"))
}
