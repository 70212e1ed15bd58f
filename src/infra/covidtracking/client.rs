use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;
use tracing::debug;

use crate::config::ApiConfig;
use crate::fetch::{BasicClient, HttpClient, fetch_bytes};
use crate::parser::parse_day;
use crate::services::daily_source::DailySource;

/// The covidtracking.com "states daily" endpoint.
///
/// One request per day: `{base_url}?date=YYYYMMDD`, answered with a JSON
/// array holding one record per state.
pub struct CovidTrackingApi<C = BasicClient> {
    client: C,
    base_url: String,
}

impl CovidTrackingApi<BasicClient> {
    /// Builds a client with the configured base URL and timeouts.
    pub fn from_config(config: &ApiConfig) -> Result<Self> {
        let client = BasicClient::with_timeouts(config.timeout, config.connect_timeout)
            .context("failed to build HTTP client")?;
        Ok(Self::new(client, &config.base_url))
    }
}

impl<C: HttpClient> CovidTrackingApi<C> {
    pub fn new(client: C, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches(['?', '&']).to_string(),
        }
    }

    /// URL of the snapshot for `date`.
    pub fn day_url(&self, date: NaiveDate) -> String {
        let sep = if self.base_url.contains('?') { '&' } else { '?' };
        format!("{}{}date={}", self.base_url, sep, date.format("%Y%m%d"))
    }
}

#[async_trait]
impl<C: HttpClient> DailySource for CovidTrackingApi<C> {
    #[tracing::instrument(skip_all, fields(date = %date))]
    async fn fetch_day(&self, date: NaiveDate) -> Result<Vec<Value>> {
        let url = self.day_url(date);
        debug!(url = %url, "Requesting daily snapshot");

        let bytes = fetch_bytes(&self.client, &url)
            .await
            .with_context(|| format!("request to {url} failed"))?;
        let items = parse_day(&bytes).with_context(|| format!("bad response from {url}"))?;

        debug!(records = items.len(), bytes = bytes.len(), "Daily snapshot parsed");
        Ok(items)
    }
}
