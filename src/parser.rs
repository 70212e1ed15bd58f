//! JSON parser for covidtracking.com daily state records.
//!
//! Each record is parsed on its own into a [`DailyRecord`] or a tagged
//! [`RecordError`], so a single bad entry never aborts a whole batch.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde_json::Value;
use thiserror::Error;

/// One state's observation for a single day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyRecord {
    pub state: String,
    pub date: NaiveDate,
    pub positive: u64,
    pub negative: u64,
    pub death: u64,
}

impl DailyRecord {
    /// `positive + negative`, or `None` if any count is out of range.
    pub fn tests(&self) -> Option<u64> {
        if self.death > MAX_COUNT {
            return None;
        }
        self.positive
            .checked_add(self.negative)
            .filter(|tests| *tests <= MAX_COUNT)
    }
}

/// Largest count accepted, so that tests and day-over-day deltas fit in `i64`.
pub const MAX_COUNT: u64 = i64::MAX as u64;

/// Why a raw record could not become a [`DailyRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    /// The field is absent or `null`.
    #[error("missing field `{field}`")]
    MissingField { field: &'static str },

    /// The field is present but holds something unusable.
    #[error("invalid value for `{field}`: {value}")]
    InvalidField { field: &'static str, value: String },
}

/// Returns the `state` code of a raw record without parsing the rest of it.
pub fn state_code(item: &Value) -> Option<&str> {
    item["state"].as_str()
}

/// Parses a single raw record.
///
/// `date` is the API's `YYYYMMDD` integer. Counts must be non-negative
/// integers no larger than [`MAX_COUNT`], and so must `positive + negative`;
/// `null` counts are treated as missing.
pub fn parse_record(item: &Value) -> Result<DailyRecord, RecordError> {
    let state = match &item["state"] {
        Value::Null => return Err(RecordError::MissingField { field: "state" }),
        Value::String(s) => s.clone(),
        other => return Err(invalid("state", other)),
    };

    let date = parse_date(&item["date"])?;
    let positive = count(item, "positive")?;
    let negative = count(item, "negative")?;
    let death = count(item, "death")?;

    let record = DailyRecord {
        state,
        date,
        positive,
        negative,
        death,
    };
    if record.tests().is_none() {
        return Err(invalid("negative", &item["negative"]));
    }

    Ok(record)
}

/// Decodes a response body into its array of raw records.
///
/// # Errors
///
/// Returns an error if the body is not JSON or not a JSON array.
pub fn parse_day(bytes: &[u8]) -> Result<Vec<Value>> {
    let value: Value = serde_json::from_slice(bytes).context("response body is not JSON")?;

    match value {
        Value::Array(items) => Ok(items),
        other => anyhow::bail!("expected a JSON array of records, got {}", kind(&other)),
    }
}

fn parse_date(value: &Value) -> Result<NaiveDate, RecordError> {
    let raw = match value {
        Value::Null => return Err(RecordError::MissingField { field: "date" }),
        Value::Number(n) => n.as_u64().ok_or_else(|| invalid("date", value))?,
        // some archived snapshots carry the date as a string
        Value::String(s) => s.trim().parse::<u64>().map_err(|_| invalid("date", value))?,
        _ => return Err(invalid("date", value)),
    };

    let year = i32::try_from(raw / 10_000).map_err(|_| invalid("date", value))?;
    let month = ((raw / 100) % 100) as u32;
    let day = (raw % 100) as u32;

    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| invalid("date", value))
}

fn count(item: &Value, field: &'static str) -> Result<u64, RecordError> {
    let value = &item[field];
    match value {
        Value::Null => Err(RecordError::MissingField { field }),
        Value::Number(n) => n
            .as_u64()
            .filter(|v| *v <= MAX_COUNT)
            .ok_or_else(|| invalid(field, value)),
        _ => Err(invalid(field, value)),
    }
}

fn invalid(field: &'static str, value: &Value) -> RecordError {
    RecordError::InvalidField {
        field,
        value: value.to_string(),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
