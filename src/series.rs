//! Per-state time series built from the raw daily record collection.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::parser::{self, DailyRecord, RecordError};

/// One state's base metrics, index-aligned and sorted by ascending date.
///
/// `tests[i]` is always `positives[i] + negatives[i]`, and there is at most
/// one entry per date. Fields are private so the alignment can't be broken
/// after construction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StateSeries {
    state: String,
    dates: Vec<NaiveDate>,
    positives: Vec<u64>,
    negatives: Vec<u64>,
    deaths: Vec<u64>,
    tests: Vec<u64>,
}

impl StateSeries {
    /// An empty series for `state`.
    pub fn empty(state: &str) -> Self {
        Self {
            state: state.to_string(),
            ..Default::default()
        }
    }

    /// Builds a series from parsed records.
    ///
    /// Records for other states are ignored. Input order does not matter:
    /// the result is sorted by date, and when two records share a date the
    /// first one wins. Records whose counts don't fit in `i64` are dropped.
    /// Returns the series and the number of duplicates dropped.
    pub fn from_records(state: &str, records: Vec<DailyRecord>) -> (Self, usize) {
        let mut records: Vec<DailyRecord> =
            records.into_iter().filter(|r| r.state == state).collect();

        // stable, so the first record of a duplicated date stays in front
        records.sort_by_key(|r| r.date);
        let before = records.len();
        records.dedup_by_key(|r| r.date);
        let duplicates = before - records.len();

        let mut series = Self::empty(state);
        for r in records {
            let Some(tests) = r.tests() else {
                warn!(state, date = %r.date, "Dropping record with out-of-range counts");
                continue;
            };
            series.dates.push(r.date);
            series.positives.push(r.positive);
            series.negatives.push(r.negative);
            series.deaths.push(r.death);
            series.tests.push(tests);
        }

        (series, duplicates)
    }

    pub fn state(&self) -> &str {
        &self.state
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn positives(&self) -> &[u64] {
        &self.positives
    }

    pub fn negatives(&self) -> &[u64] {
        &self.negatives
    }

    pub fn deaths(&self) -> &[u64] {
        &self.deaths
    }

    /// Positives plus negatives, per day.
    pub fn tests(&self) -> &[u64] {
        &self.tests
    }

    /// Iterates over the series one day at a time.
    pub fn rows(&self) -> impl Iterator<Item = SeriesRow<'_>> + '_ {
        (0..self.len()).map(move |i| SeriesRow {
            state: &self.state,
            date: self.dates[i],
            positive: self.positives[i],
            negative: self.negatives[i],
            death: self.deaths[i],
            tests: self.tests[i],
        })
    }
}

/// A single day of a [`StateSeries`], flattened for export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SeriesRow<'a> {
    pub state: &'a str,
    pub date: NaiveDate,
    pub positive: u64,
    pub negative: u64,
    pub death: u64,
    pub tests: u64,
}

/// A raw record that was left out of a series, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRecord {
    /// Position in the raw collection.
    pub index: usize,
    pub state: Option<String>,
    pub error: RecordError,
}

/// Counts gathered while building one or more series.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub matched: usize,
    pub accepted: usize,
    pub duplicates: usize,
    pub skipped: Vec<SkippedRecord>,
}

impl BuildReport {
    fn merge(&mut self, other: BuildReport) {
        self.matched += other.matched;
        self.accepted += other.accepted;
        self.duplicates += other.duplicates;
        self.skipped.extend(other.skipped);
    }
}

/// Builds the series for a single state from the raw collection.
///
/// Records that fail to parse are skipped and logged, never zero-filled.
/// If nothing matches, the series is empty.
pub fn build_state_series(records: &[Value], state: &str) -> StateSeries {
    build_state_series_with_report(records, state).0
}

/// Same as [`build_state_series`], also returning what was skipped.
pub fn build_state_series_with_report(records: &[Value], state: &str) -> (StateSeries, BuildReport) {
    let matching = records
        .iter()
        .enumerate()
        .filter(|(_, item)| parser::state_code(item) == Some(state));
    build_group(state, matching)
}

/// Parses one state's raw records, in input order, into its series.
fn build_group<'a, I>(state: &str, items: I) -> (StateSeries, BuildReport)
where
    I: IntoIterator<Item = (usize, &'a Value)>,
{
    let mut report = BuildReport::default();
    let mut parsed = Vec::new();

    for (index, item) in items {
        report.matched += 1;

        match parser::parse_record(item) {
            Ok(record) => parsed.push(record),
            Err(error) => {
                warn!(state, index, error = %error, "Skipping malformed record");
                report.skipped.push(SkippedRecord {
                    index,
                    state: Some(state.to_string()),
                    error,
                });
            }
        }
    }

    let (series, duplicates) = StateSeries::from_records(state, parsed);
    if duplicates > 0 {
        warn!(state, duplicates, "Dropped records with a repeated date");
    }

    report.accepted = series.len();
    report.duplicates = duplicates;
    debug!(
        state,
        matched = report.matched,
        accepted = report.accepted,
        skipped = report.skipped.len(),
        "Built state series"
    );

    (series, report)
}

/// Every state's series, keyed by state code.
///
/// Built once by [`build_all`] and read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeriesSet {
    series: BTreeMap<String, StateSeries>,
}

impl SeriesSet {
    /// The series for `state`, if it appeared in the input.
    pub fn get(&self, state: &str) -> Option<&StateSeries> {
        self.series.get(state)
    }

    /// The series for `state`, or an empty one if it never appeared.
    pub fn series_for(&self, state: &str) -> StateSeries {
        self.get(state)
            .cloned()
            .unwrap_or_else(|| StateSeries::empty(state))
    }

    /// State codes in ascending order.
    pub fn states(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &StateSeries> {
        self.series.values()
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

/// Builds a series for every state code present in `records`.
///
/// Records without a usable `state` can't be attributed to any series; they
/// are reported as skipped with `state: None`.
pub fn build_all(records: &[Value]) -> (SeriesSet, BuildReport) {
    let mut report = BuildReport::default();
    let mut groups: BTreeMap<&str, Vec<(usize, &Value)>> = BTreeMap::new();

    for (index, item) in records.iter().enumerate() {
        match parser::state_code(item) {
            Some(code) => groups.entry(code).or_default().push((index, item)),
            None => {
                let error = match parser::parse_record(item) {
                    Err(error) => error,
                    Ok(_) => RecordError::MissingField { field: "state" },
                };
                warn!(index, error = %error, "Skipping record without a state code");
                report.skipped.push(SkippedRecord {
                    index,
                    state: None,
                    error,
                });
            }
        }
    }

    let mut series = BTreeMap::new();
    for (state, items) in groups {
        let (s, r) = build_group(state, items);
        report.merge(r);
        series.insert(state.to_string(), s);
    }

    (SeriesSet { series }, report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 3, d).unwrap()
    }

    fn record(state: &str, date: u32, positive: u64, negative: u64, death: u64) -> Value {
        json!({
            "state": state,
            "date": date,
            "positive": positive,
            "negative": negative,
            "death": death,
        })
    }

    #[test]
    fn test_tests_is_positives_plus_negatives() {
        let records = vec![
            record("CA", 20200304, 10, 90, 0),
            record("CA", 20200305, 15, 85, 1),
            record("CA", 20200306, 25, 75, 1),
        ];

        let series = build_state_series(&records, "CA");

        assert_eq!(series.tests(), &[100, 100, 100]);
        assert_eq!(series.positives(), &[10, 15, 25]);
        assert_eq!(series.dates(), &[day(4), day(5), day(6)]);
    }

    #[test]
    fn test_only_matching_state_is_kept() {
        let records = vec![
            record("CA", 20200304, 10, 90, 0),
            record("NY", 20200304, 20, 80, 0),
            record("CA", 20200305, 15, 85, 1),
        ];

        let series = build_state_series(&records, "NY");

        assert_eq!(series.len(), 1);
        assert_eq!(series.state(), "NY");
        assert_eq!(series.positives(), &[20]);
    }

    #[test]
    fn test_missing_death_is_skipped_not_zero_filled() {
        let records = vec![
            record("CA", 20200304, 10, 90, 0),
            json!({"state": "CA", "date": 20200305, "positive": 15, "negative": 85}),
            record("CA", 20200306, 25, 75, 1),
        ];

        let (series, report) = build_state_series_with_report(&records, "CA");

        assert_eq!(series.len(), 2);
        assert_eq!(series.dates(), &[day(4), day(6)]);
        assert_eq!(series.deaths(), &[0, 1]);
        assert_eq!(report.matched, 3);
        assert_eq!(report.accepted, 2);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].index, 1);
        assert_eq!(
            report.skipped[0].error,
            RecordError::MissingField { field: "death" }
        );
    }

    #[test]
    fn test_overflowing_counts_are_skipped() {
        let records = vec![
            record("CA", 20200304, 10, 90, 0),
            record("CA", 20200305, u64::MAX, 1, 0),
            record("CA", 20200306, 25, 75, 1),
        ];

        let (series, report) = build_state_series_with_report(&records, "CA");

        assert_eq!(series.dates(), &[day(4), day(6)]);
        assert_eq!(series.tests(), &[100, 100]);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].index, 1);
    }

    #[test]
    fn test_from_records_drops_out_of_range_counts() {
        let records = vec![
            DailyRecord {
                state: "CA".to_string(),
                date: day(4),
                positive: u64::MAX,
                negative: 1,
                death: 0,
            },
            DailyRecord {
                state: "CA".to_string(),
                date: day(5),
                positive: 1,
                negative: 1,
                death: 0,
            },
        ];

        let (series, _) = StateSeries::from_records("CA", records);

        assert_eq!(series.dates(), &[day(5)]);
        assert_eq!(series.tests(), &[2]);
    }

    #[test]
    fn test_unknown_state_gives_empty_series() {
        let records = vec![record("CA", 20200304, 10, 90, 0)];

        let series = build_state_series(&records, "ZZ");

        assert!(series.is_empty());
        assert!(series.dates().is_empty());
        assert!(series.positives().is_empty());
        assert!(series.negatives().is_empty());
        assert!(series.deaths().is_empty());
        assert!(series.tests().is_empty());
    }

    #[test]
    fn test_out_of_order_input_is_sorted() {
        let records = vec![
            record("MD", 20200306, 30, 70, 2),
            record("MD", 20200304, 10, 90, 0),
            record("MD", 20200305, 20, 80, 1),
        ];

        let series = build_state_series(&records, "MD");

        assert_eq!(series.dates(), &[day(4), day(5), day(6)]);
        assert_eq!(series.positives(), &[10, 20, 30]);
        assert_eq!(series.deaths(), &[0, 1, 2]);
    }

    #[test]
    fn test_duplicate_date_keeps_first() {
        let records = vec![
            record("GA", 20200304, 10, 90, 0),
            record("GA", 20200304, 99, 1, 9),
            record("GA", 20200305, 20, 80, 1),
        ];

        let (series, report) = build_state_series_with_report(&records, "GA");

        assert_eq!(series.positives(), &[10, 20]);
        assert_eq!(report.duplicates, 1);
    }

    #[test]
    fn test_build_all_covers_every_state() {
        let records = vec![
            record("CA", 20200304, 10, 90, 0),
            record("NY", 20200304, 20, 80, 0),
            json!({"date": 20200304, "positive": 1, "negative": 1, "death": 0}),
            record("LA", 20200305, 5, 5, 0),
            record("NY", 20200305, 25, 85, 1),
        ];

        let (set, report) = build_all(&records);

        assert_eq!(set.states().collect::<Vec<_>>(), vec!["CA", "LA", "NY"]);
        for s in set.iter() {
            assert_eq!(s.dates().len(), s.positives().len());
            assert_eq!(s.dates().len(), s.negatives().len());
            assert_eq!(s.dates().len(), s.deaths().len());
            assert_eq!(s.dates().len(), s.tests().len());
        }
        assert_eq!(set.get("NY").unwrap().len(), 2);
        assert_eq!(report.accepted, 4);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].state, None);
    }

    #[test]
    fn test_build_all_matches_per_state_build() {
        let records = vec![
            record("NY", 20200305, 25, 85, 1),
            record("CA", 20200305, 15, 85, 1),
            json!({"state": "NY", "date": 20200306, "positive": 30}),
            record("CA", 20200304, 10, 90, 0),
            record("NY", 20200304, 20, 80, 0),
        ];

        let (set, report) = build_all(&records);

        for state in ["CA", "NY"] {
            let (single, single_report) = build_state_series_with_report(&records, state);
            assert_eq!(set.get(state), Some(&single));
            assert_eq!(single_report.matched, if state == "NY" { 3 } else { 2 });
        }
        assert_eq!(report.matched, 5);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].index, 2);
    }

    #[test]
    fn test_series_for_absent_state_is_empty() {
        let (set, _) = build_all(&[record("CA", 20200304, 10, 90, 0)]);
        let series = set.series_for("TX");
        assert_eq!(series.state(), "TX");
        assert!(series.is_empty());
    }

    #[test]
    fn test_rows_follow_series() {
        let series = build_state_series(&[record("CA", 20200304, 10, 90, 3)], "CA");
        let rows: Vec<_> = series.rows().collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].tests, 100);
        assert_eq!(rows[0].death, 3);
        assert_eq!(rows[0].state, "CA");
    }
}
