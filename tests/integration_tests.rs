use anyhow::Result;
use chrono::NaiveDate;
use covid_tracker::chart::{ChartKind, ChartOptions, build_chart};
use covid_tracker::metrics::{DeltaSeries, Ratio, ZeroDenominator};
use covid_tracker::parser::{RecordError, parse_day};
use covid_tracker::population::Populations;
use covid_tracker::series::{build_all, build_state_series, build_state_series_with_report};
use covid_tracker::services::daily_source::{DailySource, RangeOptions, fetch_range};
use serde_json::Value;
use std::time::Duration;

fn fixture() -> Vec<Value> {
    parse_day(include_str!("fixtures/states_daily.json").as_bytes()).expect("Failed to parse fixture")
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 3, d).unwrap()
}

/// Serves the fixture one day at a time, the way the API does.
struct FixtureSource(Vec<Value>);

#[async_trait::async_trait]
impl DailySource for FixtureSource {
    async fn fetch_day(&self, date: NaiveDate) -> Result<Vec<Value>> {
        let stamp: u64 = date.format("%Y%m%d").to_string().parse()?;
        Ok(self
            .0
            .iter()
            .filter(|r| r["date"].as_u64() == Some(stamp))
            .cloned()
            .collect())
    }
}

#[test]
fn test_full_pipeline() {
    let records = fixture();
    let (set, report) = build_all(&records);

    assert_eq!(set.states().collect::<Vec<_>>(), vec!["CA", "LA", "NY", "WA"]);
    assert_eq!(report.accepted, 9);
    assert_eq!(report.skipped.len(), 2);

    let ca = set.get("CA").unwrap();
    assert_eq!(ca.dates(), &[day(4), day(5), day(6)]);
    assert_eq!(ca.positives(), &[53, 53, 60]);
    assert_eq!(ca.tests(), &[515, 515, 522]);

    for s in set.iter() {
        for i in 0..s.len() {
            assert_eq!(s.tests()[i], s.positives()[i] + s.negatives()[i]);
        }
    }
}

#[test]
fn test_null_death_is_excluded() {
    let (wa, report) = build_state_series_with_report(&fixture(), "WA");

    assert_eq!(wa.len(), 2);
    assert_eq!(wa.dates(), &[day(4), day(5)]);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(
        report.skipped[0].error,
        RecordError::MissingField { field: "death" }
    );
}

#[test]
fn test_unknown_state_is_empty() {
    let series = build_state_series(&fixture(), "PR");
    assert_eq!(series.len(), 0);
    assert!(series.tests().is_empty());
    assert!(DeltaSeries::from_series(&series).is_empty());
}

#[test]
fn test_delta_ratios_on_flat_days() {
    let ca = build_state_series(&fixture(), "CA");
    let deltas = DeltaSeries::from_series(&ca);

    assert_eq!(deltas.len(), ca.len() - 1);
    assert_eq!(deltas.positives, vec![0, 7]);

    let nan = Ratio::PositivesPerTest.of_deltas(&deltas, ZeroDenominator::Nan);
    assert!(nan[0].value.is_nan());
    assert_eq!(nan[1].value, 1.0);

    let skipped = Ratio::PositivesPerTest.of_deltas(&deltas, ZeroDenominator::Skip);
    assert_eq!(skipped.len(), 1);
    assert_eq!(skipped[0].date, day(6));
}

#[test]
fn test_per_capita_chart() {
    let (set, _) = build_all(&fixture());
    let options = ChartOptions {
        kind: ChartKind::Totals,
        states: vec!["CA".to_string(), "NY".to_string()],
        populations: Some(Populations::builtin()),
        policy: ZeroDenominator::Nan,
    };

    let grid = build_chart(&set, &options);

    assert_eq!(grid.states(), vec!["CA", "NY"]);
    let ny_tests = &grid.panel(0, 0).unwrap().lines[1];
    let last = ny_tests.end_label.as_ref().unwrap();
    assert_eq!(last.text, "NY");
    assert_eq!(last.at.value, 125.0 / 19.54e6);
}

#[test]
fn test_per_capita_chart_omits_states_outside_table() {
    let (set, _) = build_all(&fixture());
    let options = ChartOptions {
        kind: ChartKind::Totals,
        states: vec!["CA".to_string(), "WA".to_string()],
        populations: Some(Populations::builtin()),
        policy: ZeroDenominator::Nan,
    };

    let grid = build_chart(&set, &options);

    assert_eq!(grid.states(), vec!["CA"]);
    let ca_tests = &grid.panel(0, 0).unwrap().lines[0];
    assert_eq!(ca_tests.points[0].value, 515.0 / 39.56e6);
}

#[tokio::test]
async fn test_fetch_then_build() {
    let source = FixtureSource(fixture());
    let options = RangeOptions {
        concurrency: 3,
        retries: 0,
        retry_backoff: Duration::from_millis(1),
    };

    let records = fetch_range(&source, day(4), day(6), &options).await.unwrap();
    let dates: Vec<u64> = records.iter().filter_map(|r| r["date"].as_u64()).collect();
    assert!(dates.windows(2).all(|w| w[0] <= w[1]));

    let (set, _) = build_all(&records);
    assert_eq!(set.get("NY").unwrap().positives(), &[6, 22, 33]);
}
