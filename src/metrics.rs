//! Ratio, delta and per-capita metrics derived from a [`StateSeries`].

use chrono::NaiveDate;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::series::StateSeries;

/// What to emit when a ratio's denominator is zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ZeroDenominator {
    /// Emit `f64::NAN` at that date.
    #[default]
    Nan,
    /// Drop the point entirely.
    Skip,
    /// Emit `0.0`.
    Zero,
}

/// A dated value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricPoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// The three ratios plotted for every state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ratio {
    PositivesPerTest,
    DeathsPerPositive,
    DeathsPerTest,
}

impl Ratio {
    /// Ratio over cumulative levels.
    pub fn of_series(self, series: &StateSeries, policy: ZeroDenominator) -> Vec<MetricPoint> {
        let (numer, denom) = match self {
            Ratio::PositivesPerTest => (series.positives(), series.tests()),
            Ratio::DeathsPerPositive => (series.deaths(), series.positives()),
            Ratio::DeathsPerTest => (series.deaths(), series.tests()),
        };
        ratio(series.dates(), numer, denom, policy)
    }

    /// Ratio over day-over-day changes.
    pub fn of_deltas(self, deltas: &DeltaSeries, policy: ZeroDenominator) -> Vec<MetricPoint> {
        let (numer, denom) = match self {
            Ratio::PositivesPerTest => (&deltas.positives, &deltas.tests),
            Ratio::DeathsPerPositive => (&deltas.deaths, &deltas.positives),
            Ratio::DeathsPerTest => (&deltas.deaths, &deltas.tests),
        };
        ratio(&deltas.dates, numer, denom, policy)
    }
}

/// Day-over-day changes of a [`StateSeries`].
///
/// `dates[i]` is the later of the two days differenced. Values are signed
/// because cumulative counts do get revised downwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeltaSeries {
    pub dates: Vec<NaiveDate>,
    pub tests: Vec<i64>,
    pub positives: Vec<i64>,
    pub deaths: Vec<i64>,
}

impl DeltaSeries {
    /// Differences every consecutive pair of days. An empty or single-day
    /// series gives an empty result.
    pub fn from_series(series: &StateSeries) -> Self {
        Self {
            dates: series.dates().iter().skip(1).copied().collect(),
            tests: delta(series.tests()),
            positives: delta(series.positives()),
            deaths: delta(series.deaths()),
        }
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}

/// Numeric types a ratio can be taken over.
pub trait Count: Copy {
    fn to_f64(self) -> f64;
}

impl Count for u64 {
    fn to_f64(self) -> f64 {
        self as f64
    }
}

impl Count for i64 {
    fn to_f64(self) -> f64 {
        self as f64
    }
}

/// `values[i + 1] - values[i]` for every consecutive pair.
///
/// Differences outside the `i64` range saturate; parsed counts never get
/// there (see [`MAX_COUNT`](crate::parser::MAX_COUNT)).
pub fn delta(values: &[u64]) -> Vec<i64> {
    values
        .windows(2)
        .map(|w| {
            let d = i128::from(w[1]) - i128::from(w[0]);
            i64::try_from(d).unwrap_or(if d < 0 { i64::MIN } else { i64::MAX })
        })
        .collect()
}

/// Element-wise `numer / denom`, applying `policy` where `denom` is zero.
///
/// All three slices are expected to be index-aligned; any excess length is
/// ignored.
pub fn ratio<N: Count, D: Count>(
    dates: &[NaiveDate],
    numer: &[N],
    denom: &[D],
    policy: ZeroDenominator,
) -> Vec<MetricPoint> {
    dates
        .iter()
        .zip(numer.iter().zip(denom.iter()))
        .filter_map(|(&date, (&n, &d))| {
            let d = d.to_f64();
            let value = if d == 0.0 {
                match policy {
                    ZeroDenominator::Nan => f64::NAN,
                    ZeroDenominator::Skip => return None,
                    ZeroDenominator::Zero => 0.0,
                }
            } else {
                n.to_f64() / d
            };
            Some(MetricPoint { date, value })
        })
        .collect()
}

/// Pairs `values` with `dates` and divides each one by `divisor`.
pub fn per_capita<N: Count>(dates: &[NaiveDate], values: &[N], divisor: f64) -> Vec<MetricPoint> {
    dates
        .iter()
        .zip(values)
        .map(|(&date, &v)| MetricPoint {
            date,
            value: v.to_f64() / divisor,
        })
        .collect()
}
