//! Chart data for the 2×3 comparison grid.
//!
//! Nothing here draws. A [`ChartGrid`] is the complete, serializable
//! description a renderer needs: panel titles, axis scales and one line per
//! state with an end-of-line label. Every line is gap-free and index-aligned
//! with its dates.

use clap::ValueEnum;
use serde::Serialize;
use tracing::{debug, warn};

use crate::metrics::{DeltaSeries, MetricPoint, Ratio, ZeroDenominator, per_capita};
use crate::population::Populations;
use crate::series::{SeriesSet, StateSeries};

/// Date format for the x-axis tick labels.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Cumulative levels or day-over-day changes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    #[default]
    Totals,
    Deltas,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Scale {
    Linear,
    Log,
}

/// A labelled point drawn at the end of a line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EndLabel {
    pub text: String,
    pub at: MetricPoint,
}

/// One state's line within a panel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Line {
    pub state: String,
    pub points: Vec<MetricPoint>,
    pub end_label: Option<EndLabel>,
}

impl Line {
    fn new(state: &str, points: Vec<MetricPoint>) -> Self {
        let end_label = points.last().map(|&at| EndLabel {
            text: state.to_string(),
            at,
        });
        Self {
            state: state.to_string(),
            points,
            end_label,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Panel {
    pub title: String,
    pub scale: Scale,
    /// Draw a marker at every point.
    pub markers: bool,
    pub lines: Vec<Line>,
}

impl Panel {
    fn new(title: &str, scale: Scale, markers: bool) -> Self {
        Self {
            title: title.to_string(),
            scale,
            markers,
            lines: Vec::new(),
        }
    }
}

/// Six panels, row-major: row 0 is tests, positives, positives/tests;
/// row 1 is deaths, deaths/positives, deaths/tests.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartGrid {
    pub kind: ChartKind,
    pub rows: usize,
    pub cols: usize,
    pub date_format: String,
    pub policy: ZeroDenominator,
    pub panels: Vec<Panel>,
}

impl ChartGrid {
    /// Panel at `(row, col)`.
    pub fn panel(&self, row: usize, col: usize) -> Option<&Panel> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        self.panels.get(row * self.cols + col)
    }

    /// States that made it onto the chart.
    pub fn states(&self) -> Vec<&str> {
        self.panels
            .first()
            .map(|p| p.lines.iter().map(|l| l.state.as_str()).collect())
            .unwrap_or_default()
    }
}

/// Options for [`build_chart`].
#[derive(Debug, Clone, Default)]
pub struct ChartOptions {
    pub kind: ChartKind,
    /// States to draw. Empty means every state in the set.
    pub states: Vec<String>,
    /// Per-capita divisors for count panels. `None` draws absolute counts;
    /// with a table, states missing from it are left off the chart.
    pub populations: Option<Populations>,
    pub policy: ZeroDenominator,
}

/// Builds the chart grid for the requested states.
///
/// A state that is missing from `set`, has no population when drawing per
/// capita, or whose series is too short to produce any point, is left off
/// the chart with a warning.
pub fn build_chart(set: &SeriesSet, options: &ChartOptions) -> ChartGrid {
    let states: Vec<&str> = if options.states.is_empty() {
        set.states().collect()
    } else {
        options.states.iter().map(String::as_str).collect()
    };

    let mut panels = match options.kind {
        ChartKind::Totals => vec![
            Panel::new("No. of Tests", Scale::Log, false),
            Panel::new("No. of Positives", Scale::Log, false),
            Panel::new("Positives/Tests", Scale::Linear, false),
            Panel::new("No. of Deaths", Scale::Log, false),
            Panel::new("Deaths/Positives", Scale::Linear, false),
            Panel::new("Deaths/Tests", Scale::Linear, false),
        ],
        ChartKind::Deltas => vec![
            Panel::new("Daily No. of Tests", Scale::Linear, true),
            Panel::new("Daily No. of Positives", Scale::Linear, true),
            Panel::new("Daily Positives/Tests", Scale::Linear, true),
            Panel::new("Daily No. of Deaths", Scale::Linear, true),
            Panel::new("Daily Deaths/Positives", Scale::Linear, true),
            Panel::new("Daily Deaths/Tests", Scale::Linear, true),
        ],
    };

    for state in states {
        let Some(series) = set.get(state) else {
            warn!(state, "No data for state, leaving it off the chart");
            continue;
        };

        let divisor = match &options.populations {
            None => 1.0,
            Some(table) => match table.get(state) {
                Some(divisor) => divisor,
                None => {
                    warn!(state, "No population for state, leaving it off the per-capita chart");
                    continue;
                }
            },
        };
        let lines = match options.kind {
            ChartKind::Totals => totals_lines(series, divisor, options.policy),
            ChartKind::Deltas => delta_lines(series, divisor, options.policy),
        };

        let Some(lines) = lines else {
            warn!(state, days = series.len(), "Series too short to chart");
            continue;
        };

        for (panel, line) in panels.iter_mut().zip(lines) {
            panel.lines.push(line);
        }
        debug!(state, divisor, "Added state to chart");
    }

    ChartGrid {
        kind: options.kind,
        rows: 2,
        cols: 3,
        date_format: DATE_FORMAT.to_string(),
        policy: options.policy,
        panels,
    }
}

fn totals_lines(series: &StateSeries, divisor: f64, policy: ZeroDenominator) -> Option<Vec<Line>> {
    if series.is_empty() {
        return None;
    }

    let state = series.state();
    let dates = series.dates();

    Some(vec![
        Line::new(state, per_capita(dates, series.tests(), divisor)),
        Line::new(state, per_capita(dates, series.positives(), divisor)),
        Line::new(state, Ratio::PositivesPerTest.of_series(series, policy)),
        Line::new(state, per_capita(dates, series.deaths(), divisor)),
        Line::new(state, Ratio::DeathsPerPositive.of_series(series, policy)),
        Line::new(state, Ratio::DeathsPerTest.of_series(series, policy)),
    ])
}

fn delta_lines(series: &StateSeries, divisor: f64, policy: ZeroDenominator) -> Option<Vec<Line>> {
    let deltas = DeltaSeries::from_series(series);
    if deltas.is_empty() {
        return None;
    }

    let state = series.state();
    let dates = &deltas.dates;

    Some(vec![
        Line::new(state, per_capita(dates, &deltas.tests, divisor)),
        Line::new(state, per_capita(dates, &deltas.positives, divisor)),
        Line::new(state, Ratio::PositivesPerTest.of_deltas(&deltas, policy)),
        Line::new(state, per_capita(dates, &deltas.deaths, divisor)),
        Line::new(state, Ratio::DeathsPerPositive.of_deltas(&deltas, policy)),
        Line::new(state, Ratio::DeathsPerTest.of_deltas(&deltas, policy)),
    ])
}
