//! Output for state series and chart grids.
//!
//! Supports pretty logging, CSV append of series rows, and JSON export of
//! chart grids for the renderer.

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::chart::ChartGrid;
use crate::series::StateSeries;
use csv::WriterBuilder;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};

/// Logs a series one day per line.
pub fn print_pretty(series: &StateSeries) {
    info!(state = series.state(), days = series.len(), "State series");
    for row in series.rows() {
        info!(
            date = %row.date,
            positive = row.positive,
            negative = row.negative,
            death = row.death,
            tests = row.tests,
            "{}",
            row.state
        );
    }
}

/// Logs a one-line summary per chart panel.
pub fn print_chart_summary(grid: &ChartGrid) {
    for panel in &grid.panels {
        let points: usize = panel.lines.iter().map(|l| l.points.len()).sum();
        info!(
            title = %panel.title,
            scale = ?panel.scale,
            lines = panel.lines.len(),
            points,
            "Chart panel"
        );
    }
}

/// Appends every day of `series` as a CSV row.
///
/// Writes a header row first when the file is new or empty.
pub fn append_series(path: &str, series: &StateSeries) -> Result<()> {
    // an existing but empty file still needs its header
    let has_header = fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false);
    debug!(path, has_header, rows = series.len(), "Appending series to CSV");

    let file = OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)
        .with_context(|| format!("failed to open '{path}'"))?;

    let mut writer = WriterBuilder::new()
        .has_headers(!has_header)
        .from_writer(file);

    for row in series.rows() {
        writer.serialize(row)?;
    }
    writer.flush()?;

    Ok(())
}

/// Writes a chart grid as pretty-printed JSON, replacing any existing file.
///
/// Non-finite ratio values are written as `null`.
pub fn write_chart(path: &str, grid: &ChartGrid) -> Result<()> {
    let file = File::create(path).with_context(|| format!("failed to create '{path}'"))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, grid)?;
    writer.flush()?;
    debug!(path, panels = grid.panels.len(), "Chart written");
    Ok(())
}
