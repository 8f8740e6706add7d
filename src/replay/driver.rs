use crate::data::{HistoricalBar, RunMode, StrategyDataSlice, TickField, TopTick};
use crate::error::{StrategyError, StrategyResult};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// One OHLCV row of a replay dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayInputRow {
    #[serde(default, alias = "timestamp")]
    pub timestamp_utc: Option<DateTime<Utc>>,
    #[serde(default)]
    pub symbol: String,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    #[serde(default)]
    pub volume: Decimal,
}

/// Load a JSON array of `ReplayInputRow` and turn it into ordered slices
///
/// Rows without a timestamp are dropped, the rest are sorted by time and
/// truncated to `max(1, max_rows)`.
pub fn load_slices<P: AsRef<Path>>(path: P, max_rows: usize) -> StrategyResult<Vec<StrategyDataSlice>> {
    let path = path.as_ref();
    if path.as_os_str().is_empty() || path.to_string_lossy().trim().is_empty() {
        return Err(StrategyError::ReplayInput(
            "strategy replay requires an input path to a JSON dataset".into(),
        ));
    }

    if !path.is_file() {
        return Err(StrategyError::ReplayInput(format!(
            "replay input not found: {}",
            path.display()
        )));
    }

    let contents = std::fs::read_to_string(path)?;
    let rows: Vec<ReplayInputRow> = serde_json::from_str(&contents)?;
    info!("📂 Loaded {} replay rows from {}", rows.len(), path.display());

    rows_to_slices(rows, max_rows)
}

/// Order, truncate and convert already-parsed rows
pub fn rows_to_slices(rows: Vec<ReplayInputRow>, max_rows: usize) -> StrategyResult<Vec<StrategyDataSlice>> {
    if rows.is_empty() {
        return Err(StrategyError::ReplayInput("replay input is empty".into()));
    }

    let total = rows.len();
    let mut timed: Vec<(DateTime<Utc>, ReplayInputRow)> = rows
        .into_iter()
        .filter_map(|row| row.timestamp_utc.map(|ts| (ts, row)))
        .collect();

    if timed.is_empty() {
        return Err(StrategyError::ReplayInput(
            "replay input did not contain any rows with a valid timestamp_utc".into(),
        ));
    }

    // Stable sort keeps file order for identical timestamps
    timed.sort_by_key(|(ts, _)| *ts);
    timed.truncate(max_rows.max(1));

    debug!("Replay rows kept: {} of {}", timed.len(), total);

    Ok(timed.into_iter().map(|(ts, row)| build_slice(ts, &row)).collect())
}

fn build_slice(timestamp_utc: DateTime<Utc>, row: &ReplayInputRow) -> StrategyDataSlice {
    let mut slice = StrategyDataSlice::empty(timestamp_utc, RunMode::StrategyReplay);

    slice.top_ticks.push(TopTick {
        timestamp_utc,
        field: TickField::Last,
        price: row.close,
        size: row.volume.max(Decimal::ZERO),
        source: "replay".to_string(),
    });

    slice.historical_bars.push(HistoricalBar {
        timestamp_utc,
        open: row.open,
        high: row.high,
        low: row.low,
        close: row.close,
        volume: row.volume,
    });

    slice
}
