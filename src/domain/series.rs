//! Columnar price series and the per-timeframe market data map.

use chrono::NaiveDateTime;
use std::collections::BTreeMap;

use crate::domain::error::TraderError;

pub const OPEN: &str = "open";
pub const HIGH: &str = "high";
pub const LOW: &str = "low";
pub const CLOSE: &str = "close";
pub const VOLUME: &str = "volume";
pub const BID: &str = "bid";
pub const ASK: &str = "ask";
pub const SIGNAL: &str = "signal";

pub const OHLC: [&str; 4] = [OPEN, HIGH, LOW, CLOSE];

/// One timeframe of bars. Missing values are stored as `NaN`.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    timeframe: String,
    time: Vec<NaiveDateTime>,
    columns: BTreeMap<String, Vec<f64>>,
}

impl PriceSeries {
    pub fn new(timeframe: impl Into<String>, time: Vec<NaiveDateTime>) -> Self {
        PriceSeries {
            timeframe: timeframe.into(),
            time,
            columns: BTreeMap::new(),
        }
    }

    pub fn with_column(mut self, name: &str, values: Vec<f64>) -> Result<Self, TraderError> {
        self.set_column(name, values)?;
        Ok(self)
    }

    /// Add or replace a column. The length must match the number of rows.
    pub fn set_column(&mut self, name: &str, values: Vec<f64>) -> Result<(), TraderError> {
        if values.len() != self.time.len() {
            return Err(TraderError::LengthMismatch {
                timeframe: self.timeframe.clone(),
                column: name.to_string(),
                expected: self.time.len(),
                found: values.len(),
            });
        }
        self.columns.insert(name.to_string(), values);
        Ok(())
    }

    pub fn timeframe(&self) -> &str {
        &self.timeframe
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    pub fn time(&self) -> &[NaiveDateTime] {
        &self.time
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn column(&self, name: &str) -> Result<&[f64], TraderError> {
        self.columns
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| TraderError::MissingColumn {
                timeframe: self.timeframe.clone(),
                column: name.to_string(),
            })
    }

    pub fn require_columns(&self, names: &[&str]) -> Result<(), TraderError> {
        for name in names {
            self.column(name)?;
        }
        Ok(())
    }

    /// Non-empty with strictly increasing timestamps.
    pub fn validate(&self) -> Result<(), TraderError> {
        if self.time.is_empty() {
            return Err(TraderError::EmptySeries {
                timeframe: self.timeframe.clone(),
            });
        }
        if let Some(row) = self.time.windows(2).position(|w| w[1] <= w[0]) {
            return Err(TraderError::NonMonotonicTime {
                timeframe: self.timeframe.clone(),
                row: row + 1,
            });
        }
        Ok(())
    }

    /// Forward-fill `column` onto `target` timestamps: each target row takes
    /// the last value whose timestamp is at or before it.
    pub fn align_column(
        &self,
        column: &str,
        target: &[NaiveDateTime],
    ) -> Result<Vec<f64>, TraderError> {
        let values = self.column(column)?;
        Ok(forward_fill_mapping(&self.time, target)
            .into_iter()
            .map(|idx| idx.map_or(f64::NAN, |i| values[i]))
            .collect())
    }
}

/// For every target timestamp, the index of the last source timestamp that is
/// `<=` it. Both inputs must be sorted ascending.
pub fn forward_fill_mapping(
    source: &[NaiveDateTime],
    target: &[NaiveDateTime],
) -> Vec<Option<usize>> {
    let mut mapping = Vec::with_capacity(target.len());
    let mut j = 0usize;
    let mut last_valid: Option<usize> = None;

    for ts in target {
        while j < source.len() && source[j] <= *ts {
            last_valid = Some(j);
            j += 1;
        }
        mapping.push(last_valid);
    }

    mapping
}

/// max(high - low, |high - prev_close|, |low - prev_close|); without a prior
/// close the range is just high - low.
pub fn true_range(high: f64, low: f64, prev_close: Option<f64>) -> f64 {
    let hl = high - low;
    match prev_close {
        Some(pc) if !pc.is_nan() => {
            let hc = (high - pc).abs();
            let lc = (low - pc).abs();
            hl.max(hc).max(lc)
        }
        _ => hl,
    }
}

/// Price series keyed by timeframe name ("M15", "H1", "D1", ...).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarketData {
    series: BTreeMap<String, PriceSeries>,
}

impl MarketData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_series(mut self, series: PriceSeries) -> Self {
        self.insert(series);
        self
    }

    pub fn insert(&mut self, series: PriceSeries) {
        self.series.insert(series.timeframe().to_string(), series);
    }

    pub fn contains(&self, timeframe: &str) -> bool {
        self.series.contains_key(timeframe)
    }

    pub fn timeframes(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }

    pub fn get(&self, timeframe: &str) -> Result<&PriceSeries, TraderError> {
        self.series
            .get(timeframe)
            .ok_or_else(|| TraderError::DataNotFound {
                timeframe: timeframe.to_string(),
            })
    }

    pub fn get_mut(&mut self, timeframe: &str) -> Result<&mut PriceSeries, TraderError> {
        self.series
            .get_mut(timeframe)
            .ok_or_else(|| TraderError::DataNotFound {
                timeframe: timeframe.to_string(),
            })
    }

    pub fn validate(&self) -> Result<(), TraderError> {
        self.series.values().try_for_each(PriceSeries::validate)
    }
}
