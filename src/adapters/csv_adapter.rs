//! CSV file price adapter.
//!
//! One file per symbol and timeframe, `<directory>/<SYMBOL>_<TIMEFRAME>.csv`,
//! with a header row. The `time` (or `date`) column holds the bar timestamp;
//! every other column is read as a number, an empty cell meaning missing.

use crate::domain::error::TraderError;
use crate::domain::series::PriceSeries;
use crate::ports::data_port::DataPort;
use chrono::{NaiveDate, NaiveDateTime};
use std::fs;
use std::path::PathBuf;

const TIME_COLUMNS: [&str; 3] = ["time", "date", "datetime"];

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn csv_path(&self, symbol: &str, timeframe: &str) -> PathBuf {
        self.base_path.join(format!("{}_{}.csv", symbol, timeframe))
    }
}

fn parse_time(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S"))
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

impl DataPort for CsvAdapter {
    fn fetch_series(&self, symbol: &str, timeframe: &str) -> Result<PriceSeries, TraderError> {
        let path = self.csv_path(symbol, timeframe);
        if !path.is_file() {
            tracing::warn!(path = %path.display(), "price file not found");
            return Err(TraderError::DataNotFound {
                timeframe: timeframe.to_string(),
            });
        }

        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(&path)?;
        let headers: Vec<String> = rdr
            .headers()?
            .iter()
            .map(|h| h.to_ascii_lowercase())
            .collect();

        let time_idx = headers
            .iter()
            .position(|h| TIME_COLUMNS.contains(&h.as_str()))
            .ok_or_else(|| TraderError::MissingColumn {
                timeframe: timeframe.to_string(),
                column: "time".to_string(),
            })?;
        let value_columns: Vec<(usize, &str)> = headers
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != time_idx)
            .map(|(i, h)| (i, h.as_str()))
            .collect();

        let mut time = Vec::new();
        let mut values: Vec<Vec<f64>> = vec![Vec::new(); value_columns.len()];

        for (row, result) in rdr.records().enumerate() {
            let record = result?;
            let malformed = |reason: String| TraderError::MalformedRow {
                timeframe: timeframe.to_string(),
                row,
                reason,
            };

            let raw_time = record.get(time_idx).unwrap_or_default();
            let ts = parse_time(raw_time)
                .ok_or_else(|| malformed(format!("invalid timestamp '{raw_time}'")))?;
            time.push(ts);

            for (slot, (idx, name)) in value_columns.iter().enumerate() {
                let cell = record.get(*idx).unwrap_or_default();
                let value = if cell.is_empty() {
                    f64::NAN
                } else {
                    cell.parse::<f64>()
                        .map_err(|_| malformed(format!("invalid {name} value '{cell}'")))?
                };
                values[slot].push(value);
            }
        }

        let mut series = PriceSeries::new(timeframe, time);
        for ((_, name), column) in value_columns.iter().zip(values) {
            series.set_column(name, column)?;
        }
        tracing::debug!(
            path = %path.display(),
            rows = series.len(),
            "price file read"
        );
        Ok(series)
    }

    fn list_timeframes(&self, symbol: &str) -> Result<Vec<String>, TraderError> {
        let prefix = format!("{}_", symbol);
        let mut timeframes = Vec::new();

        for entry in fs::read_dir(&self.base_path)? {
            let name = entry?.file_name();
            let name_str = name.to_string_lossy();
            if let Some(tf) = name_str
                .strip_prefix(&prefix)
                .and_then(|rest| rest.strip_suffix(".csv"))
            {
                if !tf.is_empty() {
                    timeframes.push(tf.to_string());
                }
            }
        }

        timeframes.sort();
        Ok(timeframes)
    }
}
