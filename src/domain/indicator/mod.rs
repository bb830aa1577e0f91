//! Technical indicators.
//!
//! - `IndicatorKind`: the built-in indicator functions and their output names
//! - `IndicatorSpec`: one configured indicator instance (name, function,
//!   timeframe, input columns, numeric parameters)
//! - `apply_indicators`: runs an [`IndicatorPort`] over the market data and
//!   writes the results back as named columns
//!
//! Each submodule computes one indicator over plain `f64` slices. Values
//! inside the warmup window are `NaN`.

pub mod atr;
pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod obv;
pub mod roc;
pub mod rsi;
pub mod sma;
pub mod stddev;
pub mod wma;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::domain::error::TraderError;
use crate::domain::series::{MarketData, CLOSE, HIGH, LOW, VOLUME};
use crate::ports::indicator_port::IndicatorPort;

/// Named output series in declaration order.
pub type IndicatorOutputs = Vec<(String, Vec<f64>)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IndicatorKind {
    Sma,
    Ema,
    Wma,
    Rsi,
    Roc,
    Atr,
    Stddev,
    Obv,
    Bbands,
    Macd,
}

impl IndicatorKind {
    pub const ALL: [IndicatorKind; 10] = [
        IndicatorKind::Sma,
        IndicatorKind::Ema,
        IndicatorKind::Wma,
        IndicatorKind::Rsi,
        IndicatorKind::Roc,
        IndicatorKind::Atr,
        IndicatorKind::Stddev,
        IndicatorKind::Obv,
        IndicatorKind::Bbands,
        IndicatorKind::Macd,
    ];

    pub fn outputs(&self) -> &'static [&'static str] {
        match self {
            IndicatorKind::Sma => &["sma"],
            IndicatorKind::Ema => &["ema"],
            IndicatorKind::Wma => &["wma"],
            IndicatorKind::Rsi => &["rsi"],
            IndicatorKind::Roc => &["roc"],
            IndicatorKind::Atr => &["atr"],
            IndicatorKind::Stddev => &["stddev"],
            IndicatorKind::Obv => &["obv"],
            IndicatorKind::Bbands => &["upper", "middle", "lower"],
            IndicatorKind::Macd => &["macd", "signal", "hist"],
        }
    }

    /// Input columns used when the spec does not name any.
    pub fn default_inputs(&self) -> &'static [&'static str] {
        match self {
            IndicatorKind::Atr => &[HIGH, LOW, CLOSE],
            IndicatorKind::Obv => &[CLOSE, VOLUME],
            _ => &[CLOSE],
        }
    }
}

impl fmt::Display for IndicatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IndicatorKind::Sma => "SMA",
            IndicatorKind::Ema => "EMA",
            IndicatorKind::Wma => "WMA",
            IndicatorKind::Rsi => "RSI",
            IndicatorKind::Roc => "ROC",
            IndicatorKind::Atr => "ATR",
            IndicatorKind::Stddev => "STDDEV",
            IndicatorKind::Obv => "OBV",
            IndicatorKind::Bbands => "BBANDS",
            IndicatorKind::Macd => "MACD",
        };
        f.write_str(name)
    }
}

impl FromStr for IndicatorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        IndicatorKind::ALL
            .into_iter()
            .find(|kind| kind.to_string() == upper)
            .ok_or_else(|| format!("unknown indicator function '{}'", s.trim()))
    }
}

/// One configured indicator.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSpec {
    /// Column name (or prefix, for multi-output indicators).
    pub name: String,
    pub function: String,
    pub timeframe: String,
    /// Input columns; empty means the function's defaults.
    pub inputs: Vec<String>,
    pub params: BTreeMap<String, f64>,
}

impl IndicatorSpec {
    pub fn new(name: &str, function: &str, timeframe: &str) -> Self {
        IndicatorSpec {
            name: name.to_string(),
            function: function.to_string(),
            timeframe: timeframe.to_string(),
            inputs: Vec::new(),
            params: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, key: &str, value: f64) -> Self {
        self.params.insert(key.to_string(), value);
        self
    }

    pub fn with_inputs(mut self, inputs: &[&str]) -> Self {
        self.inputs = inputs.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Config section this spec was read from.
    pub fn section(&self) -> String {
        format!("indicator:{}", self.name)
    }

    pub fn param(&self, key: &str, default: f64) -> f64 {
        self.params.get(key).copied().unwrap_or(default)
    }

    /// A window length parameter: a positive whole number.
    pub fn period(&self, key: &str, default: usize) -> Result<usize, TraderError> {
        match self.params.get(key) {
            None => Ok(default),
            Some(v) if *v >= 1.0 && v.fract() == 0.0 => Ok(*v as usize),
            Some(v) => Err(TraderError::invalid(
                &self.section(),
                key,
                format!("expected a positive whole number, found {v}"),
            )),
        }
    }

    /// Input column at `index`, falling back to `default`.
    pub fn input<'a>(&'a self, index: usize, default: &'a str) -> &'a str {
        self.inputs.get(index).map(String::as_str).unwrap_or(default)
    }
}

/// `name` for a single output, `name_output` otherwise.
pub fn output_column(name: &str, output: &str, output_count: usize) -> String {
    if output_count == 1 {
        name.to_string()
    } else {
        format!("{name}_{output}")
    }
}

/// Compute every spec on its timeframe and store the outputs as columns.
pub fn apply_indicators(
    data: &mut MarketData,
    library: &dyn IndicatorPort,
    specs: &[IndicatorSpec],
) -> Result<(), TraderError> {
    for spec in specs {
        let outputs = library.compute(data.get(&spec.timeframe)?, spec)?;
        let count = outputs.len();
        let series = data.get_mut(&spec.timeframe)?;
        for (output, values) in outputs {
            let column = output_column(&spec.name, &output, count);
            series.set_column(&column, values)?;
        }
        tracing::info!(
            indicator = %spec.name,
            function = %spec.function,
            timeframe = %spec.timeframe,
            outputs = count,
            "indicator applied"
        );
    }
    Ok(())
}
