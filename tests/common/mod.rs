#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use sessiontrader::domain::backtest::BacktestConfig;
use sessiontrader::domain::error::TraderError;
use sessiontrader::domain::rule::LogicNode;
use sessiontrader::domain::series::{PriceSeries, CLOSE, HIGH, LOW, OPEN};
use sessiontrader::domain::session::SessionRegistry;
use sessiontrader::domain::strategy::{AccountConfig, Instrument, Leg, Strategy};
use sessiontrader::ports::data_port::DataPort;
use std::collections::BTreeMap;

/// In-memory price source keyed by timeframe.
pub struct MockDataPort {
    pub series: BTreeMap<String, PriceSeries>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            series: BTreeMap::new(),
        }
    }

    pub fn with_series(mut self, series: PriceSeries) -> Self {
        self.series.insert(series.timeframe().to_string(), series);
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_series(&self, _symbol: &str, timeframe: &str) -> Result<PriceSeries, TraderError> {
        self.series
            .get(timeframe)
            .cloned()
            .ok_or_else(|| TraderError::DataNotFound {
                timeframe: timeframe.to_string(),
            })
    }

    fn list_timeframes(&self, _symbol: &str) -> Result<Vec<String>, TraderError> {
        Ok(self.series.keys().cloned().collect())
    }
}

pub fn ts(year: i32, month: u32, day: u32, hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, month, day)
        .unwrap()
        .and_hms_opt(hour, 0, 0)
        .unwrap()
}

/// Bars with explicit `[open, high, low, close]` rows.
pub fn ohlc_series(tf: &str, time: Vec<NaiveDateTime>, rows: &[[f64; 4]]) -> PriceSeries {
    let col = |k: usize| rows.iter().map(|r| r[k]).collect::<Vec<f64>>();
    PriceSeries::new(tf, time)
        .with_column(OPEN, col(0))
        .unwrap()
        .with_column(HIGH, col(1))
        .unwrap()
        .with_column(LOW, col(2))
        .unwrap()
        .with_column(CLOSE, col(3))
        .unwrap()
}

/// Bars where open = close, high = close + 1 and low = close - 0.5.
pub fn close_series(tf: &str, time: Vec<NaiveDateTime>, closes: &[f64]) -> PriceSeries {
    let rows: Vec<[f64; 4]> = closes.iter().map(|&c| [c, c + 1.0, c - 0.5, c]).collect();
    ohlc_series(tf, time, &rows)
}

pub fn hourly(year: i32, month: u32, day: u32, count: usize) -> Vec<NaiveDateTime> {
    let start = ts(year, month, day, 0);
    (0..count)
        .map(|h| start + chrono::Duration::hours(h as i64))
        .collect()
}

/// One pip per price unit, one unit of money per pip.
pub fn unit_instrument() -> Instrument {
    Instrument {
        pip_size: 1.0,
        pip_value: 1.0,
        tick_size: 1.0,
        tick_value: 1.0,
    }
}

pub fn make_strategy(buy: LogicNode, sell: LogicNode, stop: Vec<Leg>, target: Vec<Leg>) -> Strategy {
    Strategy {
        name: "Test Strategy".to_string(),
        entry_timeframe: "H1".to_string(),
        buy_logic: buy,
        sell_logic: sell,
        stop_loss: stop,
        take_profit: target,
        single_trade_per_direction: true,
    }
}

pub fn make_config(strategy: Strategy) -> BacktestConfig {
    BacktestConfig {
        strategy,
        account: AccountConfig::default(),
        instrument: unit_instrument(),
        sessions: SessionRegistry::standard(),
        indicators: Vec::new(),
    }
}
