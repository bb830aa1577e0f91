//! Backtest pipeline.
//!
//! Indicators → session levels → signal → simulation → metrics, over one
//! symbol's multi-timeframe data.

use std::collections::BTreeSet;

use crate::domain::error::TraderError;
use crate::domain::execution::{simulate, SimulationResult};
use crate::domain::indicator::{apply_indicators, IndicatorSpec};
use crate::domain::metrics::MetricsReport;
use crate::domain::rule::{referenced_sessions, referenced_timeframes};
use crate::domain::rule_eval::generate_signal;
use crate::domain::series::MarketData;
use crate::domain::session::{compute_session_levels, SessionDefinition, SessionRegistry};
use crate::domain::strategy::{AccountConfig, Instrument, Strategy};
use crate::ports::data_port::DataPort;
use crate::ports::indicator_port::IndicatorPort;

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub strategy: Strategy,
    pub account: AccountConfig,
    pub instrument: Instrument,
    pub sessions: SessionRegistry,
    pub indicators: Vec<IndicatorSpec>,
}

impl BacktestConfig {
    /// Sessions named by either side of the strategy.
    pub fn referenced_sessions(&self) -> BTreeSet<String> {
        let mut names = referenced_sessions(&self.strategy.buy_logic);
        names.extend(referenced_sessions(&self.strategy.sell_logic));
        names
    }

    /// Every timeframe the run reads: the entry timeframe, explicit column
    /// references, indicator timeframes and higher-timeframe sessions in use.
    pub fn required_timeframes(&self) -> BTreeSet<String> {
        let mut tfs = BTreeSet::new();
        tfs.insert(self.strategy.entry_timeframe.clone());
        tfs.extend(referenced_timeframes(&self.strategy.buy_logic));
        tfs.extend(referenced_timeframes(&self.strategy.sell_logic));
        tfs.extend(self.indicators.iter().map(|spec| spec.timeframe.clone()));
        for name in self.referenced_sessions() {
            if let Ok(SessionDefinition::HigherTimeframe { timeframe, .. }) =
                self.sessions.get(&name)
            {
                tfs.insert(timeframe.clone());
            }
        }
        tfs
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestResult {
    pub signal: Vec<i8>,
    pub simulation: SimulationResult,
    pub metrics: MetricsReport,
}

/// Fetch and validate every timeframe in `timeframes`.
pub fn load_market_data<'a, I>(
    source: &dyn DataPort,
    symbol: &str,
    timeframes: I,
) -> Result<MarketData, TraderError>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut data = MarketData::new();
    for tf in timeframes {
        let series = source.fetch_series(symbol, tf)?;
        series.validate()?;
        tracing::info!(symbol, timeframe = tf, bars = series.len(), "loaded price data");
        data.insert(series);
    }
    Ok(data)
}

pub fn run_backtest(
    data: &mut MarketData,
    library: &dyn IndicatorPort,
    config: &BacktestConfig,
) -> Result<BacktestResult, TraderError> {
    let strategy = &config.strategy;
    strategy.validate_legs()?;
    data.validate()?;

    for tf in config.required_timeframes() {
        if !data.contains(&tf) {
            return Err(TraderError::DataNotFound { timeframe: tf });
        }
    }

    apply_indicators(data, library, &config.indicators)?;

    let used = config.sessions.subset(config.referenced_sessions().iter().map(String::as_str))?;
    let levels = compute_session_levels(data, &used, &strategy.entry_timeframe)?;

    let signal = generate_signal(data, &levels, strategy)?;
    let simulation = simulate(
        data.get(&strategy.entry_timeframe)?,
        strategy,
        &config.account,
        &config.instrument,
    )?;
    let metrics = MetricsReport::compute(&simulation.trades, &config.sessions);

    tracing::info!(
        strategy = %strategy.name,
        trades = simulation.trades.len(),
        net_profit = metrics.pnl.net_profit,
        "backtest complete"
    );

    Ok(BacktestResult {
        signal,
        simulation,
        metrics,
    })
}
