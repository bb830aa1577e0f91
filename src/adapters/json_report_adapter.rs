//! JSON report adapter implementing ReportPort, plus a CSV trade-log writer.
//!
//! Non-finite metrics (an unbeaten profit factor) serialize as `null`.

use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::domain::backtest::BacktestResult;
use crate::domain::error::TraderError;
use crate::domain::metrics::MetricsReport;
use crate::domain::position::TradeRecord;
use crate::domain::strategy::Strategy;
use crate::ports::report_port::ReportPort;

#[derive(Serialize)]
struct StrategySummary<'a> {
    name: &'a str,
    entry_timeframe: &'a str,
    buy_logic: String,
    sell_logic: String,
    stop_loss: Vec<String>,
    take_profit: Vec<String>,
    single_trade_per_direction: bool,
}

impl<'a> From<&'a Strategy> for StrategySummary<'a> {
    fn from(strategy: &'a Strategy) -> Self {
        StrategySummary {
            name: &strategy.name,
            entry_timeframe: &strategy.entry_timeframe,
            buy_logic: strategy.buy_logic.to_string(),
            sell_logic: strategy.sell_logic.to_string(),
            stop_loss: strategy.stop_loss.iter().map(ToString::to_string).collect(),
            take_profit: strategy.take_profit.iter().map(ToString::to_string).collect(),
            single_trade_per_direction: strategy.single_trade_per_direction,
        }
    }
}

#[derive(Serialize)]
struct Report<'a> {
    strategy: StrategySummary<'a>,
    metrics: &'a MetricsReport,
    trades: &'a [TradeRecord],
    open_trades: usize,
    final_balance: f64,
}

pub struct JsonReportAdapter;

impl JsonReportAdapter {
    pub fn render(result: &BacktestResult, strategy: &Strategy) -> Result<String, TraderError> {
        let report = Report {
            strategy: StrategySummary::from(strategy),
            metrics: &result.metrics,
            trades: &result.simulation.trades,
            open_trades: result.simulation.open_trades.len(),
            final_balance: result.simulation.final_balance,
        };
        Ok(serde_json::to_string_pretty(&report)?)
    }
}

impl ReportPort for JsonReportAdapter {
    fn write(
        &self,
        result: &BacktestResult,
        strategy: &Strategy,
        output_path: &str,
    ) -> Result<(), TraderError> {
        let json = Self::render(result, strategy)?;
        fs::write(output_path, json)?;
        tracing::info!(path = output_path, "report written");
        Ok(())
    }
}

/// Write the closed-trade log as CSV with a header row.
pub fn write_trade_log_csv<P: AsRef<Path>>(
    trades: &[TradeRecord],
    path: P,
) -> Result<(), TraderError> {
    let mut writer = csv::Writer::from_path(path.as_ref())?;
    for trade in trades {
        writer.serialize(trade)?;
    }
    writer.flush()?;
    tracing::info!(path = %path.as_ref().display(), trades = trades.len(), "trade log written");
    Ok(())
}
