//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::builtin_indicators::BuiltinIndicators;
use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_report_adapter::{write_trade_log_csv, JsonReportAdapter};
use crate::domain::backtest::{self as backtest_engine, BacktestConfig, BacktestResult};
use crate::domain::config_validation::{
    load_backtest_config, load_data_settings, load_sessions, DataSettings,
};
use crate::domain::error::TraderError;
use crate::domain::metrics::MetricsReport;
use crate::domain::session::{SessionDefinition, SessionRegistry};
use crate::domain::strategy::Leg;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "sessiontrader", about = "Session-aware rule-based backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Write the JSON report here
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Write the closed-trade log as CSV here
        #[arg(short, long)]
        trades: Option<PathBuf>,
        /// Override [data] directory
        #[arg(long)]
        data_dir: Option<PathBuf>,
        /// Override [data] symbol
        #[arg(long)]
        symbol: Option<String>,
    },
    /// Validate a strategy configuration
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// List the sessions a configuration defines
    Sessions {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let outcome = match cli.command {
        Command::Backtest {
            config,
            output,
            trades,
            data_dir,
            symbol,
        } => run_backtest(
            &config,
            output.as_deref(),
            trades.as_deref(),
            data_dir.as_deref(),
            symbol.as_deref(),
        ),
        Command::Validate { config } => run_validate(&config),
        Command::Sessions { config } => run_sessions(&config),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

/// Load the configuration and price data, then run the full pipeline.
pub fn execute_backtest(
    config_path: &Path,
    data_dir: Option<&Path>,
    symbol: Option<&str>,
) -> Result<(BacktestConfig, BacktestResult), TraderError> {
    let adapter = FileConfigAdapter::from_file(config_path)?;
    let bt_config = load_backtest_config(&adapter, &BuiltinIndicators)?;
    let mut settings = load_data_settings(&adapter)?;
    if let Some(dir) = data_dir {
        settings.directory = dir.display().to_string();
    }
    if let Some(sym) = symbol {
        settings.symbol = sym.to_string();
    }

    let source = CsvAdapter::new(&settings.directory);
    let timeframes = timeframes_to_load(&settings, &bt_config, &source)?;
    let mut data = backtest_engine::load_market_data(
        &source,
        &settings.symbol,
        timeframes.iter().map(String::as_str),
    )?;

    let result = backtest_engine::run_backtest(&mut data, &BuiltinIndicators, &bt_config)?;
    Ok((bt_config, result))
}

/// Required timeframes plus any listed under `[data] timeframes`.
fn timeframes_to_load(
    settings: &DataSettings,
    config: &BacktestConfig,
    source: &dyn DataPort,
) -> Result<Vec<String>, TraderError> {
    let mut wanted = config.required_timeframes();
    wanted.extend(settings.timeframes.iter().cloned());

    let available = source.list_timeframes(&settings.symbol)?;
    for tf in &wanted {
        if !available.contains(tf) {
            return Err(TraderError::DataNotFound {
                timeframe: tf.clone(),
            });
        }
    }
    Ok(wanted.into_iter().collect())
}

fn run_backtest(
    config_path: &Path,
    output_path: Option<&Path>,
    trades_path: Option<&Path>,
    data_dir: Option<&Path>,
    symbol: Option<&str>,
) -> Result<(), TraderError> {
    eprintln!("Loading config from {}", config_path.display());
    let (config, result) = execute_backtest(config_path, data_dir, symbol)?;

    eprintln!("\n=== {} ===", config.strategy.name);
    print_summary(&result.metrics, result.simulation.final_balance);
    if !result.simulation.open_trades.is_empty() {
        eprintln!(
            "Still open:       {} (not counted)",
            result.simulation.open_trades.len()
        );
    }
    print_sessions(&result.metrics);

    if let Some(path) = output_path {
        JsonReportAdapter.write(&result, &config.strategy, &path.display().to_string())?;
        eprintln!("\nReport written to: {}", path.display());
    }
    if let Some(path) = trades_path {
        write_trade_log_csv(&result.simulation.trades, path)?;
        eprintln!("Trade log written to: {}", path.display());
    }
    Ok(())
}

fn print_summary(metrics: &MetricsReport, final_balance: f64) {
    let stats = &metrics.trade_stats;
    let pnl = &metrics.pnl;
    eprintln!("Total Trades:     {}", stats.total_trades);
    eprintln!("  Buy / Sell:     {} / {}", stats.buy_trades, stats.sell_trades);
    eprintln!("Win Rate:         {:.1}%", stats.win_rate * 100.0);
    eprintln!("Net Profit:       {:.2}", pnl.net_profit);
    eprintln!("Profit Factor:    {:.2}", pnl.profit_factor);
    eprintln!("Expectancy:       {:.2}", pnl.expectancy);
    eprintln!("Return:           {:.2}%", pnl.return_on_account * 100.0);
    eprintln!(
        "Max Drawdown:     {:.2} ({:.1}%)",
        metrics.risk.max_drawdown,
        metrics.risk.max_drawdown_pct
    );
    eprintln!("Sharpe Ratio:     {:.2}", metrics.performance.sharpe_ratio);
    eprintln!("Sortino Ratio:    {:.2}", metrics.performance.sortino_ratio);
    eprintln!("Final Balance:    {:.2}", final_balance);
}

fn print_sessions(metrics: &MetricsReport) {
    if metrics.sessions.is_empty() {
        return;
    }
    eprintln!("\n=== Per-Session Summary ===");
    for (name, bucket) in &metrics.sessions {
        let sign = if bucket.net_profit >= 0.0 { "+" } else { "" };
        eprintln!(
            "  {}:  {} trades, {:.1}% win rate, {}{:.2}",
            name,
            bucket.total_trades,
            bucket.win_rate * 100.0,
            sign,
            bucket.net_profit,
        );
    }
}

fn run_validate(config_path: &Path) -> Result<(), TraderError> {
    eprintln!("Validating strategy: {}", config_path.display());
    let adapter = FileConfigAdapter::from_file(config_path)?;
    let config = load_backtest_config(&adapter, &BuiltinIndicators)?;
    let strategy = &config.strategy;

    eprintln!(
        "\nStrategy: {} (entry timeframe {})",
        strategy.name, strategy.entry_timeframe
    );
    eprintln!("  buy:  {}", strategy.buy_logic);
    eprintln!("  sell: {}", strategy.sell_logic);
    eprintln!("  stop_loss:   {}", join_legs(&strategy.stop_loss));
    eprintln!("  take_profit: {}", join_legs(&strategy.take_profit));
    eprintln!(
        "  account: {:.2}, lot {}, mode {}",
        config.account.account_size, config.account.lot_size, config.account.mode
    );

    if !config.indicators.is_empty() {
        eprintln!("\nIndicators:");
        for spec in &config.indicators {
            eprintln!("  {} = {} on {}", spec.name, spec.function, spec.timeframe);
        }
    }

    let timeframes: Vec<String> = config.required_timeframes().into_iter().collect();
    eprintln!("\nTimeframes required: {}", timeframes.join(", "));
    eprintln!("\nConfiguration is valid");
    Ok(())
}

fn join_legs(legs: &[Leg]) -> String {
    legs.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn run_sessions(config_path: &Path) -> Result<(), TraderError> {
    let adapter = FileConfigAdapter::from_file(config_path)?;
    let registry = load_sessions(&adapter)?;
    print_registry(&registry);
    Ok(())
}

fn print_registry(registry: &SessionRegistry) {
    for (name, definition) in registry.iter() {
        match definition {
            SessionDefinition::Intraday { start, end } => {
                println!("{name}\tintraday\t{}-{}", start.format("%H:%M"), end.format("%H:%M"));
            }
            SessionDefinition::HigherTimeframe { timeframe, shift } => {
                println!("{name}\thigher_tf\t{timeframe} shift {shift}");
            }
        }
    }
    eprintln!("{} sessions", registry.len());
}
