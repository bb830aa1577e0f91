//! Configuration validation.
//!
//! Reads every section a backtest needs through [`ConfigPort`] and turns it
//! into typed values, failing on the first missing or malformed key.

use crate::domain::backtest::BacktestConfig;
use crate::domain::error::TraderError;
use crate::domain::indicator::IndicatorSpec;
use crate::domain::rule::LogicNode;
use crate::domain::rule_parser;
use crate::domain::session::{SessionDefinition, SessionRegistry};
use crate::domain::strategy::{parse_legs, AccountConfig, ExecutionMode, Instrument, Leg, Strategy};
use crate::ports::config_port::ConfigPort;
use crate::ports::indicator_port::IndicatorPort;

const SESSION_PREFIX: &str = "session:";
const INDICATOR_PREFIX: &str = "indicator:";

/// Where the price files live and which timeframes to load.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSettings {
    pub directory: String,
    pub symbol: String,
    /// Explicitly listed timeframes; empty means whatever the run requires.
    pub timeframes: Vec<String>,
}

/// Validate everything except the `[data]` section.
pub fn load_backtest_config(
    config: &dyn ConfigPort,
    library: &dyn IndicatorPort,
) -> Result<BacktestConfig, TraderError> {
    let strategy = load_strategy(config)?;
    let account = load_account(config)?;
    let instrument = load_instrument(config)?;
    let sessions = load_sessions(config)?;
    let indicators = load_indicators(config, library)?;

    let backtest = BacktestConfig {
        strategy,
        account,
        instrument,
        sessions,
        indicators,
    };
    for name in backtest.referenced_sessions() {
        backtest.sessions.get(&name)?;
    }
    Ok(backtest)
}

pub fn load_strategy(config: &dyn ConfigPort) -> Result<Strategy, TraderError> {
    let name = config
        .get_string("strategy", "name")
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| "Unnamed Strategy".to_string());
    let entry_timeframe = require_string(config, "strategy", "entry_timeframe")?;

    let buy_logic = load_logic(config, "buy_logic")?;
    let sell_logic = load_logic(config, "sell_logic")?;
    if buy_logic.is_none() && sell_logic.is_none() {
        return Err(TraderError::missing("strategy", "buy_logic"));
    }

    let strategy = Strategy {
        name: name.trim().to_string(),
        entry_timeframe,
        buy_logic: buy_logic.unwrap_or_else(|| LogicNode::constant(false)),
        sell_logic: sell_logic.unwrap_or_else(|| LogicNode::constant(false)),
        stop_loss: load_legs(config, "stop_loss")?,
        take_profit: load_legs(config, "take_profit")?,
        single_trade_per_direction: config.get_bool("strategy", "single_trade_per_direction", true),
    };
    strategy.validate_legs()?;
    Ok(strategy)
}

fn load_logic(config: &dyn ConfigPort, key: &str) -> Result<Option<LogicNode>, TraderError> {
    match config.get_string("strategy", key) {
        Some(text) if !text.trim().is_empty() => {
            let node = rule_parser::parse(&text).map_err(|e| TraderError::invalid(
                "strategy",
                key,
                e.display_with_context(&text),
            ))?;
            Ok(Some(node))
        }
        _ => Ok(None),
    }
}

fn load_legs(config: &dyn ConfigPort, key: &str) -> Result<Vec<Leg>, TraderError> {
    let raw = require_string(config, "strategy", key)?;
    parse_legs(&raw).map_err(|reason| TraderError::invalid("strategy", key, reason))
}

pub fn load_account(config: &dyn ConfigPort) -> Result<AccountConfig, TraderError> {
    let defaults = AccountConfig::default();

    let account_size = read_number(config, "account", "account_size", defaults.account_size)?;
    if account_size <= 0.0 {
        return Err(TraderError::invalid(
            "account",
            "account_size",
            "account_size must be positive",
        ));
    }
    let lot_size = read_number(config, "account", "lot_size", defaults.lot_size)?;
    if lot_size <= 0.0 {
        return Err(TraderError::invalid("account", "lot_size", "lot_size must be positive"));
    }
    let spread_pips = read_number(config, "account", "spread_pips", defaults.spread_pips)?;
    if spread_pips < 0.0 {
        return Err(TraderError::invalid(
            "account",
            "spread_pips",
            "spread_pips must be non-negative",
        ));
    }
    let slippage_pips = read_number(config, "account", "slippage_pips", defaults.slippage_pips)?;
    if slippage_pips < 0.0 {
        return Err(TraderError::invalid(
            "account",
            "slippage_pips",
            "slippage_pips must be non-negative",
        ));
    }
    let mode = match config.get_string("account", "mode") {
        Some(s) => s
            .parse::<ExecutionMode>()
            .map_err(|reason| TraderError::invalid("account", "mode", reason))?,
        None => defaults.mode,
    };

    Ok(AccountConfig {
        account_size,
        lot_size,
        spread_pips,
        slippage_pips,
        mode,
    })
}

pub fn load_instrument(config: &dyn ConfigPort) -> Result<Instrument, TraderError> {
    let defaults = Instrument::default();
    let pip_size = read_number(config, "instrument", "pip_size", defaults.pip_size)?;
    if pip_size <= 0.0 {
        return Err(TraderError::invalid("instrument", "pip_size", "pip_size must be positive"));
    }
    let pip_value = read_number(config, "instrument", "pip_value", defaults.pip_value)?;
    let tick_size = read_number(config, "instrument", "tick_size", defaults.tick_size)?;
    let tick_value = read_number(config, "instrument", "tick_value", defaults.tick_value)?;
    for (key, value) in [
        ("pip_value", pip_value),
        ("tick_size", tick_size),
        ("tick_value", tick_value),
    ] {
        if value < 0.0 {
            return Err(TraderError::invalid(
                "instrument",
                key,
                format!("{key} must be non-negative"),
            ));
        }
    }
    Ok(Instrument {
        pip_size,
        pip_value,
        tick_size,
        tick_value,
    })
}

/// `[session:<name>]` sections, or the standard registry when there are none.
pub fn load_sessions(config: &dyn ConfigPort) -> Result<SessionRegistry, TraderError> {
    let names: Vec<String> = config
        .sections()
        .into_iter()
        .filter(|s| s.starts_with(SESSION_PREFIX))
        .collect();
    if names.is_empty() {
        return Ok(SessionRegistry::standard());
    }

    let mut registry = SessionRegistry::new();
    for section in names {
        let name = section[SESSION_PREFIX.len()..].trim();
        if name.is_empty() {
            return Err(TraderError::invalid(&section, "name", "session name is empty"));
        }
        let kind = require_string(config, &section, "type")?;
        let definition = match kind.trim().to_ascii_lowercase().as_str() {
            "intraday" => {
                let start = require_string(config, &section, "start")?;
                let end = require_string(config, &section, "end")?;
                SessionDefinition::intraday(&start, &end).map_err(|e| match e {
                    TraderError::ConfigInvalid { key, reason, .. } => TraderError::ConfigInvalid {
                        section: section.clone(),
                        key,
                        reason,
                    },
                    other => other,
                })?
            }
            "higher_tf" | "higher_timeframe" => {
                let timeframe = require_string(config, &section, "timeframe")?;
                let shift = read_number(config, &section, "shift", 1.0)?;
                if shift < 0.0 || shift.fract() != 0.0 {
                    return Err(TraderError::invalid(
                        &section,
                        "shift",
                        "shift must be a non-negative whole number",
                    ));
                }
                SessionDefinition::higher_timeframe(timeframe.trim(), shift as usize)
            }
            other => {
                return Err(TraderError::invalid(
                    &section,
                    "type",
                    format!("unknown session type '{other}' (expected intraday or higher_tf)"),
                ))
            }
        };
        registry.insert(name, definition);
    }
    Ok(registry)
}

/// `[indicator:<name>]` sections in name order. Every key other than
/// `function`, `timeframe` and `inputs` is a numeric parameter.
pub fn load_indicators(
    config: &dyn ConfigPort,
    library: &dyn IndicatorPort,
) -> Result<Vec<IndicatorSpec>, TraderError> {
    let mut specs = Vec::new();
    for section in config.sections() {
        let Some(name) = section.strip_prefix(INDICATOR_PREFIX) else {
            continue;
        };
        let name = name.trim();
        if name.is_empty() {
            return Err(TraderError::invalid(&section, "name", "indicator name is empty"));
        }
        let function = require_string(config, &section, "function")?;
        if !library.supports(&function) {
            return Err(TraderError::UnknownIndicator {
                name: name.to_string(),
                function: function.trim().to_string(),
            });
        }
        let timeframe = require_string(config, &section, "timeframe")?;

        let mut spec = IndicatorSpec::new(name, function.trim(), timeframe.trim());
        if let Some(inputs) = config.get_string(&section, "inputs") {
            spec.inputs = split_list(&inputs);
        }
        for key in config.section_keys(&section) {
            if matches!(key.as_str(), "function" | "timeframe" | "inputs") {
                continue;
            }
            let value = read_number(config, &section, &key, f64::NAN)?;
            spec.params.insert(key, value);
        }
        specs.push(spec);
    }
    Ok(specs)
}

pub fn load_data_settings(config: &dyn ConfigPort) -> Result<DataSettings, TraderError> {
    let directory = require_string(config, "data", "directory")?;
    let symbol = require_string(config, "data", "symbol")?;
    let timeframes = config
        .get_string("data", "timeframes")
        .map(|s| split_list(&s))
        .unwrap_or_default();
    Ok(DataSettings {
        directory: directory.trim().to_string(),
        symbol: symbol.trim().to_string(),
        timeframes,
    })
}

fn require_string(config: &dyn ConfigPort, section: &str, key: &str) -> Result<String, TraderError> {
    match config.get_string(section, key) {
        Some(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        _ => Err(TraderError::missing(section, key)),
    }
}

/// A numeric key, `default` when absent. Present but unparseable is an error.
fn read_number(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
) -> Result<f64, TraderError> {
    match config.get_string(section, key) {
        None => Ok(default),
        Some(raw) => match raw.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(v),
            _ => Err(TraderError::invalid(
                section,
                key,
                format!("expected a number, found '{}'", raw.trim()),
            )),
        },
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
