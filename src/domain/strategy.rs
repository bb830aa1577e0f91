//! Strategy configuration: entry logic, stop/target legs, account and
//! instrument economics.

use std::fmt;
use std::str::FromStr;

use crate::domain::error::TraderError;
use crate::domain::rule::LogicNode;

/// One candidate stop or target distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Leg {
    /// Distance in pips.
    Pips(f64),
    /// Absolute price offset.
    Fixed(f64),
    /// Monetary risk converted to a price distance through the instrument's
    /// tick economics.
    Dollar(f64),
    /// Multiple of the 14-bar average true range at the entry bar.
    Atr(f64),
}

impl Leg {
    pub fn kind(&self) -> &'static str {
        match self {
            Leg::Pips(_) => "pips",
            Leg::Fixed(_) => "fixed",
            Leg::Dollar(_) => "dollar",
            Leg::Atr(_) => "atr",
        }
    }

    pub fn value(&self) -> f64 {
        match self {
            Leg::Pips(v) | Leg::Fixed(v) | Leg::Dollar(v) | Leg::Atr(v) => *v,
        }
    }
}

impl fmt::Display for Leg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.value())
    }
}

impl FromStr for Leg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, raw) = s
            .split_once(':')
            .ok_or_else(|| format!("expected kind:value, found '{}'", s.trim()))?;
        let value: f64 = raw
            .trim()
            .parse()
            .map_err(|_| format!("invalid number '{}' in leg '{}'", raw.trim(), s.trim()))?;
        if !value.is_finite() || value < 0.0 {
            return Err(format!("leg '{}' must be a non-negative number", s.trim()));
        }
        match kind.trim().to_ascii_lowercase().as_str() {
            "pips" | "pip" => Ok(Leg::Pips(value)),
            "fixed" => Ok(Leg::Fixed(value)),
            "dollar" | "dollars" => Ok(Leg::Dollar(value)),
            "atr" => Ok(Leg::Atr(value)),
            other => Err(format!("unknown leg kind '{other}'")),
        }
    }
}

/// Parse a comma-separated leg list such as `pips:20, atr:1.5`.
pub fn parse_legs(input: &str) -> Result<Vec<Leg>, String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse)
        .collect()
}

/// Which prices the simulator fills and checks against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    /// Bar close for entries, bar high/low for exits.
    #[default]
    Candle,
    /// Bid/ask quotes.
    Tick,
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionMode::Candle => write!(f, "candle"),
            ExecutionMode::Tick => write!(f, "tick"),
        }
    }
}

impl FromStr for ExecutionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "candle" => Ok(ExecutionMode::Candle),
            "tick" => Ok(ExecutionMode::Tick),
            other => Err(format!("unknown execution mode '{other}' (expected candle or tick)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Strategy {
    pub name: String,
    pub entry_timeframe: String,
    pub buy_logic: LogicNode,
    pub sell_logic: LogicNode,
    pub stop_loss: Vec<Leg>,
    pub take_profit: Vec<Leg>,
    pub single_trade_per_direction: bool,
}

impl Strategy {
    /// Both sides need at least one leg.
    pub fn validate_legs(&self) -> Result<(), TraderError> {
        if self.stop_loss.is_empty() {
            return Err(TraderError::invalid(
                "strategy",
                "stop_loss",
                "at least one leg is required",
            ));
        }
        if self.take_profit.is_empty() {
            return Err(TraderError::invalid(
                "strategy",
                "take_profit",
                "at least one leg is required",
            ));
        }
        Ok(())
    }

    pub fn uses_atr(&self) -> bool {
        self.stop_loss
            .iter()
            .chain(&self.take_profit)
            .any(|leg| matches!(leg, Leg::Atr(_)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccountConfig {
    pub account_size: f64,
    pub lot_size: f64,
    pub spread_pips: f64,
    pub slippage_pips: f64,
    pub mode: ExecutionMode,
}

impl Default for AccountConfig {
    fn default() -> Self {
        AccountConfig {
            account_size: 10_000.0,
            lot_size: 1.0,
            spread_pips: 0.0,
            slippage_pips: 0.0,
            mode: ExecutionMode::Candle,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Instrument {
    pub pip_size: f64,
    pub pip_value: f64,
    pub tick_size: f64,
    pub tick_value: f64,
}

impl Default for Instrument {
    fn default() -> Self {
        Instrument {
            pip_size: 0.0001,
            pip_value: 10.0,
            tick_size: 0.00001,
            tick_value: 1.0,
        }
    }
}
