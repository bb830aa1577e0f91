//! Trade simulation.
//!
//! Replays the `signal` column of one price series bar by bar. Each bar first
//! handles a possible entry, then checks every trade opened on an earlier bar
//! against the bar's effective high/low.
//!
//! # Fill rules
//!
//! - Entry price is the close (candle mode) or ask/bid (tick mode, long/short),
//!   moved against the trader by `slippage + spread / 2` pips.
//! - Stop and target are fixed at entry from the configured legs: the stop is
//!   the tightest candidate, the target the furthest.
//! - Exits fill exactly at the stop or target price. When a bar touches both,
//!   the target wins.
//! - Trades still open after the last bar are returned separately and never
//!   enter the trade log.

use crate::domain::error::TraderError;
use crate::domain::position::{Direction, ExitReason, OpenTrade, TradeRecord};
use crate::domain::series::{true_range, PriceSeries, ASK, BID, CLOSE, HIGH, LOW, SIGNAL};
use crate::domain::strategy::{AccountConfig, ExecutionMode, Instrument, Leg, Strategy};

/// Look-back of the average true range used by `atr` legs.
pub const ATR_PERIOD: usize = 14;

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationResult {
    /// Closed trades in exit order.
    pub trades: Vec<TradeRecord>,
    /// Trades still waiting for their stop or target at the end of the data.
    pub open_trades: Vec<OpenTrade>,
    pub final_balance: f64,
}

/// Widen the raw entry price by slippage and half the spread, against the
/// trade direction.
pub fn apply_entry_costs(
    price: f64,
    direction: Direction,
    account: &AccountConfig,
    instrument: &Instrument,
) -> f64 {
    let cost = (account.slippage_pips + account.spread_pips / 2.0) * instrument.pip_size;
    price + direction.sign() * cost
}

/// Convert a monetary amount into a price distance for the configured lot.
/// Returns 0 when the instrument has no tick economics.
pub fn dollar_to_price_distance(dollar: f64, lot_size: f64, instrument: &Instrument) -> f64 {
    if instrument.tick_value == 0.0 || instrument.tick_size == 0.0 || lot_size == 0.0 {
        tracing::debug!(
            dollar,
            tick_value = instrument.tick_value,
            tick_size = instrument.tick_size,
            "zero tick economics, dollar leg distance is 0"
        );
        return 0.0;
    }
    let pips = (dollar / (instrument.tick_value * lot_size))
        * (instrument.tick_size / instrument.pip_size);
    pips * instrument.pip_size
}

/// Rolling mean of the true range over `period` bars. The leading bars that
/// precede the first full window take the first computed value.
pub fn rolling_atr(high: &[f64], low: &[f64], close: &[f64], period: usize) -> Vec<f64> {
    let n = high.len();
    let tr: Vec<f64> = (0..n)
        .map(|i| {
            let prev_close = if i > 0 { Some(close[i - 1]) } else { None };
            true_range(high[i], low[i], prev_close)
        })
        .collect();

    let mut atr = vec![f64::NAN; n];
    if period == 0 || n < period {
        return atr;
    }
    for i in (period - 1)..n {
        let window = &tr[i + 1 - period..=i];
        if window.iter().all(|v| v.is_finite()) {
            atr[i] = window.iter().sum::<f64>() / period as f64;
        }
    }

    let mut next_valid = f64::NAN;
    for value in atr.iter_mut().rev() {
        if value.is_nan() {
            *value = next_valid;
        } else {
            next_valid = *value;
        }
    }
    atr
}

fn leg_distance(leg: &Leg, atr: f64, account: &AccountConfig, instrument: &Instrument) -> f64 {
    let distance = match leg {
        Leg::Pips(pips) => pips * instrument.pip_size,
        Leg::Fixed(offset) => *offset,
        Leg::Dollar(dollar) => dollar_to_price_distance(*dollar, account.lot_size, instrument),
        Leg::Atr(multiplier) => atr * multiplier,
    };
    if !distance.is_finite() {
        tracing::warn!(%leg, distance, "leg resolved to a non-finite distance, candidate skipped");
    }
    distance
}

/// Stop across the legs: the lowest candidate for a long, the highest for a
/// short.
pub fn resolve_stop(
    legs: &[Leg],
    entry: f64,
    direction: Direction,
    atr: f64,
    account: &AccountConfig,
    instrument: &Instrument,
) -> f64 {
    let candidates = legs
        .iter()
        .map(|leg| entry - direction.sign() * leg_distance(leg, atr, account, instrument));
    match direction {
        Direction::Long => candidates.fold(f64::NAN, f64::min),
        Direction::Short => candidates.fold(f64::NAN, f64::max),
    }
}

/// Furthest target across the legs.
pub fn resolve_target(
    legs: &[Leg],
    entry: f64,
    direction: Direction,
    atr: f64,
    account: &AccountConfig,
    instrument: &Instrument,
) -> f64 {
    let candidates = legs
        .iter()
        .map(|leg| entry + direction.sign() * leg_distance(leg, atr, account, instrument));
    match direction {
        Direction::Long => candidates.fold(f64::NAN, f64::max),
        Direction::Short => candidates.fold(f64::NAN, f64::min),
    }
}

/// Realized profit of a move from `entry` to `exit`.
pub fn trade_pnl(
    entry: f64,
    exit: f64,
    direction: Direction,
    account: &AccountConfig,
    instrument: &Instrument,
) -> f64 {
    (exit - entry) * direction.sign() * account.lot_size / instrument.pip_size
        * instrument.pip_value
}

/// Price columns the simulator reads, resolved once per run.
struct Quotes<'a> {
    mode: ExecutionMode,
    close: &'a [f64],
    high: &'a [f64],
    low: &'a [f64],
    bid: &'a [f64],
    ask: &'a [f64],
}

impl<'a> Quotes<'a> {
    fn from_series(series: &'a PriceSeries, mode: ExecutionMode) -> Result<Self, TraderError> {
        match mode {
            ExecutionMode::Candle => Ok(Quotes {
                mode,
                close: series.column(CLOSE)?,
                high: series.column(HIGH)?,
                low: series.column(LOW)?,
                bid: &[],
                ask: &[],
            }),
            ExecutionMode::Tick => Ok(Quotes {
                mode,
                close: &[],
                high: &[],
                low: &[],
                bid: series.column(BID)?,
                ask: series.column(ASK)?,
            }),
        }
    }

    fn entry_price(&self, i: usize, direction: Direction) -> f64 {
        match (self.mode, direction) {
            (ExecutionMode::Candle, _) => self.close[i],
            (ExecutionMode::Tick, Direction::Long) => self.ask[i],
            (ExecutionMode::Tick, Direction::Short) => self.bid[i],
        }
    }

    /// (high, low) a trade in `direction` is checked against.
    fn range(&self, i: usize, direction: Direction) -> (f64, f64) {
        match (self.mode, direction) {
            (ExecutionMode::Candle, _) => (self.high[i], self.low[i]),
            (ExecutionMode::Tick, Direction::Long) => (self.ask[i], self.bid[i]),
            (ExecutionMode::Tick, Direction::Short) => (self.bid[i], self.ask[i]),
        }
    }

    fn atr(&self, period: usize) -> Vec<f64> {
        match self.mode {
            ExecutionMode::Candle => rolling_atr(self.high, self.low, self.close, period),
            ExecutionMode::Tick => rolling_atr(self.bid, self.bid, self.bid, period),
        }
    }
}

fn signal_at(value: f64) -> i8 {
    if value > 0.0 {
        1
    } else if value < 0.0 {
        -1
    } else {
        0
    }
}

pub fn simulate(
    series: &PriceSeries,
    strategy: &Strategy,
    account: &AccountConfig,
    instrument: &Instrument,
) -> Result<SimulationResult, TraderError> {
    series.validate()?;
    strategy.validate_legs()?;

    let signal = series.column(SIGNAL)?;
    let quotes = Quotes::from_series(series, account.mode)?;
    let time = series.time();

    let atr = if strategy.uses_atr() {
        if series.len() < ATR_PERIOD {
            return Err(TraderError::InsufficientData {
                context: "atr leg".to_string(),
                timeframe: series.timeframe().to_string(),
                bars: series.len(),
                minimum: ATR_PERIOD,
            });
        }
        quotes.atr(ATR_PERIOD)
    } else {
        Vec::new()
    };

    let mut balance = account.account_size;
    let mut trades: Vec<TradeRecord> = Vec::new();
    let mut open: Vec<OpenTrade> = Vec::new();

    for i in 0..series.len() {
        if let Some(direction) = Direction::from_signal(signal_at(signal[i])) {
            if strategy.single_trade_per_direction
                && open.iter().any(|t| t.direction == direction)
            {
                tracing::debug!(bar = i, %direction, "signal ignored, trade already open");
            } else {
                let entry_price =
                    apply_entry_costs(quotes.entry_price(i, direction), direction, account, instrument);
                let bar_atr = atr.get(i).copied().unwrap_or(f64::NAN);
                let stop_price = resolve_stop(
                    &strategy.stop_loss,
                    entry_price,
                    direction,
                    bar_atr,
                    account,
                    instrument,
                );
                let target_price = resolve_target(
                    &strategy.take_profit,
                    entry_price,
                    direction,
                    bar_atr,
                    account,
                    instrument,
                );
                tracing::debug!(
                    bar = i,
                    %direction,
                    entry_price,
                    stop_price,
                    target_price,
                    "trade opened"
                );
                open.push(OpenTrade {
                    entry_index: i,
                    entry_time: time[i],
                    direction,
                    entry_price,
                    stop_price,
                    target_price,
                });
            }
        }

        let mut still_open = Vec::with_capacity(open.len());
        for trade in open.drain(..) {
            if trade.entry_index >= i {
                still_open.push(trade);
                continue;
            }

            let (high, low) = quotes.range(i, trade.direction);
            let mut reason = None;
            if trade.stop_hit(high, low) {
                reason = Some(ExitReason::StopLoss);
            }
            if trade.target_hit(high, low) {
                reason = Some(ExitReason::TakeProfit);
            }

            match reason {
                Some(reason) => {
                    let exit_price = match reason {
                        ExitReason::StopLoss => trade.stop_price,
                        ExitReason::TakeProfit => trade.target_price,
                    };
                    let pnl = trade_pnl(
                        trade.entry_price,
                        exit_price,
                        trade.direction,
                        account,
                        instrument,
                    );
                    balance += pnl;
                    tracing::debug!(bar = i, %reason, exit_price, pnl, balance, "trade closed");
                    trades.push(trade.close(time[i], reason, pnl, balance));
                }
                None => still_open.push(trade),
            }
        }
        open = still_open;
    }

    tracing::info!(
        timeframe = series.timeframe(),
        closed = trades.len(),
        open = open.len(),
        final_balance = balance,
        "simulation finished"
    );

    Ok(SimulationResult {
        trades,
        open_trades: open,
        final_balance: balance,
    })
}
