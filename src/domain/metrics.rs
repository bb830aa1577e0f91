//! Performance metrics derived from a closed-trade log.
//!
//! All statistics are computed from the log alone, ordered by exit time.
//! Degenerate inputs (no losses, a single day, zero risk) yield sentinel
//! values instead of errors: 0, or +∞ for an unbeaten profit factor.

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::domain::position::{Direction, TradeRecord};
use crate::domain::session::{SessionDefinition, SessionRegistry};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TradeStats {
    pub total_trades: usize,
    pub buy_trades: usize,
    pub sell_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: f64,
    pub loss_rate: f64,
    pub max_consecutive_wins: usize,
    pub max_consecutive_losses: usize,
    pub average_duration_minutes: f64,
    pub trades_per_month: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PnlMetrics {
    pub gross_profit: f64,
    /// Sum of losing trades, zero or negative.
    pub gross_loss: f64,
    pub net_profit: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub average_win: f64,
    /// Mean of losing trades, zero or negative.
    pub average_loss: f64,
    pub profit_factor: f64,
    pub expected_value: f64,
    pub expectancy: f64,
    pub starting_balance: f64,
    pub return_on_account: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RiskMetrics {
    /// Largest fall from a running balance peak, as a positive amount.
    pub max_drawdown: f64,
    pub max_drawdown_pct: f64,
    /// Longest run of consecutive trades closing below the running peak.
    pub drawdown_duration_trades: usize,
    pub risk_of_ruin: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PerformanceMetrics {
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub risk_reward_avg: f64,
    pub risk_reward_weighted: f64,
    pub trade_efficiency: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionBucket {
    pub total_trades: usize,
    pub net_profit: f64,
    pub win_rate: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsReport {
    pub trade_stats: TradeStats,
    pub pnl: PnlMetrics,
    pub risk: RiskMetrics,
    pub performance: PerformanceMetrics,
    /// Trades bucketed by the intraday session their entry falls in.
    pub sessions: BTreeMap<String, SessionBucket>,
    /// Balance after each trade, in exit order.
    pub equity_curve: Vec<f64>,
}

impl MetricsReport {
    pub fn compute(trades: &[TradeRecord], registry: &SessionRegistry) -> Self {
        if trades.is_empty() {
            return MetricsReport::default();
        }

        let mut ordered: Vec<&TradeRecord> = trades.iter().collect();
        ordered.sort_by_key(|t| t.exit_time);

        let trade_stats = compute_trade_stats(&ordered);
        let pnl = compute_pnl(&ordered, &trade_stats);
        let risk = compute_risk(&ordered, &pnl);
        let performance = compute_performance(&ordered);
        let sessions = compute_sessions(&ordered, registry);
        let equity_curve = ordered.iter().map(|t| t.balance).collect();

        MetricsReport {
            trade_stats,
            pnl,
            risk,
            performance,
            sessions,
            equity_curve,
        }
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Sample standard deviation; `None` with fewer than two values.
fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values);
    let variance =
        values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(variance.sqrt())
}

fn max_streak(trades: &[&TradeRecord], predicate: impl Fn(&TradeRecord) -> bool) -> usize {
    let mut best = 0;
    let mut current = 0;
    for trade in trades {
        if predicate(*trade) {
            current += 1;
            best = best.max(current);
        } else {
            current = 0;
        }
    }
    best
}

fn compute_trade_stats(trades: &[&TradeRecord]) -> TradeStats {
    let total = trades.len();
    let winning = trades.iter().filter(|t| t.is_win()).count();
    let losing = trades.iter().filter(|t| t.is_loss()).count();

    let durations: Vec<f64> = trades.iter().map(|t| t.duration_minutes()).collect();
    let months: BTreeSet<(i32, u32)> = trades
        .iter()
        .map(|t| (t.exit_time.year(), t.exit_time.month()))
        .collect();

    TradeStats {
        total_trades: total,
        buy_trades: trades
            .iter()
            .filter(|t| t.direction == Direction::Long)
            .count(),
        sell_trades: trades
            .iter()
            .filter(|t| t.direction == Direction::Short)
            .count(),
        winning_trades: winning,
        losing_trades: losing,
        win_rate: ratio(winning, total),
        loss_rate: ratio(losing, total),
        max_consecutive_wins: max_streak(trades, TradeRecord::is_win),
        max_consecutive_losses: max_streak(trades, TradeRecord::is_loss),
        average_duration_minutes: mean(&durations),
        trades_per_month: ratio(total, months.len()),
    }
}

fn compute_pnl(trades: &[&TradeRecord], stats: &TradeStats) -> PnlMetrics {
    let wins: Vec<f64> = trades.iter().filter(|t| t.is_win()).map(|t| t.pnl).collect();
    let losses: Vec<f64> = trades.iter().filter(|t| t.is_loss()).map(|t| t.pnl).collect();

    let gross_profit: f64 = wins.iter().sum();
    let gross_loss: f64 = losses.iter().sum();
    let net_profit: f64 = trades.iter().map(|t| t.pnl).sum();

    let largest_win = trades.iter().map(|t| t.pnl).fold(f64::NEG_INFINITY, f64::max);
    let largest_loss = trades.iter().map(|t| t.pnl).fold(f64::INFINITY, f64::min);

    let average_win = mean(&wins);
    let average_loss = mean(&losses);

    let profit_factor = if gross_loss != 0.0 {
        gross_profit / gross_loss.abs()
    } else {
        tracing::debug!("no losing trades, profit factor is infinite");
        f64::INFINITY
    };

    let expected_value = average_win * stats.win_rate + average_loss * stats.loss_rate;
    let expectancy = average_win * stats.win_rate - average_loss.abs() * stats.loss_rate;

    let starting_balance = trades
        .first()
        .map(|t| t.balance - t.pnl)
        .unwrap_or_default();
    let return_on_account = if starting_balance != 0.0 {
        net_profit / starting_balance
    } else {
        tracing::debug!("starting balance is zero, return on account set to 0");
        0.0
    };

    PnlMetrics {
        gross_profit,
        gross_loss,
        net_profit,
        largest_win,
        largest_loss,
        average_win,
        average_loss,
        profit_factor,
        expected_value,
        expectancy,
        starting_balance,
        return_on_account,
    }
}

fn compute_risk(trades: &[&TradeRecord], pnl: &PnlMetrics) -> RiskMetrics {
    let mut peak = f64::NEG_INFINITY;
    let mut max_drawdown = 0.0_f64;
    let mut max_drawdown_pct = 0.0_f64;
    let mut longest = 0usize;
    let mut current = 0usize;

    for trade in trades {
        peak = peak.max(trade.balance);
        let drawdown = trade.balance - peak;
        let drawdown_pct = if peak > 0.0 {
            drawdown / peak * 100.0
        } else {
            0.0
        };
        max_drawdown = max_drawdown.max(-drawdown);
        max_drawdown_pct = max_drawdown_pct.max(-drawdown_pct);

        if drawdown < 0.0 {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }

    let avg_loss = pnl.average_loss.abs();
    let risk_of_ruin = if avg_loss != 0.0 {
        (-2.0 * pnl.expected_value * pnl.starting_balance / avg_loss.powi(2)).exp()
    } else {
        tracing::debug!("no losing trades, risk of ruin set to 0");
        0.0
    };

    RiskMetrics {
        max_drawdown,
        max_drawdown_pct,
        drawdown_duration_trades: longest,
        risk_of_ruin,
    }
}

fn compute_performance(trades: &[&TradeRecord]) -> PerformanceMetrics {
    let mut daily: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for trade in trades {
        *daily.entry(trade.exit_time.date()).or_default() += trade.pnl;
    }
    let daily: Vec<f64> = daily.into_values().collect();
    let daily_mean = mean(&daily);

    let sharpe_ratio = match sample_std(&daily) {
        Some(std) if std != 0.0 => daily_mean / std,
        _ => {
            tracing::debug!(days = daily.len(), "sharpe ratio undefined, set to 0");
            0.0
        }
    };

    let downside: Vec<f64> = daily.iter().copied().filter(|v| *v < 0.0).collect();
    let sortino_ratio = match sample_std(&downside) {
        Some(std) if std != 0.0 => daily_mean / std,
        _ => {
            tracing::debug!(
                negative_days = downside.len(),
                "sortino ratio undefined, set to 0"
            );
            0.0
        }
    };

    let rr: Vec<f64> = trades
        .iter()
        .map(|t| {
            let risk = (t.entry_price - t.stop_price).abs();
            let reward = (t.target_price - t.entry_price).abs();
            if risk == 0.0 { 0.0 } else { reward / risk }
        })
        .collect();
    let abs_pnl_total: f64 = trades.iter().map(|t| t.pnl.abs()).sum();
    let risk_reward_weighted = if abs_pnl_total == 0.0 {
        0.0
    } else {
        rr.iter()
            .zip(trades)
            .map(|(r, t)| r * t.pnl.abs())
            .sum::<f64>()
            / abs_pnl_total
    };

    let efficiency: Vec<f64> = trades
        .iter()
        .map(|t| {
            let price_move = (t.exit_price - t.entry_price).abs();
            if price_move == 0.0 { 0.0 } else { t.pnl / price_move }
        })
        .collect();

    PerformanceMetrics {
        sharpe_ratio,
        sortino_ratio,
        risk_reward_avg: mean(&rr),
        risk_reward_weighted,
        trade_efficiency: mean(&efficiency),
    }
}

fn compute_sessions(
    trades: &[&TradeRecord],
    registry: &SessionRegistry,
) -> BTreeMap<String, SessionBucket> {
    registry
        .iter()
        .filter(|(_, def)| matches!(def, SessionDefinition::Intraday { .. }))
        .map(|(name, def)| {
            let in_session: Vec<&&TradeRecord> = trades
                .iter()
                .filter(|t| def.contains_time(t.entry_time.time()))
                .collect();
            let wins = in_session.iter().filter(|t| t.is_win()).count();
            let bucket = SessionBucket {
                total_trades: in_session.len(),
                net_profit: in_session.iter().map(|t| t.pnl).sum(),
                win_rate: ratio(wins, in_session.len()),
            };
            (name.to_string(), bucket)
        })
        .collect()
}
