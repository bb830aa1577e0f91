//! Open trades and completed trade records.

use chrono::NaiveDateTime;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// +1 for long, -1 for short.
    pub fn sign(&self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        }
    }

    pub fn from_signal(signal: i8) -> Option<Self> {
        match signal {
            1 => Some(Direction::Long),
            -1 => Some(Direction::Short),
            _ => None,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Long => write!(f, "long"),
            Direction::Short => write!(f, "short"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitReason {
    #[serde(rename = "SL")]
    StopLoss,
    #[serde(rename = "TP")]
    TakeProfit,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::StopLoss => write!(f, "SL"),
            ExitReason::TakeProfit => write!(f, "TP"),
        }
    }
}

/// A position waiting for its stop or target.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenTrade {
    pub entry_index: usize,
    pub entry_time: NaiveDateTime,
    pub direction: Direction,
    pub entry_price: f64,
    pub stop_price: f64,
    pub target_price: f64,
}

impl OpenTrade {
    /// Stop hit given the bar's effective low/high.
    pub fn stop_hit(&self, high: f64, low: f64) -> bool {
        match self.direction {
            Direction::Long => low <= self.stop_price,
            Direction::Short => high >= self.stop_price,
        }
    }

    pub fn target_hit(&self, high: f64, low: f64) -> bool {
        match self.direction {
            Direction::Long => high >= self.target_price,
            Direction::Short => low <= self.target_price,
        }
    }

    /// Consume the open trade into its final record.
    pub fn close(
        self,
        exit_time: NaiveDateTime,
        reason: ExitReason,
        pnl: f64,
        balance: f64,
    ) -> TradeRecord {
        let exit_price = match reason {
            ExitReason::StopLoss => self.stop_price,
            ExitReason::TakeProfit => self.target_price,
        };
        TradeRecord {
            entry_time: self.entry_time,
            direction: self.direction,
            entry_price: self.entry_price,
            stop_price: self.stop_price,
            target_price: self.target_price,
            exit_time,
            exit_price,
            pnl,
            balance,
            exit_reason: reason,
        }
    }
}

/// A completed trade. `balance` is the running account balance after this
/// trade's PnL was applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeRecord {
    pub entry_time: NaiveDateTime,
    pub direction: Direction,
    pub entry_price: f64,
    pub stop_price: f64,
    pub target_price: f64,
    pub exit_time: NaiveDateTime,
    pub exit_price: f64,
    pub pnl: f64,
    pub balance: f64,
    pub exit_reason: ExitReason,
}

impl TradeRecord {
    pub fn is_win(&self) -> bool {
        self.pnl > 0.0
    }

    pub fn is_loss(&self) -> bool {
        self.pnl < 0.0
    }

    pub fn duration_minutes(&self) -> f64 {
        (self.exit_time - self.entry_time).num_seconds() as f64 / 60.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 4)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn open_long() -> OpenTrade {
        OpenTrade {
            entry_index: 0,
            entry_time: ts(8),
            direction: Direction::Long,
            entry_price: 100.0,
            stop_price: 98.0,
            target_price: 103.0,
        }
    }

    #[test]
    fn long_exit_checks() {
        let t = open_long();
        assert!(t.stop_hit(101.0, 98.0));
        assert!(!t.stop_hit(101.0, 98.5));
        assert!(t.target_hit(103.0, 99.0));
        assert!(!t.target_hit(102.9, 99.0));
    }

    #[test]
    fn short_exit_checks() {
        let t = OpenTrade {
            direction: Direction::Short,
            stop_price: 102.0,
            target_price: 97.0,
            ..open_long()
        };
        assert!(t.stop_hit(102.0, 99.0));
        assert!(t.target_hit(101.0, 97.0));
        assert!(!t.target_hit(101.0, 97.5));
    }

    #[test]
    fn close_takes_price_from_reason() {
        let record = open_long().close(ts(10), ExitReason::TakeProfit, 3.0, 10_003.0);
        assert_eq!(record.exit_price, 103.0);
        assert_eq!(record.exit_reason, ExitReason::TakeProfit);
        assert!(record.is_win());
        assert_eq!(record.duration_minutes(), 120.0);

        let record = open_long().close(ts(9), ExitReason::StopLoss, -2.0, 9_998.0);
        assert_eq!(record.exit_price, 98.0);
        assert!(record.is_loss());
    }

    #[test]
    fn signal_to_direction() {
        assert_eq!(Direction::from_signal(1), Some(Direction::Long));
        assert_eq!(Direction::from_signal(-1), Some(Direction::Short));
        assert_eq!(Direction::from_signal(0), None);
        assert_eq!(Direction::Short.sign(), -1.0);
    }

    #[test]
    fn exit_reason_serializes_short_codes() {
        assert_eq!(serde_json::to_string(&ExitReason::StopLoss).unwrap(), "\"SL\"");
        assert_eq!(ExitReason::TakeProfit.to_string(), "TP");
    }
}
