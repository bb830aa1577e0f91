//! MACD (Moving Average Convergence Divergence).
//!
//! MACD Line = EMA(fast) - EMA(slow)
//! Signal Line = EMA(signal) of the MACD line, seeded once the line is defined
//! Histogram = MACD Line - Signal Line
//!
//! Warmup: the line is missing for the first (slow - 1) values, the signal
//! and histogram for (slow - 1 + signal - 1).

use super::ema::calculate_ema;

pub const DEFAULT_FAST: usize = 12;
pub const DEFAULT_SLOW: usize = 26;
pub const DEFAULT_SIGNAL: usize = 9;

#[derive(Debug, Clone, PartialEq)]
pub struct Macd {
    pub line: Vec<f64>,
    pub signal: Vec<f64>,
    pub histogram: Vec<f64>,
}

pub fn calculate_macd(values: &[f64], fast: usize, slow: usize, signal_period: usize) -> Macd {
    let ema_fast = calculate_ema(values, fast);
    let ema_slow = calculate_ema(values, slow);
    let line: Vec<f64> = ema_fast.iter().zip(&ema_slow).map(|(f, s)| f - s).collect();

    let mut signal = vec![f64::NAN; values.len()];
    if let Some(first) = line.iter().position(|v| !v.is_nan()) {
        let defined = calculate_ema(&line[first..], signal_period);
        signal[first..].copy_from_slice(&defined);
    }

    let histogram = line.iter().zip(&signal).map(|(l, s)| l - s).collect();

    Macd {
        line,
        signal,
        histogram,
    }
}
