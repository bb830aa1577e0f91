//! Average True Range with Wilder's smoothing.
//!
//! Seed: mean of the first n true ranges, then ATR[i] = (ATR[i-1]*(n-1) + TR[i]) / n.
//! Warmup: first (n-1) values are missing.

use crate::domain::series::true_range;

pub fn calculate_atr(high: &[f64], low: &[f64], close: &[f64], period: usize) -> Vec<f64> {
    let n = high.len().min(low.len()).min(close.len());
    let mut out = vec![f64::NAN; n];
    if period == 0 || n < period {
        return out;
    }

    let tr: Vec<f64> = (0..n)
        .map(|i| {
            let prev_close = if i > 0 { Some(close[i - 1]) } else { None };
            true_range(high[i], low[i], prev_close)
        })
        .collect();

    let mut atr = tr[..period].iter().sum::<f64>() / period as f64;
    out[period - 1] = atr;
    for i in period..n {
        atr = (atr * (period - 1) as f64 + tr[i]) / period as f64;
        out[i] = atr;
    }
    out
}
