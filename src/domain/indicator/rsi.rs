//! Relative Strength Index with Wilder's smoothing.
//!
//! - First average: simple mean of the first n gains/losses
//! - Subsequent: avg = (prev_avg * (n-1) + current) / n
//!
//! RSI = 100 - (100 / (1 + avg_gain / avg_loss)); 100 when avg_loss == 0.
//! Warmup: first n values are missing.

fn rsi_from(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - (100.0 / (1.0 + avg_gain / avg_loss))
    }
}

pub fn calculate_rsi(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if period == 0 || values.len() <= period {
        return out;
    }

    let changes: Vec<f64> = values.windows(2).map(|w| w[1] - w[0]).collect();
    let gain = |c: f64| if c > 0.0 { c } else { 0.0 };
    let loss = |c: f64| if c < 0.0 { -c } else { 0.0 };

    let mut avg_gain = changes[..period].iter().map(|c| gain(*c)).sum::<f64>() / period as f64;
    let mut avg_loss = changes[..period].iter().map(|c| loss(*c)).sum::<f64>() / period as f64;
    out[period] = rsi_from(avg_gain, avg_loss);

    for i in (period + 1)..values.len() {
        let change = changes[i - 1];
        avg_gain = (avg_gain * (period - 1) as f64 + gain(change)) / period as f64;
        avg_loss = (avg_loss * (period - 1) as f64 + loss(change)) / period as f64;
        out[i] = rsi_from(avg_gain, avg_loss);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn rsi_warmup_period() {
        let prices: Vec<f64> = (0..20).map(|i| 100.0 + (i % 5) as f64 * 2.0).collect();
        let out = calculate_rsi(&prices, 14);
        assert!(out[..14].iter().all(|v| v.is_nan()));
        assert!(out[14..].iter().all(|v| v.is_finite()));
    }

    #[test]
    fn rsi_all_gains_is_100() {
        let prices: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let out = calculate_rsi(&prices, 3);
        assert_relative_eq!(out[3], 100.0);
        assert_relative_eq!(out[9], 100.0);
    }

    #[test]
    fn rsi_all_losses_is_0() {
        let prices: Vec<f64> = (0..10).map(|i| 50.0 - i as f64).collect();
        let out = calculate_rsi(&prices, 3);
        assert_relative_eq!(out[5], 0.0);
    }

    #[test]
    fn rsi_known_seed() {
        let out = calculate_rsi(&[10.0, 11.0, 10.5, 11.5], 3);
        let avg_gain = (1.0 + 0.0 + 1.0) / 3.0;
        let avg_loss = 0.5 / 3.0;
        assert_relative_eq!(out[3], 100.0 - 100.0 / (1.0 + avg_gain / avg_loss));
    }

    #[test]
    fn rsi_short_input() {
        assert!(calculate_rsi(&[1.0], 14).iter().all(|v| v.is_nan()));
    }
}
