//! Built-in indicator library.
//!
//! Dispatches an [`IndicatorSpec`] to the calculators in
//! `domain::indicator`. Parameter names follow the usual TA-Lib keys:
//! `timeperiod`, `fastperiod`, `slowperiod`, `signalperiod`, `nbdev`,
//! `nbdevup` and `nbdevdn`.

use crate::domain::error::TraderError;
use crate::domain::indicator::atr::calculate_atr;
use crate::domain::indicator::bollinger::{self, calculate_bollinger};
use crate::domain::indicator::ema::calculate_ema;
use crate::domain::indicator::macd::{self, calculate_macd};
use crate::domain::indicator::obv::calculate_obv;
use crate::domain::indicator::roc::calculate_roc;
use crate::domain::indicator::rsi::calculate_rsi;
use crate::domain::indicator::sma::calculate_sma;
use crate::domain::indicator::stddev::calculate_stddev;
use crate::domain::indicator::wma::calculate_wma;
use crate::domain::indicator::{IndicatorKind, IndicatorOutputs, IndicatorSpec};
use crate::domain::series::PriceSeries;
use crate::ports::indicator_port::IndicatorPort;

pub struct BuiltinIndicators;

impl BuiltinIndicators {
    fn kind(spec: &IndicatorSpec) -> Result<IndicatorKind, TraderError> {
        spec.function
            .parse()
            .map_err(|_| TraderError::UnknownIndicator {
                name: spec.name.clone(),
                function: spec.function.clone(),
            })
    }
}

fn single(kind: IndicatorKind, values: Vec<f64>) -> IndicatorOutputs {
    vec![(kind.outputs()[0].to_string(), values)]
}

impl IndicatorPort for BuiltinIndicators {
    fn supports(&self, function: &str) -> bool {
        function.parse::<IndicatorKind>().is_ok()
    }

    fn compute(
        &self,
        series: &PriceSeries,
        spec: &IndicatorSpec,
    ) -> Result<IndicatorOutputs, TraderError> {
        let kind = Self::kind(spec)?;
        let defaults = kind.default_inputs();
        let input = |i: usize| series.column(spec.input(i, defaults[i]));

        let outputs = match kind {
            IndicatorKind::Sma => single(kind, calculate_sma(input(0)?, spec.period("timeperiod", 30)?)),
            IndicatorKind::Ema => single(kind, calculate_ema(input(0)?, spec.period("timeperiod", 30)?)),
            IndicatorKind::Wma => single(kind, calculate_wma(input(0)?, spec.period("timeperiod", 30)?)),
            IndicatorKind::Rsi => single(kind, calculate_rsi(input(0)?, spec.period("timeperiod", 14)?)),
            IndicatorKind::Roc => single(kind, calculate_roc(input(0)?, spec.period("timeperiod", 10)?)),
            IndicatorKind::Atr => single(
                kind,
                calculate_atr(input(0)?, input(1)?, input(2)?, spec.period("timeperiod", 14)?),
            ),
            IndicatorKind::Stddev => {
                let scale = spec.param("nbdev", 1.0);
                let values = calculate_stddev(input(0)?, spec.period("timeperiod", 5)?)
                    .into_iter()
                    .map(|v| v * scale)
                    .collect();
                single(kind, values)
            }
            IndicatorKind::Obv => single(kind, calculate_obv(input(0)?, input(1)?)),
            IndicatorKind::Bbands => {
                let bands = calculate_bollinger(
                    input(0)?,
                    spec.period("timeperiod", bollinger::DEFAULT_PERIOD)?,
                    spec.param("nbdevup", bollinger::DEFAULT_DEVIATIONS),
                    spec.param("nbdevdn", bollinger::DEFAULT_DEVIATIONS),
                );
                vec![
                    ("upper".to_string(), bands.upper),
                    ("middle".to_string(), bands.middle),
                    ("lower".to_string(), bands.lower),
                ]
            }
            IndicatorKind::Macd => {
                let fast = spec.period("fastperiod", macd::DEFAULT_FAST)?;
                let slow = spec.period("slowperiod", macd::DEFAULT_SLOW)?;
                if fast >= slow {
                    return Err(TraderError::invalid(
                        &spec.section(),
                        "fastperiod",
                        format!("fastperiod ({fast}) must be below slowperiod ({slow})"),
                    ));
                }
                let result = calculate_macd(
                    input(0)?,
                    fast,
                    slow,
                    spec.period("signalperiod", macd::DEFAULT_SIGNAL)?,
                );
                vec![
                    ("macd".to_string(), result.line),
                    ("signal".to_string(), result.signal),
                    ("hist".to_string(), result.histogram),
                ]
            }
        };
        Ok(outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::apply_indicators;
    use crate::domain::series::{MarketData, CLOSE, HIGH, LOW};
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn series(closes: &[f64]) -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let time = (0..closes.len())
            .map(|i| start + chrono::Duration::hours(i as i64))
            .collect();
        PriceSeries::new("H1", time)
            .with_column(HIGH, closes.iter().map(|c| c + 1.0).collect())
            .unwrap()
            .with_column(LOW, closes.iter().map(|c| c - 1.0).collect())
            .unwrap()
            .with_column(CLOSE, closes.to_vec())
            .unwrap()
    }

    #[test]
    fn supports_is_case_insensitive() {
        assert!(BuiltinIndicators.supports("sma"));
        assert!(BuiltinIndicators.supports("BBANDS"));
        assert!(!BuiltinIndicators.supports("KAMA"));
    }

    #[test]
    fn sma_uses_timeperiod() {
        let spec = IndicatorSpec::new("sma_3", "SMA", "H1").with_param("timeperiod", 3.0);
        let outputs = BuiltinIndicators
            .compute(&series(&[1.0, 2.0, 3.0, 4.0]), &spec)
            .unwrap();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].0, "sma");
        assert!(outputs[0].1[1].is_nan());
        assert_relative_eq!(outputs[0].1[3], 3.0);
    }

    #[test]
    fn bbands_has_three_outputs() {
        let spec = IndicatorSpec::new("bb", "BBANDS", "H1").with_param("timeperiod", 2.0);
        let outputs = BuiltinIndicators
            .compute(&series(&[1.0, 3.0, 5.0]), &spec)
            .unwrap();
        let names: Vec<&str> = outputs.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["upper", "middle", "lower"]);
        assert_relative_eq!(outputs[1].1[2], 4.0);
        assert_relative_eq!(outputs[0].1[2], 6.0);
        assert_relative_eq!(outputs[2].1[2], 2.0);
    }

    #[test]
    fn atr_reads_high_low_close() {
        let spec = IndicatorSpec::new("atr", "ATR", "H1").with_param("timeperiod", 2.0);
        let outputs = BuiltinIndicators
            .compute(&series(&[10.0, 10.0, 10.0, 10.0]), &spec)
            .unwrap();
        assert_relative_eq!(outputs[0].1[3], 2.0);
    }

    #[test]
    fn missing_input_column_fails() {
        let spec = IndicatorSpec::new("obv", "OBV", "H1");
        let err = BuiltinIndicators
            .compute(&series(&[1.0, 2.0]), &spec)
            .unwrap_err();
        assert!(matches!(err, TraderError::MissingColumn { column, .. } if column == "volume"));
    }

    #[test]
    fn macd_rejects_inverted_periods() {
        let spec = IndicatorSpec::new("m", "MACD", "H1")
            .with_param("fastperiod", 26.0)
            .with_param("slowperiod", 12.0);
        let err = BuiltinIndicators
            .compute(&series(&[1.0; 40]), &spec)
            .unwrap_err();
        assert!(matches!(err, TraderError::ConfigInvalid { key, .. } if key == "fastperiod"));
    }

    #[test]
    fn apply_writes_prefixed_columns() {
        let mut data = MarketData::new().with_series(series(&[1.0, 2.0, 3.0, 4.0, 5.0]));
        let specs = vec![
            IndicatorSpec::new("fast", "ema", "H1").with_param("timeperiod", 2.0),
            IndicatorSpec::new("bb", "bbands", "H1").with_param("timeperiod", 3.0),
        ];
        apply_indicators(&mut data, &BuiltinIndicators, &specs).unwrap();

        let h1 = data.get("H1").unwrap();
        assert!(h1.has_column("fast"));
        assert!(h1.has_column("bb_upper"));
        assert!(h1.has_column("bb_middle"));
        assert!(h1.has_column("bb_lower"));
        assert_relative_eq!(h1.column("bb_middle").unwrap()[4], 4.0);
    }
}
