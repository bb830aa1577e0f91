//! Session aggregation: named reference windows aligned to a base timeframe.
//!
//! Two kinds of session exist:
//! - higher-timeframe sessions reuse another timeframe's OHLC, shifted back by
//!   `shift` rows before being forward-filled onto the base bars;
//! - intraday sessions aggregate the base bars that fall inside a daily
//!   `[start, end)` window.
//!
//! A base bar only ever sees a session occurrence that has closed at or before
//! its own timestamp.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::domain::error::TraderError;
use crate::domain::series::{forward_fill_mapping, MarketData, PriceSeries, CLOSE, HIGH, LOW, OHLC, OPEN};

#[derive(Debug, Clone, PartialEq)]
pub enum SessionDefinition {
    HigherTimeframe { timeframe: String, shift: usize },
    Intraday { start: NaiveTime, end: NaiveTime },
}

impl SessionDefinition {
    pub fn higher_timeframe(timeframe: impl Into<String>, shift: usize) -> Self {
        SessionDefinition::HigherTimeframe {
            timeframe: timeframe.into(),
            shift,
        }
    }

    /// Build an intraday window from `HH:MM` strings. The window must not wrap
    /// past midnight.
    pub fn intraday(start: &str, end: &str) -> Result<Self, TraderError> {
        let start_time = parse_clock(start, "start")?;
        let end_time = parse_clock(end, "end")?;
        if start_time >= end_time {
            return Err(TraderError::invalid(
                "session",
                "end",
                format!("window {start}-{end} must end after it starts"),
            ));
        }
        Ok(SessionDefinition::Intraday {
            start: start_time,
            end: end_time,
        })
    }

    /// Whether a time of day falls in an intraday window. Always false for
    /// higher-timeframe sessions.
    pub fn contains_time(&self, time: NaiveTime) -> bool {
        match self {
            SessionDefinition::Intraday { start, end } => time >= *start && time < *end,
            SessionDefinition::HigherTimeframe { .. } => false,
        }
    }
}

fn parse_clock(value: &str, key: &str) -> Result<NaiveTime, TraderError> {
    let trimmed = value.trim();
    NaiveTime::parse_from_str(trimmed, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M:%S"))
        .map_err(|_| {
            TraderError::invalid("session", key, format!("invalid time '{value}', expected HH:MM"))
        })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SessionField {
    Open,
    High,
    Low,
    Close,
}

impl SessionField {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionField::Open => OPEN,
            SessionField::High => HIGH,
            SessionField::Low => LOW,
            SessionField::Close => CLOSE,
        }
    }
}

impl fmt::Display for SessionField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(SessionField::Open),
            "high" => Ok(SessionField::High),
            "low" => Ok(SessionField::Low),
            "close" => Ok(SessionField::Close),
            other => Err(format!(
                "expected session field (open, high, low, close), found '{other}'"
            )),
        }
    }
}

/// Named session definitions. Passed explicitly to the aggregator, the rule
/// engine and the metrics engine.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionRegistry {
    sessions: BTreeMap<String, SessionDefinition>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// prev_day, last_week, london, ny and asia.
    pub fn standard() -> Self {
        let hm = |h: u32| NaiveTime::from_hms_opt(h, 0, 0).unwrap_or(NaiveTime::MIN);
        SessionRegistry::new()
            .with("prev_day", SessionDefinition::higher_timeframe("D1", 1))
            .with("last_week", SessionDefinition::higher_timeframe("W1", 1))
            .with(
                "london",
                SessionDefinition::Intraday {
                    start: hm(8),
                    end: hm(17),
                },
            )
            .with(
                "ny",
                SessionDefinition::Intraday {
                    start: hm(13),
                    end: hm(22),
                },
            )
            .with(
                "asia",
                SessionDefinition::Intraday {
                    start: hm(0),
                    end: hm(8),
                },
            )
    }

    pub fn with(mut self, name: &str, definition: SessionDefinition) -> Self {
        self.insert(name, definition);
        self
    }

    pub fn insert(&mut self, name: &str, definition: SessionDefinition) {
        self.sessions.insert(name.to_string(), definition);
    }

    pub fn get(&self, name: &str) -> Result<&SessionDefinition, TraderError> {
        self.sessions
            .get(name)
            .ok_or_else(|| TraderError::UnknownSession {
                name: name.to_string(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sessions.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SessionDefinition)> {
        self.sessions.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Registry restricted to `names`; unknown names are an error.
    pub fn subset<'a, I>(&self, names: I) -> Result<SessionRegistry, TraderError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut out = SessionRegistry::new();
        for name in names {
            out.insert(name, self.get(name)?.clone());
        }
        Ok(out)
    }
}

/// Session OHLC aligned one-to-one with the base timeframe's bars.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionLevels {
    time: Vec<NaiveDateTime>,
    open: Vec<f64>,
    high: Vec<f64>,
    low: Vec<f64>,
    close: Vec<f64>,
}

impl SessionLevels {
    fn with_capacity(time: &[NaiveDateTime]) -> Self {
        let n = time.len();
        SessionLevels {
            time: time.to_vec(),
            open: Vec::with_capacity(n),
            high: Vec::with_capacity(n),
            low: Vec::with_capacity(n),
            close: Vec::with_capacity(n),
        }
    }

    fn push(&mut self, ohlc: [f64; 4]) {
        self.open.push(ohlc[0]);
        self.high.push(ohlc[1]);
        self.low.push(ohlc[2]);
        self.close.push(ohlc[3]);
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    pub fn time(&self) -> &[NaiveDateTime] {
        &self.time
    }

    pub fn field(&self, field: SessionField) -> &[f64] {
        match field {
            SessionField::Open => &self.open,
            SessionField::High => &self.high,
            SessionField::Low => &self.low,
            SessionField::Close => &self.close,
        }
    }

    /// Most recent value at or before `at`, or `None` when nothing has closed
    /// yet or the occurrence had no bars.
    pub fn value_at(&self, field: SessionField, at: NaiveDateTime) -> Option<f64> {
        let idx = self.time.partition_point(|t| *t <= at);
        if idx == 0 {
            return None;
        }
        let value = self.field(field)[idx - 1];
        (!value.is_nan()).then_some(value)
    }
}

pub fn compute_session_levels(
    data: &MarketData,
    registry: &SessionRegistry,
    base_timeframe: &str,
) -> Result<BTreeMap<String, SessionLevels>, TraderError> {
    let base = data.get(base_timeframe)?;
    let mut levels = BTreeMap::new();

    for (name, definition) in registry.iter() {
        let table = match definition {
            SessionDefinition::HigherTimeframe { timeframe, shift } => {
                higher_timeframe_levels(data.get(timeframe)?, *shift, base.time())?
            }
            SessionDefinition::Intraday { start, end } => intraday_levels(base, *start, *end)?,
        };
        tracing::debug!(session = name, rows = table.len(), "session levels computed");
        levels.insert(name.to_string(), table);
    }

    Ok(levels)
}

fn higher_timeframe_levels(
    source: &PriceSeries,
    shift: usize,
    base_time: &[NaiveDateTime],
) -> Result<SessionLevels, TraderError> {
    source.require_columns(&OHLC)?;

    let shifted: Vec<Vec<f64>> = OHLC
        .iter()
        .map(|col| source.column(col).map(|values| shift_back(values, shift)))
        .collect::<Result<_, _>>()?;

    let mapping = forward_fill_mapping(source.time(), base_time);
    let mut table = SessionLevels::with_capacity(base_time);
    for idx in mapping {
        let row = match idx {
            Some(i) => [shifted[0][i], shifted[1][i], shifted[2][i], shifted[3][i]],
            None => [f64::NAN; 4],
        };
        table.push(row);
    }
    Ok(table)
}

/// Row `i` takes the value of row `i - shift`; the first `shift` rows are missing.
fn shift_back(values: &[f64], shift: usize) -> Vec<f64> {
    (0..values.len())
        .map(|i| if i >= shift { values[i - shift] } else { f64::NAN })
        .collect()
}

struct Occurrence {
    closes_at: NaiveDateTime,
    ohlc: [f64; 4],
}

fn intraday_levels(
    base: &PriceSeries,
    start: NaiveTime,
    end: NaiveTime,
) -> Result<SessionLevels, TraderError> {
    base.require_columns(&OHLC)?;
    let open = base.column(OPEN)?;
    let high = base.column(HIGH)?;
    let low = base.column(LOW)?;
    let close = base.column(CLOSE)?;
    let time = base.time();

    let mut occurrences: Vec<Occurrence> = Vec::new();
    let mut current_date: Option<NaiveDate> = None;
    let mut acc: Option<[f64; 4]> = None;

    for (i, ts) in time.iter().enumerate() {
        let date = ts.date();
        if current_date != Some(date) {
            if let Some(d) = current_date {
                occurrences.push(Occurrence {
                    closes_at: d.and_time(end),
                    ohlc: acc.take().unwrap_or([f64::NAN; 4]),
                });
            }
            current_date = Some(date);
        }

        let tod = ts.time();
        if tod >= start && tod < end {
            acc = Some(match acc {
                None => [open[i], high[i], low[i], close[i]],
                Some([o, h, l, _]) => [o, h.max(high[i]), l.min(low[i]), close[i]],
            });
        }
    }
    if let Some(d) = current_date {
        occurrences.push(Occurrence {
            closes_at: d.and_time(end),
            ohlc: acc.unwrap_or([f64::NAN; 4]),
        });
    }

    let mut table = SessionLevels::with_capacity(time);
    let mut next = 0usize;
    let mut visible = [f64::NAN; 4];
    for ts in time {
        while next < occurrences.len() && occurrences[next].closes_at <= *ts {
            visible = occurrences[next].ohlc;
            next += 1;
        }
        table.push(visible);
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn ohlc_series(tf: &str, time: Vec<NaiveDateTime>, rows: &[[f64; 4]]) -> PriceSeries {
        let col = |k: usize| rows.iter().map(|r| r[k]).collect::<Vec<f64>>();
        PriceSeries::new(tf, time)
            .with_column(OPEN, col(0))
            .unwrap()
            .with_column(HIGH, col(1))
            .unwrap()
            .with_column(LOW, col(2))
            .unwrap()
            .with_column(CLOSE, col(3))
            .unwrap()
    }

    fn hourly_two_days() -> PriceSeries {
        let time: Vec<NaiveDateTime> = (1..=2)
            .flat_map(|d| (0..24).map(move |h| ts(d, h)))
            .collect();
        let rows: Vec<[f64; 4]> = (0..48)
            .map(|i| {
                let base = 100.0 + i as f64;
                [base, base + 0.5, base - 0.5, base + 0.25]
            })
            .collect();
        ohlc_series("H1", time, &rows)
    }

    #[test]
    fn higher_timeframe_shift_one_exposes_previous_period() {
        let daily = ohlc_series(
            "D1",
            vec![ts(1, 0), ts(2, 0)],
            &[[10.0, 20.0, 5.0, 15.0], [16.0, 30.0, 12.0, 25.0]],
        );
        let data = MarketData::new()
            .with_series(hourly_two_days())
            .with_series(daily);
        let registry = SessionRegistry::new().with("prev_day", SessionDefinition::higher_timeframe("D1", 1));

        let levels = compute_session_levels(&data, &registry, "H1").unwrap();
        let prev = &levels["prev_day"];

        for i in 0..24 {
            assert!(prev.field(SessionField::High)[i].is_nan());
        }
        for i in 24..48 {
            assert_eq!(prev.field(SessionField::Open)[i], 10.0);
            assert_eq!(prev.field(SessionField::High)[i], 20.0);
            assert_eq!(prev.field(SessionField::Low)[i], 5.0);
            assert_eq!(prev.field(SessionField::Close)[i], 15.0);
        }
    }

    #[test]
    fn higher_timeframe_shift_zero_uses_current_row() {
        let daily = ohlc_series("D1", vec![ts(1, 0)], &[[1.0, 2.0, 0.5, 1.5]]);
        let data = MarketData::new()
            .with_series(hourly_two_days())
            .with_series(daily);
        let registry = SessionRegistry::new().with("today", SessionDefinition::higher_timeframe("D1", 0));
        let levels = compute_session_levels(&data, &registry, "H1").unwrap();
        assert_eq!(levels["today"].field(SessionField::Close)[3], 1.5);
    }

    #[test]
    fn intraday_visible_only_after_window_closes() {
        let data = MarketData::new().with_series(hourly_two_days());
        let registry = SessionRegistry::new().with("asia", SessionDefinition::intraday("00:00", "08:00").unwrap());
        let levels = compute_session_levels(&data, &registry, "H1").unwrap();
        let asia = &levels["asia"];

        // Day 1 bars before 08:00 have no closed occurrence yet.
        for i in 0..8 {
            assert!(asia.field(SessionField::High)[i].is_nan(), "bar {i}");
        }
        // From 08:00 on day 1 the day-1 window (rows 0..8) is visible.
        assert_eq!(asia.field(SessionField::Open)[8], 100.0);
        assert_eq!(asia.field(SessionField::High)[8], 107.5);
        assert_eq!(asia.field(SessionField::Low)[8], 99.5);
        assert_eq!(asia.field(SessionField::Close)[8], 107.25);
        // Day 2 before 08:00 still sees day 1.
        assert_eq!(asia.field(SessionField::Open)[30], 100.0);
        // Day 2 after the window sees day 2 (rows 24..32).
        assert_eq!(asia.field(SessionField::Open)[32], 124.0);
        assert_eq!(asia.field(SessionField::Close)[32], 131.25);
    }

    #[test]
    fn intraday_empty_window_is_missing_not_zero() {
        let time = vec![ts(1, 1), ts(1, 2), ts(2, 9), ts(2, 10), ts(3, 1)];
        let rows = [[1.0, 2.0, 0.5, 1.5]; 5];
        let data = MarketData::new().with_series(ohlc_series("H1", time, &rows));
        let registry = SessionRegistry::new().with("london", SessionDefinition::intraday("08:00", "17:00").unwrap());
        let levels = compute_session_levels(&data, &registry, "H1").unwrap();
        let london = &levels["london"];

        // Day 1 had no bars in the window: its occurrence is missing.
        assert!(london.field(SessionField::High)[2].is_nan());
        // Day 3 sees day 2's window.
        assert_eq!(london.field(SessionField::High)[4], 2.0);
    }

    #[test]
    fn value_at_returns_most_recent_at_or_before() {
        let data = MarketData::new().with_series(hourly_two_days());
        let registry = SessionRegistry::new().with("asia", SessionDefinition::intraday("00:00", "08:00").unwrap());
        let levels = compute_session_levels(&data, &registry, "H1").unwrap();
        let asia = &levels["asia"];

        assert_eq!(asia.value_at(SessionField::High, ts(1, 3)), None);
        assert_eq!(asia.value_at(SessionField::High, ts(1, 8)), Some(107.5));
        let before_start = NaiveDate::from_ymd_opt(2023, 12, 31)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(asia.value_at(SessionField::High, before_start), None);
    }

    #[test]
    fn unknown_timeframe_fails() {
        let data = MarketData::new().with_series(hourly_two_days());
        let registry = SessionRegistry::new().with("last_week", SessionDefinition::higher_timeframe("W1", 1));
        let err = compute_session_levels(&data, &registry, "H1").unwrap_err();
        assert!(matches!(err, TraderError::DataNotFound { ref timeframe } if timeframe == "W1"));

        let err = compute_session_levels(&data, &SessionRegistry::new(), "M5").unwrap_err();
        assert!(matches!(err, TraderError::DataNotFound { .. }));
    }

    #[test]
    fn base_missing_columns_fails() {
        let base = PriceSeries::new("H1", vec![ts(1, 0)])
            .with_column(CLOSE, vec![1.0])
            .unwrap();
        let data = MarketData::new().with_series(base);
        let registry = SessionRegistry::new().with("asia", SessionDefinition::intraday("00:00", "08:00").unwrap());
        let err = compute_session_levels(&data, &registry, "H1").unwrap_err();
        assert!(matches!(err, TraderError::MissingColumn { ref column, .. } if column == "open"));
    }

    #[test]
    fn intraday_rejects_inverted_window() {
        assert!(SessionDefinition::intraday("17:00", "08:00").is_err());
        assert!(SessionDefinition::intraday("08:00", "08:00").is_err());
        assert!(SessionDefinition::intraday("8am", "09:00").is_err());
    }

    #[test]
    fn standard_registry_contents() {
        let registry = SessionRegistry::standard();
        assert_eq!(registry.len(), 5);
        assert_eq!(
            registry.get("prev_day").unwrap(),
            &SessionDefinition::higher_timeframe("D1", 1)
        );
        let london = registry.get("london").unwrap();
        assert!(london.contains_time(NaiveTime::from_hms_opt(8, 0, 0).unwrap()));
        assert!(!london.contains_time(NaiveTime::from_hms_opt(17, 0, 0).unwrap()));
        assert!(matches!(
            registry.get("tokyo"),
            Err(TraderError::UnknownSession { .. })
        ));
    }

    #[test]
    fn subset_keeps_only_named_sessions() {
        let registry = SessionRegistry::standard();
        let sub = registry.subset(["london", "prev_day"]).unwrap();
        assert_eq!(sub.len(), 2);
        assert!(sub.contains("london"));
        assert!(registry.subset(["nowhere"]).is_err());
    }
}
