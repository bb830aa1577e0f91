//! Vectorized rule evaluation.
//!
//! A logic tree is evaluated over every bar of the entry timeframe at once.
//! References resolve to one value per entry bar:
//!
//! - columns of the entry timeframe are used as-is, columns of other
//!   timeframes are forward-filled onto the entry timestamps;
//! - session references read the pre-aligned [`SessionLevels`] table;
//! - literals are broadcast.
//!
//! A condition that cannot resolve one of its references is false on every
//! bar and logs a warning. Structural problems in the tree are errors.

use std::collections::BTreeMap;

use crate::domain::error::TraderError;
use crate::domain::rule::{Condition, LogicNode, Reference};
use crate::domain::series::{MarketData, PriceSeries, SIGNAL};
use crate::domain::session::SessionLevels;
use crate::domain::strategy::Strategy;

pub struct EvalContext<'a> {
    data: &'a MarketData,
    sessions: &'a BTreeMap<String, SessionLevels>,
    entry: &'a PriceSeries,
}

impl<'a> EvalContext<'a> {
    pub fn new(
        data: &'a MarketData,
        sessions: &'a BTreeMap<String, SessionLevels>,
        entry_timeframe: &str,
    ) -> Result<Self, TraderError> {
        let entry = data.get(entry_timeframe)?;
        Ok(EvalContext {
            data,
            sessions,
            entry,
        })
    }

    pub fn len(&self) -> usize {
        self.entry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entry.is_empty()
    }

    pub fn entry_timeframe(&self) -> &str {
        self.entry.timeframe()
    }
}

fn unresolved(reference: &Reference, reason: impl Into<String>) -> TraderError {
    TraderError::ReferenceResolution {
        reference: reference.to_string(),
        reason: reason.into(),
    }
}

pub fn resolve_reference(
    ctx: &EvalContext<'_>,
    reference: &Reference,
) -> Result<Vec<f64>, TraderError> {
    match reference {
        Reference::Literal(value) => Ok(vec![*value; ctx.len()]),
        Reference::Column { timeframe, column } => {
            let tf = timeframe.as_deref().unwrap_or(ctx.entry_timeframe());
            let series = ctx
                .data
                .get(tf)
                .map_err(|_| unresolved(reference, format!("no data for timeframe {tf}")))?;
            if !series.has_column(column) {
                return Err(unresolved(
                    reference,
                    format!("timeframe {tf} has no column '{column}'"),
                ));
            }
            if tf == ctx.entry_timeframe() {
                Ok(series.column(column)?.to_vec())
            } else {
                series.align_column(column, ctx.entry.time())
            }
        }
        Reference::Session { session, field } => {
            let levels = ctx
                .sessions
                .get(session)
                .ok_or_else(|| unresolved(reference, "session levels not computed"))?;
            if levels.len() != ctx.len() {
                return Err(unresolved(
                    reference,
                    format!(
                        "session table has {} rows, entry series has {}",
                        levels.len(),
                        ctx.len()
                    ),
                ));
            }
            Ok(levels.field(*field).to_vec())
        }
    }
}

pub fn evaluate_condition(ctx: &EvalContext<'_>, condition: &Condition) -> Vec<bool> {
    let sides = resolve_reference(ctx, &condition.left)
        .and_then(|left| resolve_reference(ctx, &condition.right).map(|right| (left, right)));

    match sides {
        Ok((left, right)) => left
            .iter()
            .zip(&right)
            .map(|(l, r)| condition.op.apply(*l, *r))
            .collect(),
        Err(e) => {
            tracing::warn!(
                condition = %LogicNode::Condition(condition.clone()),
                error = %e,
                "condition could not be resolved, treating as false"
            );
            vec![false; ctx.len()]
        }
    }
}

pub fn evaluate(ctx: &EvalContext<'_>, node: &LogicNode) -> Result<Vec<bool>, TraderError> {
    match node {
        LogicNode::Condition(condition) => Ok(evaluate_condition(ctx, condition)),
        LogicNode::And(children) => combine_children(ctx, children, "AND", |a, b| a && b),
        LogicNode::Or(children) => combine_children(ctx, children, "OR", |a, b| a || b),
    }
}

fn combine_children(
    ctx: &EvalContext<'_>,
    children: &[LogicNode],
    keyword: &str,
    op: fn(bool, bool) -> bool,
) -> Result<Vec<bool>, TraderError> {
    let (first, rest) = children.split_first().ok_or_else(|| TraderError::LogicInvalid {
        reason: format!("{keyword} node has no children"),
    })?;

    let mut acc = evaluate(ctx, first)?;
    for child in rest {
        let mask = evaluate(ctx, child)?;
        for (a, m) in acc.iter_mut().zip(mask) {
            *a = op(*a, m);
        }
    }
    Ok(acc)
}

/// +1 where only buy holds, -1 where only sell holds, 0 otherwise.
pub fn combine_signals(buy: &[bool], sell: &[bool]) -> Vec<i8> {
    buy.iter()
        .zip(sell)
        .map(|(b, s)| match (*b, *s) {
            (true, false) => 1,
            (false, true) => -1,
            _ => 0,
        })
        .collect()
}

/// Evaluate both sides of the strategy and store the result as the `signal`
/// column of the entry series.
pub fn generate_signal(
    data: &mut MarketData,
    sessions: &BTreeMap<String, SessionLevels>,
    strategy: &Strategy,
) -> Result<Vec<i8>, TraderError> {
    let signal = {
        let ctx = EvalContext::new(data, sessions, &strategy.entry_timeframe)?;
        let buy = evaluate(&ctx, &strategy.buy_logic)?;
        let sell = evaluate(&ctx, &strategy.sell_logic)?;
        combine_signals(&buy, &sell)
    };

    let buys = signal.iter().filter(|s| **s == 1).count();
    let sells = signal.iter().filter(|s| **s == -1).count();
    tracing::info!(
        timeframe = %strategy.entry_timeframe,
        bars = signal.len(),
        buys,
        sells,
        "signal generated"
    );

    data.get_mut(&strategy.entry_timeframe)?
        .set_column(SIGNAL, signal.iter().map(|s| f64::from(*s)).collect())?;
    Ok(signal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::rule::CompareOp;
    use crate::domain::series::{CLOSE, HIGH, LOW, OPEN};
    use crate::domain::session::{
        compute_session_levels, SessionDefinition, SessionField, SessionRegistry,
    };
    use crate::domain::strategy::Leg;
    use chrono::{NaiveDate, NaiveDateTime};
    use proptest::prelude::{any, prop, prop_assert_eq, prop_oneof, proptest};
    use proptest::strategy::Strategy as PropStrategy;

    fn ts(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn hourly(closes: &[f64]) -> PriceSeries {
        let time = (0..closes.len()).map(|i| ts(2, i as u32)).collect();
        PriceSeries::new("H1", time)
            .with_column(OPEN, closes.to_vec())
            .unwrap()
            .with_column(HIGH, closes.iter().map(|c| c + 1.0).collect())
            .unwrap()
            .with_column(LOW, closes.iter().map(|c| c - 1.0).collect())
            .unwrap()
            .with_column(CLOSE, closes.to_vec())
            .unwrap()
    }

    fn no_sessions() -> BTreeMap<String, SessionLevels> {
        BTreeMap::new()
    }

    fn cond(left: Reference, op: CompareOp, right: Reference) -> LogicNode {
        LogicNode::condition(left, op, right)
    }

    fn strategy(buy: LogicNode, sell: LogicNode) -> Strategy {
        Strategy {
            name: "test".into(),
            entry_timeframe: "H1".into(),
            buy_logic: buy,
            sell_logic: sell,
            stop_loss: vec![Leg::Pips(10.0)],
            take_profit: vec![Leg::Pips(10.0)],
            single_trade_per_direction: false,
        }
    }

    #[test]
    fn column_against_literal() {
        let data = MarketData::new().with_series(hourly(&[1.0, 2.0, 3.0]));
        let sessions = no_sessions();
        let ctx = EvalContext::new(&data, &sessions, "H1").unwrap();
        let mask = evaluate(
            &ctx,
            &cond(Reference::column(CLOSE), CompareOp::Ge, Reference::Literal(2.0)),
        )
        .unwrap();
        assert_eq!(mask, vec![false, true, true]);
    }

    #[test]
    fn missing_values_compare_false() {
        let series = hourly(&[1.0, 2.0, 3.0])
            .with_column("rsi", vec![f64::NAN, 40.0, 60.0])
            .unwrap();
        let data = MarketData::new().with_series(series);
        let sessions = no_sessions();
        let ctx = EvalContext::new(&data, &sessions, "H1").unwrap();
        let mask = evaluate(
            &ctx,
            &cond(Reference::column("rsi"), CompareOp::Ne, Reference::Literal(50.0)),
        )
        .unwrap();
        assert_eq!(mask, vec![false, true, true]);
    }

    #[test]
    fn other_timeframe_column_is_forward_filled() {
        let daily = PriceSeries::new("D1", vec![ts(1, 0), ts(2, 1)])
            .with_column(CLOSE, vec![1.5, 10.0])
            .unwrap();
        let data = MarketData::new()
            .with_series(hourly(&[1.0, 2.0, 3.0]))
            .with_series(daily);
        let sessions = no_sessions();
        let ctx = EvalContext::new(&data, &sessions, "H1").unwrap();
        let values = resolve_reference(&ctx, &Reference::column_on("D1", CLOSE)).unwrap();
        assert_eq!(values, vec![1.5, 10.0, 10.0]);
    }

    #[test]
    fn unresolvable_reference_is_all_false() {
        let data = MarketData::new().with_series(hourly(&[1.0, 2.0]));
        let sessions = no_sessions();
        let ctx = EvalContext::new(&data, &sessions, "H1").unwrap();

        for reference in [
            Reference::column("sma_20"),
            Reference::column_on("W1", CLOSE),
            Reference::session("london", SessionField::High),
        ] {
            assert!(resolve_reference(&ctx, &reference).is_err());
            let node = cond(reference, CompareOp::Lt, Reference::Literal(1e9));
            assert_eq!(evaluate(&ctx, &node).unwrap(), vec![false, false]);
        }
    }

    #[test]
    fn empty_group_is_an_error() {
        let data = MarketData::new().with_series(hourly(&[1.0]));
        let sessions = no_sessions();
        let ctx = EvalContext::new(&data, &sessions, "H1").unwrap();
        assert!(matches!(
            evaluate(&ctx, &LogicNode::Or(vec![])),
            Err(TraderError::LogicInvalid { .. })
        ));
        assert!(matches!(
            evaluate(&ctx, &LogicNode::And(vec![LogicNode::And(vec![])])),
            Err(TraderError::LogicInvalid { .. })
        ));
    }

    #[test]
    fn unknown_entry_timeframe_fails() {
        let data = MarketData::new().with_series(hourly(&[1.0]));
        let sessions = no_sessions();
        assert!(matches!(
            EvalContext::new(&data, &sessions, "M5"),
            Err(TraderError::DataNotFound { .. })
        ));
    }

    #[test]
    fn session_reference_uses_previous_day() {
        let daily = PriceSeries::new("D1", vec![ts(1, 0), ts(2, 0)])
            .with_column(OPEN, vec![1.0, 2.0])
            .unwrap()
            .with_column(HIGH, vec![2.5, 4.0])
            .unwrap()
            .with_column(LOW, vec![0.5, 1.0])
            .unwrap()
            .with_column(CLOSE, vec![2.0, 3.0])
            .unwrap();
        let mut data = MarketData::new()
            .with_series(hourly(&[2.0, 3.0, 2.4]))
            .with_series(daily);
        let registry =
            SessionRegistry::new().with("prev_day", SessionDefinition::higher_timeframe("D1", 1));
        let sessions = compute_session_levels(&data, &registry, "H1").unwrap();

        let s = strategy(
            cond(
                Reference::column(CLOSE),
                CompareOp::Gt,
                Reference::session("prev_day", SessionField::High),
            ),
            cond(
                Reference::column(CLOSE),
                CompareOp::Lt,
                Reference::session("prev_day", SessionField::High),
            ),
        );
        let signal = generate_signal(&mut data, &sessions, &s).unwrap();
        assert_eq!(signal, vec![-1, 1, -1]);
        assert_eq!(data.get("H1").unwrap().column(SIGNAL).unwrap(), &[-1.0, 1.0, -1.0]);
    }

    #[test]
    fn conflicting_sides_cancel() {
        assert_eq!(
            combine_signals(&[true, true, false, false], &[true, false, true, false]),
            vec![0, 1, -1, 0]
        );
    }

    fn truth(node: &LogicNode) -> bool {
        match node {
            LogicNode::And(children) => children.iter().all(truth),
            LogicNode::Or(children) => children.iter().any(truth),
            LogicNode::Condition(c) => match (&c.left, &c.right) {
                (Reference::Literal(l), Reference::Literal(r)) => c.op.apply(*l, *r),
                _ => unreachable!("literal-only tree"),
            },
        }
    }

    fn literal_tree() -> impl PropStrategy<Value = LogicNode> {
        let leaf = any::<bool>().prop_map(LogicNode::constant);
        leaf.prop_recursive(4, 32, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 1..4).prop_map(LogicNode::And),
                prop::collection::vec(inner, 1..4).prop_map(LogicNode::Or),
            ]
        })
    }

    proptest! {
        #[test]
        fn literal_trees_follow_truth_tables(
            buy in literal_tree(),
            sell in literal_tree(),
            bars in 1usize..8,
        ) {
            let closes: Vec<f64> = (0..bars).map(|i| 100.0 + i as f64).collect();
            let mut data = MarketData::new().with_series(hourly(&closes));
            let sessions = no_sessions();
            let expected_buy = truth(&buy);
            let expected_sell = truth(&sell);
            let expected = match (expected_buy, expected_sell) {
                (true, false) => 1,
                (false, true) => -1,
                _ => 0,
            };

            let s = strategy(buy, sell);
            let signal = generate_signal(&mut data, &sessions, &s).unwrap();
            prop_assert_eq!(signal, vec![expected; bars]);
        }
    }
}
