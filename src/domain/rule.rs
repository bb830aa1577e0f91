//! Logic tree data structures.
//!
//! - `Reference`: what a condition compares (price columns, session levels, literals)
//! - `CompareOp`: the six comparison operators
//! - `LogicNode`: AND/OR composites and leaf conditions

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::domain::session::SessionField;

/// Tolerance for `==` and `!=`.
#[derive(Debug, Clone, PartialEq)]
pub enum Reference {
    /// A column of a timeframe's series; `None` means the entry timeframe.
    Column {
        timeframe: Option<String>,
        column: String,
    },
    Session {
        session: String,
        field: SessionField,
    },
    Literal(f64),
}

impl Reference {
    pub fn column(column: &str) -> Self {
        Reference::Column {
            timeframe: None,
            column: column.to_string(),
        }
    }

    pub fn column_on(timeframe: &str, column: &str) -> Self {
        Reference::Column {
            timeframe: Some(timeframe.to_string()),
            column: column.to_string(),
        }
    }

    pub fn session(session: &str, field: SessionField) -> Self {
        Reference::Session {
            session: session.to_string(),
            field,
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reference::Column {
                timeframe: Some(tf),
                column,
            } => write!(f, "{tf}:{column}"),
            Reference::Column {
                timeframe: None,
                column,
            } => write!(f, "{column}"),
            Reference::Session { session, field } => write!(f, "{session}.{field}"),
            Reference::Literal(v) => write!(f, "{v}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Gt,
    Lt,
    Ge,
    Le,
    Eq,
    Ne,
}

impl CompareOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Gt => ">",
            CompareOp::Lt => "<",
            CompareOp::Ge => ">=",
            CompareOp::Le => "<=",
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
        }
    }

    /// Apply the operator. A missing operand on either side is always false,
    /// including for `!=`.
    pub fn apply(&self, left: f64, right: f64) -> bool {
        if left.is_nan() || right.is_nan() {
            return false;
        }
        match self {
            CompareOp::Gt => left > right,
            CompareOp::Lt => left < right,
            CompareOp::Ge => left >= right,
            CompareOp::Le => left <= right,
            CompareOp::Eq => left == right,
            CompareOp::Ne => left != right,
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for CompareOp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            ">" => Ok(CompareOp::Gt),
            "<" => Ok(CompareOp::Lt),
            ">=" => Ok(CompareOp::Ge),
            "<=" => Ok(CompareOp::Le),
            "==" => Ok(CompareOp::Eq),
            "!=" => Ok(CompareOp::Ne),
            other => Err(format!("unknown operator '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub left: Reference,
    pub op: CompareOp,
    pub right: Reference,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LogicNode {
    And(Vec<LogicNode>),
    Or(Vec<LogicNode>),
    Condition(Condition),
}

impl LogicNode {
    pub fn condition(left: Reference, op: CompareOp, right: Reference) -> Self {
        LogicNode::Condition(Condition { left, op, right })
    }

    /// Literal-only condition that is always `value`.
    pub fn constant(value: bool) -> Self {
        let op = if value { CompareOp::Eq } else { CompareOp::Ne };
        LogicNode::condition(Reference::Literal(1.0), op, Reference::Literal(1.0))
    }
}

impl fmt::Display for LogicNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicNode::And(children) | LogicNode::Or(children) => {
                let keyword = if matches!(self, LogicNode::And(_)) {
                    "AND"
                } else {
                    "OR"
                };
                write!(f, "{keyword}(")?;
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{child}")?;
                }
                write!(f, ")")
            }
            LogicNode::Condition(c) => write!(f, "{} {} {}", c.left, c.op, c.right),
        }
    }
}

fn visit_references<'a>(node: &'a LogicNode, out: &mut Vec<&'a Reference>) {
    match node {
        LogicNode::And(children) | LogicNode::Or(children) => {
            for child in children {
                visit_references(child, out);
            }
        }
        LogicNode::Condition(c) => {
            out.push(&c.left);
            out.push(&c.right);
        }
    }
}

/// All references in the tree, left to right.
pub fn references(node: &LogicNode) -> Vec<&Reference> {
    let mut out = Vec::new();
    visit_references(node, &mut out);
    out
}

/// Names of sessions the tree refers to.
pub fn referenced_sessions(node: &LogicNode) -> BTreeSet<String> {
    references(node)
        .into_iter()
        .filter_map(|r| match r {
            Reference::Session { session, .. } => Some(session.clone()),
            _ => None,
        })
        .collect()
}

/// Timeframes named explicitly by column references.
pub fn referenced_timeframes(node: &LogicNode) -> BTreeSet<String> {
    references(node)
        .into_iter()
        .filter_map(|r| match r {
            Reference::Column {
                timeframe: Some(tf),
                ..
            } => Some(tf.clone()),
            _ => None,
        })
        .collect()
}
