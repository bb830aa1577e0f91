//! Core domain types and logic.

pub mod error;
pub mod series;
pub mod session;
pub mod rule;
pub mod rule_parser;
pub mod rule_eval;
pub mod strategy;
pub mod position;
pub mod execution;
pub mod indicator;
pub mod metrics;
pub mod backtest;
pub mod config_validation;
