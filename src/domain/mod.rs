//! Core domain types and logic: events, dispatch, strategy, portfolio,
//! execution and metrics.

pub mod backtest;
pub mod config_validation;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod execution;
pub mod feed;
pub mod metrics;
pub mod ohlcv;
pub mod portfolio;
pub mod rolling;
pub mod strategy;
pub mod trades;
