#![allow(dead_code)]

use backloop::domain::backtest::BacktestConfig;
use backloop::domain::error::BackloopError;
use backloop::domain::execution::ExecutionConfig;
use backloop::domain::feed::HistoricalFeed;
pub use backloop::domain::ohlcv::Bar;
use backloop::ports::data_port::DataPort;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use std::collections::HashMap;

pub struct MockDataPort {
    pub data: HashMap<String, Vec<Bar>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<Bar>) -> Self {
        self.data.insert(symbol.to_string(), bars);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_bars(
        &self,
        symbol: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<Bar>, BackloopError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(BackloopError::Data {
                reason: reason.clone(),
            });
        }
        Ok(self
            .data
            .get(symbol)
            .map(|bars| {
                bars.iter()
                    .filter(|b| b.timestamp >= start && b.timestamp <= end)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

pub fn start_time() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

pub fn hour(i: usize) -> NaiveDateTime {
    start_time() + Duration::hours(i as i64)
}

pub fn make_bar(symbol: &str, i: usize, close: f64) -> Bar {
    Bar {
        symbol: symbol.to_string(),
        timestamp: hour(i),
        open: close,
        high: close,
        low: close,
        close,
        volume: 1_000.0,
    }
}

/// Hourly flat-OHLC bars from a close series.
pub fn make_bars(symbol: &str, closes: &[f64]) -> Vec<Bar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| make_bar(symbol, i, close))
        .collect()
}

pub fn make_feed(series: &[(&str, &[f64])]) -> HistoricalFeed {
    HistoricalFeed::new(
        series
            .iter()
            .map(|(symbol, closes)| (symbol.to_string(), make_bars(symbol, closes)))
            .collect(),
    )
    .unwrap()
}

/// 19 flat bars then a drop far below the lower band, a recovery to the
/// mean and a tail: one LONG entry and one EXIT with the default window.
pub fn dip_and_recover() -> Vec<f64> {
    let mut closes = vec![100.0; 19];
    closes.push(80.0);
    closes.extend([85.0, 90.0, 95.0, 100.0, 105.0, 110.0, 100.0, 100.0]);
    closes
}

pub fn sample_config(symbols: &[&str]) -> BacktestConfig {
    BacktestConfig::new(symbols.iter().map(|s| s.to_string()).collect())
}

pub fn frictionless_config(symbols: &[&str]) -> BacktestConfig {
    let mut config = sample_config(symbols);
    config.execution = ExecutionConfig::frictionless();
    config
}
