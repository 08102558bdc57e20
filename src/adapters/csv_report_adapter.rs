//! CSV result export implementing ReportPort.
//!
//! Writes `trade_log.csv`, `equity_curve.csv` and `closed_trades.csv` into
//! the output directory, creating it if needed.

use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::domain::backtest::BacktestResult;
use crate::domain::error::BackloopError;
use crate::ports::report_port::ReportPort;

pub const TRADE_LOG_FILE: &str = "trade_log.csv";
pub const EQUITY_CURVE_FILE: &str = "equity_curve.csv";
pub const CLOSED_TRADES_FILE: &str = "closed_trades.csv";

#[derive(Debug, Default, Clone, Copy)]
pub struct CsvReportAdapter;

impl CsvReportAdapter {
    pub fn new() -> Self {
        Self
    }
}

fn report_err(path: &Path, e: impl std::fmt::Display) -> BackloopError {
    BackloopError::Report {
        reason: format!("failed to write {}: {}", path.display(), e),
    }
}

fn write_rows<T: Serialize>(path: &Path, rows: &[T], header: &[&str]) -> Result<(), BackloopError> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| report_err(path, e))?;
    if rows.is_empty() {
        // serde only emits a header alongside the first record
        writer.write_record(header).map_err(|e| report_err(path, e))?;
    }
    for row in rows {
        writer.serialize(row).map_err(|e| report_err(path, e))?;
    }
    writer.flush().map_err(|e| report_err(path, e))?;
    Ok(())
}

impl ReportPort for CsvReportAdapter {
    fn write(&self, result: &BacktestResult, output_dir: &Path) -> Result<(), BackloopError> {
        fs::create_dir_all(output_dir).map_err(|e| BackloopError::Report {
            reason: format!("failed to create {}: {}", output_dir.display(), e),
        })?;

        write_rows(
            &output_dir.join(TRADE_LOG_FILE),
            &result.trade_log,
            &[
                "timestamp",
                "symbol",
                "direction",
                "quantity",
                "price",
                "commission",
                "slippage",
            ],
        )?;
        write_rows(
            &output_dir.join(EQUITY_CURVE_FILE),
            &result.equity_curve,
            &["timestamp", "equity"],
        )?;
        write_rows(
            &output_dir.join(CLOSED_TRADES_FILE),
            &result.closed_trades,
            &[
                "symbol",
                "side",
                "quantity",
                "entry_time",
                "exit_time",
                "entry_price",
                "exit_price",
                "pnl",
            ],
        )?;

        tracing::info!(dir = %output_dir.display(), "results written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::event::Direction;
    use crate::domain::portfolio::{EquityPoint, PortfolioSnapshot, TradeRecord};
    use crate::domain::trades::match_round_trips;
    use chrono::{NaiveDate, NaiveDateTime};
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn ts(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn record(hour: u32, direction: Direction, price: f64) -> TradeRecord {
        TradeRecord {
            timestamp: ts(hour),
            symbol: "AAPL".into(),
            direction,
            quantity: 10,
            price,
            commission: 0.5,
            slippage: 0.1,
        }
    }

    fn sample_result() -> BacktestResult {
        let trade_log = vec![
            record(10, Direction::Buy, 100.0),
            record(12, Direction::Sell, 105.0),
        ];
        BacktestResult {
            strategy_name: "mean_reversion".into(),
            portfolio: PortfolioSnapshot {
                initial_capital: 1000.0,
                cash: 1049.0,
                positions: HashMap::new(),
                total_equity: 1049.0,
            },
            equity_curve: (10..13)
                .map(|h| EquityPoint {
                    timestamp: ts(h),
                    equity: 1000.0 + h as f64,
                })
                .collect(),
            closed_trades: match_round_trips(&trade_log),
            trade_log,
            steps: 3,
            events_handled: 9,
        }
    }

    #[test]
    fn writes_all_three_files() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("results");
        CsvReportAdapter::new().write(&sample_result(), &out).unwrap();

        let trades = fs::read_to_string(out.join(TRADE_LOG_FILE)).unwrap();
        let mut lines = trades.lines();
        assert_eq!(
            lines.next(),
            Some("timestamp,symbol,direction,quantity,price,commission,slippage")
        );
        let first = lines.next().unwrap();
        assert!(first.contains("AAPL,BUY,10,100.0"), "{first}");
        assert_eq!(lines.count(), 1);

        let equity = fs::read_to_string(out.join(EQUITY_CURVE_FILE)).unwrap();
        assert_eq!(equity.lines().count(), 4);

        let closed = fs::read_to_string(out.join(CLOSED_TRADES_FILE)).unwrap();
        let rows: Vec<&str> = closed.lines().collect();
        assert_eq!(rows.len(), 2);
        assert!(rows[1].starts_with("AAPL,LONG,10,"));
    }

    #[test]
    fn empty_result_still_has_headers() {
        let dir = TempDir::new().unwrap();
        let mut result = sample_result();
        result.trade_log.clear();
        result.closed_trades.clear();
        CsvReportAdapter::new().write(&result, dir.path()).unwrap();

        let closed = fs::read_to_string(dir.path().join(CLOSED_TRADES_FILE)).unwrap();
        assert_eq!(
            closed.trim_end(),
            "symbol,side,quantity,entry_time,exit_time,entry_price,exit_price,pnl"
        );
    }
}
