//! CSV file data adapter.
//!
//! One file per symbol, `<base_path>/<SYMBOL>.csv`, with header
//! `timestamp,open,high,low,close,volume`.

use crate::domain::error::BackloopError;
use crate::domain::ohlcv::Bar;
use crate::ports::data_port::DataPort;
use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use std::fs::File;
use std::io::ErrorKind;
use std::path::PathBuf;

#[derive(Debug, Deserialize)]
struct CsvRow {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(format!("{symbol}.csv"))
    }
}

fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

impl DataPort for CsvAdapter {
    fn fetch_bars(
        &self,
        symbol: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<Bar>, BackloopError> {
        let path = self.csv_path(symbol);
        let file = File::open(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => BackloopError::NoData {
                symbol: symbol.to_string(),
            },
            _ => BackloopError::Data {
                reason: format!("failed to read {}: {}", path.display(), e),
            },
        })?;

        let mut rdr = csv::Reader::from_reader(file);
        let mut bars = Vec::new();

        for row in rdr.deserialize() {
            let row: CsvRow = row?;
            let timestamp = parse_timestamp(&row.timestamp).ok_or_else(|| BackloopError::Data {
                reason: format!("{}: invalid timestamp '{}'", path.display(), row.timestamp),
            })?;

            if timestamp < start || timestamp > end {
                continue;
            }

            let bar = Bar {
                symbol: symbol.to_string(),
                timestamp,
                open: row.open,
                high: row.high,
                low: row.low,
                close: row.close,
                volume: row.volume,
            };
            if !bar.is_consistent() {
                return Err(BackloopError::Data {
                    reason: format!("{}: inconsistent bar at {}", path.display(), timestamp),
                });
            }
            bars.push(bar);
        }

        bars.sort_by_key(|b| b.timestamp);
        Ok(bars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn setup_test_data() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().to_path_buf();

        let csv_content = "timestamp,open,high,low,close,volume\n\
            2024-01-15 11:00:00,105.0,115.0,100.0,110.0,60000\n\
            2024-01-15 10:00:00,100.0,110.0,90.0,105.0,50000\n\
            2024-01-15 12:00:00,110.0,120.0,105.0,115.0,55000\n";

        fs::write(path.join("AAPL.csv"), csv_content).unwrap();
        fs::write(
            path.join("BAD.csv"),
            "timestamp,open,high,low,close,volume\n2024-01-15 10:00:00,100,90,95,99,10\n",
        )
        .unwrap();

        (dir, path)
    }

    #[test]
    fn fetch_bars_returns_sorted_data() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let bars = adapter.fetch_bars("AAPL", at(15, 0), at(15, 23)).unwrap();

        assert_eq!(bars.len(), 3);
        assert_eq!(bars[0].timestamp, at(15, 10));
        assert_eq!(bars[0].symbol, "AAPL");
        assert_eq!(bars[0].open, 100.0);
        assert_eq!(bars[0].high, 110.0);
        assert_eq!(bars[0].low, 90.0);
        assert_eq!(bars[0].close, 105.0);
        assert_eq!(bars[0].volume, 50000.0);
        assert_eq!(bars[2].timestamp, at(15, 12));
    }

    #[test]
    fn fetch_bars_filters_by_range() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let bars = adapter.fetch_bars("AAPL", at(15, 11), at(15, 11)).unwrap();
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].timestamp, at(15, 11));
    }

    #[test]
    fn missing_file_is_no_data() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let err = adapter.fetch_bars("XYZ", at(1, 0), at(31, 0)).unwrap_err();
        assert!(matches!(err, BackloopError::NoData { symbol } if symbol == "XYZ"));
    }

    #[test]
    fn inconsistent_bar_is_rejected() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let err = adapter.fetch_bars("BAD", at(1, 0), at(31, 0)).unwrap_err();
        assert!(matches!(err, BackloopError::Data { .. }));
    }

    #[test]
    fn parse_timestamp_formats() {
        assert_eq!(parse_timestamp("2024-01-15 10:00:00"), Some(at(15, 10)));
        assert_eq!(parse_timestamp("2024-01-15T10:00:00"), Some(at(15, 10)));
        assert_eq!(parse_timestamp("2024-01-15"), Some(at(15, 0)));
        assert_eq!(parse_timestamp("15/01/2024"), None);
    }
}
