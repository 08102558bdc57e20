//! Configuration validation.
//!
//! Checks every section before a run so bad input fails fast with the
//! offending section and key. Domain constructors re-check their own
//! invariants.

use crate::domain::error::BackloopError;
use crate::ports::config_port::ConfigPort;
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::HashSet;

pub fn validate_config(config: &dyn ConfigPort) -> Result<(), BackloopError> {
    validate_backtest_config(config)?;
    validate_strategy_config(config)?;
    validate_portfolio_config(config)?;
    validate_execution_config(config)?;
    validate_data_config(config)?;
    Ok(())
}

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), BackloopError> {
    match config.get_string("backtest", "symbols") {
        Some(s) if !s.trim().is_empty() => {
            parse_symbols(&s)?;
        }
        _ => return Err(BackloopError::missing("backtest", "symbols")),
    }

    match read_double(config, "backtest", "initial_capital")? {
        None => return Err(BackloopError::missing("backtest", "initial_capital")),
        Some(v) if v <= 0.0 => {
            return Err(BackloopError::invalid(
                "backtest",
                "initial_capital",
                "initial_capital must be positive",
            ));
        }
        Some(_) => {}
    }

    if let Some(raw) = config.get_string("backtest", "seed") {
        raw.trim().parse::<u64>().map_err(|_| {
            BackloopError::invalid(
                "backtest",
                "seed",
                format!("expected a non-negative integer, got '{raw}'"),
            )
        })?;
    }

    if let Some(v) = read_double(config, "backtest", "periods_per_year")? {
        if v <= 0.0 {
            return Err(BackloopError::invalid(
                "backtest",
                "periods_per_year",
                "periods_per_year must be positive",
            ));
        }
    }
    Ok(())
}

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), BackloopError> {
    if let Some(name) = config.get_string("strategy", "name") {
        if name.trim() != "mean_reversion" {
            return Err(BackloopError::invalid(
                "strategy",
                "name",
                format!("unknown strategy '{}'", name.trim()),
            ));
        }
    }

    if let Some(raw) = config.get_string("strategy", "window") {
        match raw.trim().parse::<i64>() {
            Ok(w) if w >= 2 => {}
            Ok(_) => {
                return Err(BackloopError::invalid(
                    "strategy",
                    "window",
                    "window must be at least 2",
                ));
            }
            Err(_) => {
                return Err(BackloopError::invalid(
                    "strategy",
                    "window",
                    format!("expected an integer, got '{raw}'"),
                ));
            }
        }
    }

    if let Some(v) = read_double(config, "strategy", "num_std")? {
        if v <= 0.0 {
            return Err(BackloopError::invalid(
                "strategy",
                "num_std",
                "num_std must be positive",
            ));
        }
    }
    Ok(())
}

pub fn validate_portfolio_config(config: &dyn ConfigPort) -> Result<(), BackloopError> {
    if let Some(v) = read_double(config, "portfolio", "risk_fraction")? {
        if v <= 0.0 || v > 1.0 {
            return Err(BackloopError::invalid(
                "portfolio",
                "risk_fraction",
                "risk_fraction must be in (0, 1]",
            ));
        }
    }

    if let Some(v) = read_double(config, "portfolio", "default_price")? {
        if v <= 0.0 {
            return Err(BackloopError::invalid(
                "portfolio",
                "default_price",
                "default_price must be positive",
            ));
        }
    }

    if let Some(raw) = config.get_string("portfolio", "order_type") {
        match raw.trim().to_lowercase().as_str() {
            "market" | "limit" => {}
            other => {
                return Err(BackloopError::invalid(
                    "portfolio",
                    "order_type",
                    format!("expected market or limit, got '{other}'"),
                ));
            }
        }
    }
    Ok(())
}

pub fn validate_execution_config(config: &dyn ConfigPort) -> Result<(), BackloopError> {
    for key in ["slippage_pct", "commission_pct", "latency_min_ms"] {
        if let Some(v) = read_double(config, "execution", key)? {
            if v < 0.0 {
                return Err(BackloopError::invalid(
                    "execution",
                    key,
                    format!("{key} must be non-negative"),
                ));
            }
        }
    }

    let min = read_double(config, "execution", "latency_min_ms")?.unwrap_or(10.0);
    let max = read_double(config, "execution", "latency_max_ms")?.unwrap_or(50.0);
    if max < min {
        return Err(BackloopError::invalid(
            "execution",
            "latency_max_ms",
            "latency_max_ms must not be below latency_min_ms",
        ));
    }
    Ok(())
}

pub fn validate_data_config(config: &dyn ConfigPort) -> Result<(), BackloopError> {
    let source = config
        .get_string("data", "source")
        .map(|s| s.trim().to_lowercase())
        .unwrap_or_else(|| "synthetic".to_string());
    match source.as_str() {
        "synthetic" => {}
        "csv" => match config.get_string("data", "path") {
            Some(p) if !p.trim().is_empty() => {}
            _ => return Err(BackloopError::missing("data", "path")),
        },
        other => {
            return Err(BackloopError::invalid(
                "data",
                "source",
                format!("expected synthetic or csv, got '{other}'"),
            ));
        }
    }

    let start = parse_datetime(config.get_string("data", "start").as_deref(), "start")?;
    let end = parse_datetime(config.get_string("data", "end").as_deref(), "end")?;
    if start >= end {
        return Err(BackloopError::invalid(
            "data",
            "start",
            "start must be before end",
        ));
    }

    if let Some(raw) = config.get_string("data", "interval_minutes") {
        match raw.trim().parse::<i64>() {
            Ok(m) if m >= 1 => {}
            _ => {
                return Err(BackloopError::invalid(
                    "data",
                    "interval_minutes",
                    "interval_minutes must be a positive integer",
                ));
            }
        }
    }
    Ok(())
}

/// Split a comma-separated symbol list, upper-casing each entry. Empty
/// entries and duplicates are rejected.
pub fn parse_symbols(input: &str) -> Result<Vec<String>, BackloopError> {
    let mut symbols = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(BackloopError::invalid(
                "backtest",
                "symbols",
                "empty symbol in list",
            ));
        }
        let symbol = trimmed.to_uppercase();
        if !seen.insert(symbol.clone()) {
            return Err(BackloopError::invalid(
                "backtest",
                "symbols",
                format!("duplicate symbol: {symbol}"),
            ));
        }
        symbols.push(symbol);
    }

    Ok(symbols)
}

/// Parse a `[data]` timestamp: `YYYY-MM-DD HH:MM:SS` or a bare date at
/// midnight.
pub fn parse_datetime(value: Option<&str>, field: &str) -> Result<NaiveDateTime, BackloopError> {
    let Some(raw) = value.map(str::trim) else {
        return Err(BackloopError::missing("data", field));
    };
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Ok(dt);
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| {
            BackloopError::invalid(
                "data",
                field,
                format!("invalid {field} format, expected YYYY-MM-DD[ HH:MM:SS]"),
            )
        })
}

/// Read an optional float, rejecting values that are present but not
/// numeric.
fn read_double(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<f64>, BackloopError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(raw) => match raw.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(Some(v)),
            _ => Err(BackloopError::invalid(
                section,
                key,
                format!("expected a number, got '{raw}'"),
            )),
        },
    }
}
