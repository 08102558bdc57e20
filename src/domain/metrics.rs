//! Performance metrics over an equity curve and trade log.

use chrono::NaiveDateTime;

use super::portfolio::{EquityPoint, TradeRecord};
use super::rolling::{mean, sample_stddev};
use super::trades::ClosedTrade;

/// 252 trading days of six hourly bars.
pub const DEFAULT_PERIODS_PER_YEAR: f64 = 252.0 * 6.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Drawdown {
    /// Peak-to-trough decline as a fraction of the peak.
    pub max_drawdown: f64,
    pub peak_index: usize,
    pub trough_index: usize,
    pub peak_time: NaiveDateTime,
    pub trough_time: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    pub total_return: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub max_drawdown: f64,
    pub drawdown: Option<Drawdown>,
    pub volatility: f64,
    pub avg_return_per_bar: f64,
    pub total_fills: usize,
    pub round_trips: usize,
    pub hit_rate: f64,
}

impl Metrics {
    pub fn compute(
        equity_curve: &[EquityPoint],
        trade_log: &[TradeRecord],
        closed_trades: &[ClosedTrade],
        periods_per_year: f64,
    ) -> Self {
        let returns = bar_returns(equity_curve);
        let total_return = match (equity_curve.first(), equity_curve.last()) {
            (Some(first), Some(last)) if first.equity > 0.0 => last.equity / first.equity - 1.0,
            _ => 0.0,
        };
        let drawdown = max_drawdown(equity_curve);
        let volatility = sample_stddev(&returns)
            .map(|s| s * periods_per_year.sqrt())
            .unwrap_or(0.0);

        Metrics {
            total_return,
            sharpe_ratio: sharpe_ratio(&returns, periods_per_year),
            sortino_ratio: sortino_ratio(&returns, periods_per_year),
            max_drawdown: drawdown.as_ref().map_or(0.0, |d| d.max_drawdown),
            drawdown,
            volatility,
            avg_return_per_bar: mean(&returns).unwrap_or(0.0),
            total_fills: trade_log.len(),
            round_trips: closed_trades.len(),
            hit_rate: hit_rate(closed_trades),
        }
    }
}

/// Simple returns between consecutive equity points; a non-positive prior
/// equity yields 0.
pub fn bar_returns(equity_curve: &[EquityPoint]) -> Vec<f64> {
    equity_curve
        .windows(2)
        .map(|w| {
            let prev = w[0].equity;
            if prev > 0.0 {
                (w[1].equity - prev) / prev
            } else {
                0.0
            }
        })
        .collect()
}

/// Annualised Sharpe ratio with a zero risk-free rate.
pub fn sharpe_ratio(returns: &[f64], periods_per_year: f64) -> f64 {
    match (mean(returns), sample_stddev(returns)) {
        (Some(m), Some(s)) if s > 0.0 => periods_per_year.sqrt() * m / s,
        _ => 0.0,
    }
}

/// Annualised Sortino ratio: mean return over the deviation of the negative
/// returns.
pub fn sortino_ratio(returns: &[f64], periods_per_year: f64) -> f64 {
    let downside: Vec<f64> = returns.iter().copied().filter(|r| *r < 0.0).collect();
    match (mean(returns), sample_stddev(&downside)) {
        (Some(m), Some(s)) if returns.len() >= 2 && s > 0.0 => periods_per_year.sqrt() * m / s,
        _ => 0.0,
    }
}

/// Largest peak-to-trough decline. `None` for fewer than two points.
pub fn max_drawdown(equity_curve: &[EquityPoint]) -> Option<Drawdown> {
    if equity_curve.len() < 2 {
        return None;
    }

    let mut peak_index = 0;
    let mut best = (0.0_f64, 0usize, 0usize);

    for (i, point) in equity_curve.iter().enumerate() {
        let peak = equity_curve[peak_index].equity;
        if point.equity > peak {
            peak_index = i;
        } else if peak > 0.0 {
            let dd = (peak - point.equity) / peak;
            if dd > best.0 {
                best = (dd, peak_index, i);
            }
        }
    }

    let (max_drawdown, peak, trough) = best;
    Some(Drawdown {
        max_drawdown,
        peak_index: peak,
        trough_index: trough,
        peak_time: equity_curve[peak].timestamp,
        trough_time: equity_curve[trough].timestamp,
    })
}

/// Fraction of closed round trips with positive PnL.
pub fn hit_rate(closed_trades: &[ClosedTrade]) -> f64 {
    if closed_trades.is_empty() {
        return 0.0;
    }
    closed_trades.iter().filter(|t| t.is_win()).count() as f64 / closed_trades.len() as f64
}
