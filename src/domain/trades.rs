//! Round-trip reconstruction from the trade log by FIFO lot matching.
//!
//! Each fill first closes open lots of the opposite side for the same symbol,
//! oldest first; any remainder opens a new lot. Commissions are spread per
//! unit across the legs they paid for, so a round trip's PnL is net of both
//! the entry and exit share.

use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};

use super::event::Direction;
use super::portfolio::TradeRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Long,
    Short,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClosedTrade {
    pub symbol: String,
    pub side: Side,
    pub quantity: u64,
    pub entry_time: NaiveDateTime,
    pub exit_time: NaiveDateTime,
    pub entry_price: f64,
    pub exit_price: f64,
    pub pnl: f64,
}

impl ClosedTrade {
    pub fn is_win(&self) -> bool {
        self.pnl > 0.0
    }
}

#[derive(Debug, Clone)]
struct Lot {
    side: Side,
    remaining: u64,
    price: f64,
    commission_per_unit: f64,
    timestamp: NaiveDateTime,
}

/// Pair the fills in `trade_log` into closed round trips.
///
/// Lots still open at the end of the log produce no entry.
pub fn match_round_trips(trade_log: &[TradeRecord]) -> Vec<ClosedTrade> {
    let mut open: HashMap<&str, VecDeque<Lot>> = HashMap::new();
    let mut closed = Vec::new();

    for record in trade_log {
        if record.quantity == 0 {
            continue;
        }
        let commission_per_unit = record.commission / record.quantity as f64;
        let closing_side = match record.direction {
            Direction::Buy => Side::Short,
            Direction::Sell => Side::Long,
        };
        let lots = open.entry(record.symbol.as_str()).or_default();
        let mut remaining = record.quantity;

        while remaining > 0 {
            let Some(lot) = lots.front_mut() else { break };
            if lot.side != closing_side {
                break;
            }

            let matched = remaining.min(lot.remaining);
            let units = matched as f64;
            let price_pnl = match lot.side {
                Side::Long => (record.price - lot.price) * units,
                Side::Short => (lot.price - record.price) * units,
            };
            let fees = (lot.commission_per_unit + commission_per_unit) * units;

            closed.push(ClosedTrade {
                symbol: record.symbol.clone(),
                side: lot.side,
                quantity: matched,
                entry_time: lot.timestamp,
                exit_time: record.timestamp,
                entry_price: lot.price,
                exit_price: record.price,
                pnl: price_pnl - fees,
            });

            lot.remaining -= matched;
            remaining -= matched;
            if lot.remaining == 0 {
                lots.pop_front();
            }
        }

        if remaining > 0 {
            let side = match record.direction {
                Direction::Buy => Side::Long,
                Direction::Sell => Side::Short,
            };
            lots.push_back(Lot {
                side,
                remaining,
                price: record.price,
                commission_per_unit,
                timestamp: record.timestamp,
            });
        }
    }

    closed
}
