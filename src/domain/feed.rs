//! In-memory historical feed.
//!
//! Holds one bar series per symbol and streams them index-aligned: step `i`
//! emits bar `i` of every symbol, in symbol order. The run length is the
//! shortest series.

use std::collections::HashMap;

use super::error::BackloopError;
use super::event::MarketEvent;
use super::ohlcv::Bar;
use crate::ports::data_port::{BarHistory, DataPort, MarketFeed};
use chrono::NaiveDateTime;

#[derive(Debug, Clone)]
pub struct HistoricalFeed {
    symbols: Vec<String>,
    data: HashMap<String, Vec<Bar>>,
    cursor: usize,
    length: usize,
}

impl HistoricalFeed {
    /// Build from `(symbol, bars)` pairs; every series must be non-empty and
    /// sorted by timestamp.
    pub fn new(series: Vec<(String, Vec<Bar>)>) -> Result<Self, BackloopError> {
        let mut symbols = Vec::with_capacity(series.len());
        let mut data = HashMap::with_capacity(series.len());

        for (symbol, bars) in series {
            if bars.is_empty() {
                return Err(BackloopError::NoData { symbol });
            }
            if bars.windows(2).any(|w| w[1].timestamp < w[0].timestamp) {
                return Err(BackloopError::Data {
                    reason: format!("bars for {symbol} are not in timestamp order"),
                });
            }
            if data.contains_key(&symbol) {
                return Err(BackloopError::Data {
                    reason: format!("duplicate series for {symbol}"),
                });
            }
            symbols.push(symbol.clone());
            data.insert(symbol, bars);
        }

        let length = data.values().map(Vec::len).min().unwrap_or(0);

        Ok(HistoricalFeed {
            symbols,
            data,
            cursor: 0,
            length,
        })
    }

    /// Fetch every symbol's series from `port` over `[start, end]`.
    pub fn load(
        port: &dyn DataPort,
        symbols: &[String],
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Self, BackloopError> {
        let mut series = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            let bars = port.fetch_bars(symbol, start, end)?;
            series.push((symbol.clone(), bars));
        }
        Self::new(series)
    }

    /// Number of steps the feed will emit.
    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }
}

impl BarHistory for HistoricalFeed {
    fn latest_bars(&self, symbol: &str, n: usize) -> Option<&[Bar]> {
        let bars = self.data.get(symbol)?;
        if n == 0 || self.cursor < n {
            return None;
        }
        Some(&bars[self.cursor - n..self.cursor])
    }
}

impl MarketFeed for HistoricalFeed {
    fn next_bars(&mut self) -> Option<Vec<MarketEvent>> {
        if self.cursor >= self.length {
            return None;
        }
        let events = self
            .symbols
            .iter()
            .filter_map(|s| self.data.get(s))
            .map(|bars| MarketEvent::from(&bars[self.cursor]))
            .collect();
        self.cursor += 1;
        Some(events)
    }

    fn symbols(&self) -> &[String] {
        &self.symbols
    }
}
