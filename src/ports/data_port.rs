//! Market feed port traits.

use crate::domain::error::BackloopError;
use crate::domain::event::MarketEvent;
use crate::domain::ohlcv::Bar;
use chrono::NaiveDateTime;

/// Read-only look-back access to bars already streamed.
pub trait BarHistory {
    /// The last `n` bars for `symbol` up to and including the current cursor,
    /// or `None` when fewer than `n` are available.
    fn latest_bars(&self, symbol: &str, n: usize) -> Option<&[Bar]>;
}

/// Replayable stream of bars, one per symbol per step.
pub trait MarketFeed: BarHistory {
    /// Advance the shared cursor by one step and return one event per symbol.
    /// `None` once the data is exhausted.
    fn next_bars(&mut self) -> Option<Vec<MarketEvent>>;

    fn symbols(&self) -> &[String];
}

/// Source of raw bar series, consumed when building a feed.
pub trait DataPort {
    fn fetch_bars(
        &self,
        symbol: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<Bar>, BackloopError>;
}
