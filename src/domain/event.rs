//! Event model: market, signal, order and fill events.
//!
//! Events are immutable once constructed. Handlers receive them by shared
//! reference and discard them after dispatch.

use chrono::{Duration, NaiveDateTime};
use serde::Serialize;
use std::fmt;

use super::ohlcv::Bar;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Market,
    Signal,
    Order,
    Fill,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalType {
    Long,
    Short,
    Exit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderType {
    Market,
    Limit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Buy,
    Sell,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Buy => write!(f, "BUY"),
            Direction::Sell => write!(f, "SELL"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarketEvent {
    pub timestamp: NaiveDateTime,
    pub symbol: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl From<&Bar> for MarketEvent {
    fn from(bar: &Bar) -> Self {
        MarketEvent {
            timestamp: bar.timestamp,
            symbol: bar.symbol.clone(),
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignalEvent {
    pub timestamp: NaiveDateTime,
    pub symbol: String,
    pub signal_type: SignalType,
    pub strength: f64,
}

impl SignalEvent {
    /// Strength is clamped into [0, 1]; NaN becomes 0.
    pub fn new(
        timestamp: NaiveDateTime,
        symbol: impl Into<String>,
        signal_type: SignalType,
        strength: f64,
    ) -> Self {
        let strength = if strength.is_nan() {
            0.0
        } else {
            strength.clamp(0.0, 1.0)
        };
        SignalEvent {
            timestamp,
            symbol: symbol.into(),
            signal_type,
            strength,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderEvent {
    pub timestamp: NaiveDateTime,
    pub symbol: String,
    pub order_type: OrderType,
    pub quantity: u64,
    pub direction: Direction,
}

impl OrderEvent {
    /// Returns `None` for a zero quantity: orders always carry a positive size.
    pub fn new(
        timestamp: NaiveDateTime,
        symbol: impl Into<String>,
        order_type: OrderType,
        quantity: u64,
        direction: Direction,
    ) -> Option<Self> {
        if quantity == 0 {
            return None;
        }
        Some(OrderEvent {
            timestamp,
            symbol: symbol.into(),
            order_type,
            quantity,
            direction,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FillEvent {
    pub timestamp: NaiveDateTime,
    pub symbol: String,
    pub quantity: u64,
    pub direction: Direction,
    pub fill_price: f64,
    pub commission: f64,
    pub slippage: f64,
    /// Simulated delay between order submission and this fill.
    pub latency: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Market(MarketEvent),
    Signal(SignalEvent),
    Order(OrderEvent),
    Fill(FillEvent),
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Market(_) => EventKind::Market,
            Event::Signal(_) => EventKind::Signal,
            Event::Order(_) => EventKind::Order,
            Event::Fill(_) => EventKind::Fill,
        }
    }

    pub fn timestamp(&self) -> NaiveDateTime {
        match self {
            Event::Market(e) => e.timestamp,
            Event::Signal(e) => e.timestamp,
            Event::Order(e) => e.timestamp,
            Event::Fill(e) => e.timestamp,
        }
    }

    pub fn symbol(&self) -> &str {
        match self {
            Event::Market(e) => &e.symbol,
            Event::Signal(e) => &e.symbol,
            Event::Order(e) => &e.symbol,
            Event::Fill(e) => &e.symbol,
        }
    }
}

impl From<MarketEvent> for Event {
    fn from(e: MarketEvent) -> Self {
        Event::Market(e)
    }
}

impl From<SignalEvent> for Event {
    fn from(e: SignalEvent) -> Self {
        Event::Signal(e)
    }
}

impl From<OrderEvent> for Event {
    fn from(e: OrderEvent) -> Self {
        Event::Order(e)
    }
}

impl From<FillEvent> for Event {
    fn from(e: FillEvent) -> Self {
        Event::Fill(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap()
    }

    #[test]
    fn signal_strength_clamped() {
        assert_eq!(SignalEvent::new(ts(), "AAPL", SignalType::Long, 2.5).strength, 1.0);
        assert_eq!(SignalEvent::new(ts(), "AAPL", SignalType::Long, -0.3).strength, 0.0);
        assert_eq!(
            SignalEvent::new(ts(), "AAPL", SignalType::Long, f64::NAN).strength,
            0.0
        );
        assert_eq!(SignalEvent::new(ts(), "AAPL", SignalType::Exit, 0.5).strength, 0.5);
    }

    #[test]
    fn zero_quantity_order_rejected() {
        assert!(OrderEvent::new(ts(), "AAPL", OrderType::Market, 0, Direction::Buy).is_none());
        let order = OrderEvent::new(ts(), "AAPL", OrderType::Limit, 10, Direction::Sell).unwrap();
        assert_eq!(order.quantity, 10);
    }

    #[test]
    fn event_kind_and_accessors() {
        let signal: Event = SignalEvent::new(ts(), "MSFT", SignalType::Short, 0.4).into();
        assert_eq!(signal.kind(), EventKind::Signal);
        assert_eq!(signal.symbol(), "MSFT");
        assert_eq!(signal.timestamp(), ts());
    }

    #[test]
    fn market_event_from_bar() {
        let bar = Bar {
            symbol: "AAPL".into(),
            timestamp: ts(),
            open: 1.0,
            high: 3.0,
            low: 0.5,
            close: 2.0,
            volume: 100.0,
        };
        let event = MarketEvent::from(&bar);
        assert_eq!(event.symbol, "AAPL");
        assert_eq!(event.close, 2.0);
        assert_eq!(event.timestamp, ts());
    }

    #[test]
    fn direction_display() {
        assert_eq!(Direction::Buy.to_string(), "BUY");
        assert_eq!(Direction::Sell.to_string(), "SELL");
    }
}
