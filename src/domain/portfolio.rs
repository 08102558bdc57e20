//! Portfolio ledger: sizing signals into orders and booking fills.

use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::HashMap;
use tracing::warn;

use super::error::BackloopError;
use super::event::{Direction, FillEvent, OrderEvent, OrderType, SignalEvent, SignalType};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EquityPoint {
    pub timestamp: NaiveDateTime,
    pub equity: f64,
}

/// One executed fill, as booked by the portfolio.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeRecord {
    pub timestamp: NaiveDateTime,
    pub symbol: String,
    pub direction: Direction,
    pub quantity: u64,
    pub price: f64,
    pub commission: f64,
    pub slippage: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioConfig {
    pub initial_capital: f64,
    /// Fraction of cash committed per unit of signal strength.
    pub risk_fraction: f64,
    /// Placeholder price used for sizing before a symbol has been quoted.
    pub default_price: f64,
    pub order_type: OrderType,
}

impl Default for PortfolioConfig {
    fn default() -> Self {
        PortfolioConfig {
            initial_capital: 100_000.0,
            risk_fraction: 0.1,
            default_price: 100.0,
            order_type: OrderType::Market,
        }
    }
}

impl PortfolioConfig {
    pub fn validate(&self) -> Result<(), BackloopError> {
        if !self.initial_capital.is_finite() || self.initial_capital <= 0.0 {
            return Err(BackloopError::invalid(
                "backtest",
                "initial_capital",
                "initial_capital must be positive",
            ));
        }
        if !(self.risk_fraction > 0.0 && self.risk_fraction <= 1.0) {
            return Err(BackloopError::invalid(
                "portfolio",
                "risk_fraction",
                "risk_fraction must be between 0 and 1",
            ));
        }
        if !self.default_price.is_finite() || self.default_price <= 0.0 {
            return Err(BackloopError::invalid(
                "portfolio",
                "default_price",
                "default_price must be positive",
            ));
        }
        Ok(())
    }
}

/// Final state handed to reporting.
#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioSnapshot {
    pub initial_capital: f64,
    pub cash: f64,
    pub positions: HashMap<String, i64>,
    pub total_equity: f64,
}

#[derive(Debug, Clone)]
pub struct Portfolio {
    config: PortfolioConfig,
    cash: f64,
    positions: HashMap<String, i64>,
    holdings: HashMap<String, f64>,
    last_prices: HashMap<String, f64>,
    equity_curve: Vec<EquityPoint>,
    trade_log: Vec<TradeRecord>,
}

impl Portfolio {
    pub fn new(config: PortfolioConfig) -> Result<Self, BackloopError> {
        config.validate()?;
        Ok(Portfolio {
            cash: config.initial_capital,
            config,
            positions: HashMap::new(),
            holdings: HashMap::new(),
            last_prices: HashMap::new(),
            equity_curve: Vec::new(),
            trade_log: Vec::new(),
        })
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn initial_capital(&self) -> f64 {
        self.config.initial_capital
    }

    /// Signed position in `symbol`; zero when never traded.
    pub fn position(&self, symbol: &str) -> i64 {
        self.positions.get(symbol).copied().unwrap_or(0)
    }

    pub fn positions(&self) -> &HashMap<String, i64> {
        &self.positions
    }

    pub fn holdings(&self) -> &HashMap<String, f64> {
        &self.holdings
    }

    pub fn last_price(&self, symbol: &str) -> Option<f64> {
        self.last_prices.get(symbol).copied()
    }

    pub fn equity_curve(&self) -> &[EquityPoint] {
        &self.equity_curve
    }

    pub fn trade_log(&self) -> &[TradeRecord] {
        &self.trade_log
    }

    pub fn total_equity(&self) -> f64 {
        self.cash + self.holdings.values().sum::<f64>()
    }

    /// Mark `symbol` to `price` and append one equity point.
    pub fn update_price(&mut self, symbol: &str, price: f64, timestamp: NaiveDateTime) {
        self.last_prices.insert(symbol.to_string(), price);
        self.revalue(symbol);
        let equity = self.total_equity();
        self.equity_curve.push(EquityPoint { timestamp, equity });
    }

    /// Size a signal into an order.
    ///
    /// LONG/SHORT trade `floor(cash * risk_fraction * strength / price)` units;
    /// EXIT sells the whole long position and never opens a short.
    pub fn process_signal(&self, signal: &SignalEvent) -> Option<OrderEvent> {
        let (direction, quantity) = match signal.signal_type {
            SignalType::Long => (Direction::Buy, self.order_size(signal)),
            SignalType::Short => (Direction::Sell, self.order_size(signal)),
            SignalType::Exit => {
                let held = self.position(&signal.symbol);
                if held <= 0 {
                    return None;
                }
                (Direction::Sell, held.unsigned_abs())
            }
        };

        OrderEvent::new(
            signal.timestamp,
            signal.symbol.clone(),
            self.config.order_type,
            quantity,
            direction,
        )
    }

    /// Book a fill: move the position, settle cash, and log the trade.
    ///
    /// A fill whose quantity would overflow the signed position is
    /// rejected without touching cash or the ledger.
    pub fn process_fill(&mut self, fill: &FillEvent) {
        let held = self.position(&fill.symbol);
        let moved = i64::try_from(fill.quantity).ok().and_then(|q| match fill.direction {
            Direction::Buy => held.checked_add(q),
            Direction::Sell => held.checked_sub(q),
        });
        let Some(position) = moved else {
            warn!(
                symbol = %fill.symbol,
                quantity = fill.quantity,
                "fill overflows position, ignored"
            );
            return;
        };

        let notional = fill.fill_price * fill.quantity as f64;
        match fill.direction {
            Direction::Buy => self.cash -= notional + fill.commission,
            Direction::Sell => self.cash += notional - fill.commission,
        }
        self.positions.insert(fill.symbol.clone(), position);

        self.revalue(&fill.symbol);

        self.trade_log.push(TradeRecord {
            timestamp: fill.timestamp,
            symbol: fill.symbol.clone(),
            direction: fill.direction,
            quantity: fill.quantity,
            price: fill.fill_price,
            commission: fill.commission,
            slippage: fill.slippage,
        });
    }

    pub fn snapshot(&self) -> PortfolioSnapshot {
        PortfolioSnapshot {
            initial_capital: self.config.initial_capital,
            cash: self.cash,
            positions: self.positions.clone(),
            total_equity: self.total_equity(),
        }
    }

    fn order_size(&self, signal: &SignalEvent) -> u64 {
        let price = self
            .last_price(&signal.symbol)
            .unwrap_or(self.config.default_price);
        if price <= 0.0 {
            return 0;
        }
        let size = (self.cash * self.config.risk_fraction * signal.strength / price).floor();
        if !(size.is_finite() && size > 0.0) {
            return 0;
        }
        // `as` saturates; anything past i64::MAX cannot be held.
        let units = size as u64;
        if i64::try_from(units).is_err() {
            warn!(symbol = %signal.symbol, size, "order size exceeds position range, dropped");
            return 0;
        }
        units
    }

    fn revalue(&mut self, symbol: &str) {
        if let (Some(&quantity), Some(&price)) =
            (self.positions.get(symbol), self.last_prices.get(symbol))
        {
            self.holdings
                .insert(symbol.to_string(), quantity as f64 * price);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{Duration, NaiveDate};

    fn ts() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    fn portfolio(capital: f64) -> Portfolio {
        Portfolio::new(PortfolioConfig {
            initial_capital: capital,
            ..Default::default()
        })
        .unwrap()
    }

    fn signal(signal_type: SignalType, strength: f64) -> SignalEvent {
        SignalEvent::new(ts(), "AAPL", signal_type, strength)
    }

    fn fill(direction: Direction, quantity: u64, price: f64, commission: f64) -> FillEvent {
        FillEvent {
            timestamp: ts(),
            symbol: "AAPL".into(),
            quantity,
            direction,
            fill_price: price,
            commission,
            slippage: 0.0,
            latency: Duration::milliseconds(10),
        }
    }

    #[test]
    fn new_portfolio() {
        let p = portfolio(100_000.0);
        assert_relative_eq!(p.cash(), 100_000.0);
        assert_relative_eq!(p.total_equity(), 100_000.0);
        assert!(p.positions().is_empty());
        assert!(p.equity_curve().is_empty());
        assert!(p.trade_log().is_empty());
    }

    #[test]
    fn rejects_non_positive_capital() {
        let result = Portfolio::new(PortfolioConfig {
            initial_capital: 0.0,
            ..Default::default()
        });
        assert!(matches!(result, Err(BackloopError::ConfigInvalid { .. })));
    }

    #[test]
    fn long_signal_sizes_from_last_price() {
        let mut p = portfolio(100_000.0);
        p.update_price("AAPL", 50.0, ts());
        let order = p.process_signal(&signal(SignalType::Long, 1.0)).unwrap();
        // 100_000 * 0.1 * 1.0 / 50 = 200
        assert_eq!(order.quantity, 200);
        assert_eq!(order.direction, Direction::Buy);
        assert_eq!(order.order_type, OrderType::Market);
    }

    #[test]
    fn unknown_price_uses_default() {
        let p = portfolio(100_000.0);
        let order = p.process_signal(&signal(SignalType::Long, 0.5)).unwrap();
        // 100_000 * 0.1 * 0.5 / 100 = 50
        assert_eq!(order.quantity, 50);
    }

    #[test]
    fn short_signal_sells() {
        let mut p = portfolio(100_000.0);
        p.update_price("AAPL", 200.0, ts());
        let order = p.process_signal(&signal(SignalType::Short, 1.0)).unwrap();
        assert_eq!(order.quantity, 50);
        assert_eq!(order.direction, Direction::Sell);
    }

    #[test]
    fn zero_size_signal_is_noop() {
        let mut p = portfolio(1_000.0);
        p.update_price("AAPL", 500.0, ts());
        let before = p.snapshot();
        // 1_000 * 0.1 * 1.0 / 500 = 0.2 → 0
        assert!(p.process_signal(&signal(SignalType::Long, 1.0)).is_none());
        assert_eq!(p.snapshot(), before);
        assert!(p.trade_log().is_empty());
    }

    #[test]
    fn exit_sells_entire_long() {
        let mut p = portfolio(100_000.0);
        p.update_price("AAPL", 100.0, ts());
        p.process_fill(&fill(Direction::Buy, 37, 100.0, 0.0));
        let order = p.process_signal(&signal(SignalType::Exit, 0.5)).unwrap();
        assert_eq!(order.quantity, 37);
        assert_eq!(order.direction, Direction::Sell);
    }

    #[test]
    fn exit_without_long_is_noop() {
        let mut p = portfolio(100_000.0);
        p.update_price("AAPL", 100.0, ts());
        assert!(p.process_signal(&signal(SignalType::Exit, 1.0)).is_none());

        p.process_fill(&fill(Direction::Sell, 10, 100.0, 0.0));
        assert_eq!(p.position("AAPL"), -10);
        assert!(p.process_signal(&signal(SignalType::Exit, 1.0)).is_none());
    }

    #[test]
    fn buy_fill_debits_cash_and_commission() {
        let mut p = portfolio(10_000.0);
        p.update_price("AAPL", 100.0, ts());
        p.process_fill(&fill(Direction::Buy, 10, 101.0, 1.5));

        assert_eq!(p.position("AAPL"), 10);
        assert_relative_eq!(p.cash(), 10_000.0 - 1010.0 - 1.5);
        // holdings marked at last market price, not the fill price
        assert_relative_eq!(p.holdings()["AAPL"], 1000.0);
        assert_eq!(p.trade_log().len(), 1);
        assert_eq!(p.trade_log()[0].direction, Direction::Buy);
        assert_relative_eq!(p.trade_log()[0].commission, 1.5);
    }

    #[test]
    fn sell_fill_may_open_short() {
        let mut p = portfolio(10_000.0);
        p.update_price("AAPL", 100.0, ts());
        p.process_fill(&fill(Direction::Sell, 5, 99.0, 0.5));

        assert_eq!(p.position("AAPL"), -5);
        assert_relative_eq!(p.cash(), 10_000.0 + 495.0 - 0.5);
        assert_relative_eq!(p.holdings()["AAPL"], -500.0);
    }

    #[test]
    fn round_trip_at_same_price_conserves_cash() {
        let mut p = portfolio(50_000.0);
        p.update_price("AAPL", 123.45, ts());
        p.process_fill(&fill(Direction::Buy, 40, 123.45, 0.0));
        p.process_fill(&fill(Direction::Sell, 40, 123.45, 0.0));

        assert_relative_eq!(p.cash(), 50_000.0, epsilon = 1e-9);
        assert_eq!(p.position("AAPL"), 0);
        assert_relative_eq!(p.total_equity(), 50_000.0, epsilon = 1e-9);
    }

    #[test]
    fn update_price_appends_equity_point_every_tick() {
        let mut p = portfolio(10_000.0);
        p.update_price("AAPL", 100.0, ts());
        p.process_fill(&fill(Direction::Buy, 10, 100.0, 0.0));
        p.update_price("AAPL", 110.0, ts() + Duration::hours(1));
        p.update_price("AAPL", 90.0, ts() + Duration::hours(2));

        let curve = p.equity_curve();
        assert_eq!(curve.len(), 3);
        assert_relative_eq!(curve[0].equity, 10_000.0);
        assert_relative_eq!(curve[1].equity, 10_100.0);
        assert_relative_eq!(curve[2].equity, 9_900.0);
    }

    #[test]
    fn fill_before_any_quote_has_no_holding() {
        let mut p = portfolio(10_000.0);
        p.process_fill(&fill(Direction::Buy, 10, 100.0, 0.0));
        assert_eq!(p.position("AAPL"), 10);
        assert!(!p.holdings().contains_key("AAPL"));

        p.update_price("AAPL", 105.0, ts());
        assert_relative_eq!(p.holdings()["AAPL"], 1050.0);
        assert_relative_eq!(p.total_equity(), 9_000.0 + 1050.0);
    }

    #[test]
    fn sizing_with_negative_cash_is_zero() {
        let mut p = portfolio(1_000.0);
        p.update_price("AAPL", 100.0, ts());
        p.process_fill(&fill(Direction::Buy, 20, 100.0, 0.0));
        assert!(p.cash() < 0.0);
        assert!(p.process_signal(&signal(SignalType::Long, 1.0)).is_none());
    }

    #[test]
    fn unrepresentable_size_drops_the_order() {
        let mut p = portfolio(100_000.0);
        p.update_price("PENNY", 1e-16, ts());
        let long = SignalEvent::new(ts(), "PENNY", SignalType::Long, 1.0);
        assert!(p.process_signal(&long).is_none());
    }

    #[test]
    fn largest_representable_buy_keeps_position_positive() {
        let mut p = portfolio(100_000.0);
        p.process_fill(&fill(Direction::Buy, i64::MAX as u64, 0.0, 0.0));
        assert_eq!(p.position("AAPL"), i64::MAX);
    }

    #[test]
    fn overflowing_fill_is_ignored() {
        let mut p = portfolio(100_000.0);
        p.process_fill(&fill(Direction::Buy, u64::MAX, 1.0, 0.0));
        assert_eq!(p.position("AAPL"), 0);
        assert_relative_eq!(p.cash(), 100_000.0);
        assert!(p.trade_log().is_empty());

        p.process_fill(&fill(Direction::Buy, 10, 1.0, 0.0));
        p.process_fill(&fill(Direction::Buy, i64::MAX as u64, 1.0, 0.0));
        assert_eq!(p.position("AAPL"), 10);
        assert_eq!(p.trade_log().len(), 1);
    }
}
