//! Backtest engine and event loop.
//!
//! `Backtest` owns the dispatcher and a [`Session`] (feed, portfolio,
//! execution simulator, strategy). Each [`Backtest::step`] feeds one bar per
//! symbol and drains the dispatcher to quiescence before returning, so a bar's
//! signal → order → fill chain always completes before the next bar is fed.

use std::collections::HashSet;
use tracing::{debug, info};

use super::dispatcher::{EventDispatcher, EventQueue};
use super::error::BackloopError;
use super::event::{Event, EventKind};
use super::execution::{ExecutionConfig, ExecutionSimulator};
use super::metrics::DEFAULT_PERIODS_PER_YEAR;
use super::portfolio::{EquityPoint, Portfolio, PortfolioConfig, PortfolioSnapshot, TradeRecord};
use super::strategy::{MeanReversionParams, MeanReversionStrategy, Strategy};
use super::trades::{ClosedTrade, match_round_trips};
use crate::ports::data_port::MarketFeed;

#[derive(Debug, Clone, PartialEq)]
pub enum StrategyConfig {
    MeanReversion(MeanReversionParams),
}

impl StrategyConfig {
    pub fn build(&self, symbols: &[String]) -> Result<Box<dyn Strategy>, BackloopError> {
        match self {
            StrategyConfig::MeanReversion(params) => Ok(Box::new(MeanReversionStrategy::new(
                symbols,
                params.clone(),
            )?)),
        }
    }
}

impl Default for StrategyConfig {
    fn default() -> Self {
        StrategyConfig::MeanReversion(MeanReversionParams::default())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub symbols: Vec<String>,
    pub portfolio: PortfolioConfig,
    pub strategy: StrategyConfig,
    pub execution: ExecutionConfig,
    /// Seed for the execution simulator's latency and slippage draws.
    pub seed: u64,
    pub periods_per_year: f64,
}

impl BacktestConfig {
    pub fn new(symbols: Vec<String>) -> Self {
        BacktestConfig {
            symbols,
            portfolio: PortfolioConfig::default(),
            strategy: StrategyConfig::default(),
            execution: ExecutionConfig::default(),
            seed: 42,
            periods_per_year: DEFAULT_PERIODS_PER_YEAR,
        }
    }

    pub fn validate(&self) -> Result<(), BackloopError> {
        if self.symbols.is_empty() {
            return Err(BackloopError::missing("backtest", "symbols"));
        }
        let mut seen = HashSet::new();
        for symbol in &self.symbols {
            if symbol.trim().is_empty() {
                return Err(BackloopError::invalid(
                    "backtest",
                    "symbols",
                    "empty symbol in list",
                ));
            }
            if !seen.insert(symbol.as_str()) {
                return Err(BackloopError::invalid(
                    "backtest",
                    "symbols",
                    format!("duplicate symbol: {symbol}"),
                ));
            }
        }
        if !self.periods_per_year.is_finite() || self.periods_per_year <= 0.0 {
            return Err(BackloopError::invalid(
                "backtest",
                "periods_per_year",
                "periods_per_year must be positive",
            ));
        }
        self.portfolio.validate()?;
        self.execution.validate()?;
        match &self.strategy {
            StrategyConfig::MeanReversion(params) => params.validate()?,
        }
        Ok(())
    }

    /// Equity points per year: one point is recorded per symbol per step,
    /// so `periods_per_year` is scaled by the symbol count.
    pub fn equity_points_per_year(&self) -> f64 {
        self.periods_per_year * self.symbols.len().max(1) as f64
    }
}

/// Mutable state shared by the registered handlers for one run.
pub struct Session<F> {
    pub feed: F,
    pub portfolio: Portfolio,
    pub execution: ExecutionSimulator,
    pub strategy: Box<dyn Strategy>,
}

/// Plain-data outcome of a run.
#[derive(Debug, Clone)]
pub struct BacktestResult {
    pub strategy_name: String,
    pub portfolio: PortfolioSnapshot,
    pub equity_curve: Vec<EquityPoint>,
    pub trade_log: Vec<TradeRecord>,
    pub closed_trades: Vec<ClosedTrade>,
    pub steps: usize,
    pub events_handled: usize,
}

pub struct Backtest<F> {
    dispatcher: EventDispatcher<Session<F>>,
    session: Session<F>,
    steps: usize,
    events_handled: usize,
}

impl<F: MarketFeed + 'static> Backtest<F> {
    pub fn new(config: &BacktestConfig, feed: F) -> Result<Self, BackloopError> {
        config.validate()?;
        let strategy = config.strategy.build(&config.symbols)?;
        Self::with_strategy(config, feed, strategy)
    }

    /// Build around a caller-supplied strategy.
    pub fn with_strategy(
        config: &BacktestConfig,
        feed: F,
        strategy: Box<dyn Strategy>,
    ) -> Result<Self, BackloopError> {
        config.validate()?;
        let session = Session {
            feed,
            portfolio: Portfolio::new(config.portfolio.clone())?,
            execution: ExecutionSimulator::new(config.execution.clone(), config.seed)?,
            strategy,
        };

        let mut dispatcher = EventDispatcher::new();
        register_handlers(&mut dispatcher);

        Ok(Backtest {
            dispatcher,
            session,
            steps: 0,
            events_handled: 0,
        })
    }

    /// Attach an extra handler after the built-in ones for `kind`.
    pub fn register<H>(&mut self, kind: EventKind, handler: H)
    where
        H: FnMut(&mut Session<F>, &Event, &mut EventQueue) + 'static,
    {
        self.dispatcher.register(kind, handler);
    }

    pub fn session(&self) -> &Session<F> {
        &self.session
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Feed the next bar of every symbol and drain all resulting events.
    /// Returns `false` once the feed is exhausted.
    pub fn step(&mut self) -> bool {
        let Some(events) = self.session.feed.next_bars() else {
            return false;
        };
        for event in events {
            self.dispatcher.enqueue(event);
        }
        self.events_handled += self.dispatcher.drain(&mut self.session);
        self.steps += 1;
        true
    }

    pub fn run(mut self) -> BacktestResult {
        info!(
            strategy = self.session.strategy.name(),
            symbols = ?self.session.feed.symbols(),
            initial_capital = self.session.portfolio.initial_capital(),
            "starting backtest"
        );

        while self.step() {}

        let result = self.into_result();
        info!(
            steps = result.steps,
            events = result.events_handled,
            fills = result.trade_log.len(),
            final_equity = result.portfolio.total_equity,
            "backtest complete"
        );
        result
    }

    fn into_result(self) -> BacktestResult {
        let portfolio = &self.session.portfolio;
        let trade_log = portfolio.trade_log().to_vec();
        BacktestResult {
            strategy_name: self.session.strategy.name().to_string(),
            portfolio: portfolio.snapshot(),
            equity_curve: portfolio.equity_curve().to_vec(),
            closed_trades: match_round_trips(&trade_log),
            trade_log,
            steps: self.steps,
            events_handled: self.events_handled,
        }
    }
}

fn register_handlers<F: MarketFeed + 'static>(dispatcher: &mut EventDispatcher<Session<F>>) {
    dispatcher.register(EventKind::Market, |s: &mut Session<F>, event, _| {
        if let Event::Market(bar) = event {
            s.portfolio
                .update_price(&bar.symbol, bar.close, bar.timestamp);
        }
    });

    dispatcher.register(EventKind::Market, |s: &mut Session<F>, event, _| {
        if let Event::Market(bar) = event {
            s.execution.update_price(&bar.symbol, bar.close);
        }
    });

    dispatcher.register(EventKind::Market, |s: &mut Session<F>, event, queue| {
        let Event::Market(bar) = event else { return };
        if let Some(signal) = s.strategy.calculate_signals(bar, &s.feed) {
            debug!(
                symbol = %signal.symbol,
                signal = ?signal.signal_type,
                strength = signal.strength,
                "signal"
            );
            queue.push(signal);
        }
    });

    dispatcher.register(EventKind::Signal, |s: &mut Session<F>, event, queue| {
        let Event::Signal(signal) = event else { return };
        if let Some(order) = s.portfolio.process_signal(signal) {
            debug!(
                symbol = %order.symbol,
                direction = %order.direction,
                quantity = order.quantity,
                "order"
            );
            queue.push(order);
        }
    });

    dispatcher.register(EventKind::Order, |s: &mut Session<F>, event, queue| {
        let Event::Order(order) = event else { return };
        if let Some(fill) = s.execution.execute(order) {
            debug!(
                symbol = %fill.symbol,
                direction = %fill.direction,
                quantity = fill.quantity,
                price = fill.fill_price,
                commission = fill.commission,
                "fill"
            );
            queue.push(fill);
        }
    });

    dispatcher.register(EventKind::Fill, |s: &mut Session<F>, event, _| {
        if let Event::Fill(fill) = event {
            s.portfolio.process_fill(fill);
        }
    });
}
