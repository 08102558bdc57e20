//! Simulated execution: latency, slippage and commission.
//!
//! Latency is bookkeeping only. The fill is stamped `order.timestamp + latency`
//! and carries the latency as an explicit offset; nothing sleeps.

use chrono::Duration;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use tracing::warn;

use super::error::BackloopError;
use super::event::{Direction, FillEvent, OrderEvent, OrderType};

/// Slippage multiplier applied to market orders.
const MARKET_ORDER_SLIPPAGE_MULT: f64 = 1.5;
/// Bounds of the uniform factor scaling each slippage draw.
const SLIPPAGE_JITTER: (f64, f64) = (0.5, 1.5);

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionConfig {
    /// Base slippage as a fraction of price (0.001 = 0.1%).
    pub slippage_pct: f64,
    /// Commission as a fraction of fill notional.
    pub commission_pct: f64,
    pub latency_min_ms: f64,
    pub latency_max_ms: f64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        ExecutionConfig {
            slippage_pct: 0.001,
            commission_pct: 0.001,
            latency_min_ms: 10.0,
            latency_max_ms: 50.0,
        }
    }
}

impl ExecutionConfig {
    /// Zero-cost, zero-latency execution.
    pub fn frictionless() -> Self {
        ExecutionConfig {
            slippage_pct: 0.0,
            commission_pct: 0.0,
            latency_min_ms: 0.0,
            latency_max_ms: 0.0,
        }
    }

    pub fn validate(&self) -> Result<(), BackloopError> {
        if !self.slippage_pct.is_finite() || self.slippage_pct < 0.0 {
            return Err(BackloopError::invalid(
                "execution",
                "slippage_pct",
                "slippage_pct must be non-negative",
            ));
        }
        if !self.commission_pct.is_finite() || self.commission_pct < 0.0 {
            return Err(BackloopError::invalid(
                "execution",
                "commission_pct",
                "commission_pct must be non-negative",
            ));
        }
        if !self.latency_min_ms.is_finite() || self.latency_min_ms < 0.0 {
            return Err(BackloopError::invalid(
                "execution",
                "latency_min_ms",
                "latency_min_ms must be non-negative",
            ));
        }
        if !self.latency_max_ms.is_finite() || self.latency_max_ms < self.latency_min_ms {
            return Err(BackloopError::invalid(
                "execution",
                "latency_max_ms",
                "latency_max_ms must not be below latency_min_ms",
            ));
        }
        Ok(())
    }
}

/// Commission: fill_price * quantity * commission_pct.
pub fn calculate_commission(fill_price: f64, quantity: u64, commission_pct: f64) -> f64 {
    fill_price * quantity as f64 * commission_pct
}

/// Move `base_price` against the trader by `slippage_pct`: up for buys, down
/// for sells.
pub fn apply_slippage(base_price: f64, slippage_pct: f64, direction: Direction) -> f64 {
    let slippage = base_price * slippage_pct;
    match direction {
        Direction::Buy => base_price + slippage,
        Direction::Sell => base_price - slippage,
    }
}

pub struct ExecutionSimulator<R = StdRng> {
    config: ExecutionConfig,
    last_prices: HashMap<String, f64>,
    rng: R,
}

impl ExecutionSimulator<StdRng> {
    pub fn new(config: ExecutionConfig, seed: u64) -> Result<Self, BackloopError> {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> ExecutionSimulator<R> {
    pub fn with_rng(config: ExecutionConfig, rng: R) -> Result<Self, BackloopError> {
        config.validate()?;
        Ok(ExecutionSimulator {
            config,
            last_prices: HashMap::new(),
            rng,
        })
    }

    pub fn update_price(&mut self, symbol: &str, price: f64) {
        self.last_prices.insert(symbol.to_string(), price);
    }

    pub fn last_price(&self, symbol: &str) -> Option<f64> {
        self.last_prices.get(symbol).copied()
    }

    /// Fill `order` against the last known price for its symbol.
    ///
    /// Returns `None`, logging a warning, when the symbol has never been
    /// quoted.
    pub fn execute(&mut self, order: &OrderEvent) -> Option<FillEvent> {
        let latency = self.draw_latency();

        let Some(base_price) = self.last_price(&order.symbol) else {
            warn!(
                symbol = %order.symbol,
                quantity = order.quantity,
                direction = %order.direction,
                "no market price available, dropping order"
            );
            return None;
        };

        let slippage_pct = self.draw_slippage_pct(order.order_type);
        let fill_price = apply_slippage(base_price, slippage_pct, order.direction);
        let commission =
            calculate_commission(fill_price, order.quantity, self.config.commission_pct);

        Some(FillEvent {
            timestamp: order.timestamp + latency,
            symbol: order.symbol.clone(),
            quantity: order.quantity,
            direction: order.direction,
            fill_price,
            commission,
            slippage: (fill_price - base_price).abs(),
            latency,
        })
    }

    fn draw_latency(&mut self) -> Duration {
        let (min, max) = (self.config.latency_min_ms, self.config.latency_max_ms);
        let ms = if max > min {
            self.rng.gen_range(min..=max)
        } else {
            min
        };
        Duration::microseconds((ms * 1000.0).round() as i64)
    }

    fn draw_slippage_pct(&mut self, order_type: OrderType) -> f64 {
        let base = match order_type {
            OrderType::Market => self.config.slippage_pct * MARKET_ORDER_SLIPPAGE_MULT,
            OrderType::Limit => self.config.slippage_pct,
        };
        base * self.rng.gen_range(SLIPPAGE_JITTER.0..=SLIPPAGE_JITTER.1)
    }
}
