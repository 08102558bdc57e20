//! Signal generation: the `Strategy` trait and the mean-reversion reference
//! strategy.

use std::collections::HashMap;

use super::error::BackloopError;
use super::event::{MarketEvent, SignalEvent, SignalType};
use super::rolling;
use crate::ports::data_port::BarHistory;

pub trait Strategy {
    fn name(&self) -> &str;

    /// Inspect a market event and optionally emit a signal for its symbol.
    fn calculate_signals(
        &mut self,
        event: &MarketEvent,
        history: &dyn BarHistory,
    ) -> Option<SignalEvent>;
}

/// Intended exposure per symbol. Updated when a signal is emitted, not when
/// the resulting order fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Exposure {
    #[default]
    Flat,
    Long,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MeanReversionParams {
    pub window: usize,
    pub num_std: f64,
}

impl Default for MeanReversionParams {
    fn default() -> Self {
        MeanReversionParams {
            window: 20,
            num_std: 2.0,
        }
    }
}

impl MeanReversionParams {
    pub fn validate(&self) -> Result<(), BackloopError> {
        if self.window < 2 {
            return Err(BackloopError::invalid(
                "strategy",
                "window",
                "window must be at least 2",
            ));
        }
        if !self.num_std.is_finite() || self.num_std <= 0.0 {
            return Err(BackloopError::invalid(
                "strategy",
                "num_std",
                "num_std must be positive",
            ));
        }
        Ok(())
    }
}

/// Bollinger-band mean reversion over a rolling window of closes.
///
/// - Flat and close below the lower band: LONG, strength `min(1, (lower - close) / σ)`.
/// - Long and close above the upper band: EXIT, strength `min(1, (close - upper) / σ)`.
/// - Long and close within half a σ of the mean: EXIT, strength 0.5.
///
/// σ is the sample standard deviation; a flat window (σ = 0) emits nothing.
#[derive(Debug, Clone)]
pub struct MeanReversionStrategy {
    params: MeanReversionParams,
    exposure: HashMap<String, Exposure>,
}

impl MeanReversionStrategy {
    pub fn new(symbols: &[String], params: MeanReversionParams) -> Result<Self, BackloopError> {
        params.validate()?;
        if symbols.is_empty() {
            return Err(BackloopError::missing("backtest", "symbols"));
        }
        let exposure = symbols
            .iter()
            .map(|s| (s.clone(), Exposure::Flat))
            .collect();
        Ok(MeanReversionStrategy { params, exposure })
    }

    pub fn exposure(&self, symbol: &str) -> Option<Exposure> {
        self.exposure.get(symbol).copied()
    }
}

impl Strategy for MeanReversionStrategy {
    fn name(&self) -> &str {
        "mean_reversion"
    }

    fn calculate_signals(
        &mut self,
        event: &MarketEvent,
        history: &dyn BarHistory,
    ) -> Option<SignalEvent> {
        let exposure = self.exposure.get_mut(&event.symbol)?;
        let bars = history.latest_bars(&event.symbol, self.params.window)?;
        let bands = rolling::bands(bars, self.params.num_std)?;
        let sigma = bands.stddev;
        if sigma <= 0.0 {
            return None;
        }

        let close = event.close;
        let (signal_type, strength, next) = match *exposure {
            Exposure::Flat if close < bands.lower => (
                SignalType::Long,
                ((bands.lower - close) / sigma).min(1.0),
                Exposure::Long,
            ),
            Exposure::Long if close > bands.upper => (
                SignalType::Exit,
                ((close - bands.upper) / sigma).min(1.0),
                Exposure::Flat,
            ),
            Exposure::Long if (close - bands.middle).abs() < 0.5 * sigma => {
                (SignalType::Exit, 0.5, Exposure::Flat)
            }
            _ => return None,
        };

        *exposure = next;
        Some(SignalEvent::new(
            event.timestamp,
            event.symbol.clone(),
            signal_type,
            strength,
        ))
    }
}
