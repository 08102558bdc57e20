//! Seeded synthetic bar generator.
//!
//! Closes follow a geometric random walk pulled back toward the starting
//! price; open is the previous close and high/low extend up to 0.5% past
//! the body. Each symbol draws from its own `StdRng` derived from the master
//! seed and the symbol name, so a series does not depend on which other
//! symbols are fetched or in what order.

use crate::domain::error::BackloopError;
use crate::domain::ohlcv::Bar;
use crate::ports::data_port::DataPort;
use chrono::{Duration, NaiveDateTime};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, LogNormal, Normal};

const INITIAL_PRICE: f64 = 100.0;
const DRIFT: f64 = 0.0001;
const VOLATILITY: f64 = 0.02;
const REVERSION_STRENGTH: f64 = 0.05;
const SPREAD_PCT: f64 = 0.005;
/// Parameters of the log-normal volume draw.
const VOLUME_MU: f64 = 10.0;
const VOLUME_SIGMA: f64 = 1.0;

pub struct SyntheticAdapter {
    seed: u64,
    interval: Duration,
}

impl SyntheticAdapter {
    pub fn new(seed: u64, interval_minutes: i64) -> Result<Self, BackloopError> {
        if interval_minutes < 1 {
            return Err(BackloopError::invalid(
                "data",
                "interval_minutes",
                "interval_minutes must be a positive integer",
            ));
        }
        Ok(Self {
            seed,
            interval: Duration::minutes(interval_minutes),
        })
    }

    /// Per-symbol sub-seed: blake3 over the master seed and the symbol bytes.
    fn sub_seed(&self, symbol: &str) -> u64 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.seed.to_le_bytes());
        hasher.update(symbol.as_bytes());
        let hash = hasher.finalize();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&hash.as_bytes()[..8]);
        u64::from_le_bytes(bytes)
    }

    fn rng_for(&self, symbol: &str) -> StdRng {
        StdRng::seed_from_u64(self.sub_seed(symbol))
    }
}

fn distribution_err(e: impl std::fmt::Display) -> BackloopError {
    BackloopError::Data {
        reason: format!("synthetic distribution: {e}"),
    }
}

impl DataPort for SyntheticAdapter {
    fn fetch_bars(
        &self,
        symbol: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<Bar>, BackloopError> {
        let mut rng = self.rng_for(symbol);
        let mut bars = Vec::new();
        let mut timestamp = start;
        let mut prev_close = INITIAL_PRICE;
        let volume_dist = LogNormal::new(VOLUME_MU, VOLUME_SIGMA).map_err(distribution_err)?;

        while timestamp <= end {
            let close = if bars.is_empty() {
                INITIAL_PRICE
            } else {
                // Relative pull toward the starting price.
                let reversion = REVERSION_STRENGTH * (INITIAL_PRICE - prev_close) / prev_close;
                let shock = Normal::new(DRIFT + reversion, VOLATILITY)
                    .map_err(distribution_err)?
                    .sample(&mut rng);
                prev_close * (1.0 + shock)
            };
            let open = prev_close;
            let spread = close * SPREAD_PCT;
            let high = open.max(close) + spread * rng.gen_range(0.0..1.0);
            let low = (open.min(close) - spread * rng.gen_range(0.0..1.0)).max(0.0);
            let volume = volume_dist.sample(&mut rng);

            bars.push(Bar {
                symbol: symbol.to_string(),
                timestamp,
                open,
                high,
                low,
                close,
                volume,
            });

            prev_close = close;
            timestamp += self.interval;
        }

        if bars.is_empty() {
            return Err(BackloopError::NoData {
                symbol: symbol.to_string(),
            });
        }
        Ok(bars)
    }
}
