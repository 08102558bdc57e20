//! Rolling-window statistics over closing prices.
//!
//! MEAN(n) = sum(C) / n
//! STDDEV(n) = sqrt(sum((C - MEAN)^2) / (n - 1))   (sample, Bessel-corrected)

use super::ohlcv::Bar;

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation; `None` for fewer than two values.
pub fn sample_stddev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let mean = mean(values)?;
    let variance = values
        .iter()
        .map(|v| {
            let diff = v - mean;
            diff * diff
        })
        .sum::<f64>()
        / (values.len() - 1) as f64;
    Some(variance.sqrt())
}

/// Middle, upper and lower bands around the closes of `bars`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bands {
    pub middle: f64,
    pub upper: f64,
    pub lower: f64,
    pub stddev: f64,
}

pub fn bands(bars: &[Bar], multiplier: f64) -> Option<Bands> {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let middle = mean(&closes)?;
    let stddev = sample_stddev(&closes)?;
    Some(Bands {
        middle,
        upper: middle + multiplier * stddev,
        lower: middle - multiplier * stddev,
        stddev,
    })
}
