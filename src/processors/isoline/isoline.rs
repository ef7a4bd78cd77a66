// src/processors/isoline/isoline.rs

use std::fmt;
use std::str::FromStr;

use log::trace;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, ArrayViewMut2, Axis};
use rayon::prelude::*;

use crate::error::{EcgError, Result};

/// Default number of histogram bins
pub const DEFAULT_BINS: usize = 10;

/// Estimator of the isoelectric level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IsolineEngine {
    /// Most frequent sample value, smallest value on ties
    #[default]
    Exact,
    /// Left edge of the fullest bin of an equal-width histogram
    Histogram { bins: usize },
}

impl FromStr for IsolineEngine {
    type Err = EcgError;

    fn from_str(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "exact" | "scipy" => Ok(IsolineEngine::Exact),
            "histogram" | "numpy" => Ok(IsolineEngine::Histogram { bins: DEFAULT_BINS }),
            _ => Err(EcgError::UnknownEngine(name.to_string())),
        }
    }
}

impl fmt::Display for IsolineEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IsolineEngine::Exact => write!(f, "exact"),
            IsolineEngine::Histogram { bins } => write!(f, "histogram({} bins)", bins),
        }
    }
}

/// Samples discarded at each end before estimating the isoline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IsolineLimits {
    pub start: usize,
    pub stop: usize,
}

impl IsolineLimits {
    pub fn new(start: usize, stop: usize) -> Self {
        IsolineLimits { start, stop }
    }

    /// Sample range the isoline is computed on
    fn range(&self, n_samples: usize) -> Result<std::ops::Range<usize>> {
        let end = n_samples.saturating_sub(self.stop);
        if self.start >= end {
            return Err(EcgError::invalid_window(self.start + self.stop, n_samples));
        }
        Ok(self.start..end)
    }
}

/// Most frequent value, smallest one on ties
fn exact_mode(values: ArrayView1<'_, f64>) -> Result<f64> {
    if values.iter().any(|v| v.is_nan()) {
        return Err(EcgError::InvalidParameter("signal contains NaN".to_string()));
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let mut best = sorted[0];
    let mut best_count = 0;
    let mut i = 0;
    while i < sorted.len() {
        let value = sorted[i];
        let mut j = i;
        while j < sorted.len() && sorted[j] == value {
            j += 1;
        }
        if j - i > best_count {
            best = value;
            best_count = j - i;
        }
        i = j;
    }

    Ok(best)
}

/// Left edge of the fullest of `bins` equal-width bins over `[min, max]`
fn histogram_mode(values: ArrayView1<'_, f64>, bins: usize) -> Result<f64> {
    if bins == 0 {
        return Err(EcgError::InvalidParameter("histogram needs at least one bin".to_string()));
    }

    if values.iter().any(|v| !v.is_finite()) {
        return Err(EcgError::InvalidParameter("signal must be finite".to_string()));
    }

    let mut lo = values.iter().copied().fold(f64::INFINITY, f64::min);
    let mut hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if lo == hi {
        lo -= 0.5;
        hi += 0.5;
    }

    let width = (hi - lo) / bins as f64;
    let mut counts = vec![0usize; bins];
    for &v in values.iter() {
        // Last bin is closed on the right
        let bin = (((v - lo) / width) as usize).min(bins - 1);
        counts[bin] += 1;
    }

    let mut fullest = 0;
    for (b, &count) in counts.iter().enumerate() {
        if count > counts[fullest] {
            fullest = b;
        }
    }

    Ok(lo + fullest as f64 * width)
}

/// Isoelectric level of a single channel
///
/// Args:
///     signal: single-lead ECG
///     engine: mode estimator
///     limits: samples to discard at the start and end of the signal
pub fn isoline(
    signal: ArrayView1<'_, f64>,
    engine: IsolineEngine,
    limits: IsolineLimits,
) -> Result<f64> {
    let range = limits.range(signal.len())?;
    let view = signal.slice(ndarray::s![range]);
    trace!("isoline over {} samples with {} engine", view.len(), engine);

    match engine {
        IsolineEngine::Exact => exact_mode(view),
        IsolineEngine::Histogram { bins } => histogram_mode(view, bins),
    }
}

/// Shift the signal so its isoelectric level sits at zero
pub fn isoline_correction(
    signal: ArrayView1<'_, f64>,
    engine: IsolineEngine,
    limits: IsolineLimits,
) -> Result<Array1<f64>> {
    let iso = isoline(signal, engine, limits)?;
    Ok(signal.mapv(|x| x - iso))
}

/// Isoelectric level of every channel (one value per column)
pub fn isoline_channels(
    data: ArrayView2<'_, f64>,
    engine: IsolineEngine,
    limits: IsolineLimits,
) -> Result<Array1<f64>> {
    let levels: Vec<Result<f64>> = data
        .axis_iter(Axis(1))
        .into_par_iter()
        .map(|channel| isoline(channel, engine, limits))
        .collect();

    levels.into_iter().collect::<Result<Vec<f64>>>().map(Array1::from)
}

/// Per-channel isoline correction
pub fn isoline_correction_channels(
    data: ArrayView2<'_, f64>,
    engine: IsolineEngine,
    limits: IsolineLimits,
) -> Result<Array2<f64>> {
    let levels = isoline_channels(data, engine, limits)?;
    Ok(&data - &levels)
}

/// Per-channel isoline correction in place
pub fn isoline_correction_inplace(
    mut data: ArrayViewMut2<'_, f64>,
    engine: IsolineEngine,
    limits: IsolineLimits,
) -> Result<()> {
    let levels = isoline_channels(data.view(), engine, limits)?;
    data -= &levels;
    Ok(())
}
