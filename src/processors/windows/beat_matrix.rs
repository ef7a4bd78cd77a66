// src/processors/windows/beat_matrix.rs

use std::str::FromStr;

use log::trace;
use ndarray::{Array2, ArrayView1};

use super::sliding_window::{extract_windows, WindowPolicy};
use crate::error::{EcgError, Result};

/// Statistic of the RR intervals used to size beats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RrStatistic {
    Mean,
    Median,
    Min,
    Max,
}

impl FromStr for RrStatistic {
    type Err = EcgError;

    fn from_str(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "mean" => Ok(RrStatistic::Mean),
            "median" => Ok(RrStatistic::Median),
            "min" => Ok(RrStatistic::Min),
            "max" => Ok(RrStatistic::Max),
            _ => Err(EcgError::InvalidParameter(format!("unknown RR statistic '{}'", name))),
        }
    }
}

/// Width of every beat window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeatWidth {
    /// Fixed number of samples
    Fixed(usize),
    /// Derived from the intervals between consecutive R-peaks
    FromRr(RrStatistic),
}

/// Resolve a beat width in samples from the R-peak positions
pub fn resolve_beat_width(r_peaks: &[isize], width: BeatWidth) -> Result<usize> {
    let stat = match width {
        BeatWidth::Fixed(size) => return Ok(size),
        BeatWidth::FromRr(stat) => stat,
    };

    if r_peaks.len() < 2 {
        return Err(EcgError::InvalidCenters(format!(
            "at least 2 R-peaks are needed for RR intervals, got {}",
            r_peaks.len()
        )));
    }

    let mut rr: Vec<isize> = r_peaks.windows(2).map(|w| w[1] - w[0]).collect();

    let size = match stat {
        RrStatistic::Mean => rr.iter().sum::<isize>() as f64 / rr.len() as f64,
        RrStatistic::Median => {
            rr.sort_unstable();
            let mid = rr.len() / 2;
            if rr.len() % 2 == 0 {
                (rr[mid - 1] + rr[mid]) as f64 / 2.0
            } else {
                rr[mid] as f64
            }
        }
        RrStatistic::Min => rr.iter().copied().min().unwrap_or(0) as f64,
        RrStatistic::Max => rr.iter().copied().max().unwrap_or(0) as f64,
    };

    // Unsorted or repeated peaks give non-positive intervals
    if size < 1.0 {
        return Err(EcgError::InvalidCenters(format!(
            "RR statistic {:?} is {}, R-peaks must be strictly increasing",
            stat, size
        )));
    }

    Ok(size as usize)
}

/// Stack the beats centered on `r_peaks` into a matrix (one beat per row)
///
/// Args:
///     signal: single-lead ECG
///     r_peaks: R-peak positions in samples, supplied by the caller
///     width: beat window width
///     policy: clip drops beats at the signal edges, wrap keeps every beat
///
/// Returns:
///     Beat matrix of shape (n_beats, beat_width)
pub fn beat_matrix(
    signal: ArrayView1<'_, f64>,
    r_peaks: &[isize],
    width: BeatWidth,
    policy: WindowPolicy,
) -> Result<Array2<f64>> {
    let size = resolve_beat_width(r_peaks, width)?;
    trace!("beat matrix: {} peaks, width {} samples", r_peaks.len(), size);

    let beats = extract_windows(signal, r_peaks, size, policy)?;
    Ok(beats.windows)
}
