// src/processors/baseline/spline_baseline.rs

use log::{debug, trace};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, ArrayViewMut1, ArrayViewMut2, Zip};
use rayon::prelude::*;

use super::spline::{BSpline, Extrapolation, MAX_SPLINE_DEGREE};
use crate::error::{EcgError, Result};
use crate::processors::windows::{extract_windows, WindowPolicy};

/// Parameters of the spline baseline estimator
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplineBaselineConfig {
    /// Samples searched around each fiducial for the isoelectric level
    pub window_size: usize,
    /// Spline degree
    pub order: usize,
    pub extrapolation: Extrapolation,
}

impl SplineBaselineConfig {
    pub fn new(window_size: usize) -> Self {
        SplineBaselineConfig {
            window_size,
            order: 3,
            extrapolation: Extrapolation::Linear,
        }
    }

    pub fn with_order(mut self, order: usize) -> Self {
        self.order = order;
        self
    }

    pub fn with_extrapolation(mut self, extrapolation: Extrapolation) -> Self {
        self.extrapolation = extrapolation;
        self
    }
}

/// Anchor points of the baseline spline, sorted by index without duplicates
#[derive(Debug, Clone, PartialEq)]
pub struct SplineAnchors {
    pub indices: Vec<usize>,
    pub values: Vec<f64>,
}

impl SplineAnchors {
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Median that is always one of the observations: `sorted[(len - 1) / 2]`.
///
/// For an even number of samples this is the lower of the two middle values.
pub fn closest_observation_median(values: ArrayView1<'_, f64>) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    let mid = (sorted.len() - 1) / 2;
    let (_, median, _) = sorted
        .select_nth_unstable_by(mid, |a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    Some(*median)
}

/// Position of the first sample closest to `target`
fn argmin_distance(values: ArrayView1<'_, f64>, target: f64) -> usize {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (i, &v) in values.iter().enumerate() {
        let dist = (v - target).abs();
        if dist < best_dist {
            best = i;
            best_dist = dist;
        }
    }
    best
}

/// Find the isoelectric anchor inside the window around each fiducial.
///
/// Windows that do not fit in the signal are skipped. Inside each window the
/// anchor is the first sample closest to the window median. With an even
/// `window_size` the window holds one more sample before the fiducial than
/// after it.
pub fn spline_anchors(
    signal: ArrayView1<'_, f64>,
    fiducials: &[isize],
    window_size: usize,
) -> Result<SplineAnchors> {
    let extracted = extract_windows(signal, fiducials, window_size, WindowPolicy::Clip)?;

    let mut indices: Vec<usize> = extracted
        .windows
        .outer_iter()
        .zip(extracted.onsets.iter())
        .filter_map(|(row, &onset)| {
            closest_observation_median(row).map(|median| onset + argmin_distance(row, median))
        })
        .collect();

    // Duplicate fiducials give identical anchors, keep one
    let n_found = indices.len();
    indices.sort();
    indices.dedup();
    if indices.len() < n_found {
        debug!("dropped {} duplicate spline anchors", n_found - indices.len());
    }

    let values = indices.iter().map(|&i| signal[i]).collect();

    Ok(SplineAnchors { indices, values })
}

/// Baseline curve through the isoelectric anchors found around `fiducials`
pub fn spline_baseline(
    signal: ArrayView1<'_, f64>,
    fiducials: &[isize],
    config: &SplineBaselineConfig,
) -> Result<Array1<f64>> {
    trace!(
        "spline baseline: {} samples, {} fiducials, window {}, order {}",
        signal.len(),
        fiducials.len(),
        config.window_size,
        config.order
    );

    if config.order == 0 || config.order > MAX_SPLINE_DEGREE {
        return Err(EcgError::InvalidParameter(format!(
            "spline order must be in 1..={}, got {}",
            MAX_SPLINE_DEGREE, config.order
        )));
    }

    let anchors = spline_anchors(signal, fiducials, config.window_size)?;

    let required = config.order + 1;
    if anchors.len() < required {
        return Err(EcgError::InsufficientAnchors { found: anchors.len(), required });
    }

    let x: Vec<f64> = anchors.indices.iter().map(|&i| i as f64).collect();
    let spline = BSpline::interpolate(&x, &anchors.values, config.order, config.extrapolation)?;

    Ok(spline.evaluate_samples(signal.len()))
}

/// Spline baseline with linear extrapolation beyond the outermost anchors
///
/// Args:
///     signal: single-lead ECG
///     fiducials: PQ or TP points (samples) known to lie on the isoelectric line
///     window_size: samples searched around each fiducial
///     spline_order: degree of the interpolating spline
///
/// Returns:
///     Baseline curve of the same length as the signal
pub fn estimate_spline_baseline(
    signal: ArrayView1<'_, f64>,
    fiducials: &[isize],
    window_size: usize,
    spline_order: usize,
) -> Result<Array1<f64>> {
    let config = SplineBaselineConfig::new(window_size).with_order(spline_order);
    spline_baseline(signal, fiducials, &config)
}

/// Signal with the spline baseline removed
pub fn remove_spline_baseline(
    signal: ArrayView1<'_, f64>,
    fiducials: &[isize],
    config: &SplineBaselineConfig,
) -> Result<Array1<f64>> {
    let baseline = spline_baseline(signal, fiducials, config)?;
    Ok(&signal - &baseline)
}

/// Subtract the spline baseline in place
pub fn remove_spline_baseline_inplace(
    mut signal: ArrayViewMut1<'_, f64>,
    fiducials: &[isize],
    config: &SplineBaselineConfig,
) -> Result<()> {
    let baseline = spline_baseline(signal.view(), fiducials, config)?;
    signal -= &baseline;
    Ok(())
}

/// Spline baseline of every channel, processed in parallel
///
/// Args:
///     data: signal of shape (n_samples, n_channels)
///     fiducials: shape (n_fiducials, 1) shared by all channels, or
///         (n_fiducials, n_channels) with one column per channel
///     config: estimator parameters
///
/// Returns:
///     Baselines of shape (n_samples, n_channels)
pub fn spline_baseline_channels(
    data: ArrayView2<'_, f64>,
    fiducials: ArrayView2<'_, isize>,
    config: &SplineBaselineConfig,
) -> Result<Array2<f64>> {
    let (n_samples, n_channels) = data.dim();
    let fid_columns = fiducials.ncols();

    if fid_columns != 1 && fid_columns != n_channels {
        return Err(EcgError::ShapeMismatch {
            expected: format!("fiducials with 1 or {} columns", n_channels),
            found: format!("{:?}", fiducials.shape()),
        });
    }

    // Process each channel in parallel
    let channel_results: Vec<Result<Array1<f64>>> = (0..n_channels)
        .into_par_iter()
        .map(|c| {
            let column = if fid_columns == 1 { 0 } else { c };
            let channel_fiducials = fiducials.column(column).to_vec();
            spline_baseline(data.column(c), &channel_fiducials, config)
        })
        .collect();

    // Copy results back to output array
    let mut output = Array2::<f64>::zeros((n_samples, n_channels));
    for (c, baseline) in channel_results.into_iter().enumerate() {
        output.column_mut(c).assign(&baseline?);
    }

    Ok(output)
}

/// Signal with the per-channel spline baseline removed
pub fn remove_spline_baseline_channels(
    data: ArrayView2<'_, f64>,
    fiducials: ArrayView2<'_, isize>,
    config: &SplineBaselineConfig,
) -> Result<Array2<f64>> {
    let mut output = spline_baseline_channels(data, fiducials, config)?;
    Zip::from(&mut output)
        .and(&data)
        .par_for_each(|baseline, &x| *baseline = x - *baseline);
    Ok(output)
}

/// Subtract the per-channel spline baseline in place
pub fn remove_spline_baseline_channels_inplace(
    mut data: ArrayViewMut2<'_, f64>,
    fiducials: ArrayView2<'_, isize>,
    config: &SplineBaselineConfig,
) -> Result<()> {
    let baseline = spline_baseline_channels(data.view(), fiducials, config)?;
    data -= &baseline;
    Ok(())
}
