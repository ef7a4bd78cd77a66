// src/processors/windows/sliding_window.rs

use log::{debug, warn};
use ndarray::{Array2, ArrayView1};

use crate::error::{EcgError, Result};

/// How centers whose window runs off either end of the signal are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WindowPolicy {
    /// Drop out-of-range centers from the output rows.
    #[default]
    Clip,
    /// Map every onset into range with `onset mod (n - window_size + 1)`.
    Wrap,
}

impl WindowPolicy {
    /// `Wrap` when `wrap` is set, otherwise `Clip`
    pub fn from_wrap(wrap: bool) -> Self {
        if wrap {
            WindowPolicy::Wrap
        } else {
            WindowPolicy::Clip
        }
    }
}

/// Windows cut from a signal around a set of centers.
///
/// `windows` and `onsets` are row-aligned. `valid` has one entry per input
/// center, in the input order, and is `false` where the window centered on
/// that center would not fit inside the signal.
#[derive(Debug, Clone)]
pub struct ExtractedWindows<T> {
    pub windows: Array2<T>,
    pub onsets: Vec<usize>,
    pub valid: Vec<bool>,
}

impl<T> ExtractedWindows<T> {
    /// Number of extracted rows
    pub fn len(&self) -> usize {
        self.onsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.onsets.is_empty()
    }

    /// Indices (into the input centers) whose windows were wrapped or dropped
    pub fn wrapped_indices(&self) -> Vec<usize> {
        self.valid
            .iter()
            .enumerate()
            .filter(|(_, &ok)| !ok)
            .map(|(i, _)| i)
            .collect()
    }
}

/// Onset of the window centered on `center`.
///
/// The center sits at position `window_size / 2` inside the window. For an
/// even `window_size` that leaves one more sample before the center than
/// after it. Onsets of extreme centers saturate at `isize::MIN`.
#[inline]
pub fn window_onset(center: isize, window_size: usize) -> isize {
    center.saturating_sub((window_size / 2) as isize)
}

/// Extract fixed-size windows centered on `centers`.
///
/// Args:
///     signal: 1-D signal of length n
///     centers: center indices, unsorted and possibly out of range
///     window_size: samples per window, 1 <= window_size <= n
///     policy: how out-of-range centers are resolved
///
/// Returns:
///     Row-aligned windows and onsets plus the per-center validity mask
pub fn extract_windows<T: Clone>(
    signal: ArrayView1<'_, T>,
    centers: &[isize],
    window_size: usize,
    policy: WindowPolicy,
) -> Result<ExtractedWindows<T>> {
    let n_samples = signal.len();

    // Validate parameters
    if window_size == 0 || window_size > n_samples {
        return Err(EcgError::invalid_window(window_size, n_samples));
    }

    if centers.is_empty() {
        return Err(EcgError::InvalidCenters("center set is empty".to_string()));
    }

    // Last valid onset, and number of distinct onsets
    let last_onset = (n_samples - window_size) as isize;
    let n_rows = last_onset + 1;

    let raw_onsets: Vec<isize> = centers
        .iter()
        .map(|&c| window_onset(c, window_size))
        .collect();

    let valid: Vec<bool> = raw_onsets
        .iter()
        .map(|&onset| onset >= 0 && onset <= last_onset)
        .collect();

    let n_invalid = valid.iter().filter(|&&ok| !ok).count();

    let onsets: Vec<usize> = match policy {
        WindowPolicy::Clip => {
            if n_invalid > 0 {
                debug!(
                    "{} of {} centers masked: window of {} does not fit in {} samples",
                    n_invalid,
                    centers.len(),
                    window_size,
                    n_samples
                );
            }
            raw_onsets
                .iter()
                .zip(valid.iter())
                .filter(|(_, &ok)| ok)
                .map(|(&onset, _)| onset as usize)
                .collect()
        }
        WindowPolicy::Wrap => {
            if n_invalid > 0 {
                warn!(
                    "{} of {} centers wrapped around the signal ends",
                    n_invalid,
                    centers.len()
                );
            }
            raw_onsets
                .iter()
                .map(|&onset| onset.rem_euclid(n_rows) as usize)
                .collect()
        }
    };

    // Copy every window into its row
    let windows = Array2::from_shape_fn((onsets.len(), window_size), |(row, col)| {
        signal[onsets[row] + col].clone()
    });

    Ok(ExtractedWindows { windows, onsets, valid })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, arr2, s, Array1};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn spike() -> Array1<f64> {
        arr1(&[0.0, 0.0, 0.0, 5.0, 0.0, 0.0, 0.0])
    }

    #[test]
    fn centered_window_on_spike() {
        let x = spike();
        let out = extract_windows(x.view(), &[3], 3, WindowPolicy::Clip).unwrap();
        assert_eq!(out.onsets, vec![2]);
        assert_eq!(out.valid, vec![true]);
        assert_eq!(out.windows, arr2(&[[0.0, 5.0, 0.0]]));
    }

    #[test]
    fn clip_drops_window_before_start() {
        let x = spike();
        let out = extract_windows(x.view(), &[0], 3, WindowPolicy::Clip).unwrap();
        assert_eq!(out.valid, vec![false]);
        assert!(out.is_empty());
        assert_eq!(out.windows.shape(), &[0, 3]);
        assert_eq!(out.wrapped_indices(), vec![0]);
    }

    #[test]
    fn wrap_maps_negative_onset_modulo_rows() {
        let x = spike();
        let out = extract_windows(x.view(), &[0], 3, WindowPolicy::Wrap).unwrap();
        // (-1) mod (7 - 3 + 1) = 4
        assert_eq!(out.onsets, vec![4]);
        assert_eq!(out.valid, vec![false]);
        assert_eq!(out.windows, arr2(&[[0.0, 0.0, 0.0]]));
    }

    #[test]
    fn wrap_maps_onset_past_end() {
        let x = spike();
        // onset 5 > n - w = 4, wraps to 0
        let out = extract_windows(x.view(), &[6], 3, WindowPolicy::Wrap).unwrap();
        assert_eq!(out.onsets, vec![0]);
        assert_eq!(out.valid, vec![false]);
    }

    #[test]
    fn even_window_is_left_weighted() {
        let x: Array1<f64> = (0..10).map(|v| v as f64).collect();
        let out = extract_windows(x.view(), &[5], 4, WindowPolicy::Clip).unwrap();
        assert_eq!(out.onsets, vec![3]);
        assert_eq!(out.windows.row(0).to_vec(), vec![3.0, 4.0, 5.0, 6.0]);
        // The center lands at position window_size / 2
        assert_eq!(out.windows[[0, 2]], 5.0);
    }

    #[test]
    fn window_larger_than_signal_fails() {
        let x = spike();
        let err = extract_windows(x.view(), &[3], 8, WindowPolicy::Clip).unwrap_err();
        assert!(matches!(err, EcgError::InvalidWindow { window_size: 8, signal_len: 7 }));
    }

    #[test]
    fn zero_window_fails() {
        let x = spike();
        let err = extract_windows(x.view(), &[3], 0, WindowPolicy::Wrap).unwrap_err();
        assert!(matches!(err, EcgError::InvalidWindow { .. }));
    }

    #[test]
    fn empty_centers_fail() {
        let x = spike();
        let err = extract_windows(x.view(), &[], 3, WindowPolicy::Clip).unwrap_err();
        assert!(matches!(err, EcgError::InvalidCenters(_)));
    }

    #[test]
    fn full_length_window_has_single_onset() {
        let x = spike();
        let out = extract_windows(x.view(), &[3, 10, -4], 7, WindowPolicy::Wrap).unwrap();
        assert_eq!(out.onsets, vec![0, 0, 0]);
        assert_eq!(out.valid, vec![true, false, false]);
    }

    #[test]
    fn clip_rows_match_signal_slices() {
        let mut rng = StdRng::seed_from_u64(11);
        let x: Array1<f64> = (0..30).map(|_| rng.random_range(-1.0..1.0)).collect();
        let centers: Vec<isize> = (0..40).step_by(4).collect();

        for window_size in 1..=12 {
            let out = extract_windows(x.view(), &centers, window_size, WindowPolicy::Clip).unwrap();
            let last = (x.len() - window_size) as isize;

            for (i, &c) in centers.iter().enumerate() {
                let onset = window_onset(c, window_size);
                assert_eq!(out.valid[i], onset >= 0 && onset <= last);
            }

            assert_eq!(out.windows.nrows(), out.valid.iter().filter(|&&v| v).count());
            for (row, &onset) in out.windows.outer_iter().zip(out.onsets.iter()) {
                assert_eq!(row, x.slice(s![onset..onset + window_size]));
            }
        }
    }

    #[test]
    fn wrap_never_drops_centers() {
        let mut rng = StdRng::seed_from_u64(5);
        let x: Array1<f64> = (0..25).map(|_| rng.random_range(-1.0..1.0)).collect();
        let centers: Vec<isize> = (0..50).map(|_| rng.random_range(-60i64..60) as isize).collect();

        for window_size in [1, 2, 5, 10, 25] {
            let out = extract_windows(x.view(), &centers, window_size, WindowPolicy::Wrap).unwrap();
            assert_eq!(out.windows.nrows(), centers.len());
            assert_eq!(out.onsets.len(), centers.len());
            assert!(out.onsets.iter().all(|&o| o + window_size <= x.len()));
        }
    }

    #[test]
    fn wrap_flag_selects_policy() {
        assert_eq!(WindowPolicy::from_wrap(false), WindowPolicy::Clip);
        assert_eq!(WindowPolicy::from_wrap(true), WindowPolicy::Wrap);
        assert_eq!(WindowPolicy::from_wrap(false), WindowPolicy::default());
    }

    #[test]
    fn extreme_centers_do_not_overflow() {
        let x = arr1(&[0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let centers = [isize::MIN, 3, isize::MAX];

        let clipped = extract_windows(x.view(), &centers, 3, WindowPolicy::Clip).unwrap();
        assert_eq!(clipped.valid, vec![false, true, false]);
        assert_eq!(clipped.onsets, vec![2]);
        assert_eq!(clipped.windows, arr2(&[[2.0, 3.0, 4.0]]));

        let wrapped = extract_windows(x.view(), &centers, 4, WindowPolicy::Wrap).unwrap();
        assert_eq!(wrapped.valid, vec![false, true, false]);
        assert_eq!(wrapped.windows.nrows(), 3);
        assert!(wrapped.onsets.iter().all(|&o| o + 4 <= x.len()));
        assert_eq!(wrapped.onsets[1], 1);
    }
}
