// src/processors/baseline/median_baseline.rs

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, ArrayViewMut2, Axis};
use rayon::prelude::*;

use crate::error::{EcgError, Result};

/// Mirror an out-of-range index back into `0..n` (`d c b a | a b c d | d c b a`)
#[inline]
fn reflect_index(idx: isize, n: usize) -> usize {
    let n = n as isize;
    let period = 2 * n;
    let mut i = idx.rem_euclid(period);
    if i >= n {
        i = period - 1 - i;
    }
    i as usize
}

/// Running median of `size` samples.
///
/// The window for sample `i` covers `[i - size / 2, i - size / 2 + size)`
/// with the signal mirrored at both ends, and the output is the element of
/// rank `size / 2`. Recommended `size` is close to one RR interval.
pub fn median_baseline(signal: ArrayView1<'_, f64>, size: usize) -> Result<Array1<f64>> {
    let n_samples = signal.len();

    // Validate parameters
    if size == 0 || size > n_samples {
        return Err(EcgError::invalid_window(size, n_samples));
    }

    let half_window = (size / 2) as isize;
    let rank = size / 2;
    let mut window_values = vec![0.0; size];

    let baseline = (0..n_samples)
        .map(|i| {
            // Collect values in this window
            let start = i as isize - half_window;
            for (k, value) in window_values.iter_mut().enumerate() {
                *value = signal[reflect_index(start + k as isize, n_samples)];
            }

            // Partial sort to the median rank
            let (_, median, _) = window_values.select_nth_unstable_by(rank, |a, b| {
                a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal)
            });
            *median
        })
        .collect();

    Ok(baseline)
}

/// Signal with the running-median baseline removed
pub fn remove_median_baseline(signal: ArrayView1<'_, f64>, size: usize) -> Result<Array1<f64>> {
    let baseline = median_baseline(signal, size)?;
    Ok(&signal - &baseline)
}

/// Running-median baseline of every channel, processed in parallel
pub fn median_baseline_channels(data: ArrayView2<'_, f64>, size: usize) -> Result<Array2<f64>> {
    let (n_samples, n_channels) = data.dim();

    if size == 0 || size > n_samples {
        return Err(EcgError::invalid_window(size, n_samples));
    }

    // Process each channel in parallel
    let channel_results: Vec<Result<Array1<f64>>> = (0..n_channels)
        .into_par_iter()
        .map(|c| median_baseline(data.column(c), size))
        .collect();

    // Copy results back to output array
    let mut output = Array2::<f64>::zeros((n_samples, n_channels));
    for (c, baseline) in channel_results.into_iter().enumerate() {
        output.column_mut(c).assign(&baseline?);
    }

    Ok(output)
}

/// Signal with the per-channel running-median baseline removed
pub fn remove_median_baseline_channels(data: ArrayView2<'_, f64>, size: usize) -> Result<Array2<f64>> {
    let baseline = median_baseline_channels(data, size)?;
    Ok(&data - &baseline)
}

/// Subtract the per-channel running-median baseline in place
pub fn remove_median_baseline_channels_inplace(
    mut data: ArrayViewMut2<'_, f64>,
    size: usize,
) -> Result<()> {
    let baseline = median_baseline_channels(data.view(), size)?;
    data.axis_iter_mut(Axis(1))
        .into_par_iter()
        .zip(baseline.axis_iter(Axis(1)).into_par_iter())
        .for_each(|(mut channel, base)| channel -= &base);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::arr1;

    #[test]
    fn reflect_mirrors_edges() {
        assert_eq!(reflect_index(-1, 5), 0);
        assert_eq!(reflect_index(-2, 5), 1);
        assert_eq!(reflect_index(5, 5), 4);
        assert_eq!(reflect_index(6, 5), 3);
        assert_eq!(reflect_index(2, 5), 2);
    }

    #[test]
    fn spike_is_not_part_of_baseline() {
        let x = arr1(&[1.0, 1.0, 1.0, 1.0, 10.0, 1.0, 1.0, 1.0, 1.0]);
        let baseline = median_baseline(x.view(), 5).unwrap();
        assert!(baseline.iter().all(|&v| v == 1.0));

        let clean = remove_median_baseline(x.view(), 5).unwrap();
        assert_eq!(clean[4], 9.0);
        assert_eq!(clean.sum(), 9.0);
    }

    #[test]
    fn ramp_edges_use_reflection() {
        let x: Array1<f64> = (0..10).map(|v| v as f64).collect();
        let baseline = median_baseline(x.view(), 5).unwrap();
        // Window at 0 is [1, 0, 0, 1, 2]
        assert_eq!(baseline[0], 1.0);
        for i in 2..8 {
            assert_abs_diff_eq!(baseline[i], x[i]);
        }
        assert_eq!(baseline[9], 8.0);
    }

    #[test]
    fn even_size_window_is_left_weighted() {
        let x = arr1(&[0.0, 10.0, 20.0, 30.0, 40.0, 50.0]);
        // Window at 3 is [10, 20, 30, 40], rank 2 is 30
        let baseline = median_baseline(x.view(), 4).unwrap();
        assert_eq!(baseline[3], 30.0);
    }

    #[test]
    fn size_must_fit_signal() {
        let x = arr1(&[1.0, 2.0, 3.0]);
        assert!(matches!(median_baseline(x.view(), 4), Err(EcgError::InvalidWindow { .. })));
        assert!(matches!(median_baseline(x.view(), 0), Err(EcgError::InvalidWindow { .. })));
    }

    #[test]
    fn channels_match_single_channel() {
        let mut data = Array2::<f64>::zeros((40, 3));
        for i in 0..40 {
            for c in 0..3 {
                data[[i, c]] = ((i * (c + 1)) % 7) as f64;
            }
        }
        let baseline = median_baseline_channels(data.view(), 7).unwrap();
        for c in 0..3 {
            assert_eq!(baseline.column(c), median_baseline(data.column(c), 7).unwrap());
        }

        let clean = remove_median_baseline_channels(data.view(), 7).unwrap();
        let mut inplace = data.clone();
        remove_median_baseline_channels_inplace(inplace.view_mut(), 7).unwrap();
        assert_eq!(clean, inplace);
    }
}
