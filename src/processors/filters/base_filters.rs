// src/processors/filters/base_filters.rs

use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2, Axis};
use rayon::prelude::*;

use crate::error::{EcgError, Result};

/// Check that `sos` has one `[b0 b1 b2 a0 a1 a2]` row per section
fn check_sos(sos: ArrayView2<'_, f64>) -> Result<()> {
    if sos.ncols() != 6 || sos.nrows() == 0 {
        return Err(EcgError::ShapeMismatch {
            expected: "(n_sections, 6)".to_string(),
            found: format!("{:?}", sos.shape()),
        });
    }
    if sos.column(3).iter().any(|&a0| a0 == 0.0) {
        return Err(EcgError::InvalidParameter("a0 of every section must be non-zero".to_string()));
    }
    Ok(())
}

/// Steady-state initial conditions of every section for a unit step input
pub fn sosfilt_zi(sos: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
    check_sos(sos)?;
    let n_sections = sos.nrows();
    let mut zi = Array2::<f64>::zeros((n_sections, 2));

    // Step response level entering the current section
    let mut scale = 1.0;
    for section in 0..n_sections {
        let a0 = sos[[section, 3]];
        let (b0, b1, b2) = (sos[[section, 0]] / a0, sos[[section, 1]] / a0, sos[[section, 2]] / a0);
        let (a1, a2) = (sos[[section, 4]] / a0, sos[[section, 5]] / a0);

        // DC gain of this section
        let gain = (b0 + b1 + b2) / (1.0 + a1 + a2);
        let z2 = b2 - a2 * gain;
        let z1 = b1 - a1 * gain + z2;

        zi[[section, 0]] = scale * z1;
        zi[[section, 1]] = scale * z2;
        scale *= gain;
    }

    Ok(zi)
}

// SOS filter implementation (single pass, transposed direct form II)
pub fn sosfilt(
    data: ArrayView1<'_, f64>,
    sos: ArrayView2<'_, f64>,
    zi: Option<ArrayView2<'_, f64>>,
) -> Result<Array1<f64>> {
    check_sos(sos)?;
    let n_sections = sos.nrows();
    if let Some(zi) = &zi {
        if zi.dim() != (n_sections, 2) {
            return Err(EcgError::ShapeMismatch {
                expected: format!("({}, 2)", n_sections),
                found: format!("{:?}", zi.shape()),
            });
        }
    }

    let mut result = data.to_owned();

    // Apply each SOS section sequentially
    for section in 0..n_sections {
        // Normalize by a0
        let a0 = sos[[section, 3]];
        let b0 = sos[[section, 0]] / a0;
        let b1 = sos[[section, 1]] / a0;
        let b2 = sos[[section, 2]] / a0;
        let a1 = sos[[section, 4]] / a0;
        let a2 = sos[[section, 5]] / a0;

        // Initialize state
        let (mut z1, mut z2) = match &zi {
            Some(zi) => (zi[[section, 0]], zi[[section, 1]]),
            None => (0.0, 0.0),
        };

        // Apply the filter
        for value in result.iter_mut() {
            let x = *value;
            let y = b0 * x + z1;
            z1 = b1 * x - a1 * y + z2;
            z2 = b2 * x - a2 * y;
            *value = y;
        }
    }

    Ok(result)
}

/// Samples of odd extension added at each end by `sosfiltfilt`
pub fn filtfilt_padlen(sos: ArrayView2<'_, f64>) -> usize {
    let n_sections = sos.nrows();
    let zero_b2 = sos.column(2).iter().filter(|&&v| v == 0.0).count();
    let zero_a2 = sos.column(5).iter().filter(|&&v| v == 0.0).count();
    3 * (2 * n_sections + 1 - zero_b2.min(zero_a2))
}

/// Odd extension: `2 x[0] - x[pad..0]` before and `2 x[n-1] - x[n-2..n-pad-2]` after
fn odd_extension(data: ArrayView1<'_, f64>, pad: usize) -> Array1<f64> {
    let n = data.len();
    let first = data[0];
    let last = data[n - 1];
    let mut ext = Array1::<f64>::zeros(n + 2 * pad);

    for i in 0..pad {
        ext[i] = 2.0 * first - data[pad - i];
        ext[n + pad + i] = 2.0 * last - data[n - 2 - i];
    }
    ext.slice_mut(s![pad..pad + n]).assign(&data);

    ext
}

// SOS filter implementation (forward-backward for zero phase)
pub fn sosfiltfilt(data: ArrayView1<'_, f64>, sos: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
    check_sos(sos)?;
    let n_samples = data.len();
    let pad = filtfilt_padlen(sos);

    if n_samples <= pad {
        return Err(EcgError::InvalidParameter(format!(
            "signal of {} samples is too short for zero-phase filtering, need more than {}",
            n_samples, pad
        )));
    }

    let zi = sosfilt_zi(sos)?;
    let extended = odd_extension(data, pad);

    // Forward pass
    let forward = sosfilt(extended.view(), sos, Some((&zi * extended[0]).view()))?;

    // Reverse the data
    let mut reversed = forward;
    reversed.invert_axis(Axis(0));

    // Backward pass
    let backward = sosfilt(reversed.view(), sos, Some((&zi * reversed[0]).view()))?;

    // Reverse again and strip the padding
    let mut result = backward;
    result.invert_axis(Axis(0));

    Ok(result.slice(s![pad..pad + n_samples]).to_owned())
}

/// Apply zero-phase filter to multiple channels in parallel
///
/// Args:
///     data: signal of shape (n_samples, n_channels)
///     sos: second-order sections of shape (n_sections, 6)
///     filtfilt: zero-phase forward-backward filtering, otherwise a single pass
pub fn filter_channels(
    data: ArrayView2<'_, f64>,
    sos: ArrayView2<'_, f64>,
    filtfilt: bool,
) -> Result<Array2<f64>> {
    let (n_samples, n_channels) = data.dim();

    // Process each channel in parallel
    let channel_results: Vec<Result<Array1<f64>>> = data
        .axis_iter(Axis(1))
        .into_par_iter()
        .map(|channel| {
            if filtfilt {
                sosfiltfilt(channel, sos)
            } else {
                sosfilt(channel, sos, None)
            }
        })
        .collect();

    // Copy results back to output array
    let mut output = Array2::<f64>::zeros((n_samples, n_channels));
    for (c, filtered) in channel_results.into_iter().enumerate() {
        output.column_mut(c).assign(&filtered?);
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::arr2;

    // First-order lowpass y = 0.5 x + 0.5 y[-1] written as a section
    fn smoother() -> Array2<f64> {
        arr2(&[[0.5, 0.0, 0.0, 1.0, -0.5, 0.0]])
    }

    #[test]
    fn single_section_recursion() {
        let x = Array1::from(vec![1.0, 0.0, 0.0, 0.0]);
        let y = sosfilt(x.view(), smoother().view(), None).unwrap();
        assert_eq!(y.to_vec(), vec![0.5, 0.25, 0.125, 0.0625]);
    }

    #[test]
    fn steady_state_start_has_no_transient() {
        let sos = arr2(&[
            [0.2, 0.4, 0.2, 1.0, -0.5, 0.3],
            [1.0, -1.2, 0.5, 1.0, 0.1, 0.05],
        ]);
        let zi = sosfilt_zi(sos.view()).unwrap();
        let x = Array1::from_elem(50, 2.0);
        let y = sosfilt(x.view(), sos.view(), Some((&zi * 2.0).view())).unwrap();

        let g1 = (0.2 + 0.4 + 0.2) / (1.0 - 0.5 + 0.3);
        let g2 = (1.0 - 1.2 + 0.5) / (1.0 + 0.1 + 0.05);
        for &v in y.iter() {
            assert_abs_diff_eq!(v, 2.0 * g1 * g2, epsilon = 1e-12);
        }
    }

    #[test]
    fn padlen_follows_section_count() {
        let sos = arr2(&[
            [1.0, 2.0, 1.0, 1.0, 0.1, 0.2],
            [1.0, 1.0, 0.0, 1.0, 0.3, 0.0],
        ]);
        assert_eq!(filtfilt_padlen(sos.view()), 3 * (2 * 2 + 1 - 1));
    }

    #[test]
    fn odd_extension_is_point_symmetric() {
        let x = Array1::from(vec![1.0, 2.0, 4.0, 7.0]);
        let ext = odd_extension(x.view(), 2);
        assert_eq!(ext.to_vec(), vec![-2.0, 0.0, 1.0, 2.0, 4.0, 7.0, 10.0, 12.0]);
    }

    #[test]
    fn filtfilt_keeps_constant_signal() {
        let x = Array1::from_elem(40, 3.0);
        let y = sosfiltfilt(x.view(), smoother().view()).unwrap();
        for &v in y.iter() {
            assert_abs_diff_eq!(v, 3.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn filtfilt_rejects_short_signal() {
        let x = Array1::from_elem(6, 1.0);
        assert!(matches!(
            sosfiltfilt(x.view(), smoother().view()),
            Err(EcgError::InvalidParameter(_))
        ));
    }

    #[test]
    fn bad_sos_shape() {
        let x = Array1::from_elem(20, 1.0);
        let sos = Array2::<f64>::ones((2, 5));
        assert!(matches!(sosfilt(x.view(), sos.view(), None), Err(EcgError::ShapeMismatch { .. })));
    }

    #[test]
    fn channels_filtered_independently() {
        let mut data = Array2::<f64>::zeros((30, 2));
        data.column_mut(0).fill(1.0);
        data[[10, 1]] = 1.0;
        let out = filter_channels(data.view(), smoother().view(), false).unwrap();
        assert_eq!(out.column(0), sosfilt(data.column(0), smoother().view(), None).unwrap());
        assert_eq!(out[[10, 1]], 0.5);
        assert_eq!(out[[9, 1]], 0.0);
    }
}
