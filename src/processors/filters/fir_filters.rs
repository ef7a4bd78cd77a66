// src/processors/filters/fir_filters.rs

use log::debug;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rayon::prelude::*;
use realfft::RealFftPlanner;

use crate::error::{EcgError, Result};

// === FFT Convolution Implementation ===

/// "Same"-mode convolution through real FFTs: output sample `i` is sample
/// `i + (taps.len() - 1) / 2` of the full convolution
fn fft_convolve_same(signal: ArrayView1<'_, f64>, taps: &[f64]) -> Result<Array1<f64>> {
    let n_samples = signal.len();
    let filter_len = taps.len();

    // Full convolution length, padded to a power of 2
    let output_size = n_samples + filter_len - 1;
    let n_fft = output_size.next_power_of_two();

    let mut planner = RealFftPlanner::<f64>::new();
    let r2c = planner.plan_fft_forward(n_fft);
    let c2r = planner.plan_fft_inverse(n_fft);

    // Spectrum of the signal
    let mut buffer = r2c.make_input_vec();
    for (dst, &src) in buffer.iter_mut().zip(signal.iter()) {
        *dst = src;
    }
    let mut signal_spectrum = r2c.make_output_vec();
    r2c.process(&mut buffer, &mut signal_spectrum)?;

    // Spectrum of the filter
    let mut buffer = r2c.make_input_vec();
    buffer[..filter_len].copy_from_slice(taps);
    let mut filter_spectrum = r2c.make_output_vec();
    r2c.process(&mut buffer, &mut filter_spectrum)?;

    // Multiply in frequency domain (convolution in time domain)
    for (s, f) in signal_spectrum.iter_mut().zip(filter_spectrum.iter()) {
        *s *= f;
    }
    // DC and Nyquist bins of a real signal are real
    if let Some(first) = signal_spectrum.first_mut() {
        first.im = 0.0;
    }
    if let Some(last) = signal_spectrum.last_mut() {
        last.im = 0.0;
    }

    let mut full = c2r.make_output_vec();
    c2r.process(&mut signal_spectrum, &mut full)?;

    // Scale inverse result (realfft doesn't normalize) and center it
    let scale = 1.0 / n_fft as f64;
    let delay = (filter_len - 1) / 2;
    Ok((0..n_samples).map(|i| full[i + delay] * scale).collect())
}

/// Direct "same"-mode convolution, zero outside the signal
fn direct_convolve_same(signal: ArrayView1<'_, f64>, taps: &[f64]) -> Array1<f64> {
    let n_samples = signal.len() as isize;
    let filter_len = taps.len() as isize;
    let delay = (filter_len - 1) / 2;

    (0..n_samples)
        .map(|i| {
            let k = i + delay;
            let mut sum = 0.0;
            for (j, &w) in taps.iter().enumerate() {
                let idx = k - j as isize;
                if idx >= 0 && idx < n_samples {
                    sum += signal[idx as usize] * w;
                }
            }
            sum
        })
        .collect()
}

/// Determine whether to use FFT convolution based on filter length
fn should_use_fft_convolution(filter_length: usize) -> bool {
    filter_length > 48
}

/// Moving average of `size` samples with "same" output alignment
///
/// Args:
///     signal: input samples
///     size: number of taps, each `1 / size`
///
/// Returns:
///     Array of the same length as `signal`, zero padding beyond both ends
pub fn average_filter(signal: ArrayView1<'_, f64>, size: usize) -> Result<Array1<f64>> {
    let n_samples = signal.len();

    // Validate parameters
    if size == 0 || size > n_samples {
        return Err(EcgError::invalid_window(size, n_samples));
    }

    // For moving average, create uniform weights
    let taps = vec![1.0 / size as f64; size];

    // Decide whether to use FFT or direct convolution
    if should_use_fft_convolution(size) {
        debug!("moving average of {} taps via fft", size);
        fft_convolve_same(signal, &taps)
    } else {
        debug!("moving average of {} taps via direct convolution", size);
        Ok(direct_convolve_same(signal, &taps))
    }
}

/// Moving average of every channel, processed in parallel
pub fn average_filter_channels(data: ArrayView2<'_, f64>, size: usize) -> Result<Array2<f64>> {
    let (n_samples, n_channels) = data.dim();

    if size == 0 || size > n_samples {
        return Err(EcgError::invalid_window(size, n_samples));
    }

    // Process each channel in parallel
    let channel_results: Vec<Result<Array1<f64>>> = data
        .axis_iter(Axis(1))
        .into_par_iter()
        .map(|channel| average_filter(channel, size))
        .collect();

    // Copy results back to output array
    let mut output = Array2::<f64>::zeros((n_samples, n_channels));
    for (c, averaged) in channel_results.into_iter().enumerate() {
        output.column_mut(c).assign(&averaged?);
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::arr1;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn odd_window_is_centered() {
        let x = arr1(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let y = average_filter(x.view(), 3).unwrap();
        let expected = [1.0, 2.0, 3.0, 4.0, 3.0];
        for (a, b) in y.iter().zip(expected.iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-12);
        }
    }

    #[test]
    fn even_window_leans_forward() {
        let x = arr1(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let y = average_filter(x.view(), 2).unwrap();
        let expected = [0.5, 1.5, 2.5, 3.5, 4.5];
        for (a, b) in y.iter().zip(expected.iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-12);
        }
    }

    #[test]
    fn fft_path_matches_direct() {
        let mut rng = StdRng::seed_from_u64(7);
        let x: Array1<f64> = (0..300).map(|_| rng.random_range(-1.0..1.0)).collect();
        for size in [5, 48, 49, 64, 101] {
            let taps = vec![1.0 / size as f64; size];
            let direct = direct_convolve_same(x.view(), &taps);
            let fft = fft_convolve_same(x.view(), &taps).unwrap();
            for (a, b) in direct.iter().zip(fft.iter()) {
                assert_abs_diff_eq!(a, b, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn long_window_on_constant_signal() {
        let x = Array1::from_elem(200, 2.0);
        let y = average_filter(x.view(), 61).unwrap();
        assert_abs_diff_eq!(y[100], 2.0, epsilon = 1e-9);
        // Zero padding halves the edge
        assert_abs_diff_eq!(y[0], 2.0 * 31.0 / 61.0, epsilon = 1e-9);
    }

    #[test]
    fn size_must_fit_signal() {
        let x = arr1(&[1.0, 2.0]);
        assert!(matches!(average_filter(x.view(), 0), Err(EcgError::InvalidWindow { .. })));
        assert!(matches!(average_filter(x.view(), 3), Err(EcgError::InvalidWindow { .. })));
    }

    #[test]
    fn channels_match_single_channel() {
        let mut data = Array2::<f64>::zeros((120, 2));
        for i in 0..120 {
            data[[i, 0]] = (i % 9) as f64;
            data[[i, 1]] = -((i % 5) as f64);
        }
        let out = average_filter_channels(data.view(), 7).unwrap();
        for c in 0..2 {
            assert_eq!(out.column(c), average_filter(data.column(c), 7).unwrap());
        }
    }
}
