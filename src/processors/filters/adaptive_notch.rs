// src/processors/filters/adaptive_notch.rs

use log::trace;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use num_traits::{Float, FloatConst};
use rayon::prelude::*;

use crate::error::{EcgError, Result};

/// Nonlinear adaptive power-line interference (PLI) canceller.
///
/// A second-order oscillator at `f0` predicts the interference; after every
/// sample the prediction is nudged by `alpha` in the direction of the change
/// of the residual (Hamilton's "to adapt or not to adapt" filter, as given in
/// Laguna's bioelectrical signal processing book, p. 476).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdaptiveNotchConfig<F> {
    /// Sampling frequency (Hz)
    pub fs: F,
    /// Interference frequency (Hz)
    pub f0: F,
    /// Adaptation step, in the units of `signal * unit`
    pub alpha: F,
    /// Scale applied to the signal before filtering
    pub unit: F,
}

impl<F: Float + From<f32>> AdaptiveNotchConfig<F> {
    /// 50 Hz mains, `alpha = 1e-5`, no rescaling
    pub fn new(fs: F) -> Self {
        AdaptiveNotchConfig {
            fs,
            f0: 50.0f32.into(),
            alpha: 1e-5f32.into(),
            unit: F::one(),
        }
    }
}

impl<F: Float> AdaptiveNotchConfig<F> {
    pub fn with_f0(mut self, f0: F) -> Self {
        self.f0 = f0;
        self
    }

    pub fn with_alpha(mut self, alpha: F) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn with_unit(mut self, unit: F) -> Self {
        self.unit = unit;
        self
    }

    fn validate(&self) -> Result<()> {
        if !self.fs.is_finite() || self.fs <= F::zero() {
            return Err(EcgError::InvalidParameter(
                "sampling frequency must be positive".to_string(),
            ));
        }
        if !self.f0.is_finite() || !self.alpha.is_finite() {
            return Err(EcgError::InvalidParameter(
                "f0 and alpha must be finite".to_string(),
            ));
        }
        if !self.unit.is_finite() || self.unit == F::zero() {
            return Err(EcgError::InvalidParameter(
                "unit must be finite and non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl<F: Float + FloatConst> AdaptiveNotchConfig<F> {
    /// Oscillator coefficient `2 cos(2 pi f0 / fs)`
    pub fn coefficient(&self) -> F {
        let two = F::one() + F::one();
        two * (two * F::PI() * self.f0 / self.fs).cos()
    }
}

/// Sign with `sign(0) == 0`, so a stationary residual does not adapt
#[inline]
pub fn sign<F: Float>(x: F) -> F {
    if x > F::zero() {
        F::one()
    } else if x < F::zero() {
        -F::one()
    } else if x == F::zero() {
        F::zero()
    } else {
        x
    }
}

/// Recursive state of one channel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NotchState<F> {
    /// Previous estimate
    pub v1: F,
    /// Estimate two samples back
    pub v2: F,
    /// Previous residual
    pub e1: F,
}

impl<F: Float> NotchState<F> {
    pub fn new() -> Self {
        NotchState { v1: F::zero(), v2: F::zero(), e1: F::zero() }
    }

    /// Advance one sample, returning `(residual, estimate)`
    #[inline]
    pub fn step(&mut self, x: F, coefficient: F, alpha: F) -> (F, F) {
        let predicted = coefficient * self.v1 - self.v2;
        let e = x - predicted;
        let v = predicted + alpha * sign(e - self.e1);

        self.v2 = self.v1;
        self.v1 = v;
        self.e1 = e;

        (e, v)
    }
}

impl<F: Float> Default for NotchState<F> {
    fn default() -> Self {
        Self::new()
    }
}

/// Residual (filtered signal) and recovered interference
#[derive(Debug, Clone, PartialEq)]
pub struct NotchOutput<A> {
    pub filtered: A,
    pub estimate: A,
}

/// Run one channel from a fresh state
fn run_channel<F: Float + FloatConst>(
    signal: ArrayView1<'_, F>,
    config: &AdaptiveNotchConfig<F>,
) -> NotchOutput<Array1<F>> {
    let coefficient = config.coefficient();
    let unit = config.unit;
    let mut state = NotchState::new();

    let mut filtered = Array1::<F>::zeros(signal.len());
    let mut estimate = Array1::<F>::zeros(signal.len());

    for (i, &x) in signal.iter().enumerate() {
        let (e, v) = state.step(x * unit, coefficient, config.alpha);
        filtered[i] = e / unit;
        estimate[i] = v / unit;
    }

    NotchOutput { filtered, estimate }
}

/// Adaptive notch filter of a single channel
///
/// Args:
///     signal: single-lead ECG
///     config: sampling rate, interference frequency, step and scale
///
/// Returns:
///     Filtered signal and the recovered interference
pub fn adaptive_notch_with<F: Float + FloatConst>(
    signal: ArrayView1<'_, F>,
    config: &AdaptiveNotchConfig<F>,
) -> Result<NotchOutput<Array1<F>>> {
    config.validate()?;
    trace!("adaptive notch over {} samples", signal.len());
    Ok(run_channel(signal, config))
}

/// Adaptive notch filter with the interference at `f0` Hz and step `alpha`
pub fn adaptive_notch<F: Float + FloatConst>(
    signal: ArrayView1<'_, F>,
    fs: F,
    f0: F,
    alpha: F,
) -> Result<NotchOutput<Array1<F>>> {
    let config = AdaptiveNotchConfig { fs, f0, alpha, unit: F::one() };
    adaptive_notch_with(signal, &config)
}

/// One config per channel, broadcasting a single config to all channels
fn channel_configs<F: Float>(
    params: &[AdaptiveNotchConfig<F>],
    n_channels: usize,
) -> Result<Vec<AdaptiveNotchConfig<F>>> {
    let configs = match params.len() {
        1 => vec![params[0]; n_channels],
        n if n == n_channels => params.to_vec(),
        n => {
            return Err(EcgError::ShapeMismatch {
                expected: format!("1 or {} filter configs", n_channels),
                found: format!("{} filter configs", n),
            })
        }
    };

    for config in &configs {
        config.validate()?;
    }

    Ok(configs)
}

/// Adaptive notch filter of every channel, stepping all channels together
/// one sample at a time with independent state per channel
///
/// Args:
///     data: signal of shape (n_samples, n_channels)
///     params: one config shared by all channels, or one per channel
pub fn adaptive_notch_channels<F: Float + FloatConst>(
    data: ArrayView2<'_, F>,
    params: &[AdaptiveNotchConfig<F>],
) -> Result<NotchOutput<Array2<F>>> {
    let (n_samples, n_channels) = data.dim();
    let configs = channel_configs(params, n_channels)?;

    let coefficients: Vec<F> = configs.iter().map(|c| c.coefficient()).collect();
    let mut states = vec![NotchState::<F>::new(); n_channels];

    let mut filtered = Array2::<F>::zeros((n_samples, n_channels));
    let mut estimate = Array2::<F>::zeros((n_samples, n_channels));

    for (i, row) in data.outer_iter().enumerate() {
        for (c, &x) in row.iter().enumerate() {
            let unit = configs[c].unit;
            let (e, v) = states[c].step(x * unit, coefficients[c], configs[c].alpha);
            filtered[[i, c]] = e / unit;
            estimate[[i, c]] = v / unit;
        }
    }

    Ok(NotchOutput { filtered, estimate })
}

/// Adaptive notch filter with each channel on its own worker
pub fn adaptive_notch_channels_parallel<F>(
    data: ArrayView2<'_, F>,
    params: &[AdaptiveNotchConfig<F>],
) -> Result<NotchOutput<Array2<F>>>
where
    F: Float + FloatConst + Send + Sync,
{
    let (n_samples, n_channels) = data.dim();
    let configs = channel_configs(params, n_channels)?;

    // Process each channel in parallel
    let channel_results: Vec<_> = data
        .axis_iter(Axis(1))
        .into_par_iter()
        .zip(configs.par_iter())
        .map(|(channel, config)| run_channel(channel, config))
        .collect();

    // Copy results back to output arrays
    let mut filtered = Array2::<F>::zeros((n_samples, n_channels));
    let mut estimate = Array2::<F>::zeros((n_samples, n_channels));
    for (c, output) in channel_results.into_iter().enumerate() {
        filtered.column_mut(c).assign(&output.filtered);
        estimate.column_mut(c).assign(&output.estimate);
    }

    Ok(NotchOutput { filtered, estimate })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::PI;

    fn sinusoid(n: usize, fs: f64, f0: f64, amplitude: f64, offset: f64) -> Array1<f64> {
        (0..n)
            .map(|i| offset + amplitude * (2.0 * PI * f0 * i as f64 / fs).sin())
            .collect()
    }

    #[test]
    fn sign_of_zero_is_zero() {
        assert_eq!(sign(0.0_f64), 0.0);
        assert_eq!(sign(-0.0_f64), 0.0);
        assert_eq!(sign(2.5_f64), 1.0);
        assert_eq!(sign(-1e-30_f64), -1.0);
        assert!(sign(f64::NAN).is_nan());
    }

    #[test]
    fn stationary_residual_does_not_adapt() {
        let mut state = NotchState { v1: 0.3_f64, v2: 0.1, e1: 0.0 };
        let coefficient = 1.5;
        let predicted = coefficient * 0.3 - 0.1;
        // Input chosen so the residual equals the previous one
        let (e, v) = state.step(predicted, coefficient, 10.0);
        assert_eq!(e, 0.0);
        assert_eq!(v, predicted);
    }

    #[test]
    fn silent_input_stays_silent() {
        let x = Array1::<f64>::zeros(500);
        let out = adaptive_notch(x.view(), 1000.0, 50.0, 1.0).unwrap();
        assert!(out.estimate.iter().all(|&v| v == 0.0));
        assert!(out.filtered.iter().all(|&e| e == 0.0));
    }

    #[test]
    fn constant_input_leaves_estimate_still() {
        let x = Array1::<f64>::from_elem(500, 0.7);
        let out = adaptive_notch(x.view(), 1000.0, 50.0, 0.0).unwrap();
        assert!(out.estimate.iter().all(|&v| v == 0.0));
        assert!(out.filtered.iter().all(|&e| e == 0.7));
    }

    #[test]
    fn zero_step_passes_signal_through() {
        let x = sinusoid(300, 500.0, 50.0, 1.0, 0.2);
        let out = adaptive_notch(x.view(), 500.0, 50.0, 0.0).unwrap();
        assert_eq!(out.filtered, x);
        assert!(out.estimate.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn tracks_interference_at_f0() {
        let fs = 1000.0;
        let pli = sinusoid(4000, fs, 50.0, 1.0, 0.0);
        let x = &pli + 0.5;
        let out = adaptive_notch(x.view(), fs, 50.0, 0.01).unwrap();

        for i in 3000..4000 {
            assert_abs_diff_eq!(out.estimate[i], pli[i], epsilon = 0.05);
            assert_abs_diff_eq!(out.filtered[i], 0.5, epsilon = 0.05);
        }
        // Residual plus estimate differs from the input by one adaptation step
        for i in 0..4000 {
            assert_abs_diff_eq!(out.filtered[i] + out.estimate[i], x[i], epsilon = 0.01 + 1e-9);
        }
    }

    #[test]
    fn single_precision_matches_double() {
        let x = sinusoid(2000, 1024.0, 51.0, 0.8, 0.0);
        let x32: Array1<f32> = x.mapv(|v| v as f32);
        let out64 = adaptive_notch(x.view(), 1024.0, 51.0, 0.8e-2).unwrap();
        let out32 = adaptive_notch(x32.view(), 1024.0_f32, 51.0, 0.8e-2).unwrap();
        for i in 1500..2000 {
            assert_abs_diff_eq!(out32.filtered[i] as f64, out64.filtered[i], epsilon = 0.05);
        }
    }

    #[test]
    fn unit_rescales_step() {
        let x = sinusoid(1000, 1000.0, 50.0, 1e-3, 0.0);
        // Signal in mV, step of 10 uV
        let scaled = AdaptiveNotchConfig::new(1000.0).with_alpha(10.0).with_unit(1e3);
        let plain = AdaptiveNotchConfig::new(1000.0).with_alpha(10.0);
        let a = adaptive_notch_with((&x * 1e3).view(), &plain).unwrap();
        let b = adaptive_notch_with(x.view(), &scaled).unwrap();
        for i in 0..1000 {
            assert_abs_diff_eq!(b.filtered[i] * 1e3, a.filtered[i], epsilon = 1e-6);
        }
    }

    #[test]
    fn channels_are_independent() {
        let fs = 1000.0;
        let n = 1500;
        let mut data = Array2::<f64>::zeros((n, 3));
        data.column_mut(0).assign(&sinusoid(n, fs, 50.0, 1.0, 0.0));
        data.column_mut(1).assign(&sinusoid(n, fs, 60.0, 0.5, 0.1));
        // Third channel left silent

        let params = [
            AdaptiveNotchConfig::new(fs).with_alpha(0.01),
            AdaptiveNotchConfig::new(fs).with_f0(60.0).with_alpha(0.005),
            AdaptiveNotchConfig::new(fs).with_alpha(0.01),
        ];
        let lockstep = adaptive_notch_channels(data.view(), &params).unwrap();
        let parallel = adaptive_notch_channels_parallel(data.view(), &params).unwrap();
        assert_eq!(lockstep, parallel);

        for c in 0..3 {
            let single = adaptive_notch_with(data.column(c), &params[c]).unwrap();
            assert_eq!(lockstep.filtered.column(c), single.filtered);
            assert_eq!(lockstep.estimate.column(c), single.estimate);
        }
        assert!(lockstep.estimate.column(2).iter().all(|&v| v == 0.0));
    }

    #[test]
    fn shared_config_broadcasts() {
        let data = Array2::<f64>::from_elem((64, 4), 1.0);
        let shared = [AdaptiveNotchConfig::new(500.0)];
        let out = adaptive_notch_channels(data.view(), &shared).unwrap();
        assert_eq!(out.filtered.dim(), (64, 4));
        for c in 1..4 {
            assert_eq!(out.filtered.column(c), out.filtered.column(0));
        }
    }

    #[test]
    fn config_count_must_match_channels() {
        let data = Array2::<f64>::zeros((10, 3));
        let params = [AdaptiveNotchConfig::new(500.0), AdaptiveNotchConfig::new(500.0)];
        let err = adaptive_notch_channels(data.view(), &params).unwrap_err();
        assert!(matches!(err, EcgError::ShapeMismatch { .. }));

        let err = adaptive_notch_channels_parallel(data.view(), &[]).unwrap_err();
        assert!(matches!(err, EcgError::ShapeMismatch { .. }));
    }

    #[test]
    fn invalid_sampling_rate() {
        let x = Array1::<f64>::zeros(10);
        assert!(matches!(
            adaptive_notch(x.view(), 0.0, 50.0, 1e-3),
            Err(EcgError::InvalidParameter(_))
        ));
    }
}
