// src/processors/filters/iir_filters.rs

use std::f64::consts::PI;

use log::trace;
use ndarray::{Array1, Array2, ArrayView1};
use num_complex::Complex64;

use super::base_filters::sosfiltfilt;
use crate::error::{EcgError, Result};

/// Band of a Butterworth design, frequencies in Hz
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterBand {
    Lowpass(f64),
    Highpass(f64),
    /// Stop band between the two edge frequencies
    Bandstop(f64, f64),
}

fn check_frequency(f: f64, fs: f64) -> Result<()> {
    if !(f.is_finite() && f > 0.0 && f < fs / 2.0) {
        return Err(EcgError::InvalidParameter(format!(
            "frequency {} Hz must lie strictly between 0 and Nyquist ({} Hz)",
            f,
            fs / 2.0
        )));
    }
    Ok(())
}

/// Pre-warped analog frequency (rad/s) for the bilinear transform
#[inline]
fn prewarp(f: f64, fs: f64) -> f64 {
    2.0 * fs * (PI * f / fs).tan()
}

#[inline]
fn bilinear(s: Complex64, fs: f64) -> Complex64 {
    (2.0 * fs + s) / (2.0 * fs - s)
}

/// Section with poles `q1`, `q2` (a conjugate pair or two real poles)
fn section(numerator: [f64; 3], q1: Complex64, q2: Complex64) -> [f64; 6] {
    let a1 = -(q1 + q2).re;
    let a2 = (q1 * q2).re;
    [numerator[0], numerator[1], numerator[2], 1.0, a1, a2]
}

/// Scale the numerator so the section has unit gain at `z = reference` (+1 or -1)
fn normalize_gain(row: &mut [f64; 6], reference: f64) {
    let num = row[0] + row[1] * reference + row[2];
    let den = row[3] + row[4] * reference + row[5];
    let scale = den / num;
    for b in row.iter_mut().take(3) {
        *b *= scale;
    }
}

/// Analog Butterworth prototype poles in the upper half plane, plus the real
/// pole `-1` for odd orders
fn prototype_poles(order: usize) -> (Vec<Complex64>, bool) {
    let n = order as f64;
    let pairs = (0..order / 2)
        .map(|k| {
            let m = -(n - 1.0) + 2.0 * k as f64;
            -Complex64::new(0.0, PI * m / (2.0 * n)).exp()
        })
        .collect();
    (pairs, order % 2 == 1)
}

/// Digital Butterworth filter as second-order sections
///
/// Args:
///     order: prototype order (a bandstop design has twice as many poles)
///     band: pass/stop band edges in Hz
///     fs: sampling frequency in Hz
///
/// Returns:
///     Array of shape (n_sections, 6), rows `[b0, b1, b2, a0, a1, a2]`
pub fn butter_sos(order: usize, band: FilterBand, fs: f64) -> Result<Array2<f64>> {
    if order == 0 {
        return Err(EcgError::InvalidParameter("filter order must be at least 1".to_string()));
    }
    if !(fs.is_finite() && fs > 0.0) {
        return Err(EcgError::InvalidParameter(format!("sampling frequency must be positive, got {}", fs)));
    }

    trace!("butterworth order {} {:?} at fs={}", order, band, fs);
    let (pairs, has_real_pole) = prototype_poles(order);
    let mut sections: Vec<[f64; 6]> = Vec::with_capacity(order);

    match band {
        FilterBand::Lowpass(fc) => {
            check_frequency(fc, fs)?;
            let wa = prewarp(fc, fs);
            for &p in &pairs {
                let q = bilinear(p * wa, fs);
                sections.push(section([1.0, 2.0, 1.0], q, q.conj()));
            }
            if has_real_pole {
                let q = bilinear(Complex64::new(-wa, 0.0), fs);
                sections.push(section([1.0, 1.0, 0.0], q, Complex64::new(0.0, 0.0)));
            }
            sections.iter_mut().for_each(|row| normalize_gain(row, 1.0));
        }
        FilterBand::Highpass(fc) => {
            check_frequency(fc, fs)?;
            let wa = prewarp(fc, fs);
            for &p in &pairs {
                let q = bilinear(wa / p, fs);
                sections.push(section([1.0, -2.0, 1.0], q, q.conj()));
            }
            if has_real_pole {
                let q = bilinear(Complex64::new(-wa, 0.0), fs);
                sections.push(section([1.0, -1.0, 0.0], q, Complex64::new(0.0, 0.0)));
            }
            sections.iter_mut().for_each(|row| normalize_gain(row, -1.0));
        }
        FilterBand::Bandstop(f1, f2) => {
            check_frequency(f1, fs)?;
            check_frequency(f2, fs)?;
            if f1 >= f2 {
                return Err(EcgError::InvalidParameter(format!(
                    "bandstop edges must be increasing, got {} >= {}",
                    f1, f2
                )));
            }
            let (w1, w2) = (prewarp(f1, fs), prewarp(f2, fs));
            let bw = w2 - w1;
            let w0 = (w1 * w2).sqrt();

            // Zeros at +-j*w0 land on the unit circle at the band center
            let t = (w0 / (2.0 * fs)).powi(2);
            let cos_center = (1.0 - t) / (1.0 + t);
            let numerator = [1.0, -2.0 * cos_center, 1.0];

            // Each lowpass pole p splits into the roots of s^2 - (bw/p) s + w0^2
            let split = |p: Complex64| {
                let half = bw / (2.0 * p);
                let root = (half * half - w0 * w0).sqrt();
                (half + root, half - root)
            };

            for &p in &pairs {
                let (s1, s2) = split(p);
                let (q1, q2) = (bilinear(s1, fs), bilinear(s2, fs));
                sections.push(section(numerator, q1, q1.conj()));
                sections.push(section(numerator, q2, q2.conj()));
            }
            if has_real_pole {
                let (s1, s2) = split(Complex64::new(-1.0, 0.0));
                sections.push(section(numerator, bilinear(s1, fs), bilinear(s2, fs)));
            }
            sections.iter_mut().for_each(|row| normalize_gain(row, 1.0));
        }
    }

    let flat: Vec<f64> = sections.iter().flatten().copied().collect();
    Array2::from_shape_vec((sections.len(), 6), flat)
        .map_err(|e| EcgError::InvalidParameter(e.to_string()))
}

/// Zero-phase Butterworth lowpass
pub fn lowpass_filter(x: ArrayView1<'_, f64>, order: usize, fc: f64, fs: f64) -> Result<Array1<f64>> {
    let sos = butter_sos(order, FilterBand::Lowpass(fc), fs)?;
    sosfiltfilt(x, sos.view())
}

/// Zero-phase Butterworth highpass
pub fn highpass_filter(x: ArrayView1<'_, f64>, order: usize, fc: f64, fs: f64) -> Result<Array1<f64>> {
    let sos = butter_sos(order, FilterBand::Highpass(fc), fs)?;
    sosfiltfilt(x, sos.view())
}

/// Zero-phase Butterworth bandstop over `fc - bw/2 .. fc + bw/2`
pub fn notch_filter(
    x: ArrayView1<'_, f64>,
    order: usize,
    fc: f64,
    fs: f64,
    bw: f64,
) -> Result<Array1<f64>> {
    let sos = butter_sos(order, FilterBand::Bandstop(fc - bw / 2.0, fc + bw / 2.0), fs)?;
    sosfiltfilt(x, sos.view())
}
