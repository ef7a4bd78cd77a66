// src/python.rs

use numpy::{IntoPyArray, PyArray1, PyArray2, PyReadonlyArray1, PyReadonlyArray2};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

use crate::error::EcgError;
use crate::processors::baseline::{
    median_baseline, remove_median_baseline, remove_spline_baseline, spline_baseline,
    SplineBaselineConfig,
};
use crate::processors::basics::time_axis;
use crate::processors::filters::{
    adaptive_notch_channels_parallel, adaptive_notch_with, average_filter, filter_channels,
    highpass_filter, lowpass_filter, notch_filter, AdaptiveNotchConfig,
};
use crate::processors::isoline::{isoline, isoline_correction, IsolineEngine, IsolineLimits};
use crate::processors::windows::{beat_matrix, extract_windows, BeatWidth, RrStatistic, WindowPolicy};

impl From<EcgError> for PyErr {
    fn from(err: EcgError) -> PyErr {
        PyValueError::new_err(err.to_string())
    }
}

fn to_isize(values: PyReadonlyArray1<'_, i64>) -> Vec<isize> {
    values.as_array().iter().map(|&v| v as isize).collect()
}

/// `wrap=True` keeps every center by wrapping its window around the signal
/// ends; the default masks windows that do not fit
fn policy(wrap: Option<bool>) -> WindowPolicy {
    WindowPolicy::from_wrap(wrap.unwrap_or(false))
}

fn engine(name: Option<String>, bins: Option<usize>) -> PyResult<IsolineEngine> {
    let parsed: IsolineEngine = name.as_deref().unwrap_or("scipy").parse()?;
    Ok(match (parsed, bins) {
        (IsolineEngine::Histogram { .. }, Some(bins)) => IsolineEngine::Histogram { bins },
        (parsed, _) => parsed,
    })
}

/// Windows of `size` samples centered on each fiducial
///
/// Returns (windows, onsets, valid)
#[pyfunction]
fn sliding_window(
    py: Python<'_>,
    x: PyReadonlyArray1<f64>,
    centers: PyReadonlyArray1<i64>,
    size: usize,
    wrap: Option<bool>,
) -> PyResult<(Py<PyArray2<f64>>, Py<PyArray1<i64>>, Vec<bool>)> {
    let signal = x.as_array().to_owned();
    let centers = to_isize(centers);
    let policy = policy(wrap);

    let extracted = Python::allow_threads(py, || {
        extract_windows(signal.view(), &centers, size, policy)
    })?;

    let onsets: Vec<i64> = extracted.onsets.iter().map(|&o| o as i64).collect();
    Ok((
        extracted.windows.into_pyarray(py).into(),
        onsets.into_pyarray(py).into(),
        extracted.valid,
    ))
}

/// Cubic spline baseline removal through PQ-segment anchors
#[pyfunction]
fn spline_filter(
    py: Python<'_>,
    x: PyReadonlyArray1<f64>,
    fiducials: PyReadonlyArray1<i64>,
    size: usize,
    order: Option<usize>,
    return_baseline: Option<bool>,
) -> PyResult<Py<PyArray1<f64>>> {
    let signal = x.as_array().to_owned();
    let fiducials = to_isize(fiducials);
    let config = SplineBaselineConfig::new(size).with_order(order.unwrap_or(3));

    let output = Python::allow_threads(py, || {
        if return_baseline.unwrap_or(false) {
            spline_baseline(signal.view(), &fiducials, &config)
        } else {
            remove_spline_baseline(signal.view(), &fiducials, &config)
        }
    })?;

    Ok(output.into_pyarray(py).into())
}

/// Running-median baseline removal
#[pyfunction]
fn median_filter(
    py: Python<'_>,
    x: PyReadonlyArray1<f64>,
    size: usize,
    return_baseline: Option<bool>,
) -> PyResult<Py<PyArray1<f64>>> {
    let signal = x.as_array().to_owned();

    let output = Python::allow_threads(py, || {
        if return_baseline.unwrap_or(false) {
            median_baseline(signal.view(), size)
        } else {
            remove_median_baseline(signal.view(), size)
        }
    })?;

    Ok(output.into_pyarray(py).into())
}

/// Isoelectric level of the signal
#[pyfunction]
fn isoline_level(
    x: PyReadonlyArray1<f64>,
    engine_name: Option<String>,
    bins: Option<usize>,
    limits: Option<(usize, usize)>,
) -> PyResult<f64> {
    let engine = engine(engine_name, bins)?;
    let (start, stop) = limits.unwrap_or((0, 0));
    Ok(isoline(x.as_array(), engine, IsolineLimits::new(start, stop))?)
}

/// Signal shifted so its isoelectric level is zero
#[pyfunction]
fn isoline_filter(
    py: Python<'_>,
    x: PyReadonlyArray1<f64>,
    engine_name: Option<String>,
    bins: Option<usize>,
    limits: Option<(usize, usize)>,
) -> PyResult<Py<PyArray1<f64>>> {
    let engine = engine(engine_name, bins)?;
    let (start, stop) = limits.unwrap_or((0, 0));
    let output = isoline_correction(x.as_array(), engine, IsolineLimits::new(start, stop))?;
    Ok(output.into_pyarray(py).into())
}

/// Adaptive notch filter of a single channel
///
/// Returns (filtered, estimate)
#[pyfunction]
fn adapt_notch_filter(
    py: Python<'_>,
    x: PyReadonlyArray1<f64>,
    fs: f64,
    f0: Option<f64>,
    alpha: Option<f64>,
    unit: Option<f64>,
) -> PyResult<(Py<PyArray1<f64>>, Py<PyArray1<f64>>)> {
    let signal = x.as_array().to_owned();
    let config = AdaptiveNotchConfig::new(fs)
        .with_f0(f0.unwrap_or(50.0))
        .with_alpha(alpha.unwrap_or(1e-5))
        .with_unit(unit.unwrap_or(1.0));

    let output = Python::allow_threads(py, || adaptive_notch_with(signal.view(), &config))?;

    Ok((output.filtered.into_pyarray(py).into(), output.estimate.into_pyarray(py).into()))
}

/// Adaptive notch filter of every channel in parallel, data of shape (n_samples, n_channels)
#[pyfunction]
fn adapt_notch_filter_channels(
    py: Python<'_>,
    data: PyReadonlyArray2<f64>,
    fs: f64,
    f0: Option<f64>,
    alpha: Option<f64>,
    unit: Option<f64>,
) -> PyResult<(Py<PyArray2<f64>>, Py<PyArray2<f64>>)> {
    let data_array = data.as_array().to_owned();
    let config = AdaptiveNotchConfig::new(fs)
        .with_f0(f0.unwrap_or(50.0))
        .with_alpha(alpha.unwrap_or(1e-5))
        .with_unit(unit.unwrap_or(1.0));

    let output = Python::allow_threads(py, || {
        adaptive_notch_channels_parallel(data_array.view(), &[config])
    })?;

    Ok((output.filtered.into_pyarray(py).into(), output.estimate.into_pyarray(py).into()))
}

/// Zero-phase Butterworth lowpass
#[pyfunction]
fn lowpass(py: Python<'_>, x: PyReadonlyArray1<f64>, order: usize, fc: f64, fs: f64) -> PyResult<Py<PyArray1<f64>>> {
    let signal = x.as_array().to_owned();
    let output = Python::allow_threads(py, || lowpass_filter(signal.view(), order, fc, fs))?;
    Ok(output.into_pyarray(py).into())
}

/// Zero-phase Butterworth highpass
#[pyfunction]
fn highpass(py: Python<'_>, x: PyReadonlyArray1<f64>, order: usize, fc: f64, fs: f64) -> PyResult<Py<PyArray1<f64>>> {
    let signal = x.as_array().to_owned();
    let output = Python::allow_threads(py, || highpass_filter(signal.view(), order, fc, fs))?;
    Ok(output.into_pyarray(py).into())
}

/// Zero-phase Butterworth bandstop centered on `fc`
#[pyfunction]
fn notch(
    py: Python<'_>,
    x: PyReadonlyArray1<f64>,
    order: usize,
    fc: f64,
    fs: f64,
    bw: f64,
) -> PyResult<Py<PyArray1<f64>>> {
    let signal = x.as_array().to_owned();
    let output = Python::allow_threads(py, || notch_filter(signal.view(), order, fc, fs, bw))?;
    Ok(output.into_pyarray(py).into())
}

/// Apply second-order sections to multiple channels in parallel
#[pyfunction]
fn sos_filter_channels(
    py: Python<'_>,
    data: PyReadonlyArray2<f64>,
    sos: PyReadonlyArray2<f64>,
    filtfilt: Option<bool>,
) -> PyResult<Py<PyArray2<f64>>> {
    let data_array = data.as_array().to_owned();
    let sos_array = sos.as_array().to_owned();
    let use_filtfilt = filtfilt.unwrap_or(true);

    let output = Python::allow_threads(py, || {
        filter_channels(data_array.view(), sos_array.view(), use_filtfilt)
    })?;

    Ok(output.into_pyarray(py).into())
}

/// Moving average with "same" alignment
#[pyfunction]
fn moving_average(py: Python<'_>, x: PyReadonlyArray1<f64>, size: usize) -> PyResult<Py<PyArray1<f64>>> {
    let signal = x.as_array().to_owned();
    let output = Python::allow_threads(py, || average_filter(signal.view(), size))?;
    Ok(output.into_pyarray(py).into())
}

/// One row per beat; `size` samples, or sized from the RR intervals by `rr` ("mean", "median", "min", "max")
#[pyfunction]
fn beats(
    py: Python<'_>,
    x: PyReadonlyArray1<f64>,
    r_peaks: PyReadonlyArray1<i64>,
    size: Option<usize>,
    rr: Option<String>,
    wrap: Option<bool>,
) -> PyResult<Py<PyArray2<f64>>> {
    let signal = x.as_array().to_owned();
    let r_peaks = to_isize(r_peaks);
    let width = match (size, rr) {
        (Some(size), _) => BeatWidth::Fixed(size),
        (None, Some(name)) => BeatWidth::FromRr(name.parse::<RrStatistic>()?),
        (None, None) => BeatWidth::FromRr(RrStatistic::Median),
    };
    let policy = policy(wrap);

    let output = Python::allow_threads(py, || beat_matrix(signal.view(), &r_peaks, width, policy))?;
    Ok(output.into_pyarray(py).into())
}

/// Sample times in seconds
#[pyfunction]
fn time(py: Python<'_>, n_samples: usize, fs: f64) -> PyResult<Py<PyArray1<f64>>> {
    Ok(time_axis(n_samples, fs)?.into_pyarray(py).into())
}

/// Python module entry point
#[pymodule]
fn _rs(py: Python<'_>, m: &Bound<'_, PyModule>) -> PyResult<()> {
    // Windows
    m.add_function(wrap_pyfunction!(sliding_window, py)?)?;
    m.add_function(wrap_pyfunction!(beats, py)?)?;
    m.add_function(wrap_pyfunction!(time, py)?)?;

    // Baseline wander
    m.add_function(wrap_pyfunction!(spline_filter, py)?)?;
    m.add_function(wrap_pyfunction!(median_filter, py)?)?;
    m.add_function(wrap_pyfunction!(isoline_level, py)?)?;
    m.add_function(wrap_pyfunction!(isoline_filter, py)?)?;

    // Power-line interference
    m.add_function(wrap_pyfunction!(adapt_notch_filter, py)?)?;
    m.add_function(wrap_pyfunction!(adapt_notch_filter_channels, py)?)?;

    // IIR / FIR filters
    m.add_function(wrap_pyfunction!(lowpass, py)?)?;
    m.add_function(wrap_pyfunction!(highpass, py)?)?;
    m.add_function(wrap_pyfunction!(notch, py)?)?;
    m.add_function(wrap_pyfunction!(sos_filter_channels, py)?)?;
    m.add_function(wrap_pyfunction!(moving_average, py)?)?;

    Ok(())
}
