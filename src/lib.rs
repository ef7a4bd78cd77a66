// src/lib.rs

//! ECG signal conditioning.
//!
//! Power-line interference removal (adaptive notch and Butterworth band
//! stop), baseline wander removal (cubic spline through PQ-segment anchors,
//! running median, Butterworth highpass), isoline correction and beat
//! segmentation around fiducial points.
//!
//! Multi-channel data is laid out as `(n_samples, n_channels)` and channels
//! are processed in parallel with rayon. The `python` feature builds the
//! `_rs` extension module.

pub mod error;
pub mod processors;

#[cfg(feature = "python")]
mod python;

pub use error::{EcgError, Result};

pub use processors::baseline::{
    estimate_spline_baseline, median_baseline, remove_median_baseline, remove_spline_baseline,
    spline_baseline, BSpline, Extrapolation, SplineBaselineConfig,
};
pub use processors::basics::time_axis;
pub use processors::filters::{
    adaptive_notch, adaptive_notch_with, average_filter, butter_sos, highpass_filter,
    lowpass_filter, notch_filter, sosfiltfilt, AdaptiveNotchConfig, FilterBand, NotchOutput,
};
pub use processors::isoline::{isoline, isoline_correction, IsolineEngine, IsolineLimits};
pub use processors::windows::{
    beat_matrix, extract_windows, BeatWidth, ExtractedWindows, RrStatistic, WindowPolicy,
};
