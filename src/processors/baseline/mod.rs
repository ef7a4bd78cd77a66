// src/processors/baseline/mod.rs
pub mod median_baseline;
pub mod spline;
pub mod spline_baseline;

// Re-export baseline functions
pub use median_baseline::{
    median_baseline,
    median_baseline_channels,
    remove_median_baseline,
    remove_median_baseline_channels,
    remove_median_baseline_channels_inplace,
};
pub use spline::{BSpline, Extrapolation, MAX_SPLINE_DEGREE};
pub use spline_baseline::{
    closest_observation_median,
    estimate_spline_baseline,
    remove_spline_baseline,
    remove_spline_baseline_channels,
    remove_spline_baseline_channels_inplace,
    remove_spline_baseline_inplace,
    spline_anchors,
    spline_baseline,
    spline_baseline_channels,
    SplineAnchors,
    SplineBaselineConfig,
};
