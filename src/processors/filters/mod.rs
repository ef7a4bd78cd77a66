// src/processors/filters/mod.rs
pub mod adaptive_notch;
pub mod base_filters;
pub mod fir_filters;
pub mod iir_filters;

// Re-export functions
pub use adaptive_notch::{
    adaptive_notch, adaptive_notch_channels, adaptive_notch_channels_parallel, adaptive_notch_with,
    sign, AdaptiveNotchConfig, NotchOutput, NotchState,
};
pub use base_filters::{filter_channels, filtfilt_padlen, sosfilt, sosfilt_zi, sosfiltfilt};
pub use fir_filters::{average_filter, average_filter_channels};
pub use iir_filters::{butter_sos, highpass_filter, lowpass_filter, notch_filter, FilterBand};
