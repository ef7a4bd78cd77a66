// src/processors/isoline/mod.rs
pub mod isoline;

pub use isoline::{
    isoline,
    isoline_channels,
    isoline_correction,
    isoline_correction_channels,
    isoline_correction_inplace,
    IsolineEngine,
    IsolineLimits,
    DEFAULT_BINS,
};
