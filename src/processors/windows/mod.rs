// src/processors/windows/mod.rs
pub mod sliding_window;
pub mod beat_matrix;

// Re-export window functions
pub use sliding_window::{
    extract_windows,
    window_onset,
    ExtractedWindows,
    WindowPolicy,
};
pub use beat_matrix::{
    beat_matrix,
    resolve_beat_width,
    BeatWidth,
    RrStatistic,
};
