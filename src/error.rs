// src/error.rs

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EcgError {
    #[error("Invalid window size {window_size} for a signal of {signal_len} samples")]
    InvalidWindow { window_size: usize, signal_len: usize },

    #[error("Invalid centers: {0}")]
    InvalidCenters(String),

    #[error("Not enough anchors for the spline: found {found}, need at least {required}")]
    InsufficientAnchors { found: usize, required: usize },

    #[error("Shape mismatch: expected {expected}, found {found}")]
    ShapeMismatch { expected: String, found: String },

    #[error("Unknown isoline engine: {0}")]
    UnknownEngine(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Spline collocation system is singular")]
    SingularSystem,

    #[error("FFT error: {0}")]
    Fft(#[from] realfft::FftError),
}

pub type Result<T> = std::result::Result<T, EcgError>;

impl EcgError {
    pub(crate) fn invalid_window(window_size: usize, signal_len: usize) -> Self {
        EcgError::InvalidWindow { window_size, signal_len }
    }
}
