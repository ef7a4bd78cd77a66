// src/processors/basics/time_axis.rs

use ndarray::Array1;

use crate::error::{EcgError, Result};

/// Sample times in seconds: `[0, 1/fs, 2/fs, ...]` of length `n_samples`
pub fn time_axis(n_samples: usize, fs: f64) -> Result<Array1<f64>> {
    if !(fs.is_finite() && fs > 0.0) {
        return Err(EcgError::InvalidParameter(format!(
            "sampling frequency must be positive, got {}",
            fs
        )));
    }
    Ok(Array1::from_shape_fn(n_samples, |i| i as f64 / fs))
}
