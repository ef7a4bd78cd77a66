// src/processors/baseline/spline.rs

use ndarray::Array1;

use crate::error::{EcgError, Result};

/// Highest supported spline degree
pub const MAX_SPLINE_DEGREE: usize = 5;

/// Behavior of a spline outside the range of its data points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Extrapolation {
    /// Continue with the tangent line at the first/last data point
    #[default]
    Linear,
    /// Continue the outermost polynomial pieces
    Polynomial,
}

/// B-spline in knot/coefficient form
#[derive(Debug, Clone)]
struct SplineRepr {
    knots: Vec<f64>,
    coeffs: Vec<f64>,
    degree: usize,
}

impl SplineRepr {
    /// Knot span `l` with `knots[l] <= x < knots[l + 1]`, clamped to the
    /// first and last polynomial pieces
    fn span(&self, x: f64) -> usize {
        let k = self.degree;
        let m = self.coeffs.len();
        let interior = &self.knots[k + 1..m];
        k + interior.partition_point(|&t| t <= x)
    }

    /// Values of the `degree + 1` basis functions that are non-zero on `span`
    fn basis(&self, span: usize, x: f64) -> Vec<f64> {
        let k = self.degree;
        let t = &self.knots;
        let mut n = vec![0.0; k + 1];
        let mut left = vec![0.0; k + 1];
        let mut right = vec![0.0; k + 1];
        n[0] = 1.0;

        for j in 1..=k {
            left[j] = x - t[span + 1 - j];
            right[j] = t[span + j] - x;
            let mut saved = 0.0;
            for r in 0..j {
                let temp = n[r] / (right[r + 1] + left[j - r]);
                n[r] = saved + right[r + 1] * temp;
                saved = left[j - r] * temp;
            }
            n[j] = saved;
        }

        n
    }

    /// de Boor evaluation
    fn eval(&self, x: f64) -> f64 {
        let k = self.degree;
        let t = &self.knots;
        let l = self.span(x);
        let mut d: Vec<f64> = (0..=k).map(|j| self.coeffs[j + l - k]).collect();

        for r in 1..=k {
            for j in (r..=k).rev() {
                let i = j + l - k;
                let denom = t[i + k + 1 - r] - t[i];
                let alpha = if denom == 0.0 { 0.0 } else { (x - t[i]) / denom };
                d[j] = (1.0 - alpha) * d[j - 1] + alpha * d[j];
            }
        }

        d[k]
    }

    /// First derivative as a spline of one degree less
    fn derivative(&self) -> SplineRepr {
        let k = self.degree;
        let t = &self.knots;
        let coeffs = (0..self.coeffs.len() - 1)
            .map(|j| {
                let denom = t[j + k + 1] - t[j + 1];
                if denom == 0.0 {
                    0.0
                } else {
                    k as f64 * (self.coeffs[j + 1] - self.coeffs[j]) / denom
                }
            })
            .collect();

        SplineRepr {
            knots: t[1..t.len() - 1].to_vec(),
            coeffs,
            degree: k - 1,
        }
    }
}

/// Interpolating spline through a set of data points.
///
/// Knots follow the FITPACK placement used for a zero smoothing factor: the
/// boundary knots are repeated `degree + 1` times and the interior knots sit
/// on the data points (odd degree) or halfway between them (even degree), so
/// there are as many coefficients as data points and the curve passes
/// through every point.
#[derive(Debug, Clone)]
pub struct BSpline {
    repr: SplineRepr,
    extrapolation: Extrapolation,
    x_min: f64,
    x_max: f64,
    y_min: f64,
    y_max: f64,
    slope_min: f64,
    slope_max: f64,
}

impl BSpline {
    /// Fit the interpolating spline of `degree` through `(x, y)`.
    ///
    /// `x` must be finite and strictly increasing, with at least
    /// `degree + 1` points.
    pub fn interpolate(
        x: &[f64],
        y: &[f64],
        degree: usize,
        extrapolation: Extrapolation,
    ) -> Result<Self> {
        if degree == 0 || degree > MAX_SPLINE_DEGREE {
            return Err(EcgError::InvalidParameter(format!(
                "spline degree must be between 1 and {}, got {}",
                MAX_SPLINE_DEGREE, degree
            )));
        }

        if x.len() != y.len() {
            return Err(EcgError::ShapeMismatch {
                expected: format!("{} values", x.len()),
                found: format!("{} values", y.len()),
            });
        }

        let m = x.len();
        if m < degree + 1 {
            return Err(EcgError::InsufficientAnchors { found: m, required: degree + 1 });
        }

        if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
            return Err(EcgError::InvalidParameter("spline data must be finite".to_string()));
        }

        if x.windows(2).any(|w| w[1] <= w[0]) {
            return Err(EcgError::InvalidParameter(
                "spline abscissae must be strictly increasing".to_string(),
            ));
        }

        let knots = interpolation_knots(x, degree);
        let mut repr = SplineRepr { knots, coeffs: vec![0.0; m], degree };
        repr.coeffs = solve_collocation(&repr, x, y)?;

        let x_min = x[0];
        let x_max = x[m - 1];
        let slope = repr.derivative();

        Ok(BSpline {
            extrapolation,
            x_min,
            x_max,
            y_min: repr.eval(x_min),
            y_max: repr.eval(x_max),
            slope_min: slope.eval(x_min),
            slope_max: slope.eval(x_max),
            repr,
        })
    }

    pub fn degree(&self) -> usize {
        self.repr.degree
    }

    pub fn knots(&self) -> &[f64] {
        &self.repr.knots
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.repr.coeffs
    }

    /// Evaluate the spline at `x`
    pub fn evaluate(&self, x: f64) -> f64 {
        match self.extrapolation {
            Extrapolation::Linear if x < self.x_min => {
                self.y_min + self.slope_min * (x - self.x_min)
            }
            Extrapolation::Linear if x > self.x_max => {
                self.y_max + self.slope_max * (x - self.x_max)
            }
            _ => self.repr.eval(x),
        }
    }

    /// Evaluate the spline at the sample positions `0..n_samples`
    pub fn evaluate_samples(&self, n_samples: usize) -> Array1<f64> {
        Array1::from_shape_fn(n_samples, |i| self.evaluate(i as f64))
    }
}

/// Knot vector for an interpolating spline with zero smoothing
fn interpolation_knots(x: &[f64], k: usize) -> Vec<f64> {
    let m = x.len();
    let half = k / 2;
    let mut knots = Vec::with_capacity(m + k + 1);

    knots.extend(std::iter::repeat(x[0]).take(k + 1));
    for l in 0..m - k - 1 {
        let j = half + 1 + l;
        if k % 2 == 1 {
            knots.push(x[j]);
        } else {
            knots.push(0.5 * (x[j - 1] + x[j]));
        }
    }
    knots.extend(std::iter::repeat(x[m - 1]).take(k + 1));

    knots
}

/// Solve the banded collocation system `B c = y`.
///
/// Row `i` holds the basis functions evaluated at `x[i]`; its non-zeros lie
/// within `degree` of the diagonal. The matrix is totally positive, so
/// elimination runs without pivoting.
fn solve_collocation(repr: &SplineRepr, x: &[f64], y: &[f64]) -> Result<Vec<f64>> {
    let k = repr.degree;
    let m = x.len();
    let width = 2 * k + 1;

    // Band storage: column j of row i lives at band[i][j + k - i]
    let mut band = vec![vec![0.0; width]; m];
    for (i, &xi) in x.iter().enumerate() {
        let span = repr.span(xi);
        let values = repr.basis(span, xi);
        for (r, value) in values.into_iter().enumerate() {
            let col = span - k + r;
            if col + k < i || col > i + k {
                return Err(EcgError::SingularSystem);
            }
            band[i][col + k - i] = value;
        }
    }

    let mut rhs = y.to_vec();

    // Forward elimination
    for p in 0..m {
        let pivot = band[p][k];
        if !pivot.is_finite() || pivot.abs() < f64::EPSILON {
            return Err(EcgError::SingularSystem);
        }

        let last = (p + k).min(m - 1);
        for r in p + 1..=last {
            let factor = band[r][p + k - r] / pivot;
            if factor == 0.0 {
                continue;
            }
            for c in p..=last {
                band[r][c + k - r] -= factor * band[p][c + k - p];
            }
            rhs[r] -= factor * rhs[p];
        }
    }

    // Back substitution
    let mut coeffs = vec![0.0; m];
    for p in (0..m).rev() {
        let last = (p + k).min(m - 1);
        let mut acc = rhs[p];
        for c in p + 1..=last {
            acc -= band[p][c + k - p] * coeffs[c];
        }
        coeffs[p] = acc / band[p][k];
    }

    Ok(coeffs)
}
