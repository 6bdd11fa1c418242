//! Box constraints: coordinate clamping and the projected-gradient norm.

use crate::SpgError;
use ndarray::Array1;

/// Independent lower/upper bounds for every variable.
///
/// Either bound may be infinite per coordinate. The box is validated once on
/// construction and is immutable afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxBounds {
    lower: Array1<f64>,
    upper: Array1<f64>,
}

impl BoxBounds {
    /// Builds a box from explicit bound vectors.
    ///
    /// Fails if the lengths differ or if `lower[i] <= upper[i]` does not hold
    /// for some coordinate (a NaN bound fails the check as well).
    pub fn new(lower: Array1<f64>, upper: Array1<f64>) -> Result<Self, SpgError> {
        let bounds = Self::from_parts(lower, upper);
        bounds.validate()?;
        Ok(bounds)
    }

    // Unchecked; the solver validates before its first evaluation.
    pub(crate) fn from_parts(lower: Array1<f64>, upper: Array1<f64>) -> Self {
        Self { lower, upper }
    }

    pub(crate) fn into_parts(self) -> (Array1<f64>, Array1<f64>) {
        (self.lower, self.upper)
    }

    pub(crate) fn validate(&self) -> Result<(), SpgError> {
        if self.lower.len() != self.upper.len() {
            return Err(SpgError::DimensionMismatch {
                what: "upper bounds",
                expected: self.lower.len(),
                found: self.upper.len(),
            });
        }
        for i in 0..self.lower.len() {
            let lo = self.lower[i];
            let hi = self.upper[i];
            if !(lo <= hi) {
                return Err(SpgError::InvalidBounds {
                    index: i,
                    lower: lo,
                    upper: hi,
                });
            }
        }
        Ok(())
    }

    /// A box that imposes no constraint on `n` variables.
    pub fn unbounded(n: usize) -> Self {
        Self {
            lower: Array1::from_elem(n, f64::NEG_INFINITY),
            upper: Array1::from_elem(n, f64::INFINITY),
        }
    }

    pub fn lower(&self) -> &Array1<f64> {
        &self.lower
    }

    pub fn upper(&self) -> &Array1<f64> {
        &self.upper
    }

    /// Number of variables the box constrains.
    pub fn len(&self) -> usize {
        self.lower.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lower.is_empty()
    }

    /// Returns the projection of `x` onto the box.
    pub fn project(&self, x: &Array1<f64>) -> Array1<f64> {
        let mut z = x.clone();
        self.project_in_place(&mut z);
        z
    }

    /// Clamps every coordinate of `x` into `[lower_i, upper_i]`.
    pub fn project_in_place(&self, x: &mut Array1<f64>) {
        for i in 0..x.len() {
            let lo = self.lower[i];
            let hi = self.upper[i];
            if x[i] < lo {
                x[i] = lo;
            } else if x[i] > hi {
                x[i] = hi;
            }
        }
    }

    /// Euclidean norm of `P(x - g) - x`.
    ///
    /// Zero exactly at box-constrained stationary points. Computed without
    /// allocating.
    pub fn projected_gradient_norm(&self, x: &Array1<f64>, g: &Array1<f64>) -> f64 {
        let mut sum = 0.0;
        for i in 0..x.len() {
            let step = (x[i] - g[i]).max(self.lower[i]).min(self.upper[i]) - x[i];
            sum += step * step;
        }
        sum.sqrt()
    }
}
