use serde::{Deserialize, Serialize};

/// Relative + absolute closeness test used to accept floating-point output
/// that is not bitwise identical to the reference.
///
/// An element passes when `|actual - expected| <= atol + rtol * |expected|`.
/// NaN never passes unless `equal_nan` is set, in which case NaN matches
/// NaN. Infinities match infinities of the same sign.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tolerance {
    pub rtol: f64,
    pub atol: f64,
    #[serde(default)]
    pub equal_nan: bool,
}

/// First element that failed a [`Tolerance`] check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mismatch {
    pub index: usize,
    pub actual: f64,
    pub expected: f64,
}

impl Default for Tolerance {
    fn default() -> Self {
        Self { rtol: 1e-3, atol: 1e-3, equal_nan: false }
    }
}

impl Tolerance {
    pub fn new(rtol: f64, atol: f64) -> Self {
        Self { rtol, atol, equal_nan: false }
    }

    /// Treat NaN in both actual and expected as a match.
    pub fn with_equal_nan(mut self, equal_nan: bool) -> Self {
        self.equal_nan = equal_nan;
        self
    }

    /// Whether a single element is within tolerance.
    pub fn is_close(&self, actual: f64, expected: f64) -> bool {
        if actual.is_nan() || expected.is_nan() {
            return self.equal_nan && actual.is_nan() && expected.is_nan();
        }
        if actual == expected {
            return true;
        }
        if actual.is_infinite() || expected.is_infinite() {
            return false;
        }
        (actual - expected).abs() <= self.atol + self.rtol * expected.abs()
    }

    /// Compare element-wise and return the first mismatch, if any.
    ///
    /// A length difference is reported at the first index past the shorter
    /// slice, with NaN standing in for the missing value.
    pub fn first_mismatch(&self, actual: &[f64], expected: &[f64]) -> Option<Mismatch> {
        let found = actual
            .iter()
            .zip(expected.iter())
            .enumerate()
            .find(|(_, (&a, &e))| !self.is_close(a, e))
            .map(|(index, (&actual, &expected))| Mismatch { index, actual, expected });
        if found.is_some() || actual.len() == expected.len() {
            return found;
        }
        let index = actual.len().min(expected.len());
        Some(Mismatch {
            index,
            actual: actual.get(index).copied().unwrap_or(f64::NAN),
            expected: expected.get(index).copied().unwrap_or(f64::NAN),
        })
    }
}
