use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const SVD_EPSILON: f64 = 1e-12;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum FitError {
    #[error("Cannot fit a Chebyshev series to an empty sample")]
    EmptyInput,
    #[error("A Chebyshev series needs at least one term")]
    ZeroTerms,
    #[error("Sample columns differ in length: x has {x}, y has {y}")]
    LengthMismatch { x: usize, y: usize },
    #[error("Expected {expected} weights, got {actual}")]
    WeightLengthMismatch { expected: usize, actual: usize },
    #[error("Chebyshev domain [{low}, {high}] is empty or not finite")]
    DegenerateDomain { low: f64, high: f64 },
    #[error("Weight {value} at sample {index} must be finite and non-negative")]
    InvalidWeight { index: usize, value: f64 },
    #[error("Sample {index} is not finite")]
    NonFiniteSample { index: usize },
    #[error("Least-squares solve failed: {0}")]
    SolverFailed(String),
}

/// A truncated Chebyshev series `Σ c_k T_k(t)` over the domain `[low, high]`,
/// where `t` is the affine map of `x` onto `[-1, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChebyshevSeries {
    low: f64,
    high: f64,
    coefficients: Vec<f64>,
}

impl ChebyshevSeries {
    pub fn new(low: f64, high: f64, coefficients: Vec<f64>) -> Result<Self, FitError> {
        check_domain(low, high)?;
        if coefficients.is_empty() {
            return Err(FitError::ZeroTerms);
        }
        Ok(Self {
            low,
            high,
            coefficients,
        })
    }

    /// Weighted least-squares fit minimizing `Σ w_i (y_i - f(x_i))²`.
    /// Uniform weights are used when `weights` is `None`.
    pub fn fit(
        n_terms: usize,
        low: f64,
        high: f64,
        x: &[f64],
        y: &[f64],
        weights: Option<&[f64]>,
    ) -> Result<Self, FitError> {
        if n_terms == 0 {
            return Err(FitError::ZeroTerms);
        }
        check_domain(low, high)?;
        if x.is_empty() {
            return Err(FitError::EmptyInput);
        }
        if x.len() != y.len() {
            return Err(FitError::LengthMismatch {
                x: x.len(),
                y: y.len(),
            });
        }
        if let Some(index) = x.iter().zip(y).position(|(a, b)| !(a.is_finite() && b.is_finite())) {
            return Err(FitError::NonFiniteSample { index });
        }
        let row_scale: Vec<f64> = match weights {
            Some(w) => {
                if w.len() != x.len() {
                    return Err(FitError::WeightLengthMismatch {
                        expected: x.len(),
                        actual: w.len(),
                    });
                }
                if let Some((index, &value)) = w
                    .iter()
                    .enumerate()
                    .find(|&(_, &v)| !(v.is_finite() && v >= 0.0))
                {
                    return Err(FitError::InvalidWeight { index, value });
                }
                w.iter().map(|v| v.sqrt()).collect()
            }
            None => vec![1.0; x.len()],
        };

        let mut design = DMatrix::<f64>::zeros(x.len(), n_terms);
        let mut basis = vec![0.0; n_terms];
        for (row, &xi) in x.iter().enumerate() {
            chebyshev_basis(to_unit_interval(xi, low, high), &mut basis);
            for (col, &value) in basis.iter().enumerate() {
                design[(row, col)] = value * row_scale[row];
            }
        }
        let rhs = DVector::from_iterator(
            y.len(),
            y.iter().zip(&row_scale).map(|(yi, scale)| yi * scale),
        );

        let solution = design
            .svd(true, true)
            .solve(&rhs, SVD_EPSILON)
            .map_err(|e| FitError::SolverFailed(e.to_string()))?;

        Self::new(low, high, solution.iter().copied().collect())
    }

    pub fn n_terms(&self) -> usize {
        self.coefficients.len()
    }

    pub fn domain(&self) -> (f64, f64) {
        (self.low, self.high)
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    /// Evaluates the series with Clenshaw's recurrence.
    pub fn value(&self, x: f64) -> f64 {
        let t = to_unit_interval(x, self.low, self.high);
        let (mut b1, mut b2) = (0.0, 0.0);
        for &c in self.coefficients.iter().skip(1).rev() {
            let b0 = 2.0 * t * b1 - b2 + c;
            b2 = b1;
            b1 = b0;
        }
        t * b1 - b2 + self.coefficients[0]
    }

    pub fn values(&self, x: &[f64]) -> Vec<f64> {
        x.iter().map(|&xi| self.value(xi)).collect()
    }
}

fn check_domain(low: f64, high: f64) -> Result<(), FitError> {
    if !(low.is_finite() && high.is_finite() && high > low) {
        return Err(FitError::DegenerateDomain { low, high });
    }
    Ok(())
}

#[inline]
fn to_unit_interval(x: f64, low: f64, high: f64) -> f64 {
    (2.0 * x - (high + low)) / (high - low)
}

fn chebyshev_basis(t: f64, out: &mut [f64]) {
    for k in 0..out.len() {
        out[k] = match k {
            0 => 1.0,
            1 => t,
            _ => 2.0 * t * out[k - 1] - out[k - 2],
        };
    }
}
