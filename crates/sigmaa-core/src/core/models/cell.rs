use super::miller::MillerIndex;
use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const MIN_RELATIVE_VOLUME_SQ: f64 = 1e-9;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum CellError {
    #[error("Unit cell parameter '{name}' must be positive and finite, got {value}")]
    InvalidParameter { name: &'static str, value: f64 },
    #[error("Unit cell angles ({alpha}, {beta}, {gamma}) do not describe a valid cell")]
    DegenerateMetric { alpha: f64, beta: f64, gamma: f64 },
}

/// Unit cell parameters with lengths in Ångström and angles in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CellParameters {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
}

/// A crystal unit cell carrying its reciprocal metric tensor, used to turn
/// Miller indices into the resolution metric d*².
#[derive(Debug, Clone, PartialEq)]
pub struct UnitCell {
    parameters: CellParameters,
    reciprocal_metric: Matrix3<f64>,
}

impl UnitCell {
    pub fn new(parameters: CellParameters) -> Result<Self, CellError> {
        let named = [
            ("a", parameters.a),
            ("b", parameters.b),
            ("c", parameters.c),
            ("alpha", parameters.alpha),
            ("beta", parameters.beta),
            ("gamma", parameters.gamma),
        ];
        for (name, value) in named {
            if !(value.is_finite() && value > 0.0) {
                return Err(CellError::InvalidParameter { name, value });
            }
        }

        let degenerate = || CellError::DegenerateMetric {
            alpha: parameters.alpha,
            beta: parameters.beta,
            gamma: parameters.gamma,
        };

        let CellParameters { a, b, c, .. } = parameters;
        let cos_alpha = parameters.alpha.to_radians().cos();
        let cos_beta = parameters.beta.to_radians().cos();
        let cos_gamma = parameters.gamma.to_radians().cos();

        let metric = Matrix3::new(
            a * a,
            a * b * cos_gamma,
            a * c * cos_beta,
            a * b * cos_gamma,
            b * b,
            b * c * cos_alpha,
            a * c * cos_beta,
            b * c * cos_alpha,
            c * c,
        );

        // Determinant is V²; it vanishes when the angles cannot close a cell.
        if metric.determinant() <= MIN_RELATIVE_VOLUME_SQ * (a * b * c).powi(2) {
            return Err(degenerate());
        }
        let reciprocal_metric = metric.try_inverse().ok_or_else(degenerate)?;

        Ok(Self {
            parameters,
            reciprocal_metric,
        })
    }

    pub fn cubic(a: f64) -> Result<Self, CellError> {
        Self::new(CellParameters {
            a,
            b: a,
            c: a,
            alpha: 90.0,
            beta: 90.0,
            gamma: 90.0,
        })
    }

    pub fn parameters(&self) -> &CellParameters {
        &self.parameters
    }

    pub fn volume(&self) -> f64 {
        let inverse_volume_sq = self.reciprocal_metric.determinant();
        1.0 / inverse_volume_sq.sqrt()
    }

    #[inline]
    pub fn d_star_sq(&self, index: MillerIndex) -> f64 {
        let h = Vector3::from(index.as_f64());
        h.dot(&(self.reciprocal_metric * h))
    }

    #[inline]
    pub fn d_spacing(&self, index: MillerIndex) -> f64 {
        1.0 / self.d_star_sq(index).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 1e-10;

    fn f64_approx_equal(a: f64, b: f64) -> bool {
        (a - b).abs() < TOLERANCE
    }

    #[test]
    fn cubic_cell_gives_expected_d_spacing() {
        let cell = UnitCell::cubic(10.0).unwrap();
        assert!(f64_approx_equal(cell.d_star_sq(MillerIndex::new(1, 0, 0)), 0.01));
        assert!(f64_approx_equal(cell.d_spacing(MillerIndex::new(1, 1, 0)), 10.0 / 2f64.sqrt()));
        assert!(f64_approx_equal(cell.volume(), 1000.0));
    }

    #[test]
    fn orthorhombic_cell_weights_axes_independently() {
        let cell = UnitCell::new(CellParameters {
            a: 10.0,
            b: 20.0,
            c: 40.0,
            alpha: 90.0,
            beta: 90.0,
            gamma: 90.0,
        })
        .unwrap();
        let expected = 1.0 / 100.0 + 4.0 / 400.0 + 9.0 / 1600.0;
        assert!(f64_approx_equal(cell.d_star_sq(MillerIndex::new(1, 2, 3)), expected));
    }

    #[test]
    fn monoclinic_cell_matches_closed_form() {
        let beta = 105.0_f64;
        let cell = UnitCell::new(CellParameters {
            a: 30.0,
            b: 40.0,
            c: 50.0,
            alpha: 90.0,
            beta,
            gamma: 90.0,
        })
        .unwrap();
        let (h, k, l) = (2.0, 1.0, -3.0);
        let sin_b = beta.to_radians().sin();
        let cos_b = beta.to_radians().cos();
        let expected = (h * h / (30.0 * 30.0) + l * l / (50.0 * 50.0)
            - 2.0 * h * l * cos_b / (30.0 * 50.0))
            / (sin_b * sin_b)
            + k * k / (40.0 * 40.0);
        let value = cell.d_star_sq(MillerIndex::new(2, 1, -3));
        assert!((value - expected).abs() < 1e-12);
    }

    #[test]
    fn non_positive_length_is_rejected() {
        let result = UnitCell::cubic(0.0);
        assert!(matches!(
            result,
            Err(CellError::InvalidParameter { name: "a", .. })
        ));
    }

    #[test]
    fn impossible_angles_are_rejected() {
        let result = UnitCell::new(CellParameters {
            a: 10.0,
            b: 10.0,
            c: 10.0,
            alpha: 120.0,
            beta: 120.0,
            gamma: 120.0,
        });
        assert!(matches!(result, Err(CellError::DegenerateMetric { .. })));
    }
}
