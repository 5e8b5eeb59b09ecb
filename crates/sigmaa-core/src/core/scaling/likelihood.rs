use crate::core::math::special::{bessel_i1_over_i0, ln_bessel_i0, ln_cosh};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum TargetError {
    #[error("Target columns differ in length: {e_obs} observed, {e_calc} calculated, {centric} centric flags, {d_star_cubed} resolutions")]
    LengthMismatch {
        e_obs: usize,
        e_calc: usize,
        centric: usize,
        d_star_cubed: usize,
    },
    #[error("Kernel width must be positive and finite, got {0}")]
    InvalidWidth(f64),
}

/// Log-likelihood of a single reflection pair and its derivative with respect to
/// sigmaA, dropping terms that do not depend on sigmaA. `sigmaa` must lie in (0, 1).
pub fn log_likelihood(e_obs: f64, e_calc: f64, sigmaa: f64, centric: bool) -> (f64, f64) {
    let s = sigmaa;
    let q = 1.0 - s * s;
    let spread = e_obs * e_obs + s * s * e_calc * e_calc;
    let d_spread_over_q = (2.0 * s * e_calc * e_calc * q + spread * 2.0 * s) / (q * q);
    let dx_scale = e_obs * e_calc * (1.0 + s * s) / (q * q);

    if centric {
        let x = s * e_obs * e_calc / q;
        let value = -0.5 * q.ln() - spread / (2.0 * q) + ln_cosh(x);
        let gradient = s / q - 0.5 * d_spread_over_q + x.tanh() * dx_scale;
        (value, gradient)
    } else {
        let x = 2.0 * s * e_obs * e_calc / q;
        let value = -q.ln() - spread / q + ln_bessel_i0(x);
        let gradient = 2.0 * s / q - d_spread_over_q + bessel_i1_over_i0(x) * 2.0 * dx_scale;
        (value, gradient)
    }
}

/// Kernel-weighted sigmaA likelihood over a set of reflections, evaluated at a
/// resolution `h` in d*³ units.
///
/// Each reflection contributes with weight `exp(-½((h - h_i)/width)²)`.
#[derive(Debug, Clone)]
pub struct SigmaaTarget {
    e_obs: Vec<f64>,
    e_calc: Vec<f64>,
    centric: Vec<bool>,
    d_star_cubed: Vec<f64>,
    width: f64,
}

impl SigmaaTarget {
    pub fn new(
        e_obs: Vec<f64>,
        e_calc: Vec<f64>,
        centric: Vec<bool>,
        d_star_cubed: Vec<f64>,
        width: f64,
    ) -> Result<Self, TargetError> {
        let n = e_obs.len();
        if e_calc.len() != n || centric.len() != n || d_star_cubed.len() != n {
            return Err(TargetError::LengthMismatch {
                e_obs: n,
                e_calc: e_calc.len(),
                centric: centric.len(),
                d_star_cubed: d_star_cubed.len(),
            });
        }
        if !(width.is_finite() && width > 0.0) {
            return Err(TargetError::InvalidWidth(width));
        }
        Ok(Self {
            e_obs,
            e_calc,
            centric,
            d_star_cubed,
            width,
        })
    }

    pub fn len(&self) -> usize {
        self.e_obs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.e_obs.is_empty()
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    #[inline]
    fn weight(&self, h: f64, h_i: f64) -> f64 {
        let z = (h - h_i) / self.width;
        (-0.5 * z * z).exp()
    }

    pub fn target(&self, h: f64, sigmaa: f64) -> f64 {
        self.target_and_gradient(h, sigmaa).0
    }

    pub fn dtarget(&self, h: f64, sigmaa: f64) -> f64 {
        self.target_and_gradient(h, sigmaa).1
    }

    pub fn sum_weights(&self, h: f64) -> f64 {
        self.d_star_cubed.iter().map(|&h_i| self.weight(h, h_i)).sum()
    }

    /// Weighted log-likelihood and its sigmaA derivative in a single pass.
    pub fn target_and_gradient(&self, h: f64, sigmaa: f64) -> (f64, f64) {
        let mut value = 0.0;
        let mut gradient = 0.0;
        for i in 0..self.len() {
            let w = self.weight(h, self.d_star_cubed[i]);
            if w == 0.0 {
                continue;
            }
            let (l, dl) = log_likelihood(self.e_obs[i], self.e_calc[i], sigmaa, self.centric[i]);
            value += w * l;
            gradient += w * dl;
        }
        (value, gradient)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STEP: f64 = 1e-6;

    fn numeric_derivative(f: impl Fn(f64) -> f64, s: f64) -> f64 {
        (f(s + STEP) - f(s - STEP)) / (2.0 * STEP)
    }

    #[test]
    fn gradient_matches_finite_difference() {
        for centric in [false, true] {
            for &(eo, ec) in &[(0.3, 1.2), (1.0, 1.0), (2.5, 0.4), (3.0, 3.5)] {
                for s in [0.05, 0.4, 0.8, 0.97] {
                    let (_, analytic) = log_likelihood(eo, ec, s, centric);
                    let numeric = numeric_derivative(|v| log_likelihood(eo, ec, v, centric).0, s);
                    let scale = analytic.abs().max(1.0);
                    assert!(
                        (analytic - numeric).abs() / scale < 5e-4,
                        "centric={centric} eo={eo} ec={ec} s={s}: {analytic} vs {numeric}"
                    );
                }
            }
        }
    }

    #[test]
    fn gradient_sign_follows_amplitude_agreement() {
        // Identical large amplitudes favor high sigmaA.
        let (_, d_low) = log_likelihood(3.0, 3.0, 0.5, false);
        assert!(d_low > 0.0);
        // Uncorrelated-looking pair favors low sigmaA.
        let (_, d_high) = log_likelihood(0.1, 3.0, 0.5, false);
        assert!(d_high < 0.0);
    }

    #[test]
    fn weights_decay_with_resolution_distance() {
        let target = SigmaaTarget::new(
            vec![1.0, 1.0],
            vec![1.0, 1.0],
            vec![false, false],
            vec![0.0, 1.0],
            0.5,
        )
        .unwrap();
        let at_zero = target.sum_weights(0.0);
        assert!((at_zero - (1.0 + (-2.0_f64).exp())).abs() < 1e-12);
        assert!(target.sum_weights(0.5) > target.sum_weights(5.0));
    }

    #[test]
    fn target_sums_weighted_contributions() {
        let target = SigmaaTarget::new(
            vec![1.5, 0.7, 2.0],
            vec![1.2, 0.9, 1.8],
            vec![false, true, false],
            vec![0.01, 0.02, 0.03],
            0.01,
        )
        .unwrap();
        let h = 0.02;
        let s = 0.6;
        let expected: f64 = [(1.5, 1.2, false, 0.01), (0.7, 0.9, true, 0.02), (2.0, 1.8, false, 0.03)]
            .iter()
            .map(|&(eo, ec, c, hi)| {
                let z: f64 = (h - hi) / 0.01;
                (-0.5 * z * z).exp() * log_likelihood(eo, ec, s, c).0
            })
            .sum();
        assert!((target.target(h, s) - expected).abs() < 1e-12);

        let numeric = numeric_derivative(|v| target.target(h, v), s);
        assert!((target.dtarget(h, s) - numeric).abs() < 1e-4);
    }

    #[test]
    fn construction_validates_inputs() {
        assert_eq!(
            SigmaaTarget::new(vec![1.0], vec![], vec![true], vec![0.1], 1.0).unwrap_err(),
            TargetError::LengthMismatch {
                e_obs: 1,
                e_calc: 0,
                centric: 1,
                d_star_cubed: 1
            }
        );
        assert_eq!(
            SigmaaTarget::new(vec![], vec![], vec![], vec![], 0.0).unwrap_err(),
            TargetError::InvalidWidth(0.0)
        );
    }
}
