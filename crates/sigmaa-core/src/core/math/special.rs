//! Modified Bessel functions and related log-space helpers.
//!
//! Moderate arguments are evaluated with `scilib`'s Bessel routines. Beyond
//! [`ASYMPTOTIC_LIMIT`] the exponentially scaled functions switch to the
//! large-argument expansion, where `I_n(x)` itself would overflow.

use num_complex::Complex64;
use scilib::math::bessel;
use std::f64::consts::PI;

pub const ASYMPTOTIC_LIMIT: f64 = 15.0;
const ASYMPTOTIC_TERMS: usize = 16;

/// `I_n(x)` for `x >= 0` from the library power series.
#[inline]
fn series(order: i32, x: f64) -> f64 {
    bessel::i_nu(f64::from(order), Complex64::from(x)).re
}

/// `exp(-x) I_ν(x)` for large positive `x`:
/// `1/sqrt(2πx) Σ_k (-1)^k (μ-1)(μ-9)…(μ-(2k-1)²) / (k! (8x)^k)`, `μ = 4ν²`.
fn asymptotic_scaled(order: f64, x: f64) -> f64 {
    let mu = 4.0 * order * order;
    let mut term = 1.0;
    let mut sum = 1.0;
    for k in 1..=ASYMPTOTIC_TERMS {
        let odd = (2 * k - 1) as f64;
        term *= -(mu - odd * odd) / (8.0 * k as f64 * x);
        sum += term;
    }
    sum / (2.0 * PI * x).sqrt()
}

/// Exponentially scaled modified Bessel function `exp(-|x|) I₀(x)`.
pub fn bessel_i0e(x: f64) -> f64 {
    let ax = x.abs();
    if ax == 0.0 {
        1.0
    } else if ax < ASYMPTOTIC_LIMIT {
        series(0, ax) * (-ax).exp()
    } else {
        asymptotic_scaled(0.0, ax)
    }
}

/// Exponentially scaled modified Bessel function `exp(-|x|) I₁(x)`.
pub fn bessel_i1e(x: f64) -> f64 {
    let ax = x.abs();
    let value = if ax == 0.0 {
        0.0
    } else if ax < ASYMPTOTIC_LIMIT {
        series(1, ax) * (-ax).exp()
    } else {
        asymptotic_scaled(1.0, ax)
    };
    if x < 0.0 { -value } else { value }
}

pub fn bessel_i0(x: f64) -> f64 {
    bessel_i0e(x) * x.abs().exp()
}

pub fn bessel_i1(x: f64) -> f64 {
    bessel_i1e(x) * x.abs().exp()
}

/// `ln I₀(x)`, finite for all finite `x`.
pub fn ln_bessel_i0(x: f64) -> f64 {
    x.abs() + bessel_i0e(x).ln()
}

/// The ratio `I₁(x)/I₀(x)`; zero at the origin and in `[0, 1)` for `x >= 0`.
pub fn bessel_i1_over_i0(x: f64) -> f64 {
    if x == 0.0 {
        return 0.0;
    }
    bessel_i1e(x) / bessel_i0e(x)
}

/// `ln cosh(x)` without overflow for large `|x|`.
pub fn ln_cosh(x: f64) -> f64 {
    let ax = x.abs();
    ax + (-2.0 * ax).exp().ln_1p() - std::f64::consts::LN_2
}

#[cfg(test)]
mod tests {
    use super::*;

    fn relative_error(actual: f64, expected: f64) -> f64 {
        ((actual - expected) / expected).abs()
    }

    #[test]
    fn bessel_values_match_reference_table() {
        // Abramowitz & Stegun Table 9.8.
        let cases = [
            (0.5, 1.0634833707, 0.2578943054),
            (1.0, 1.2660658778, 0.5651591040),
            (2.0, 2.2795853023, 1.5906368546),
            (5.0, 27.239871823, 24.335642142),
            (10.0, 2815.7166284, 2670.9883037),
        ];
        for (x, i0, i1) in cases {
            assert!(relative_error(bessel_i0(x), i0) < 1e-6, "I0({x})");
            assert!(relative_error(bessel_i1(x), i1) < 1e-6, "I1({x})");
        }
    }

    #[test]
    fn bessel_at_origin() {
        assert_eq!(bessel_i0(0.0), 1.0);
        assert_eq!(bessel_i1(0.0), 0.0);
        assert_eq!(bessel_i1_over_i0(0.0), 0.0);
    }

    #[test]
    fn series_and_expansion_agree_at_the_switch() {
        let below = ASYMPTOTIC_LIMIT * (1.0 - 1e-9);
        assert!((bessel_i0e(below) - asymptotic_scaled(0.0, ASYMPTOTIC_LIMIT)).abs() < 1e-9);
        assert!((bessel_i1e(below) - asymptotic_scaled(1.0, ASYMPTOTIC_LIMIT)).abs() < 1e-9);
        // I0(20) and I1(20).
        assert!(relative_error(bessel_i0(20.0), 4.355828255955353e7) < 1e-9);
        assert!(relative_error(bessel_i1(20.0), 4.245497338512777e7) < 1e-9);
    }

    #[test]
    fn i1_is_odd_and_i0_is_even() {
        assert!((bessel_i1(-2.0) + bessel_i1(2.0)).abs() < 1e-12);
        assert!((bessel_i0(-2.0) - bessel_i0(2.0)).abs() < 1e-12);
    }

    #[test]
    fn ratio_is_bounded_and_increasing() {
        let mut previous = 0.0;
        for step in 1..2000 {
            let x = step as f64 * 0.05;
            let ratio = bessel_i1_over_i0(x);
            assert!(ratio > previous - 1e-7, "ratio decreased at x = {x}");
            assert!(ratio < 1.0);
            previous = ratio;
        }
        assert!(bessel_i1_over_i0(1.0e6) < 1.0);
        assert!(bessel_i1_over_i0(1.0e6) > 0.999);
    }

    #[test]
    fn ln_i0_is_finite_for_large_arguments() {
        let value = ln_bessel_i0(5000.0);
        assert!(value.is_finite());
        // ln I0(x) ~ x - ln(2πx)/2 for large x.
        let asymptotic = 5000.0 - 0.5 * (2.0 * std::f64::consts::PI * 5000.0).ln();
        assert!((value - asymptotic).abs() < 1e-3);
        assert!((ln_bessel_i0(1.0) - 1.2660658778_f64.ln()).abs() < 1e-6);
    }

    #[test]
    fn ln_cosh_matches_direct_formula_and_survives_overflow() {
        for x in [-3.0, -0.2, 0.0, 0.7, 4.0] {
            assert!((ln_cosh(x) - f64::cosh(x).ln()).abs() < 1e-12);
        }
        assert!((ln_cosh(1000.0) - (1000.0 - std::f64::consts::LN_2)).abs() < 1e-9);
    }
}
