use crate::core::math::minimize::{MinimizeError, MinimizerSettings, minimize_scalar};
use crate::core::scaling::likelihood::SigmaaTarget;
use serde::{Deserialize, Serialize};
use tracing::{instrument, trace};

pub const SIGMAA_MIN: f64 = 0.01;
pub const SIGMAA_MAX: f64 = 0.99;
pub const START_X: f64 = -1.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointEstimate {
    pub d_star_cubed: f64,
    pub sigmaa: f64,
    pub sum_weights: f64,
    pub iterations: u64,
    pub tolerated_failure: bool,
}

/// Maps an unconstrained `x` onto `(SIGMAA_MIN, SIGMAA_MAX)` and returns the
/// value with its derivative `ds/dx`.
pub fn sigmaa_from_unconstrained(x: f64) -> (f64, f64) {
    let logistic = if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    };
    let span = SIGMAA_MAX - SIGMAA_MIN;
    (
        SIGMAA_MIN + span * logistic,
        span * logistic * (1.0 - logistic),
    )
}

/// Maximum-likelihood sigmaA at resolution `h`.
#[instrument(level = "debug", skip_all, fields(h))]
pub fn run(
    target: &SigmaaTarget,
    h: f64,
    settings: &MinimizerSettings,
) -> Result<PointEstimate, MinimizeError> {
    let sum_weights = target.sum_weights(h);
    let scale = if sum_weights > 0.0 { 1.0 / sum_weights } else { 1.0 };

    let objective = |x: f64| {
        let (sigmaa, dsdx) = sigmaa_from_unconstrained(x);
        let (value, gradient) = target.target_and_gradient(h, sigmaa);
        (-value * scale, -gradient * dsdx * scale)
    };

    let outcome = minimize_scalar(objective, START_X, settings)?;
    let (sigmaa, _) = sigmaa_from_unconstrained(outcome.x);
    trace!(
        sigmaa,
        sum_weights,
        iterations = outcome.iterations,
        "Point estimate finished."
    );

    Ok(PointEstimate {
        d_star_cubed: h,
        sigmaa,
        sum_weights,
        iterations: outcome.iterations,
        tolerated_failure: outcome.tolerated_failure,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn complex_normal(rng: &mut StdRng) -> (f64, f64) {
        let u1: f64 = 1.0 - rng.r#gen::<f64>();
        let u2: f64 = rng.r#gen::<f64>();
        let radius = (-u1.ln()).sqrt();
        let angle = 2.0 * std::f64::consts::PI * u2;
        (radius * angle.cos(), radius * angle.sin())
    }

    fn synthetic_target(true_sigmaa: f64, n: usize, seed: u64) -> SigmaaTarget {
        let mut rng = StdRng::seed_from_u64(seed);
        let noise_scale = (1.0 - true_sigmaa * true_sigmaa).sqrt();
        let mut e_obs = Vec::with_capacity(n);
        let mut e_calc = Vec::with_capacity(n);
        for _ in 0..n {
            let (cr, ci) = complex_normal(&mut rng);
            let (nr, ni) = complex_normal(&mut rng);
            let or = true_sigmaa * cr + noise_scale * nr;
            let oi = true_sigmaa * ci + noise_scale * ni;
            e_calc.push(cr.hypot(ci));
            e_obs.push(or.hypot(oi));
        }
        SigmaaTarget::new(e_obs, e_calc, vec![false; n], vec![0.1; n], 0.05).unwrap()
    }

    #[test]
    fn sigmoid_maps_into_open_interval() {
        for x in [-800.0, -5.0, -1.0, 0.0, 3.0, 800.0] {
            let (s, dsdx) = sigmaa_from_unconstrained(x);
            assert!((SIGMAA_MIN..=SIGMAA_MAX).contains(&s));
            assert!(dsdx.is_finite() && dsdx >= 0.0);
        }
        let (mid, slope) = sigmaa_from_unconstrained(0.0);
        assert!((mid - 0.5).abs() < 1e-12);
        assert!((slope - 0.98 * 0.25).abs() < 1e-12);
    }

    #[test]
    fn sigmoid_derivative_matches_finite_difference() {
        let x = 0.7;
        let (_, dsdx) = sigmaa_from_unconstrained(x);
        let numeric = (sigmaa_from_unconstrained(x + 1e-6).0 - sigmaa_from_unconstrained(x - 1e-6).0) / 2e-6;
        assert!((dsdx - numeric).abs() < 1e-8);
    }

    #[test]
    fn recovers_sigmaa_from_synthetic_data() {
        for (true_sigmaa, seed) in [(0.3, 11), (0.7, 12), (0.9, 13)] {
            let target = synthetic_target(true_sigmaa, 3000, seed);
            let estimate = run(&target, 0.1, &MinimizerSettings::default()).unwrap();
            assert!(
                (estimate.sigmaa - true_sigmaa).abs() < 0.05,
                "expected {true_sigmaa}, got {}",
                estimate.sigmaa
            );
            assert!((estimate.sum_weights - 3000.0).abs() < 1e-9);
            assert_eq!(estimate.d_star_cubed, 0.1);
        }
    }

    #[test]
    fn estimate_stays_inside_bounds_for_identical_amplitudes() {
        let values = vec![1.0, 2.0, 0.5, 1.5];
        let target =
            SigmaaTarget::new(values.clone(), values, vec![false; 4], vec![0.0; 4], 1.0).unwrap();
        let estimate = run(&target, 0.0, &MinimizerSettings::default()).unwrap();
        assert!(estimate.sigmaa > 0.9 && estimate.sigmaa <= SIGMAA_MAX);
    }
}
