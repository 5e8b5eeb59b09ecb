use crate::core::math::chebyshev::ChebyshevSeries;
use crate::core::math::special::bessel_i1_over_i0;
use crate::core::models::asu::AsymmetricUnit;
use crate::core::models::miller::MillerIndex;
use crate::core::models::reflections::{MillerArray, ObservedData};
use crate::core::scaling::likelihood::SigmaaTarget;
use crate::core::scaling::normalization::{KernelNormalization, NormalizationSettings};
use crate::engine::config::{KernelWidth, SigmaaConfig};
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::tasks::binning;
use crate::engine::tasks::point_estimate::{self, PointEstimate};
use num_complex::Complex64;
use serde::Serialize;
use std::fmt;
use tracing::{debug, info, instrument, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Result of a sigmaA estimation run. Every per-reflection vector follows the
/// order of [`SigmaaEstimate::indices`].
#[derive(Debug, Clone, Serialize)]
pub struct SigmaaEstimate {
    indices: Vec<MillerIndex>,
    centric: Vec<bool>,
    free: Vec<bool>,
    d_star_cubed: Vec<f64>,
    sigmaa: Vec<f64>,
    alpha: Vec<f64>,
    beta: Vec<f64>,
    fom: Vec<f64>,
    e_obs: Vec<f64>,
    e_calc: Vec<f64>,
    curve: ChebyshevSeries,
    samples: Vec<PointEstimate>,
    kernel_width_d_star_cubed: f64,
    kernel_width_free_reflections: Option<usize>,
    config: SigmaaConfig,
}

impl SigmaaEstimate {
    pub fn indices(&self) -> &[MillerIndex] {
        &self.indices
    }

    pub fn centric_flags(&self) -> &[bool] {
        &self.centric
    }

    pub fn free_flags(&self) -> &[bool] {
        &self.free
    }

    pub fn d_star_cubed(&self) -> &[f64] {
        &self.d_star_cubed
    }

    pub fn sigmaa(&self) -> &[f64] {
        &self.sigmaa
    }

    pub fn alpha(&self) -> &[f64] {
        &self.alpha
    }

    pub fn beta(&self) -> &[f64] {
        &self.beta
    }

    pub fn alpha_beta(&self) -> (&[f64], &[f64]) {
        (&self.alpha, &self.beta)
    }

    pub fn fom(&self) -> &[f64] {
        &self.fom
    }

    /// Normalized observed amplitudes.
    pub fn e_obs(&self) -> &[f64] {
        &self.e_obs
    }

    /// Normalized calculated amplitudes.
    pub fn e_calc(&self) -> &[f64] {
        &self.e_calc
    }

    /// The fitted sigmaA curve in the logit domain, over d*³.
    pub fn curve(&self) -> &ChebyshevSeries {
        &self.curve
    }

    /// SigmaA from the fitted curve at an arbitrary resolution (d*³).
    pub fn sigmaa_at(&self, d_star_cubed: f64) -> f64 {
        inverse_logit(self.curve.value(d_star_cubed))
    }

    pub fn samples(&self) -> &[PointEstimate] {
        &self.samples
    }

    pub fn kernel_width_d_star_cubed(&self) -> f64 {
        self.kernel_width_d_star_cubed
    }

    pub fn kernel_width_free_reflections(&self) -> Option<usize> {
        self.kernel_width_free_reflections
    }

    /// The configuration the estimate was produced with.
    pub fn config(&self) -> &SigmaaConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn report(&self) -> SigmaaReport<'_> {
        SigmaaReport { estimate: self }
    }
}

/// Human-readable summary of the sampling grid and its point estimates.
pub struct SigmaaReport<'a> {
    estimate: &'a SigmaaEstimate,
}

impl fmt::Display for SigmaaReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let estimate = self.estimate;
        writeln!(f, "SigmaA estimation summary")?;
        writeln!(f, "-------------------------")?;
        writeln!(
            f,
            "Kernel width d* cubed     : {:.6}",
            estimate.kernel_width_d_star_cubed
        )?;
        match estimate.kernel_width_free_reflections {
            Some(n) => writeln!(f, "Kernel width free refl.   : {n}")?,
            None => writeln!(f, "Kernel width free refl.   : none")?,
        }
        writeln!(f, "Number of sampling points : {}", estimate.samples.len())?;
        writeln!(f, "Number of Chebyshev terms : {}", estimate.curve.n_terms())?;
        writeln!(f)?;
        writeln!(f, "1/d^3      d    sigmaA  sum weights")?;
        for sample in &estimate.samples {
            let d = if sample.d_star_cubed > 0.0 {
                sample.d_star_cubed.powf(-1.0 / 3.0)
            } else {
                f64::INFINITY
            };
            writeln!(
                f,
                "{:6.4}  {:6.2}   {:5.3}  {:.6}",
                sample.d_star_cubed, d, sample.sigmaa, sample.sum_weights
            )?;
        }
        Ok(())
    }
}

struct AlignedData {
    observed: MillerArray<f64>,
    calculated: MillerArray<f64>,
    free: Vec<bool>,
}

/// Estimates sigmaA, alpha, beta and figure of merit for every reflection.
///
/// SigmaA is estimated from the free reflections at a grid of resolutions,
/// smoothed with a Chebyshev series in the logit domain, and evaluated at the
/// resolution of every reflection in the aligned set.
#[instrument(skip_all, name = "sigmaa_estimation_workflow")]
pub fn run(
    observed: &ObservedData,
    calculated: &MillerArray<Complex64>,
    free_flags: &MillerArray<bool>,
    asu: &dyn AsymmetricUnit,
    config: &SigmaaConfig,
    reporter: &ProgressReporter,
) -> Result<SigmaaEstimate, EngineError> {
    config.validate()?;

    // === Phase 0: Validate and align the input arrays ===
    let aligned = reporter.phase("Alignment", || {
        align_inputs(observed, calculated, free_flags, asu)
    })?;
    info!(
        n_reflections = aligned.observed.len(),
        observation_type = observed.kind(),
        "Input arrays aligned."
    );

    // === Phase 1: Normalize observed and calculated amplitudes ===
    let (norm_obs, norm_calc) = reporter.phase("Normalization", || normalize(&aligned))?;

    // === Phase 2: Free subset, kernel width and sampling grid ===
    let set = aligned.observed.set();
    let d_star_cubed = set.d_star_cubed();
    let n_total = d_star_cubed.len();
    let n_free = aligned.free.iter().filter(|&&f| f).count();
    if n_free == 0 {
        return Err(EngineError::EmptyFreeSet);
    }
    let (min_h, max_h) = d_star_cubed
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &h| {
            (lo.min(h), hi.max(h))
        });
    let kernel_width =
        binning::resolve_kernel_width(config.kernel_width, n_free, n_total, (min_h, max_h))?;
    info!(n_free, n_total, kernel_width, "Kernel width resolved.");
    reporter.report(Progress::Message(format!(
        "{n_free} of {n_total} reflections free, kernel width {kernel_width:.6} in d*^3"
    )));

    let target = build_target(
        &aligned.free,
        norm_obs.normalized_amplitudes(),
        norm_calc.normalized_amplitudes(),
        set.centric_flags(),
        &d_star_cubed,
        kernel_width,
    )?;
    let grid = binning::sampling_grid(
        min_h,
        max_h,
        config.n_sampling_points,
        config.kernel_in_bin_centers,
    );

    // === Phase 3: Maximum-likelihood sigmaA at every grid point ===
    let samples = reporter.phase("Point Estimation", || {
        estimate_grid(&target, &grid.points, config, reporter)
    })?;

    // === Phase 4: Smooth curve and per-reflection parameters ===
    reporter.phase("Curve Fitting", || {
        let curve = fit_curve(&samples, grid.low, grid.high, config)?;

        let mut sigmaa = Vec::with_capacity(n_total);
        for &h in &d_star_cubed {
            let value = inverse_logit(curve.value(h));
            if !(0.0..=1.0).contains(&value) {
                return Err(EngineError::RangeViolation {
                    d_star_cubed: h,
                    value,
                });
            }
            sigmaa.push(value);
        }

        let (alpha, beta): (Vec<f64>, Vec<f64>) = sigmaa
            .iter()
            .zip(norm_obs.normalizer())
            .zip(norm_calc.normalizer())
            .map(|((&s, &n_obs), &n_calc)| (s * (n_obs / n_calc).sqrt(), (1.0 - s * s) * n_obs))
            .unzip();

        let fom = sigmaa
            .iter()
            .zip(norm_obs.normalized_amplitudes())
            .zip(norm_calc.normalized_amplitudes())
            .zip(set.centric_flags())
            .map(|(((&s, &eo), &ec), &centric)| figure_of_merit(s, eo, ec, centric))
            .collect();

        info!(
            n_terms = curve.n_terms(),
            mean_sigmaa = sigmaa.iter().sum::<f64>() / n_total as f64,
            "SigmaA estimation complete."
        );

        Ok(SigmaaEstimate {
            indices: set.indices().to_vec(),
            centric: set.centric_flags().to_vec(),
            free: aligned.free.clone(),
            d_star_cubed,
            sigmaa,
            alpha,
            beta,
            fom,
            e_obs: norm_obs.normalized_amplitudes().to_vec(),
            e_calc: norm_calc.normalized_amplitudes().to_vec(),
            curve,
            samples,
            kernel_width_d_star_cubed: kernel_width,
            kernel_width_free_reflections: match config.kernel_width {
                KernelWidth::FreeReflectionsPerBin(n) => Some(n),
                KernelWidth::DStarCubed(_) => None,
            },
            config: config.clone(),
        })
    })
}

fn align_inputs(
    observed: &ObservedData,
    calculated: &MillerArray<Complex64>,
    free_flags: &MillerArray<bool>,
    asu: &dyn AsymmetricUnit,
) -> Result<AlignedData, EngineError> {
    let amplitudes = match observed {
        ObservedData::Amplitudes(amplitudes) => amplitudes.clone(),
        ObservedData::Intensities(intensities) => intensities.intensities_as_amplitudes(),
        ObservedData::StructureFactors(_) => {
            return Err(EngineError::InvalidInputType {
                kind: observed.kind(),
            });
        }
    };

    let observed = amplitudes.map_to_asu(asu);
    let free = free_flags.map_to_asu(asu);
    if !free.indices_all_eq(&observed) {
        return Err(EngineError::IndexMisalignment {
            left: "free flags",
            right: "observed data",
        });
    }
    let calculated = calculated.map_to_asu(asu).common_set(&observed);
    if !free.indices_all_eq(&calculated) {
        return Err(EngineError::IndexMisalignment {
            left: "free flags",
            right: "calculated structure factors",
        });
    }

    Ok(AlignedData {
        observed,
        calculated: calculated.amplitudes(),
        free: free.data().to_vec(),
    })
}

fn normalize(
    aligned: &AlignedData,
) -> Result<(KernelNormalization, KernelNormalization), EngineError> {
    let settings = NormalizationSettings::default();
    let norm_obs = KernelNormalization::from_amplitudes(&aligned.observed, &settings).map_err(
        |source| EngineError::Normalization {
            array: "observed amplitudes",
            source,
        },
    )?;
    let norm_calc = KernelNormalization::from_amplitudes(&aligned.calculated, &settings)
        .map_err(|source| EngineError::Normalization {
            array: "calculated amplitudes",
            source,
        })?;
    debug!(
        obs_kernel_width = norm_obs.kernel_width(),
        calc_kernel_width = norm_calc.kernel_width(),
        "Normalized observed and calculated amplitudes."
    );
    Ok((norm_obs, norm_calc))
}

fn build_target(
    free: &[bool],
    e_obs: &[f64],
    e_calc: &[f64],
    centric: &[bool],
    d_star_cubed: &[f64],
    width: f64,
) -> Result<SigmaaTarget, EngineError> {
    let pick_f64 = |values: &[f64]| -> Vec<f64> {
        values
            .iter()
            .zip(free)
            .filter_map(|(&v, &keep)| keep.then_some(v))
            .collect()
    };
    let free_centric = centric
        .iter()
        .zip(free)
        .filter_map(|(&c, &keep)| keep.then_some(c))
        .collect();
    Ok(SigmaaTarget::new(
        pick_f64(e_obs),
        pick_f64(e_calc),
        free_centric,
        pick_f64(d_star_cubed),
        width,
    )?)
}

fn estimate_grid(
    target: &SigmaaTarget,
    grid: &[f64],
    config: &SigmaaConfig,
    reporter: &ProgressReporter,
) -> Result<Vec<PointEstimate>, EngineError> {
    reporter.report(Progress::TaskStart {
        total_steps: grid.len() as u64,
    });

    #[cfg(not(feature = "parallel"))]
    let iterator = grid.iter();

    #[cfg(feature = "parallel")]
    let iterator = grid.par_iter();

    let results: Vec<Result<PointEstimate, EngineError>> = iterator
        .map(|&h| {
            let result = point_estimate::run(target, h, &config.minimizer).map_err(|source| {
                EngineError::PointEstimate {
                    d_star_cubed: h,
                    source,
                }
            });
            reporter.report(Progress::TaskIncrement);
            result
        })
        .collect();

    reporter.report(Progress::TaskFinish);

    let samples = results.into_iter().collect::<Result<Vec<_>, _>>()?;
    let tolerated = samples.iter().filter(|s| s.tolerated_failure).count();
    if tolerated > 0 {
        warn!(
            tolerated,
            "Some grid points ended on an ignored line-search failure."
        );
        reporter.report(Progress::Message(format!(
            "{tolerated} of {} grid points used the best point before a line-search failure",
            samples.len()
        )));
    }
    Ok(samples)
}

fn fit_curve(
    samples: &[PointEstimate],
    low: f64,
    high: f64,
    config: &SigmaaConfig,
) -> Result<ChebyshevSeries, EngineError> {
    let x: Vec<f64> = samples.iter().map(|s| s.d_star_cubed).collect();
    let logits: Vec<f64> = samples.iter().map(|s| logit(s.sigmaa)).collect();
    let weights: Option<Vec<f64>> = config
        .use_sampling_sum_weights
        .then(|| samples.iter().map(|s| s.sum_weights.sqrt()).collect());
    Ok(ChebyshevSeries::fit(
        config.n_chebyshev_terms,
        low,
        high,
        &x,
        &logits,
        weights.as_deref(),
    )?)
}

#[inline]
fn logit(p: f64) -> f64 {
    -(1.0 / p - 1.0).ln()
}

#[inline]
fn inverse_logit(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Expected cosine of the phase error. Centric reflections use `tanh(x)`,
/// acentric ones `I₁(2x)/I₀(2x)`, with `x = σA·Ec·Eo/(1 − σA²)`.
fn figure_of_merit(sigmaa: f64, e_obs: f64, e_calc: f64, centric: bool) -> f64 {
    let q = (1.0 - sigmaa * sigmaa).max(f64::EPSILON);
    let x = sigmaa * e_calc * e_obs / q;
    if centric {
        x.tanh()
    } else {
        bessel_i1_over_i0(2.0 * x)
    }
}
