use crate::core::math::chebyshev::{ChebyshevSeries, FitError};
use crate::core::models::reflections::MillerArray;
use thiserror::Error;
use tracing::{debug, instrument};

pub const DEFAULT_SAMPLING_BINS: usize = 23;
pub const DEFAULT_CHEBYSHEV_TERMS: usize = 13;
pub const AUTO_KERNEL_REFLECTIONS: usize = 50;

const MIN_KERNEL_WEIGHT: f64 = 1e-300;
const LOCAL_LINEAR_CONDITION: f64 = 1e-10;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum NormalizationError {
    #[error("Cannot normalize an empty reflection array")]
    Empty,
    #[error("Intensity columns differ in length: {intensities} intensities, {d_star_sq} resolutions, {epsilons} epsilons")]
    LengthMismatch {
        intensities: usize,
        d_star_sq: usize,
        epsilons: usize,
    },
    #[error("Kernel width must be positive and finite, got {0}")]
    InvalidKernelWidth(f64),
    #[error("Mean intensity is not positive at any resolution; data cannot be normalized")]
    NoPositiveIntensity,
    #[error("Failed to fit the intensity fall-off curve: {0}")]
    Fit(#[from] FitError),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KernelWidth {
    /// Spread of d*² covered by the lowest-resolution reflections.
    Auto,
    Fixed(f64),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizationSettings {
    pub kernel_width: KernelWidth,
    pub n_bins: usize,
    pub n_terms: usize,
}

impl Default for NormalizationSettings {
    fn default() -> Self {
        Self {
            kernel_width: KernelWidth::Auto,
            n_bins: DEFAULT_SAMPLING_BINS,
            n_terms: DEFAULT_CHEBYSHEV_TERMS,
        }
    }
}

/// Resolution-dependent intensity normalization.
///
/// The mean of `I/ε` is estimated by local-linear Gaussian kernel regression in
/// d*² at evenly spaced sampling points, a Chebyshev series is fitted to its logarithm, and every
/// reflection is divided by the smoothed mean. The normalized amplitudes are
/// E = sqrt(I / (ε·⟨I/ε⟩)).
#[derive(Debug, Clone, PartialEq)]
pub struct KernelNormalization {
    kernel_width: f64,
    sample_d_star_sq: Vec<f64>,
    sample_mean_intensity: Vec<f64>,
    normalizer: Vec<f64>,
    normalized_amplitudes: Vec<f64>,
}

impl KernelNormalization {
    pub fn from_amplitudes(
        amplitudes: &MillerArray<f64>,
        settings: &NormalizationSettings,
    ) -> Result<Self, NormalizationError> {
        let intensities: Vec<f64> = amplitudes.data().iter().map(|f| f * f).collect();
        let set = amplitudes.set();
        Self::compute(&intensities, &set.d_star_sq(), set.epsilons(), settings)
    }

    pub fn from_intensities(
        intensities: &MillerArray<f64>,
        settings: &NormalizationSettings,
    ) -> Result<Self, NormalizationError> {
        let set = intensities.set();
        Self::compute(intensities.data(), &set.d_star_sq(), set.epsilons(), settings)
    }

    #[instrument(level = "debug", skip_all, fields(n_reflections = intensities.len()))]
    pub fn compute(
        intensities: &[f64],
        d_star_sq: &[f64],
        epsilons: &[f64],
        settings: &NormalizationSettings,
    ) -> Result<Self, NormalizationError> {
        let n = intensities.len();
        if n != d_star_sq.len() || n != epsilons.len() {
            return Err(NormalizationError::LengthMismatch {
                intensities: n,
                d_star_sq: d_star_sq.len(),
                epsilons: epsilons.len(),
            });
        }
        if n == 0 {
            return Err(NormalizationError::Empty);
        }

        let reduced: Vec<f64> = intensities
            .iter()
            .zip(epsilons)
            .map(|(i, eps)| i / eps)
            .collect();
        let (low, high) = d_star_sq
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        let n_bins = settings.n_bins.max(2);
        let kernel_width = resolve_kernel_width(settings.kernel_width, d_star_sq, low, high, n_bins)?;

        let (sample_d_star_sq, sample_mean_intensity, smoothed) = if kernel_width.is_none() {
            // Every reflection sits at the same resolution.
            let mean = reduced.iter().sum::<f64>() / n as f64;
            if !(mean > 0.0) {
                return Err(NormalizationError::NoPositiveIntensity);
            }
            (vec![low], vec![mean], vec![mean; n])
        } else {
            let width = kernel_width.unwrap_or_default();
            let samples: Vec<f64> = (0..n_bins)
                .map(|i| low + (high - low) * i as f64 / (n_bins - 1) as f64)
                .collect();
            let means: Vec<f64> = samples
                .iter()
                .map(|&s| kernel_mean(s, width, d_star_sq, &reduced))
                .collect();

            let (fit_x, fit_y): (Vec<f64>, Vec<f64>) = samples
                .iter()
                .zip(&means)
                .filter(|&(_, &m)| m > 0.0 && m.is_finite())
                .map(|(&s, &m)| (s, m.ln()))
                .unzip();
            if fit_x.is_empty() {
                return Err(NormalizationError::NoPositiveIntensity);
            }
            let n_terms = settings.n_terms.clamp(1, fit_x.len());
            let series = ChebyshevSeries::fit(n_terms, low, high, &fit_x, &fit_y, None)?;
            let smoothed = d_star_sq.iter().map(|&d| series.value(d).exp()).collect();
            (samples, means, smoothed)
        };

        let normalized_amplitudes = intensities
            .iter()
            .zip(epsilons)
            .zip(&smoothed)
            .map(|((&i, &eps), &norm)| (i.max(0.0) / (eps * norm)).sqrt())
            .collect();

        debug!(
            kernel_width = kernel_width.unwrap_or(0.0),
            n_samples = sample_d_star_sq.len(),
            "Kernel normalization complete."
        );

        Ok(Self {
            kernel_width: kernel_width.unwrap_or(0.0),
            sample_d_star_sq,
            sample_mean_intensity,
            normalizer: smoothed,
            normalized_amplitudes,
        })
    }

    pub fn kernel_width(&self) -> f64 {
        self.kernel_width
    }

    /// The d*² sampling points and the kernel-averaged `I/ε` at each.
    pub fn samples(&self) -> (&[f64], &[f64]) {
        (&self.sample_d_star_sq, &self.sample_mean_intensity)
    }

    /// Smoothed `⟨I/ε⟩` at each reflection.
    pub fn normalizer(&self) -> &[f64] {
        &self.normalizer
    }

    pub fn normalized_amplitudes(&self) -> &[f64] {
        &self.normalized_amplitudes
    }
}

fn resolve_kernel_width(
    choice: KernelWidth,
    d_star_sq: &[f64],
    low: f64,
    high: f64,
    n_bins: usize,
) -> Result<Option<f64>, NormalizationError> {
    if let KernelWidth::Fixed(width) = choice {
        if !(width.is_finite() && width > 0.0) {
            return Err(NormalizationError::InvalidKernelWidth(width));
        }
        return Ok(if high > low { Some(width) } else { None });
    }
    if !(high > low) {
        return Ok(None);
    }
    let mut sorted = d_star_sq.to_vec();
    sorted.sort_by(f64::total_cmp);
    let rank = AUTO_KERNEL_REFLECTIONS.min(sorted.len() - 1);
    let width = sorted[rank] - sorted[0];
    if width > 0.0 {
        Ok(Some(width))
    } else {
        Ok(Some((high - low) / n_bins as f64))
    }
}

/// Local-linear Gaussian kernel estimate of `values` at `center`.
///
/// The intercept of the locally fitted line is exact for linear trends, also at
/// the ends of the d*² range where the kernel is one-sided. Falls back to the kernel-weighted mean when the local design is
/// degenerate.
fn kernel_mean(center: f64, width: f64, d_star_sq: &[f64], values: &[f64]) -> f64 {
    let mut s0 = 0.0;
    let mut s1 = 0.0;
    let mut s2 = 0.0;
    let mut t0 = 0.0;
    let mut t1 = 0.0;
    for (&d, &v) in d_star_sq.iter().zip(values) {
        let x = d - center;
        let z = x / width;
        let w = (-0.5 * z * z).exp();
        s0 += w;
        s1 += w * x;
        s2 += w * x * x;
        t0 += w * v;
        t1 += w * x * v;
    }
    if s0 < MIN_KERNEL_WEIGHT {
        return f64::NAN;
    }
    let determinant = s0 * s2 - s1 * s1;
    if determinant <= LOCAL_LINEAR_CONDITION * s0 * s2 {
        return t0 / s0;
    }
    (s2 * t0 - s1 * t1) / determinant
}
