use thiserror::Error;

use super::config::ConfigError;
use crate::core::math::chebyshev::FitError;
use crate::core::math::minimize::MinimizeError;
use crate::core::models::reflections::ReflectionError;
use crate::core::scaling::likelihood::TargetError;
use crate::core::scaling::normalization::NormalizationError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid configuration: {source}")]
    InvalidConfiguration {
        #[from]
        source: ConfigError,
    },

    #[error("Observed data must be real-valued amplitudes or intensities, got {kind}")]
    InvalidInputType { kind: &'static str },

    #[error("No free reflections remain after aligning the input arrays")]
    EmptyFreeSet,

    #[error("Miller indices of {left} and {right} are not aligned after asymmetric-unit mapping")]
    IndexMisalignment {
        left: &'static str,
        right: &'static str,
    },

    #[error("Fitted sigmaA {value} at d*^3 = {d_star_cubed} lies outside [0, 1]")]
    RangeViolation { d_star_cubed: f64, value: f64 },

    #[error("Reflection data error: {source}")]
    Reflection {
        #[from]
        source: ReflectionError,
    },

    #[error("Normalization of {array} failed: {source}")]
    Normalization {
        array: &'static str,
        source: NormalizationError,
    },

    #[error("Likelihood target could not be built: {source}")]
    Target {
        #[from]
        source: TargetError,
    },

    #[error("Point estimate at d*^3 = {d_star_cubed} failed: {source}")]
    PointEstimate {
        d_star_cubed: f64,
        source: MinimizeError,
    },

    #[error("SigmaA curve fit failed: {source}")]
    CurveFit {
        #[from]
        source: FitError,
    },
}
