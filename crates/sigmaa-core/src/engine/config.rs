use crate::core::math::minimize::MinimizerSettings;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_SAMPLING_POINTS: usize = 20;
pub const DEFAULT_CHEBYSHEV_TERMS: usize = 10;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error(
        "Kernel width given both as free reflections per bin ({free_reflections}) and as a d*^3 width ({d_star_cubed}); specify exactly one"
    )]
    KernelWidthConflict {
        free_reflections: usize,
        d_star_cubed: f64,
    },
    #[error("Invalid value for '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

/// How the resolution kernel width is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum KernelWidth {
    /// Width sized so that each bin holds about this many free reflections.
    FreeReflectionsPerBin(usize),
    /// Explicit width in d*³ units.
    DStarCubed(f64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SigmaaConfig {
    pub kernel_width: KernelWidth,
    pub kernel_in_bin_centers: bool,
    pub n_sampling_points: usize,
    pub n_chebyshev_terms: usize,
    pub use_sampling_sum_weights: bool,
    pub minimizer: MinimizerSettings,
}

#[derive(Default)]
pub struct SigmaaConfigBuilder {
    kernel_width_free_reflections: Option<usize>,
    kernel_width_d_star_cubed: Option<f64>,
    kernel_in_bin_centers: Option<bool>,
    n_sampling_points: Option<usize>,
    n_chebyshev_terms: Option<usize>,
    use_sampling_sum_weights: Option<bool>,
    minimizer: Option<MinimizerSettings>,
}

impl SigmaaConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kernel_width_free_reflections(mut self, per_bin: usize) -> Self {
        self.kernel_width_free_reflections = Some(per_bin);
        self
    }
    pub fn kernel_width_d_star_cubed(mut self, width: f64) -> Self {
        self.kernel_width_d_star_cubed = Some(width);
        self
    }
    pub fn kernel_in_bin_centers(mut self, enabled: bool) -> Self {
        self.kernel_in_bin_centers = Some(enabled);
        self
    }
    pub fn n_sampling_points(mut self, n: usize) -> Self {
        self.n_sampling_points = Some(n);
        self
    }
    pub fn n_chebyshev_terms(mut self, n: usize) -> Self {
        self.n_chebyshev_terms = Some(n);
        self
    }
    pub fn use_sampling_sum_weights(mut self, enabled: bool) -> Self {
        self.use_sampling_sum_weights = Some(enabled);
        self
    }
    pub fn minimizer(mut self, settings: MinimizerSettings) -> Self {
        self.minimizer = Some(settings);
        self
    }

    pub fn build(self) -> Result<SigmaaConfig, ConfigError> {
        let kernel_width = match (
            self.kernel_width_free_reflections,
            self.kernel_width_d_star_cubed,
        ) {
            (Some(free_reflections), Some(d_star_cubed)) => {
                return Err(ConfigError::KernelWidthConflict {
                    free_reflections,
                    d_star_cubed,
                });
            }
            (None, None) => {
                return Err(ConfigError::MissingParameter(
                    "kernel_width_free_reflections or kernel_width_d_star_cubed",
                ));
            }
            (Some(per_bin), None) => KernelWidth::FreeReflectionsPerBin(per_bin),
            (None, Some(width)) => KernelWidth::DStarCubed(width),
        };

        let config = SigmaaConfig {
            kernel_width,
            kernel_in_bin_centers: self.kernel_in_bin_centers.unwrap_or(false),
            n_sampling_points: self.n_sampling_points.unwrap_or(DEFAULT_SAMPLING_POINTS),
            n_chebyshev_terms: self.n_chebyshev_terms.unwrap_or(DEFAULT_CHEBYSHEV_TERMS),
            use_sampling_sum_weights: self.use_sampling_sum_weights.unwrap_or(false),
            minimizer: self.minimizer.unwrap_or_default(),
        };
        config.validate()?;
        Ok(config)
    }
}

impl SigmaaConfig {
    /// Checks the value ranges that the builder cannot express through types.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.kernel_width {
            KernelWidth::FreeReflectionsPerBin(0) => {
                return Err(ConfigError::InvalidParameter {
                    name: "kernel_width_free_reflections",
                    reason: "must be greater than zero".to_string(),
                });
            }
            KernelWidth::DStarCubed(width) if !(width.is_finite() && width > 0.0) => {
                return Err(ConfigError::InvalidParameter {
                    name: "kernel_width_d_star_cubed",
                    reason: format!("must be positive and finite, got {width}"),
                });
            }
            _ => {}
        }

        let n_points = self.n_sampling_points;
        if n_points < 2 {
            return Err(ConfigError::InvalidParameter {
                name: "n_sampling_points",
                reason: format!("at least 2 sampling points are needed, got {n_points}"),
            });
        }
        let n_terms = self.n_chebyshev_terms;
        if n_terms == 0 || n_terms > n_points {
            return Err(ConfigError::InvalidParameter {
                name: "n_chebyshev_terms",
                reason: format!(
                    "must be between 1 and the number of sampling points ({n_points}), got {n_terms}"
                ),
            });
        }
        if self.minimizer.max_iterations == 0 {
            return Err(ConfigError::InvalidParameter {
                name: "minimizer.max_iterations",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}
