use crate::cli::EstimateArgs;
use crate::error::{CliError, Result};
use serde::Deserialize;
use sigmaa::core::math::minimize::MinimizerSettings;
use sigmaa::core::models::cell::{CellParameters, UnitCell};
use sigmaa::engine::config::{SigmaaConfig, SigmaaConfigBuilder};
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

/// What the `obs` column of the reflection table holds.
#[derive(Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ObservationType {
    #[default]
    Amplitude,
    Intensity,
}

impl FromStr for ObservationType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "amplitude" => Ok(Self::Amplitude),
            "intensity" => Ok(Self::Intensity),
            other => Err(format!(
                "unknown observation type '{other}', expected 'amplitude' or 'intensity'"
            )),
        }
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct PartialCellConfig {
    a: Option<f64>,
    b: Option<f64>,
    c: Option<f64>,
    alpha: Option<f64>,
    beta: Option<f64>,
    gamma: Option<f64>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialEstimationConfig {
    kernel_width_free_reflections: Option<usize>,
    kernel_width_d_star_cubed: Option<f64>,
    kernel_in_bin_centers: Option<bool>,
    sampling_points: Option<usize>,
    chebyshev_terms: Option<usize>,
    use_sampling_sum_weights: Option<bool>,
    observation_type: Option<ObservationType>,
    max_iterations: Option<u64>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct PartialRunConfig {
    cell: Option<PartialCellConfig>,
    estimation: Option<PartialEstimationConfig>,
}

/// Fully resolved settings for one `estimate` invocation.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub cell: UnitCell,
    pub observation_type: ObservationType,
    pub estimation: SigmaaConfig,
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| CliError::Config(format!("Invalid value for {key}: {value}")))
}

impl PartialRunConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }

    fn from_toml(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Applies `--set` pairs and explicit CLI flags on top of the file values.
    /// A kernel width given on the command line replaces both kernel keys of the file.
    pub fn merge_with_cli(mut self, args: &EstimateArgs) -> Result<RunConfig> {
        self.apply_set_values(&args.set_values)?;

        let cell = Self::merge_cell(self.cell.take().unwrap_or_default())?;
        let mut estimation = self.estimation.take().unwrap_or_default();

        if let Some(per_bin) = args.free_reflections_per_bin {
            estimation.kernel_width_free_reflections = Some(per_bin);
            estimation.kernel_width_d_star_cubed = None;
        } else if let Some(width) = args.d_star_cubed_width {
            estimation.kernel_width_d_star_cubed = Some(width);
            estimation.kernel_width_free_reflections = None;
        }

        let observation_type = if args.intensities {
            ObservationType::Intensity
        } else {
            estimation.observation_type.unwrap_or_default()
        };

        let mut builder = SigmaaConfigBuilder::new()
            .kernel_in_bin_centers(args.bin_centers || estimation.kernel_in_bin_centers.unwrap_or(false))
            .use_sampling_sum_weights(
                args.sum_weights || estimation.use_sampling_sum_weights.unwrap_or(false),
            );
        if let Some(per_bin) = estimation.kernel_width_free_reflections {
            builder = builder.kernel_width_free_reflections(per_bin);
        }
        if let Some(width) = estimation.kernel_width_d_star_cubed {
            builder = builder.kernel_width_d_star_cubed(width);
        }
        if let Some(n) = args.sampling_points.or(estimation.sampling_points) {
            builder = builder.n_sampling_points(n);
        }
        if let Some(n) = args.chebyshev_terms.or(estimation.chebyshev_terms) {
            builder = builder.n_chebyshev_terms(n);
        }
        if let Some(max_iterations) = estimation.max_iterations {
            builder = builder.minimizer(MinimizerSettings {
                max_iterations,
                ..MinimizerSettings::default()
            });
        }

        let estimation = builder
            .build()
            .map_err(|e| CliError::Config(e.to_string()))?;

        Ok(RunConfig {
            cell,
            observation_type,
            estimation,
        })
    }

    fn merge_cell(partial: PartialCellConfig) -> Result<UnitCell> {
        let require = |value: Option<f64>, name: &str| {
            value.ok_or_else(|| CliError::Config(format!("`cell.{name}` is required.")))
        };
        let parameters = CellParameters {
            a: require(partial.a, "a")?,
            b: require(partial.b, "b")?,
            c: require(partial.c, "c")?,
            alpha: partial.alpha.unwrap_or(90.0),
            beta: partial.beta.unwrap_or(90.0),
            gamma: partial.gamma.unwrap_or(90.0),
        };
        UnitCell::new(parameters).map_err(|e| CliError::Config(e.to_string()))
    }

    fn apply_set_values(&mut self, set_values: &[String]) -> Result<()> {
        for kv_pair in set_values {
            let Some((key, value)) = kv_pair.split_once('=') else {
                return Err(CliError::Config(format!(
                    "Invalid --set format: '{}'. Expected KEY=VALUE.",
                    kv_pair
                )));
            };
            let key = key.trim();

            if let Some(field) = key.strip_prefix("cell.") {
                let cell = self.cell.get_or_insert_with(Default::default);
                let slot = match field {
                    "a" => &mut cell.a,
                    "b" => &mut cell.b,
                    "c" => &mut cell.c,
                    "alpha" => &mut cell.alpha,
                    "beta" => &mut cell.beta,
                    "gamma" => &mut cell.gamma,
                    _ => {
                        return Err(CliError::Config(format!(
                            "Unsupported configuration key for --set: '{key}'"
                        )));
                    }
                };
                *slot = Some(parse_value(key, value)?);
                continue;
            }

            let estimation = self.estimation.get_or_insert_with(Default::default);
            match key {
                "estimation.kernel-width-free-reflections" => {
                    estimation.kernel_width_free_reflections = Some(parse_value(key, value)?);
                }
                "estimation.kernel-width-d-star-cubed" => {
                    estimation.kernel_width_d_star_cubed = Some(parse_value(key, value)?);
                }
                "estimation.kernel-in-bin-centers" => {
                    estimation.kernel_in_bin_centers = Some(parse_value(key, value)?);
                }
                "estimation.sampling-points" => {
                    estimation.sampling_points = Some(parse_value(key, value)?);
                }
                "estimation.chebyshev-terms" => {
                    estimation.chebyshev_terms = Some(parse_value(key, value)?);
                }
                "estimation.use-sampling-sum-weights" => {
                    estimation.use_sampling_sum_weights = Some(parse_value(key, value)?);
                }
                "estimation.observation-type" => {
                    estimation.observation_type = Some(parse_value(key, value)?);
                }
                "estimation.max-iterations" => {
                    estimation.max_iterations = Some(parse_value(key, value)?);
                }
                _ => {
                    return Err(CliError::Config(format!(
                        "Unsupported configuration key for --set: '{key}'"
                    )));
                }
            }
        }
        Ok(())
    }
}
