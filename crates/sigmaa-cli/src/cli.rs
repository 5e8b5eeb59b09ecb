use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "SigmaA Developers",
    version,
    about = "SigmaA CLI - Maximum-likelihood estimation of sigmaA, alpha/beta and figures of merit from observed and calculated structure factors.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Set the number of threads for parallel computation.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Estimate sigmaA and derived weighting terms from a reflection table.
    Estimate(EstimateArgs),
}

/// Arguments for the `estimate` subcommand.
#[derive(Args, Debug)]
pub struct EstimateArgs {
    // --- Core Arguments ---
    /// Path to the input reflection table (CSV with h,k,l,obs,calc_amplitude,calc_phase,free,centric[,epsilon]).
    #[arg(short, long, required = true, value_name = "PATH")]
    pub input: PathBuf,

    /// Path for the output CSV with per-reflection sigmaA, alpha, beta and FOM.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub output: PathBuf,

    /// Path to the configuration file in TOML format.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub config: PathBuf,

    // --- Kernel Overrides ---
    /// Size the resolution kernel to hold this many free reflections per bin.
    #[arg(long, value_name = "INT", conflicts_with = "d_star_cubed_width")]
    pub free_reflections_per_bin: Option<usize>,

    /// Use an explicit resolution kernel width in d*^3 units.
    #[arg(long, value_name = "FLOAT")]
    pub d_star_cubed_width: Option<f64>,

    /// Place the sampling points in the centers of equal resolution bins.
    #[arg(long)]
    pub bin_centers: bool,

    // --- Curve Overrides ---
    /// Override the number of resolution sampling points.
    #[arg(long, value_name = "INT")]
    pub sampling_points: Option<usize>,

    /// Override the number of Chebyshev terms of the smoothed sigmaA curve.
    #[arg(long, value_name = "INT")]
    pub chebyshev_terms: Option<usize>,

    /// Weight the curve fit by the square root of the kernel weight at each sampling point.
    #[arg(long)]
    pub sum_weights: bool,

    /// Treat the `obs` column as intensities rather than amplitudes.
    #[arg(long)]
    pub intensities: bool,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S estimation.sampling-points=30
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}
