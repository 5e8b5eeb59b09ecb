use crate::cli::EstimateArgs;
use crate::config::PartialRunConfig;
use crate::error::Result;
use crate::table::{self, ReflectionTable};
use crate::utils::progress::CliProgressHandler;
use sigmaa::{core::models::asu::FriedelAsu, engine::progress::ProgressReporter, workflows};
use tracing::info;

pub fn run(args: EstimateArgs, show_progress: bool) -> Result<()> {
    let partial_config = PartialRunConfig::from_file(&args.config)?;
    info!("Merging configuration from file and CLI arguments...");
    let run_config = partial_config.merge_with_cli(&args)?;

    let table = ReflectionTable::read_from_path(
        &args.input,
        &run_config.cell,
        run_config.observation_type,
    )?;

    let progress_handler = if show_progress {
        CliProgressHandler::new()
    } else {
        CliProgressHandler::hidden()
    };
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    info!("Invoking the sigmaA estimation workflow...");
    let estimate = workflows::estimate::run(
        &table.observed,
        &table.calculated,
        &table.free_flags,
        &FriedelAsu,
        &run_config.estimation,
        &reporter,
    )?;

    table::write_estimate(&args.output, &estimate)?;

    if show_progress {
        println!("{}", estimate.report());
        println!("Per-reflection results written to: {}", args.output.display());
    }

    Ok(())
}
