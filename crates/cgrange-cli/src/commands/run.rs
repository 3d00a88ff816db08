use crate::cli::RunArgs;
use crate::config::PartialRunConfig;
use crate::error::{CliError, Result};
use crate::trajectory::{XyzTrajectory, read_site_labels};
use crate::utils::progress::CliProgressHandler;
use cgrange::core::models::topology::Topology;
use cgrange::engine::error::RangeFindingError;
use cgrange::engine::matrix::LinearSplineSystem;
use cgrange::engine::progress::ProgressReporter;
use cgrange::workflows;
use tracing::{info, warn};

pub fn run(args: RunArgs) -> Result<()> {
    let mut partial_config = PartialRunConfig::from_file(&args.config)?;
    info!("Merging configuration from file and CLI arguments...");
    let final_config = partial_config.merge_with_cli(&args)?;

    info!("Reading site labels from {:?}", &args.trajectory);
    let labels = read_site_labels(&args.trajectory)?;
    let topology = Topology::from_labels(partial_config.type_names(&labels), &labels)
        .map_err(RangeFindingError::from)?;
    let model = partial_config.build_model(&topology)?;
    info!(
        "Topology has {} sites of {} types; model has {} interaction classes.",
        topology.n_sites(),
        topology.n_types(),
        model.classes.len()
    );

    std::fs::create_dir_all(&final_config.output_dir)?;
    let frames = XyzTrajectory::open(&args.trajectory)?;

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());
    let mut system = LinearSplineSystem::new();

    println!("Starting range finding...");
    let result = workflows::range_finding::run(
        model,
        &topology,
        frames,
        &final_config,
        &mut system,
        &reporter,
    )?;

    println!(
        "Scanned {} frame(s); {} interaction(s) sampled for force matching.",
        result.frames_scanned,
        result.force_matched()
    );
    if result.frames_scanned == 0 {
        warn!("The trajectory produced no frames within the frame limit.");
    }

    match &result.inversion {
        Some(summary) => {
            println!(
                "Boltzmann inversion: {} class(es), {} row(s), {} empty bin(s).",
                summary.classes, summary.rows, summary.empty_bins
            );
            if args.no_tables {
                info!("Skipping table output as requested.");
            } else {
                let written = system.write_tables(&final_config.output_dir)?;
                info!("Wrote {} potential table(s).", written.len());
            }
        }
        None => println!("No parameter distributions requested; inversion skipped."),
    }

    println!(
        "✓ Outputs written to: {}",
        final_config.output_dir.display()
    );
    Ok(())
}
