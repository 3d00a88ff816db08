use crate::core::io::ranges::RangeStatus;
use crate::core::models::frame::Frame;
use crate::core::models::model::InteractionModel;
use crate::core::models::topology::Topology;
use crate::engine::config::RangeFindingConfig;
use crate::engine::error::{BoxedError, RangeFindingError};
use crate::engine::finder::RangeFinder;
use crate::engine::inversion::{
    InversionSummary, calculate_boltzmann_inversion, screen_interactions_by_distribution,
};
use crate::engine::matrix::BoltzmannSystem;
use crate::engine::progress::{Progress, ProgressReporter};
use tracing::{info, instrument};

#[derive(Debug, Clone)]
pub struct RangeFindingResult {
    pub frames_scanned: usize,
    /// The model with final ranges in place of the tracked bounds.
    pub model: InteractionModel,
    /// Range status of every written interaction, one list per class.
    pub range_statuses: Vec<Vec<RangeStatus>>,
    /// Present when at least one class recorded its distribution.
    pub inversion: Option<InversionSummary>,
}

impl RangeFindingResult {
    pub fn force_matched(&self) -> usize {
        self.range_statuses
            .iter()
            .flatten()
            .filter(|s| **s == RangeStatus::ForceMatched)
            .count()
    }
}

/// Runs range finding over `frames` and, when distributions were recorded, the Boltzmann
/// inversion into `system`.
///
/// Every output file is written to `config.output_dir`, which must already exist.
#[instrument(skip_all, name = "range_finding_workflow")]
pub fn run<I, E, S>(
    model: InteractionModel,
    topology: &Topology,
    frames: I,
    config: &RangeFindingConfig,
    system: &mut S,
    reporter: &ProgressReporter,
) -> Result<RangeFindingResult, RangeFindingError>
where
    I: IntoIterator<Item = Result<Frame, E>>,
    E: Into<BoxedError>,
    S: BoltzmannSystem,
{
    // === Phase 1: Setup ===
    let record_distributions = model.any_active_parameter_distributions();
    let mut finder = reporter.phase("Setting up interaction classes", || {
        RangeFinder::new(model, topology, config)
    })?;
    info!(
        sites = topology.n_sites(),
        types = topology.n_types(),
        record_distributions,
        "Range finding initialized."
    );

    // === Phase 2: Trajectory scan ===
    reporter.report(Progress::PhaseStart {
        name: "Scanning trajectory",
    });
    if let Some(limit) = config.max_frames {
        reporter.report(Progress::TaskStart {
            total_steps: limit as u64,
        });
    }
    let limit = config.max_frames.unwrap_or(usize::MAX);
    for (index, frame) in frames.into_iter().take(limit).enumerate() {
        let frame = frame.map_err(|e| RangeFindingError::Frame {
            frame: index,
            source: e.into(),
        })?;
        finder.process_frame(&frame)?;
        reporter.report(Progress::FrameScanned { frame: index });
    }
    if config.max_frames.is_some() {
        reporter.report(Progress::TaskFinish);
    }
    reporter.report(Progress::PhaseFinish);
    reporter.report(Progress::Message(format!(
        "Scanned {} frame(s).",
        finder.frames_scanned()
    )));
    info!(frames = finder.frames_scanned(), "Trajectory scan complete.");

    // === Phase 3: Ranges and histograms ===
    let mut finished = reporter.phase("Writing ranges and histograms", || finder.finish())?;

    // === Phase 4: Boltzmann inversion ===
    let inversion = if record_distributions {
        screen_interactions_by_distribution(&mut finished.model);
        let summary = reporter.phase("Boltzmann inversion", || {
            calculate_boltzmann_inversion(&finished, &config.inversion, system)
        })?;
        Some(summary)
    } else {
        info!("No parameter distributions were recorded; skipping Boltzmann inversion.");
        None
    };

    Ok(RangeFindingResult {
        frames_scanned: finished.frames_scanned,
        model: finished.model,
        range_statuses: finished.range_statuses,
        inversion,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::histogram::read_histogram_path;
    use crate::core::models::frame::SimulationBox;
    use crate::core::models::interaction::{InteractionClassSpec, DistributionOutput};
    use crate::engine::config::{InversionParameters, RangeFindingConfigBuilder};
    use crate::engine::matrix::LinearSplineSystem;
    use nalgebra::Point3;
    use std::convert::Infallible;
    use std::fs;
    use std::sync::{Arc, Mutex};
    use tempfile::tempdir;

    const N_A: usize = 10;
    const N_B: usize = 5;
    const N_FRAMES: usize = 20;

    fn topology() -> Topology {
        let mut site_types = vec![0; N_A];
        site_types.extend(vec![1; N_B]);
        Topology::new(vec!["A".into(), "B".into()], site_types).unwrap()
    }

    /// B sites sit on the origin and every A site on the x axis, so each frame yields 50
    /// A-B distances; over 20 frames they cover [0.1, 1.0] evenly.
    fn frames() -> Vec<Frame> {
        let n_samples = (N_FRAMES * N_A) as f64;
        (0..N_FRAMES)
            .map(|f| {
                let mut positions: Vec<Point3<f64>> = (0..N_A)
                    .map(|i| {
                        let k = (f * N_A + i) as f64;
                        Point3::new(0.1 + 0.9 * k / (n_samples - 1.0), 0.0, 0.0)
                    })
                    .collect();
                positions.extend(vec![Point3::origin(); N_B]);
                Frame::new(positions, SimulationBox::new(50.0, 50.0, 50.0))
            })
            .collect()
    }

    fn parse_rdf(text: &str) -> Vec<(f64, f64)> {
        text.lines()
            .skip(1)
            .map(|line| {
                let mut fields = line.split_whitespace().map(|v| v.parse::<f64>().unwrap());
                (fields.next().unwrap(), fields.next().unwrap())
            })
            .collect()
    }

    #[test]
    fn nonbonded_pair_pipeline_produces_ranges_histogram_and_rising_potential() {
        let dir = tempdir().unwrap();
        let topology = topology();
        let config = RangeFindingConfigBuilder::new()
            .output_dir(dir.path().to_path_buf())
            .build()
            .unwrap();
        let model = InteractionModel::new(vec![InteractionClassSpec::pair_nonbonded(
            1.2,
            0.05,
            DistributionOutput::Transient,
        )]);
        let mut system = LinearSplineSystem::new();

        let result = run(
            model,
            &topology,
            frames().into_iter().map(Ok::<_, Infallible>),
            &config,
            &mut system,
            &ProgressReporter::new(),
        )
        .unwrap();
        assert_eq!(result.frames_scanned, N_FRAMES);
        assert_eq!(result.force_matched(), 3);

        let ranges = fs::read_to_string(dir.path().join("rmin.in")).unwrap();
        assert!(ranges.lines().any(|l| l == "A B 0.100000 1.000000 fm"));

        let histogram = read_histogram_path(&dir.path().join("A_B.hist")).unwrap();
        assert_eq!(histogram.len(), 36);
        // The single sample at exactly 1.0 lands on the upper edge and is dropped.
        assert_eq!(histogram.iter().map(|r| r.1).sum::<u64>(), 995);
        assert!(!dir.path().join("A_B.dist").exists());

        let rdf = parse_rdf(&fs::read_to_string(dir.path().join("A_B.rdf")).unwrap());
        assert_eq!(rdf.len(), 36);
        let kt = InversionParameters::default().kt();
        let potentials: Vec<f64> = rdf.iter().map(|(_, g)| -kt * g.ln()).collect();
        assert!(potentials.iter().all(|u| u.is_finite()));
        assert!(potentials[35] > potentials[0]);

        // Each density is its count over the shell volume, times normalization * volume / pairs.
        let scale = (1.0 / N_FRAMES as f64) * 50.0f64.powi(3) / (N_A * N_B) as f64;
        let half = 0.5 * 0.05;
        for ((r, g), (center, count)) in rdf.iter().zip(&histogram) {
            assert!((r - center).abs() < 1e-6);
            let shell = 4.0 * 3.1415926 * (r.powi(3) - (r - half).powi(3));
            let ratio = g * shell / (3.0 * *count as f64);
            assert!(
                (ratio - scale).abs() < 1e-6 * scale,
                "bin at r = {r}: g * shell / (3 * count) = {ratio}, expected {scale}"
            );
        }

        let inversion = result.inversion.unwrap();
        assert_eq!(inversion.empty_bins, 0);
        assert!(system.tables().iter().any(|t| t.basename == "A_B"));
    }

    #[test]
    fn max_frames_limits_the_scan() {
        let dir = tempdir().unwrap();
        let topology = topology();
        let config = RangeFindingConfigBuilder::new()
            .output_dir(dir.path().to_path_buf())
            .max_frames(3)
            .build()
            .unwrap();
        let model = InteractionModel::new(vec![InteractionClassSpec::pair_nonbonded(
            1.2,
            0.05,
            DistributionOutput::Off,
        )]);

        let result = run(
            model,
            &topology,
            frames().into_iter().map(Ok::<_, Infallible>),
            &config,
            &mut LinearSplineSystem::new(),
            &ProgressReporter::new(),
        )
        .unwrap();
        assert_eq!(result.frames_scanned, 3);
        assert!(result.inversion.is_none());
        assert!(!dir.path().join("A_B.hist").exists());
    }

    #[test]
    fn frame_source_errors_abort_with_frame_index() {
        let dir = tempdir().unwrap();
        let topology = topology();
        let config = RangeFindingConfigBuilder::new()
            .output_dir(dir.path().to_path_buf())
            .build()
            .unwrap();
        let mut source: Vec<Result<Frame, std::io::Error>> =
            frames().into_iter().take(2).map(Ok).collect();
        source.push(Err(std::io::Error::other("truncated frame")));

        let result = run(
            InteractionModel::new(vec![InteractionClassSpec::pair_nonbonded(
                1.2,
                0.05,
                DistributionOutput::Off,
            )]),
            &topology,
            source,
            &config,
            &mut LinearSplineSystem::new(),
            &ProgressReporter::new(),
        );
        assert!(matches!(result, Err(RangeFindingError::Frame { frame: 2, .. })));
    }

    #[test]
    fn progress_reports_every_phase_and_frame() {
        let dir = tempdir().unwrap();
        let topology = topology();
        let config = RangeFindingConfigBuilder::new()
            .output_dir(dir.path().to_path_buf())
            .build()
            .unwrap();
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let reporter = ProgressReporter::with_callback(Box::new(move |p| {
            sink.lock().unwrap().push(p);
        }));

        run(
            InteractionModel::new(vec![InteractionClassSpec::pair_nonbonded(
                1.2,
                0.05,
                DistributionOutput::Transient,
            )]),
            &topology,
            frames().into_iter().map(Ok::<_, Infallible>),
            &config,
            &mut LinearSplineSystem::new(),
            &reporter,
        )
        .unwrap();

        let events = events.lock().unwrap();
        let phases: Vec<&str> = events
            .iter()
            .filter_map(|e| match e {
                Progress::PhaseStart { name } => Some(*name),
                _ => None,
            })
            .collect();
        assert_eq!(
            phases,
            vec![
                "Setting up interaction classes",
                "Scanning trajectory",
                "Writing ranges and histograms",
                "Boltzmann inversion"
            ]
        );
        let scanned = events
            .iter()
            .filter(|e| matches!(e, Progress::FrameScanned { .. }))
            .count();
        assert_eq!(scanned, N_FRAMES);
    }
}
