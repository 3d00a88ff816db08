use super::config::RangeFindingConfig;
use super::error::RangeFindingError;
use super::sampling::{InteractionClassComputer, SamplingStrategy, sample_current};
use crate::core::io::distribution::{
    DistributionRecorder, distribution_path, read_distribution, remove_distribution_files,
};
use crate::core::io::error::OutputError;
use crate::core::io::histogram::{BinPlacement, Histogram, histogram_path};
use crate::core::io::ranges::{RangeStatus, write_class_ranges};
use crate::core::models::frame::{Frame, SimulationBox};
use crate::core::models::interaction::{ClassKind, InteractionClassSpec};
use crate::core::models::model::InteractionModel;
use crate::core::models::topology::Topology;
use itertools::Itertools;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, trace, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Which instances of a class are visited for each frame.
enum InstanceSet {
    /// Every pair of sites; `pair_table[a * n_types + b]` is the defined index of types `(a, b)`.
    AllPairs { pair_table: Vec<Option<usize>> },
    /// Explicit site tuples already resolved to their defined index.
    Listed(Vec<(Vec<usize>, usize)>),
    None,
}

struct ClassState {
    spec: InteractionClassSpec,
    computer: InteractionClassComputer,
    instances: InstanceSet,
    recorder: Option<DistributionRecorder>,
}

/// Scan-phase context owning every class's sampling state and open distribution targets.
///
/// Created once before the trajectory is read, fed one [`Frame`] at a time, then consumed by
/// [`RangeFinder::finish`], which writes the range files and the histograms.
pub struct RangeFinder<'a> {
    topology: &'a Topology,
    classes: Vec<ClassState>,
    output_dir: PathBuf,
    nonbonded_range_file: String,
    bonded_range_file: String,
    frames_scanned: usize,
    last_box: Option<SimulationBox>,
}

impl<'a> RangeFinder<'a> {
    #[instrument(skip_all, name = "range_finding_setup")]
    pub fn new(
        model: InteractionModel,
        topology: &'a Topology,
        config: &RangeFindingConfig,
    ) -> Result<Self, RangeFindingError> {
        let mut classes = Vec::with_capacity(model.classes.len());
        for mut spec in model.classes {
            let (computer, instances, recorder) =
                Self::initialize_class(&mut spec, topology, &config.output_dir)?;
            classes.push(ClassState {
                spec,
                computer,
                instances,
                recorder,
            });
        }

        Ok(Self {
            topology,
            classes,
            output_dir: config.output_dir.clone(),
            nonbonded_range_file: config.nonbonded_range_file.clone(),
            bonded_range_file: config.bonded_range_file.clone(),
            frames_scanned: 0,
            last_box: None,
        })
    }

    fn initialize_class(
        spec: &mut InteractionClassSpec,
        topology: &Topology,
        output_dir: &Path,
    ) -> Result<
        (
            InteractionClassComputer,
            InstanceSet,
            Option<DistributionRecorder>,
        ),
        RangeFindingError,
    > {
        spec.setup_for_defined_interactions(topology)?;
        let computer = InteractionClassComputer::for_class(spec)?;
        spec.initialize_ranges();

        let instances = match (spec.kind, computer.strategy()) {
            (_, SamplingStrategy::Nothing) => InstanceSet::None,
            (ClassKind::PairNonbonded, _) => {
                let n = topology.n_types();
                let pair_table = (0..n)
                    .cartesian_product(0..n)
                    .map(|(a, b)| spec.defined_index_for_types(&[a, b]))
                    .collect();
                InstanceSet::AllPairs { pair_table }
            }
            _ => {
                let mut unmatched = 0usize;
                let resolved: Vec<(Vec<usize>, usize)> = spec
                    .instances
                    .iter()
                    .filter_map(|sites| {
                        let index = spec.defined_index_for_sites(sites, topology);
                        if index.is_none() {
                            unmatched += 1;
                        }
                        index.map(|i| (sites.clone(), i))
                    })
                    .collect();
                if unmatched > 0 {
                    warn!(
                        class = spec.full_name(),
                        unmatched,
                        "Some interaction instances match no defined interaction and will not be sampled."
                    );
                }
                InstanceSet::Listed(resolved)
            }
        };

        let recorder = if spec.records_distributions() {
            info!(
                "Generating parameter distribution histogram for {} interactions.",
                spec.full_name()
            );
            let paths = (0..spec.n_defined())
                .map(|i| distribution_path(output_dir, &spec.basename(topology, i)))
                .collect();
            Some(DistributionRecorder::open(paths)?)
        } else {
            None
        };

        debug!(
            class = spec.full_name(),
            defined = spec.n_defined(),
            strategy = ?computer.strategy(),
            "Initialized class for range finding."
        );
        Ok((computer, instances, recorder))
    }

    pub fn topology(&self) -> &Topology {
        self.topology
    }

    pub fn frames_scanned(&self) -> usize {
        self.frames_scanned
    }

    pub fn classes(&self) -> impl Iterator<Item = &InteractionClassSpec> {
        self.classes.iter().map(|c| &c.spec)
    }

    /// Samples every interaction instance of every class in one frame.
    pub fn process_frame(&mut self, frame: &Frame) -> Result<(), RangeFindingError> {
        let n_sites = self.topology.n_sites();
        if frame.n_sites() != n_sites {
            return Err(RangeFindingError::FrameSize {
                frame: self.frames_scanned,
                expected: n_sites,
                found: frame.n_sites(),
            });
        }
        let n_types = self.topology.n_types();
        let site_types = self.topology.site_types();

        for class in &mut self.classes {
            let ClassState {
                spec,
                computer,
                instances,
                recorder,
            } = class;
            match instances {
                InstanceSet::None => {}
                InstanceSet::AllPairs { pair_table } => {
                    for (i, j) in (0..n_sites).tuple_combinations() {
                        let Some(index) = pair_table[site_types[i] * n_types + site_types[j]]
                        else {
                            continue;
                        };
                        computer.set_sample(&[i, j], index);
                        sample_current(spec, computer, recorder.as_mut(), frame)?;
                    }
                }
                InstanceSet::Listed(list) => {
                    for (sites, index) in list.iter() {
                        computer.set_sample(sites, *index);
                        sample_current(spec, computer, recorder.as_mut(), frame)?;
                    }
                }
            }
        }

        self.frames_scanned += 1;
        self.last_box = Some(frame.simulation_box);
        trace!(frame = self.frames_scanned, "Frame sampled.");
        Ok(())
    }

    /// Ends the scan: writes both range files, closes the distribution targets and turns every
    /// recorded distribution into a histogram.
    #[instrument(skip_all, name = "range_finding_finish")]
    pub fn finish(self) -> Result<FinishedRanges<'a>, RangeFindingError> {
        let RangeFinder {
            topology,
            classes,
            output_dir,
            nonbonded_range_file,
            bonded_range_file,
            frames_scanned,
            last_box,
        } = self;

        let nonbonded_path = output_dir.join(&nonbonded_range_file);
        let bonded_path = output_dir.join(&bonded_range_file);
        let mut nonbonded_out = create_writer(&nonbonded_path)?;
        let mut bonded_out = create_writer(&bonded_path)?;

        let mut specs = Vec::with_capacity(classes.len());
        let mut range_statuses = Vec::with_capacity(classes.len());
        for class in classes {
            let ClassState {
                mut spec, recorder, ..
            } = class;

            let statuses = match spec.kind {
                ClassKind::ThreeBodyNonbonded => Vec::new(),
                ClassKind::PairNonbonded => {
                    write_class_ranges(&mut spec, topology, &mut nonbonded_out)
                        .map_err(OutputError::io(&nonbonded_path))?
                }
                _ => write_class_ranges(&mut spec, topology, &mut bonded_out)
                    .map_err(OutputError::io(&bonded_path))?,
            };

            if let Some(recorder) = recorder {
                let dist_paths = recorder.close()?;
                generate_parameter_distribution_histograms(&mut spec, topology, &output_dir)?;
                if !spec.output.keeps_raw_values() {
                    remove_distribution_files(&dist_paths)?;
                }
            }

            let sampled = statuses
                .iter()
                .filter(|s| **s == RangeStatus::ForceMatched)
                .count();
            info!(
                class = spec.full_name(),
                sampled,
                defined = spec.n_defined(),
                "Range finding complete for class."
            );
            specs.push(spec);
            range_statuses.push(statuses);
        }

        nonbonded_out
            .flush()
            .map_err(OutputError::io(&nonbonded_path))?;
        bonded_out.flush().map_err(OutputError::io(&bonded_path))?;

        Ok(FinishedRanges {
            topology,
            model: InteractionModel::new(specs),
            range_statuses,
            frames_scanned,
            last_box,
            output_dir,
        })
    }
}

fn create_writer(path: &Path) -> Result<BufWriter<File>, OutputError> {
    File::create(path)
        .map(BufWriter::new)
        .map_err(OutputError::io(path))
}

/// State left after the scan: finalized (and grid-aligned, for recorded classes) ranges.
pub struct FinishedRanges<'a> {
    pub topology: &'a Topology,
    pub model: InteractionModel,
    /// Range status of every written interaction, one list per class.
    pub range_statuses: Vec<Vec<RangeStatus>>,
    pub frames_scanned: usize,
    pub last_box: Option<SimulationBox>,
    pub output_dir: PathBuf,
}

impl FinishedRanges<'_> {
    /// Volume used to normalize nonbonded pair densities.
    pub fn volume(&self) -> f64 {
        self.last_box.map_or(1.0, |b| b.volume())
    }
}

struct HistogramJob {
    index: usize,
    lower: f64,
    upper: f64,
    sampled: bool,
    dist_path: PathBuf,
    hist_path: PathBuf,
}

/// Builds `<basename>.hist` for every defined interaction of a recorded class.
///
/// Sampled ranges are aligned to the basis grid first; the aligned bounds are kept in the class.
pub fn generate_parameter_distribution_histograms(
    spec: &mut InteractionClassSpec,
    topology: &Topology,
    output_dir: &Path,
) -> Result<Vec<Histogram>, OutputError> {
    let binwidth = spec.fm_binwidth;
    let jobs: Vec<HistogramJob> = (0..spec.n_defined())
        .map(|index| {
            let sampled = spec.ranges.is_sampled(index);
            if sampled {
                spec.ranges.align_to_grid(index, binwidth);
            }
            let basename = spec.basename(topology, index);
            HistogramJob {
                index,
                lower: spec.ranges.lower(index),
                upper: spec.ranges.upper(index),
                sampled,
                dist_path: distribution_path(output_dir, &basename),
                hist_path: histogram_path(output_dir, &basename),
            }
        })
        .collect();

    #[cfg(not(feature = "parallel"))]
    let job_iter = jobs.iter();
    #[cfg(feature = "parallel")]
    let job_iter = jobs.par_iter();

    job_iter
        .map(|job| build_histogram(job, binwidth))
        .collect()
}

fn build_histogram(job: &HistogramJob, binwidth: f64) -> Result<Histogram, OutputError> {
    let mut histogram = if job.sampled {
        Histogram::for_range(job.lower, job.upper, binwidth)
    } else {
        Histogram::degenerate(job.lower, binwidth)
    };

    let num_bins = histogram.len();
    read_distribution(&job.dist_path, |value| {
        if let BinPlacement::OutOfBounds(bin) = histogram.add(value) {
            warn!(
                interaction = job.index,
                bin, num_bins, "Bin is out-of-bounds; sample dropped."
            );
        }
    })?;

    histogram.write_to_path(&job.hist_path)?;
    Ok(histogram)
}
