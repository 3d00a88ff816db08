use super::config::InversionParameters;
use super::error::RangeFindingError;
use super::finder::FinishedRanges;
use super::matrix::BoltzmannSystem;
use crate::core::io::error::OutputError;
use crate::core::io::histogram::{histogram_path, read_histogram_path};
use crate::core::models::interaction::{ClassKind, InteractionClassSpec};
use crate::core::models::model::InteractionModel;
use crate::core::models::range::VERY_LARGE;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

/// Potential assigned to a bin without samples.
pub const EMPTY_BIN_POTENTIAL: f64 = 100.0;

pub const RDF_EXTENSION: &str = "rdf";

const SHELL_PI: f64 = 3.1415926;

pub fn rdf_path(dir: &Path, basename: &str) -> PathBuf {
    dir.join(format!("{basename}.{RDF_EXTENSION}"))
}

/// How raw bin counts are turned into a density before inversion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DensityModel {
    /// Pair distances: counts are divided by the spherical shell volume of the bin.
    PairShell { num_pairs: f64, volume: f64 },
    /// Angles, dihedrals and their end-to-end distance proxies.
    Plain { num_pairs: f64 },
}

impl DensityModel {
    /// Number of histogram rows consumed for an interaction with range `[lower, upper]`.
    pub fn entry_count(&self, lower: f64, upper: f64, binwidth: f64) -> usize {
        match self {
            DensityModel::PairShell { .. } => 2 * ((upper - lower) / binwidth + 0.5) as usize,
            DensityModel::Plain { .. } => 2 * ((upper - lower) / binwidth) as usize,
        }
    }

    /// Density of one bin centred at `parameter` holding `count` samples.
    pub fn density(&self, parameter: f64, count: u64, binwidth: f64, normalization: f64) -> f64 {
        let count = count as f64;
        match *self {
            DensityModel::PairShell { num_pairs, volume } => {
                let inner = parameter - 0.5 * binwidth;
                let shell = 4.0 * SHELL_PI * (parameter.powi(3) - inner.powi(3));
                count * 3.0 / shell * normalization * volume / num_pairs
            }
            DensityModel::Plain { num_pairs } => count * 2.0 * normalization / num_pairs,
        }
    }
}

/// One inverted histogram bin: the regression row fed to the linear system.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InvertedBin {
    pub parameter: f64,
    pub count: u64,
    pub density: f64,
    pub potential: f64,
}

impl InvertedBin {
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Inverts one histogram bin: `U = -kT ln(g)`, or [`EMPTY_BIN_POTENTIAL`] for an empty bin.
///
/// Potentials whose magnitude exceeds `VERY_LARGE` are replaced by `+VERY_LARGE`.
pub fn invert_bin(
    model: &DensityModel,
    parameter: f64,
    count: u64,
    binwidth: f64,
    normalization: f64,
    kt: f64,
) -> InvertedBin {
    let (density, mut potential) = if count > 0 {
        let density = model.density(parameter, count, binwidth, normalization);
        (density, -kt * density.ln())
    } else {
        (0.0, EMPTY_BIN_POTENTIAL)
    };
    if potential > VERY_LARGE || potential < -VERY_LARGE {
        potential = VERY_LARGE;
    }
    InvertedBin {
        parameter,
        count,
        density,
        potential,
    }
}

/// Number of distinct site pairs contributing to a nonbonded pair of types.
pub fn pair_count(type_counts: &[usize], types: &[usize]) -> f64 {
    let n_a = type_counts.get(types[0]).copied().unwrap_or(0) as f64;
    let n_b = type_counts.get(types[1]).copied().unwrap_or(0) as f64;
    if types[0] == types[1] {
        (n_a * n_a - n_a) / 2.0
    } else {
        n_a * n_b
    }
}

/// Removes classes without recorded distributions from the initial force-matching system.
pub fn screen_interactions_by_distribution(model: &mut InteractionModel) {
    for spec in &mut model.classes {
        if !spec.output.is_enabled() {
            spec.n_to_force_match = 0;
            if let Some(first) = spec.interaction_column_indices.first_mut() {
                *first = 0;
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InversionSummary {
    pub classes: usize,
    pub rows: usize,
    pub empty_bins: usize,
    pub rdf_files: Vec<PathBuf>,
}

/// Boltzmann-inverts every recorded histogram and feeds the rows to `system`, class by class.
///
/// Reads `<basename>.hist` and writes `<basename>.rdf` for every sampled interaction of every
/// class that recorded its distribution.
#[instrument(skip_all, name = "boltzmann_inversion")]
pub fn calculate_boltzmann_inversion<S: BoltzmannSystem>(
    finished: &FinishedRanges<'_>,
    params: &InversionParameters,
    system: &mut S,
) -> Result<InversionSummary, RangeFindingError> {
    let volume = finished.volume();
    let normalization = params.normalization_for(finished.frames_scanned);
    let kt = params.kt();
    let type_counts = finished.topology.type_counts();
    let mut summary = InversionSummary::default();

    info!(
        volume,
        normalization, kt, "Starting Boltzmann inversion of recorded distributions."
    );

    for spec in &finished.model.classes {
        if !spec.output.is_enabled() || spec.kind == ClassKind::ThreeBodyNonbonded {
            continue;
        }
        let class = spec.full_name();
        let matrix_err = |e: S::Error| RangeFindingError::Matrix {
            class,
            source: Box::new(e),
        };

        system.begin_class(spec, finished.topology).map_err(matrix_err)?;
        let mut counter = 0usize;
        for index in 0..spec.n_defined() {
            if !spec.ranges.is_sampled(index) {
                debug!(class, interaction = index, "Skipping unsampled interaction.");
                continue;
            }
            let density_model = density_model_for(spec, index, &type_counts, volume);
            let basename = spec.basename(finished.topology, index);
            let (rows, empty) = invert_interaction(
                spec,
                index,
                &density_model,
                &basename,
                &finished.output_dir,
                normalization,
                kt,
                system,
                &mut counter,
            )?;
            summary.rows += rows;
            summary.empty_bins += empty;
            summary
                .rdf_files
                .push(rdf_path(&finished.output_dir, &basename));
        }
        system.solve_class().map_err(matrix_err)?;
        summary.classes += 1;
        debug!(class, rows = counter, "Class inverted and solved.");
    }

    info!(
        classes = summary.classes,
        rows = summary.rows,
        empty_bins = summary.empty_bins,
        "Boltzmann inversion complete."
    );
    Ok(summary)
}

fn density_model_for(
    spec: &InteractionClassSpec,
    index: usize,
    type_counts: &[usize],
    volume: f64,
) -> DensityModel {
    match spec.kind {
        ClassKind::PairNonbonded => DensityModel::PairShell {
            num_pairs: pair_count(type_counts, spec.interaction_types(index)),
            volume,
        },
        ClassKind::PairBonded => DensityModel::PairShell {
            num_pairs: 1.0,
            volume: 1.0,
        },
        _ => DensityModel::Plain { num_pairs: 1.0 },
    }
}

#[allow(clippy::too_many_arguments)]
fn invert_interaction<S: BoltzmannSystem>(
    spec: &InteractionClassSpec,
    index: usize,
    density_model: &DensityModel,
    basename: &str,
    output_dir: &Path,
    normalization: f64,
    kt: f64,
    system: &mut S,
    counter: &mut usize,
) -> Result<(usize, usize), OutputError> {
    let binwidth = spec.fm_binwidth;
    let (lower, upper) = spec.ranges.bounds(index);
    let num_entries = density_model.entry_count(lower, upper, binwidth);

    let rows = read_histogram_path(&histogram_path(output_dir, basename))?;
    if rows.len() < num_entries {
        warn!(
            interaction = basename,
            expected = num_entries,
            found = rows.len(),
            "Histogram has fewer rows than the interaction range requires."
        );
    }

    let rdf = rdf_path(output_dir, basename);
    let mut writer = File::create(&rdf)
        .map(BufWriter::new)
        .map_err(OutputError::io(&rdf))?;
    writeln!(writer, "# r gofr").map_err(OutputError::io(&rdf))?;

    let mut written = 0usize;
    let mut empty = 0usize;
    for &(parameter, count) in rows.iter().take(num_entries) {
        let bin = invert_bin(density_model, parameter, count, binwidth, normalization, kt);
        if bin.is_empty() {
            empty += 1;
            warn!(
                interaction = basename,
                parameter,
                "Bin with no sampling encountered. Please increase bin size or use BI potentials with care."
            );
        }
        writeln!(writer, "{:.6} {:.6}", bin.parameter, bin.density)
            .map_err(OutputError::io(&rdf))?;

        let basis = system.evaluate_basis(index, bin.parameter);
        system.accumulate_row(*counter, &basis);
        system.accumulate_target(*counter, bin.potential);
        *counter += 1;
        written += 1;
    }
    writer.flush().map_err(OutputError::io(&rdf))?;
    Ok((written, empty))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::histogram::Histogram;
    use crate::core::models::interaction::{DefinedInteraction, DistributionOutput};
    use crate::core::models::topology::Topology;
    use crate::engine::matrix::LinearSplineSystem;
    use std::fs;
    use tempfile::tempdir;

    const TOLERANCE: f64 = 1e-9;

    fn f64_approx_equal(a: f64, b: f64) -> bool {
        (a - b).abs() < TOLERANCE
    }

    const KT: f64 = 300.0 * 0.0019872067;

    #[test]
    fn pair_entry_count_rounds_and_other_truncates() {
        let pair = DensityModel::PairShell {
            num_pairs: 1.0,
            volume: 1.0,
        };
        let plain = DensityModel::Plain { num_pairs: 1.0 };
        assert_eq!(pair.entry_count(0.0, 0.26, 0.1), 6);
        assert_eq!(plain.entry_count(0.0, 0.26, 0.1), 4);
        assert_eq!(plain.entry_count(0.0, 180.0, 5.0), 72);
    }

    #[test]
    fn pair_count_handles_like_and_unlike_types() {
        let counts = [10, 5];
        assert_eq!(pair_count(&counts, &[0, 1]), 50.0);
        assert_eq!(pair_count(&counts, &[0, 0]), 45.0);
        assert_eq!(pair_count(&counts, &[1, 1]), 10.0);
    }

    #[test]
    fn empty_bin_inverts_to_fixed_potential_and_zero_density() {
        let model = DensityModel::Plain { num_pairs: 1.0 };
        let bin = invert_bin(&model, 12.5, 0, 5.0, 0.1, KT);
        assert_eq!(bin.density, 0.0);
        assert_eq!(bin.potential, EMPTY_BIN_POTENTIAL);
        assert!(bin.is_empty());
    }

    #[test]
    fn populated_bin_inverts_to_minus_kt_log_density() {
        let model = DensityModel::Plain { num_pairs: 1.0 };
        let bin = invert_bin(&model, 12.5, 5, 5.0, 0.1, KT);
        assert!(f64_approx_equal(bin.density, 1.0));
        assert!(f64_approx_equal(bin.potential, 0.0));

        let pair = DensityModel::PairShell {
            num_pairs: 2.0,
            volume: 8.0,
        };
        let bin = invert_bin(&pair, 1.0, 4, 0.5, 0.5, KT);
        let shell = 4.0 * SHELL_PI * (1.0 - 0.75f64.powi(3));
        let expected = 4.0 * 3.0 / shell * 0.5 * 8.0 / 2.0;
        assert!(f64_approx_equal(bin.density, expected));
        assert!(f64_approx_equal(bin.potential, -KT * expected.ln()));
    }

    #[test]
    fn populated_bin_with_underflowing_density_is_not_empty() {
        let model = DensityModel::Plain { num_pairs: 1e300 };
        let bin = invert_bin(&model, 12.5, 1, 5.0, 1e-300, KT);
        assert_eq!(bin.density, 0.0);
        assert_eq!(bin.count, 1);
        assert!(!bin.is_empty());
        assert_eq!(bin.potential, VERY_LARGE);
    }

    #[test]
    fn overflowing_potentials_are_replaced_by_large_positive_value() {
        let model = DensityModel::Plain { num_pairs: 1.0 };
        let tiny = invert_bin(&model, 1.0, 1, 1.0, 1.0e-300, 1.0e4);
        assert_eq!(tiny.potential, VERY_LARGE);
        let huge = invert_bin(&model, 1.0, 1, 1.0, 1.0e300, 1.0e4);
        assert_eq!(huge.potential, VERY_LARGE);
    }

    #[test]
    fn screening_zeroes_force_matching_for_classes_without_distributions() {
        let mut off = InteractionClassSpec::pair_nonbonded(1.0, 0.1, DistributionOutput::Off);
        let mut on = InteractionClassSpec::bonded(
            ClassKind::PairBonded,
            0,
            0.1,
            DistributionOutput::Persistent,
            vec![DefinedInteraction::new(vec![0, 0])],
            vec![],
        );
        off.initialize_ranges();
        on.initialize_ranges();
        let mut model = InteractionModel::new(vec![off, on]);
        model.classes[0].n_to_force_match = 3;
        screen_interactions_by_distribution(&mut model);
        assert_eq!(model.classes[0].n_to_force_match, 0);
        assert_eq!(model.classes[1].n_to_force_match, 1);
    }

    fn angular_finished<'a>(
        topology: &'a Topology,
        dir: &Path,
        counts: &[u64],
    ) -> FinishedRanges<'a> {
        let mut spec = InteractionClassSpec::bonded(
            ClassKind::AngularBonded,
            0,
            5.0,
            DistributionOutput::Transient,
            vec![DefinedInteraction::new(vec![0, 0, 0])],
            vec![vec![0, 1, 2]],
        );
        spec.setup_for_defined_interactions(topology).unwrap();
        spec.initialize_ranges();
        spec.ranges.observe(0, 90.0);
        spec.ranges.observe(0, 110.0);

        let mut histogram = Histogram::for_range(90.0, 110.0, 5.0);
        histogram.counts.copy_from_slice(counts);
        histogram
            .write_to_path(&histogram_path(dir, &spec.basename(topology, 0)))
            .unwrap();

        FinishedRanges {
            topology,
            model: InteractionModel::new(vec![spec]),
            range_statuses: vec![],
            frames_scanned: 4,
            last_box: None,
            output_dir: dir.to_path_buf(),
        }
    }

    #[test]
    fn uniform_angular_histogram_inverts_to_constant_potential() {
        let dir = tempdir().unwrap();
        let topology = Topology::new(vec!["A".into()], vec![0, 0, 0]).unwrap();
        let finished = angular_finished(&topology, dir.path(), &[3; 8]);
        let mut system = LinearSplineSystem::new();

        let summary =
            calculate_boltzmann_inversion(&finished, &InversionParameters::default(), &mut system)
                .unwrap();
        assert_eq!(summary.classes, 1);
        assert_eq!(summary.rows, 8);
        assert_eq!(summary.empty_bins, 0);

        let expected = -KT * (3.0 * 2.0 * 0.25f64).ln();
        let table = &system.tables()[0];
        assert_eq!(table.basename, "A_A_A_ang");
        for u in &table.potential {
            assert!((u - expected).abs() < 1e-6);
        }

        let rdf = fs::read_to_string(dir.path().join("A_A_A_ang.rdf")).unwrap();
        let mut lines = rdf.lines();
        assert_eq!(lines.next(), Some("# r gofr"));
        assert_eq!(lines.next(), Some("91.250000 1.500000"));
        assert_eq!(lines.count(), 7);
    }

    #[test]
    fn empty_bin_does_not_abort_inversion() {
        let dir = tempdir().unwrap();
        let topology = Topology::new(vec!["A".into()], vec![0, 0, 0]).unwrap();
        let finished = angular_finished(&topology, dir.path(), &[3, 3, 0, 3, 3, 3, 3, 3]);
        let mut system = LinearSplineSystem::new();

        let summary =
            calculate_boltzmann_inversion(&finished, &InversionParameters::default(), &mut system)
                .unwrap();
        assert_eq!(summary.empty_bins, 1);
        assert_eq!(summary.rows, 8);

        let rdf = fs::read_to_string(dir.path().join("A_A_A_ang.rdf")).unwrap();
        assert!(rdf.lines().any(|l| l == "96.250000 0.000000"));
    }

    #[test]
    fn unsampled_interactions_and_silent_classes_are_skipped() {
        let dir = tempdir().unwrap();
        let topology = Topology::new(vec!["A".into()], vec![0, 0]).unwrap();
        let mut recorded = InteractionClassSpec::bonded(
            ClassKind::PairBonded,
            0,
            0.1,
            DistributionOutput::Persistent,
            vec![DefinedInteraction::new(vec![0, 0])],
            vec![vec![0, 1]],
        );
        recorded.setup_for_defined_interactions(&topology).unwrap();
        recorded.initialize_ranges();
        recorded.ranges.mark_unsampled(0);
        let silent = InteractionClassSpec::pair_nonbonded(1.0, 0.1, DistributionOutput::Off);

        let finished = FinishedRanges {
            topology: &topology,
            model: InteractionModel::new(vec![
                silent,
                recorded,
                InteractionClassSpec::three_body_nonbonded(),
            ]),
            range_statuses: vec![],
            frames_scanned: 1,
            last_box: None,
            output_dir: dir.path().to_path_buf(),
        };
        let mut system = LinearSplineSystem::new();
        let summary =
            calculate_boltzmann_inversion(&finished, &InversionParameters::default(), &mut system)
                .unwrap();
        assert_eq!(summary.classes, 1);
        assert_eq!(summary.rows, 0);
        assert!(summary.rdf_files.is_empty());
        assert!(!dir.path().join("A_A_bon.rdf").exists());
    }
}
