use crate::core::models::interaction::InteractionClassSpec;
use crate::core::models::topology::Topology;
use nalgebra::{DMatrix, DVector};
use std::error::Error;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

pub const TABLE_EXTENSION: &str = "table";

/// Nonzero basis function values at one parameter value.
///
/// `values[k]` belongs to column `first_nonzero + k` of the current class.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BasisValues {
    pub first_nonzero: usize,
    pub values: Vec<f64>,
}

/// Linear system fed by the Boltzmann inversion, one class at a time.
///
/// The inversion calls [`begin_class`](BoltzmannSystem::begin_class) before the first row of a
/// class, then for every histogram bin evaluates the basis at the bin center and accumulates a
/// regression row together with its target potential. Row indices restart at zero for every
/// class. [`solve_class`](BoltzmannSystem::solve_class) closes the class.
pub trait BoltzmannSystem {
    /// The error type raised while building or solving the system.
    type Error: Error + Send + Sync + 'static;

    /// Prepares the column layout for a class.
    ///
    /// # Arguments
    ///
    /// * `spec` - The class, with its final (grid-aligned) ranges.
    /// * `topology` - Used to name the per-interaction outputs.
    ///
    /// # Errors
    ///
    /// Returns an error if the class cannot be represented by the basis.
    fn begin_class(
        &mut self,
        spec: &InteractionClassSpec,
        topology: &Topology,
    ) -> Result<(), Self::Error>;

    /// Evaluates the basis of defined interaction `index_among_defined` at `parameter`.
    fn evaluate_basis(&self, index_among_defined: usize, parameter: f64) -> BasisValues;

    /// Stores the basis values as regression row `row`.
    fn accumulate_row(&mut self, row: usize, basis: &BasisValues);

    /// Sets the target value of regression row `row`.
    fn accumulate_target(&mut self, row: usize, potential: f64);

    /// Solves the accumulated rows of the current class.
    ///
    /// # Errors
    ///
    /// Returns an error if the least-squares solve fails.
    fn solve_class(&mut self) -> Result<(), Self::Error>;
}

#[derive(Debug, Error)]
pub enum LinearSplineError {
    #[error("Least-squares solve failed for {class} interactions: {message}")]
    Solve {
        class: &'static str,
        message: &'static str,
    },
    #[error("Row {row} is out of range for the {class} interaction columns")]
    RowOutOfRange { class: &'static str, row: usize },
    #[error("Failed to write table '{path}': {source}", path = path.display())]
    Io { path: PathBuf, source: io::Error },
}

/// Knot grid of one defined interaction inside the class column layout.
#[derive(Debug, Clone)]
struct SplineBlock {
    basename: String,
    lower: f64,
    binwidth: f64,
    n_knots: usize,
    first_column: usize,
}

impl SplineBlock {
    fn knot(&self, k: usize) -> f64 {
        self.lower + k as f64 * self.binwidth
    }
}

#[derive(Debug, Clone, Default)]
struct SparseRow {
    first_nonzero: usize,
    values: Vec<f64>,
}

/// Potential of one defined interaction tabulated on its knot grid.
#[derive(Debug, Clone, PartialEq)]
pub struct TabulatedPotential {
    pub basename: String,
    pub parameters: Vec<f64>,
    pub potential: Vec<f64>,
}

impl TabulatedPotential {
    pub fn write_to(&self, writer: &mut impl Write) -> io::Result<()> {
        for (x, u) in self.parameters.iter().zip(&self.potential) {
            writeln!(writer, "{x:.6} {u:.6}")?;
        }
        Ok(())
    }
}

/// Dense least-squares fit of a piecewise-linear potential to the inverted rows.
///
/// Each sampled defined interaction gets one hat function per knot, with knots every basis bin
/// width across its range. Unsampled interactions get no columns and no table.
#[derive(Debug, Default)]
pub struct LinearSplineSystem {
    class: &'static str,
    blocks: Vec<Option<SplineBlock>>,
    n_columns: usize,
    rows: Vec<SparseRow>,
    targets: Vec<f64>,
    tables: Vec<TabulatedPotential>,
}

impl LinearSplineSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Column count of the current class.
    pub fn n_columns(&self) -> usize {
        self.n_columns
    }

    /// Rows accumulated for the current class.
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn tables(&self) -> &[TabulatedPotential] {
        &self.tables
    }

    pub fn into_tables(self) -> Vec<TabulatedPotential> {
        self.tables
    }

    /// Writes every solved table as `<basename>.table` in `dir`.
    pub fn write_tables(&self, dir: &Path) -> Result<Vec<PathBuf>, LinearSplineError> {
        self.tables
            .iter()
            .map(|table| {
                let path = dir.join(format!("{}.{TABLE_EXTENSION}", table.basename));
                let io_err = |source| LinearSplineError::Io {
                    path: path.clone(),
                    source,
                };
                let mut writer = BufWriter::new(File::create(&path).map_err(io_err)?);
                table.write_to(&mut writer).map_err(io_err)?;
                writer.flush().map_err(io_err)?;
                Ok(path)
            })
            .collect()
    }

    fn ensure_row(&mut self, row: usize) {
        if self.rows.len() <= row {
            self.rows.resize_with(row + 1, SparseRow::default);
            self.targets.resize(row + 1, 0.0);
        }
    }
}

impl BoltzmannSystem for LinearSplineSystem {
    type Error = LinearSplineError;

    fn begin_class(
        &mut self,
        spec: &InteractionClassSpec,
        topology: &Topology,
    ) -> Result<(), Self::Error> {
        self.class = spec.full_name();
        self.rows.clear();
        self.targets.clear();
        self.blocks.clear();
        self.n_columns = 0;

        let binwidth = spec.fm_binwidth;
        for index in 0..spec.n_defined() {
            if !spec.ranges.is_sampled(index) || binwidth <= 0.0 {
                self.blocks.push(None);
                continue;
            }
            let (lower, upper) = spec.ranges.bounds(index);
            let n_intervals = ((upper - lower) / binwidth).round().max(0.0) as usize;
            let block = SplineBlock {
                basename: spec.basename(topology, index),
                lower,
                binwidth,
                n_knots: n_intervals + 1,
                first_column: self.n_columns,
            };
            self.n_columns += block.n_knots;
            self.blocks.push(Some(block));
        }
        debug!(
            class = self.class,
            columns = self.n_columns,
            "Prepared linear spline columns."
        );
        Ok(())
    }

    fn evaluate_basis(&self, index_among_defined: usize, parameter: f64) -> BasisValues {
        let Some(Some(block)) = self.blocks.get(index_among_defined) else {
            return BasisValues::default();
        };
        if block.n_knots == 1 {
            return BasisValues {
                first_nonzero: block.first_column,
                values: vec![1.0],
            };
        }
        let t = ((parameter - block.lower) / block.binwidth).max(0.0);
        let interval = (t.floor() as usize).min(block.n_knots - 2);
        let frac = (t - interval as f64).clamp(0.0, 1.0);
        BasisValues {
            first_nonzero: block.first_column + interval,
            values: vec![1.0 - frac, frac],
        }
    }

    fn accumulate_row(&mut self, row: usize, basis: &BasisValues) {
        self.ensure_row(row);
        self.rows[row] = SparseRow {
            first_nonzero: basis.first_nonzero,
            values: basis.values.clone(),
        };
    }

    fn accumulate_target(&mut self, row: usize, potential: f64) {
        self.ensure_row(row);
        self.targets[row] = potential;
    }

    fn solve_class(&mut self) -> Result<(), Self::Error> {
        let class = self.class;
        if self.rows.is_empty() || self.n_columns == 0 {
            debug!(class, "No rows accumulated; nothing to solve.");
            return Ok(());
        }

        let mut design = DMatrix::<f64>::zeros(self.rows.len(), self.n_columns);
        for (r, row) in self.rows.iter().enumerate() {
            for (k, value) in row.values.iter().enumerate() {
                let column = row.first_nonzero + k;
                if column >= self.n_columns {
                    return Err(LinearSplineError::RowOutOfRange { class, row: r });
                }
                design[(r, column)] += value;
            }
        }
        let target = DVector::from_column_slice(&self.targets);

        let solution = design
            .svd(true, true)
            .solve(&target, 1.0e-12)
            .map_err(|message| LinearSplineError::Solve { class, message })?;

        for block in self.blocks.iter().flatten() {
            let parameters = (0..block.n_knots).map(|k| block.knot(k)).collect();
            let potential = (0..block.n_knots)
                .map(|k| solution[block.first_column + k])
                .collect();
            self.tables.push(TabulatedPotential {
                basename: block.basename.clone(),
                parameters,
                potential,
            });
        }
        debug!(class, rows = self.rows.len(), "Solved class potentials.");
        Ok(())
    }
}
