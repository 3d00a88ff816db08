use super::error::OutputError;
use crate::core::models::range::VERY_SMALL_F;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

pub const HISTOGRAM_EXTENSION: &str = "hist";

pub fn histogram_path(dir: &Path, basename: &str) -> PathBuf {
    dir.join(format!("{basename}.{HISTOGRAM_EXTENSION}"))
}

/// Number of half-width bins covering `[lower, upper]`: two per basis bin width.
pub fn bin_count_for_range(lower: f64, upper: f64, binwidth: f64) -> usize {
    2 * ((upper - lower) / binwidth + 0.5) as usize
}

/// Where a sample landed when it was offered to a [`Histogram`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinPlacement {
    Counted(usize),
    /// Below the first bin, exactly on the upper edge, or not a finite number.
    Dropped,
    /// Beyond the upper edge; the bin index that would have been used.
    OutOfBounds(i64),
}

/// Fixed-width histogram with bins of half the basis bin width.
///
/// Bin `j` is centred at `lower + (0.25 + 0.5 j) * binwidth`.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    lower: f64,
    binwidth: f64,
    pub centers: Vec<f64>,
    pub counts: Vec<u64>,
}

impl Histogram {
    pub fn new(lower: f64, binwidth: f64, num_bins: usize) -> Self {
        let centers = (0..num_bins)
            .map(|j| lower + (0.25 + 0.5 * j as f64) * binwidth)
            .collect();
        Self {
            lower,
            binwidth,
            centers,
            counts: vec![0; num_bins],
        }
    }

    /// Histogram spanning `[lower, upper]`, which should already sit on the basis grid.
    pub fn for_range(lower: f64, upper: f64, binwidth: f64) -> Self {
        Self::new(lower, binwidth, bin_count_for_range(lower, upper, binwidth))
    }

    /// Single-bin placeholder used for interactions that were never sampled.
    pub fn degenerate(lower: f64, binwidth: f64) -> Self {
        Self::new(lower, binwidth, 1)
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    #[inline]
    pub fn add(&mut self, value: f64) -> BinPlacement {
        if !value.is_finite() {
            return BinPlacement::Dropped;
        }
        let bin = ((value - self.lower + VERY_SMALL_F) / (0.5 * self.binwidth)).floor() as i64;
        let n = self.counts.len() as i64;
        if (0..n).contains(&bin) {
            self.counts[bin as usize] += 1;
            BinPlacement::Counted(bin as usize)
        } else if bin > n {
            BinPlacement::OutOfBounds(bin)
        } else {
            BinPlacement::Dropped
        }
    }

    /// Writes the `#center<TAB>counts` table.
    pub fn write_to(&self, writer: impl Write) -> Result<(), csv::Error> {
        let mut table = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .from_writer(writer);
        table.write_record(["#center", "counts"])?;
        for (center, count) in self.centers.iter().zip(&self.counts) {
            table.write_record([center.to_string(), count.to_string()])?;
        }
        table.flush()?;
        Ok(())
    }

    pub fn write_to_path(&self, path: &Path) -> Result<(), OutputError> {
        let file = File::create(path).map_err(OutputError::io(path))?;
        self.write_to(file).map_err(OutputError::table(path))
    }
}

/// Reads `(center, count)` rows from a histogram table, skipping the header.
pub fn read_histogram_rows(reader: impl Read) -> Result<Vec<(f64, u64)>, csv::Error> {
    let mut table = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);
    table.deserialize::<(f64, u64)>().collect()
}

pub fn read_histogram_path(path: &Path) -> Result<Vec<(f64, u64)>, OutputError> {
    let file = File::open(path).map_err(OutputError::io(path))?;
    read_histogram_rows(file).map_err(OutputError::table(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const TOLERANCE: f64 = 1e-9;

    fn f64_approx_equal(a: f64, b: f64) -> bool {
        (a - b).abs() < TOLERANCE
    }

    #[test]
    fn bin_count_is_twice_rounded_range_over_binwidth() {
        assert_eq!(bin_count_for_range(0.1, 1.0, 0.05), 36);
        assert_eq!(bin_count_for_range(0.0, 180.0, 5.0), 72);
        assert_eq!(bin_count_for_range(0.0, 0.26, 0.1), 6);
    }

    #[test]
    fn centers_form_arithmetic_sequence_from_quarter_bin() {
        let hist = Histogram::for_range(0.1, 1.0, 0.05);
        assert_eq!(hist.len(), 36);
        assert!(f64_approx_equal(hist.centers[0], 0.1125));
        for pair in hist.centers.windows(2) {
            assert!(f64_approx_equal(pair[1] - pair[0], 0.025));
        }
        assert!(f64_approx_equal(hist.centers[35], 0.9875));
    }

    #[test]
    fn add_places_values_in_half_width_bins() {
        let mut hist = Histogram::for_range(0.0, 1.0, 0.5);
        assert_eq!(hist.add(0.0), BinPlacement::Counted(0));
        assert_eq!(hist.add(0.3), BinPlacement::Counted(1));
        assert_eq!(hist.add(0.99), BinPlacement::Counted(3));
        assert_eq!(hist.counts, vec![1, 1, 0, 1]);
    }

    #[test]
    fn add_drops_values_below_range_and_on_upper_edge_silently() {
        let mut hist = Histogram::for_range(0.0, 1.0, 0.5);
        assert_eq!(hist.add(-0.5), BinPlacement::Dropped);
        assert_eq!(hist.add(1.0), BinPlacement::Dropped);
        assert_eq!(hist.total(), 0);
    }

    #[test]
    fn add_drops_non_finite_values() {
        let mut hist = Histogram::for_range(90.0, 110.0, 5.0);
        assert_eq!(hist.add(f64::NAN), BinPlacement::Dropped);
        assert_eq!(hist.add(f64::INFINITY), BinPlacement::Dropped);
        assert_eq!(hist.add(f64::NEG_INFINITY), BinPlacement::Dropped);
        assert_eq!(hist.total(), 0);
    }

    #[test]
    fn add_reports_values_far_beyond_range() {
        let mut hist = Histogram::for_range(0.0, 1.0, 0.5);
        assert_eq!(hist.add(1.3), BinPlacement::OutOfBounds(5));
        assert_eq!(hist.total(), 0);
    }

    #[test]
    fn degenerate_histogram_has_single_bin() {
        let hist = Histogram::degenerate(-1.0, 0.1);
        assert_eq!(hist.len(), 1);
        assert!(f64_approx_equal(hist.centers[0], -0.975));
    }

    #[test]
    fn histogram_table_has_header_and_tab_separated_rows() {
        let mut hist = Histogram::for_range(0.0, 1.0, 1.0);
        hist.add(0.1);
        hist.add(0.2);
        let mut buffer = Vec::new();
        hist.write_to(&mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert_eq!(text, "#center\tcounts\n0.25\t2\n0.75\t0\n");
    }

    #[test]
    fn histogram_file_can_be_read_back() {
        let dir = tempdir().unwrap();
        let path = histogram_path(dir.path(), "A_B");
        let mut hist = Histogram::for_range(1.0, 2.0, 0.5);
        for v in [1.1, 1.2, 1.7, 1.9] {
            hist.add(v);
        }
        hist.write_to_path(&path).unwrap();

        let rows = read_histogram_path(&path).unwrap();
        assert_eq!(rows.len(), 4);
        assert!(f64_approx_equal(rows[0].0, 1.125));
        assert_eq!(rows.iter().map(|r| r.1).collect::<Vec<_>>(), vec![2, 0, 1, 1]);
    }

    #[test]
    fn reading_missing_histogram_is_an_io_error() {
        let dir = tempdir().unwrap();
        let result = read_histogram_path(&dir.path().join("nope.hist"));
        assert!(matches!(result, Err(OutputError::Io { .. })));
    }
}
