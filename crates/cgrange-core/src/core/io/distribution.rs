use super::error::OutputError;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

pub const DISTRIBUTION_EXTENSION: &str = "dist";

pub fn distribution_path(dir: &Path, basename: &str) -> PathBuf {
    dir.join(format!("{basename}.{DISTRIBUTION_EXTENSION}"))
}

struct RecordingTarget {
    path: PathBuf,
    writer: BufWriter<File>,
}

/// Append targets for the raw sampled values of every defined interaction in one class.
///
/// All targets are created up front and stay open for the whole trajectory scan. Dropping the
/// recorder releases every handle; [`DistributionRecorder::close`] additionally reports flush
/// failures.
pub struct DistributionRecorder {
    targets: Vec<RecordingTarget>,
}

impl DistributionRecorder {
    pub fn open(paths: Vec<PathBuf>) -> Result<Self, OutputError> {
        let targets = paths
            .into_iter()
            .map(|path| {
                let file = File::create(&path).map_err(OutputError::io(&path))?;
                Ok(RecordingTarget {
                    path,
                    writer: BufWriter::new(file),
                })
            })
            .collect::<Result<Vec<_>, OutputError>>()?;
        Ok(Self { targets })
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn path(&self, index: usize) -> &Path {
        &self.targets[index].path
    }

    #[inline]
    pub fn record(&mut self, index: usize, value: f64) -> Result<(), OutputError> {
        let target = &mut self.targets[index];
        writeln!(target.writer, "{value:.6}").map_err(OutputError::io(&target.path))
    }

    /// Flushes and closes every target, returning the paths that were written.
    pub fn close(self) -> Result<Vec<PathBuf>, OutputError> {
        let mut paths = Vec::with_capacity(self.targets.len());
        for mut target in self.targets {
            target
                .writer
                .flush()
                .map_err(OutputError::io(&target.path))?;
            paths.push(target.path);
        }
        Ok(paths)
    }
}

/// Streams every value of a distribution file into `sink`, stopping at the first token that
/// does not parse. Returns the number of values delivered.
pub fn read_distribution(path: &Path, mut sink: impl FnMut(f64)) -> Result<usize, OutputError> {
    let file = File::open(path).map_err(OutputError::io(path))?;
    let mut delivered = 0;
    for line in BufReader::new(file).lines() {
        let line = line.map_err(OutputError::io(path))?;
        for token in line.split_whitespace() {
            match token.parse::<f64>() {
                Ok(value) => {
                    sink(value);
                    delivered += 1;
                }
                Err(_) => return Ok(delivered),
            }
        }
    }
    Ok(delivered)
}

pub fn remove_distribution_files(paths: &[PathBuf]) -> Result<(), OutputError> {
    for path in paths {
        fs::remove_file(path).map_err(OutputError::io(path))?;
    }
    Ok(())
}
