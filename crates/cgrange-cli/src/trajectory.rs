use cgrange::core::models::frame::{Frame, SimulationBox};
use nalgebra::Point3;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Upper bound on per-frame buffers reserved from the site count line before any site is read.
const MAX_PREALLOCATED_SITES: usize = 1 << 16;

#[derive(Debug, Error)]
pub enum TrajectoryError {
    #[error("Failed to read trajectory '{path}': {source}", path = path.display())]
    Io { path: PathBuf, source: io::Error },

    #[error("Frame {frame}: invalid site count line '{line}'")]
    InvalidCount { frame: usize, line: String },

    #[error("Frame {frame}: comment line must carry the three box lengths, found '{line}'")]
    InvalidBox { frame: usize, line: String },

    #[error("Frame {frame}, line {line_number}: expected '<label> <x> <y> <z>', found '{line}'")]
    InvalidSite {
        frame: usize,
        line_number: usize,
        line: String,
    },

    #[error("Frame {frame} ended after {found} of {expected} sites")]
    Truncated {
        frame: usize,
        expected: usize,
        found: usize,
    },

    #[error("Frame {frame}: site {site} is labelled '{found}', but the first frame labels it '{expected}'")]
    LabelChanged {
        frame: usize,
        site: usize,
        expected: String,
        found: String,
    },

    #[error("Trajectory '{path}' contains no frames", path = path.display())]
    Empty { path: PathBuf },
}

/// Streaming reader for multi-frame XYZ files.
///
/// Each frame is a site count line, a comment line whose first three numeric tokens are the box
/// edge lengths, and one `<label> <x> <y> <z>` line per site. Labels are coarse-grained type
/// names and must not change between frames.
pub struct XyzTrajectory<R> {
    reader: R,
    path: PathBuf,
    line_number: usize,
    frame_index: usize,
    labels: Option<Vec<String>>,
    finished: bool,
}

impl XyzTrajectory<BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self, TrajectoryError> {
        let file = File::open(path).map_err(|source| TrajectoryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::new(BufReader::new(file), path))
    }
}

impl<R: BufRead> XyzTrajectory<R> {
    pub fn new(reader: R, path: &Path) -> Self {
        Self {
            reader,
            path: path.to_path_buf(),
            line_number: 0,
            frame_index: 0,
            labels: None,
            finished: false,
        }
    }

    /// Site labels of the first frame, available once it has been read.
    pub fn labels(&self) -> Option<&[String]> {
        self.labels.as_deref()
    }

    fn next_line(&mut self) -> Result<Option<String>, TrajectoryError> {
        let mut line = String::new();
        let read = self
            .reader
            .read_line(&mut line)
            .map_err(|source| TrajectoryError::Io {
                path: self.path.clone(),
                source,
            })?;
        if read == 0 {
            return Ok(None);
        }
        self.line_number += 1;
        Ok(Some(line.trim_end().to_string()))
    }

    /// Reads the next frame, or `None` at the end of the file.
    pub fn read_frame(&mut self) -> Result<Option<Frame>, TrajectoryError> {
        let frame = self.frame_index;
        let count_line = loop {
            match self.next_line()? {
                None => return Ok(None),
                Some(line) if line.trim().is_empty() => continue,
                Some(line) => break line,
            }
        };
        let n_sites: usize =
            count_line
                .trim()
                .parse()
                .map_err(|_| TrajectoryError::InvalidCount {
                    frame,
                    line: count_line.clone(),
                })?;

        let comment = self.next_line()?.unwrap_or_default();
        let simulation_box = parse_box(&comment).ok_or_else(|| TrajectoryError::InvalidBox {
            frame,
            line: comment.clone(),
        })?;

        let reserved = n_sites.min(MAX_PREALLOCATED_SITES);
        let mut labels = Vec::with_capacity(reserved);
        let mut positions = Vec::with_capacity(reserved);
        for found in 0..n_sites {
            let line = self.next_line()?.ok_or(TrajectoryError::Truncated {
                frame,
                expected: n_sites,
                found,
            })?;
            let (label, position) =
                parse_site(&line).ok_or_else(|| TrajectoryError::InvalidSite {
                    frame,
                    line_number: self.line_number,
                    line: line.clone(),
                })?;
            labels.push(label);
            positions.push(position);
        }

        match &self.labels {
            None => self.labels = Some(labels),
            Some(first) => {
                if let Some((site, (expected, found))) = first
                    .iter()
                    .zip(&labels)
                    .enumerate()
                    .find(|(_, (a, b))| a != b)
                {
                    return Err(TrajectoryError::LabelChanged {
                        frame,
                        site,
                        expected: expected.clone(),
                        found: found.clone(),
                    });
                }
            }
        }

        self.frame_index += 1;
        Ok(Some(Frame::new(positions, simulation_box)))
    }
}

impl<R: BufRead> Iterator for XyzTrajectory<R> {
    type Item = Result<Frame, TrajectoryError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let next = self.read_frame().transpose();
        if !matches!(next, Some(Ok(_))) {
            self.finished = true;
        }
        next
    }
}

/// Reads only the first frame of `path` and returns its site labels.
pub fn read_site_labels(path: &Path) -> Result<Vec<String>, TrajectoryError> {
    let mut trajectory = XyzTrajectory::open(path)?;
    if trajectory.read_frame()?.is_none() {
        return Err(TrajectoryError::Empty {
            path: path.to_path_buf(),
        });
    }
    Ok(trajectory.labels.take().unwrap_or_default())
}

fn parse_box(comment: &str) -> Option<SimulationBox> {
    let mut lengths = comment
        .split_whitespace()
        .filter_map(|token| token.parse::<f64>().ok());
    let (x, y, z) = (lengths.next()?, lengths.next()?, lengths.next()?);
    Some(SimulationBox::new(x, y, z))
}

fn parse_site(line: &str) -> Option<(String, Point3<f64>)> {
    let mut fields = line.split_whitespace();
    let label = fields.next()?.to_string();
    let mut coordinate = || fields.next()?.parse::<f64>().ok();
    let (x, y, z) = (coordinate()?, coordinate()?, coordinate()?);
    Some((label, Point3::new(x, y, z)))
}
