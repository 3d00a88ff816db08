use crate::core::models::interaction::{ClassKind, InteractionClassSpec};
use crate::core::models::topology::Topology;
use std::fmt;
use std::io::{self, Write};

pub const NONBONDED_RANGE_FILE: &str = "rmin.in";
pub const BONDED_RANGE_FILE: &str = "rmin_b.in";

/// Whether an interaction has a usable sampled range for force matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeStatus {
    ForceMatched,
    NotSampled,
}

impl fmt::Display for RangeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RangeStatus::ForceMatched => write!(f, "fm"),
            RangeStatus::NotSampled => write!(f, "none"),
        }
    }
}

/// Turns the tracked bounds of interaction `index` into its final range.
///
/// Never-observed interactions and nonbonded pairs sampled only beyond the cutoff become
/// `-1 -1`; nonbonded upper bounds are clamped to the cutoff. The tracker is updated in place.
pub fn finalize_range(spec: &mut InteractionClassSpec, index: usize) -> RangeStatus {
    if spec.ranges.never_observed(index) {
        spec.ranges.mark_unsampled(index);
    } else if spec.kind == ClassKind::PairNonbonded {
        if spec.ranges.lower(index) > spec.cutoff {
            spec.ranges.mark_unsampled(index);
        } else {
            spec.ranges.clamp_upper(index, spec.cutoff);
        }
    }

    if spec.ranges.is_sampled(index) {
        RangeStatus::ForceMatched
    } else {
        RangeStatus::NotSampled
    }
}

pub fn write_range_line(
    writer: &mut impl Write,
    name: &str,
    lower: f64,
    upper: f64,
    status: RangeStatus,
) -> io::Result<()> {
    writeln!(writer, "{name} {lower:.6} {upper:.6} {status}")
}

/// Finalizes and writes the range of every matched interaction in the class, in defined order.
pub fn write_class_ranges(
    spec: &mut InteractionClassSpec,
    topology: &Topology,
    writer: &mut impl Write,
) -> io::Result<Vec<RangeStatus>> {
    let mut statuses = Vec::with_capacity(spec.n_defined());
    for index in 0..spec.n_defined() {
        if spec.defined_to_matched[index] == 0 {
            continue;
        }
        let status = finalize_range(spec, index);
        let name = spec.interaction_name(topology, index, " ");
        let (lower, upper) = spec.ranges.bounds(index);
        write_range_line(writer, &name, lower, upper, status)?;
        statuses.push(status);
    }
    Ok(statuses)
}
