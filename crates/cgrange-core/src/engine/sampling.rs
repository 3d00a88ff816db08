use super::error::RangeFindingError;
use crate::core::io::distribution::DistributionRecorder;
use crate::core::io::error::OutputError;
use crate::core::models::frame::Frame;
use crate::core::models::interaction::{ClassKind, InteractionClassSpec};
use crate::core::utils::geometry;

/// Geometric parameter sampled for every instance of a class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplingStrategy {
    /// Distance between the first and last site of the instance.
    Distance,
    /// Angle at the middle site of a three-site instance.
    Angle,
    /// Dihedral around the central bond of a four-site instance.
    Dihedral,
    /// The class is not range-matched; nothing is sampled or recorded.
    Nothing,
}

impl SamplingStrategy {
    /// Picks the strategy for a class from its kind and subtype.
    ///
    /// Angular and dihedral classes accept subtype 0 (angle based) and 1 (distance based);
    /// any other subtype is a malformed model and is reported as fatal.
    pub fn resolve(spec: &InteractionClassSpec) -> Result<Self, RangeFindingError> {
        let unrecognized = || RangeFindingError::UnrecognizedSubtype {
            class: spec.full_name(),
            subtype: spec.subtype,
        };
        match spec.kind {
            ClassKind::PairNonbonded | ClassKind::PairBonded => Ok(Self::Distance),
            ClassKind::AngularBonded => match spec.subtype {
                0 => Ok(Self::Angle),
                1 => Ok(Self::Distance),
                _ => Err(unrecognized()),
            },
            ClassKind::DihedralBonded => match spec.subtype {
                0 => Ok(Self::Dihedral),
                1 => Ok(Self::Distance),
                _ => Err(unrecognized()),
            },
            ClassKind::ThreeBodyNonbonded => Ok(Self::Nothing),
        }
    }
}

/// Per-class evaluation context: the sample currently being evaluated and the strategy
/// chosen for the class.
#[derive(Debug, Clone)]
pub struct InteractionClassComputer {
    strategy: SamplingStrategy,
    sites: [usize; 4],
    n_sites: usize,
    index_among_defined: usize,
}

impl InteractionClassComputer {
    pub fn new(strategy: SamplingStrategy) -> Self {
        Self {
            strategy,
            sites: [0; 4],
            n_sites: 0,
            index_among_defined: 0,
        }
    }

    pub fn for_class(spec: &InteractionClassSpec) -> Result<Self, RangeFindingError> {
        SamplingStrategy::resolve(spec).map(Self::new)
    }

    pub fn strategy(&self) -> SamplingStrategy {
        self.strategy
    }

    pub fn index_among_defined(&self) -> usize {
        self.index_among_defined
    }

    #[inline]
    pub fn set_sample(&mut self, sites: &[usize], index_among_defined: usize) {
        let n = sites.len().min(4);
        self.sites[..n].copy_from_slice(&sites[..n]);
        self.n_sites = n;
        self.index_among_defined = index_among_defined;
    }

    /// Evaluates the class parameter for the current sample, or `None` for no-op classes.
    #[inline]
    pub fn evaluate(&self, frame: &Frame) -> Option<f64> {
        let half = frame.simulation_box.half_lengths();
        let x = &frame.positions;
        let s = &self.sites;
        match self.strategy {
            SamplingStrategy::Distance if self.n_sites >= 2 => {
                Some(geometry::distance(x, [s[0], s[self.n_sites - 1]], &half))
            }
            SamplingStrategy::Angle if self.n_sites == 3 => {
                Some(geometry::angle(x, [s[0], s[1], s[2]], &half))
            }
            SamplingStrategy::Dihedral if self.n_sites == 4 => {
                Some(geometry::dihedral(x, [s[0], s[1], s[2], s[3]], &half))
            }
            _ => None,
        }
    }
}

/// Nonbonded pair samples are only recorded inside the cutoff; bonded samples always are.
#[inline]
pub fn accepts_for_recording(spec: &InteractionClassSpec, value: f64) -> bool {
    match spec.kind {
        ClassKind::PairNonbonded => value < spec.cutoff,
        ClassKind::PairBonded | ClassKind::AngularBonded | ClassKind::DihedralBonded => true,
        ClassKind::ThreeBodyNonbonded => false,
    }
}

/// Evaluates the computer's current sample, tightens the interaction's range and records the
/// value when the class keeps distributions.
#[inline]
pub fn sample_current(
    spec: &mut InteractionClassSpec,
    computer: &InteractionClassComputer,
    recorder: Option<&mut DistributionRecorder>,
    frame: &Frame,
) -> Result<Option<f64>, OutputError> {
    let Some(value) = computer.evaluate(frame) else {
        return Ok(None);
    };
    let index = computer.index_among_defined();
    spec.ranges.observe(index, value);

    if let Some(recorder) = recorder {
        if spec.output.is_enabled() && value.is_finite() && accepts_for_recording(spec, value) {
            recorder.record(index, value)?;
        }
    }
    Ok(Some(value))
}
