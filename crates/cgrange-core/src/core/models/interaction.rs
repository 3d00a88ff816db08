use super::range::RangeTracker;
use super::topology::Topology;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ModelError {
    #[error("The {class} bin width must be a positive finite number, found {binwidth}")]
    InvalidBinwidth { class: &'static str, binwidth: f64 },
    #[error("The {class} cutoff must be a positive finite number, found {cutoff}")]
    InvalidCutoff { class: &'static str, cutoff: f64 },
    #[error("Defined {class} interaction {index} lists {found} types, expected {expected}")]
    DefinedArity {
        class: &'static str,
        index: usize,
        expected: usize,
        found: usize,
    },
    #[error("Defined {class} interaction {index} references type {type_index}, but only {n_types} types exist")]
    TypeOutOfRange {
        class: &'static str,
        index: usize,
        type_index: usize,
        n_types: usize,
    },
    #[error("Defined {class} interaction {index} duplicates interaction {previous}")]
    DuplicateDefinition {
        class: &'static str,
        index: usize,
        previous: usize,
    },
    #[error("{class} instance {index} lists {found} sites, expected {expected}")]
    InstanceArity {
        class: &'static str,
        index: usize,
        expected: usize,
        found: usize,
    },
    #[error("{class} instance {index} references site {site}, but the topology has {n_sites} sites")]
    SiteOutOfRange {
        class: &'static str,
        index: usize,
        site: usize,
        n_sites: usize,
    },
}

/// The geometric family an interaction class belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClassKind {
    PairNonbonded,
    PairBonded,
    AngularBonded,
    DihedralBonded,
    ThreeBodyNonbonded,
}

impl ClassKind {
    pub fn full_name(self) -> &'static str {
        match self {
            ClassKind::PairNonbonded => "pair nonbonded",
            ClassKind::PairBonded => "pair bonded",
            ClassKind::AngularBonded => "angular bonded",
            ClassKind::DihedralBonded => "dihedral bonded",
            ClassKind::ThreeBodyNonbonded => "three body nonbonded",
        }
    }

    /// Suffix appended to per-interaction file basenames so that classes never collide.
    pub fn file_suffix(self) -> &'static str {
        match self {
            ClassKind::PairNonbonded => "",
            ClassKind::PairBonded => "_bon",
            ClassKind::AngularBonded => "_ang",
            ClassKind::DihedralBonded => "_dih",
            ClassKind::ThreeBodyNonbonded => "_3b",
        }
    }

    /// Number of sites taking part in one interaction instance.
    pub fn n_body(self) -> usize {
        match self {
            ClassKind::PairNonbonded | ClassKind::PairBonded => 2,
            ClassKind::AngularBonded | ClassKind::ThreeBodyNonbonded => 3,
            ClassKind::DihedralBonded => 4,
        }
    }

    pub fn is_pair(self) -> bool {
        matches!(self, ClassKind::PairNonbonded | ClassKind::PairBonded)
    }

    pub fn is_bonded(self) -> bool {
        matches!(
            self,
            ClassKind::PairBonded | ClassKind::AngularBonded | ClassKind::DihedralBonded
        )
    }

    /// Whether sampled parameter distributions are ever recorded for this kind.
    pub fn supports_distributions(self) -> bool {
        self != ClassKind::ThreeBodyNonbonded
    }
}

/// What happens to raw per-sample parameter values during and after the scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DistributionOutput {
    /// Nothing is recorded; no histogram or inversion is produced.
    #[default]
    Off,
    /// Raw values are recorded, histogrammed, then deleted.
    Transient,
    /// Raw values are recorded, histogrammed and kept on disk.
    Persistent,
}

impl DistributionOutput {
    pub fn is_enabled(self) -> bool {
        self != DistributionOutput::Off
    }

    pub fn keeps_raw_values(self) -> bool {
        self == DistributionOutput::Persistent
    }
}

/// One distinct interaction of a class, identified by the site types it connects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinedInteraction {
    pub types: Vec<usize>,
}

impl DefinedInteraction {
    pub fn new(types: Vec<usize>) -> Self {
        Self { types }
    }
}

/// Definition and sampling state of one interaction class.
///
/// Bonded classes carry their instance lists (site index tuples, center sites in the middle:
/// `[k, j, l]` for angles and `[k, i, j, l]` for dihedrals). Nonbonded pair classes sample every
/// pair of sites and define one interaction per unordered pair of types.
#[derive(Debug, Clone)]
pub struct InteractionClassSpec {
    pub kind: ClassKind,
    pub subtype: i32,
    pub cutoff: f64,
    pub fm_binwidth: f64,
    pub output: DistributionOutput,
    pub defined: Vec<DefinedInteraction>,
    pub instances: Vec<Vec<usize>>,
    pub ranges: RangeTracker,
    pub defined_to_matched: Vec<usize>,
    pub n_to_force_match: usize,
    pub interaction_column_indices: Vec<usize>,
    type_lookup: HashMap<Vec<usize>, usize>,
}

impl InteractionClassSpec {
    fn with_kind(kind: ClassKind, subtype: i32, fm_binwidth: f64, output: DistributionOutput) -> Self {
        Self {
            kind,
            subtype,
            cutoff: 0.0,
            fm_binwidth,
            output,
            defined: Vec::new(),
            instances: Vec::new(),
            ranges: RangeTracker::default(),
            defined_to_matched: Vec::new(),
            n_to_force_match: 0,
            interaction_column_indices: Vec::new(),
            type_lookup: HashMap::new(),
        }
    }

    pub fn pair_nonbonded(cutoff: f64, fm_binwidth: f64, output: DistributionOutput) -> Self {
        let mut spec = Self::with_kind(ClassKind::PairNonbonded, 0, fm_binwidth, output);
        spec.cutoff = cutoff;
        spec
    }

    pub fn bonded(
        kind: ClassKind,
        subtype: i32,
        fm_binwidth: f64,
        output: DistributionOutput,
        defined: Vec<DefinedInteraction>,
        instances: Vec<Vec<usize>>,
    ) -> Self {
        let mut spec = Self::with_kind(kind, subtype, fm_binwidth, output);
        spec.defined = defined;
        spec.instances = instances;
        spec
    }

    pub fn three_body_nonbonded() -> Self {
        Self::with_kind(ClassKind::ThreeBodyNonbonded, 0, 0.0, DistributionOutput::Off)
    }

    pub fn full_name(&self) -> &'static str {
        self.kind.full_name()
    }

    pub fn n_defined(&self) -> usize {
        self.defined.len()
    }

    pub fn records_distributions(&self) -> bool {
        self.output.is_enabled() && self.kind.supports_distributions()
    }

    /// Resolves the defined interactions against the topology and validates instance lists.
    ///
    /// Nonbonded pair classes get one defined interaction per unordered type pair, ordered
    /// `(0,0), (0,1), ..., (1,1), ...`. Type tuples are matched in either direction.
    pub fn setup_for_defined_interactions(&mut self, topology: &Topology) -> Result<(), ModelError> {
        let class = self.full_name();
        let n_types = topology.n_types();

        if self.kind != ClassKind::ThreeBodyNonbonded
            && !(self.fm_binwidth.is_finite() && self.fm_binwidth > 0.0)
        {
            return Err(ModelError::InvalidBinwidth {
                class,
                binwidth: self.fm_binwidth,
            });
        }
        if self.kind == ClassKind::PairNonbonded && !(self.cutoff.is_finite() && self.cutoff > 0.0) {
            return Err(ModelError::InvalidCutoff {
                class,
                cutoff: self.cutoff,
            });
        }

        if self.kind == ClassKind::PairNonbonded {
            self.defined = (0..n_types)
                .flat_map(|a| (a..n_types).map(move |b| DefinedInteraction::new(vec![a, b])))
                .collect();
        }

        self.type_lookup.clear();
        let expected = self.kind.n_body();
        for (index, interaction) in self.defined.iter().enumerate() {
            if interaction.types.len() != expected {
                return Err(ModelError::DefinedArity {
                    class,
                    index,
                    expected,
                    found: interaction.types.len(),
                });
            }
            if let Some(&type_index) = interaction.types.iter().find(|&&t| t >= n_types) {
                return Err(ModelError::TypeOutOfRange {
                    class,
                    index,
                    type_index,
                    n_types,
                });
            }
            let forward = interaction.types.clone();
            let reversed: Vec<usize> = forward.iter().rev().copied().collect();
            if let Some(&previous) = self.type_lookup.get(&forward) {
                return Err(ModelError::DuplicateDefinition {
                    class,
                    index,
                    previous,
                });
            }
            self.type_lookup.insert(forward, index);
            self.type_lookup.entry(reversed).or_insert(index);
        }

        let n_sites = topology.n_sites();
        for (index, sites) in self.instances.iter().enumerate() {
            if sites.len() != expected {
                return Err(ModelError::InstanceArity {
                    class,
                    index,
                    expected,
                    found: sites.len(),
                });
            }
            if let Some(&site) = sites.iter().find(|&&s| s >= n_sites) {
                return Err(ModelError::SiteOutOfRange {
                    class,
                    index,
                    site,
                    n_sites,
                });
            }
        }
        Ok(())
    }

    /// Resets the bounds to their sentinels and sizes the force-matching bookkeeping.
    pub fn initialize_ranges(&mut self) {
        let n = self.n_defined();
        self.ranges.reset(n);
        self.defined_to_matched = (1..=n).collect();
        self.n_to_force_match = n;
        self.interaction_column_indices = vec![0; n + 1];
    }

    pub fn defined_index_for_types(&self, types: &[usize]) -> Option<usize> {
        self.type_lookup.get(types).copied()
    }

    pub fn defined_index_for_sites(&self, sites: &[usize], topology: &Topology) -> Option<usize> {
        let types: Vec<usize> = sites.iter().map(|&s| topology.site_type(s)).collect();
        self.defined_index_for_types(&types)
    }

    pub fn interaction_types(&self, index: usize) -> &[usize] {
        &self.defined[index].types
    }

    /// Type names of interaction `index` joined by `delimiter`.
    pub fn interaction_name(&self, topology: &Topology, index: usize, delimiter: &str) -> String {
        self.defined[index]
            .types
            .iter()
            .map(|&t| topology.type_name(t).unwrap_or("?"))
            .collect::<Vec<_>>()
            .join(delimiter)
    }

    /// File basename for per-interaction outputs, e.g. `A_B` or `A_B_C_ang`.
    pub fn basename(&self, topology: &Topology, index: usize) -> String {
        format!(
            "{}{}",
            self.interaction_name(topology, index, "_"),
            self.kind.file_suffix()
        )
    }
}
