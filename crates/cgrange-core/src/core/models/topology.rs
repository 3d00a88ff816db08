use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum TopologyError {
    #[error("Topology declares no site types")]
    NoTypes,
    #[error("Site {site} has type index {type_index}, but only {n_types} types are declared")]
    TypeOutOfRange {
        site: usize,
        type_index: usize,
        n_types: usize,
    },
    #[error("Unknown site type name '{0}'")]
    UnknownTypeName(String),
}

/// Coarse-grained site types of the system being sampled.
///
/// Type indices are 0-based and address `type_names`. Every site carries exactly one type.
#[derive(Debug, Clone, PartialEq)]
pub struct Topology {
    type_names: Vec<String>,
    site_types: Vec<usize>,
}

impl Topology {
    pub fn new(type_names: Vec<String>, site_types: Vec<usize>) -> Result<Self, TopologyError> {
        if type_names.is_empty() {
            return Err(TopologyError::NoTypes);
        }
        let n_types = type_names.len();
        if let Some((site, &type_index)) = site_types
            .iter()
            .enumerate()
            .find(|(_, t)| **t >= n_types)
        {
            return Err(TopologyError::TypeOutOfRange {
                site,
                type_index,
                n_types,
            });
        }
        Ok(Self {
            type_names,
            site_types,
        })
    }

    /// Builds a topology from per-site type labels, resolving each label against `type_names`.
    pub fn from_labels<S: AsRef<str>>(
        type_names: Vec<String>,
        labels: &[S],
    ) -> Result<Self, TopologyError> {
        let site_types = labels
            .iter()
            .map(|label| {
                let label = label.as_ref();
                type_names
                    .iter()
                    .position(|name| name == label)
                    .ok_or_else(|| TopologyError::UnknownTypeName(label.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(type_names, site_types)
    }

    pub fn n_types(&self) -> usize {
        self.type_names.len()
    }

    pub fn n_sites(&self) -> usize {
        self.site_types.len()
    }

    pub fn type_names(&self) -> &[String] {
        &self.type_names
    }

    pub fn type_name(&self, type_index: usize) -> Option<&str> {
        self.type_names.get(type_index).map(String::as_str)
    }

    pub fn type_index(&self, name: &str) -> Option<usize> {
        self.type_names.iter().position(|n| n == name)
    }

    pub fn site_type(&self, site: usize) -> usize {
        self.site_types[site]
    }

    pub fn site_types(&self) -> &[usize] {
        &self.site_types
    }

    /// Number of sites carrying each type, indexed by type.
    pub fn type_counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.n_types()];
        for &t in &self.site_types {
            counts[t] += 1;
        }
        counts
    }
}
