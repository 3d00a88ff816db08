use crate::cli::RunArgs;
use crate::error::{CliError, Result};
use cgrange::core::models::interaction::{
    ClassKind, DefinedInteraction, DistributionOutput, InteractionClassSpec,
};
use cgrange::core::models::model::InteractionModel;
use cgrange::core::models::topology::Topology;
use cgrange::engine::config as core_config;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialSystemConfig {
    /// Type names in index order. Defaults to first appearance in the trajectory.
    type_names: Option<Vec<String>>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialOutputConfig {
    directory: Option<PathBuf>,
    nonbonded_range_file: Option<String>,
    bonded_range_file: Option<String>,
    max_frames: Option<usize>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialInversionConfig {
    temperature: Option<f64>,
    boltzmann: Option<f64>,
    normalization: Option<f64>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct NonbondedClassConfig {
    cutoff: f64,
    binwidth: f64,
    #[serde(default)]
    distributions: DistributionOutput,
}

impl From<NonbondedClassConfig> for InteractionClassSpec {
    fn from(c: NonbondedClassConfig) -> Self {
        InteractionClassSpec::pair_nonbonded(c.cutoff, c.binwidth, c.distributions)
    }
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct BondedClassConfig {
    kind: ClassKind,
    #[serde(default)]
    subtype: i32,
    binwidth: f64,
    #[serde(default)]
    distributions: DistributionOutput,
    /// Defined interactions as tuples of type names.
    interactions: Vec<Vec<String>>,
    /// Interaction instances as tuples of 0-based site indices.
    #[serde(default)]
    instances: Vec<Vec<usize>>,
}

impl BondedClassConfig {
    fn into_spec(self, topology: &Topology) -> Result<InteractionClassSpec> {
        if !self.kind.is_bonded() {
            return Err(CliError::Config(format!(
                "`bonded` entries must be a bonded class kind, found '{}'",
                self.kind.full_name()
            )));
        }
        let defined = self
            .interactions
            .iter()
            .map(|names| {
                names
                    .iter()
                    .map(|name| {
                        topology.type_index(name).ok_or_else(|| {
                            CliError::Config(format!(
                                "Unknown type '{}' in {} interaction {:?}",
                                name,
                                self.kind.full_name(),
                                names
                            ))
                        })
                    })
                    .collect::<Result<Vec<_>>>()
                    .map(DefinedInteraction::new)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(InteractionClassSpec::bonded(
            self.kind,
            self.subtype,
            self.binwidth,
            self.distributions,
            defined,
            self.instances,
        ))
    }
}

/// Contents of the TOML model file before command-line overrides are applied.
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct PartialRunConfig {
    system: Option<PartialSystemConfig>,
    output: Option<PartialOutputConfig>,
    inversion: Option<PartialInversionConfig>,
    nonbonded: Option<NonbondedClassConfig>,
    #[serde(default)]
    bonded: Vec<BondedClassConfig>,
    #[serde(default)]
    three_body_nonbonded: bool,
}

impl PartialRunConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }

    fn from_toml(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Type names in index order: the configured list, or first appearance among `labels`.
    pub fn type_names(&self, labels: &[String]) -> Vec<String> {
        if let Some(names) = self.system.as_ref().and_then(|s| s.type_names.clone()) {
            return names;
        }
        let mut names: Vec<String> = Vec::new();
        for label in labels {
            if !names.contains(label) {
                names.push(label.clone());
            }
        }
        names
    }

    /// Builds the interaction model: nonbonded pairs first, then bonded classes in file order,
    /// then the three-body class when enabled.
    pub fn build_model(&mut self, topology: &Topology) -> Result<InteractionModel> {
        let mut model = InteractionModel::default();
        if let Some(nonbonded) = self.nonbonded.take() {
            model.push(nonbonded.into());
        }
        for bonded in std::mem::take(&mut self.bonded) {
            model.push(bonded.into_spec(topology)?);
        }
        if self.three_body_nonbonded {
            model.push(InteractionClassSpec::three_body_nonbonded());
        }
        if model.classes.is_empty() {
            return Err(CliError::Config(
                "The model defines no interaction classes.".to_string(),
            ));
        }
        Ok(model)
    }

    pub fn merge_with_cli(&self, args: &RunArgs) -> Result<core_config::RangeFindingConfig> {
        let output = self.output.as_ref();
        let inversion = self.inversion.as_ref();

        let output_dir = args
            .output_dir
            .clone()
            .or_else(|| output.and_then(|o| o.directory.clone()))
            .ok_or_else(|| {
                CliError::Config(
                    "An output directory is required either in `[output]` or via --output-dir."
                        .to_string(),
                )
            })?;

        let mut builder = core_config::RangeFindingConfigBuilder::new().output_dir(output_dir);
        if let Some(name) = output.and_then(|o| o.nonbonded_range_file.clone()) {
            builder = builder.nonbonded_range_file(name);
        }
        if let Some(name) = output.and_then(|o| o.bonded_range_file.clone()) {
            builder = builder.bonded_range_file(name);
        }
        if let Some(limit) = args.max_frames.or(output.and_then(|o| o.max_frames)) {
            builder = builder.max_frames(limit);
        }
        if let Some(t) = args
            .temperature
            .or(inversion.and_then(|i| i.temperature))
        {
            builder = builder.temperature(t);
        }
        if let Some(kb) = inversion.and_then(|i| i.boltzmann) {
            builder = builder.boltzmann(kb);
        }
        if let Some(n) = inversion.and_then(|i| i.normalization) {
            builder = builder.normalization(n);
        }

        builder.build().map_err(|e| CliError::Config(e.to_string()))
    }
}
