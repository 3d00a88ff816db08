use crate::core::io::ranges::{BONDED_RANGE_FILE, NONBONDED_RANGE_FILE};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Boltzmann constant in kcal/(mol K).
pub const DEFAULT_BOLTZMANN: f64 = 0.0019872067;
pub const DEFAULT_TEMPERATURE: f64 = 300.0;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid value {value} for parameter '{name}': must be positive")]
    NonPositive { name: &'static str, value: f64 },
}

/// Thermodynamic inputs of the Boltzmann inversion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct InversionParameters {
    pub temperature: f64,
    pub boltzmann: f64,
    /// Global count normalization. `None` means one over the number of frames scanned.
    pub normalization: Option<f64>,
}

impl Default for InversionParameters {
    fn default() -> Self {
        Self {
            temperature: DEFAULT_TEMPERATURE,
            boltzmann: DEFAULT_BOLTZMANN,
            normalization: None,
        }
    }
}

impl InversionParameters {
    pub fn kt(&self) -> f64 {
        self.temperature * self.boltzmann
    }

    pub fn normalization_for(&self, frames_scanned: usize) -> f64 {
        match self.normalization {
            Some(n) => n,
            None if frames_scanned > 0 => 1.0 / frames_scanned as f64,
            None => 1.0,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.temperature <= 0.0 {
            return Err(ConfigError::NonPositive {
                name: "temperature",
                value: self.temperature,
            });
        }
        if self.boltzmann <= 0.0 {
            return Err(ConfigError::NonPositive {
                name: "boltzmann",
                value: self.boltzmann,
            });
        }
        if let Some(n) = self.normalization {
            if n <= 0.0 {
                return Err(ConfigError::NonPositive {
                    name: "normalization",
                    value: n,
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RangeFindingConfig {
    pub output_dir: PathBuf,
    pub nonbonded_range_file: String,
    pub bonded_range_file: String,
    pub inversion: InversionParameters,
    pub max_frames: Option<usize>,
}

#[derive(Default)]
pub struct RangeFindingConfigBuilder {
    output_dir: Option<PathBuf>,
    nonbonded_range_file: Option<String>,
    bonded_range_file: Option<String>,
    temperature: Option<f64>,
    boltzmann: Option<f64>,
    normalization: Option<f64>,
    max_frames: Option<usize>,
}

impl RangeFindingConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn output_dir(mut self, dir: PathBuf) -> Self {
        self.output_dir = Some(dir);
        self
    }
    pub fn nonbonded_range_file(mut self, name: impl Into<String>) -> Self {
        self.nonbonded_range_file = Some(name.into());
        self
    }
    pub fn bonded_range_file(mut self, name: impl Into<String>) -> Self {
        self.bonded_range_file = Some(name.into());
        self
    }
    pub fn temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }
    pub fn boltzmann(mut self, boltzmann: f64) -> Self {
        self.boltzmann = Some(boltzmann);
        self
    }
    pub fn normalization(mut self, normalization: f64) -> Self {
        self.normalization = Some(normalization);
        self
    }
    pub fn max_frames(mut self, max_frames: usize) -> Self {
        self.max_frames = Some(max_frames);
        self
    }

    pub fn build(self) -> Result<RangeFindingConfig, ConfigError> {
        let inversion = InversionParameters {
            temperature: self.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            boltzmann: self.boltzmann.unwrap_or(DEFAULT_BOLTZMANN),
            normalization: self.normalization,
        };
        inversion.validate()?;

        Ok(RangeFindingConfig {
            output_dir: self
                .output_dir
                .ok_or(ConfigError::MissingParameter("output_dir"))?,
            nonbonded_range_file: self
                .nonbonded_range_file
                .unwrap_or_else(|| NONBONDED_RANGE_FILE.to_string()),
            bonded_range_file: self
                .bonded_range_file
                .unwrap_or_else(|| BONDED_RANGE_FILE.to_string()),
            inversion,
            max_frames: self.max_frames,
        })
    }
}
