use super::config::ConfigError;
use crate::core::io::error::OutputError;
use crate::core::models::interaction::ModelError;
use crate::core::models::topology::TopologyError;
use thiserror::Error;

pub type BoxedError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum RangeFindingError {
    #[error("Unrecognized {class} class subtype! (subtype {subtype})")]
    UnrecognizedSubtype { class: &'static str, subtype: i32 },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Topology error: {0}")]
    Topology(#[from] TopologyError),

    #[error("Interaction model error: {0}")]
    Model(#[from] ModelError),

    #[error(transparent)]
    Output(#[from] OutputError),

    #[error("Frame {frame} has {found} sites, but the topology has {expected}")]
    FrameSize {
        frame: usize,
        expected: usize,
        found: usize,
    },

    #[error("Failed to read trajectory frame {frame}: {source}")]
    Frame { frame: usize, source: BoxedError },

    #[error("Matrix accumulation failed for {class} interactions: {source}")]
    Matrix {
        class: &'static str,
        source: BoxedError,
    },
}
