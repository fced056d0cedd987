//! Error types for the sampler.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Candidate index {index} out of range for {len} candidates")]
    UnknownCandidate { index: usize, len: usize },

    #[error("Anchor violation on leg {leg}: zeta[{reference}] = {value:e}")]
    AnchorViolation {
        leg: usize,
        reference: usize,
        value: f64,
    },

    #[error("Non-finite mixture weight on leg {leg}, state {state}")]
    NonFiniteMixture { leg: usize, state: usize },

    #[error("Failed to parse '{path}': {source}", path = path.display())]
    FileParsing {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
