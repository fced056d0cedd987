//! IO module - run configuration and mixture checkpoints.

mod checkpoint;
mod config;

pub use checkpoint::{from_yaml, load_checkpoint, save_checkpoint, to_yaml};
pub use config::{read_run_config, RunConfig, SamplerConfig};
