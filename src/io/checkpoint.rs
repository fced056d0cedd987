//! YAML checkpoints of the mixture state.
//!
//! A checkpoint carries ζ per leg, the iteration counter, candidate ids, the
//! reference index and the gain schedule. Floats are written in shortest
//! round-trip form, so a reload reproduces ζ bit for bit.

use std::fs;
use std::path::Path;
use tracing::info;

use crate::error::{Error, Result};
use crate::sams::MixtureState;

pub fn to_yaml(state: &MixtureState) -> Result<String> {
    Ok(serde_yaml::to_string(state)?)
}

/// Parse and validate a checkpoint document.
pub fn from_yaml(text: &str) -> Result<MixtureState> {
    let state: MixtureState = serde_yaml::from_str(text)?;
    state.validate()?;
    Ok(state)
}

pub fn save_checkpoint(state: &MixtureState, path: &Path) -> Result<()> {
    fs::write(path, to_yaml(state)?)?;
    info!(path = %path.display(), iteration = state.iteration(), "checkpoint written");
    Ok(())
}

pub fn load_checkpoint(path: &Path) -> Result<MixtureState> {
    let text = fs::read_to_string(path)?;
    let state: MixtureState = serde_yaml::from_str(&text).map_err(|source| Error::FileParsing {
        path: path.to_path_buf(),
        source,
    })?;
    state.validate()?;
    info!(path = %path.display(), iteration = state.iteration(), "checkpoint loaded");
    Ok(state)
}
