//! Partitioned coordinate sets.
//!
//! A configuration always splits its atoms into three blocks:
//! - core atoms shared by every candidate molecule,
//! - old-specific atoms owned by the molecule the chain currently holds,
//! - new-specific atoms owned by a proposed molecule (empty outside a move).
//!
//! The view conversions consume `self`, so atoms change owner instead of being
//! shared between the old and new molecule views.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    core: Vec<Vector3<f64>>,
    old_specific: Vec<Vector3<f64>>,
    #[serde(default)]
    new_specific: Vec<Vector3<f64>>,
}

/// Which block a flat atom index falls into.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Block {
    Core,
    OldSpecific,
    NewSpecific,
}

impl Configuration {
    /// Configuration of a single molecule: `specific` is owned by that molecule.
    pub fn new(core: Vec<Vector3<f64>>, specific: Vec<Vector3<f64>>) -> Self {
        Self {
            core,
            old_specific: specific,
            new_specific: Vec::new(),
        }
    }

    pub fn core(&self) -> &[Vector3<f64>] {
        &self.core
    }

    pub fn old_specific(&self) -> &[Vector3<f64>] {
        &self.old_specific
    }

    pub fn new_specific(&self) -> &[Vector3<f64>] {
        &self.new_specific
    }

    /// Whether this configuration carries both molecules (a hybrid view).
    pub fn is_hybrid(&self) -> bool {
        !self.new_specific.is_empty()
    }

    pub fn n_atoms(&self) -> usize {
        self.core.len() + self.old_specific.len() + self.new_specific.len()
    }

    /// Attach freshly proposed atoms for the incoming molecule.
    pub fn with_new_specific(mut self, new_specific: Vec<Vector3<f64>>) -> Self {
        self.new_specific = new_specific;
        self
    }

    /// Drop the old molecule; the new-specific atoms become the owned block.
    pub fn into_new_view(self) -> Self {
        Self {
            core: self.core,
            old_specific: self.new_specific,
            new_specific: Vec::new(),
        }
    }

    /// Drop the incoming molecule and keep the old one.
    pub fn into_old_view(self) -> Self {
        Self {
            core: self.core,
            old_specific: self.old_specific,
            new_specific: Vec::new(),
        }
    }

    /// Split into (core, old-specific, new-specific).
    pub fn into_parts(self) -> (Vec<Vector3<f64>>, Vec<Vector3<f64>>, Vec<Vector3<f64>>) {
        (self.core, self.old_specific, self.new_specific)
    }

    /// Map a flat atom index (core, then old, then new) to its block and offset.
    pub fn locate(&self, index: usize) -> Option<(Block, usize)> {
        let n_core = self.core.len();
        let n_old = self.old_specific.len();
        if index < n_core {
            Some((Block::Core, index))
        } else if index < n_core + n_old {
            Some((Block::OldSpecific, index - n_core))
        } else if index < self.n_atoms() {
            Some((Block::NewSpecific, index - n_core - n_old))
        } else {
            None
        }
    }

    pub fn position(&self, index: usize) -> Option<Vector3<f64>> {
        match self.locate(index)? {
            (Block::Core, i) => Some(self.core[i]),
            (Block::OldSpecific, i) => Some(self.old_specific[i]),
            (Block::NewSpecific, i) => Some(self.new_specific[i]),
        }
    }

    pub fn position_mut(&mut self, index: usize) -> Option<&mut Vector3<f64>> {
        match self.locate(index)? {
            (Block::Core, i) => Some(&mut self.core[i]),
            (Block::OldSpecific, i) => Some(&mut self.old_specific[i]),
            (Block::NewSpecific, i) => Some(&mut self.new_specific[i]),
        }
    }
}
