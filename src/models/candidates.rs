//! The fixed, ordered set of candidate molecular states explored in one run.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{Error, Result};

/// Ordered collection of candidate state identifiers.
///
/// The order is fixed for the lifetime of a run: every per-state vector in the
/// sampler (ζ, π, visit counts) is indexed by position in this set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CandidateSet {
    ids: Vec<String>,
}

impl CandidateSet {
    pub fn new<I, S>(ids: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ids: Vec<String> = ids.into_iter().map(Into::into).collect();
        if ids.is_empty() {
            return Err(Error::Config("candidate set is empty".to_string()));
        }
        let mut seen = HashSet::with_capacity(ids.len());
        for id in &ids {
            if !seen.insert(id.as_str()) {
                return Err(Error::Config(format!("duplicate candidate identifier '{}'", id)));
            }
        }
        Ok(Self { ids })
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn id(&self, index: usize) -> Option<&str> {
        self.ids.get(index).map(String::as_str)
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.ids.iter().position(|candidate| candidate == id)
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    /// Check that `index` names a candidate.
    pub fn check(&self, index: usize) -> Result<()> {
        if index < self.ids.len() {
            Ok(())
        } else {
            Err(Error::UnknownCandidate {
                index,
                len: self.ids.len(),
            })
        }
    }
}
