//! Running move statistics per leg.

use serde::Serialize;
use tracing::{info, warn};

use super::sampler::{MoveOutcome, MoveRecord};

/// Acceptance below this rate is reported as a warning.
const LOW_ACCEPTANCE: f64 = 0.01;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct LegStatistics {
    pub attempted: u64,
    pub accepted: u64,
    pub overlaps: u64,
    /// Iterations spent in each state after the move.
    pub visits: Vec<u64>,
}

impl LegStatistics {
    fn new(n_states: usize) -> Self {
        Self {
            visits: vec![0; n_states],
            ..Self::default()
        }
    }

    pub fn acceptance_rate(&self) -> f64 {
        if self.attempted == 0 {
            return 0.0;
        }
        self.accepted as f64 / self.attempted as f64
    }

    /// Fraction of iterations spent in each state.
    pub fn occupancy(&self) -> Vec<f64> {
        let total: u64 = self.visits.iter().sum();
        if total == 0 {
            return vec![0.0; self.visits.len()];
        }
        self.visits.iter().map(|&v| v as f64 / total as f64).collect()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SamplerStatistics {
    legs: Vec<LegStatistics>,
}

impl SamplerStatistics {
    pub fn new(n_legs: usize, n_states: usize) -> Self {
        Self {
            legs: vec![LegStatistics::new(n_states); n_legs],
        }
    }

    pub fn leg(&self, leg: usize) -> &LegStatistics {
        &self.legs[leg]
    }

    pub fn legs(&self) -> &[LegStatistics] {
        &self.legs
    }

    pub fn record(&mut self, record: &MoveRecord) {
        let leg = &mut self.legs[record.leg];
        leg.attempted += 1;
        match record.outcome {
            MoveOutcome::Accepted => leg.accepted += 1,
            MoveOutcome::Overlap { .. } => leg.overlaps += 1,
            MoveOutcome::Rejected => {}
        }
        leg.visits[record.occupied()] += 1;
    }

    /// Log a summary per leg; warns when a leg barely accepts anything.
    pub fn report(&self) {
        for (i, leg) in self.legs.iter().enumerate() {
            let rate = leg.acceptance_rate();
            info!(
                leg = i,
                attempted = leg.attempted,
                accepted = leg.accepted,
                overlaps = leg.overlaps,
                acceptance = rate,
                "move statistics"
            );
            if leg.attempted > 0 && rate < LOW_ACCEPTANCE {
                warn!(
                    leg = i,
                    acceptance = rate,
                    "acceptance rate below {:.0}%, consider a longer switching protocol",
                    LOW_ACCEPTANCE * 100.0
                );
            }
        }
    }
}
