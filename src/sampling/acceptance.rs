//! Acceptance assembly for expanded-ensemble NCMC moves.
//!
//! Every term is a log-probability in reduced units. The assembled value is the
//! log of the super-detailed-balance acceptance ratio.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// The log-probability components of one move, tagged by switching scheme.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "scheme", rename_all = "snake_case")]
pub enum AcceptanceTerms {
    Hybrid {
        log_p_initial: f64,
        log_p_final: f64,
        /// log P(old | new) − log P(new | old) for the chemical proposal.
        log_p_chemical: f64,
        log_p_geometry_forward: f64,
        log_p_geometry_reverse: f64,
        log_p_work: f64,
        log_p_energy: f64,
    },
    TwoStage {
        log_p_initial: f64,
        log_p_final: f64,
        log_p_chemical: f64,
        log_p_delete_work: f64,
        log_p_delete_energy: f64,
        log_p_geometry_forward: f64,
        log_p_geometry_reverse: f64,
        log_p_insert_work: f64,
        log_p_insert_energy: f64,
    },
}

impl AcceptanceTerms {
    /// log of the acceptance ratio.
    pub fn log_p_accept(&self) -> f64 {
        match *self {
            AcceptanceTerms::Hybrid {
                log_p_initial,
                log_p_final,
                log_p_chemical,
                log_p_geometry_forward,
                log_p_geometry_reverse,
                log_p_work,
                log_p_energy,
            } => {
                (log_p_final - log_p_initial)
                    + log_p_chemical
                    + (log_p_geometry_reverse - log_p_geometry_forward)
                    + log_p_work
                    + log_p_energy
            }
            AcceptanceTerms::TwoStage {
                log_p_initial,
                log_p_final,
                log_p_chemical,
                log_p_delete_work,
                log_p_delete_energy,
                log_p_geometry_forward,
                log_p_geometry_reverse,
                log_p_insert_work,
                log_p_insert_energy,
            } => {
                (log_p_final - log_p_initial)
                    + log_p_chemical
                    + log_p_delete_work
                    + log_p_delete_energy
                    + (log_p_geometry_reverse - log_p_geometry_forward)
                    + log_p_insert_work
                    + log_p_insert_energy
            }
        }
    }
}

/// Metropolis test: accept with probability min(1, exp(log_p_accept)).
/// NaN is always rejected.
pub fn metropolis<R: Rng + ?Sized>(log_p_accept: f64, rng: &mut R) -> bool {
    if log_p_accept.is_nan() {
        return false;
    }
    if log_p_accept >= 0.0 {
        return true;
    }
    rng.gen::<f64>().ln() < log_p_accept
}
