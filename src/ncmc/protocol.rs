//! Alchemical switching protocols.
//!
//! A protocol is validated once at setup and cannot be built any other way. The
//! reverse of every stage must be the exact time-reverse of the forward stage,
//! otherwise the acceptance ratio is biased; a mismatch is a configuration error.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwitchingScheme {
    /// One combined switch from the old to the new molecule.
    #[default]
    Hybrid,
    /// Delete the old molecule, regrow, then insert the new one.
    TwoStage,
}

/// A validated switching protocol.
#[derive(Clone, Debug, PartialEq)]
pub struct Protocol {
    stages: Stages,
}

#[derive(Clone, Debug, PartialEq)]
enum Stages {
    Hybrid { lambdas: Vec<f64> },
    TwoStage { delete: Vec<f64>, insert: Vec<f64> },
}

/// Borrowed schedules of a [`Protocol`].
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Schedules<'a> {
    Hybrid(&'a [f64]),
    TwoStage {
        delete: &'a [f64],
        insert: &'a [f64],
    },
}

/// λᵢ = i/n for i = 0..=n.
fn linear(n_steps: usize) -> Vec<f64> {
    (0..=n_steps).map(|i| i as f64 / n_steps as f64).collect()
}

fn reversed(lambdas: &[f64]) -> Vec<f64> {
    lambdas.iter().rev().copied().collect()
}

/// Check a monotone schedule running from `start` to `end`.
fn check_schedule(name: &str, lambdas: &[f64], start: f64, end: f64) -> Result<()> {
    if lambdas.len() < 2 {
        return Err(Error::Protocol(format!("{} schedule needs at least two points", name)));
    }
    if lambdas.iter().any(|l| !(0.0..=1.0).contains(l)) {
        return Err(Error::Protocol(format!("{} schedule leaves [0, 1]", name)));
    }
    if lambdas[0] != start || lambdas[lambdas.len() - 1] != end {
        return Err(Error::Protocol(format!(
            "{} schedule must run from {} to {}",
            name, start, end
        )));
    }
    let increasing = end > start;
    let monotone = lambdas.windows(2).all(|w| if increasing { w[1] > w[0] } else { w[1] < w[0] });
    if !monotone {
        return Err(Error::Protocol(format!("{} schedule is not strictly monotone", name)));
    }
    Ok(())
}

impl Protocol {
    /// Evenly spaced protocol for `scheme` with `n_steps` perturbations per stage.
    pub fn linear(scheme: SwitchingScheme, n_steps: usize) -> Result<Self> {
        if n_steps == 0 {
            return Err(Error::Protocol("protocol needs at least one step".to_string()));
        }
        match scheme {
            SwitchingScheme::Hybrid => Self::hybrid(linear(n_steps), None),
            SwitchingScheme::TwoStage => {
                let insert = linear(n_steps);
                Self::two_stage(reversed(&insert), insert)
            }
        }
    }

    /// Hybrid protocol; `reverse`, when given, must be `forward` reversed.
    pub fn hybrid(forward: Vec<f64>, reverse: Option<Vec<f64>>) -> Result<Self> {
        check_schedule("hybrid", &forward, 0.0, 1.0)?;
        if let Some(reverse) = reverse {
            if reverse != reversed(&forward) {
                return Err(Error::Protocol(
                    "reverse hybrid schedule is not the time-reverse of the forward schedule"
                        .to_string(),
                ));
            }
        }
        Ok(Self {
            stages: Stages::Hybrid { lambdas: forward },
        })
    }

    /// Two-stage protocol. The reverse move deletes the new molecule with the
    /// same `delete` schedule, so `delete` must be `insert` reversed.
    pub fn two_stage(delete: Vec<f64>, insert: Vec<f64>) -> Result<Self> {
        check_schedule("delete", &delete, 1.0, 0.0)?;
        check_schedule("insert", &insert, 0.0, 1.0)?;
        if delete != reversed(&insert) {
            return Err(Error::Protocol(
                "delete schedule is not the time-reverse of the insert schedule".to_string(),
            ));
        }
        Ok(Self {
            stages: Stages::TwoStage { delete, insert },
        })
    }

    pub fn scheme(&self) -> SwitchingScheme {
        match &self.stages {
            Stages::Hybrid { .. } => SwitchingScheme::Hybrid,
            Stages::TwoStage { .. } => SwitchingScheme::TwoStage,
        }
    }

    pub fn schedules(&self) -> Schedules<'_> {
        match &self.stages {
            Stages::Hybrid { lambdas } => Schedules::Hybrid(lambdas),
            Stages::TwoStage { delete, insert } => Schedules::TwoStage { delete, insert },
        }
    }

    /// Number of perturbation steps in one move (both stages for two-stage).
    pub fn n_steps(&self) -> usize {
        match &self.stages {
            Stages::Hybrid { lambdas } => lambdas.len().saturating_sub(1),
            Stages::TwoStage { delete, insert } => {
                delete.len().saturating_sub(1) + insert.len().saturating_sub(1)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_hybrid() {
        let protocol = Protocol::linear(SwitchingScheme::Hybrid, 4).unwrap();
        assert_eq!(protocol.schedules(), Schedules::Hybrid(&[0.0, 0.25, 0.5, 0.75, 1.0]));
        assert_eq!(protocol.n_steps(), 4);
        assert_eq!(protocol.scheme(), SwitchingScheme::Hybrid);
    }

    #[test]
    fn test_linear_two_stage_is_symmetric() {
        let protocol = Protocol::linear(SwitchingScheme::TwoStage, 3).unwrap();
        match protocol.schedules() {
            Schedules::TwoStage { delete, insert } => {
                assert_eq!(delete.first(), Some(&1.0));
                assert_eq!(delete.last(), Some(&0.0));
                assert_eq!(delete, reversed(insert).as_slice());
            }
            _ => panic!("expected two-stage protocol"),
        }
        assert_eq!(protocol.n_steps(), 6);
    }

    #[test]
    fn test_asymmetric_reverse_is_rejected() {
        let forward = vec![0.0, 0.3, 1.0];
        assert!(Protocol::hybrid(forward.clone(), Some(vec![1.0, 0.3, 0.0])).is_ok());
        let err = Protocol::hybrid(forward, Some(vec![1.0, 0.7, 0.0])).unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));

        let insert = vec![0.0, 0.5, 1.0];
        assert!(Protocol::two_stage(vec![1.0, 0.4, 0.0], insert).is_err());
    }

    #[test]
    fn test_malformed_schedules() {
        assert!(Protocol::linear(SwitchingScheme::Hybrid, 0).is_err());
        assert!(Protocol::hybrid(vec![0.0], None).is_err());
        assert!(Protocol::hybrid(vec![0.1, 1.0], None).is_err());
        assert!(Protocol::hybrid(vec![0.0, 0.6, 0.4, 1.0], None).is_err());
        assert!(Protocol::hybrid(vec![0.0, 0.5, 0.5, 1.0], None).is_err());
        assert!(Protocol::hybrid(vec![0.0, 1.5, 1.0], None).is_err());
        assert!(Protocol::two_stage(vec![0.0, 1.0], vec![0.0, 1.0]).is_err());
        assert!(Protocol::hybrid(vec![], None).is_err());
        assert!(Protocol::two_stage(vec![], vec![]).is_err());
    }
}
