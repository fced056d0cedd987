//! Mixture state shared by concurrent replicas.
//!
//! Reads take a snapshot under the lock; the update-and-reanchor step is
//! serialized so that no two replicas interleave writes to ζ.

use parking_lot::Mutex;
use std::sync::Arc;

use super::mixture::MixtureState;
use super::traits::MixtureHandle;
use crate::error::Result;

#[derive(Clone, Debug)]
pub struct SharedMixture {
    inner: Arc<Mutex<MixtureState>>,
}

impl SharedMixture {
    pub fn new(state: MixtureState) -> Self {
        Self {
            inner: Arc::new(Mutex::new(state)),
        }
    }

    /// Observe under the lock and return the resulting state.
    pub fn observe(&self, observed: &[usize]) -> Result<MixtureState> {
        let mut guard = self.inner.lock();
        let next = guard.observe(observed)?;
        *guard = next.clone();
        Ok(next)
    }
}

impl MixtureHandle for SharedMixture {
    fn bias(&self, leg: usize) -> Vec<f64> {
        self.inner.lock().bias(leg)
    }

    fn snapshot(&self) -> MixtureState {
        self.inner.lock().clone()
    }

    fn record(&mut self, observed: &[usize]) -> Result<u64> {
        let mut guard = self.inner.lock();
        *guard = guard.observe(observed)?;
        Ok(guard.iteration())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CandidateSet;
    use crate::sams::GainSchedule;
    use approx::assert_abs_diff_eq;
    use std::thread;

    #[test]
    fn test_concurrent_updates_are_serialized() {
        let candidates = CandidateSet::new(["a", "b", "c", "d"]).unwrap();
        let state = MixtureState::new(candidates, 0, 2, GainSchedule::Flat).unwrap();
        let shared = SharedMixture::new(state);

        thread::scope(|scope| {
            for replica in 0..4usize {
                let mut handle = shared.clone();
                scope.spawn(move || {
                    for step in 0..250usize {
                        let observed = [(replica + step) % 4, (replica * 3 + step) % 4];
                        handle.record(&observed).unwrap();
                    }
                });
            }
        });

        let final_state = shared.snapshot();
        assert_eq!(final_state.iteration(), 1000);
        assert!(final_state.check_invariants().is_ok());
        let total: f64 = final_state.pi().iter().sum();
        assert_abs_diff_eq!(total, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_observe_returns_stored_state() {
        let candidates = CandidateSet::new(["a", "b"]).unwrap();
        let state = MixtureState::new(candidates, 0, 1, GainSchedule::Flat).unwrap();
        let shared = SharedMixture::new(state);
        let next = shared.observe(&[1]).unwrap();
        assert_eq!(next, shared.snapshot());
        assert_eq!(shared.bias(0), next.bias(0));
    }

    #[test]
    fn test_failed_update_keeps_stored_state() {
        let candidates = CandidateSet::new(["a", "b"]).unwrap();
        let state = MixtureState::new(candidates, 0, 1, GainSchedule::Flat).unwrap();
        let mut shared = SharedMixture::new(state);
        shared.record(&[1]).unwrap();
        let before = shared.snapshot();
        assert!(shared.record(&[7]).is_err());
        assert!(shared.observe(&[0, 1]).is_err());
        assert_eq!(shared.snapshot(), before);
        // The lock is released on the error path.
        assert_eq!(shared.record(&[0]).unwrap(), 2);
    }
}
