//! SAMS module - gain schedules and the mixture weight tracker.

mod gain;
mod mixture;
mod shared;
mod traits;

pub use gain::GainSchedule;
pub use mixture::{log_sum_exp, MixtureState};
pub use shared::SharedMixture;
pub use traits::{BiasStore, MixtureHandle};
