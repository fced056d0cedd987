//! Analysis module - free-energy estimators for switching work.

mod estimators;

pub use estimators::{bar_estimate, exp_estimate};
