//! Hours-of-service duty planning
//!
//! `simulator` and `day_split` are the pure core: no I/O, no shared state.
//! `planner` resolves locations and the route before running them.

pub mod day_split;
pub mod error;
pub mod planner;
pub mod rules;
pub mod simulator;

pub use error::PlanError;
pub use planner::{assemble, ResolvedTrip, TripPlanner};
pub use rules::HosRules;
