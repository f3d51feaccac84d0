//! Teamplan - capacity-constrained delivery planning
//!
//! Teamplan turns a team's prioritized backlog of epics, stories and role
//! phases into a deterministic day-by-day plan that respects member capacity,
//! the SA -> DEV -> QA pipeline, cross-story dependencies and WIP limits.

pub mod calendar;
pub mod competency;
pub mod domain;
pub mod error;
pub mod planner;
pub mod snapshot;

pub use error::{PlanError, Result};
