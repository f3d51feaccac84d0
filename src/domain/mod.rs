//! Domain types for teamplan
//!
//! This module contains the planning inputs mirrored from the tracker:
//! - Team / TeamMember / WipLimits: who can do the work and how much at once
//! - Epic / WorkItem / PhaseWork: what work exists, per pipeline role
//! - PlanningWarning: non-fatal conditions reported with a plan

pub mod member;
pub mod warning;
pub mod work_item;

pub use member::{Role, Team, TeamMember, WipLimits};
pub use warning::{PlanningWarning, WarningKind};
pub use work_item::{
    Epic, PhaseEstimates, PhaseWork, SECONDS_PER_HOUR, WorkItem, compare_keys, compare_priority,
};
