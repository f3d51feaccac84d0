//! Unified planning engine.
//!
//! Turns one team's prioritized backlog into a day-by-day execution plan:
//! - **Dependency graph**: blockedBy edges inside the batch, cycles broken
//! - **Allocator**: role phases booked onto members within daily capacity,
//!   effort scaled by competency
//! - **WIP queue**: decides when each epic may start taking capacity
//! - **Aggregator**: stories and epics rolled up, utilization and alerts
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use teamplan::calendar::WeekendCalendar;
//! use teamplan::planner::PlanningEngine;
//! use teamplan::snapshot::SnapshotDocument;
//!
//! let document = SnapshotDocument::load("snapshot.yml")?;
//! let engine = PlanningEngine::new(Arc::new(document), Arc::new(WeekendCalendar));
//! let plan = engine.calculate_plan("alpha", chrono::Local::now().date_naive())?;
//! ```

pub mod aggregate;
pub mod allocator;
mod config;
mod engine;
pub mod graph;
pub mod policy;
mod result;
pub mod wip;

pub use config::{
    DEFAULT_COUNTRY, DEFAULT_HORIZON_DAYS, DEFAULT_IDLE_THRESHOLD_PERCENT, DEFAULT_OVERLOAD_THRESHOLD_PERCENT,
    DEFAULT_WIP_LIMIT, PlannerConfig,
};
pub use engine::PlanningEngine;
pub use policy::{
    AssigneeSelector, Candidate, Confidence, ConfidencePolicy, CycleBreakPolicy, CycleEdge, LeastLoaded,
    LowestScoreSource, WarningConfidence,
};
pub use result::{
    AlertKind, AssigneeUtilization, PhaseSchedule, PlannedEpic, PlannedStory, PlanningResult, QueuedEpic,
    RoleAggregate, RoleUtilization, StoryPhases, WipAlert, WipReport,
};
