//! Planning result types
//!
//! The produced plan, as consumed by the API layer and the simulation
//! harness. All maps are ordered so a serialized plan is byte-stable.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use crate::domain::{PlanningWarning, Role};
use crate::error::Result;
use crate::planner::policy::Confidence;

/// Where and by whom one role's phase of a story gets done
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseSchedule {
    pub assignee_id: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    /// Allocated hours, or the unallocated estimate when `no_capacity`
    pub hours: f64,
    pub no_capacity: bool,
}

impl PhaseSchedule {
    pub fn no_capacity(hours: f64) -> Self {
        Self {
            assignee_id: None,
            start_date: None,
            end_date: None,
            hours,
            no_capacity: true,
        }
    }

    /// A zero-length phase pinned to `day`
    pub fn zero_duration(day: NaiveDate) -> Self {
        Self {
            assignee_id: None,
            start_date: Some(day),
            end_date: Some(day),
            hours: 0.0,
            no_capacity: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoryPhases {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sa: Option<PhaseSchedule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dev: Option<PhaseSchedule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qa: Option<PhaseSchedule>,
}

impl StoryPhases {
    pub fn get(&self, role: Role) -> Option<&PhaseSchedule> {
        match role {
            Role::Sa => self.sa.as_ref(),
            Role::Dev => self.dev.as_ref(),
            Role::Qa => self.qa.as_ref(),
        }
    }

    pub fn set(&mut self, role: Role, schedule: PhaseSchedule) {
        let slot = match role {
            Role::Sa => &mut self.sa,
            Role::Dev => &mut self.dev,
            Role::Qa => &mut self.qa,
        };
        *slot = Some(schedule);
    }

    /// Scheduled phases in pipeline order
    pub fn iter(&self) -> impl Iterator<Item = (Role, &PhaseSchedule)> {
        Role::PIPELINE
            .into_iter()
            .filter_map(move |role| self.get(role).map(|p| (role, p)))
    }

    pub fn start_date(&self) -> Option<NaiveDate> {
        self.iter().filter_map(|(_, p)| p.start_date).min()
    }

    pub fn end_date(&self) -> Option<NaiveDate> {
        self.iter().filter_map(|(_, p)| p.end_date).max()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedStory {
    pub story_key: String,
    pub summary: String,
    pub status: String,
    pub auto_score: f64,
    pub phases: StoryPhases,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub total_estimate_seconds: u64,
    pub total_logged_seconds: u64,
    pub progress_percent: f64,
    pub blocked_by: Vec<String>,
    pub warnings: Vec<PlanningWarning>,
}

/// Per-role rollup inside an epic
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleAggregate {
    pub hours: f64,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedEpic {
    pub epic_key: String,
    pub summary: String,
    pub auto_score: f64,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub stories: Vec<PlannedStory>,
    pub phase_aggregation: BTreeMap<Role, RoleAggregate>,
    pub status: String,
    pub due_date: Option<NaiveDate>,
    pub progress_percent: f64,
    pub stories_total: usize,
    pub stories_active: usize,
    pub confidence: Confidence,
    /// Positive means projected late
    pub due_date_delta_days: Option<i64>,
    /// When the epic got a WIP slot
    pub admitted_on: Option<NaiveDate>,
    pub queue_position: Option<u32>,
    pub queued_until: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssigneeUtilization {
    pub display_name: String,
    pub role: Role,
    pub total_hours: f64,
    pub effective_hours_per_day: f64,
    pub daily_load: BTreeMap<NaiveDate, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedEpic {
    pub epic_key: String,
    pub queue_position: u32,
    /// When the slot this epic takes is expected to free
    pub queued_until: NaiveDate,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleUtilization {
    pub limit: Option<u32>,
    pub members: usize,
    pub peak_active: u32,
    pub capacity_hours: f64,
    pub assigned_hours: f64,
    pub unallocated_hours: f64,
    pub utilization_percent: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlertKind {
    Idle,
    Overload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WipAlert {
    pub kind: AlertKind,
    pub role: Role,
    pub message: String,
}

/// WIP and queue telemetry for one team
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WipReport {
    pub team_limit: u32,
    /// Epics admitted at the planning date, in admission order
    pub admitted: Vec<String>,
    pub queued: Vec<QueuedEpic>,
    pub peak_concurrent_epics: u32,
    pub roles: BTreeMap<Role, RoleUtilization>,
    pub alerts: Vec<WipAlert>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanningResult {
    pub team_id: String,
    pub planning_date: NaiveDate,
    pub epics: Vec<PlannedEpic>,
    pub warnings: Vec<PlanningWarning>,
    pub assignee_utilization: BTreeMap<String, AssigneeUtilization>,
    pub wip: WipReport,
}

impl PlanningResult {
    pub fn epic(&self, key: &str) -> Option<&PlannedEpic> {
        self.epics.iter().find(|e| e.epic_key == key)
    }

    pub fn story(&self, key: &str) -> Option<&PlannedStory> {
        self.epics
            .iter()
            .flat_map(|e| e.stories.iter())
            .find(|s| s.story_key == key)
    }

    pub fn stories(&self) -> impl Iterator<Item = &PlannedStory> {
        self.epics.iter().flat_map(|e| e.stories.iter())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// SHA-256 over the canonical JSON; equal plans share a fingerprint
    pub fn fingerprint(&self) -> Result<String> {
        let bytes = serde_json::to_vec(self)?;
        Ok(hex::encode(Sha256::digest(&bytes)))
    }
}
