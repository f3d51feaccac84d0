//! Planner configuration.
//!
//! Defaults:
//! - Horizon: 1095 calendar days (three years) per allocation walk
//! - Country: US, when a team declares none
//! - Epic WIP limit: 3, when a team declares none
//! - Idle below 20% role utilization, overload at 90% and above

use serde::{Deserialize, Serialize};

use crate::error::{PlanError, Result};

/// Calendar days an allocation walk may cover before giving up.
pub const DEFAULT_HORIZON_DAYS: u32 = 1095;
/// Epic WIP limit for teams that declare none.
pub const DEFAULT_WIP_LIMIT: u32 = 3;
pub const DEFAULT_COUNTRY: &str = "US";
pub const DEFAULT_IDLE_THRESHOLD_PERCENT: f64 = 20.0;
pub const DEFAULT_OVERLOAD_THRESHOLD_PERCENT: f64 = 90.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    pub horizon_days: u32,
    pub default_country: String,
    /// Statuses that count as done (case-insensitive)
    pub done_statuses: Vec<String>,
    /// Epic statuses left out of planning altogether (case-insensitive)
    pub excluded_statuses: Vec<String>,
    pub default_wip_limit: u32,
    pub idle_threshold_percent: f64,
    pub overload_threshold_percent: f64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            horizon_days: DEFAULT_HORIZON_DAYS,
            default_country: DEFAULT_COUNTRY.to_string(),
            done_statuses: ["Done", "Closed", "Resolved", "Cancelled"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            excluded_statuses: Vec::new(),
            default_wip_limit: DEFAULT_WIP_LIMIT,
            idle_threshold_percent: DEFAULT_IDLE_THRESHOLD_PERCENT,
            overload_threshold_percent: DEFAULT_OVERLOAD_THRESHOLD_PERCENT,
        }
    }
}

impl PlannerConfig {
    pub fn with_horizon_days(mut self, days: u32) -> Self {
        self.horizon_days = days;
        self
    }

    pub fn with_default_wip_limit(mut self, limit: u32) -> Self {
        self.default_wip_limit = limit;
        self
    }

    pub fn is_done(&self, status: &str) -> bool {
        self.done_statuses.iter().any(|s| s.eq_ignore_ascii_case(status.trim()))
    }

    pub fn is_excluded(&self, status: &str) -> bool {
        self.excluded_statuses
            .iter()
            .any(|s| s.eq_ignore_ascii_case(status.trim()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.horizon_days == 0 {
            return Err(PlanError::InvalidConfig("horizon_days must be positive".to_string()));
        }
        if self.default_wip_limit == 0 {
            return Err(PlanError::InvalidConfig("default_wip_limit must be positive".to_string()));
        }
        let in_range = |v: f64| (0.0..=100.0).contains(&v);
        if !in_range(self.idle_threshold_percent) || !in_range(self.overload_threshold_percent) {
            return Err(PlanError::InvalidConfig("thresholds must be within 0..=100".to_string()));
        }
        if self.idle_threshold_percent >= self.overload_threshold_percent {
            return Err(PlanError::InvalidConfig(
                "idle_threshold_percent must be below overload_threshold_percent".to_string(),
            ));
        }
        Ok(())
    }
}
