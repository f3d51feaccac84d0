//! Work items: epics and the stories beneath them
//!
//! Estimates and logged time arrive from the tracker in seconds, per pipeline
//! role. A role's phase is required when it carries an estimate or an explicit
//! `needed` flag.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use super::member::Role;

pub const SECONDS_PER_HOUR: f64 = 3600.0;

/// Estimate and logged time for one role's phase of a story
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PhaseWork {
    pub estimate_seconds: u64,
    pub logged_seconds: u64,
    /// Phase is required even without an estimate
    pub needed: bool,
}

impl PhaseWork {
    pub fn estimated(hours: f64) -> Self {
        Self {
            estimate_seconds: (hours * SECONDS_PER_HOUR).round() as u64,
            ..Self::default()
        }
    }

    pub fn with_logged(mut self, hours: f64) -> Self {
        self.logged_seconds = (hours * SECONDS_PER_HOUR).round() as u64;
        self
    }

    /// A phase flagged as needed but never estimated
    pub fn needed() -> Self {
        Self {
            needed: true,
            ..Self::default()
        }
    }

    pub fn is_required(&self) -> bool {
        self.needed || self.estimate_seconds > 0
    }

    pub fn estimate_hours(&self) -> f64 {
        self.estimate_seconds as f64 / SECONDS_PER_HOUR
    }

    /// Estimate not yet covered by logged time, in hours
    pub fn remaining_hours(&self) -> f64 {
        self.estimate_seconds.saturating_sub(self.logged_seconds) as f64 / SECONDS_PER_HOUR
    }
}

/// Per-role phase work of a story
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseEstimates {
    pub sa: PhaseWork,
    pub dev: PhaseWork,
    pub qa: PhaseWork,
}

impl PhaseEstimates {
    pub fn get(&self, role: Role) -> &PhaseWork {
        match role {
            Role::Sa => &self.sa,
            Role::Dev => &self.dev,
            Role::Qa => &self.qa,
        }
    }

    pub fn get_mut(&mut self, role: Role) -> &mut PhaseWork {
        match role {
            Role::Sa => &mut self.sa,
            Role::Dev => &mut self.dev,
            Role::Qa => &mut self.qa,
        }
    }

    /// Required roles in pipeline order
    pub fn required_roles(&self) -> Vec<Role> {
        Role::PIPELINE
            .into_iter()
            .filter(|r| self.get(*r).is_required())
            .collect()
    }

    pub fn total_estimate_seconds(&self) -> u64 {
        Role::PIPELINE.iter().map(|r| self.get(*r).estimate_seconds).sum()
    }

    pub fn total_logged_seconds(&self) -> u64 {
        Role::PIPELINE.iter().map(|r| self.get(*r).logged_seconds).sum()
    }
}

/// A story in the tracker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkItem {
    pub key: String,
    #[serde(default)]
    pub summary: String,
    pub status: String,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub flagged: bool,
    /// Externally computed urgency, higher first
    #[serde(default)]
    pub auto_score: f64,
    #[serde(default)]
    pub phases: PhaseEstimates,
    /// Component tags used for competency matching
    #[serde(default)]
    pub components: Vec<String>,
    #[serde(default)]
    pub blocked_by: Vec<String>,
    #[serde(default)]
    pub epic_key: Option<String>,
}

impl WorkItem {
    pub fn new(key: impl Into<String>, status: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            summary: key.clone(),
            key,
            status: status.into(),
            priority: None,
            flagged: false,
            auto_score: 0.0,
            phases: PhaseEstimates::default(),
            components: Vec::new(),
            blocked_by: Vec::new(),
            epic_key: None,
        }
    }

    pub fn with_phase(mut self, role: Role, work: PhaseWork) -> Self {
        *self.phases.get_mut(role) = work;
        self
    }

    pub fn with_score(mut self, auto_score: f64) -> Self {
        self.auto_score = auto_score;
        self
    }

    pub fn blocked_by(mut self, key: impl Into<String>) -> Self {
        self.blocked_by.push(key.into());
        self
    }

    pub fn with_components(mut self, components: &[&str]) -> Self {
        self.components = components.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn flagged(mut self) -> Self {
        self.flagged = true;
        self
    }
}

/// An epic and its child stories
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Epic {
    pub key: String,
    #[serde(default)]
    pub summary: String,
    pub status: String,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub auto_score: f64,
    pub team_id: String,
    #[serde(default)]
    pub stories: Vec<WorkItem>,
}

impl Epic {
    pub fn new(key: impl Into<String>, team_id: impl Into<String>, status: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            summary: key.clone(),
            key,
            status: status.into(),
            due_date: None,
            auto_score: 0.0,
            team_id: team_id.into(),
            stories: Vec::new(),
        }
    }

    pub fn with_score(mut self, auto_score: f64) -> Self {
        self.auto_score = auto_score;
        self
    }

    pub fn with_due_date(mut self, due: NaiveDate) -> Self {
        self.due_date = Some(due);
        self
    }

    /// Attach a story, stamping it with this epic's key
    pub fn with_story(mut self, mut story: WorkItem) -> Self {
        story.epic_key = Some(self.key.clone());
        self.stories.push(story);
        self
    }
}

/// Natural ordering for tracker keys: `PROJ-9` sorts before `PROJ-10`.
pub fn compare_keys(a: &str, b: &str) -> Ordering {
    fn split(key: &str) -> (&str, Option<u64>) {
        match key.rsplit_once('-') {
            Some((prefix, num)) => match num.parse::<u64>() {
                Ok(n) => (prefix, Some(n)),
                Err(_) => (key, None),
            },
            None => (key, None),
        }
    }

    let (pa, na) = split(a);
    let (pb, nb) = split(b);
    pa.cmp(pb)
        .then_with(|| match (na, nb) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => Ordering::Equal,
        })
        .then_with(|| a.cmp(b))
}

/// Urgency order: score descending, then natural key ascending.
pub fn compare_priority(score_a: f64, key_a: &str, score_b: f64, key_b: &str) -> Ordering {
    score_b.total_cmp(&score_a).then_with(|| compare_keys(key_a, key_b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_required_by_estimate_or_flag() {
        assert!(PhaseWork::estimated(4.0).is_required());
        assert!(PhaseWork::needed().is_required());
        assert!(!PhaseWork::default().is_required());
    }

    #[test]
    fn test_phase_remaining_hours() {
        let work = PhaseWork::estimated(10.0).with_logged(4.0);
        assert_eq!(work.estimate_hours(), 10.0);
        assert_eq!(work.remaining_hours(), 6.0);

        let over = PhaseWork::estimated(2.0).with_logged(5.0);
        assert_eq!(over.remaining_hours(), 0.0);
    }

    #[test]
    fn test_required_roles_in_pipeline_order() {
        let story = WorkItem::new("P-1", "To Do")
            .with_phase(Role::Qa, PhaseWork::estimated(2.0))
            .with_phase(Role::Sa, PhaseWork::needed());
        assert_eq!(story.phases.required_roles(), vec![Role::Sa, Role::Qa]);
    }

    #[test]
    fn test_phase_totals() {
        let story = WorkItem::new("P-1", "To Do")
            .with_phase(Role::Dev, PhaseWork::estimated(2.0).with_logged(1.0))
            .with_phase(Role::Qa, PhaseWork::estimated(1.0));
        assert_eq!(story.phases.total_estimate_seconds(), 10800);
        assert_eq!(story.phases.total_logged_seconds(), 3600);
    }

    #[test]
    fn test_epic_with_story_sets_parent() {
        let epic = Epic::new("E-1", "alpha", "In Progress").with_story(WorkItem::new("P-1", "To Do"));
        assert_eq!(epic.stories[0].epic_key.as_deref(), Some("E-1"));
    }

    #[test]
    fn test_compare_keys_natural() {
        assert_eq!(compare_keys("PROJ-9", "PROJ-10"), Ordering::Less);
        assert_eq!(compare_keys("ABC-10", "PROJ-1"), Ordering::Less);
        assert_eq!(compare_keys("PROJ-3", "PROJ-3"), Ordering::Equal);
        assert_eq!(compare_keys("ALPHA", "PROJ-1"), Ordering::Less);
    }

    #[test]
    fn test_compare_priority_score_first() {
        assert_eq!(compare_priority(90.0, "P-2", 10.0, "P-1"), Ordering::Less);
        assert_eq!(compare_priority(10.0, "P-2", 10.0, "P-1"), Ordering::Greater);
    }

    #[test]
    fn test_story_deserializes_with_defaults() {
        let story: WorkItem = serde_json::from_str(
            r#"{"key":"P-1","status":"To Do","phases":{"dev":{"estimateSeconds":7200}},"blockedBy":["P-0"]}"#,
        )
        .unwrap();
        assert_eq!(story.phases.dev.estimate_seconds, 7200);
        assert_eq!(story.blocked_by, vec!["P-0".to_string()]);
        assert!(!story.flagged);
    }
}
