//! Planning snapshots
//!
//! A snapshot is one consistent read of everything a planning run needs for a
//! team: the team and its members, the team's epics with their stories, and
//! the members' competency levels. The planner never reaches past the
//! snapshot, so a run is a pure function of it.
//!
//! - `TeamSnapshot`: the per-team input to one planning call
//! - `SnapshotProvider`: loads a `TeamSnapshot` by team id
//! - `ScoreProvider`: external autoScore lookup (the snapshot is one)
//! - `SnapshotDocument`: a whole-tracker export, loadable from YAML or JSON

mod document;

pub use document::SnapshotDocument;

use std::collections::BTreeSet;

use crate::competency::{CompetencyLevels, CompetencyMatrix, CompetencySource, MAX_LEVEL, MIN_LEVEL};
use crate::domain::{Epic, Team};
use crate::error::{PlanError, Result};

/// Loads planning input for one team
pub trait SnapshotProvider: Send + Sync {
    /// Fails with `PlanError::TeamNotFound` for unknown ids
    fn load_team(&self, team_id: &str) -> Result<TeamSnapshot>;
}

/// External priority lookup; `None` falls back to the snapshot value
pub trait ScoreProvider: Send + Sync {
    fn auto_score(&self, item_key: &str) -> Option<f64>;
}

/// Everything one planning run reads
#[derive(Debug, Clone, PartialEq)]
pub struct TeamSnapshot {
    pub team: Team,
    pub epics: Vec<Epic>,
    pub competencies: CompetencyMatrix,
}

impl TeamSnapshot {
    pub fn new(team: Team) -> Self {
        Self {
            team,
            epics: Vec::new(),
            competencies: CompetencyMatrix::new(),
        }
    }

    pub fn with_epic(mut self, epic: Epic) -> Self {
        self.epics.push(epic);
        self
    }

    pub fn with_competency(mut self, member_id: &str, component: &str, level: u8) -> Self {
        self.competencies
            .entry(member_id.to_string())
            .or_default()
            .insert(component.to_string(), level);
        self
    }

    /// Structural checks; anything caught here is a hard failure
    pub fn validate(&self) -> Result<()> {
        let mut member_ids = BTreeSet::new();
        for member in &self.team.members {
            if !member_ids.insert(member.account_id.as_str()) {
                return Err(PlanError::MalformedSnapshot(format!(
                    "team {} lists member {} twice",
                    self.team.id, member.account_id
                )));
            }
            if !member.hours_per_day.is_finite() || member.hours_per_day < 0.0 || member.hours_per_day > 24.0 {
                return Err(PlanError::MalformedSnapshot(format!(
                    "member {} has invalid hoursPerDay {}",
                    member.account_id, member.hours_per_day
                )));
            }
        }

        if self.team.wip.epics == Some(0) {
            return Err(PlanError::MalformedSnapshot(format!(
                "team {} declares an epic WIP limit of 0",
                self.team.id
            )));
        }
        if let Some((role, _)) = self.team.wip.roles.iter().find(|(_, limit)| **limit == 0) {
            return Err(PlanError::MalformedSnapshot(format!(
                "team {} declares a {} WIP limit of 0",
                self.team.id, role
            )));
        }

        let mut keys = BTreeSet::new();
        for epic in &self.epics {
            if epic.team_id != self.team.id {
                return Err(PlanError::MalformedSnapshot(format!(
                    "epic {} belongs to team {}, not {}",
                    epic.key, epic.team_id, self.team.id
                )));
            }
            if !keys.insert(epic.key.as_str()) {
                return Err(PlanError::MalformedSnapshot(format!("duplicate key {}", epic.key)));
            }
            if !epic.auto_score.is_finite() {
                return Err(PlanError::MalformedSnapshot(format!("epic {} has a non-finite autoScore", epic.key)));
            }
            for story in &epic.stories {
                if !keys.insert(story.key.as_str()) {
                    return Err(PlanError::MalformedSnapshot(format!("duplicate key {}", story.key)));
                }
                if !story.auto_score.is_finite() {
                    return Err(PlanError::MalformedSnapshot(format!(
                        "story {} has a non-finite autoScore",
                        story.key
                    )));
                }
            }
        }

        for (member_id, levels) in &self.competencies {
            if let Some((component, level)) = levels.iter().find(|(_, l)| !(MIN_LEVEL..=MAX_LEVEL).contains(*l)) {
                return Err(PlanError::MalformedSnapshot(format!(
                    "member {} has level {} for {} (expected {}..={})",
                    member_id, level, component, MIN_LEVEL, MAX_LEVEL
                )));
            }
        }

        Ok(())
    }
}

impl CompetencySource for TeamSnapshot {
    fn levels_for(&self, member_id: &str) -> Option<&CompetencyLevels> {
        self.competencies.get(member_id)
    }
}

impl ScoreProvider for TeamSnapshot {
    fn auto_score(&self, item_key: &str) -> Option<f64> {
        self.epics.iter().find_map(|epic| {
            if epic.key == item_key {
                Some(epic.auto_score)
            } else {
                epic.stories
                    .iter()
                    .find(|s| s.key == item_key)
                    .map(|s| s.auto_score)
            }
        })
    }
}

/// Provider over snapshots already held in memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryProvider {
    snapshots: Vec<TeamSnapshot>,
}

impl InMemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(mut self, snapshot: TeamSnapshot) -> Self {
        self.snapshots.push(snapshot);
        self
    }
}

impl SnapshotProvider for InMemoryProvider {
    fn load_team(&self, team_id: &str) -> Result<TeamSnapshot> {
        self.snapshots
            .iter()
            .find(|s| s.team.id == team_id)
            .cloned()
            .ok_or_else(|| PlanError::TeamNotFound(team_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Role, TeamMember, WipLimits, WorkItem};

    fn snapshot() -> TeamSnapshot {
        TeamSnapshot::new(Team::new("alpha").with_member(TeamMember::new("dev1", Role::Dev, 6.0))).with_epic(
            Epic::new("E-1", "alpha", "In Progress")
                .with_score(50.0)
                .with_story(WorkItem::new("P-1", "To Do").with_score(70.0)),
        )
    }

    #[test]
    fn test_valid_snapshot() {
        assert!(snapshot().validate().is_ok());
    }

    #[test]
    fn test_duplicate_keys_rejected() {
        let mut snap = snapshot();
        snap.epics[0].stories.push(WorkItem::new("P-1", "To Do"));
        let err = snap.validate().unwrap_err();
        assert!(matches!(err, PlanError::MalformedSnapshot(_)));
        assert!(err.to_string().contains("P-1"));
    }

    #[test]
    fn test_bad_competency_level_rejected() {
        let snap = snapshot().with_competency("dev1", "api", 7);
        assert!(matches!(snap.validate(), Err(PlanError::MalformedSnapshot(_))));
    }

    #[test]
    fn test_negative_capacity_rejected() {
        let mut snap = snapshot();
        snap.team.members[0].hours_per_day = -1.0;
        assert!(snap.validate().is_err());
    }

    #[test]
    fn test_zero_wip_rejected() {
        let mut snap = snapshot();
        snap.team.wip = WipLimits::new(0);
        assert!(snap.validate().is_err());

        snap.team.wip = WipLimits::new(1).with_role_limit(Role::Qa, 0);
        assert!(snap.validate().is_err());
    }

    #[test]
    fn test_foreign_epic_rejected() {
        let snap = snapshot().with_epic(Epic::new("E-2", "beta", "To Do"));
        assert!(snap.validate().is_err());
    }

    #[test]
    fn test_score_provider_lookup() {
        let snap = snapshot();
        assert_eq!(snap.auto_score("E-1"), Some(50.0));
        assert_eq!(snap.auto_score("P-1"), Some(70.0));
        assert_eq!(snap.auto_score("P-404"), None);
    }

    #[test]
    fn test_in_memory_provider() {
        let provider = InMemoryProvider::new().with_snapshot(snapshot());
        assert_eq!(provider.load_team("alpha").unwrap().team.id, "alpha");
        assert!(matches!(provider.load_team("beta"), Err(PlanError::TeamNotFound(_))));
    }
}
