//! Whole-tracker snapshot document
//!
//! The export format the CLI reads: every team, every epic (stories nested),
//! the competency matrix and the holiday calendar, in YAML or JSON.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use super::{SnapshotProvider, TeamSnapshot};
use crate::calendar::HolidayCalendar;
use crate::competency::CompetencyMatrix;
use crate::domain::{Epic, Team};
use crate::error::{PlanError, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SnapshotDocument {
    pub teams: Vec<Team>,
    pub epics: Vec<Epic>,
    pub competencies: CompetencyMatrix,
    /// Country code -> holiday dates
    pub holidays: HolidayCalendar,
}

impl SnapshotDocument {
    /// Load and validate a snapshot file; `.json` is JSON, anything else YAML
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));

        let document = if is_json {
            Self::from_json_str(&content)?
        } else {
            Self::from_yaml_str(&content)?
        };
        log::info!(
            "Loaded snapshot from {}: {} teams, {} epics",
            path.display(),
            document.teams.len(),
            document.epics.len()
        );
        Ok(document)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let document: Self = serde_yaml::from_str(content)?;
        document.validate()?;
        Ok(document)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let document: Self = serde_json::from_str(content)?;
        document.validate()?;
        Ok(document)
    }

    pub fn calendar(&self) -> &HolidayCalendar {
        &self.holidays
    }

    pub fn team_ids(&self) -> Vec<String> {
        self.teams.iter().map(|t| t.id.clone()).collect()
    }

    pub fn validate(&self) -> Result<()> {
        let mut ids = BTreeSet::new();
        for team in &self.teams {
            if !ids.insert(team.id.as_str()) {
                return Err(PlanError::MalformedSnapshot(format!("duplicate team id {}", team.id)));
            }
        }

        if let Some(epic) = self.epics.iter().find(|e| !ids.contains(e.team_id.as_str())) {
            return Err(PlanError::MalformedSnapshot(format!(
                "epic {} references unknown team {}",
                epic.key, epic.team_id
            )));
        }

        let mut keys = BTreeSet::new();
        for epic in &self.epics {
            for key in std::iter::once(&epic.key).chain(epic.stories.iter().map(|s| &s.key)) {
                if !keys.insert(key.as_str()) {
                    return Err(PlanError::MalformedSnapshot(format!("duplicate key {}", key)));
                }
            }
        }

        for team in &self.teams {
            self.team_snapshot(team).validate()?;
        }
        Ok(())
    }

    fn team_snapshot(&self, team: &Team) -> TeamSnapshot {
        let epics = self
            .epics
            .iter()
            .filter(|e| e.team_id == team.id)
            .cloned()
            .map(|mut epic| {
                for story in &mut epic.stories {
                    story.epic_key = Some(epic.key.clone());
                }
                epic
            })
            .collect();

        let competencies = self
            .competencies
            .iter()
            .filter(|(member_id, _)| team.members.iter().any(|m| &m.account_id == *member_id))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        TeamSnapshot {
            team: team.clone(),
            epics,
            competencies,
        }
    }
}

impl SnapshotProvider for SnapshotDocument {
    fn load_team(&self, team_id: &str) -> Result<TeamSnapshot> {
        self.teams
            .iter()
            .find(|t| t.id == team_id)
            .map(|team| self.team_snapshot(team))
            .ok_or_else(|| PlanError::TeamNotFound(team_id.to_string()))
    }
}
