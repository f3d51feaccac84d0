//! Team and team-member types
//!
//! A team owns its members and declares the WIP limits the queue manager
//! enforces. Both are read-only inputs to a planning run.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Pipeline role a member works in
///
/// Declaration order is pipeline order, so `Ord` sorts SA < DEV < QA.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Sa,
    Dev,
    Qa,
}

impl Role {
    /// The fixed SA -> DEV -> QA pipeline
    pub const PIPELINE: [Role; 3] = [Role::Sa, Role::Dev, Role::Qa];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Sa => "SA",
            Role::Dev => "DEV",
            Role::Qa => "QA",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SA" => Ok(Role::Sa),
            "DEV" => Ok(Role::Dev),
            "QA" => Ok(Role::Qa),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

fn default_true() -> bool {
    true
}

/// A person on a team
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamMember {
    /// Stable identity from the issue tracker
    pub account_id: String,
    pub display_name: String,
    pub role: Role,
    /// Effective daily capacity in hours
    pub hours_per_day: f64,
    #[serde(default = "default_true")]
    pub active: bool,
}

impl TeamMember {
    pub fn new(account_id: impl Into<String>, role: Role, hours_per_day: f64) -> Self {
        let account_id = account_id.into();
        Self {
            display_name: account_id.clone(),
            account_id,
            role,
            hours_per_day,
            active: true,
        }
    }

    /// Set the display name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    /// Mark the member inactive
    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    /// True if this member can take work in `role`
    pub fn can_work(&self, role: Role) -> bool {
        self.active && self.role == role && self.hours_per_day > 0.0
    }
}

/// Work-in-progress limits declared by a team
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WipLimits {
    /// Max concurrently admitted epics (falls back to the planner default)
    pub epics: Option<u32>,
    /// Max concurrently active stories per role
    pub roles: BTreeMap<Role, u32>,
}

impl WipLimits {
    pub fn new(epics: u32) -> Self {
        Self {
            epics: Some(epics),
            roles: BTreeMap::new(),
        }
    }

    /// Set a per-role limit.
    pub fn with_role_limit(mut self, role: Role, limit: u32) -> Self {
        self.roles.insert(role, limit);
        self
    }

    pub fn role_limit(&self, role: Role) -> Option<u32> {
        self.roles.get(&role).copied()
    }
}

/// A delivery team
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Country used for workday lookups
    #[serde(default)]
    pub country_code: Option<String>,
    #[serde(default)]
    pub wip: WipLimits,
    #[serde(default)]
    pub members: Vec<TeamMember>,
}

impl Team {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            country_code: None,
            wip: WipLimits::default(),
            members: Vec::new(),
        }
    }

    pub fn with_member(mut self, member: TeamMember) -> Self {
        self.members.push(member);
        self
    }

    pub fn with_wip(mut self, wip: WipLimits) -> Self {
        self.wip = wip;
        self
    }

    pub fn with_country(mut self, country_code: impl Into<String>) -> Self {
        self.country_code = Some(country_code.into());
        self
    }

    /// Active members, in declaration order
    pub fn active_members(&self) -> impl Iterator<Item = &TeamMember> {
        self.members.iter().filter(|m| m.active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_pipeline_order() {
        assert!(Role::Sa < Role::Dev);
        assert!(Role::Dev < Role::Qa);
        assert_eq!(Role::PIPELINE, [Role::Sa, Role::Dev, Role::Qa]);
    }

    #[test]
    fn test_role_serde_uppercase() {
        assert_eq!(serde_json::to_string(&Role::Dev).unwrap(), "\"DEV\"");
        let role: Role = serde_json::from_str("\"QA\"").unwrap();
        assert_eq!(role, Role::Qa);
    }

    #[test]
    fn test_role_from_str() {
        assert_eq!("sa".parse::<Role>().unwrap(), Role::Sa);
        assert_eq!(" Dev ".parse::<Role>().unwrap(), Role::Dev);
        assert!("PM".parse::<Role>().is_err());
    }

    #[test]
    fn test_member_can_work() {
        let dev = TeamMember::new("u1", Role::Dev, 6.0);
        assert!(dev.can_work(Role::Dev));
        assert!(!dev.can_work(Role::Qa));
        assert!(!dev.clone().inactive().can_work(Role::Dev));
        assert!(!TeamMember::new("u2", Role::Dev, 0.0).can_work(Role::Dev));
    }

    #[test]
    fn test_member_defaults_active_when_deserialized() {
        let member: TeamMember =
            serde_json::from_str(r#"{"accountId":"u1","displayName":"Ann","role":"SA","hoursPerDay":7.5}"#)
                .unwrap();
        assert!(member.active);
        assert_eq!(member.hours_per_day, 7.5);
    }

    #[test]
    fn test_wip_limits_role_lookup() {
        let wip = WipLimits::new(2).with_role_limit(Role::Dev, 3);
        assert_eq!(wip.epics, Some(2));
        assert_eq!(wip.role_limit(Role::Dev), Some(3));
        assert_eq!(wip.role_limit(Role::Qa), None);
    }

    #[test]
    fn test_team_active_members() {
        let team = Team::new("alpha")
            .with_member(TeamMember::new("a", Role::Dev, 6.0))
            .with_member(TeamMember::new("b", Role::Qa, 6.0).inactive());
        let active: Vec<_> = team.active_members().map(|m| m.account_id.as_str()).collect();
        assert_eq!(active, vec!["a"]);
    }
}
