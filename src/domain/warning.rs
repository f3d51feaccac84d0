//! Planning warnings
//!
//! Everything the planner can degrade around ends up here rather than as an
//! error. Warnings are append-only and attached to the final result.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WarningKind {
    NoEstimate,
    NoCapacity,
    CircularDependency,
    Flagged,
}

impl fmt::Display for WarningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WarningKind::NoEstimate => "NO_ESTIMATE",
            WarningKind::NoCapacity => "NO_CAPACITY",
            WarningKind::CircularDependency => "CIRCULAR_DEPENDENCY",
            WarningKind::Flagged => "FLAGGED",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanningWarning {
    pub item_key: String,
    pub kind: WarningKind,
    pub message: String,
}

impl PlanningWarning {
    pub fn new(item_key: impl Into<String>, kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            item_key: item_key.into(),
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for PlanningWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.kind, self.item_key, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warning_kind_serde() {
        let json = serde_json::to_string(&WarningKind::CircularDependency).unwrap();
        assert_eq!(json, "\"CIRCULAR_DEPENDENCY\"");
    }

    #[test]
    fn test_warning_display() {
        let w = PlanningWarning::new("P-1", WarningKind::NoCapacity, "no active QA");
        assert_eq!(w.to_string(), "[NO_CAPACITY] P-1: no active QA");
    }
}
