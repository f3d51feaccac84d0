//! Replaceable planning policies.
//!
//! Three decisions are policy rather than algorithm and can be swapped per
//! engine:
//! - **AssigneeSelector**: which eligible member takes a phase
//! - **CycleBreakPolicy**: which edge of a dependency cycle is dropped
//! - **ConfidencePolicy**: how warnings map to a forecast confidence

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::{Role, TeamMember, WarningKind, compare_keys};

/// A member eligible for a phase, with the load committed so far
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub member: &'a TeamMember,
    pub committed_minutes: u32,
}

/// Picks the assignee for a phase
pub trait AssigneeSelector: Send + Sync {
    /// Index into `candidates`, or `None` to leave the phase unassigned.
    /// `candidates` is never empty.
    fn select(&self, role: Role, candidates: &[Candidate<'_>]) -> Option<usize>;
}

/// Greedy load balancing: lowest committed load, ties by account id
#[derive(Debug, Clone, Copy, Default)]
pub struct LeastLoaded;

impl AssigneeSelector for LeastLoaded {
    fn select(&self, _role: Role, candidates: &[Candidate<'_>]) -> Option<usize> {
        candidates
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                a.committed_minutes
                    .cmp(&b.committed_minutes)
                    .then_with(|| a.member.account_id.cmp(&b.member.account_id))
            })
            .map(|(idx, _)| idx)
    }
}

/// One `from blockedBy to` edge on a detected cycle
#[derive(Debug, Clone, Copy)]
pub struct CycleEdge<'a> {
    pub from_key: &'a str,
    pub from_score: f64,
    pub to_key: &'a str,
}

/// Chooses the edge that breaks a dependency cycle
pub trait CycleBreakPolicy: Send + Sync {
    /// Index into `edges` of the edge to drop. `edges` is never empty.
    fn choose(&self, edges: &[CycleEdge<'_>]) -> usize;
}

/// Drop the edge whose blocked item has the lowest autoScore; ties drop the
/// edge from the item with the greatest key.
#[derive(Debug, Clone, Copy, Default)]
pub struct LowestScoreSource;

impl CycleBreakPolicy for LowestScoreSource {
    fn choose(&self, edges: &[CycleEdge<'_>]) -> usize {
        edges
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                a.from_score
                    .total_cmp(&b.from_score)
                    .then_with(|| compare_keys(b.from_key, a.from_key))
            })
            .map(|(idx, _)| idx)
            .unwrap_or(0)
    }
}

/// Coarse forecast reliability
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Confidence::Low => "LOW",
            Confidence::Medium => "MEDIUM",
            Confidence::High => "HIGH",
        };
        f.write_str(s)
    }
}

/// Maps the warnings touching an epic to a confidence label
pub trait ConfidencePolicy: Send + Sync {
    fn confidence(&self, kinds: &[WarningKind]) -> Confidence;
}

/// HIGH without capacity or cycle warnings, MEDIUM with only capacity
/// warnings, LOW once a cycle is involved.
#[derive(Debug, Clone, Copy, Default)]
pub struct WarningConfidence;

impl ConfidencePolicy for WarningConfidence {
    fn confidence(&self, kinds: &[WarningKind]) -> Confidence {
        if kinds.contains(&WarningKind::CircularDependency) {
            Confidence::Low
        } else if kinds.contains(&WarningKind::NoCapacity) {
            Confidence::Medium
        } else {
            Confidence::High
        }
    }
}
