//! Competency-adjusted effort
//!
//! Members carry a 1..=5 skill level per component. The level average over a
//! story's components becomes a multiplier on the base estimate:
//! - score <= 3: `1.0 + (3.0 - score) * 0.3` (novice, slower)
//! - score > 3: `1.0 - (score - 3.0) * 0.15` (expert, faster)
//!
//! Factors are rounded half-up to three decimals.

use std::collections::BTreeMap;

/// Neutral score used whenever there is nothing to match
pub const NEUTRAL_SCORE: f64 = 3.0;

pub const MIN_LEVEL: u8 = 1;
pub const MAX_LEVEL: u8 = 5;

const NOVICE_SLOPE: f64 = 0.3;
const EXPERT_SLOPE: f64 = 0.15;

/// Component name -> level
pub type CompetencyLevels = BTreeMap<String, u8>;

/// Member id -> levels
pub type CompetencyMatrix = BTreeMap<String, CompetencyLevels>;

/// Competency lookup consumed by the planner
pub trait CompetencySource: Send + Sync {
    fn levels_for(&self, member_id: &str) -> Option<&CompetencyLevels>;
}

impl CompetencySource for CompetencyMatrix {
    fn levels_for(&self, member_id: &str) -> Option<&CompetencyLevels> {
        self.get(member_id)
    }
}

/// No competencies recorded for anyone; every score is neutral
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCompetencies;

impl CompetencySource for NoCompetencies {
    fn levels_for(&self, _member_id: &str) -> Option<&CompetencyLevels> {
        None
    }
}

/// Average level over the components a member and a story share.
///
/// Returns `NEUTRAL_SCORE` when either side is empty or nothing overlaps.
pub fn score(levels: Option<&CompetencyLevels>, components: &[String]) -> f64 {
    let Some(levels) = levels else {
        return NEUTRAL_SCORE;
    };
    if levels.is_empty() || components.is_empty() {
        return NEUTRAL_SCORE;
    }

    let mut seen: Vec<&str> = Vec::with_capacity(components.len());
    let mut total = 0u32;
    let mut matched = 0u32;
    for component in components {
        if seen.contains(&component.as_str()) {
            continue;
        }
        seen.push(component);
        if let Some(level) = levels.get(component) {
            total += u32::from(*level);
            matched += 1;
        }
    }

    if matched == 0 {
        return NEUTRAL_SCORE;
    }
    f64::from(total) / f64::from(matched)
}

/// Effort multiplier for a competency score
pub fn factor(score: f64) -> f64 {
    let raw = if score <= NEUTRAL_SCORE {
        1.0 + (NEUTRAL_SCORE - score) * NOVICE_SLOPE
    } else {
        1.0 - (score - NEUTRAL_SCORE) * EXPERT_SLOPE
    };
    round_half_up(raw, 3)
}

/// Base hours scaled by the factor for `score`
pub fn adjusted_hours(base_hours: f64, score: f64) -> f64 {
    base_hours * factor(score)
}

fn round_half_up(value: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    // epsilon absorbs representation error on exact .5 ties
    ((value * scale) + 0.5 + 1e-9).floor() / scale
}

#[cfg(test)]
mod tests {
    use super::*;

    fn levels(pairs: &[(&str, u8)]) -> CompetencyLevels {
        pairs.iter().map(|(c, l)| (c.to_string(), *l)).collect()
    }

    fn comps(names: &[&str]) -> Vec<String> {
        names.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_factor_boundaries() {
        assert_eq!(factor(1.0), 1.600);
        assert_eq!(factor(2.0), 1.300);
        assert_eq!(factor(3.0), 1.000);
        assert_eq!(factor(4.0), 0.850);
        assert_eq!(factor(5.0), 0.700);
    }

    #[test]
    fn test_factor_rounds_to_three_places() {
        // 2.5 -> 1.15, 3.5 -> 0.925, 4/3 avg -> 1.5
        assert_eq!(factor(2.5), 1.150);
        assert_eq!(factor(3.5), 0.925);
        assert_eq!(factor(1.0 + 1.0 / 3.0), 1.5);
        // 3.3333.. -> 1 - 0.05 = 0.95
        assert_eq!(factor(10.0 / 3.0), 0.950);
    }

    #[test]
    fn test_score_neutral_when_empty() {
        assert_eq!(score(None, &comps(&["api"])), NEUTRAL_SCORE);
        assert_eq!(score(Some(&levels(&[])), &comps(&["api"])), NEUTRAL_SCORE);
        assert_eq!(score(Some(&levels(&[("api", 5)])), &[]), NEUTRAL_SCORE);
    }

    #[test]
    fn test_score_neutral_without_overlap() {
        let l = levels(&[("api", 5)]);
        assert_eq!(score(Some(&l), &comps(&["ui"])), NEUTRAL_SCORE);
    }

    #[test]
    fn test_score_averages_only_matched_components() {
        let l = levels(&[("api", 5), ("db", 2), ("ui", 1)]);
        assert_eq!(score(Some(&l), &comps(&["api", "db", "infra"])), 3.5);
    }

    #[test]
    fn test_score_ignores_duplicate_components() {
        let l = levels(&[("api", 5), ("db", 1)]);
        assert_eq!(score(Some(&l), &comps(&["api", "api", "db"])), 3.0);
    }

    #[test]
    fn test_adjusted_hours() {
        assert_eq!(adjusted_hours(10.0, 3.0), 10.0);
        assert!((adjusted_hours(10.0, 5.0) - 7.0).abs() < 1e-9);
        assert!((adjusted_hours(10.0, 1.0) - 16.0).abs() < 1e-9);
    }

    #[test]
    fn test_matrix_source() {
        let mut matrix = CompetencyMatrix::new();
        matrix.insert("u1".to_string(), levels(&[("api", 4)]));
        assert!(matrix.levels_for("u1").is_some());
        assert!(matrix.levels_for("u2").is_none());
        assert!(NoCompetencies.levels_for("u1").is_none());
    }
}
