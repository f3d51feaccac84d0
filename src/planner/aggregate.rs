//! Plan aggregator: rolls phase schedules up into stories, stories into
//! epics, and member loads into utilization series.

use std::collections::BTreeMap;

use crate::domain::{Epic, PlanningWarning, Role, TeamMember, WarningKind, WorkItem};
use crate::planner::allocator::{AssigneeLoad, StoryAllocation, capacity_minutes, minutes_to_hours};
use crate::planner::policy::ConfidencePolicy;
use crate::planner::result::{AssigneeUtilization, PlannedEpic, PlannedStory, RoleAggregate};
use crate::planner::wip::{Admission, Ticket};

/// `logged / estimate` as a percentage in `0..=100`; 0 without an estimate
pub fn progress_percent(logged_seconds: u64, estimate_seconds: u64) -> f64 {
    if estimate_seconds == 0 {
        return 0.0;
    }
    (logged_seconds as f64 / estimate_seconds as f64 * 100.0).clamp(0.0, 100.0)
}

pub fn plan_story(
    story: &WorkItem,
    auto_score: f64,
    allocation: StoryAllocation,
    warnings: Vec<PlanningWarning>,
) -> PlannedStory {
    let total_estimate_seconds = story.phases.total_estimate_seconds();
    let total_logged_seconds = story.phases.total_logged_seconds();
    PlannedStory {
        story_key: story.key.clone(),
        summary: story.summary.clone(),
        status: story.status.clone(),
        auto_score,
        start_date: allocation.phases.start_date(),
        end_date: allocation.phases.end_date(),
        phases: allocation.phases,
        total_estimate_seconds,
        total_logged_seconds,
        progress_percent: progress_percent(total_logged_seconds, total_estimate_seconds),
        blocked_by: story.blocked_by.clone(),
        warnings,
    }
}

/// Roll the planned stories of `epic` up.
///
/// `stories` holds only the stories that were scheduled; totals and progress
/// also count the epic's finished stories.
pub fn plan_epic(
    epic: &Epic,
    auto_score: f64,
    stories: Vec<PlannedStory>,
    ticket: Option<&Ticket>,
    confidence: &dyn ConfidencePolicy,
) -> PlannedEpic {
    let mut phase_aggregation: BTreeMap<Role, RoleAggregate> = BTreeMap::new();
    for story in &stories {
        for (role, phase) in story.phases.iter() {
            let agg = phase_aggregation.entry(role).or_default();
            agg.hours += phase.hours;
            agg.start_date = min_date(agg.start_date, phase.start_date);
            agg.end_date = agg.end_date.max(phase.end_date);
        }
    }

    let kinds: Vec<WarningKind> = stories
        .iter()
        .flat_map(|s| s.warnings.iter().map(|w| w.kind))
        .collect();

    let start_date = stories.iter().filter_map(|s| s.start_date).min();
    let end_date = stories.iter().filter_map(|s| s.end_date).max();
    let due_date_delta_days = match (end_date, epic.due_date) {
        (Some(end), Some(due)) => Some((end - due).num_days()),
        _ => None,
    };

    let estimate: u64 = epic.stories.iter().map(|s| s.phases.total_estimate_seconds()).sum();
    let logged: u64 = epic.stories.iter().map(|s| s.phases.total_logged_seconds()).sum();

    let (queue_position, queued_until) = match ticket.map(|t| t.admission) {
        Some(Admission::Queued { position, queued_until }) => (Some(position), Some(queued_until)),
        _ => (None, None),
    };

    PlannedEpic {
        epic_key: epic.key.clone(),
        summary: epic.summary.clone(),
        auto_score,
        start_date,
        end_date,
        stories_total: epic.stories.len(),
        stories_active: stories.len(),
        stories,
        phase_aggregation,
        status: epic.status.clone(),
        due_date: epic.due_date,
        progress_percent: progress_percent(logged, estimate),
        confidence: confidence.confidence(&kinds),
        due_date_delta_days,
        admitted_on: ticket.map(|t| t.admitted_on),
        queue_position,
        queued_until,
    }
}

fn min_date<T: Ord>(a: Option<T>, b: Option<T>) -> Option<T> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

/// Per-member totals and daily series, keyed by account id
pub fn assignee_utilization(
    members: &[&TeamMember],
    loads: &[AssigneeLoad],
) -> BTreeMap<String, AssigneeUtilization> {
    members
        .iter()
        .zip(loads)
        .map(|(member, load)| {
            let daily_load = load
                .daily()
                .iter()
                .map(|(day, minutes)| (*day, minutes_to_hours(*minutes)))
                .collect();
            (
                member.account_id.clone(),
                AssigneeUtilization {
                    display_name: member.display_name.clone(),
                    role: member.role,
                    total_hours: minutes_to_hours(load.total_minutes()),
                    effective_hours_per_day: minutes_to_hours(capacity_minutes(member.hours_per_day)),
                    daily_load,
                },
            )
        })
        .collect()
}
