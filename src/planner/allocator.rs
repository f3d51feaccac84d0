//! Phase pipeline allocator.
//!
//! Walks each story's required phases in SA -> DEV -> QA order and books
//! them onto members day by day:
//! 1. The `AssigneeSelector` picks among active members of the phase's role
//! 2. The base estimate is scaled by the member's competency factor
//! 3. The phase starts no earlier than the previous phase's end, the story's
//!    dependency ends and its epic's admission date
//! 4. Workdays are consumed at up to `hoursPerDay - committed` each until the
//!    adjusted effort is booked
//!
//! Loads are kept in whole minutes so per-day capacity checks are exact.
//! A walk that runs past the horizon leaves the phase unallocated.

use chrono::NaiveDate;
use std::collections::BTreeMap;

use crate::calendar::{WorkCalendar, Workdays, workday_after};
use crate::competency::{self, CompetencySource};
use crate::domain::{PlanningWarning, Role, TeamMember, WarningKind, WorkItem};
use crate::planner::policy::{AssigneeSelector, Candidate};
use crate::planner::result::{PhaseSchedule, StoryPhases};

pub const MINUTES_PER_HOUR: f64 = 60.0;

/// Daily capacity in whole minutes, never above `hours_per_day`
pub fn capacity_minutes(hours_per_day: f64) -> u32 {
    if !hours_per_day.is_finite() || hours_per_day <= 0.0 {
        return 0;
    }
    (hours_per_day * MINUTES_PER_HOUR + 1e-9).floor() as u32
}

pub fn minutes_to_hours(minutes: u32) -> f64 {
    f64::from(minutes) / MINUTES_PER_HOUR
}

/// Hours committed to one member during a run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssigneeLoad {
    total: u32,
    daily: BTreeMap<NaiveDate, u32>,
}

impl AssigneeLoad {
    pub fn on(&self, day: NaiveDate) -> u32 {
        self.daily.get(&day).copied().unwrap_or(0)
    }

    pub fn total_minutes(&self) -> u32 {
        self.total
    }

    pub fn daily(&self) -> &BTreeMap<NaiveDate, u32> {
        &self.daily
    }

    fn commit(&mut self, day: NaiveDate, minutes: u32) {
        *self.daily.entry(day).or_insert(0) += minutes;
        self.total += minutes;
    }
}

/// The booked phases of one story
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoryAllocation {
    pub phases: StoryPhases,
}

impl StoryAllocation {
    pub fn end_date(&self) -> Option<NaiveDate> {
        self.phases.end_date()
    }
}

/// A booked interval of one role's phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl PhaseWindow {
    fn overlaps(&self, start: NaiveDate, end: NaiveDate) -> bool {
        self.start <= end && self.end >= start
    }
}

/// Days a phase would occupy, before committing
struct Booking {
    start: NaiveDate,
    end: NaiveDate,
    days: Vec<(NaiveDate, u32)>,
}

enum LimitCheck {
    Fits,
    RetryFrom(NaiveDate),
    Exhausted,
}

pub struct Allocator<'a> {
    calendar: &'a dyn WorkCalendar,
    country_code: &'a str,
    horizon_end: NaiveDate,
    members: Vec<&'a TeamMember>,
    capacity: Vec<u32>,
    loads: Vec<AssigneeLoad>,
    competencies: &'a dyn CompetencySource,
    selector: &'a dyn AssigneeSelector,
    role_limits: BTreeMap<Role, u32>,
    windows: BTreeMap<Role, Vec<PhaseWindow>>,
    unallocated: BTreeMap<Role, u64>,
}

impl<'a> Allocator<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        calendar: &'a dyn WorkCalendar,
        country_code: &'a str,
        horizon_end: NaiveDate,
        members: Vec<&'a TeamMember>,
        competencies: &'a dyn CompetencySource,
        selector: &'a dyn AssigneeSelector,
        role_limits: BTreeMap<Role, u32>,
    ) -> Self {
        let capacity = members.iter().map(|m| capacity_minutes(m.hours_per_day)).collect();
        let loads = vec![AssigneeLoad::default(); members.len()];
        Self {
            calendar,
            country_code,
            horizon_end,
            members,
            capacity,
            loads,
            competencies,
            selector,
            role_limits,
            windows: BTreeMap::new(),
            unallocated: BTreeMap::new(),
        }
    }

    /// Book every required phase of `story`, none starting before `not_before`.
    pub fn allocate_story(
        &mut self,
        story: &WorkItem,
        not_before: NaiveDate,
        warnings: &mut Vec<PlanningWarning>,
    ) -> StoryAllocation {
        let mut allocation = StoryAllocation::default();

        if story.flagged {
            warnings.push(PlanningWarning::new(
                &story.key,
                WarningKind::Flagged,
                "story is flagged; schedule assumes the impediment clears",
            ));
        }

        let roles = story.phases.required_roles();
        if roles.is_empty() {
            warnings.push(PlanningWarning::new(
                &story.key,
                WarningKind::NoEstimate,
                "no phase carries an estimate",
            ));
            return allocation;
        }

        let mut cursor = not_before;
        for role in roles {
            let schedule = self.allocate_phase(story, role, cursor, warnings);
            if let Some(end) = schedule.end_date {
                cursor = cursor.max(end);
            }
            allocation.phases.set(role, schedule);
        }
        allocation
    }

    fn allocate_phase(
        &mut self,
        story: &WorkItem,
        role: Role,
        earliest: NaiveDate,
        warnings: &mut Vec<PlanningWarning>,
    ) -> PhaseSchedule {
        let work = story.phases.get(role);
        if work.estimate_seconds == 0 {
            warnings.push(PlanningWarning::new(
                &story.key,
                WarningKind::NoEstimate,
                format!("{} phase is needed but has no estimate", role),
            ));
        }

        let base_hours = work.remaining_hours();
        if base_hours <= 0.0 {
            return match Workdays::until(self.calendar, self.country_code, earliest, self.horizon_end).next() {
                Some(day) => PhaseSchedule::zero_duration(day),
                None => self.no_capacity(story, role, 0.0, "no workday left within the planning horizon", warnings),
            };
        }

        let candidates: Vec<(usize, Candidate<'a>)> = self
            .members
            .iter()
            .enumerate()
            .filter(|(_, m)| m.can_work(role))
            .map(|(idx, m)| {
                (
                    idx,
                    Candidate {
                        member: *m,
                        committed_minutes: self.loads[idx].total_minutes(),
                    },
                )
            })
            .collect();

        let chosen = if candidates.is_empty() {
            None
        } else {
            let views: Vec<Candidate<'a>> = candidates.iter().map(|(_, c)| *c).collect();
            self.selector
                .select(role, &views)
                .and_then(|pick| candidates.get(pick))
                .map(|(idx, _)| *idx)
        };

        let Some(member_idx) = chosen else {
            let reason = format!("no active {} member available", role);
            return self.no_capacity(story, role, base_hours, &reason, warnings);
        };

        let member = self.members[member_idx];
        let score = competency::score(self.competencies.levels_for(&member.account_id), &story.components);
        let adjusted = competency::adjusted_hours(base_hours, score);
        let minutes = ((adjusted * MINUTES_PER_HOUR).round() as u32).max(1);

        let mut from = earliest;
        loop {
            let Some(booking) = self.walk(member_idx, from, minutes) else {
                let reason = format!(
                    "{} could not fit {:.1}h of {} work within the planning horizon",
                    member.account_id, adjusted, role
                );
                return self.no_capacity(story, role, base_hours, &reason, warnings);
            };

            match self.check_role_limit(role, booking.start, booking.end) {
                LimitCheck::Fits => {}
                LimitCheck::RetryFrom(next) => {
                    from = next;
                    continue;
                }
                LimitCheck::Exhausted => {
                    let reason = format!("{} WIP limit leaves no slot within the planning horizon", role);
                    return self.no_capacity(story, role, base_hours, &reason, warnings);
                }
            }

            for (day, booked) in &booking.days {
                self.loads[member_idx].commit(*day, *booked);
            }
            self.windows.entry(role).or_default().push(PhaseWindow {
                start: booking.start,
                end: booking.end,
            });

            tracing::debug!(
                story = %story.key,
                role = %role,
                assignee = %member.account_id,
                start = %booking.start,
                end = %booking.end,
                factor = competency::factor(score),
                "Allocated phase"
            );

            return PhaseSchedule {
                assignee_id: Some(member.account_id.clone()),
                start_date: Some(booking.start),
                end_date: Some(booking.end),
                hours: minutes_to_hours(minutes),
                no_capacity: false,
            };
        }
    }

    /// Workdays from `from` with spare capacity for `member_idx`, paired
    /// with the minutes left on each.
    fn spare_days(&self, member_idx: usize, from: NaiveDate) -> impl Iterator<Item = (NaiveDate, u32)> + '_ {
        let capacity = self.capacity[member_idx];
        let load = &self.loads[member_idx];
        Workdays::until(self.calendar, self.country_code, from, self.horizon_end)
            .map(move |day| (day, capacity.saturating_sub(load.on(day))))
            .filter(|(_, spare)| *spare > 0)
    }

    /// Plan (without committing) the days that absorb `minutes`.
    fn walk(&self, member_idx: usize, from: NaiveDate, minutes: u32) -> Option<Booking> {
        let mut remaining = minutes;
        let mut days = Vec::new();
        for (day, spare) in self.spare_days(member_idx, from) {
            let booked = spare.min(remaining);
            days.push((day, booked));
            remaining -= booked;
            if remaining == 0 {
                let start = days.first().map(|(d, _)| *d)?;
                return Some(Booking { start, end: day, days });
            }
        }
        None
    }

    fn check_role_limit(&self, role: Role, start: NaiveDate, end: NaiveDate) -> LimitCheck {
        let (Some(limit), Some(windows)) = (self.role_limits.get(&role), self.windows.get(&role)) else {
            return LimitCheck::Fits;
        };
        let overlapping: Vec<&PhaseWindow> = windows.iter().filter(|w| w.overlaps(start, end)).collect();
        if overlapping.len() < *limit as usize {
            return LimitCheck::Fits;
        }
        let Some(earliest_free) = overlapping.iter().map(|w| w.end).min() else {
            return LimitCheck::Fits;
        };
        let horizon = (self.horizon_end - earliest_free).num_days().max(0) as u32;
        match workday_after(self.calendar, self.country_code, earliest_free, horizon) {
            Some(next) => LimitCheck::RetryFrom(next),
            None => LimitCheck::Exhausted,
        }
    }

    fn no_capacity(
        &mut self,
        story: &WorkItem,
        role: Role,
        hours: f64,
        reason: &str,
        warnings: &mut Vec<PlanningWarning>,
    ) -> PhaseSchedule {
        tracing::warn!(story = %story.key, role = %role, reason, "Phase left without capacity");
        warnings.push(PlanningWarning::new(&story.key, WarningKind::NoCapacity, reason));
        let minutes = (hours * MINUTES_PER_HOUR).round() as u64;
        let total = self.unallocated.entry(role).or_insert(0);
        *total = total.saturating_add(minutes);
        PhaseSchedule::no_capacity(hours)
    }

    pub fn members(&self) -> &[&'a TeamMember] {
        &self.members
    }

    pub fn loads(&self) -> &[AssigneeLoad] {
        &self.loads
    }

    /// Booked windows for `role`, in booking order
    pub fn windows(&self, role: Role) -> &[PhaseWindow] {
        self.windows.get(&role).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Estimate (in minutes) of `role` phases that found no capacity
    pub fn unallocated_minutes(&self, role: Role) -> u64 {
        self.unallocated.get(&role).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::WeekendCalendar;
    use crate::competency::{CompetencyMatrix, NoCompetencies};
    use crate::domain::PhaseWork;
    use crate::planner::policy::LeastLoaded;

    // Monday
    fn day(n: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap() + chrono::Days::new(u64::from(n))
    }

    fn horizon() -> NaiveDate {
        day(0) + chrono::Days::new(365)
    }

    fn allocator<'a>(members: Vec<&'a TeamMember>, competencies: &'a dyn CompetencySource) -> Allocator<'a> {
        Allocator::new(
            &WeekendCalendar,
            "US",
            horizon(),
            members,
            competencies,
            &LeastLoaded,
            BTreeMap::new(),
        )
    }

    fn dev_story(key: &str, hours: f64) -> WorkItem {
        WorkItem::new(key, "To Do").with_phase(Role::Dev, PhaseWork::estimated(hours))
    }

    #[test]
    fn test_capacity_minutes_never_exceeds_hours() {
        assert_eq!(capacity_minutes(6.0), 360);
        assert_eq!(capacity_minutes(7.999), 479);
        assert_eq!(capacity_minutes(0.0), 0);
        assert_eq!(capacity_minutes(-3.0), 0);
    }

    #[test]
    fn test_twelve_hours_at_six_per_day_spans_two_days() {
        let dev = TeamMember::new("dev1", Role::Dev, 6.0);
        let mut alloc = allocator(vec![&dev], &NoCompetencies);
        let mut warnings = Vec::new();

        let result = alloc.allocate_story(&dev_story("P-1", 12.0), day(0), &mut warnings);
        let phase = result.phases.dev.unwrap();
        assert_eq!(phase.start_date, Some(day(0)));
        assert_eq!(phase.end_date, Some(day(1)));
        assert_eq!(phase.hours, 12.0);
        assert_eq!(alloc.loads()[0].on(day(0)), 360);
        assert_eq!(alloc.loads()[0].on(day(1)), 360);
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_walk_skips_weekend() {
        let dev = TeamMember::new("dev1", Role::Dev, 8.0);
        let mut alloc = allocator(vec![&dev], &NoCompetencies);
        let mut warnings = Vec::new();

        // Friday start, 16h -> Friday + Monday
        let result = alloc.allocate_story(&dev_story("P-1", 16.0), day(4), &mut warnings);
        let phase = result.phases.dev.unwrap();
        assert_eq!(phase.start_date, Some(day(4)));
        assert_eq!(phase.end_date, Some(day(7)));
    }

    #[test]
    fn test_pipeline_is_sequential() {
        let sa = TeamMember::new("sa1", Role::Sa, 8.0);
        let dev = TeamMember::new("dev1", Role::Dev, 8.0);
        let qa = TeamMember::new("qa1", Role::Qa, 8.0);
        let mut alloc = allocator(vec![&sa, &dev, &qa], &NoCompetencies);
        let mut warnings = Vec::new();

        let story = WorkItem::new("P-1", "To Do")
            .with_phase(Role::Sa, PhaseWork::estimated(8.0))
            .with_phase(Role::Dev, PhaseWork::estimated(16.0))
            .with_phase(Role::Qa, PhaseWork::estimated(4.0));
        let result = alloc.allocate_story(&story, day(0), &mut warnings);
        let sa = result.phases.sa.as_ref().unwrap();
        let dev = result.phases.dev.as_ref().unwrap();
        let qa = result.phases.qa.as_ref().unwrap();

        assert!(dev.start_date >= sa.end_date);
        assert!(qa.start_date >= dev.end_date);
        assert_eq!(result.end_date(), qa.end_date);
    }

    #[test]
    fn test_fills_remaining_capacity_of_partially_booked_day() {
        let dev = TeamMember::new("dev1", Role::Dev, 8.0);
        let mut alloc = allocator(vec![&dev], &NoCompetencies);
        let mut warnings = Vec::new();

        alloc.allocate_story(&dev_story("P-1", 6.0), day(0), &mut warnings);
        let second = alloc.allocate_story(&dev_story("P-2", 4.0), day(0), &mut warnings);
        let phase = second.phases.dev.unwrap();
        assert_eq!(phase.start_date, Some(day(0)));
        assert_eq!(phase.end_date, Some(day(1)));
        assert_eq!(alloc.loads()[0].on(day(0)), 480);
        assert_eq!(alloc.loads()[0].on(day(1)), 120);
    }

    #[test]
    fn test_least_loaded_balances_members() {
        let a = TeamMember::new("a", Role::Dev, 8.0);
        let b = TeamMember::new("b", Role::Dev, 8.0);
        let mut alloc = allocator(vec![&a, &b], &NoCompetencies);
        let mut warnings = Vec::new();

        let first = alloc.allocate_story(&dev_story("P-1", 8.0), day(0), &mut warnings);
        let second = alloc.allocate_story(&dev_story("P-2", 8.0), day(0), &mut warnings);
        assert_eq!(first.phases.dev.unwrap().assignee_id.as_deref(), Some("a"));
        let second = second.phases.dev.unwrap();
        assert_eq!(second.assignee_id.as_deref(), Some("b"));
        assert_eq!(second.start_date, Some(day(0)));
    }

    #[test]
    fn test_competency_shortens_work() {
        let dev = TeamMember::new("dev1", Role::Dev, 7.0);
        let mut matrix = CompetencyMatrix::new();
        matrix.insert("dev1".to_string(), [("api".to_string(), 5u8)].into_iter().collect());
        let mut alloc = allocator(vec![&dev], &matrix);
        let mut warnings = Vec::new();

        let story = dev_story("P-1", 10.0).with_components(&["api"]);
        let phase = alloc.allocate_story(&story, day(0), &mut warnings).phases.dev.unwrap();
        // 10h * 0.7 = 7h -> one day
        assert_eq!(phase.hours, 7.0);
        assert_eq!(phase.start_date, phase.end_date);
    }

    #[test]
    fn test_no_member_for_role_is_no_capacity() {
        let dev = TeamMember::new("dev1", Role::Dev, 8.0);
        let mut alloc = allocator(vec![&dev], &NoCompetencies);
        let mut warnings = Vec::new();

        let story = WorkItem::new("P-1", "To Do")
            .with_phase(Role::Sa, PhaseWork::estimated(4.0))
            .with_phase(Role::Dev, PhaseWork::estimated(8.0));
        let result = alloc.allocate_story(&story, day(2), &mut warnings);

        let sa = result.phases.sa.unwrap();
        assert!(sa.no_capacity);
        assert_eq!(sa.hours, 4.0);
        assert_eq!(sa.start_date, None);

        // DEV still schedules from the story's lower bound
        let dev = result.phases.dev.unwrap();
        assert_eq!(dev.start_date, Some(day(2)));

        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].kind, WarningKind::NoCapacity);
        assert_eq!(alloc.unallocated_minutes(Role::Sa), 240);
    }

    #[test]
    fn test_unallocated_minutes_survive_huge_estimates() {
        let dev = TeamMember::new("dev1", Role::Dev, 8.0);
        let mut alloc = allocator(vec![&dev], &NoCompetencies);
        let mut warnings = Vec::new();

        alloc.allocate_story(&dev_story("P-1", 40_000_000.0), day(0), &mut warnings);
        alloc.allocate_story(&dev_story("P-2", 40_000_000.0), day(0), &mut warnings);

        assert_eq!(warnings.len(), 2);
        assert!(alloc.unallocated_minutes(Role::Dev) > u64::from(u32::MAX));
    }

    #[test]
    fn test_inactive_member_not_selected() {
        let dev = TeamMember::new("dev1", Role::Dev, 8.0).inactive();
        let mut alloc = allocator(vec![&dev], &NoCompetencies);
        let mut warnings = Vec::new();
        let result = alloc.allocate_story(&dev_story("P-1", 8.0), day(0), &mut warnings);
        assert!(result.phases.dev.unwrap().no_capacity);
    }

    #[test]
    fn test_needed_phase_without_estimate_is_zero_duration() {
        let qa = TeamMember::new("qa1", Role::Qa, 8.0);
        let mut alloc = allocator(vec![&qa], &NoCompetencies);
        let mut warnings = Vec::new();

        // Saturday lower bound rolls to Monday
        let story = WorkItem::new("P-1", "To Do").with_phase(Role::Qa, PhaseWork::needed());
        let phase = alloc.allocate_story(&story, day(5), &mut warnings).phases.qa.unwrap();
        assert_eq!(phase.start_date, Some(day(7)));
        assert_eq!(phase.end_date, Some(day(7)));
        assert_eq!(phase.hours, 0.0);
        assert!(!phase.no_capacity);
        assert_eq!(warnings[0].kind, WarningKind::NoEstimate);
    }

    #[test]
    fn test_fully_logged_phase_has_no_warning() {
        let dev = TeamMember::new("dev1", Role::Dev, 8.0);
        let mut alloc = allocator(vec![&dev], &NoCompetencies);
        let mut warnings = Vec::new();

        let story =
            WorkItem::new("P-1", "In Progress").with_phase(Role::Dev, PhaseWork::estimated(4.0).with_logged(4.0));
        let phase = alloc.allocate_story(&story, day(0), &mut warnings).phases.dev.unwrap();
        assert_eq!(phase.hours, 0.0);
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_story_without_phases_warns() {
        let mut alloc = allocator(vec![], &NoCompetencies);
        let mut warnings = Vec::new();
        let result = alloc.allocate_story(&WorkItem::new("P-1", "To Do"), day(0), &mut warnings);
        assert_eq!(result.end_date(), None);
        assert_eq!(warnings[0].kind, WarningKind::NoEstimate);
    }

    #[test]
    fn test_flagged_story_warns_and_schedules() {
        let dev = TeamMember::new("dev1", Role::Dev, 8.0);
        let mut alloc = allocator(vec![&dev], &NoCompetencies);
        let mut warnings = Vec::new();
        let result = alloc.allocate_story(&dev_story("P-1", 2.0).flagged(), day(0), &mut warnings);
        assert!(result.phases.dev.unwrap().start_date.is_some());
        assert_eq!(warnings[0].kind, WarningKind::Flagged);
    }

    #[test]
    fn test_horizon_exhaustion_is_no_capacity() {
        let dev = TeamMember::new("dev1", Role::Dev, 8.0);
        let mut alloc = Allocator::new(
            &WeekendCalendar,
            "US",
            day(4),
            vec![&dev],
            &NoCompetencies,
            &LeastLoaded,
            BTreeMap::new(),
        );
        let mut warnings = Vec::new();
        let phase = alloc
            .allocate_story(&dev_story("P-1", 80.0), day(0), &mut warnings)
            .phases
            .dev
            .unwrap();
        assert!(phase.no_capacity);
        assert_eq!(warnings[0].kind, WarningKind::NoCapacity);
        // nothing committed
        assert_eq!(alloc.loads()[0].total_minutes(), 0);
    }

    #[test]
    fn test_role_limit_delays_overlapping_phase() {
        let a = TeamMember::new("a", Role::Dev, 8.0);
        let b = TeamMember::new("b", Role::Dev, 8.0);
        let mut limits = BTreeMap::new();
        limits.insert(Role::Dev, 1);
        let mut alloc = Allocator::new(
            &WeekendCalendar,
            "US",
            horizon(),
            vec![&a, &b],
            &NoCompetencies,
            &LeastLoaded,
            limits,
        );
        let mut warnings = Vec::new();

        alloc.allocate_story(&dev_story("P-1", 16.0), day(0), &mut warnings);
        let second = alloc
            .allocate_story(&dev_story("P-2", 8.0), day(0), &mut warnings)
            .phases
            .dev
            .unwrap();
        // b is free, but only one DEV story may be active at once
        assert_eq!(second.assignee_id.as_deref(), Some("b"));
        assert_eq!(second.start_date, Some(day(2)));
        assert_eq!(alloc.windows(Role::Dev).len(), 2);
    }
}
