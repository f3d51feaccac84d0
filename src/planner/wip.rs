//! WIP / queue manager.
//!
//! Epics compete for a fixed number of team WIP slots:
//! - **Ready list**: epics in priority order, adjusted so an epic never
//!   enters ahead of an epic whose stories block its own
//! - **Admission groups**: epics whose stories block each other both ways
//!   are admitted together so their stories can interleave
//! - **Admission**: while a slot is free the next ready epic starts on the
//!   planning date; otherwise it waits for the slot that frees first
//! - **Non-preemptive**: an admitted epic keeps its slot until its projected
//!   end, and the next epic starts on the following workday
//!
//! The same windows feed the utilization telemetry and idle/overload alerts.

use chrono::NaiveDate;
use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap};

use crate::domain::Role;
use crate::planner::result::{AlertKind, QueuedEpic, RoleUtilization, WipAlert, WipReport};

/// Admission groups over epics `0..deps.len()` (index = priority rank).
///
/// `deps[e]` holds the epics whose stories block stories of `e`. Epics that
/// reach each other through `deps` share a group, listed by rank. Groups come
/// out in dependency order; among ready groups the one holding the lowest
/// rank goes first.
pub fn admission_groups(deps: &[BTreeSet<usize>]) -> Vec<Vec<usize>> {
    let n = deps.len();
    let reach: Vec<BTreeSet<usize>> = (0..n).map(|epic| reachable(deps, epic)).collect();

    let mut group_of = vec![usize::MAX; n];
    let mut groups: Vec<Vec<usize>> = Vec::new();
    for epic in 0..n {
        if group_of[epic] != usize::MAX {
            continue;
        }
        let members: Vec<usize> = (epic..n)
            .filter(|&other| reach[epic].contains(&other) && reach[other].contains(&epic))
            .collect();
        for &member in &members {
            group_of[member] = groups.len();
        }
        if members.len() > 1 {
            tracing::debug!(?members, "Epics depend on each other; admitting together");
        }
        groups.push(members);
    }

    // group ids ascend with their lowest rank, so the heap pops by priority
    let mut pending = vec![0usize; groups.len()];
    let mut dependents: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); groups.len()];
    for (group, members) in groups.iter().enumerate() {
        let blockers: BTreeSet<usize> = members
            .iter()
            .flat_map(|&m| deps[m].iter().map(|&b| group_of[b]))
            .filter(|&g| g != group)
            .collect();
        pending[group] = blockers.len();
        for blocker in blockers {
            dependents[blocker].insert(group);
        }
    }

    let mut ready: BinaryHeap<Reverse<usize>> = (0..groups.len()).filter(|g| pending[*g] == 0).map(Reverse).collect();
    let mut order = Vec::with_capacity(groups.len());
    while let Some(Reverse(group)) = ready.pop() {
        order.push(group);
        for &dependent in &dependents[group] {
            pending[dependent] -= 1;
            if pending[dependent] == 0 {
                ready.push(Reverse(dependent));
            }
        }
    }

    order.into_iter().map(|g| std::mem::take(&mut groups[g])).collect()
}

/// `epic` plus every epic it waits on, directly or not
fn reachable(deps: &[BTreeSet<usize>], epic: usize) -> BTreeSet<usize> {
    let mut seen = BTreeSet::from([epic]);
    let mut stack = vec![epic];
    while let Some(next) = stack.pop() {
        for &blocker in &deps[next] {
            if seen.insert(blocker) {
                stack.push(blocker);
            }
        }
    }
    seen
}

/// How an epic got its slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// A slot was free at the planning date
    Immediate,
    /// Waited for `queued_until` to free a slot
    Queued { position: u32, queued_until: NaiveDate },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    pub epic: usize,
    pub admitted_on: NaiveDate,
    pub admission: Admission,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Slot {
    epic: usize,
    end: NaiveDate,
}

/// Team-level WIP gate
#[derive(Debug, Clone)]
pub struct WipQueue {
    limit: usize,
    active: Vec<Slot>,
    /// admitted but not yet occupying, while their group is allocated
    reserved: usize,
    queued: u32,
    windows: Vec<(usize, NaiveDate, NaiveDate)>,
}

impl WipQueue {
    pub fn new(limit: u32) -> Self {
        Self {
            limit: limit.max(1) as usize,
            active: Vec::new(),
            reserved: 0,
            queued: 0,
            windows: Vec::new(),
        }
    }

    pub fn limit(&self) -> u32 {
        self.limit as u32
    }

    /// Decide when `epic` may start. `next_workday` maps a freed date to the
    /// first workday after it.
    ///
    /// The epic holds a reserved slot until [`WipQueue::occupy`] records its
    /// end. A queued epic only takes a slot that is already occupied, so at
    /// most `limit` epics may be admitted between two `occupy` rounds.
    pub fn admit(
        &mut self,
        epic: usize,
        plan_start: NaiveDate,
        next_workday: impl Fn(NaiveDate) -> Option<NaiveDate>,
    ) -> Ticket {
        let freed_idx = self
            .active
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| a.end.cmp(&b.end).then_with(|| a.epic.cmp(&b.epic)))
            .map(|(idx, _)| idx);
        self.reserved += 1;

        let freed_idx = match freed_idx {
            Some(idx) if self.active.len() + self.reserved > self.limit => idx,
            _ => {
                tracing::debug!(epic, %plan_start, "Epic admitted");
                return Ticket {
                    epic,
                    admitted_on: plan_start,
                    admission: Admission::Immediate,
                };
            }
        };

        let freed = self.active.remove(freed_idx);
        self.queued += 1;

        let admitted_on = next_workday(freed.end)
            .or_else(|| freed.end.succ_opt())
            .unwrap_or(freed.end);
        tracing::debug!(epic, after = freed.epic, %admitted_on, position = self.queued, "Epic queued");
        Ticket {
            epic,
            admitted_on,
            admission: Admission::Queued {
                position: self.queued,
                queued_until: freed.end,
            },
        }
    }

    /// Occupy a slot for an admitted epic until its projected end.
    pub fn occupy(&mut self, ticket: &Ticket, end: NaiveDate) {
        let end = end.max(ticket.admitted_on);
        self.reserved = self.reserved.saturating_sub(1);
        self.active.push(Slot {
            epic: ticket.epic,
            end,
        });
        self.windows.push((ticket.epic, ticket.admitted_on, end));
    }

    /// Most epics active on any single day
    pub fn peak_concurrent(&self) -> u32 {
        let windows: Vec<(NaiveDate, NaiveDate)> = self.windows.iter().map(|(_, s, e)| (*s, *e)).collect();
        peak_overlap(&windows)
    }
}

/// Maximum number of inclusive `(start, end)` windows covering one day.
pub fn peak_overlap(windows: &[(NaiveDate, NaiveDate)]) -> u32 {
    // starts sort before ends on the same day, since windows are inclusive
    let mut events: Vec<(NaiveDate, i32)> = Vec::with_capacity(windows.len() * 2);
    for &(start, end) in windows {
        events.push((start, -1));
        events.push((end, 1));
    }
    events.sort();

    let mut current = 0i32;
    let mut peak = 0i32;
    for (_, kind) in events {
        current -= kind;
        peak = peak.max(current);
    }
    peak.max(0) as u32
}

/// Inputs for one role's line in the report
#[derive(Debug, Clone, Default)]
pub struct RoleInput {
    pub limit: Option<u32>,
    pub members: usize,
    pub capacity_minutes: u64,
    pub assigned_minutes: u64,
    pub unallocated_minutes: u64,
    pub windows: Vec<(NaiveDate, NaiveDate)>,
}

#[derive(Debug, Clone, Copy)]
pub struct Thresholds {
    pub idle_percent: f64,
    pub overload_percent: f64,
}

/// Assemble the WIP report from admission tickets and per-role inputs.
pub fn build_report(
    queue: &WipQueue,
    tickets: &[Ticket],
    epic_keys: &[&str],
    roles: &BTreeMap<Role, RoleInput>,
    thresholds: Thresholds,
) -> WipReport {
    let mut admitted = Vec::new();
    let mut queued = Vec::new();
    for ticket in tickets {
        let key = epic_keys[ticket.epic].to_string();
        match ticket.admission {
            Admission::Immediate => admitted.push(key),
            Admission::Queued { position, queued_until } => queued.push(QueuedEpic {
                epic_key: key,
                queue_position: position,
                queued_until,
            }),
        }
    }
    queued.sort_by_key(|q| q.queue_position);

    let any_work = roles.values().any(|r| r.assigned_minutes > 0);
    let mut role_lines = BTreeMap::new();
    let mut alerts = Vec::new();

    for (role, input) in roles {
        let capacity_hours = input.capacity_minutes as f64 / 60.0;
        let assigned_hours = input.assigned_minutes as f64 / 60.0;
        let unallocated_hours = input.unallocated_minutes as f64 / 60.0;
        let utilization_percent = if input.capacity_minutes > 0 {
            (assigned_hours / capacity_hours * 100.0).clamp(0.0, 100.0)
        } else {
            0.0
        };

        if input.unallocated_minutes > 0 {
            alerts.push(WipAlert {
                kind: AlertKind::Overload,
                role: *role,
                message: format!("{:.1}h of {} work has no capacity", unallocated_hours, role),
            });
        } else if input.members > 0 && input.capacity_minutes > 0 && utilization_percent >= thresholds.overload_percent {
            alerts.push(WipAlert {
                kind: AlertKind::Overload,
                role: *role,
                message: format!("{} utilization at {:.0}%", role, utilization_percent),
            });
        } else if any_work && input.members > 0 && utilization_percent < thresholds.idle_percent {
            alerts.push(WipAlert {
                kind: AlertKind::Idle,
                role: *role,
                message: format!("{} utilization at {:.0}%", role, utilization_percent),
            });
        }

        role_lines.insert(
            *role,
            RoleUtilization {
                limit: input.limit,
                members: input.members,
                peak_active: peak_overlap(&input.windows),
                capacity_hours,
                assigned_hours,
                unallocated_hours,
                utilization_percent,
            },
        );
    }

    WipReport {
        team_limit: queue.limit(),
        admitted,
        queued,
        peak_concurrent_epics: queue.peak_concurrent(),
        roles: role_lines,
        alerts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, day).unwrap()
    }

    fn next_day(date: NaiveDate) -> Option<NaiveDate> {
        date.succ_opt()
    }

    fn deps(list: &[&[usize]]) -> Vec<BTreeSet<usize>> {
        list.iter().map(|d| d.iter().copied().collect()).collect()
    }

    #[test]
    fn test_admission_groups_by_priority() {
        assert_eq!(admission_groups(&deps(&[&[], &[], &[]])), vec![vec![0], vec![1], vec![2]]);
    }

    #[test]
    fn test_admission_groups_respect_dependencies() {
        // epic 0 waits on epic 2
        assert_eq!(admission_groups(&deps(&[&[2], &[], &[]])), vec![vec![1], vec![2], vec![0]]);
    }

    #[test]
    fn test_mutually_dependent_epics_share_a_group() {
        assert_eq!(admission_groups(&deps(&[&[1], &[0], &[]])), vec![vec![0, 1], vec![2]]);
        // 0 -> 2 -> 1 -> 0, with 3 waiting on the loop
        assert_eq!(
            admission_groups(&deps(&[&[2], &[0], &[1], &[1]])),
            vec![vec![0, 1, 2], vec![3]]
        );
    }

    #[test]
    fn test_group_admitted_before_occupying() {
        let mut queue = WipQueue::new(2);
        let a = queue.admit(0, d(19), next_day);
        let b = queue.admit(1, d(19), next_day);
        assert_eq!(a.admission, Admission::Immediate);
        assert_eq!(b.admission, Admission::Immediate);
        queue.occupy(&a, d(21));
        queue.occupy(&b, d(23));

        // both slots held, so the next epic waits for the earlier one
        let c = queue.admit(2, d(19), next_day);
        assert_eq!(c.admitted_on, d(22));
        queue.occupy(&c, d(22));
        assert_eq!(queue.peak_concurrent(), 2);
    }

    #[test]
    fn test_queue_admits_up_to_limit() {
        let mut queue = WipQueue::new(2);
        let a = queue.admit(0, d(19), next_day);
        queue.occupy(&a, d(23));
        let b = queue.admit(1, d(19), next_day);
        queue.occupy(&b, d(21));
        assert_eq!(a.admission, Admission::Immediate);
        assert_eq!(b.admission, Admission::Immediate);

        let c = queue.admit(2, d(19), next_day);
        assert_eq!(
            c.admission,
            Admission::Queued {
                position: 1,
                queued_until: d(21)
            }
        );
        assert_eq!(c.admitted_on, d(22));
        queue.occupy(&c, d(28));
        assert_eq!(queue.peak_concurrent(), 2);
    }

    #[test]
    fn test_limit_one_serializes_epics() {
        let mut queue = WipQueue::new(1);
        let a = queue.admit(0, d(19), next_day);
        queue.occupy(&a, d(20));
        let b = queue.admit(1, d(19), next_day);
        queue.occupy(&b, d(22));
        let c = queue.admit(2, d(19), next_day);
        queue.occupy(&c, d(23));

        assert_eq!(b.admitted_on, d(21));
        assert_eq!(c.admitted_on, d(23));
        assert!(matches!(c.admission, Admission::Queued { position: 2, .. }));
        assert_eq!(queue.peak_concurrent(), 1);
    }

    #[test]
    fn test_peak_overlap() {
        assert_eq!(peak_overlap(&[]), 0);
        assert_eq!(peak_overlap(&[(d(19), d(20)), (d(21), d(22))]), 1);
        assert_eq!(peak_overlap(&[(d(19), d(20)), (d(20), d(22))]), 2);
        assert_eq!(peak_overlap(&[(d(19), d(25)), (d(20), d(21)), (d(21), d(22))]), 3);
    }

    #[test]
    fn test_report_alerts() {
        let mut queue = WipQueue::new(1);
        let t = queue.admit(0, d(19), next_day);
        queue.occupy(&t, d(20));

        let mut roles = BTreeMap::new();
        roles.insert(
            Role::Dev,
            RoleInput {
                members: 1,
                capacity_minutes: 600,
                assigned_minutes: 570,
                windows: vec![(d(19), d(20))],
                ..RoleInput::default()
            },
        );
        roles.insert(
            Role::Qa,
            RoleInput {
                members: 1,
                capacity_minutes: 600,
                assigned_minutes: 60,
                ..RoleInput::default()
            },
        );
        roles.insert(
            Role::Sa,
            RoleInput {
                unallocated_minutes: 120,
                ..RoleInput::default()
            },
        );

        let thresholds = Thresholds {
            idle_percent: 20.0,
            overload_percent: 90.0,
        };
        let report = build_report(&queue, &[t], &["E-1"], &roles, thresholds);

        assert_eq!(report.admitted, vec!["E-1".to_string()]);
        assert!((report.roles[&Role::Dev].utilization_percent - 95.0).abs() < 1e-9);
        assert_eq!(report.roles[&Role::Dev].peak_active, 1);

        let kinds: Vec<(Role, AlertKind)> = report.alerts.iter().map(|a| (a.role, a.kind)).collect();
        assert_eq!(
            kinds,
            vec![
                (Role::Sa, AlertKind::Overload),
                (Role::Dev, AlertKind::Overload),
                (Role::Qa, AlertKind::Idle)
            ]
        );
    }
}
