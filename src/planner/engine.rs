//! Orchestrator: one team snapshot in, one `PlanningResult` out.
//!
//! A run sequences the planner stages:
//! 1. Select eligible epics and their open stories, in priority order
//! 2. Build the dependency graph over that batch and break cycles
//! 3. Group epics by cross-epic dependencies and order the groups
//! 4. Admit epics through the WIP queue and allocate their stories
//! 5. Aggregate stories, epics, utilization and WIP telemetry
//!
//! The engine holds no state between runs; every collaborator is read-only,
//! so one engine can plan several teams from different threads at once.

use chrono::{Days, NaiveDate};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::calendar::{WorkCalendar, Workdays, workday_after, workday_on_or_after};
use crate::domain::{Epic, PlanningWarning, Role, TeamMember, WarningKind, WorkItem, compare_priority};
use crate::error::Result;
use crate::planner::aggregate;
use crate::planner::allocator::{Allocator, StoryAllocation, capacity_minutes};
use crate::planner::config::PlannerConfig;
use crate::planner::graph::{DependencyGraph, GraphNode};
use crate::planner::policy::{
    AssigneeSelector, ConfidencePolicy, CycleBreakPolicy, LeastLoaded, LowestScoreSource, WarningConfidence,
};
use crate::planner::result::{PlannedEpic, PlanningResult};
use crate::planner::wip::{self, RoleInput, Thresholds, Ticket, WipQueue};
use crate::snapshot::{ScoreProvider, SnapshotProvider, TeamSnapshot};

/// A story in the planning batch
struct BatchItem<'a> {
    story: &'a WorkItem,
    score: f64,
    /// Index into the priority-ordered epic list
    epic: usize,
}

pub struct PlanningEngine {
    provider: Arc<dyn SnapshotProvider>,
    calendar: Arc<dyn WorkCalendar>,
    scores: Option<Arc<dyn ScoreProvider>>,
    selector: Arc<dyn AssigneeSelector>,
    cycle_policy: Arc<dyn CycleBreakPolicy>,
    confidence: Arc<dyn ConfidencePolicy>,
    config: PlannerConfig,
}

impl PlanningEngine {
    pub fn new(provider: Arc<dyn SnapshotProvider>, calendar: Arc<dyn WorkCalendar>) -> Self {
        Self {
            provider,
            calendar,
            scores: None,
            selector: Arc::new(LeastLoaded),
            cycle_policy: Arc::new(LowestScoreSource),
            confidence: Arc::new(WarningConfidence),
            config: PlannerConfig::default(),
        }
    }

    pub fn with_config(mut self, config: PlannerConfig) -> Self {
        self.config = config;
        self
    }

    /// Override snapshot autoScores with an external source.
    pub fn with_scores(mut self, scores: Arc<dyn ScoreProvider>) -> Self {
        self.scores = Some(scores);
        self
    }

    pub fn with_selector(mut self, selector: Arc<dyn AssigneeSelector>) -> Self {
        self.selector = selector;
        self
    }

    pub fn with_cycle_policy(mut self, policy: Arc<dyn CycleBreakPolicy>) -> Self {
        self.cycle_policy = policy;
        self
    }

    pub fn with_confidence_policy(mut self, policy: Arc<dyn ConfidencePolicy>) -> Self {
        self.confidence = policy;
        self
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Load `team_id` from the provider and plan it as of `planning_date`.
    pub fn calculate_plan(&self, team_id: &str, planning_date: NaiveDate) -> Result<PlanningResult> {
        let snapshot = self.provider.load_team(team_id)?;
        self.plan(&snapshot, planning_date)
    }

    /// Plan an already loaded snapshot.
    pub fn plan(&self, snapshot: &TeamSnapshot, planning_date: NaiveDate) -> Result<PlanningResult> {
        self.config.validate()?;
        snapshot.validate()?;

        let team = &snapshot.team;
        let country = team
            .country_code
            .as_deref()
            .unwrap_or(self.config.default_country.as_str());
        let calendar = self.calendar.as_ref();
        let horizon_days = self.config.horizon_days;
        let horizon_end = planning_date
            .checked_add_days(Days::new(u64::from(horizon_days)))
            .unwrap_or(NaiveDate::MAX);
        let plan_start = workday_on_or_after(calendar, country, planning_date, horizon_days).unwrap_or(planning_date);

        tracing::info!(team = %team.id, %planning_date, %plan_start, "Planning team");

        let epics = self.eligible_epics(snapshot);
        let batch = self.batch(snapshot, &epics);
        let mut warnings: Vec<PlanningWarning> = Vec::new();

        let nodes: Vec<GraphNode<'_>> = batch
            .iter()
            .map(|item| GraphNode {
                key: &item.story.key,
                score: item.score,
                blocked_by: &item.story.blocked_by,
            })
            .collect();
        let graph = DependencyGraph::build(&nodes, self.cycle_policy.as_ref(), &mut warnings);

        let mut epic_deps: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); epics.len()];
        for (idx, item) in batch.iter().enumerate() {
            for &blocker in graph.blockers(idx) {
                let other = batch[blocker].epic;
                if other != item.epic {
                    epic_deps[item.epic].insert(other);
                }
            }
        }
        let members: Vec<&TeamMember> = team.active_members().collect();
        let mut allocator = Allocator::new(
            calendar,
            country,
            horizon_end,
            members,
            snapshot,
            self.selector.as_ref(),
            team.wip.roles.clone(),
        );

        let wip_limit = team.wip.epics.unwrap_or(self.config.default_wip_limit);
        let mut queue = WipQueue::new(wip_limit);
        let next_workday = |date: NaiveDate| {
            let remaining = (horizon_end - date).num_days().max(0) as u32;
            workday_after(calendar, country, date, remaining)
        };

        // epics with no open stories take no slot
        let mut has_stories = vec![false; epics.len()];
        for item in &batch {
            has_stories[item.epic] = true;
        }

        // mutually dependent epics are admitted together, at most `limit` at a time
        let mut rounds: Vec<Vec<usize>> = Vec::new();
        for group in wip::admission_groups(&epic_deps) {
            let group: Vec<usize> = group.into_iter().filter(|&e| has_stories[e]).collect();
            rounds.extend(group.chunks(queue.limit() as usize).map(<[usize]>::to_vec));
        }
        let mut round_of = vec![usize::MAX; epics.len()];
        for (round, list) in rounds.iter().enumerate() {
            for &epic in list {
                round_of[epic] = round;
            }
        }

        // an edge into a later round can never be met without exceeding the limit
        let honoured = |idx: usize, blocker: usize| round_of[batch[blocker].epic] <= round_of[batch[idx].epic];
        for (idx, item) in batch.iter().enumerate() {
            for &blocker in graph.blockers(idx) {
                if honoured(idx, blocker) {
                    continue;
                }
                let ours = &epics[item.epic].0.key;
                let theirs = &epics[batch[blocker].epic].0.key;
                tracing::debug!(story = %item.story.key, blocker = %batch[blocker].story.key, "Dropping cross-epic edge");
                warnings.push(PlanningWarning::new(
                    &item.story.key,
                    WarningKind::CircularDependency,
                    format!(
                        "epics {} and {} depend on each other and cannot share the WIP limit of {}; ignoring {} blocked by {}",
                        ours,
                        theirs,
                        queue.limit(),
                        item.story.key,
                        batch[blocker].story.key
                    ),
                ));
            }
        }

        let mut allocations: Vec<StoryAllocation> = vec![StoryAllocation::default(); batch.len()];
        let mut tickets: Vec<Option<Ticket>> = vec![None; epics.len()];
        let mut admitted: Vec<Ticket> = Vec::with_capacity(epics.len());

        for (round, list) in rounds.iter().enumerate() {
            for &epic in list {
                let ticket = queue.admit(epic, plan_start, &next_workday);
                tickets[epic] = Some(ticket);
                admitted.push(ticket);
            }

            let mut epic_end: BTreeMap<usize, NaiveDate> = BTreeMap::new();
            for &idx in graph.topological_order() {
                let epic = batch[idx].epic;
                if round_of[epic] != round {
                    continue;
                }
                let Some(ticket) = tickets[epic] else {
                    continue;
                };

                let not_before = if graph.can_start(idx) {
                    ticket.admitted_on
                } else {
                    graph
                        .blockers(idx)
                        .iter()
                        .filter(|&&blocker| honoured(idx, blocker))
                        .filter_map(|&blocker| allocations[blocker].end_date())
                        .fold(ticket.admitted_on, NaiveDate::max)
                };

                let allocation = allocator.allocate_story(batch[idx].story, not_before, &mut warnings);
                if let Some(end) = allocation.end_date() {
                    let slot = epic_end.entry(epic).or_insert(end);
                    *slot = (*slot).max(end);
                }
                allocations[idx] = allocation;
            }

            for &epic in list {
                if let Some(ticket) = tickets[epic] {
                    let end = epic_end.get(&epic).copied().unwrap_or(ticket.admitted_on);
                    queue.occupy(&ticket, end);
                }
            }
        }

        let plan_end = allocations
            .iter()
            .filter_map(StoryAllocation::end_date)
            .max()
            .unwrap_or(plan_start);

        let mut planned_epics: Vec<PlannedEpic> = Vec::with_capacity(epics.len());
        for (epic_idx, (epic, score)) in epics.iter().enumerate() {
            let stories = batch
                .iter()
                .enumerate()
                .filter(|(_, item)| item.epic == epic_idx)
                .map(|(idx, item)| {
                    let story_warnings = warnings
                        .iter()
                        .filter(|w| w.item_key == item.story.key)
                        .cloned()
                        .collect();
                    aggregate::plan_story(item.story, item.score, allocations[idx].clone(), story_warnings)
                })
                .collect();
            planned_epics.push(aggregate::plan_epic(
                epic,
                *score,
                stories,
                tickets[epic_idx].as_ref(),
                self.confidence.as_ref(),
            ));
        }

        let workdays = Workdays::until(calendar, country, plan_start, plan_end).count() as u64;
        let mut roles: BTreeMap<Role, RoleInput> = BTreeMap::new();
        for role in Role::PIPELINE {
            let mut input = RoleInput {
                limit: team.wip.role_limit(role),
                unallocated_minutes: allocator.unallocated_minutes(role),
                windows: allocator.windows(role).iter().map(|w| (w.start, w.end)).collect(),
                ..RoleInput::default()
            };
            for (member, load) in allocator.members().iter().zip(allocator.loads()) {
                if member.can_work(role) {
                    input.members += 1;
                    input.capacity_minutes += u64::from(capacity_minutes(member.hours_per_day)) * workdays;
                    input.assigned_minutes += u64::from(load.total_minutes());
                }
            }
            roles.insert(role, input);
        }

        let epic_keys: Vec<&str> = epics.iter().map(|(epic, _)| epic.key.as_str()).collect();
        let thresholds = Thresholds {
            idle_percent: self.config.idle_threshold_percent,
            overload_percent: self.config.overload_threshold_percent,
        };
        let wip_report = wip::build_report(&queue, &admitted, &epic_keys, &roles, thresholds);

        tracing::info!(
            team = %team.id,
            epics = planned_epics.len(),
            stories = batch.len(),
            warnings = warnings.len(),
            cycles_broken = graph.dropped_edges().len(),
            "Plan complete"
        );

        Ok(PlanningResult {
            team_id: team.id.clone(),
            planning_date,
            epics: planned_epics,
            assignee_utilization: aggregate::assignee_utilization(allocator.members(), allocator.loads()),
            warnings,
            wip: wip_report,
        })
    }

    /// External score if one is configured, else the snapshot's own
    fn score_of(&self, snapshot: &TeamSnapshot, key: &str) -> f64 {
        self.scores
            .as_ref()
            .and_then(|s| s.auto_score(key))
            .filter(|v| v.is_finite())
            .or_else(|| snapshot.auto_score(key))
            .unwrap_or(0.0)
    }

    /// Open, in-scope epics with their effective scores, most urgent first
    fn eligible_epics<'a>(&self, snapshot: &'a TeamSnapshot) -> Vec<(&'a Epic, f64)> {
        let mut epics: Vec<(&Epic, f64)> = snapshot
            .epics
            .iter()
            .filter(|e| !self.config.is_done(&e.status) && !self.config.is_excluded(&e.status))
            .map(|e| (e, self.score_of(snapshot, &e.key)))
            .collect();
        epics.sort_by(|a, b| compare_priority(a.1, &a.0.key, b.1, &b.0.key));
        epics
    }

    /// Open stories, grouped by epic rank and ordered by priority inside each
    fn batch<'a>(&self, snapshot: &TeamSnapshot, epics: &[(&'a Epic, f64)]) -> Vec<BatchItem<'a>> {
        let mut batch = Vec::new();
        for (rank, (epic, _)) in epics.iter().enumerate() {
            let mut stories: Vec<BatchItem<'a>> = epic
                .stories
                .iter()
                .filter(|s| !self.config.is_done(&s.status))
                .map(|story| BatchItem {
                    story,
                    score: self.score_of(snapshot, &story.key),
                    epic: rank,
                })
                .collect();
            stories.sort_by(|a, b| compare_priority(a.score, &a.story.key, b.score, &b.story.key));
            batch.extend(stories);
        }
        batch
    }
}
