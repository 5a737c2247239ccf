//! Baseline route-to-inspector assignment.
//!
//! Routes are processed in input order. Every placement is claimed through
//! the store and recorded in a per-call [`WorkloadSnapshot`], so later routes
//! in the same batch see the reduced capacity.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{AssignmentOptions, DispatchConfig};
use crate::error::DispatchResult;
use crate::models::{
    Inspector, InspectorId, Route, RouteId, RoutePriority, RouteStatus, WeeklyAvailability,
};
use crate::schedule::{default_start, open_slot};
use crate::scoring::candidate_score;
use crate::traits::DispatchStore;
use crate::workload::{WorkloadCalculator, WorkloadSnapshot};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub route_id: RouteId,
    pub inspector_id: InspectorId,
    pub assigned_at: DateTime<Utc>,
    pub estimated_start_time: DateTime<Utc>,
    pub estimated_end_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentSummary {
    /// Routes that existed and were pending when processed.
    pub total_routes: usize,
    pub assigned_routes: usize,
    pub unassigned_routes: usize,
}

/// A route moved between inspectors, applied or suggested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteMove {
    pub route_id: RouteId,
    pub from_inspector_id: InspectorId,
    pub to_inspector_id: InspectorId,
    pub priority: RoutePriority,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssignmentResult {
    pub assignments: Vec<Assignment>,
    pub unassigned_routes: Vec<RouteId>,
    pub summary: AssignmentSummary,
    /// Moves applied by automatic rebalancing.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rebalanced: Vec<RouteMove>,
}

impl AssignmentResult {
    pub fn new(assignments: Vec<Assignment>, unassigned_routes: Vec<RouteId>) -> Self {
        let mut result = Self {
            assignments,
            unassigned_routes,
            ..Self::default()
        };
        result.refresh_summary();
        result
    }

    pub fn refresh_summary(&mut self) {
        self.summary = AssignmentSummary {
            total_routes: self.assignments.len() + self.unassigned_routes.len(),
            assigned_routes: self.assignments.len(),
            unassigned_routes: self.unassigned_routes.len(),
        };
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssignmentRecommendations {
    pub overloaded_inspectors: Vec<InspectorId>,
    pub underutilized_inspectors: Vec<InspectorId>,
}

/// Best inspector found for one route.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    inspector_id: InspectorId,
    score: f64,
    start: DateTime<Utc>,
}

/// First candidate wins exact ties.
fn best_of(candidates: impl Iterator<Item = Candidate>) -> Option<Candidate> {
    candidates.fold(None, |best: Option<Candidate>, candidate| match best {
        Some(current) if current.score >= candidate.score => Some(current),
        _ => Some(candidate),
    })
}

/// Read-only inputs shared by every route of one batch.
struct BatchContext<'b> {
    inspectors: &'b [Inspector],
    availability: &'b HashMap<InspectorId, WeeklyAvailability>,
    options: &'b AssignmentOptions,
    excluded: Option<InspectorId>,
    now: DateTime<Utc>,
}

pub struct AssignmentEngine<'a, S> {
    store: &'a S,
    config: DispatchConfig,
}

impl<'a, S> AssignmentEngine<'a, S>
where
    S: DispatchStore,
{
    pub fn new(store: &'a S) -> Self {
        Self::with_config(store, DispatchConfig::default())
    }

    pub fn with_config(store: &'a S, config: DispatchConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Assigns the given routes; default options when `options` is `None`.
    pub fn assign_routes(
        &self,
        route_ids: &[RouteId],
        options: Option<&AssignmentOptions>,
    ) -> DispatchResult<AssignmentResult> {
        self.assign_routes_at(route_ids, options, Utc::now())
    }

    /// [`assign_routes`](Self::assign_routes) with an explicit clock.
    pub fn assign_routes_at(
        &self,
        route_ids: &[RouteId],
        options: Option<&AssignmentOptions>,
        now: DateTime<Utc>,
    ) -> DispatchResult<AssignmentResult> {
        let defaults = AssignmentOptions::default();
        self.run_batch(route_ids, options.unwrap_or(&defaults), None, now)
    }

    pub fn assign_all_pending_routes(&self) -> DispatchResult<AssignmentResult> {
        let pending: Vec<RouteId> = self
            .store
            .routes_by_status(RouteStatus::Pending)?
            .into_iter()
            .map(|route| route.id)
            .collect();
        self.run_batch(&pending, &AssignmentOptions::default(), None, Utc::now())
    }

    /// Releases every route the inspector holds in `assigned` status and
    /// places them again, never back with the same inspector.
    pub fn reassign_inspector_routes(
        &self,
        inspector_id: InspectorId,
    ) -> DispatchResult<AssignmentResult> {
        if self.store.inspector(inspector_id)?.is_none() {
            debug!(inspector_id, "reassignment requested for unknown inspector");
            return Ok(AssignmentResult::default());
        }

        let mut released = Vec::new();
        for route in self.store.routes_by_inspector(inspector_id)? {
            if route.status == RouteStatus::Assigned && self.store.unassign_route(route.id)? {
                released.push(route.id);
            }
        }
        info!(inspector_id, released = released.len(), "released routes for reassignment");

        self.run_batch(&released, &AssignmentOptions::default(), Some(inspector_id), Utc::now())
    }

    pub fn get_assignment_recommendations(&self) -> DispatchResult<AssignmentRecommendations> {
        let metrics = WorkloadCalculator::new(self.store).metrics_for_all_active()?;
        let mut recommendations = AssignmentRecommendations::default();
        for m in metrics {
            let utilization = f64::from(m.utilization_percent);
            if utilization > self.config.overload_percent {
                recommendations.overloaded_inspectors.push(m.inspector_id);
            } else if utilization < self.config.low_utilization_percent {
                recommendations.underutilized_inspectors.push(m.inspector_id);
            }
        }
        Ok(recommendations)
    }

    pub(crate) fn run_batch(
        &self,
        route_ids: &[RouteId],
        options: &AssignmentOptions,
        excluded: Option<InspectorId>,
        now: DateTime<Utc>,
    ) -> DispatchResult<AssignmentResult> {
        options.validate()?;
        if route_ids.is_empty() {
            return Ok(AssignmentResult::default());
        }

        let inspectors = self.store.active_inspectors()?;
        let mut snapshot = WorkloadCalculator::new(self.store).snapshot(&inspectors)?;
        let availability = if options.consider_availability {
            self.load_availability(&inspectors)?
        } else {
            HashMap::new()
        };
        let ctx = BatchContext {
            inspectors: &inspectors,
            availability: &availability,
            options,
            excluded,
            now,
        };

        let mut assignments = Vec::new();
        let mut unassigned = Vec::new();
        let mut seen = HashSet::new();

        for &route_id in route_ids {
            if !seen.insert(route_id) {
                continue;
            }
            let Some(route) = self.store.route(route_id)? else {
                debug!(route_id, "skipping unknown route");
                continue;
            };
            if route.status != RouteStatus::Pending {
                debug!(route_id, status = ?route.status, "skipping route that is not pending");
                continue;
            }

            let Some(candidate) = self.best_candidate(&route, &snapshot, &ctx) else {
                debug!(route_id, zone_id = ?route.zone_id, "no eligible inspector");
                unassigned.push(route_id);
                continue;
            };

            if !self.store.claim_route(route_id, candidate.inspector_id)? {
                debug!(route_id, "route claimed elsewhere, skipping");
                continue;
            }

            snapshot.record_assignment(candidate.inspector_id, route.estimated_duration_minutes);
            assignments.push(Assignment {
                route_id,
                inspector_id: candidate.inspector_id,
                assigned_at: now,
                estimated_start_time: candidate.start,
                estimated_end_time: candidate.start
                    + Duration::minutes(i64::from(route.estimated_duration_minutes)),
            });
        }

        let result = AssignmentResult::new(assignments, unassigned);
        info!(
            total = result.summary.total_routes,
            assigned = result.summary.assigned_routes,
            unassigned = result.summary.unassigned_routes,
            "assignment batch finished"
        );
        Ok(result)
    }

    fn load_availability(
        &self,
        inspectors: &[Inspector],
    ) -> DispatchResult<HashMap<InspectorId, WeeklyAvailability>> {
        let mut availability = HashMap::new();
        for inspector in inspectors {
            if let Some(weekly) = self.store.weekly_availability(inspector.id)? {
                availability.insert(inspector.id, weekly);
            }
        }
        Ok(availability)
    }

    fn best_candidate(
        &self,
        route: &Route,
        snapshot: &WorkloadSnapshot,
        ctx: &BatchContext<'_>,
    ) -> Option<Candidate> {
        let evaluate = |inspector: &Inspector| self.evaluate(inspector, route, snapshot, ctx);

        if ctx.options.prioritize_zone_preference {
            let preferred = best_of(
                ctx.inspectors
                    .iter()
                    .filter(|inspector| inspector.prefers_zone(route.zone_id))
                    .filter_map(evaluate),
            );
            if preferred.is_some() || !ctx.options.allow_cross_zone_assignment {
                return preferred;
            }
        }

        best_of(ctx.inspectors.iter().filter_map(evaluate))
    }

    fn evaluate(
        &self,
        inspector: &Inspector,
        route: &Route,
        snapshot: &WorkloadSnapshot,
        ctx: &BatchContext<'_>,
    ) -> Option<Candidate> {
        if ctx.excluded == Some(inspector.id) {
            return None;
        }
        let load = snapshot.get(inspector.id)?;
        if load.utilization() > ctx.options.max_utilization_threshold
            || load.available_capacity() <= 0
        {
            return None;
        }

        let start = if ctx.options.consider_availability {
            ctx.availability.get(&inspector.id).and_then(|weekly| {
                open_slot(
                    weekly,
                    ctx.now,
                    load.booked_minutes,
                    route.estimated_duration_minutes,
                )
            })
        } else {
            Some(default_start(ctx.now, self.config.default_shift_start, load.booked_minutes))
        };

        let score = candidate_score(
            inspector,
            route.zone_id,
            route.priority,
            load.utilization(),
            start.is_some(),
            ctx.options,
        )?;

        Some(Candidate {
            inspector_id: inspector.id,
            score,
            start: start?,
        })
    }
}
