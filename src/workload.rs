//! Per-inspector workload metrics.
//!
//! Metrics are always recomputed from the stores; [`WorkloadSnapshot`] is the
//! only mutable view and lives for a single engine call.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::models::{Inspector, InspectorId, Route, RouteId, ZoneId};
use crate::traits::{InspectorStore, RouteStore, StoreResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkloadMetrics {
    pub inspector_id: InspectorId,
    pub current_routes: u32,
    pub max_daily_routes: u32,
    /// Rounded; above 100 signals overload.
    pub utilization_percent: u32,
    /// Negative when overloaded.
    pub available_capacity: i64,
    pub estimated_work_hours: f64,
    /// Route counts per zone; unzoned routes are not listed.
    pub zone_breakdown: BTreeMap<ZoneId, u32>,
}

/// Effect of hypothetical assignments on one inspector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkloadImpact {
    pub inspector_id: InspectorId,
    pub added_routes: Vec<RouteId>,
    pub before: WorkloadMetrics,
    pub after: WorkloadMetrics,
    pub would_exceed_capacity: bool,
}

/// Rounded utilization percentage.
///
/// An inspector without capacity counts as fully used, and each route held
/// on top of that adds another hundred percent.
pub fn utilization_percent(current_routes: u32, max_daily_routes: u32) -> u32 {
    if max_daily_routes == 0 {
        return 100 * current_routes.max(1);
    }
    (f64::from(current_routes) / f64::from(max_daily_routes) * 100.0).round() as u32
}

fn build_metrics<'r>(
    inspector: &Inspector,
    routes: impl IntoIterator<Item = &'r Route>,
) -> WorkloadMetrics {
    let mut current_routes = 0u32;
    let mut minutes = 0u64;
    let mut zone_breakdown = BTreeMap::new();

    for route in routes {
        current_routes += 1;
        minutes += u64::from(route.estimated_duration_minutes);
        if let Some(zone) = route.zone_id {
            *zone_breakdown.entry(zone).or_insert(0) += 1;
        }
    }

    WorkloadMetrics {
        inspector_id: inspector.id,
        current_routes,
        max_daily_routes: inspector.max_daily_routes,
        utilization_percent: utilization_percent(current_routes, inspector.max_daily_routes),
        available_capacity: i64::from(inspector.max_daily_routes) - i64::from(current_routes),
        estimated_work_hours: minutes as f64 / 60.0,
        zone_breakdown,
    }
}

pub struct WorkloadCalculator<'a, S> {
    store: &'a S,
}

impl<'a, S> WorkloadCalculator<'a, S>
where
    S: InspectorStore + RouteStore,
{
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Routes currently held by the inspector (assigned or in progress).
    fn held_routes(&self, inspector_id: InspectorId) -> StoreResult<Vec<Route>> {
        let mut routes = self.store.routes_by_inspector(inspector_id)?;
        routes.retain(|route| route.status.holds_inspector());
        Ok(routes)
    }

    pub fn metrics_for(&self, inspector_id: InspectorId) -> StoreResult<Option<WorkloadMetrics>> {
        match self.store.inspector(inspector_id)? {
            Some(inspector) => self.metrics_for_inspector(&inspector).map(Some),
            None => Ok(None),
        }
    }

    pub fn metrics_for_inspector(&self, inspector: &Inspector) -> StoreResult<WorkloadMetrics> {
        let routes = self.held_routes(inspector.id)?;
        Ok(build_metrics(inspector, &routes))
    }

    /// Metrics for every active inspector, most utilized first.
    pub fn metrics_for_all_active(&self) -> StoreResult<Vec<WorkloadMetrics>> {
        let inspectors = self.store.active_inspectors()?;
        let mut metrics = self.metrics_for_inspectors(&inspectors)?;
        metrics.sort_by(|a, b| b.utilization_percent.cmp(&a.utilization_percent));
        Ok(metrics)
    }

    /// Metrics in the given inspector order.
    pub fn metrics_for_inspectors(
        &self,
        inspectors: &[Inspector],
    ) -> StoreResult<Vec<WorkloadMetrics>> {
        inspectors
            .iter()
            .map(|inspector| self.metrics_for_inspector(inspector))
            .collect()
    }

    /// Active inspectors with at least `min_capacity` free slots, optionally
    /// restricted to those preferring `zone_id`, most capacity first.
    pub fn inspectors_with_capacity(
        &self,
        min_capacity: i64,
        zone_id: Option<ZoneId>,
    ) -> StoreResult<Vec<WorkloadMetrics>> {
        let inspectors: Vec<Inspector> = self
            .store
            .active_inspectors()?
            .into_iter()
            .filter(|inspector| zone_id.is_none() || inspector.prefers_zone(zone_id))
            .collect();

        let mut metrics = self.metrics_for_inspectors(&inspectors)?;
        metrics.retain(|m| m.available_capacity >= min_capacity);
        metrics.sort_by(|a, b| b.available_capacity.cmp(&a.available_capacity));
        Ok(metrics)
    }

    /// Before/after metrics for uncommitted `(route, inspector)` pairs.
    ///
    /// Nothing is written. Unknown routes or inspectors are skipped, as are
    /// routes the inspector already holds.
    pub fn predict_impact(
        &self,
        pairs: &[(RouteId, InspectorId)],
    ) -> StoreResult<Vec<WorkloadImpact>> {
        let mut order: Vec<InspectorId> = Vec::new();
        let mut additions: HashMap<InspectorId, Vec<Route>> = HashMap::new();

        for &(route_id, inspector_id) in pairs {
            let Some(route) = self.store.route(route_id)? else {
                continue;
            };
            let entry = additions.entry(inspector_id).or_insert_with(|| {
                order.push(inspector_id);
                Vec::new()
            });
            if !entry.iter().any(|added| added.id == route.id) {
                entry.push(route);
            }
        }

        let mut impacts = Vec::with_capacity(order.len());
        for inspector_id in order {
            let Some(inspector) = self.store.inspector(inspector_id)? else {
                continue;
            };
            let held = self.held_routes(inspector_id)?;
            let added: Vec<Route> = additions
                .remove(&inspector_id)
                .unwrap_or_default()
                .into_iter()
                .filter(|route| !held.iter().any(|h| h.id == route.id))
                .collect();

            let before = build_metrics(&inspector, &held);
            let after = build_metrics(&inspector, held.iter().chain(added.iter()));
            impacts.push(WorkloadImpact {
                inspector_id,
                added_routes: added.iter().map(|route| route.id).collect(),
                would_exceed_capacity: after.available_capacity < 0,
                before,
                after,
            });
        }

        Ok(impacts)
    }

    /// Snapshot of the given inspectors for one engine call.
    pub fn snapshot(&self, inspectors: &[Inspector]) -> StoreResult<WorkloadSnapshot> {
        Ok(WorkloadSnapshot::from_metrics(&self.metrics_for_inspectors(inspectors)?))
    }
}

/// Load of one inspector inside a [`WorkloadSnapshot`].
#[derive(Debug, Clone, PartialEq)]
pub struct InspectorLoad {
    pub inspector_id: InspectorId,
    pub current_routes: u32,
    pub max_daily_routes: u32,
    /// Minutes of work already booked for the day.
    pub booked_minutes: i64,
}

impl InspectorLoad {
    pub fn utilization(&self) -> f64 {
        f64::from(utilization_percent(self.current_routes, self.max_daily_routes))
    }

    pub fn available_capacity(&self) -> i64 {
        i64::from(self.max_daily_routes) - i64::from(self.current_routes)
    }

    /// Utilization after taking one more route.
    pub fn utilization_with_one_more(&self) -> f64 {
        f64::from(utilization_percent(self.current_routes + 1, self.max_daily_routes))
    }
}

/// Mutable workload accumulator owned by a single engine call.
///
/// Every assignment or move made during the call is recorded here so later
/// decisions in the same call see it. It is never written back.
#[derive(Debug, Clone, Default)]
pub struct WorkloadSnapshot {
    loads: Vec<InspectorLoad>,
    index: HashMap<InspectorId, usize>,
}

impl WorkloadSnapshot {
    pub fn from_metrics(metrics: &[WorkloadMetrics]) -> Self {
        let mut snapshot = Self::default();
        for m in metrics {
            snapshot.insert(InspectorLoad {
                inspector_id: m.inspector_id,
                current_routes: m.current_routes,
                max_daily_routes: m.max_daily_routes,
                booked_minutes: (m.estimated_work_hours * 60.0).round() as i64,
            });
        }
        snapshot
    }

    pub fn insert(&mut self, load: InspectorLoad) {
        match self.index.get(&load.inspector_id) {
            Some(&slot) => self.loads[slot] = load,
            None => {
                self.index.insert(load.inspector_id, self.loads.len());
                self.loads.push(load);
            }
        }
    }

    pub fn get(&self, inspector_id: InspectorId) -> Option<&InspectorLoad> {
        self.index.get(&inspector_id).map(|&slot| &self.loads[slot])
    }

    fn get_mut(&mut self, inspector_id: InspectorId) -> Option<&mut InspectorLoad> {
        self.index.get(&inspector_id).map(|&slot| &mut self.loads[slot])
    }

    /// Loads in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &InspectorLoad> {
        self.loads.iter()
    }

    pub fn len(&self) -> usize {
        self.loads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loads.is_empty()
    }

    pub fn record_assignment(&mut self, inspector_id: InspectorId, minutes: u32) {
        if let Some(load) = self.get_mut(inspector_id) {
            load.current_routes += 1;
            load.booked_minutes += i64::from(minutes);
        }
    }

    pub fn record_removal(&mut self, inspector_id: InspectorId, minutes: u32) {
        if let Some(load) = self.get_mut(inspector_id) {
            load.current_routes = load.current_routes.saturating_sub(1);
            load.booked_minutes = (load.booked_minutes - i64::from(minutes)).max(0);
        }
    }

    pub fn transfer(&mut self, from: InspectorId, to: InspectorId, minutes: u32) {
        self.record_removal(from, minutes);
        self.record_assignment(to, minutes);
    }

    /// Utilization of every inspector, in insertion order.
    pub fn utilizations(&self) -> Vec<f64> {
        self.loads.iter().map(InspectorLoad::utilization).collect()
    }
}
