//! Assignment optimizer: cross-zone rescue, rebalancing and validation
//! layered over the baseline pass.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::assignment::{Assignment, AssignmentEngine, AssignmentResult, RouteMove};
use crate::config::{AssignmentOptions, DispatchConfig, OptimizationStrategy, OptimizerOptions};
use crate::error::DispatchResult;
use crate::models::{Coordinate, Inspector, InspectorId, Route, RouteId, RouteStatus, ZoneId};
use crate::schedule::{default_start, open_slot};
use crate::scoring::{RescueFactors, rescue_score};
use crate::traits::{DispatchStore, DistanceFunction, ZoneStore};
use crate::workload::{WorkloadCalculator, WorkloadSnapshot};

/// Estimated travel between a route's zone and an inspector's zones.
pub trait ZoneDistanceEstimator {
    fn estimate_km(&self, route_zone: Option<ZoneId>, inspector: &Inspector) -> DispatchResult<f64>;
}

/// Zero within a preferred zone, a constant otherwise.
#[derive(Debug, Clone, Copy)]
pub struct FixedZoneDistance {
    pub cross_zone_km: f64,
}

impl Default for FixedZoneDistance {
    fn default() -> Self {
        Self { cross_zone_km: 10.0 }
    }
}

impl ZoneDistanceEstimator for FixedZoneDistance {
    fn estimate_km(
        &self,
        route_zone: Option<ZoneId>,
        inspector: &Inspector,
    ) -> DispatchResult<f64> {
        if inspector.prefers_zone(route_zone) {
            Ok(0.0)
        } else {
            Ok(self.cross_zone_km)
        }
    }
}

/// Distance from the route zone's centroid to the closest centroid among
/// the inspector's preferred zones.
///
/// Falls back to `fallback_km` when either side has no usable geometry.
pub struct CentroidZoneDistance<'a, Z, D> {
    zones: &'a Z,
    distance: &'a D,
    fallback_km: f64,
}

impl<'a, Z, D> CentroidZoneDistance<'a, Z, D> {
    pub fn new(zones: &'a Z, distance: &'a D, fallback_km: f64) -> Self {
        Self {
            zones,
            distance,
            fallback_km,
        }
    }
}

impl<Z, D> CentroidZoneDistance<'_, Z, D>
where
    Z: ZoneStore,
{
    fn centroid(&self, zone_id: ZoneId) -> DispatchResult<Option<Coordinate>> {
        Ok(self
            .zones
            .zone(zone_id)?
            .and_then(|zone| zone.centroid())
            .map(|(lat, lng)| Coordinate::new(lat, lng)))
    }
}

impl<Z, D> ZoneDistanceEstimator for CentroidZoneDistance<'_, Z, D>
where
    Z: ZoneStore,
    D: DistanceFunction,
{
    fn estimate_km(
        &self,
        route_zone: Option<ZoneId>,
        inspector: &Inspector,
    ) -> DispatchResult<f64> {
        if inspector.prefers_zone(route_zone) {
            return Ok(0.0);
        }
        let Some(route_zone) = route_zone else {
            return Ok(self.fallback_km);
        };
        let Some(route_centroid) = self.centroid(route_zone)? else {
            return Ok(self.fallback_km);
        };

        let mut closest: Option<f64> = None;
        for &zone_id in &inspector.preferred_zone_ids {
            if let Some(centroid) = self.centroid(zone_id)? {
                let km = self.distance.distance_meters(&route_centroid, &centroid)? / 1000.0;
                closest = Some(closest.map_or(km, |best| best.min(km)));
            }
        }
        Ok(closest.unwrap_or(self.fallback_km))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    CapacityExceeded,
    /// The store no longer shows the recorded assignment.
    AssignmentMismatch,
    CrossZoneAssignment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictSeverity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentConflict {
    pub kind: ConflictKind,
    pub severity: ConflictSeverity,
    pub inspector_id: Option<InspectorId>,
    pub route_id: Option<RouteId>,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationMetrics {
    pub total_assignments: usize,
    pub cross_zone_assignments: usize,
    /// Population standard deviation of utilization, in percentage points.
    pub utilization_variance: f64,
    pub average_utilization: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentValidationResult {
    pub is_valid: bool,
    pub conflicts: Vec<AssignmentConflict>,
    pub metrics: ValidationMetrics,
    /// Advisory moves; nothing has been applied.
    pub suggestions: Vec<RouteMove>,
}

/// Baseline options adjusted for the chosen strategy.
fn baseline_options(
    strategy: OptimizationStrategy,
    options: &OptimizerOptions,
) -> AssignmentOptions {
    let base = &options.assignment;
    match strategy {
        OptimizationStrategy::Balanced => base.clone(),
        OptimizationStrategy::ZonePriority => AssignmentOptions {
            prioritize_zone_preference: true,
            allow_cross_zone_assignment: base.allow_cross_zone_assignment
                && !options.enable_cross_zone_optimization,
            ..base.clone()
        },
        OptimizationStrategy::Efficiency => AssignmentOptions {
            balance_workload: false,
            ..base.clone()
        },
    }
}

fn mean_and_std_dev(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let count = values.len() as f64;
    let mean = values.iter().sum::<f64>() / count;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / count;
    (mean, variance.sqrt())
}

/// Least utilized inspector below the rebalancing target with spare
/// capacity. First in snapshot order wins ties.
fn rebalance_target(
    snapshot: &WorkloadSnapshot,
    source: InspectorId,
    config: &DispatchConfig,
) -> Option<InspectorId> {
    snapshot
        .iter()
        .filter(|load| {
            load.inspector_id != source
                && load.utilization() < config.rebalance_target_percent
                && load.available_capacity() > 0
        })
        .fold(None, |best: Option<(InspectorId, f64)>, load| match best {
            Some((_, utilization)) if utilization <= load.utilization() => best,
            _ => Some((load.inspector_id, load.utilization())),
        })
        .map(|(inspector_id, _)| inspector_id)
}

/// Moves lowest-priority routes off overloaded inspectors.
///
/// `commit` decides whether a move takes effect; only committed moves update
/// the snapshot and are returned.
fn plan_moves<F>(
    snapshot: &mut WorkloadSnapshot,
    holdings: &HashMap<InspectorId, Vec<Route>>,
    config: &DispatchConfig,
    mut commit: F,
) -> DispatchResult<Vec<RouteMove>>
where
    F: FnMut(&RouteMove) -> DispatchResult<bool>,
{
    let mut overloaded: Vec<(InspectorId, f64)> = snapshot
        .iter()
        .filter(|load| load.utilization() > config.overload_percent)
        .map(|load| (load.inspector_id, load.utilization()))
        .collect();
    overloaded.sort_by(|a, b| b.1.total_cmp(&a.1));

    let mut moves = Vec::new();
    for (source, _) in overloaded {
        let mut movable: Vec<&Route> = holdings
            .get(&source)
            .map(|routes| routes.iter().filter(|r| r.status == RouteStatus::Assigned).collect())
            .unwrap_or_default();
        movable.sort_by_key(|route| route.priority);

        for route in movable {
            let Some(load) = snapshot.get(source) else {
                break;
            };
            if load.utilization() <= config.overload_percent {
                break;
            }
            let Some(target) = rebalance_target(snapshot, source, config) else {
                break;
            };

            let planned = RouteMove {
                route_id: route.id,
                from_inspector_id: source,
                to_inspector_id: target,
                priority: route.priority,
                reason: format!("inspector {} at {}% utilization", source, load.utilization()),
            };
            if commit(&planned)? {
                snapshot.transfer(source, target, route.estimated_duration_minutes);
                moves.push(planned);
            } else {
                warn!(
                    route_id = route.id,
                    source,
                    target,
                    "route changed before it could be moved"
                );
            }
        }
    }

    Ok(moves)
}

pub struct AssignmentOptimizer<'a, S, E> {
    store: &'a S,
    engine: AssignmentEngine<'a, S>,
    estimator: E,
}

impl<'a, S, E> AssignmentOptimizer<'a, S, E>
where
    S: DispatchStore,
    E: ZoneDistanceEstimator,
{
    pub fn new(store: &'a S, estimator: E) -> Self {
        Self::with_config(store, estimator, DispatchConfig::default())
    }

    pub fn with_config(store: &'a S, estimator: E, config: DispatchConfig) -> Self {
        Self {
            store,
            engine: AssignmentEngine::with_config(store, config),
            estimator,
        }
    }

    fn config(&self) -> &DispatchConfig {
        self.engine.config()
    }

    /// Baseline pass followed by rescue and rebalancing as configured.
    pub fn optimized_assignment(
        &self,
        route_ids: &[RouteId],
        options: Option<&OptimizerOptions>,
    ) -> DispatchResult<AssignmentResult> {
        self.optimized_assignment_at(route_ids, options, Utc::now())
    }

    pub fn optimized_assignment_at(
        &self,
        route_ids: &[RouteId],
        options: Option<&OptimizerOptions>,
        now: DateTime<Utc>,
    ) -> DispatchResult<AssignmentResult> {
        let defaults = OptimizerOptions::default();
        let options = options.unwrap_or(&defaults);
        options.validate()?;
        self.config().validate()?;

        let strategy = options.strategy;
        let baseline = baseline_options(strategy, options);
        let mut result = self.engine.run_batch(route_ids, &baseline, None, now)?;

        if options.enable_cross_zone_optimization && !result.unassigned_routes.is_empty() {
            self.rescue_unassigned(&mut result, options, now)?;
        }

        if strategy == OptimizationStrategy::Balanced && options.enable_automatic_reassignment {
            self.rebalance(&mut result)?;
        }

        info!(
            strategy = strategy.name(),
            assigned = result.summary.assigned_routes,
            unassigned = result.summary.unassigned_routes,
            rebalanced = result.rebalanced.len(),
            "optimized assignment finished"
        );
        Ok(result)
    }

    fn rescue_unassigned(
        &self,
        result: &mut AssignmentResult,
        options: &OptimizerOptions,
        now: DateTime<Utc>,
    ) -> DispatchResult<()> {
        let inspectors = self.store.active_inspectors()?;
        let mut snapshot = WorkloadCalculator::new(self.store).snapshot(&inspectors)?;
        let mut still_unassigned = Vec::new();

        for route_id in std::mem::take(&mut result.unassigned_routes) {
            let Some(route) = self.store.route(route_id)? else {
                continue;
            };
            if route.status != RouteStatus::Pending {
                continue;
            }

            match self.rescue_route(&route, &inspectors, &snapshot, options, now)? {
                Some((inspector_id, start)) => {
                    if !self.store.claim_route(route.id, inspector_id)? {
                        debug!(route_id, "route claimed elsewhere during rescue");
                        continue;
                    }
                    snapshot.record_assignment(inspector_id, route.estimated_duration_minutes);
                    debug!(route_id, inspector_id, "placed route across zones");
                    result.assignments.push(Assignment {
                        route_id,
                        inspector_id,
                        assigned_at: now,
                        estimated_start_time: start,
                        estimated_end_time: start
                            + Duration::minutes(i64::from(route.estimated_duration_minutes)),
                    });
                }
                None => still_unassigned.push(route_id),
            }
        }

        result.unassigned_routes = still_unassigned;
        result.refresh_summary();
        Ok(())
    }

    /// Best cross-zone inspector for `route` and its estimated start.
    fn rescue_route(
        &self,
        route: &Route,
        inspectors: &[Inspector],
        snapshot: &WorkloadSnapshot,
        options: &OptimizerOptions,
        now: DateTime<Utc>,
    ) -> DispatchResult<Option<(InspectorId, DateTime<Utc>)>> {
        let threshold = options.assignment.max_utilization_threshold;
        let mut scored: Vec<(f64, &Inspector)> = Vec::new();

        for inspector in inspectors {
            let Some(load) = snapshot.get(inspector.id) else {
                continue;
            };
            if load.available_capacity() <= 0 || load.utilization() > threshold {
                continue;
            }
            let distance_km = self.estimator.estimate_km(route.zone_id, inspector)?;
            if distance_km > options.max_cross_zone_distance_km {
                continue;
            }
            let score = rescue_score(&RescueFactors {
                available_capacity: load.available_capacity(),
                max_daily_routes: load.max_daily_routes,
                utilization: load.utilization(),
                distance_km,
                max_distance_km: options.max_cross_zone_distance_km,
                priority: route.priority,
            });
            scored.push((score, inspector));
        }
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));

        for (_, inspector) in scored {
            let Some(load) = snapshot.get(inspector.id) else {
                continue;
            };
            // Placing it must not create a capacity conflict.
            if load.utilization_with_one_more() > self.config().overload_percent {
                continue;
            }
            let start = if options.assignment.consider_availability {
                match self.store.weekly_availability(inspector.id)? {
                    Some(weekly) => open_slot(
                        &weekly,
                        now,
                        load.booked_minutes,
                        route.estimated_duration_minutes,
                    ),
                    None => None,
                }
            } else {
                Some(default_start(now, self.config().default_shift_start, load.booked_minutes))
            };
            if let Some(start) = start {
                return Ok(Some((inspector.id, start)));
            }
        }

        Ok(None)
    }

    fn rebalance(&self, result: &mut AssignmentResult) -> DispatchResult<()> {
        let inspectors = self.store.active_inspectors()?;
        let mut snapshot = WorkloadCalculator::new(self.store).snapshot(&inspectors)?;
        let holdings = self.overloaded_holdings(&snapshot)?;
        if holdings.is_empty() {
            return Ok(());
        }

        let moves = plan_moves(&mut snapshot, &holdings, self.config(), |planned| {
            Ok(self.store.transfer_route(
                planned.route_id,
                planned.from_inspector_id,
                planned.to_inspector_id,
            )?)
        })?;

        for planned in &moves {
            if let Some(assignment) = result
                .assignments
                .iter_mut()
                .find(|assignment| assignment.route_id == planned.route_id)
            {
                assignment.inspector_id = planned.to_inspector_id;
            }
            info!(
                route_id = planned.route_id,
                from = planned.from_inspector_id,
                to = planned.to_inspector_id,
                "rebalanced route"
            );
        }
        result.rebalanced.extend(moves);
        Ok(())
    }

    /// Assigned routes of every overloaded inspector in the snapshot.
    fn overloaded_holdings(
        &self,
        snapshot: &WorkloadSnapshot,
    ) -> DispatchResult<HashMap<InspectorId, Vec<Route>>> {
        let mut holdings = HashMap::new();
        for load in snapshot.iter() {
            if load.utilization() <= self.config().overload_percent {
                continue;
            }
            let mut routes = self.store.routes_by_inspector(load.inspector_id)?;
            routes.retain(|route| route.status == RouteStatus::Assigned);
            holdings.insert(load.inspector_id, routes);
        }
        Ok(holdings)
    }

    /// Checks a result against fresh workload data. Read-only.
    pub fn validate_assignment_result(
        &self,
        result: &AssignmentResult,
    ) -> DispatchResult<AssignmentValidationResult> {
        let config = self.config();
        let inspectors = self.store.active_inspectors()?;
        let metrics = WorkloadCalculator::new(self.store).metrics_for_inspectors(&inspectors)?;
        let mut conflicts = Vec::new();

        for m in &metrics {
            if f64::from(m.utilization_percent) > config.overload_percent {
                conflicts.push(AssignmentConflict {
                    kind: ConflictKind::CapacityExceeded,
                    severity: ConflictSeverity::High,
                    inspector_id: Some(m.inspector_id),
                    route_id: None,
                    message: format!(
                        "inspector {} holds {} routes with a capacity of {} ({}%)",
                        m.inspector_id, m.current_routes, m.max_daily_routes, m.utilization_percent
                    ),
                });
            }
        }

        let active: HashMap<InspectorId, &Inspector> =
            inspectors.iter().map(|inspector| (inspector.id, inspector)).collect();
        let mut cross_zone_assignments = 0;

        for assignment in &result.assignments {
            let route = self.store.route(assignment.route_id)?;
            let recorded = route
                .as_ref()
                .is_some_and(|route| route.assigned_inspector_id == Some(assignment.inspector_id));
            if !recorded {
                conflicts.push(AssignmentConflict {
                    kind: ConflictKind::AssignmentMismatch,
                    severity: ConflictSeverity::Medium,
                    inspector_id: Some(assignment.inspector_id),
                    route_id: Some(assignment.route_id),
                    message: format!(
                        "route {} is no longer assigned to inspector {}",
                        assignment.route_id, assignment.inspector_id
                    ),
                });
            }

            let Some(route) = route else {
                continue;
            };
            let inspector = match active.get(&assignment.inspector_id) {
                Some(inspector) => Some((*inspector).clone()),
                None => self.store.inspector(assignment.inspector_id)?,
            };
            let Some(inspector) = inspector else {
                continue;
            };
            if route.zone_id.is_some() && !inspector.prefers_zone(route.zone_id) {
                cross_zone_assignments += 1;
                conflicts.push(AssignmentConflict {
                    kind: ConflictKind::CrossZoneAssignment,
                    severity: ConflictSeverity::Low,
                    inspector_id: Some(inspector.id),
                    route_id: Some(route.id),
                    message: format!(
                        "route {} is outside the preferred zones of inspector {}",
                        route.id, inspector.id
                    ),
                });
            }
        }

        let utilizations: Vec<f64> = metrics
            .iter()
            .map(|m| f64::from(m.utilization_percent))
            .collect();
        let (average_utilization, utilization_variance) = mean_and_std_dev(&utilizations);

        let suggestions = if utilization_variance > config.variance_threshold {
            let mut snapshot = WorkloadSnapshot::from_metrics(&metrics);
            let holdings = self.overloaded_holdings(&snapshot)?;
            plan_moves(&mut snapshot, &holdings, config, |_| Ok(true))?
        } else {
            Vec::new()
        };

        let is_valid = !conflicts
            .iter()
            .any(|conflict| conflict.severity == ConflictSeverity::High);

        Ok(AssignmentValidationResult {
            is_valid,
            conflicts,
            metrics: ValidationMetrics {
                total_assignments: result.assignments.len(),
                cross_zone_assignments,
                utilization_variance,
                average_utilization,
            },
            suggestions,
        })
    }
}
