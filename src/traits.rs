//! Collaborator interfaces consumed by the dispatch engine.
//!
//! Storage, geospatial and zone-detection layers implement these for their
//! own backends. Claim, transfer and unassign must be atomic conditional
//! updates; a `false` return means another writer got there first.

use crate::error::CollaboratorError;
use crate::models::{
    Coordinate, Inspector, InspectorId, Route, RouteId, RoutePoint, RouteStatus,
    WeeklyAvailability, Zone, ZoneId,
};
use crate::sequencer::DistanceMatrix;

pub type StoreResult<T> = Result<T, CollaboratorError>;

pub trait InspectorStore {
    fn inspector(&self, id: InspectorId) -> StoreResult<Option<Inspector>>;

    fn active_inspectors(&self) -> StoreResult<Vec<Inspector>>;
}

/// Weekly schedules of inspectors.
pub trait AvailabilityStore {
    fn weekly_availability(
        &self,
        inspector_id: InspectorId,
    ) -> StoreResult<Option<WeeklyAvailability>>;
}

pub trait RouteStore {
    fn route(&self, id: RouteId) -> StoreResult<Option<Route>>;

    fn routes_by_status(&self, status: RouteStatus) -> StoreResult<Vec<Route>>;

    /// Routes whose assigned inspector is `inspector_id`, in any status.
    fn routes_by_inspector(&self, inspector_id: InspectorId) -> StoreResult<Vec<Route>>;

    /// Moves a pending route to assigned.
    ///
    /// Returns `false` when the route is no longer pending (lost race).
    fn claim_route(&self, route_id: RouteId, inspector_id: InspectorId) -> StoreResult<bool>;

    /// Moves an assigned route from one inspector to another.
    ///
    /// Returns `false` unless the route is still assigned to `from`.
    fn transfer_route(
        &self,
        route_id: RouteId,
        from: InspectorId,
        to: InspectorId,
    ) -> StoreResult<bool>;

    /// Reverts an assigned route to pending and clears its inspector.
    fn unassign_route(&self, route_id: RouteId) -> StoreResult<bool>;

    fn route_points(&self, route_id: RouteId) -> StoreResult<Vec<RoutePoint>>;

    fn replace_route_points(&self, route_id: RouteId, points: &[RoutePoint]) -> StoreResult<()>;

    fn update_route_plan(
        &self,
        route_id: RouteId,
        estimated_duration_minutes: u32,
        zone_id: Option<ZoneId>,
    ) -> StoreResult<()>;
}

/// Everything the assignment passes read and write.
pub trait DispatchStore: InspectorStore + RouteStore + AvailabilityStore {}

impl<T> DispatchStore for T where T: InspectorStore + RouteStore + AvailabilityStore {}

pub trait ZoneStore {
    fn zone(&self, id: ZoneId) -> StoreResult<Option<Zone>>;
}

/// Symmetric distance in meters, zero for identical points.
pub trait DistanceFunction {
    fn distance_meters(&self, from: &Coordinate, to: &Coordinate) -> StoreResult<f64>;

    /// All-pairs matrix indexed by the provided point order.
    fn matrix_for(&self, points: &[Coordinate]) -> StoreResult<DistanceMatrix> {
        let mut matrix = DistanceMatrix::new(points.len());
        for i in 0..points.len() {
            for j in (i + 1)..points.len() {
                let meters = self.distance_meters(&points[i], &points[j])?;
                matrix.set(i, j, meters);
                matrix.set(j, i, meters);
            }
        }
        Ok(matrix)
    }
}

/// Best zone match for a coordinate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoneMatch {
    pub zone_id: ZoneId,
    /// 0.0 to 1.0.
    pub confidence: f64,
}

pub trait ZoneDetector {
    fn detect_zone(&self, coordinate: &Coordinate) -> StoreResult<Option<ZoneMatch>>;
}

impl<T: DistanceFunction + ?Sized> DistanceFunction for &T {
    fn distance_meters(&self, from: &Coordinate, to: &Coordinate) -> StoreResult<f64> {
        (**self).distance_meters(from, to)
    }

    fn matrix_for(&self, points: &[Coordinate]) -> StoreResult<DistanceMatrix> {
        (**self).matrix_for(points)
    }
}
