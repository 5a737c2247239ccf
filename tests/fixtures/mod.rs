//! Test fixtures for inspection-dispatch.
//!
//! Provides:
//! - Inspection sites around Madrid, grouped by district
//! - An in-memory store implementing every collaborator trait
//! - Builders for inspectors and routes

#![allow(dead_code)]

pub mod madrid_sites;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use inspection_dispatch::error::CollaboratorError;
use inspection_dispatch::haversine::HaversineDistance;
use inspection_dispatch::models::{
    Coordinate, Inspector, InspectorId, Route, RouteId, RoutePoint, RoutePriority, RouteStatus,
    WeeklyAvailability,
    Zone, ZoneCategory, ZoneId,
};
use inspection_dispatch::traits::{
    AvailabilityStore, DistanceFunction, InspectorStore, RouteStore, StoreResult, ZoneDetector,
    ZoneMatch, ZoneStore,
};

pub use madrid_sites::*;

/// Inspector id used when a route is taken by another dispatcher.
pub const OTHER_DISPATCHER: InspectorId = -1;

// ============================================================================
// Builders
// ============================================================================

pub fn inspector(id: InspectorId, zones: &[ZoneId], max_daily_routes: u32) -> Inspector {
    Inspector {
        id,
        identification_number: format!("INS-{id:03}"),
        name: format!("Inspector {id}"),
        preferred_zone_ids: zones.to_vec(),
        max_daily_routes,
        is_active: true,
    }
}

pub fn inactive(mut inspector: Inspector) -> Inspector {
    inspector.is_active = false;
    inspector
}

/// Builder for test routes with sensible defaults.
#[derive(Clone, Debug)]
pub struct TestRoute {
    route: Route,
}

impl TestRoute {
    pub fn new(id: RouteId) -> Self {
        Self {
            route: Route {
                id,
                name: format!("Route {id}"),
                priority: RoutePriority::Medium,
                estimated_duration_minutes: 60,
                zone_id: None,
                status: RouteStatus::Pending,
                assigned_inspector_id: None,
            },
        }
    }

    pub fn zone(mut self, zone_id: ZoneId) -> Self {
        self.route.zone_id = Some(zone_id);
        self
    }

    pub fn priority(mut self, priority: RoutePriority) -> Self {
        self.route.priority = priority;
        self
    }

    pub fn duration(mut self, minutes: u32) -> Self {
        self.route.estimated_duration_minutes = minutes;
        self
    }

    pub fn assigned_to(mut self, inspector_id: InspectorId) -> Self {
        self.route.status = RouteStatus::Assigned;
        self.route.assigned_inspector_id = Some(inspector_id);
        self
    }

    pub fn status(mut self, status: RouteStatus) -> Self {
        self.route.status = status;
        self
    }

    pub fn build(self) -> Route {
        self.route
    }
}

pub fn pending(id: RouteId, zone_id: ZoneId) -> Route {
    TestRoute::new(id).zone(zone_id).build()
}

pub fn assigned(id: RouteId, zone_id: ZoneId, inspector_id: InspectorId) -> Route {
    TestRoute::new(id).zone(zone_id).assigned_to(inspector_id).build()
}

fn square(id: ZoneId, name: &str, lat: (f64, f64), lng: (f64, f64)) -> Zone {
    Zone {
        id,
        name: name.to_string(),
        category: ZoneCategory::Metropolitan,
        boundary: vec![
            (lat.0, lng.0),
            (lat.0, lng.1),
            (lat.1, lng.1),
            (lat.1, lng.0),
            (lat.0, lng.0),
        ],
        is_active: true,
    }
}

/// Four rectangular districts covering the Madrid sites.
pub fn madrid_zones() -> Vec<Zone> {
    vec![
        square(CENTRO, "Centro", (40.410, 40.425), (-3.715, -3.690)),
        square(NORTE, "Norte", (40.445, 40.485), (-3.700, -3.675)),
        square(SUR, "Sur", (40.300, 40.410), (-3.740, -3.685)),
        square(ESTE, "Este", (40.410, 40.500), (-3.690, -3.360)),
    ]
}

// ============================================================================
// In-memory store
// ============================================================================

/// Store backed by plain collections.
///
/// Conditional writes behave like the atomic updates a database would run.
/// Routes marked with [`InMemoryStore::claimed_elsewhere`] are taken by
/// another dispatcher the moment this one tries to claim them.
#[derive(Default)]
pub struct InMemoryStore {
    inspectors: Vec<Inspector>,
    availability: HashMap<InspectorId, WeeklyAvailability>,
    zones: HashMap<ZoneId, Zone>,
    routes: Mutex<BTreeMap<RouteId, Route>>,
    points: Mutex<HashMap<RouteId, Vec<RoutePoint>>>,
    stolen: HashSet<RouteId>,
    offline: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_inspector(mut self, inspector: Inspector) -> Self {
        self.inspectors.push(inspector);
        self
    }

    pub fn with_inspectors(mut self, inspectors: impl IntoIterator<Item = Inspector>) -> Self {
        self.inspectors.extend(inspectors);
        self
    }

    pub fn with_route(mut self, route: Route) -> Self {
        self.routes.get_mut().unwrap().insert(route.id, route);
        self
    }

    pub fn with_routes(mut self, routes: impl IntoIterator<Item = Route>) -> Self {
        let stored = self.routes.get_mut().unwrap();
        for route in routes {
            stored.insert(route.id, route);
        }
        self
    }

    /// Stores `coordinates` as the route's points, in the given order.
    pub fn with_points(
        mut self,
        route_id: RouteId,
        coordinates: Vec<Coordinate>,
        stop_minutes: u32,
    ) -> Self {
        let points = coordinates
            .into_iter()
            .enumerate()
            .map(|(i, coordinate)| RoutePoint {
                route_id,
                coordinate,
                sequence: i as u32 + 1,
                estimated_minutes: stop_minutes,
            })
            .collect();
        self.points.get_mut().unwrap().insert(route_id, points);
        self
    }

    pub fn with_availability(
        mut self,
        inspector_id: InspectorId,
        weekly: WeeklyAvailability,
    ) -> Self {
        self.availability.insert(inspector_id, weekly);
        self
    }

    pub fn with_zones(mut self, zones: impl IntoIterator<Item = Zone>) -> Self {
        for zone in zones {
            self.zones.insert(zone.id, zone);
        }
        self
    }

    pub fn claimed_elsewhere(mut self, route_id: RouteId) -> Self {
        self.stolen.insert(route_id);
        self
    }

    /// Every subsequent read fails.
    pub fn go_offline(&self) {
        self.offline.store(true, Ordering::SeqCst);
    }

    fn check_online(&self) -> StoreResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(CollaboratorError::msg("store offline"));
        }
        Ok(())
    }

    pub fn stored_route(&self, route_id: RouteId) -> Route {
        self.routes.lock().unwrap()[&route_id].clone()
    }

    pub fn stored_points(&self, route_id: RouteId) -> Vec<RoutePoint> {
        self.points.lock().unwrap().get(&route_id).cloned().unwrap_or_default()
    }

    /// Routes held by `inspector_id`, by id.
    pub fn held_by(&self, inspector_id: InspectorId) -> Vec<RouteId> {
        self.routes
            .lock()
            .unwrap()
            .values()
            .filter(|route| route.assigned_inspector_id == Some(inspector_id))
            .map(|route| route.id)
            .collect()
    }

    /// Changes a route behind the engine's back.
    pub fn overwrite_route(&self, route: Route) {
        self.routes.lock().unwrap().insert(route.id, route);
    }
}

impl InspectorStore for InMemoryStore {
    fn inspector(&self, id: InspectorId) -> StoreResult<Option<Inspector>> {
        self.check_online()?;
        Ok(self.inspectors.iter().find(|inspector| inspector.id == id).cloned())
    }

    fn active_inspectors(&self) -> StoreResult<Vec<Inspector>> {
        self.check_online()?;
        Ok(self.inspectors.iter().filter(|inspector| inspector.is_active).cloned().collect())
    }
}

impl AvailabilityStore for InMemoryStore {
    fn weekly_availability(
        &self,
        inspector_id: InspectorId,
    ) -> StoreResult<Option<WeeklyAvailability>> {
        self.check_online()?;
        Ok(self.availability.get(&inspector_id).cloned())
    }
}

impl RouteStore for InMemoryStore {
    fn route(&self, id: RouteId) -> StoreResult<Option<Route>> {
        self.check_online()?;
        Ok(self.routes.lock().unwrap().get(&id).cloned())
    }

    fn routes_by_status(&self, status: RouteStatus) -> StoreResult<Vec<Route>> {
        self.check_online()?;
        Ok(self
            .routes
            .lock()
            .unwrap()
            .values()
            .filter(|route| route.status == status)
            .cloned()
            .collect())
    }

    fn routes_by_inspector(&self, inspector_id: InspectorId) -> StoreResult<Vec<Route>> {
        self.check_online()?;
        Ok(self
            .routes
            .lock()
            .unwrap()
            .values()
            .filter(|route| route.assigned_inspector_id == Some(inspector_id))
            .cloned()
            .collect())
    }

    fn claim_route(&self, route_id: RouteId, inspector_id: InspectorId) -> StoreResult<bool> {
        self.check_online()?;
        let mut routes = self.routes.lock().unwrap();
        let Some(route) = routes.get_mut(&route_id) else {
            return Ok(false);
        };
        if route.status != RouteStatus::Pending {
            return Ok(false);
        }
        if self.stolen.contains(&route_id) {
            route.status = RouteStatus::Assigned;
            route.assigned_inspector_id = Some(OTHER_DISPATCHER);
            return Ok(false);
        }
        route.status = RouteStatus::Assigned;
        route.assigned_inspector_id = Some(inspector_id);
        Ok(true)
    }

    fn transfer_route(
        &self,
        route_id: RouteId,
        from: InspectorId,
        to: InspectorId,
    ) -> StoreResult<bool> {
        self.check_online()?;
        let mut routes = self.routes.lock().unwrap();
        match routes.get_mut(&route_id) {
            Some(route)
                if route.status == RouteStatus::Assigned
                    && route.assigned_inspector_id == Some(from) =>
            {
                route.assigned_inspector_id = Some(to);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn unassign_route(&self, route_id: RouteId) -> StoreResult<bool> {
        self.check_online()?;
        let mut routes = self.routes.lock().unwrap();
        match routes.get_mut(&route_id) {
            Some(route) if route.status == RouteStatus::Assigned => {
                route.status = RouteStatus::Pending;
                route.assigned_inspector_id = None;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn route_points(&self, route_id: RouteId) -> StoreResult<Vec<RoutePoint>> {
        self.check_online()?;
        Ok(self.stored_points(route_id))
    }

    fn replace_route_points(&self, route_id: RouteId, points: &[RoutePoint]) -> StoreResult<()> {
        self.check_online()?;
        self.points.lock().unwrap().insert(route_id, points.to_vec());
        Ok(())
    }

    fn update_route_plan(
        &self,
        route_id: RouteId,
        estimated_duration_minutes: u32,
        zone_id: Option<ZoneId>,
    ) -> StoreResult<()> {
        self.check_online()?;
        if let Some(route) = self.routes.lock().unwrap().get_mut(&route_id) {
            route.estimated_duration_minutes = estimated_duration_minutes;
            route.zone_id = zone_id;
        }
        Ok(())
    }
}

impl ZoneStore for InMemoryStore {
    fn zone(&self, id: ZoneId) -> StoreResult<Option<Zone>> {
        self.check_online()?;
        Ok(self.zones.get(&id).cloned())
    }
}

// ============================================================================
// Zone detection and distances
// ============================================================================

/// Nearest zone centroid; confident only within `confident_km`.
pub struct CentroidDetector {
    zones: Vec<Zone>,
    confident_km: f64,
}

impl CentroidDetector {
    pub fn new(zones: Vec<Zone>, confident_km: f64) -> Self {
        Self { zones, confident_km }
    }
}

impl ZoneDetector for CentroidDetector {
    fn detect_zone(&self, coordinate: &Coordinate) -> StoreResult<Option<ZoneMatch>> {
        let nearest = self
            .zones
            .iter()
            .filter_map(|zone| {
                let centroid = zone.centroid()?;
                let km = HaversineDistance::haversine_km(coordinate.lat_lng(), centroid);
                Some((zone.id, km))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1));

        Ok(nearest.map(|(zone_id, km)| ZoneMatch {
            zone_id,
            confidence: if km <= self.confident_km { 0.9 } else { 0.3 },
        }))
    }
}

/// Detector that never finds a zone.
pub struct NoZones;

impl ZoneDetector for NoZones {
    fn detect_zone(&self, _coordinate: &Coordinate) -> StoreResult<Option<ZoneMatch>> {
        Ok(None)
    }
}

/// Distance function whose backend is down.
pub struct UnreachableDistance;

impl DistanceFunction for UnreachableDistance {
    fn distance_meters(&self, _from: &Coordinate, _to: &Coordinate) -> StoreResult<f64> {
        Err(CollaboratorError::msg("routing backend unreachable"))
    }
}

/// One kilometer per unit of longitude, latitude ignored. For tests that
/// need exact distances.
pub struct LineDistance;

impl DistanceFunction for LineDistance {
    fn distance_meters(&self, from: &Coordinate, to: &Coordinate) -> StoreResult<f64> {
        Ok((from.longitude - to.longitude).abs() * 1000.0)
    }
}

/// Coordinates at the given positions of [`LineDistance`], in kilometers.
pub fn line_points(positions: &[f64]) -> Vec<Coordinate> {
    positions.iter().map(|&km| Coordinate::new(0.0, km)).collect()
}
