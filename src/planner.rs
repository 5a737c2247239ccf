//! Re-sequencing of stored routes.
//!
//! Loads a route's points, orders them with the [`RouteSequencer`], and
//! writes back the new sequence together with the derived duration and
//! primary zone.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::DispatchConfig;
use crate::error::DispatchResult;
use crate::models::{RouteId, RoutePoint, RouteStatus, ZoneId};
use crate::sequencer::{OptimizationResult, RouteSequencer, SequencerOptions};
use crate::traits::{DistanceFunction, RouteStore, ZoneDetector};

/// Detector matches below this confidence are ignored.
pub const MIN_ZONE_CONFIDENCE: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResequencedRoute {
    pub route_id: RouteId,
    /// Stored points in their new order, numbered from 1.
    pub points: Vec<RoutePoint>,
    pub estimated_duration_minutes: u32,
    pub zone_id: Option<ZoneId>,
    pub optimization: OptimizationResult,
}

/// Travel time at `speed_kmh` plus time spent at the stops.
pub fn route_duration_minutes(distance_meters: f64, speed_kmh: f64, stop_minutes: u32) -> u32 {
    let travel = if speed_kmh > 0.0 {
        (distance_meters / 1000.0 / speed_kmh * 60.0).round() as u32
    } else {
        0
    };
    travel + stop_minutes
}

/// Zone held by most points; the lowest id wins a tie.
pub fn primary_zone(zones: impl IntoIterator<Item = ZoneId>) -> Option<ZoneId> {
    let mut counts: BTreeMap<ZoneId, usize> = BTreeMap::new();
    for zone in zones {
        *counts.entry(zone).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .fold(None, |best: Option<(ZoneId, usize)>, (zone, count)| match best {
            Some((_, top)) if top >= count => best,
            _ => Some((zone, count)),
        })
        .map(|(zone, _)| zone)
}

pub struct RouteResequencer<'a, S, D, Z> {
    store: &'a S,
    distance: &'a D,
    detector: &'a Z,
    config: DispatchConfig,
}

impl<'a, S, D, Z> RouteResequencer<'a, S, D, Z>
where
    S: RouteStore,
    D: DistanceFunction,
    Z: ZoneDetector,
{
    pub fn new(store: &'a S, distance: &'a D, detector: &'a Z) -> Self {
        Self::with_config(store, distance, detector, DispatchConfig::default())
    }

    pub fn with_config(
        store: &'a S,
        distance: &'a D,
        detector: &'a Z,
        config: DispatchConfig,
    ) -> Self {
        Self {
            store,
            distance,
            detector,
            config,
        }
    }

    /// Re-orders and persists the points of one route.
    ///
    /// Returns `None` for unknown routes, finished or cancelled routes, and
    /// routes without points. A forced start or end point that is not one of
    /// the stored points counts toward travel but is not stored.
    pub fn resequence_route(
        &self,
        route_id: RouteId,
        options: &SequencerOptions,
    ) -> DispatchResult<Option<ResequencedRoute>> {
        let Some(route) = self.store.route(route_id)? else {
            return Ok(None);
        };
        if matches!(route.status, RouteStatus::Completed | RouteStatus::Cancelled) {
            debug!(route_id, status = ?route.status, "route is closed, not resequencing");
            return Ok(None);
        }

        let mut stored = self.store.route_points(route_id)?;
        if stored.is_empty() {
            return Ok(None);
        }
        stored.sort_by_key(|point| point.sequence);

        let coordinates: Vec<_> = stored.iter().map(|point| point.coordinate.clone()).collect();
        let optimization =
            RouteSequencer::new(self.distance).optimize_route(&coordinates, options)?;

        let mut remaining: Vec<Option<RoutePoint>> = stored.into_iter().map(Some).collect();
        let mut points = Vec::with_capacity(remaining.len());
        for coordinate in &optimization.coordinates {
            let matched = remaining
                .iter_mut()
                .find(|slot| slot.as_ref().is_some_and(|p| p.coordinate.same_position(coordinate)))
                .and_then(Option::take);
            if let Some(mut point) = matched {
                point.sequence = points.len() as u32 + 1;
                points.push(point);
            }
        }

        let mut zones = Vec::new();
        for point in &mut points {
            if point.coordinate.zone_id.is_none() {
                if let Some(found) = self.detector.detect_zone(&point.coordinate)? {
                    if found.confidence >= MIN_ZONE_CONFIDENCE {
                        point.coordinate.zone_id = Some(found.zone_id);
                    }
                }
            }
            zones.extend(point.coordinate.zone_id);
        }
        let zone_id = primary_zone(zones).or(route.zone_id);

        let stop_minutes = points.iter().map(|point| point.estimated_minutes).sum();
        let estimated_duration_minutes = route_duration_minutes(
            optimization.optimized_distance,
            self.config.travel_speed_kmh,
            stop_minutes,
        );

        self.store.replace_route_points(route_id, &points)?;
        self.store
            .update_route_plan(route_id, estimated_duration_minutes, zone_id)?;

        info!(
            route_id,
            stops = points.len(),
            estimated_duration_minutes,
            improvement_percent = optimization.improvement_percent,
            "resequenced route"
        );

        Ok(Some(ResequencedRoute {
            route_id,
            points,
            estimated_duration_minutes,
            zone_id,
            optimization,
        }))
    }
}
