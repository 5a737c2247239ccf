//! Domain model for zones, inspectors, routes and their stops.

use std::collections::HashMap;

use chrono::{NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

pub type ZoneId = i64;
pub type InspectorId = i64;
pub type RouteId = i64;

/// A (latitude, longitude) vertex of a zone boundary.
pub type GeoPoint = (f64, f64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneCategory {
    Metropolitan,
    Rural,
}

/// Polygonal region used for inspector preferences and route ownership.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub id: ZoneId,
    pub name: String,
    pub category: ZoneCategory,
    /// Closed ring: the last vertex repeats the first.
    pub boundary: Vec<GeoPoint>,
    pub is_active: bool,
}

impl Zone {
    /// Mean of the boundary vertices, ignoring the closing vertex.
    pub fn centroid(&self) -> Option<GeoPoint> {
        let ring = match (self.boundary.first(), self.boundary.last()) {
            (Some(first), Some(last)) if self.boundary.len() > 1 && first == last => {
                &self.boundary[..self.boundary.len() - 1]
            }
            _ => &self.boundary[..],
        };
        if ring.is_empty() {
            return None;
        }

        let count = ring.len() as f64;
        let (lat, lng) = ring
            .iter()
            .fold((0.0, 0.0), |(lat, lng), point| (lat + point.0, lng + point.1));
        Some((lat / count, lng / count))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inspector {
    pub id: InspectorId,
    pub identification_number: String,
    pub name: String,
    pub preferred_zone_ids: Vec<ZoneId>,
    pub max_daily_routes: u32,
    pub is_active: bool,
}

impl Inspector {
    pub fn prefers_zone(&self, zone_id: Option<ZoneId>) -> bool {
        zone_id.is_some_and(|zone| self.preferred_zone_ids.contains(&zone))
    }
}

/// An open interval of the working day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    pub fn minutes(&self) -> i64 {
        (self.end - self.start).num_minutes().max(0)
    }
}

/// Weekly schedule owned by the availability collaborator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeeklyAvailability {
    pub windows: HashMap<Weekday, Vec<TimeWindow>>,
}

impl WeeklyAvailability {
    pub fn with_window(mut self, day: Weekday, window: TimeWindow) -> Self {
        self.windows.entry(day).or_default().push(window);
        self
    }

    /// Windows for `day`, ordered by start time.
    pub fn windows_for(&self, day: Weekday) -> Vec<TimeWindow> {
        let mut windows = self.windows.get(&day).cloned().unwrap_or_default();
        windows.sort_by_key(|window| window.start);
        windows
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone_id: Option<ZoneId>,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            address: None,
            zone_id: None,
        }
    }

    pub fn with_zone(mut self, zone_id: ZoneId) -> Self {
        self.zone_id = Some(zone_id);
        self
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }

    pub fn lat_lng(&self) -> GeoPoint {
        (self.latitude, self.longitude)
    }

    /// Same position, ignoring address and zone.
    pub fn same_position(&self, other: &Coordinate) -> bool {
        self.latitude == other.latitude && self.longitude == other.longitude
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutePriority {
    Low,
    Medium,
    High,
}

impl RoutePriority {
    /// 1 for low through 3 for high.
    pub fn rank(self) -> u8 {
        match self {
            RoutePriority::Low => 1,
            RoutePriority::Medium => 2,
            RoutePriority::High => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteStatus {
    Pending,
    Assigned,
    InProgress,
    Completed,
    Cancelled,
}

impl RouteStatus {
    /// Statuses in which the route carries an assigned inspector.
    pub fn holds_inspector(self) -> bool {
        matches!(self, RouteStatus::Assigned | RouteStatus::InProgress)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub id: RouteId,
    pub name: String,
    pub priority: RoutePriority,
    pub estimated_duration_minutes: u32,
    pub zone_id: Option<ZoneId>,
    pub status: RouteStatus,
    pub assigned_inspector_id: Option<InspectorId>,
}

/// One stop of a route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutePoint {
    pub route_id: RouteId,
    pub coordinate: Coordinate,
    /// 1-based, contiguous within the route.
    pub sequence: u32,
    pub estimated_minutes: u32,
}
