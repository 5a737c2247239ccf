//! Candidate scoring for the assignment passes.
//!
//! Each concern is its own function; a candidate's score is their sum.

use crate::config::AssignmentOptions;
use crate::models::{Inspector, RoutePriority, ZoneId};

/// Bonus for an inspector who prefers the route's zone. Dominates the
/// balance component so zone matches always win.
pub const ZONE_MATCH_BONUS: f64 = 100.0;

/// Maximum balance component, reached at zero utilization.
pub const BALANCE_WEIGHT: f64 = 50.0;

/// Bonus for passing the availability filter.
pub const AVAILABILITY_BONUS: f64 = 10.0;

pub fn zone_match_score(
    inspector: &Inspector,
    route_zone: Option<ZoneId>,
    options: &AssignmentOptions,
) -> f64 {
    if options.prioritize_zone_preference && inspector.prefers_zone(route_zone) {
        ZONE_MATCH_BONUS
    } else {
        0.0
    }
}

/// Higher for less utilized inspectors.
pub fn balance_score(utilization: f64, options: &AssignmentOptions) -> f64 {
    if !options.balance_workload {
        return 0.0;
    }
    let headroom = (100.0 - utilization).clamp(0.0, 100.0);
    headroom / 100.0 * BALANCE_WEIGHT
}

/// `None` filters the candidate out.
pub fn availability_score(has_open_window: bool, options: &AssignmentOptions) -> Option<f64> {
    if !options.consider_availability {
        return Some(0.0);
    }
    has_open_window.then_some(AVAILABILITY_BONUS)
}

/// Route priority as a score term.
///
/// Every candidate for a route gets the same value, so this only shifts
/// the reported score and never changes which inspector wins. Priority
/// decides between routes in [`rescue_score`].
pub fn priority_score(priority: RoutePriority) -> f64 {
    f64::from(priority.rank())
}

/// Total score of an inspector for a route, or `None` if filtered out.
pub fn candidate_score(
    inspector: &Inspector,
    route_zone: Option<ZoneId>,
    priority: RoutePriority,
    utilization: f64,
    has_open_window: bool,
    options: &AssignmentOptions,
) -> Option<f64> {
    let availability = availability_score(has_open_window, options)?;
    Some(
        zone_match_score(inspector, route_zone, options)
            + balance_score(utilization, options)
            + availability
            + priority_score(priority),
    )
}

/// Inputs of the cross-zone rescue score.
#[derive(Debug, Clone, Copy)]
pub struct RescueFactors {
    pub available_capacity: i64,
    pub max_daily_routes: u32,
    pub utilization: f64,
    pub distance_km: f64,
    pub max_distance_km: f64,
    pub priority: RoutePriority,
}

/// Blend used when placing routes outside their preferred zones: capacity
/// ratio 40%, inverse utilization 30%, inverse distance 20%, priority 10%.
pub fn rescue_score(factors: &RescueFactors) -> f64 {
    let capacity_ratio = if factors.max_daily_routes == 0 {
        0.0
    } else {
        (factors.available_capacity as f64 / f64::from(factors.max_daily_routes)).clamp(0.0, 1.0)
    };
    let inverse_utilization = (1.0 - factors.utilization / 100.0).clamp(0.0, 1.0);
    let inverse_distance = if factors.max_distance_km > 0.0 {
        (1.0 - factors.distance_km / factors.max_distance_km).clamp(0.0, 1.0)
    } else {
        1.0
    };
    let priority = f64::from(factors.priority.rank()) / 3.0;

    0.4 * capacity_ratio + 0.3 * inverse_utilization + 0.2 * inverse_distance + 0.1 * priority
}
