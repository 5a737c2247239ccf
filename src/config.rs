//! Engine-wide thresholds and assignment option bundles.

use std::str::FromStr;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::error::{DispatchError, DispatchResult};

/// Thresholds shared by the assignment passes and the route planner.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Below this utilization an inspector is reported as underutilized.
    pub low_utilization_percent: f64,
    /// Above this utilization an inspector is overloaded.
    pub overload_percent: f64,
    /// Rebalancing only moves routes to inspectors below this utilization.
    pub rebalance_target_percent: f64,
    /// Utilization standard deviation above which validation suggests moves.
    pub variance_threshold: f64,
    /// Shift start used for time estimates when availability is not consulted.
    pub default_shift_start: NaiveTime,
    /// Average travel speed between stops, for route duration estimates.
    pub travel_speed_kmh: f64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            low_utilization_percent: 20.0,
            overload_percent: 100.0,
            rebalance_target_percent: 50.0,
            variance_threshold: 25.0,
            default_shift_start: NaiveTime::from_hms_opt(8, 0, 0).unwrap_or_default(),
            travel_speed_kmh: 40.0,
        }
    }
}

impl DispatchConfig {
    pub fn validate(&self) -> DispatchResult<()> {
        let percents = [
            ("low_utilization_percent", self.low_utilization_percent),
            ("overload_percent", self.overload_percent),
            ("rebalance_target_percent", self.rebalance_target_percent),
            ("variance_threshold", self.variance_threshold),
        ];
        for (name, value) in percents {
            if !value.is_finite() || value < 0.0 {
                return Err(DispatchError::InvalidConfig(format!(
                    "{name} must be a non-negative number, got {value}"
                )));
            }
        }
        if !self.travel_speed_kmh.is_finite() || self.travel_speed_kmh <= 0.0 {
            return Err(DispatchError::InvalidConfig(format!(
                "travel_speed_kmh must be positive, got {}",
                self.travel_speed_kmh
            )));
        }
        Ok(())
    }
}

/// Options for the baseline assignment pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentOptions {
    pub prioritize_zone_preference: bool,
    /// Inspectors above this utilization (percent) are not considered.
    pub max_utilization_threshold: f64,
    pub allow_cross_zone_assignment: bool,
    pub balance_workload: bool,
    /// Require an open availability window that fits the route.
    pub consider_availability: bool,
}

impl Default for AssignmentOptions {
    fn default() -> Self {
        Self {
            prioritize_zone_preference: true,
            max_utilization_threshold: 100.0,
            allow_cross_zone_assignment: true,
            balance_workload: true,
            consider_availability: false,
        }
    }
}

impl AssignmentOptions {
    /// Zone-bound assignment that never crosses zones.
    pub fn zone_only() -> Self {
        Self {
            allow_cross_zone_assignment: false,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> DispatchResult<()> {
        if !self.max_utilization_threshold.is_finite() || self.max_utilization_threshold < 0.0 {
            return Err(DispatchError::InvalidConfig(format!(
                "max_utilization_threshold must be a non-negative number, got {}",
                self.max_utilization_threshold
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationStrategy {
    Balanced,
    ZonePriority,
    Efficiency,
}

impl OptimizationStrategy {
    pub fn name(self) -> &'static str {
        match self {
            OptimizationStrategy::Balanced => "balanced",
            OptimizationStrategy::ZonePriority => "zone_priority",
            OptimizationStrategy::Efficiency => "efficiency",
        }
    }
}

impl FromStr for OptimizationStrategy {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "balanced" => Ok(OptimizationStrategy::Balanced),
            "zone_priority" => Ok(OptimizationStrategy::ZonePriority),
            "efficiency" => Ok(OptimizationStrategy::Efficiency),
            _ => Err(DispatchError::UnknownStrategy(s.to_string())),
        }
    }
}

/// Options for the optimizer, embedding the baseline options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerOptions {
    pub assignment: AssignmentOptions,
    pub enable_cross_zone_optimization: bool,
    pub max_cross_zone_distance_km: f64,
    pub enable_automatic_reassignment: bool,
    pub strategy: OptimizationStrategy,
}

impl Default for OptimizerOptions {
    fn default() -> Self {
        Self {
            assignment: AssignmentOptions::default(),
            enable_cross_zone_optimization: true,
            max_cross_zone_distance_km: 50.0,
            enable_automatic_reassignment: false,
            strategy: OptimizationStrategy::Balanced,
        }
    }
}

impl OptimizerOptions {
    pub fn validate(&self) -> DispatchResult<()> {
        self.assignment.validate()?;
        if !self.max_cross_zone_distance_km.is_finite() || self.max_cross_zone_distance_km < 0.0 {
            return Err(DispatchError::InvalidConfig(format!(
                "max_cross_zone_distance_km must be a non-negative number, got {}",
                self.max_cross_zone_distance_km
            )));
        }
        Ok(())
    }
}
