//! Route point sequencing.
//!
//! Orders the stops of a route to shorten the open path through them, using
//! one of three interchangeable heuristics. Distances come from a
//! [`DistanceFunction`] and are computed once per call.

mod genetic;
mod matrix;
mod nearest_neighbor;
mod two_opt;

use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{DispatchError, DispatchResult};
use crate::models::{Coordinate, RouteId, ZoneId};
use crate::traits::DistanceFunction;

pub use genetic::{GeneticConfig, fitness};
pub use matrix::DistanceMatrix;
pub use nearest_neighbor::nearest_neighbor_order;
pub use two_opt::two_opt_improve;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SequencingAlgorithm {
    NearestNeighbor,
    TwoOpt,
    Genetic,
}

impl SequencingAlgorithm {
    pub const ALL: [SequencingAlgorithm; 3] = [
        SequencingAlgorithm::NearestNeighbor,
        SequencingAlgorithm::TwoOpt,
        SequencingAlgorithm::Genetic,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SequencingAlgorithm::NearestNeighbor => "nearest_neighbor",
            SequencingAlgorithm::TwoOpt => "two_opt",
            SequencingAlgorithm::Genetic => "genetic",
        }
    }
}

impl fmt::Display for SequencingAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SequencingAlgorithm {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nearest_neighbor" | "nearest-neighbor" => Ok(SequencingAlgorithm::NearestNeighbor),
            "two_opt" | "2opt" | "2-opt" => Ok(SequencingAlgorithm::TwoOpt),
            "genetic" => Ok(SequencingAlgorithm::Genetic),
            _ => Err(DispatchError::UnknownAlgorithm(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequencerOptions {
    pub algorithm: SequencingAlgorithm,
    /// Keep the first and last stop where they are.
    pub preserve_start_end: bool,
    /// Forced first stop; inserted if not among the inputs.
    pub start_point: Option<Coordinate>,
    /// Forced last stop; inserted if not among the inputs.
    pub end_point: Option<Coordinate>,
    /// Cap on 2-opt passes.
    pub max_iterations: usize,
    pub genetic: GeneticConfig,
    /// Fixed seed for reproducible genetic runs.
    pub seed: Option<u64>,
}

impl Default for SequencerOptions {
    fn default() -> Self {
        Self {
            algorithm: SequencingAlgorithm::TwoOpt,
            preserve_start_end: false,
            start_point: None,
            end_point: None,
            max_iterations: 1000,
            genetic: GeneticConfig::default(),
            seed: None,
        }
    }
}

impl SequencerOptions {
    pub fn new(algorithm: SequencingAlgorithm) -> Self {
        Self {
            algorithm,
            ..Self::default()
        }
    }

    /// Options for an algorithm given by name, e.g. from a request.
    pub fn for_algorithm_name(name: &str) -> DispatchResult<Self> {
        Ok(Self::new(name.parse()?))
    }

    pub fn validate(&self) -> DispatchResult<()> {
        if self.max_iterations == 0 {
            return Err(DispatchError::InvalidConfig("max_iterations must be positive".to_string()));
        }
        self.genetic.validate()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    /// Stops in visiting order.
    pub coordinates: Vec<Coordinate>,
    /// Visiting order as indices into the prepared input (after any forced
    /// start or end point was placed).
    pub sequence: Vec<usize>,
    /// Meters, input order.
    pub original_distance: f64,
    /// Meters, returned order.
    pub optimized_distance: f64,
    pub improvement_percent: f64,
    pub algorithm: SequencingAlgorithm,
    pub iterations: usize,
    pub execution_time_ms: f64,
}

/// A route to sequence as part of a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZonedRoute {
    pub route_id: RouteId,
    pub zone_id: Option<ZoneId>,
    pub coordinates: Vec<Coordinate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZonedOptimization {
    pub route_id: RouteId,
    pub zone_id: Option<ZoneId>,
    pub result: OptimizationResult,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptimizationStatistics {
    pub average_improvement_percent: f64,
    pub best_improvement_percent: f64,
    pub worst_improvement_percent: f64,
    pub average_execution_time_ms: f64,
    /// Meters.
    pub total_distance_saved: f64,
}

/// Input points with the forced start/end moved into place.
struct PreparedStops {
    points: Vec<Coordinate>,
    fixed_start: bool,
    fixed_end: bool,
}

fn prepare_stops(coordinates: &[Coordinate], options: &SequencerOptions) -> PreparedStops {
    let mut points = coordinates.to_vec();

    if let Some(start) = &options.start_point {
        let found = points.iter().position(|p| p.same_position(start));
        let point = match found {
            Some(index) => points.remove(index),
            None => start.clone(),
        };
        points.insert(0, point);
    }

    if let Some(end) = &options.end_point {
        let skip = usize::from(options.start_point.is_some());
        let found = points.iter().skip(skip).position(|p| p.same_position(end));
        let point = match found {
            Some(index) => points.remove(index + skip),
            None => end.clone(),
        };
        points.push(point);
    }

    PreparedStops {
        points,
        fixed_start: options.preserve_start_end || options.start_point.is_some(),
        fixed_end: options.preserve_start_end || options.end_point.is_some(),
    }
}

pub struct RouteSequencer<'a, D> {
    distance: &'a D,
}

impl<'a, D> RouteSequencer<'a, D>
where
    D: DistanceFunction,
{
    pub fn new(distance: &'a D) -> Self {
        Self { distance }
    }

    /// Reorders `coordinates` with the selected heuristic.
    pub fn optimize_route(
        &self,
        coordinates: &[Coordinate],
        options: &SequencerOptions,
    ) -> DispatchResult<OptimizationResult> {
        options.validate()?;
        let started = Instant::now();
        let stops = prepare_stops(coordinates, options);
        let n = stops.points.len();
        let input_order: Vec<usize> = (0..n).collect();

        if n <= 2 {
            let distance = if n == 2 {
                self.distance.distance_meters(&stops.points[0], &stops.points[1])?
            } else {
                0.0
            };
            return Ok(build_result(
                stops.points,
                input_order,
                distance,
                distance,
                options.algorithm,
                0,
                started,
            ));
        }

        let matrix = self.distance.matrix_for(&stops.points)?;
        let original_distance = matrix.path_distance(&input_order);

        let (order, iterations) = match options.algorithm {
            SequencingAlgorithm::NearestNeighbor => {
                let greedy = nearest_neighbor_order(&matrix, stops.fixed_end);
                // Greedy tours can be longer than a sensible input order.
                if matrix.path_distance(&greedy) <= original_distance {
                    (greedy, 1)
                } else {
                    (input_order, 1)
                }
            }
            SequencingAlgorithm::TwoOpt => two_opt_improve(
                &input_order,
                &matrix,
                stops.fixed_start,
                stops.fixed_end,
                options.max_iterations,
            ),
            SequencingAlgorithm::Genetic => {
                let mut rng = match options.seed {
                    Some(seed) => StdRng::seed_from_u64(seed),
                    None => StdRng::seed_from_u64(rand::random()),
                };
                let seeds = vec![nearest_neighbor_order(&matrix, stops.fixed_end)];
                genetic::genetic_search(
                    &input_order,
                    &seeds,
                    &matrix,
                    stops.fixed_start,
                    stops.fixed_end,
                    &options.genetic,
                    &mut rng,
                )
            }
        };

        let optimized_distance = matrix.path_distance(&order);
        let reordered = order.iter().map(|&i| stops.points[i].clone()).collect();

        debug!(
            algorithm = %options.algorithm,
            stops = n,
            original_distance,
            optimized_distance,
            iterations,
            "sequenced route"
        );

        Ok(build_result(
            reordered,
            order,
            original_distance,
            optimized_distance,
            options.algorithm,
            iterations,
            started,
        ))
    }

    /// Runs `algorithms` (all of them by default) on the same input, one
    /// after another so timings are comparable.
    pub fn benchmark_algorithms(
        &self,
        coordinates: &[Coordinate],
        algorithms: Option<&[SequencingAlgorithm]>,
        base: &SequencerOptions,
    ) -> DispatchResult<Vec<OptimizationResult>> {
        let algorithms = algorithms.unwrap_or(&SequencingAlgorithm::ALL);
        algorithms
            .iter()
            .map(|&algorithm| {
                let options = SequencerOptions {
                    algorithm,
                    ..base.clone()
                };
                self.optimize_route(coordinates, &options)
            })
            .collect()
    }
}

impl<'a, D> RouteSequencer<'a, D>
where
    D: DistanceFunction + Sync,
{
    /// Sequences several independent routes with the same options.
    ///
    /// Routes are processed in parallel; results keep the input order.
    pub fn optimize_routes(
        &self,
        routes: &[ZonedRoute],
        options: &SequencerOptions,
    ) -> DispatchResult<Vec<ZonedOptimization>> {
        routes
            .par_iter()
            .map(|route| {
                let result = self.optimize_route(&route.coordinates, options)?;
                Ok(ZonedOptimization {
                    route_id: route.route_id,
                    zone_id: route.zone_id,
                    result,
                })
            })
            .collect()
    }
}

fn build_result(
    coordinates: Vec<Coordinate>,
    sequence: Vec<usize>,
    original_distance: f64,
    optimized_distance: f64,
    algorithm: SequencingAlgorithm,
    iterations: usize,
    started: Instant,
) -> OptimizationResult {
    let improvement_percent = if original_distance > 0.0 {
        (original_distance - optimized_distance) / original_distance * 100.0
    } else {
        0.0
    };

    OptimizationResult {
        coordinates,
        sequence,
        original_distance,
        optimized_distance,
        improvement_percent,
        algorithm,
        iterations,
        execution_time_ms: started.elapsed().as_secs_f64() * 1000.0,
    }
}

/// Summary over earlier results; all zero when `results` is empty.
pub fn aggregate_statistics(results: &[OptimizationResult]) -> OptimizationStatistics {
    if results.is_empty() {
        return OptimizationStatistics::default();
    }

    let count = results.len() as f64;
    let improvements = results.iter().map(|r| r.improvement_percent);

    OptimizationStatistics {
        average_improvement_percent: improvements.clone().sum::<f64>() / count,
        best_improvement_percent: improvements.clone().fold(f64::MIN, f64::max),
        worst_improvement_percent: improvements.fold(f64::MAX, f64::min),
        average_execution_time_ms: results.iter().map(|r| r.execution_time_ms).sum::<f64>() / count,
        total_distance_saved: results
            .iter()
            .map(|r| r.original_distance - r.optimized_distance)
            .sum(),
    }
}
