//! Route sequencer tests
//!
//! Exact distances on a line, realistic Madrid stops, and property checks
//! that no heuristic makes a route longer.

mod fixtures;

use proptest::prelude::*;

use fixtures::*;
use inspection_dispatch::error::DispatchError;
use inspection_dispatch::haversine::HaversineDistance;
use inspection_dispatch::models::Coordinate;
use inspection_dispatch::sequencer::{
    GeneticConfig, RouteSequencer, SequencerOptions, SequencingAlgorithm, ZonedRoute,
    aggregate_statistics,
};

fn is_permutation(order: &[usize], n: usize) -> bool {
    let mut sorted = order.to_vec();
    sorted.sort_unstable();
    sorted == (0..n).collect::<Vec<_>>()
}

fn seeded(algorithm: SequencingAlgorithm) -> SequencerOptions {
    SequencerOptions {
        seed: Some(7),
        ..SequencerOptions::new(algorithm)
    }
}

// ============================================================================
// Small inputs
// ============================================================================

#[test]
fn test_nearest_neighbor_fixes_inefficient_order() {
    // Stops A, D, B, C along a line: the input doubles back.
    let points = line_points(&[0.0, 3.0, 1.0, 2.0]);
    let sequencer = RouteSequencer::new(&LineDistance);

    let result = sequencer
        .optimize_route(&points, &SequencerOptions::new(SequencingAlgorithm::NearestNeighbor))
        .unwrap();

    assert_eq!(result.original_distance, 6000.0);
    assert_eq!(result.optimized_distance, 3000.0);
    assert!(result.optimized_distance < result.original_distance);
    assert_eq!(result.sequence, vec![0, 2, 3, 1]);
    assert_eq!(result.improvement_percent, 50.0);
    assert_eq!(result.algorithm, SequencingAlgorithm::NearestNeighbor);
}

#[test]
fn test_two_points_returned_unchanged() {
    let points = line_points(&[5.0, 1.0]);
    let sequencer = RouteSequencer::new(&LineDistance);

    for algorithm in SequencingAlgorithm::ALL {
        let result = sequencer.optimize_route(&points, &seeded(algorithm)).unwrap();
        assert_eq!(result.sequence, vec![0, 1]);
        assert_eq!(result.original_distance, 4000.0);
        assert_eq!(result.optimized_distance, 4000.0);
        assert_eq!(result.improvement_percent, 0.0);
        assert_eq!(result.iterations, 0);
    }
}

#[test]
fn test_empty_and_single_point() {
    let sequencer = RouteSequencer::new(&LineDistance);
    let options = SequencerOptions::default();

    let empty = sequencer.optimize_route(&[], &options).unwrap();
    assert!(empty.coordinates.is_empty());
    assert_eq!(empty.optimized_distance, 0.0);

    let single = sequencer.optimize_route(&line_points(&[2.0]), &options).unwrap();
    assert_eq!(single.sequence, vec![0]);
    assert_eq!(single.improvement_percent, 0.0);
}

// ============================================================================
// Fixed endpoints
// ============================================================================

#[test]
fn test_preserve_start_end_keeps_ends() {
    let points = centro_zigzag();
    let sequencer = RouteSequencer::new(&HaversineDistance);

    for algorithm in SequencingAlgorithm::ALL {
        let options = SequencerOptions {
            preserve_start_end: true,
            ..seeded(algorithm)
        };
        let result = sequencer.optimize_route(&points, &options).unwrap();

        assert_eq!(result.sequence.first(), Some(&0), "{algorithm}");
        assert_eq!(result.sequence.last(), Some(&(points.len() - 1)), "{algorithm}");
        assert!(result.optimized_distance <= result.original_distance + 1e-6);
    }
}

#[test]
fn test_start_point_is_inserted() {
    let points = line_points(&[1.0, 3.0, 2.0]);
    let depot = Coordinate::new(0.0, 0.0);
    let options = SequencerOptions {
        start_point: Some(depot),
        ..SequencerOptions::new(SequencingAlgorithm::TwoOpt)
    };

    let result = RouteSequencer::new(&LineDistance).optimize_route(&points, &options).unwrap();

    assert_eq!(result.coordinates.len(), 4);
    assert_eq!(result.coordinates[0].longitude, 0.0);
    assert_eq!(result.optimized_distance, 3000.0);
}

#[test]
fn test_end_point_in_input_moves_last() {
    let points = line_points(&[1.0, 3.0, 2.0, 0.0]);
    let options = SequencerOptions {
        end_point: Some(Coordinate::new(0.0, 3.0)),
        ..SequencerOptions::new(SequencingAlgorithm::TwoOpt)
    };

    let result = RouteSequencer::new(&LineDistance).optimize_route(&points, &options).unwrap();

    assert_eq!(result.coordinates.len(), 4);
    assert_eq!(result.coordinates.last().unwrap().longitude, 3.0);
}

// ============================================================================
// Realistic routes
// ============================================================================

#[test]
fn test_centro_zigzag_improves() {
    let points = centro_zigzag();
    let sequencer = RouteSequencer::new(&HaversineDistance);

    let result = sequencer
        .optimize_route(&points, &SequencerOptions::new(SequencingAlgorithm::TwoOpt))
        .unwrap();

    assert!(result.optimized_distance < result.original_distance);
    assert!(is_permutation(&result.sequence, points.len()));
    assert!(result.iterations >= 1);
}

#[test]
fn test_genetic_is_reproducible_with_seed() {
    let points = centro_zigzag();
    let sequencer = RouteSequencer::new(&HaversineDistance);
    let options = seeded(SequencingAlgorithm::Genetic);

    let first = sequencer.optimize_route(&points, &options).unwrap();
    let second = sequencer.optimize_route(&points, &options).unwrap();

    assert_eq!(first.sequence, second.sequence);
    assert_eq!(first.iterations, GeneticConfig::default().generations);
}

#[test]
fn test_benchmark_runs_every_algorithm() {
    let points: Vec<Coordinate> = all_sites().iter().map(|site| site.coordinate()).collect();
    let sequencer = RouteSequencer::new(&HaversineDistance);

    let results = sequencer
        .benchmark_algorithms(&points, None, &seeded(SequencingAlgorithm::TwoOpt))
        .unwrap();

    let algorithms: Vec<_> = results.iter().map(|r| r.algorithm).collect();
    assert_eq!(algorithms, SequencingAlgorithm::ALL.to_vec());
    for result in &results {
        assert!((result.original_distance - results[0].original_distance).abs() < 1e-6);
        assert!(result.optimized_distance <= result.original_distance + 1e-6);
    }

    let stats = aggregate_statistics(&results);
    assert!(stats.best_improvement_percent >= stats.worst_improvement_percent);
    assert!(stats.total_distance_saved >= 0.0);
}

#[test]
fn test_benchmark_subset() {
    let sequencer = RouteSequencer::new(&LineDistance);
    let subset = [SequencingAlgorithm::Genetic];

    let points = line_points(&[0.0, 3.0, 1.0, 2.0]);

    let results = sequencer
        .benchmark_algorithms(&points, Some(&subset), &seeded(SequencingAlgorithm::TwoOpt))
        .unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].algorithm, SequencingAlgorithm::Genetic);
}

#[test]
fn test_optimize_routes_keeps_input_order() {
    let routes = vec![
        ZonedRoute {
            route_id: 1,
            zone_id: Some(CENTRO),
            coordinates: centro_zigzag(),
        },
        ZonedRoute {
            route_id: 2,
            zone_id: Some(NORTE),
            coordinates: NORTE_SITES.iter().map(|site| site.coordinate()).collect(),
        },
        ZonedRoute {
            route_id: 3,
            zone_id: None,
            coordinates: Vec::new(),
        },
    ];
    let sequencer = RouteSequencer::new(&HaversineDistance);

    let results = sequencer.optimize_routes(&routes, &SequencerOptions::default()).unwrap();

    let ids: Vec<_> = results.iter().map(|r| r.route_id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
    assert_eq!(results[1].zone_id, Some(NORTE));
    assert_eq!(results[1].result.coordinates.len(), NORTE_SITES.len());
}

#[test]
fn test_statistics_over_results() {
    let sequencer = RouteSequencer::new(&LineDistance);
    let options = SequencerOptions::new(SequencingAlgorithm::NearestNeighbor);
    let results = vec![
        sequencer.optimize_route(&line_points(&[0.0, 3.0, 1.0, 2.0]), &options).unwrap(),
        sequencer.optimize_route(&line_points(&[0.0, 1.0, 2.0]), &options).unwrap(),
    ];

    let stats = aggregate_statistics(&results);

    assert_eq!(stats.best_improvement_percent, 50.0);
    assert_eq!(stats.worst_improvement_percent, 0.0);
    assert_eq!(stats.average_improvement_percent, 25.0);
    assert_eq!(stats.total_distance_saved, 3000.0);
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_unknown_algorithm_name() {
    let err = SequencerOptions::for_algorithm_name("simulated_annealing").unwrap_err();
    assert!(matches!(err, DispatchError::UnknownAlgorithm(name) if name == "simulated_annealing"));
}

#[test]
fn test_distance_failure_propagates() {
    let sequencer = RouteSequencer::new(&UnreachableDistance);

    let err = sequencer
        .optimize_route(&centro_zigzag(), &SequencerOptions::default())
        .unwrap_err();

    assert!(matches!(err, DispatchError::Collaborator(_)));
}

#[test]
fn test_invalid_genetic_config() {
    let options = SequencerOptions {
        genetic: GeneticConfig {
            population_size: 1,
            ..GeneticConfig::default()
        },
        ..SequencerOptions::new(SequencingAlgorithm::Genetic)
    };

    let err = RouteSequencer::new(&LineDistance)
        .optimize_route(&line_points(&[0.0, 1.0, 2.0]), &options)
        .unwrap_err();

    assert!(matches!(err, DispatchError::InvalidConfig(_)));
}

// ============================================================================
// Properties
// ============================================================================

fn algorithm_strategy() -> impl Strategy<Value = SequencingAlgorithm> {
    prop_oneof![
        Just(SequencingAlgorithm::NearestNeighbor),
        Just(SequencingAlgorithm::TwoOpt),
        Just(SequencingAlgorithm::Genetic),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_never_longer_than_input(
        positions in prop::collection::vec((40.30f64..40.50, -3.80f64..-3.60), 0..12),
        algorithm in algorithm_strategy(),
        preserve in any::<bool>(),
        seed in any::<u64>(),
    ) {
        let points: Vec<Coordinate> = positions
            .iter()
            .map(|&(lat, lng)| Coordinate::new(lat, lng))
            .collect();
        let options = SequencerOptions {
            preserve_start_end: preserve,
            seed: Some(seed),
            genetic: GeneticConfig {
                population_size: 16,
                generations: 20,
                ..GeneticConfig::default()
            },
            ..SequencerOptions::new(algorithm)
        };

        let result = RouteSequencer::new(&HaversineDistance)
            .optimize_route(&points, &options)
            .unwrap();

        prop_assert!(result.optimized_distance <= result.original_distance + 1e-6);
        prop_assert!(is_permutation(&result.sequence, points.len()));
        prop_assert_eq!(result.coordinates.len(), points.len());
        if preserve && points.len() >= 2 {
            prop_assert_eq!(result.sequence[0], 0);
            prop_assert_eq!(result.sequence[points.len() - 1], points.len() - 1);
        }
    }
}
