//! 2-opt improvement of an open path.
//!
//! # Algorithm
//!
//! For each pair of edges (i, i+1) and (j, j+1), compute the change in
//! distance from reversing the segment between them:
//!
//! ```text
//! delta = d(r[i], r[j]) + d(r[i+1], r[j+1]) - d(r[i], r[i+1]) - d(r[j], r[j+1])
//! ```
//!
//! If delta < 0, reverse the segment [i+1..=j] and keep scanning
//! (first-improvement). A full pass without improvement ends the search.
//!
//! The path is open, so a free end behaves as if attached to a zero-length
//! edge: reversing a prefix or suffix is a valid move. A fixed end never has
//! that virtual edge, so its point never moves.
//!
//! The delta above assumes `d(a, b) == d(b, a)`. On an asymmetric matrix the
//! reversed segment is priced edge by edge instead.

use super::matrix::DistanceMatrix;

const IMPROVEMENT_EPSILON: f64 = 1e-9;

/// Improves `order` in place of a copy.
///
/// Returns the improved order and the number of passes made, which never
/// exceeds `max_passes`.
pub fn two_opt_improve(
    order: &[usize],
    distances: &DistanceMatrix,
    fixed_start: bool,
    fixed_end: bool,
    max_passes: usize,
) -> (Vec<usize>, usize) {
    let mut current = order.to_vec();
    let n = current.len();
    if n < 3 {
        return (current, 0);
    }

    let first = usize::from(fixed_start);
    let last = if fixed_end { n - 2 } else { n - 1 };
    let symmetric = distances.is_symmetric(IMPROVEMENT_EPSILON);
    let mut passes = 0;

    while passes < max_passes {
        passes += 1;
        let mut improved = false;

        for start in first..last {
            for end in (start + 1)..=last {
                let delta = if symmetric {
                    reversal_delta(&current, distances, start, end)
                } else {
                    directed_reversal_delta(&current, distances, start, end)
                };
                if delta < -IMPROVEMENT_EPSILON {
                    current[start..=end].reverse();
                    improved = true;
                }
            }
        }

        if !improved {
            break;
        }
    }

    (current, passes)
}

/// Change in path length from reversing `route[start..=end]`.
fn reversal_delta(route: &[usize], distances: &DistanceMatrix, start: usize, end: usize) -> f64 {
    let n = route.len();
    let edge = |a: Option<usize>, b: usize| a.map_or(0.0, |a| distances.get(a, b));

    let prev = start.checked_sub(1).map(|i| route[i]);
    let next = (end + 1 < n).then(|| route[end + 1]);

    let tail = |a: usize| next.map_or(0.0, |next| distances.get(a, next));

    let old_cost = edge(prev, route[start]) + tail(route[end]);
    let new_cost = edge(prev, route[end]) + tail(route[start]);

    new_cost - old_cost
}

/// Like [`reversal_delta`], but also re-prices every edge inside the
/// segment, whose direction flips.
fn directed_reversal_delta(
    route: &[usize],
    distances: &DistanceMatrix,
    start: usize,
    end: usize,
) -> f64 {
    let lo = start.saturating_sub(1);
    let hi = (end + 1).min(route.len() - 1);

    let mut reversed = route[lo..=hi].to_vec();
    reversed[start - lo..=end - lo].reverse();

    distances.path_distance(&reversed) - distances.path_distance(&route[lo..=hi])
}
