//! Nearest-neighbor tour construction.
//!
//! Starting from the first point, always step to the closest unvisited
//! point. O(n²), deterministic; ties go to the lower index.

use super::matrix::DistanceMatrix;

/// Greedy visiting order over all points of `distances`.
///
/// The tour starts at index 0. When `fixed_end` is set, the last index is
/// held back and appended at the end.
pub fn nearest_neighbor_order(distances: &DistanceMatrix, fixed_end: bool) -> Vec<usize> {
    let n = distances.size();
    if n == 0 {
        return Vec::new();
    }

    let last = n - 1;
    let hold_end = fixed_end && n > 1;
    let mut visited = vec![false; n];
    visited[0] = true;
    if hold_end {
        visited[last] = true;
    }

    let mut order = Vec::with_capacity(n);
    order.push(0);
    let mut current = 0;

    loop {
        let mut best: Option<(usize, f64)> = None;
        for candidate in 0..n {
            if visited[candidate] {
                continue;
            }
            let d = distances.get(current, candidate);
            if best.is_none_or(|(_, best_d)| d < best_d) {
                best = Some((candidate, d));
            }
        }

        match best {
            Some((next, _)) => {
                visited[next] = true;
                order.push(next);
                current = next;
            }
            None => break,
        }
    }

    if hold_end {
        order.push(last);
    }
    order
}
