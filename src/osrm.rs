//! OSRM HTTP adapter for road distances.

use serde::Deserialize;
use tracing::debug;

use crate::error::CollaboratorError;
use crate::models::Coordinate;
use crate::sequencer::DistanceMatrix;
use crate::traits::{DistanceFunction, StoreResult};

#[derive(Debug, Clone)]
pub struct OsrmConfig {
    pub base_url: String,
    pub profile: String,
    pub timeout_secs: u64,
}

impl Default for OsrmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            profile: "car".to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OsrmClient {
    config: OsrmConfig,
    client: reqwest::blocking::Client,
}

impl OsrmClient {
    pub fn new(config: OsrmConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    fn table_url(&self, points: &[Coordinate]) -> String {
        let coords = points
            .iter()
            .map(|point| format!("{:.6},{:.6}", point.longitude, point.latitude))
            .collect::<Vec<_>>()
            .join(";");

        format!(
            "{}/table/v1/{}/{}?annotations=distance",
            self.config.base_url, self.config.profile, coords
        )
    }
}

impl DistanceFunction for OsrmClient {
    fn distance_meters(&self, from: &Coordinate, to: &Coordinate) -> StoreResult<f64> {
        if from.same_position(to) {
            return Ok(0.0);
        }
        let matrix = self.matrix_for(&[from.clone(), to.clone()])?;
        Ok(matrix.get(0, 1))
    }

    fn matrix_for(&self, points: &[Coordinate]) -> StoreResult<DistanceMatrix> {
        if points.is_empty() {
            return Ok(DistanceMatrix::new(0));
        }

        let body = self
            .client
            .get(self.table_url(points))
            .send()
            .and_then(|resp| resp.error_for_status())
            .and_then(|resp| resp.json::<OsrmTableResponse>())?;

        if body.code != "Ok" {
            return Err(CollaboratorError::msg(format!("OSRM table returned code {}", body.code)));
        }

        let rows = body.distances.unwrap_or_default();
        if rows.len() != points.len() || rows.iter().any(|row| row.len() != points.len()) {
            return Err(CollaboratorError::msg(format!(
                "OSRM table returned {} rows for {} points",
                rows.len(),
                points.len()
            )));
        }

        debug!(points = points.len(), "fetched OSRM distance table");
        table_matrix(rows)
    }
}

/// Builds a symmetric matrix from OSRM table rows.
///
/// Road distances differ by direction; each pair keeps the shorter one so
/// route reversals cost the same both ways. A null entry means OSRM found
/// no route and fails the whole table.
fn table_matrix(rows: Vec<Vec<Option<f64>>>) -> StoreResult<DistanceMatrix> {
    let n = rows.len();
    let mut matrix = DistanceMatrix::new(n);

    for i in 0..n {
        for j in (i + 1)..n {
            let (Some(there), Some(back)) = (rows[i][j], rows[j][i]) else {
                return Err(CollaboratorError::msg(format!(
                    "OSRM found no route between points {i} and {j}"
                )));
            };
            let distance = there.min(back);
            matrix.set(i, j, distance);
            matrix.set(j, i, distance);
        }
    }

    Ok(matrix)
}

#[derive(Debug, Deserialize)]
struct OsrmTableResponse {
    code: String,
    distances: Option<Vec<Vec<Option<f64>>>>,
}
