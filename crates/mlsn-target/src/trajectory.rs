//! Trajectory document loading
//!
//! The trajectory is a JSON document `{"waypoints": [[x, y, z], ...]}`.
//! Any entry that is not a 3-element numeric array, or an empty waypoint
//! list, is rejected before the service starts.

use std::path::Path;

use serde::Deserialize;

use mlsn_core::{MlsnError, MlsnResult, Position};

#[derive(Debug, Deserialize)]
struct TrajectoryDocument {
    waypoints: Vec<[f64; 3]>,
}

/// An ordered list of waypoints for the target to follow.
#[derive(Clone, Debug)]
pub struct Trajectory {
    waypoints: Vec<Position>,
}

impl Trajectory {
    /// Parse a trajectory from JSON text.
    pub fn from_json(text: &str) -> MlsnResult<Self> {
        let document: TrajectoryDocument = serde_json::from_str(text)
            .map_err(|e| MlsnError::MalformedTrajectory(e.to_string()))?;
        if document.waypoints.is_empty() {
            return Err(MlsnError::MalformedTrajectory(
                "the waypoint list is empty".into(),
            ));
        }
        for (index, &[x, y, z]) in document.waypoints.iter().enumerate() {
            if !(x.is_finite() && y.is_finite() && z.is_finite()) {
                return Err(MlsnError::MalformedTrajectory(format!(
                    "waypoint {index} has a non-finite coordinate"
                )));
            }
        }
        Ok(Trajectory {
            waypoints: document
                .waypoints
                .into_iter()
                .map(|[x, y, z]| Position::new(x, y, z))
                .collect(),
        })
    }

    /// Load a trajectory from a file.
    pub fn load(path: &Path) -> MlsnResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            MlsnError::MalformedTrajectory(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json(&text)
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    /// Waypoint at `index`; the updater keeps the cursor in range.
    pub fn waypoint(&self, index: usize) -> Position {
        self.waypoints[index]
    }

    /// The starting position of the target.
    pub fn first(&self) -> Position {
        self.waypoints[0]
    }
}
