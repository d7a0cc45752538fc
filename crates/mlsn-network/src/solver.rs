//! Multilateration solver
//!
//! Estimates the target position from (sensor position, distance) pairs by
//! minimizing the sum of squared range residuals `||p - s_i|| - d_i` with
//! Levenberg-Marquardt. The previous estimate warm-starts the next call.

use std::collections::HashMap;

use nalgebra::{Matrix3, Vector3};

use mlsn_core::{MlsnError, MlsnResult, NodeId, Position};

use crate::state::NodeRecord;

/// A well-posed fix needs at least three usable range measurements.
pub const MIN_MEASUREMENTS: usize = 3;

const MAX_ITERATIONS: usize = 100;
const COST_TOLERANCE: f64 = 1e-12;
const STEP_TOLERANCE: f64 = 1e-10;
const GRADIENT_TOLERANCE: f64 = 1e-10;
const INITIAL_DAMPING: f64 = 1e-3;
const MAX_DAMPING: f64 = 1e8;

/// Non-linear least-squares position estimator.
pub struct Multilateration {
    sensor_positions: HashMap<NodeId, Position>,
    initial_guess: Position,
}

impl Multilateration {
    pub fn new() -> Self {
        Multilateration {
            sensor_positions: HashMap::new(),
            initial_guess: Position::zeros(),
        }
    }

    /// Snapshot the registry into the solver's sensor map. Runs once, at
    /// activation.
    pub fn set_sensor_positions(&mut self, nodes_info: &HashMap<NodeId, NodeRecord>) {
        self.sensor_positions = nodes_info
            .iter()
            .map(|(&id, record)| (id, record.position))
            .collect();
    }

    /// Solve for the target position from one round of distances.
    ///
    /// Only the intersection of known sensors and reported distances is
    /// used; non-finite distances (a sensor that has not measured yet) are
    /// discarded. Pairs are ordered by node id so identical inputs produce
    /// bit-identical accumulation.
    pub fn estimate_position(&mut self, distances: &HashMap<NodeId, f64>) -> MlsnResult<Position> {
        let mut pairs: Vec<(NodeId, Position, f64)> = self
            .sensor_positions
            .iter()
            .filter_map(|(&id, &sensor)| {
                distances
                    .get(&id)
                    .filter(|d| d.is_finite())
                    .map(|&d| (id, sensor, d))
            })
            .collect();
        pairs.sort_by_key(|(id, _, _)| *id);

        if pairs.len() < MIN_MEASUREMENTS {
            return Err(MlsnError::InsufficientMeasurements {
                needed: MIN_MEASUREMENTS,
                got: pairs.len(),
            });
        }

        let estimate = solve_levenberg_marquardt(&pairs, self.initial_guess)?;
        self.initial_guess = estimate;
        Ok(estimate)
    }
}

impl Default for Multilateration {
    fn default() -> Self {
        Self::new()
    }
}

fn residual_cost(pairs: &[(NodeId, Position, f64)], estimate: &Position) -> f64 {
    pairs
        .iter()
        .map(|(_, sensor, distance)| {
            let r = (estimate - sensor).norm() - distance;
            r * r
        })
        .sum()
}

/// One normal-equations accumulation: `J^T J` and `J^T r` over all pairs.
fn normal_equations(
    pairs: &[(NodeId, Position, f64)],
    estimate: &Position,
) -> (Matrix3<f64>, Vector3<f64>) {
    let mut jtj = Matrix3::zeros();
    let mut jtr = Vector3::zeros();
    for (_, sensor, distance) in pairs {
        let offset = estimate - sensor;
        let range = offset.norm().max(1e-9);
        let gradient = offset / range;
        jtj += gradient * gradient.transpose();
        jtr += gradient * (range - distance);
    }
    (jtj, jtr)
}

fn solve_levenberg_marquardt(
    pairs: &[(NodeId, Position, f64)],
    initial_guess: Position,
) -> MlsnResult<Position> {
    let mut estimate = initial_guess;
    let mut damping = INITIAL_DAMPING;
    let mut cost = residual_cost(pairs, &estimate);

    for _ in 0..MAX_ITERATIONS {
        let (jtj, jtr) = normal_equations(pairs, &estimate);
        if jtr.norm() < GRADIENT_TOLERANCE {
            return Ok(estimate);
        }

        let mut damped = jtj;
        for i in 0..3 {
            damped[(i, i)] += damping * jtj[(i, i)].max(1e-12);
        }
        let Some(step) = damped.try_inverse().map(|inverse| inverse * jtr) else {
            damping *= 10.0;
            if damping > MAX_DAMPING {
                return Err(MlsnError::SolverDivergence);
            }
            continue;
        };

        let candidate = estimate - step;
        let candidate_cost = residual_cost(pairs, &candidate);
        if candidate_cost < cost {
            let improvement = cost - candidate_cost;
            estimate = candidate;
            cost = candidate_cost;
            damping = (damping * 0.1).max(1e-12);
            if improvement < COST_TOLERANCE || step.norm() < STEP_TOLERANCE {
                return Ok(estimate);
            }
        } else {
            // Rejected step: either we already sit at a minimum, or the
            // damping needs to grow before trying again.
            if step.norm() < STEP_TOLERANCE {
                return Ok(estimate);
            }
            damping *= 10.0;
            if damping > MAX_DAMPING {
                return Err(MlsnError::SolverDivergence);
            }
        }
    }

    Err(MlsnError::SolverDivergence)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(sensors: &[(i32, [f64; 3])]) -> HashMap<NodeId, NodeRecord> {
        sensors
            .iter()
            .map(|&(id, [x, y, z])| {
                (
                    NodeId::new(id),
                    NodeRecord {
                        position: Position::new(x, y, z),
                        reply_address: format!("127.0.0.1:{}", 7800 + id),
                    },
                )
            })
            .collect()
    }

    fn noiseless_distances(
        sensors: &[(i32, [f64; 3])],
        target: Position,
    ) -> HashMap<NodeId, f64> {
        sensors
            .iter()
            .map(|&(id, [x, y, z])| {
                (NodeId::new(id), (target - Position::new(x, y, z)).norm())
            })
            .collect()
    }

    const TETRAHEDRON: [(i32, [f64; 3]); 4] = [
        (1, [0.0, 0.0, 0.0]),
        (2, [10.0, 0.0, 0.0]),
        (3, [0.0, 10.0, 0.0]),
        (4, [0.0, 0.0, 10.0]),
    ];

    #[test]
    fn test_noiseless_recovery_four_sensors() {
        let target = Position::new(3.0, 4.0, 5.0);
        let mut solver = Multilateration::new();
        solver.set_sensor_positions(&registry(&TETRAHEDRON));

        let estimate = solver
            .estimate_position(&noiseless_distances(&TETRAHEDRON, target))
            .unwrap();
        assert!((estimate - target).norm() < 1e-3);
    }

    #[test]
    fn test_exactly_three_sensors_is_well_posed() {
        let sensors = [
            (1, [0.0, 0.0, 0.0]),
            (2, [10.0, 0.0, 0.0]),
            (3, [0.0, 10.0, 0.0]),
        ];
        // Target in the sensor plane so the mirror ambiguity collapses.
        let target = Position::new(2.0, 3.0, 0.0);
        let mut solver = Multilateration::new();
        solver.set_sensor_positions(&registry(&sensors));

        let estimate = solver
            .estimate_position(&noiseless_distances(&sensors, target))
            .unwrap();
        assert!((estimate - target).norm() < 1e-3);
    }

    #[test]
    fn test_two_measurements_rejected() {
        let mut solver = Multilateration::new();
        solver.set_sensor_positions(&registry(&TETRAHEDRON[..2]));

        let distances = noiseless_distances(&TETRAHEDRON[..2], Position::new(1.0, 1.0, 1.0));
        assert!(matches!(
            solver.estimate_position(&distances),
            Err(MlsnError::InsufficientMeasurements { needed: 3, got: 2 })
        ));
    }

    #[test]
    fn test_empty_distances_rejected() {
        let mut solver = Multilateration::new();
        solver.set_sensor_positions(&registry(&TETRAHEDRON));
        assert!(matches!(
            solver.estimate_position(&HashMap::new()),
            Err(MlsnError::InsufficientMeasurements { got: 0, .. })
        ));
    }

    #[test]
    fn test_only_key_intersection_is_used() {
        let target = Position::new(3.0, 4.0, 5.0);
        let mut solver = Multilateration::new();
        solver.set_sensor_positions(&registry(&TETRAHEDRON));

        let mut distances = noiseless_distances(&TETRAHEDRON, target);
        // A reply from an unregistered node must not disturb the fix.
        distances.insert(NodeId::new(99), 1234.5);

        let estimate = solver.estimate_position(&distances).unwrap();
        assert!((estimate - target).norm() < 1e-3);
    }

    #[test]
    fn test_unmeasured_sensors_are_discarded() {
        // Target in the plane of the three measuring sensors, so the fix
        // stays unique when the fourth drops out.
        let target = Position::new(3.0, 4.0, 0.0);
        let mut solver = Multilateration::new();
        solver.set_sensor_positions(&registry(&TETRAHEDRON));

        let mut distances = noiseless_distances(&TETRAHEDRON, target);
        distances.insert(NodeId::new(4), f64::INFINITY);

        // Three finite measurements remain, still solvable.
        let estimate = solver.estimate_position(&distances).unwrap();
        assert!((estimate - target).norm() < 1e-2);
    }

    #[test]
    fn test_repeated_calls_are_stable() {
        let target = Position::new(3.0, 4.0, 5.0);
        let distances = noiseless_distances(&TETRAHEDRON, target);

        let mut solver = Multilateration::new();
        solver.set_sensor_positions(&registry(&TETRAHEDRON));

        let first = solver.estimate_position(&distances).unwrap();
        let second = solver.estimate_position(&distances).unwrap();
        assert!((first - second).norm() < 1e-6);
    }

    #[test]
    fn test_warm_start_tracks_a_moving_target() {
        let mut solver = Multilateration::new();
        solver.set_sensor_positions(&registry(&TETRAHEDRON));

        for step in 0..20 {
            let target = Position::new(3.0 + 0.1 * step as f64, 4.0, 5.0);
            let estimate = solver
                .estimate_position(&noiseless_distances(&TETRAHEDRON, target))
                .unwrap();
            assert!((estimate - target).norm() < 1e-3);
        }
    }
}
